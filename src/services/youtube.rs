//! Best-effort YouTube video suggestion
//!
//! Scrapes the first result off the public search page. There is no API
//! key involved and the page markup changes without notice, so every
//! failure path degrades to "no suggestion". Nothing here may fail a
//! doubt request.

use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

use crate::db::schemas::SuggestedVideo;

const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);

fn video_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#""videoRenderer":\{"videoId":"([A-Za-z0-9_-]{11})""#)
            .unwrap_or_else(|_| unreachable!("static regex"))
    })
}

fn title_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#""title":\{"runs":\[\{"text":"((?:[^"\\]|\\.){1,200}?)"\}"#)
            .unwrap_or_else(|_| unreachable!("static regex"))
    })
}

/// Scraping client for video suggestions
#[derive(Clone)]
pub struct YoutubeClient {
    http: reqwest::Client,
}

impl YoutubeClient {
    pub fn new() -> Option<Self> {
        let http = reqwest::Client::builder()
            .timeout(SEARCH_TIMEOUT)
            .build()
            .ok()?;
        Some(Self { http })
    }

    /// Find an explainer video for the given topic. Returns `None` on any
    /// failure: network, non-200, unrecognized markup.
    pub async fn suggest(&self, topic: &str) -> Option<SuggestedVideo> {
        let query = format!("animated explanation {}", topic.trim());
        let url = format!(
            "https://www.youtube.com/results?search_query={}",
            urlencoding::encode(&query)
        );

        let response = self.http.get(&url).send().await.ok()?;
        if !response.status().is_success() {
            debug!(status = %response.status(), "YouTube search returned non-success");
            return None;
        }

        let body = response.text().await.ok()?;
        parse_first_result(&body)
    }
}

/// Pull the first video id (and its title when adjacent) out of the
/// search results page
pub fn parse_first_result(body: &str) -> Option<SuggestedVideo> {
    let id_match = video_id_regex().captures(body)?;
    let video_id = id_match.get(1)?.as_str().to_string();

    // Title lookup is scoped after the id match so it belongs to the same
    // renderer block; a miss just leaves the title empty.
    let tail = &body[id_match.get(0)?.end()..];
    let title = title_regex()
        .captures(tail)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().replace("\\\"", "\""))
        .unwrap_or_default();

    Some(SuggestedVideo {
        id: video_id.clone(),
        url: format!("https://www.youtube.com/watch?v={}", video_id),
        title,
        thumbnail: format!("https://i.ytimg.com/vi/{}/hqdefault.jpg", video_id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_video_renderer() {
        let body = r#"junk{"videoRenderer":{"videoId":"dQw4w9WgXcQ","thumbnail":{},"title":{"runs":[{"text":"Stacks Explained"}]}}more"#;
        let video = parse_first_result(body).unwrap();
        assert_eq!(video.id, "dQw4w9WgXcQ");
        assert_eq!(video.url, "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        assert_eq!(video.title, "Stacks Explained");
        assert_eq!(
            video.thumbnail,
            "https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg"
        );
    }

    #[test]
    fn missing_renderer_is_none() {
        assert!(parse_first_result("<html>no results</html>").is_none());
    }

    #[test]
    fn missing_title_still_yields_video() {
        let body = r#"{"videoRenderer":{"videoId":"abcdefghijk"}}"#;
        let video = parse_first_result(body).unwrap();
        assert_eq!(video.id, "abcdefghijk");
        assert!(video.title.is_empty());
    }
}
