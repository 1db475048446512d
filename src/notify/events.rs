//! Typed notification events
//!
//! Course-scoped events go to `atheneum.course.{id}`, user-scoped events
//! to `atheneum.user.{id}`. Frontends subscribe per course/user; nothing
//! server-side consumes these.

use serde::{Deserialize, Serialize};

/// Subject prefix for course-scoped events
pub const COURSE_SUBJECT_PREFIX: &str = "atheneum.course";

/// Subject prefix for user-scoped events
pub const USER_SUBJECT_PREFIX: &str = "atheneum.user";

/// Subject for events visible to everyone in a course
pub fn course_subject(course_id: &str) -> String {
    format!("{COURSE_SUBJECT_PREFIX}.{course_id}")
}

/// Subject for events targeted at one user
pub fn user_subject(user_id: &str) -> String {
    format!("{USER_SUBJECT_PREFIX}.{user_id}")
}

/// New content registered in a course
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentUploaded {
    pub event: String,
    pub content_id: String,
    pub course_id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub uploaded_by: String,
}

impl ContentUploaded {
    pub fn new(
        content_id: String,
        course_id: String,
        title: String,
        content_type: String,
        uploaded_by: String,
    ) -> Self {
        Self {
            event: "content.uploaded".to_string(),
            content_id,
            course_id,
            title,
            content_type,
            uploaded_by,
        }
    }

    pub fn subject(&self) -> String {
        course_subject(&self.course_id)
    }

    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> Result<bytes::Bytes, serde_json::Error> {
        serde_json::to_vec(self).map(Into::into)
    }

    /// Deserialize from JSON bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}

/// A doubt escalated to the course faculty
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoubtEscalated {
    pub event: String,
    pub doubt_id: String,
    pub course_id: String,
    pub student_id: String,
    pub query: String,
}

impl DoubtEscalated {
    pub fn new(doubt_id: String, course_id: String, student_id: String, query: String) -> Self {
        Self {
            event: "doubt.escalated".to_string(),
            doubt_id,
            course_id,
            student_id,
            query,
        }
    }

    pub fn subject(&self) -> String {
        course_subject(&self.course_id)
    }

    pub fn to_bytes(&self) -> Result<bytes::Bytes, serde_json::Error> {
        serde_json::to_vec(self).map(Into::into)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}

/// Faculty answered an escalated doubt, delivered to the asking student
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoubtAnswered {
    pub event: String,
    pub doubt_id: String,
    pub student_id: String,
    pub answered_by: String,
    pub answer: String,
}

impl DoubtAnswered {
    pub fn new(doubt_id: String, student_id: String, answered_by: String, answer: String) -> Self {
        Self {
            event: "doubt.answered".to_string(),
            doubt_id,
            student_id,
            answered_by,
            answer,
        }
    }

    pub fn subject(&self) -> String {
        user_subject(&self.student_id)
    }

    pub fn to_bytes(&self) -> Result<bytes::Bytes, serde_json::Error> {
        serde_json::to_vec(self).map(Into::into)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn course_subject_format() {
        assert_eq!(course_subject("abc123"), "atheneum.course.abc123");
    }

    #[test]
    fn user_subject_format() {
        assert_eq!(user_subject("u-9"), "atheneum.user.u-9");
    }

    #[test]
    fn content_uploaded_roundtrip() {
        let original = ContentUploaded::new(
            "c1".into(),
            "course1".into(),
            "Intro to Stacks".into(),
            "pdf".into(),
            "faculty1".into(),
        );
        assert_eq!(original.subject(), "atheneum.course.course1");

        let bytes = original.to_bytes().unwrap();
        let decoded = ContentUploaded::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.event, "content.uploaded");
        assert_eq!(decoded.content_id, "c1");
        assert_eq!(decoded.content_type, "pdf");
    }

    #[test]
    fn doubt_answered_targets_student_subject() {
        let event = DoubtAnswered::new("d1".into(), "s1".into(), "f1".into(), "Because.".into());
        assert_eq!(event.subject(), "atheneum.user.s1");

        let decoded = DoubtAnswered::from_bytes(&event.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.event, "doubt.answered");
        assert_eq!(decoded.answered_by, "f1");
    }

    #[test]
    fn doubt_escalated_targets_course_subject() {
        let event = DoubtEscalated::new("d1".into(), "course7".into(), "s1".into(), "why".into());
        assert_eq!(event.subject(), "atheneum.course.course7");
    }
}
