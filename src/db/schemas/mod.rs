//! Database schemas for Atheneum
//!
//! Defines MongoDB document structures for content and doubts.

mod content;
mod doubt;
mod metadata;

pub use content::{
    ContentDoc, ContentType, ExtractedData, FileRef, ProcessingStatus, Thumbnail,
    CONTENT_COLLECTION,
};
pub use doubt::{DoubtDoc, DoubtStatus, SuggestedVideo, VisualContext, DOUBT_COLLECTION};
pub use metadata::Metadata;
