//! Real-time notification channel (NATS)

pub mod client;
pub mod events;

pub use client::NatsClient;
pub use events::{
    course_subject, user_subject, ContentUploaded, DoubtAnswered, DoubtEscalated,
};
