//! Student doubt resolution

pub mod workflow;

pub use workflow::{
    resolve_answer, store_faculty_answer, AnswerSource, AskOutcome, AskRequest, DoubtService,
    ResolvedAnswer, FACULTY_CONFIDENCE,
    KNOWLEDGE_WRITE_THRESHOLD, RESOLVE_THRESHOLD,
};
