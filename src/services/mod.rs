//! External service clients

pub mod llm;
pub mod local_extract;
pub mod ml;
pub mod youtube;

pub use llm::{DoubtTutor, LlmClient, TutorAnswer};
pub use local_extract::LocalExtractor;
pub use ml::{MlClient, MlExtraction};
pub use youtube::YoutubeClient;
