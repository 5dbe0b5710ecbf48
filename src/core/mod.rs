pub mod normalizer;
pub mod prompt;
pub mod relay;

pub use crate::domain::model::{ChatRequest, ChatTurn, ImagePayload};
pub use crate::domain::ports::ModelClient;
pub use crate::utils::error::Result;
