pub mod api;
pub mod chat;
pub mod config;
pub mod error;
pub mod state;

// Re-export main types for convenience
pub use api::stream::Utf8StreamDecoder;
pub use api::{ApiClient, AskReply, HealthStatus, Session, ToolCall, UploadedFile, VectorStore};
pub use chat::{Conversation, FALLBACK_REPLY};
pub use config::Config;
pub use error::{ApiError, Result};
pub use state::{ChatMessage, ChatRole};
