// Public modules
pub mod api_error;
pub mod chat_completion_chunk;
pub mod chat_completion_params;
pub mod message;
pub mod role;

// Re-exports
pub use api_error::{ApiErrorBody, ApiErrorDetail};
pub use chat_completion_chunk::{ChatCompletionChunk, ChunkChoice, ChunkDelta};
pub use chat_completion_params::ChatCompletionParams;
pub use message::Message;
pub use role::Role;
