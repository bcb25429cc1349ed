pub mod channel;
pub mod error;
pub mod memory;
pub mod retry;

pub use channel::{ChatMessage, MessageChannel};
pub use error::TransportError;
pub use memory::{MemoryChannel, MemoryMessage, MemoryOp};
pub use retry::{retry, RetryPolicy};
