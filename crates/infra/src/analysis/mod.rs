//! Analysis service clients.

mod chat;

pub use chat::{ChatCompletionsClient, parse_envelope};
