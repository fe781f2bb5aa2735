mod client;
mod error;
mod response;
mod types;

pub use client::{DEFAULT_MODEL, GEMINI_API_BASE, GeminiClient, GeminiClientBuilder};
pub use error::Error;
pub use response::strip_code_fences;
pub use types::*;
