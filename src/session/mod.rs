//! Generation session module

pub mod gateway;
pub mod gemini;
pub mod gemini_provider;
pub mod prompts;
pub mod provider;

pub use gateway::{AiGateway, GatewayError, GenerationResponse};
pub use gemini::GeminiClient;
pub use gemini_provider::GeminiProvider;
pub use prompts::PageContext;
pub use provider::{GenerationProvider, SessionHandle};
