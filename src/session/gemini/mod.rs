//! Gemini REST backend

pub mod client;

pub use client::GeminiClient;
