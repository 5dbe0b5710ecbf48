// Adapters layer: concrete implementations for external systems (model API, HTTP surface).

pub mod gemini;
pub mod http;
