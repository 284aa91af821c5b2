pub mod ollama;

pub use ollama::{GenerationClient, GenerationResult};
