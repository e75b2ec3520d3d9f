//! Language model backends: the Ollama generation client and the tiered
//! model selector.

mod ollama;
mod selector;

pub use ollama::OllamaClient;
pub use selector::TieredModelSelector;
