//! Shared contracts, error model, configuration, and collaborator ports.
//!
//! This crate is the foundation depended on by all other explainer crates.
//! It provides:
//! - [`ExplainerError`], the unified error type
//! - Stage contracts ([`QueryAnalysis`], [`DocumentationResult`],
//!   [`ExampleFinderResult`], [`CodeValidationResult`], [`ComplexityResult`],
//!   [`FinalAnswer`])
//! - Configuration ([`AppConfig`], config loading)
//! - Collaborator ports ([`TextGenerator`], [`DocSearch`], [`WebSearch`], ...)

pub mod config;
pub mod error;
pub mod ports;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ModelsConfig, OllamaConfig, RetrievalConfig, SearchConfig, ServerConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{ExplainerError, Result};
pub use ports::{
    CodeValidator, ComplexityAnalyzer, DocHit, DocSearch, ModelSelector, ReasoningDepth,
    TaskType, TextGenerator, WebHit, WebSearch,
};
pub use types::{
    AnswerMeta, CodeValidationResult, ComplexityBlock, ComplexityResult, DocSnippet,
    DocumentationMeta, DocumentationResult, ExampleFinderResult, ExampleMeta, FinalAnswer,
    Framework, Language, MAX_KEYWORDS, MIN_BEST_PRACTICES, MIN_LINE_BY_LINE, QueryAnalysis,
    TOPIC_ALIASES, WebResult, canonical_topic,
};
