//! The four pipeline agents.
//!
//! Every agent turns one validated contract into another through the single
//! [`Agent::execute`] capability. The orchestrator only sees this trait.

use async_trait::async_trait;

use explainer_shared::Result;

pub mod code_explainer;
pub mod doc_reader;
pub mod example_finder;
pub mod query_analyzer;

pub use code_explainer::{CodeExplainerAgent, SynthesisRequest};
pub use doc_reader::DocReaderAgent;
pub use example_finder::ExampleFinderAgent;
pub use query_analyzer::QueryAnalyzerAgent;

#[async_trait]
pub trait Agent: Send + Sync {
    type Input: ?Sized + Sync;
    type Output: Send;

    /// Stage name used in logs and contract errors.
    fn name(&self) -> &'static str;

    async fn execute(&self, input: &Self::Input) -> Result<Self::Output>;
}
