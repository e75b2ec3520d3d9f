//! Stage 3: synthesize the [`FinalAnswer`] from every prior contract.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};

use explainer_shared::{
    CodeValidationResult, ComplexityResult, DocumentationResult, ExampleFinderResult, FinalAnswer,
    ModelSelector, QueryAnalysis, ReasoningDepth, Result, TaskType, TextGenerator,
};

use super::Agent;
use crate::fallbacks;
use crate::normalize::{NormalizeContext, normalize_answer};
use crate::prompts::{self, SynthesisContext};
use crate::repair::RepairLadder;

/// Extra length budgeted for the context quoted alongside the question.
const CONTEXT_LENGTH_ALLOWANCE: usize = 500;

/// Everything synthesis consumes, owned by the orchestrator for one request.
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub query: String,
    pub analysis: QueryAnalysis,
    pub documentation: DocumentationResult,
    pub examples: ExampleFinderResult,
    pub validation: CodeValidationResult,
    pub complexity: ComplexityResult,
}

pub struct CodeExplainerAgent {
    generator: Arc<dyn TextGenerator>,
    selector: Arc<dyn ModelSelector>,
}

impl CodeExplainerAgent {
    pub fn new(generator: Arc<dyn TextGenerator>, selector: Arc<dyn ModelSelector>) -> Self {
        Self {
            generator,
            selector,
        }
    }
}

#[async_trait]
impl Agent for CodeExplainerAgent {
    type Input = SynthesisRequest;
    type Output = FinalAnswer;

    fn name(&self) -> &'static str {
        FinalAnswer::STAGE
    }

    #[instrument(skip_all, fields(stage = FinalAnswer::STAGE, topic = %request.analysis.topic))]
    async fn execute(&self, request: &SynthesisRequest) -> Result<FinalAnswer> {
        let framework = request.analysis.framework;
        let topic = request.analysis.topic.trim();
        let topic = if topic.is_empty() { "unknown" } else { topic };

        let model = self.selector.select_model(
            TaskType::Explain,
            request.query.chars().count() + CONTEXT_LENGTH_ALLOWANCE,
            ReasoningDepth::Deep,
        );

        let code_rule = fallbacks::code_rule(topic, framework);
        let prompt = prompts::synthesis(&SynthesisContext {
            query: &request.query,
            framework,
            topic,
            code_rule: &code_rule,
            documentation: &request.documentation,
            examples: &request.examples,
            validation: &request.validation,
            complexity: &request.complexity,
        });

        let outcome = RepairLadder::new(self.generator.as_ref(), &model, framework, topic)
            .run(&prompt)
            .await?;

        let answer = normalize_answer(
            outcome.data,
            &NormalizeContext {
                framework,
                topic,
                examples: &request.examples,
                stage: outcome.stage,
            },
        );
        info!(
            parse_stage = %outcome.stage,
            calls = outcome.calls,
            sources = answer.sources.len(),
            "answer synthesized"
        );
        Ok(answer)
    }
}
