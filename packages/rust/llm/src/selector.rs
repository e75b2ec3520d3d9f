use explainer_shared::{ModelSelector, ModelsConfig, ReasoningDepth, TaskType};
use tracing::debug;

/// Two-tier routing: the powerful model for deep reasoning, explanation
/// tasks and long inputs; the fast model for everything else.
#[derive(Debug, Clone)]
pub struct TieredModelSelector {
    fast: String,
    powerful: String,
    long_input_threshold: usize,
}

impl TieredModelSelector {
    pub fn new(config: &ModelsConfig) -> Self {
        Self {
            fast: config.fast_model.clone(),
            powerful: config.powerful_model.clone(),
            long_input_threshold: config.long_input_threshold,
        }
    }
}

impl ModelSelector for TieredModelSelector {
    fn select_model(&self, task: TaskType, input_length: usize, depth: ReasoningDepth) -> String {
        let powerful = depth == ReasoningDepth::Deep
            || task == TaskType::Explain
            || input_length >= self.long_input_threshold;
        let model = if powerful { &self.powerful } else { &self.fast };
        debug!(task = task.as_str(), input_length, %model, "model selected");
        model.clone()
    }
}
