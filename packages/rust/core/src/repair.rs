//! Escalation ladder for recovering structured output from the synthesis model.
//!
//! `Primary -> Repair -> HardRepair -> Fallback`, strictly forward. At most
//! three backend calls happen before the deterministic fallback object is
//! used. Transport failures from the generator are not malformed output and
//! propagate to the caller.

use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use explainer_shared::{Framework, Result, TextGenerator};

use crate::extract::{ExtractionError, extract_json_object};
use crate::prompts;

const PRIMARY_TEMPERATURE: f32 = 0.1;
const REPAIR_TEMPERATURE: f32 = 0.0;

/// Explanation carried by the fallback object.
pub const FALLBACK_EXPLANATION: &str =
    "Could not parse model output into valid JSON. Please retry.";

/// Ladder state that produced the parsed object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairStage {
    Primary,
    Repair,
    HardRepair,
    Fallback,
}

impl RepairStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Repair => "repair",
            Self::HardRepair => "hard_repair",
            Self::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for RepairStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct RepairOutcome {
    pub data: Map<String, Value>,
    pub stage: RepairStage,
    /// Backend calls made, `1..=3`.
    pub calls: usize,
}

/// Drives one synthesis request through the ladder.
pub struct RepairLadder<'a> {
    generator: &'a dyn TextGenerator,
    model: &'a str,
    framework: Framework,
    topic: &'a str,
}

impl<'a> RepairLadder<'a> {
    pub fn new(
        generator: &'a dyn TextGenerator,
        model: &'a str,
        framework: Framework,
        topic: &'a str,
    ) -> Self {
        Self {
            generator,
            model,
            framework,
            topic,
        }
    }

    pub async fn run(&self, primary_prompt: &str) -> Result<RepairOutcome> {
        let raw = self
            .call(RepairStage::Primary, primary_prompt, PRIMARY_TEMPERATURE)
            .await?;
        let err = match extract_json_object(&raw) {
            Ok(data) => return Ok(self.outcome(data, RepairStage::Primary, 1)),
            Err(e) => e,
        };
        self.log_failure(RepairStage::Primary, &err);

        let prompt = prompts::repair(&raw, self.framework, self.topic);
        let raw = self
            .call(RepairStage::Repair, &prompt, REPAIR_TEMPERATURE)
            .await?;
        let err = match extract_json_object(&raw) {
            Ok(data) => return Ok(self.outcome(data, RepairStage::Repair, 2)),
            Err(e) => e,
        };
        self.log_failure(RepairStage::Repair, &err);

        let prompt = prompts::hard_repair(&raw, self.framework, self.topic);
        let raw = self
            .call(RepairStage::HardRepair, &prompt, REPAIR_TEMPERATURE)
            .await?;
        match extract_json_object(&raw) {
            Ok(data) => Ok(self.outcome(data, RepairStage::HardRepair, 3)),
            Err(err) => {
                self.log_failure(RepairStage::HardRepair, &err);
                Ok(self.outcome(self.fallback_object(), RepairStage::Fallback, 3))
            }
        }
    }

    async fn call(&self, stage: RepairStage, prompt: &str, temperature: f32) -> Result<String> {
        let raw = self
            .generator
            .generate(prompt, self.model, temperature)
            .await?;
        debug!(%stage, model = self.model, raw = %raw, "raw model output");
        Ok(raw)
    }

    fn outcome(&self, data: Map<String, Value>, stage: RepairStage, calls: usize) -> RepairOutcome {
        info!(%stage, calls, "synthesis output parsed");
        RepairOutcome { data, stage, calls }
    }

    fn log_failure(&self, stage: RepairStage, err: &ExtractionError) {
        warn!(%stage, error = %err, "model output was not valid JSON, escalating");
    }

    fn fallback_object(&self) -> Map<String, Value> {
        let value = json!({
            "explanation": FALLBACK_EXPLANATION,
            "code_example": "",
            "line_by_line": [],
            "best_practices": [],
            "sources": [],
            "meta": {"framework": self.framework.as_str(), "topic": self.topic},
        });
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedGenerator;
    use explainer_shared::ExplainerError;

    fn ladder<'a>(generator: &'a ScriptedGenerator) -> RepairLadder<'a> {
        RepairLadder::new(generator, "test-model", Framework::Fastapi, "websocket")
    }

    #[tokio::test]
    async fn parses_on_first_attempt() {
        let generator = ScriptedGenerator::new([r#"Here you go: {"explanation": "ok"}"#]);
        let outcome = ladder(&generator).run("prompt").await.unwrap();

        assert_eq!(outcome.stage, RepairStage::Primary);
        assert_eq!(outcome.calls, 1);
        assert_eq!(generator.calls(), 1);
        assert_eq!(outcome.data["explanation"], "ok");
        assert_eq!(generator.temperatures(), vec![PRIMARY_TEMPERATURE]);
    }

    #[tokio::test]
    async fn repair_prompt_quotes_previous_output() {
        let generator =
            ScriptedGenerator::new(["plain prose answer", r#"{"explanation": "fixed"}"#]);
        let outcome = ladder(&generator).run("prompt").await.unwrap();

        assert_eq!(outcome.stage, RepairStage::Repair);
        assert_eq!(outcome.calls, 2);
        let prompts = generator.prompts();
        assert!(prompts[1].contains("Content:\nplain prose answer"));
        assert_eq!(
            generator.temperatures(),
            vec![PRIMARY_TEMPERATURE, REPAIR_TEMPERATURE]
        );
    }

    #[tokio::test]
    async fn hard_repair_is_third_and_last_call() {
        let generator = ScriptedGenerator::new(["nope", "still nope", r#"{"a": 1}"#]);
        let outcome = ladder(&generator).run("prompt").await.unwrap();

        assert_eq!(outcome.stage, RepairStage::HardRepair);
        assert!(generator.prompts()[2].contains("Content:\nstill nope"));
    }

    #[tokio::test]
    async fn total_failure_uses_fallback_after_three_calls() {
        let generator = ScriptedGenerator::constant("never json");
        let outcome = ladder(&generator).run("prompt").await.unwrap();

        assert_eq!(outcome.stage, RepairStage::Fallback);
        assert_eq!(outcome.calls, 3);
        assert_eq!(generator.calls(), 3);
        assert_eq!(outcome.data["explanation"], FALLBACK_EXPLANATION);
        assert_eq!(outcome.data["meta"]["topic"], "websocket");
        assert_eq!(outcome.data["meta"]["framework"], "fastapi");
    }

    #[tokio::test]
    async fn transport_error_propagates() {
        let generator = ScriptedGenerator::unreachable();
        let err = ladder(&generator).run("prompt").await.unwrap_err();
        assert!(matches!(err, ExplainerError::Generation(_)));
        assert_eq!(generator.calls(), 1);
    }
}
