//! Core pipeline for the explainer: agents, JSON extraction, repair
//! escalation, answer normalization and orchestration.
//!
//! The crate only talks to collaborators through the ports in
//! `explainer-shared`; concrete backends are wired in by the server binary.

pub mod agents;
pub mod extract;
pub mod fallbacks;
pub mod normalize;
pub mod pipeline;
pub mod prompts;
pub mod repair;

#[cfg(test)]
pub(crate) mod testing;

pub use agents::{Agent, SynthesisRequest};
pub use extract::{ExtractionError, extract_json_object};
pub use pipeline::{Collaborators, Orchestrator, ProgressReporter, SilentProgress};
pub use repair::RepairStage;
