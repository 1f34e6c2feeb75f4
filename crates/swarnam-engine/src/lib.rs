pub mod client;
pub mod dryrun;
pub mod error;
pub mod gemini;
pub mod orchestrator;
pub mod prompts;

pub use client::{AnalysisClient, VisualizationClient, VisualizationRequest};
pub use dryrun::DryrunService;
pub use error::{error_chain_text, AnalysisFailure, GenerationFailure, InferenceError};
pub use gemini::{GeminiConfig, GeminiService};
pub use orchestrator::{ExpansionOutcome, Orchestrator, ScenarioOutcome, UploadOutcome};
