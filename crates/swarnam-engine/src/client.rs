use swarnam_contracts::{ImageRef, JewelryAnalysis, ScenarioKind, ShotKind};

use crate::error::{AnalysisFailure, GenerationFailure};

/// The "analyze image" capability of the inference service.
pub trait AnalysisClient: Send + Sync {
    fn analyze(&self, image: &ImageRef) -> Result<JewelryAnalysis, AnalysisFailure>;
}

/// The "generate image" capability of the inference service.
pub trait VisualizationClient: Send + Sync {
    fn generate(&self, request: &VisualizationRequest<'_>) -> Result<ImageRef, GenerationFailure>;
}

#[derive(Debug, Clone, Copy)]
pub struct VisualizationRequest<'a> {
    pub image: &'a ImageRef,
    pub analysis: &'a JewelryAnalysis,
    pub scenario: ScenarioKind,
    pub shot: ShotKind,
}

impl<'a> VisualizationRequest<'a> {
    pub fn new(image: &'a ImageRef, analysis: &'a JewelryAnalysis, scenario: ScenarioKind) -> Self {
        Self {
            image,
            analysis,
            scenario,
            shot: ShotKind::default(),
        }
    }

    pub fn with_shot(mut self, shot: ShotKind) -> Self {
        self.shot = shot;
        self
    }
}
