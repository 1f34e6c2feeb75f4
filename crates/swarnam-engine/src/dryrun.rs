use std::io::Cursor;
use std::thread;
use std::time::Duration;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use sha2::{Digest, Sha256};
use swarnam_contracts::{ImageRef, JewelryAnalysis};

use crate::client::{AnalysisClient, VisualizationClient, VisualizationRequest};
use crate::error::{AnalysisFailure, GenerationFailure};
use crate::prompts::visualization_prompt;

const KINDS: [&str; 5] = ["Necklace", "Earrings", "Bangle", "Ring", "Pendant"];
const MATERIALS: [&str; 4] = ["Gold", "Silver", "Platinum", "Rose gold"];
const STYLES: [&str; 4] = ["Temple", "Kundan", "Polki", "Contemporary"];

/// Offline stand-in for the inference service.
///
/// Analysis is derived from a fingerprint of the upload and every generated
/// image is a solid-color PNG seeded by the request prompt, so identical
/// requests render identical images.
#[derive(Debug, Clone)]
pub struct DryrunService {
    width: u32,
    height: u32,
    latency: Duration,
}

impl Default for DryrunService {
    fn default() -> Self {
        Self {
            width: 96,
            height: 128,
            latency: Duration::ZERO,
        }
    }
}

impl DryrunService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps before answering each call, to make in-flight states observable.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn wait(&self) {
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
    }
}

impl AnalysisClient for DryrunService {
    fn analyze(&self, image: &ImageRef) -> Result<JewelryAnalysis, AnalysisFailure> {
        self.wait();
        let digest = Sha256::digest(image.base64_payload().as_bytes());
        let kind = pick(&KINDS, digest[0]);
        let material = pick(&MATERIALS, digest[1]);
        let style = pick(&STYLES, digest[2]);
        let description = format!(
            "Dryrun piece {}: a {} {} crafted in {}.",
            hex::encode(&digest[..4]),
            style.to_ascii_lowercase(),
            kind.to_ascii_lowercase(),
            material.to_ascii_lowercase()
        );
        Ok(JewelryAnalysis {
            kind,
            material,
            style,
            description,
        })
    }
}

impl VisualizationClient for DryrunService {
    fn generate(&self, request: &VisualizationRequest<'_>) -> Result<ImageRef, GenerationFailure> {
        self.wait();
        let prompt = visualization_prompt(request.analysis, request.scenario, request.shot);
        let (r, g, b) = color_from_prompt(&prompt, request.image.base64_payload());
        let mut canvas = RgbImage::new(self.width, self.height);
        for pixel in canvas.pixels_mut() {
            *pixel = Rgb([r, g, b]);
        }
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(canvas).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(ImageRef::from_bytes("image/png", &bytes))
    }
}

fn pick(options: &[&str], byte: u8) -> String {
    options[byte as usize % options.len()].to_string()
}

fn color_from_prompt(prompt: &str, source: &str) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hasher.update(source.as_bytes());
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}
