use serde::{Deserialize, Serialize};

use crate::image::ImageRef;
use crate::scenario::{ScenarioKind, ShotKind};

/// Structured description of an uploaded jewelry piece.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JewelryAnalysis {
    #[serde(rename = "type")]
    pub kind: String,
    pub material: String,
    pub style: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedResult {
    pub id: String,
    pub scenario: ScenarioKind,
    pub image_url: ImageRef,
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpansionShot {
    #[serde(rename = "type")]
    pub kind: ShotKind,
    pub image_url: ImageRef,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ExpansionShot, JewelryAnalysis};
    use crate::image::ImageRef;
    use crate::scenario::ShotKind;

    #[test]
    fn analysis_reads_service_field_names() -> anyhow::Result<()> {
        let analysis: JewelryAnalysis = serde_json::from_value(json!({
            "type": "Necklace",
            "material": "Gold",
            "style": "Temple",
            "description": "Layered temple necklace."
        }))?;
        assert_eq!(analysis.kind, "Necklace");
        assert_eq!(analysis.style, "Temple");
        Ok(())
    }

    #[test]
    fn analysis_missing_field_is_rejected() {
        let parsed = serde_json::from_value::<JewelryAnalysis>(json!({
            "type": "Ring",
            "material": "Silver"
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn shot_serializes_with_presentation_keys() -> anyhow::Result<()> {
        let shot = ExpansionShot {
            kind: ShotKind::ExtremeCloseup,
            image_url: ImageRef::parse("data:image/png;base64,AA"),
        };
        assert_eq!(
            serde_json::to_value(&shot)?,
            json!({"type": "Extreme Close-up", "imageUrl": "data:image/png;base64,AA"})
        );
        Ok(())
    }
}
