use swarnam_contracts::{JewelryAnalysis, ScenarioKind, ShotKind};

pub const ANALYSIS_INSTRUCTION: &str = "Analyze this jewelry piece for a luxury fashion app. \
Identify its type, material, style, and write a high-fashion description. Output in JSON.";

/// Wardrobe and setting for a scenario.
pub fn scenario_context(scenario: ScenarioKind) -> &'static str {
    match scenario {
        ScenarioKind::Traditional => {
            "A graceful Indian model in heritage attire such as a Kanjeevaram saree or an \
Anarkali. Setting: a royal palace courtyard in Rajasthan."
        }
        ScenarioKind::Casual => {
            "A modern Indian woman in contemporary Indo-western fusion such as a chic linen \
tunic. Setting: an upscale modern art gallery."
        }
        ScenarioKind::Festive => {
            "A radiant Indian model in grand celebratory wear such as a heavily embroidered \
lehenga. Setting: a Diwali celebration with twinkling lights."
        }
    }
}

/// Camera framing for a shot.
pub fn shot_framing(shot: ShotKind) -> &'static str {
    match shot {
        ShotKind::Closeup => {
            "A high-fashion beauty portrait. Frame the model's face and upper chest so the \
jewelry and facial expression carry the image. Professional studio lighting blended with the \
ambient colors of the setting."
        }
        ShotKind::MidLength => {
            "A mid-length editorial shot. Show the model from the waist up so the jewelry \
reads in context with the full upper-body outfit and the environment."
        }
        ShotKind::ExtremeCloseup => {
            "A macro photograph. Extreme focus on the jewelry itself as worn against the \
model's skin, with the model's features softly blurred behind it (bokeh). Show the detail of \
the stones and the metalwork."
        }
    }
}

/// Text part of a generation request for one (scenario, shot) perspective.
pub fn visualization_prompt(
    analysis: &JewelryAnalysis,
    scenario: ScenarioKind,
    shot: ShotKind,
) -> String {
    format!(
        "A high-end, ultra-realistic fashion magazine editorial photo.\n\
A beautiful Indian model is wearing the jewelry from the reference image.\n\n\
PERSPECTIVE: {perspective}\n\n\
JEWELRY TO RENDER: {kind} made of {material} in {style} style.\n\
DESCRIPTION: {description}.\n\n\
SCENARIO: {setting}\n\n\
TECHNICAL: Cinematic lighting, sharp focus on the jewelry. The jewelry must look exactly like \
the reference provided.",
        perspective = shot_framing(shot),
        kind = analysis.kind,
        material = analysis.material,
        style = analysis.style,
        description = analysis.description,
        setting = scenario_context(scenario),
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn analysis() -> JewelryAnalysis {
        JewelryAnalysis {
            kind: "Necklace".to_string(),
            material: "Gold".to_string(),
            style: "Temple".to_string(),
            description: "Layered temple necklace".to_string(),
        }
    }

    #[test]
    fn prompt_embeds_every_analysis_field() {
        let prompt = visualization_prompt(&analysis(), ScenarioKind::Festive, ShotKind::Closeup);
        assert!(prompt.contains("JEWELRY TO RENDER: Necklace made of Gold in Temple style."));
        assert!(prompt.contains("DESCRIPTION: Layered temple necklace."));
        assert!(prompt.contains(scenario_context(ScenarioKind::Festive)));
        assert!(prompt.contains(shot_framing(ShotKind::Closeup)));
    }

    #[test]
    fn nine_perspectives_are_distinct() {
        let analysis = analysis();
        let prompts: HashSet<String> = ScenarioKind::ALL
            .into_iter()
            .flat_map(|scenario| {
                ShotKind::EXPANSION_ORDER
                    .into_iter()
                    .map(move |shot| (scenario, shot))
            })
            .map(|(scenario, shot)| visualization_prompt(&analysis, scenario, shot))
            .collect();
        assert_eq!(prompts.len(), 9);
    }
}
