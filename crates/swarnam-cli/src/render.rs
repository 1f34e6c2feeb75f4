use std::fmt::Write as _;

use swarnam_contracts::{ScenarioKind, SessionState, ShotKind};

const RENDERING_SHOT: &str = "Rendering Shot Perspective...";
const PENDING_SHOT: &str = "Pending Generation";
const GENERATION_FAILED: &str = "Generation Failed";

fn shot_caption(shot: ShotKind) -> &'static str {
    match shot {
        ShotKind::Closeup => {
            "Focus on facial harmony and primary jewelry piece with beauty lighting."
        }
        ShotKind::MidLength => {
            "Full editorial context showing the ensemble and curated environment."
        }
        ShotKind::ExtremeCloseup => {
            "Macro detail of craftsmanship, gemstone clarity, and metallic texture as worn."
        }
    }
}

/// Renders the gallery view of one snapshot as plain text.
pub fn render_state(state: &SessionState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "SWARNAM | AI Luxury Visualization Suite");

    match state.uploaded_image() {
        Some(image) => {
            let _ = writeln!(
                out,
                "Upload #{} ({})",
                state.upload_token(),
                image.mime_type()
            );
        }
        None => {
            let _ = writeln!(out, "No upload yet.");
        }
    }
    if !state.status().is_empty() {
        let _ = writeln!(out, "Status: {}", state.status());
    }

    if let Some(analysis) = state.analysis() {
        let _ = writeln!(
            out,
            "Piece: {} | {} | {}",
            analysis.kind, analysis.material, analysis.style
        );
        let _ = writeln!(out, "  {}", analysis.description);
        let _ = writeln!(out, "Curated Visualizations");
        for scenario in ScenarioKind::ALL {
            let _ = writeln!(out, "  [{scenario}] {}", card_text(state, scenario));
        }
        let any_ready = state.results().iter().any(|(_, slot)| slot.is_some());
        if state.fan_out_settled() && any_ready {
            let _ = writeln!(out, "Expand a look to see portfolio details.");
        }
    }

    if let Some(scenario) = state.selected_expansion_scenario() {
        render_expansion(&mut out, state, scenario);
    }
    out
}

fn card_text(state: &SessionState, scenario: ScenarioKind) -> String {
    if state.loading_scenarios()[scenario] {
        return format!("Styling {scenario}...");
    }
    match state.results()[scenario].as_ref() {
        Some(result) => format!("ready ({})", result.id),
        None => GENERATION_FAILED.to_string(),
    }
}

fn render_expansion(out: &mut String, state: &SessionState, scenario: ScenarioKind) {
    let _ = writeln!(out, "{scenario} Portfolio");
    let shots = state.expansion_shots(scenario);
    let generating = state.loading_expansion()[scenario];
    for (idx, shot) in ShotKind::EXPANSION_ORDER.into_iter().enumerate() {
        let fetched = shots.iter().find(|candidate| candidate.kind == shot);
        let body = match fetched {
            Some(found) => format!("ready ({})", found.image_url.mime_type()),
            None if generating => RENDERING_SHOT.to_string(),
            None => PENDING_SHOT.to_string(),
        };
        let _ = writeln!(out, "  0{} {shot}: {body}", idx + 1);
        let _ = writeln!(out, "     {}", shot_caption(shot));
    }
}

/// One-line progress summary printed after each transition.
pub fn transition_line(transition: &str, state: &SessionState) -> String {
    let ready = state
        .results()
        .iter()
        .filter(|(_, slot)| slot.is_some())
        .count();
    let styling = state
        .loading_scenarios()
        .iter()
        .filter(|(_, loading)| **loading)
        .count();
    let mut line = format!(
        "[{transition}] upload #{}: {ready} ready, {styling} styling",
        state.upload_token()
    );
    if let Some(scenario) = state.selected_expansion_scenario() {
        let _ = write!(
            line,
            ", {scenario} portfolio {}/{}",
            state.expansion_shots(scenario).len(),
            ShotKind::EXPANSION_ORDER.len()
        );
    }
    if !state.status().is_empty() {
        let _ = write!(line, " ({})", state.status());
    }
    line
}

#[cfg(test)]
mod tests {
    use swarnam_contracts::{
        ExpansionPlan, ExpansionShot, GeneratedResult, ImageRef, JewelryAnalysis, ScenarioKind,
        SessionState, ShotKind, ERROR_STATUS, GENERATING_STATUS,
    };

    use super::{render_state, transition_line};

    fn analysis() -> JewelryAnalysis {
        JewelryAnalysis {
            kind: "Necklace".to_string(),
            material: "Gold".to_string(),
            style: "Temple".to_string(),
            description: "Layered temple necklace.".to_string(),
        }
    }

    fn result(scenario: ScenarioKind) -> GeneratedResult {
        GeneratedResult {
            id: format!("1-1-{}", scenario.slug()),
            scenario,
            image_url: ImageRef::parse("data:image/png;base64,AAAA"),
            prompt: scenario.label().to_string(),
        }
    }

    #[test]
    fn empty_session_invites_an_upload() {
        let text = render_state(&SessionState::new());
        assert!(text.contains("No upload yet."));
        assert!(!text.contains("Curated Visualizations"));
    }

    #[test]
    fn cards_show_styling_ready_and_failed() {
        let mut state = SessionState::new();
        let token = state.begin_upload(ImageRef::parse("data:image/jpeg;base64,AAAA"));
        assert!(state.on_analysis_complete(token, analysis()));
        assert!(state.on_scenario_result(token, result(ScenarioKind::Traditional)));
        assert!(state.on_scenario_failed(token, ScenarioKind::Casual));

        let text = render_state(&state);
        assert!(text.contains("Upload #1 (image/jpeg)"));
        assert!(text.contains(&format!("Status: {GENERATING_STATUS}")));
        assert!(text.contains("Piece: Necklace | Gold | Temple"));
        assert!(text.contains("[Traditional] ready (1-1-traditional)"));
        assert!(!text.contains("Expand a look"));
        assert!(text.contains("[Casual] Generation Failed"));
        assert!(text.contains("[Festive] Styling Festive..."));
    }

    #[test]
    fn settled_gallery_keeps_status_and_suggests_expanding() {
        let mut state = SessionState::new();
        let token = state.begin_upload(ImageRef::parse("data:image/jpeg;base64,AAAA"));
        assert!(state.on_analysis_complete(token, analysis()));
        assert!(state.on_scenario_result(token, result(ScenarioKind::Traditional)));
        assert!(state.on_scenario_failed(token, ScenarioKind::Casual));
        assert!(state.on_scenario_result(token, result(ScenarioKind::Festive)));

        let text = render_state(&state);
        assert!(text.contains("[Festive] ready (1-1-festive)"));
        assert!(text.contains("Expand a look to see portfolio details."));
        assert!(text.contains(&format!("Status: {GENERATING_STATUS}")));
    }

    #[test]
    fn overlay_marks_missing_shots_while_generating() {
        let mut state = SessionState::new();
        let token = state.begin_upload(ImageRef::parse("data:image/jpeg;base64,AAAA"));
        assert!(state.on_analysis_complete(token, analysis()));
        assert!(state.on_scenario_result(token, result(ScenarioKind::Festive)));
        assert!(matches!(
            state.begin_expansion(ScenarioKind::Festive),
            ExpansionPlan::Fetch(_)
        ));
        assert!(state.on_expansion_shot(
            token,
            ScenarioKind::Festive,
            ExpansionShot {
                kind: ShotKind::Closeup,
                image_url: ImageRef::parse("data:image/png;base64,AAAA"),
            }
        ));

        let text = render_state(&state);
        assert!(text.contains("Festive Portfolio"));
        assert!(text.contains("01 Closeup: ready (image/png)"));
        assert!(text.contains("02 Mid-length: Rendering Shot Perspective..."));
        assert!(text.contains("03 Extreme Close-up: Rendering Shot Perspective..."));

        assert!(state.on_expansion_failed(token, ScenarioKind::Festive));
        let text = render_state(&state);
        assert!(text.contains("02 Mid-length: Pending Generation"));
        assert!(text.contains(&format!("Status: {ERROR_STATUS}")));
    }

    #[test]
    fn transition_line_counts_progress() {
        let mut state = SessionState::new();
        let token = state.begin_upload(ImageRef::parse("AAAA"));
        assert!(state.on_analysis_complete(token, analysis()));
        assert!(state.on_scenario_result(token, result(ScenarioKind::Casual)));
        assert_eq!(
            transition_line("scenario_generated", &state),
            format!("[scenario_generated] upload #1: 1 ready, 2 styling ({GENERATING_STATUS})")
        );
    }
}
