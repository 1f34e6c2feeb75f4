use std::fmt;

use serde::Serialize;

use crate::image::ImageRef;
use crate::models::{ExpansionShot, GeneratedResult, JewelryAnalysis};
use crate::scenario::{ScenarioKind, ScenarioMap, ShotKind};

pub const ANALYZING_STATUS: &str = "Analyzing jewelry craftsmanship...";
pub const GENERATING_STATUS: &str = "Generating curated looks...";
pub const ERROR_STATUS: &str = "An error occurred. Please try again.";

/// Identifies one upload. Every remote call captures the token that was live
/// when it was dispatched; completions carrying an older token are dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct UploadToken(u64);

impl fmt::Display for UploadToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Receives a snapshot after every applied transition.
pub trait SessionObserver: Send + Sync {
    fn on_transition(&self, transition: &str, state: &SessionState);
}

/// What `begin_expansion` decided for the requested scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpansionPlan {
    /// No upload, no analysis, or no top-level result for the scenario yet.
    Unavailable,
    /// Shots for the scenario are already being fetched.
    InFlight,
    /// Every shot is already present; nothing to dispatch.
    Cached,
    Fetch(ExpansionJob),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpansionJob {
    pub token: UploadToken,
    pub scenario: ScenarioKind,
    pub image: ImageRef,
    pub analysis: JewelryAnalysis,
    /// Shots still missing, in expansion order.
    pub shots: Vec<ShotKind>,
}

/// The single mutable aggregate rendered by the presentation layer.
///
/// Fields are only written through the transition methods below; each one
/// lists the keys it touches. Completion transitions take the token of the
/// upload they were dispatched for and return `false` without touching
/// anything when that upload has been superseded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    upload_token: UploadToken,
    uploaded_image: Option<ImageRef>,
    analysis: Option<JewelryAnalysis>,
    results: ScenarioMap<Option<GeneratedResult>>,
    loading_scenarios: ScenarioMap<bool>,
    expansion_results: ScenarioMap<Option<Vec<ExpansionShot>>>,
    loading_expansion: ScenarioMap<bool>,
    is_analyzing: bool,
    status: String,
    selected_expansion_scenario: Option<ScenarioKind>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upload_token(&self) -> UploadToken {
        self.upload_token
    }

    pub fn uploaded_image(&self) -> Option<&ImageRef> {
        self.uploaded_image.as_ref()
    }

    pub fn analysis(&self) -> Option<&JewelryAnalysis> {
        self.analysis.as_ref()
    }

    pub fn results(&self) -> &ScenarioMap<Option<GeneratedResult>> {
        &self.results
    }

    pub fn loading_scenarios(&self) -> &ScenarioMap<bool> {
        &self.loading_scenarios
    }

    pub fn expansion_results(&self) -> &ScenarioMap<Option<Vec<ExpansionShot>>> {
        &self.expansion_results
    }

    pub fn loading_expansion(&self) -> &ScenarioMap<bool> {
        &self.loading_expansion
    }

    pub fn is_analyzing(&self) -> bool {
        self.is_analyzing
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn selected_expansion_scenario(&self) -> Option<ScenarioKind> {
        self.selected_expansion_scenario
    }

    pub fn is_current(&self, token: UploadToken) -> bool {
        self.upload_token == token
    }

    /// True once no top-level generation is in flight.
    pub fn fan_out_settled(&self) -> bool {
        self.loading_scenarios.iter().all(|(_, loading)| !loading)
    }

    pub fn expansion_shots(&self, scenario: ScenarioKind) -> &[ExpansionShot] {
        self.expansion_results[scenario].as_deref().unwrap_or(&[])
    }

    /// Touches every key: drops the previous upload wholesale and issues a
    /// fresh token.
    pub fn begin_upload(&mut self, image: ImageRef) -> UploadToken {
        let token = UploadToken(self.upload_token.0 + 1);
        *self = Self {
            upload_token: token,
            uploaded_image: Some(image),
            is_analyzing: true,
            status: ANALYZING_STATUS.to_string(),
            ..Self::default()
        };
        token
    }

    /// Touches `analysis`, `is_analyzing`, `status`, `loading_scenarios`.
    pub fn on_analysis_complete(&mut self, token: UploadToken, analysis: JewelryAnalysis) -> bool {
        if !self.is_current(token) || !self.is_analyzing {
            return false;
        }
        self.analysis = Some(analysis);
        self.is_analyzing = false;
        self.status = GENERATING_STATUS.to_string();
        self.loading_scenarios = ScenarioMap::from_fn(|_| true);
        true
    }

    /// Touches `is_analyzing`, `status`. The uploaded image stays visible.
    pub fn on_analysis_failed(&mut self, token: UploadToken) -> bool {
        if !self.is_current(token) || !self.is_analyzing {
            return false;
        }
        self.is_analyzing = false;
        self.status = ERROR_STATUS.to_string();
        true
    }

    /// Touches `results[scenario]`, `loading_scenarios[scenario]`.
    pub fn on_scenario_result(&mut self, token: UploadToken, result: GeneratedResult) -> bool {
        let scenario = result.scenario;
        if !self.is_current(token)
            || !self.loading_scenarios[scenario]
            || self.results[scenario].is_some()
        {
            return false;
        }
        self.results[scenario] = Some(result);
        self.loading_scenarios[scenario] = false;
        true
    }

    /// Touches `loading_scenarios[scenario]` only; the slot stays empty and
    /// the shared status is left alone.
    pub fn on_scenario_failed(&mut self, token: UploadToken, scenario: ScenarioKind) -> bool {
        if !self.is_current(token) || !self.loading_scenarios[scenario] {
            return false;
        }
        self.loading_scenarios[scenario] = false;
        true
    }

    /// Touches `selected_expansion_scenario`, and `loading_expansion[scenario]`
    /// when shots need fetching.
    pub fn begin_expansion(&mut self, scenario: ScenarioKind) -> ExpansionPlan {
        let (Some(image), Some(analysis)) = (self.uploaded_image.as_ref(), self.analysis.as_ref())
        else {
            return ExpansionPlan::Unavailable;
        };
        if self.results[scenario].is_none() {
            return ExpansionPlan::Unavailable;
        }

        let fetched = self.expansion_shots(scenario).len();
        let missing = ShotKind::EXPANSION_ORDER[fetched.min(ShotKind::EXPANSION_ORDER.len())..].to_vec();
        let job = ExpansionJob {
            token: self.upload_token,
            scenario,
            image: image.clone(),
            analysis: analysis.clone(),
            shots: missing,
        };

        self.selected_expansion_scenario = Some(scenario);
        if self.loading_expansion[scenario] {
            return ExpansionPlan::InFlight;
        }
        if job.shots.is_empty() {
            return ExpansionPlan::Cached;
        }
        self.loading_expansion[scenario] = true;
        ExpansionPlan::Fetch(job)
    }

    /// Touches `expansion_results[scenario]`. Only the next shot in expansion
    /// order is accepted, so the sequence only ever grows by one.
    pub fn on_expansion_shot(
        &mut self,
        token: UploadToken,
        scenario: ScenarioKind,
        shot: ExpansionShot,
    ) -> bool {
        if !self.is_current(token) || !self.loading_expansion[scenario] {
            return false;
        }
        let fetched = self.expansion_shots(scenario).len();
        if ShotKind::EXPANSION_ORDER.get(fetched) != Some(&shot.kind) {
            return false;
        }
        self.expansion_results[scenario]
            .get_or_insert_with(Vec::new)
            .push(shot);
        true
    }

    /// Touches `loading_expansion[scenario]`, `status`.
    pub fn on_expansion_failed(&mut self, token: UploadToken, scenario: ScenarioKind) -> bool {
        if !self.is_current(token) || !self.loading_expansion[scenario] {
            return false;
        }
        self.loading_expansion[scenario] = false;
        self.status = ERROR_STATUS.to_string();
        true
    }

    /// Touches `loading_expansion[scenario]`.
    pub fn on_expansion_finished(&mut self, token: UploadToken, scenario: ScenarioKind) -> bool {
        if !self.is_current(token) || !self.loading_expansion[scenario] {
            return false;
        }
        self.loading_expansion[scenario] = false;
        true
    }

    /// Touches `selected_expansion_scenario`. Fetched or in-flight shots are
    /// kept for a later reopen.
    pub fn close_expansion(&mut self) -> bool {
        self.selected_expansion_scenario.take().is_some()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;

    fn image() -> ImageRef {
        ImageRef::parse("data:image/png;base64,AAAA")
    }

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
            id: format!("1-{}", scenario.slug()),
            scenario,
            image_url: ImageRef::parse("data:image/png;base64,BBBB"),
            prompt: scenario.label().to_string(),
        }
    }

    fn shot(kind: ShotKind) -> ExpansionShot {
        ExpansionShot {
            kind,
            image_url: ImageRef::parse("data:image/png;base64,CCCC"),
        }
    }

    fn ready_state() -> (SessionState, UploadToken) {
        let mut state = SessionState::new();
        let token = state.begin_upload(image());
        assert!(state.on_analysis_complete(token, analysis()));
        for scenario in ScenarioKind::ALL {
            assert!(state.on_scenario_result(token, result(scenario)));
        }
        (state, token)
    }

    #[test]
    fn begin_upload_resets_previous_upload() {
        let (mut state, first) = ready_state();
        let ExpansionPlan::Fetch(_) = state.begin_expansion(ScenarioKind::Casual) else {
            panic!("expected a fetch plan");
        };
        assert!(state.on_expansion_shot(first, ScenarioKind::Casual, shot(ShotKind::Closeup)));

        let second = state.begin_upload(image());
        assert!(second > first);
        assert!(state.analysis().is_none());
        assert!(state.results().iter().all(|(_, slot)| slot.is_none()));
        assert!(state.expansion_results().iter().all(|(_, slot)| slot.is_none()));
        assert!(state.loading_scenarios().iter().all(|(_, flag)| !flag));
        assert!(state.loading_expansion().iter().all(|(_, flag)| !flag));
        assert_eq!(state.selected_expansion_scenario(), None);
        assert!(state.is_analyzing());
        assert_eq!(state.status(), ANALYZING_STATUS);
    }

    #[test]
    fn analysis_complete_marks_every_scenario_loading() {
        let mut state = SessionState::new();
        let token = state.begin_upload(image());
        assert!(state.on_analysis_complete(token, analysis()));
        assert!(!state.is_analyzing());
        assert_eq!(state.status(), GENERATING_STATUS);
        assert!(state.loading_scenarios().iter().all(|(_, flag)| *flag));
    }

    #[test]
    fn analysis_failure_keeps_uploaded_image() {
        let mut state = SessionState::new();
        let token = state.begin_upload(image());
        assert!(state.on_analysis_failed(token));
        assert!(!state.is_analyzing());
        assert_eq!(state.status(), ERROR_STATUS);
        assert_eq!(state.uploaded_image(), Some(&image()));
        assert!(state.loading_scenarios().iter().all(|(_, flag)| !flag));
    }

    #[test]
    fn result_is_written_at_most_once() {
        let mut state = SessionState::new();
        let token = state.begin_upload(image());
        state.on_analysis_complete(token, analysis());
        assert!(state.on_scenario_result(token, result(ScenarioKind::Festive)));

        let mut replacement = result(ScenarioKind::Festive);
        replacement.id = "other".to_string();
        assert!(!state.on_scenario_result(token, replacement));
        assert_eq!(
            state.results()[ScenarioKind::Festive]
                .as_ref()
                .map(|res| res.id.as_str()),
            Some("1-festive")
        );
    }

    #[test]
    fn scenario_failure_leaves_slot_empty_and_status_alone() {
        let mut state = SessionState::new();
        let token = state.begin_upload(image());
        state.on_analysis_complete(token, analysis());
        assert!(state.on_scenario_failed(token, ScenarioKind::Casual));
        assert!(state.results()[ScenarioKind::Casual].is_none());
        assert!(!state.loading_scenarios()[ScenarioKind::Casual]);
        assert!(state.loading_scenarios()[ScenarioKind::Traditional]);
        assert_eq!(state.status(), GENERATING_STATUS);
    }

    #[test]
    fn settling_the_fan_out_leaves_status_unchanged() {
        let mut state = SessionState::new();
        let token = state.begin_upload(image());
        state.on_analysis_complete(token, analysis());
        state.on_scenario_result(token, result(ScenarioKind::Traditional));
        state.on_scenario_failed(token, ScenarioKind::Casual);
        assert!(!state.fan_out_settled());
        let before = state.status().to_string();
        assert!(state.on_scenario_failed(token, ScenarioKind::Festive));
        assert!(state.fan_out_settled());
        assert_eq!(state.status(), before);
        assert_eq!(state.status(), GENERATING_STATUS);
    }

    #[test]
    fn stale_completions_are_rejected() {
        let mut state = SessionState::new();
        let old = state.begin_upload(image());
        state.on_analysis_complete(old, analysis());
        let new = state.begin_upload(image());

        assert!(!state.on_scenario_result(old, result(ScenarioKind::Traditional)));
        assert!(!state.on_scenario_failed(old, ScenarioKind::Traditional));
        assert!(!state.on_analysis_complete(old, analysis()));
        assert!(!state.on_analysis_failed(old));
        assert!(state.results()[ScenarioKind::Traditional].is_none());
        assert!(state.is_current(new));
        assert!(state.is_analyzing());
    }

    #[test]
    fn stale_expansion_completions_are_rejected() {
        let (mut state, old) = ready_state();
        let ExpansionPlan::Fetch(job) = state.begin_expansion(ScenarioKind::Festive) else {
            panic!("expected a fetch plan");
        };
        assert_eq!(job.token, old);
        assert!(state.on_expansion_shot(old, ScenarioKind::Festive, shot(ShotKind::Closeup)));

        let new = state.begin_upload(image());
        assert!(!state.on_expansion_shot(old, ScenarioKind::Festive, shot(ShotKind::Closeup)));
        assert!(!state.on_expansion_shot(old, ScenarioKind::Festive, shot(ShotKind::MidLength)));
        assert!(!state.on_expansion_failed(old, ScenarioKind::Festive));
        assert!(!state.on_expansion_finished(old, ScenarioKind::Festive));

        assert!(state.is_current(new));
        assert!(state.expansion_shots(ScenarioKind::Festive).is_empty());
        assert!(state.expansion_results()[ScenarioKind::Festive].is_none());
        assert!(!state.loading_expansion()[ScenarioKind::Festive]);
        assert_eq!(state.status(), ANALYZING_STATUS);
    }

    #[test]
    fn expansion_requires_a_completed_result() {
        let mut state = SessionState::new();
        assert_eq!(
            state.begin_expansion(ScenarioKind::Traditional),
            ExpansionPlan::Unavailable
        );

        let token = state.begin_upload(image());
        state.on_analysis_complete(token, analysis());
        state.on_scenario_failed(token, ScenarioKind::Traditional);
        assert_eq!(
            state.begin_expansion(ScenarioKind::Traditional),
            ExpansionPlan::Unavailable
        );
        assert_eq!(state.selected_expansion_scenario(), None);
    }

    #[test]
    fn expansion_shots_only_append_in_order() {
        let (mut state, token) = ready_state();
        let ExpansionPlan::Fetch(job) = state.begin_expansion(ScenarioKind::Festive) else {
            panic!("expected a fetch plan");
        };
        assert_eq!(job.shots, ShotKind::EXPANSION_ORDER.to_vec());
        assert_eq!(state.selected_expansion_scenario(), Some(ScenarioKind::Festive));
        assert!(state.loading_expansion()[ScenarioKind::Festive]);

        assert!(!state.on_expansion_shot(token, ScenarioKind::Festive, shot(ShotKind::MidLength)));
        assert!(state.expansion_results()[ScenarioKind::Festive].is_none());
        assert!(state.on_expansion_shot(token, ScenarioKind::Festive, shot(ShotKind::Closeup)));
        assert!(!state.on_expansion_shot(token, ScenarioKind::Festive, shot(ShotKind::Closeup)));
        assert!(state.on_expansion_shot(token, ScenarioKind::Festive, shot(ShotKind::MidLength)));
        assert_eq!(state.expansion_shots(ScenarioKind::Festive).len(), 2);
    }

    #[test]
    fn expansion_failure_sets_error_status_and_keeps_shots() {
        let (mut state, token) = ready_state();
        state.begin_expansion(ScenarioKind::Casual);
        state.on_expansion_shot(token, ScenarioKind::Casual, shot(ShotKind::Closeup));
        assert!(state.on_expansion_failed(token, ScenarioKind::Casual));
        assert_eq!(state.status(), ERROR_STATUS);
        assert!(!state.loading_expansion()[ScenarioKind::Casual]);
        assert_eq!(state.expansion_shots(ScenarioKind::Casual).len(), 1);

        let ExpansionPlan::Fetch(job) = state.begin_expansion(ScenarioKind::Casual) else {
            panic!("expected a resumed fetch plan");
        };
        assert_eq!(job.shots, vec![ShotKind::MidLength, ShotKind::ExtremeCloseup]);
    }

    #[test]
    fn reopening_a_complete_expansion_is_cached() {
        let (mut state, token) = ready_state();
        state.begin_expansion(ScenarioKind::Traditional);
        for kind in ShotKind::EXPANSION_ORDER {
            state.on_expansion_shot(token, ScenarioKind::Traditional, shot(kind));
        }
        assert!(state.on_expansion_finished(token, ScenarioKind::Traditional));
        assert!(state.close_expansion());
        assert!(!state.close_expansion());

        assert_eq!(
            state.begin_expansion(ScenarioKind::Traditional),
            ExpansionPlan::Cached
        );
        assert_eq!(
            state.selected_expansion_scenario(),
            Some(ScenarioKind::Traditional)
        );
        assert_eq!(state.expansion_shots(ScenarioKind::Traditional).len(), 3);
    }

    #[test]
    fn reselecting_while_fetching_does_not_start_another_fetch() {
        let (mut state, _) = ready_state();
        state.begin_expansion(ScenarioKind::Casual);
        state.close_expansion();
        assert_eq!(
            state.begin_expansion(ScenarioKind::Casual),
            ExpansionPlan::InFlight
        );
        assert!(state.loading_expansion()[ScenarioKind::Casual]);
    }

    #[test]
    fn snapshot_uses_presentation_field_names() -> anyhow::Result<()> {
        let (state, _) = ready_state();
        let value = serde_json::to_value(&state)?;
        for key in [
            "uploadedImage",
            "analysis",
            "results",
            "loadingScenarios",
            "expansionResults",
            "loadingExpansion",
            "isAnalyzing",
            "status",
            "selectedExpansionScenario",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert_eq!(value["expansionResults"]["Casual"], Value::Null);
        assert_eq!(value["results"]["Festive"]["prompt"], "Festive");
        Ok(())
    }
}
