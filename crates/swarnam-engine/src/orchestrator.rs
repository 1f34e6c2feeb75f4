use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use swarnam_contracts::{
    ExpansionPlan, ExpansionShot, GeneratedResult, ImageRef, JewelryAnalysis, ScenarioKind,
    ScenarioMap, SessionObserver, SessionState, ShotKind, UploadToken,
};
use tracing::{debug, error, info};

use crate::client::{AnalysisClient, VisualizationClient, VisualizationRequest};
use crate::error::{error_chain_text, AnalysisFailure, GenerationFailure};

/// How one top-level scenario generation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioOutcome {
    Generated,
    Failed(String),
    /// Finished after a newer upload started; its result was discarded.
    Superseded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Every scenario generation has finished, one way or another.
    Settled {
        token: UploadToken,
        scenarios: ScenarioMap<ScenarioOutcome>,
    },
    /// A newer upload started before analysis finished; nothing was generated.
    Superseded { token: UploadToken },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpansionOutcome {
    /// Nothing to expand yet for this scenario.
    Unavailable,
    /// Another caller is already fetching this scenario's shots.
    InFlight,
    /// All shots were fetched earlier; nothing was dispatched.
    Cached,
    Completed { fetched: usize },
    Superseded { fetched: usize },
}

struct SharedSession {
    state: Mutex<SessionState>,
    observer: Option<Arc<dyn SessionObserver>>,
}

impl SharedSession {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs one transition under the lock and, when it applied, hands the
    /// resulting snapshot to the observer before releasing the lock.
    fn apply<R>(&self, transition: &str, change: impl FnOnce(&mut SessionState) -> (R, bool)) -> R {
        let mut state = self.lock();
        let (out, applied) = change(&mut state);
        if applied {
            if let Some(observer) = self.observer.as_ref() {
                observer.on_transition(transition, &state);
            }
        }
        out
    }

    fn transition(&self, name: &str, change: impl FnOnce(&mut SessionState) -> bool) -> bool {
        self.apply(name, |state| {
            let applied = change(state);
            (applied, applied)
        })
    }
}

/// Drives analysis, the three-way scenario fan-out and per-scenario
/// expansions against a single shared session.
///
/// Clones share the session, so intents may be issued from several threads;
/// a new upload supersedes whatever the previous one still has in flight.
#[derive(Clone)]
pub struct Orchestrator {
    analysis: Arc<dyn AnalysisClient>,
    visualization: Arc<dyn VisualizationClient>,
    session: Arc<SharedSession>,
}

impl Orchestrator {
    pub fn new(
        analysis: Arc<dyn AnalysisClient>,
        visualization: Arc<dyn VisualizationClient>,
    ) -> Self {
        Self {
            analysis,
            visualization,
            session: Arc::new(SharedSession {
                state: Mutex::new(SessionState::new()),
                observer: None,
            }),
        }
    }

    pub fn from_service<S>(service: S) -> Self
    where
        S: AnalysisClient + VisualizationClient + 'static,
    {
        let service = Arc::new(service);
        Self::new(service.clone(), service)
    }

    /// Starts a fresh session that reports every transition to `observer`.
    pub fn with_observer(self, observer: Arc<dyn SessionObserver>) -> Self {
        let state = self.snapshot();
        Self {
            session: Arc::new(SharedSession {
                state: Mutex::new(state),
                observer: Some(observer),
            }),
            ..self
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.session.lock().clone()
    }

    /// Resets the session for `image`, analyzes it, then generates all three
    /// scenarios concurrently. Returns once every scenario has settled.
    pub fn start_upload(&self, image: ImageRef) -> Result<UploadOutcome, AnalysisFailure> {
        let token = self
            .session
            .apply("upload_started", |state| (state.begin_upload(image.clone()), true));
        info!(upload = %token, mime = image.mime_type(), "upload started");

        let analysis = match self.analysis.analyze(&image) {
            Ok(analysis) => analysis,
            Err(err) => {
                error!(upload = %token, "jewelry analysis failed: {}", error_chain_text(&err));
                self.session
                    .transition("analysis_failed", |state| state.on_analysis_failed(token));
                return Err(err);
            }
        };

        let accepted = self.session.transition("analysis_complete", |state| {
            state.on_analysis_complete(token, analysis.clone())
        });
        if !accepted {
            debug!(upload = %token, "analysis finished for a superseded upload");
            return Ok(UploadOutcome::Superseded { token });
        }
        info!(upload = %token, kind = %analysis.kind, "analysis complete; generating scenarios");

        let scenarios = self.fan_out(token, &image, &analysis);
        Ok(UploadOutcome::Settled { token, scenarios })
    }

    fn fan_out(
        &self,
        token: UploadToken,
        image: &ImageRef,
        analysis: &JewelryAnalysis,
    ) -> ScenarioMap<ScenarioOutcome> {
        thread::scope(|scope| {
            let workers = ScenarioMap::from_fn(|scenario| {
                thread::Builder::new()
                    .name(format!("swarnam-{}", scenario.slug()))
                    .spawn_scoped(scope, move || {
                        self.generate_scenario(token, image, analysis, scenario)
                    })
            });
            workers.into_map(|scenario, worker| {
                let joined = match worker {
                    Ok(handle) => handle.join().ok(),
                    Err(err) => {
                        error!(upload = %token, scenario = %scenario, "failed to spawn generation worker: {err}");
                        None
                    }
                };
                joined.unwrap_or_else(|| self.settle_lost_worker(token, scenario))
            })
        })
    }

    fn generate_scenario(
        &self,
        token: UploadToken,
        image: &ImageRef,
        analysis: &JewelryAnalysis,
        scenario: ScenarioKind,
    ) -> ScenarioOutcome {
        debug!(upload = %token, scenario = %scenario, "dispatching scenario generation");
        let request =
            VisualizationRequest::new(image, analysis, scenario).with_shot(ShotKind::MidLength);
        match self.visualization.generate(&request) {
            Ok(image_url) => {
                let result = GeneratedResult {
                    id: result_id(token, scenario),
                    scenario,
                    image_url,
                    prompt: scenario.label().to_string(),
                };
                if self.session.transition("scenario_generated", |state| {
                    state.on_scenario_result(token, result)
                }) {
                    ScenarioOutcome::Generated
                } else {
                    debug!(upload = %token, scenario = %scenario, "discarding stale scenario result");
                    ScenarioOutcome::Superseded
                }
            }
            Err(err) => self.settle_failure(token, scenario, &err),
        }
    }

    fn settle_failure(
        &self,
        token: UploadToken,
        scenario: ScenarioKind,
        err: &GenerationFailure,
    ) -> ScenarioOutcome {
        let reason = error_chain_text(err);
        error!(upload = %token, scenario = %scenario, "scenario generation failed: {reason}");
        if self.session.transition("scenario_failed", |state| {
            state.on_scenario_failed(token, scenario)
        }) {
            ScenarioOutcome::Failed(reason)
        } else {
            ScenarioOutcome::Superseded
        }
    }

    fn settle_lost_worker(&self, token: UploadToken, scenario: ScenarioKind) -> ScenarioOutcome {
        let err = GenerationFailure::WorkerLost(scenario.label().to_string());
        self.settle_failure(token, scenario, &err)
    }

    /// Shows the expansion for `scenario`, fetching any missing shots one at
    /// a time in expansion order. Each shot is published as soon as it
    /// arrives; the first failure stops the sequence.
    pub fn expand_scenario(
        &self,
        scenario: ScenarioKind,
    ) -> Result<ExpansionOutcome, GenerationFailure> {
        let plan = self.session.apply("expansion_started", |state| {
            let plan = state.begin_expansion(scenario);
            let applied = plan != ExpansionPlan::Unavailable;
            (plan, applied)
        });
        let job = match plan {
            ExpansionPlan::Unavailable => {
                debug!(scenario = %scenario, "expansion requested before a result exists");
                return Ok(ExpansionOutcome::Unavailable);
            }
            ExpansionPlan::InFlight => return Ok(ExpansionOutcome::InFlight),
            ExpansionPlan::Cached => return Ok(ExpansionOutcome::Cached),
            ExpansionPlan::Fetch(job) => job,
        };

        let mut fetched = 0;
        for shot in job.shots.iter().copied() {
            debug!(upload = %job.token, scenario = %scenario, shot = %shot, "dispatching expansion shot");
            let request =
                VisualizationRequest::new(&job.image, &job.analysis, scenario).with_shot(shot);
            let image_url = match self.visualization.generate(&request) {
                Ok(image_url) => image_url,
                Err(err) => {
                    error!(
                        upload = %job.token,
                        scenario = %scenario,
                        shot = %shot,
                        "expansion shot failed: {}",
                        error_chain_text(&err)
                    );
                    self.session.transition("expansion_failed", |state| {
                        state.on_expansion_failed(job.token, scenario)
                    });
                    return Err(err);
                }
            };
            let appended = self.session.transition("expansion_shot", |state| {
                state.on_expansion_shot(
                    job.token,
                    scenario,
                    ExpansionShot {
                        kind: shot,
                        image_url,
                    },
                )
            });
            if !appended {
                debug!(upload = %job.token, scenario = %scenario, "expansion superseded; remaining shots skipped");
                return Ok(ExpansionOutcome::Superseded { fetched });
            }
            fetched += 1;
        }

        self.session.transition("expansion_finished", |state| {
            state.on_expansion_finished(job.token, scenario)
        });
        Ok(ExpansionOutcome::Completed { fetched })
    }

    /// Hides the expansion overlay; fetched shots stay in the session.
    pub fn close_expansion(&self) -> bool {
        self.session
            .transition("expansion_closed", SessionState::close_expansion)
    }
}

fn result_id(token: UploadToken, scenario: ScenarioKind) -> String {
    format!(
        "{}-{}-{}",
        chrono::Utc::now().timestamp_millis(),
        token,
        scenario.slug()
    )
}
