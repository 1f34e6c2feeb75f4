use thiserror::Error;

/// Failure talking to the inference service itself.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("GEMINI_API_KEY or GOOGLE_API_KEY or API_KEY not set")]
    MissingApiKey,
    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),
    #[error("{service} request failed ({endpoint})")]
    Transport {
        service: &'static str,
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{service} request failed ({code}): {body}")]
    Status {
        service: &'static str,
        code: u16,
        body: String,
    },
    #[error("{service} returned invalid JSON payload")]
    InvalidJson {
        service: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// The jewelry analysis call failed; fatal to the current upload.
#[derive(Debug, Error)]
pub enum AnalysisFailure {
    #[error("jewelry analysis failed")]
    Service(#[from] InferenceError),
    #[error("jewelry analysis returned no text")]
    EmptyResponse,
    #[error("jewelry analysis returned an unusable description")]
    Malformed(#[source] serde_json::Error),
}

/// One generation call failed; contained to its scenario or expansion.
#[derive(Debug, Error)]
pub enum GenerationFailure {
    #[error("Generation failed.")]
    NoImage,
    #[error("image generation failed")]
    Service(#[from] InferenceError),
    #[error("dryrun render failed")]
    Render(#[from] image::ImageError),
    #[error("generation worker for {0} stopped unexpectedly")]
    WorkerLost(String),
}

/// Joins an error with its causes, skipping repeated messages.
pub fn error_chain_text(err: &dyn std::error::Error) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut current: Option<&dyn std::error::Error> = Some(err);
    while let Some(cause) = current {
        let text = cause.to_string();
        let trimmed = text.trim();
        if !trimmed.is_empty() && parts.last().map(String::as_str) != Some(trimmed) {
            parts.push(trimmed.to_string());
        }
        current = cause.source();
    }
    parts.join(" | caused by: ")
}
