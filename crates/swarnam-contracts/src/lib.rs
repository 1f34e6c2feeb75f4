pub mod chat;
pub mod events;
pub mod image;
pub mod models;
pub mod scenario;
pub mod session;

pub use chat::{parse_command, ChatCommand, CHAT_HELP_COMMANDS};
pub use events::SnapshotWriter;
pub use image::{ImageRef, DEFAULT_IMAGE_MIME};
pub use models::{ExpansionShot, GeneratedResult, JewelryAnalysis};
pub use scenario::{ScenarioKind, ScenarioMap, ShotKind};
pub use session::{
    ExpansionJob, ExpansionPlan, SessionObserver, SessionState, UploadToken, ANALYZING_STATUS,
    ERROR_STATUS, GENERATING_STATUS,
};
