//! Bot detection for game page traffic

pub mod cache;
pub mod detector;
pub mod session;
pub mod worker;

use serde::{Deserialize, Serialize};

pub use cache::{BotCacheStats, BotClassification, BotCleanup, BotDetectionCache, KNOWN_BOT_USER_AGENTS};
pub use detector::{BotDetector, BotVerdict, DetectorThresholds};
pub use session::{PageView, SessionActivity, SessionTracker, MAX_HISTORY, MAX_SESSION_AGE};
pub use worker::DetectorWorker;

/// One incoming page request to classify
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotRequest {
    #[serde(default)]
    pub user_agent: Option<String>,
    pub session_id: String,
    /// Game page being viewed, if any
    #[serde(default)]
    pub game_id: Option<i64>,
}
