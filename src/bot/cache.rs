//! Verdict cache in front of the detector worker.
//!
//! Verdicts are keyed by fingerprint (normalized user agent + session id) and
//! expire after a TTL. Known crawler user agents are pre-warmed keyed by user
//! agent alone and answer for any session.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use dashmap::DashMap;
use tracing::{debug, info};

use crate::bot::detector::{BotDetector, BotVerdict};
use crate::bot::session::SessionTracker;
use crate::bot::worker::DetectorWorker;
use crate::bot::BotRequest;
use crate::cache::{CacheStatus, FlightRole, SingleFlight};
use crate::config::BotConfig;
use crate::error::Result;

/// User agents classified as bots before any traffic arrives
pub const KNOWN_BOT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)",
    "Mozilla/5.0 (compatible; bingbot/2.0; +http://www.bing.com/bingbot.htm)",
    "Mozilla/5.0 (compatible; YandexBot/3.0; +http://yandex.com/bots)",
    "Mozilla/5.0 (compatible; Baiduspider/2.0; +http://www.baidu.com/search/spider.html)",
    "DuckDuckBot/1.1; (+http://duckduckgo.com/duckduckbot.html)",
    "Mozilla/5.0 (compatible; AhrefsBot/7.0; +http://ahrefs.com/robot/)",
    "Mozilla/5.0 (compatible; SemrushBot/7~bl; +http://www.semrush.com/bot.html)",
    "facebookexternalhit/1.1 (+http://www.facebook.com/externalhit_uatext.php)",
    "Twitterbot/1.0",
    "Mozilla/5.0 (compatible; Discordbot/2.0; +https://discordapp.com)",
    "Slackbot-LinkExpanding 1.0 (+https://api.slack.com/robots)",
    "Mozilla/5.0 AppleWebKit/537.36 (KHTML, like Gecko; compatible; GPTBot/1.0; +https://openai.com/gptbot)",
    "CCBot/2.0 (https://commoncrawl.org/faq/)",
];

/// Lowercased, whitespace-collapsed user agent
pub fn normalize_user_agent(user_agent: Option<&str>) -> String {
    user_agent
        .unwrap_or_default()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Cache key for a request
pub fn fingerprint(user_agent: Option<&str>, session_id: &str) -> String {
    format!("{}|{}", normalize_user_agent(user_agent), session_id.trim())
}

/// Verdict for one request and how it was obtained
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotClassification {
    pub fingerprint: String,
    pub verdict: BotVerdict,
    pub status: CacheStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub coalesced: u64,
    /// Cached per-fingerprint verdicts (expired ones included until cleanup)
    pub entries: usize,
    pub known_agents: usize,
    pub sessions: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BotCleanup {
    pub verdicts: usize,
    pub sessions: usize,
}

struct CachedVerdict {
    verdict: BotVerdict,
    expires_at: Instant,
}

pub struct BotDetectionCache {
    tracker: SessionTracker,
    worker: DetectorWorker,
    verdicts: DashMap<String, CachedVerdict>,
    known: HashMap<String, BotVerdict>,
    flights: SingleFlight<BotVerdict>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
}

impl BotDetectionCache {
    /// Start the detector worker and pre-warm known crawlers
    pub fn new(config: &BotConfig) -> Self {
        let tracker = SessionTracker::new(config.history_limit, config.session_max_age());
        let detector = BotDetector::default();

        let known: HashMap<String, BotVerdict> = KNOWN_BOT_USER_AGENTS
            .iter()
            .map(|ua| (normalize_user_agent(Some(ua)), detector.classify(Some(ua), None)))
            .collect();
        info!("🤖 Bot cache pre-warmed with {} known user agents", known.len());

        Self {
            tracker,
            worker: DetectorWorker::spawn(detector),
            verdicts: DashMap::new(),
            known,
            flights: SingleFlight::new(),
            ttl: config.verdict_ttl(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
        }
    }

    /// Classify a request, recording its page view first
    pub async fn classify(&self, request: &BotRequest) -> Result<BotClassification> {
        let activity = match request.game_id {
            Some(game_id) => Some(self.tracker.record_view(&request.session_id, game_id)),
            None => self.tracker.get(&request.session_id),
        };

        let ua = normalize_user_agent(request.user_agent.as_deref());
        let fingerprint = fingerprint(request.user_agent.as_deref(), &request.session_id);

        if let Some(verdict) = self.known.get(&ua) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(BotClassification {
                fingerprint,
                verdict: verdict.clone(),
                status: CacheStatus::Hit,
            });
        }

        if let Some(cached) = self.verdicts.get(&fingerprint) {
            if cached.expires_at > Instant::now() {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(BotClassification {
                    fingerprint,
                    verdict: cached.verdict.clone(),
                    status: CacheStatus::Hit,
                });
            }
        }

        let (verdict, role) = self
            .flights
            .run(&fingerprint, async {
                let verdict = self
                    .worker
                    .classify(request.user_agent.clone(), activity)
                    .await?;
                self.verdicts.insert(
                    fingerprint.clone(),
                    CachedVerdict {
                        verdict: verdict.clone(),
                        expires_at: Instant::now() + self.ttl,
                    },
                );
                Ok(verdict)
            })
            .await?;

        let status = match role {
            FlightRole::Leader => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                if verdict.is_bot {
                    debug!("Bot detected {} ({:.2}): {:?}", fingerprint, verdict.confidence, verdict.reasons);
                }
                CacheStatus::Miss
            }
            FlightRole::Follower => {
                self.coalesced.fetch_add(1, Ordering::Relaxed);
                CacheStatus::Coalesced
            }
        };

        Ok(BotClassification {
            fingerprint,
            verdict,
            status,
        })
    }

    pub fn stats(&self) -> BotCacheStats {
        BotCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            entries: self.verdicts.len(),
            known_agents: self.known.len(),
            sessions: self.tracker.len(),
        }
    }

    /// Purge expired verdicts and idle sessions
    pub fn cleanup(&self) -> BotCleanup {
        let now = Instant::now();
        let before = self.verdicts.len();
        self.verdicts.retain(|_, cached| cached.expires_at > now);

        let report = BotCleanup {
            verdicts: before.saturating_sub(self.verdicts.len()),
            sessions: self.tracker.cleanup(),
        };
        if report.verdicts > 0 || report.sessions > 0 {
            info!(
                "🧹 Bot cache cleanup: {} verdicts, {} sessions",
                report.verdicts, report.sessions
            );
        }
        report
    }

    /// Run `cleanup` every `interval` until the handle is aborted
    pub fn spawn_maintenance(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                cache.cleanup();
            }
        })
    }

    pub fn sessions(&self) -> &SessionTracker {
        &self.tracker
    }

    /// Stop the detector worker; later misses fail
    pub async fn shutdown(&self) {
        self.worker.shutdown().await;
    }
}
