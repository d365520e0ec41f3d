use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::bot::session::SessionActivity;

/// Lowercase user-agent fragments of automated clients
pub const BOT_UA_TOKENS: &[&str] = &[
    "bot",
    "crawler",
    "spider",
    "slurp",
    "headless",
    "phantomjs",
    "selenium",
    "puppeteer",
    "playwright",
    "curl",
    "wget",
    "python-requests",
    "python-urllib",
    "aiohttp",
    "scrapy",
    "go-http-client",
    "java/",
    "okhttp",
    "libwww",
    "httpclient",
];

/// Classification outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotVerdict {
    pub is_bot: bool,
    /// 0.0 - 1.0
    pub confidence: f64,
    pub reasons: Vec<String>,
}

impl BotVerdict {
    pub fn human() -> Self {
        Self {
            is_bot: false,
            confidence: 0.0,
            reasons: Vec::new(),
        }
    }
}

/// Heuristic thresholds
#[derive(Debug, Clone)]
pub struct DetectorThresholds {
    /// Views per minute above which a session looks scripted
    pub max_views_per_minute: f64,
    /// Median gap between views below which a session looks scripted
    pub min_median_gap: Duration,
    /// Distinct games within `burst_window` that look like scraping
    pub max_distinct_games: usize,
    pub burst_window: Duration,
    /// Views needed before rate signals count
    pub min_views: usize,
}

impl Default for DetectorThresholds {
    fn default() -> Self {
        Self {
            max_views_per_minute: 30.0,
            min_median_gap: Duration::from_secs(1),
            max_distinct_games: 20,
            burst_window: Duration::from_secs(300),
            min_views: 5,
        }
    }
}

/// Scores a request from its user agent and session activity
#[derive(Debug, Clone, Default)]
pub struct BotDetector {
    thresholds: DetectorThresholds,
}

impl BotDetector {
    pub fn new(thresholds: DetectorThresholds) -> Self {
        Self { thresholds }
    }

    pub fn classify(&self, user_agent: Option<&str>, activity: Option<&SessionActivity>) -> BotVerdict {
        let mut score = 0.0;
        let mut reasons = Vec::new();

        let ua = user_agent.map(|ua| ua.trim().to_lowercase()).unwrap_or_default();
        if ua.is_empty() {
            score += 0.6;
            reasons.push("missing user agent".to_string());
        } else if let Some(token) = BOT_UA_TOKENS.iter().find(|t| ua.contains(*t)) {
            score += 0.9;
            reasons.push(format!("bot user agent token '{}'", token));
        }

        if let Some(activity) = activity {
            let t = &self.thresholds;
            if activity.views.len() >= t.min_views {
                let minutes = activity.span().as_secs_f64() / 60.0;
                let rate = activity.views.len() as f64 / minutes.max(1.0 / 60.0);
                if rate > t.max_views_per_minute {
                    score += 0.4;
                    reasons.push(format!("{:.0} views per minute", rate));
                }

                if let Some(gap) = median(activity.gaps()) {
                    if gap < t.min_median_gap {
                        score += 0.4;
                        reasons.push(format!("median gap {}ms between views", gap.as_millis()));
                    }
                }
            }

            let distinct = activity.distinct_games();
            if distinct >= t.max_distinct_games && activity.span() <= t.burst_window {
                score += 0.3;
                reasons.push(format!("{} distinct games in {}s", distinct, activity.span().as_secs()));
            }
        }

        let confidence = f64::min(score, 1.0);
        BotVerdict {
            is_bot: confidence >= 0.5,
            confidence,
            reasons,
        }
    }
}

fn median(mut values: Vec<Duration>) -> Option<Duration> {
    if values.is_empty() {
        return None;
    }
    values.sort();
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2
    } else {
        values[mid]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::session::SessionTracker;
    use chrono::{Duration as ChronoDuration, Utc};

    const BROWSER: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

    fn session(views: usize, gap_ms: i64, distinct: bool) -> SessionActivity {
        let tracker = SessionTracker::new(50, Duration::from_secs(3600));
        let t0 = Utc::now();
        let mut activity = None;
        for i in 0..views {
            let game_id = if distinct { i as i64 } else { 1 };
            activity = Some(tracker.record_view_at("s", game_id, t0 + ChronoDuration::milliseconds(gap_ms * i as i64)));
        }
        activity.unwrap()
    }

    #[test]
    fn test_browser_is_human() {
        let verdict = BotDetector::default().classify(Some(BROWSER), None);
        assert!(!verdict.is_bot);
        assert_eq!(verdict.confidence, 0.0);
        assert!(verdict.reasons.is_empty());
    }

    #[test]
    fn test_user_agent_signals() {
        let detector = BotDetector::default();

        let verdict = detector.classify(None, None);
        assert!(verdict.is_bot);
        assert_eq!(verdict.reasons, vec!["missing user agent".to_string()]);

        assert!(detector.classify(Some("   "), None).is_bot);
        assert!(detector.classify(Some("curl/8.4.0"), None).is_bot);
        assert!(detector.classify(Some("Mozilla/5.0 (compatible; Googlebot/2.1)"), None).is_bot);
        assert!(detector.classify(Some("Mozilla/5.0 HeadlessChrome/120.0"), None).is_bot);
    }

    #[test]
    fn test_fast_sequential_views() {
        let activity = session(10, 200, false);
        let verdict = BotDetector::default().classify(Some(BROWSER), Some(&activity));

        assert!(verdict.is_bot);
        assert!(verdict.confidence >= 0.8);
        assert!(verdict.reasons.iter().any(|r| r.contains("median gap")));
    }

    #[test]
    fn test_normal_browsing_is_human() {
        let activity = session(8, 45_000, true);
        let verdict = BotDetector::default().classify(Some(BROWSER), Some(&activity));
        assert!(!verdict.is_bot);
    }

    #[test]
    fn test_distinct_game_burst_alone_is_not_enough() {
        // 25 games, 5s apart: only the breadth signal fires
        let activity = session(25, 5_000, true);
        let verdict = BotDetector::default().classify(Some(BROWSER), Some(&activity));
        assert_eq!(verdict.confidence, 0.3);
        assert!(!verdict.is_bot);
    }

    #[test]
    fn test_median() {
        assert_eq!(median(vec![]), None);
        assert_eq!(
            median(vec![Duration::from_secs(3), Duration::from_secs(1), Duration::from_secs(2)]),
            Some(Duration::from_secs(2))
        );
        assert_eq!(
            median(vec![Duration::from_secs(1), Duration::from_secs(3)]),
            Some(Duration::from_secs(2))
        );
    }
}
