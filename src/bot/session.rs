use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::time::Duration;

/// Most page views kept per session
pub const MAX_HISTORY: usize = 50;

/// Idle sessions are never kept longer than a day
pub const MAX_SESSION_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// One game page view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageView {
    pub game_id: i64,
    pub at: DateTime<Utc>,
}

/// Recent activity of one browsing session
#[derive(Debug, Clone, Serialize)]
pub struct SessionActivity {
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Most recent views, oldest first, bounded by the tracker's history limit
    pub views: VecDeque<PageView>,
    /// Views ever recorded, including those dropped from `views`
    pub total_views: u64,
}

impl SessionActivity {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            first_seen: now,
            last_seen: now,
            views: VecDeque::new(),
            total_views: 0,
        }
    }

    /// Time covered by the retained views
    pub fn span(&self) -> Duration {
        match (self.views.front(), self.views.back()) {
            (Some(first), Some(last)) => (last.at - first.at).to_std().unwrap_or_default(),
            _ => Duration::ZERO,
        }
    }

    /// Gaps between consecutive retained views
    pub fn gaps(&self) -> Vec<Duration> {
        self.views
            .iter()
            .zip(self.views.iter().skip(1))
            .map(|(a, b)| (b.at - a.at).to_std().unwrap_or_default())
            .collect()
    }

    pub fn distinct_games(&self) -> usize {
        self.views.iter().map(|v| v.game_id).collect::<HashSet<_>>().len()
    }
}

/// Per-session page view history
pub struct SessionTracker {
    sessions: DashMap<String, SessionActivity>,
    history_limit: usize,
    max_age: Duration,
}

impl SessionTracker {
    /// Limits above `MAX_HISTORY` and `MAX_SESSION_AGE` are clamped down
    pub fn new(history_limit: usize, max_age: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            history_limit: history_limit.clamp(1, MAX_HISTORY),
            max_age: max_age.min(MAX_SESSION_AGE),
        }
    }

    /// Record a game view and return the updated activity
    pub fn record_view(&self, session_id: &str, game_id: i64) -> SessionActivity {
        self.record_view_at(session_id, game_id, Utc::now())
    }

    pub fn record_view_at(&self, session_id: &str, game_id: i64, at: DateTime<Utc>) -> SessionActivity {
        let mut activity = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionActivity::new(at));

        activity.last_seen = activity.last_seen.max(at);
        activity.total_views += 1;
        activity.views.push_back(PageView { game_id, at });
        while activity.views.len() > self.history_limit {
            activity.views.pop_front();
        }

        activity.clone()
    }

    pub fn get(&self, session_id: &str) -> Option<SessionActivity> {
        self.sessions.get(session_id).map(|a| a.clone())
    }

    /// Drop sessions untouched for longer than the max age; returns how many
    pub fn cleanup(&self) -> usize {
        self.cleanup_at(Utc::now())
    }

    pub fn cleanup_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        let max_age = self.max_age;
        self.sessions
            .retain(|_, activity| (now - activity.last_seen).to_std().map_or(true, |age| age <= max_age));
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn test_history_is_bounded() {
        let tracker = SessionTracker::new(3, Duration::from_secs(3600));
        for game_id in 0..5 {
            tracker.record_view("s1", game_id);
        }

        let activity = tracker.get("s1").unwrap();
        assert_eq!(activity.views.len(), 3);
        assert_eq!(activity.total_views, 5);
        assert_eq!(activity.views.front().unwrap().game_id, 2);
        assert!(tracker.get("s2").is_none());
    }

    #[test]
    fn test_gaps_and_distinct_games() {
        let tracker = SessionTracker::new(50, Duration::from_secs(3600));
        let t0 = Utc::now();
        tracker.record_view_at("s1", 1, t0);
        tracker.record_view_at("s1", 2, t0 + ChronoDuration::seconds(2));
        let activity = tracker.record_view_at("s1", 1, t0 + ChronoDuration::seconds(5));

        assert_eq!(activity.gaps(), vec![Duration::from_secs(2), Duration::from_secs(3)]);
        assert_eq!(activity.span(), Duration::from_secs(5));
        assert_eq!(activity.distinct_games(), 2);
    }

    #[test]
    fn test_cleanup_purges_idle_sessions() {
        let tracker = SessionTracker::new(50, Duration::from_secs(24 * 3600));
        let now = Utc::now();
        tracker.record_view_at("old", 1, now - ChronoDuration::hours(25));
        tracker.record_view_at("fresh", 1, now - ChronoDuration::hours(1));

        assert_eq!(tracker.cleanup_at(now), 1);
        assert!(tracker.get("old").is_none());
        assert!(tracker.get("fresh").is_some());
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_configured_limits_are_capped() {
        let tracker = SessionTracker::new(200, Duration::from_secs(7 * 24 * 3600));
        for game_id in 0..120 {
            tracker.record_view("s", game_id);
        }
        assert_eq!(tracker.get("s").unwrap().views.len(), MAX_HISTORY);

        let now = Utc::now();
        tracker.record_view_at("stale", 1, now - ChronoDuration::hours(30));
        assert_eq!(tracker.cleanup_at(now), 1);
        assert!(tracker.get("s").is_some());
    }
}
