//! Bulk metadata enrichment from IGDB.
//!
//! Games missing cover, summary, developer or release date are fetched in
//! batches of IGDB ids, several batches at once, and merged into the store
//! without overwriting values it already has.

use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::SyncConfig;
use crate::error::{GameShelfError, Result};
use crate::providers::GameProvider;
use crate::store::GameStore;

/// Most games considered by one run
const SCAN_LIMIT: usize = 100_000;

/// Outcome of a sync run
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// Games that needed enrichment
    pub total: usize,
    /// Games in batches that were fetched successfully
    pub processed: usize,
    /// Rows actually merged
    pub updated: usize,
    pub failed_batches: usize,
    pub elapsed: Duration,
}

impl SyncReport {
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.processed as f64 / secs
        } else {
            0.0
        }
    }
}

pub struct MetadataSync {
    store: Arc<dyn GameStore>,
    provider: Arc<dyn GameProvider>,
    batch_size: usize,
    parallel_requests: usize,
}

impl MetadataSync {
    pub fn new(store: Arc<dyn GameStore>, provider: Arc<dyn GameProvider>, config: &SyncConfig) -> Self {
        Self {
            store,
            provider,
            batch_size: config.batch_size.clamp(1, crate::providers::igdb::MAX_LIMIT),
            parallel_requests: config.parallel_requests.max(1),
        }
    }

    pub async fn run(&self) -> Result<SyncReport> {
        let start = Instant::now();
        let games = self.store.games_needing_sync(SCAN_LIMIT).await?;
        let ids: Vec<i64> = games.iter().filter_map(|g| g.igdb_id).collect();

        let mut report = SyncReport {
            total: ids.len(),
            ..SyncReport::default()
        };
        info!(
            "🚀 Syncing {} games in batches of {} ({} parallel)",
            report.total, self.batch_size, self.parallel_requests
        );

        let permits = Arc::new(Semaphore::new(self.parallel_requests));
        let mut batches = JoinSet::new();

        for batch in ids.chunks(self.batch_size) {
            let batch = batch.to_vec();
            let permits = permits.clone();
            let store = self.store.clone();
            let provider = self.provider.clone();

            batches.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|_| GameShelfError::Other("sync semaphore closed".to_string()))?;
                sync_batch(store.as_ref(), provider.as_ref(), &batch).await
            });
        }

        while let Some(joined) = batches.join_next().await {
            match joined {
                Ok(Ok((processed, updated))) => {
                    report.processed += processed;
                    report.updated += updated;
                    info!("Progress: {}/{} ({} updated)", report.processed, report.total, report.updated);
                }
                Ok(Err(e)) => {
                    report.failed_batches += 1;
                    warn!("⚠️ Sync batch failed: {}", e);
                }
                Err(e) => {
                    report.failed_batches += 1;
                    warn!("⚠️ Sync batch task panicked: {}", e);
                }
            }
        }

        report.elapsed = start.elapsed();
        info!(
            "✅ Sync complete in {:.1}s: {} updated, {} failed batches ({:.0} games/s)",
            report.elapsed.as_secs_f64(),
            report.updated,
            report.failed_batches,
            report.rate()
        );
        Ok(report)
    }
}

async fn sync_batch(store: &dyn GameStore, provider: &dyn GameProvider, ids: &[i64]) -> Result<(usize, usize)> {
    let games = provider.get_many(ids).await?;
    let mut updated = 0;
    for game in &games {
        if store.upsert_game_metadata(game).await? {
            updated += 1;
        }
    }
    Ok((ids.len(), updated))
}
