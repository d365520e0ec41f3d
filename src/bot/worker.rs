//! Background scoring task.
//!
//! Classification jobs are queued over an mpsc channel to one tokio task that
//! owns the detector; answers come back over oneshot channels.

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::bot::detector::{BotDetector, BotVerdict};
use crate::bot::session::SessionActivity;
use crate::error::{GameShelfError, Result};

const QUEUE_SIZE: usize = 1024;

enum Command {
    Classify {
        user_agent: Option<String>,
        activity: Option<SessionActivity>,
        reply: oneshot::Sender<BotVerdict>,
    },
    Shutdown,
}

/// Handle to the detector task
pub struct DetectorWorker {
    tx: mpsc::Sender<Command>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl DetectorWorker {
    /// Start the worker task
    pub fn spawn(detector: BotDetector) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_SIZE);
        let handle = tokio::spawn(run(detector, rx));
        info!("🤖 Bot detector worker started");

        Self {
            tx,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Score a request on the worker task
    pub async fn classify(&self, user_agent: Option<String>, activity: Option<SessionActivity>) -> Result<BotVerdict> {
        let (reply, response) = oneshot::channel();

        self.tx
            .send(Command::Classify {
                user_agent,
                activity,
                reply,
            })
            .await
            .map_err(|_| GameShelfError::Worker("detector worker stopped".into()))?;

        response
            .await
            .map_err(|_| GameShelfError::Worker("detector dropped the request".into()))
    }

    /// Stop the worker and wait for it to finish; later requests fail
    pub async fn shutdown(&self) {
        let Some(handle) = self.handle.lock().await.take() else {
            return;
        };
        let _ = self.tx.send(Command::Shutdown).await;
        let _ = handle.await;
        info!("🤖 Bot detector worker stopped");
    }

    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }
}

async fn run(detector: BotDetector, mut rx: mpsc::Receiver<Command>) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Classify {
                user_agent,
                activity,
                reply,
            } => {
                let verdict = detector.classify(user_agent.as_deref(), activity.as_ref());
                // Caller may have gone away
                let _ = reply.send(verdict);
            }
            Command::Shutdown => {
                debug!("Detector worker received shutdown");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_classify_on_worker() {
        let worker = DetectorWorker::spawn(BotDetector::default());

        let bot = worker.classify(Some("Wget/1.21".into()), None).await.unwrap();
        let human = worker.classify(Some("Mozilla/5.0 Firefox/121.0".into()), None).await.unwrap();

        assert!(bot.is_bot);
        assert!(!human.is_bot);
        assert!(worker.is_running());
    }

    #[tokio::test]
    async fn test_requests_after_shutdown_fail() {
        let worker = DetectorWorker::spawn(BotDetector::default());
        worker.shutdown().await;
        worker.shutdown().await;

        assert!(!worker.is_running());
        let err = worker.classify(None, None).await.unwrap_err();
        assert!(matches!(err, GameShelfError::Worker(_)));
    }

    #[tokio::test]
    async fn test_concurrent_requests() {
        let worker = std::sync::Arc::new(DetectorWorker::spawn(BotDetector::default()));
        let mut handles = Vec::new();
        for i in 0..32 {
            let worker = worker.clone();
            handles.push(tokio::spawn(async move {
                let ua = if i % 2 == 0 { "curl/8.0" } else { "Mozilla/5.0 Safari/605.1" };
                worker.classify(Some(ua.into()), None).await.unwrap().is_bot
            }));
        }

        let mut bots = 0;
        for handle in handles {
            if handle.await.unwrap() {
                bots += 1;
            }
        }
        assert_eq!(bots, 16);
    }
}
