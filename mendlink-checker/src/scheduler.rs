use crate::checker::{CycleReport, SiteChecker};
use crate::error::{CheckError, Result};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info};

enum Command {
    Recheck(oneshot::Sender<Result<CycleReport>>),
}

/// Handle to a running scheduler. This is the manual-trigger surface:
/// an explicit value passed around instead of a well-known global.
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<Command>,
}

impl SchedulerHandle {
    /// Trigger a clear-and-rescan right now and wait for the cycle to
    /// settle. Identical to what the interval does on its own.
    pub async fn recheck(&self) -> Result<CycleReport> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Command::Recheck(reply_tx))
            .await
            .map_err(|_| CheckError::SchedulerGone)?;
        reply_rx.await.map_err(|_| CheckError::SchedulerGone)?
    }
}

/// Runs one scan cycle at startup, then a full clear-and-rescan on a fixed
/// interval, with a manual recheck operation in between.
pub struct CheckScheduler {
    checker: SiteChecker,
    site_dir: PathBuf,
    interval: Duration,
}

impl CheckScheduler {
    pub fn new(checker: SiteChecker, site_dir: PathBuf) -> Self {
        Self {
            checker,
            site_dir,
            interval: Duration::from_secs(30 * 60),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_interval_minutes(self, minutes: u64) -> Self {
        let minutes = minutes.max(1);
        self.with_interval(Duration::from_secs(minutes * 60))
    }

    /// Spawn the scheduling loop. The initial scan runs immediately; the
    /// returned handle outlives this call and can trigger rechecks.
    pub fn spawn(self) -> (SchedulerHandle, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel(8);
        let handle = SchedulerHandle { tx };

        let join = tokio::spawn(async move {
            info!(
                "Scheduler started for {} (interval {:?})",
                self.site_dir.display(),
                self.interval
            );
            self.run_once("startup").await;

            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await; // consume the immediate first tick

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_once("interval").await;
                    }
                    cmd = rx.recv() => {
                        match cmd {
                            Some(Command::Recheck(reply)) => {
                                let result = self.checker.run_cycle(&self.site_dir).await;
                                // receiver may have gone away; nothing to do
                                let _ = reply.send(result);
                            }
                            None => {
                                info!("All scheduler handles dropped, stopping");
                                break;
                            }
                        }
                    }
                }
            }
        });

        (handle, join)
    }

    async fn run_once(&self, trigger: &str) {
        match self.checker.run_cycle(&self.site_dir).await {
            Ok(report) => {
                info!(
                    trigger,
                    "Scan cycle {} done: {} corrections across {} pages",
                    report.cycle_id,
                    report.corrections.len(),
                    report.pages
                );
            }
            Err(e) => {
                error!(trigger, "Scan cycle failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::LinkValidator;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn recheck_runs_a_fresh_cycle_after_startup_scan() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200))
            // startup cycle + manual recheck, one probe each
            .expect(2)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("index.html"),
            format!(
                r#"<html><body><a href="{}/page">x</a></body></html>"#,
                server.uri()
            ),
        )
        .unwrap();

        let checker = SiteChecker::new().with_validator(
            LinkValidator::new().with_retry_delay(Duration::from_millis(1)),
        );
        let scheduler = CheckScheduler::new(checker, dir.path().to_path_buf())
            .with_interval(Duration::from_secs(3600));
        let (handle, join) = scheduler.spawn();

        let report = handle.recheck().await.unwrap();
        assert_eq!(report.distinct_urls, 1);
        assert_eq!(report.healthy, 1);

        drop(handle);
        join.await.unwrap();
    }

    #[tokio::test]
    async fn recheck_fails_once_scheduler_is_gone() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = CheckScheduler::new(SiteChecker::new(), dir.path().to_path_buf());
        let (handle, join) = scheduler.spawn();
        // let the startup cycle finish, then stop the loop
        handle.recheck().await.unwrap();
        join.abort();
        let _ = join.await;
        assert!(handle.recheck().await.is_err());
    }
}
