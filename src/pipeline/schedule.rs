// src/pipeline/schedule.rs

//! Periodic sync trigger.

use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use super::sync::SyncEngine;
use crate::error::AppError;

/// Run `engine.sync()` every `interval` until `shutdown` resolves.
///
/// The first run starts immediately. Each detected change is logged at
/// info level. Returns the number of runs that completed successfully.
pub async fn run_periodic<F>(engine: &SyncEngine, interval: Duration, shutdown: F) -> usize
where
    F: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let mut completed = 0;
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                log::info!("Scheduler stopping after {} runs", completed);
                break;
            }
            _ = ticker.tick() => {
                match engine.sync().await {
                    Ok(changes) => {
                        completed += 1;
                        for change in &changes {
                            log::info!("{}", change);
                        }
                    }
                    Err(AppError::AlreadyInProgress) => {
                        log::warn!("Skipping tick: previous run still in progress");
                    }
                    Err(e) => log::error!("Scheduled sync failed: {}", e),
                }
            }
        }
    }

    completed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Config;
    use crate::services::PageTransport;
    use crate::services::testing::{self, FakeMoodle, course_page, overview_page};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn engine(fake: Arc<FakeMoodle>, tmp: &TempDir) -> SyncEngine {
        let mut config = Config::default();
        config.moodle.home_url = testing::HOME.into();
        config.moodle.login_url = testing::LOGIN.into();
        config.moodle.overview_url = testing::OVERVIEW.into();
        config.moodle.username = testing::USERNAME.into();
        config.moodle.password = testing::PASSWORD.into();
        config.storage.dir = tmp.path().to_path_buf();

        let transport: Arc<dyn PageTransport> = fake;
        SyncEngine::with_transport(&config, transport).unwrap()
    }

    #[tokio::test]
    async fn runs_immediately_and_repeats_until_shutdown() {
        let tmp = TempDir::new().unwrap();
        let fake = Arc::new(FakeMoodle::new());
        fake.set_page(
            testing::OVERVIEW,
            &overview_page(&[("Calculus I", "../user/index.php?id=1")]),
        );
        fake.set_page(
            "https://lms.test/grade/report/user/index.php?id=1",
            &course_page("Calculus I", &[("HW1", "8", "80 %", "")]),
        );
        let engine = engine(Arc::clone(&fake), &tmp);

        let runs = run_periodic(
            &engine,
            Duration::from_millis(20),
            tokio::time::sleep(Duration::from_millis(110)),
        )
        .await;

        assert!(runs >= 2, "expected repeated runs, got {runs}");
        assert!(engine.status().is_some());
        assert!(!engine.is_running());
    }

    #[tokio::test]
    async fn failed_runs_do_not_stop_the_scheduler() {
        let tmp = TempDir::new().unwrap();
        let fake = Arc::new(FakeMoodle::new());
        fake.fail(testing::OVERVIEW);
        let engine = engine(Arc::clone(&fake), &tmp);

        let runs = run_periodic(
            &engine,
            Duration::from_millis(10),
            tokio::time::sleep(Duration::from_millis(60)),
        )
        .await;

        assert_eq!(runs, 0);
        assert!(fake.get_count(testing::OVERVIEW) >= 2);
    }

    #[tokio::test]
    async fn stops_promptly_when_shutdown_already_resolved() {
        let tmp = TempDir::new().unwrap();
        let fake = Arc::new(FakeMoodle::new());
        let engine = engine(Arc::clone(&fake), &tmp);

        let notify = Arc::new(tokio::sync::Notify::new());
        notify.notify_one();
        let shutdown = {
            let notify = Arc::clone(&notify);
            async move { notify.notified().await }
        };

        let stopped = tokio::time::timeout(
            Duration::from_secs(2),
            run_periodic(&engine, Duration::from_secs(3600), shutdown),
        )
        .await;
        assert!(stopped.is_ok());
    }
}
