// src/pipeline/sync.rs

//! Sync orchestration.
//!
//! One run: confirm the session, read the overview report, then fetch,
//! extract, diff and persist every course concurrently. A failing course
//! is logged and skipped; it never aborts its siblings or the run.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinSet;
use url::Url;

use super::diff::compare;
use super::guard::RunGuard;
use crate::error::{AppError, Result};
use crate::models::{Change, Config, CourseLink, GradeRow};
use crate::services::{
    GradeExtractor, MoodleExtractor, PageTransport, ReqwestTransport, SessionFetcher,
};
use crate::storage::{LocalSnapshotStore, SnapshotStore};

/// Poll period of [`SyncEngine::wait_until_idle`].
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Grade synchronization engine.
pub struct SyncEngine {
    fetcher: Arc<SessionFetcher>,
    extractor: Arc<dyn GradeExtractor>,
    store: Arc<dyn SnapshotStore>,
    overview_url: Url,
    excluded: HashSet<String>,
    guard: RunGuard,
    last_synced_at: RwLock<Option<DateTime<Utc>>>,
}

/// Everything a per-course task needs, cloned into the task.
#[derive(Clone)]
struct CourseContext {
    fetcher: Arc<SessionFetcher>,
    extractor: Arc<dyn GradeExtractor>,
    store: Arc<dyn SnapshotStore>,
    changes: Arc<Mutex<Vec<Change>>>,
}

impl SyncEngine {
    pub fn new(
        fetcher: Arc<SessionFetcher>,
        extractor: Arc<dyn GradeExtractor>,
        store: Arc<dyn SnapshotStore>,
        overview_url: Url,
        excluded: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            store,
            overview_url,
            excluded: excluded.into_iter().collect(),
            guard: RunGuard::new(),
            last_synced_at: RwLock::new(None),
        }
    }

    /// Wire up the reqwest transport, Moodle extractor and local store.
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport: Arc<dyn PageTransport> = Arc::new(ReqwestTransport::new(&config.http)?);
        Self::with_transport(config, transport)
    }

    /// Like [`SyncEngine::from_config`] with a custom HTTP backend.
    pub fn with_transport(config: &Config, transport: Arc<dyn PageTransport>) -> Result<Self> {
        let fetcher = SessionFetcher::from_config(config, transport)?;
        let extractor = MoodleExtractor::new(&config.selectors)?;
        let store = LocalSnapshotStore::with_delimiter(
            &config.storage.dir,
            config.storage.delimiter_byte()?,
        );

        Ok(Self::new(
            Arc::new(fetcher),
            Arc::new(extractor),
            Arc::new(store),
            Url::parse(&config.moodle.overview_url)?,
            config.sync.excluded_courses.iter().cloned(),
        ))
    }

    /// Run one synchronization and return the detected changes.
    ///
    /// Fails immediately with `AlreadyInProgress` if a run is executing.
    pub async fn sync(&self) -> Result<Vec<Change>> {
        let Some(_permit) = self.guard.try_acquire() else {
            log::debug!("Sync requested while a run is in progress");
            return Err(AppError::AlreadyInProgress);
        };

        log::info!("Sync run started");
        self.ensure_session().await;

        let links = self.discover_courses().await?;

        let ctx = CourseContext {
            fetcher: Arc::clone(&self.fetcher),
            extractor: Arc::clone(&self.extractor),
            store: Arc::clone(&self.store),
            changes: Arc::new(Mutex::new(Vec::new())),
        };

        let total = links.len();
        let mut tasks = JoinSet::new();
        for link in links {
            tasks.spawn(ctx.clone().sync_course(link));
        }

        let mut failures = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(true) => {}
                Ok(false) => failures += 1,
                Err(e) => {
                    failures += 1;
                    log::error!("Course task aborted: {}", e);
                }
            }
        }

        let now = Utc::now();
        *self
            .last_synced_at
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Some(now);

        let changes = std::mem::take(&mut *ctx.changes.lock().unwrap_or_else(|e| e.into_inner()));
        log::info!(
            "Sync run finished: {} courses, {} failed, {} changes",
            total,
            failures,
            changes.len()
        );
        Ok(changes)
    }

    /// Check the session and log in if needed. Failures are logged only;
    /// the first fetch will try to recover on its own.
    async fn ensure_session(&self) {
        match self.fetcher.is_authenticated().await {
            Ok(true) => {
                log::debug!("Session is authenticated");
                return;
            }
            Ok(false) => log::info!("Session is not authenticated"),
            Err(e) => log::warn!("Session check failed: {}", e),
        }

        if let Err(e) = self.fetcher.login().await {
            log::error!("Login failed, continuing anyway: {}", e);
        }
    }

    /// Fetch the overview report, apply the exclusion list and drop repeated
    /// links so each course page is handled by one task.
    async fn discover_courses(&self) -> Result<Vec<CourseLink>> {
        let page = self
            .fetcher
            .fetch(&self.overview_url)
            .await
            .map_err(|e| match e {
                AppError::Session(session) => AppError::AuthenticationFailed(session),
                other => AppError::OverviewFetchFailed {
                    url: self.overview_url.to_string(),
                    message: other.to_string(),
                },
            })?;

        let links = self
            .extractor
            .extract_links(&page, &self.overview_url)
            .map_err(|e| AppError::OverviewFetchFailed {
                url: self.overview_url.to_string(),
                message: e.to_string(),
            })?;

        let (excluded, listed): (Vec<_>, Vec<_>) = links
            .into_iter()
            .partition(|link| self.excluded.contains(&link.title));
        for link in &excluded {
            log::debug!("Skipping excluded course '{}'", link.title);
        }

        let mut seen = HashSet::new();
        let kept: Vec<_> = listed
            .into_iter()
            .filter(|link| {
                let first = seen.insert(link.url.clone());
                if !first {
                    log::debug!("Skipping repeated course link {}", link.url);
                }
                first
            })
            .collect();
        log::debug!(
            "Discovered {} courses ({} excluded)",
            kept.len(),
            excluded.len()
        );
        Ok(kept)
    }

    /// Time the last run completed, if any.
    pub fn status(&self) -> Option<DateTime<Utc>> {
        *self.last_synced_at.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_running(&self) -> bool {
        self.guard.is_running()
    }

    /// Wait for an in-flight run to finish without starting a new one.
    pub async fn wait_until_idle(&self) {
        while self.guard.is_running() {
            tokio::time::sleep(IDLE_POLL_INTERVAL).await;
        }
    }

    /// Keys of all stored snapshots.
    pub async fn list_entities(&self) -> Result<Vec<String>> {
        self.store.list().await
    }

    /// Last persisted rows of one course.
    pub async fn entity_snapshot(&self, name: &str) -> Result<Vec<GradeRow>> {
        self.store.get(name).await
    }
}

impl CourseContext {
    /// Process one course. Returns whether it completed.
    async fn sync_course(self, link: CourseLink) -> bool {
        match self.try_sync_course(&link).await {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to sync '{}' ({}): {}", link.title, link.url, e);
                false
            }
        }
    }

    async fn try_sync_course(&self, link: &CourseLink) -> Result<()> {
        let page = self.fetcher.fetch(&link.url).await?;
        let course = self.extractor.extract_course(&page)?;

        let previous = match self.store.get(&course.name).await {
            Ok(rows) => Some(rows),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };

        if let Some(old) = previous {
            let found = compare(&course.name, &old, &course.rows);
            log::debug!("Course '{}': {} changes", course.name, found.len());
            if !found.is_empty() {
                self.changes
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .extend(found);
            }
        } else {
            log::info!("First snapshot of '{}'", course.name);
        }

        self.store.put(&course.name, &course.rows).await
    }
}
