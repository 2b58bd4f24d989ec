//! The polling watcher: index, compare, produce and emit on a timer.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::comparator::compare;
use crate::config::Configuration;
use crate::emitter::{Emitter, Listener};
use crate::error::{Result, WatcherError};
use crate::event::{EventKind, produce};
use crate::fs::{FileSystem, LocalFileSystem};
use crate::index::Index;
use crate::indexer::Indexer;
use crate::timer::RepeatingTimer;

/// What one polling cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// First cycle: the snapshot became the baseline and nothing was compared.
    pub baseline: bool,

    /// Nodes in the new snapshot.
    pub nodes: usize,

    /// Events emitted.
    pub events: usize,

    /// Listener invocations that failed or panicked.
    pub failed_deliveries: usize,
}

/// The snapshot-diff-emit pipeline and the slot holding the last snapshot.
#[derive(Debug)]
struct Pipeline {
    configuration: Configuration,
    indexer: Indexer,
    emitter: Arc<Emitter>,
    /// Held for the whole cycle, so cycles are serialized.
    index: Mutex<Option<Index>>,
}

impl Pipeline {
    async fn run_cycle(&self) -> CycleReport {
        let mut slot = self.index.lock().await;

        let new_index = self.indexer.index(&self.configuration).await;
        let mut report = CycleReport {
            nodes: new_index.len(),
            ..Default::default()
        };

        // Replaced before anything else can fail, so the next cycle always
        // compares against the latest snapshot.
        let Some(old_index) = slot.replace(new_index.clone()) else {
            debug!("Baseline snapshot taken with {} nodes", report.nodes);
            report.baseline = true;
            return report;
        };

        let result = compare(&old_index, &new_index, &self.configuration);
        if result.is_empty() {
            return report;
        }

        debug!("Detected {} changes", result.len());
        for event in produce(result, &old_index, &new_index, &self.configuration) {
            let delivery = self.emitter.emit(&event).await;
            report.events += 1;
            report.failed_deliveries += delivery.failures;
        }

        report
    }
}

/// Aborts the task behind `handle` when dropped.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Watches the configured directories by polling.
///
/// The first cycle only records a baseline; every later cycle compares the
/// fresh snapshot with the previous one and emits one event per change, in
/// order, waiting for all listeners of an event before emitting the next.
///
/// A watcher starts disabled. It must be created inside a tokio runtime and
/// stops polling when dropped.
#[derive(Debug)]
pub struct Watcher {
    pipeline: Arc<Pipeline>,
    timer: RepeatingTimer,
}

impl Watcher {
    /// Create a watcher over the local filesystem.
    pub fn create(configuration: Configuration) -> Result<Self> {
        Self::with_file_system(configuration, Arc::new(LocalFileSystem::new()))
    }

    /// Create a watcher over any filesystem implementation.
    pub fn with_file_system(
        configuration: Configuration,
        fs: Arc<dyn FileSystem>,
    ) -> Result<Self> {
        configuration.validate()?;
        let period = configuration
            .poll_interval_duration()
            .ok_or(WatcherError::InvalidPollInterval(configuration.poll_interval))?;

        Handle::try_current()
            .map_err(|e| WatcherError::Config(format!("watcher needs a tokio runtime: {e}")))?;

        let pipeline = Arc::new(Pipeline {
            configuration,
            indexer: Indexer::new(fs),
            emitter: Arc::new(Emitter::new()),
            index: Mutex::new(None),
        });

        let timer = {
            let pipeline = pipeline.clone();
            RepeatingTimer::spawn(period, move || {
                let pipeline = pipeline.clone();
                async move {
                    // A panicking cycle must not take the timer down with it.
                    let cycle = tokio::spawn(async move { pipeline.run_cycle().await });
                    // Dropped with this future when the timer is cancelled.
                    let _abort = AbortOnDrop(cycle.abort_handle());
                    match cycle.await {
                        Ok(_) => {}
                        Err(e) if e.is_cancelled() => {}
                        Err(e) => warn!("Watch cycle panicked: {e}"),
                    }
                }
            })
        };

        Ok(Self { pipeline, timer })
    }

    pub fn configuration(&self) -> &Configuration {
        &self.pipeline.configuration
    }

    /// Register a listener for one kind of event.
    pub fn register<L: Listener>(&self, kind: EventKind, listener: L) {
        self.pipeline.emitter.register(kind, listener);
    }

    /// Register one shared listener for one kind of event.
    pub fn register_shared(&self, kind: EventKind, listener: Arc<dyn Listener>) {
        self.pipeline.emitter.register_shared(kind, listener);
    }

    /// Start polling. Idempotent.
    pub fn enable(&self) {
        if !self.timer.is_enabled() {
            info!(
                "Watching {} directories every {}s",
                self.pipeline.configuration.directories.len(),
                self.pipeline.configuration.poll_interval
            );
        }
        self.timer.enable();
    }

    /// Stop polling. A cycle already running is allowed to finish.
    pub fn disable(&self) {
        if self.timer.is_enabled() {
            info!("Watcher disabled");
        }
        self.timer.disable();
    }

    pub fn is_enabled(&self) -> bool {
        self.timer.is_enabled()
    }

    /// Mark the watcher as keeping its host alive.
    pub fn reference(&self) {
        self.timer.reference();
    }

    /// Mark the watcher as not keeping its host alive.
    pub fn unreference(&self) {
        self.timer.unreference();
    }

    pub fn is_referenced(&self) -> bool {
        self.timer.is_referenced()
    }

    /// Resolves once the watcher is unreferenced or cancelled. Hosts that
    /// should live as long as the watcher is referenced await this.
    pub async fn unreferenced(&self) {
        self.timer.unreferenced().await;
    }

    /// Stop polling for good. A cycle started by the timer is aborted where
    /// it stands, along with any listeners it is waiting on; cycles started
    /// with [`run_cycle`](Self::run_cycle) are not affected.
    pub fn cancel(&self) {
        self.timer.cancel();
    }

    /// Run one cycle now, outside the timer.
    ///
    /// Waits for any cycle already in progress; cycles never overlap.
    pub async fn run_cycle(&self) -> CycleReport {
        self.pipeline.run_cycle().await
    }

    /// The snapshot taken by the most recent cycle, if any.
    pub async fn current_index(&self) -> Option<Index> {
        self.pipeline.index.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::fs::MemoryFileSystem;
    use crate::node::Statistics;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::ffi::OsString;
    use std::path::Path;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// Panics on the first directory listing, then behaves.
    #[derive(Debug)]
    struct PanicsOnce {
        inner: MemoryFileSystem,
        tripped: AtomicBool,
    }

    #[async_trait]
    impl FileSystem for PanicsOnce {
        async fn exists(&self, path: &Path) -> bool {
            self.inner.exists(path).await
        }

        async fn is_dir(&self, path: &Path) -> bool {
            self.inner.is_dir(path).await
        }

        async fn list_entries(&self, path: &Path) -> Result<Vec<OsString>> {
            if !self.tripped.swap(true, Ordering::SeqCst) {
                panic!("listing blew up");
            }
            self.inner.list_entries(path).await
        }

        async fn stat(&self, path: &Path) -> Option<Statistics> {
            self.inner.stat(path).await
        }
    }

    type Log = Arc<StdMutex<Vec<(EventKind, String)>>>;

    fn record_all(watcher: &Watcher) -> Log {
        let log: Log = Arc::default();
        for kind in EventKind::ALL {
            let log = log.clone();
            watcher.register(kind, move |event: Event| {
                let log = log.clone();
                async move {
                    let path = event.node()?.path.to_string_lossy().into_owned();
                    log.lock().unwrap().push((event.kind, path));
                    anyhow::Ok(())
                }
            });
        }
        log
    }

    fn memory_watcher(fs: &MemoryFileSystem, configuration: Configuration) -> Watcher {
        Watcher::with_file_system(configuration, Arc::new(fs.clone())).unwrap()
    }

    #[tokio::test]
    async fn test_first_cycle_is_baseline() {
        let fs = MemoryFileSystem::new();
        fs.write("/w/a.txt", "a");
        let watcher = memory_watcher(&fs, Configuration::new().with_directories(["/w"]));
        let log = record_all(&watcher);

        let first = watcher.run_cycle().await;
        assert!(first.baseline);
        assert_eq!(first.nodes, 2);

        let second = watcher.run_cycle().await;
        assert!(!second.baseline);
        assert_eq!(second.events, 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cycle_emits_in_block_order() {
        let fs = MemoryFileSystem::new();
        fs.write("/w/keep.txt", "k");
        fs.write("/w/old.txt", "o");
        fs.write("/w/gone.txt", "g");
        let watcher = memory_watcher(
            &fs,
            Configuration::new()
                .with_directories(["/w"])
                .with_watch_directories(false),
        );
        let log = record_all(&watcher);
        watcher.run_cycle().await;

        fs.write("/w/new.txt", "n");
        fs.rename("/w/old.txt", "/w/renamed.txt").unwrap();
        fs.remove("/w/gone.txt").unwrap();
        let report = watcher.run_cycle().await;

        assert_eq!(report.events, 3);
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                (EventKind::Created, "/w/new.txt".to_string()),
                (EventKind::Moved, "/w/renamed.txt".to_string()),
                (EventKind::Deleted, "/w/gone.txt".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_failing_listener_does_not_stop_the_cycle() {
        let fs = MemoryFileSystem::new();
        fs.create_dir("/w");
        let watcher = memory_watcher(
            &fs,
            Configuration::new()
                .with_directories(["/w"])
                .with_watch_directories(false),
        );
        watcher.register(EventKind::Created, |_event: Event| async move {
            Err::<(), _>(anyhow::anyhow!("boom"))
        });
        let log = record_all(&watcher);
        watcher.run_cycle().await;

        fs.write("/w/a.txt", "a");
        fs.write("/w/b.txt", "b");
        let report = watcher.run_cycle().await;

        assert_eq!(report.events, 2);
        assert_eq!(report.failed_deliveries, 2);
        assert_eq!(log.lock().unwrap().len(), 2);
        assert_eq!(watcher.current_index().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_lifecycle_flags() {
        let watcher =
            memory_watcher(&MemoryFileSystem::new(), Configuration::new());

        assert!(!watcher.is_enabled());
        assert!(watcher.is_referenced());

        watcher.enable();
        watcher.enable();
        assert!(watcher.is_enabled());
        watcher.disable();
        watcher.disable();
        assert!(!watcher.is_enabled());

        watcher.unreference();
        assert!(!watcher.is_referenced());
        watcher.reference();
        assert!(watcher.is_referenced());
    }

    #[tokio::test]
    async fn test_rejects_invalid_interval() {
        let result = Watcher::with_file_system(
            Configuration::new().with_poll_interval(0.0),
            Arc::new(MemoryFileSystem::new()),
        );
        assert!(matches!(result, Err(WatcherError::InvalidPollInterval(_))));
    }

    #[test]
    fn test_requires_runtime() {
        let result = Watcher::with_file_system(
            Configuration::new(),
            Arc::new(MemoryFileSystem::new()),
        );
        assert!(matches!(result, Err(WatcherError::Config(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_survives_a_panicking_cycle() {
        let fs = MemoryFileSystem::new();
        fs.create_dir("/w");
        let flaky = PanicsOnce {
            inner: fs.clone(),
            tripped: AtomicBool::new(false),
        };
        let watcher = Watcher::with_file_system(
            Configuration::new()
                .with_directories(["/w"])
                .with_watch_directories(false)
                .with_poll_interval(0.1),
            Arc::new(flaky),
        )
        .unwrap();
        let log = record_all(&watcher);
        watcher.enable();

        // First firing panics and leaves no baseline behind.
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(watcher.current_index().await.is_none());
        assert!(watcher.is_enabled());

        // Second firing takes the baseline.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(watcher.current_index().await.is_some());

        fs.write("/w/a.txt", "a");
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(
            *log.lock().unwrap(),
            vec![(EventKind::Created, "/w/a.txt".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_cycle_in_flight() {
        let fs = MemoryFileSystem::new();
        fs.create_dir("/w");
        let watcher = memory_watcher(
            &fs,
            Configuration::new()
                .with_directories(["/w"])
                .with_watch_directories(false)
                .with_poll_interval(0.1),
        );

        let started = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        {
            let (started, finished) = (started.clone(), finished.clone());
            watcher.register(EventKind::Created, move |_event: Event| {
                let (started, finished) = (started.clone(), finished.clone());
                async move {
                    started.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                    anyhow::Ok(())
                }
            });
        }
        watcher.enable();
        tokio::time::sleep(Duration::from_millis(150)).await;

        fs.write("/w/a.txt", "a");
        fs.write("/w/b.txt", "b");
        // Second firing is now blocked on the first listener.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(started.load(Ordering::SeqCst), 1);

        watcher.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_drives_cycles() {
        let fs = MemoryFileSystem::new();
        fs.create_dir("/w");
        let watcher = memory_watcher(
            &fs,
            Configuration::new()
                .with_directories(["/w"])
                .with_poll_interval(0.1),
        );
        let log = record_all(&watcher);
        watcher.enable();

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(watcher.current_index().await.is_some());

        fs.write("/w/a.txt", "a");
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                (EventKind::Created, "/w/a.txt".to_string()),
                (EventKind::Modified, "/w".to_string()),
            ]
        );

        watcher.disable();
        fs.write("/w/b.txt", "b");
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(log.lock().unwrap().len(), 2);
    }
}
