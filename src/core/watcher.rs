use crate::utils::error::Result;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Single pending timer: every new event replaces the pending path and
/// restarts the countdown.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Option<(PathBuf, Instant)>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn record(&mut self, path: PathBuf, now: Instant) {
        self.pending = Some((path, now + self.delay));
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, deadline)| *deadline)
    }

    /// 計時器到期時取出待處理的檔案
    pub fn due(&mut self, now: Instant) -> Option<PathBuf> {
        match &self.pending {
            Some((_, deadline)) if *deadline <= now => self.pending.take().map(|(path, _)| path),
            _ => None,
        }
    }
}

pub struct SaveWatcher {
    directory: PathBuf,
    debounce: Duration,
    extensions: Vec<String>,
}

impl SaveWatcher {
    pub fn new(directory: impl Into<PathBuf>, debounce: Duration, extensions: Vec<String>) -> Self {
        Self {
            directory: directory.into(),
            debounce,
            extensions,
        }
    }

    pub fn is_relevant(&self, path: &Path) -> bool {
        if path.is_dir() {
            return false;
        }
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }

    /// 新建立的存檔與修改視為同一種事件
    pub fn accepted_paths(&self, event: &Event) -> Vec<PathBuf> {
        match event.kind {
            EventKind::Create(_) | EventKind::Modify(_) => event
                .paths
                .iter()
                .filter(|p| self.is_relevant(p))
                .cloned()
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Watches until Ctrl-C.
    pub async fn run<F, Fut>(&self, handler: F) -> Result<()>
    where
        F: FnMut(PathBuf) -> Fut,
        Fut: Future<Output = ()>,
    {
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        };
        self.run_until(handler, shutdown).await
    }

    pub async fn run_until<F, Fut, S>(&self, mut handler: F, shutdown: S) -> Result<()>
    where
        F: FnMut(PathBuf) -> Fut,
        Fut: Future<Output = ()>,
        S: Future<Output = ()>,
    {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.send(res);
        })?;
        watcher.watch(&self.directory, RecursiveMode::NonRecursive)?;
        tracing::info!("Starting Watcher on: {}", self.directory.display());

        let mut debouncer = Debouncer::new(self.debounce);
        tokio::pin!(shutdown);

        loop {
            let deadline = debouncer.deadline();
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Stopping watcher...");
                    break;
                }
                received = rx.recv() => match received {
                    Some(Ok(event)) => {
                        for path in self.accepted_paths(&event) {
                            tracing::debug!("Save event for {}", path.display());
                            debouncer.record(path, Instant::now());
                        }
                    }
                    Some(Err(e)) => tracing::warn!("Watch error: {}", e),
                    None => break,
                },
                _ = sleep_until_deadline(deadline) => {
                    if let Some(path) = debouncer.due(Instant::now()) {
                        tracing::info!("Change detected: {}. Processing...", path.display());
                        handler(path).await;
                    }
                }
            }
        }

        Ok(())
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};
    use tempfile::TempDir;

    fn watcher() -> SaveWatcher {
        SaveWatcher::new(
            "Saves",
            Duration::from_secs(2),
            vec!["gz".to_string(), "json".to_string()],
        )
    }

    #[test]
    fn test_debouncer_restarts_timer_on_each_event() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_secs(2));

        debouncer.record(PathBuf::from("a.gz"), start);
        debouncer.record(PathBuf::from("b.gz"), start + Duration::from_millis(1500));

        // 第一個事件的期限已過，但計時器已被重設
        assert_eq!(debouncer.due(start + Duration::from_millis(2100)), None);
        assert_eq!(
            debouncer.deadline(),
            Some(start + Duration::from_millis(3500))
        );
        assert_eq!(
            debouncer.due(start + Duration::from_millis(3500)),
            Some(PathBuf::from("b.gz"))
        );
        assert_eq!(debouncer.deadline(), None);
        assert_eq!(debouncer.due(start + Duration::from_secs(10)), None);
    }

    #[test]
    fn test_accepted_paths_filters_kind_and_extension() {
        let w = watcher();

        let created = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("Autosave1_2025-1-1.gz"))
            .add_path(PathBuf::from("Autosave1_2025-1-1.gz.tmp"));
        assert_eq!(
            w.accepted_paths(&created),
            vec![PathBuf::from("Autosave1_2025-1-1.gz")]
        );

        let modified = Event::new(EventKind::Modify(ModifyKind::Any)).add_path(PathBuf::from("debug.JSON"));
        assert_eq!(w.accepted_paths(&modified).len(), 1);

        let removed = Event::new(EventKind::Remove(RemoveKind::File)).add_path(PathBuf::from("old.gz"));
        assert!(w.accepted_paths(&removed).is_empty());
    }

    #[test]
    fn test_directories_are_ignored() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("backup.gz");
        std::fs::create_dir(&sub).unwrap();

        assert!(!watcher().is_relevant(&sub));
    }

    #[tokio::test]
    async fn test_run_until_stops_on_shutdown() {
        let dir = TempDir::new().unwrap();
        let w = SaveWatcher::new(dir.path(), Duration::from_millis(50), vec!["gz".to_string()]);

        let mut calls = 0;
        w.run_until(
            |_path| {
                calls += 1;
                async {}
            },
            async {},
        )
        .await
        .unwrap();

        assert_eq!(calls, 0);
    }

    #[tokio::test]
    async fn test_burst_of_saves_handled_once_with_last_path() {
        let dir = TempDir::new().unwrap();
        let debounce = Duration::from_millis(300);
        let w = SaveWatcher::new(dir.path(), debounce, vec!["sav".to_string()]);
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

        let mut calls: Vec<(PathBuf, Instant)> = Vec::new();
        let mut last_write = None;

        tokio::join!(
            w.run_until(
                |path| {
                    calls.push((path, Instant::now()));
                    async {}
                },
                async {
                    let _ = stop_rx.await;
                },
            ),
            async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                std::fs::write(dir.path().join("Autosave1.sav"), b"first").unwrap();
                tokio::time::sleep(Duration::from_millis(50)).await;
                std::fs::write(dir.path().join("Autosave2.sav"), b"second").unwrap();
                last_write = Some(Instant::now());

                tokio::time::sleep(Duration::from_millis(1500)).await;
                let _ = stop_tx.send(());
            },
        )
        .0
        .unwrap();

        assert_eq!(calls.len(), 1, "expected one debounced call, got {:?}", calls);
        let (path, at) = &calls[0];
        assert_eq!(path.file_name().unwrap(), "Autosave2.sav");
        assert!(*at >= last_write.unwrap() + debounce);
    }
}
