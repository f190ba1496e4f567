//! File watching for live reload.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use kiln_pipeline::{AssetClass, Layout};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as async_mpsc;

const DEBOUNCE: Duration = Duration::from_millis(100);

/// How a source file changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

/// Changes to source files of one asset class.
///
/// Changes that land within the debounce window are coalesced; `paths` lists
/// every file touched and `kind` is the most recent change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub class: AssetClass,
    pub paths: Vec<PathBuf>,
    pub kind: ChangeKind,
}

/// File watcher for detecting source changes.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Watch the layout's source tree.
    ///
    /// Returns the watcher and a channel to receive classified events.
    pub fn new(
        layout: &Layout,
    ) -> Result<(Self, async_mpsc::Receiver<WatchEvent>), std::io::Error> {
        let (sync_tx, sync_rx) = mpsc::channel();
        let (async_tx, async_rx) = async_mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
            if let Ok(event) = res {
                let _ = sync_tx.send(event);
            }
        })
        .map_err(std::io::Error::other)?;

        if layout.src.exists() {
            watcher
                .watch(&layout.src, RecursiveMode::Recursive)
                .map_err(std::io::Error::other)?;
        } else {
            tracing::warn!("Source directory {} does not exist", layout.src.display());
        }

        let layout = layout.clone();
        std::thread::spawn(move || {
            let mut debouncer = Debouncer::default();

            loop {
                let received = match debouncer.next_deadline() {
                    Some(deadline) => {
                        let wait = deadline.saturating_duration_since(Instant::now());
                        match sync_rx.recv_timeout(wait) {
                            Ok(event) => Some(event),
                            Err(mpsc::RecvTimeoutError::Timeout) => None,
                            Err(mpsc::RecvTimeoutError::Disconnected) => return,
                        }
                    }
                    None => match sync_rx.recv() {
                        Ok(event) => Some(event),
                        Err(_) => return,
                    },
                };

                if let Some(event) = received {
                    for path in &event.paths {
                        if let Some(watch_event) = classify_event(&layout, path, &event.kind) {
                            debouncer.push(watch_event, Instant::now());
                        }
                    }
                }

                for watch_event in debouncer.take_due(Instant::now()) {
                    if async_tx.blocking_send(watch_event).is_err() {
                        return;
                    }
                }
            }
        });

        Ok((Self { _watcher: watcher }, async_rx))
    }
}

/// Holds changes per class until the class has been quiet for the window.
#[derive(Debug, Default)]
struct Debouncer {
    pending: HashMap<AssetClass, (WatchEvent, Instant)>,
}

impl Debouncer {
    /// Queue a change, pushing its class's deadline back.
    fn push(&mut self, event: WatchEvent, now: Instant) {
        let deadline = now + DEBOUNCE;
        match self.pending.get_mut(&event.class) {
            Some((pending, due)) => {
                for path in event.paths {
                    if !pending.paths.contains(&path) {
                        pending.paths.push(path);
                    }
                }
                pending.kind = event.kind;
                *due = deadline;
            }
            None => {
                self.pending.insert(event.class, (event, deadline));
            }
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|(_, due)| *due).min()
    }

    /// Remove and return every class whose window has closed.
    fn take_due(&mut self, now: Instant) -> Vec<WatchEvent> {
        let due: Vec<AssetClass> = self
            .pending
            .iter()
            .filter(|(_, (_, deadline))| *deadline <= now)
            .map(|(class, _)| *class)
            .collect();

        due.into_iter()
            .filter_map(|class| self.pending.remove(&class))
            .map(|(event, _)| event)
            .collect()
    }
}

/// Classify a notify event into a WatchEvent.
fn classify_event(layout: &Layout, path: &Path, kind: &notify::EventKind) -> Option<WatchEvent> {
    use notify::EventKind;

    let kind = match kind {
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Modify(_) => ChangeKind::Modified,
        EventKind::Remove(_) => ChangeKind::Removed,
        _ => return None,
    };

    // Directory events carry no asset of their own
    if kind != ChangeKind::Removed && path.is_dir() {
        return None;
    }

    let class = layout.classify(path)?;
    Some(WatchEvent {
        class,
        paths: vec![path.to_path_buf()],
        kind,
    })
}
