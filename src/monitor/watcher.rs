//! Live filesystem event capture for one directory.
//!
//! A `notify` watcher pushes raw notifications onto a bounded channel; a
//! consumer task classifies them, pairs rename halves into a single "moved"
//! event, and appends one audit line per event. Stopping cancels the token the
//! callback checks, drops the OS watch, and waits for the consumer to write
//! what was already queued, so nothing is logged once `stop` returns.

use crate::config::MonitorConfig;
use crate::io::logs::format_audit_line;
use crate::models::{AuditEvent, WatchEventKind};
use crate::services::clock::ReportClock;
use crate::services::principal::current_principal;
use crate::{Error, Result};
use notify::event::{CreateKind, EventKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// Knobs shared by every watcher of a registry
#[derive(Debug, Clone)]
pub struct WatchSettings {
    pub channel_capacity: usize,
    pub rename_window: Duration,
    pub clock: ReportClock,
}

impl WatchSettings {
    pub fn from_config(config: &MonitorConfig) -> Result<Self> {
        Ok(Self {
            channel_capacity: config.event_channel_capacity.max(1),
            rename_window: config.rename_window(),
            clock: config.clock()?,
        })
    }
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            rename_window: Duration::from_millis(250),
            clock: ReportClock::local(),
        }
    }
}

/// Recursive watch over one directory, appending to one audit log.
pub struct EventWatcher {
    directory: PathBuf,
    audit_log: PathBuf,
    settings: WatchSettings,
    active: Option<ActiveWatch>,
}

struct ActiveWatch {
    watcher: RecommendedWatcher,
    cancel: CancellationToken,
    consumer: JoinHandle<()>,
}

enum WatchMessage {
    Event(Event),
    Error(String),
}

impl fmt::Debug for EventWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventWatcher")
            .field("directory", &self.directory)
            .field("audit_log", &self.audit_log)
            .field("settings", &self.settings)
            .field("active", &self.is_active())
            .finish()
    }
}

impl EventWatcher {
    #[must_use]
    pub fn new(directory: PathBuf, audit_log: PathBuf, settings: WatchSettings) -> Self {
        Self {
            directory,
            audit_log,
            settings,
            active: None,
        }
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    #[must_use]
    pub fn audit_log(&self) -> &Path {
        &self.audit_log
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Begin watching. A watch that is already running is stopped first, so
    /// repeated starts never stack duplicate loggers.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// `Error::WatchSetup` when the OS refuses the recursive watch; no watcher
    /// or consumer is left running in that case.
    pub async fn start(&mut self) -> Result<()> {
        self.stop().await;

        let (tx, rx) = mpsc::channel::<WatchMessage>(self.settings.channel_capacity);
        let cancel = CancellationToken::new();
        let watcher = build_watcher(&self.directory, tx, cancel.clone())?;

        let sink = AuditSink::new(self.audit_log.clone(), self.settings.clock);
        let consumer = tokio::spawn(consume_events(
            rx,
            cancel.clone(),
            sink,
            self.settings.rename_window,
        ));

        log::info!(
            "Watching {} (audit log: {})",
            self.directory.display(),
            self.audit_log.display()
        );

        self.active = Some(ActiveWatch {
            watcher,
            cancel,
            consumer,
        });
        Ok(())
    }

    /// Stop watching. Safe to call when the watcher was never started.
    pub async fn stop(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };

        active.cancel.cancel();
        // Dropping the watcher releases the OS watch handle.
        drop(active.watcher);

        if let Err(err) = active.consumer.await {
            log::error!(
                "Audit consumer for {} ended abnormally: {err}",
                self.directory.display()
            );
        }

        log::info!("Stopped watching {}", self.directory.display());
    }
}

impl Drop for EventWatcher {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
            active.consumer.abort();
        }
    }
}

fn build_watcher(
    directory: &Path,
    tx: mpsc::Sender<WatchMessage>,
    cancel: CancellationToken,
) -> Result<RecommendedWatcher> {
    let setup_error = |source: notify::Error| Error::WatchSetup {
        path: directory.to_string_lossy().to_string(),
        source,
    };

    let label = directory.to_path_buf();
    let mut watcher = RecommendedWatcher::new(
        move |res: std::result::Result<Event, notify::Error>| {
            if cancel.is_cancelled() {
                return;
            }
            let msg = match res {
                Ok(event) => WatchMessage::Event(event),
                Err(err) => WatchMessage::Error(err.to_string()),
            };
            if let Err(err) = tx.blocking_send(msg) {
                log::warn!("Watch channel for {} closed: {err}", label.display());
            }
        },
        NotifyConfig::default(),
    )
    .map_err(setup_error)?;

    watcher
        .watch(directory, RecursiveMode::Recursive)
        .map_err(setup_error)?;

    Ok(watcher)
}

async fn consume_events(
    mut rx: mpsc::Receiver<WatchMessage>,
    cancel: CancellationToken,
    mut sink: AuditSink,
    rename_window: Duration,
) {
    let mut classifier = EventClassifier::default();

    loop {
        let msg = if classifier.has_pending() {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                received = timeout(rename_window, rx.recv()) => match received {
                    Ok(msg) => msg,
                    Err(_) => {
                        sink.write(classifier.flush()).await;
                        continue;
                    }
                },
            }
        } else {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                msg = rx.recv() => msg,
            }
        };

        let Some(msg) = msg else {
            break;
        };
        handle_message(msg, &mut classifier, &mut sink).await;
    }

    // Anything queued before the stop still belongs in the log.
    while let Ok(msg) = rx.try_recv() {
        handle_message(msg, &mut classifier, &mut sink).await;
    }
    sink.write(classifier.flush()).await;
}

async fn handle_message(msg: WatchMessage, classifier: &mut EventClassifier, sink: &mut AuditSink) {
    match msg {
        WatchMessage::Event(event) => {
            let classified = classifier.classify(&event);
            sink.write(classified).await;
        }
        WatchMessage::Error(error) => {
            log::error!("Watch backend error for {}: {error}", sink.path.display());
        }
    }
}

/// A notification reduced to one of the audit event kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedEvent {
    pub kind: WatchEventKind,
    pub path: PathBuf,
    pub destination: Option<PathBuf>,
}

impl ClassifiedEvent {
    fn new(kind: WatchEventKind, path: PathBuf) -> Self {
        Self {
            kind,
            path,
            destination: None,
        }
    }
}

/// Turns raw `notify` events into audit events.
///
/// Backends report renames differently: inotify sends `From`, `To` and then
/// `Both`; Windows sends `From` then `To`; FSEvents sends `Any` for each side.
/// The classifier pairs the halves into one moved event. A `From` that never
/// finds its partner (the entry left the watched tree) is reported as deleted
/// by [`EventClassifier::flush`]; a lone `To` is reported as created.
#[derive(Debug, Default)]
pub struct EventClassifier {
    pending_from: Option<PathBuf>,
    last_move: Option<(PathBuf, PathBuf)>,
    known_dirs: HashSet<PathBuf>,
}

impl EventClassifier {
    /// True while a rename source waits for its destination.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending_from.is_some()
    }

    /// Report a waiting rename source as deleted.
    pub fn flush(&mut self) -> Vec<ClassifiedEvent> {
        match self.pending_from.take() {
            Some(path) => {
                let is_dir = self.known_dirs.remove(&path);
                vec![ClassifiedEvent::new(WatchEventKind::deleted(is_dir), path)]
            }
            None => Vec::new(),
        }
    }

    pub fn classify(&mut self, event: &Event) -> Vec<ClassifiedEvent> {
        match &event.kind {
            EventKind::Modify(ModifyKind::Name(mode)) => self.classify_rename(*mode, &event.paths),
            EventKind::Create(kind) => {
                let mut out = self.flush();
                self.last_move = None;
                for path in &event.paths {
                    let is_dir = match kind {
                        CreateKind::Folder => true,
                        CreateKind::File => false,
                        _ => path.is_dir(),
                    };
                    if is_dir {
                        self.known_dirs.insert(path.clone());
                    }
                    out.push(ClassifiedEvent::new(
                        WatchEventKind::created(is_dir),
                        path.clone(),
                    ));
                }
                out
            }
            EventKind::Remove(kind) => {
                let mut out = self.flush();
                self.last_move = None;
                for path in &event.paths {
                    let was_known = self.known_dirs.remove(path);
                    let is_dir = match kind {
                        RemoveKind::Folder => true,
                        RemoveKind::File => false,
                        _ => was_known,
                    };
                    out.push(ClassifiedEvent::new(
                        WatchEventKind::deleted(is_dir),
                        path.clone(),
                    ));
                }
                out
            }
            EventKind::Modify(_) => {
                let mut out = self.flush();
                for path in &event.paths {
                    out.push(ClassifiedEvent::new(
                        WatchEventKind::modified(path.is_dir()),
                        path.clone(),
                    ));
                }
                out
            }
            EventKind::Access(_) | EventKind::Any | EventKind::Other => {
                log::trace!("Ignoring notification {:?} for {:?}", event.kind, event.paths);
                Vec::new()
            }
        }
    }

    fn classify_rename(&mut self, mode: RenameMode, paths: &[PathBuf]) -> Vec<ClassifiedEvent> {
        match mode {
            RenameMode::Both => {
                let (Some(from), Some(to)) = (paths.first(), paths.get(1)) else {
                    return Vec::new();
                };
                if self
                    .last_move
                    .as_ref()
                    .is_some_and(|(src, dst)| src == from && dst == to)
                {
                    self.last_move = None;
                    return Vec::new();
                }
                if self.pending_from.as_ref() == Some(from) {
                    self.pending_from = None;
                }
                let mut out = self.flush();
                out.push(self.moved(from.clone(), to.clone()));
                out
            }
            RenameMode::From => {
                let mut out = self.flush();
                self.pending_from = paths.first().cloned();
                out.extend(paths.iter().skip(1).cloned().map(|path| {
                    let is_dir = self.known_dirs.remove(&path);
                    ClassifiedEvent::new(WatchEventKind::deleted(is_dir), path)
                }));
                out
            }
            RenameMode::To => paths.iter().map(|to| self.arrived(to.clone())).collect(),
            RenameMode::Any | RenameMode::Other => {
                let mut out = Vec::new();
                for path in paths {
                    if path.exists() {
                        out.push(self.arrived(path.clone()));
                    } else {
                        out.extend(self.flush());
                        self.pending_from = Some(path.clone());
                    }
                }
                out
            }
        }
    }

    /// Destination half of a rename.
    fn arrived(&mut self, to: PathBuf) -> ClassifiedEvent {
        match self.pending_from.take() {
            Some(from) => {
                let event = self.moved(from.clone(), to.clone());
                self.last_move = Some((from, to));
                event
            }
            None => {
                let is_dir = to.is_dir();
                if is_dir {
                    self.known_dirs.insert(to.clone());
                }
                ClassifiedEvent::new(WatchEventKind::created(is_dir), to)
            }
        }
    }

    fn moved(&mut self, from: PathBuf, to: PathBuf) -> ClassifiedEvent {
        let is_dir = self.known_dirs.remove(&from) || to.is_dir();
        if is_dir {
            self.known_dirs.insert(to.clone());
        }
        ClassifiedEvent {
            kind: WatchEventKind::moved(is_dir),
            path: from,
            destination: Some(to),
        }
    }
}

/// Appends formatted audit lines to the log file, opening it lazily.
struct AuditSink {
    path: PathBuf,
    principal: String,
    clock: ReportClock,
    file: Option<tokio::fs::File>,
}

impl AuditSink {
    fn new(path: PathBuf, clock: ReportClock) -> Self {
        Self {
            path,
            principal: current_principal(),
            clock,
            file: None,
        }
    }

    async fn write(&mut self, events: Vec<ClassifiedEvent>) {
        if events.is_empty() {
            return;
        }

        let mut text = String::new();
        for event in events {
            let audit = AuditEvent {
                occurred_at: self.clock.now_naive(),
                principal: self.principal.clone(),
                kind: event.kind,
                path: event.path.to_string_lossy().to_string(),
                destination: event
                    .destination
                    .map(|dest| dest.to_string_lossy().to_string()),
            };
            let line = format_audit_line(&audit);
            log::debug!("{line}");
            text.push_str(&line);
            text.push('\n');
        }

        if let Err(err) = self.append(text.as_bytes()).await {
            log::error!("Failed to append to {}: {err}", self.path.display());
            self.file = None;
        }
    }

    async fn append(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        if self.file.is_none() {
            if let Some(parent) = self.path.parent()
                && !parent.as_os_str().is_empty()
            {
                tokio::fs::create_dir_all(parent).await?;
            }
            let file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await?;
            self.file = Some(file);
        }

        if let Some(file) = self.file.as_mut() {
            file.write_all(bytes).await?;
            file.flush().await?;
        }
        Ok(())
    }
}
