//! Live tail of a newline-delimited log file.
//!
//! The tailer follows one file across truncations and recreations and hands
//! complete lines to the consumer in file order. A background task owns the
//! file handle; the consumer only sees three hand-off points:
//!
//! - a bounded line queue (backpressure, never drops),
//! - a single-slot [`ErrorSlot`] where a new error replaces an unread one,
//! - a [`TailStatus`] watch channel describing the current phase.
//!
//! # Sessions
//!
//! The producing agent never says when it is done, so session boundaries are
//! inferred:
//!
//! ```text
//! Opening -> Tailing                (content up to EOF drained)
//! Tailing -> SessionEnded           (idle window elapsed, or file removed/renamed)
//! SessionEnded -> WaitingForNewSession
//! WaitingForNewSession -> Opening   (size, mtime or file identity changed)
//! Any -> Closed                     (stop)
//! ```
//!
//! Write notifications come from a `notify` watch on the parent directory.
//! While waiting for a new session the file is also polled, since removal and
//! recreation are not reliably reported by every backend. If the watch channel
//! closes, tailing continues on the poll alone.
//!
//! A truncation is spotted when the file shrinks below the offset. A rewrite
//! that leaves it longer is spotted by comparing the first bytes of the file
//! with those read when the session began.

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::{Notify, mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Write silence after which the current session is considered over.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(3);

/// Poll cadence while waiting for a new session (or when the watch is lost).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Lines buffered between the tailer and a slow consumer.
pub const DEFAULT_LINE_CAPACITY: usize = 100;

/// Errors reported by the tailer.
///
/// `NotFound` and `WatchSetup` are only returned from [`Tailer::start`]; the
/// others arrive asynchronously through the [`ErrorSlot`].
#[derive(Debug, Error)]
pub enum TailError {
    #[error("file not found: {}", .path.display())]
    NotFound { path: PathBuf },
    #[error("failed to watch {}: {source}", .path.display())]
    WatchSetup {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
    #[error("I/O error on {}: {source}", .path.display())]
    TransientIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("file watch error: {0}")]
    Watch(#[from] notify::Error),
}

/// Tuning knobs for [`Tailer`].
#[derive(Debug, Clone)]
pub struct TailConfig {
    pub idle_timeout: Duration,
    pub poll_interval: Duration,
    pub line_capacity: usize,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            line_capacity: DEFAULT_LINE_CAPACITY,
        }
    }
}

/// Lifecycle phase of the tailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TailPhase {
    #[default]
    Opening,
    Tailing,
    SessionEnded,
    WaitingForNewSession,
    Closed,
}

impl TailPhase {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Opening => "opening",
            Self::Tailing => "tailing",
            Self::SessionEnded => "session ended",
            Self::WaitingForNewSession => "waiting",
            Self::Closed => "closed",
        }
    }
}

/// Snapshot of the tailer published on every phase change and read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TailStatus {
    pub phase: TailPhase,
    /// Incremented each time a new session begins (first session is 1).
    pub epoch: u64,
    /// Bytes of the current session consumed so far.
    pub offset: u64,
}

// ---------------------------------------------------------------------------
// Error slot
// ---------------------------------------------------------------------------

/// Single-slot error mailbox.
///
/// Sending never blocks: a new error replaces one the consumer has not read
/// yet. Once closed, [`ErrorSlot::recv`] returns `None`.
#[derive(Debug, Default)]
pub struct ErrorSlot {
    inner: Mutex<ErrorSlotInner>,
    notify: Notify,
}

#[derive(Debug, Default)]
struct ErrorSlotInner {
    pending: Option<TailError>,
    closed: bool,
}

impl ErrorSlot {
    fn put(&self, error: TailError) {
        if let Ok(mut inner) = self.inner.lock() {
            if inner.closed {
                return;
            }
            if let Some(previous) = inner.pending.replace(error) {
                trace!(error = %previous, "unread tail error overwritten");
            }
        }
        self.notify.notify_one();
    }

    fn close(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.closed = true;
        }
        self.notify.notify_one();
    }

    /// Wait for the next error. Returns `None` once the tailer has stopped.
    pub async fn recv(&self) -> Option<TailError> {
        loop {
            {
                let Ok(mut inner) = self.inner.lock() else {
                    return None;
                };
                if let Some(error) = inner.pending.take() {
                    return Some(error);
                }
                if inner.closed {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }
}

// ---------------------------------------------------------------------------
// Public handle
// ---------------------------------------------------------------------------

/// Handle to a running tail of one file.
///
/// Dropping the handle stops the background task.
pub struct Tailer {
    lines: mpsc::Receiver<Vec<u8>>,
    errors: Arc<ErrorSlot>,
    status: watch::Receiver<TailStatus>,
    cancel: CancellationToken,
}

impl Tailer {
    /// Start tailing `path`.
    ///
    /// Must be called from within a Tokio runtime. Fails with
    /// [`TailError::NotFound`] if the file does not exist right now, or
    /// [`TailError::WatchSetup`] if change notifications cannot be set up.
    pub fn start(path: impl AsRef<Path>, config: TailConfig) -> Result<Self, TailError> {
        let requested = path.as_ref();
        let path = std::fs::canonicalize(requested).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                TailError::NotFound {
                    path: requested.to_path_buf(),
                }
            } else {
                TailError::TransientIo {
                    path: requested.to_path_buf(),
                    source,
                }
            }
        })?;
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        // Watch the directory rather than the file so removal and recreation
        // are reported even while the old inode is still held open.
        let (fs_tx, fs_rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = fs_tx.send(res);
        })
        .map_err(|source| TailError::WatchSetup {
            path: path.clone(),
            source,
        })?;
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|source| TailError::WatchSetup {
                path: dir.clone(),
                source,
            })?;

        info!(path = %path.display(), "tailing log");
        Ok(Self::spawn(path, config, fs_rx, watcher))
    }

    /// Start the background task on an already-resolved path and event feed.
    fn spawn(
        path: PathBuf,
        config: TailConfig,
        fs_rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
        watcher: RecommendedWatcher,
    ) -> Self {
        let (line_tx, line_rx) = mpsc::channel(config.line_capacity.max(1));
        let errors = Arc::new(ErrorSlot::default());
        let (status_tx, status_rx) = watch::channel(TailStatus::default());
        let cancel = CancellationToken::new();

        let task = TailTask {
            state: TailState::new(path),
            config,
            file: None,
            lines: line_tx,
            errors: Arc::clone(&errors),
            status: status_tx,
            cancel: cancel.clone(),
            fs_rx,
            watch_active: true,
            _watcher: watcher,
        };
        tokio::spawn(task.run());

        Self {
            lines: line_rx,
            errors,
            status: status_rx,
            cancel,
        }
    }

    /// Next complete line, without its delimiter. `None` once the queue closes.
    pub async fn next_line(&mut self) -> Option<Vec<u8>> {
        self.lines.recv().await
    }

    /// Shared handle to the error slot.
    pub fn errors(&self) -> Arc<ErrorSlot> {
        Arc::clone(&self.errors)
    }

    /// Receiver for phase/epoch/offset updates.
    pub fn status(&self) -> watch::Receiver<TailStatus> {
        self.status.clone()
    }

    /// Stop the background task. Safe to call more than once.
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            debug!("stopping tailer");
        }
        self.cancel.cancel();
    }
}

impl Drop for Tailer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ---------------------------------------------------------------------------
// Background task
// ---------------------------------------------------------------------------

/// Identity of the file behind a path, used to spot replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileIdentity {
    dev: u64,
    ino: u64,
}

impl FileIdentity {
    #[cfg(unix)]
    fn of(meta: &std::fs::Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            dev: meta.dev(),
            ino: meta.ino(),
        })
    }

    #[cfg(not(unix))]
    fn of(_meta: &std::fs::Metadata) -> Option<Self> {
        None
    }
}

/// Bytes from the start of the file kept to recognise an in-place rewrite.
const HEAD_LEN: usize = 64;

#[derive(Debug)]
struct TailState {
    path: PathBuf,
    offset: u64,
    epoch: u64,
    idle_deadline: Instant,
    /// Bytes after the last newline, held until their delimiter arrives.
    pending: Vec<u8>,
    identity: Option<FileIdentity>,
    /// Modification time observed when the last session ended.
    modified: Option<SystemTime>,
    /// Set when the file disappeared; the next open starts from byte 0.
    reset_on_open: bool,
    /// First bytes of the current session, compared on every read to catch
    /// rewrites that leave the file at least as long as the offset.
    head: Vec<u8>,
}

impl TailState {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            offset: 0,
            epoch: 0,
            idle_deadline: Instant::now(),
            pending: Vec::new(),
            identity: None,
            modified: None,
            reset_on_open: false,
            head: Vec::new(),
        }
    }

    fn rewind(&mut self) {
        self.offset = 0;
        self.pending.clear();
        self.head.clear();
    }

    /// Extend the head fingerprint with bytes just read at the current offset.
    fn record_head(&mut self, bytes: &[u8]) {
        if self.head.len() as u64 != self.offset || self.head.len() >= HEAD_LEN {
            return;
        }
        let take = (HEAD_LEN - self.head.len()).min(bytes.len());
        self.head.extend_from_slice(&bytes[..take]);
    }

    fn touch(&mut self, idle: Duration) {
        self.idle_deadline = Instant::now() + idle;
    }
}

/// Why the task loop exited.
#[derive(Debug)]
enum Halt {
    Stopped,
    ConsumerGone,
}

#[derive(Debug, PartialEq, Eq)]
enum Drained {
    Read,
    Failed,
}

/// What a filesystem event means for the tailed file.
#[derive(Debug, PartialEq, Eq)]
enum Change {
    Unrelated,
    Written,
    Removed,
}

struct TailTask {
    state: TailState,
    config: TailConfig,
    file: Option<File>,
    lines: mpsc::Sender<Vec<u8>>,
    errors: Arc<ErrorSlot>,
    status: watch::Sender<TailStatus>,
    cancel: CancellationToken,
    fs_rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    watch_active: bool,
    _watcher: RecommendedWatcher,
}

impl TailTask {
    async fn run(mut self) {
        let mut phase = TailPhase::Opening;
        let halt = loop {
            self.publish(phase);
            let next = match phase {
                TailPhase::Opening => self.open().await,
                TailPhase::Tailing => self.follow().await,
                TailPhase::SessionEnded => self.end_session().await,
                TailPhase::WaitingForNewSession => self.wait_for_session().await,
                TailPhase::Closed => Err(Halt::Stopped),
            };
            match next {
                Ok(next) => phase = next,
                Err(halt) => break halt,
            }
        };

        match halt {
            Halt::Stopped => debug!(path = %self.state.path.display(), "tailer stopped"),
            Halt::ConsumerGone => debug!(path = %self.state.path.display(), "line consumer gone"),
        }
        self.file = None;
        self.publish(TailPhase::Closed);
        self.errors.close();
    }

    fn publish(&self, phase: TailPhase) {
        self.status.send_replace(TailStatus {
            phase,
            epoch: self.state.epoch,
            offset: self.state.offset,
        });
    }

    fn refresh_status(&self) {
        let (epoch, offset) = (self.state.epoch, self.state.offset);
        self.status.send_modify(|status| {
            status.epoch = epoch;
            status.offset = offset;
        });
    }

    fn report(&self, error: TailError) {
        self.errors.put(error);
    }

    fn io_error(&self, source: std::io::Error) -> TailError {
        TailError::TransientIo {
            path: self.state.path.clone(),
            source,
        }
    }

    /// Opening: open the file, decide whether this is a fresh file, drain to EOF.
    async fn open(&mut self) -> Result<TailPhase, Halt> {
        let opened = match File::open(&self.state.path).await {
            Ok(file) => file.metadata().await.map(|meta| (file, meta)),
            Err(e) => Err(e),
        };
        let (mut file, meta) = match opened {
            Ok(opened) => opened,
            Err(source) => {
                debug!(path = %self.state.path.display(), error = %source, "failed to open log");
                self.report(self.io_error(source));
                return Ok(TailPhase::WaitingForNewSession);
            }
        };

        let identity = FileIdentity::of(&meta);
        let replaced =
            matches!((self.state.identity, identity), (Some(old), Some(new)) if old != new);
        // A read failure here resurfaces on the first drain.
        let rewritten = head_changed(&mut file, &self.state.head)
            .await
            .unwrap_or(false);
        if self.state.reset_on_open || replaced || rewritten || meta.len() < self.state.offset {
            info!(
                path = %self.state.path.display(),
                previous_offset = self.state.offset,
                len = meta.len(),
                "log restarted; reading from the beginning"
            );
            self.state.rewind();
        }
        self.state.reset_on_open = false;
        self.state.identity = identity;
        self.state.epoch += 1;
        self.state.touch(self.config.idle_timeout);
        self.file = Some(file);

        info!(
            path = %self.state.path.display(),
            epoch = self.state.epoch,
            offset = self.state.offset,
            "session opened"
        );

        match self.drain().await? {
            Drained::Failed => Ok(TailPhase::SessionEnded),
            Drained::Read => Ok(TailPhase::Tailing),
        }
    }

    /// Tailing: drain on every write until the idle window elapses or the file goes away.
    async fn follow(&mut self) -> Result<TailPhase, Halt> {
        let mut poll = tokio::time::interval(self.config.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let change = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(Halt::Stopped),
                event = self.fs_rx.recv(), if self.watch_active => self.classify(event),
                _ = poll.tick(), if !self.watch_active => {
                    polled_change(&self.state.path, self.state.identity).await
                }
                _ = tokio::time::sleep_until(self.state.idle_deadline) => {
                    debug!(
                        epoch = self.state.epoch,
                        idle_ms = self.config.idle_timeout.as_millis() as u64,
                        "no writes within idle window"
                    );
                    return Ok(TailPhase::SessionEnded);
                }
            };

            match change {
                Change::Unrelated => {}
                Change::Written => {
                    if self.drain().await? == Drained::Failed {
                        return Ok(TailPhase::SessionEnded);
                    }
                }
                Change::Removed => {
                    // The open handle still sees everything written before removal.
                    self.drain().await?;
                    self.mark_removed().await?;
                    info!(path = %self.state.path.display(), "log removed or renamed");
                    return Ok(TailPhase::SessionEnded);
                }
            }
        }
    }

    async fn end_session(&mut self) -> Result<TailPhase, Halt> {
        self.file = None;
        match tokio::fs::metadata(&self.state.path).await {
            Ok(meta) => self.state.modified = meta.modified().ok(),
            Err(_) => self.mark_removed().await?,
        }
        info!(
            epoch = self.state.epoch,
            offset = self.state.offset,
            "session ended"
        );
        Ok(TailPhase::WaitingForNewSession)
    }

    /// WaitingForNewSession: poll (and listen) until the file changes.
    async fn wait_for_session(&mut self) -> Result<TailPhase, Halt> {
        // First check is one interval out so a failing open cannot spin.
        let mut poll = tokio::time::interval_at(
            Instant::now() + self.config.poll_interval,
            self.config.poll_interval,
        );
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(Halt::Stopped),
                event = self.fs_rx.recv(), if self.watch_active => {
                    match self.classify(event) {
                        Change::Unrelated => continue,
                        Change::Removed => self.mark_removed().await?,
                        Change::Written => {}
                    }
                }
                _ = poll.tick() => {}
            }

            if self.session_resumed().await? {
                return Ok(TailPhase::Opening);
            }
        }
    }

    async fn session_resumed(&mut self) -> Result<bool, Halt> {
        let meta = match tokio::fs::metadata(&self.state.path).await {
            Ok(meta) => meta,
            Err(_) => {
                self.mark_removed().await?;
                return Ok(false);
            }
        };

        let replaced = matches!(
            (self.state.identity, FileIdentity::of(&meta)),
            (Some(old), Some(new)) if old != new
        );
        let touched = meta.modified().ok() != self.state.modified;
        let resumed = self.state.reset_on_open
            || replaced
            || touched
            || meta.len() != self.state.offset;
        if resumed {
            debug!(
                path = %self.state.path.display(),
                len = meta.len(),
                offset = self.state.offset,
                replaced,
                "log changed; starting a new session"
            );
        }
        Ok(resumed)
    }

    /// The file is gone: emit what was held back and start the next open from byte 0.
    async fn mark_removed(&mut self) -> Result<(), Halt> {
        self.flush_partial().await?;
        self.state.reset_on_open = true;
        Ok(())
    }

    fn classify(&mut self, event: Option<notify::Result<Event>>) -> Change {
        match event {
            Some(Ok(event)) => change_for(&self.state.path, &event),
            Some(Err(e)) => {
                warn!(error = %e, "file watch error");
                self.report(TailError::Watch(e));
                Change::Unrelated
            }
            None => {
                warn!("file watch closed; falling back to polling");
                self.watch_active = false;
                Change::Unrelated
            }
        }
    }

    /// Read everything past the offset and emit the complete lines.
    async fn drain(&mut self) -> Result<Drained, Halt> {
        let Some(mut file) = self.file.take() else {
            return Ok(Drained::Read);
        };
        let read = self.read_new(&mut file).await;
        self.file = Some(file);

        let bytes = match read {
            Ok(bytes) => bytes,
            Err(source) => {
                warn!(path = %self.state.path.display(), error = %source, "failed to read log");
                self.report(self.io_error(source));
                return Ok(Drained::Failed);
            }
        };
        if bytes.is_empty() {
            self.refresh_status();
            return Ok(Drained::Read);
        }

        self.state.record_head(&bytes);
        self.state.offset += bytes.len() as u64;
        self.state.touch(self.config.idle_timeout);
        self.state.pending.extend_from_slice(&bytes);
        self.refresh_status();

        let lines = take_complete_lines(&mut self.state.pending);
        trace!(
            bytes = bytes.len(),
            lines = lines.len(),
            held_back = self.state.pending.len(),
            "drained log"
        );
        for line in lines {
            self.send_line(line).await?;
        }
        Ok(Drained::Read)
    }

    async fn read_new(&mut self, file: &mut File) -> std::io::Result<Vec<u8>> {
        let len = file.metadata().await?.len();
        if len < self.state.offset || head_changed(file, &self.state.head).await? {
            info!(
                path = %self.state.path.display(),
                offset = self.state.offset,
                len,
                "log truncated or rewritten in place; starting a new session"
            );
            self.state.rewind();
            self.state.epoch += 1;
        }
        if len == self.state.offset {
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(self.state.offset)).await?;
        let mut buf = Vec::with_capacity((len - self.state.offset) as usize);
        file.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    /// Emit a trailing fragment that will never get its delimiter.
    async fn flush_partial(&mut self) -> Result<(), Halt> {
        let mut fragment = std::mem::take(&mut self.state.pending);
        if fragment.last() == Some(&b'\r') {
            fragment.pop();
        }
        if fragment.is_empty() {
            return Ok(());
        }
        debug!(len = fragment.len(), "flushing trailing partial line");
        self.send_line(fragment).await
    }

    async fn send_line(&mut self, line: Vec<u8>) -> Result<(), Halt> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Halt::Stopped),
            sent = self.lines.send(line) => sent.map_err(|_| Halt::ConsumerGone),
        }
    }
}

/// What a poll of the path says about the tailed file, without a watch.
async fn polled_change(path: &Path, identity: Option<FileIdentity>) -> Change {
    match tokio::fs::metadata(path).await {
        Ok(meta) if identity.is_some() && FileIdentity::of(&meta) != identity => Change::Removed,
        Ok(_) => Change::Written,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Change::Removed,
        // Read errors surface from the drain.
        Err(_) => Change::Written,
    }
}

/// Whether the file no longer starts with `head`. Leaves the cursor anywhere.
async fn head_changed(file: &mut File, head: &[u8]) -> std::io::Result<bool> {
    if head.is_empty() {
        return Ok(false);
    }
    let mut current = vec![0; head.len()];
    file.seek(SeekFrom::Start(0)).await?;
    match file.read_exact(&mut current).await {
        Ok(_) => Ok(current != head),
        // Shrank below the fingerprint between stat and read.
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(true),
        Err(e) => Err(e),
    }
}

/// Classify a directory event with respect to the tailed file.
fn change_for(path: &Path, event: &Event) -> Change {
    // Backends may drop paths when they overflow; treat that as a possible write.
    if event.paths.is_empty() {
        return Change::Written;
    }
    let name = path.file_name();
    if !event.paths.iter().any(|p| p.file_name() == name) {
        return Change::Unrelated;
    }

    match event.kind {
        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_)) => Change::Removed,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Any | EventKind::Other => {
            Change::Written
        }
        EventKind::Access(_) => Change::Unrelated,
    }
}

/// Split off every complete line in `pending`, leaving any partial tail behind.
///
/// Delimiters (`\n`, and a preceding `\r`) are stripped; blank lines are skipped.
fn take_complete_lines(pending: &mut Vec<u8>) -> Vec<Vec<u8>> {
    let Some(last_newline) = pending.iter().rposition(|b| *b == b'\n') else {
        return Vec::new();
    };
    let rest = pending.split_off(last_newline + 1);
    let complete = std::mem::replace(pending, rest);

    complete
        .split(|b| *b == b'\n')
        .filter_map(|line| {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            (!line.is_empty()).then(|| line.to_vec())
        })
        .collect()
}
