//! tailscope — live terminal viewer for Claude Code stream-json logs

pub mod config;
pub mod discover;
pub mod envelope;
pub mod record;
pub mod tail;
mod text;
pub mod ui;
pub mod viewport;

pub use envelope::{DecodeError, decode};
pub use record::DisplayRecord;
pub use tail::{ErrorSlot, TailConfig, TailError, TailPhase, TailStatus, Tailer};
pub use viewport::{RecordLayout, Viewport};
