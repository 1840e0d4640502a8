//! The interactive terminal: one PTY-backed shell, its output pump, and the
//! rolling transcript.

pub mod manager;
pub mod pty;
pub mod transcript;

pub use manager::{SessionInfo, TerminalSessionManager, TerminalSettings};
pub use pty::PtyShell;
pub use transcript::{TranscriptBuffer, DEFAULT_TRANSCRIPT_CAP};
