use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use portable_pty::{native_pty_system, Child, ChildKiller, CommandBuilder, MasterPty, PtySize};

/// One interactive shell on a pseudo-terminal.
///
/// The child handle itself is handed out by `spawn` so the output pump can
/// wait on it; this struct keeps a killer to end it early.
pub struct PtyShell {
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    killer: Box<dyn ChildKiller + Send + Sync>,
    pid: Option<u32>,
}

impl std::fmt::Debug for PtyShell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtyShell")
            .field("master", &"Box<dyn MasterPty>")
            .field("writer", &"Box<dyn Write + Send>")
            .field("pid", &self.pid)
            .finish()
    }
}

pub type PtyChild = Box<dyn Child + Send + Sync>;

impl PtyShell {
    pub fn spawn(
        program: &str,
        args: &[String],
        cwd: &Path,
        cols: u16,
        rows: u16,
    ) -> Result<(Self, PtyChild)> {
        let pty_system = native_pty_system();
        let size = PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        };

        let pair = pty_system.openpty(size).context("Failed to open PTY")?;

        let mut cmd = CommandBuilder::new(program);
        cmd.args(args);
        cmd.cwd(cwd);

        let child = pair
            .slave
            .spawn_command(cmd)
            .with_context(|| format!("Failed to spawn shell process `{}`", program))?;
        // Our copy of the slave must go, or the master never sees EOF
        drop(pair.slave);

        let writer = pair
            .master
            .take_writer()
            .context("Failed to take PTY writer")?;

        let pid = child.process_id();
        let killer = child.clone_killer();

        Ok((
            Self {
                master: pair.master,
                writer,
                killer,
                pid,
            },
            child,
        ))
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn reader(&self) -> Result<Box<dyn Read + Send>> {
        self.master
            .try_clone_reader()
            .context("Failed to clone PTY reader")
    }

    pub fn resize(&self, cols: u16, rows: u16) -> Result<()> {
        self.master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .context("Failed to resize PTY")
    }

    /// Raw write (no newline).
    pub fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        self.writer
            .write_all(data)
            .context("Failed to write to PTY")?;
        self.writer.flush().context("Failed to flush PTY writer")
    }

    /// Write a line and press Enter.
    pub fn write_line(&mut self, line: &str, terminator: &str) -> Result<()> {
        // Prevent double-newlines if callers already include CR/LF.
        let s = line.trim_end_matches(&['\r', '\n'][..]);
        self.write_raw(s.as_bytes())?;
        self.write_raw(terminator.as_bytes())
    }

    pub fn kill(&mut self) -> Result<()> {
        self.killer.kill().context("Failed to kill shell process")
    }
}
