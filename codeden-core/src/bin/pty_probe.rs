// codeden-core/src/bin/pty_probe.rs

use anyhow::{Context, Result};
use codeden_core::terminal::{TerminalSessionManager, TerminalSettings};
use codeden_core::{CoreConfig, TerminalEvent};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[tokio::main]
async fn main() -> Result<()> {
    // Make sure *something* always prints even if tracing isn't set up elsewhere.
    eprintln!("[pty_probe] starting… (Ctrl+C to exit)");

    let config = CoreConfig::load().context("loading configuration failed")?;
    let manager = TerminalSessionManager::new(TerminalSettings::from_config(&config));
    let mut rx = manager.subscribe();

    let info = manager.start().await.context("terminal start failed")?;
    eprintln!("[pty_probe] session {} ({}) in {}", info.id, info.shell, info.cwd.display());

    // Task: dump PTY output to stdout as raw bytes.
    tokio::spawn(async move {
        let mut out = tokio::io::stdout();
        while let Ok(event) = rx.recv().await {
            match event {
                TerminalEvent::Output { data, .. } => {
                    if out.write_all(&data).await.is_err() {
                        break;
                    }
                    let _ = out.flush().await;
                }
                TerminalEvent::Exited { code, .. } => {
                    eprintln!("\n[pty_probe] shell exited ({:?})", code);
                    break;
                }
            }
        }
        let _ = out.flush().await;
    });

    // Kick the shell so a prompt and some output appear.
    manager.inject_command("").await;
    manager.inject_command("echo PTY_PROBE_OK").await;

    // Interactive loop: forward stdin lines to the session.
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\n[pty_probe] Ctrl+C received, exiting…");
                break;
            }

            line = lines.next_line() => {
                let Some(line) = line.context("stdin read failed")? else {
                    eprintln!("\n[pty_probe] stdin closed, exiting…");
                    break;
                };

                if line.trim().eq_ignore_ascii_case("exit") {
                    eprintln!("[pty_probe] exit requested, exiting…");
                    break;
                }

                if !manager.inject_command(&line).await {
                    eprintln!("[pty_probe] session is gone, exiting…");
                    break;
                }
            }
        }
    }

    manager.stop().await;
    eprintln!("[pty_probe] transcript: {} bytes", manager.export_transcript().len());
    Ok(())
}
