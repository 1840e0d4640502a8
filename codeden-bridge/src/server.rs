//! The request loop: JSON lines in, responses and terminal events out.

use std::sync::Arc;

use anyhow::{Context, Result};
use codeden_core::Workbench;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc};

use crate::protocol::{encode, EventDecoder, Method, Outgoing, Request};

/// Executes one decoded method against the workbench.
pub async fn handle(workbench: &Workbench, method: Method) -> Result<Value, String> {
    match method {
        Method::Run(request) => {
            let result = workbench.run(&request).await;
            serde_json::to_value(result).map_err(|e| e.to_string())
        }
        Method::RunExe(params) => {
            let path = params.path.unwrap_or_default();
            let launched = workbench
                .launch_executable(&path)
                .await
                .map_err(String::from)?;
            Ok(json!({ "status": "started", "launch": launched }))
        }
        Method::TerminalStart => {
            let info = workbench.terminal_start().await.map_err(String::from)?;
            Ok(json!({ "status": "started", "session": info }))
        }
        Method::TerminalWrite(params) => {
            workbench.terminal_write(&params.data).await;
            Ok(Value::Null)
        }
        Method::TerminalStop => {
            let was_live = workbench.terminal_stop().await;
            Ok(json!({ "status": "stopped", "was_live": was_live }))
        }
        Method::TerminalExport => Ok(Value::String(workbench.terminal_export_transcript())),
        Method::TerminalResize(params) => {
            workbench
                .terminal_resize(params.cols, params.rows)
                .await
                .map_err(String::from)?;
            Ok(Value::Null)
        }
        Method::TerminalSave(params) => {
            let dest = workbench
                .terminal_save(&params.name)
                .await
                .map_err(String::from)?;
            Ok(json!(dest))
        }
        Method::TerminalSaveSilent(params) => {
            workbench
                .terminal_save_silent(&params.name)
                .await
                .map_err(String::from)?;
            Ok(json!("Saved"))
        }
        Method::SaveFile(params) => {
            let dest = workbench
                .save_file(&params.name, &params.content)
                .await
                .map_err(String::from)?;
            Ok(json!(dest))
        }
        Method::SaveFileSilent(params) => {
            let dest = workbench
                .save_file_silent(&params.name, &params.content)
                .await
                .map_err(String::from)?;
            Ok(json!(dest))
        }
        Method::OpenFile(params) => {
            // Picking a file is the UI's job; without a path there is nothing to open
            let Some(path) = params.path else {
                return Ok(json!("cancelled"));
            };
            let opened = workbench.open_file(&path).await.map_err(String::from)?;
            serde_json::to_value(opened).map_err(|e| e.to_string())
        }
        Method::Languages => Ok(json!(workbench.languages())),
        Method::Shutdown => {
            workbench.shutdown().await;
            Ok(json!("bye"))
        }
    }
}

fn respond(id: u64, outcome: Result<Value, String>) -> Outgoing {
    match outcome {
        Ok(ok) => Outgoing::Ok { id, ok },
        Err(error) => Outgoing::Error { id, error },
    }
}

/// Serve until `input` closes or a `shutdown` request arrives.
pub async fn serve<R, W>(workbench: Arc<Workbench>, input: R, output: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (out_tx, mut out_rx) = mpsc::channel::<Outgoing>(256);

    // Single writer: responses and events never interleave mid-line
    let writer = tokio::spawn(async move {
        let mut output = output;
        while let Some(message) = out_rx.recv().await {
            let mut line = encode(&message);
            line.push('\n');
            if output.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            let _ = output.flush().await;
        }
    });

    let mut events = workbench.subscribe();
    let event_tx = out_tx.clone();
    let forwarder = tokio::spawn(async move {
        let mut decoder = EventDecoder::new();
        'forward: loop {
            match events.recv().await {
                Ok(event) => {
                    for frame in decoder.decode(event) {
                        if event_tx.send(Outgoing::Event(frame)).await.is_err() {
                            break 'forward;
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event forwarder lagged; dropped terminal output");
                }
                Err(broadcast::error::RecvError::Closed) => break 'forward,
            }
        }
    });

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await.context("reading request")? {
        if line.trim().is_empty() {
            continue;
        }
        let request: Request = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "malformed request line");
                continue;
            }
        };
        let id = request.id;
        let method = match Method::parse(&request.method, request.params) {
            Ok(method) => method,
            Err(error) => {
                let _ = out_tx.send(Outgoing::Error { id, error }).await;
                continue;
            }
        };
        tracing::debug!(id, method = %request.method, "request");

        let shutdown = matches!(method, Method::Shutdown);
        if method.is_ordered() {
            let outcome = handle(&workbench, method).await;
            let _ = out_tx.send(respond(id, outcome)).await;
        } else {
            let workbench = workbench.clone();
            let tx = out_tx.clone();
            tokio::spawn(async move {
                let outcome = handle(&workbench, method).await;
                let _ = tx.send(respond(id, outcome)).await;
            });
        }
        if shutdown {
            break;
        }
    }

    workbench.shutdown().await;
    forwarder.abort();
    drop(out_tx);
    // In-flight spawned requests hold senders; don't wait on them forever
    let _ = tokio::time::timeout(std::time::Duration::from_secs(2), writer).await;
    Ok(())
}
