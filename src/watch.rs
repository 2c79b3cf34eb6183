//! Interactive console mode.
//!
//! Renders the session view whenever held state changes. Each stdin line
//! becomes the target text and is submitted; an empty line re-submits the
//! current text. `q`, EOF or Ctrl+C deactivates the session.

use crate::cli::OutputFormat;
use crate::render;
use anyhow::{Context, Result};
use futures::future::{FutureExt, LocalBoxFuture, OptionFuture};
use ghostscan_core::{
    Console, ConsoleSession, ConsoleSettings, DiscoveryClient, ScanCommandOutcome,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

enum Input {
    Quit,
    Submit(Option<String>),
}

fn interpret(line: &str) -> Input {
    let line = line.strip_suffix('\r').unwrap_or(line);
    match line {
        "q" | "quit" => Input::Quit,
        "" => Input::Submit(None),
        text => Input::Submit(Some(text.to_string())),
    }
}

fn redraw(session: &ConsoleSession, format: OutputFormat) -> Result<()> {
    let view = session.view();
    match format {
        OutputFormat::Text => render::print_view(&view),
        OutputFormat::Json => println!("{}", serde_json::to_string(&view)?),
    }
    Ok(())
}

fn report(outcome: &ScanCommandOutcome, format: OutputFormat) {
    match format {
        OutputFormat::Text => match outcome {
            ScanCommandOutcome::Submitted(request) => {
                println!("✓ Scan submitted for {} target(s)", request.targets().len())
            }
            ScanCommandOutcome::Busy => {
                println!("⚠ Scan already in progress, try again shortly")
            }
            ScanCommandOutcome::Failed(e) => println!("⚠ Scan did not start: {}", e),
        },
        OutputFormat::Json => {
            let value = match outcome {
                ScanCommandOutcome::Submitted(request) => {
                    serde_json::json!({"event": "scan_submitted", "request": request})
                }
                ScanCommandOutcome::Busy => serde_json::json!({"event": "scan_busy"}),
                ScanCommandOutcome::Failed(e) => {
                    serde_json::json!({"event": "scan_failed", "error": e})
                }
            };
            println!("{}", value);
        }
    }
}

pub async fn run_watch(
    settings: &ConsoleSettings,
    targets: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let client =
        Arc::new(DiscoveryClient::new(settings).context("Failed to build discovery client")?);
    let session = Console::activate(client, settings);
    if let Some(targets) = targets {
        session.set_target_text(targets);
    }

    if let OutputFormat::Text = format {
        println!("Enter a target expression to scan (empty line: current targets, q: quit).");
    }
    redraw(&session, format)?;

    let mut changes = session.changes();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    // The outstanding submission is polled as its own branch so redraws and
    // Ctrl+C are still served while the service answers
    let mut submission: Option<LocalBoxFuture<'_, ScanCommandOutcome>> = None;

    loop {
        tokio::select! {
            alive = changes.changed() => {
                if !alive {
                    break;
                }
                redraw(&session, format)?;
            }
            Some(outcome) = OptionFuture::from(submission.as_mut()), if submission.is_some() => {
                submission = None;
                report(&outcome, format);
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    tracing::debug!("stdin closed");
                    break;
                };
                match interpret(&line) {
                    Input::Quit => break,
                    Input::Submit(text) => {
                        if let Some(text) = text {
                            session.set_target_text(text);
                        }
                        if submission.is_some() {
                            report(&ScanCommandOutcome::Busy, format);
                        } else {
                            submission = Some(session.start_scan().boxed_local());
                        }
                    }
                }
            }
            _ = &mut ctrl_c => {
                tracing::info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    // An unanswered submission is abandoned; the session is going away
    drop(submission);
    session.deactivate().await;
    Ok(())
}
