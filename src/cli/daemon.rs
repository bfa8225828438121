//! Long-running mode: JSON lines in on stdin, JSON lines out on stdout.
//!
//! Besides the command protocol the daemon understands two host events:
//! `{"type":"NOTIFICATION_CLICK","action":..,"payload":..}` and
//! `{"type":"ONLINE"}`, which replays the deferred-sync queue right away.

use crate::App;
use crate::command::{Command, PendingCommand, Reply};
use crate::core::error::CacheError;
use crate::lifecycle::LifecycleState;
use crate::notify::Notification;
use anyhow::Result;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::interval;
use tracing::{debug, error, info, warn};

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
enum HostEvent {
    NotificationClick {
        action: String,
        #[serde(default)]
        payload: serde_json::Value,
    },
    Online,
}

/// Brings the current version to `Active`, installing first if needed.
pub async fn prepare(app: &App) -> Result<LifecycleState> {
    match app.lifecycle.recover().await? {
        LifecycleState::Uninstalled => {
            app.lifecycle.install().await?;
            if app.lifecycle.state() == LifecycleState::Installed {
                // a fresh process means no previous version is still running
                app.lifecycle.supersede().await?;
            }
        }
        LifecycleState::Installed => {
            app.lifecycle.supersede().await?;
        }
        _ => {}
    }
    Ok(app.lifecycle.state())
}

/// Handles one input line. Returns the reply receiver for commands that
/// answer.
pub async fn handle_line(
    app: &App,
    commands: &mpsc::Sender<PendingCommand>,
    line: &str,
) -> Option<oneshot::Receiver<Reply>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let message: serde_json::Value = match serde_json::from_str(line) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %CacheError::MalformedCommand(e.to_string()), "Ignoring input line");
            return None;
        }
    };

    if let Ok(event) = HostEvent::deserialize(&message) {
        match event {
            HostEvent::NotificationClick { action, payload } => {
                app.notifier.notification_click(&action, payload);
            }
            HostEvent::Online => replay_queue(app).await,
        }
        return None;
    }

    let command = match Command::parse(&message) {
        Ok(command) => command,
        Err(e) => {
            warn!(error = %e, "Ignoring command");
            return None;
        }
    };
    let (reply, rx) = match command {
        Command::GetStatus => {
            let (tx, rx) = oneshot::channel();
            (Some(tx), Some(rx))
        }
        _ => (None, None),
    };
    if commands.send(PendingCommand { command, reply }).await.is_err() {
        error!("Command worker stopped");
        return None;
    }
    rx
}

async fn replay_queue(app: &App) {
    let targets = app.sync_targets();
    if targets.is_empty() {
        debug!("No sync endpoint configured, skipping replay");
        return;
    }
    if let Err(e) = app.sync_queue.replay(&targets, Some(&app.notifier)).await {
        error!(error = %e, "Sync replay failed");
    }
}

async fn sync_loop(app: Arc<App>, mut shutdown: broadcast::Receiver<()>) {
    let mut ticker = interval(Duration::from_secs(app.config.maintenance.interval_secs));
    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            _ = ticker.tick() => replay_queue(&app).await,
        }
    }
    debug!("Sync loop stopped");
}

async fn forward_notifications(
    mut notifications: broadcast::Receiver<Notification>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            received = notifications.recv() => match received {
                Ok(notification) => print_json(&notification),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(missed = n, "Dropped notifications");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(line) => println!("{line}"),
        Err(e) => error!(error = %e, "Failed to encode output line"),
    }
}

pub async fn run(app: App) -> Result<()> {
    let app = Arc::new(app);
    let state = prepare(&app).await?;
    info!(%state, version = app.engine.names().version(), "Daemon ready");

    let (shutdown_tx, _) = broadcast::channel(1);
    let mut background = Vec::new();
    background.push(tokio::spawn({
        let app = app.clone();
        let shutdown = shutdown_tx.subscribe();
        async move { app.scheduler.run(shutdown).await }
    }));
    background.push(tokio::spawn(sync_loop(app.clone(), shutdown_tx.subscribe())));
    background.push(tokio::spawn(forward_notifications(
        app.notifier.subscribe(),
        shutdown_tx.subscribe(),
    )));

    let (tx, rx) = mpsc::channel(32);
    let worker = tokio::spawn({
        let channel = app.commands.clone();
        async move { channel.run(rx).await }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    if let Some(reply) = handle_line(&app, &tx, &line).await {
                        tokio::spawn(async move {
                            if let Ok(reply) = reply.await {
                                print_json(&reply);
                            }
                        });
                    }
                }
                None => {
                    debug!("stdin closed");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    drop(tx);
    worker.await?;
    app.engine.refresher().settle().await;
    // a send error only means every task already stopped
    let _ = shutdown_tx.send(());
    for handle in background {
        handle.await?;
    }
    info!("Daemon stopped");
    Ok(())
}
