use crate::App;
use crate::cli::ui;
use crate::sync::SyncDomain;
use anyhow::{Context, Result, bail};

pub async fn enqueue(app: &App, domain: &str, payload: &str) -> Result<()> {
    let domain: SyncDomain = domain.parse()?;
    let payload: serde_json::Value =
        serde_json::from_str(payload).context("Payload must be valid JSON")?;

    let task = app.sync_queue.enqueue(domain, payload).await?;
    println!("Queued {} task #{}", task.domain, task.id);
    Ok(())
}

pub async fn replay(app: &App) -> Result<()> {
    let targets = app.sync_targets();
    if targets.is_empty() {
        bail!("No sync endpoint configured");
    }

    let mut notifications = app.notifier.subscribe();
    let report = app.sync_queue.replay(&targets, Some(&app.notifier)).await?;

    println!(
        "Replayed {} task(s), {} kept for retry",
        ui::style_text(&report.replayed.len().to_string(), ui::StyleType::Success),
        report.retained.len()
    );
    for (id, reason) in &report.retained {
        println!("  #{id} {}", ui::style_text(reason, ui::StyleType::Error));
    }
    while let Ok(notification) = notifications.try_recv() {
        println!("{}", serde_json::to_string(&notification)?);
    }
    Ok(())
}
