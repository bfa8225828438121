use crate::App;
use crate::cli::ui;
use crate::command::BatchReport;
use crate::lifecycle::{ActivationReport, LifecycleState};
use anyhow::{Result, bail};
use tracing::error;

fn print_activation(report: &ActivationReport) {
    if report.removed.is_empty() {
        println!("No stale partitions to remove");
    }
    for name in &report.removed {
        println!("Removed {}", ui::style_text(name, ui::StyleType::Subtle));
    }
    println!(
        "{} {}",
        ui::style_text("Active partitions:", ui::StyleType::Label),
        report.kept.join(", ")
    );
}

/// Prints a batch outcome; fails when any item failed.
fn finish_batch(action: &str, report: &BatchReport) -> Result<()> {
    println!(
        "{action}: {} stored, {} failed",
        ui::style_text(&report.succeeded.len().to_string(), ui::StyleType::Success),
        report.failed.len()
    );
    for (url, reason) in &report.failed {
        println!("  {} {}", ui::style_text(url, ui::StyleType::Error), reason);
    }
    if !report.is_complete() {
        error!(failed = report.failed.len(), "{action} incomplete");
        bail!("{action} failed for {} URL(s)", report.failed.len());
    }
    Ok(())
}

pub async fn install(app: &App) -> Result<()> {
    let pb = ui::new_progress_bar(app.lifecycle.manifest().len() as u64);
    pb.set_message("Installing");

    let result = app
        .lifecycle
        .install_with_progress(&|| pb.inc(1))
        .await;
    pb.finish_and_clear();

    match result? {
        Some(report) => print_activation(&report),
        None => println!(
            "Installed {} assets, waiting for activation",
            app.lifecycle.manifest().len()
        ),
    }
    Ok(())
}

pub async fn activate(app: &App) -> Result<()> {
    if app.lifecycle.recover().await? == LifecycleState::Uninstalled {
        bail!(
            "Version {} is not installed; run `install` first",
            app.engine.names().version()
        );
    }
    let report = app.lifecycle.activate().await?;
    print_activation(&report);
    Ok(())
}

pub async fn clear(app: &App, partition: Option<&str>) -> Result<()> {
    let deleted = app.commands.clear_cache(partition).await?;
    if deleted.is_empty() {
        println!("Nothing to clear");
    }
    for name in deleted {
        println!("Cleared {name}");
    }
    Ok(())
}

pub async fn prefetch(app: &App, urls: &[String]) -> Result<()> {
    let report = app.commands.prefetch(urls).await;
    finish_batch("Prefetch", &report)
}

pub async fn update(app: &App, partition: &str, urls: &[String]) -> Result<()> {
    let report = app.commands.update_cache(partition, urls).await;
    finish_batch("Update", &report)
}

pub async fn sweep(app: &App) -> Result<()> {
    let report = app.scheduler.sweep().await?;
    println!(
        "Scanned {} entries, evicted {}",
        report.scanned,
        ui::style_text(&report.evicted.to_string(), ui::StyleType::Label)
    );
    Ok(())
}
