use crate::App;
use crate::cli::ui;
use crate::core::partition::PartitionNames;
use anyhow::Result;
use std::collections::BTreeMap;

/// Entry counts per partition. Partitions from other versions are listed
/// too, dimmed, until activation removes them.
pub fn render_status(counts: &BTreeMap<String, usize>, names: &PartitionNames) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Partition"), ui::header_cell("Entries")]);

    for (name, count) in counts {
        table.add_row(vec![
            ui::partition_cell(name, names.is_expected(name)),
            ui::count_cell(*count),
        ]);
    }

    let total: usize = counts.values().sum();
    format!(
        "Cache version: {}\n\n{}\n{} {}",
        ui::style_text(names.version(), ui::StyleType::Title),
        table,
        ui::style_text("Total entries:", ui::StyleType::Label),
        ui::style_text(&total.to_string(), ui::StyleType::Success)
    )
}

pub async fn run(app: &App) -> Result<()> {
    let counts = app.commands.status().await?;
    println!("{}", render_status(&counts, app.engine.names()));

    let pending = app.sync_queue.pending().await?;
    if !pending.is_empty() {
        println!(
            "{}",
            ui::style_text(
                &format!("{} write(s) waiting for sync", pending.len()),
                ui::StyleType::Subtle
            )
        );
    }
    Ok(())
}
