//! Post command - optimize an existing decomposition.

use std::path::Path;

use anyhow::{Context, Result, bail};
use comfy_table::{Cell, Color, Table, presets::UTF8_FULL};
use rolemine_config::RolemineConfig;
use rolemine_mining::PostOptimizer;
use rolemine_relation::RbacState;

pub fn run(decomposition: &Path, mur: Option<usize>, prune: bool) -> Result<()> {
    let config = RolemineConfig::load().unwrap_or_default();
    let mur = mur.unwrap_or(config.mining.mur);

    let state = RbacState::from_path(decomposition)
        .with_context(|| format!("Failed to load decomposition {}", decomposition.display()))?;

    let mut optimizer = PostOptimizer::new(state, mur);
    let before = optimizer.wsc();
    optimizer.optimize(prune);

    let report = optimizer.check_solution();
    if !report.is_covered() {
        bail!(
            "optimizer changed the granted permissions of {} users:\n{report}",
            report.fault_count()
        );
    }

    let after = optimizer.wsc();
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        Cell::new("").fg(Color::Cyan),
        Cell::new("Roles").fg(Color::Cyan),
        Cell::new("|UA|").fg(Color::Cyan),
        Cell::new("|PA|").fg(Color::Cyan),
        Cell::new("WSC").fg(Color::Cyan),
    ]);
    table.add_row(vec![
        Cell::new("before"),
        Cell::new(before.roles),
        Cell::new(before.ua_edges),
        Cell::new(before.pa_edges),
        Cell::new(before.total),
    ]);
    table.add_row(vec![
        Cell::new("after"),
        Cell::new(after.roles),
        Cell::new(after.ua_edges),
        Cell::new(after.pa_edges),
        Cell::new(after.total).fg(Color::Green),
    ]);
    println!("{table}");

    Ok(())
}
