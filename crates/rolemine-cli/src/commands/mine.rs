//! Mine command - one greedy covering run.

use std::path::Path;

use anyhow::{Context, Result, bail};
use comfy_table::{Cell, Color, Table, presets::UTF8_FULL};
use rolemine_config::RolemineConfig;
use rolemine_mining::{CoveringEngine, SeedPolicy};
use rolemine_relation::{AccessRelation, Decomposition, Wsc};

pub fn run(dataset: &Path, policy: Option<&str>, mur: Option<usize>, collapse: bool) -> Result<()> {
    let config = RolemineConfig::load().unwrap_or_default();
    let policy: SeedPolicy = policy
        .unwrap_or(&config.mining.policy)
        .parse()
        .context("Invalid seed policy")?;
    let mur = mur.unwrap_or(config.mining.mur);
    let collapse = collapse || config.mining.collapse_duplicates;

    let (wsc, merged) = execute(dataset, policy, mur, collapse)?;
    if merged > 0 {
        println!("Merged {merged} duplicate users");
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        Cell::new("Policy").fg(Color::Cyan),
        Cell::new("MUR").fg(Color::Cyan),
        Cell::new("Roles").fg(Color::Cyan),
        Cell::new("|UA|").fg(Color::Cyan),
        Cell::new("|PA|").fg(Color::Cyan),
        Cell::new("WSC").fg(Color::Cyan),
    ]);
    table.add_row(vec![
        Cell::new(policy.label()),
        Cell::new(mur),
        Cell::new(wsc.roles),
        Cell::new(wsc.ua_edges),
        Cell::new(wsc.pa_edges),
        Cell::new(wsc.total).fg(Color::Green),
    ]);
    println!("{table}");

    Ok(())
}

/// Mines the dataset and reports the complexity of the final assignment.
///
/// With `collapse`, mining runs over duplicate-user representatives and
/// the assignment is expanded back to every original user before it is
/// verified and measured. Returns the WSC and the number of users merged.
fn execute(
    dataset: &Path,
    policy: SeedPolicy,
    mur: usize,
    collapse: bool,
) -> Result<(Wsc, usize)> {
    let mut relation = AccessRelation::load(dataset.into())
        .with_context(|| format!("Failed to load dataset {}", dataset.display()))?;
    let original_upa = relation.upa().clone();
    let merged = if collapse {
        relation.collapse_duplicate_users()
    } else {
        0
    };

    let mut engine = CoveringEngine::new(relation, policy, mur);
    engine.mine();

    let report = engine.check_solution();
    if !report.is_covered() {
        bail!(
            "covering run left {} users uncovered:\n{report}",
            report.fault_count()
        );
    }

    let expanded_ua = engine
        .relation()
        .expand_assignment(engine.decomposition().assignments());
    let expanded = Decomposition::from_parts(expanded_ua, engine.decomposition().roles().clone());

    let uncovered = original_upa
        .iter()
        .filter(|&(&user, expected)| expanded.effective_permissions(user) != *expected)
        .count();
    if uncovered > 0 {
        bail!("expansion left {uncovered} users without their original permissions");
    }

    Ok((expanded.wsc(), merged))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn collapsed_run_reports_the_expanded_assignment() {
        // users 1 and 2 are duplicates; the representative's roles must
        // reach both of them in the reported assignment
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "1 10\n2 10\n3 10\n3 20\n").expect("write dataset");

        let (wsc, merged) =
            execute(file.path(), SeedPolicy::ByUser, 0, true).expect("collapsed run");

        assert_eq!(merged, 1);
        assert_eq!(wsc.roles, 2);
        // u1 and u2 hold the {10} role, u3 holds it plus the {20} role
        assert_eq!(wsc.ua_edges, 4);
    }

    #[test]
    fn uncollapsed_run_is_unchanged_by_expansion() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "1 10\n2 10\n3 10\n3 20\n").expect("write dataset");

        let (plain, merged) =
            execute(file.path(), SeedPolicy::ByUser, 0, false).expect("plain run");
        let (collapsed, _) =
            execute(file.path(), SeedPolicy::ByUser, 0, true).expect("collapsed run");

        assert_eq!(merged, 0);
        assert_eq!(plain.total, collapsed.total);
    }
}
