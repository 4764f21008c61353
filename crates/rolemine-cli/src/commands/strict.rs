//! Strict command - cardinality-enforced mining run.

use std::path::Path;

use anyhow::{Context, Result, bail};
use comfy_table::{Cell, Color, Table, presets::UTF8_FULL};
use rolemine_config::RolemineConfig;
use rolemine_mining::{Criterion, MatrixKind, PostOptimizer, StrictEngine, StrictOptions};
use rolemine_relation::{AccessRelation, RbacState, Wsc};

/// What one strict run ends with.
struct StrictOutcome {
    wsc: Wsc,
    dupa: usize,
    coverable: usize,
}

pub fn run(
    dataset: &Path,
    mur: Option<usize>,
    matrix: Option<&str>,
    criterion: Option<&str>,
    seed: Option<u64>,
    reduce: bool,
) -> Result<()> {
    let config = RolemineConfig::load().unwrap_or_default();
    let options = StrictOptions {
        mur: mur.unwrap_or(config.mining.mur),
        matrix: matrix
            .unwrap_or(&config.strict.matrix)
            .parse::<MatrixKind>()
            .context("Invalid matrix kind")?,
        criterion: criterion
            .unwrap_or(&config.strict.criterion)
            .parse::<Criterion>()
            .context("Invalid criterion")?,
        split_retries: config.strict.split_retries,
        rng_seed: seed.or(config.strict.rng_seed),
    };
    let mur = options.mur;

    let outcome = execute(dataset, options, reduce)?;
    if outcome.coverable > 0 {
        println!(
            "Note: {} fallback users were coverable by spare roles",
            outcome.coverable
        );
    }

    let wsc = outcome.wsc;
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        Cell::new("MUR").fg(Color::Cyan),
        Cell::new("Roles").fg(Color::Cyan),
        Cell::new("|UA|").fg(Color::Cyan),
        Cell::new("|PA|").fg(Color::Cyan),
        Cell::new("WSC").fg(Color::Cyan),
        Cell::new("Direct grants").fg(Color::Cyan),
    ]);
    table.add_row(vec![
        Cell::new(mur),
        Cell::new(wsc.roles),
        Cell::new(wsc.ua_edges),
        Cell::new(wsc.pa_edges),
        Cell::new(wsc.total).fg(Color::Green),
        Cell::new(outcome.dupa),
    ]);
    println!("{table}");

    Ok(())
}

/// Mines the dataset, optionally prunes redundant and unused roles from
/// the mined decomposition, and reports the resulting complexity.
fn execute(dataset: &Path, options: StrictOptions, reduce: bool) -> Result<StrictOutcome> {
    let relation = AccessRelation::load(dataset.into())
        .with_context(|| format!("Failed to load dataset {}", dataset.display()))?;

    let mut engine = StrictEngine::new(relation, options);
    engine.mine();

    let report = engine.check_solution();
    if !report.is_covered() {
        bail!(
            "strict run left {} users uncovered:\n{report}",
            report.fault_count()
        );
    }
    let coverable = engine.verify_dupa_covering().len();
    let dupa = engine.dupa_size();

    let wsc = if reduce {
        let state = RbacState::from_decomposition(engine.decomposition().clone());
        let mut optimizer = PostOptimizer::new(state, 0);
        optimizer.prune();

        let reduction = optimizer.check_solution();
        if !reduction.is_covered() {
            bail!("reduction changed granted permissions:\n{reduction}");
        }
        optimizer.wsc()
    } else {
        engine.wsc()
    };

    Ok(StrictOutcome {
        wsc,
        dupa,
        coverable,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn options(mur: usize) -> StrictOptions {
        StrictOptions {
            mur,
            rng_seed: Some(1),
            ..StrictOptions::default()
        }
    }

    #[test]
    fn reduce_never_increases_wsc() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            "1 10\n1 20\n2 10\n2 20\n3 10\n4 20\n5 10\n5 20\n5 30\n"
        )
        .expect("write dataset");

        let mined = execute(file.path(), options(2), false).expect("strict run");
        let reduced = execute(file.path(), options(2), true).expect("reduced run");

        assert!(reduced.wsc.total <= mined.wsc.total);
    }
}
