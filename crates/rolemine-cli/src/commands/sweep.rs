//! Sweep command - run every variant across a range of MUR values.
//!
//! For each MUR the sweep times the two covering heuristics, two
//! strict-engine configurations, and a post-optimization of every supplied
//! decomposition, then tabulates role counts, WSC, and wall-clock timings
//! with per-row minima highlighted. `--latex` renders the tables as LaTeX
//! tabulars with bolded minima.
//!
//! Bare dataset and decomposition arguments that do not exist locally are
//! searched in the configured experiment directories; bare output file
//! names land in the configured output directory.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use comfy_table::{Cell, Color, Table, presets::UTF8_FULL};
use rolemine_config::RolemineConfig;
use rolemine_mining::{CoveringEngine, MatrixKind, PostOptimizer, SeedPolicy, StrictEngine, StrictOptions};
use rolemine_relation::{AccessRelation, RbacState};

/// Covering heuristics tabulated alongside the strict runs.
const COVER_POLICIES: [SeedPolicy; 2] = [SeedPolicy::ByUser, SeedPolicy::ByUserOrPermission];

/// One timed run at one MUR value.
struct RunCell {
    roles: usize,
    wsc: usize,
    micros: u128,
}

pub fn run(
    dataset: &Path,
    murs: &[usize],
    decompositions: &[PathBuf],
    latex: bool,
    output: Option<&Path>,
) -> Result<()> {
    let config = RolemineConfig::load().unwrap_or_default();
    let latex = latex || config.experiment.latex;
    let dataset = locate(dataset, &config.experiment.datasets_dir);
    let decompositions: Vec<PathBuf> = decompositions
        .iter()
        .map(|path| locate(path, &config.experiment.decompositions_dir))
        .collect();

    let mut labels: Vec<String> = COVER_POLICIES
        .iter()
        .map(|policy| format!("cover-{}", policy.label()))
        .collect();
    labels.push("strict-full".to_string());
    labels.push("strict-residual".to_string());
    for path in &decompositions {
        labels.push(format!("post-{}", stem(path)));
    }

    let mut rows: Vec<(usize, Vec<RunCell>)> = Vec::new();
    for &mur in murs {
        let mut cells = Vec::new();

        for policy in COVER_POLICIES {
            let relation = AccessRelation::load(dataset.as_path().into())
                .with_context(|| format!("Failed to load dataset {}", dataset.display()))?;

            let start = Instant::now();
            let mut engine = CoveringEngine::new(relation, policy, mur);
            engine.mine();
            let micros = start.elapsed().as_micros();

            if !engine.check_solution().is_covered() {
                bail!(
                    "covering run ({}) at mur {mur} left users uncovered",
                    policy.label()
                );
            }
            let wsc = engine.wsc();
            cells.push(RunCell {
                roles: wsc.roles,
                wsc: wsc.total,
                micros,
            });
        }

        for matrix in [MatrixKind::Full, MatrixKind::Residual] {
            let relation = AccessRelation::load(dataset.as_path().into())
                .with_context(|| format!("Failed to load dataset {}", dataset.display()))?;
            let options = StrictOptions {
                mur,
                matrix,
                split_retries: config.strict.split_retries,
                rng_seed: config.strict.rng_seed,
                ..StrictOptions::default()
            };

            let start = Instant::now();
            let mut engine = StrictEngine::new(relation, options);
            engine.mine();
            let micros = start.elapsed().as_micros();

            if !engine.check_solution().is_covered() {
                bail!("strict run at mur {mur} left users uncovered");
            }
            let wsc = engine.wsc();
            cells.push(RunCell {
                roles: wsc.roles,
                wsc: wsc.total,
                micros,
            });
        }

        for path in &decompositions {
            let state = RbacState::from_path(path)
                .with_context(|| format!("Failed to load decomposition {}", path.display()))?;

            let start = Instant::now();
            let mut optimizer = PostOptimizer::new(state, mur);
            optimizer.optimize(true);
            let micros = start.elapsed().as_micros();

            if !optimizer.check_solution().is_covered() {
                bail!(
                    "post-optimization of {} at mur {mur} changed granted permissions",
                    path.display()
                );
            }
            let wsc = optimizer.wsc();
            cells.push(RunCell {
                roles: wsc.roles,
                wsc: wsc.total,
                micros,
            });
        }

        rows.push((mur, cells));
    }

    let rendered = if latex {
        render_latex(&stem(&dataset), &labels, &rows)
    } else {
        render_text(&labels, &rows)
    };

    match output {
        Some(path) => {
            let path = resolve_output(path, &config.experiment.output_dir);
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            fs::write(&path, rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote tables to {}", path.display());
        }
        None => print!("{rendered}"),
    }

    Ok(())
}

/// Paths that exist (or are absolute) are taken as given; missing relative
/// paths are searched in the configured experiment directory.
fn locate(path: &Path, dir: &Path) -> PathBuf {
    if path.is_absolute() || path.exists() {
        path.to_path_buf()
    } else {
        dir.join(path)
    }
}

/// Bare output file names land in the configured output directory; anything
/// with a directory component is taken as given.
fn resolve_output(path: &Path, output_dir: &Path) -> PathBuf {
    if path.is_absolute() || path.components().count() > 1 {
        path.to_path_buf()
    } else {
        output_dir.join(path)
    }
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| path.display().to_string(), |s| s.to_string_lossy().into_owned())
}

/// Human-readable dataset name: "americas_large" -> "Americas Large".
fn display_name(stem: &str) -> String {
    stem.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn metric(cell: &RunCell, index: usize) -> u128 {
    match index {
        0 => cell.roles as u128,
        1 => cell.wsc as u128,
        _ => cell.micros,
    }
}

const METRIC_TITLES: [&str; 3] = ["Role-set size", "WSC", "Execution time (us)"];

fn render_text(labels: &[String], rows: &[(usize, Vec<RunCell>)]) -> String {
    let mut out = String::new();
    for (index, title) in METRIC_TITLES.iter().enumerate() {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        let mut header = vec![Cell::new("mur").fg(Color::Cyan)];
        header.extend(labels.iter().map(|l| Cell::new(l).fg(Color::Cyan)));
        table.set_header(header);

        for (mur, cells) in rows {
            let min = cells.iter().map(|c| metric(c, index)).min().unwrap_or(0);
            let mut row = vec![Cell::new(mur)];
            for cell in cells {
                let value = metric(cell, index);
                let rendered = Cell::new(value);
                row.push(if value <= min {
                    rendered.fg(Color::Green)
                } else {
                    rendered
                });
            }
            table.add_row(row);
        }

        let _ = writeln!(out, "{title}");
        let _ = writeln!(out, "{table}");
        out.push('\n');
    }
    out
}

/// LaTeX rendition in the shape of the published experiment tables: one
/// table per metric, per-row minima in bold.
fn render_latex(dataset: &str, labels: &[String], rows: &[(usize, Vec<RunCell>)]) -> String {
    let name = display_name(dataset);
    let suffixes = ["r", "w", "t"];
    let mut out = String::new();
    let _ = writeln!(out, "\\section{{Dataset {name}}}");
    out.push('\n');

    for (index, title) in METRIC_TITLES.iter().enumerate() {
        let _ = writeln!(out, "\\begin{{table}}[h]");
        let _ = writeln!(out, "\\centering");
        let _ = writeln!(out, "\\small{{");
        let _ = writeln!(out, "\\begin{{tabular}}{{c{}}} \\hline", "r".repeat(labels.len()));

        let header: Vec<String> = labels.iter().map(|l| format!("{l:^10}")).collect();
        let _ = writeln!(out, " mur & {} \\\\", header.join(" & "));

        for (mur, cells) in rows {
            let min = cells.iter().map(|c| metric(c, index)).min().unwrap_or(0);
            let mut line = format!("{mur:>4}");
            for cell in cells {
                let value = metric(cell, index);
                if value <= min {
                    let _ = write!(line, " & \\bf {value:>6}");
                } else {
                    let _ = write!(line, " & {value:>10}");
                }
            }
            let _ = writeln!(out, "{line} \\\\");
        }

        let _ = writeln!(out, "\\end{{tabular}}");
        let _ = writeln!(out, "\\caption{{{title} for dataset {name}}}");
        let _ = writeln!(out, "\\label{{tab_{dataset}_{}}}", suffixes[index]);
        let _ = writeln!(out, "}}");
        let _ = writeln!(out, "\\end{{table}}");
        let _ = writeln!(out, "\\clearpage");
        out.push('\n');
    }
    out
}
