//! TZ Oracle Simulation
//!
//! Builds (or restores) the oracle for an AS topology, runs the configured
//! measurements against the path-vector baseline and writes a JSON summary.

use chrono::{DateTime, Utc};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tz_oracle::audit::{init_audit_logging, init_console_logging};
use tz_oracle::harness::{
    measure_chosen_deletions_stretch, measure_chosen_edge_deletion_impact,
    measure_deletion_stretch, measure_edge_deletion_impact,
    measure_landmark_level_after_deletion, measure_random_deletions_stretch, measure_stretch,
    ImpactReport, LevelSample, StretchIncreaseReport, StretchReport,
};
use tz_oracle::persist::{load_edge_deletions, load_topology};
use tz_oracle::recorder::Recorder;
use tz_oracle::{BgpGraph, OracleError, Result, SimulationConfig, StrategyKind, TZOracle};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SimulationSummary {
    generated_at: DateTime<Utc>,
    config: SimulationConfig,
    nodes: usize,
    links: usize,
    bunch_entries: usize,
    build_ms: u128,
    restored: bool,
    stretch: Option<StretchReport>,
    deletion_stretch: Option<StretchIncreaseReport>,
    level_samples: Option<Vec<LevelSample>>,
    impact: Option<ImpactReport>,
    chosen_impact: Option<ImpactReport>,
    random_deletions: Option<StretchIncreaseReport>,
    chosen_deletions: Option<StretchIncreaseReport>,
}

fn recorder_for(config: &SimulationConfig, measurement: &str) -> Result<Option<Recorder>> {
    match config.record_path(measurement) {
        Some(path) => {
            ensure_output_dir(&path);
            Ok(Some(Recorder::create(path)?))
        }
        None => Ok(None),
    }
}

fn ensure_output_dir(path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }
}

fn build_oracle(config: &SimulationConfig) -> Result<(TZOracle, bool)> {
    let files = config.oracle_files();
    if config.restore {
        println!("Restoring tables from {}", files.bunches.display());
        return Ok((files.restore(config.tz_config())?, true));
    }

    let topology = load_topology(&files.topology)?;
    println!(
        "Loaded {} ASes, {} links",
        topology.len(),
        topology.count_links()
    );
    let mut oracle = TZOracle::new(topology, config.tz_config());
    oracle.elect_landmarks(&config.selection_strategy()?)?;
    oracle.preprocess()?;
    if config.save {
        files.save(&oracle)?;
    }
    Ok((oracle, false))
}

fn run(config: SimulationConfig) -> Result<SimulationSummary> {
    let build_start = Instant::now();
    let (oracle, restored) = build_oracle(&config)?;
    let build_ms = build_start.elapsed().as_millis();
    println!(
        "Oracle ready in {} ms ({} bunch entries)",
        build_ms,
        oracle.total_bunch_entries()
    );

    let baseline = BgpGraph::new(oracle.topology().clone());
    let mut rng = StdRng::seed_from_u64(config.seed);
    let deletions = match &config.deletions_file {
        Some(path) => Some(load_edge_deletions(path)?),
        None => None,
    };

    let mut summary = SimulationSummary {
        generated_at: Utc::now(),
        config: config.clone(),
        nodes: oracle.topology().len(),
        links: oracle.count_links(),
        bunch_entries: oracle.total_bunch_entries(),
        build_ms,
        restored,
        stretch: None,
        deletion_stretch: None,
        level_samples: None,
        impact: None,
        chosen_impact: None,
        random_deletions: None,
        chosen_deletions: None,
    };

    if config.stretch_rounds > 0 && config.stretch_batches > 0 {
        let recorder = recorder_for(&config, "stretch")?;
        let report = measure_stretch(
            &baseline,
            &oracle,
            config.stretch_rounds,
            config.stretch_batches,
            config.seed,
            config.valley_check,
            recorder.as_ref(),
        )?;
        println!(
            "Average stretch: {:.4}\tMaximum stretch: {:.4}\tValleys: {:.2}%",
            report.average,
            report.max,
            report.valley_ratio() * 100.0
        );
        summary.stretch = Some(report);
    }

    if config.deletion_stretch_batches > 0 {
        let recorder = recorder_for(&config, "deletion-stretch")?;
        let report = measure_deletion_stretch(
            &baseline,
            &oracle,
            config.deletion_stretch_batches,
            &mut rng,
            recorder.as_ref(),
        )?;
        println!(
            "Average stretch increase: {:.4}\tMax stretch increase: {:.4}",
            report.average_increase, report.max_increase
        );
        summary.deletion_stretch = Some(report);

        let recorder = recorder_for(&config, "landmark-level")?;
        let samples = measure_landmark_level_after_deletion(
            &baseline,
            &oracle,
            config.deletion_stretch_batches,
            &mut rng,
            recorder.as_ref(),
        )?;
        summary.level_samples = Some(samples);
    }

    if config.impact_batches > 0 {
        let recorder = recorder_for(&config, "impact")?;
        let mut audited = oracle.clone();
        let report =
            measure_edge_deletion_impact(&mut audited, config.impact_batches, &mut rng, recorder.as_ref())?;
        println!(
            "Average impact: {:.2}\tMaximum impact: {}",
            report.average, report.max
        );
        summary.impact = Some(report);
    }

    if let Some(deletions) = &deletions {
        let recorder = recorder_for(&config, "chosen-impact")?;
        let mut audited = oracle.clone();
        let report =
            measure_chosen_edge_deletion_impact(&mut audited, deletions, recorder.as_ref())?;
        println!(
            "Chosen deletions: average impact {:.2}, maximum {}",
            report.average, report.max
        );
        summary.chosen_impact = Some(report);
    }

    if config.deletion_rounds > 0 {
        let recorder = recorder_for(&config, "random-deletions")?;
        let (mut base, mut audited) = (baseline.clone(), oracle.clone());
        let report = measure_random_deletions_stretch(
            &mut base,
            &mut audited,
            config.deletion_rounds,
            config.deletion_proportion,
            config.valley_check,
            &mut rng,
            recorder.as_ref(),
        )?;
        println!(
            "Random deletions: average increase {:.4}, maximum {:.4}, {} restarts",
            report.average_increase, report.max_increase, report.restarts
        );
        summary.random_deletions = Some(report);

        if let Some(deletions) = &deletions {
            let recorder = recorder_for(&config, "chosen-deletions")?;
            let (mut base, mut audited) = (baseline.clone(), oracle.clone());
            let report = measure_chosen_deletions_stretch(
                &mut base,
                &mut audited,
                config.deletion_rounds,
                deletions,
                config.valley_check,
                &mut rng,
                recorder.as_ref(),
            )?;
            summary.chosen_deletions = Some(report);
        }
    }

    Ok(summary)
}

fn print_help() {
    println!("Usage: simulation [OPTIONS]");
    println!();
    println!("Options:");
    println!("      --config FILE         JSON configuration (flags override it)");
    println!("      --dir DIR             Dataset directory (default: data)");
    println!("  -d, --dataset NAME        Dataset name, topology is DIR/NAME.csv");
    println!("  -k, --k NUM               Landmark levels (default: 3)");
    println!("  -s, --strategy NAME|CODE  random, spline, harmonic, immunity (default: random)");
    println!("      --ranking FILE        Node ranking for ranked strategies");
    println!("      --restore             Load persisted tables instead of preprocessing");
    println!("      --no-save             Do not persist tables after preprocessing");
    println!("      --seed NUM            Random seed (default: 42)");
    println!("      --rounds NUM          Stretch rounds (default: 4)");
    println!("      --batches NUM         Routes per stretch round (default: 500)");
    println!("      --impact NUM          Random deletions for impact measurement");
    println!("      --deletion-stretch N  Deletions for stretch-increase measurement");
    println!("      --deletion-rounds N   Rounds of random deletions");
    println!("      --proportion F        Links deleted per round (default: 0.01)");
    println!("      --deletions FILE      Fixed deletion sequence (a,b rows)");
    println!("      --strict-valley       Strict no-valley check");
    println!("      --record DIR          Write per-sample CSV logs to DIR");
    println!("      --log-dir DIR         Write JSON audit logs to DIR");
    println!("  -o, --output FILE         Summary file (default: simulation-summary.json)");
    println!("  -h, --help                Show this help");
}

fn parse_strategy(value: &str) -> Option<StrategyKind> {
    match value {
        "random" => Some(StrategyKind::Random),
        "spline" => Some(StrategyKind::Spline),
        "harmonic" => Some(StrategyKind::Harmonic),
        "immunity" => Some(StrategyKind::Immunity),
        code => code.parse().ok().and_then(StrategyKind::from_code),
    }
}

fn main() {
    println!("TZ Oracle Simulation");
    println!("====================\n");

    let args: Vec<String> = std::env::args().collect();

    let mut config = SimulationConfig::default();
    if let Some(pos) = args.iter().position(|a| a == "--config") {
        if let Some(path) = args.get(pos + 1) {
            match SimulationConfig::from_json_file(path) {
                Ok(loaded) => config = loaded,
                Err(e) => {
                    eprintln!("Failed to load {}: {}", path, e);
                    std::process::exit(1);
                }
            }
        }
    }

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1).cloned();
        let mut consumed = true;
        match (args[i].as_str(), value) {
            ("--config", Some(_)) => {}
            ("--dir", Some(v)) => config.dataset_dir = PathBuf::from(v),
            ("--dataset" | "-d", Some(v)) => config.dataset = v,
            ("--k" | "-k", Some(v)) => config.k = v.parse().unwrap_or(config.k),
            ("--strategy" | "-s", Some(v)) => {
                config.strategy = parse_strategy(&v).unwrap_or(config.strategy)
            }
            ("--ranking", Some(v)) => config.ranking_file = Some(PathBuf::from(v)),
            ("--seed", Some(v)) => config.seed = v.parse().unwrap_or(config.seed),
            ("--rounds", Some(v)) => config.stretch_rounds = v.parse().unwrap_or(config.stretch_rounds),
            ("--batches", Some(v)) => {
                config.stretch_batches = v.parse().unwrap_or(config.stretch_batches)
            }
            ("--impact", Some(v)) => config.impact_batches = v.parse().unwrap_or(0),
            ("--deletion-stretch", Some(v)) => {
                config.deletion_stretch_batches = v.parse().unwrap_or(0)
            }
            ("--deletion-rounds", Some(v)) => config.deletion_rounds = v.parse().unwrap_or(0),
            ("--proportion", Some(v)) => {
                config.deletion_proportion = v.parse().unwrap_or(config.deletion_proportion)
            }
            ("--deletions", Some(v)) => config.deletions_file = Some(PathBuf::from(v)),
            ("--record", Some(v)) => config.record_dir = Some(PathBuf::from(v)),
            ("--log-dir", Some(v)) => config.log_dir = Some(PathBuf::from(v)),
            ("--output" | "-o", Some(v)) => config.output = PathBuf::from(v),
            ("--restore", _) => {
                config.restore = true;
                consumed = false;
            }
            ("--no-save", _) => {
                config.save = false;
                consumed = false;
            }
            ("--strict-valley", _) => {
                config.valley_check = tz_oracle::ValleyCheck::Strict;
                consumed = false;
            }
            ("--help" | "-h", _) => {
                print_help();
                return;
            }
            _ => consumed = false,
        }
        i += if consumed { 2 } else { 1 };
    }

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    let _guard = match &config.log_dir {
        Some(dir) => match init_audit_logging(dir, config.max_log_files) {
            Ok(guard) => Some(guard),
            Err(e) => {
                eprintln!("Audit logging disabled: {}", e);
                init_console_logging();
                None
            }
        },
        None => {
            init_console_logging();
            None
        }
    };

    println!("Configuration:");
    println!("  Dataset:   {}", config.oracle_files().topology.display());
    println!("  k:         {}", config.k);
    println!("  Strategy:  {}", config.strategy);
    println!("  Seed:      {}", config.seed);
    println!();

    let output = config.output.clone();
    let summary = match run(config) {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("Simulation failed: {}", e);
            if matches!(e, OracleError::InvariantViolation(_)) {
                eprintln!("Oracle state is inconsistent; rebuild it with preprocessing");
            }
            std::process::exit(1);
        }
    };

    ensure_output_dir(&output);
    let written = serde_json::to_string_pretty(&summary)
        .map_err(OracleError::from)
        .and_then(|json| std::fs::write(&output, json).map_err(OracleError::from));
    match written {
        Ok(()) => println!("\nResults saved to {}", output.display()),
        Err(e) => {
            eprintln!("Failed to write {}: {}", output.display(), e);
            std::process::exit(1);
        }
    }
}
