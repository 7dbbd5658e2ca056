//! Interactive shell over a TZ oracle.
//!
//! Restores persisted tables (or preprocesses the topology) and then reads
//! commands from stdin until `exit` or end of input.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use tz_oracle::audit::init_console_logging;
use tz_oracle::persist::load_topology;
use tz_oracle::shell::{execute, Command};
use tz_oracle::{Result, SimulationConfig, StrategyKind, TZOracle};

fn load(config: &SimulationConfig) -> Result<TZOracle> {
    let files = config.oracle_files();
    if config.restore {
        return files.restore(config.tz_config());
    }
    let topology = load_topology(&files.topology)?;
    let mut oracle = TZOracle::new(topology, config.tz_config());
    oracle.elect_landmarks(&config.selection_strategy()?)?;
    oracle.preprocess()?;
    Ok(oracle)
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let mut config = SimulationConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                if i + 1 < args.len() {
                    match SimulationConfig::from_json_file(&args[i + 1]) {
                        Ok(loaded) => config = loaded,
                        Err(e) => eprintln!("Ignoring {}: {}", args[i + 1], e),
                    }
                    i += 1;
                }
            }
            "--dir" => {
                if i + 1 < args.len() {
                    config.dataset_dir = PathBuf::from(&args[i + 1]);
                    i += 1;
                }
            }
            "--dataset" | "-d" => {
                if i + 1 < args.len() {
                    config.dataset = args[i + 1].clone();
                    i += 1;
                }
            }
            "--k" | "-k" => {
                if i + 1 < args.len() {
                    config.k = args[i + 1].parse().unwrap_or(config.k);
                    i += 1;
                }
            }
            "--strategy" | "-s" => {
                if i + 1 < args.len() {
                    config.strategy = args[i + 1]
                        .parse()
                        .ok()
                        .and_then(StrategyKind::from_code)
                        .unwrap_or(config.strategy);
                    i += 1;
                }
            }
            "--ranking" => {
                if i + 1 < args.len() {
                    config.ranking_file = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--seed" => {
                if i + 1 < args.len() {
                    config.seed = args[i + 1].parse().unwrap_or(config.seed);
                    i += 1;
                }
            }
            "--restore" => config.restore = true,
            "--help" | "-h" => {
                println!("Usage: tz_shell [--config FILE] [--dir DIR] [-d NAME] [-k NUM] [-s CODE] [--ranking FILE] [--seed NUM] [--restore]");
                return;
            }
            _ => {}
        }
        i += 1;
    }

    init_console_logging();

    let mut oracle = match load(&config) {
        Ok(oracle) => oracle,
        Err(e) => {
            eprintln!("Failed to build the oracle: {}", e);
            std::process::exit(1);
        }
    };
    println!(
        "{} ASes, {} links, k = {}. Type 'help' for commands.",
        oracle.topology().len(),
        oracle.count_links(),
        oracle.k()
    );

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("$ ");
        let _ = std::io::stdout().flush();

        let Some(Ok(line)) = lines.next() else {
            break;
        };
        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };
        if command == Command::Exit {
            break;
        }
        match execute(&mut oracle, command) {
            Ok(text) => println!("{}", text),
            Err(e) if e.is_invariant_violation() => {
                eprintln!("{}", e);
                std::process::exit(1);
            }
            Err(e) => println!("{}", e),
        }
    }
}
