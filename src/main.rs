//! Ring Search CLI - Run a layout search from JSON configuration.

use std::fs;
use std::path::PathBuf;
use std::process;
use std::time::Instant;

use ring_search::{
    compute::{CommandOracle, SearchEngine},
    schema::{CommandSpec, OracleConfig, OutputConfig, SearchConfig, SearchProgress},
};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <config.json> [output_dir]", args[0]);
        eprintln!();
        eprintln!("Search concentric ring layouts from JSON configuration.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  config.json  Path to search configuration file");
        eprintln!("  output_dir   Result directory (overrides output.dir)");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let config_path = PathBuf::from(&args[1]);

    let config_str = fs::read_to_string(&config_path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        process::exit(1);
    });

    let mut config: SearchConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        process::exit(1);
    });

    if let Some(dir) = args.get(2) {
        config.output.dir = Some(PathBuf::from(dir));
    }

    let Some(oracle_config) = config.oracle.clone() else {
        eprintln!("Config has no \"oracle\" section; nothing can score candidates.");
        process::exit(1);
    };

    let oracle = CommandOracle::new(oracle_config, config.envelope.clone()).unwrap_or_else(|e| {
        eprintln!("Error preparing oracle: {}", e);
        process::exit(1);
    });

    println!("Ring Layout Search");
    println!("==================");
    println!("Rings: {}", config.rings);
    for (class, stock) in [
        (config.inventory.short.name.as_str(), config.inventory.short.count),
        (config.inventory.long.name.as_str(), config.inventory.long.count),
    ] {
        println!("Stock: {} x {}", stock, class);
    }
    println!(
        "Radius domain: [{}, {}] mm, spacing >= {} mm",
        config.domain.min_radius, config.domain.max_radius, config.domain.min_spacing
    );
    println!("Rounds: {}", config.strategy.round_budget());
    println!("Events per trial: {}", config.run.events);
    println!();

    let mut engine = SearchEngine::from_config(config, oracle).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        process::exit(1);
    });

    let start = Instant::now();
    let result = engine
        .run_with_callback(print_progress)
        .unwrap_or_else(|e| {
            eprintln!("Search failed: {}", e);
            process::exit(1);
        });

    println!();
    println!("Summary ({} strategy):", result.strategy);
    println!("  Trials: {}", result.stats.trials);
    println!("  Evaluated: {}", result.stats.evaluated);
    println!("  Rejected: {}", result.stats.rejected);
    println!("  Failed: {}", result.stats.failed);
    match &result.best {
        Some(best) => {
            println!("  Best efficiency: {:.4}% (trial {})", best.score, best.index);
            println!("  Layout: {}", best.candidate.describe());
            println!(
                "  Objects: {} short, {} long",
                best.totals.short, best.totals.long
            );
        }
        None => println!("  No trial was evaluated successfully."),
    }
    if let Some(dir) = &engine.config().output.dir {
        println!("  Results: {}", dir.display());
    }
    println!("Time: {:.1}s", start.elapsed().as_secs_f32());
}

fn print_progress(progress: &SearchProgress) {
    use ring_search::schema::SearchPhase;

    if progress.phase == SearchPhase::Record {
        println!(
            "  Round {}/{}: trial {} score={:.4} best={}",
            progress.round + 1,
            progress.total_rounds,
            progress.trials,
            progress.last_score.unwrap_or(0.0),
            progress
                .best_score
                .map_or_else(|| "-".to_string(), |s| format!("{s:.4}"))
        );
    }
}

fn print_example_config() {
    let mut analysis = CommandSpec::new("analyze").with_args(["{workdir}/output.root"]);
    analysis.timeout_secs = Some(60);

    let mut oracle = OracleConfig::new(
        CommandSpec::new("simulate").with_args(["{geometry}", "{macro}"]),
        "trials",
    );
    oracle.analysis = Some(analysis);

    let config = SearchConfig {
        oracle: Some(oracle),
        output: OutputConfig {
            dir: Some(PathBuf::from("results")),
            ..Default::default()
        },
        ..Default::default()
    };

    match serde_json::to_string_pretty(&config) {
        Ok(json) => {
            println!("Example configuration (config.json):");
            println!("{}", json);
        }
        Err(e) => {
            eprintln!("Error serializing example: {}", e);
            process::exit(1);
        }
    }
}
