//! Scenario replay CLI for the locomotion engine.

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;
use transect_sim::ScenarioId;

/// Replays the locomotion engine's literal behavioural scenarios.
#[derive(Parser, Debug)]
#[command(name = "transect-sim")]
#[command(about = "Run deterministic scenario replays for transect_core", long_about = None)]
struct Args {
    /// Master seed for the synthetic fix generator.
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario to run, or "all".
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// JSON output for CI parsing.
    #[arg(long)]
    json: bool,

    /// Verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("failed to set tracing subscriber");

    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all().to_vec()
    } else {
        vec![args.scenario.parse().unwrap_or_else(|e| {
            eprintln!("Error: {e}");
            eprintln!(
                "Available scenarios: {}",
                ScenarioId::all().iter().map(|s| s.name()).collect::<Vec<_>>().join(", ")
            );
            std::process::exit(1);
        })]
    };

    if !args.json {
        info!("transect scenario replay (seed={})", args.seed);
    }

    let mut failed = 0usize;
    let results: Vec<(ScenarioId, transect_sim::ScenarioOutcome)> = scenarios
        .into_iter()
        .map(|scenario| (scenario, scenario.run(args.seed)))
        .collect();

    for (scenario, outcome) in &results {
        if !outcome.passed() {
            failed += 1;
        }
        if !args.json {
            if outcome.passed() {
                info!("✓ {} PASSED", scenario.name());
            } else {
                error!("✗ {} FAILED", scenario.name());
            }
            for (check, ok) in &outcome.checks {
                info!("    [{}] {}", if *ok { "x" } else { " " }, check);
            }
        }
    }

    if args.json {
        let summary = serde_json::json!({
            "total": results.len(),
            "passed": results.len() - failed,
            "failed": failed,
            "results": results.iter().map(|(scenario, outcome)| {
                serde_json::json!({
                    "scenario": scenario.name(),
                    "passed": outcome.passed(),
                    "checks": outcome.checks.iter().map(|(name, ok)| {
                        serde_json::json!({ "check": name, "passed": ok })
                    }).collect::<Vec<_>>(),
                })
            }).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&summary).unwrap());
    } else {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        if failed == 0 {
            info!("all {} scenario(s) passed", results.len());
        } else {
            error!("{}/{} scenario(s) failed", failed, results.len());
        }
    }

    if failed > 0 {
        std::process::exit(1);
    }
}
