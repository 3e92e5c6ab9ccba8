//! HRI Trials CLI.
//!
//! Commands:
//! - play: One interactive trial, driven by button presses on stdin
//! - batch: Every robot behaviour against the scripted human
//! - scenario: Generate and display a trial layout

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use gridworld_kernel::policy::InputAdapter;
use gridworld_kernel::{EnvironmentConfig, Phase, ScenarioConfig};
use hri_trials::experiment::{BatchConfig, BatchRunner};
use hri_trials::input::{spawn_stdin, trial_keys};
use hri_trials::render::render;
use hri_trials::scenario::{Scenario, ScenarioGenerator, HUMAN, ROBOT};
use hri_trials::sink::LogSink;
use hri_trials::trial::{HumanDriver, RobotKind, RunningTrial, TrialConfig};

const GLYPHS: [(&str, char); 2] = [(HUMAN, 'H'), (ROBOT, 'R')];

/// Generate a timestamped output path from the given path.
/// e.g., "trials.json" -> "trials-20260108-010530.json"
fn timestamped_path(path: &Path) -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d-%H%M%S");
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("trials");
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("json");
    let parent = path.parent().unwrap_or(Path::new("."));
    parent.join(format!("{}-{}.{}", stem, timestamp, ext))
}

#[derive(Parser)]
#[command(name = "hri-trials")]
#[command(version)]
#[command(about = "Human-robot interaction grid-world trials")]
struct Cli {
    /// Endpoint that receives finished episode logs (stdout when unset)
    #[arg(long = "sink-url", env = "HRI_SINK_URL")]
    sink_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play one trial: type 1-4 or w/a/s/d and press enter to move
    Play {
        /// Robot behaviour
        #[arg(long, default_value = "stationary")]
        robot: String,

        /// Scenario file (generated layout when unset)
        #[arg(long)]
        scenario: Option<PathBuf>,

        /// Random seed for the generated layout and the robot
        #[arg(long)]
        seed: Option<u64>,

        /// Steps before the trial times out
        #[arg(long)]
        max_steps: Option<usize>,

        /// Pause between turns in milliseconds
        #[arg(long, default_value = "100")]
        turn_delay_ms: u64,

        /// Let the scripted stand-in play the human
        #[arg(long)]
        scripted: bool,
    },

    /// Run a batch of unattended trials
    Batch {
        /// Number of trials per robot behaviour
        #[arg(long, default_value = "10")]
        trials: usize,

        /// Robots to test (comma-separated). Default: all
        #[arg(long, value_delimiter = ',')]
        robots: Option<Vec<String>>,

        /// Steps before a trial times out
        #[arg(long, default_value = "100")]
        max_steps: usize,

        /// Base random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Output file for results
        #[arg(long, default_value = "trials.json")]
        output: PathBuf,
    },

    /// Generate and display a trial layout
    Scenario {
        /// Random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Also print the layout as a scenario file
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging; RUST_LOG overrides the verbosity flag
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let sink = LogSink::from_url(cli.sink_url.as_deref())?;

    match cli.command {
        Commands::Play {
            robot,
            scenario,
            seed,
            max_steps,
            turn_delay_ms,
            scripted,
        } => {
            let scenario = match scenario {
                Some(path) => Scenario::from_config(&ScenarioConfig::load(&path)?)?,
                None => ScenarioGenerator::new(seed).generate()?,
            };
            let config = TrialConfig {
                robot: robot.parse()?,
                max_steps,
                turn_delay: Duration::from_millis(turn_delay_ms),
                seed,
            };

            let human = if scripted {
                HumanDriver::Scripted
            } else {
                let adapter = InputAdapter::new(trial_keys());
                // Detached: the pending stdin read outlives the trial.
                spawn_stdin(adapter.clone())?;
                println!("Move with 1-4 (W, N, E, S) or w/a/s/d, then enter.");
                HumanDriver::Buttons(adapter)
            };

            let trial = RunningTrial::start(&scenario, &config, &human).await?;
            let mut shown = None;
            loop {
                let status = trial.status().await?;
                if shown != Some(status.steps) {
                    shown = Some(status.steps);
                    println!("\nStep {}", status.steps);
                    print!("{}", render(&status.world.grid, &status.world.positions, &GLYPHS));
                }
                if status.phase == Phase::Ended {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }

            let log = trial.finish().await?;
            println!("\n=== Trial Result ===");
            println!("Robot: {}", config.robot);
            println!("Result: {}", log.result);
            println!("Steps: {}", log.len() - 1);

            sink.deliver(&log).await?;
        }

        Commands::Batch {
            trials,
            robots,
            max_steps,
            seed,
            output,
        } => {
            let robots = match robots {
                Some(names) => names
                    .iter()
                    .map(|name| name.parse::<RobotKind>())
                    .collect::<Result<Vec<_>>>()?,
                None => RobotKind::all(),
            };
            info!(trials = trials, robots = robots.len(), "Starting batch");

            let runner = BatchRunner::new(BatchConfig {
                trials,
                robots,
                max_steps,
                seed,
                ..Default::default()
            });
            let results = runner.run().await?;

            let output_path = timestamped_path(&output);
            results.save(&output_path)?;

            if let LogSink::Http { .. } = sink {
                for record in &results.records {
                    sink.deliver(&record.log)
                        .await
                        .with_context(|| format!("Failed to deliver trial {}", record.id))?;
                }
            }

            println!("\n=== Batch Complete ===");
            println!("Results saved to: {}", output_path.display());
            println!("\nSummary:");
            println!(
                "  {:<14} {:>6} {:>8} {:>8} {:>10} {:>10}",
                "Robot", "Trials", "Success", "Failure", "Unfinished", "MeanSteps"
            );
            for summary in results.summary.values() {
                println!(
                    "  {:<14} {:>6} {:>8} {:>8} {:>10} {:>10.1}",
                    summary.robot,
                    summary.trials,
                    summary.successes,
                    summary.failures,
                    summary.unfinished,
                    summary.mean_steps
                );
            }
        }

        Commands::Scenario { seed, json } => {
            let scenario = ScenarioGenerator::new(seed).generate()?;
            let positions = [
                (HUMAN.to_string(), scenario.human_start),
                (ROBOT.to_string(), scenario.robot_start),
            ]
            .into_iter()
            .collect();

            print!("{}", render(&scenario.grid, &positions, &GLYPHS));
            println!("Goal: {}", scenario.goal);
            println!("Human start: {}", scenario.human_start);
            println!("Robot start: {}", scenario.robot_start);

            if json {
                let config = scenario.to_config(EnvironmentConfig::turn_based());
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}
