mod app_config;

use app_config::AppConfig;
use clap::{Parser, Subcommand};
use fallnet::{export::Precision, model::DECISION_THRESHOLD, subcommands, utils};
use std::{error::Error, path::PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Train the fall classifier and export it
  Train {
    /// YAML file with training settings; flags below take precedence
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Labeled samples, one per line; placeholder data when omitted
    #[arg(short, long, value_name = "PATH")]
    data: Option<PathBuf>,
    /// Where to write the artifact
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,
    #[arg(short, long, value_name = "INT")]
    epochs: Option<usize>,
    #[arg(long, value_name = "INT")]
    batch_size: Option<usize>,
    #[arg(long, value_name = "FLOAT")]
    learning_rate: Option<f32>,
    /// Fraction of samples held out for evaluation
    #[arg(long, value_name = "FLOAT")]
    holdout: Option<f64>,
    #[arg(short, long, value_name = "INT")]
    seed: Option<u64>,
    /// float32 or int8
    #[arg(short, long)]
    precision: Option<Precision>,
    /// Write per-epoch metrics as JSON
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,
  },
  /// Score feature rows with an exported model
  Predict {
    #[arg(short, long, value_name = "PATH")]
    model: PathBuf,
    /// Feature rows, one per line
    #[arg(short, long, value_name = "PATH")]
    input: PathBuf,
    #[arg(short, long, default_value_t = DECISION_THRESHOLD)]
    threshold: f32,
  },
  /// Describe an exported model
  Inspect {
    #[arg(short, long, value_name = "PATH")]
    model: PathBuf,
  },
}

fn main() -> Result<(), Box<dyn Error>> {
  utils::init_logging()?;
  let args = Cli::parse();

  match args.command {
    Command::Train {
      config,
      data,
      output,
      epochs,
      batch_size,
      learning_rate,
      holdout,
      seed,
      precision,
      report,
    } => {
      let file_config = match &config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
      };
      let cli_config = AppConfig {
        seed,
        epochs,
        batch_size,
        learning_rate,
        holdout_fraction: holdout,
        precision,
        output,
        ..AppConfig::default()
      };
      let train_config = file_config.merge(cli_config).resolve();
      let app = subcommands::Train::new(train_config, data.as_deref(), report.as_deref());
      let outcome = app.run()?;
      if let Some(last) = outcome.history.last() {
        info!("Final epoch: {:?}", last);
      }
    }
    Command::Predict {
      model,
      input,
      threshold,
    } => {
      let app = subcommands::Predict::new(&model, &input, threshold);
      for p in app.run()? {
        println!(
          "{:.6}\t{}",
          p.probability,
          if p.fall { "fall" } else { "no-fall" }
        );
      }
    }
    Command::Inspect { model } => {
      let app = subcommands::Inspect::new(&model);
      println!("{}", app.run()?);
    }
  }
  Ok(())
}
