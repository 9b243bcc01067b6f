//! Triplet-loss recommender training CLI

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use reclens::{
    BilinearModel, Dataset, DeepModel, ModelConfig, RankingEvaluator, TrainableModel, Trainer,
    TrainingConfig,
};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModelKind {
    /// Cosine similarity between user and item embeddings
    Bilinear,
    /// Feed-forward network over concatenated embeddings
    Deep,
}

#[derive(Parser)]
#[command(name = "reclens")]
#[command(about = "Train triplet-loss recommendation models on MovieLens-100k")]
struct Args {
    /// Directory holding ua.base, ua.test and u.item
    #[arg(short, long)]
    data_dir: PathBuf,

    /// Scoring model variant
    #[arg(short, long, value_enum, default_value_t = ModelKind::Bilinear)]
    model: ModelKind,

    /// Number of training epochs
    #[arg(short, long, default_value = "10")]
    epochs: usize,

    /// Embedding dimensionality
    #[arg(long, default_value = "32")]
    dimensions: usize,

    /// SGD learning rate
    #[arg(long, default_value = "0.05")]
    learning_rate: f32,

    /// Margin of the comparator loss
    #[arg(long, default_value = "1.0")]
    margin: f32,

    /// Mini-batch size
    #[arg(long, default_value = "64")]
    batch_size: usize,

    /// Hidden layer width (deep model only)
    #[arg(long, default_value = "64")]
    hidden_units: usize,

    /// Seed for parameter initialization
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Logging level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Write a JSON training report to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };
    tracing_subscriber::fmt().with_max_level(log_level).init();

    let dataset = Dataset::load(&args.data_dir)
        .with_context(|| format!("failed to load dataset from {}", args.data_dir.display()))?;

    let model_config = ModelConfig {
        dimensions: args.dimensions,
        learning_rate: args.learning_rate,
        margin: args.margin,
        hidden_units: args.hidden_units,
        seed: args.seed,
    };
    let training_config = TrainingConfig {
        epochs: args.epochs,
        batch_size: args.batch_size,
    };

    info!(
        "Training {:?} model: dim {}, lr {}, margin {}, {} epochs",
        args.model, args.dimensions, args.learning_rate, args.margin, args.epochs
    );

    match args.model {
        ModelKind::Bilinear => {
            let model = BilinearModel::new(model_config.clone(), dataset.num_users, dataset.num_items);
            run(model, &dataset, &model_config, &training_config, args.report.as_deref())
        }
        ModelKind::Deep => {
            let model = DeepModel::new(model_config.clone(), dataset.num_users, dataset.num_items);
            run(model, &dataset, &model_config, &training_config, args.report.as_deref())
        }
    }
}

fn run<M: TrainableModel>(
    mut model: M,
    dataset: &Dataset,
    model_config: &ModelConfig,
    training_config: &TrainingConfig,
    report_path: Option<&std::path::Path>,
) -> Result<()> {
    let trainer = Trainer::new(training_config.clone());
    let stats = trainer.run(&mut model, dataset)?;

    let evaluation = RankingEvaluator::new(dataset).evaluate(&model)?;
    info!(
        "Finished in {:.1}s: final loss {:.4}, mean test AUC {:.4}",
        stats.training_time_seconds, stats.final_loss, evaluation.mean_auc
    );

    if let Some(path) = report_path {
        let report = serde_json::json!({
            "model": model.stats(),
            "model_config": model_config,
            "training_config": training_config,
            "training": stats,
            "evaluation": evaluation,
        });
        std::fs::write(path, serde_json::to_string_pretty(&report)?)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        info!("Report written to {}", path.display());
    }

    Ok(())
}
