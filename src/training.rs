//! Epoch-based training driver
//!
//! Every epoch resamples one triplet per positive training interaction with
//! seed = epoch index, fits the model over shuffled mini-batches, then
//! measures mean per-user ROC AUC on the test split. No early stopping,
//! checkpointing or learning-rate scheduling.

use crate::data::{Dataset, Split};
use crate::evaluation::RankingEvaluator;
use crate::sampler::TripletSampler;
use crate::{TrainableModel, TrainingStats};
use anyhow::{ensure, Result};
use rand::prelude::SliceRandom;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

/// Training-loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Number of epochs to run
    pub epochs: usize,
    /// Mini-batch size
    pub batch_size: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 10,
            batch_size: 64,
        }
    }
}

/// Runs the resample / fit / evaluate cycle
#[derive(Debug, Clone)]
pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    /// Train the model on the dataset's positive interactions and report
    /// per-epoch loss and test AUC.
    pub fn run<M: TrainableModel>(&self, model: &mut M, dataset: &Dataset) -> Result<TrainingStats> {
        let positives = dataset.positives(Split::Train);
        ensure!(
            !positives.is_empty(),
            "training split has no positive interactions"
        );

        let sampler = TripletSampler::new(dataset.num_items);
        let evaluator = RankingEvaluator::new(dataset);
        let start = Instant::now();
        let mut loss_history = Vec::with_capacity(self.config.epochs);
        let mut auc_history = Vec::with_capacity(self.config.epochs);

        for epoch in 0..self.config.epochs {
            // Fresh negatives every epoch, reproducible per epoch index
            let triplets = sampler.sample(&positives, epoch as u64);

            let mut indices: Vec<usize> = (0..triplets.len()).collect();
            indices.shuffle(&mut StdRng::seed_from_u64(epoch as u64));

            let mut epoch_loss = 0.0;
            for chunk in indices.chunks(self.config.batch_size) {
                let users: Vec<u32> = chunk.iter().map(|&i| triplets.users[i]).collect();
                let pos: Vec<u32> = chunk.iter().map(|&i| triplets.positives[i]).collect();
                let neg: Vec<u32> = chunk.iter().map(|&i| triplets.negatives[i]).collect();
                let batch_loss = model.fit_batch(&users, &pos, &neg)?;
                epoch_loss += batch_loss * chunk.len() as f32;
            }
            let mean_loss = epoch_loss / triplets.len() as f32;

            let report = evaluator.evaluate(model)?;
            info!(
                "epoch {}/{}: triplet loss {:.4}, test AUC {:.4}",
                epoch + 1,
                self.config.epochs,
                mean_loss,
                report.mean_auc
            );

            loss_history.push(mean_loss);
            auc_history.push(report.mean_auc);
        }

        Ok(TrainingStats {
            epochs_completed: self.config.epochs,
            final_loss: loss_history.last().copied().unwrap_or(0.0),
            training_time_seconds: start.elapsed().as_secs_f64(),
            loss_history,
            auc_history,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Interaction;
    use crate::{BilinearModel, ModelConfig, ScoringModel};

    fn interaction(user_id: u32, item_id: u32, rating: u8) -> Interaction {
        Interaction {
            user_id,
            item_id,
            rating,
            timestamp: 0,
        }
    }

    fn synthetic_dataset() -> Dataset {
        let train = vec![
            interaction(1, 1, 5),
            interaction(1, 2, 4),
            interaction(1, 3, 5),
            interaction(2, 4, 4),
            interaction(2, 5, 5),
            interaction(2, 6, 4),
            interaction(1, 7, 1),
        ];
        let test = vec![interaction(1, 8, 5), interaction(2, 7, 4)];
        Dataset::from_parts(train, test, Vec::new()).unwrap()
    }

    #[test]
    fn test_training_runs_and_reduces_loss() {
        let dataset = synthetic_dataset();
        let config = ModelConfig::default()
            .with_dimensions(8)
            .with_learning_rate(0.1);
        let mut model = BilinearModel::new(config, dataset.num_users, dataset.num_items);

        let trainer = Trainer::new(TrainingConfig {
            epochs: 20,
            batch_size: 4,
        });
        let stats = trainer.run(&mut model, &dataset).unwrap();

        assert_eq!(stats.epochs_completed, 20);
        assert_eq!(stats.loss_history.len(), 20);
        assert_eq!(stats.auc_history.len(), 20);
        assert!(stats.final_loss.is_finite());
        assert!(
            stats.final_loss < stats.loss_history[0],
            "loss did not decrease: {:?}",
            stats.loss_history
        );
        assert!(stats.auc_history.iter().all(|auc| (0.0..=1.0).contains(auc)));
        assert!(model.stats().is_trained);
    }

    #[test]
    fn test_training_requires_positive_interactions() {
        let dataset = Dataset::from_parts(
            vec![interaction(1, 1, 2), interaction(1, 2, 3)],
            vec![interaction(1, 3, 5)],
            Vec::new(),
        )
        .unwrap();
        let mut model = BilinearModel::new(ModelConfig::default(), 1, 3);
        let trainer = Trainer::new(TrainingConfig::default());
        assert!(trainer.run(&mut model, &dataset).is_err());
    }
}
