//! Triplet-loss recommendation models for MovieLens-100k
//!
//! This crate trains small embedding models on implicit feedback (a rating of
//! 4 or higher counts as a positive interaction) and evaluates ranking quality
//! with per-user ROC AUC:
//! - Bilinear: cosine similarity between a user embedding and an item embedding
//! - Deep: a shared feed-forward network over concatenated embeddings
//!
//! Training minimizes a margin comparator loss over (user, positive item,
//! negative item) triplets, with negatives resampled uniformly every epoch.

pub mod data;
pub mod evaluation;
pub mod loss;
pub mod models;
pub mod sampler;
pub mod training;

pub use data::{Dataset, Interaction, Movie, Split};
pub use evaluation::{roc_auc, RankingEvaluator, RankingReport};
pub use loss::{margin_loss, DEFAULT_MARGIN};
pub use models::{BilinearModel, DeepModel};
pub use sampler::{TripletBatch, TripletSampler};
pub use training::{Trainer, TrainingConfig};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by scoring models
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("user id {id} out of range (valid ids are 1..={max})")]
    UserOutOfRange { id: u32, max: u32 },
    #[error("item id {id} out of range (valid ids are 1..={max})")]
    ItemOutOfRange { id: u32, max: u32 },
    #[error("triplet batch sequences must have equal non-zero length")]
    InvalidBatch,
}

/// Configuration shared by all scoring models
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Embedding dimensionality
    pub dimensions: usize,
    /// SGD learning rate
    pub learning_rate: f32,
    /// Margin for the comparator loss
    pub margin: f32,
    /// Hidden layer width (deep model only)
    pub hidden_units: usize,
    /// Seed for parameter initialization
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            dimensions: 32,
            learning_rate: 0.05,
            margin: DEFAULT_MARGIN,
            hidden_units: 64,
            seed: 42,
        }
    }
}

impl ModelConfig {
    /// Set embedding dimensionality
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    /// Set the learning rate
    pub fn with_learning_rate(mut self, learning_rate: f32) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Set the loss margin
    pub fn with_margin(mut self, margin: f32) -> Self {
        self.margin = margin;
        self
    }

    /// Set the initialization seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Model statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelStats {
    pub model_id: uuid::Uuid,
    pub num_users: u32,
    pub num_items: u32,
    pub dimensions: usize,
    pub is_trained: bool,
    pub model_type: String,
    pub creation_time: DateTime<Utc>,
    pub last_training_time: Option<DateTime<Utc>>,
}

/// Statistics collected over one training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingStats {
    pub epochs_completed: usize,
    pub final_loss: f32,
    pub training_time_seconds: f64,
    /// Mean triplet loss per epoch
    pub loss_history: Vec<f32>,
    /// Mean per-user ROC AUC on the test split per epoch
    pub auc_history: Vec<f64>,
}

/// A model that assigns a compatibility score to (user, item) pairs
pub trait ScoringModel: Send + Sync {
    /// Score a single (user, item) pair
    fn score(&self, user_id: u32, item_id: u32) -> Result<f32, ModelError>;

    /// Score one user against many items in one call
    fn score_batch(&self, user_id: u32, item_ids: &[u32]) -> Result<Vec<f32>, ModelError>;

    /// Model statistics
    fn stats(&self) -> ModelStats;
}

/// A scoring model that can be fit on triplet mini-batches
pub trait TrainableModel: ScoringModel {
    /// Perform one SGD step on a mini-batch of (user, positive, negative)
    /// triplets and return the mean margin comparator loss over the batch.
    fn fit_batch(
        &mut self,
        users: &[u32],
        positives: &[u32],
        negatives: &[u32],
    ) -> Result<f32, ModelError>;
}
