//! Epoch-seeded triplet sampling
//!
//! For every positive (user, item) interaction one negative item id is drawn
//! uniformly from [1, num_items]. No rejection sampling is performed: a drawn
//! negative may coincide with a true positive for that user, which is an
//! accepted source of label noise in this training scheme.

use crate::data::Interaction;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Three parallel sequences of equal length, one triplet per position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripletBatch {
    pub users: Vec<u32>,
    pub positives: Vec<u32>,
    pub negatives: Vec<u32>,
}

impl TripletBatch {
    /// Number of triplets
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether the batch holds no triplets
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// Uniform negative sampler over the item id range
#[derive(Debug, Clone)]
pub struct TripletSampler {
    num_items: u32,
}

impl TripletSampler {
    /// Create a sampler for item ids in [1, num_items]
    pub fn new(num_items: u32) -> Self {
        Self { num_items }
    }

    /// Draw one triplet per positive interaction.
    ///
    /// Users and positive item ids are copied from the table in order;
    /// negatives are drawn independently per position. The output is exactly
    /// reproducible for a fixed seed and input table.
    pub fn sample(&self, positives: &[Interaction], seed: u64) -> TripletBatch {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut batch = TripletBatch {
            users: Vec::with_capacity(positives.len()),
            positives: Vec::with_capacity(positives.len()),
            negatives: Vec::with_capacity(positives.len()),
        };
        for interaction in positives {
            batch.users.push(interaction.user_id);
            batch.positives.push(interaction.item_id);
            batch.negatives.push(rng.gen_range(1..=self.num_items));
        }
        batch
    }
}
