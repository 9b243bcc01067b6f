//! Bilinear cosine scoring model
//!
//! Each user and item owns one embedding row; the match score is the cosine
//! similarity of the two vectors. Training applies the hinge subgradient of
//! the margin comparator loss directly to the embedding rows, averaged over
//! the mini-batch.

use super::common::{
    check_batch, check_item, check_user, cosine, init_embeddings, safe_norm, ModelMeta,
};
use crate::loss::margin_loss;
use crate::{ModelConfig, ModelError, ModelStats, ScoringModel, TrainableModel};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;

/// Cosine-similarity matrix factorization model
#[derive(Debug, Clone)]
pub struct BilinearModel {
    config: ModelConfig,
    meta: ModelMeta,
    num_users: u32,
    num_items: u32,
    /// Row `u` holds user `u`'s embedding; row 0 is unused (ids are 1-based)
    user_embeddings: Array2<f32>,
    /// One owned table for all item encodes, positive and negative alike
    item_embeddings: Array2<f32>,
}

impl BilinearModel {
    /// Create a model with freshly initialized embedding tables
    pub fn new(config: ModelConfig, num_users: u32, num_items: u32) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let user_embeddings = init_embeddings(num_users as usize + 1, config.dimensions, &mut rng);
        let item_embeddings = init_embeddings(num_items as usize + 1, config.dimensions, &mut rng);
        Self {
            config,
            meta: ModelMeta::new(),
            num_users,
            num_items,
            user_embeddings,
            item_embeddings,
        }
    }

    /// Embedding of one user
    pub fn user_embedding(&self, user_id: u32) -> Result<Array1<f32>, ModelError> {
        check_user(user_id, self.num_users)?;
        Ok(self.user_embeddings.row(user_id as usize).to_owned())
    }

    /// Embedding of one item
    pub fn item_embedding(&self, item_id: u32) -> Result<Array1<f32>, ModelError> {
        check_item(item_id, self.num_items)?;
        Ok(self.item_embeddings.row(item_id as usize).to_owned())
    }
}

impl ScoringModel for BilinearModel {
    fn score(&self, user_id: u32, item_id: u32) -> Result<f32, ModelError> {
        check_user(user_id, self.num_users)?;
        check_item(item_id, self.num_items)?;
        Ok(cosine(
            self.user_embeddings.row(user_id as usize),
            self.item_embeddings.row(item_id as usize),
        ))
    }

    fn score_batch(&self, user_id: u32, item_ids: &[u32]) -> Result<Vec<f32>, ModelError> {
        check_user(user_id, self.num_users)?;
        let user = self.user_embeddings.row(user_id as usize);
        let user_norm = safe_norm(user);

        let mut scores = Vec::with_capacity(item_ids.len());
        for &item_id in item_ids {
            check_item(item_id, self.num_items)?;
            let item = self.item_embeddings.row(item_id as usize);
            scores.push(user.dot(&item) / (user_norm * safe_norm(item)));
        }
        Ok(scores)
    }

    fn stats(&self) -> ModelStats {
        ModelStats {
            model_id: self.meta.model_id,
            num_users: self.num_users,
            num_items: self.num_items,
            dimensions: self.config.dimensions,
            is_trained: self.meta.is_trained,
            model_type: "bilinear".to_string(),
            creation_time: self.meta.creation_time,
            last_training_time: self.meta.last_training_time,
        }
    }
}

impl TrainableModel for BilinearModel {
    fn fit_batch(
        &mut self,
        users: &[u32],
        positives: &[u32],
        negatives: &[u32],
    ) -> Result<f32, ModelError> {
        check_batch(users, positives, negatives)?;

        let dim = self.config.dimensions;
        let margin = self.config.margin;
        let mut user_grads: HashMap<u32, Array1<f32>> = HashMap::new();
        let mut item_grads: HashMap<u32, Array1<f32>> = HashMap::new();
        let mut total_loss = 0.0;

        for ((&u, &pos), &neg) in users.iter().zip(positives).zip(negatives) {
            check_user(u, self.num_users)?;
            check_item(pos, self.num_items)?;
            check_item(neg, self.num_items)?;

            let user = self.user_embeddings.row(u as usize);
            let pos_item = self.item_embeddings.row(pos as usize);
            let neg_item = self.item_embeddings.row(neg as usize);

            let nu = safe_norm(user);
            let np = safe_norm(pos_item);
            let nn = safe_norm(neg_item);
            let p = user.dot(&pos_item) / (nu * np);
            let n = user.dot(&neg_item) / (nu * nn);

            let loss = margin_loss(p, n, margin);
            total_loss += loss;
            if loss <= 0.0 {
                continue;
            }

            // Subgradient of max(n - p + margin, 0) through the cosine:
            // d cos(u, v)/du = v / (|u||v|) - cos(u, v) * u / |u|^2
            let dp_du = pos_item.mapv(|x| x / (nu * np)) - user.mapv(|x| x * p / (nu * nu));
            let dp_dpos = user.mapv(|x| x / (nu * np)) - pos_item.mapv(|x| x * p / (np * np));
            let dn_du = neg_item.mapv(|x| x / (nu * nn)) - user.mapv(|x| x * n / (nu * nu));
            let dn_dneg = user.mapv(|x| x / (nu * nn)) - neg_item.mapv(|x| x * n / (nn * nn));

            *user_grads
                .entry(u)
                .or_insert_with(|| Array1::zeros(dim)) += &(dn_du - dp_du);
            *item_grads
                .entry(pos)
                .or_insert_with(|| Array1::zeros(dim)) -= &dp_dpos;
            *item_grads
                .entry(neg)
                .or_insert_with(|| Array1::zeros(dim)) += &dn_dneg;
        }

        // Mini-batch averaged SGD step
        let step = self.config.learning_rate / users.len() as f32;
        for (id, grad) in user_grads {
            self.user_embeddings
                .row_mut(id as usize)
                .scaled_add(-step, &grad);
        }
        for (id, grad) in item_grads {
            self.item_embeddings
                .row_mut(id as usize)
                .scaled_add(-step, &grad);
        }

        self.meta.mark_trained();
        Ok(total_loss / users.len() as f32)
    }
}
