//! Deep scoring variant
//!
//! Scores a (user, item) pair with a shared feed-forward network applied to
//! the concatenation of the two embeddings: one ReLU hidden layer and a
//! scalar output head. The same network and the same item table serve the
//! positive and the negative branch of every triplet.

use super::common::{check_batch, check_item, check_user, init_embeddings, init_vector, ModelMeta};
use crate::loss::margin_loss;
use crate::{ModelConfig, ModelError, ModelStats, ScoringModel, TrainableModel};
use ndarray::{s, Array1, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;

/// MLP-over-embeddings scoring model
#[derive(Debug, Clone)]
pub struct DeepModel {
    config: ModelConfig,
    meta: ModelMeta,
    num_users: u32,
    num_items: u32,
    user_embeddings: Array2<f32>,
    item_embeddings: Array2<f32>,
    /// Hidden layer, shape (hidden_units, 2 * dimensions)
    w1: Array2<f32>,
    b1: Array1<f32>,
    /// Output head, shape (hidden_units,)
    w2: Array1<f32>,
    b2: f32,
}

/// Intermediate activations kept for the backward pass
struct Forward {
    input: Array1<f32>,
    pre_activation: Array1<f32>,
    hidden: Array1<f32>,
    score: f32,
}

impl DeepModel {
    /// Create a model with freshly initialized parameters
    pub fn new(config: ModelConfig, num_users: u32, num_items: u32) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let dim = config.dimensions;
        let hidden = config.hidden_units;
        Self {
            user_embeddings: init_embeddings(num_users as usize + 1, dim, &mut rng),
            item_embeddings: init_embeddings(num_items as usize + 1, dim, &mut rng),
            w1: init_embeddings(hidden, 2 * dim, &mut rng),
            b1: init_vector(hidden, &mut rng),
            w2: init_vector(hidden, &mut rng),
            b2: 0.0,
            config,
            meta: ModelMeta::new(),
            num_users,
            num_items,
        }
    }

    fn forward(&self, user_id: u32, item_id: u32) -> Forward {
        let user = self.user_embeddings.row(user_id as usize);
        let item = self.item_embeddings.row(item_id as usize);
        let input = Array1::from_iter(user.iter().chain(item.iter()).copied());
        let pre_activation = self.w1.dot(&input) + &self.b1;
        let hidden = pre_activation.mapv(|v| v.max(0.0));
        let score = self.w2.dot(&hidden) + self.b2;
        Forward {
            input,
            pre_activation,
            hidden,
            score,
        }
    }
}

/// Dense gradient accumulators for the network parameters
struct NetworkGrads {
    w1: Array2<f32>,
    b1: Array1<f32>,
    w2: Array1<f32>,
    b2: f32,
}

impl NetworkGrads {
    fn zeros(hidden: usize, input: usize) -> Self {
        Self {
            w1: Array2::zeros((hidden, input)),
            b1: Array1::zeros(hidden),
            w2: Array1::zeros(hidden),
            b2: 0.0,
        }
    }
}

impl ScoringModel for DeepModel {
    fn score(&self, user_id: u32, item_id: u32) -> Result<f32, ModelError> {
        check_user(user_id, self.num_users)?;
        check_item(item_id, self.num_items)?;
        Ok(self.forward(user_id, item_id).score)
    }

    fn score_batch(&self, user_id: u32, item_ids: &[u32]) -> Result<Vec<f32>, ModelError> {
        check_user(user_id, self.num_users)?;
        let mut scores = Vec::with_capacity(item_ids.len());
        for &item_id in item_ids {
            check_item(item_id, self.num_items)?;
            scores.push(self.forward(user_id, item_id).score);
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
            model_type: "deep".to_string(),
            creation_time: self.meta.creation_time,
            last_training_time: self.meta.last_training_time,
        }
    }
}

impl TrainableModel for DeepModel {
    fn fit_batch(
        &mut self,
        users: &[u32],
        positives: &[u32],
        negatives: &[u32],
    ) -> Result<f32, ModelError> {
        check_batch(users, positives, negatives)?;

        let dim = self.config.dimensions;
        let hidden = self.config.hidden_units;
        let mut net_grads = NetworkGrads::zeros(hidden, 2 * dim);
        let mut user_grads: HashMap<u32, Array1<f32>> = HashMap::new();
        let mut item_grads: HashMap<u32, Array1<f32>> = HashMap::new();
        let mut total_loss = 0.0;

        for ((&u, &pos), &neg) in users.iter().zip(positives).zip(negatives) {
            check_user(u, self.num_users)?;
            check_item(pos, self.num_items)?;
            check_item(neg, self.num_items)?;

            let pos_pass = self.forward(u, pos);
            let neg_pass = self.forward(u, neg);

            let loss = margin_loss(pos_pass.score, neg_pass.score, self.config.margin);
            total_loss += loss;
            if loss <= 0.0 {
                continue;
            }

            // d loss / d positive score = -1, d loss / d negative score = +1
            for (pass, item_id, upstream) in [(&pos_pass, pos, -1.0_f32), (&neg_pass, neg, 1.0)] {
                net_grads.w2.scaled_add(upstream, &pass.hidden);
                net_grads.b2 += upstream;

                // ReLU gate on the hidden layer
                let mut d_pre = self.w2.mapv(|w| w * upstream);
                for (g, &pre) in d_pre.iter_mut().zip(pass.pre_activation.iter()) {
                    if pre <= 0.0 {
                        *g = 0.0;
                    }
                }

                for (mut row, &g) in net_grads.w1.rows_mut().into_iter().zip(d_pre.iter()) {
                    row.scaled_add(g, &pass.input);
                }
                net_grads.b1 += &d_pre;

                let d_input = self.w1.t().dot(&d_pre);
                *user_grads
                    .entry(u)
                    .or_insert_with(|| Array1::zeros(dim)) += &d_input.slice(s![..dim]);
                *item_grads
                    .entry(item_id)
                    .or_insert_with(|| Array1::zeros(dim)) += &d_input.slice(s![dim..]);
            }
        }

        let step = self.config.learning_rate / users.len() as f32;
        self.w1.scaled_add(-step, &net_grads.w1);
        self.b1.scaled_add(-step, &net_grads.b1);
        self.w2.scaled_add(-step, &net_grads.w2);
        self.b2 -= step * net_grads.b2;
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

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> DeepModel {
        let config = ModelConfig {
            dimensions: 8,
            hidden_units: 16,
            learning_rate: 0.1,
            ..ModelConfig::default()
        };
        DeepModel::new(config, 4, 12)
    }

    #[test]
    fn test_scores_are_finite_and_deterministic() {
        let model = model();
        for user in 1..=4 {
            for item in 1..=12 {
                let a = model.score(user, item).unwrap();
                let b = model.score(user, item).unwrap();
                assert!(a.is_finite());
                assert_eq!(a, b);
            }
        }
    }

    #[test]
    fn test_batch_scores_match_single_scores() {
        let model = model();
        let items: Vec<u32> = (1..=12).collect();
        let batch = model.score_batch(2, &items).unwrap();
        for (i, &item) in items.iter().enumerate() {
            assert_eq!(batch[i], model.score(2, item).unwrap());
        }
    }

    #[test]
    fn test_out_of_range_ids_rejected() {
        let model = model();
        assert!(model.score(5, 1).is_err());
        assert!(model.score(1, 13).is_err());
    }

    #[test]
    fn test_fit_reduces_loss_on_fixed_batch() {
        let mut model = model();
        let users = vec![1, 2, 3, 4];
        let positives = vec![1, 2, 3, 4];
        let negatives = vec![9, 10, 11, 12];

        let first_loss = model.fit_batch(&users, &positives, &negatives).unwrap();
        let mut last_loss = first_loss;
        for _ in 0..300 {
            last_loss = model.fit_batch(&users, &positives, &negatives).unwrap();
        }

        assert!(
            last_loss < first_loss,
            "loss did not decrease: {first_loss} -> {last_loss}"
        );
        let p = model.score(1, 1).unwrap();
        let n = model.score(1, 9).unwrap();
        assert!(p > n, "positive {p} not above negative {n}");
    }
}
