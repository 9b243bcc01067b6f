//! State and helpers shared by the scoring models

use crate::ModelError;
use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2, ArrayView1};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use uuid::Uuid;

/// Guard against division by a vanishing norm
pub const NORM_EPS: f32 = 1e-12;

/// Identity and lifecycle metadata carried by every model
#[derive(Debug, Clone)]
pub struct ModelMeta {
    pub model_id: Uuid,
    pub creation_time: DateTime<Utc>,
    pub last_training_time: Option<DateTime<Utc>>,
    pub is_trained: bool,
}

impl ModelMeta {
    pub fn new() -> Self {
        Self {
            model_id: Uuid::new_v4(),
            creation_time: Utc::now(),
            last_training_time: None,
            is_trained: false,
        }
    }

    /// Record a completed parameter update
    pub fn mark_trained(&mut self) {
        self.is_trained = true;
        self.last_training_time = Some(Utc::now());
    }
}

impl Default for ModelMeta {
    fn default() -> Self {
        Self::new()
    }
}

/// Initialize an embedding table from N(0, 0.1)
pub fn init_embeddings(rows: usize, dimensions: usize, rng: &mut impl Rng) -> Array2<f32> {
    let normal = Normal::new(0.0, 0.1).expect("valid normal distribution");
    let mut table = Array2::zeros((rows, dimensions));
    for elem in table.iter_mut() {
        *elem = normal.sample(rng);
    }
    table
}

/// Initialize a weight vector from N(0, 0.1)
pub fn init_vector(len: usize, rng: &mut impl Rng) -> Array1<f32> {
    let normal = Normal::new(0.0, 0.1).expect("valid normal distribution");
    let mut vector = Array1::zeros(len);
    for elem in vector.iter_mut() {
        *elem = normal.sample(rng);
    }
    vector
}

/// L2 norm, clamped away from zero
pub fn safe_norm(v: ArrayView1<f32>) -> f32 {
    v.dot(&v).sqrt().max(NORM_EPS)
}

/// Cosine similarity of two vectors, in [-1, 1]
pub fn cosine(a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
    a.dot(&b) / (safe_norm(a) * safe_norm(b))
}

/// Validate that a 1-based user id addresses the embedding table
pub fn check_user(id: u32, max: u32) -> Result<(), ModelError> {
    if id == 0 || id > max {
        return Err(ModelError::UserOutOfRange { id, max });
    }
    Ok(())
}

/// Validate that a 1-based item id addresses the embedding table
pub fn check_item(id: u32, max: u32) -> Result<(), ModelError> {
    if id == 0 || id > max {
        return Err(ModelError::ItemOutOfRange { id, max });
    }
    Ok(())
}

/// Validate the three parallel sequences of a triplet mini-batch
pub fn check_batch(users: &[u32], positives: &[u32], negatives: &[u32]) -> Result<(), ModelError> {
    if users.is_empty() || users.len() != positives.len() || users.len() != negatives.len() {
        return Err(ModelError::InvalidBatch);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_cosine_bounds() {
        let a = array![1.0_f32, 2.0, -3.0];
        let b = array![-2.0_f32, 0.5, 4.0];
        let sim = cosine(a.view(), b.view());
        assert!((-1.0..=1.0).contains(&sim));

        let self_sim = cosine(a.view(), a.view());
        assert!((self_sim - 1.0).abs() < 1e-6);

        let anti = cosine(a.view(), (&a * -1.0).view());
        assert!((anti + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_survives_zero_vector() {
        let zero = Array1::<f32>::zeros(4);
        let b = array![1.0_f32, 0.0, 0.0, 0.0];
        let sim = cosine(zero.view(), b.view());
        assert!(sim.is_finite());
    }

    #[test]
    fn test_embedding_init_shape_and_spread() {
        let mut rng = StdRng::seed_from_u64(7);
        let table = init_embeddings(100, 16, &mut rng);
        assert_eq!(table.shape(), &[100, 16]);
        // N(0, 0.1) draws stay well within |x| < 1
        assert!(table.iter().all(|x| x.abs() < 1.0));
        assert!(table.iter().any(|x| x.abs() > 1e-4));
    }

    #[test]
    fn test_id_range_checks() {
        assert!(check_user(1, 10).is_ok());
        assert!(check_user(10, 10).is_ok());
        assert!(check_user(0, 10).is_err());
        assert!(check_item(11, 10).is_err());
    }
}
