//! Ranking evaluation via per-user ROC AUC
//!
//! For every user with at least one positive test item, all items the user
//! never interacted positively with in training are scored and ranked; AUC is
//! computed against the held-out positives and averaged over users. Users
//! without a single positive candidate are skipped entirely: averaging in an
//! undefined AUC is an error, not a silent 0 or 1.

use crate::data::{Dataset, Split};
use crate::ScoringModel;
use anyhow::{ensure, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::info;

/// Outcome of one evaluation pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingReport {
    /// Arithmetic mean of per-user ROC AUC over evaluated users
    pub mean_auc: f64,
    /// Users that contributed an AUC value
    pub users_evaluated: usize,
    /// Users with test positives but no positively labeled candidate left
    pub users_skipped: usize,
}

/// Evaluates a scoring model against held-out positive interactions
#[derive(Debug, Clone)]
pub struct RankingEvaluator {
    num_items: u32,
    train_positives: HashMap<u32, HashSet<u32>>,
    test_positives: HashMap<u32, HashSet<u32>>,
    /// Users with at least one positive test interaction, in id order
    users: Vec<u32>,
}

impl RankingEvaluator {
    /// Precompute per-user positive sets from both splits
    pub fn new(dataset: &Dataset) -> Self {
        let train_positives = dataset.user_positive_items(Split::Train);
        let test_positives = dataset.user_positive_items(Split::Test);
        let mut users: Vec<u32> = test_positives.keys().copied().collect();
        users.sort_unstable();
        Self {
            num_items: dataset.num_items,
            train_positives,
            test_positives,
            users,
        }
    }

    /// Compute mean per-user ROC AUC for the given model.
    ///
    /// Evaluation reads model state only; per-user work is independent and
    /// runs in parallel. Fails loudly when not a single user is eligible.
    pub fn evaluate<M: ScoringModel + ?Sized>(&self, model: &M) -> Result<RankingReport> {
        let per_user: Vec<Option<f64>> = self
            .users
            .par_iter()
            .map(|&user| self.evaluate_user(model, user))
            .collect::<Result<_>>()?;

        let aucs: Vec<f64> = per_user.into_iter().flatten().collect();
        ensure!(
            !aucs.is_empty(),
            "no user has a positively labeled test candidate; mean AUC is undefined"
        );

        let report = RankingReport {
            mean_auc: aucs.iter().sum::<f64>() / aucs.len() as f64,
            users_evaluated: aucs.len(),
            users_skipped: self.users.len() - aucs.len(),
        };
        info!(
            "Mean ROC AUC {:.4} over {} users ({} skipped)",
            report.mean_auc, report.users_evaluated, report.users_skipped
        );
        Ok(report)
    }

    /// AUC for one user, or None when the user must be skipped
    fn evaluate_user<M: ScoringModel + ?Sized>(
        &self,
        model: &M,
        user: u32,
    ) -> Result<Option<f64>> {
        let seen = self.train_positives.get(&user);
        let held_out = &self.test_positives[&user];

        // Candidates: every item never interacted positively with in training,
        // including items no one ever rated
        let mut candidates = Vec::with_capacity(self.num_items as usize);
        let mut labels = Vec::with_capacity(self.num_items as usize);
        for item in 1..=self.num_items {
            if seen.is_some_and(|s| s.contains(&item)) {
                continue;
            }
            candidates.push(item);
            labels.push(held_out.contains(&item));
        }

        if !labels.iter().any(|&l| l) {
            return Ok(None);
        }

        let scores = model.score_batch(user, &candidates)?;
        Ok(roc_auc(&labels, &scores))
    }
}

/// ROC AUC from binary labels and scores via the rank-sum
/// (Wilcoxon-Mann-Whitney) statistic, with average ranks for tied scores.
///
/// Returns None when either class is empty, since AUC is undefined there.
pub fn roc_auc(labels: &[bool], scores: &[f32]) -> Option<f64> {
    let n = labels.len();
    if n == 0 || scores.len() != n {
        return None;
    }
    let num_pos = labels.iter().filter(|&&l| l).count();
    let num_neg = n - num_pos;
    if num_pos == 0 || num_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_unstable_by(|&a, &b| {
        scores[a]
            .partial_cmp(&scores[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // 1-based ranks, averaged across ties
    let mut ranks = vec![0.0_f64; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let average_rank = (i + j + 2) as f64 / 2.0;
        for &idx in &order[i..=j] {
            ranks[idx] = average_rank;
        }
        i = j + 1;
    }

    let positive_rank_sum: f64 = labels
        .iter()
        .zip(ranks.iter())
        .filter(|(&label, _)| label)
        .map(|(_, &rank)| rank)
        .sum();

    let expected_min = (num_pos * (num_pos + 1)) as f64 / 2.0;
    Some((positive_rank_sum - expected_min) / (num_pos * num_neg) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Interaction;
    use crate::{BilinearModel, ModelConfig, ModelError, ModelStats};
    use chrono::Utc;

    fn interaction(user_id: u32, item_id: u32, rating: u8) -> Interaction {
        Interaction {
            user_id,
            item_id,
            rating,
            timestamp: 0,
        }
    }

    /// Scores from a fixed table, defaulting to zero
    struct FixedScorer {
        scores: HashMap<(u32, u32), f32>,
    }

    impl ScoringModel for FixedScorer {
        fn score(&self, user_id: u32, item_id: u32) -> Result<f32, ModelError> {
            Ok(self.scores.get(&(user_id, item_id)).copied().unwrap_or(0.0))
        }

        fn score_batch(&self, user_id: u32, item_ids: &[u32]) -> Result<Vec<f32>, ModelError> {
            item_ids.iter().map(|&i| self.score(user_id, i)).collect()
        }

        fn stats(&self) -> ModelStats {
            ModelStats {
                model_id: uuid::Uuid::new_v4(),
                num_users: 0,
                num_items: 0,
                dimensions: 0,
                is_trained: true,
                model_type: "fixed".to_string(),
                creation_time: Utc::now(),
                last_training_time: None,
            }
        }
    }

    #[test]
    fn test_roc_auc_separation() {
        let labels = vec![true, true, false, false];
        assert_eq!(roc_auc(&labels, &[0.9, 0.8, 0.2, 0.1]), Some(1.0));
        assert_eq!(roc_auc(&labels, &[0.1, 0.2, 0.8, 0.9]), Some(0.0));
    }

    #[test]
    fn test_roc_auc_ties_average_to_half() {
        let labels = vec![true, false, true, false];
        let scores = vec![0.5, 0.5, 0.5, 0.5];
        let auc = roc_auc(&labels, &scores).unwrap();
        assert!((auc - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_roc_auc_undefined_without_both_classes() {
        assert_eq!(roc_auc(&[true, true], &[0.1, 0.2]), None);
        assert_eq!(roc_auc(&[false, false], &[0.1, 0.2]), None);
        assert_eq!(roc_auc(&[], &[]), None);
    }

    #[test]
    fn test_user_without_test_positives_is_excluded() {
        // user 1: training positive {10}, test positive {20}
        // user 2: training positive {5}, no positive test interaction
        let dataset = Dataset::from_parts(
            vec![interaction(1, 10, 5), interaction(2, 5, 4)],
            vec![interaction(1, 20, 4), interaction(2, 6, 2)],
            Vec::new(),
        )
        .unwrap();
        let evaluator = RankingEvaluator::new(&dataset);

        // Item 20 outranks everything for user 1
        let scorer = FixedScorer {
            scores: HashMap::from([((1, 20), 1.0)]),
        };
        let report = evaluator.evaluate(&scorer).unwrap();

        assert_eq!(report.users_evaluated, 1);
        assert_eq!(report.users_skipped, 0);
        assert_eq!(report.mean_auc, 1.0);
    }

    #[test]
    fn test_user_with_only_seen_test_positives_is_skipped() {
        // user 2's single test positive was already a training positive, so
        // every remaining candidate is labeled 0 and the user is skipped
        let dataset = Dataset::from_parts(
            vec![interaction(1, 10, 5), interaction(2, 7, 5)],
            vec![interaction(1, 20, 5), interaction(2, 7, 5)],
            Vec::new(),
        )
        .unwrap();
        let evaluator = RankingEvaluator::new(&dataset);

        let scorer = FixedScorer {
            scores: HashMap::from([((1, 20), 1.0)]),
        };
        let report = evaluator.evaluate(&scorer).unwrap();

        assert_eq!(report.users_evaluated, 1);
        assert_eq!(report.users_skipped, 1);
        assert_eq!(report.mean_auc, 1.0);
    }

    #[test]
    fn test_error_when_no_user_is_eligible() {
        let dataset = Dataset::from_parts(
            vec![interaction(1, 10, 5)],
            vec![interaction(1, 11, 2)],
            Vec::new(),
        )
        .unwrap();
        let evaluator = RankingEvaluator::new(&dataset);
        let scorer = FixedScorer {
            scores: HashMap::new(),
        };
        assert!(evaluator.evaluate(&scorer).is_err());
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let dataset = Dataset::from_parts(
            vec![interaction(1, 1, 5), interaction(2, 2, 5)],
            vec![interaction(1, 3, 5), interaction(2, 4, 4)],
            Vec::new(),
        )
        .unwrap();
        let evaluator = RankingEvaluator::new(&dataset);
        let model = BilinearModel::new(ModelConfig::default(), 2, 4);

        let first = evaluator.evaluate(&model).unwrap();
        let second = evaluator.evaluate(&model).unwrap();
        assert_eq!(first.mean_auc, second.mean_auc);
        assert_eq!(first.users_evaluated, second.users_evaluated);
    }

    #[test]
    fn test_untrained_model_scores_near_chance() {
        use crate::data::Movie;

        // One user, 100 held-out positives among 399 candidates; widen the
        // item range through metadata alone
        let train = vec![interaction(1, 1, 5)];
        let test: Vec<Interaction> = (2..=101).map(|item| interaction(1, item, 5)).collect();
        let movies = vec![Movie {
            item_id: 400,
            title: "Sentinel (1920)".to_string(),
            release_year: 1920,
        }];
        let dataset = Dataset::from_parts(train, test, movies).unwrap();
        let evaluator = RankingEvaluator::new(&dataset);

        let trials = 20;
        let mut total = 0.0;
        for seed in 0..trials {
            let model = BilinearModel::new(
                ModelConfig::default().with_seed(seed),
                dataset.num_users,
                dataset.num_items,
            );
            total += evaluator.evaluate(&model).unwrap().mean_auc;
        }
        let mean = total / trials as f64;
        assert!(
            (mean - 0.5).abs() < 0.07,
            "untrained mean AUC {mean} too far from chance"
        );
    }
}
