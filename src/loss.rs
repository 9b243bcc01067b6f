//! Margin comparator loss
//!
//! A per-triplet hinge that pushes the positive-pair similarity above the
//! negative-pair similarity by at least the margin. Once the margin is
//! satisfied the loss (and its gradient) is exactly zero, so easy triplets
//! contribute nothing to the update.

/// Default margin used by the reference training run
pub const DEFAULT_MARGIN: f32 = 1.0;

/// Compute `max(negative - positive + margin, 0)` for one triplet
pub fn margin_loss(positive: f32, negative: f32, margin: f32) -> f32 {
    (negative - positive + margin).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loss_is_non_negative() {
        for &(p, n) in &[(0.9, -0.9), (0.0, 0.0), (-1.0, 1.0), (0.3, 0.7)] {
            assert!(margin_loss(p, n, DEFAULT_MARGIN) >= 0.0);
            assert!(margin_loss(p, n, 0.1) >= 0.0);
        }
    }

    #[test]
    fn test_loss_zero_once_margin_satisfied() {
        // negative + margin <= positive
        assert_eq!(margin_loss(0.8, -0.5, 1.0), 0.0);
        assert_eq!(margin_loss(0.5, 0.3, 0.2), 0.0);
    }

    #[test]
    fn test_loss_linear_inside_margin() {
        let loss = margin_loss(0.2, -0.1, 1.0);
        assert!((loss - 0.7).abs() < 1e-6);

        // equal similarities cost exactly the margin
        let loss = margin_loss(0.4, 0.4, 1.0);
        assert!((loss - 1.0).abs() < 1e-6);
    }
}
