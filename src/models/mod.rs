//! Scoring model implementations
//!
//! Two variants share the same trait surface:
//! - `BilinearModel`: cosine similarity between user and item embeddings
//! - `DeepModel`: a feed-forward network over concatenated embeddings
//!
//! Both keep a single owned item embedding table that serves the positive and
//! the negative encode of every triplet; the table is never duplicated.

pub mod bilinear;
pub mod common;
pub mod deep;

pub use bilinear::BilinearModel;
pub use deep::DeepModel;
