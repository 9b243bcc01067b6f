//! MovieLens-100k loading and preprocessing
//!
//! Ratings ship as tab-separated `(user_id, item_id, rating, timestamp)` rows
//! and item metadata as a pipe-separated table in Latin-1. Interactions are
//! loaded once and never mutated; a rating of 4 or higher counts as positive
//! implicit feedback.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::info;

/// Sentinel release year used when the metadata date is missing or malformed
pub const FALLBACK_RELEASE_YEAR: u16 = 1920;

/// Ratings threshold for positive implicit feedback
pub const POSITIVE_RATING: u8 = 4;

/// A single rating event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub user_id: u32,
    pub item_id: u32,
    pub rating: u8,
    pub timestamp: i64,
}

impl Interaction {
    /// Whether this interaction counts as positive implicit feedback
    pub fn is_positive(&self) -> bool {
        self.rating >= POSITIVE_RATING
    }
}

/// Item metadata joined onto interactions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movie {
    pub item_id: u32,
    pub title: String,
    pub release_year: u16,
}

/// Which interaction split to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Test,
}

/// The loaded MovieLens-100k dataset
#[derive(Debug, Clone)]
pub struct Dataset {
    pub train: Vec<Interaction>,
    pub test: Vec<Interaction>,
    pub movies: Vec<Movie>,
    /// Maximum user id across both splits; valid ids are 1..=num_users
    pub num_users: u32,
    /// Maximum item id across both splits and metadata; valid ids are 1..=num_items
    pub num_items: u32,
}

impl Dataset {
    /// Load `ua.base`, `ua.test` and `u.item` from a MovieLens-100k directory
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let train = load_ratings(dir.join("ua.base"))?;
        let test = load_ratings(dir.join("ua.test"))?;
        let movies = load_movies(dir.join("u.item"))?;
        Self::from_parts(train, test, movies)
    }

    /// Assemble a dataset from already-parsed tables
    pub fn from_parts(
        train: Vec<Interaction>,
        test: Vec<Interaction>,
        movies: Vec<Movie>,
    ) -> Result<Self> {
        anyhow::ensure!(!train.is_empty(), "training split has no interactions");

        let num_users = train
            .iter()
            .chain(test.iter())
            .map(|i| i.user_id)
            .max()
            .unwrap_or(0);
        let num_items = train
            .iter()
            .chain(test.iter())
            .map(|i| i.item_id)
            .chain(movies.iter().map(|m| m.item_id))
            .max()
            .unwrap_or(0);

        info!(
            "Loaded {} train / {} test interactions over {} users and {} items",
            train.len(),
            test.len(),
            num_users,
            num_items
        );

        Ok(Self {
            train,
            test,
            movies,
            num_users,
            num_items,
        })
    }

    fn split(&self, split: Split) -> &[Interaction] {
        match split {
            Split::Train => &self.train,
            Split::Test => &self.test,
        }
    }

    /// Positive interactions (rating >= 4) of one split
    pub fn positives(&self, split: Split) -> Vec<Interaction> {
        self.split(split)
            .iter()
            .copied()
            .filter(Interaction::is_positive)
            .collect()
    }

    /// Per-user sets of positively rated items for one split
    pub fn user_positive_items(&self, split: Split) -> HashMap<u32, HashSet<u32>> {
        let mut map: HashMap<u32, HashSet<u32>> = HashMap::new();
        for interaction in self.split(split).iter().filter(|i| i.is_positive()) {
            map.entry(interaction.user_id)
                .or_default()
                .insert(interaction.item_id);
        }
        map
    }
}

/// Parse a tab-separated ratings file with `(user, item, rating, timestamp)` rows
pub fn load_ratings(path: impl AsRef<Path>) -> Result<Vec<Interaction>> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("failed to open ratings file {}", path.display()))?;

    let mut interactions = Vec::new();
    for (line, row) in reader.deserialize().enumerate() {
        let interaction: Interaction =
            row.with_context(|| format!("bad record at {}:{}", path.display(), line + 1))?;
        interactions.push(interaction);
    }
    Ok(interactions)
}

/// Parse the pipe-separated `u.item` metadata table
///
/// The file is Latin-1 encoded, so titles are decoded lossily from raw bytes.
pub fn load_movies(path: impl AsRef<Path>) -> Result<Vec<Movie>> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'|')
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open item metadata {}", path.display()))?;

    let mut movies = Vec::new();
    for (line, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("bad record at {}:{}", path.display(), line + 1))?;
        let field = |idx: usize| -> String {
            record
                .get(idx)
                .map(|b| String::from_utf8_lossy(b).into_owned())
                .unwrap_or_default()
        };
        let item_id: u32 = field(0)
            .trim()
            .parse()
            .with_context(|| format!("bad item id at {}:{}", path.display(), line + 1))?;
        movies.push(Movie {
            item_id,
            title: field(1),
            release_year: parse_release_year(&field(2)),
        });
    }
    Ok(movies)
}

/// Extract the year from a `DD-Mon-YYYY` release date, falling back to the
/// sentinel year 1920 for missing or malformed values.
pub fn parse_release_year(date: &str) -> u16 {
    date.trim()
        .rsplit('-')
        .next()
        .and_then(|year| year.parse().ok())
        .unwrap_or(FALLBACK_RELEASE_YEAR)
}
