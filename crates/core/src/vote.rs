//! Typed view over one k-NN retrieval response.

use crate::error::ClassifyError;
use crate::retrieval::RawNeighbors;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NeighborMatch {
    pub category: String,
    pub distance: f64,
    pub id: String,
}

/// A snippet and its neighbors, closest first.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub text: String,
    pub matches: Vec<NeighborMatch>,
}

impl QueryResult {
    /// Zips the parallel arrays returned by the retriever. The order they
    /// arrive in is kept as-is.
    pub fn from_raw(text: impl Into<String>, raw: RawNeighbors) -> Result<Self, ClassifyError> {
        let RawNeighbors {
            categories,
            distances,
            ids,
        } = raw;
        if ids.len() != categories.len() || ids.len() != distances.len() {
            return Err(ClassifyError::LengthMismatch {
                ids: ids.len(),
                categories: categories.len(),
                distances: distances.len(),
            });
        }
        if ids.is_empty() {
            return Err(ClassifyError::EmptyResult);
        }
        let mut matches = Vec::with_capacity(ids.len());
        for ((id, category), distance) in ids.into_iter().zip(categories).zip(distances) {
            if !(distance >= 0.0) {
                return Err(ClassifyError::NegativeDistance { id, distance });
            }
            matches.push(NeighborMatch {
                category,
                distance,
                id,
            });
        }
        Ok(Self {
            text: text.into(),
            matches,
        })
    }

    /// Unique categories in first-seen (closest-first) order.
    pub fn distinct_categories(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for m in &self.matches {
            if !seen.contains(&m.category.as_str()) {
                seen.push(&m.category);
            }
        }
        seen
    }

    /// Id of the closest neighbor labeled `category`. Ties keep the earlier match.
    pub fn best_id_for_category(&self, category: &str) -> Result<&str, ClassifyError> {
        let mut best: Option<&NeighborMatch> = None;
        for m in self.matches.iter().filter(|m| m.category == category) {
            match best {
                Some(b) if b.distance <= m.distance => {}
                _ => best = Some(m),
            }
        }
        best.map(|m| m.id.as_str())
            .ok_or_else(|| ClassifyError::NotFound(category.to_string()))
    }

    pub fn count(&self, category: &str) -> usize {
        self.matches.iter().filter(|m| m.category == category).count()
    }

    pub fn k(&self) -> usize {
        self.matches.len()
    }
}
