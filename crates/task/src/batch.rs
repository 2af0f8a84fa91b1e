//! Outcome of one scheduler run.

use serde::Serialize;
use taskmill_core::Result;

/// Per-unit results, index-aligned with the submitted units
#[derive(Debug)]
pub struct BatchResult<T> {
    results: Vec<Result<T>>,
    from_cache: Vec<bool>,
}

impl<T> BatchResult<T> {
    pub(crate) fn new(results: Vec<Result<T>>, from_cache: Vec<bool>) -> Self {
        debug_assert_eq!(results.len(), from_cache.len());
        Self {
            results,
            from_cache,
        }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Result<T>> {
        self.results.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Result<T>> {
        self.results.iter()
    }

    /// Whether the unit at `index` was answered from the cache
    pub fn was_cached(&self, index: usize) -> bool {
        self.from_cache.get(index).copied().unwrap_or(false)
    }

    pub fn cache_hits(&self) -> usize {
        self.from_cache.iter().filter(|hit| **hit).count()
    }

    pub fn failures(&self) -> usize {
        self.results.iter().filter(|r| r.is_err()).count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failures() == 0
    }

    pub fn into_results(self) -> Vec<Result<T>> {
        self.results
    }

    /// All values, or the first failure in submission order
    pub fn into_values(self) -> Result<Vec<T>> {
        self.results.into_iter().collect()
    }
}

impl<T> IntoIterator for BatchResult<T> {
    type Item = Result<T>;
    type IntoIter = std::vec::IntoIter<Result<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

/// Serializable view of one slot, for reporting
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SlotReport<'a, T> {
    Ok { value: &'a T, cached: bool },
    Error { kind: String, message: String },
}

impl<T: Serialize> BatchResult<T> {
    /// One report per unit, in submission order
    pub fn report(&self) -> Vec<SlotReport<'_, T>> {
        self.results
            .iter()
            .zip(&self.from_cache)
            .map(|(result, cached)| match result {
                Ok(value) => SlotReport::Ok {
                    value,
                    cached: *cached,
                },
                Err(error) => SlotReport::Error {
                    kind: error.kind().to_string(),
                    message: error.to_string(),
                },
            })
            .collect()
    }
}
