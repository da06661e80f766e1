//! Memoized resampling of 1-D functions.
//!
//! The cache is an ordinary value owned by whoever wants the memo. Functions
//! themselves stay immutable, so runs that share a function never contend on
//! it; a run that wants the memo keeps its own cache or shares a populated one
//! behind an `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::SimulationError;

use super::grid_function::GridFunction;
use super::time_series::TimeSeries;

pub trait Discretize {
    fn discretize(&self, t0: f64, t1: f64, samples: usize) -> Result<TimeSeries, SimulationError>;
}

impl Discretize for GridFunction {
    fn discretize(&self, t0: f64, t1: f64, samples: usize) -> Result<TimeSeries, SimulationError> {
        GridFunction::discretize(self, t0, t1, samples)
    }
}

impl Discretize for TimeSeries {
    fn discretize(&self, t0: f64, t1: f64, samples: usize) -> Result<TimeSeries, SimulationError> {
        TimeSeries::discretize(self, t0, t1, samples)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiscretizationKey {
    t0: u64,
    t1: u64,
    samples: usize,
}

impl DiscretizationKey {
    pub fn new(t0: f64, t1: f64, samples: usize) -> Self {
        DiscretizationKey {
            t0: t0.to_bits(),
            t1: t1.to_bits(),
            samples,
        }
    }
}

/// Memo of resampled copies of ONE function. Keys hold only the sampling
/// domain, so a cache must never be shared between two functions; give each
/// function its own cache and `invalidate` it if the function is replaced.
#[derive(Debug, Clone, Default)]
pub struct DiscretizationCache {
    entries: HashMap<DiscretizationKey, Arc<TimeSeries>>,
}

impl DiscretizationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, t0: f64, t1: f64, samples: usize) -> Option<Arc<TimeSeries>> {
        self.entries
            .get(&DiscretizationKey::new(t0, t1, samples))
            .cloned()
    }

    pub fn get_or_discretize<F>(
        &mut self,
        function: &F,
        t0: f64,
        t1: f64,
        samples: usize,
    ) -> Result<Arc<TimeSeries>, SimulationError>
    where
        F: Discretize + ?Sized,
    {
        let key = DiscretizationKey::new(t0, t1, samples);
        if let Some(hit) = self.entries.get(&key) {
            return Ok(Arc::clone(hit));
        }
        let series = Arc::new(function.discretize(t0, t1, samples)?);
        self.entries.insert(key, Arc::clone(&series));
        Ok(series)
    }

    /// Drops every memoized sample set. Call after swapping the function the
    /// cache was populated from.
    pub fn invalidate(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_hit_returns_same_samples() {
        let thrust = TimeSeries::from_points(&[(0.0, 0.0), (1.0, 100.0), (2.0, 0.0)]).unwrap();
        let mut cache = DiscretizationCache::new();

        let first = cache.get_or_discretize(&thrust, 0.0, 2.0, 11).unwrap();
        let second = cache.get_or_discretize(&thrust, 0.0, 2.0, 11).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        cache.get_or_discretize(&thrust, 0.0, 2.0, 21).unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_cached_values_match_live_evaluation() {
        let thrust = TimeSeries::from_points(&[(0.0, 0.0), (1.0, 100.0), (2.0, 0.0)]).unwrap();
        let mut cache = DiscretizationCache::new();
        let samples = cache.get_or_discretize(&thrust, 0.0, 2.0, 5).unwrap();
        for (&t, &y) in samples.x_array().iter().zip(samples.y_array()) {
            assert_eq!(y, thrust.evaluate(t).unwrap());
        }
    }

    #[test]
    fn test_one_cache_per_function() {
        let thrust = TimeSeries::from_points(&[(0.0, 0.0), (1.0, 100.0), (2.0, 0.0)]).unwrap();
        let drag = TimeSeries::constant(0.5);
        let mut thrust_cache = DiscretizationCache::new();
        let mut drag_cache = DiscretizationCache::new();

        let thrust_samples = thrust_cache.get_or_discretize(&thrust, 0.0, 2.0, 5).unwrap();
        let drag_samples = drag_cache.get_or_discretize(&drag, 0.0, 2.0, 5).unwrap();
        assert!(!Arc::ptr_eq(&thrust_samples, &drag_samples));
        assert_eq!(thrust_samples.y_array()[2], 100.0);
        assert!(drag_samples.y_array().iter().all(|&cd| cd == 0.5));

        // Replacing the function without invalidating would serve stale samples.
        thrust_cache.invalidate();
        let refreshed = thrust_cache.get_or_discretize(&drag, 0.0, 2.0, 5).unwrap();
        assert_eq!(refreshed.y_array(), drag_samples.y_array());
    }

    #[test]
    fn test_invalidate_clears_entries() {
        let f = TimeSeries::constant(1.0);
        let mut cache = DiscretizationCache::new();
        cache.get_or_discretize(&f, 0.0, 1.0, 3).unwrap();
        assert!(cache.get(0.0, 1.0, 3).is_some());
        cache.invalidate();
        assert!(cache.is_empty());
        assert!(cache.get(0.0, 1.0, 3).is_none());
    }
}
