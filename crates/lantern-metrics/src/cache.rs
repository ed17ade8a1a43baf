use crate::error::{MetricError, Result};
use lantern_abstract::MetricKind;
use std::any::Any;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKey {
    ProcessedTrace,
    ProcessedNavigation,
    NetworkAnalysis,
    DependencyGraph,
    Simulator,
    LanternMetric(MetricKind),
    Metric(MetricKind),
}

type Entry = std::result::Result<Rc<dyn Any>, MetricError>;

/// Computed artifacts of a single report run. Each key is computed at most once;
/// a failure is stored too and returned to every later request.
#[derive(Default)]
pub struct ComputedCache {
    entries: HashMap<ArtifactKey, Entry>,
    hits: usize,
    misses: usize,
}

impl ComputedCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached artifact for `key` or computes it. `compute` gets the
    /// cache back so it can request its own dependencies.
    pub fn get_or_compute<T, F>(&mut self, key: ArtifactKey, compute: F) -> Result<Rc<T>>
    where
        T: 'static,
        F: FnOnce(&mut Self) -> Result<T>,
    {
        if let Some(entry) = self.entries.get(&key) {
            self.hits += 1;
            let value = entry.as_ref().map_err(Clone::clone)?;
            return Rc::clone(value)
                .downcast::<T>()
                .map_err(|_| MetricError::MissingDependency {
                    name: std::any::type_name::<T>(),
                });
        }

        self.misses += 1;
        debug!("Computing {:?}", key);
        match compute(self) {
            Ok(value) => {
                let value = Rc::new(value);
                self.entries.insert(key, Ok(Rc::clone(&value) as Rc<dyn Any>));
                Ok(value)
            }
            Err(err) => {
                debug!("{:?} failed: {}", key, err);
                self.entries.insert(key, Err(err.clone()));
                Err(err)
            }
        }
    }

    /// Whether `key` holds a successfully computed artifact.
    pub fn contains(&self, key: ArtifactKey) -> bool {
        self.entries.get(&key).is_some_and(|entry| entry.is_ok())
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
