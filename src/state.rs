use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::PipelineConfig;
use crate::data::store::{self, PrototypeFile};
use crate::pipeline::PrototypeSet;

// ---------------------------------------------------------------------------
// Shared prototype state
// ---------------------------------------------------------------------------

/// Published prototypes plus the pipeline config they were built with.
#[derive(Debug, Clone, Default)]
pub struct Published {
    pub prototypes: PrototypeSet,
    /// `None` when the set did not come from a file that records its config.
    pub config: Option<PipelineConfig>,
}

/// Process-wide holder of the current prototype set.
///
/// Readers take an `Arc` snapshot and keep using it for as long as they
/// like. A refresh builds the complete replacement first and then swaps the
/// pointer, so a reader never sees a half-updated set.
#[derive(Debug, Default)]
pub struct PrototypeStore {
    current: RwLock<Arc<Published>>,
}

impl PrototypeStore {
    pub fn new(published: Published) -> Self {
        Self {
            current: RwLock::new(Arc::new(published)),
        }
    }

    pub fn from_set(prototypes: PrototypeSet) -> Self {
        Self::new(Published {
            prototypes,
            config: None,
        })
    }

    /// Load from a prototype file; an absent file gives an empty store.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        Ok(Self::new(published_from(store::load_prototypes(path)?)?))
    }

    /// Current set. Cheap: clones an `Arc`.
    pub fn snapshot(&self) -> Arc<Published> {
        // Only pointer swaps happen under the lock, so a poisoned lock still
        // holds a complete value.
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Publish a new set wholesale, returning the previous one.
    pub fn replace(&self, published: Published) -> Arc<Published> {
        let next = Arc::new(published);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, next)
    }

    /// Re-read a prototype file and publish it. On error the current set
    /// stays in place.
    pub fn reload_from(&self, path: &Path) -> anyhow::Result<()> {
        let published = published_from(store::load_prototypes(path)?)?;
        log::info!(
            "Reloaded {} prototypes (dim {}) from {}",
            published.prototypes.len(),
            published.prototypes.dim(),
            path.display()
        );
        self.replace(published);
        Ok(())
    }
}

fn published_from(file: Option<PrototypeFile>) -> anyhow::Result<Published> {
    let Some(file) = file else {
        return Ok(Published::default());
    };
    let (prototypes, config) = file.into_parts()?;
    Ok(Published { prototypes, config })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::thread;

    use super::*;

    fn set_of(dim: usize, labels: &[&str]) -> PrototypeSet {
        let map: BTreeMap<String, Vec<f64>> = labels
            .iter()
            .map(|l| (l.to_string(), vec![1.0; dim]))
            .collect();
        PrototypeSet::new(map).unwrap()
    }

    #[test]
    fn snapshots_survive_replacement() {
        let store = PrototypeStore::from_set(set_of(2, &["a"]));
        let before = store.snapshot();
        let old = store.replace(Published {
            prototypes: set_of(3, &["b", "c"]),
            config: None,
        });
        assert!(Arc::ptr_eq(&before, &old));
        assert_eq!(before.prototypes.dim(), 2);
        assert_eq!(store.snapshot().prototypes.len(), 2);
    }

    #[test]
    fn concurrent_readers_only_see_complete_sets() {
        let store = Arc::new(PrototypeStore::from_set(set_of(4, &["a", "b"])));
        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..200 {
                    let labels: Vec<String> = (0..(i % 5 + 1)).map(|k| format!("l{k}")).collect();
                    let refs: Vec<&str> = labels.iter().map(String::as_str).collect();
                    store.replace(Published {
                        prototypes: set_of(i % 7 + 1, &refs),
                        config: None,
                    });
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..500 {
                        let snap = store.snapshot();
                        let dim = snap.prototypes.dim();
                        assert!(snap.prototypes.iter().all(|(_, v)| v.len() == dim));
                    }
                })
            })
            .collect();
        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
    }

    #[test]
    fn missing_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = PrototypeStore::open(&dir.path().join("absent.json")).unwrap();
        assert!(store.snapshot().prototypes.is_empty());
    }
}
