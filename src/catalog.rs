// Attribute catalog: the queryable paths, derived from the shape of one sample.

use crate::models::{AttributePath, Scalar, Snapshot, Value};
use crate::store::SnapshotStore;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, OnceLock};

/// Every `top.sub` and `top.sub.leaf` path of `snapshot` that ends on a scalar.
/// Scalars at the top level and anything nested deeper than three segments are left out.
pub fn derive(snapshot: &Snapshot) -> BTreeSet<AttributePath> {
    let mut out = BTreeSet::new();
    for (key, value) in snapshot {
        let Some(sub) = value.as_mapping() else {
            continue;
        };
        for (akey, aval) in sub {
            match aval {
                Value::Mapping(leaves) => {
                    for (bkey, bval) in leaves {
                        if bval.is_mapping() {
                            continue;
                        }
                        if let Ok(p) = AttributePath::from_segments([key, akey, bkey]) {
                            out.insert(p);
                        }
                    }
                }
                Value::Scalar(_) => {
                    if let Ok(p) = AttributePath::from_segments([key, akey]) {
                        out.insert(p);
                    }
                }
            }
        }
    }
    out
}

/// Top-level scalars of `snapshot` (host, version, pid, uptime, ...): the identity block the
/// catalog leaves out.
pub fn server_info(snapshot: &Snapshot) -> BTreeMap<String, Scalar> {
    snapshot
        .iter()
        .filter_map(|(key, value)| Some((key.clone(), value.as_scalar()?.clone())))
        .collect()
}

/// Catalog computed once per process from the first sample that becomes available.
pub struct AttributeCatalog {
    store: Arc<SnapshotStore>,
    paths: OnceLock<Arc<BTreeSet<AttributePath>>>,
}

impl AttributeCatalog {
    pub fn new(store: Arc<SnapshotStore>) -> Self {
        Self {
            store,
            paths: OnceLock::new(),
        }
    }

    /// Fixes the catalog to `snapshot` unless it is already set.
    pub fn prime(&self, snapshot: &Snapshot) -> Arc<BTreeSet<AttributePath>> {
        self.paths
            .get_or_init(|| {
                let paths = derive(snapshot);
                tracing::info!(attributes = paths.len(), "attribute catalog built");
                Arc::new(paths)
            })
            .clone()
    }

    /// The catalog, derived from the store's latest record on first use.
    /// Empty (and not cached) while the store has never received a record.
    pub fn paths(&self) -> Arc<BTreeSet<AttributePath>> {
        if let Some(paths) = self.paths.get() {
            return paths.clone();
        }
        match self.store.latest() {
            Some(record) => self.prime(record.snapshot()),
            None => Arc::new(BTreeSet::new()),
        }
    }

    pub fn contains(&self, path: &AttributePath) -> bool {
        self.paths().contains(path)
    }

    pub fn is_ready(&self) -> bool {
        self.paths.get().is_some()
    }
}
