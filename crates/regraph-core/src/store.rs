use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{GraphError, Result};
use crate::graph::DependencyGraph;

/// Snapshot format version - increment when the persisted structure changes
pub const GRAPH_FORMAT_VERSION: u32 = 1;

/// Default store directory name
pub const STORE_DIR_NAME: &str = ".regraph";

/// Snapshot file name
pub const SNAPSHOT_FILE_NAME: &str = "graph.bin";

/// Versioned envelope around a persisted snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GraphEnvelope {
    version: u32,
    graph: DependencyGraph,
}

/// On-disk persistence for dependency graph snapshots.
///
/// The graph crosses process boundaries: a long-lived analysis process may
/// load the snapshot a previous invocation saved. Identity keys are pure
/// value hashes, so a reloaded snapshot is usable as-is.
pub struct GraphStore {
    store_dir: PathBuf,
    snapshot_path: PathBuf,
}

impl GraphStore {
    /// Create a store rooted at `base_dir` (the snapshot lives at
    /// `base_dir/.regraph/graph.bin`).
    pub fn new(base_dir: &Path) -> Self {
        let store_dir = base_dir.join(STORE_DIR_NAME);
        let snapshot_path = store_dir.join(SNAPSHOT_FILE_NAME);
        Self {
            store_dir,
            snapshot_path,
        }
    }

    fn ensure_store_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.store_dir)?;
        Ok(())
    }

    /// Persist a snapshot.
    pub fn save(&self, graph: &DependencyGraph) -> Result<()> {
        self.ensure_store_dir()?;

        let envelope = GraphEnvelope {
            version: GRAPH_FORMAT_VERSION,
            // Snapshot clones are shallow (Arc leaves), so this is cheap.
            graph: graph.clone(),
        };
        let bytes = bincode::serialize(&envelope)?;
        std::fs::write(&self.snapshot_path, &bytes)?;

        info!(
            "Saved dependency graph snapshot with {} dependents",
            graph.dependent_count()
        );
        Ok(())
    }

    /// Load the persisted snapshot, if any.
    ///
    /// Returns `Ok(None)` when no snapshot exists (cold start). A corrupted
    /// or version-mismatched file is an error; callers typically discard it
    /// and start cold.
    pub fn load(&self) -> Result<Option<DependencyGraph>> {
        if !self.snapshot_path.exists() {
            info!("No persisted dependency graph found");
            return Ok(None);
        }

        let bytes = std::fs::read(&self.snapshot_path)?;
        let envelope: GraphEnvelope = match bincode::deserialize(&bytes) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Corrupted dependency graph snapshot: {:?}", e);
                return Err(GraphError::from(e));
            }
        };

        if envelope.version != GRAPH_FORMAT_VERSION {
            warn!(
                "Snapshot version mismatch: expected {}, found {}",
                GRAPH_FORMAT_VERSION, envelope.version
            );
            return Err(GraphError::VersionMismatch {
                expected: GRAPH_FORMAT_VERSION,
                found: envelope.version,
            });
        }

        info!(
            "Loaded dependency graph snapshot with {} dependents",
            envelope.graph.dependent_count()
        );
        Ok(Some(envelope.graph))
    }

    /// Delete the persisted snapshot.
    pub fn clear(&self) -> Result<()> {
        if self.store_dir.exists() {
            std::fs::remove_dir_all(&self.store_dir)?;
        }
        info!("Dependency graph store cleared");
        Ok(())
    }
}
