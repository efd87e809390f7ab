//! Snapshot persistence.
//!
//! A snapshot directory looks like:
//!
//! ```text
//! <dir>/CURRENT                      name of the committed bundle
//! <dir>/snapshots/<name>/vectors.bin     normalized vectors (primary artifact)
//! <dir>/snapshots/<name>/metadata.json   metadata entries
//! <dir>/snapshots/<name>/embeddings.bin  raw provider vectors
//! <dir>/snapshots/<name>/manifest.json   model, dimension, counts, sha256 per artifact
//! ```
//!
//! `save` writes and fsyncs a fresh bundle, then swaps `CURRENT` with a
//! rename. `load` only follows `CURRENT`, so it never sees a half-written
//! bundle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};
use vecsearch_common::{Result, VecSearchError};

use crate::types::{IndexSnapshot, MetadataEntry};
use crate::vector_index::VectorIndex;

pub const CURRENT_FILE: &str = "CURRENT";
pub const SNAPSHOTS_DIR: &str = "snapshots";
pub const VECTORS_FILE: &str = "vectors.bin";
pub const METADATA_FILE: &str = "metadata.json";
pub const EMBEDDINGS_FILE: &str = "embeddings.bin";
pub const MANIFEST_FILE: &str = "manifest.json";

const VECTORS_MAGIC: &[u8; 4] = b"VSIX";
const EMBEDDINGS_MAGIC: &[u8; 4] = b"VSRW";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 4 + 8;

/// Held for the whole of `save`: commit and prune must not interleave
static SAVE_LOCK: Mutex<()> = Mutex::new(());

/// Bundle description written next to the artifacts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub embedding_model: String,
    pub embedding_dim: usize,
    pub documents: usize,
    pub created_at: DateTime<Utc>,
    pub checksums: Checksums,
}

/// Hex-encoded SHA-256 of each artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checksums {
    pub vectors: String,
    pub metadata: String,
    pub embeddings: String,
}

/// Write `snapshot` under `dir` and commit it. Returns the bundle directory.
pub fn save(snapshot: &IndexSnapshot, dir: &Path) -> Result<PathBuf> {
    let _guard = SAVE_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    let snapshots_dir = dir.join(SNAPSHOTS_DIR);
    fs::create_dir_all(&snapshots_dir)?;

    let name = format!("snap-{}", uuid::Uuid::new_v4().simple());
    let bundle = snapshots_dir.join(&name);
    fs::create_dir(&bundle)?;

    let dim = snapshot.dim();
    let vectors = encode_matrix(VECTORS_MAGIC, dim, snapshot.len(), snapshot.index.values());
    let metadata = serde_json::to_vec_pretty(&snapshot.metadata)?;
    let embeddings = encode_matrix(
        EMBEDDINGS_MAGIC,
        dim,
        snapshot.raw_embeddings.len(),
        snapshot.raw_embeddings.iter().flatten().copied(),
    );

    let manifest = Manifest {
        version: FORMAT_VERSION,
        embedding_model: snapshot.embedding_model.clone(),
        embedding_dim: dim,
        documents: snapshot.len(),
        created_at: snapshot.created_at,
        checksums: Checksums {
            vectors: sha256_hex(&vectors),
            metadata: sha256_hex(&metadata),
            embeddings: sha256_hex(&embeddings),
        },
    };

    write_synced(&bundle.join(VECTORS_FILE), &vectors)?;
    write_synced(&bundle.join(METADATA_FILE), &metadata)?;
    write_synced(&bundle.join(EMBEDDINGS_FILE), &embeddings)?;
    write_synced(&bundle.join(MANIFEST_FILE), &serde_json::to_vec_pretty(&manifest)?)?;
    sync_dir(&bundle);

    // Commit point
    let pending = dir.join(format!(
        "{}.{}.tmp",
        CURRENT_FILE,
        uuid::Uuid::new_v4().simple()
    ));
    if let Err(e) = write_synced(&pending, name.as_bytes())
        .and_then(|_| fs::rename(&pending, dir.join(CURRENT_FILE)).map_err(Into::into))
    {
        let _ = fs::remove_file(&pending);
        return Err(e);
    }
    sync_dir(dir);

    prune_bundles(dir, &name);

    info!(
        "Snapshot saved: {} documents, dimension {} -> {}",
        snapshot.len(),
        dim,
        bundle.display()
    );
    Ok(bundle)
}

/// Load the committed snapshot under `dir`
pub fn load(dir: &Path) -> Result<IndexSnapshot> {
    let name = match fs::read_to_string(dir.join(CURRENT_FILE)) {
        Ok(name) => name.trim().to_string(),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(VecSearchError::snapshot_missing(format!(
                "no snapshot committed in {}",
                dir.display()
            )))
        }
        Err(e) => return Err(e.into()),
    };
    if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
        return Err(VecSearchError::corrupt_snapshot(format!(
            "invalid CURRENT entry {:?}",
            name
        )));
    }

    let bundle = dir.join(SNAPSHOTS_DIR).join(&name);
    let vectors_path = bundle.join(VECTORS_FILE);
    if !vectors_path.exists() {
        return Err(VecSearchError::snapshot_missing(format!(
            "vector data {} not found",
            vectors_path.display()
        )));
    }

    let manifest: Manifest = serde_json::from_slice(&read_artifact(&bundle, MANIFEST_FILE)?)
        .map_err(|e| VecSearchError::corrupt_snapshot(format!("{}: {}", MANIFEST_FILE, e)))?;
    if manifest.version != FORMAT_VERSION {
        return Err(VecSearchError::corrupt_snapshot(format!(
            "unsupported snapshot version {}",
            manifest.version
        )));
    }

    let vectors = read_verified(&bundle, VECTORS_FILE, &manifest.checksums.vectors)?;
    let metadata = read_verified(&bundle, METADATA_FILE, &manifest.checksums.metadata)?;
    let embeddings = read_verified(&bundle, EMBEDDINGS_FILE, &manifest.checksums.embeddings)?;

    let (dim, values) = decode_matrix(VECTORS_MAGIC, &vectors, VECTORS_FILE)?;
    let (raw_dim, raw_values) = decode_matrix(EMBEDDINGS_MAGIC, &embeddings, EMBEDDINGS_FILE)?;
    let metadata: Vec<MetadataEntry> = serde_json::from_slice(&metadata)
        .map_err(|e| VecSearchError::corrupt_snapshot(format!("{}: {}", METADATA_FILE, e)))?;

    if dim != manifest.embedding_dim || raw_dim != dim {
        return Err(VecSearchError::corrupt_snapshot(format!(
            "dimension mismatch: manifest {}, vectors {}, embeddings {}",
            manifest.embedding_dim, dim, raw_dim
        )));
    }

    let index = VectorIndex::from_flat(dim, values)
        .map_err(|e| VecSearchError::corrupt_snapshot(e.to_string()))?;
    let raw_embeddings: Vec<Vec<f32>> = raw_values.chunks(dim).map(<[f32]>::to_vec).collect();

    if index.len() != metadata.len() || raw_embeddings.len() != metadata.len() {
        return Err(VecSearchError::corrupt_snapshot(format!(
            "{} vectors, {} metadata entries, {} raw embeddings",
            index.len(),
            metadata.len(),
            raw_embeddings.len()
        )));
    }

    let snapshot = IndexSnapshot::new(
        index,
        metadata,
        raw_embeddings,
        manifest.embedding_model,
        manifest.created_at,
    )?;
    info!(
        "Snapshot loaded: {} documents, dimension {} from {}",
        snapshot.len(),
        dim,
        bundle.display()
    );
    Ok(snapshot)
}

fn encode_matrix(
    magic: &[u8; 4],
    dim: usize,
    count: usize,
    values: impl Iterator<Item = f32>,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + dim * count * 4);
    out.extend_from_slice(magic);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&(dim as u32).to_le_bytes());
    out.extend_from_slice(&(count as u64).to_le_bytes());
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

fn decode_matrix(magic: &[u8; 4], bytes: &[u8], artifact: &str) -> Result<(usize, Vec<f32>)> {
    let corrupt = |msg: String| VecSearchError::corrupt_snapshot(format!("{}: {}", artifact, msg));

    if bytes.len() < HEADER_LEN {
        return Err(corrupt(format!("truncated header ({} bytes)", bytes.len())));
    }
    if &bytes[0..4] != magic {
        return Err(corrupt("bad magic".to_string()));
    }
    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if version != FORMAT_VERSION {
        return Err(corrupt(format!("unsupported version {}", version)));
    }
    let dim = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
    let mut count_bytes = [0u8; 8];
    count_bytes.copy_from_slice(&bytes[12..20]);
    let count = u64::from_le_bytes(count_bytes) as usize;

    if dim == 0 {
        return Err(corrupt("zero dimension".to_string()));
    }
    let expected = count
        .checked_mul(dim)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| corrupt("size overflow".to_string()))?;
    let body = &bytes[HEADER_LEN..];
    if body.len() != expected {
        return Err(corrupt(format!(
            "expected {} bytes of vector data, found {}",
            expected,
            body.len()
        )));
    }

    let values = body
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    Ok((dim, values))
}

fn read_artifact(bundle: &Path, file: &str) -> Result<Vec<u8>> {
    fs::read(bundle.join(file))
        .map_err(|e| VecSearchError::corrupt_snapshot(format!("{}: {}", file, e)))
}

fn read_verified(bundle: &Path, file: &str, expected: &str) -> Result<Vec<u8>> {
    let bytes = read_artifact(bundle, file)?;
    let actual = sha256_hex(&bytes);
    if actual != expected {
        return Err(VecSearchError::corrupt_snapshot(format!(
            "{}: checksum mismatch (expected {}, found {})",
            file, expected, actual
        )));
    }
    Ok(bytes)
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

/// Flush directory entries; not supported on every platform
fn sync_dir(dir: &Path) {
    if !cfg!(unix) {
        return;
    }
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        debug!("Directory sync failed for {}: {}", dir.display(), e);
    }
}

/// Remove bundles other than `keep` and the one `CURRENT` names
fn prune_bundles(dir: &Path, keep: &str) {
    let committed = fs::read_to_string(dir.join(CURRENT_FILE))
        .map(|name| name.trim().to_string())
        .unwrap_or_default();
    let snapshots_dir = dir.join(SNAPSHOTS_DIR);
    let entries = match fs::read_dir(&snapshots_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot list {}: {}", snapshots_dir.display(), e);
            return;
        }
    };
    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if name == keep || name == committed || !name.starts_with("snap-") {
            continue;
        }
        let path = entry.path();
        if let Err(e) = fs::remove_dir_all(&path) {
            warn!("Failed to remove stale snapshot {}: {}", path.display(), e);
        } else {
            debug!("Removed stale snapshot {}", path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_index;
    use crate::builder::tests::sample_corpus;
    use vecsearch_embed::HashingEmbedder;

    async fn sample_snapshot() -> IndexSnapshot {
        let provider = HashingEmbedder::new(16).unwrap();
        build_index(&provider, &sample_corpus()).await.unwrap()
    }

    fn committed_bundle(dir: &Path) -> PathBuf {
        let name = fs::read_to_string(dir.join(CURRENT_FILE)).unwrap();
        dir.join(SNAPSHOTS_DIR).join(name.trim())
    }

    #[tokio::test]
    async fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = sample_snapshot().await;

        save(&snapshot, dir.path()).unwrap();
        let loaded = load(dir.path()).unwrap();

        assert_eq!(loaded.metadata, snapshot.metadata);
        assert_eq!(loaded.embedding_model, snapshot.embedding_model);
        assert_eq!(loaded.created_at, snapshot.created_at);
        assert_eq!(loaded.dim(), snapshot.dim());
        assert_eq!(
            loaded.index.values().collect::<Vec<_>>(),
            snapshot.index.values().collect::<Vec<_>>()
        );
        assert_eq!(loaded.raw_embeddings, snapshot.raw_embeddings);
    }

    #[test]
    fn test_missing_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load(dir.path()), Err(VecSearchError::SnapshotMissing(_))));
        assert!(matches!(
            load(&dir.path().join("never-created")),
            Err(VecSearchError::SnapshotMissing(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_vector_artifact_is_snapshot_missing() {
        let dir = tempfile::tempdir().unwrap();
        save(&sample_snapshot().await, dir.path()).unwrap();
        fs::remove_file(committed_bundle(dir.path()).join(VECTORS_FILE)).unwrap();
        assert!(matches!(load(dir.path()), Err(VecSearchError::SnapshotMissing(_))));
    }

    #[tokio::test]
    async fn test_missing_secondary_artifact_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        save(&sample_snapshot().await, dir.path()).unwrap();
        fs::remove_file(committed_bundle(dir.path()).join(EMBEDDINGS_FILE)).unwrap();
        assert!(matches!(load(dir.path()), Err(VecSearchError::CorruptSnapshot(_))));
    }

    #[tokio::test]
    async fn test_tampered_artifact_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        save(&sample_snapshot().await, dir.path()).unwrap();
        fs::write(committed_bundle(dir.path()).join(METADATA_FILE), b"[]").unwrap();
        assert!(matches!(load(dir.path()), Err(VecSearchError::CorruptSnapshot(_))));
    }

    #[tokio::test]
    async fn test_length_mismatch_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        save(&sample_snapshot().await, dir.path()).unwrap();
        let bundle = committed_bundle(dir.path());

        // consistent checksums, inconsistent contents
        let metadata = b"[]".to_vec();
        fs::write(bundle.join(METADATA_FILE), &metadata).unwrap();
        let mut manifest: Manifest =
            serde_json::from_slice(&fs::read(bundle.join(MANIFEST_FILE)).unwrap()).unwrap();
        manifest.checksums.metadata = sha256_hex(&metadata);
        fs::write(bundle.join(MANIFEST_FILE), serde_json::to_vec(&manifest).unwrap()).unwrap();

        match load(dir.path()) {
            Err(VecSearchError::CorruptSnapshot(msg)) => assert!(msg.contains("metadata")),
            other => panic!("expected CorruptSnapshot, got {:?}", other.map(|s| s.len())),
        }
    }

    #[tokio::test]
    async fn test_resave_replaces_and_prunes() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = sample_snapshot().await;

        let first = save(&snapshot, dir.path()).unwrap();
        let second = save(&snapshot, dir.path()).unwrap();

        assert_ne!(first, second);
        assert!(!first.exists());
        assert!(second.exists());
        assert_eq!(committed_bundle(dir.path()), second);
        assert_eq!(load(dir.path()).unwrap().len(), snapshot.len());
    }

    #[tokio::test]
    async fn test_overlapping_saves_leave_a_loadable_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = sample_snapshot().await;

        for _ in 0..20 {
            std::thread::scope(|scope| {
                let workers: Vec<_> = (0..4)
                    .map(|_| scope.spawn(|| save(&snapshot, dir.path())))
                    .collect();
                for worker in workers {
                    assert!(worker.join().unwrap().is_ok());
                }
            });

            assert_eq!(load(dir.path()).unwrap().len(), snapshot.len());
            let bundles = fs::read_dir(dir.path().join(SNAPSHOTS_DIR)).unwrap().count();
            assert_eq!(bundles, 1);
        }

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_prune_keeps_committed_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let snapshots = dir.path().join(SNAPSHOTS_DIR);
        for name in ["snap-committed", "snap-mine", "snap-stale"] {
            fs::create_dir_all(snapshots.join(name)).unwrap();
        }
        fs::write(dir.path().join(CURRENT_FILE), "snap-committed").unwrap();

        prune_bundles(dir.path(), "snap-mine");

        assert!(snapshots.join("snap-committed").exists());
        assert!(snapshots.join("snap-mine").exists());
        assert!(!snapshots.join("snap-stale").exists());
    }

    #[tokio::test]
    async fn test_uncommitted_bundle_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = sample_snapshot().await;
        save(&snapshot, dir.path()).unwrap();

        // a save that died before the CURRENT swap
        let stray = dir.path().join(SNAPSHOTS_DIR).join("snap-interrupted");
        fs::create_dir_all(&stray).unwrap();
        fs::write(stray.join(VECTORS_FILE), b"partial").unwrap();

        let loaded = load(dir.path()).unwrap();
        assert_eq!(loaded.metadata, snapshot.metadata);
    }

    #[test]
    fn test_decode_rejects_truncated_data() {
        let bytes = encode_matrix(VECTORS_MAGIC, 2, 2, [1.0f32, 2.0, 3.0, 4.0].into_iter());
        assert!(decode_matrix(VECTORS_MAGIC, &bytes, VECTORS_FILE).is_ok());
        assert!(decode_matrix(VECTORS_MAGIC, &bytes[..bytes.len() - 1], VECTORS_FILE).is_err());
        assert!(decode_matrix(EMBEDDINGS_MAGIC, &bytes, VECTORS_FILE).is_err());
    }
}
