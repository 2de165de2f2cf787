//! Decision artifact publishing.
//!
//! Every tick the decision service returns two opaque artifacts, base64 text
//! wrapping a pickled object graph.  They are decoded, validated by parsing
//! the pickle, and published byte for byte next to a JSON object that maps
//! each non-air voxel around the agent, keyed `"x,y,z"`, to its label:
//!
//! ```text
//! <output_dir>/state_output.pkl
//! <output_dir>/edge_output.pkl
//! <output_dir>/grid_output.json
//! ```
//!
//! Each file is written to a `_temp` sibling first and renamed into place so a
//! reader never sees a partial file.  A rename refused for lack of permission
//! (typically a viewer holding the file open) is skipped and the previous
//! artifact stays visible.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use airis_types::Voxel;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_pickle::DeOptions;
use tracing::{debug, warn};

use crate::StoreError;

pub const STATE_ARTIFACT: &str = "state_output.pkl";
pub const EDGE_ARTIFACT: &str = "edge_output.pkl";
pub const GRID_ARTIFACT: &str = "grid_output.json";

/// Decode one base64 artifact and check that it parses as a pickle.
///
/// Classes the decoder does not know are accepted as opaque placeholders.
///
/// # Errors
///
/// [`StoreError::Base64`] or [`StoreError::Pickle`].
pub fn decode_artifact(encoded: &str) -> Result<Vec<u8>, StoreError> {
    let bytes = BASE64.decode(encoded.trim())?;
    serde_pickle::value_from_slice(&bytes, DeOptions::new().replace_unresolved_globals())?;
    Ok(bytes)
}

/// Writes artifacts into one output directory.
#[derive(Debug, Clone)]
pub struct ArtifactPublisher {
    dir: PathBuf,
}

impl ArtifactPublisher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the output directory, or empty it when it already exists.
    /// Entries that cannot be removed are logged and left behind.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] when the directory cannot be created or listed.
    pub fn prepare(&self) -> Result<(), StoreError> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)?;
            return Ok(());
        }
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let removed = if path.is_dir() && !path.is_symlink() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            if let Err(e) = removed {
                warn!(path = %path.display(), error = %e, "failed to clear old output");
            }
        }
        Ok(())
    }

    /// Decode, validate and publish both decision artifacts.  Nothing is
    /// written unless both decode.
    ///
    /// # Errors
    ///
    /// Decode failures and I/O failures other than a refused rename.
    pub fn publish_decision(&self, state_output: &str, edges_output: &str) -> Result<(), StoreError> {
        let state = decode_artifact(state_output)?;
        let edges = decode_artifact(edges_output)?;
        self.write_atomic(STATE_ARTIFACT, &state)?;
        self.write_atomic(EDGE_ARTIFACT, &edges)
    }

    /// Publish the voxel map as a JSON object of `"x,y,z": label`.
    ///
    /// # Errors
    ///
    /// I/O failures other than a refused rename.
    pub fn publish_grid(&self, voxels: &[Voxel]) -> Result<(), StoreError> {
        let grid: BTreeMap<String, &str> = voxels
            .iter()
            .map(|v| (grid_key(v), v.label.as_str()))
            .collect();
        let json = serde_json::to_vec(&grid)?;
        self.write_atomic(GRID_ARTIFACT, &json)
    }

    fn write_atomic(&self, name: &str, data: &[u8]) -> Result<(), StoreError> {
        let path = self.dir.join(name);
        let tmp = self.dir.join(temp_name(name));
        fs::write(&tmp, data)?;
        match fs::rename(&tmp, &path) {
            Ok(()) => {
                debug!(path = %path.display(), bytes = data.len(), "artifact published");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                debug!(path = %path.display(), "artifact locked; keeping previous version");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn grid_key(voxel: &Voxel) -> String {
    format!("{},{},{}", voxel.x, voxel.y, voxel.z)
}

/// `state_output.pkl` → `state_output_temp.pkl`.
fn temp_name(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}_temp.{ext}"),
        None => format!("{name}_temp"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_pickle::SerOptions;

    fn pickled_graph() -> Vec<u8> {
        let mut graph: BTreeMap<String, Vec<i64>> = BTreeMap::new();
        graph.insert("0".into(), vec![1, 2]);
        graph.insert("1".into(), vec![0]);
        serde_pickle::to_vec(&graph, SerOptions::new()).unwrap()
    }

    #[test]
    fn decode_then_publish_is_byte_for_byte() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = ArtifactPublisher::new(dir.path());
        let state = pickled_graph();
        let edges = serde_pickle::to_vec(&vec![(0i64, 1i64)], SerOptions::new()).unwrap();

        publisher
            .publish_decision(&BASE64.encode(&state), &BASE64.encode(&edges))
            .unwrap();

        assert_eq!(fs::read(dir.path().join(STATE_ARTIFACT)).unwrap(), state);
        assert_eq!(fs::read(dir.path().join(EDGE_ARTIFACT)).unwrap(), edges);
        assert!(!dir.path().join("state_output_temp.pkl").exists());
    }

    #[test]
    fn invalid_artifacts_publish_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = ArtifactPublisher::new(dir.path());
        let good = BASE64.encode(pickled_graph());

        let err = publisher.publish_decision("!!not base64!!", &good).unwrap_err();
        assert!(matches!(err, StoreError::Base64(_)));

        let err = publisher
            .publish_decision(&good, &BASE64.encode([0xffu8, 0xfe, 0x00]))
            .unwrap_err();
        assert!(matches!(err, StoreError::Pickle(_)));

        assert!(!dir.path().join(STATE_ARTIFACT).exists());
        assert!(!dir.path().join(EDGE_ARTIFACT).exists());
    }

    #[test]
    fn grid_artifact_is_keyed_by_coordinate() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = ArtifactPublisher::new(dir.path());
        let voxels = vec![
            Voxel {
                x: -1,
                y: 63,
                z: 4,
                label: "stone".into(),
            },
            Voxel {
                x: 2,
                y: 64,
                z: -7,
                label: "oak_log".into(),
            },
        ];
        publisher.publish_grid(&voxels).unwrap();
        let raw = fs::read_to_string(dir.path().join(GRID_ARTIFACT)).unwrap();
        let back: BTreeMap<String, String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back["-1,63,4"], "stone");
        assert_eq!(back["2,64,-7"], "oak_log");
    }

    #[test]
    fn republishing_replaces_previous_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = ArtifactPublisher::new(dir.path());
        publisher.publish_grid(&[]).unwrap();
        let voxels = vec![Voxel {
            x: 0,
            y: 0,
            z: 0,
            label: "dirt".into(),
        }];
        publisher.publish_grid(&voxels).unwrap();
        let raw = fs::read_to_string(dir.path().join(GRID_ARTIFACT)).unwrap();
        let back: BTreeMap<String, String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back["0,0,0"], "dirt");
    }

    #[test]
    fn prepare_creates_missing_directory() {
        let root = tempfile::tempdir().unwrap();
        let out = root.path().join("output");
        ArtifactPublisher::new(&out).prepare().unwrap();
        assert!(out.is_dir());
    }

    #[test]
    fn prepare_empties_existing_directory() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("stale.pkl"), b"old").unwrap();
        fs::create_dir(root.path().join("nested")).unwrap();
        fs::write(root.path().join("nested").join("f"), b"x").unwrap();

        ArtifactPublisher::new(root.path()).prepare().unwrap();
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn temp_names_keep_extension() {
        assert_eq!(temp_name("state_output.pkl"), "state_output_temp.pkl");
        assert_eq!(temp_name("grid"), "grid_temp");
    }
}
