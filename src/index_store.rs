//! On-disk embedding index: a dense vector array plus a row-to-path map.
//!
//! The two artifacts are one unit:
//!
//! - `vault_embeddings.npy`: NumPy `.npy` v1.0, dtype `<f4`, C order,
//!   shape `(N, D)`. An empty index is shape `(0, D)`.
//! - `vault_file_map.json`: row `i` → relative path, plus the model,
//!   dimensions, row count, and SHA-256 of the vectors file.
//!
//! Both files are written to `.tmp` siblings before either is renamed
//! into place, vectors first and map last. [`load_index`] checks the map against the
//! vectors file and refuses a mismatched pair, so a reader never sees a
//! vector array whose length disagrees with its map.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{Result, VaultError};

const NPY_MAGIC: &[u8] = b"\x93NUMPY";

/// Locations of the two index artifacts.
#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub vectors: PathBuf,
    pub map: PathBuf,
}

impl IndexPaths {
    pub fn new(vectors: impl Into<PathBuf>, map: impl Into<PathBuf>) -> Self {
        Self {
            vectors: vectors.into(),
            map: map.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.embeddings_path(), config.file_map_path())
    }
}

/// A loaded or freshly built embedding index.
#[derive(Debug, Clone)]
pub struct EmbeddingIndex {
    /// Row `i` is the embedding of `paths[i]`.
    pub vectors: Array2<f32>,
    pub paths: Vec<String>,
    pub model: String,
    pub built_at: f64,
}

impl EmbeddingIndex {
    pub fn empty(model: &str, dims: usize, built_at: f64) -> Self {
        Self {
            vectors: Array2::zeros((0, dims)),
            paths: Vec::new(),
            model: model.to_string(),
            built_at,
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.vectors.ncols()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FileMap {
    build_id: String,
    model: String,
    dims: usize,
    rows: usize,
    built_at: f64,
    vectors_sha256: String,
    paths: BTreeMap<usize, String>,
}

/// Replace both artifacts with `index`.
pub fn write_index(paths: &IndexPaths, index: &EmbeddingIndex) -> Result<()> {
    if index.vectors.nrows() != index.paths.len() {
        return Err(VaultError::Inconsistent(format!(
            "refusing to write {} vectors for {} paths",
            index.vectors.nrows(),
            index.paths.len()
        )));
    }

    let npy = encode_npy(&index.vectors);
    let map = FileMap {
        build_id: uuid::Uuid::new_v4().to_string(),
        model: index.model.clone(),
        dims: index.dims(),
        rows: index.len(),
        built_at: index.built_at,
        vectors_sha256: sha256_hex(&npy),
        paths: index.paths.iter().cloned().enumerate().collect(),
    };
    let map_bytes = serde_json::to_vec_pretty(&map)?;

    let vectors_tmp = tmp_path(&paths.vectors);
    let map_tmp = tmp_path(&paths.map);
    let staged = (|| -> Result<()> {
        stage_file(&vectors_tmp, &npy)?;
        stage_file(&map_tmp, &map_bytes)?;
        std::fs::rename(&vectors_tmp, &paths.vectors)?;
        std::fs::rename(&map_tmp, &paths.map)?;
        Ok(())
    })();
    if let Err(e) = staged {
        remove_stale(&vectors_tmp);
        remove_stale(&map_tmp);
        return Err(e);
    }

    tracing::debug!(
        build_id = %map.build_id,
        rows = map.rows,
        dims = map.dims,
        "index artifacts written"
    );
    Ok(())
}

/// Load the index, `Ok(None)` when neither artifact exists.
pub fn load_index(paths: &IndexPaths) -> Result<Option<EmbeddingIndex>> {
    match (paths.vectors.exists(), paths.map.exists()) {
        (false, false) => return Ok(None),
        (true, false) => {
            return Err(VaultError::Inconsistent(format!(
                "path map missing: {}",
                paths.map.display()
            )))
        }
        (false, true) => {
            return Err(VaultError::Inconsistent(format!(
                "vector array missing: {}",
                paths.vectors.display()
            )))
        }
        (true, true) => {}
    }

    let map_bytes = std::fs::read(&paths.map)?;
    let map: FileMap = serde_json::from_slice(&map_bytes)?;
    let npy = std::fs::read(&paths.vectors)?;

    if sha256_hex(&npy) != map.vectors_sha256 {
        return Err(VaultError::Inconsistent(
            "vector array does not match the path map checksum".to_string(),
        ));
    }

    let vectors = decode_npy(&npy)?;
    if vectors.nrows() != map.rows || map.paths.len() != map.rows {
        return Err(VaultError::Inconsistent(format!(
            "{} vectors, {} map rows, {} paths",
            vectors.nrows(),
            map.rows,
            map.paths.len()
        )));
    }
    if vectors.nrows() > 0 && vectors.ncols() != map.dims {
        return Err(VaultError::Inconsistent(format!(
            "vector width {} but map records {} dims",
            vectors.ncols(),
            map.dims
        )));
    }

    let mut ordered = Vec::with_capacity(map.rows);
    for (expected, (row, path)) in map.paths.into_iter().enumerate() {
        if row != expected {
            return Err(VaultError::Inconsistent(format!(
                "path map skips row {}",
                expected
            )));
        }
        ordered.push(path);
    }

    Ok(Some(EmbeddingIndex {
        vectors,
        paths: ordered,
        model: map.model,
        built_at: map.built_at,
    }))
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

fn stage_file(tmp: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = tmp.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(tmp, bytes)?;
    Ok(())
}

fn remove_stale(tmp: &Path) {
    if tmp.is_file() {
        if let Err(e) = std::fs::remove_file(tmp) {
            tracing::warn!(path = %tmp.display(), "could not remove temp file: {}", e);
        }
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Serialise a matrix as `.npy` v1.0 (`<f4`, C order).
pub fn encode_npy(array: &Array2<f32>) -> Vec<u8> {
    let (rows, cols) = array.dim();
    let mut header = format!(
        "{{'descr': '<f4', 'fortran_order': False, 'shape': ({}, {}), }}",
        rows, cols
    );
    // magic(6) + version(2) + header_len(2) + header, padded to 64 bytes, '\n'-terminated
    let unpadded = NPY_MAGIC.len() + 2 + 2 + header.len() + 1;
    let padding = (64 - unpadded % 64) % 64;
    header.push_str(&" ".repeat(padding));
    header.push('\n');

    let mut out = Vec::with_capacity(NPY_MAGIC.len() + 4 + header.len() + rows * cols * 4);
    out.extend_from_slice(NPY_MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    for v in array.iter() {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Parse a `.npy` file holding a little-endian `f32` matrix.
///
/// A 1-D empty array (`shape (0,)`) reads as a `(0, 0)` matrix.
pub fn decode_npy(bytes: &[u8]) -> Result<Array2<f32>> {
    let bad = |msg: &str| VaultError::Index(format!("invalid .npy data: {}", msg));

    if bytes.len() < 10 || &bytes[..6] != NPY_MAGIC {
        return Err(bad("missing magic"));
    }
    let (header_len, header_start) = match bytes[6] {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 if bytes.len() >= 12 => (
            u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
            12,
        ),
        _ => return Err(bad("unsupported version")),
    };
    let data_start = header_start + header_len;
    if bytes.len() < data_start {
        return Err(bad("truncated header"));
    }
    let header = std::str::from_utf8(&bytes[header_start..data_start])
        .map_err(|_| bad("header is not UTF-8"))?;

    if !header.contains("'descr': '<f4'") {
        return Err(bad("dtype must be '<f4'"));
    }
    if header.contains("'fortran_order': True") {
        return Err(bad("fortran order is not supported"));
    }

    let shape_start = header.find("'shape': (").ok_or_else(|| bad("missing shape"))? + 10;
    let shape_end = header[shape_start..]
        .find(')')
        .ok_or_else(|| bad("unterminated shape"))?
        + shape_start;
    let shape: Vec<usize> = header[shape_start..shape_end]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>().map_err(|_| bad("non-numeric shape")))
        .collect::<Result<_>>()?;

    let (rows, cols) = match shape.as_slice() {
        [rows, cols] => (*rows, *cols),
        [0] => (0, 0),
        _ => return Err(bad("expected a 2-D array")),
    };

    let expected = rows
        .checked_mul(cols)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| bad("shape too large"))?;
    let data = &bytes[data_start..];
    if data.len() != expected {
        return Err(bad("data length does not match shape"));
    }
    let values: Vec<f32> = data
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    Array2::from_shape_vec((rows, cols), values).map_err(|e| bad(&e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use tempfile::TempDir;

    fn paths_in(tmp: &TempDir) -> IndexPaths {
        IndexPaths::new(
            tmp.path().join("vault_embeddings.npy"),
            tmp.path().join("vault_file_map.json"),
        )
    }

    #[test]
    fn test_npy_header_is_64_byte_aligned() {
        let bytes = encode_npy(&array![[1.0f32, 2.0], [3.0, 4.0], [5.0, 6.0]]);
        let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
        assert_eq!((10 + header_len) % 64, 0);
        assert_eq!(bytes[10 + header_len - 1], b'\n');
        assert_eq!(bytes.len(), 10 + header_len + 6 * 4);
        assert_eq!(decode_npy(&bytes).unwrap(), array![[1.0f32, 2.0], [3.0, 4.0], [5.0, 6.0]]);
    }

    #[test]
    fn test_decode_accepts_one_dimensional_empty_array() {
        // What `np.save(path, np.array([], dtype='<f4'))` produces.
        let mut header = "{'descr': '<f4', 'fortran_order': False, 'shape': (0,), }".to_string();
        let padding = (64 - (10 + header.len() + 1) % 64) % 64;
        header.push_str(&" ".repeat(padding));
        header.push('\n');
        let mut bytes = NPY_MAGIC.to_vec();
        bytes.extend_from_slice(&[1, 0]);
        bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
        bytes.extend_from_slice(header.as_bytes());

        let array = decode_npy(&bytes).unwrap();
        assert_eq!(array.dim(), (0, 0));
    }

    #[test]
    fn test_decode_rejects_wrong_dtype() {
        let mut bytes = encode_npy(&array![[1.0f32]]);
        let at = bytes.windows(3).position(|w| w == b"<f4").unwrap();
        bytes[at + 2] = b'8';
        assert!(decode_npy(&bytes).is_err());
    }

    #[test]
    fn test_write_and_load_keeps_row_order() {
        let tmp = TempDir::new().unwrap();
        let paths = paths_in(&tmp);
        let index = EmbeddingIndex {
            vectors: array![[1.0f32, 0.0], [0.0, 1.0]],
            paths: vec!["b.md".to_string(), "a.md".to_string()],
            model: "hash".to_string(),
            built_at: 42.0,
        };
        write_index(&paths, &index).unwrap();

        let loaded = load_index(&paths).unwrap().unwrap();
        assert_eq!(loaded.paths, vec!["b.md", "a.md"]);
        assert_eq!(loaded.vectors, index.vectors);
        assert_eq!(loaded.model, "hash");
        assert_eq!(loaded.built_at, 42.0);
        assert!(!paths.vectors.with_extension("npy.tmp").exists());
    }

    #[test]
    fn test_empty_index_round_trip() {
        let tmp = TempDir::new().unwrap();
        let paths = paths_in(&tmp);
        write_index(&paths, &EmbeddingIndex::empty("hash", 8, 1.0)).unwrap();

        let loaded = load_index(&paths).unwrap().unwrap();
        assert!(loaded.is_empty());
        assert_eq!(loaded.vectors.nrows(), 0);
    }

    #[test]
    fn test_missing_artifacts_load_as_none() {
        let tmp = TempDir::new().unwrap();
        assert!(load_index(&paths_in(&tmp)).unwrap().is_none());
    }

    #[test]
    fn test_swapped_vectors_are_detected() {
        let tmp = TempDir::new().unwrap();
        let paths = paths_in(&tmp);
        write_index(
            &paths,
            &EmbeddingIndex {
                vectors: array![[1.0f32], [2.0]],
                paths: vec!["a.md".to_string(), "b.md".to_string()],
                model: "hash".to_string(),
                built_at: 1.0,
            },
        )
        .unwrap();

        // A reader racing a writer could see a new vectors file with an old map.
        std::fs::write(&paths.vectors, encode_npy(&array![[1.0f32]])).unwrap();
        let err = load_index(&paths).unwrap_err();
        assert!(matches!(err, VaultError::Inconsistent(_)));
    }

    #[test]
    fn test_failed_map_write_keeps_previous_index() {
        let tmp = TempDir::new().unwrap();
        let paths = paths_in(&tmp);
        write_index(
            &paths,
            &EmbeddingIndex {
                vectors: array![[1.0f32, 0.0]],
                paths: vec!["a.md".to_string()],
                model: "hash".to_string(),
                built_at: 1.0,
            },
        )
        .unwrap();

        // A directory squatting on the map's temp path makes staging fail.
        let map_tmp = tmp_path(&paths.map);
        std::fs::create_dir(&map_tmp).unwrap();
        let next = EmbeddingIndex {
            vectors: array![[1.0f32, 0.0], [0.0, 1.0]],
            paths: vec!["a.md".to_string(), "b.md".to_string()],
            model: "hash".to_string(),
            built_at: 2.0,
        };
        assert!(write_index(&paths, &next).is_err());

        let loaded = load_index(&paths).unwrap().unwrap();
        assert_eq!(loaded.paths, vec!["a.md"]);
        assert_eq!(loaded.built_at, 1.0);
        assert!(!tmp_path(&paths.vectors).exists());
        assert!(map_tmp.is_dir());
    }

    #[test]
    fn test_decode_rejects_overflowing_shape() {
        let mut header = format!(
            "{{'descr': '<f4', 'fortran_order': False, 'shape': ({}, {}), }}",
            usize::MAX,
            2
        );
        let padding = (64 - (10 + header.len() + 1) % 64) % 64;
        header.push_str(&" ".repeat(padding));
        header.push('\n');
        let mut bytes = NPY_MAGIC.to_vec();
        bytes.extend_from_slice(&[1, 0]);
        bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
        bytes.extend_from_slice(header.as_bytes());

        let err = decode_npy(&bytes).unwrap_err();
        assert!(err.to_string().contains("shape too large"));
    }

    #[test]
    fn test_write_rejects_mismatched_index() {
        let tmp = TempDir::new().unwrap();
        let index = EmbeddingIndex {
            vectors: array![[1.0f32]],
            paths: vec![],
            model: "hash".to_string(),
            built_at: 1.0,
        };
        assert!(write_index(&paths_in(&tmp), &index).is_err());
        assert!(load_index(&paths_in(&tmp)).unwrap().is_none());
    }
}
