//! Deterministic test payloads for the archive benchmarks.
//!
//! Each dataset size gets one payload file. Content mixes short text runs
//! (compressible) with random bytes (incompressible), so archive libraries
//! do real work on both paths.
//!
//! # Layout
//!
//! ```text
//! <dir>/
//!   manifest.json   seed + per-size byte count and SHA-256
//!   small.bin
//!   medium.bin
//!   large.bin
//! ```

use crate::error::{BenchError, Result};
use crate::DatasetSize;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const MANIFEST_FILE: &str = "manifest.json";

/// Chunk granularity for parallel generation.
const CHUNK_SIZE: usize = 64 * 1024;

const WORDS: [&str; 12] = [
    "archive", "entry", "deflate", "header", "central", "directory", "local", "file", "crc",
    "stream", "buffer", "record",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadInfo {
    pub bytes: usize,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetManifest {
    pub seed: u64,
    pub payloads: BTreeMap<DatasetSize, PayloadInfo>,
}

fn per_chunk_seed(master_seed: u64, size: DatasetSize, index: usize) -> u64 {
    master_seed
        .wrapping_add((size as u64) << 48)
        .wrapping_add(index as u64)
        .wrapping_mul(0x517cc1b727220a95)
}

fn fill_chunk(rng: &mut ChaCha8Rng, out: &mut [u8]) {
    let mut pos = 0;
    while pos < out.len() {
        let run = rng.gen_range(16..256).min(out.len() - pos);
        if rng.gen_bool(0.5) {
            let mut written = 0;
            while written < run {
                let word = WORDS[rng.gen_range(0..WORDS.len())].as_bytes();
                for &b in word.iter().chain(std::iter::once(&b' ')) {
                    if written == run {
                        break;
                    }
                    out[pos + written] = b;
                    written += 1;
                }
            }
        } else {
            rng.fill(&mut out[pos..pos + run]);
        }
        pos += run;
    }
}

/// Generate the payload for one dataset size.
///
/// Chunks are filled in parallel from seeds derived from the master seed
/// and chunk index, so the output depends only on `(size, seed)`.
pub fn generate_payload(size: DatasetSize, seed: u64) -> Vec<u8> {
    let mut payload = vec![0u8; size.bytes()];
    payload
        .par_chunks_mut(CHUNK_SIZE)
        .enumerate()
        .for_each(|(i, chunk)| {
            let mut rng = ChaCha8Rng::seed_from_u64(per_chunk_seed(seed, size, i));
            fill_chunk(&mut rng, chunk);
        });
    payload
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest: [u8; 32] = Sha256::digest(bytes).into();
    let mut s = String::with_capacity(64);
    for b in digest {
        s.push_str(&format!("{:02x}", b));
    }
    s
}

/// Write payload files and the manifest for the given sizes.
pub fn write_datasets(dir: &Path, seed: u64, sizes: &[DatasetSize]) -> Result<DatasetManifest> {
    fs::create_dir_all(dir).map_err(|e| BenchError::io(dir, e))?;

    let mut payloads = BTreeMap::new();
    for &size in sizes {
        let payload = generate_payload(size, seed);
        let path = dir.join(format!("{size}.bin"));
        fs::write(&path, &payload).map_err(|e| BenchError::io(&path, e))?;
        tracing::info!(%size, bytes = payload.len(), path = %path.display(), "wrote payload");
        payloads.insert(
            size,
            PayloadInfo {
                bytes: payload.len(),
                sha256: sha256_hex(&payload),
            },
        );
    }

    let manifest = DatasetManifest { seed, payloads };
    crate::schema::write_json(&dir.join(MANIFEST_FILE), &manifest)?;
    Ok(manifest)
}

pub fn read_manifest(dir: &Path) -> Result<DatasetManifest> {
    let path = dir.join(MANIFEST_FILE);
    let bytes = fs::read(&path).map_err(|e| BenchError::io(&path, e))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| BenchError::malformed(path.display().to_string(), e.to_string()))
}

/// Load every payload listed in the manifest, verifying length and digest.
pub fn load_payloads(dir: &Path) -> Result<BTreeMap<DatasetSize, Vec<u8>>> {
    let manifest = read_manifest(dir)?;
    let mut out = BTreeMap::new();
    for (size, info) in &manifest.payloads {
        let path = dir.join(format!("{size}.bin"));
        let payload = fs::read(&path).map_err(|e| BenchError::io(&path, e))?;
        if payload.len() != info.bytes {
            return Err(BenchError::malformed(
                path.display().to_string(),
                format!("expected {} bytes, found {}", info.bytes, payload.len()),
            ));
        }
        let digest = sha256_hex(&payload);
        if digest != info.sha256 {
            return Err(BenchError::malformed(
                path.display().to_string(),
                format!("sha256 mismatch: manifest {}, file {digest}", info.sha256),
            ));
        }
        out.insert(*size, payload);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_generate_deterministic() {
        let a = generate_payload(DatasetSize::Medium, 42);
        let b = generate_payload(DatasetSize::Medium, 42);
        assert_eq!(a.len(), 1024 * 1024);
        assert_eq!(a, b);
    }

    #[test]
    fn test_seed_changes_content() {
        let a = generate_payload(DatasetSize::Small, 1);
        let b = generate_payload(DatasetSize::Small, 2);
        assert_ne!(a, b);
    }

    #[test]
    fn test_payload_contains_text_runs() {
        let payload = generate_payload(DatasetSize::Medium, 7);
        let needle = b"archive ";
        assert!(payload.windows(needle.len()).any(|w| w == needle));
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_write_and_load() {
        let dir = tempdir().unwrap();
        let manifest =
            write_datasets(dir.path(), 9, &[DatasetSize::Small, DatasetSize::Medium]).unwrap();
        assert_eq!(manifest.payloads.len(), 2);
        assert_eq!(read_manifest(dir.path()).unwrap(), manifest);

        let payloads = load_payloads(dir.path()).unwrap();
        assert_eq!(payloads[&DatasetSize::Small], generate_payload(DatasetSize::Small, 9));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let dir = tempdir().unwrap();
        write_datasets(dir.path(), 3, &[DatasetSize::Small]).unwrap();
        let path = dir.path().join("small.bin");
        let mut bytes = fs::read(&path).unwrap();
        bytes[0] ^= 0xff;
        fs::write(&path, bytes).unwrap();

        let err = load_payloads(dir.path()).unwrap_err();
        assert!(err.to_string().contains("sha256 mismatch"), "{err}");
    }
}
