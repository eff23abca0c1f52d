// ---------------------------------------------------------------------------
// Artifact persistence — gzipped JSON envelopes with base64 matrices
// ---------------------------------------------------------------------------
//
// A data directory holds one file per artifact:
//
//   catalog.gz    item ids (column order) and optional titles
//   ratings.gz    historical (user, item, rating) triples
//   factors.gz    latent factor item matrix + transform settings
//   neighbors.gz  neighbor index metric, size and row magnitudes
//
// Each file is gzipped JSON (plain `<name>.json` is accepted too):
//
//   { "version": 1, "kind": "...", "catalogFingerprint": "...",
//     "itemCount": N, "payload": { ... } }
//
// Dense matrices are base64 of little-endian floats, row-major.
// ---------------------------------------------------------------------------

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::{GzDecoder, GzEncoder};
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use thiserror::Error;

use crate::catalog::{fingerprint_of, Catalog};
use crate::factor::{LatentFactorModel, TransformConfig};
use crate::neighbors::{DistanceMetric, NeighborIndex};
use crate::ratings::RatingTriple;
use crate::types::ItemId;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PersistenceError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Missing artifact: {0}")]
	Missing(String),
	#[error("Corruption: {0}")]
	Corruption(String),
	#[error("Serialization: {0}")]
	Serialization(String),
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const ARTIFACT_VERSION: u32 = 1;

pub const CATALOG_FILE: &str = "catalog";
pub const RATINGS_FILE: &str = "ratings";
pub const FACTORS_FILE: &str = "factors";
pub const NEIGHBORS_FILE: &str = "neighbors";

const KIND_CATALOG: &str = "catalog";
const KIND_RATINGS: &str = "ratings";
const KIND_FACTORS: &str = "latentFactor";
const KIND_NEIGHBORS: &str = "neighborIndex";

// ---------------------------------------------------------------------------
// Float encode / decode
// ---------------------------------------------------------------------------

/// Encode a f32 slice as base64 of little-endian bytes.
pub fn encode_f32s(values: &[f32]) -> String {
	let bytes: Vec<u8> = values.iter().flat_map(|f| f.to_le_bytes()).collect();
	STANDARD.encode(&bytes)
}

/// Decode a base64-encoded f32 LE byte string.
pub fn decode_f32s(encoded: &str) -> Result<Vec<f32>, PersistenceError> {
	let bytes = STANDARD
		.decode(encoded)
		.map_err(|e| PersistenceError::Corruption(format!("Invalid base64: {}", e)))?;
	if bytes.len() % 4 != 0 {
		return Err(PersistenceError::Corruption("Invalid f32 matrix length".into()));
	}
	Ok(bytes
		.chunks_exact(4)
		.map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
		.collect())
}

/// Encode a f64 slice as base64 of little-endian bytes.
pub fn encode_f64s(values: &[f64]) -> String {
	let bytes: Vec<u8> = values.iter().flat_map(|f| f.to_le_bytes()).collect();
	STANDARD.encode(&bytes)
}

/// Decode a base64-encoded f64 LE byte string.
pub fn decode_f64s(encoded: &str) -> Result<Vec<f64>, PersistenceError> {
	let bytes = STANDARD
		.decode(encoded)
		.map_err(|e| PersistenceError::Corruption(format!("Invalid base64: {}", e)))?;
	if bytes.len() % 8 != 0 {
		return Err(PersistenceError::Corruption("Invalid f64 vector length".into()));
	}
	let mut result = Vec::with_capacity(bytes.len() / 8);
	for chunk in bytes.chunks_exact(8) {
		let mut buf = [0u8; 8];
		buf.copy_from_slice(chunk);
		result.push(f64::from_le_bytes(buf));
	}
	Ok(result)
}

// ---------------------------------------------------------------------------
// Gzip compress / decompress
// ---------------------------------------------------------------------------

/// Gzip-compress a byte slice (level 6).
pub fn compress(data: &[u8]) -> Result<Vec<u8>, PersistenceError> {
	let mut encoder = GzEncoder::new(data, Compression::new(6));
	let mut compressed = Vec::new();
	encoder.read_to_end(&mut compressed)?;
	Ok(compressed)
}

/// Gunzip-decompress a byte slice.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, PersistenceError> {
	let mut decoder = GzDecoder::new(data);
	let mut decompressed = Vec::new();
	decoder.read_to_end(&mut decompressed)?;
	Ok(decompressed)
}

/// Check if data starts with gzip magic bytes (0x1f, 0x8b).
pub fn is_gzipped(data: &[u8]) -> bool {
	data.len() >= 2 && data[0] == 0x1f && data[1] == 0x8b
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactFile<T> {
	version: u32,
	kind: String,
	catalog_fingerprint: String,
	item_count: usize,
	payload: T,
}

/// Catalog/version stamp every artifact carries.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactStamp {
	pub catalog_fingerprint: String,
	pub item_count: usize,
}

fn write_artifact<T: Serialize>(
	dir: &Path,
	name: &str,
	kind: &str,
	stamp: &ArtifactStamp,
	payload: T,
) -> Result<(), PersistenceError> {
	std::fs::create_dir_all(dir)?;
	let file = ArtifactFile {
		version: ARTIFACT_VERSION,
		kind: kind.to_string(),
		catalog_fingerprint: stamp.catalog_fingerprint.clone(),
		item_count: stamp.item_count,
		payload,
	};
	let json = serde_json::to_vec(&file).map_err(|e| {
		PersistenceError::Serialization(format!("Failed to serialize {}: {}", name, e))
	})?;
	let compressed = compress(&json)?;
	std::fs::write(dir.join(format!("{}.gz", name)), compressed)?;
	Ok(())
}

fn read_artifact<T: DeserializeOwned>(
	dir: &Path,
	name: &str,
	kind: &str,
) -> Result<(ArtifactStamp, T), PersistenceError> {
	let gz_path = dir.join(format!("{}.gz", name));
	let json_path = dir.join(format!("{}.json", name));

	let raw = if gz_path.exists() {
		std::fs::read(&gz_path)?
	} else if json_path.exists() {
		std::fs::read(&json_path)?
	} else {
		return Err(PersistenceError::Missing(gz_path.display().to_string()));
	};

	let json = if is_gzipped(&raw) { decompress(&raw)? } else { raw };

	let file: ArtifactFile<T> = serde_json::from_slice(&json)
		.map_err(|e| PersistenceError::Corruption(format!("Invalid {} JSON: {}", name, e)))?;

	if file.version != ARTIFACT_VERSION {
		return Err(PersistenceError::Corruption(format!(
			"Unsupported {} version: {}",
			name, file.version
		)));
	}
	if file.kind != kind {
		return Err(PersistenceError::Corruption(format!(
			"Expected {} artifact in {}, found {}",
			kind, name, file.kind
		)));
	}

	Ok((
		ArtifactStamp {
			catalog_fingerprint: file.catalog_fingerprint,
			item_count: file.item_count,
		},
		file.payload,
	))
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
	pub id: ItemId,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub title: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CatalogPayload {
	items: Vec<CatalogEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RatingsPayload {
	triples: Vec<RatingTriple>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FactorsPayload {
	components: usize,
	item_factors: String,
	transform: TransformConfig,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NeighborsPayload {
	metric: DistanceMetric,
	n_neighbors: usize,
	user_count: usize,
	row_magnitudes: String,
}

/// Decoded latent factor artifact, not yet checked against a catalog.
#[derive(Debug, Clone)]
pub struct FactorsData {
	pub stamp: ArtifactStamp,
	pub components: usize,
	pub item_factors: Vec<f32>,
	pub transform: TransformConfig,
}

/// Decoded neighbor index artifact, not yet checked against a catalog.
#[derive(Debug, Clone)]
pub struct NeighborsData {
	pub stamp: ArtifactStamp,
	pub metric: DistanceMetric,
	pub n_neighbors: usize,
	pub row_magnitudes: Vec<f64>,
}

fn stamp_for(catalog: &Catalog) -> ArtifactStamp {
	ArtifactStamp {
		catalog_fingerprint: catalog.fingerprint().to_string(),
		item_count: catalog.len(),
	}
}

// ---------------------------------------------------------------------------
// Save
// ---------------------------------------------------------------------------

pub fn save_catalog(dir: &Path, entries: &[CatalogEntry]) -> Result<(), PersistenceError> {
	let ids: Vec<ItemId> = entries.iter().map(|e| e.id).collect();
	let stamp = ArtifactStamp {
		catalog_fingerprint: fingerprint_of(&ids),
		item_count: ids.len(),
	};
	write_artifact(
		dir,
		CATALOG_FILE,
		KIND_CATALOG,
		&stamp,
		CatalogPayload {
			items: entries.to_vec(),
		},
	)
}

pub fn save_ratings(
	dir: &Path,
	catalog: &Catalog,
	triples: &[RatingTriple],
) -> Result<(), PersistenceError> {
	write_artifact(
		dir,
		RATINGS_FILE,
		KIND_RATINGS,
		&stamp_for(catalog),
		RatingsPayload {
			triples: triples.to_vec(),
		},
	)
}

pub fn save_factors(
	dir: &Path,
	catalog: &Catalog,
	model: &LatentFactorModel,
) -> Result<(), PersistenceError> {
	write_artifact(
		dir,
		FACTORS_FILE,
		KIND_FACTORS,
		&stamp_for(catalog),
		FactorsPayload {
			components: model.components(),
			item_factors: encode_f32s(model.item_factors()),
			transform: *model.transform_config(),
		},
	)
}

pub fn save_neighbors(
	dir: &Path,
	catalog: &Catalog,
	index: &NeighborIndex,
) -> Result<(), PersistenceError> {
	write_artifact(
		dir,
		NEIGHBORS_FILE,
		KIND_NEIGHBORS,
		&stamp_for(catalog),
		NeighborsPayload {
			metric: index.metric(),
			n_neighbors: index.n_neighbors(),
			user_count: index.user_count(),
			row_magnitudes: encode_f64s(index.row_magnitudes()),
		},
	)
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Load catalog entries. The stamp must describe the entries themselves.
pub fn load_catalog(dir: &Path) -> Result<Vec<CatalogEntry>, PersistenceError> {
	let (stamp, payload): (_, CatalogPayload) = read_artifact(dir, CATALOG_FILE, KIND_CATALOG)?;
	let ids: Vec<ItemId> = payload.items.iter().map(|e| e.id).collect();
	if stamp.item_count != ids.len() || stamp.catalog_fingerprint != fingerprint_of(&ids) {
		return Err(PersistenceError::Corruption(
			"catalog stamp does not match its own items".into(),
		));
	}
	Ok(payload.items)
}

pub fn load_ratings(dir: &Path) -> Result<(ArtifactStamp, Vec<RatingTriple>), PersistenceError> {
	let (stamp, payload): (_, RatingsPayload) = read_artifact(dir, RATINGS_FILE, KIND_RATINGS)?;
	Ok((stamp, payload.triples))
}

pub fn load_factors(dir: &Path) -> Result<FactorsData, PersistenceError> {
	let (stamp, payload): (_, FactorsPayload) = read_artifact(dir, FACTORS_FILE, KIND_FACTORS)?;
	Ok(FactorsData {
		stamp,
		components: payload.components,
		item_factors: decode_f32s(&payload.item_factors)?,
		transform: payload.transform,
	})
}

pub fn load_neighbors(dir: &Path) -> Result<NeighborsData, PersistenceError> {
	let (stamp, payload): (_, NeighborsPayload) =
		read_artifact(dir, NEIGHBORS_FILE, KIND_NEIGHBORS)?;
	let row_magnitudes = decode_f64s(&payload.row_magnitudes)?;
	if row_magnitudes.len() != payload.user_count {
		return Err(PersistenceError::Corruption(format!(
			"neighbor index lists {} users but stores {} magnitudes",
			payload.user_count,
			row_magnitudes.len()
		)));
	}
	Ok(NeighborsData {
		stamp,
		metric: payload.metric,
		n_neighbors: payload.n_neighbors,
		row_magnitudes,
	})
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
