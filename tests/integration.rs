// ---------------------------------------------------------------------------
// Integration tests for simse-recommend-engine JSON-RPC 2.0 / NDJSON protocol
// ---------------------------------------------------------------------------
//
// Each test spawns a fresh simse-recommend-engine binary over a temporary
// data directory and talks to it via newline-delimited JSON-RPC 2.0.
// ---------------------------------------------------------------------------

use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{json, Value};

use simse_recommend_engine::catalog::Catalog;
use simse_recommend_engine::factor::{LatentFactorModel, TransformConfig};
use simse_recommend_engine::neighbors::{DistanceMetric, NeighborIndex};
use simse_recommend_engine::persistence::{self, CatalogEntry};
use simse_recommend_engine::ratings::{RatingMatrix, RatingTriple};
use simse_recommend_engine::ItemId;

// ---------------------------------------------------------------------------
// Helper
// ---------------------------------------------------------------------------

struct RecommendProcess {
	child: Child,
	reader: BufReader<std::process::ChildStdout>,
	next_id: AtomicU64,
}

impl RecommendProcess {
	fn spawn() -> Self {
		let bin = env!("CARGO_BIN_EXE_simse-recommend-engine");
		let mut child = Command::new(bin)
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.stderr(Stdio::null())
			.spawn()
			.expect("failed to spawn simse-recommend-engine");

		let stdout = child.stdout.take().expect("no stdout");
		let reader = BufReader::new(stdout);

		Self {
			child,
			reader,
			next_id: AtomicU64::new(1),
		}
	}

	fn send(&mut self, method: &str, params: Value) -> RpcResponse {
		let id = self.next_id.fetch_add(1, Ordering::SeqCst);
		let request = json!({
			"jsonrpc": "2.0",
			"id": id,
			"method": method,
			"params": params,
		});

		let stdin = self.child.stdin.as_mut().expect("no stdin");
		let mut line = serde_json::to_string(&request).unwrap();
		line.push('\n');
		stdin.write_all(line.as_bytes()).unwrap();
		stdin.flush().unwrap();

		loop {
			let mut buf = String::new();
			let bytes_read = self
				.reader
				.read_line(&mut buf)
				.expect("failed to read from stdout");
			if bytes_read == 0 {
				panic!("unexpected EOF while waiting for response to id={}", id);
			}
			let buf = buf.trim();
			if buf.is_empty() {
				continue;
			}
			let parsed: Value = serde_json::from_str(buf)
				.unwrap_or_else(|e| panic!("invalid JSON from engine: {e}\nline: {buf}"));
			let resp_id = parsed["id"].as_u64().expect("response id is not u64");
			assert_eq!(resp_id, id, "response id mismatch");
			if let Some(error) = parsed.get("error") {
				return RpcResponse::Error(error.clone());
			}
			return RpcResponse::Ok(parsed.get("result").cloned().unwrap_or(Value::Null));
		}
	}

	fn call(&mut self, method: &str, params: Value) -> Value {
		match self.send(method, params) {
			RpcResponse::Ok(v) => v,
			RpcResponse::Error(e) => panic!("expected success, got error: {e}"),
		}
	}

	fn call_err(&mut self, method: &str, params: Value) -> Value {
		match self.send(method, params) {
			RpcResponse::Error(e) => e,
			RpcResponse::Ok(v) => panic!("expected success to fail, got: {v}"),
		}
	}

	/// Write bytes to stdin as-is, without expecting a response.
	fn send_raw(&mut self, bytes: &[u8]) {
		let stdin = self.child.stdin.as_mut().expect("no stdin");
		stdin.write_all(bytes).unwrap();
		stdin.flush().unwrap();
	}

	fn initialize(&mut self, dir: &Path) -> Value {
		self.call(
			"engine/initialize",
			json!({ "dataDir": dir.to_string_lossy() }),
		)
	}

	fn recommend(&mut self, query: Value, strategy: &str, k: i64) -> Value {
		self.call(
			"recommend",
			json!({ "query": query, "strategy": strategy, "k": k }),
		)
	}
}

impl Drop for RecommendProcess {
	fn drop(&mut self) {
		drop(self.child.stdin.take());
		let _ = self.child.wait();
	}
}

#[derive(Debug)]
enum RpcResponse {
	Ok(Value),
	Error(Value),
}

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

const STRATEGIES: [&str; 2] = ["nmf", "neighbors"];

fn catalog_entries() -> Vec<CatalogEntry> {
	let titles = [
		(1, Some("Toy Story (1995)")),
		(2, Some("Heat (1995)")),
		(3, Some("Bambi (1942)")),
		(4, Some("Inside Man (2006)")),
		(5, None),
	];
	titles
		.iter()
		.map(|&(id, title)| CatalogEntry {
			id: ItemId(id),
			title: title.map(str::to_string),
		})
		.collect()
}

fn triples() -> Vec<RatingTriple> {
	vec![
		RatingTriple::new(10, 1, 4.0),
		RatingTriple::new(10, 2, 3.0),
		RatingTriple::new(10, 3, 5.0),
		RatingTriple::new(11, 1, 5.0),
		RatingTriple::new(11, 4, 4.0),
		RatingTriple::new(12, 2, 2.0),
		RatingTriple::new(12, 5, 5.0),
		RatingTriple::new(13, 3, 1.0),
		RatingTriple::new(13, 4, 2.0),
	]
}

/// Write a full, consistent artifact set for catalog {1..5}.
fn write_fixture(dir: &Path) -> Catalog {
	let entries = catalog_entries();
	persistence::save_catalog(dir, &entries).unwrap();
	let catalog = Catalog::new(entries.iter().map(|e| e.id).collect()).unwrap();

	let ratings = RatingMatrix::from_triples(&catalog, &triples()).unwrap();
	persistence::save_ratings(dir, &catalog, &triples()).unwrap();

	let factors = LatentFactorModel::new(
		2,
		5,
		vec![
			1.0, 0.8, 0.9, 0.1, 0.0, //
			0.0, 0.2, 0.1, 0.9, 1.0,
		],
		TransformConfig::default(),
	)
	.unwrap();
	persistence::save_factors(dir, &catalog, &factors).unwrap();

	let index = NeighborIndex::fit(&ratings, DistanceMetric::Cosine, 5);
	persistence::save_neighbors(dir, &catalog, &index).unwrap();
	catalog
}

fn spawn_initialized() -> (tempfile::TempDir, RecommendProcess) {
	let dir = tempfile::tempdir().unwrap();
	write_fixture(dir.path());
	let mut proc = RecommendProcess::spawn();
	proc.initialize(dir.path());
	(dir, proc)
}

fn ids(result: &Value) -> Vec<u64> {
	result["items"]
		.as_array()
		.expect("items is not an array")
		.iter()
		.map(|v| v.as_u64().expect("item id is not an integer"))
		.collect()
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn initialize_reports_loaded_artifacts() {
	let dir = tempfile::tempdir().unwrap();
	let catalog = write_fixture(dir.path());
	let mut proc = RecommendProcess::spawn();

	let summary = proc.initialize(dir.path());
	assert_eq!(summary["items"], 5);
	assert_eq!(summary["users"], 4);
	assert_eq!(summary["ratings"], 9);
	assert_eq!(summary["components"], 2);
	assert_eq!(summary["catalogFingerprint"], catalog.fingerprint());
	assert_eq!(summary["dataDir"].as_str(), Some(&*dir.path().to_string_lossy()));
	assert_eq!(summary["defaultK"], 10);

	let info = proc.call("engine/info", json!({}));
	assert_eq!(info, summary);
}

#[test]
fn requests_before_initialize_fail() {
	let mut proc = RecommendProcess::spawn();
	let err = proc.call_err(
		"recommend",
		json!({ "query": { "1": 4.0 }, "strategy": "nmf", "k": 2 }),
	);
	assert_eq!(err["code"], -32000);
	assert_eq!(err["data"]["recommendCode"], "RECOMMEND_NOT_LOADED");
	assert_eq!(err["data"]["kind"], "validation");
}

#[test]
fn mismatched_artifact_fails_initialize_as_model_error() {
	let dir = tempfile::tempdir().unwrap();
	write_fixture(dir.path());
	let other = Catalog::new(vec![ItemId(1), ItemId(2), ItemId(3), ItemId(4), ItemId(6)]).unwrap();
	let factors = LatentFactorModel::new(1, 5, vec![1.0; 5], TransformConfig::default()).unwrap();
	persistence::save_factors(dir.path(), &other, &factors).unwrap();

	let mut proc = RecommendProcess::spawn();
	let err = proc.call_err(
		"engine/initialize",
		json!({ "dataDir": dir.path().to_string_lossy() }),
	);
	assert_eq!(err["data"]["recommendCode"], "MODEL_CATALOG_MISMATCH");
	assert_eq!(err["data"]["kind"], "model");

	// Still unusable afterwards.
	let err = proc.call_err("engine/info", json!({}));
	assert_eq!(err["data"]["recommendCode"], "RECOMMEND_NOT_LOADED");
}

#[test]
fn stale_neighbor_index_fails_initialize() {
	let dir = tempfile::tempdir().unwrap();
	let catalog = write_fixture(dir.path());
	let index = NeighborIndex::from_parts(DistanceMetric::Cosine, 5, vec![1.0, f64::NAN, 1.0, 1.0]).unwrap();
	persistence::save_neighbors(dir.path(), &catalog, &index).unwrap();

	let mut proc = RecommendProcess::spawn();
	let err = proc.call_err(
		"engine/initialize",
		json!({ "dataDir": dir.path().to_string_lossy() }),
	);
	assert_eq!(err["data"]["recommendCode"], "MODEL_CATALOG_MISMATCH");
	assert_eq!(err["data"]["kind"], "model");
}

#[test]
fn model_error_unloads_a_loaded_engine() {
	let (_good, mut proc) = spawn_initialized();

	let bad = tempfile::tempdir().unwrap();
	let catalog = write_fixture(bad.path());
	let index = NeighborIndex::from_parts(DistanceMetric::Cosine, 5, vec![9.0; 4]).unwrap();
	persistence::save_neighbors(bad.path(), &catalog, &index).unwrap();

	let err = proc.call_err(
		"engine/initialize",
		json!({ "dataDir": bad.path().to_string_lossy() }),
	);
	assert_eq!(err["data"]["kind"], "model");

	let err = proc.call_err(
		"recommend",
		json!({ "query": { "1": 4.0 }, "strategy": "nmf", "k": 2 }),
	);
	assert_eq!(err["data"]["recommendCode"], "RECOMMEND_NOT_LOADED");
}

#[test]
fn unreadable_line_does_not_stop_the_server() {
	let (_dir, mut proc) = spawn_initialized();
	proc.send_raw(b"{\"jsonrpc\":\"2.0\",\"id\":99,\"method\":\"\xff\xfe\"}\n");
	let info = proc.call("engine/info", json!({}));
	assert_eq!(info["items"], 5);
}

#[test]
fn unknown_method_is_rejected() {
	let mut proc = RecommendProcess::spawn();
	let err = proc.call_err("engine/train", json!({}));
	assert_eq!(err["code"], -32601);
}

// ---------------------------------------------------------------------------
// Recommendation
// ---------------------------------------------------------------------------

#[test]
fn recommend_excludes_rated_items() {
	let (_dir, mut proc) = spawn_initialized();
	for strategy in STRATEGIES {
		let result = proc.recommend(json!({ "1": 4.0, "2": 3.0 }), strategy, 2);
		let items = ids(&result);
		assert_eq!(items.len(), 2, "{strategy}");
		assert!(items.iter().all(|&id| (3..=5).contains(&id)), "{strategy}: {items:?}");
		assert_eq!(result["titles"].as_array().unwrap().len(), 2);
		assert_eq!(result["scores"].as_array().unwrap().len(), 2);
	}
}

#[test]
fn recommend_scores_are_descending() {
	let (_dir, mut proc) = spawn_initialized();
	for strategy in STRATEGIES {
		let result = proc.recommend(json!({ "1": 5.0 }), strategy, 4);
		let scores: Vec<f64> = result["scores"]
			.as_array()
			.unwrap()
			.iter()
			.map(|v| v.as_f64().unwrap())
			.collect();
		assert_eq!(scores.len(), 4);
		assert!(scores.windows(2).all(|w| w[0] >= w[1]), "{strategy}: {scores:?}");
	}
}

#[test]
fn recommend_returns_fewer_when_catalog_exhausted() {
	let (_dir, mut proc) = spawn_initialized();
	let result = proc.recommend(json!({ "1": 4.0, "2": 3.0, "3": 1.0, "4": 2.0 }), "nmf", 10);
	assert_eq!(ids(&result), vec![5]);
}

#[test]
fn empty_query_is_deterministic() {
	let (_dir, mut proc) = spawn_initialized();
	for strategy in STRATEGIES {
		let first = proc.recommend(json!({}), strategy, 3);
		let second = proc.recommend(json!({}), strategy, 3);
		assert_eq!(ids(&first).len(), 3);
		assert_eq!(first, second, "{strategy}");
	}
}

#[test]
fn strategy_and_k_default_when_omitted() {
	let (_dir, mut proc) = spawn_initialized();
	let result = proc.call("recommend", json!({ "query": { "1": 4.0 } }));
	assert_eq!(result["strategy"], "neighbors");
	assert_eq!(ids(&result).len(), 4);
}

#[test]
fn titles_follow_recommended_order() {
	let (_dir, mut proc) = spawn_initialized();
	let result = proc.recommend(json!({ "1": 4.0, "2": 3.0 }), "neighbors", 1);
	assert_eq!(ids(&result), vec![3]);
	assert_eq!(result["titles"], json!(["Bambi (1942)"]));
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[test]
fn unknown_item_is_rejected() {
	let (_dir, mut proc) = spawn_initialized();
	for strategy in STRATEGIES {
		let err = proc.call_err(
			"recommend",
			json!({ "query": { "1": 4.0, "99": 3.0 }, "strategy": strategy, "k": 2 }),
		);
		assert_eq!(err["data"]["recommendCode"], "RECOMMEND_UNKNOWN_ITEM");
		assert_eq!(err["data"]["kind"], "validation");
	}
}

#[test]
fn equivalent_item_keys_are_rejected() {
	let (_dir, mut proc) = spawn_initialized();
	let err = proc.call_err(
		"recommend",
		json!({ "query": { "1": 5.0, "01": 0.5 }, "strategy": "nmf", "k": 2 }),
	);
	assert_eq!(err["code"], -32602);
	assert_eq!(err["data"]["recommendCode"], "RECOMMEND_INVALID_REQUEST");
}

#[test]
fn non_positive_k_is_rejected() {
	let (_dir, mut proc) = spawn_initialized();
	for k in [0, -1] {
		let err = proc.call_err(
			"recommend",
			json!({ "query": { "1": 4.0 }, "strategy": "nmf", "k": k }),
		);
		assert_eq!(err["data"]["recommendCode"], "RECOMMEND_INVALID_K");
	}
}

#[test]
fn unknown_strategy_is_rejected() {
	let (_dir, mut proc) = spawn_initialized();
	let err = proc.call_err(
		"recommend",
		json!({ "query": { "1": 4.0 }, "strategy": "invalid_method", "k": 2 }),
	);
	assert_eq!(err["data"]["recommendCode"], "RECOMMEND_UNKNOWN_STRATEGY");
}

#[test]
fn out_of_range_rating_is_rejected() {
	let (_dir, mut proc) = spawn_initialized();
	let err = proc.call_err(
		"recommend",
		json!({ "query": { "1": 7.5 }, "strategy": "nmf", "k": 2 }),
	);
	assert_eq!(err["data"]["recommendCode"], "RECOMMEND_RATING_OUT_OF_RANGE");
}

#[test]
fn malformed_params_are_invalid_params() {
	let (_dir, mut proc) = spawn_initialized();
	let err = proc.call_err("recommend", json!({ "query": { "Bambi": 4.0 } }));
	assert_eq!(err["code"], -32602);
	let err = proc.call_err("recommend", json!({ "query": [1, 2] }));
	assert_eq!(err["code"], -32602);
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[test]
fn catalog_titles_tolerate_missing() {
	let (_dir, mut proc) = spawn_initialized();
	let result = proc.call("catalog/titles", json!({ "ids": [4, 5, 42] }));
	assert_eq!(result["titles"], json!(["Inside Man (2006)", null, null]));
}

#[test]
fn catalog_items_are_listed_by_title() {
	let (_dir, mut proc) = spawn_initialized();
	let result = proc.call("catalog/items", json!({}));
	let items = result["items"].as_array().unwrap();
	assert_eq!(items.len(), 5);
	assert_eq!(items[0], json!({ "id": 3, "title": "Bambi (1942)" }));
	assert_eq!(items[4], json!({ "id": 5, "title": null }));
}
