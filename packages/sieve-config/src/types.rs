use std::path::PathBuf;

use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	pub catalog: Catalog,
	#[serde(default)]
	pub pagination: Pagination,
	#[serde(default)]
	pub ranking: Ranking,
	pub resolver: Resolver,
	pub fetch: Fetch,
	#[serde(default)]
	pub manifest: Manifest,
	pub cache: Cache,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Catalog {
	/// SQLite connection string, e.g. "sqlite://cache/parts.sqlite3?mode=ro".
	pub dsn: String,
	pub pool_max_conns: u32,
	/// Chunk size used when the ranking engine streams the catalog port.
	pub scan_page_size: u32,
	/// Number of highest-scoring records kept per resolution. Every match is still scored.
	pub max_scan_candidates: u32,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Pagination {
	pub default_limit: u32,
	pub max_limit: u32,
}
impl Default for Pagination {
	fn default() -> Self {
		Self { default_limit: 20, max_limit: 100 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Ranking {
	/// Added once per availability tier step when the caller prefers higher tiers.
	pub tier_bonus: f64,
	/// Multiplies ln(1 + quantity on hand).
	pub stock_weight: f64,
	/// Multiplies the unit cost of the first price tier.
	pub cost_weight: f64,
	/// Added once per satisfied optional preference.
	pub preference_bonus: f64,
}
impl Default for Ranking {
	fn default() -> Self {
		Self {
			tier_bonus: 1_000_000.0,
			stock_weight: 100.0,
			cost_weight: 10.0,
			preference_bonus: 5_000.0,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct Resolver {
	pub overfetch_factor: f64,
	pub worker_pool_size: u32,
	pub max_batches: u32,
	pub batch_deadline_ms: Option<u64>,
	#[serde(default)]
	pub revalidate_incomplete: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Fetch {
	pub timeout_ms: u64,
	pub retry_budget: u32,
	pub backoff_base_ms: u64,
	pub backoff_max_ms: u64,
	pub command: Option<FetchCommand>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct FetchCommand {
	pub program: String,
	/// Arguments passed to the program. "{id}" and "{output}" are substituted per candidate.
	pub args: Vec<String>,
	pub output_root: PathBuf,
	#[serde(default = "default_not_found_markers")]
	pub not_found_markers: Vec<String>,
	#[serde(default = "default_not_found_exit_codes")]
	pub not_found_exit_codes: Vec<i32>,
	pub artifacts: Vec<ArtifactSpec>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ArtifactSpec {
	pub kind: String,
	/// Directory relative to the candidate output directory.
	#[serde(default = "default_artifact_dir")]
	pub dir: PathBuf,
	pub extensions: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Manifest {
	pub required: Vec<String>,
}
impl Default for Manifest {
	fn default() -> Self {
		Self { required: vec!["symbol".to_string(), "footprint".to_string(), "model".to_string()] }
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct Cache {
	pub complete_ttl_secs: u64,
	pub incomplete_ttl_secs: u64,
	pub transient_ttl_secs: u64,
	#[serde(default)]
	pub honor_stale_incomplete: bool,
	#[serde(default)]
	pub stale_grace_secs: u64,
	/// Zero disables the background sweep.
	#[serde(default)]
	pub sweep_interval_secs: u64,
}

fn default_not_found_markers() -> Vec<String> {
	vec!["not found".to_string()]
}

fn default_not_found_exit_codes() -> Vec<i32> {
	vec![1]
}

fn default_artifact_dir() -> PathBuf {
	PathBuf::from(".")
}
