use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::{Table, Value};

use sieve_config::{Config, Error};

const SAMPLE_CONFIG_TEMPLATE_TOML: &str = include_str!("fixtures/sample_config.template.toml");

fn sample_table() -> Table {
	toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.")
}

fn section<'a>(root: &'a mut Table, name: &str) -> &'a mut Table {
	root.get_mut(name)
		.and_then(Value::as_table_mut)
		.unwrap_or_else(|| panic!("Template config must include [{name}]."))
}

fn render(root: &Table) -> String {
	toml::to_string(root).expect("Failed to render template config.")
}

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("sieve_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn load_payload(payload: String) -> sieve_config::Result<Config> {
	let path = write_temp_config(payload);
	let result = sieve_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	result
}

fn expect_validation_error(root: &Table, expected: &str) {
	let err = load_payload(render(root)).expect_err("Expected a validation error.");
	let message = err.to_string();

	assert!(matches!(err, Error::Validation { .. }), "Unexpected error kind: {err:?}");
	assert!(message.contains(expected), "Unexpected error message: {message}");
}

#[test]
fn sample_config_loads() {
	let cfg = load_payload(render(&sample_table())).expect("Sample config must load.");

	assert_eq!(cfg.resolver.worker_pool_size, 10);
	assert_eq!(cfg.fetch.retry_budget, 1);
	assert_eq!(cfg.manifest.required, vec!["symbol", "footprint", "model"]);
	assert_eq!(cfg.cache.transient_ttl_secs, 300);

	let command = cfg.fetch.command.expect("Sample config must include [fetch.command].");

	assert_eq!(command.not_found_markers, vec!["not found".to_string()]);
	assert_eq!(command.not_found_exit_codes, vec![1]);
	assert_eq!(command.artifacts.len(), 3);
}

#[test]
fn optional_sections_fall_back_to_defaults() {
	let mut root = sample_table();

	root.remove("pagination");
	root.remove("ranking");
	root.remove("manifest");

	let cfg = load_payload(render(&root)).expect("Config without optional sections must load.");

	assert_eq!(cfg.pagination.default_limit, 20);
	assert_eq!(cfg.pagination.max_limit, 100);
	assert!(cfg.ranking.tier_bonus > cfg.ranking.preference_bonus);
	assert_eq!(cfg.manifest.required, vec!["symbol", "footprint", "model"]);
}

#[test]
fn normalizes_kinds_and_extensions() {
	let mut root = sample_table();

	section(&mut root, "manifest").insert(
		"required".to_string(),
		Value::Array(vec![
			Value::String(" Symbol ".to_string()),
			Value::String("FOOTPRINT".to_string()),
			Value::String("model".to_string()),
		]),
	);

	let fetch = section(&mut root, "fetch");
	let command = fetch
		.get_mut("command")
		.and_then(Value::as_table_mut)
		.expect("Template config must include [fetch.command].");
	let artifacts = command
		.get_mut("artifacts")
		.and_then(Value::as_array_mut)
		.expect("Template config must include artifacts.");
	let model = artifacts[2].as_table_mut().expect("Artifact entries must be tables.");

	model.insert(
		"extensions".to_string(),
		Value::Array(vec![Value::String(".STEP".to_string()), Value::String("wrl".to_string())]),
	);

	let cfg = load_payload(render(&root)).expect("Config must load after normalization.");
	let command = cfg.fetch.command.expect("Command must survive normalization.");

	assert_eq!(cfg.manifest.required, vec!["symbol", "footprint", "model"]);
	assert_eq!(command.artifacts[2].extensions, vec!["step".to_string(), "wrl".to_string()]);
}

#[test]
fn worker_pool_size_must_be_positive() {
	let mut root = sample_table();

	section(&mut root, "resolver").insert("worker_pool_size".to_string(), Value::Integer(0));

	expect_validation_error(&root, "resolver.worker_pool_size must be greater than zero.");
}

#[test]
fn overfetch_factor_must_be_at_least_one() {
	let mut root = sample_table();

	section(&mut root, "resolver").insert("overfetch_factor".to_string(), Value::Float(0.5));

	expect_validation_error(&root, "resolver.overfetch_factor must be a finite number");
}

#[test]
fn max_batches_must_be_positive() {
	let mut root = sample_table();

	section(&mut root, "resolver").insert("max_batches".to_string(), Value::Integer(0));

	expect_validation_error(&root, "resolver.max_batches must be greater than zero.");
}

#[test]
fn ranking_weights_must_be_non_negative() {
	let mut root = sample_table();

	section(&mut root, "ranking").insert("cost_weight".to_string(), Value::Float(-1.0));

	expect_validation_error(&root, "ranking.cost_weight must be zero or greater.");
}

#[test]
fn default_limit_must_fit_max_limit() {
	let mut root = sample_table();

	section(&mut root, "pagination").insert("default_limit".to_string(), Value::Integer(500));

	expect_validation_error(&root, "pagination.default_limit must be in the range");
}

#[test]
fn transient_ttl_must_not_exceed_incomplete_ttl() {
	let mut root = sample_table();

	section(&mut root, "cache").insert("transient_ttl_secs".to_string(), Value::Integer(7_200));

	expect_validation_error(
		&root,
		"cache.transient_ttl_secs must not exceed cache.incomplete_ttl_secs.",
	);
}

#[test]
fn stale_grace_requires_honoring_stale_verdicts() {
	let mut root = sample_table();

	section(&mut root, "cache").insert("stale_grace_secs".to_string(), Value::Integer(60));

	expect_validation_error(&root, "cache.stale_grace_secs requires");
}

#[test]
fn manifest_rejects_duplicate_kinds() {
	let mut root = sample_table();

	section(&mut root, "manifest").insert(
		"required".to_string(),
		Value::Array(vec![
			Value::String("symbol".to_string()),
			Value::String("Symbol".to_string()),
		]),
	);

	expect_validation_error(&root, "manifest.required lists \"symbol\" more than once.");
}

#[test]
fn command_must_cover_every_required_kind() {
	let mut root = sample_table();

	section(&mut root, "manifest").insert(
		"required".to_string(),
		Value::Array(vec![
			Value::String("symbol".to_string()),
			Value::String("datasheet".to_string()),
		]),
	);

	expect_validation_error(&root, "fetch.command.artifacts is missing required kind \"datasheet\".");
}

#[test]
fn command_args_must_reference_candidate_id() {
	let mut root = sample_table();
	let fetch = section(&mut root, "fetch");
	let command = fetch
		.get_mut("command")
		.and_then(Value::as_table_mut)
		.expect("Template config must include [fetch.command].");

	command.insert("args".to_string(), Value::Array(vec![Value::String("--full".to_string())]));

	expect_validation_error(&root, "fetch.command.args must reference {id}.");
}

#[test]
fn config_without_command_is_valid() {
	let mut root = sample_table();

	section(&mut root, "fetch").remove("command");

	let cfg = load_payload(render(&root)).expect("Config without a fetch command must load.");

	assert!(cfg.fetch.command.is_none());
}

#[test]
fn missing_file_reports_read_error() {
	let mut path = env::temp_dir();

	path.push("sieve_config_test_missing_file.toml");

	let err = sieve_config::load(&path).expect_err("Expected a read error.");

	assert!(matches!(err, Error::ReadConfig { .. }), "Unexpected error kind: {err:?}");
}

#[test]
fn malformed_toml_reports_parse_error() {
	let err = load_payload("[catalog\ndsn = 1".to_string()).expect_err("Expected a parse error.");

	assert!(matches!(err, Error::ParseConfig { .. }), "Unexpected error kind: {err:?}");
}

#[test]
fn validate_accepts_parsed_sample() {
	let cfg: Config = toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse sample.");

	sieve_config::validate(&cfg).expect("Sample config must validate.");
}
