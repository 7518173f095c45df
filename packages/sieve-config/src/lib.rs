mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	ArtifactSpec, Cache, Catalog, Config, Fetch, FetchCommand, Manifest, Pagination, Ranking,
	Resolver,
};

use std::{collections::HashSet, fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.catalog.dsn.trim().is_empty() {
		return Err(Error::Validation { message: "catalog.dsn must be non-empty.".to_string() });
	}
	if cfg.catalog.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "catalog.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.catalog.scan_page_size == 0 {
		return Err(Error::Validation {
			message: "catalog.scan_page_size must be greater than zero.".to_string(),
		});
	}
	if cfg.catalog.max_scan_candidates == 0 {
		return Err(Error::Validation {
			message: "catalog.max_scan_candidates must be greater than zero.".to_string(),
		});
	}
	if cfg.pagination.max_limit == 0 {
		return Err(Error::Validation {
			message: "pagination.max_limit must be greater than zero.".to_string(),
		});
	}
	if cfg.pagination.default_limit == 0 || cfg.pagination.default_limit > cfg.pagination.max_limit
	{
		return Err(Error::Validation {
			message: "pagination.default_limit must be in the range 1-pagination.max_limit."
				.to_string(),
		});
	}

	for (label, weight) in [
		("ranking.tier_bonus", cfg.ranking.tier_bonus),
		("ranking.stock_weight", cfg.ranking.stock_weight),
		("ranking.cost_weight", cfg.ranking.cost_weight),
		("ranking.preference_bonus", cfg.ranking.preference_bonus),
	] {
		if !weight.is_finite() {
			return Err(Error::Validation { message: format!("{label} must be a finite number.") });
		}
		if weight < 0.0 {
			return Err(Error::Validation { message: format!("{label} must be zero or greater.") });
		}
	}

	if !cfg.resolver.overfetch_factor.is_finite() || cfg.resolver.overfetch_factor < 1.0 {
		return Err(Error::Validation {
			message: "resolver.overfetch_factor must be a finite number of at least 1.0."
				.to_string(),
		});
	}
	if cfg.resolver.worker_pool_size == 0 {
		return Err(Error::Validation {
			message: "resolver.worker_pool_size must be greater than zero.".to_string(),
		});
	}
	if cfg.resolver.max_batches == 0 {
		return Err(Error::Validation {
			message: "resolver.max_batches must be greater than zero.".to_string(),
		});
	}
	if let Some(deadline) = cfg.resolver.batch_deadline_ms
		&& deadline == 0
	{
		return Err(Error::Validation {
			message: "resolver.batch_deadline_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.fetch.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "fetch.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.fetch.backoff_max_ms < cfg.fetch.backoff_base_ms {
		return Err(Error::Validation {
			message: "fetch.backoff_max_ms must be greater than or equal to fetch.backoff_base_ms."
				.to_string(),
		});
	}
	if let Some(command) = cfg.fetch.command.as_ref() {
		validate_command(command, &cfg.manifest)?;
	}

	validate_manifest(&cfg.manifest)?;

	if cfg.cache.complete_ttl_secs == 0 {
		return Err(Error::Validation {
			message: "cache.complete_ttl_secs must be greater than zero.".to_string(),
		});
	}
	if cfg.cache.incomplete_ttl_secs == 0 {
		return Err(Error::Validation {
			message: "cache.incomplete_ttl_secs must be greater than zero.".to_string(),
		});
	}
	if cfg.cache.transient_ttl_secs == 0 {
		return Err(Error::Validation {
			message: "cache.transient_ttl_secs must be greater than zero.".to_string(),
		});
	}
	if cfg.cache.transient_ttl_secs > cfg.cache.incomplete_ttl_secs {
		return Err(Error::Validation {
			message: "cache.transient_ttl_secs must not exceed cache.incomplete_ttl_secs."
				.to_string(),
		});
	}
	if cfg.cache.stale_grace_secs > 0 && !cfg.cache.honor_stale_incomplete {
		return Err(Error::Validation {
			message: "cache.stale_grace_secs requires cache.honor_stale_incomplete to be true."
				.to_string(),
		});
	}

	Ok(())
}

fn validate_manifest(manifest: &Manifest) -> Result<()> {
	if manifest.required.is_empty() {
		return Err(Error::Validation {
			message: "manifest.required must be non-empty.".to_string(),
		});
	}

	let mut seen = HashSet::new();

	for kind in &manifest.required {
		if kind.is_empty() {
			return Err(Error::Validation {
				message: "manifest.required entries must be non-empty.".to_string(),
			});
		}
		if !seen.insert(kind.as_str()) {
			return Err(Error::Validation {
				message: format!("manifest.required lists {kind:?} more than once."),
			});
		}
	}

	Ok(())
}

fn validate_command(command: &FetchCommand, manifest: &Manifest) -> Result<()> {
	if command.program.trim().is_empty() {
		return Err(Error::Validation {
			message: "fetch.command.program must be non-empty.".to_string(),
		});
	}
	if !command.args.iter().any(|arg| arg.contains("{id}")) {
		return Err(Error::Validation {
			message: "fetch.command.args must reference {id}.".to_string(),
		});
	}
	if command.output_root.as_os_str().is_empty() {
		return Err(Error::Validation {
			message: "fetch.command.output_root must be non-empty.".to_string(),
		});
	}

	for artifact in &command.artifacts {
		if artifact.extensions.is_empty() {
			return Err(Error::Validation {
				message: format!(
					"fetch.command.artifacts for kind {:?} must list at least one extension.",
					artifact.kind
				),
			});
		}
		if artifact.dir.is_absolute() {
			return Err(Error::Validation {
				message: format!(
					"fetch.command.artifacts for kind {:?} must use a relative dir.",
					artifact.kind
				),
			});
		}
	}
	for kind in &manifest.required {
		if !command.artifacts.iter().any(|artifact| &artifact.kind == kind) {
			return Err(Error::Validation {
				message: format!("fetch.command.artifacts is missing required kind {kind:?}."),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	for kind in &mut cfg.manifest.required {
		*kind = kind.trim().to_ascii_lowercase();
	}

	if let Some(command) = cfg.fetch.command.as_mut() {
		for artifact in &mut command.artifacts {
			artifact.kind = artifact.kind.trim().to_ascii_lowercase();

			for ext in &mut artifact.extensions {
				*ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
			}
		}

		command.not_found_markers.retain(|marker| !marker.trim().is_empty());

		for marker in &mut command.not_found_markers {
			*marker = marker.to_lowercase();
		}
	}
	if cfg.resolver.batch_deadline_ms == Some(0) {
		cfg.resolver.batch_deadline_ms = None;
	}
}
