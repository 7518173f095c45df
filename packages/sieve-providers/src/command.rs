use std::{
	path::{Path, PathBuf},
	process::Stdio,
	time::Duration,
};

use time::OffsetDateTime;
use tokio::process::Command;
use uuid::Uuid;

use sieve_config::FetchCommand;
use sieve_domain::{AssetBundle, FetchOutcome};

use crate::{Error, Result, scan};

const DETAIL_MAX_CHARS: usize = 512;

/// Materializes asset bundles by running an external generator once per candidate.
///
/// Arguments may contain `{id}` and `{output}`, substituted with the candidate id and its output
/// directory. Every attempt writes into a fresh directory, so concurrent fetches of one candidate
/// never see each other's files. Failures never surface as errors; they become bundle outcomes.
/// Old attempt directories are left for [`crate::prune_output_root`].
#[derive(Clone, Debug)]
pub struct CommandFetcher {
	cfg: FetchCommand,
}
impl CommandFetcher {
	pub fn new(cfg: FetchCommand) -> Result<Self> {
		if cfg.program.trim().is_empty() {
			return Err(Error::InvalidConfig {
				message: "Fetch command program must be non-empty.".to_string(),
			});
		}
		if cfg.artifacts.is_empty() {
			return Err(Error::InvalidConfig {
				message: "Fetch command must declare at least one artifact.".to_string(),
			});
		}

		Ok(Self { cfg })
	}

	pub fn output_root(&self) -> &Path {
		&self.cfg.output_root
	}

	/// `<output_root>/<candidate_id>-<attempt>`.
	pub fn output_dir(&self, candidate_id: &str, attempt: Uuid) -> PathBuf {
		self.cfg.output_root.join(format!("{candidate_id}-{}", attempt.simple()))
	}

	pub async fn fetch(&self, candidate_id: &str, timeout: Duration) -> AssetBundle {
		let fetched_at = OffsetDateTime::now_utc();

		if !is_safe_id(candidate_id) {
			return AssetBundle::empty(candidate_id, FetchOutcome::TransportError, fetched_at)
				.with_detail("Candidate id is not usable as a directory name.");
		}

		let output = self.output_dir(candidate_id, Uuid::new_v4());

		if let Err(err) = tokio::fs::create_dir_all(&output).await {
			tracing::warn!(
				candidate_id,
				output = %output.display(),
				error = %err,
				"Failed to prepare fetch output directory."
			);

			return AssetBundle::empty(candidate_id, FetchOutcome::TransportError, fetched_at)
				.with_detail(err.to_string());
		}

		let mut command = Command::new(&self.cfg.program);

		command
			.args(self.render_args(candidate_id, &output))
			.stdin(Stdio::null())
			.stdout(Stdio::null())
			.stderr(Stdio::piped())
			.kill_on_drop(true);

		let output_result = match tokio::time::timeout(timeout, command.output()).await {
			Ok(result) => result,
			Err(_) => {
				tracing::debug!(
					candidate_id,
					timeout_ms = timeout.as_millis() as u64,
					"Fetch command timed out."
				);

				return AssetBundle::empty(candidate_id, FetchOutcome::TimedOut, fetched_at);
			},
		};
		let process = match output_result {
			Ok(process) => process,
			Err(err) => {
				tracing::warn!(candidate_id, error = %err, "Failed to spawn fetch command.");

				return AssetBundle::empty(candidate_id, FetchOutcome::TransportError, fetched_at)
					.with_detail(err.to_string());
			},
		};

		if !process.status.success() {
			let stderr = String::from_utf8_lossy(&process.stderr);
			let outcome = self.classify_failure(process.status.code(), &stderr);
			let detail = truncate_detail(stderr.trim());

			tracing::debug!(
				candidate_id,
				exit_code = process.status.code(),
				outcome = outcome.as_str(),
				"Fetch command failed."
			);

			return AssetBundle::empty(candidate_id, outcome, fetched_at).with_detail(detail);
		}

		match scan::scan_artifacts(candidate_id, &output, &self.cfg.artifacts, fetched_at).await {
			Ok(bundle) => bundle,
			Err(err) => AssetBundle::empty(candidate_id, FetchOutcome::TransportError, fetched_at)
				.with_detail(err.to_string()),
		}
	}

	fn render_args(&self, candidate_id: &str, output: &Path) -> Vec<String> {
		let output = output.to_string_lossy();

		self.cfg
			.args
			.iter()
			.map(|arg| arg.replace("{id}", candidate_id).replace("{output}", &output))
			.collect()
	}

	fn classify_failure(&self, code: Option<i32>, stderr: &str) -> FetchOutcome {
		let lowered = stderr.to_lowercase();
		let marked =
			self.cfg.not_found_markers.iter().any(|marker| lowered.contains(marker.as_str()));
		let coded = code.map(|code| self.cfg.not_found_exit_codes.contains(&code)).unwrap_or(false);

		if marked || coded { FetchOutcome::NotFound } else { FetchOutcome::TransportError }
	}
}

pub(crate) fn is_safe_id(candidate_id: &str) -> bool {
	!candidate_id.is_empty()
		&& candidate_id != "."
		&& candidate_id != ".."
		&& !candidate_id.contains(['/', '\\', '\0'])
}

fn truncate_detail(raw: &str) -> String {
	raw.chars().take(DETAIL_MAX_CHARS).collect()
}
