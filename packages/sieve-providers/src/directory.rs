use std::{path::PathBuf, time::Duration};

use time::OffsetDateTime;

use sieve_config::ArtifactSpec;
use sieve_domain::{AssetBundle, FetchOutcome};

use crate::{command, scan};

/// Serves bundles from a pre-populated mirror laid out as `<root>/<candidate id>/...`.
#[derive(Clone, Debug)]
pub struct DirectoryFetcher {
	root: PathBuf,
	artifacts: Vec<ArtifactSpec>,
}
impl DirectoryFetcher {
	pub fn new(root: impl Into<PathBuf>, artifacts: Vec<ArtifactSpec>) -> Self {
		Self { root: root.into(), artifacts }
	}

	pub async fn fetch(&self, candidate_id: &str, timeout: Duration) -> AssetBundle {
		let fetched_at = OffsetDateTime::now_utc();

		if !command::is_safe_id(candidate_id) {
			return AssetBundle::empty(candidate_id, FetchOutcome::NotFound, fetched_at);
		}

		let dir = self.root.join(candidate_id);
		let scanned = scan::scan_artifacts(candidate_id, &dir, &self.artifacts, fetched_at);

		match tokio::time::timeout(timeout, scanned).await {
			Ok(Ok(bundle)) => bundle,
			Ok(Err(err)) => AssetBundle::empty(candidate_id, FetchOutcome::TransportError, fetched_at)
				.with_detail(err.to_string()),
			Err(_) => AssetBundle::empty(candidate_id, FetchOutcome::TimedOut, fetched_at),
		}
	}
}
