use std::{collections::BTreeMap, path::PathBuf};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Asset kinds every usable candidate must carry.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct AssetManifest {
	required: Vec<String>,
}
impl AssetManifest {
	pub fn new<I, S>(kinds: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut required: Vec<String> = Vec::new();

		for kind in kinds {
			let kind: String = kind.into();
			let kind = kind.trim().to_lowercase();

			if !kind.is_empty() && !required.contains(&kind) {
				required.push(kind);
			}
		}

		Self { required }
	}

	pub fn from_config(cfg: &sieve_config::Manifest) -> Self {
		Self::new(cfg.required.iter().map(String::as_str))
	}

	pub fn required(&self) -> &[String] {
		&self.required
	}
}
impl Default for AssetManifest {
	fn default() -> Self {
		Self::from_config(&sieve_config::Manifest::default())
	}
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchOutcome {
	Success,
	PartialSuccess,
	NotFound,
	TimedOut,
	TransportError,
}
impl FetchOutcome {
	pub fn is_transient(self) -> bool {
		matches!(self, Self::TimedOut | Self::TransportError)
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Success => "success",
			Self::PartialSuccess => "partial_success",
			Self::NotFound => "not_found",
			Self::TimedOut => "timed_out",
			Self::TransportError => "transport_error",
		}
	}
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct AssetBundle {
	pub candidate_id: String,
	/// Asset kind to artifact locations.
	pub artifacts: BTreeMap<String, Vec<PathBuf>>,
	pub outcome: FetchOutcome,
	#[serde(with = "crate::time_serde")]
	pub fetched_at: OffsetDateTime,
	/// Directory holding the artifacts, when the fetch produced one.
	pub root: Option<PathBuf>,
	pub detail: Option<String>,
}
impl AssetBundle {
	pub fn empty(
		candidate_id: impl Into<String>,
		outcome: FetchOutcome,
		fetched_at: OffsetDateTime,
	) -> Self {
		Self {
			candidate_id: candidate_id.into(),
			artifacts: BTreeMap::new(),
			outcome,
			fetched_at,
			root: None,
			detail: None,
		}
	}

	pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
		self.detail = Some(detail.into());

		self
	}

	fn has_kind(&self, kind: &str) -> bool {
		self.artifacts
			.get(kind)
			.map(|locations| locations.iter().any(|path| !path.as_os_str().is_empty()))
			.unwrap_or(false)
	}
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
	Complete,
	NotFound,
	PartialAsset,
	Transient,
}
impl Verdict {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Complete => "complete",
			Self::NotFound => "not_found",
			Self::PartialAsset => "partial_asset",
			Self::Transient => "transient",
		}
	}
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ValidationOutcome {
	pub candidate_id: String,
	pub is_complete: bool,
	pub missing_kinds: Vec<String>,
	#[serde(with = "crate::time_serde")]
	pub evaluated_at: OffsetDateTime,
	pub verdict: Verdict,
}

/// Decides completeness of a bundle. The result depends only on the arguments, so validating the
/// same bundle twice yields the same outcome.
pub fn validate(bundle: &AssetBundle, manifest: &AssetManifest) -> ValidationOutcome {
	let all_missing = || manifest.required().to_vec();
	let (verdict, missing_kinds) = match bundle.outcome {
		FetchOutcome::NotFound => (Verdict::NotFound, all_missing()),
		FetchOutcome::TimedOut | FetchOutcome::TransportError => (Verdict::Transient, all_missing()),
		FetchOutcome::Success | FetchOutcome::PartialSuccess => {
			let missing = manifest
				.required()
				.iter()
				.filter(|kind| !bundle.has_kind(kind))
				.cloned()
				.collect::<Vec<_>>();

			if missing.is_empty() {
				(Verdict::Complete, missing)
			} else {
				(Verdict::PartialAsset, missing)
			}
		},
	};

	ValidationOutcome {
		candidate_id: bundle.candidate_id.clone(),
		is_complete: verdict == Verdict::Complete,
		missing_kinds,
		evaluated_at: bundle.fetched_at,
		verdict,
	}
}
