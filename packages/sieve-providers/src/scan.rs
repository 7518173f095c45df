use std::{
	io::ErrorKind,
	path::{Path, PathBuf},
};

use time::OffsetDateTime;

use sieve_config::ArtifactSpec;
use sieve_domain::{AssetBundle, FetchOutcome};

/// Collects the artifacts found under `root` into a bundle.
///
/// A location is a non-empty regular file whose extension is accepted by the artifact spec.
/// Every kind present yields `Success`, some yield `PartialSuccess`, none yield `NotFound`.
pub async fn scan_artifacts(
	candidate_id: &str,
	root: &Path,
	specs: &[ArtifactSpec],
	fetched_at: OffsetDateTime,
) -> std::io::Result<AssetBundle> {
	let mut bundle = AssetBundle::empty(candidate_id, FetchOutcome::NotFound, fetched_at);
	let mut found = 0;

	for spec in specs {
		let locations = scan_kind(&root.join(&spec.dir), &spec.extensions).await?;

		if locations.is_empty() {
			continue;
		}

		found += 1;

		bundle.artifacts.entry(spec.kind.clone()).or_default().extend(locations);
	}

	bundle.outcome = if found == 0 {
		FetchOutcome::NotFound
	} else if found == specs.len() {
		FetchOutcome::Success
	} else {
		FetchOutcome::PartialSuccess
	};
	bundle.root = Some(root.to_path_buf());

	Ok(bundle)
}

async fn scan_kind(dir: &Path, extensions: &[String]) -> std::io::Result<Vec<PathBuf>> {
	let mut entries = match tokio::fs::read_dir(dir).await {
		Ok(entries) => entries,
		Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
		Err(err) => return Err(err),
	};
	let mut out = Vec::new();

	while let Some(entry) = entries.next_entry().await? {
		let path = entry.path();

		if !has_extension(&path, extensions) {
			continue;
		}

		let metadata = entry.metadata().await?;

		if metadata.is_file() && metadata.len() > 0 {
			out.push(path);
		}
	}

	out.sort();

	Ok(out)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
	let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else { return false };

	extensions.iter().any(|accepted| accepted.eq_ignore_ascii_case(ext))
}

#[cfg(test)]
mod tests {
	use std::path::Path;

	#[test]
	fn matches_extensions_case_insensitively() {
		let extensions = vec!["step".to_string(), "wrl".to_string()];

		assert!(super::has_extension(Path::new("a/b/C1.STEP"), &extensions));
		assert!(super::has_extension(Path::new("C1.wrl"), &extensions));
		assert!(!super::has_extension(Path::new("C1.kicad_mod"), &extensions));
		assert!(!super::has_extension(Path::new("README"), &extensions));
	}
}
