use std::{io::ErrorKind, path::Path, time::Duration};

use crate::Result;

/// Removes per-attempt output directories last modified more than `max_age` ago.
/// Returns the number of directories removed. A missing root is not an error.
pub async fn prune_output_root(root: &Path, max_age: Duration) -> Result<usize> {
	let mut entries = match tokio::fs::read_dir(root).await {
		Ok(entries) => entries,
		Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
		Err(err) => return Err(err.into()),
	};
	let mut removed = 0;

	while let Some(entry) = entries.next_entry().await? {
		let metadata = entry.metadata().await?;

		if !metadata.is_dir() {
			continue;
		}

		let age = metadata.modified()?.elapsed().unwrap_or_default();

		if age <= max_age {
			continue;
		}

		tokio::fs::remove_dir_all(entry.path()).await?;

		removed += 1;
	}

	tracing::info!(root = %root.display(), removed, "Pruned fetch output directories.");

	Ok(removed)
}
