use std::{sync::Arc, time::Duration};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cache::ResolutionCache;

/// Periodically evicts expired cache entries until `shutdown` is cancelled.
pub fn spawn_sweeper(
	cache: Arc<ResolutionCache>,
	interval: Duration,
	shutdown: CancellationToken,
) -> JoinHandle<()> {
	let interval = interval.max(Duration::from_millis(1));

	tokio::spawn(async move {
		loop {
			tokio::select! {
				_ = shutdown.cancelled() => break,
				_ = tokio::time::sleep(interval) => {},
			}

			let removed = cache.sweep();

			if removed > 0 {
				tracing::debug!(removed, remaining = cache.len(), "Resolution cache swept.");
			}
		}

		tracing::debug!("Resolution cache sweeper stopped.");
	})
}
