use std::{sync::Arc, time::Duration};

use sieve_domain::{AssetBundle, AssetManifest, CandidateRecord, FetchOutcome, ValidationOutcome};

use crate::{AssetFetchPort, cache::ResolutionCache};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchPolicy {
	pub timeout: Duration,
	/// Extra attempts granted to transient failures.
	pub retry_budget: u32,
	pub backoff_base: Duration,
	pub backoff_max: Duration,
}
impl FetchPolicy {
	pub fn from_config(cfg: &sieve_config::Fetch) -> Self {
		Self {
			timeout: Duration::from_millis(cfg.timeout_ms),
			retry_budget: cfg.retry_budget,
			backoff_base: Duration::from_millis(cfg.backoff_base_ms),
			backoff_max: Duration::from_millis(cfg.backoff_max_ms),
		}
	}
}

/// Retry bookkeeping for one validation job. Delays double from the base and are capped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryState {
	attempt: u32,
	budget: u32,
	next_delay: Duration,
	max_delay: Duration,
}
impl RetryState {
	pub fn new(policy: &FetchPolicy) -> Self {
		Self {
			attempt: 1,
			budget: policy.retry_budget,
			next_delay: policy.backoff_base.min(policy.backoff_max),
			max_delay: policy.backoff_max,
		}
	}

	/// One-based number of the attempt in progress.
	pub fn attempt(&self) -> u32 {
		self.attempt
	}

	pub fn next_delay(&self) -> Duration {
		self.next_delay
	}

	pub fn exhausted(&self) -> bool {
		self.attempt > self.budget
	}

	/// Records a transient failure. Returns the delay before the next attempt, or `None` once the
	/// budget is spent.
	pub fn on_transient_failure(&mut self) -> Option<Duration> {
		if self.exhausted() {
			return None;
		}

		let delay = self.next_delay;

		self.attempt += 1;
		self.next_delay = delay.saturating_mul(2).min(self.max_delay);

		Some(delay)
	}
}

pub(crate) struct JobContext {
	pub(crate) fetcher: Arc<dyn AssetFetchPort>,
	pub(crate) cache: Arc<ResolutionCache>,
	pub(crate) manifest: AssetManifest,
	pub(crate) policy: FetchPolicy,
}

#[derive(Debug)]
pub(crate) struct JobReport {
	pub(crate) outcome: ValidationOutcome,
	pub(crate) bundle: AssetBundle,
	pub(crate) attempts: u32,
}

/// Fetches, validates and caches one candidate. Transient failures are retried in place; whatever
/// the final attempt produced is cached under the TTL of its verdict.
pub(crate) async fn run_job(ctx: &JobContext, candidate: &CandidateRecord) -> JobReport {
	let candidate_id = candidate.id.as_str();
	let mut retry = RetryState::new(&ctx.policy);

	loop {
		let bundle = fetch_once(ctx, candidate_id).await;

		if bundle.outcome.is_transient()
			&& let Some(delay) = retry.on_transient_failure()
		{
			tracing::debug!(
				candidate_id,
				outcome = bundle.outcome.as_str(),
				next_attempt = retry.attempt(),
				delay_ms = delay.as_millis() as u64,
				"Retrying transient fetch failure."
			);
			tokio::time::sleep(delay).await;

			continue;
		}

		let outcome = sieve_domain::validate(&bundle, &ctx.manifest);
		let ttl = ctx.cache.policy().ttl_for(&outcome);
		let stored = ctx.cache.put(
			outcome.clone(),
			bundle.clone(),
			candidate.fingerprint().to_string(),
			ttl,
		);

		tracing::debug!(
			candidate_id,
			verdict = outcome.verdict.as_str(),
			attempts = retry.attempt(),
			stored,
			"Validation job finished."
		);

		return JobReport { outcome, bundle, attempts: retry.attempt() };
	}
}

async fn fetch_once(ctx: &JobContext, candidate_id: &str) -> AssetBundle {
	let started = ctx.cache.now();
	let timeout = ctx.policy.timeout;
	let mut bundle =
		match tokio::time::timeout(timeout, ctx.fetcher.fetch(candidate_id, timeout)).await {
			Ok(bundle) => bundle,
			Err(_) => AssetBundle::empty(candidate_id, FetchOutcome::TimedOut, started),
		};

	if bundle.candidate_id != candidate_id {
		tracing::warn!(
			candidate_id,
			returned = %bundle.candidate_id,
			"Fetch port returned a bundle for another candidate."
		);

		bundle = AssetBundle::empty(candidate_id, FetchOutcome::TransportError, started)
			.with_detail("Fetch port returned a bundle for another candidate.");
	}

	// evaluated_at is the attempt start.
	bundle.fetched_at = started;

	bundle
}
