use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::{
	sync::Semaphore,
	task::{JoinError, JoinSet},
	time::Instant,
};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use sieve_domain::{AssetBundle, FilterCriteria, Page};

use crate::{
	Result, SieveService,
	cache::CacheLookup,
	fetch::{self, JobContext, JobReport},
	ranking::RankedCandidate,
};

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ResolveRequest {
	#[serde(default)]
	pub criteria: FilterCriteria,
	#[serde(default)]
	pub offset: usize,
	/// Falls back to `pagination.default_limit`; clamped to `[1, pagination.max_limit]`.
	pub limit: Option<usize>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ResolvedResult {
	pub candidate_id: String,
	pub rank: usize,
	pub score: f64,
	pub display: Map<String, Value>,
	pub bundle: AssetBundle,
	pub from_cache: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ResolveStatus {
	Filled,
	Exhausted,
	/// The ranked prefix ran out but the catalog holds more matches past the scan cap.
	ScanTruncated,
	BatchCapReached,
	CatalogUnavailable { message: String },
	Cancelled,
}
impl ResolveStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Filled => "filled",
			Self::Exhausted => "exhausted",
			Self::ScanTruncated => "scan_truncated",
			Self::BatchCapReached => "batch_cap_reached",
			Self::CatalogUnavailable { .. } => "catalog_unavailable",
			Self::Cancelled => "cancelled",
		}
	}
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ResolveStats {
	pub batches: u32,
	pub candidates_considered: usize,
	pub cache_hits_complete: usize,
	pub cache_hits_incomplete: usize,
	pub jobs_dispatched: usize,
	/// Jobs still pending when the batch deadline fired.
	pub jobs_timed_out: usize,
	/// Considered candidates that were not accepted, whether from cache or from a job.
	pub rejected: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct ResolveResponse {
	pub resolution_id: Uuid,
	pub results: Vec<ResolvedResult>,
	pub has_more: bool,
	/// The page is short because every matching candidate was considered.
	pub exhausted: bool,
	pub batch_cap_reached: bool,
	pub status: ResolveStatus,
	/// Rank position a follow-up request should start from.
	pub next_offset: usize,
	pub scan_truncated: bool,
	pub stats: ResolveStats,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResolverSettings {
	pub default_limit: usize,
	pub max_limit: usize,
	pub overfetch_factor: f64,
	pub worker_pool_size: usize,
	pub max_batches: u32,
	pub batch_deadline: Option<Duration>,
	pub revalidate_incomplete: bool,
}
impl ResolverSettings {
	pub fn from_config(cfg: &sieve_config::Config) -> Self {
		Self {
			default_limit: cfg.pagination.default_limit as usize,
			max_limit: cfg.pagination.max_limit as usize,
			overfetch_factor: cfg.resolver.overfetch_factor,
			worker_pool_size: cfg.resolver.worker_pool_size as usize,
			max_batches: cfg.resolver.max_batches,
			batch_deadline: cfg.resolver.batch_deadline_ms.map(Duration::from_millis),
			revalidate_incomplete: cfg.resolver.revalidate_incomplete,
		}
	}

	pub fn page(&self, offset: usize, limit: Option<usize>) -> Page {
		Page::new(offset, limit.unwrap_or(self.default_limit), self.max_limit)
	}

	/// Candidates pulled per batch: the limit scaled by the overfetch factor, never below it.
	pub fn batch_size(&self, limit: usize) -> usize {
		let scaled = (limit as f64 * self.overfetch_factor).ceil();
		let scaled = if scaled.is_finite() && scaled > 0.0 { scaled as usize } else { limit };

		scaled.max(limit).max(1)
	}
}

enum BatchOutcome {
	Collected(Vec<ResolvedResult>),
	Cancelled,
}

type Joined = std::result::Result<(usize, Option<JobReport>), JoinError>;

enum Step {
	Joined(Option<Joined>),
	Deadline,
	Cancelled,
}

impl SieveService {
	pub async fn resolve(&self, req: ResolveRequest) -> Result<ResolveResponse> {
		self.resolve_with_cancel(req, &CancellationToken::new()).await
	}

	/// Resolves a page of validated candidates. Cancelling `cancel` aborts outstanding jobs and
	/// returns what completed batches produced so far.
	pub async fn resolve_with_cancel(
		&self,
		req: ResolveRequest,
		cancel: &CancellationToken,
	) -> Result<ResolveResponse> {
		req.criteria.validate()?;

		let resolution_id = Uuid::new_v4();
		let span = tracing::info_span!("resolve", %resolution_id);

		Ok(self.run_resolution(resolution_id, req, cancel).instrument(span).await)
	}

	async fn run_resolution(
		&self,
		resolution_id: Uuid,
		req: ResolveRequest,
		cancel: &CancellationToken,
	) -> ResolveResponse {
		let page = self.settings.page(req.offset, req.limit);
		let mut stats = ResolveStats::default();
		let mut source = match self.engine.rank(self.catalog.as_ref(), &req.criteria).await {
			Ok(source) => source,
			Err(err) => {
				let message = err.to_string();

				tracing::warn!(error = %message, "Catalog query failed; resolution aborted.");

				return ResolveResponse {
					resolution_id,
					results: Vec::new(),
					has_more: false,
					exhausted: false,
					batch_cap_reached: false,
					status: ResolveStatus::CatalogUnavailable { message },
					next_offset: page.offset,
					scan_truncated: false,
					stats,
				};
			},
		};
		let batch_size = self.settings.batch_size(page.limit);
		let mut accepted: Vec<ResolvedResult> = Vec::new();

		source.seek(page.offset);

		let status = loop {
			if accepted.len() >= page.limit {
				break ResolveStatus::Filled;
			}
			if source.is_exhausted() {
				break if source.truncated() {
					ResolveStatus::ScanTruncated
				} else {
					ResolveStatus::Exhausted
				};
			}
			if stats.batches >= self.settings.max_batches {
				break ResolveStatus::BatchCapReached;
			}
			if cancel.is_cancelled() {
				break ResolveStatus::Cancelled;
			}

			let batch_start = source.position();
			let batch = source.next_batch(batch_size).to_vec();

			stats.batches += 1;

			match self.run_batch(&batch, cancel, &mut stats).await {
				BatchOutcome::Collected(found) => {
					tracing::info!(
						batch = stats.batches,
						first_rank = batch_start,
						size = batch.len(),
						accepted = found.len(),
						"Resolution batch collected."
					);

					accepted.extend(found);
				},
				BatchOutcome::Cancelled => {
					source.seek(batch_start);

					break ResolveStatus::Cancelled;
				},
			}
		};
		let overflow = accepted.len() > page.limit;

		accepted.truncate(page.limit);

		let next_offset = match (&status, accepted.last()) {
			(ResolveStatus::Filled, Some(last)) if overflow => last.rank + 1,
			_ => source.position(),
		};
		let has_more = next_offset < source.len() || source.truncated();
		let response = ResolveResponse {
			resolution_id,
			has_more,
			exhausted: status == ResolveStatus::Exhausted,
			batch_cap_reached: status == ResolveStatus::BatchCapReached,
			status,
			next_offset,
			scan_truncated: source.truncated(),
			stats,
			results: accepted,
		};

		tracing::info!(
			status = response.status.as_str(),
			results = response.results.len(),
			next_offset = response.next_offset,
			batches = response.stats.batches,
			jobs_dispatched = response.stats.jobs_dispatched,
			"Resolution finished."
		);

		response
	}

	async fn run_batch(
		&self,
		batch: &[RankedCandidate],
		cancel: &CancellationToken,
		stats: &mut ResolveStats,
	) -> BatchOutcome {
		let mut slots: Vec<Option<ResolvedResult>> = vec![None; batch.len()];
		let mut jobs = JoinSet::new();

		for (index, candidate) in batch.iter().enumerate() {
			stats.candidates_considered += 1;

			if let Some(verdict) = self.consult_cache(candidate, stats) {
				match verdict {
					Some(result) => slots[index] = Some(result),
					None => stats.rejected += 1,
				}

				continue;
			}

			stats.jobs_dispatched += 1;

			spawn_job(&mut jobs, index, candidate, self.jobs.clone(), self.workers.clone());
		}

		let deadline = self.settings.batch_deadline.map(|deadline| Instant::now() + deadline);

		loop {
			let step = tokio::select! {
				biased;
				_ = cancel.cancelled() => Step::Cancelled,
				_ = wait_for(deadline) => Step::Deadline,
				joined = jobs.join_next() => Step::Joined(joined),
			};

			match step {
				Step::Joined(None) => break,
				Step::Joined(Some(joined)) => absorb(batch, &mut slots, stats, joined),
				Step::Deadline => {
					// Jobs that finished before the deadline fired still count.
					for joined in drain_finished(&mut jobs) {
						absorb(batch, &mut slots, stats, joined);
					}

					let pending = jobs.len();

					jobs.abort_all();

					if pending > 0 {
						tracing::warn!(pending, "Batch deadline reached; aborting pending jobs.");
					}

					stats.jobs_timed_out += pending;
					stats.rejected += pending;

					break;
				},
				Step::Cancelled => {
					jobs.abort_all();

					tracing::info!(pending = jobs.len(), "Resolution cancelled.");

					return BatchOutcome::Cancelled;
				},
			}
		}

		BatchOutcome::Collected(slots.into_iter().flatten().collect())
	}

	/// `Some(Some(_))` accepts from cache, `Some(None)` rejects from cache, `None` needs a job.
	fn consult_cache(
		&self,
		candidate: &RankedCandidate,
		stats: &mut ResolveStats,
	) -> Option<Option<ResolvedResult>> {
		let record = &candidate.record;

		match self.cache.lookup(&record.id, record.fingerprint()) {
			CacheLookup::Fresh(entry) if entry.outcome.is_complete => {
				stats.cache_hits_complete += 1;

				Some(Some(resolved(candidate, entry.bundle, true)))
			},
			CacheLookup::Fresh(_) | CacheLookup::StaleIncomplete(_)
				if !self.settings.revalidate_incomplete =>
			{
				stats.cache_hits_incomplete += 1;

				Some(None)
			},
			_ => None,
		}
	}
}

fn spawn_job(
	jobs: &mut JoinSet<(usize, Option<JobReport>)>,
	index: usize,
	candidate: &RankedCandidate,
	ctx: Arc<JobContext>,
	workers: Arc<Semaphore>,
) {
	let record = candidate.record.clone();

	jobs.spawn(async move {
		let Ok(_permit) = workers.acquire_owned().await else {
			return (index, None);
		};

		(index, Some(fetch::run_job(&ctx, &record).await))
	});
}

fn absorb(
	batch: &[RankedCandidate],
	slots: &mut [Option<ResolvedResult>],
	stats: &mut ResolveStats,
	joined: Joined,
) {
	match joined {
		Ok((index, Some(report))) =>
			if report.outcome.is_complete {
				slots[index] = Some(resolved(&batch[index], report.bundle, false));
			} else {
				tracing::debug!(
					candidate_id = %batch[index].record.id,
					verdict = report.outcome.verdict.as_str(),
					missing = ?report.outcome.missing_kinds,
					attempts = report.attempts,
					"Candidate rejected."
				);

				stats.rejected += 1;
			},
		Ok((_, None)) => stats.rejected += 1,
		Err(err) => {
			tracing::error!(error = %err, "Validation job failed to complete.");

			stats.rejected += 1;
		},
	}
}

/// Removes every job that already finished, without waiting on the rest.
fn drain_finished<T>(jobs: &mut JoinSet<T>) -> Vec<std::result::Result<T, JoinError>>
where
	T: 'static,
{
	std::iter::from_fn(|| jobs.try_join_next()).collect()
}

fn resolved(candidate: &RankedCandidate, bundle: AssetBundle, from_cache: bool) -> ResolvedResult {
	ResolvedResult {
		candidate_id: candidate.record.id.clone(),
		rank: candidate.rank,
		score: candidate.score,
		display: candidate.record.display.clone(),
		bundle,
		from_cache,
	}
}

async fn wait_for(deadline: Option<Instant>) {
	match deadline {
		Some(at) => tokio::time::sleep_until(at).await,
		None => std::future::pending::<()>().await,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn settings(overfetch: f64) -> ResolverSettings {
		ResolverSettings {
			default_limit: 20,
			max_limit: 100,
			overfetch_factor: overfetch,
			worker_pool_size: 4,
			max_batches: 5,
			batch_deadline: None,
			revalidate_incomplete: false,
		}
	}

	#[test]
	fn batch_size_scales_with_overfetch() {
		assert_eq!(settings(1.0).batch_size(5), 5);
		assert_eq!(settings(1.5).batch_size(5), 8);
		assert_eq!(settings(2.0).batch_size(1), 2);
	}

	#[tokio::test]
	async fn drain_collects_only_finished_jobs() {
		let mut jobs = JoinSet::new();

		for n in 0..3 {
			jobs.spawn(async move { n });
		}

		jobs.spawn(std::future::pending::<i32>());

		for _ in 0..4 {
			tokio::task::yield_now().await;
		}

		let mut done = drain_finished(&mut jobs)
			.into_iter()
			.map(|joined| joined.expect("Job must not panic."))
			.collect::<Vec<_>>();

		done.sort_unstable();

		assert_eq!(done, vec![0, 1, 2]);
		assert_eq!(jobs.len(), 1);

		jobs.abort_all();
	}

	#[test]
	fn page_uses_default_and_clamps() {
		let settings = settings(1.0);

		assert_eq!(settings.page(3, None), Page { offset: 3, limit: 20 });
		assert_eq!(settings.page(0, Some(0)).limit, 1);
		assert_eq!(settings.page(0, Some(1_000)).limit, 100);
	}
}
