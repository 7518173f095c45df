use std::{
	collections::HashMap,
	sync::{Arc, PoisonError, RwLock},
	time::Duration,
};

use time::{OffsetDateTime, PrimitiveDateTime};

use sieve_domain::{AssetBundle, ValidationOutcome, Verdict};

pub trait Clock
where
	Self: Send + Sync,
{
	fn now(&self) -> OffsetDateTime;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TtlPolicy {
	pub complete: Duration,
	pub incomplete: Duration,
	pub transient: Duration,
	/// Keep serving an expired incomplete verdict for `stale_grace` instead of re-fetching.
	pub honor_stale_incomplete: bool,
	pub stale_grace: Duration,
}
impl TtlPolicy {
	pub fn from_config(cfg: &sieve_config::Cache) -> Self {
		Self {
			complete: Duration::from_secs(cfg.complete_ttl_secs),
			incomplete: Duration::from_secs(cfg.incomplete_ttl_secs),
			transient: Duration::from_secs(cfg.transient_ttl_secs),
			honor_stale_incomplete: cfg.honor_stale_incomplete,
			stale_grace: Duration::from_secs(cfg.stale_grace_secs),
		}
	}

	pub fn ttl_for(&self, outcome: &ValidationOutcome) -> Duration {
		match outcome.verdict {
			Verdict::Complete => self.complete,
			Verdict::NotFound | Verdict::PartialAsset => self.incomplete,
			Verdict::Transient => self.transient,
		}
	}
}

#[derive(Clone, Debug)]
pub struct CacheEntry {
	pub outcome: ValidationOutcome,
	pub bundle: AssetBundle,
	/// Fingerprint of the candidate record the verdict was computed for.
	pub fingerprint: String,
	pub expires_at: OffsetDateTime,
}

#[derive(Clone, Debug)]
pub enum CacheLookup {
	Fresh(CacheEntry),
	/// Expired incomplete verdict still inside the grace period.
	StaleIncomplete(CacheEntry),
	Absent,
}

/// Process-wide memory of validation verdicts, keyed by candidate id.
///
/// Writes are compare-and-set on `evaluated_at`: an older outcome never replaces a newer one.
/// Expired entries are evicted lazily on lookup and by `sweep`.
pub struct ResolutionCache {
	entries: RwLock<HashMap<String, CacheEntry>>,
	policy: TtlPolicy,
	clock: Arc<dyn Clock>,
}
impl ResolutionCache {
	pub fn new(policy: TtlPolicy, clock: Arc<dyn Clock>) -> Self {
		Self { entries: RwLock::new(HashMap::new()), policy, clock }
	}

	pub fn from_config(cfg: &sieve_config::Cache) -> Self {
		Self::new(TtlPolicy::from_config(cfg), Arc::new(SystemClock))
	}

	pub fn policy(&self) -> &TtlPolicy {
		&self.policy
	}

	pub fn now(&self) -> OffsetDateTime {
		self.clock.now()
	}

	pub fn lookup(&self, candidate_id: &str, fingerprint: &str) -> CacheLookup {
		let now = self.now();
		let found = {
			let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);

			entries.get(candidate_id).cloned()
		};
		let Some(entry) = found else { return CacheLookup::Absent };

		if entry.fingerprint != fingerprint {
			tracing::debug!(candidate_id, "Cached verdict belongs to an older catalog record.");
			self.evict_if(candidate_id, |current| current.fingerprint != fingerprint);

			return CacheLookup::Absent;
		}
		if now < entry.expires_at {
			return CacheLookup::Fresh(entry);
		}
		if self.within_grace(&entry, now) {
			return CacheLookup::StaleIncomplete(entry);
		}

		self.evict_if(candidate_id, |current| !self.is_live(current, now));

		CacheLookup::Absent
	}

	/// The unexpired entry for `candidate_id`, regardless of fingerprint.
	pub fn get(&self, candidate_id: &str) -> Option<CacheEntry> {
		let now = self.now();
		let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);

		entries.get(candidate_id).filter(|entry| now < entry.expires_at).cloned()
	}

	/// Stores an outcome unless a newer one is already cached. Returns whether it was stored.
	pub fn put(
		&self,
		outcome: ValidationOutcome,
		bundle: AssetBundle,
		fingerprint: String,
		ttl: Duration,
	) -> bool {
		let expires_at = expiry(self.now(), ttl);
		let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

		if let Some(existing) = entries.get(&outcome.candidate_id)
			&& existing.outcome.evaluated_at > outcome.evaluated_at
		{
			tracing::debug!(
				candidate_id = %outcome.candidate_id,
				"Discarded an outcome older than the cached one."
			);

			return false;
		}

		entries.insert(
			outcome.candidate_id.clone(),
			CacheEntry { outcome, bundle, fingerprint, expires_at },
		);

		true
	}

	pub fn remove(&self, candidate_id: &str) -> Option<CacheEntry> {
		let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

		entries.remove(candidate_id)
	}

	/// Drops every entry that lookups would no longer return. Returns the number removed.
	pub fn sweep(&self) -> usize {
		let now = self.now();
		let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
		let before = entries.len();

		entries.retain(|_, entry| self.is_live(entry, now));

		before - entries.len()
	}

	pub fn len(&self) -> usize {
		self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn is_live(&self, entry: &CacheEntry, now: OffsetDateTime) -> bool {
		now < entry.expires_at || self.within_grace(entry, now)
	}

	fn within_grace(&self, entry: &CacheEntry, now: OffsetDateTime) -> bool {
		self.policy.honor_stale_incomplete
			&& !entry.outcome.is_complete
			&& now < expiry(entry.expires_at, self.policy.stale_grace)
	}

	fn evict_if<F>(&self, candidate_id: &str, predicate: F)
	where
		F: Fn(&CacheEntry) -> bool,
	{
		let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

		if entries.get(candidate_id).map(&predicate).unwrap_or(false) {
			entries.remove(candidate_id);
		}
	}
}

fn expiry(from: OffsetDateTime, ttl: Duration) -> OffsetDateTime {
	time::Duration::try_from(ttl)
		.ok()
		.and_then(|ttl| from.checked_add(ttl))
		.unwrap_or_else(|| PrimitiveDateTime::MAX.assume_utc())
}

#[cfg(test)]
mod tests {
	use std::sync::Mutex;

	use time::macros::datetime;

	use super::*;
	use sieve_domain::FetchOutcome;

	struct FixedClock(Mutex<OffsetDateTime>);
	impl FixedClock {
		fn advance(&self, by: Duration) {
			let mut now = self.0.lock().unwrap_or_else(PoisonError::into_inner);

			*now += by;
		}
	}
	impl Clock for FixedClock {
		fn now(&self) -> OffsetDateTime {
			*self.0.lock().unwrap_or_else(PoisonError::into_inner)
		}
	}

	fn policy(honor_stale: bool) -> TtlPolicy {
		TtlPolicy {
			complete: Duration::from_secs(600),
			incomplete: Duration::from_secs(300),
			transient: Duration::from_secs(30),
			honor_stale_incomplete: honor_stale,
			stale_grace: Duration::from_secs(if honor_stale { 60 } else { 0 }),
		}
	}

	fn cache(honor_stale: bool) -> (ResolutionCache, Arc<FixedClock>) {
		let clock = Arc::new(FixedClock(Mutex::new(datetime!(2026-03-01 08:00 UTC))));

		(ResolutionCache::new(policy(honor_stale), clock.clone()), clock)
	}

	fn outcome(id: &str, verdict: Verdict, at: OffsetDateTime) -> (ValidationOutcome, AssetBundle) {
		let bundle_outcome = match verdict {
			Verdict::Complete => FetchOutcome::Success,
			Verdict::PartialAsset => FetchOutcome::PartialSuccess,
			Verdict::NotFound => FetchOutcome::NotFound,
			Verdict::Transient => FetchOutcome::TimedOut,
		};
		let outcome = ValidationOutcome {
			candidate_id: id.to_string(),
			is_complete: verdict == Verdict::Complete,
			missing_kinds: Vec::new(),
			evaluated_at: at,
			verdict,
		};

		(outcome, AssetBundle::empty(id, bundle_outcome, at))
	}

	fn store(cache: &ResolutionCache, id: &str, verdict: Verdict, at: OffsetDateTime) -> bool {
		let (outcome, bundle) = outcome(id, verdict, at);
		let ttl = cache.policy().ttl_for(&outcome);

		cache.put(outcome, bundle, "fp".to_string(), ttl)
	}

	#[test]
	fn fresh_entries_are_returned_until_expiry() {
		let (cache, clock) = cache(false);
		let now = clock.now();

		assert!(store(&cache, "C1", Verdict::Complete, now));
		assert!(matches!(cache.lookup("C1", "fp"), CacheLookup::Fresh(_)));

		clock.advance(Duration::from_secs(601));

		assert!(matches!(cache.lookup("C1", "fp"), CacheLookup::Absent));
		assert!(cache.is_empty());
	}

	#[test]
	fn transient_verdicts_use_short_ttl() {
		let (cache, clock) = cache(false);
		let now = clock.now();

		store(&cache, "C1", Verdict::Transient, now);
		clock.advance(Duration::from_secs(31));

		assert!(cache.get("C1").is_none());
	}

	#[test]
	fn older_outcomes_never_replace_newer_ones() {
		let (cache, clock) = cache(false);
		let now = clock.now();
		let earlier = now - Duration::from_secs(5);

		assert!(store(&cache, "C1", Verdict::Complete, now));
		assert!(!store(&cache, "C1", Verdict::PartialAsset, earlier));

		let entry = cache.get("C1").expect("Entry must survive.");

		assert_eq!(entry.outcome.verdict, Verdict::Complete);
		assert!(store(&cache, "C1", Verdict::NotFound, now));
		assert_eq!(cache.get("C1").map(|entry| entry.outcome.verdict), Some(Verdict::NotFound));
	}

	#[test]
	fn fingerprint_mismatch_invalidates() {
		let (cache, clock) = cache(false);

		store(&cache, "C1", Verdict::Complete, clock.now());

		assert!(matches!(cache.lookup("C1", "other"), CacheLookup::Absent));
		assert!(cache.get("C1").is_none());
	}

	#[test]
	fn stale_incomplete_honored_within_grace() {
		let (cache, clock) = cache(true);
		let now = clock.now();

		store(&cache, "C1", Verdict::PartialAsset, now);
		store(&cache, "C2", Verdict::Complete, now);
		clock.advance(Duration::from_secs(310));

		assert!(matches!(cache.lookup("C1", "fp"), CacheLookup::StaleIncomplete(_)));
		assert!(matches!(cache.lookup("C2", "fp"), CacheLookup::Fresh(_)));

		clock.advance(Duration::from_secs(300));

		assert!(matches!(cache.lookup("C1", "fp"), CacheLookup::Absent));
		assert!(matches!(cache.lookup("C2", "fp"), CacheLookup::Absent));
	}

	#[test]
	fn sweep_removes_expired_entries() {
		let (cache, clock) = cache(false);
		let now = clock.now();

		store(&cache, "C1", Verdict::Complete, now);
		store(&cache, "C2", Verdict::Transient, now);
		clock.advance(Duration::from_secs(60));

		assert_eq!(cache.sweep(), 1);
		assert_eq!(cache.len(), 1);
		assert!(cache.remove("C1").is_some());
	}
}
