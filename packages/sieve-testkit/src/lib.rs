mod error;

pub use error::{Error, Result};

use std::{
	collections::{BTreeMap, HashMap, VecDeque},
	env, fs,
	path::PathBuf,
	sync::{
		Arc, Mutex, PoisonError,
		atomic::{AtomicU64, AtomicUsize, Ordering},
	},
	time::{Duration, SystemTime, UNIX_EPOCH},
};

use time::OffsetDateTime;

use sieve_config::{Cache, Catalog, Config, Fetch, Manifest, Pagination, Ranking, Resolver};
use sieve_domain::{
	AssetBundle, AvailabilityTier, CatalogPage, FetchOutcome, FilterCriteria, Page, PartRecord,
	PriceTier,
};
use sieve_service::{AssetFetchPort, BoxFuture, CatalogPort, Clock};
use sieve_storage::memory::MemoryCatalog;

/// A configuration with small, deterministic limits and no fetch command.
pub fn test_config() -> Config {
	Config {
		catalog: Catalog {
			dsn: "sqlite::memory:".to_string(),
			pool_max_conns: 1,
			scan_page_size: 16,
			max_scan_candidates: 1_000,
		},
		pagination: Pagination::default(),
		ranking: Ranking::default(),
		resolver: Resolver {
			overfetch_factor: 1.0,
			worker_pool_size: 4,
			max_batches: 8,
			batch_deadline_ms: None,
			revalidate_incomplete: false,
		},
		fetch: Fetch {
			timeout_ms: 1_000,
			retry_budget: 0,
			backoff_base_ms: 10,
			backoff_max_ms: 100,
			command: None,
		},
		manifest: Manifest::default(),
		cache: Cache {
			complete_ttl_secs: 3_600,
			incomplete_ttl_secs: 600,
			transient_ttl_secs: 30,
			honor_stale_incomplete: false,
			stale_grace_secs: 0,
			sweep_interval_secs: 0,
		},
	}
}

/// A resistor part with a single price tier.
pub fn part(id: &str, tier: AvailabilityTier, stock: u64, unit_price: f64) -> PartRecord {
	PartRecord {
		id: id.to_string(),
		mfr_part: format!("MFR-{id}"),
		description: format!("Test resistor {id}"),
		manufacturer: "Acme".to_string(),
		category: "Resistors".to_string(),
		subcategory: "Chip Resistor - Surface Mount".to_string(),
		package: Some("0603".to_string()),
		tier,
		stock,
		price_tiers: vec![PriceTier { min_qty: 1, unit_price }],
		attributes: BTreeMap::new(),
	}
}

/// `count` basic parts ranked C1, C2, ... by strictly decreasing stock.
pub fn ranked_parts(count: usize) -> Vec<PartRecord> {
	(1..=count)
		.map(|n| part(&format!("C{n}"), AvailabilityTier::Basic, (10_000 - n * 10) as u64, 0.01))
		.collect()
}

pub fn memory_catalog(parts: Vec<PartRecord>) -> Result<Arc<MemoryCatalog>> {
	Ok(Arc::new(MemoryCatalog::new(parts)?))
}

pub fn temp_dir(label: &str) -> Result<PathBuf> {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map_err(|err| Error::Message(format!("System time is before the epoch: {err}.")))?
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let mut path = env::temp_dir();

	path.push(format!("sieve_{label}_{nanos}_{}_{ordinal}", std::process::id()));

	fs::create_dir_all(&path)?;

	Ok(path)
}

/// A clock that only moves when told to.
pub struct ManualClock {
	now: Mutex<OffsetDateTime>,
}
impl ManualClock {
	pub fn new(start: OffsetDateTime) -> Arc<Self> {
		Arc::new(Self { now: Mutex::new(start) })
	}

	pub fn advance(&self, by: Duration) {
		let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);

		*now += by;
	}

	pub fn set(&self, at: OffsetDateTime) {
		*self.now.lock().unwrap_or_else(PoisonError::into_inner) = at;
	}
}
impl Clock for ManualClock {
	fn now(&self) -> OffsetDateTime {
		*self.now.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

/// One scripted fetch attempt.
#[derive(Clone, Debug)]
pub struct FetchStep {
	pub outcome: FetchOutcome,
	pub kinds: Vec<String>,
	pub delay: Duration,
}
impl FetchStep {
	pub fn complete() -> Self {
		Self::with_kinds(FetchOutcome::Success, &["symbol", "footprint", "model"])
	}

	pub fn partial(kinds: &[&str]) -> Self {
		Self::with_kinds(FetchOutcome::PartialSuccess, kinds)
	}

	pub fn not_found() -> Self {
		Self::with_kinds(FetchOutcome::NotFound, &[])
	}

	pub fn transport_error() -> Self {
		Self::with_kinds(FetchOutcome::TransportError, &[])
	}

	/// Never finishes on its own; the caller's timeout or abort ends it.
	pub fn hang() -> Self {
		Self::complete().after(Duration::from_secs(86_400))
	}

	pub fn after(mut self, delay: Duration) -> Self {
		self.delay = delay;

		self
	}

	fn with_kinds(outcome: FetchOutcome, kinds: &[&str]) -> Self {
		Self {
			outcome,
			kinds: kinds.iter().map(|kind| kind.to_string()).collect(),
			delay: Duration::ZERO,
		}
	}
}

/// An asset fetcher driven by per-candidate scripts. Each call consumes the next step; the last
/// step repeats. Unscripted candidates use the default step.
pub struct ScriptedFetcher {
	default: FetchStep,
	scripts: Mutex<HashMap<String, VecDeque<FetchStep>>>,
	calls: Mutex<HashMap<String, usize>>,
	in_flight: AtomicUsize,
	max_in_flight: AtomicUsize,
}
impl ScriptedFetcher {
	pub fn new(default: FetchStep) -> Arc<Self> {
		Arc::new(Self {
			default,
			scripts: Mutex::new(HashMap::new()),
			calls: Mutex::new(HashMap::new()),
			in_flight: AtomicUsize::new(0),
			max_in_flight: AtomicUsize::new(0),
		})
	}

	pub fn script<I>(&self, candidate_id: &str, steps: I)
	where
		I: IntoIterator<Item = FetchStep>,
	{
		let mut scripts = self.scripts.lock().unwrap_or_else(PoisonError::into_inner);

		scripts.insert(candidate_id.to_string(), steps.into_iter().collect());
	}

	pub fn calls(&self, candidate_id: &str) -> usize {
		let calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);

		calls.get(candidate_id).copied().unwrap_or(0)
	}

	pub fn total_calls(&self) -> usize {
		self.calls.lock().unwrap_or_else(PoisonError::into_inner).values().sum()
	}

	/// Highest number of fetches observed running at once.
	pub fn max_in_flight(&self) -> usize {
		self.max_in_flight.load(Ordering::SeqCst)
	}

	fn next_step(&self, candidate_id: &str) -> FetchStep {
		{
			let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);

			*calls.entry(candidate_id.to_string()).or_default() += 1;
		}

		let mut scripts = self.scripts.lock().unwrap_or_else(PoisonError::into_inner);

		match scripts.get_mut(candidate_id) {
			Some(steps) if steps.len() > 1 =>
				steps.pop_front().unwrap_or_else(|| self.default.clone()),
			Some(steps) => steps.front().cloned().unwrap_or_else(|| self.default.clone()),
			None => self.default.clone(),
		}
	}
}
impl AssetFetchPort for ScriptedFetcher {
	fn fetch<'a>(&'a self, candidate_id: &'a str, _timeout: Duration) -> BoxFuture<'a, AssetBundle> {
		Box::pin(async move {
			let step = self.next_step(candidate_id);
			let _guard = InFlight::enter(&self.in_flight, &self.max_in_flight);

			if !step.delay.is_zero() {
				tokio::time::sleep(step.delay).await;
			}

			let mut bundle =
				AssetBundle::empty(candidate_id, step.outcome, OffsetDateTime::now_utc());
			let root = PathBuf::from("/bundles").join(candidate_id);

			for kind in step.kinds {
				let path = root.join(format!("{candidate_id}.{kind}"));

				bundle.artifacts.insert(kind, vec![path]);
			}

			bundle.root = Some(root);

			bundle
		})
	}
}

struct InFlight<'a> {
	current: &'a AtomicUsize,
}
impl<'a> InFlight<'a> {
	fn enter(current: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
		let now = current.fetch_add(1, Ordering::SeqCst) + 1;

		peak.fetch_max(now, Ordering::SeqCst);

		Self { current }
	}
}
impl Drop for InFlight<'_> {
	fn drop(&mut self) {
		self.current.fetch_sub(1, Ordering::SeqCst);
	}
}

/// A catalog whose every query fails.
pub struct FailingCatalog {
	pub message: String,
}
impl CatalogPort for FailingCatalog {
	fn query<'a>(
		&'a self,
		_criteria: &'a FilterCriteria,
		_page: Page,
	) -> BoxFuture<'a, sieve_service::Result<CatalogPage>> {
		Box::pin(async move {
			Err(sieve_service::Error::CatalogUnavailable { message: self.message.clone() })
		})
	}

	fn get<'a>(&'a self, _id: &'a str) -> BoxFuture<'a, sieve_service::Result<Option<PartRecord>>> {
		Box::pin(async move {
			Err(sieve_service::Error::CatalogUnavailable { message: self.message.clone() })
		})
	}
}
