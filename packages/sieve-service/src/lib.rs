pub mod cache;
pub mod fetch;
pub mod lookup;
pub mod ranking;
pub mod resolve;
pub mod sweep;

mod error;

pub use cache::{CacheEntry, CacheLookup, Clock, ResolutionCache, SystemClock, TtlPolicy};
pub use error::{Error, Result};
pub use fetch::{FetchPolicy, RetryState};
pub use lookup::MAX_COMPARE;
pub use ranking::{RankedCandidate, RankedSource, RankingEngine};
pub use resolve::{
	ResolveRequest, ResolveResponse, ResolveStats, ResolveStatus, ResolvedResult, ResolverSettings,
};
pub use sweep::spawn_sweeper;

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use tokio::{sync::Semaphore, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use sieve_config::Config;
use sieve_domain::{
	AssetBundle, AssetManifest, CandidateRecord, CatalogPage, FilterCriteria, Page, PartRecord,
};
use sieve_providers::{CommandFetcher, DirectoryFetcher};
use sieve_storage::{db::Db, memory::MemoryCatalog, queries};

use crate::fetch::JobContext;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type Visit<'a> = &'a mut (dyn FnMut(CandidateRecord) + Send);

/// Read-only access to the part catalog. Implementations must be side-effect free and serve a
/// consistent snapshot for the duration of one resolution.
pub trait CatalogPort
where
	Self: Send + Sync,
{
	fn query<'a>(
		&'a self,
		criteria: &'a FilterCriteria,
		page: Page,
	) -> BoxFuture<'a, Result<CatalogPage>>;

	fn get<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<PartRecord>>>;

	/// Feeds every record matching `criteria` to `visit` exactly once, in no particular order.
	///
	/// The default walks `query` pages of `page_size`. Adapters that page by offset should
	/// override it with a single linear pass.
	fn scan<'a>(
		&'a self,
		criteria: &'a FilterCriteria,
		page_size: usize,
		visit: Visit<'a>,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let limit = page_size.max(1);
			let mut offset = 0;

			loop {
				let page = self.query(criteria, Page { offset, limit }).await?;
				let fetched = page.candidates.len();

				for record in page.candidates {
					visit(record);
				}

				if !page.has_more || fetched == 0 {
					return Ok(());
				}

				offset += fetched;
			}
		})
	}
}

/// Materializes the asset bundle of one candidate. Never fails; failures are bundle outcomes.
pub trait AssetFetchPort
where
	Self: Send + Sync,
{
	fn fetch<'a>(&'a self, candidate_id: &'a str, timeout: Duration) -> BoxFuture<'a, AssetBundle>;
}

pub struct SieveService {
	pub cfg: Config,
	pub(crate) settings: ResolverSettings,
	pub(crate) engine: RankingEngine,
	pub(crate) catalog: Arc<dyn CatalogPort>,
	pub(crate) cache: Arc<ResolutionCache>,
	pub(crate) jobs: Arc<JobContext>,
	pub(crate) workers: Arc<Semaphore>,
}
impl SieveService {
	pub fn new(cfg: Config, catalog: Arc<dyn CatalogPort>, fetcher: Arc<dyn AssetFetchPort>) -> Self {
		let cache = Arc::new(ResolutionCache::from_config(&cfg.cache));

		Self::with_cache(cfg, catalog, fetcher, cache)
	}

	pub fn with_cache(
		cfg: Config,
		catalog: Arc<dyn CatalogPort>,
		fetcher: Arc<dyn AssetFetchPort>,
		cache: Arc<ResolutionCache>,
	) -> Self {
		let settings = ResolverSettings::from_config(&cfg);
		let jobs = Arc::new(JobContext {
			fetcher,
			cache: cache.clone(),
			manifest: AssetManifest::from_config(&cfg.manifest),
			policy: FetchPolicy::from_config(&cfg.fetch),
		});
		let workers = Arc::new(Semaphore::new(settings.worker_pool_size.max(1)));

		Self { engine: RankingEngine::from_config(&cfg), settings, catalog, cache, jobs, workers, cfg }
	}

	/// Wires the SQLite catalog and the command fetcher named by the configuration.
	pub async fn connect(cfg: Config) -> Result<Self> {
		let Some(command) = cfg.fetch.command.clone() else {
			return Err(Error::InvalidRequest {
				message: "fetch.command is required to connect a service.".to_string(),
			});
		};
		let fetcher = CommandFetcher::new(command)?;
		let db = Db::connect(&cfg.catalog).await?;

		Ok(Self::new(cfg, Arc::new(db), Arc::new(fetcher)))
	}

	pub fn cache(&self) -> &Arc<ResolutionCache> {
		&self.cache
	}

	pub fn settings(&self) -> &ResolverSettings {
		&self.settings
	}

	/// Starts the background cache sweep when `cache.sweep_interval_secs` is non-zero.
	pub fn spawn_sweeper(&self, shutdown: CancellationToken) -> Option<JoinHandle<()>> {
		match self.cfg.cache.sweep_interval_secs {
			0 => None,
			secs => Some(sweep::spawn_sweeper(
				self.cache.clone(),
				Duration::from_secs(secs),
				shutdown,
			)),
		}
	}
}

impl CatalogPort for MemoryCatalog {
	fn query<'a>(
		&'a self,
		criteria: &'a FilterCriteria,
		page: Page,
	) -> BoxFuture<'a, Result<CatalogPage>> {
		Box::pin(async move { Ok(MemoryCatalog::query(self, criteria, page)?) })
	}

	fn get<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<PartRecord>>> {
		Box::pin(async move { Ok(MemoryCatalog::get(self, id).cloned()) })
	}

	fn scan<'a>(
		&'a self,
		criteria: &'a FilterCriteria,
		_page_size: usize,
		visit: Visit<'a>,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			for part in self.matching(criteria) {
				visit(part.to_candidate(criteria));
			}

			Ok(())
		})
	}
}

impl CatalogPort for Db {
	fn query<'a>(
		&'a self,
		criteria: &'a FilterCriteria,
		page: Page,
	) -> BoxFuture<'a, Result<CatalogPage>> {
		Box::pin(async move { Ok(queries::query_parts(self, criteria, page).await?) })
	}

	fn get<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<PartRecord>>> {
		Box::pin(async move { Ok(queries::get_part(self, id).await?) })
	}

	fn scan<'a>(
		&'a self,
		criteria: &'a FilterCriteria,
		page_size: usize,
		visit: Visit<'a>,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			queries::scan_parts(self, criteria, page_size, |part| {
				visit(part.to_candidate(criteria))
			})
			.await?;

			Ok(())
		})
	}
}

impl AssetFetchPort for CommandFetcher {
	fn fetch<'a>(&'a self, candidate_id: &'a str, timeout: Duration) -> BoxFuture<'a, AssetBundle> {
		Box::pin(CommandFetcher::fetch(self, candidate_id, timeout))
	}
}

impl AssetFetchPort for DirectoryFetcher {
	fn fetch<'a>(&'a self, candidate_id: &'a str, timeout: Duration) -> BoxFuture<'a, AssetBundle> {
		Box::pin(DirectoryFetcher::fetch(self, candidate_id, timeout))
	}
}
