use std::collections::HashSet;

use serde::Serialize;

use sieve_domain::{CandidateRecord, FilterCriteria, Page, RankingWeights, scoring};

use crate::{CatalogPort, Result};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RankedCandidate {
	/// Zero-based position in the ranked source.
	pub rank: usize,
	pub score: f64,
	pub record: CandidateRecord,
}

/// Scores catalog records and orders them deterministically.
#[derive(Clone, Debug)]
pub struct RankingEngine {
	weights: RankingWeights,
	scan_page_size: usize,
	max_scan_candidates: usize,
}
impl RankingEngine {
	pub fn new(weights: RankingWeights, scan_page_size: usize, max_scan_candidates: usize) -> Self {
		Self {
			weights,
			scan_page_size: scan_page_size.max(1),
			max_scan_candidates: max_scan_candidates.max(1),
		}
	}

	pub fn from_config(cfg: &sieve_config::Config) -> Self {
		Self::new(
			RankingWeights::from_config(&cfg.ranking),
			cfg.catalog.scan_page_size as usize,
			cfg.catalog.max_scan_candidates as usize,
		)
	}

	pub fn weights(&self) -> &RankingWeights {
		&self.weights
	}

	/// Scores every matching record once and keeps the best `max_scan_candidates` of them.
	///
	/// The whole match set is streamed, so the kept prefix is the true head of the ranking.
	/// Records ranked below the cap are dropped and the source is marked truncated.
	pub async fn rank(
		&self,
		catalog: &dyn CatalogPort,
		criteria: &FilterCriteria,
	) -> Result<RankedSource> {
		let mut top = TopScored::new(self.max_scan_candidates);
		let mut seen = HashSet::new();
		let weights = self.weights;
		let prefer_higher_tier = criteria.prefer_higher_tier;
		let mut visit = |record: CandidateRecord| {
			if !seen.insert(record.id.clone()) {
				return;
			}

			let score = scoring::score(&weights, &record.ranking, prefer_higher_tier);

			top.push(record, score);
		};

		catalog.scan(criteria, self.scan_page_size, &mut visit).await?;

		let matched = top.matched;
		let (scored, truncated) = top.finish();

		if truncated {
			tracing::warn!(
				matched,
				kept = scored.len(),
				max_scan_candidates = self.max_scan_candidates,
				"Catalog match set exceeds the scan cap; lower-ranked records are dropped."
			);
		}

		let mut source = RankedSource::from_scored(scored);

		source.truncated = truncated;

		Ok(source)
	}
}

/// Bounded collection of the highest-scoring records. Overflow is compacted in batches.
struct TopScored {
	cap: usize,
	matched: usize,
	scored: Vec<(CandidateRecord, f64)>,
}
impl TopScored {
	fn new(cap: usize) -> Self {
		Self { cap, matched: 0, scored: Vec::new() }
	}

	fn push(&mut self, record: CandidateRecord, score: f64) {
		self.matched += 1;
		self.scored.push((record, score));

		if self.scored.len() >= self.cap.saturating_mul(2) {
			self.compact();
		}
	}

	fn compact(&mut self) {
		sort_scored(&mut self.scored);
		self.scored.truncate(self.cap);
	}

	fn finish(mut self) -> (Vec<(CandidateRecord, f64)>, bool) {
		self.compact();

		(self.scored, self.matched > self.cap)
	}
}

fn sort_scored(scored: &mut [(CandidateRecord, f64)]) {
	scored.sort_by(|left, right| scoring::compare_scored((&left.0, left.1), (&right.0, right.1)));
}

/// A ranked, immutable candidate list with a cursor for incremental consumption.
#[derive(Clone, Debug, Default)]
pub struct RankedSource {
	ranked: Vec<RankedCandidate>,
	cursor: usize,
	truncated: bool,
}
impl RankedSource {
	pub fn from_records(
		records: Vec<CandidateRecord>,
		weights: &RankingWeights,
		prefer_higher_tier: bool,
	) -> Self {
		let scored = records
			.into_iter()
			.map(|record| {
				let score = scoring::score(weights, &record.ranking, prefer_higher_tier);

				(record, score)
			})
			.collect();

		Self::from_scored(scored)
	}

	fn from_scored(mut scored: Vec<(CandidateRecord, f64)>) -> Self {
		sort_scored(&mut scored);

		let ranked = scored
			.into_iter()
			.enumerate()
			.map(|(rank, (record, score))| RankedCandidate { rank, score, record })
			.collect();

		Self { ranked, cursor: 0, truncated: false }
	}

	pub fn len(&self) -> usize {
		self.ranked.len()
	}

	pub fn is_empty(&self) -> bool {
		self.ranked.is_empty()
	}

	/// True when the catalog held more matches than the scan cap allowed. Positions past `len`
	/// then exist in the catalog but were not ranked.
	pub fn truncated(&self) -> bool {
		self.truncated
	}

	pub fn candidates(&self) -> &[RankedCandidate] {
		&self.ranked
	}

	/// The window `[offset, offset + limit)` and whether anything follows it.
	pub fn window(&self, page: Page) -> (&[RankedCandidate], bool) {
		let start = page.offset.min(self.ranked.len());
		let end = page.end().min(self.ranked.len());

		(&self.ranked[start..end], end < self.ranked.len())
	}

	pub fn position(&self) -> usize {
		self.cursor
	}

	pub fn seek(&mut self, position: usize) {
		self.cursor = position.min(self.ranked.len());
	}

	pub fn is_exhausted(&self) -> bool {
		self.cursor >= self.ranked.len()
	}

	/// The next `n` candidates after the cursor. Advances the cursor past them.
	pub fn next_batch(&mut self, n: usize) -> &[RankedCandidate] {
		let start = self.cursor;
		let end = start.saturating_add(n).min(self.ranked.len());

		self.cursor = end;

		&self.ranked[start..end]
	}
}
