use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::part::AvailabilityTier;

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct RankingAttributes {
	pub tier: AvailabilityTier,
	pub quantity_on_hand: u64,
	pub unit_cost: f64,
	/// Number of optional preferences from the criteria this record satisfies.
	pub matched_preferences: u32,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct CandidateRecord {
	pub id: String,
	pub ranking: RankingAttributes,
	pub display: Map<String, Value>,
	fingerprint: String,
}
impl CandidateRecord {
	pub fn new(id: String, ranking: RankingAttributes, display: Map<String, Value>) -> Self {
		let fingerprint = fingerprint_of(&id, &ranking, &display);

		Self { id, ranking, display, fingerprint }
	}

	/// Content hash of the record. Cached verdicts recorded for a different fingerprint belong
	/// to an older revision of the catalog row and must not be reused.
	pub fn fingerprint(&self) -> &str {
		&self.fingerprint
	}
}

fn fingerprint_of(id: &str, ranking: &RankingAttributes, display: &Map<String, Value>) -> String {
	// Preference matches depend on the query, not on the catalog row.
	let payload = serde_json::json!({
		"id": id,
		"tier": ranking.tier.as_str(),
		"quantity_on_hand": ranking.quantity_on_hand,
		"unit_cost": ranking.unit_cost,
		"display": display,
	});
	let raw = serde_json::to_vec(&payload).unwrap_or_else(|_| id.as_bytes().to_vec());

	blake3::hash(&raw).to_hex().to_string()
}

/// A clamped offset/limit window.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Page {
	pub offset: usize,
	pub limit: usize,
}
impl Page {
	pub fn new(offset: usize, limit: usize, max_limit: usize) -> Self {
		Self { offset, limit: limit.clamp(1, max_limit.max(1)) }
	}

	pub fn end(&self) -> usize {
		self.offset.saturating_add(self.limit)
	}
}

/// One page of catalog results, in the catalog's own order.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct CatalogPage {
	pub candidates: Vec<CandidateRecord>,
	pub has_more: bool,
}
