use std::cmp::Ordering;

use crate::candidate::{CandidateRecord, RankingAttributes};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RankingWeights {
	pub tier_bonus: f64,
	pub stock_weight: f64,
	pub cost_weight: f64,
	pub preference_bonus: f64,
}
impl RankingWeights {
	pub fn from_config(cfg: &sieve_config::Ranking) -> Self {
		Self {
			tier_bonus: cfg.tier_bonus,
			stock_weight: cfg.stock_weight,
			cost_weight: cfg.cost_weight,
			preference_bonus: cfg.preference_bonus,
		}
	}
}
impl Default for RankingWeights {
	fn default() -> Self {
		Self::from_config(&sieve_config::Ranking::default())
	}
}

/// Higher is better. With the default weights a tier step dominates any realistic stock or
/// cost difference, so a basic part outranks an extended one whenever higher tiers are preferred.
pub fn score(weights: &RankingWeights, ranking: &RankingAttributes, prefer_higher_tier: bool) -> f64 {
	let tier = if prefer_higher_tier {
		weights.tier_bonus * f64::from(ranking.tier.weight())
	} else {
		0.0
	};
	let stock = weights.stock_weight * (ranking.quantity_on_hand as f64).ln_1p();
	let cost = weights.cost_weight * ranking.unit_cost;
	let preferences = weights.preference_bonus * f64::from(ranking.matched_preferences);

	tier + stock - cost + preferences
}

/// Descending score, then ascending id.
pub fn compare_scored(
	left: (&CandidateRecord, f64),
	right: (&CandidateRecord, f64),
) -> Ordering {
	right.1.total_cmp(&left.1).then_with(|| left.0.id.cmp(&right.0.id))
}
