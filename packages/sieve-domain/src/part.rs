use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
	candidate::{CandidateRecord, RankingAttributes},
	criteria::FilterCriteria,
	units::{self, Quantity},
};

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityTier {
	Extended,
	Preferred,
	Basic,
}
impl AvailabilityTier {
	pub fn weight(self) -> u8 {
		match self {
			Self::Extended => 0,
			Self::Preferred => 1,
			Self::Basic => 2,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Extended => "extended",
			Self::Preferred => "preferred",
			Self::Basic => "basic",
		}
	}
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PriceTier {
	pub min_qty: u64,
	pub unit_price: f64,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
	Measured { value: f64, unit: Option<String> },
	Text(String),
}
impl AttributeValue {
	/// Base-unit numeric value, when the attribute carries one.
	pub fn quantity(&self) -> Option<Quantity> {
		match self {
			Self::Measured { value, unit } => match unit.as_deref() {
				Some(unit) => units::normalize_value(*value, unit),
				None => Some(Quantity { value: *value, dimension: None }),
			},
			Self::Text(raw) => units::parse_quantity(raw).ok(),
		}
	}

	pub fn display(&self) -> String {
		match self {
			Self::Measured { value, unit: Some(unit) } => format!("{value}{unit}"),
			Self::Measured { value, unit: None } => value.to_string(),
			Self::Text(raw) => raw.clone(),
		}
	}
}

/// A catalog row as adapters see it. The core only consumes the derived `CandidateRecord`.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PartRecord {
	pub id: String,
	pub mfr_part: String,
	pub description: String,
	pub manufacturer: String,
	pub category: String,
	pub subcategory: String,
	pub package: Option<String>,
	pub tier: AvailabilityTier,
	pub stock: u64,
	#[serde(default)]
	pub price_tiers: Vec<PriceTier>,
	#[serde(default)]
	pub attributes: BTreeMap<String, AttributeValue>,
}
impl PartRecord {
	/// Price for quantity one. Parts without price tiers cost zero.
	pub fn unit_cost(&self) -> f64 {
		self.price_tiers
			.iter()
			.min_by_key(|tier| tier.min_qty)
			.map(|tier| tier.unit_price)
			.unwrap_or(0.0)
	}

	pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
		self.attributes.get(name)
	}

	pub fn to_candidate(&self, criteria: &FilterCriteria) -> CandidateRecord {
		let ranking = RankingAttributes {
			tier: self.tier,
			quantity_on_hand: self.stock,
			unit_cost: self.unit_cost(),
			matched_preferences: criteria.matched_preferences(self),
		};

		CandidateRecord::new(self.id.clone(), ranking, self.display_attributes())
	}

	pub fn display_attributes(&self) -> Map<String, Value> {
		let mut display = Map::new();

		display.insert("mfr_part".to_string(), Value::String(self.mfr_part.clone()));
		display.insert("description".to_string(), Value::String(self.description.clone()));
		display.insert("manufacturer".to_string(), Value::String(self.manufacturer.clone()));
		display.insert("category".to_string(), Value::String(self.category.clone()));
		display.insert("subcategory".to_string(), Value::String(self.subcategory.clone()));
		display.insert("tier".to_string(), Value::String(self.tier.as_str().to_string()));
		display.insert("stock".to_string(), Value::from(self.stock));
		display.insert("unit_price".to_string(), Value::from(self.unit_cost()));

		if let Some(package) = self.package.as_ref() {
			display.insert("package".to_string(), Value::String(package.clone()));
		}
		if !self.attributes.is_empty() {
			let attributes = self
				.attributes
				.iter()
				.map(|(name, value)| (name.clone(), Value::String(value.display())))
				.collect::<Map<_, _>>();

			display.insert("attributes".to_string(), Value::Object(attributes));
		}

		display
	}
}
