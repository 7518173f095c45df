use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::{
	Error, Result,
	part::{AvailabilityTier, PartRecord},
	units::{self, Quantity},
};

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct AttributeRange {
	pub min: Option<String>,
	pub max: Option<String>,
}

/// Soft constraints. Each satisfied preference adds a ranking bonus but never excludes a part.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Preference {
	Manufacturer { name: String },
	Package { name: String },
	Attribute { name: String, value: String },
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct FilterCriteria {
	pub text: Option<String>,
	pub category: Option<String>,
	pub subcategory: Option<String>,
	pub manufacturer: Option<String>,
	pub package: Option<String>,
	pub attributes: BTreeMap<String, String>,
	pub attribute_ranges: BTreeMap<String, AttributeRange>,
	pub basic_only: bool,
	pub in_stock_only: bool,
	pub min_stock: u64,
	pub max_unit_cost: Option<f64>,
	pub prefer_higher_tier: bool,
	pub preferences: Vec<Preference>,
}
impl Default for FilterCriteria {
	fn default() -> Self {
		Self {
			text: None,
			category: None,
			subcategory: None,
			manufacturer: None,
			package: None,
			attributes: BTreeMap::new(),
			attribute_ranges: BTreeMap::new(),
			basic_only: false,
			in_stock_only: true,
			min_stock: 0,
			max_unit_cost: None,
			prefer_higher_tier: true,
			preferences: Vec::new(),
		}
	}
}
impl FilterCriteria {
	pub fn validate(&self) -> Result<()> {
		if let Some(max) = self.max_unit_cost
			&& (!max.is_finite() || max < 0.0)
		{
			return Err(Error::InvalidCriteria {
				message: "max_unit_cost must be a finite number of zero or greater.".to_string(),
			});
		}

		for name in self.attribute_ranges.keys() {
			let Some(bounds) = self.range_bounds(name)? else { continue };

			if let (Some(min), Some(max)) = bounds
				&& let (Some(a), Some(b)) = (min.dimension, max.dimension)
				&& a != b
			{
				return Err(Error::InvalidCriteria {
					message: format!("Range bounds for {name:?} use different units."),
				});
			}
			if let (Some(min), Some(max)) = bounds
				&& min.value > max.value
			{
				return Err(Error::InvalidCriteria {
					message: format!("Range minimum for {name:?} exceeds its maximum."),
				});
			}
		}

		Ok(())
	}

	/// Parsed (min, max) for a range constraint, or None when the attribute has no range.
	pub fn range_bounds(&self, name: &str) -> Result<Option<(Option<Quantity>, Option<Quantity>)>> {
		let Some(range) = self.attribute_ranges.get(name) else { return Ok(None) };
		let min = range.min.as_deref().map(units::parse_quantity).transpose()?;
		let max = range.max.as_deref().map(units::parse_quantity).transpose()?;

		Ok(Some((min, max)))
	}

	/// Lowercased words of the free-text term.
	pub fn text_terms(&self) -> Vec<String> {
		let Some(text) = self.text.as_deref() else { return Vec::new() };
		let mut out = Vec::new();

		for word in text.unicode_words() {
			let term = word.to_lowercase();

			if !out.contains(&term) {
				out.push(term);
			}
		}

		out
	}

	/// Hard filter. Range bounds that fail to parse exclude nothing; `validate` rejects them
	/// before a resolution starts.
	pub fn matches(&self, part: &PartRecord) -> bool {
		if let Some(category) = self.category.as_deref()
			&& !part.category.eq_ignore_ascii_case(category)
		{
			return false;
		}
		if let Some(subcategory) = self.subcategory.as_deref()
			&& !part.subcategory.eq_ignore_ascii_case(subcategory)
		{
			return false;
		}
		if let Some(manufacturer) = self.manufacturer.as_deref()
			&& !contains_ignore_case(&part.manufacturer, manufacturer)
		{
			return false;
		}
		if let Some(package) = self.package.as_deref()
			&& part.package.as_deref().map(|p| !p.eq_ignore_ascii_case(package)).unwrap_or(true)
		{
			return false;
		}
		if self.basic_only && part.tier != AvailabilityTier::Basic {
			return false;
		}
		if self.in_stock_only && part.stock == 0 {
			return false;
		}
		if part.stock < self.min_stock {
			return false;
		}
		if let Some(max) = self.max_unit_cost
			&& part.unit_cost() > max
		{
			return false;
		}

		let terms = self.text_terms();

		if !terms.is_empty() {
			let haystack = format!(
				"{} {} {} {}",
				part.description, part.mfr_part, part.manufacturer, part.category
			)
			.to_lowercase();

			if !terms.iter().all(|term| haystack.contains(term.as_str())) {
				return false;
			}
		}

		for (name, expected) in &self.attributes {
			if !attribute_equals(part, name, expected) {
				return false;
			}
		}
		for name in self.attribute_ranges.keys() {
			let Ok(Some((min, max))) = self.range_bounds(name) else { continue };
			let Some(actual) = part.attribute(name).and_then(|value| value.quantity()) else {
				return false;
			};

			if let Some(min) = min
				&& actual.value < min.value
				&& units::compare_with_tolerance(actual.value, min.value).is_lt()
			{
				return false;
			}
			if let Some(max) = max
				&& actual.value > max.value
				&& units::compare_with_tolerance(actual.value, max.value).is_gt()
			{
				return false;
			}
		}

		true
	}

	pub fn matched_preferences(&self, part: &PartRecord) -> u32 {
		let mut matched = 0;

		for preference in &self.preferences {
			let satisfied = match preference {
				Preference::Manufacturer { name } => contains_ignore_case(&part.manufacturer, name),
				Preference::Package { name } =>
					part.package.as_deref().map(|p| p.eq_ignore_ascii_case(name)).unwrap_or(false),
				Preference::Attribute { name, value } => attribute_equals(part, name, value),
			};

			if satisfied {
				matched += 1;
			}
		}

		matched
	}
}

/// Unit-aware when both sides parse as quantities ("100nF" equals "0.1uF"), textual otherwise.
pub fn attribute_equals(part: &PartRecord, name: &str, expected: &str) -> bool {
	let Some(actual) = part.attribute(name) else { return false };

	if let (Some(actual), Ok(expected)) = (actual.quantity(), units::parse_quantity(expected)) {
		let same_dimension = match (actual.dimension, expected.dimension) {
			(Some(a), Some(b)) => a == b,
			_ => true,
		};

		return same_dimension && units::compare_with_tolerance(actual.value, expected.value).is_eq();
	}

	actual.display().trim().eq_ignore_ascii_case(expected.trim())
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
	haystack.to_lowercase().contains(&needle.to_lowercase())
}
