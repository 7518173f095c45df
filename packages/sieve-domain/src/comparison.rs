use std::collections::BTreeMap;

use serde::Serialize;

use crate::part::{AttributeValue, PartRecord};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AttributeCell {
	pub part_id: String,
	pub value: AttributeValue,
}

/// Side-by-side view of several parts, keyed by attribute name.
///
/// A part without a given attribute has no cell in that attribute's row.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PartComparison {
	pub parts: Vec<PartRecord>,
	pub not_found: Vec<String>,
	pub attributes: BTreeMap<String, Vec<AttributeCell>>,
}
impl PartComparison {
	pub fn new(parts: Vec<PartRecord>, not_found: Vec<String>) -> Self {
		let mut attributes: BTreeMap<String, Vec<AttributeCell>> = BTreeMap::new();

		for part in &parts {
			for (name, value) in &part.attributes {
				attributes
					.entry(name.clone())
					.or_default()
					.push(AttributeCell { part_id: part.id.clone(), value: value.clone() });
			}
		}

		Self { parts, not_found, attributes }
	}

	/// Attribute names whose rendered values are not identical across every compared part.
	pub fn differing(&self) -> Vec<&str> {
		self.attributes
			.iter()
			.filter(|(_, cells)| {
				cells.len() != self.parts.len()
					|| cells.windows(2).any(|pair| pair[0].value.display() != pair[1].value.display())
			})
			.map(|(name, _)| name.as_str())
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::part::AvailabilityTier;

	fn part(id: &str, attributes: &[(&str, AttributeValue)]) -> PartRecord {
		PartRecord {
			id: id.to_string(),
			mfr_part: format!("MFR-{id}"),
			description: String::new(),
			manufacturer: "Samsung".to_string(),
			category: "Capacitors".to_string(),
			subcategory: "Multilayer Ceramic Capacitors MLCC - SMD/SMT".to_string(),
			package: Some("0603".to_string()),
			tier: AvailabilityTier::Basic,
			stock: 1_000,
			price_tiers: Vec::new(),
			attributes: attributes
				.iter()
				.map(|(name, value)| (name.to_string(), value.clone()))
				.collect(),
		}
	}

	fn volts(value: f64) -> AttributeValue {
		AttributeValue::Measured { value, unit: Some("V".to_string()) }
	}

	#[test]
	fn rows_follow_part_order() {
		let comparison = PartComparison::new(
			vec![
				part("C1525", &[("Voltage", volts(10.0))]),
				part("C307331", &[("Voltage", volts(16.0))]),
			],
			vec!["C404".to_string()],
		);
		let row = &comparison.attributes["Voltage"];

		assert_eq!(
			row.iter().map(|cell| cell.part_id.as_str()).collect::<Vec<_>>(),
			vec!["C1525", "C307331"]
		);
		assert_eq!(row[1].value, volts(16.0));
		assert_eq!(comparison.not_found, vec!["C404".to_string()]);
	}

	#[test]
	fn differing_reports_mismatched_and_missing_attributes() {
		let tolerance = AttributeValue::Text("±10%".to_string());
		let comparison = PartComparison::new(
			vec![
				part("C1", &[("Tolerance", tolerance.clone()), ("Voltage", volts(10.0))]),
				part("C2", &[("Tolerance", tolerance.clone()), ("Voltage", volts(16.0))]),
				part(
					"C3",
					&[("Tolerance", tolerance), ("Voltage", volts(16.0)), ("Pins", volts(2.0))],
				),
			],
			Vec::new(),
		);

		assert_eq!(comparison.differing(), vec!["Pins", "Voltage"]);
	}
}
