use std::{collections::BTreeMap, path::PathBuf};

use time::macros::datetime;

use sieve_domain::{
	AssetBundle, AssetManifest, AttributeRange, AttributeValue, AvailabilityTier, FetchOutcome,
	FilterCriteria, PartRecord, Preference, PriceTier, Verdict, validate,
};

fn bundle(id: &str, outcome: FetchOutcome, kinds: &[&str]) -> AssetBundle {
	let mut bundle = AssetBundle::empty(id, outcome, datetime!(2026-01-01 12:00 UTC));

	for kind in kinds {
		bundle
			.artifacts
			.insert((*kind).to_string(), vec![PathBuf::from(format!("/lib/{id}/{kind}.file"))]);
	}

	bundle
}

fn capacitor(id: &str) -> PartRecord {
	let mut attributes = BTreeMap::new();

	attributes.insert(
		"Capacitance".to_string(),
		AttributeValue::Measured { value: 1e-7, unit: Some("F".to_string()) },
	);
	attributes.insert("Voltage Rated".to_string(), AttributeValue::Text("50V".to_string()));
	attributes.insert("Tolerance".to_string(), AttributeValue::Text("±10%".to_string()));

	PartRecord {
		id: id.to_string(),
		mfr_part: "CL05B104KO5NNNC".to_string(),
		description: "100nF 50V X7R ceramic capacitor".to_string(),
		manufacturer: "Samsung Electro-Mechanics".to_string(),
		category: "Capacitors".to_string(),
		subcategory: "Multilayer Ceramic Capacitors MLCC - SMD/SMT".to_string(),
		package: Some("0402".to_string()),
		tier: AvailabilityTier::Basic,
		stock: 50_000,
		price_tiers: vec![
			PriceTier { min_qty: 100, unit_price: 0.0012 },
			PriceTier { min_qty: 1, unit_price: 0.0021 },
		],
		attributes,
	}
}

#[test]
fn complete_bundle_validates_and_partial_lists_missing_kinds() {
	let manifest = AssetManifest::default();
	let x = validate(&bundle("X", FetchOutcome::Success, &["symbol", "footprint", "model"]), &manifest);
	let y = validate(&bundle("Y", FetchOutcome::PartialSuccess, &["symbol", "footprint"]), &manifest);

	assert!(x.is_complete);
	assert_eq!(x.verdict, Verdict::Complete);
	assert!(x.missing_kinds.is_empty());
	assert!(!y.is_complete);
	assert_eq!(y.verdict, Verdict::PartialAsset);
	assert_eq!(y.missing_kinds, vec!["model".to_string()]);
}

#[test]
fn validation_is_idempotent() {
	let manifest = AssetManifest::default();
	let input = bundle("X", FetchOutcome::PartialSuccess, &["symbol"]);

	assert_eq!(validate(&input, &manifest), validate(&input, &manifest));
	assert_eq!(validate(&input, &manifest).evaluated_at, input.fetched_at);
}

#[test]
fn not_found_short_circuits_to_all_missing() {
	let manifest = AssetManifest::default();
	let outcome = validate(&bundle("N", FetchOutcome::NotFound, &["symbol"]), &manifest);

	assert_eq!(outcome.verdict, Verdict::NotFound);
	assert_eq!(outcome.missing_kinds, manifest.required().to_vec());
}

#[test]
fn transport_failures_are_transient() {
	let manifest = AssetManifest::default();
	let timed_out = validate(&bundle("T", FetchOutcome::TimedOut, &[]), &manifest);
	let transport = validate(&bundle("T", FetchOutcome::TransportError, &[]), &manifest);

	assert_eq!(timed_out.verdict, Verdict::Transient);
	assert_eq!(transport.verdict, Verdict::Transient);
	assert_eq!(timed_out.missing_kinds.len(), 3);
}

#[test]
fn empty_locations_do_not_count() {
	let manifest = AssetManifest::new(["symbol"]);
	let mut input = bundle("E", FetchOutcome::Success, &[]);

	input.artifacts.insert("symbol".to_string(), vec![PathBuf::new()]);

	assert_eq!(validate(&input, &manifest).verdict, Verdict::PartialAsset);
}

#[test]
fn manifest_normalizes_kinds() {
	let manifest = AssetManifest::new([" Symbol", "symbol", "MODEL", ""]);

	assert_eq!(manifest.required(), ["symbol".to_string(), "model".to_string()]);
}

#[test]
fn unit_cost_uses_single_quantity_tier() {
	assert!((capacitor("C1").unit_cost() - 0.0021).abs() < 1e-12);
}

#[test]
fn criteria_match_exact_and_unit_aware_attributes() {
	let part = capacitor("C1");
	let mut criteria = FilterCriteria {
		category: Some("capacitors".to_string()),
		package: Some("0402".to_string()),
		..FilterCriteria::default()
	};

	criteria.attributes.insert("Capacitance".to_string(), "0.1uF".to_string());
	criteria.attributes.insert("Tolerance".to_string(), "±10%".to_string());

	assert!(criteria.matches(&part));

	criteria.attributes.insert("Capacitance".to_string(), "1uF".to_string());

	assert!(!criteria.matches(&part));
}

#[test]
fn criteria_apply_ranges_and_stock_filters() {
	let part = capacitor("C1");
	let mut criteria = FilterCriteria::default();

	criteria.attribute_ranges.insert(
		"Voltage Rated".to_string(),
		AttributeRange { min: Some("25V".to_string()), max: None },
	);

	assert!(criteria.matches(&part));

	criteria.attribute_ranges.insert(
		"Voltage Rated".to_string(),
		AttributeRange { min: Some("100V".to_string()), max: None },
	);

	assert!(!criteria.matches(&part));

	let mut out_of_stock = part.clone();

	out_of_stock.stock = 0;

	assert!(!FilterCriteria::default().matches(&out_of_stock));
	assert!(
		FilterCriteria { in_stock_only: false, ..FilterCriteria::default() }.matches(&out_of_stock)
	);
}

#[test]
fn criteria_text_requires_every_word() {
	let part = capacitor("C1");
	let hit = FilterCriteria { text: Some("X7R capacitor".to_string()), ..FilterCriteria::default() };
	let miss = FilterCriteria { text: Some("X7R resistor".to_string()), ..FilterCriteria::default() };

	assert!(hit.matches(&part));
	assert!(!miss.matches(&part));
}

#[test]
fn criteria_validation_rejects_bad_ranges() {
	let mut criteria = FilterCriteria::default();

	criteria.attribute_ranges.insert(
		"Voltage Rated".to_string(),
		AttributeRange { min: Some("50V".to_string()), max: Some("10V".to_string()) },
	);

	assert!(criteria.validate().is_err());

	criteria.attribute_ranges.insert(
		"Voltage Rated".to_string(),
		AttributeRange { min: Some("fast".to_string()), max: None },
	);

	assert!(criteria.validate().is_err());

	let criteria = FilterCriteria { max_unit_cost: Some(f64::NAN), ..FilterCriteria::default() };

	assert!(criteria.validate().is_err());
}

#[test]
fn preferences_count_without_excluding() {
	let part = capacitor("C1");
	let criteria = FilterCriteria {
		preferences: vec![
			Preference::Manufacturer { name: "samsung".to_string() },
			Preference::Package { name: "0603".to_string() },
			Preference::Attribute { name: "Capacitance".to_string(), value: "100nF".to_string() },
		],
		..FilterCriteria::default()
	};

	assert!(criteria.matches(&part));
	assert_eq!(criteria.matched_preferences(&part), 2);
	assert_eq!(part.to_candidate(&criteria).ranking.matched_preferences, 2);
}

#[test]
fn criteria_deserialize_with_defaults() {
	let criteria: FilterCriteria =
		serde_json::from_str(r#"{"category":"Resistors"}"#).expect("Failed to parse criteria.");

	assert!(criteria.in_stock_only);
	assert!(criteria.prefer_higher_tier);
	assert_eq!(criteria.category.as_deref(), Some("Resistors"));
}
