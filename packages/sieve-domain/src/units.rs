use std::{cmp::Ordering, sync::LazyLock};

use regex::Regex;

use crate::{Error, Result};

const RELATIVE_TOLERANCE: f64 = 1e-10;

static VALUE_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
	Regex::new(r"^([+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?)\s*([A-Za-zμµΩ]*)$").ok()
});

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Dimension {
	Capacitance,
	Resistance,
	Inductance,
	Voltage,
	Current,
	Frequency,
	Power,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quantity {
	/// Value expressed in the base unit of its dimension.
	pub value: f64,
	/// None for unitless values.
	pub dimension: Option<Dimension>,
}

/// Splits "100nF" into (100.0, "nF"). The unit may be empty.
pub fn parse_value(raw: &str) -> Option<(f64, &str)> {
	let trimmed = raw.trim();
	let pattern = VALUE_PATTERN.as_ref()?;
	let captures = pattern.captures(trimmed)?;
	let number = captures.get(1)?.as_str().parse::<f64>().ok()?;
	let unit = captures.get(2).map(|m| m.as_str()).unwrap_or("");

	if !number.is_finite() {
		return None;
	}

	Some((number, unit))
}

/// Converts a value with an SI-prefixed unit into its base unit, e.g. (100, "nF") -> 1e-7.
pub fn normalize_value(value: f64, unit: &str) -> Option<Quantity> {
	if unit.is_empty() {
		return Some(Quantity { value, dimension: None });
	}

	let (multiplier, dimension) = resolve_unit(unit)?;

	Some(Quantity { value: value * multiplier, dimension: Some(dimension) })
}

pub fn parse_quantity(raw: &str) -> Result<Quantity> {
	parse_value(raw)
		.and_then(|(value, unit)| normalize_value(value, unit))
		.ok_or_else(|| Error::InvalidUnitValue { raw: raw.to_string() })
}

/// Compares two unit-bearing values. Returns None when either fails to parse or the dimensions
/// differ. A unitless value compares against any dimension as a base-unit number.
pub fn compare_values(left: &str, right: &str) -> Option<Ordering> {
	let left = parse_quantity(left).ok()?;
	let right = parse_quantity(right).ok()?;

	if let (Some(a), Some(b)) = (left.dimension, right.dimension)
		&& a != b
	{
		return None;
	}

	Some(compare_with_tolerance(left.value, right.value))
}

pub fn compare_with_tolerance(left: f64, right: f64) -> Ordering {
	let diff = (left - right).abs();
	let scale = left.abs().max(right.abs());
	let relative = if scale > 0.0 { diff / scale } else { diff };

	if relative < RELATIVE_TOLERANCE {
		return Ordering::Equal;
	}

	left.total_cmp(&right)
}

fn resolve_unit(unit: &str) -> Option<(f64, Dimension)> {
	let unit = unit.trim();

	if let Some(dimension) = base_dimension(unit) {
		return Some((1.0, dimension));
	}

	let mut chars = unit.chars();
	let prefix = chars.next()?;
	let rest = chars.as_str();
	let dimension = base_dimension(rest)?;
	let multiplier = match prefix {
		'p' => 1e-12,
		'n' => 1e-9,
		'u' | 'μ' | 'µ' => 1e-6,
		'm' => 1e-3,
		'k' | 'K' => 1e3,
		'M' => 1e6,
		'G' => 1e9,
		_ => return None,
	};

	Some((multiplier, dimension))
}

fn base_dimension(symbol: &str) -> Option<Dimension> {
	match symbol {
		"F" | "f" => Some(Dimension::Capacitance),
		"Ω" | "ohm" | "Ohm" | "ohms" | "Ohms" | "R" => Some(Dimension::Resistance),
		"H" | "h" => Some(Dimension::Inductance),
		"V" | "v" => Some(Dimension::Voltage),
		"A" | "a" => Some(Dimension::Current),
		"Hz" | "hz" | "HZ" => Some(Dimension::Frequency),
		"W" | "w" => Some(Dimension::Power),
		_ => None,
	}
}
