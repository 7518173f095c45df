use sieve_domain::{AvailabilityTier, PartRecord};

use crate::{Error, Result};

#[derive(Debug, sqlx::FromRow)]
pub struct ComponentRow {
	pub id: String,
	pub mfr_part: String,
	pub description: String,
	pub manufacturer: String,
	pub category: String,
	pub subcategory: String,
	pub package: Option<String>,
	pub tier: String,
	pub stock: i64,
	pub unit_price: f64,
	pub price_tiers: String,
	pub attributes: String,
}
impl ComponentRow {
	pub fn from_part(part: &PartRecord) -> Result<Self> {
		let price_tiers = serde_json::to_string(&part.price_tiers).map_err(|err| Error::Decode {
			id: part.id.clone(),
			message: err.to_string(),
		})?;
		let attributes = serde_json::to_string(&part.attributes).map_err(|err| Error::Decode {
			id: part.id.clone(),
			message: err.to_string(),
		})?;
		let stock = i64::try_from(part.stock).map_err(|_| {
			Error::InvalidArgument(format!("Stock for {} does not fit the catalog.", part.id))
		})?;

		Ok(Self {
			id: part.id.clone(),
			mfr_part: part.mfr_part.clone(),
			description: part.description.clone(),
			manufacturer: part.manufacturer.clone(),
			category: part.category.clone(),
			subcategory: part.subcategory.clone(),
			package: part.package.clone(),
			tier: part.tier.as_str().to_string(),
			stock,
			unit_price: part.unit_cost(),
			price_tiers,
			attributes,
		})
	}

	pub fn into_part(self) -> Result<PartRecord> {
		let tier = match self.tier.as_str() {
			"basic" => AvailabilityTier::Basic,
			"preferred" => AvailabilityTier::Preferred,
			"extended" => AvailabilityTier::Extended,
			other => {
				return Err(Error::Decode {
					id: self.id,
					message: format!("unknown tier {other:?}"),
				});
			},
		};
		let price_tiers = serde_json::from_str(&self.price_tiers)
			.map_err(|err| Error::Decode { id: self.id.clone(), message: err.to_string() })?;
		let attributes = serde_json::from_str(&self.attributes)
			.map_err(|err| Error::Decode { id: self.id.clone(), message: err.to_string() })?;

		Ok(PartRecord {
			id: self.id,
			mfr_part: self.mfr_part,
			description: self.description,
			manufacturer: self.manufacturer,
			category: self.category,
			subcategory: self.subcategory,
			package: self.package,
			tier,
			stock: u64::try_from(self.stock).unwrap_or(0),
			price_tiers,
			attributes,
		})
	}
}
