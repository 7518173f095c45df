use std::collections::HashSet;

use sieve_domain::{PartComparison, PartRecord};

use crate::{Error, Result, SieveService};

/// Upper bound on parts compared in one call.
pub const MAX_COMPARE: usize = 10;

impl SieveService {
	/// Full catalog record of one part, or `None` when the catalog does not carry it.
	pub async fn details(&self, id: &str) -> Result<Option<PartRecord>> {
		let id = id.trim();

		if id.is_empty() {
			return Err(Error::InvalidRequest { message: "Part id must be non-empty.".to_string() });
		}

		self.catalog.get(id).await
	}

	/// Looks up each id and lines the found parts up attribute by attribute.
	///
	/// Repeated ids are compared once. Ids the catalog does not carry are listed in
	/// `not_found`; the call fails only when none of them resolve.
	pub async fn compare(&self, ids: &[String]) -> Result<PartComparison> {
		if ids.is_empty() {
			return Err(Error::InvalidRequest {
				message: "At least one part id is required for comparison.".to_string(),
			});
		}
		if ids.len() > MAX_COMPARE {
			return Err(Error::InvalidRequest {
				message: format!("At most {MAX_COMPARE} parts can be compared at once."),
			});
		}

		let mut seen = HashSet::new();
		let mut parts = Vec::new();
		let mut not_found = Vec::new();

		for id in ids.iter().map(|id| id.trim()) {
			if !seen.insert(id) {
				continue;
			}

			match self.details(id).await? {
				Some(part) => parts.push(part),
				None => not_found.push(id.to_string()),
			}
		}

		if parts.is_empty() {
			return Err(Error::NotFound {
				message: format!("No parts found for: {}.", not_found.join(", ")),
			});
		}

		tracing::debug!(found = parts.len(), missing = not_found.len(), "Parts compared.");

		Ok(PartComparison::new(parts, not_found))
	}
}
