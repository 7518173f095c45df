use std::cmp::Ordering;

use sieve_domain::{CatalogPage, FilterCriteria, Page, PartRecord};

use crate::{Error, Result};

/// A catalog held entirely in memory, ordered the same way as the SQLite catalog.
#[derive(Clone, Debug, Default)]
pub struct MemoryCatalog {
	parts: Vec<PartRecord>,
}
impl MemoryCatalog {
	pub fn new(parts: Vec<PartRecord>) -> Result<Self> {
		let mut catalog = Self::default();

		for part in parts {
			catalog.insert(part)?;
		}

		Ok(catalog)
	}

	pub fn insert(&mut self, part: PartRecord) -> Result<()> {
		if part.id.trim().is_empty() {
			return Err(Error::InvalidArgument("Part id must not be empty.".to_string()));
		}

		match self.parts.iter_mut().find(|existing| existing.id == part.id) {
			Some(existing) => *existing = part,
			None => self.parts.push(part),
		}

		Ok(())
	}

	pub fn get(&self, id: &str) -> Option<&PartRecord> {
		self.parts.iter().find(|part| part.id == id)
	}

	pub fn len(&self) -> usize {
		self.parts.len()
	}

	pub fn is_empty(&self) -> bool {
		self.parts.is_empty()
	}

	/// Parts matching `criteria`, in insertion order.
	pub fn matching<'a>(
		&'a self,
		criteria: &'a FilterCriteria,
	) -> impl Iterator<Item = &'a PartRecord> + 'a {
		self.parts.iter().filter(move |part| criteria.matches(part))
	}

	pub fn query(&self, criteria: &FilterCriteria, page: Page) -> Result<CatalogPage> {
		let mut matched = self.matching(criteria).collect::<Vec<_>>();

		matched.sort_by(|left, right| catalog_order(left, right));

		let has_more = matched.len() > page.end();
		let candidates = matched
			.into_iter()
			.skip(page.offset)
			.take(page.limit)
			.map(|part| part.to_candidate(criteria))
			.collect();

		Ok(CatalogPage { candidates, has_more })
	}
}

fn catalog_order(left: &PartRecord, right: &PartRecord) -> Ordering {
	right
		.tier
		.cmp(&left.tier)
		.then_with(|| right.stock.cmp(&left.stock))
		.then_with(|| left.unit_cost().total_cmp(&right.unit_cost()))
		.then_with(|| left.id.cmp(&right.id))
}
