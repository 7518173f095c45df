use sqlx::{QueryBuilder, Sqlite};

use sieve_domain::{CatalogPage, FilterCriteria, Page, PartRecord};

use crate::{Result, db::Db, models::ComponentRow};

const SCAN_CHUNK: usize = 256;
const ORDER_BY: &str = "\
ORDER BY
	CASE tier WHEN 'basic' THEN 2 WHEN 'preferred' THEN 1 ELSE 0 END DESC,
	stock DESC,
	unit_price ASC,
	id ASC";

pub async fn upsert_part(db: &Db, part: &PartRecord) -> Result<()> {
	let row = ComponentRow::from_part(part)?;

	sqlx::query(
		"\
INSERT INTO components (
	id,
	mfr_part,
	description,
	manufacturer,
	category,
	subcategory,
	package,
	tier,
	stock,
	unit_price,
	price_tiers,
	attributes
)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT (id) DO UPDATE SET
	mfr_part = excluded.mfr_part,
	description = excluded.description,
	manufacturer = excluded.manufacturer,
	category = excluded.category,
	subcategory = excluded.subcategory,
	package = excluded.package,
	tier = excluded.tier,
	stock = excluded.stock,
	unit_price = excluded.unit_price,
	price_tiers = excluded.price_tiers,
	attributes = excluded.attributes",
	)
	.bind(row.id)
	.bind(row.mfr_part)
	.bind(row.description)
	.bind(row.manufacturer)
	.bind(row.category)
	.bind(row.subcategory)
	.bind(row.package)
	.bind(row.tier)
	.bind(row.stock)
	.bind(row.unit_price)
	.bind(row.price_tiers)
	.bind(row.attributes)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn get_part(db: &Db, id: &str) -> Result<Option<PartRecord>> {
	let row: Option<ComponentRow> = sqlx::query_as("SELECT * FROM components WHERE id = ?")
		.bind(id)
		.fetch_optional(&db.pool)
		.await?;

	row.map(ComponentRow::into_part).transpose()
}

/// Filters and pages the catalog. Column filters run in SQL; attribute constraints need unit
/// parsing, so when present the rows are streamed in chunks and matched in process before paging.
pub async fn query_parts(db: &Db, criteria: &FilterCriteria, page: Page) -> Result<CatalogPage> {
	let parts = if criteria.attributes.is_empty() && criteria.attribute_ranges.is_empty() {
		fetch_rows(db, criteria, page.offset, page.limit + 1).await?
	} else {
		scan_rows(db, criteria, page).await?
	};
	let has_more = parts.len() > page.limit;
	let candidates =
		parts.iter().take(page.limit).map(|part| part.to_candidate(criteria)).collect::<Vec<_>>();

	tracing::debug!(
		offset = page.offset,
		limit = page.limit,
		returned = candidates.len(),
		has_more,
		"Catalog page fetched."
	);

	Ok(CatalogPage { candidates, has_more })
}

/// Visits every matching part once, walking the table in primary-key order so each chunk resumes
/// where the previous one ended. Returns the number of parts visited.
pub async fn scan_parts<F>(
	db: &Db,
	criteria: &FilterCriteria,
	chunk: usize,
	mut visit: F,
) -> Result<usize>
where
	F: FnMut(PartRecord),
{
	let chunk = chunk.max(1);
	let mut after: Option<String> = None;
	let mut visited = 0;

	loop {
		let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM components WHERE 1 = 1");

		push_filters(&mut builder, criteria);

		if let Some(last) = after.as_ref() {
			builder.push(" AND id > ");
			builder.push_bind(last.clone());
		}

		builder.push(" ORDER BY id ASC LIMIT ");
		builder.push_bind(to_i64(chunk));

		let rows: Vec<ComponentRow> = builder.build_query_as().fetch_all(&db.pool).await?;
		let done = rows.len() < chunk;

		for row in rows {
			let part = row.into_part()?;

			after = Some(part.id.clone());

			if criteria.matches(&part) {
				visited += 1;

				visit(part);
			}
		}

		if done {
			tracing::debug!(visited, "Catalog scan finished.");

			return Ok(visited);
		}
	}
}

async fn scan_rows(db: &Db, criteria: &FilterCriteria, page: Page) -> Result<Vec<PartRecord>> {
	let wanted = page.limit + 1;
	let mut skipped = 0;
	let mut sql_offset = 0;
	let mut out = Vec::new();

	loop {
		let chunk = fetch_rows(db, criteria, sql_offset, SCAN_CHUNK).await?;
		let exhausted = chunk.len() < SCAN_CHUNK;

		sql_offset += chunk.len();

		for part in chunk {
			if !criteria.matches(&part) {
				continue;
			}
			if skipped < page.offset {
				skipped += 1;

				continue;
			}

			out.push(part);

			if out.len() == wanted {
				return Ok(out);
			}
		}

		if exhausted {
			return Ok(out);
		}
	}
}

async fn fetch_rows(
	db: &Db,
	criteria: &FilterCriteria,
	offset: usize,
	limit: usize,
) -> Result<Vec<PartRecord>> {
	let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM components WHERE 1 = 1");

	push_filters(&mut builder, criteria);

	builder.push(' ');
	builder.push(ORDER_BY);
	builder.push(" LIMIT ");
	builder.push_bind(to_i64(limit));
	builder.push(" OFFSET ");
	builder.push_bind(to_i64(offset));

	let rows: Vec<ComponentRow> = builder.build_query_as().fetch_all(&db.pool).await?;

	rows.into_iter().map(ComponentRow::into_part).collect()
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, criteria: &FilterCriteria) {
	if let Some(category) = criteria.category.as_ref() {
		builder.push(" AND category = ");
		builder.push_bind(category.clone());
		builder.push(" COLLATE NOCASE");
	}
	if let Some(subcategory) = criteria.subcategory.as_ref() {
		builder.push(" AND subcategory = ");
		builder.push_bind(subcategory.clone());
		builder.push(" COLLATE NOCASE");
	}
	if let Some(manufacturer) = criteria.manufacturer.as_deref() {
		builder.push(" AND manufacturer LIKE ");
		builder.push_bind(like_pattern(manufacturer));
		builder.push(" ESCAPE '\\'");
	}
	if let Some(package) = criteria.package.as_ref() {
		builder.push(" AND package = ");
		builder.push_bind(package.clone());
		builder.push(" COLLATE NOCASE");
	}
	if criteria.basic_only {
		builder.push(" AND tier = 'basic'");
	}
	if criteria.in_stock_only {
		builder.push(" AND stock > 0");
	}
	if criteria.min_stock > 0 {
		builder.push(" AND stock >= ");
		builder.push_bind(i64::try_from(criteria.min_stock).unwrap_or(i64::MAX));
	}
	if let Some(max) = criteria.max_unit_cost {
		builder.push(" AND unit_price <= ");
		builder.push_bind(max);
	}

	for term in criteria.text_terms() {
		builder.push(
			" AND (description || ' ' || mfr_part || ' ' || manufacturer || ' ' || category) LIKE ",
		);
		builder.push_bind(like_pattern(&term));
		builder.push(" ESCAPE '\\'");
	}
}

fn like_pattern(raw: &str) -> String {
	let mut escaped = String::with_capacity(raw.len() + 2);

	escaped.push('%');

	for ch in raw.chars() {
		if matches!(ch, '%' | '_' | '\\') {
			escaped.push('\\');
		}

		escaped.push(ch);
	}

	escaped.push('%');

	escaped
}

fn to_i64(value: usize) -> i64 {
	i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
	#[test]
	fn like_pattern_escapes_wildcards() {
		assert_eq!(super::like_pattern("10%_x\\"), "%10\\%\\_x\\\\%");
		assert_eq!(super::like_pattern("murata"), "%murata%");
	}
}
