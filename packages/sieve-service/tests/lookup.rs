use std::sync::Arc;

use sieve_domain::{AttributeValue, AvailabilityTier};
use sieve_service::{Error, MAX_COMPARE, SieveService};

fn service() -> SieveService {
	let mut capacitor = sieve_testkit::part("C1525", AvailabilityTier::Basic, 50_000, 0.0012);

	capacitor.attributes.insert(
		"Voltage".to_string(),
		AttributeValue::Measured { value: 10.0, unit: Some("V".to_string()) },
	);

	let mut rated = sieve_testkit::part("C307331", AvailabilityTier::Basic, 9_000, 0.004);

	rated.attributes.insert(
		"Voltage".to_string(),
		AttributeValue::Measured { value: 16.0, unit: Some("V".to_string()) },
	);

	let catalog =
		sieve_testkit::memory_catalog(vec![capacitor, rated]).expect("Catalog must build.");

	SieveService::new(
		sieve_testkit::test_config(),
		catalog,
		sieve_testkit::ScriptedFetcher::new(sieve_testkit::FetchStep::complete()),
	)
}

fn ids(raw: &[&str]) -> Vec<String> {
	raw.iter().map(|id| id.to_string()).collect()
}

#[tokio::test]
async fn details_returns_the_full_record() {
	let service = service();
	let part = service.details(" C1525 ").await.expect("Lookup must succeed.");

	assert_eq!(part.map(|part| part.stock), Some(50_000));
	assert!(service.details("C404").await.expect("Lookup must succeed.").is_none());
	assert!(matches!(service.details("  ").await, Err(Error::InvalidRequest { .. })));
}

#[tokio::test]
async fn compare_lines_up_attributes_and_lists_missing_ids() {
	let service = service();
	let comparison = service
		.compare(&ids(&["C307331", "C404", "C1525", "C307331"]))
		.await
		.expect("Comparison must succeed.");

	assert_eq!(
		comparison.parts.iter().map(|part| part.id.as_str()).collect::<Vec<_>>(),
		vec!["C307331", "C1525"]
	);
	assert_eq!(comparison.not_found, vec!["C404".to_string()]);
	assert_eq!(comparison.attributes["Voltage"].len(), 2);
	assert_eq!(comparison.differing(), vec!["Voltage"]);
}

#[tokio::test]
async fn compare_rejects_empty_oversized_and_unknown_sets() {
	let service = service();
	let many = (0..=MAX_COMPARE).map(|n| format!("C{n}")).collect::<Vec<_>>();

	assert!(matches!(service.compare(&[]).await, Err(Error::InvalidRequest { .. })));
	assert!(matches!(service.compare(&many).await, Err(Error::InvalidRequest { .. })));
	assert!(matches!(
		service.compare(&ids(&["C404", "C405"])).await,
		Err(Error::NotFound { .. })
	));
}

#[tokio::test]
async fn catalog_failures_propagate() {
	let catalog = Arc::new(sieve_testkit::FailingCatalog { message: "offline".to_string() });
	let service = SieveService::new(
		sieve_testkit::test_config(),
		catalog,
		sieve_testkit::ScriptedFetcher::new(sieve_testkit::FetchStep::complete()),
	);

	assert!(matches!(
		service.details("C1").await,
		Err(Error::CatalogUnavailable { .. })
	));
}
