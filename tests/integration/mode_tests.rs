//! Query, single-company, export and statistics modes

use crate::common::{mount_company, mount_profile_status, mount_search_page, test_config};
use registry_crawl::api::Gateway;
use registry_crawl::crawler::{scrape_by_query, scrape_company, CheckpointStore, QuerySummary};
use registry_crawl::output::{export_to_csv, load_statistics, COMPANIES_CSV, OFFICERS_CSV};
use registry_crawl::storage::{open_repository, Repository};
use registry_crawl::RegistryError;
use tempfile::TempDir;
use wiremock::MockServer;

#[tokio::test]
async fn test_query_mode_saves_matches_and_skips_on_rerun() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let hits = [("11", "ACME ONE LTD"), ("12", "ACME TWO LTD"), ("13", "ACME THREE LTD")];
    mount_search_page(&server, "acme", 0, &hits[..2], 3).await;
    mount_search_page(&server, "acme", 2, &hits[2..], 3).await;
    mount_company(&server, "11").await;
    mount_company(&server, "12").await;
    mount_profile_status(&server, "13", 500).await;

    let config = test_config(&server, dir.path(), &["A"], 2);
    let gateway = Gateway::new(&config.api).unwrap();
    let mut repository = open_repository(&config.output.data_dir).unwrap();

    // One page only
    let summary = scrape_by_query(&gateway, &mut repository, "acme", 1, 2)
        .await
        .unwrap();
    assert_eq!(
        summary,
        QuerySummary {
            found: 2,
            saved: 2,
            skipped_existing: 0,
            failed: 0
        }
    );

    // Every page: the two saved companies are skipped, the third fails
    let summary = scrape_by_query(&gateway, &mut repository, "acme", 10, 2)
        .await
        .unwrap();
    assert_eq!(
        summary,
        QuerySummary {
            found: 3,
            saved: 0,
            skipped_existing: 2,
            failed: 1
        }
    );
    assert!(repository.is_complete("11"));
    assert!(!repository.is_complete("13"));
}

#[tokio::test]
async fn test_single_company_mode() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_company(&server, "01234567").await;
    mount_profile_status(&server, "99999999", 404).await;

    let config = test_config(&server, dir.path(), &["A"], 35);
    let gateway = Gateway::new(&config.api).unwrap();
    let mut repository = open_repository(&config.output.data_dir).unwrap();

    let saved_as = scrape_company(&gateway, &mut repository, " 01234567 ", 35)
        .await
        .unwrap();
    assert_eq!(saved_as, "01234567");
    assert!(repository.is_complete("01234567"));

    let err = scrape_company(&gateway, &mut repository, "99999999", 35)
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::Api(e) if e.is_not_found()));
}

#[tokio::test]
async fn test_export_and_statistics_after_query() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let hits = [("21", "BETA ONE LTD"), ("22", "BETA TWO LTD")];
    mount_search_page(&server, "beta", 0, &hits, 2).await;
    mount_company(&server, "21").await;
    mount_company(&server, "22").await;

    let config = test_config(&server, dir.path(), &["B"], 10);
    let gateway = Gateway::new(&config.api).unwrap();
    let mut repository = open_repository(&config.output.data_dir).unwrap();
    scrape_by_query(&gateway, &mut repository, "beta", 1, 10)
        .await
        .unwrap();

    let export_dir = config.output.export_dir();
    let summary = export_to_csv(&repository, &export_dir).unwrap();
    assert_eq!(summary.companies, 2);
    assert_eq!(summary.officers, 2);
    assert_eq!(summary.filings, 0);

    let mut reader = csv::Reader::from_path(export_dir.join(COMPANIES_CSV)).unwrap();
    let mut numbers: Vec<String> = reader
        .records()
        .map(|r| r.unwrap()[0].to_string())
        .collect();
    numbers.sort();
    assert_eq!(numbers, vec!["21", "22"]);
    assert!(export_dir.join(OFFICERS_CSV).exists());

    let stats = load_statistics(
        &repository,
        &CheckpointStore::new(config.output.checkpoint_path()),
    )
    .unwrap();
    assert_eq!(stats.companies, 2);
    assert_eq!(stats.complete, 2);
    assert!(stats.checkpoint.is_none());
}
