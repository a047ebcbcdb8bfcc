//! Integration tests for the full-register crawl
//!
//! These tests drive the controller against a mock registry and check what
//! ends up on disk and in the checkpoint file.

use crate::common::{
    build_controller, mount_bucket, mount_company, mount_profile_status, mount_search_page,
    requests_to, test_config, FakeMonitor, RecordingRepository,
};
use registry_crawl::api::Gateway;
use registry_crawl::crawler::{
    Checkpoint, CheckpointStatus, CheckpointStore, CrawlControl, CrawlController, CrawlError,
    OutcomeStatus, ResumePointer,
};
use registry_crawl::state::CrawlState;
use registry_crawl::storage::{Category, Repository};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ALPHA: [(&str, &str); 5] = [
    ("A1", "ALPHA 1 LTD"),
    ("A2", "ALPHA 2 LTD"),
    ("A3", "ALPHA 3 LTD"),
    ("A4", "ALPHA 4 LTD"),
    ("A5", "ALPHA 5 LTD"),
];

const BRAVO: [(&str, &str); 3] = [
    ("B1", "BRAVO 1 LTD"),
    ("B2", "BRAVO 2 LTD"),
    ("B3", "BRAVO 3 LTD"),
];

async fn mount_companies(server: &MockServer, items: &[(&str, &str)]) {
    for (number, _) in items {
        mount_company(server, number).await;
    }
}

fn saved(numbers: &[&str]) -> Vec<String> {
    numbers.iter().map(|n| n.to_string()).collect()
}

/// Search requests whose `start_index` is `offset`
async fn search_requests_at(server: &MockServer, offset: u64) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == "/search/companies")
        .filter(|r| {
            r.url
                .query_pairs()
                .any(|(k, v)| k == "start_index" && v == offset.to_string())
        })
        .count()
}

fn profiles_on_disk(data_dir: &Path) -> usize {
    std::fs::read_dir(data_dir.join(Category::Profile.dir_name()))
        .map(|entries| entries.count())
        .unwrap_or(0)
}

async fn wait_for_status(store: &CheckpointStore, status: CheckpointStatus) -> Checkpoint {
    for _ in 0..500 {
        if let Ok(Some(checkpoint)) = store.load() {
            if checkpoint.status == Some(status) {
                return checkpoint;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("checkpoint never reached status {}", status.as_str());
}

#[tokio::test]
async fn test_buckets_and_pages_are_crawled_in_order() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_bucket(&server, "A", &ALPHA[..3], 2).await;
    mount_bucket(&server, "B", &BRAVO[..2], 2).await;
    mount_companies(&server, &ALPHA[..3]).await;
    mount_companies(&server, &BRAVO[..2]).await;

    let config = test_config(&server, dir.path(), &["A", "B"], 2);
    let mut controller = build_controller(
        &config,
        FakeMonitor::with_free_gb(100.0),
        CrawlControl::shared(),
    );

    let outcome = controller.run(ResumePointer::fresh()).await.unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Completed);
    assert_eq!(outcome.total_processed, 5);
    assert_eq!(outcome.processed_this_run, 5);
    assert_eq!(
        controller.repository().saved(),
        saved(&["A1", "A2", "A3", "B1", "B2"])
    );
    assert_eq!(controller.state(), &CrawlState::Completed);

    for number in ["A1", "A2", "A3", "B1", "B2"] {
        assert!(controller.repository().is_complete(number));
    }

    // Completion resets the resume position
    let checkpoint = controller.checkpoints().load().unwrap().unwrap();
    assert!(checkpoint.is_completed());
    assert_eq!(checkpoint.last_index, 0);
    assert_eq!(checkpoint.last_company, None);
    assert_eq!(checkpoint.current_char, None);
    assert_eq!(checkpoint.total_processed, 5);
    assert!(checkpoint.time_taken.is_some());
}

#[tokio::test]
async fn test_missing_and_invalid_entities_are_skipped() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let items = [
        ("A1", "ALPHA 1 LTD"),
        ("A2", "ALPHA 2 LTD"),
        ("A3", "ALPHA 3 LTD"),
        ("", "ALPHA 4 LTD"),
        ("A5", "ALPHA 5 LTD"),
        ("A6", "ALPHA 6 LTD"),
    ];
    mount_search_page(&server, "A", 0, &items, 6).await;
    mount_profile_status(&server, "A3", 404).await;
    mount_companies(&server, &[items[0], items[1], items[4], items[5]]).await;

    let config = test_config(&server, dir.path(), &["A"], 10);
    let mut controller = build_controller(
        &config,
        FakeMonitor::with_free_gb(100.0),
        CrawlControl::shared(),
    );

    let outcome = controller.run(ResumePointer::fresh()).await.unwrap();

    assert_eq!(outcome.total_processed, 4);
    assert_eq!(outcome.not_found, 1);
    assert_eq!(outcome.skipped_invalid, 1);
    assert_eq!(
        controller.repository().saved(),
        saved(&["A1", "A2", "A5", "A6"])
    );
    assert!(!controller.repository().exists("A3", Category::Profile));
}

#[tokio::test]
async fn test_rate_limited_entity_is_counted_once() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_search_page(&server, "A", 0, &ALPHA[..1], 1).await;
    Mock::given(method("GET"))
        .and(path("/company/A1"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_company(&server, "A1").await;

    let config = test_config(&server, dir.path(), &["A"], 10);
    let mut controller = build_controller(
        &config,
        FakeMonitor::with_free_gb(100.0),
        CrawlControl::shared(),
    );

    let outcome = controller.run(ResumePointer::fresh()).await.unwrap();

    assert_eq!(outcome.total_processed, 1);
    assert_eq!(controller.repository().saved(), saved(&["A1"]));
    // Profile twice, officers and filings once
    assert_eq!(requests_to(&server, "/company/A1").await, 4);
}

#[tokio::test]
async fn test_rerun_skips_complete_entities() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_search_page(&server, "A", 0, &ALPHA[..2], 2).await;
    mount_companies(&server, &ALPHA[..2]).await;

    let config = test_config(&server, dir.path(), &["A"], 10);

    let mut first = build_controller(
        &config,
        FakeMonitor::with_free_gb(100.0),
        CrawlControl::shared(),
    );
    first.run(ResumePointer::fresh()).await.unwrap();
    let entity_requests = requests_to(&server, "/company/").await;
    assert_eq!(entity_requests, 6);

    let mut second = build_controller(
        &config,
        FakeMonitor::with_free_gb(100.0),
        CrawlControl::shared(),
    );
    let outcome = second.run(ResumePointer::fresh()).await.unwrap();

    assert_eq!(outcome.total_processed, 0);
    assert_eq!(outcome.skipped_existing, 2);
    assert!(second.repository().saved().is_empty());
    assert_eq!(requests_to(&server, "/company/").await, entity_requests);
}

#[tokio::test]
async fn test_entity_cap_and_resume_visit_each_entity_once() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_bucket(&server, "A", &ALPHA, 2).await;
    mount_companies(&server, &ALPHA).await;

    let mut config = test_config(&server, dir.path(), &["A"], 2);
    config.crawl.save_interval = 1;
    config.crawl.max_entities = Some(3);

    let mut first = build_controller(
        &config,
        FakeMonitor::with_free_gb(100.0),
        CrawlControl::shared(),
    );
    let outcome = first.run(ResumePointer::fresh()).await.unwrap();

    assert_eq!(outcome.status, OutcomeStatus::LimitReached);
    assert_eq!(outcome.total_processed, 3);
    assert_eq!(first.repository().saved(), saved(&["A1", "A2", "A3"]));
    assert_eq!(first.state(), &CrawlState::Completed);

    // The cap stops the run before the third entity's checkpoint
    let checkpoint = first.checkpoints().load().unwrap().unwrap();
    assert_eq!(checkpoint.last_index, 2);
    assert_eq!(checkpoint.last_company.as_deref(), Some("ALPHA 2 LTD"));
    assert_eq!(checkpoint.current_char.as_deref(), Some("A"));
    assert_eq!(checkpoint.total_processed, 2);
    assert_eq!(checkpoint.status, None);
    assert!(checkpoint.eta.is_some());

    let mut resumed_config = config.clone();
    resumed_config.crawl.max_entities = None;
    resumed_config.output.data_dir = dir.path().join("resumed");

    let mut second = build_controller(
        &resumed_config,
        FakeMonitor::with_free_gb(100.0),
        CrawlControl::shared(),
    );
    let resume = ResumePointer::from_checkpoint(&checkpoint, &resumed_config.crawl.buckets);
    let outcome = second.run(resume).await.unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Completed);
    assert_eq!(outcome.total_processed, 5);
    assert_eq!(outcome.processed_this_run, 3);
    assert_eq!(second.repository().saved(), saved(&["A3", "A4", "A5"]));

    // The resumed run starts at the page holding position 2
    assert_eq!(search_requests_at(&server, 0).await, 1);
    assert_eq!(search_requests_at(&server, 2).await, 2);
    assert_eq!(search_requests_at(&server, 4).await, 1);
}

#[tokio::test]
async fn test_resume_keeps_entities_whose_titles_sort_earlier() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    // Search results come back by relevance, not by title
    let items = [
        ("A1", "ALPHA ONE LTD"),
        ("A2", "AZURE LTD"),
        ("A3", "ACORN LTD"),
        ("A4", "ABBEY LTD"),
    ];
    mount_search_page(&server, "A", 0, &items, 4).await;
    mount_companies(&server, &items).await;

    let config = test_config(&server, dir.path(), &["A"], 10);
    let mut controller = build_controller(
        &config,
        FakeMonitor::with_free_gb(100.0),
        CrawlControl::shared(),
    );

    let checkpoint = Checkpoint::at("A", 2, Some("AZURE LTD".to_string()), 2, None);
    let resume = ResumePointer::from_checkpoint(&checkpoint, &config.crawl.buckets);
    let outcome = controller.run(resume).await.unwrap();

    assert_eq!(outcome.processed_this_run, 2);
    assert_eq!(outcome.total_processed, 4);
    assert_eq!(controller.repository().saved(), saved(&["A3", "A4"]));
    assert_eq!(requests_to(&server, "/company/A1").await, 0);
    assert_eq!(requests_to(&server, "/company/A2").await, 0);
}

#[tokio::test]
async fn test_explicit_index_ignores_company_title() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let items = [
        ("B1", "BRAVO ONE LTD"),
        ("B2", "BRAVO ZULU LTD"),
        ("B3", "BEACON LTD"),
    ];
    mount_search_page(&server, "B", 0, &items, 3).await;
    mount_companies(&server, &items).await;

    let config = test_config(&server, dir.path(), &["A", "B"], 10);
    let mut controller = build_controller(
        &config,
        FakeMonitor::with_free_gb(100.0),
        CrawlControl::shared(),
    );

    let resume = ResumePointer::from_request(1, Some("BRAVO ZULU LTD"), &config.crawl.buckets);
    let outcome = controller.run(resume).await.unwrap();

    assert_eq!(outcome.total_processed, 2);
    assert_eq!(controller.repository().saved(), saved(&["B2", "B3"]));
}

#[tokio::test]
async fn test_explicit_company_resumes_in_its_bucket() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_bucket(&server, "A", &ALPHA[..2], 10).await;
    mount_bucket(&server, "B", &BRAVO, 10).await;
    mount_companies(&server, &BRAVO).await;

    let config = test_config(&server, dir.path(), &["A", "B"], 10);
    let mut controller = build_controller(
        &config,
        FakeMonitor::with_free_gb(100.0),
        CrawlControl::shared(),
    );

    let resume = ResumePointer::from_request(0, Some("bravo 2"), &config.crawl.buckets);
    let outcome = controller.run(resume).await.unwrap();

    assert_eq!(outcome.total_processed, 2);
    assert_eq!(controller.repository().saved(), saved(&["B2", "B3"]));
    assert_eq!(requests_to(&server, "/company/A").await, 0);
    assert_eq!(requests_to(&server, "/company/B1").await, 0);
}

#[tokio::test]
async fn test_entity_failure_writes_checkpoint_and_resumes_there() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_search_page(&server, "A", 0, &ALPHA[..3], 3).await;
    Mock::given(method("GET"))
        .and(path("/company/A2"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_companies(&server, &ALPHA[..3]).await;

    let config = test_config(&server, dir.path(), &["A"], 10);
    let mut first = build_controller(
        &config,
        FakeMonitor::with_free_gb(100.0),
        CrawlControl::shared(),
    );

    let err = first.run(ResumePointer::fresh()).await.unwrap_err();
    match &err {
        CrawlError::Failed { bucket, index, .. } => {
            assert_eq!(bucket, "A");
            assert_eq!(*index, 1);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.api_error().and_then(|e| e.status()), Some(500));
    assert_eq!(first.state(), &CrawlState::Failed);

    let checkpoint = first.checkpoints().load().unwrap().unwrap();
    assert_eq!(checkpoint.last_index, 1);
    assert_eq!(checkpoint.last_company.as_deref(), Some("ALPHA 2 LTD"));
    assert_eq!(checkpoint.total_processed, 1);
    assert_eq!(checkpoint.status, None);

    let mut second = build_controller(
        &config,
        FakeMonitor::with_free_gb(100.0),
        CrawlControl::shared(),
    );
    let resume = ResumePointer::from_checkpoint(&checkpoint, &config.crawl.buckets);
    let outcome = second.run(resume).await.unwrap();

    assert_eq!(outcome.total_processed, 3);
    assert_eq!(second.repository().saved(), saved(&["A2", "A3"]));
}

#[tokio::test]
async fn test_pagination_failure_writes_checkpoint() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_search_page(&server, "A", 0, &ALPHA[..2], 4).await;
    mount_companies(&server, &ALPHA[..2]).await;
    Mock::given(method("GET"))
        .and(path("/search/companies"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let config = test_config(&server, dir.path(), &["A"], 2);
    let mut controller = build_controller(
        &config,
        FakeMonitor::with_free_gb(100.0),
        CrawlControl::shared(),
    );

    let err = controller.run(ResumePointer::fresh()).await.unwrap_err();
    assert!(matches!(err, CrawlError::Failed { index: 2, .. }));
    assert_eq!(err.api_error().and_then(|e| e.status()), Some(502));

    let checkpoint = controller.checkpoints().load().unwrap().unwrap();
    assert_eq!(checkpoint.last_index, 2);
    assert_eq!(checkpoint.last_company, None);
    assert_eq!(checkpoint.current_char.as_deref(), Some("A"));
    assert_eq!(checkpoint.total_processed, 2);
}

#[tokio::test]
async fn test_auth_failure_is_fatal() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_search_page(&server, "A", 0, &ALPHA[..2], 2).await;
    mount_profile_status(&server, "A1", 401).await;

    let config = test_config(&server, dir.path(), &["A"], 10);
    let mut controller = build_controller(
        &config,
        FakeMonitor::with_free_gb(100.0),
        CrawlControl::shared(),
    );

    let err = controller.run(ResumePointer::fresh()).await.unwrap_err();
    assert!(err.api_error().is_some_and(|e| e.is_auth()));
    assert_eq!(requests_to(&server, "/company/A2").await, 0);
}

#[tokio::test]
async fn test_interrupt_writes_checkpoint_between_entities() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_bucket(&server, "A", &ALPHA[..4], 2).await;
    mount_companies(&server, &ALPHA[..4]).await;

    let config = test_config(&server, dir.path(), &["A"], 2);
    let control = CrawlControl::shared();
    let repository =
        RecordingRepository::new(&config.output.data_dir).interrupt_after(2, control.clone());
    let mut controller = CrawlController::new(
        &config,
        Gateway::new(&config.api).unwrap(),
        repository,
        FakeMonitor::with_free_gb(100.0),
        control,
    );

    let err = controller.run(ResumePointer::fresh()).await.unwrap_err();
    assert!(matches!(err, CrawlError::Interrupted { total_processed: 2 }));
    assert_eq!(controller.state(), &CrawlState::Interrupted);
    assert_eq!(search_requests_at(&server, 2).await, 0);

    let checkpoint = controller.checkpoints().load().unwrap().unwrap();
    assert_eq!(checkpoint.status, Some(CheckpointStatus::Interrupted));
    assert_eq!(checkpoint.last_index, 2);
    assert_eq!(checkpoint.last_company.as_deref(), Some("ALPHA 2 LTD"));
    assert_eq!(checkpoint.total_processed, 2);

    let mut resumed = build_controller(
        &config,
        FakeMonitor::with_free_gb(100.0),
        CrawlControl::shared(),
    );
    let resume = ResumePointer::from_checkpoint(&checkpoint, &config.crawl.buckets);
    let outcome = resumed.run(resume).await.unwrap();

    assert_eq!(outcome.total_processed, 4);
    assert_eq!(resumed.repository().saved(), saved(&["A3", "A4"]));
}

#[tokio::test]
async fn test_interrupt_during_rate_limit_back_off() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_search_page(&server, "A", 0, &ALPHA[..2], 2).await;
    mount_company(&server, "A1").await;
    Mock::given(method("GET"))
        .and(path("/company/A2"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let mut config = test_config(&server, dir.path(), &["A"], 10);
    config.api.rate_limit_backoff_secs = 60;

    let control = CrawlControl::shared();
    let mut controller =
        build_controller(&config, FakeMonitor::with_free_gb(100.0), control.clone());

    let operator = async {
        while requests_to(&server, "/company/A2").await == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        control.interrupt();
    };

    let (result, ()) = tokio::time::timeout(
        Duration::from_secs(10),
        async { tokio::join!(controller.run(ResumePointer::fresh()), operator) },
    )
    .await
    .expect("interrupt did not end the back-off");

    let err = result.unwrap_err();
    assert!(matches!(err, CrawlError::Interrupted { total_processed: 1 }));
    assert_eq!(requests_to(&server, "/company/A2").await, 1);

    // A2 was not saved, so resuming starts with it
    let checkpoint = controller.checkpoints().load().unwrap().unwrap();
    assert_eq!(checkpoint.status, Some(CheckpointStatus::Interrupted));
    assert_eq!(checkpoint.last_index, 1);
    assert_eq!(checkpoint.total_processed, 1);
    assert_eq!(controller.repository().saved(), saved(&["A1"]));
}

#[tokio::test]
async fn test_low_disk_pauses_until_resumed() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_search_page(&server, "A", 0, &ALPHA[..3], 3).await;
    mount_companies(&server, &ALPHA[..3]).await;

    let mut config = test_config(&server, dir.path(), &["A"], 10);
    config.crawl.resource_check_interval = 1;
    config.crawl.min_free_disk_gb = 5.0;

    let monitor = FakeMonitor::with_free_gb(2.0);
    let control = CrawlControl::shared();
    let mut controller = build_controller(&config, monitor.clone(), control.clone());
    let store = CheckpointStore::new(config.output.checkpoint_path());
    let data_dir = config.output.data_dir.clone();

    let operator = async {
        let paused = wait_for_status(&store, CheckpointStatus::PausedLowDisk).await;
        // Nothing moves while paused
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(profiles_on_disk(&data_dir), 1);

        monitor.set_free_gb(50.0);
        control.resume();
        paused
    };

    let (outcome, paused) = tokio::join!(controller.run(ResumePointer::fresh()), operator);

    assert_eq!(paused.last_index, 1);
    assert_eq!(paused.last_company.as_deref(), Some("ALPHA 1 LTD"));
    assert_eq!(paused.total_processed, 1);

    let outcome = outcome.unwrap();
    assert_eq!(outcome.total_processed, 3);
    assert_eq!(
        controller.repository().saved(),
        saved(&["A1", "A2", "A3"])
    );
    assert!(controller.checkpoints().load().unwrap().unwrap().is_completed());
}

#[tokio::test]
async fn test_interrupt_during_low_disk_pause() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_search_page(&server, "A", 0, &ALPHA[..3], 3).await;
    mount_companies(&server, &ALPHA[..3]).await;

    let mut config = test_config(&server, dir.path(), &["A"], 10);
    config.crawl.resource_check_interval = 1;

    let control = CrawlControl::shared();
    let mut controller =
        build_controller(&config, FakeMonitor::with_free_gb(1.0), control.clone());
    let store = CheckpointStore::new(config.output.checkpoint_path());

    let operator = async {
        wait_for_status(&store, CheckpointStatus::PausedLowDisk).await;
        control.interrupt();
    };

    let (result, ()) = tokio::join!(controller.run(ResumePointer::fresh()), operator);

    assert!(result.unwrap_err().is_interrupted());
    let checkpoint = store.load().unwrap().unwrap();
    assert_eq!(checkpoint.status, Some(CheckpointStatus::Interrupted));
    assert_eq!(checkpoint.last_index, 1);
    assert_eq!(checkpoint.last_company.as_deref(), Some("ALPHA 1 LTD"));
    assert_eq!(controller.repository().saved(), saved(&["A1"]));
}

#[tokio::test]
async fn test_completed_checkpoint_starts_fresh() {
    let checkpoint = Checkpoint::completed(42, "0h 1m 0s".to_string());
    let buckets = vec!["A".to_string(), "B".to_string()];

    let resume = ResumePointer::resolve(Some(&checkpoint), None, None, false, &buckets);
    assert!(resume.is_fresh());
    assert_eq!(resume.total_processed, 0);
}
