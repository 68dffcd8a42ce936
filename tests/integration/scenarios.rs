//! Workflows run end to end through the public API.

use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;

use numerox::engine::dataset;
use numerox::engine::earnings::EarningsAggregator;
use numerox::engine::poller::StatusPoller;
use numerox::engine::stakes::{self, StakeSort};
use numerox::types::{Credentials, MetricValue};
use numerox::NumeraiError;

use crate::mock_gateway::{entry, ManualClock, MockGateway, DATASET_BYTES};

fn creds() -> Credentials {
    Credentials::new("PUBLIC", "SECRET")
}

fn scoring_sequence() -> Vec<serde_json::Value> {
    vec![
        json!({"consistency": null, "originality": null,
               "concordance": null, "validation_logloss": null}),
        json!({"consistency": 91.6, "originality": {"pending": true, "value": null},
               "concordance": null, "validation_logloss": 0.6904}),
        json!({"consistency": 91.6, "originality": {"pending": false, "value": true},
               "concordance": {"pending": false, "value": true},
               "validation_logloss": 0.6904}),
    ]
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("numerox-{}-{name}", uuid::Uuid::new_v4()))
}

#[tokio::test]
async fn test_poller_resolves_in_three_polls() {
    let gateway = MockGateway::new(90).with_statuses(scoring_sequence());
    let clock = ManualClock::new();

    let report = StatusPoller::new(&gateway, &clock)
        .wait("upload-1", &creds())
        .await
        .unwrap();

    assert_eq!(report.polls, 3);
    assert_eq!(gateway.status_calls(), 3);
    assert!(report.status.is_complete());
    assert!(report.controlling_capital);
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(5); 2]);
    assert_eq!(report.resolutions.len(), 4);
    assert_eq!(report.status.get("consistency"), Some(MetricValue::Number(91.6)));
}

#[tokio::test]
async fn test_blocking_upload_waits_for_scoring() {
    let gateway = MockGateway::new(90).with_statuses(scoring_sequence());
    let clock = ManualClock::new();

    let (upload_id, status) = dataset::upload(
        &gateway,
        &clock,
        &PathBuf::from("/tmp/predictions.csv"),
        &creds(),
        true,
        false,
    )
    .await
    .unwrap();

    assert_eq!(upload_id, "MOCK-UPLOAD-1");
    assert_eq!(gateway.uploads(), vec!["/tmp/predictions.csv".to_string()]);
    assert!(!status.has_pending());
    assert_eq!(gateway.status_calls(), 3);
}

#[tokio::test]
async fn test_non_blocking_upload_polls_once() {
    let gateway = MockGateway::new(90).with_statuses(scoring_sequence());
    let clock = ManualClock::new();

    let (_, status) = dataset::upload(
        &gateway,
        &clock,
        &PathBuf::from("/tmp/predictions.csv"),
        &creds(),
        false,
        false,
    )
    .await
    .unwrap();

    assert!(status.has_pending());
    assert_eq!(gateway.status_calls(), 1);
    assert!(clock.sleeps().is_empty());
}

#[tokio::test]
async fn test_dataset_download_writes_file() {
    let gateway = MockGateway::new(90);
    let dest = temp_path("numerai_dataset.zip");

    let written = dataset::download_dataset(&gateway, &dest).await.unwrap();
    assert_eq!(written, dest);
    assert_eq!(std::fs::read(&dest).unwrap(), DATASET_BYTES);

    // second download overwrites
    std::fs::write(&dest, b"stale").unwrap();
    dataset::download_dataset(&gateway, &dest).await.unwrap();
    assert_eq!(std::fs::read(&dest).unwrap(), DATASET_BYTES);

    std::fs::remove_file(&dest).ok();
}

#[tokio::test]
async fn test_earnings_open_range_ends_at_current_round() {
    let gateway = MockGateway::new(15);
    let rows = EarningsAggregator::new(&gateway)
        .with_concurrency(4)
        .download_earnings(Some(10), None)
        .await
        .unwrap();

    let mut queried = gateway.rounds_queried();
    queried.sort();
    assert_eq!(queried, vec![10, 11, 12, 13, 14, 15]);

    // two paid users per round, never the unpaid one
    assert_eq!(rows.len(), 12);
    assert!(rows.windows(2).all(|w| w[0].round <= w[1].round));
    assert!(rows.iter().all(|r| r.user != "unpaid"));

    let user12 = rows.iter().find(|r| r.user == "user12").unwrap();
    assert_eq!(user12.nmr_main, 0.0);
    assert_eq!(user12.usd_main, 3.5);
}

#[tokio::test]
async fn test_ten99_for_2017() {
    let gateway = MockGateway::new(100);
    let rows = EarningsAggregator::new(&gateway)
        .ten99("alice", 2017)
        .await
        .unwrap();

    assert_eq!(rows.len(), 58);
    assert_eq!(rows.first().map(|r| r.round), Some(31));
    assert_eq!(rows.last().map(|r| r.round), Some(88));
    assert!(rows.iter().all(|r| r.usd_main == 1.0 && r.nmr_main == 0.25));
    assert_eq!(rows[0].usd_stake, 31.0);
}

#[tokio::test]
async fn test_ten99_other_years_not_implemented() {
    let gateway = MockGateway::new(100);
    let err = EarningsAggregator::new(&gateway)
        .ten99("alice", 2018)
        .await
        .unwrap_err();

    assert!(matches!(err, NumeraiError::NotImplemented(_)));
    assert!(gateway.rounds_queried().is_empty());
}

#[tokio::test]
async fn test_leaderboard_keeps_controlling_capital_only() {
    let gateway = MockGateway::new(92)
        .with_leaderboard(91, vec![entry("steady", 83.3), entry("shaky", 41.6)])
        .with_leaderboard(92, vec![entry("steady", 75.0)]);

    let rows = EarningsAggregator::new(&gateway)
        .get_leaderboard(Some(91), None)
        .await
        .unwrap();

    let got: Vec<(u32, &str)> = rows.iter().map(|r| (r.round, r.name.as_str())).collect();
    assert_eq!(got, vec![(91, "steady"), (92, "steady")]);
    assert_eq!(rows[0].usd_stake, 4.0);
    assert_eq!(rows[0].nmr_stake, 1.0);
    assert!(rows[0].live_logloss.is_nan());
}

#[tokio::test]
async fn test_stakes_first_round_boundary() {
    let gateway = MockGateway::new(90).with_stakes(vec![
        ("bob", "2017-06-30T12:00:00.000Z", 100.0, 0.5, Some(50.0)),
        ("carol", "2017-06-30T18:00:00.000Z", 300.0, 0.8, Some(240.0)),
        ("alice", "2017-06-29T12:00:00.000Z", 200.0, 0.5, Some(100.0)),
        ("dave", "2017-06-30T00:00:00.000Z", 0.0, 0.0, Some(10.0)),
        ("erin", "2017-06-30T00:00:00.000Z", 10.0, 0.9, None),
    ]);

    let err = stakes::get_stakes(&gateway, Some(60)).await.unwrap_err();
    assert!(matches!(err, NumeraiError::InvalidArgument(_)));
    assert!(gateway.rounds_queried().is_empty());

    let table = stakes::get_stakes(&gateway, Some(61)).await.unwrap();
    assert_eq!(gateway.rounds_queried(), vec![61]);

    let users: Vec<&str> = table.rows.iter().map(|r| r.user.as_str()).collect();
    assert_eq!(users, vec!["carol", "alice", "bob"]);
    assert_eq!(table.zero_confidence, vec!["dave".to_string()]);

    let cumsum: Vec<f64> = table.rows.iter().map(|r| r.cumulative_above).collect();
    assert_eq!(cumsum, vec![0.0, 300.0, 500.0]);
    assert!(table
        .rows
        .windows(2)
        .all(|w| w[0].confidence >= w[1].confidence));

    let text = stakes::render_stakes(&table, StakeSort::User);
    assert!(text.starts_with("days"));
    assert!(text.ends_with("C=0: dave"));
}

#[tokio::test]
async fn test_gateway_failure_surfaces_as_upstream() {
    let gateway = MockGateway::new(90).with_statuses(scoring_sequence());
    gateway.set_error("connection reset by peer");

    let err = EarningsAggregator::new(&gateway)
        .download_earnings(None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, NumeraiError::Upstream(_)));
    assert!(err.to_string().contains("connection reset"));

    let clock = ManualClock::new();
    let err = StatusPoller::new(&gateway, &clock)
        .wait("upload-1", &creds())
        .await
        .unwrap_err();
    assert!(matches!(err, NumeraiError::Upstream(_)));
    assert_eq!(gateway.status_calls(), 0);
}
