//! Integration tests for the uptime monitor probing through the full organic path.

use crate::mock_infrastructure::{
    create_test_service, test_config, StakeTable, TestValidatorKey, ValidatorMockBuilder,
    ROOT_KEY,
};
use chrono::Utc;
use gateway_core::{config::AppConfig, monitor::UptimeMonitor, service::GatewayService};
use std::{sync::Arc, time::Duration};
use tokio::sync::broadcast;

fn monitor(service: Arc<GatewayService>, config: &AppConfig) -> UptimeMonitor {
    UptimeMonitor::new(
        service,
        ROOT_KEY.to_string(),
        Duration::from_secs(60),
        64,
        config.uptime.tier.clone(),
        config.uptime.target_model.clone(),
    )
}

#[tokio::test]
async fn test_probe_success_is_recorded() {
    let key = TestValidatorKey::new(3);
    let mut validator = ValidatorMockBuilder::new().await;
    validator.mock_compress_any("compressed");

    let config = test_config();
    let stakes = StakeTable::new(&[(key.identity.as_str(), 5000.0)]);
    let service = create_test_service(&config, stakes).await;
    service
        .pool_manager()
        .register_or_update(validator.record(&key.identity))
        .await
        .expect("register");

    let sample = monitor(service.clone(), &config).probe_once().await.expect("probe");
    assert!(sample.is_success);

    let report = service.uptime_report().await.expect("report");
    assert_eq!(report.total_checks, 1);
    assert_eq!(report.successful_checks, 1);
    assert!((report.uptime_percentage - 100.0).abs() < f64::EPSILON);
    assert!(report.last_failed_timestamp.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sample_is_stamped_when_the_probe_starts() {
    let key = TestValidatorKey::new(5);
    let mut validator = ValidatorMockBuilder::new().await;
    validator.mock_compress_slow("compressed", Duration::from_millis(400));

    let config = test_config();
    let stakes = StakeTable::new(&[(key.identity.as_str(), 5000.0)]);
    let service = create_test_service(&config, stakes).await;
    service
        .pool_manager()
        .register_or_update(validator.record(&key.identity))
        .await
        .expect("register");

    let before = Utc::now();
    let sample = monitor(service, &config).probe_once().await.expect("probe");
    let after = Utc::now();

    assert!(sample.is_success);
    assert!(after - before >= chrono::Duration::milliseconds(400));
    assert!(sample.timestamp >= before);
    assert!(sample.timestamp - before < chrono::Duration::milliseconds(200));
}

#[tokio::test]
async fn test_probe_without_validators_is_a_failure() {
    let config = test_config();
    let service = create_test_service(&config, StakeTable::default()).await;
    let monitor = monitor(service.clone(), &config);

    let sample = monitor.probe_once().await.expect("probe");
    assert!(!sample.is_success);

    let report = service.uptime_report().await.expect("report");
    assert_eq!(report.total_checks, 1);
    assert_eq!(report.successful_checks, 0);
    assert_eq!(
        report.last_failed_timestamp.map(|t| t.timestamp_millis()),
        Some(sample.timestamp.timestamp_millis())
    );
}

#[tokio::test]
async fn test_probe_with_empty_result_is_a_failure() {
    let key = TestValidatorKey::new(4);
    let mut validator = ValidatorMockBuilder::new().await;
    validator.mock_compress_any("");

    let config = test_config();
    let stakes = StakeTable::new(&[(key.identity.as_str(), 5000.0)]);
    let service = create_test_service(&config, stakes).await;
    service
        .pool_manager()
        .register_or_update(validator.record(&key.identity))
        .await
        .expect("register");

    let sample = monitor(service, &config).probe_once().await.expect("probe");
    assert!(!sample.is_success);
}

#[tokio::test]
async fn test_probes_are_not_rate_limited() {
    let key = TestValidatorKey::new(5);
    let mut validator = ValidatorMockBuilder::new().await;
    validator.mock_compress_any("compressed");

    let config = test_config();
    let service =
        create_test_service(&config, StakeTable::new(&[(key.identity.as_str(), 5000.0)])).await;
    service
        .pool_manager()
        .register_or_update(validator.record(&key.identity))
        .await
        .expect("register");
    let monitor = monitor(service.clone(), &config);

    for _ in 0..3 {
        assert!(monitor.probe_once().await.expect("probe").is_success);
    }

    let report = service.uptime_report().await.expect("report");
    assert_eq!(report.successful_checks, 3);
    assert_eq!(report.recent_status.len(), 3);
}

#[tokio::test]
async fn test_first_probe_waits_one_interval() {
    let config = test_config();
    let service = create_test_service(&config, StakeTable::default()).await;
    let monitor = Arc::new(UptimeMonitor::new(
        service.clone(),
        ROOT_KEY.to_string(),
        Duration::from_millis(300),
        64,
        config.uptime.tier.clone(),
        config.uptime.target_model.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = monitor.start_with_shutdown(shutdown_rx);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(service.uptime_report().await.expect("report").total_checks, 0);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(service.uptime_report().await.expect("report").total_checks >= 1);

    shutdown_tx.send(()).expect("send shutdown");
    handle.await.expect("monitor task");
}
