// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::*;
use pricewatch::config::provider::StaticConfigProvider;
use pricewatch::domain::models::job::JobRequest;
use pricewatch::domain::models::statistics::{ManagerState, StatisticsSnapshot};
use pricewatch::utils::errors::ManagerError;
use pricewatch::utils::retry_policy::RetryPolicy;
use pricewatch::workers::pool::ExecutionMode;
use pricewatch::workers::ManagerOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn assert_balanced(snap: &StatisticsSnapshot) {
    assert_eq!(
        snap.jobs_queued,
        snap.jobs_completed + snap.jobs_failed + snap.jobs_abandoned + snap.jobs_active,
        "statistics out of balance: {:?}",
        snap
    );
}

#[tokio::test(start_paused = true)]
async fn test_site_rate_limit_spaces_dispatches() {
    let adapter = Arc::new(ScriptedAdapter::new());
    let config = StaticConfigProvider::new()
        .with_default_rate_limit(Duration::ZERO)
        .with_site_rate_limit("ebay", Duration::from_secs(2))
        .with_retry_policy(RetryPolicy::immediate(0))
        .with_worker_count(3);
    let manager = build_manager(
        config,
        registry_for(&["ebay"], adapter.clone()),
        Arc::new(RecordingStore::default()),
    );

    for i in 0..3 {
        manager
            .add_job("ebay", format!("https://www.ebay.com/itm/{}", i), 1)
            .unwrap();
    }

    let begin = Instant::now();
    manager.start().await.unwrap();
    assert!(manager.wait_completion(Some(Duration::from_secs(30))).await);
    manager.stop(Duration::from_secs(1)).await.unwrap();

    let times = adapter.fetch_times();
    assert_eq!(times.len(), 3);
    for pair in times.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_secs(2));
    }
    assert!(*times.last().unwrap() - begin >= Duration::from_secs(4));
    assert_eq!(manager.statistics().jobs_completed, 3);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_site_does_not_block_other_sites() {
    let adapter = Arc::new(ScriptedAdapter::new());
    let config = StaticConfigProvider::new()
        .with_default_rate_limit(Duration::ZERO)
        .with_site_rate_limit("amazon", Duration::from_secs(10))
        .with_retry_policy(RetryPolicy::immediate(0))
        .with_worker_count(1);
    let manager = build_manager(
        config,
        registry_for(&["amazon", "ebay"], adapter.clone()),
        Arc::new(RecordingStore::default()),
    );

    manager.add_job("amazon", "https://www.amazon.com/dp/1", 1).unwrap();
    manager.add_job("amazon", "https://www.amazon.com/dp/2", 1).unwrap();
    manager.add_job("ebay", "https://www.ebay.com/itm/1", 5).unwrap();

    manager.start().await.unwrap();
    assert!(manager.wait_completion(Some(Duration::from_secs(60))).await);
    manager.stop(Duration::from_secs(1)).await.unwrap();

    // 第二个 amazon 任务被限流期间，优先级更低的 ebay 任务先被派发
    assert_eq!(
        adapter.fetched_urls(),
        vec![
            "https://www.amazon.com/dp/1",
            "https://www.ebay.com/itm/1",
            "https://www.amazon.com/dp/2",
        ]
    );
}

#[tokio::test]
async fn test_transient_failures_are_retried_until_success() {
    let adapter = Arc::new(ScriptedAdapter::new().failing_first(2));
    let store = Arc::new(RecordingStore::default());
    let manager = build_manager(
        fast_config(2, 3),
        registry_for(&["amazon"], adapter.clone()),
        store.clone(),
    );

    let url = "https://www.amazon.com/dp/B0BXQ";
    manager.add_job("amazon", url, 1).unwrap();
    manager.start().await.unwrap();
    assert!(manager.wait_completion(Some(Duration::from_secs(10))).await);
    manager.stop(Duration::from_secs(1)).await.unwrap();

    let snap = manager.statistics();
    assert_eq!(snap.jobs_completed, 1);
    assert_eq!(snap.jobs_failed, 0);
    assert_eq!(adapter.calls_for(url), 3);
    assert_eq!(store.price_point_count(), 1);
    assert_balanced(&snap);
}

#[tokio::test]
async fn test_persistent_failure_fails_after_max_retries() {
    let adapter = Arc::new(ScriptedAdapter::new());
    let store = Arc::new(RecordingStore::default());
    let manager = build_manager(
        fast_config(2, 3),
        registry_for(&["amazon"], adapter.clone()),
        store.clone(),
    );

    let url = "https://www.amazon.com/dp/always-fail";
    manager.add_job("amazon", url, 1).unwrap();
    manager.start().await.unwrap();
    assert!(manager.wait_completion(Some(Duration::from_secs(10))).await);
    manager.stop(Duration::from_secs(1)).await.unwrap();

    let snap = manager.statistics();
    assert_eq!(snap.jobs_failed, 1);
    assert_eq!(snap.jobs_completed, 0);
    // 首次执行加三次重试
    assert_eq!(adapter.calls_for(url), 4);
    assert_eq!(store.price_point_count(), 0);
    assert_balanced(&snap);
}

#[tokio::test(start_paused = true)]
async fn test_site_alias_shares_rate_limit() {
    let adapter = Arc::new(ScriptedAdapter::new());
    let config = StaticConfigProvider::new()
        .with_default_rate_limit(Duration::ZERO)
        .with_site_rate_limit("shopge", Duration::from_secs(3))
        .with_site_alias("shop.ge", "shopge")
        .with_retry_policy(RetryPolicy::immediate(0))
        .with_worker_count(2);
    let store = Arc::new(RecordingStore::default());
    let manager = build_manager(
        config,
        registry_for(&["shopge", "shop.ge"], adapter.clone()),
        store.clone(),
    );

    manager.add_job("shopge", "https://shop.ge/p/1", 1).unwrap();
    manager.add_job("shop.ge", "https://shop.ge/p/2", 1).unwrap();
    manager.start().await.unwrap();
    assert!(manager.wait_completion(Some(Duration::from_secs(30))).await);
    manager.stop(Duration::from_secs(1)).await.unwrap();

    let times = adapter.fetch_times();
    assert_eq!(times.len(), 2);
    assert!(times[1] - times[0] >= Duration::from_secs(3));

    let snap = manager.statistics();
    assert_eq!(snap.jobs_completed, 2);
    assert_eq!(snap.sites_processed, vec!["shopge"]);
    assert_eq!(*store.sites.lock(), vec!["shopge".to_string()]);
}

#[tokio::test]
async fn test_site_names_are_counted_case_insensitively() {
    let adapter = Arc::new(ScriptedAdapter::new());
    let store = Arc::new(RecordingStore::default());
    let manager = build_manager(
        fast_config(2, 0),
        registry_for(&["amazon"], adapter.clone()),
        store.clone(),
    );

    manager.add_job("Amazon", "https://www.amazon.com/dp/1", 1).unwrap();
    manager.add_job("amazon", "https://www.amazon.com/dp/2", 1).unwrap();
    manager.start().await.unwrap();
    assert!(manager.wait_completion(Some(Duration::from_secs(10))).await);
    manager.stop(Duration::from_secs(1)).await.unwrap();

    let snap = manager.statistics();
    assert_eq!(snap.jobs_completed, 2);
    assert_eq!(snap.sites_processed, vec!["amazon"]);
    assert_eq!(*store.sites.lock(), vec!["amazon".to_string()]);
}

#[tokio::test]
async fn test_persistence_failure_keeps_job_completed() {
    let adapter = Arc::new(ScriptedAdapter::new());
    let store = Arc::new(RecordingStore::failing_price_points());
    let manager = build_manager(
        fast_config(2, 3),
        registry_for(&["amazon"], adapter.clone()),
        store.clone(),
    );

    let url = "https://www.amazon.com/dp/B0DISK";
    manager.add_job("amazon", url, 1).unwrap();
    manager.start().await.unwrap();
    assert!(manager.wait_completion(Some(Duration::from_secs(10))).await);
    manager.stop(Duration::from_secs(1)).await.unwrap();

    let snap = manager.statistics();
    assert_eq!(snap.jobs_completed, 1);
    assert_eq!(snap.jobs_failed, 0);
    // 写入失败不会触发重试
    assert_eq!(adapter.calls_for(url), 1);
    assert_eq!(store.failed_writes.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(store.price_point_count(), 0);
    assert_balanced(&snap);
}

#[tokio::test]
async fn test_retry_waits_for_backoff() {
    let adapter = Arc::new(ScriptedAdapter::new().failing_first(1));
    let policy = RetryPolicy {
        max_retries: 2,
        backoff_schedule: vec![Duration::from_millis(200)],
        ..RetryPolicy::default()
    };
    let config = StaticConfigProvider::new()
        .with_default_rate_limit(Duration::ZERO)
        .with_retry_policy(policy)
        .with_worker_count(1);
    let manager = build_manager(
        config,
        registry_for(&["amazon"], adapter.clone()),
        Arc::new(RecordingStore::default()),
    );

    manager.add_job("amazon", "https://www.amazon.com/dp/1", 1).unwrap();
    manager.start().await.unwrap();
    assert!(manager.wait_completion(Some(Duration::from_secs(10))).await);
    manager.stop(Duration::from_secs(1)).await.unwrap();

    assert_eq!(adapter.total_calls(), 2);
    assert_eq!(manager.statistics().jobs_completed, 1);
    let times = adapter.fetch_times();
    assert!(times[1] - times[0] >= Duration::from_millis(190));
}

#[tokio::test]
async fn test_panicking_adapter_is_contained() {
    let adapter = Arc::new(ScriptedAdapter::new());
    let manager = build_manager(
        fast_config(2, 1),
        registry_for(&["amazon"], adapter.clone()),
        Arc::new(RecordingStore::default()),
    );

    manager.add_job("amazon", "https://www.amazon.com/dp/panic", 1).unwrap();
    manager.add_job("amazon", "https://www.amazon.com/dp/ok", 1).unwrap();
    manager.start().await.unwrap();
    assert!(manager.wait_completion(Some(Duration::from_secs(10))).await);
    manager.stop(Duration::from_secs(1)).await.unwrap();

    let snap = manager.statistics();
    assert_eq!(snap.jobs_failed, 1);
    assert_eq!(snap.jobs_completed, 1);
    assert_eq!(adapter.calls_for("https://www.amazon.com/dp/panic"), 2);
    assert_balanced(&snap);
}

#[tokio::test]
async fn test_unregistered_site_fails_without_stalling() {
    let adapter = Arc::new(ScriptedAdapter::new());
    let manager = build_manager(
        fast_config(1, 0),
        registry_for(&["amazon"], adapter.clone()),
        Arc::new(RecordingStore::default()),
    );

    manager.add_job("walmart", "https://www.walmart.com/ip/1", 1).unwrap();
    manager.add_job("amazon", "https://www.amazon.com/dp/1", 2).unwrap();
    manager.start().await.unwrap();
    assert!(manager.wait_completion(Some(Duration::from_secs(10))).await);
    manager.stop(Duration::from_secs(1)).await.unwrap();

    let snap = manager.statistics();
    assert_eq!(snap.jobs_failed, 1);
    assert_eq!(snap.jobs_completed, 1);
    assert_eq!(adapter.total_calls(), 1);
}

#[tokio::test]
async fn test_bulk_and_single_enqueue_are_equivalent() {
    let requests = vec![
        JobRequest::new("amazon", "https://www.amazon.com/dp/3").with_priority(3),
        JobRequest::new("amazon", "https://www.amazon.com/dp/1").with_priority(1),
        JobRequest::new("amazon", "https://www.amazon.com/dp/2a").with_priority(2),
        JobRequest::new("amazon", "https://www.amazon.com/dp/2b").with_priority(2),
    ];

    let single_adapter = Arc::new(ScriptedAdapter::new());
    let single = build_manager(
        fast_config(1, 0),
        registry_for(&["amazon"], single_adapter.clone()),
        Arc::new(RecordingStore::default()),
    );
    for request in requests.clone() {
        single
            .add_job(request.site, request.url, request.priority)
            .unwrap();
    }

    let bulk_adapter = Arc::new(ScriptedAdapter::new());
    let bulk = build_manager(
        fast_config(1, 0),
        registry_for(&["amazon"], bulk_adapter.clone()),
        Arc::new(RecordingStore::default()),
    );
    let ids = bulk.add_bulk_jobs(requests).unwrap();
    assert_eq!(ids.len(), 4);

    let (a, b) = (single.statistics(), bulk.statistics());
    assert_eq!(a.jobs_queued, b.jobs_queued);
    assert_eq!(a.queue_size, b.queue_size);

    for manager in [&single, &bulk] {
        manager.start().await.unwrap();
        assert!(manager.wait_completion(Some(Duration::from_secs(10))).await);
        manager.stop(Duration::from_secs(1)).await.unwrap();
    }

    let expected = vec![
        "https://www.amazon.com/dp/1",
        "https://www.amazon.com/dp/2a",
        "https://www.amazon.com/dp/2b",
        "https://www.amazon.com/dp/3",
    ];
    assert_eq!(single_adapter.fetched_urls(), expected);
    assert_eq!(bulk_adapter.fetched_urls(), expected);
}

#[tokio::test]
async fn test_empty_bulk_is_noop() {
    let manager = build_manager(
        fast_config(1, 0),
        registry_for(&["amazon"], Arc::new(ScriptedAdapter::new())),
        Arc::new(RecordingStore::default()),
    );
    let ids = manager.add_bulk_jobs(Vec::new()).unwrap();
    assert!(ids.is_empty());
    assert_eq!(manager.statistics().jobs_queued, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_workers_count_each_job_once() {
    let adapter = Arc::new(ScriptedAdapter::new().with_delay(Duration::from_millis(5)));
    let store = Arc::new(RecordingStore::default());
    let manager = build_manager(
        fast_config(8, 0),
        registry_for(&["amazon", "ebay"], adapter.clone()),
        store.clone(),
    );

    let requests = (0..60).map(|i| {
        let site = if i % 2 == 0 { "amazon" } else { "ebay" };
        JobRequest::new(site, format!("https://www.{}.com/p/{}", site, i))
    });
    manager.add_bulk_jobs(requests).unwrap();

    manager.start().await.unwrap();
    assert!(manager.wait_completion(Some(Duration::from_secs(30))).await);
    manager.stop(Duration::from_secs(5)).await.unwrap();

    let snap = manager.statistics();
    assert_eq!(snap.jobs_completed, 60);
    assert_eq!(adapter.total_calls(), 60);
    assert_eq!(store.price_point_count(), 60);
    assert_eq!(snap.sites_processed, vec!["amazon", "ebay"]);
    assert!(snap.avg_processing_seconds > 0.0);
    assert_balanced(&snap);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dedicated_execution_mode_completes_jobs() {
    let adapter = Arc::new(ScriptedAdapter::new());
    let manager = build_manager(
        fast_config(4, 0),
        registry_for(&["amazon"], adapter.clone()),
        Arc::new(RecordingStore::default()),
    )
    .with_options(ManagerOptions {
        execution_mode: ExecutionMode::Dedicated,
        ..fast_options()
    });

    manager
        .add_bulk_jobs((0..10).map(|i| JobRequest::new("amazon", format!("https://a/{}", i))))
        .unwrap();
    manager.start().await.unwrap();
    assert!(manager.wait_completion(Some(Duration::from_secs(10))).await);
    manager.stop(Duration::from_secs(5)).await.unwrap();

    assert_eq!(manager.statistics().jobs_completed, 10);
}

#[tokio::test]
async fn test_stop_waits_for_in_flight_job() {
    let adapter = Arc::new(ScriptedAdapter::new().with_delay(Duration::from_millis(300)));
    let manager = build_manager(
        fast_config(1, 0),
        registry_for(&["amazon"], adapter.clone()),
        Arc::new(RecordingStore::default()),
    );

    for i in 0..3 {
        manager
            .add_job("amazon", format!("https://www.amazon.com/dp/{}", i), 1)
            .unwrap();
    }
    manager.start().await.unwrap();

    while manager.statistics().jobs_in_flight == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    manager.stop(Duration::from_secs(5)).await.unwrap();

    let snap = manager.statistics();
    assert_eq!(snap.state, ManagerState::Stopped);
    assert_eq!(snap.jobs_completed, 1);
    assert_eq!(snap.jobs_abandoned, 2);
    assert_eq!(snap.jobs_active, 0);
    assert_eq!(snap.queue_size, 0);
    assert_eq!(adapter.total_calls(), 1);
    assert_balanced(&snap);
}

#[tokio::test]
async fn test_wait_completion_times_out() {
    let adapter = Arc::new(ScriptedAdapter::new().with_delay(Duration::from_secs(5)));
    let manager = build_manager(
        fast_config(1, 0),
        registry_for(&["amazon"], adapter),
        Arc::new(RecordingStore::default()),
    );

    manager.add_job("amazon", "https://www.amazon.com/dp/slow", 1).unwrap();
    manager.start().await.unwrap();
    assert!(!manager.wait_completion(Some(Duration::from_millis(100))).await);

    manager.stop(Duration::from_millis(50)).await.unwrap();
    let snap = manager.statistics();
    assert_eq!(snap.jobs_abandoned, 1);
    assert_balanced(&snap);
}

#[tokio::test]
async fn test_operations_after_stop_are_rejected() {
    let manager = build_manager(
        fast_config(1, 0),
        registry_for(&["amazon"], Arc::new(ScriptedAdapter::new())),
        Arc::new(RecordingStore::default()),
    );
    manager.start().await.unwrap();
    manager.stop(Duration::from_secs(1)).await.unwrap();

    assert!(matches!(
        manager.add_job("amazon", "https://a/1", 1),
        Err(ManagerError::InvalidState { .. })
    ));
    assert!(matches!(
        manager.add_bulk_jobs(vec![JobRequest::new("amazon", "https://a/2")]),
        Err(ManagerError::InvalidState { .. })
    ));
    assert!(matches!(
        manager.start().await,
        Err(ManagerError::InvalidState {
            state: ManagerState::Stopped,
            ..
        })
    ));
    // 统计快照在停止后仍可读取
    assert_eq!(manager.statistics().jobs_queued, 0);
}

#[tokio::test]
async fn test_jobs_added_while_running_are_processed() {
    let adapter = Arc::new(ScriptedAdapter::new());
    let manager = build_manager(
        fast_config(2, 0),
        registry_for(&["amazon"], adapter.clone()),
        Arc::new(RecordingStore::default()),
    );

    manager.start().await.unwrap();
    assert!(manager.wait_completion(Some(Duration::from_secs(1))).await);

    manager.add_job("amazon", "https://a/late", 1).unwrap();
    assert!(manager.wait_completion(Some(Duration::from_secs(10))).await);
    manager.stop(Duration::from_secs(1)).await.unwrap();

    assert_eq!(manager.statistics().jobs_completed, 1);
    assert_eq!(adapter.calls_for("https://a/late"), 1);
}
