//! Batch sub-dispatch: isolation, ordering and instrumentation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use eventmux::{async_trait, Context, Event, Handler, Mux, ServeError, ServeResult};
use eventmux_testing::{
    batch_request, request, Echo, Failing, MockTracker, RecordingTracker, TrackerCall,
};
use serde_json::json;

/// Sleeps a random few milliseconds, then echoes; tracks peak concurrency.
struct Sleepy {
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

#[async_trait]
impl Handler for Sleepy {
    async fn serve(&self, ctx: Context, event: &Event) -> ServeResult {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(fastrand::u64(0..20))).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        ctx.envelopes()
            .response(event, &event.payload)
            .map_err(ServeError::from)
    }
}

fn responses(event: &Event) -> Vec<Event> {
    event.decode_payload().unwrap()
}

#[tokio::test]
async fn test_batch_isolates_failures() {
    let tracker = Arc::new(MockTracker::new());
    let mux = Mux::builder()
        .tracker(Arc::clone(&tracker))
        .route("Mock-0", 1, Echo)
        .route("Mock-1", 2, Failing::default())
        .route("Mock-3", 4, Echo)
        .batch("batch", 1)
        .build();

    let items = vec![
        request("Mock-0", 1),
        request("Mock-1", 2),
        request("Mock-2", 3),
        request("Mock-3", 4),
    ];
    let batch = batch_request(items.clone(), false);

    let response = mux.dispatch(mux.context(), &batch).await;

    assert_eq!(response.name, "batch:response");
    assert_eq!(response.flow_id, batch.flow_id);

    let results = responses(&response);
    assert_eq!(results.len(), 4);

    assert_eq!(results[0].name, "Mock-0:response");
    assert_eq!(results[0].flow_id, items[0].flow_id);

    // failing handler's own envelope is kept
    assert_eq!(results[1].name, "Mock-1:error");
    assert_eq!(results[1].flow_id, items[1].flow_id);

    assert_eq!(results[2].name, "error");
    assert_eq!(results[2].flow_id, items[2].flow_id);
    assert_eq!(
        results[2].error_payload().unwrap().message,
        "Event \"Mock-2\" not found"
    );

    assert_eq!(results[3].name, "Mock-3:response");

    // batch itself + three matched items
    assert_eq!(tracker.start_count(), 4);
    assert_eq!(tracker.end_count(), 4);
    // failing item + missing item
    assert_eq!(tracker.notice_event_error_count(), 2);
}

#[tokio::test]
async fn test_batch_reports_item_failure_after_end() {
    let tracker = Arc::new(RecordingTracker::new());
    let mux = Mux::builder()
        .tracker(Arc::clone(&tracker))
        .route("broken", 1, Failing::new("boom"))
        .batch("batch", 1)
        .build();
    let item = request("broken", 1);
    let batch = batch_request(vec![item.clone()], false);

    mux.dispatch(mux.context(), &batch).await;

    let calls = tracker.calls();
    assert_eq!(calls.len(), 5);
    assert_eq!(
        calls[1..4],
        [
            TrackerCall::Start {
                name: "broken".to_string(),
                flow_id: item.flow_id.clone(),
            },
            TrackerCall::End {
                name: "broken".to_string(),
                flow_id: item.flow_id.clone(),
                error: Some("boom".to_string()),
            },
            TrackerCall::NoticeEventError {
                name: "broken".to_string(),
                flow_id: item.flow_id.clone(),
                error: "boom".to_string(),
            },
        ]
    );
    assert!(matches!(
        &calls[4],
        TrackerCall::End { name, error: None, .. } if name == "batch"
    ));
}

#[tokio::test]
async fn test_malformed_batch_payload_aborts() {
    let tracker = Arc::new(MockTracker::new());
    let mux = Mux::builder()
        .tracker(Arc::clone(&tracker))
        .batch("batch", 1)
        .build();
    let mut batch = request("batch", 1);
    batch.payload = json!({"parallel": false, "events": "INVALID"});

    let err = mux
        .try_dispatch(mux.context(), &batch)
        .await
        .unwrap_err();

    assert_eq!(err.response().name, "error");
    assert_eq!(err.response().flow_id, batch.flow_id);

    let response = mux.dispatch(mux.context(), &batch).await;
    assert_eq!(response.name, "error");
    assert_eq!(response.flow_id, batch.flow_id);
    // only the top-level start/end pairs, no sub-dispatch
    assert_eq!(tracker.start_count(), 2);
    assert_eq!(tracker.notice_event_error_count(), 0);
}

#[tokio::test]
async fn test_item_without_version_fails_alone() {
    let tracker = Arc::new(MockTracker::new());
    let mux = Mux::builder()
        .tracker(Arc::clone(&tracker))
        .route("ping", 1, Echo)
        .batch("batch", 1)
        .build();
    let mut batch = request("batch", 1);
    batch.payload = json!({
        "events": [
            {"name": "ping", "version": 1, "flowId": "a"},
            {"name": "ping", "flowId": "b"},
        ]
    });

    let response = mux.dispatch(mux.context(), &batch).await;

    assert_eq!(response.name, "batch:response");
    let results = responses(&response);
    assert_eq!(results.len(), 2);

    assert_eq!(results[0].name, "ping:response");
    assert_eq!(results[0].flow_id, "a");

    assert_eq!(results[1].name, "error");
    assert_eq!(results[1].flow_id, "b");
    assert_eq!(
        results[1].error_payload().unwrap().message,
        "Event \"ping\" not found"
    );
    assert_eq!(tracker.notice_event_error_count(), 1);
}

#[tokio::test]
async fn test_parallel_batch_preserves_order() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let mux = Mux::builder()
        .route(
            "sleepy",
            1,
            Sleepy {
                in_flight: Arc::clone(&in_flight),
                peak: Arc::clone(&peak),
            },
        )
        .batch("batch", 1)
        .batch_concurrency(3)
        .build();

    let items: Vec<Event> = (0..12)
        .map(|i| {
            let mut item = request("sleepy", 1);
            item.payload = json!({"step": i});
            item
        })
        .collect();
    let batch = batch_request(items.clone(), true);

    let response = mux.dispatch(mux.context(), &batch).await;
    let results = responses(&response);

    assert_eq!(results.len(), items.len());
    for (i, (result, item)) in results.iter().zip(&items).enumerate() {
        assert_eq!(result.payload, json!({"step": i}));
        assert_eq!(result.flow_id, item.flow_id);
    }
    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(in_flight.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_sequential_batch_runs_one_at_a_time() {
    let peak = Arc::new(AtomicUsize::new(0));
    let mux = Mux::builder()
        .route(
            "sleepy",
            1,
            Sleepy {
                in_flight: Arc::new(AtomicUsize::new(0)),
                peak: Arc::clone(&peak),
            },
        )
        .batch("batch", 1)
        .build();

    let batch = batch_request((0..4).map(|_| request("sleepy", 1)).collect(), false);
    let response = mux.dispatch(mux.context(), &batch).await;

    assert_eq!(responses(&response).len(), 4);
    assert_eq!(peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_nested_batch() {
    let mux = Mux::builder()
        .route("ping", 1, Echo)
        .batch("batch", 1)
        .build();

    let inner = batch_request(vec![request("ping", 1), request("missing", 1)], false);
    let outer = batch_request(vec![inner.clone(), request("ping", 1)], true);

    let response = mux.dispatch(mux.context(), &outer).await;
    let results = responses(&response);

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].name, "batch:response");
    assert_eq!(results[0].flow_id, inner.flow_id);

    let nested = responses(&results[0]);
    assert_eq!(nested[0].name, "ping:response");
    assert_eq!(nested[1].name, "error");
    assert_eq!(results[1].name, "ping:response");
}
