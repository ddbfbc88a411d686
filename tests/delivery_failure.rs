mod common;

use common::test_helpers::{target, FailingMailer, SharedWriter};
use logfan::{
    AlertWorker, BufferedAlertSink, DeliveryRetry, InstantSleeper, Level, LogEvent,
    MemoryMailSender, MemorySink, Pipeline, PipelineLayer,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;

const WARNING: &str = "alert digest delivery failed; batch discarded";

#[test]
fn failed_delivery_emits_exactly_one_warning_and_empties_buffer() {
    let writer = SharedWriter::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(writer.clone())
        .with_target(true)
        .without_time()
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let mailer = Arc::new(FailingMailer::default());
    let sink = BufferedAlertSink::new(target("msp1"), 3, mailer.clone()).unwrap();
    for i in 0..3 {
        sink.accept(&LogEvent::new(Level::Error, format!("event {i}")));
    }

    assert!(sink.is_empty());
    assert_eq!(mailer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(sink.dropped_batches(), 1);
    let logs = writer.contents();
    assert_eq!(logs.matches(WARNING).count(), 1, "logs: {logs}");
    assert!(logs.contains("logfan::alert"));
    assert!(logs.contains("connection refused"));
}

#[test]
fn retries_still_warn_once_when_exhausted() {
    let writer = SharedWriter::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(writer.clone())
        .with_max_level(tracing::Level::DEBUG)
        .without_time()
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let mailer = Arc::new(FailingMailer::default());
    let retry = DeliveryRetry::builder().max_attempts(3).sleeper(InstantSleeper).build().unwrap();
    let sink = BufferedAlertSink::new(target("msp1"), 1, mailer.clone()).unwrap().with_retry(retry);
    let outcome = {
        sink.accept(&LogEvent::new(Level::Critical, "only"));
        sink.flush()
    };

    assert!(outcome.is_empty(), "capacity flush already drained the batch");
    assert_eq!(mailer.calls.load(Ordering::SeqCst), 3);
    let logs = writer.contents();
    assert_eq!(logs.matches(WARNING).count(), 1);
    assert_eq!(logs.matches("digest delivery failed; retrying").count(), 2);
}

#[test]
fn alert_failures_do_not_reenter_the_pipeline_through_the_bridge() {
    let mailer = Arc::new(FailingMailer::default());
    let memory = MemorySink::new();
    let pipeline = Pipeline::new()
        .with(memory.clone(), Level::Debug)
        .with(BufferedAlertSink::new(target("msp1"), 1, mailer.clone()).unwrap(), Level::Error);
    let subscriber = tracing_subscriber::registry().with(PipelineLayer::new(pipeline));

    tracing::subscriber::with_default(subscriber, || {
        tracing::error!(target: "station", "lamp failed");
    });

    assert_eq!(mailer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(memory.messages(), vec!["lamp failed"]);
}

#[tokio::test]
async fn dropped_worker_events_are_logged_with_backoff() {
    let writer = SharedWriter::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(writer.clone())
        .with_target(true)
        .without_time()
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let alert = BufferedAlertSink::new(target("msp1"), 10, MemoryMailSender::new()).unwrap();
    let worker = AlertWorker::spawn(Arc::new(alert), 1).unwrap();
    for i in 0..6 {
        worker.accept(&LogEvent::new(Level::Error, format!("event {i}"))).unwrap();
    }

    assert_eq!(worker.dropped(), 5);
    let logs = writer.contents();
    // drops 1, 2 and 4 are reported
    assert_eq!(logs.matches("alert worker queue full; event dropped").count(), 3, "logs: {logs}");
    assert!(logs.contains("logfan::worker"));
    assert!(logs.contains("dropped=4"));
}
