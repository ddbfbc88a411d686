#![allow(dead_code)]

use logfan::{Credentials, DeliveryError, DeliveryTarget, LogEvent, MailMessage, MailSender};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

pub fn target(station: &str) -> DeliveryTarget {
    DeliveryTarget::new(
        "smtp.example.org:587",
        Credentials::new("station@example.org", "secret"),
        "station@example.org",
        "ops@example.org",
        station,
    )
    .expect("valid target")
}

/// Renders only the message so digests are easy to assert on.
pub fn message_only(event: &LogEvent) -> String {
    event.message.clone()
}

/// Mail sender that always fails with a transport error.
#[derive(Debug, Default)]
pub struct FailingMailer {
    pub calls: AtomicUsize,
}

impl MailSender for FailingMailer {
    fn send(&self, _message: &MailMessage) -> Result<(), DeliveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(DeliveryError::transport("connection refused"))
    }
}

/// In-memory log capture for tracing-subscriber's fmt layer.
#[derive(Clone, Default)]
pub struct SharedWriter(pub Arc<Mutex<Vec<u8>>>);

impl SharedWriter {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl<'a> MakeWriter<'a> for SharedWriter {
    type Writer = SharedGuard;
    fn make_writer(&'a self) -> Self::Writer {
        SharedGuard(self.0.clone())
    }
}

pub struct SharedGuard(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for SharedGuard {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
