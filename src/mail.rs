//! Delivery collaborator contract for alert digests.
//!
//! The pipeline never speaks a mail protocol itself. A [`MailSender`] receives a fully composed
//! [`MailMessage`] and is responsible for transport, authentication and any timeout.

use crate::error::DeliveryError;
use crate::target::{Credentials, DeliveryTarget};
use std::sync::{Arc, Mutex};

/// One composed digest message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub host: String,
    pub port: u16,
    pub credentials: Credentials,
    pub sender: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
}

impl MailMessage {
    /// Address a message to `target`.
    pub fn compose(target: &DeliveryTarget, subject: String, body: String) -> Self {
        Self {
            host: target.host().to_string(),
            port: target.port(),
            credentials: target.credentials().clone(),
            sender: target.sender().to_string(),
            recipients: target.recipients().to_vec(),
            subject,
            body,
        }
    }
}

/// Sends composed messages. Implementations own transport and timeout behavior.
pub trait MailSender: Send + Sync + std::fmt::Debug {
    fn send(&self, message: &MailMessage) -> Result<(), DeliveryError>;
}

impl<T: MailSender + ?Sized> MailSender for Arc<T> {
    fn send(&self, message: &MailMessage) -> Result<(), DeliveryError> {
        (**self).send(message)
    }
}

/// A mail sender that records messages in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryMailSender {
    sent: Arc<Mutex<Vec<MailMessage>>>,
}

impl MemoryMailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl MailSender for MemoryMailSender {
    fn send(&self, message: &MailMessage) -> Result<(), DeliveryError> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).push(message.clone());
        Ok(())
    }
}
