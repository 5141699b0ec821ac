use std::sync::Mutex;

use tracing::{info, warn};

/// One outbound message. Delivery is asynchronous relative to the request
/// cycle; a transport failure is never surfaced as a business error.
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

pub trait Mailer: Send + Sync {
    fn send(&self, mail: OutboundEmail);
}

/// Default transport: writes the message to the log. Stands in for real
/// delivery in development deployments, where the confirmation code is read
/// from the server log.
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, mail: OutboundEmail) {
        info!(to = %mail.to, subject = %mail.subject, "outbound email\n{}", mail.body);
    }
}

/// Captures messages instead of delivering them. Used by tests to observe
/// the confirmation-code dispatch.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<OutboundEmail>>,
}

impl Mailer for RecordingMailer {
    fn send(&self, mail: OutboundEmail) {
        match self.sent.lock() {
            Ok(mut sent) => sent.push(mail),
            Err(_) => warn!("recording mailer lock poisoned; message dropped"),
        }
    }
}
