//! Scripted controller used by unit tests

use crate::error::{Error, Result};
use crate::zapi::codec::from_xml;
use crate::zapi::element::Element;
use crate::zapi::transport::ControllerTransport;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

const PASSED: &str = "<results status=\"passed\"/>";

/// Transport answering from per-operation response queues
///
/// Operations without a queued response get a bare passed result. Every
/// envelope sent, including dropped ones, is recorded.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<HashMap<String, VecDeque<String>>>,
    sent: Mutex<Vec<(String, String)>>,
    drops: Mutex<u32>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw `results` document for `operation`
    pub fn respond(&self, operation: &str, results: &str) {
        self.responses
            .lock()
            .entry(operation.to_string())
            .or_default()
            .push_back(format!("<netapp version=\"1.15\">{}</netapp>", results));
    }

    /// Queue a failed status for `operation`
    pub fn fail(&self, operation: &str, reason: &str, errno: &str) {
        self.respond(
            operation,
            &format!(
                "<results status=\"failed\" reason=\"{}\" errno=\"{}\"/>",
                reason, errno
            ),
        );
    }

    /// Fail the next `count` sends at the transport level
    pub fn drop_connections(&self, count: u32) {
        *self.drops.lock() = count;
    }

    /// Operation names in send order
    pub fn operations(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(op, _)| op.clone()).collect()
    }

    pub fn raw_requests(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(_, body)| body.clone()).collect()
    }

    /// Decoded request element of every send of `operation`
    pub fn requests(&self, operation: &str) -> Vec<Element> {
        self.sent
            .lock()
            .iter()
            .filter(|(op, _)| op == operation)
            .filter_map(|(_, body)| from_xml(body).ok())
            .filter_map(|root| root.child(operation).cloned())
            .collect()
    }

    pub fn last_request(&self, operation: &str) -> Option<Element> {
        self.requests(operation).pop()
    }
}

#[async_trait]
impl ControllerTransport for ScriptedTransport {
    async fn send(&self, operation: &str, body: String) -> Result<String> {
        self.sent.lock().push((operation.to_string(), body));

        {
            let mut drops = self.drops.lock();
            if *drops > 0 {
                *drops -= 1;
                return Err(Error::Transport(format!("{}: connection reset", operation)));
            }
        }

        let queued = self
            .responses
            .lock()
            .get_mut(operation)
            .and_then(VecDeque::pop_front);
        Ok(queued.unwrap_or_else(|| PASSED.to_string()))
    }
}
