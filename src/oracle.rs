//! External text-generation service used to pick among several candidate
//! vehicles. Treated as an opaque, possibly unavailable oracle: every reply
//! is validated before it is trusted.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::models::{Transaction, Vehicle};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleError {
    #[error("disambiguation service not configured")]
    Unavailable,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("service returned HTTP {0}")]
    Status(u16),

    #[error("malformed reply: {0}")]
    Malformed(String),
}

/// Narrow seam over the text-generation provider.
pub trait Disambiguator {
    fn disambiguate(&self, prompt: &str) -> Result<String, OracleError>;
}

/// Used when no endpoint is configured; every call takes the fallback path.
pub struct OfflineDisambiguator;

impl Disambiguator for OfflineDisambiguator {
    fn disambiguate(&self, _prompt: &str) -> Result<String, OracleError> {
        Err(OracleError::Unavailable)
    }
}

/// OpenAI-style chat-completion client with a bounded timeout and no retries.
pub struct HttpDisambiguator {
    agent: ureq::Agent,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl HttpDisambiguator {
    pub fn new(endpoint: &str, model: &str, api_key: Option<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            api_key,
        }
    }
}

impl Disambiguator for HttpDisambiguator {
    fn disambiguate(&self, prompt: &str) -> Result<String, OracleError> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0,
            "max_tokens": 16,
            "messages": [{ "role": "user", "content": prompt }],
        });
        let mut request = self.agent.post(&self.endpoint);
        if let Some(key) = &self.api_key {
            request = request.set("Authorization", &format!("Bearer {key}"));
        }
        let response = match request.send_json(body) {
            Ok(r) => r,
            Err(ureq::Error::Status(code, _)) => return Err(OracleError::Status(code)),
            Err(ureq::Error::Transport(t)) => return Err(OracleError::Transport(t.to_string())),
        };
        let parsed: ChatResponse = response
            .into_json()
            .map_err(|e| OracleError::Malformed(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| OracleError::Malformed("no choices in response".into()))
    }
}

/// A candidate vehicle that survived the odometer and fuel filters.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate<'a> {
    pub vehicle: &'a Vehicle,
    pub delta: u64,
}

/// Deterministic prompt listing candidates in the order given (1-based).
pub fn build_prompt(txn: &Transaction, candidates: &[Candidate<'_>]) -> String {
    let mut prompt = String::from(
        "A fleet fuel-card purchase must be assigned to exactly one company vehicle.\n",
    );
    prompt.push_str(&format!(
        "Purchase: date {}, vendor '{}', product '{}', odometer {}, amount {}.\n",
        txn.transaction_date.format("%Y-%m-%d"),
        txn.vendor_name,
        txn.product.as_deref().unwrap_or(""),
        txn.odometer.map(|o| o.to_string()).unwrap_or_default(),
        txn.amount,
    ));
    prompt.push_str("Candidates:\n");
    for (i, c) in candidates.iter().enumerate() {
        prompt.push_str(&format!(
            "{}. {} ({}, {}) recorded odometer {}, delta {}\n",
            i + 1,
            c.vehicle.identifier,
            c.vehicle.label(),
            c.vehicle.fuel_type,
            c.vehicle.current_odometer,
            c.delta,
        ));
    }
    prompt.push_str(
        "Answer with only the candidate number and your confidence from 0 to 100, \
         for example: 2, 85\n",
    );
    prompt
}

static REPLY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+)\s*[,\s]\s*(\d{1,3})\s*%?\s*$").unwrap());

/// Parse an "index, confidence" reply. Returns a 0-based index.
pub fn parse_reply(reply: &str, candidate_count: usize) -> Result<(usize, u8), OracleError> {
    let caps = REPLY_RE
        .captures(reply)
        .ok_or_else(|| OracleError::Malformed(format!("unexpected reply '{}'", reply.trim())))?;
    let index: usize = caps[1]
        .parse()
        .map_err(|_| OracleError::Malformed(format!("bad index '{}'", &caps[1])))?;
    let confidence: u16 = caps[2]
        .parse()
        .map_err(|_| OracleError::Malformed(format!("bad confidence '{}'", &caps[2])))?;
    if index == 0 || index > candidate_count {
        return Err(OracleError::Malformed(format!(
            "index {index} outside 1..={candidate_count}"
        )));
    }
    if confidence > 100 {
        return Err(OracleError::Malformed(format!("confidence {confidence} above 100")));
    }
    Ok((index - 1, confidence as u8))
}
