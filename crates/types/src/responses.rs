//! JSON bodies returned by the three services

use serde::{Deserialize, Serialize};

/// Service A `/webhook` acknowledgement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookReceived {
    pub received: bool,
}

/// Service A `/start` acknowledgement carrying the generated task id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Started {
    pub started: String,
}

/// Service B `/api/process` result with the status code service C answered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Forwarded {
    pub forwarded: u16,
}

/// Service C `/do-work` completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkDone {
    pub done: bool,
}
