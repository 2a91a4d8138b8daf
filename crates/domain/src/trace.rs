use serde::Serialize;

/// Structured trace events emitted across mcpgate crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionCreated {
        session_id: String,
    },
    SessionDestroyed {
        session_id: String,
        had_transport: bool,
    },
    SessionReattached {
        session_id: String,
    },
    StaleSessionPurged {
        session_id: String,
    },
    TransportError {
        session_id: String,
        error: String,
    },
    AdmissionRejected {
        session_id: Option<String>,
        code: i64,
    },
    StoreScan {
        pattern: String,
        keys: usize,
        round_trips: usize,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "mg_event");
    }
}
