use serde::{Deserialize, Serialize};

/// The opaque unit of work carried by a bale.
///
/// The payload is whatever the external runner knows how to execute: a
/// name identifying the job plus an arbitrary JSON body. A payload may
/// also carry its own intrinsic delay/queue/connection defaults, set
/// fluently before the payload is added to a builder. Those intrinsic
/// values lose only to an explicit per-job override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPayload {
    pub name: String,

    #[serde(default)]
    pub data: serde_json::Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_seconds: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<String>,
}

impl JobPayload {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: serde_json::Value::Null,
            delay_seconds: None,
            queue: None,
            connection: None,
        }
    }

    /// Attach an arbitrary JSON body for the runner.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// Set the payload's own delay default, in seconds.
    pub fn delay(mut self, seconds: i64) -> Self {
        self.delay_seconds = Some(seconds);
        self
    }

    /// Set the payload's own queue default.
    pub fn on_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    /// Set the payload's own connection default.
    pub fn on_connection(mut self, connection: impl Into<String>) -> Self {
        self.connection = Some(connection.into());
        self
    }
}

/// Tracks the lifecycle status of a bale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BaleStatus {
    Pending,
    Dispatched,
    Succeeded,
    Failed,
}

impl BaleStatus {
    /// Succeeded and Failed admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BaleStatus::Succeeded | BaleStatus::Failed)
    }
}

impl std::fmt::Display for BaleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BaleStatus::Pending => write!(f, "pending"),
            BaleStatus::Dispatched => write!(f, "dispatched"),
            BaleStatus::Succeeded => write!(f, "succeeded"),
            BaleStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A not-yet-persisted bale held by the builder.
///
/// Carries the raw payload plus whatever delay/queue/connection was
/// captured at `add_job` time: the explicit override if one was given,
/// otherwise the payload's intrinsic value, otherwise nothing. Chain-wide
/// globals and absolute defaults apply only when the chain is created.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingBale {
    pub payload: JobPayload,
    pub delay: Option<i64>,
    pub queue: Option<String>,
    pub connection: Option<String>,
}

impl PendingBale {
    /// Capture a payload with optional per-job overrides.
    ///
    /// An explicit override always wins over the payload's intrinsic
    /// value, regardless of when chain-wide globals are set.
    pub fn capture(
        payload: JobPayload,
        delay: Option<i64>,
        queue: Option<String>,
        connection: Option<String>,
    ) -> Self {
        let delay = delay.or(payload.delay_seconds);
        let queue = queue.or_else(|| payload.queue.clone());
        let connection = connection.or_else(|| payload.connection.clone());
        Self {
            payload,
            delay,
            queue,
            connection,
        }
    }
}

/// One unit of work within a chain, with resolved execution attributes.
///
/// Bales are keyed by `(chain_id, index)`; indices are dense and
/// 0-based. Resolved attributes are frozen at chain creation and never
/// recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bale {
    pub chain_id: String,
    pub index: usize,
    pub payload: JobPayload,
    pub delay_seconds: u64,
    pub queue: Option<String>,
    pub connection: Option<String>,
    pub status: BaleStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_defaults() {
        let payload = JobPayload::new("send-email");
        assert_eq!(payload.name, "send-email");
        assert_eq!(payload.data, serde_json::Value::Null);
        assert!(payload.delay_seconds.is_none());
        assert!(payload.queue.is_none());
        assert!(payload.connection.is_none());
    }

    #[test]
    fn payload_fluent_intrinsics() {
        let payload = JobPayload::new("send-email")
            .with_data(json!({"to": "sam@example.com"}))
            .delay(60)
            .on_queue("testing")
            .on_connection("database");

        assert_eq!(payload.delay_seconds, Some(60));
        assert_eq!(payload.queue.as_deref(), Some("testing"));
        assert_eq!(payload.connection.as_deref(), Some("database"));
        assert_eq!(payload.data["to"], "sam@example.com");
    }

    #[test]
    fn capture_without_overrides_takes_intrinsics() {
        let payload = JobPayload::new("name-job").delay(60).on_queue("testing");
        let pending = PendingBale::capture(payload, None, None, None);

        assert_eq!(pending.delay, Some(60));
        assert_eq!(pending.queue.as_deref(), Some("testing"));
        assert!(pending.connection.is_none());
    }

    #[test]
    fn capture_explicit_override_beats_intrinsic() {
        let payload = JobPayload::new("name-job")
            .delay(120)
            .on_queue("cowboy")
            .on_connection("redis");
        let pending = PendingBale::capture(
            payload,
            Some(60),
            Some("testing".into()),
            Some("database".into()),
        );

        assert_eq!(pending.delay, Some(60));
        assert_eq!(pending.queue.as_deref(), Some("testing"));
        assert_eq!(pending.connection.as_deref(), Some("database"));
    }

    #[test]
    fn capture_with_nothing_stays_unset() {
        let pending = PendingBale::capture(JobPayload::new("bare"), None, None, None);
        assert!(pending.delay.is_none());
        assert!(pending.queue.is_none());
        assert!(pending.connection.is_none());
    }

    #[test]
    fn bale_status_terminality() {
        assert!(!BaleStatus::Pending.is_terminal());
        assert!(!BaleStatus::Dispatched.is_terminal());
        assert!(BaleStatus::Succeeded.is_terminal());
        assert!(BaleStatus::Failed.is_terminal());
    }

    #[test]
    fn bale_status_display() {
        assert_eq!(BaleStatus::Pending.to_string(), "pending");
        assert_eq!(BaleStatus::Dispatched.to_string(), "dispatched");
        assert_eq!(BaleStatus::Succeeded.to_string(), "succeeded");
        assert_eq!(BaleStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn bale_serialization_roundtrip() {
        let bale = Bale {
            chain_id: "chain-1".into(),
            index: 2,
            payload: JobPayload::new("resize-image").with_data(json!({"width": 800})),
            delay_seconds: 30,
            queue: Some("images".into()),
            connection: None,
            status: BaleStatus::Dispatched,
        };

        let json = serde_json::to_string(&bale).unwrap();
        let back: Bale = serde_json::from_str(&json).unwrap();
        assert_eq!(back, bale);
    }

    #[test]
    fn payload_omits_unset_attributes_in_json() {
        let json = serde_json::to_string(&JobPayload::new("bare")).unwrap();
        assert!(!json.contains("queue"));
        assert!(!json.contains("connection"));
        assert!(!json.contains("delay_seconds"));
    }
}
