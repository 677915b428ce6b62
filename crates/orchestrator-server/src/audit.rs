//! Audit trail for dispatched operations
//!
//! Every dispatched operation emits exactly one start event and exactly one
//! terminal event, even on exceptional exit paths. Events are write-once and
//! append-only; the service is fire-and-forget from the caller's perspective.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use tracing::{error, info};
use uuid::Uuid;

use crate::error::ServerResult;

/// Lifecycle stage of an audit event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStage {
    Start,
    Completion,
}

/// Terminal outcome recorded on completion events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditOutcome {
    Succeeded,
    Failed,
}

/// Severity attached to an audited operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AuditSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditSeverity::Low => "low",
            AuditSeverity::Medium => "medium",
            AuditSeverity::High => "high",
            AuditSeverity::Critical => "critical",
        }
    }
}

/// One audit record
#[derive(Debug, Clone)]
pub struct AuditEvent {
    /// Operation name
    pub event_name: String,
    pub stage: AuditStage,
    /// Present on completion events only
    pub outcome: Option<AuditOutcome>,
    pub severity: AuditSeverity,
    /// Subject that issued the request
    pub actor: String,
    /// Correlates the start and completion events of one request
    pub request_id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Request context captured for diagnosis
    pub meta: Value,
    /// Stable error kind on failed completions
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
}

/// Sink for audit records
///
/// `audit_log` must not block the caller; ordering within one logical request
/// is preserved because the span emits sequentially.
pub trait AuditService: Send + Sync + Debug {
    fn audit_log(&self, event: AuditEvent);
}

/// Audit sink that emits structured tracing records on the `audit` target
#[derive(Debug, Clone, Default)]
pub struct TracingAuditService;

impl AuditService for TracingAuditService {
    fn audit_log(&self, event: AuditEvent) {
        let stage = match event.stage {
            AuditStage::Start => "start",
            AuditStage::Completion => "completion",
        };

        match event.outcome {
            Some(AuditOutcome::Failed) => error!(
                target: "audit",
                event = %event.event_name,
                stage,
                status = "failed",
                severity = event.severity.as_str(),
                actor = %event.actor,
                request_id = %event.request_id,
                error_kind = event.error_kind.as_deref().unwrap_or("unknown"),
                error = event.error_message.as_deref().unwrap_or(""),
                meta = %event.meta,
                "Audit event"
            ),
            Some(AuditOutcome::Succeeded) => info!(
                target: "audit",
                event = %event.event_name,
                stage,
                status = "succeeded",
                severity = event.severity.as_str(),
                actor = %event.actor,
                request_id = %event.request_id,
                meta = %event.meta,
                "Audit event"
            ),
            None => info!(
                target: "audit",
                event = %event.event_name,
                stage,
                severity = event.severity.as_str(),
                actor = %event.actor,
                request_id = %event.request_id,
                meta = %event.meta,
                "Audit event"
            ),
        }
    }
}

/// Audit sink that collects events in memory
///
/// This implementation is primarily intended for testing purposes.
#[derive(Debug, Default)]
pub struct RecordingAuditService {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded events in emission order
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl AuditService for RecordingAuditService {
    fn audit_log(&self, event: AuditEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Scoped audit bracket around one dispatched operation
///
/// Construction emits the start event. `finish` emits the matching terminal
/// event; if the span is dropped without finishing (panic, early exit), the
/// drop emits a failed completion so the bracket always closes.
#[derive(Debug)]
pub struct AuditSpan {
    service: Arc<dyn AuditService>,
    event_name: &'static str,
    severity: AuditSeverity,
    actor: String,
    request_id: Uuid,
    meta: Value,
    finished: bool,
}

impl AuditSpan {
    /// Open the bracket and emit the start event
    pub fn begin(
        service: Arc<dyn AuditService>,
        event_name: &'static str,
        severity: AuditSeverity,
        actor: impl Into<String>,
        meta: Value,
    ) -> Self {
        let span = Self {
            service,
            event_name,
            severity,
            actor: actor.into(),
            request_id: Uuid::new_v4(),
            meta,
            finished: false,
        };

        span.service.audit_log(AuditEvent {
            event_name: span.event_name.to_string(),
            stage: AuditStage::Start,
            outcome: None,
            severity: span.severity,
            actor: span.actor.clone(),
            request_id: span.request_id,
            timestamp: Utc::now(),
            meta: span.meta.clone(),
            error_kind: None,
            error_message: None,
        });

        span
    }

    /// Close the bracket according to the operation result
    pub fn finish<T>(mut self, result: &ServerResult<T>) {
        match result {
            Ok(_) => self.emit_completion(AuditOutcome::Succeeded, None),
            Err(err) => self.emit_completion(
                AuditOutcome::Failed,
                Some((err.kind().to_string(), err.to_string())),
            ),
        }
    }

    fn emit_completion(&mut self, outcome: AuditOutcome, err: Option<(String, String)>) {
        if self.finished {
            return;
        }
        self.finished = true;

        let (error_kind, error_message) = match err {
            Some((kind, message)) => (Some(kind), Some(message)),
            None => (None, None),
        };

        self.service.audit_log(AuditEvent {
            event_name: self.event_name.to_string(),
            stage: AuditStage::Completion,
            outcome: Some(outcome),
            severity: self.severity,
            actor: self.actor.clone(),
            request_id: self.request_id,
            timestamp: Utc::now(),
            meta: self.meta.clone(),
            error_kind,
            error_message,
        });
    }
}

impl Drop for AuditSpan {
    fn drop(&mut self) {
        if !self.finished {
            self.emit_completion(
                AuditOutcome::Failed,
                Some((
                    "InternalError".to_string(),
                    "operation exited without a recorded outcome".to_string(),
                )),
            );
        }
    }
}
