//! Dispatched operation table
//!
//! Every inbound operation is one variant here. The table fixes the audit
//! event name, the audit severity, and the candidate permissions evaluated by
//! the gate, so adding an operation without deciding those is a compile error.

use orchestrator_engine_client::WorkflowId;

use crate::audit::AuditSeverity;
use crate::permissions::WorkflowPermission;

/// Operations served by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    GetWorkflowsOverview,
    GetWorkflowOverviewById,
    GetWorkflowById,
    GetWorkflowStatuses,
    GetWorkflowInputSchemaById,
    GetInstances,
    GetInstanceById,
    ExecuteWorkflow,
    RetriggerInstance,
    AbortInstance,
}

impl Operation {
    /// Audit event name
    pub fn name(&self) -> &'static str {
        match self {
            Operation::GetWorkflowsOverview => "getWorkflowsOverview",
            Operation::GetWorkflowOverviewById => "getWorkflowOverviewById",
            Operation::GetWorkflowById => "getWorkflowById",
            Operation::GetWorkflowStatuses => "getWorkflowStatuses",
            Operation::GetWorkflowInputSchemaById => "getWorkflowInputSchemaById",
            Operation::GetInstances => "getInstances",
            Operation::GetInstanceById => "getInstanceById",
            Operation::ExecuteWorkflow => "executeWorkflow",
            Operation::RetriggerInstance => "retriggerInstance",
            Operation::AbortInstance => "abortInstance",
        }
    }

    /// Audit severity; mutations rank above reads
    pub fn severity(&self) -> AuditSeverity {
        match self {
            Operation::ExecuteWorkflow
            | Operation::RetriggerInstance
            | Operation::AbortInstance => AuditSeverity::High,
            _ => AuditSeverity::Medium,
        }
    }

    /// Candidate permissions evaluated with any-of semantics
    ///
    /// The generic capability comes first so it is the one reported when both
    /// it and a resource-scoped grant would allow.
    pub fn candidate_permissions(&self, workflow_id: Option<&WorkflowId>) -> Vec<WorkflowPermission> {
        let (generic, specific): (WorkflowPermission, fn(WorkflowId) -> WorkflowPermission) =
            match self {
                Operation::GetWorkflowsOverview
                | Operation::GetWorkflowOverviewById
                | Operation::GetWorkflowById
                | Operation::GetWorkflowStatuses
                | Operation::GetWorkflowInputSchemaById
                | Operation::GetInstances
                | Operation::GetInstanceById => (WorkflowPermission::ReadAny, WorkflowPermission::Read),
                Operation::ExecuteWorkflow
                | Operation::RetriggerInstance
                | Operation::AbortInstance => (WorkflowPermission::UseAny, WorkflowPermission::Use),
            };

        match workflow_id {
            Some(id) => vec![generic, specific(id.clone())],
            None => vec![generic],
        }
    }
}
