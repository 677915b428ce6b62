//! Permission model and gate for the orchestrator gateway
//!
//! The gateway never decides permissions itself; it evaluates candidate
//! permissions against the portal's permission service and combines the
//! decisions. The gate adds two behaviors on top of the batched service
//! contract: any-of evaluation over a candidate list, and filtering a set of
//! workflow ids down to the authorized subset.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use orchestrator_engine_client::WorkflowId;

use crate::error::{ServerError, ServerResult};

/// Outcome of a permission evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

/// A capability a caller may hold on workflows
///
/// Generic capabilities cover every workflow; resource-scoped ones are
/// parameterized by a workflow id. A generic grant implies all corresponding
/// resource-scoped grants.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WorkflowPermission {
    /// See any workflow
    ReadAny,
    /// Start, retrigger or abort any workflow
    UseAny,
    /// See one workflow
    Read(WorkflowId),
    /// Start, retrigger or abort one workflow
    Use(WorkflowId),
}

impl WorkflowPermission {
    /// Whether a grant of `self` satisfies a request for `candidate`
    pub fn implies(&self, candidate: &WorkflowPermission) -> bool {
        match (self, candidate) {
            (WorkflowPermission::ReadAny, WorkflowPermission::ReadAny) => true,
            (WorkflowPermission::ReadAny, WorkflowPermission::Read(_)) => true,
            (WorkflowPermission::UseAny, WorkflowPermission::UseAny) => true,
            (WorkflowPermission::UseAny, WorkflowPermission::Use(_)) => true,
            (WorkflowPermission::Read(a), WorkflowPermission::Read(b)) => a == b,
            (WorkflowPermission::Use(a), WorkflowPermission::Use(b)) => a == b,
            _ => false,
        }
    }
}

impl Display for WorkflowPermission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowPermission::ReadAny => write!(f, "workflow:read:*"),
            WorkflowPermission::UseAny => write!(f, "workflow:use:*"),
            WorkflowPermission::Read(id) => write!(f, "workflow:read:{}", id),
            WorkflowPermission::Use(id) => write!(f, "workflow:use:{}", id),
        }
    }
}

impl FromStr for WorkflowPermission {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split(':').collect::<Vec<_>>().as_slice() {
            ["workflow", "read", "*"] => Ok(WorkflowPermission::ReadAny),
            ["workflow", "use", "*"] => Ok(WorkflowPermission::UseAny),
            ["workflow", "read", id] if !id.is_empty() => {
                Ok(WorkflowPermission::Read(WorkflowId::new(*id)))
            }
            ["workflow", "use", id] if !id.is_empty() => {
                Ok(WorkflowPermission::Use(WorkflowId::new(*id)))
            }
            _ => Err(ServerError::ConfigurationError(format!(
                "Invalid permission grant: {}",
                s
            ))),
        }
    }
}

/// Caller identity attached to a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Opaque subject, resolved by the portal's auth layer in front of this gateway
    pub subject: String,
}

impl Credentials {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
        }
    }

    /// Identity used when a request carries no authorization header
    pub fn anonymous() -> Self {
        Self {
            subject: "anonymous".to_string(),
        }
    }
}

/// Batched, order-preserving permission evaluation service
///
/// An `Err` means the evaluation itself failed; it is never folded into an
/// ALLOW or DENY decision.
#[async_trait]
pub trait PermissionService: Send + Sync + Debug {
    /// Evaluate every request, returning one decision per request in order
    async fn authorize(
        &self,
        requests: &[WorkflowPermission],
        credentials: &Credentials,
    ) -> ServerResult<Vec<Decision>>;
}

/// Combines batched permission decisions for the dispatch layer
#[derive(Debug, Clone)]
pub struct PermissionGate {
    service: Arc<dyn PermissionService>,
}

impl PermissionGate {
    pub fn new(service: Arc<dyn PermissionService>) -> Self {
        Self { service }
    }

    /// Evaluate candidates in order and allow if any one of them allows
    ///
    /// The boolean outcome is a logical OR; the order only determines which
    /// granted permission is reported in logs. An empty candidate list denies.
    pub async fn any_of(
        &self,
        candidates: &[WorkflowPermission],
        credentials: &Credentials,
    ) -> ServerResult<Decision> {
        if candidates.is_empty() {
            return Ok(Decision::Deny);
        }

        let decisions = self.service.authorize(candidates, credentials).await?;
        if decisions.len() != candidates.len() {
            return Err(ServerError::PermissionServiceError(format!(
                "expected {} decisions, got {}",
                candidates.len(),
                decisions.len()
            )));
        }

        match candidates
            .iter()
            .zip(decisions.iter())
            .find(|(_, decision)| **decision == Decision::Allow)
        {
            Some((granted, _)) => {
                debug!(subject = %credentials.subject, permission = %granted, "Authorization allowed");
                Ok(Decision::Allow)
            }
            None => Ok(Decision::Deny),
        }
    }

    /// Filter `ids` down to the subset the caller may see
    ///
    /// The generic permission is evaluated first; an ALLOW short-circuits and
    /// returns all ids without any per-id evaluation. Otherwise the specific
    /// permission for every id is evaluated in one batched call and exactly
    /// the allowed ids are returned, input order preserved.
    pub async fn filter_authorized(
        &self,
        generic: WorkflowPermission,
        specific: impl Fn(&WorkflowId) -> WorkflowPermission + Send,
        ids: Vec<WorkflowId>,
        credentials: &Credentials,
    ) -> ServerResult<Vec<WorkflowId>> {
        let generic_decisions = self
            .service
            .authorize(std::slice::from_ref(&generic), credentials)
            .await?;
        if generic_decisions.first() == Some(&Decision::Allow) {
            debug!(subject = %credentials.subject, permission = %generic, "Generic grant, skipping per-id evaluation");
            return Ok(ids);
        }

        if ids.is_empty() {
            return Ok(ids);
        }

        let requests: Vec<WorkflowPermission> = ids.iter().map(|id| specific(id)).collect();
        let decisions = self.service.authorize(&requests, credentials).await?;
        if decisions.len() != ids.len() {
            return Err(ServerError::PermissionServiceError(format!(
                "expected {} decisions, got {}",
                ids.len(),
                decisions.len()
            )));
        }

        Ok(ids
            .into_iter()
            .zip(decisions)
            .filter(|(_, decision)| *decision == Decision::Allow)
            .map(|(id, _)| id)
            .collect())
    }
}

/// Permission service backed by a static grants table
///
/// Grants are keyed by subject and written in the `workflow:<action>:<id|*>`
/// form. This is the production default; richer portals plug their own
/// `PermissionService` in instead.
#[derive(Debug, Clone, Default)]
pub struct StaticPermissionService {
    grants: HashMap<String, Vec<WorkflowPermission>>,
}

impl StaticPermissionService {
    /// Create a service with no grants (every evaluation denies)
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a grant for a subject
    pub fn grant(mut self, subject: impl Into<String>, permission: WorkflowPermission) -> Self {
        self.grants.entry(subject.into()).or_default().push(permission);
        self
    }

    /// Load grants from a YAML file mapping subjects to grant strings
    pub fn from_file(path: impl AsRef<Path>) -> ServerResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let parsed: HashMap<String, Vec<String>> = serde_yaml::from_str(&raw)?;

        let mut grants = HashMap::new();
        for (subject, entries) in parsed {
            let permissions = entries
                .iter()
                .map(|entry| entry.parse())
                .collect::<ServerResult<Vec<WorkflowPermission>>>()?;
            grants.insert(subject, permissions);
        }

        Ok(Self { grants })
    }
}

#[async_trait]
impl PermissionService for StaticPermissionService {
    async fn authorize(
        &self,
        requests: &[WorkflowPermission],
        credentials: &Credentials,
    ) -> ServerResult<Vec<Decision>> {
        let held = self.grants.get(&credentials.subject);

        Ok(requests
            .iter()
            .map(|candidate| match held {
                Some(grants) if grants.iter().any(|g| g.implies(candidate)) => Decision::Allow,
                _ => Decision::Deny,
            })
            .collect())
    }
}

/// Permission service that allows everything
///
/// Used when no grants file is configured. Development only.
#[derive(Debug, Clone, Default)]
pub struct AllowAllPermissionService;

#[async_trait]
impl PermissionService for AllowAllPermissionService {
    async fn authorize(
        &self,
        requests: &[WorkflowPermission],
        _credentials: &Credentials,
    ) -> ServerResult<Vec<Decision>> {
        Ok(vec![Decision::Allow; requests.len()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_grants_imply_specific_ones() {
        let read_any = WorkflowPermission::ReadAny;
        assert!(read_any.implies(&WorkflowPermission::Read(WorkflowId::new("wf-a"))));
        assert!(!read_any.implies(&WorkflowPermission::Use(WorkflowId::new("wf-a"))));
        assert!(!read_any.implies(&WorkflowPermission::UseAny));
    }

    #[test]
    fn specific_grants_match_only_their_workflow() {
        let read_a = WorkflowPermission::Read(WorkflowId::new("wf-a"));
        assert!(read_a.implies(&WorkflowPermission::Read(WorkflowId::new("wf-a"))));
        assert!(!read_a.implies(&WorkflowPermission::Read(WorkflowId::new("wf-b"))));
        assert!(!read_a.implies(&WorkflowPermission::ReadAny));
    }

    #[test]
    fn grant_strings_round_trip() {
        for raw in [
            "workflow:read:*",
            "workflow:use:*",
            "workflow:read:wf-a",
            "workflow:use:wf-b",
        ] {
            let parsed: WorkflowPermission = raw.parse().unwrap();
            assert_eq!(parsed.to_string(), raw);
        }
    }

    #[test]
    fn malformed_grant_strings_are_rejected() {
        assert!("workflow:delete:wf-a".parse::<WorkflowPermission>().is_err());
        assert!("workflow:read:".parse::<WorkflowPermission>().is_err());
        assert!("read:*".parse::<WorkflowPermission>().is_err());
    }

    #[tokio::test]
    async fn static_service_decides_per_request_in_order() {
        let service = StaticPermissionService::new()
            .grant("user:alice", WorkflowPermission::Read(WorkflowId::new("wf-a")));

        let decisions = service
            .authorize(
                &[
                    WorkflowPermission::ReadAny,
                    WorkflowPermission::Read(WorkflowId::new("wf-a")),
                    WorkflowPermission::Read(WorkflowId::new("wf-b")),
                ],
                &Credentials::new("user:alice"),
            )
            .await
            .unwrap();

        assert_eq!(decisions, vec![Decision::Deny, Decision::Allow, Decision::Deny]);
    }

    #[tokio::test]
    async fn unknown_subjects_are_denied_everything() {
        let service = StaticPermissionService::new();
        let decisions = service
            .authorize(&[WorkflowPermission::ReadAny], &Credentials::anonymous())
            .await
            .unwrap();
        assert_eq!(decisions, vec![Decision::Deny]);
    }
}
