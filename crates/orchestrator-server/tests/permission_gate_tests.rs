use async_trait::async_trait;
use mockall::mock;
use mockall::Sequence;
use std::sync::Arc;

use orchestrator_engine_client::WorkflowId;
use orchestrator_server::permissions::{
    Credentials, Decision, PermissionGate, PermissionService, StaticPermissionService,
    WorkflowPermission,
};
use orchestrator_server::ServerError;

mock! {
    #[derive(Debug)]
    pub PermissionSvc {}

    #[async_trait]
    impl PermissionService for PermissionSvc {
        async fn authorize(
            &self,
            requests: &[WorkflowPermission],
            credentials: &Credentials,
        ) -> Result<Vec<Decision>, ServerError>;
    }
}

fn ids(raw: &[&str]) -> Vec<WorkflowId> {
    raw.iter().map(|id| WorkflowId::new(*id)).collect()
}

#[tokio::test]
async fn generic_grant_returns_all_ids_without_per_id_evaluation() {
    let mut service = MockPermissionSvc::new();

    // Exactly one evaluation: the generic permission. A second, per-id batch
    // call would fail the expectation.
    service
        .expect_authorize()
        .withf(|requests, _| requests.len() == 1 && requests[0] == WorkflowPermission::ReadAny)
        .times(1)
        .returning(|_, _| Ok(vec![Decision::Allow]));

    let gate = PermissionGate::new(Arc::new(service));
    let all = ids(&["wf-a", "wf-b", "wf-c"]);

    let allowed = gate
        .filter_authorized(
            WorkflowPermission::ReadAny,
            |id| WorkflowPermission::Read(id.clone()),
            all.clone(),
            &Credentials::new("user:alice"),
        )
        .await
        .unwrap();

    assert_eq!(allowed, all);
}

#[tokio::test]
async fn specific_grants_select_exactly_the_allowed_subset_in_order() {
    let mut service = MockPermissionSvc::new();
    let mut seq = Sequence::new();

    service
        .expect_authorize()
        .withf(|requests, _| requests.len() == 1 && requests[0] == WorkflowPermission::ReadAny)
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(vec![Decision::Deny]));

    // One batched call covering every id, decisions in request order.
    service
        .expect_authorize()
        .withf(|requests, _| requests.len() == 3)
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(vec![Decision::Allow, Decision::Deny, Decision::Allow]));

    let gate = PermissionGate::new(Arc::new(service));

    let allowed = gate
        .filter_authorized(
            WorkflowPermission::ReadAny,
            |id| WorkflowPermission::Read(id.clone()),
            ids(&["wf-a", "wf-b", "wf-c"]),
            &Credentials::new("user:bob"),
        )
        .await
        .unwrap();

    assert_eq!(allowed, ids(&["wf-a", "wf-c"]));
}

#[tokio::test]
async fn any_of_allows_when_any_candidate_allows() {
    let mut service = MockPermissionSvc::new();
    service
        .expect_authorize()
        .times(1)
        .returning(|_, _| Ok(vec![Decision::Deny, Decision::Allow]));

    let gate = PermissionGate::new(Arc::new(service));
    let decision = gate
        .any_of(
            &[
                WorkflowPermission::UseAny,
                WorkflowPermission::Use(WorkflowId::new("wf-a")),
            ],
            &Credentials::new("user:alice"),
        )
        .await
        .unwrap();

    assert_eq!(decision, Decision::Allow);
}

#[tokio::test]
async fn any_of_denies_only_when_every_candidate_denies() {
    let mut service = MockPermissionSvc::new();
    service
        .expect_authorize()
        .times(1)
        .returning(|_, _| Ok(vec![Decision::Deny, Decision::Deny]));

    let gate = PermissionGate::new(Arc::new(service));
    let decision = gate
        .any_of(
            &[
                WorkflowPermission::UseAny,
                WorkflowPermission::Use(WorkflowId::new("wf-a")),
            ],
            &Credentials::new("user:mallory"),
        )
        .await
        .unwrap();

    assert_eq!(decision, Decision::Deny);
}

#[tokio::test]
async fn empty_candidate_list_denies_without_calling_the_service() {
    let mut service = MockPermissionSvc::new();
    service.expect_authorize().times(0);

    let gate = PermissionGate::new(Arc::new(service));
    let decision = gate
        .any_of(&[], &Credentials::new("user:alice"))
        .await
        .unwrap();

    assert_eq!(decision, Decision::Deny);
}

#[tokio::test]
async fn evaluation_failures_propagate_instead_of_becoming_decisions() {
    let mut service = MockPermissionSvc::new();
    service
        .expect_authorize()
        .returning(|_, _| Err(ServerError::PermissionServiceError("backend down".into())));

    let gate = PermissionGate::new(Arc::new(service));

    let err = gate
        .any_of(&[WorkflowPermission::ReadAny], &Credentials::new("user:alice"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServerError::PermissionServiceError(_)));

    let mut service = MockPermissionSvc::new();
    service
        .expect_authorize()
        .returning(|_, _| Err(ServerError::PermissionServiceError("backend down".into())));
    let gate = PermissionGate::new(Arc::new(service));

    let err = gate
        .filter_authorized(
            WorkflowPermission::ReadAny,
            |id| WorkflowPermission::Read(id.clone()),
            ids(&["wf-a"]),
            &Credentials::new("user:alice"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServerError::PermissionServiceError(_)));
}

#[tokio::test]
async fn mismatched_decision_count_is_a_service_error() {
    let mut service = MockPermissionSvc::new();
    service
        .expect_authorize()
        .returning(|_, _| Ok(vec![Decision::Allow]));

    let gate = PermissionGate::new(Arc::new(service));
    let err = gate
        .any_of(
            &[
                WorkflowPermission::ReadAny,
                WorkflowPermission::Read(WorkflowId::new("wf-a")),
            ],
            &Credentials::new("user:alice"),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ServerError::PermissionServiceError(_)));
}

#[tokio::test]
async fn grants_file_feeds_the_static_service() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("permissions.yaml");
    std::fs::write(
        &path,
        "\"user:alice\":\n  - workflow:read:*\n  - workflow:use:wf-a\n",
    )
    .unwrap();

    let service = StaticPermissionService::from_file(&path).unwrap();
    let decisions = service
        .authorize(
            &[
                WorkflowPermission::ReadAny,
                WorkflowPermission::Use(WorkflowId::new("wf-a")),
                WorkflowPermission::UseAny,
            ],
            &Credentials::new("user:alice"),
        )
        .await
        .unwrap();

    assert_eq!(
        decisions,
        vec![Decision::Allow, Decision::Allow, Decision::Deny]
    );
}

#[tokio::test]
async fn malformed_grants_file_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("permissions.yaml");
    std::fs::write(&path, "\"user:alice\":\n  - workflow:own:everything\n").unwrap();

    let err = StaticPermissionService::from_file(&path).unwrap_err();
    assert!(matches!(err, ServerError::ConfigurationError(_)));
}

#[tokio::test]
async fn static_grants_compose_with_the_gate() {
    let service = StaticPermissionService::new()
        .grant("user:alice", WorkflowPermission::Read(WorkflowId::new("wf-a")))
        .grant("user:admin", WorkflowPermission::ReadAny);
    let gate = PermissionGate::new(Arc::new(service));

    let allowed = gate
        .filter_authorized(
            WorkflowPermission::ReadAny,
            |id| WorkflowPermission::Read(id.clone()),
            ids(&["wf-a", "wf-b"]),
            &Credentials::new("user:alice"),
        )
        .await
        .unwrap();
    assert_eq!(allowed, ids(&["wf-a"]));

    let allowed = gate
        .filter_authorized(
            WorkflowPermission::ReadAny,
            |id| WorkflowPermission::Read(id.clone()),
            ids(&["wf-a", "wf-b"]),
            &Credentials::new("user:admin"),
        )
        .await
        .unwrap();
    assert_eq!(allowed, ids(&["wf-a", "wf-b"]));
}
