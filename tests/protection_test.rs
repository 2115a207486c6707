//! Protection enforcement end to end (spec §4.2 "Protection enforcement",
//! §9): a sync-mode plan that would delete a protected resource fails with
//! every violation reported together, rather than on the first one found.

mod common;

use tokio_util::sync::CancellationToken;

use common::{state_resource, FakeDeckRunner, FakeStateClient};
use kongplan::config::types::{ResourceKind, ResourceSet};
use kongplan::error::Error;
use kongplan::external_tool::deck::DeckRunOutput;
use kongplan::planner::orchestrator::{run_plan, PlanRequest};
use kongplan::planner::types::Mode;

#[tokio::test]
async fn sync_mode_delete_of_a_protected_control_plane_is_refused() {
    let mut cp = state_resource(ResourceKind::ControlPlane, "cp-1", "legacy");
    cp.protected = true;
    let client = FakeStateClient::new().with(cp);
    let deck_runner = FakeDeckRunner::new(Vec::<DeckRunOutput>::new());

    let resource_set = ResourceSet::default();
    let request = PlanRequest {
        mode: Mode::Sync,
        konnect_token: "token",
        konnect_address: "https://example.konghq.com",
        generator: "test",
    };

    let err = run_plan(resource_set, &client, &deck_runner, request, &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        Error::Protection { violations } => {
            assert_eq!(violations.len(), 1);
            assert_eq!(violations[0].name, "legacy");
            assert_eq!(violations[0].action, "deleted");
        }
        other => panic!("expected Error::Protection, got {other:?}"),
    }
    assert_eq!(deck_runner.call_count(), 0);
}

#[tokio::test]
async fn apply_mode_never_deletes_so_protection_is_not_triggered_by_absence() {
    let mut cp = state_resource(ResourceKind::ControlPlane, "cp-1", "legacy");
    cp.protected = true;
    let client = FakeStateClient::new().with(cp);
    let deck_runner = FakeDeckRunner::new(Vec::<DeckRunOutput>::new());

    let resource_set = ResourceSet::default();
    let request = PlanRequest {
        mode: Mode::Apply,
        konnect_token: "token",
        konnect_address: "https://example.konghq.com",
        generator: "test",
    };

    let plan = run_plan(resource_set, &client, &deck_runner, request, &CancellationToken::new())
        .await
        .unwrap();

    assert!(plan.changes.is_empty());
}
