//! Cross-session search over live registry buffers

mod common;

use std::sync::Arc;
use std::time::Duration;

use termpilot::search::{
    RegistryWorkspace, SearchCoordinator, SearchDirection, SearchOutcome, TerminalSurface,
};

async fn three_sessions() -> common::Harness {
    let harness = common::start(common::shell);
    for id in ["s1", "s2", "s3"] {
        common::connect(&harness, id).await;
    }

    harness.registry.send_input("s2", "deploy finished\r");
    harness.registry.send_input("s3", "deploy started\r");

    let registry = harness.registry.clone();
    common::eventually(|| {
        ["s2", "s3"]
            .iter()
            .all(|id| registry.scroll_buffer(id).is_some_and(|b| !b.is_empty()))
    })
    .await;

    harness
}

fn coordinator(workspace: &Arc<RegistryWorkspace>) -> SearchCoordinator {
    SearchCoordinator::new(workspace.clone()).with_handoff_delay(Duration::ZERO)
}

#[tokio::test]
async fn miss_in_focused_session_moves_to_next_match() {
    let harness = three_sessions().await;
    assert_eq!(harness.registry.focused().as_deref(), Some("s1"));

    let workspace = Arc::new(RegistryWorkspace::new(harness.registry.clone()));
    let outcome = coordinator(&workspace).search("finished", SearchDirection::Forward, false);

    assert_eq!(
        outcome,
        SearchOutcome::Matched {
            session_id: "s2".to_string(),
            switched: true
        }
    );
    assert_eq!(harness.registry.focused().as_deref(), Some("s2"));

    let surface = workspace.buffer_surface("s2").unwrap();
    assert_eq!(surface.current_match().unwrap().matched_text, "finished");
    common::eventually(|| surface.focus_requests() == 1).await;
}

#[tokio::test]
async fn backward_search_wraps_to_last_session() {
    let harness = three_sessions().await;
    let workspace = Arc::new(RegistryWorkspace::new(harness.registry.clone()));

    let outcome = coordinator(&workspace).search("deploy", SearchDirection::Backward, false);

    assert_eq!(
        outcome,
        SearchOutcome::Matched {
            session_id: "s3".to_string(),
            switched: true
        }
    );
    assert_eq!(harness.registry.focused().as_deref(), Some("s3"));
}

#[tokio::test]
async fn incremental_search_stays_in_focused_session() {
    let harness = three_sessions().await;
    let workspace = Arc::new(RegistryWorkspace::new(harness.registry.clone()));

    let outcome = coordinator(&workspace).search("finished", SearchDirection::Forward, true);

    assert_eq!(outcome, SearchOutcome::NoMatch);
    assert_eq!(harness.registry.focused().as_deref(), Some("s1"));
}

#[tokio::test]
async fn disconnected_session_is_not_searched() {
    let harness = three_sessions().await;
    let workspace = Arc::new(RegistryWorkspace::new(harness.registry.clone()));

    assert!(harness.registry.disconnect("s2"));
    let outcome = coordinator(&workspace).search("finished", SearchDirection::Forward, false);

    assert_eq!(outcome, SearchOutcome::NoMatch);
    assert_eq!(harness.registry.session_ids(), vec!["s1", "s3"]);
}

#[tokio::test]
async fn switched_session_is_searched_from_the_top() {
    let harness = three_sessions().await;
    harness.registry.send_input("s2", "deploy finished again\r");
    let registry = harness.registry.clone();
    common::eventually(|| registry.scroll_buffer("s2").is_some_and(|b| b.len() == 2)).await;

    // Leave a cursor on the first match in s2 from an earlier search
    let workspace = Arc::new(RegistryWorkspace::new(harness.registry.clone()));
    let s2 = workspace.buffer_surface("s2").unwrap();
    assert!(s2.search("finished", SearchDirection::Forward, &Default::default()));
    assert_eq!(s2.current_match().unwrap().line_number, 0);

    let outcome = coordinator(&workspace).search("finished", SearchDirection::Forward, false);

    assert!(outcome.is_match());
    assert_eq!(harness.registry.focused().as_deref(), Some("s2"));
    assert_eq!(s2.current_match().unwrap().line_number, 0);
}
