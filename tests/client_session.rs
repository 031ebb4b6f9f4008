mod common;

use cinesearch::client::{spawn_session, Phase, SessionConfig, UserAction};
use common::{corpus, ids, searcher, windowed_searcher, FakeEngine};
use std::sync::Arc;
use std::time::Duration;

fn config() -> SessionConfig {
    SessionConfig {
        debounce: Duration::from_millis(20),
        page_size: 24,
    }
}

#[tokio::test]
async fn test_session_pages_through_results() {
    let engine = Arc::new(FakeEngine::new(corpus()));
    let handle = spawn_session(Arc::new(searcher(engine)), config());

    handle.send(UserAction::Input("ocean".to_string())).unwrap();
    let first = handle
        .wait_for(|s| s.phase == Phase::Ready && s.query == "ocean")
        .await
        .unwrap();
    assert_eq!(first.movies.len(), 24);
    assert_eq!(first.total, 60);
    assert!(first.has_more);

    for expected in [48, 60] {
        handle.send(UserAction::LoadMore).unwrap();
        let state = handle
            .wait_for(|s| s.phase == Phase::Ready && s.movies.len() == expected)
            .await
            .unwrap();
        assert_eq!(state.has_more, expected < 60);
    }

    let state = handle.state();
    let mut seen = ids(&state.movies);
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 60);
    handle.shutdown().await;
}

#[tokio::test]
async fn test_session_blended_paging_ends() {
    let engine = Arc::new(FakeEngine::new(corpus()));
    let handle = spawn_session(Arc::new(windowed_searcher(engine, 20)), config());

    handle.send(UserAction::SetSemanticRatio(0.5)).unwrap();
    handle.send(UserAction::Input("ocean".to_string())).unwrap();
    let mut state = handle
        .wait_for(|s| s.phase == Phase::Ready && s.query == "ocean")
        .await
        .unwrap();

    let mut loads = 0;
    while state.has_more {
        loads += 1;
        assert!(loads <= 2, "load more never ran out");
        let next = state.page + 1;
        handle.send(UserAction::LoadMore).unwrap();
        state = handle
            .wait_for(|s| s.phase == Phase::Ready && s.page == next)
            .await
            .unwrap();
    }

    assert_eq!(state.movies.len() as u64, state.total);
    assert!(state.total <= 40);
    handle.shutdown().await;
}

#[tokio::test]
async fn test_session_filter_change_refetches() {
    let engine = Arc::new(FakeEngine::new(corpus()));
    let handle = spawn_session(Arc::new(searcher(engine)), config());

    handle.send(UserAction::Input("love".to_string())).unwrap();
    handle
        .wait_for(|s| s.phase == Phase::Ready && s.total == 4)
        .await
        .unwrap();

    handle
        .send(UserAction::ToggleGenre("Comedy".to_string()))
        .unwrap();
    let state = handle
        .wait_for(|s| s.phase == Phase::Ready && s.total == 3)
        .await
        .unwrap();

    assert_eq!(state.page, 1);
    assert!(state
        .movies
        .iter()
        .all(|m| m.genres.contains(&"Comedy".to_string())));
    assert_eq!(state.genre_facets.get("Romance"), Some(&4));
    handle.shutdown().await;
}

#[tokio::test]
async fn test_session_reports_unavailable_backend() {
    let engine = Arc::new(FakeEngine::new(corpus()));
    engine.set_unreachable(true);
    let handle = spawn_session(Arc::new(searcher(engine)), config());

    handle.send(UserAction::Input("batman".to_string())).unwrap();
    let state = handle
        .wait_for(|s| matches!(s.phase, Phase::Error(_)))
        .await
        .unwrap();

    match state.phase {
        Phase::Error(message) => assert!(message.contains("search backend unavailable")),
        other => panic!("unexpected phase {:?}", other),
    }
    handle.shutdown().await;
}
