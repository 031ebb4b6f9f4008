//! Runs a [`SearchSession`] on a tokio task
//!
//! User actions and internal events (timer fires, fetch completions) are
//! funnelled through one loop, so the session is only ever touched from a
//! single place. State snapshots are published on a watch channel.

use super::backend::SearchBackend;
use super::session::{
    ClientSearchState, Effect, RequestToken, SearchSession, SessionConfig, SessionEvent,
    UserAction,
};
use crate::error::{CineError, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Handle to a running search session
pub struct SessionHandle {
    action_tx: mpsc::UnboundedSender<UserAction>,
    state_rx: watch::Receiver<ClientSearchState>,
    worker: JoinHandle<()>,
}

/// Start a session worker searching through `backend`
pub fn spawn_session(backend: Arc<dyn SearchBackend>, config: SessionConfig) -> SessionHandle {
    let session = SearchSession::new(config);
    let (state_tx, state_rx) = watch::channel(session.state().clone());
    let (action_tx, action_rx) = mpsc::unbounded_channel();

    let worker = tokio::spawn(async move {
        session_worker(session, backend, action_rx, state_tx).await;
    });

    SessionHandle {
        action_tx,
        state_rx,
        worker,
    }
}

impl SessionHandle {
    pub fn send(&self, action: UserAction) -> Result<()> {
        self.action_tx
            .send(action)
            .map_err(|_| CineError::Session("Search session closed".to_string()))
    }

    /// Current state snapshot
    pub fn state(&self) -> ClientSearchState {
        self.state_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ClientSearchState> {
        self.state_rx.clone()
    }

    /// Wait for a state matching `predicate`
    pub async fn wait_for<F>(&self, predicate: F) -> Result<ClientSearchState>
    where
        F: FnMut(&ClientSearchState) -> bool,
    {
        let mut rx = self.state_rx.clone();
        let state = rx
            .wait_for(predicate)
            .await
            .map_err(|_| CineError::Session("Search session closed".to_string()))?;
        Ok(state.clone())
    }

    /// Stop the worker, abandoning any pending timer or fetch
    pub async fn shutdown(self) {
        drop(self.action_tx);
        let _ = self.worker.await;
    }
}

async fn session_worker(
    mut session: SearchSession,
    backend: Arc<dyn SearchBackend>,
    mut action_rx: mpsc::UnboundedReceiver<UserAction>,
    state_tx: watch::Sender<ClientSearchState>,
) {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<SessionEvent>();
    let mut debounce: Option<JoinHandle<()>> = None;
    let mut fetch: Option<(RequestToken, JoinHandle<()>)> = None;

    loop {
        let event = tokio::select! {
            action = action_rx.recv() => match action {
                Some(action) => SessionEvent::User(action),
                // All handles dropped
                None => break,
            },
            Some(event) = event_rx.recv() => event,
        };

        for effect in session.handle(event) {
            match effect {
                Effect::StartDebounce { generation, delay } => {
                    if let Some(timer) = debounce.take() {
                        timer.abort();
                    }
                    let tx = event_tx.clone();
                    debounce = Some(tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = tx.send(SessionEvent::DebounceElapsed { generation });
                    }));
                }
                Effect::Cancel(token) => {
                    if let Some((current, handle)) = fetch.take() {
                        if current == token {
                            tracing::debug!("Cancelling superseded search {:?}", token);
                            handle.abort();
                        } else {
                            fetch = Some((current, handle));
                        }
                    }
                }
                Effect::Fetch { token, request } => {
                    let backend = backend.clone();
                    let tx = event_tx.clone();
                    let handle = tokio::spawn(async move {
                        let event = match backend.search(&request).await {
                            Ok(result) => SessionEvent::FetchSucceeded { token, result },
                            Err(error) => SessionEvent::FetchFailed { token, error },
                        };
                        let _ = tx.send(event);
                    });
                    fetch = Some((token, handle));
                }
            }
        }

        let snapshot = session.state().clone();
        state_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }

    if let Some(timer) = debounce.take() {
        timer.abort();
    }
    if let Some((_, handle)) = fetch.take() {
        handle.abort();
    }
    tracing::debug!("Search session stopped");
}
