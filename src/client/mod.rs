//! Interactive search client
//!
//! A debounced, cancellable search session. [`SearchSession`] holds the state
//! machine, [`spawn_session`] runs it against a [`SearchBackend`].

mod backend;
mod driver;
mod session;

pub use backend::{query_pairs, FetchError, HttpBackend, SearchBackend};
pub use driver::{spawn_session, SessionHandle};
pub use session::{
    ClientSearchState, Effect, FetchMode, Filters, Phase, RequestToken, SearchSession,
    SessionConfig, SessionEvent, UserAction,
};

use crate::config::ClientConfig;

impl From<&ClientConfig> for SessionConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            debounce: config.debounce(),
            page_size: config.page_size,
        }
    }
}
