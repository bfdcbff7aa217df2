// src/state.rs

use axum::extract::FromRef;

use crate::{config::Config, media::SharedMedia, store::SharedStore};

/// Shared application state. Collaborators are trait objects so tests can
/// inject the in-memory store and a temp-dir media root.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub media: SharedMedia,
    pub config: Config,
}

impl FromRef<AppState> for SharedStore {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for SharedMedia {
    fn from_ref(state: &AppState) -> Self {
        state.media.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
