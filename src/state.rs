// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{config::Config, service::AssessmentService, store::AssessmentStore};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AssessmentService>,
    pub config: Config,
}

impl AppState {
    pub fn new(store: Arc<dyn AssessmentStore>, config: Config) -> Self {
        let service = Arc::new(AssessmentService::new(store, &config));
        Self { service, config }
    }
}

impl FromRef<AppState> for Arc<AssessmentService> {
    fn from_ref(state: &AppState) -> Self {
        state.service.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
