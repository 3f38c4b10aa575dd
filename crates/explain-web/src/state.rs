//! Application state.

use explain_core::ExplainService;
use std::sync::Arc;

/// State shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ExplainService>,
}

impl AppState {
    pub fn new(service: Arc<ExplainService>) -> Self {
        Self { service }
    }
}
