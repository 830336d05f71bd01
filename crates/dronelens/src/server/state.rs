//! Shared state handed to every request handler.

use std::sync::Arc;

use database::Store;
use vision::InferenceService;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub inference: Arc<InferenceService>,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, inference: Arc<InferenceService>) -> Self {
        Self { store, inference }
    }
}
