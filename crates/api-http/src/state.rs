//! Shared router state

use axum::extract::FromRef;
use mediapress_core::application::{IntakeService, JobRegistry};
use mediapress_core::port::{FileStore, IdProvider, MediaCapabilities, Thumbnailer};
use std::sync::Arc;

#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<JobRegistry>,
    pub intake: Arc<IntakeService>,
    pub file_store: Arc<dyn FileStore>,
    pub thumbnailer: Arc<dyn Thumbnailer>,
    pub id_provider: Arc<dyn IdProvider>,
    pub capabilities: MediaCapabilities,
}

impl FromRef<ApiState> for Arc<JobRegistry> {
    fn from_ref(state: &ApiState) -> Self {
        state.registry.clone()
    }
}

impl FromRef<ApiState> for Arc<dyn IdProvider> {
    fn from_ref(state: &ApiState) -> Self {
        state.id_provider.clone()
    }
}

impl FromRef<ApiState> for MediaCapabilities {
    fn from_ref(state: &ApiState) -> Self {
        state.capabilities
    }
}
