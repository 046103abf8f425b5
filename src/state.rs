use std::sync::Arc;

use axum::extract::FromRef;

use crate::{provisioning::ProvisioningEngine, session::SessionEngine};

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<SessionEngine>,
    pub provisioning: Arc<ProvisioningEngine>,
}

impl FromRef<AppState> for Arc<SessionEngine> {
    fn from_ref(state: &AppState) -> Self {
        state.session.clone()
    }
}

impl FromRef<AppState> for Arc<ProvisioningEngine> {
    fn from_ref(state: &AppState) -> Self {
        state.provisioning.clone()
    }
}
