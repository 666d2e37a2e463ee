//! Shared state for the control API.

use std::sync::Arc;

use {
    wabridge_routing::AssociationClient, wabridge_session::SessionManager,
    wabridge_transport::Outbound,
};

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<SessionManager>,
    pub associations: AssociationClient,
    pub outbound: Arc<dyn Outbound>,
}

impl AppState {
    pub fn new(
        session: Arc<SessionManager>,
        associations: AssociationClient,
        outbound: Arc<dyn Outbound>,
    ) -> Self {
        Self {
            session,
            associations,
            outbound,
        }
    }
}
