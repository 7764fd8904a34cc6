// Application state for HTTP handlers
use crate::application::session_registry::SessionRegistry;

#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionRegistry,
    pub refresh_secs: u64,
}
