// Application layer - use cases over the feature repository
pub mod dashboard_session;
pub mod feature_repository;
pub mod session_registry;
