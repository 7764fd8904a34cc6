// Domain layer - dashboard state and chart records
pub mod dashboard;
pub mod feature;
