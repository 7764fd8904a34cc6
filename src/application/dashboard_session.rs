// Dashboard session - orchestrates the feature list load and per-panel fetches
use crate::application::feature_repository::FeatureRepository;
use crate::domain::dashboard::{DashboardState, ErrorSource, PanelId, PanelStatus};
use crate::domain::feature::format_chart_data;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// State for one mounted dashboard.
///
/// Every block of "set flags / assign results" happens under a single write
/// lock, and the lock is never held across a query, so readers only ever see
/// whole transitions.
#[derive(Clone)]
pub struct DashboardSession {
    repository: Arc<dyn FeatureRepository>,
    state: Arc<RwLock<DashboardState>>,
}

impl DashboardSession {
    pub fn new(repository: Arc<dyn FeatureRepository>) -> Self {
        Self {
            repository,
            state: Arc::new(RwLock::new(DashboardState::new())),
        }
    }

    /// Copy of the current state for rendering
    pub fn snapshot(&self) -> DashboardState {
        self.state.read().clone()
    }

    /// Populate the dropdown options. Runs once when the dashboard is mounted.
    pub async fn load_features(&self) {
        {
            let mut state = self.state.write();
            state.is_loading_features = true;
            state.errors.clear();
        }

        let outcome = self.repository.list_distinct_features().await;

        let mut state = self.state.write();
        match outcome {
            Ok(features) => {
                tracing::debug!("Loaded {} features", features.len());
                state.features = features;
            }
            Err(e) => {
                tracing::error!("Error loading features: {}", e);
                state.features.clear();
                state
                    .errors
                    .record(ErrorSource::Features, format!("Error loading features: {}", e));
            }
        }
        state.is_loading_features = false;
    }

    /// Apply a dropdown change. The empty string means the selection was cleared.
    ///
    /// The panel's chart is cleared before this returns. When a feature was
    /// picked, the fetch is spawned and its handle returned.
    pub fn select_feature(&self, panel: PanelId, feature_name: &str) -> Option<JoinHandle<()>> {
        let selected = (!feature_name.is_empty()).then(|| feature_name.to_string());

        let generation = self.state.write().panel_mut(panel).select(selected.clone());

        if selected.is_none() {
            tracing::debug!("Feature {} selection cleared or invalid: {:?}", panel, feature_name);
            return None;
        }

        let session = self.clone();
        Some(tokio::spawn(async move {
            session.load_panel_data(panel, generation).await;
        }))
    }

    /// Fetch and format the chart for whatever the panel has selected now.
    ///
    /// `generation` is the selection this fetch was scheduled for; if the
    /// panel has moved on, either before the query starts or by the time it
    /// returns, the work is dropped.
    pub async fn load_panel_data(&self, panel: PanelId, generation: u64) {
        let feature = {
            let mut state = self.state.write();
            let panel_state = state.panel_mut(panel);
            if !panel_state.is_current(generation) {
                tracing::debug!("Panel {} moved past generation {}, skipping fetch", panel, generation);
                return;
            }
            let Some(feature) = panel_state.selected_feature.clone() else {
                panel_state.status = PanelStatus::Idle;
                return;
            };
            panel_state.status = PanelStatus::Loading;
            state.errors.clear();
            feature
        };

        tracing::debug!("Fetching values for {} into panel {}", feature, panel);
        let outcome = self.repository.fetch_feature_row(&feature).await;

        let mut state = self.state.write();
        if !state.panel(panel).is_current(generation) {
            tracing::debug!(
                "Discarding result for {} in panel {}: selection changed",
                feature,
                panel
            );
            return;
        }

        let status = match outcome {
            Ok(row) => {
                if let Some(row) = &row {
                    tracing::debug!(
                        "Row for {}: current={:?} optimal={:?}",
                        row.feature,
                        row.current_value,
                        row.optimal_value
                    );
                }
                match format_chart_data(Some(&feature), row.as_ref()).pop() {
                    Some(record) => PanelStatus::Loaded(record),
                    None => PanelStatus::Empty,
                }
            }
            Err(e) => {
                let message = format!("Error loading data for {}: {}", feature, e);
                tracing::error!("{}", message);
                state.errors.record(ErrorSource::Panel(panel), message.clone());
                PanelStatus::Failed(message)
            }
        };
        state.panel_mut(panel).finish(generation, status);
    }
}
