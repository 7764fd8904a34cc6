// HTTP request handlers
use crate::domain::dashboard::{DashboardState, ErrorSource, PanelId};
use crate::presentation::app_state::AppState;
use crate::presentation::view::{render, render_html};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Redirect, Response},
    Form,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct SelectForm {
    /// Empty when the placeholder option was picked
    #[serde(default)]
    pub feature: String,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Mount a fresh dashboard and send the browser to it
pub async fn mount_dashboard(State(state): State<Arc<AppState>>) -> Redirect {
    let (id, _) = state.sessions.mount();
    Redirect::to(&format!("/sessions/{}", id))
}

pub async fn show_dashboard(
    Path(id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Response {
    match state.sessions.get(&id) {
        Some(session) => {
            let view = render(&session.snapshot());
            Html(render_html(&view, id, state.refresh_secs)).into_response()
        }
        None => session_not_found(id),
    }
}

pub async fn select_feature(
    Path((id, panel)): Path<(Uuid, PanelId)>,
    State(state): State<Arc<AppState>>,
    Form(form): Form<SelectForm>,
) -> Response {
    let Some(session) = state.sessions.get(&id) else {
        return session_not_found(id);
    };

    // The fetch runs detached; the redirected page shows its progress
    let _ = session.select_feature(panel, &form.feature);
    Redirect::to(&format!("/sessions/{}", id)).into_response()
}

/// Session state as JSON
pub async fn dashboard_state(
    Path(id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Response {
    match state.sessions.get(&id) {
        Some(session) => Json(state_json(&session.snapshot())).into_response(),
        None => session_not_found(id),
    }
}

fn session_not_found(id: Uuid) -> Response {
    tracing::debug!("Unknown dashboard session {}", id);
    (
        StatusCode::NOT_FOUND,
        Html("<p>This dashboard session has expired. <a href=\"/\">Open a new one</a>.</p>"),
    )
        .into_response()
}

fn state_json(state: &DashboardState) -> Value {
    let panels = PanelId::ALL.map(|id| {
        let panel = state.panel(id);
        json!({
            "panel": id,
            "selectedFeature": panel.selected_feature,
            "isLoadingData": panel.is_loading_data(),
            "chartData": panel.chart_data(),
            "status": panel.status,
        })
    });

    json!({
        "featuresList": state.features,
        "isLoadingFeatures": state.is_loading_features,
        "errorMessage": state.error_message(),
        "errors": {
            "features": state.errors.for_source(ErrorSource::Features),
            "panel1": state.errors.for_source(ErrorSource::Panel(PanelId::First)),
            "panel2": state.errors.for_source(ErrorSource::Panel(PanelId::Second)),
        },
        "panels": panels,
    })
}
