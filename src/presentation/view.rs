// Dashboard view - pure rendering of session state
use crate::domain::dashboard::{DashboardState, PanelId, PanelState};
use crate::domain::feature::ChartRecord;
use std::fmt::Write;
use uuid::Uuid;

const TITLE: &str = "Feature Experimentation Dashboard";
const CURRENT_COLOR: &str = "#3b82f6";
const OPTIMAL_COLOR: &str = "#10b981";

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub error_banner: Option<String>,
    pub panels: Vec<PanelView>,
    /// Something is still loading, so the page should poll
    pub pending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelView {
    pub panel: PanelId,
    pub dropdown: Dropdown,
    pub body: PanelBody,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dropdown {
    /// Feature names after the leading placeholder option
    pub options: Vec<String>,
    pub selected: Option<String>,
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PanelBody {
    /// Nothing selected; shown instead of the chart area
    SelectPrompt,
    Chart(ChartArea),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChartArea {
    Loading,
    Bars(ChartRecord),
    NoSelection,
    NoData(String),
}

pub fn render(state: &DashboardState) -> DashboardView {
    let message = state.error_message();
    let panels: Vec<PanelView> = PanelId::ALL
        .into_iter()
        .map(|id| render_panel(state, id))
        .collect();

    DashboardView {
        error_banner: (!message.is_empty()).then(|| message.to_string()),
        pending: state.is_loading_features
            || panels
                .iter()
                .any(|p| p.body == PanelBody::Chart(ChartArea::Loading)),
        panels,
    }
}

fn render_panel(state: &DashboardState, id: PanelId) -> PanelView {
    let panel = state.panel(id);
    let body = match panel.selected_feature {
        Some(_) => PanelBody::Chart(chart_area(panel)),
        None => PanelBody::SelectPrompt,
    };

    PanelView {
        panel: id,
        dropdown: Dropdown {
            options: state.features.clone(),
            selected: panel.selected_feature.clone(),
            disabled: state.is_loading_features,
        },
        body,
    }
}

pub fn chart_area(panel: &PanelState) -> ChartArea {
    if panel.is_loading_data() {
        return ChartArea::Loading;
    }
    if let Some(record) = panel.chart_data().first() {
        return ChartArea::Bars(record.clone());
    }
    match &panel.selected_feature {
        Some(feature) => ChartArea::NoData(feature.clone()),
        None => ChartArea::NoSelection,
    }
}

/// Render the full HTML page for a session
pub fn render_html(view: &DashboardView, session_id: Uuid, refresh_secs: u64) -> String {
    let mut html = String::with_capacity(4096);
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    if view.pending {
        let _ = writeln!(html, "<meta http-equiv=\"refresh\" content=\"{}\">", refresh_secs);
    }
    let _ = writeln!(html, "<title>{}</title>", TITLE);
    html.push_str(STYLE);
    html.push_str("</head>\n<body>\n");
    let _ = writeln!(html, "<h1>{}</h1>", TITLE);

    if let Some(message) = &view.error_banner {
        let _ = writeln!(
            html,
            "<div class=\"error\" role=\"alert\"><strong>Error: </strong>{}</div>",
            escape(message)
        );
    }

    html.push_str("<div class=\"columns\">\n");
    for panel in &view.panels {
        render_panel_html(&mut html, panel, session_id);
    }
    html.push_str("</div>\n</body>\n</html>\n");
    html
}

fn render_panel_html(html: &mut String, panel: &PanelView, session_id: Uuid) {
    let n = panel.panel.number();
    let disabled = if panel.dropdown.disabled { " disabled" } else { "" };

    let _ = writeln!(html, "<section class=\"panel\">");
    let _ = writeln!(
        html,
        "<form method=\"post\" action=\"/sessions/{}/panels/{}\">",
        session_id, n
    );
    let _ = writeln!(html, "<label for=\"feature-{n}\">Select Feature {n}:</label>");
    let _ = writeln!(
        html,
        "<select id=\"feature-{n}\" name=\"feature\" onchange=\"this.form.submit()\"{disabled}>"
    );
    let _ = writeln!(html, "<option value=\"\"{disabled}>Select Feature...</option>");
    for option in &panel.dropdown.options {
        let selected = if panel.dropdown.selected.as_deref() == Some(option.as_str()) {
            " selected"
        } else {
            ""
        };
        let escaped = escape(option);
        let _ = writeln!(html, "<option value=\"{escaped}\"{selected}>{escaped}</option>");
    }
    html.push_str("</select>\n");
    let _ = writeln!(html, "<noscript><button type=\"submit\"{disabled}>Show</button></noscript>");
    html.push_str("</form>\n");

    match &panel.body {
        PanelBody::SelectPrompt => {
            let _ = writeln!(
                html,
                "<div class=\"prompt\"><p>Please select a feature for column {}.</p></div>",
                n
            );
        }
        PanelBody::Chart(area) => {
            html.push_str("<div class=\"chart\">\n");
            render_chart_area(html, area);
            html.push_str("</div>\n");
        }
    }
    html.push_str("</section>\n");
}

fn render_chart_area(html: &mut String, area: &ChartArea) {
    match area {
        ChartArea::Loading => {
            html.push_str("<div class=\"spinner\" aria-busy=\"true\"></div><p>Loading chart data...</p>\n");
        }
        ChartArea::Bars(record) => html.push_str(&bar_chart_svg(record)),
        ChartArea::NoSelection => {
            html.push_str("<p class=\"empty\">Select a feature to display its graph.</p>\n");
        }
        ChartArea::NoData(feature) => {
            let _ = writeln!(
                html,
                "<p class=\"empty\">No data to display for <span class=\"name\">{}</span>. \
                 This might be due to missing values or a data processing error.</p>",
                escape(feature)
            );
        }
    }
}

/// Two bars, current against optimal, sharing one category.
///
/// Bars grow from a zero line: positive values up, negative values down.
/// Non-finite values get a label but no bar and do not affect the scale.
fn bar_chart_svg(record: &ChartRecord) -> String {
    const WIDTH: f64 = 320.0;
    const HEIGHT: f64 = 300.0;
    const TOP: f64 = 40.0;
    const PLOT_HEIGHT: f64 = 210.0;
    const BAR_WIDTH: f64 = 30.0;

    let finite = [record.current_value, record.optimal_value]
        .into_iter()
        .filter(|v| v.is_finite());
    let hi = finite.clone().fold(0.0, f64::max);
    let lo = finite.fold(0.0, f64::min);
    let span = hi - lo;
    let (scale, zero_y) = if span > 0.0 {
        let scale = PLOT_HEIGHT / span;
        (scale, TOP + hi * scale)
    } else {
        (0.0, TOP + PLOT_HEIGHT)
    };
    let category = escape(&record.category);

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        "<svg viewBox=\"0 0 {WIDTH} {HEIGHT}\" width=\"100%\" height=\"{HEIGHT}\" role=\"img\" aria-label=\"{category}\">"
    );
    let _ = writeln!(
        svg,
        "<line x1=\"40\" y1=\"{zero_y:.1}\" x2=\"{}\" y2=\"{zero_y:.1}\" stroke=\"#ccc\"/>",
        WIDTH - 20.0
    );

    let bars = [
        ("Current Value", record.current_value, CURRENT_COLOR, 115.0),
        ("Optimal Value", record.optimal_value, OPTIMAL_COLOR, 175.0),
    ];
    for (name, value, color, x) in bars {
        let label_x = x + BAR_WIDTH / 2.0;
        if !value.is_finite() {
            let _ = writeln!(
                svg,
                "<text x=\"{label_x:.1}\" y=\"{:.1}\" text-anchor=\"middle\"><title>{name}: {value}</title>{value}</text>",
                zero_y - 6.0
            );
            continue;
        }

        let height = value.abs() * scale;
        let (y, label_y) = if value < 0.0 {
            (zero_y, zero_y + height + 14.0)
        } else {
            (zero_y - height, zero_y - height - 6.0)
        };
        let _ = writeln!(
            svg,
            "<rect x=\"{x}\" y=\"{y:.1}\" width=\"{BAR_WIDTH}\" height=\"{height:.1}\" rx=\"4\" fill=\"{color}\"><title>{name}: {value}</title></rect>"
        );
        let _ = writeln!(
            svg,
            "<text x=\"{label_x:.1}\" y=\"{label_y:.1}\" text-anchor=\"middle\">{value}</text>"
        );
    }

    let _ = writeln!(
        svg,
        "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\">{category}</text>",
        WIDTH / 2.0,
        TOP + PLOT_HEIGHT + 20.0
    );
    let _ = writeln!(
        svg,
        "<text x=\"80\" y=\"{:.1}\" fill=\"{CURRENT_COLOR}\">Current Value</text>\
         <text x=\"190\" y=\"{:.1}\" fill=\"{OPTIMAL_COLOR}\">Optimal Value</text>",
        HEIGHT - 10.0,
        HEIGHT - 10.0
    );
    svg.push_str("</svg>\n");
    svg
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

const STYLE: &str = r#"<style>
body{font-family:Inter,-apple-system,sans-serif;background:#f1f5f9;color:#1f2937;margin:0;padding:2.5rem}
h1{text-align:center;font-size:1.9rem;margin-bottom:2rem}
.error{background:#fee2e2;border:1px solid #f87171;color:#b91c1c;padding:.75rem 1rem;border-radius:.25rem;margin-bottom:1.5rem}
.columns{display:flex;flex-wrap:wrap;gap:2rem}
.panel{flex:1;min-width:300px;background:#f8fafc;border-radius:.75rem;padding:1rem;box-shadow:0 1px 3px rgba(0,0,0,.1)}
label{display:block;font-weight:600;margin-bottom:.5rem}
select{width:100%;padding:.6rem;border-radius:.375rem;border:1px solid #d1d5db}
.prompt{margin-top:1rem;border:1px dashed #d1d5db;border-radius:.5rem;min-height:350px;display:flex;align-items:center;justify-content:center;color:#6b7280}
.chart{margin-top:1rem;background:#fff;border:1px solid #e5e7eb;border-radius:.5rem;min-height:350px;display:flex;flex-direction:column;align-items:center;justify-content:center}
.empty{color:#6b7280;font-size:.875rem;padding:1rem;text-align:center}
.name{font-weight:600}
.spinner{width:2rem;height:2rem;border:3px solid #bfdbfe;border-top-color:#3b82f6;border-radius:50%;animation:spin 1s linear infinite}
@keyframes spin{to{transform:rotate(360deg)}}
</style>
"#;
