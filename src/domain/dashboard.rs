// Dashboard domain model - per-session UI state
use super::feature::ChartRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two comparison columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PanelId {
    First,
    Second,
}

impl PanelId {
    pub const ALL: [PanelId; 2] = [PanelId::First, PanelId::Second];

    pub fn index(self) -> usize {
        match self {
            PanelId::First => 0,
            PanelId::Second => 1,
        }
    }

    /// 1-based column number as shown to the user
    pub fn number(self) -> u8 {
        self.index() as u8 + 1
    }
}

impl TryFrom<u8> for PanelId {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(PanelId::First),
            2 => Ok(PanelId::Second),
            other => Err(format!("no panel {}, expected 1 or 2", other)),
        }
    }
}

impl From<PanelId> for u8 {
    fn from(id: PanelId) -> Self {
        id.number()
    }
}

impl fmt::Display for PanelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Where a panel's chart area stands
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "state", content = "data", rename_all = "snake_case")]
pub enum PanelStatus {
    /// Nothing selected
    #[default]
    Idle,
    Loading,
    Loaded(ChartRecord),
    /// The lookup succeeded but produced no usable row
    Empty,
    Failed(String),
}

#[derive(Debug, Clone, Default)]
pub struct PanelState {
    pub selected_feature: Option<String>,
    pub status: PanelStatus,
    /// Bumped on every selection; fetches carry the value they were started for
    pub generation: u64,
}

impl PanelState {
    /// Zero or one record, never stale data from an earlier selection
    pub fn chart_data(&self) -> &[ChartRecord] {
        match &self.status {
            PanelStatus::Loaded(record) => std::slice::from_ref(record),
            _ => &[],
        }
    }

    pub fn is_loading_data(&self) -> bool {
        matches!(self.status, PanelStatus::Loading)
    }

    /// Replace the selection, dropping any chart data tied to the old one.
    /// Returns the generation that now owns the panel.
    pub fn select(&mut self, feature: Option<String>) -> u64 {
        self.generation += 1;
        self.status = if feature.is_some() {
            PanelStatus::Loading
        } else {
            PanelStatus::Idle
        };
        self.selected_feature = feature;
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// Settle the panel if `generation` still owns it. Returns false when the
    /// result belongs to a superseded selection and was dropped.
    pub fn finish(&mut self, generation: u64, status: PanelStatus) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.status = status;
        true
    }
}

/// Which async operation produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSource {
    Features,
    Panel(PanelId),
}

#[derive(Debug, Clone, PartialEq)]
struct ErrorEntry {
    source: ErrorSource,
    message: String,
}

/// Errors tracked per source; the most recently recorded one is the banner
#[derive(Debug, Clone, Default)]
pub struct ErrorBoard {
    // Oldest first, at most one entry per source
    entries: Vec<ErrorEntry>,
}

impl ErrorBoard {
    pub fn record(&mut self, source: ErrorSource, message: String) {
        self.entries.retain(|e| e.source != source);
        self.entries.push(ErrorEntry { source, message });
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn latest(&self) -> Option<&str> {
        self.entries.last().map(|e| e.message.as_str())
    }

    pub fn for_source(&self, source: ErrorSource) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.source == source)
            .map(|e| e.message.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    pub features: Vec<String>,
    pub is_loading_features: bool,
    pub errors: ErrorBoard,
    pub panels: [PanelState; 2],
}

impl DashboardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn panel(&self, id: PanelId) -> &PanelState {
        &self.panels[id.index()]
    }

    pub fn panel_mut(&mut self, id: PanelId) -> &mut PanelState {
        &mut self.panels[id.index()]
    }

    /// The banner text; empty means no error
    pub fn error_message(&self) -> &str {
        self.errors.latest().unwrap_or("")
    }
}
