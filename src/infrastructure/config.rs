use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    #[serde(default)]
    pub server: ServerSettings,
    pub warehouse: WarehouseSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// How often a page with pending loads asks the browser to refresh
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            refresh_secs: default_refresh_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WarehouseSettings {
    pub host: String,
    pub token: String,
    pub warehouse_id: String,
    pub catalog: Option<String>,
    pub schema: Option<String>,
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_refresh_secs() -> u64 {
    1
}

fn default_wait_timeout_secs() -> u64 {
    30
}

fn default_poll_interval_ms() -> u64 {
    500
}

/// Environment variables the Databricks tooling already uses, mapped onto our keys
const DATABRICKS_ENV: [(&str, &str); 5] = [
    ("DATABRICKS_HOST", "warehouse.host"),
    ("DATABRICKS_TOKEN", "warehouse.token"),
    ("DATABRICKS_WAREHOUSE_ID", "warehouse.warehouse_id"),
    ("DATABRICKS_CATALOG", "warehouse.catalog"),
    ("DATABRICKS_SCHEMA", "warehouse.schema"),
];

pub fn load_dashboard_config() -> anyhow::Result<DashboardConfig> {
    let mut builder = config::Config::builder()
        .add_source(config::File::with_name("config/dashboard").required(false))
        .add_source(
            config::Environment::with_prefix("DASHBOARD")
                .prefix_separator("__")
                .separator("__"),
        );

    for (var, key) in DATABRICKS_ENV {
        builder = builder.set_override_option(key, env::var(var).ok())?;
    }

    Ok(builder.build()?.try_deserialize()?)
}
