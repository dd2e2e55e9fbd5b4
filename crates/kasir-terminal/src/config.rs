//! # Terminal Configuration
//!
//! Settings for one terminal: identity, pricing rates, inventory mode,
//! session features and where state is persisted.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     KASIR_TERMINAL_ID=kasir-01                                          │
//! │     KASIR_DB_PATH=/var/lib/kasir/kasir.db                               │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/kasir/terminal.toml (Linux)                              │
//! │     ~/Library/Application Support/id.kasir.terminal/terminal.toml      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [terminal]
//! id = "kasir-01"
//! code = "K1"
//! store_name = "Kopi Senja"
//!
//! [pricing]
//! tax_rate_bps = 1100          # 11 %
//! service_charge_bps = 500     # 5 %
//!
//! [inventory]
//! enabled = true
//! track_ingredients = true
//! strict_stock = false
//!
//! [session]
//! enable_cart_holding = true
//!
//! [loyalty]
//! enabled = true
//!
//! [database]
//! path = "/var/lib/kasir/kasir.db"
//!
//! [persist]
//! max_retries = 5
//! initial_backoff_ms = 200
//! ```

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{TerminalError, TerminalResult};
use kasir_core::{InventoryConfig, Rate, TaxConfig};

/// Highest accepted rate, 100 %.
const MAX_RATE_BPS: u32 = 10_000;

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalSection {
    /// Unique terminal id. Generated on first run if not provided.
    #[serde(default = "generate_terminal_id")]
    pub id: String,

    /// Two-character code printed in receipt numbers.
    #[serde(default = "default_code")]
    pub code: String,

    #[serde(default = "default_store_name")]
    pub store_name: String,
}

fn generate_terminal_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_code() -> String {
    "01".to_string()
}

fn default_store_name() -> String {
    "Kasir".to_string()
}

impl Default for TerminalSection {
    fn default() -> Self {
        TerminalSection {
            id: generate_terminal_id(),
            code: default_code(),
            store_name: default_store_name(),
        }
    }
}

/// Tax and service charge in basis points.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PricingSection {
    #[serde(default)]
    pub tax_rate_bps: u32,

    #[serde(default)]
    pub service_charge_bps: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventorySection {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Deplete raw materials through recipes.
    #[serde(default = "default_true")]
    pub track_ingredients: bool,

    /// Block sales that would drive tracked stock negative.
    #[serde(default)]
    pub strict_stock: bool,
}

fn default_true() -> bool {
    true
}

impl Default for InventorySection {
    fn default() -> Self {
        InventorySection {
            enabled: true,
            track_ingredients: true,
            strict_stock: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSection {
    #[serde(default = "default_true")]
    pub enable_cart_holding: bool,
}

impl Default for SessionSection {
    fn default() -> Self {
        SessionSection {
            enable_cart_holding: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoyaltySection {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for LoyaltySection {
    fn default() -> Self {
        LoyaltySection { enabled: true }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseSection {
    /// SQLite file. Defaults to `kasir.db` in the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Retry budget of the persistence writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistSection {
    /// Retries after the first failed attempt before a change is parked.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    5
}
fn default_initial_backoff() -> u64 {
    200
}
fn default_max_backoff() -> u64 {
    5_000
}

impl Default for PersistSection {
    fn default() -> Self {
        PersistSection {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

impl PersistSection {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

// =============================================================================
// Terminal Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TerminalConfig {
    #[serde(default)]
    pub terminal: TerminalSection,

    #[serde(default)]
    pub pricing: PricingSection,

    #[serde(default)]
    pub inventory: InventorySection,

    #[serde(default)]
    pub session: SessionSection,

    #[serde(default)]
    pub loyalty: LoyaltySection,

    #[serde(default)]
    pub database: DatabaseSection,

    #[serde(default)]
    pub persist: PersistSection,
}

impl TerminalConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (terminal.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> TerminalResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading terminal config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Writes the configuration as TOML, creating the directory if needed.
    pub fn save(&self, config_path: Option<PathBuf>) -> TerminalResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| TerminalError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Terminal config saved");
        Ok(())
    }

    pub fn validate(&self) -> TerminalResult<()> {
        if self.terminal.id.trim().is_empty() {
            return Err(TerminalError::InvalidConfig("terminal.id must not be empty".into()));
        }

        for (field, bps) in [
            ("pricing.tax_rate_bps", self.pricing.tax_rate_bps),
            ("pricing.service_charge_bps", self.pricing.service_charge_bps),
        ] {
            if bps > MAX_RATE_BPS {
                return Err(TerminalError::InvalidConfig(format!(
                    "{} must be at most {}, got {}",
                    field, MAX_RATE_BPS, bps
                )));
            }
        }

        if self.persist.max_retries == 0 {
            return Err(TerminalError::InvalidConfig(
                "persist.max_retries must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var("KASIR_TERMINAL_ID") {
            debug!(terminal_id = %id, "Overriding terminal id from environment");
            self.terminal.id = id;
        }

        if let Ok(code) = std::env::var("KASIR_TERMINAL_CODE") {
            self.terminal.code = code;
        }

        if let Ok(name) = std::env::var("KASIR_STORE_NAME") {
            self.terminal.store_name = name;
        }

        if let Ok(rate) = std::env::var("KASIR_TAX_RATE_BPS") {
            match rate.parse::<u32>() {
                Ok(bps) => self.pricing.tax_rate_bps = bps,
                Err(_) => warn!(value = %rate, "Ignoring invalid KASIR_TAX_RATE_BPS"),
            }
        }

        if let Ok(rate) = std::env::var("KASIR_SERVICE_CHARGE_BPS") {
            match rate.parse::<u32>() {
                Ok(bps) => self.pricing.service_charge_bps = bps,
                Err(_) => warn!(value = %rate, "Ignoring invalid KASIR_SERVICE_CHARGE_BPS"),
            }
        }

        if let Ok(flag) = std::env::var("KASIR_STRICT_STOCK") {
            match parse_flag(&flag) {
                Some(on) => self.inventory.strict_stock = on,
                None => warn!(value = %flag, "Ignoring invalid KASIR_STRICT_STOCK"),
            }
        }

        if let Ok(flag) = std::env::var("KASIR_LOYALTY_ENABLED") {
            match parse_flag(&flag) {
                Some(on) => self.loyalty.enabled = on,
                None => warn!(value = %flag, "Ignoring invalid KASIR_LOYALTY_ENABLED"),
            }
        }

        if let Ok(path) = std::env::var("KASIR_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("id", "kasir", "terminal")
    }

    fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("terminal.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Configured database file, or `kasir.db` in the platform data
    /// directory (created if missing).
    pub fn database_path(&self) -> TerminalResult<PathBuf> {
        if let Some(path) = &self.database.path {
            return Ok(path.clone());
        }

        let dirs = Self::project_dirs()
            .ok_or_else(|| TerminalError::InvalidConfig("Could not determine app data directory".into()))?;
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir)?;

        Ok(data_dir.join("kasir.db"))
    }

    pub fn tax_config(&self) -> TaxConfig {
        TaxConfig {
            tax_rate: Rate::from_bps(self.pricing.tax_rate_bps),
            service_charge_rate: Rate::from_bps(self.pricing.service_charge_bps),
        }
    }

    pub fn inventory_config(&self) -> InventoryConfig {
        InventoryConfig {
            enabled: self.inventory.enabled,
            track_ingredients: self.inventory.track_ingredients,
            strict_stock: self.inventory.strict_stock,
        }
    }

    pub fn terminal_code(&self) -> &str {
        &self.terminal.code
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
