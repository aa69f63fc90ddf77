//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.torstats.toml` files.

use anyhow::{bail, Context, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the current directory.
pub const CONFIG_FILE_NAME: &str = ".torstats.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Input and output locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Network chart settings.
    #[serde(default)]
    pub chart: ChartConfig,

    /// Side-by-side composite settings.
    #[serde(default)]
    pub composite: CompositeConfig,
}

/// Input and output locations.
///
/// Directories are relative to `project_root` unless absolute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root that the other directories are resolved against.
    #[serde(default = "default_project_root")]
    pub project_root: PathBuf,

    /// Tree of daily snapshots (`<YYYY>/<MM>/<YYYY-MM-DD>/`).
    #[serde(default = "default_history_dir")]
    pub history_dir: PathBuf,

    /// Directory holding the latest charts.
    #[serde(default = "default_stats_dir")]
    pub stats_dir: PathBuf,

    /// File name of the network chart.
    #[serde(default = "default_network_chart")]
    pub network_chart: String,

    /// File name of the externally produced pie chart.
    #[serde(default = "default_pie_chart")]
    pub pie_chart: String,

    /// File name of the composite image.
    #[serde(default = "default_combined_chart")]
    pub combined_chart: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            project_root: default_project_root(),
            history_dir: default_history_dir(),
            stats_dir: default_stats_dir(),
            network_chart: default_network_chart(),
            pie_chart: default_pie_chart(),
            combined_chart: default_combined_chart(),
        }
    }
}

fn default_project_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_history_dir() -> PathBuf {
    PathBuf::from("history")
}

fn default_stats_dir() -> PathBuf {
    PathBuf::from("stats")
}

fn default_network_chart() -> String {
    "network-chart.png".to_string()
}

fn default_pie_chart() -> String {
    "node-distribution-pie.png".to_string()
}

fn default_combined_chart() -> String {
    "combined-analytics.png".to_string()
}

impl PathsConfig {
    /// Resolved history directory.
    pub fn history_root(&self) -> PathBuf {
        self.project_root.join(&self.history_dir)
    }

    /// Resolved stats directory.
    pub fn stats_root(&self) -> PathBuf {
        self.project_root.join(&self.stats_dir)
    }

    /// Stable location of the network chart.
    pub fn latest_chart(&self) -> PathBuf {
        self.stats_root().join(&self.network_chart)
    }

    /// Archive location of the network chart for a given run date:
    /// `<history>/<YYYY>/<MM>/<YYYY-MM-DD>/<network_chart>`.
    pub fn archived_chart(&self, run_date: NaiveDate) -> PathBuf {
        self.history_root()
            .join(format!("{:04}", run_date.year()))
            .join(format!("{:02}", run_date.month()))
            .join(run_date.format("%Y-%m-%d").to_string())
            .join(&self.network_chart)
    }

    /// Pie chart used as the right half of the composite.
    pub fn pie_chart_path(&self) -> PathBuf {
        self.stats_root().join(&self.pie_chart)
    }

    /// Output of the composite.
    pub fn combined_chart_path(&self) -> PathBuf {
        self.stats_root().join(&self.combined_chart)
    }
}

/// Network chart settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartConfig {
    /// Output resolution in dots per inch.
    #[serde(default = "default_dpi")]
    pub dpi: u32,

    /// Figure width in inches.
    #[serde(default = "default_width_inches")]
    pub width_inches: f64,

    /// Figure height in inches.
    #[serde(default = "default_height_inches")]
    pub height_inches: f64,

    /// Series line width in points.
    #[serde(default = "default_line_width")]
    pub line_width: f64,

    /// Series colours.
    #[serde(default)]
    pub colours: ColourConfig,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            dpi: default_dpi(),
            width_inches: default_width_inches(),
            height_inches: default_height_inches(),
            line_width: default_line_width(),
            colours: ColourConfig::default(),
        }
    }
}

fn default_dpi() -> u32 {
    300
}

fn default_width_inches() -> f64 {
    14.0
}

fn default_height_inches() -> f64 {
    12.0
}

fn default_line_width() -> f64 {
    2.5
}

/// Series colours as `#rrggbb` strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColourConfig {
    #[serde(default = "default_relay_colour")]
    pub relay: String,
    #[serde(default = "default_exit_colour")]
    pub exit: String,
    #[serde(default = "default_guard_colour")]
    pub guard: String,
    #[serde(default = "default_all_colour")]
    pub all: String,
    #[serde(default = "default_ipv4_colour")]
    pub ipv4: String,
    #[serde(default = "default_ipv6_colour")]
    pub ipv6: String,
}

impl Default for ColourConfig {
    fn default() -> Self {
        Self {
            relay: default_relay_colour(),
            exit: default_exit_colour(),
            guard: default_guard_colour(),
            all: default_all_colour(),
            ipv4: default_ipv4_colour(),
            ipv6: default_ipv6_colour(),
        }
    }
}

fn default_relay_colour() -> String {
    "#7d4698".to_string()
}

fn default_exit_colour() -> String {
    "#e74c3c".to_string()
}

fn default_guard_colour() -> String {
    "#2ecc71".to_string()
}

fn default_all_colour() -> String {
    "#34495e".to_string()
}

fn default_ipv4_colour() -> String {
    "#3498db".to_string()
}

fn default_ipv6_colour() -> String {
    "#f39c12".to_string()
}

impl ColourConfig {
    fn entries(&self) -> [(&'static str, &str); 6] {
        [
            ("relay", &self.relay),
            ("exit", &self.exit),
            ("guard", &self.guard),
            ("all", &self.all),
            ("ipv4", &self.ipv4),
            ("ipv6", &self.ipv6),
        ]
    }
}

/// Side-by-side composite settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeConfig {
    /// Horizontal gap between the two images, in pixels.
    #[serde(default = "default_gap")]
    pub gap: u32,

    /// Canvas background as `#rrggbb`.
    #[serde(default = "default_background")]
    pub background: String,
}

impl Default for CompositeConfig {
    fn default() -> Self {
        Self {
            gap: default_gap(),
            background: default_background(),
        }
    }
}

fn default_gap() -> u32 {
    10
}

fn default_background() -> String {
    "#ffffff".to_string()
}

/// Parse a `#rrggbb` (or `rrggbb`) colour.
pub fn parse_hex_colour(value: &str) -> Result<[u8; 3]> {
    let hex = value.trim().trim_start_matches('#');

    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        bail!("Invalid colour '{}': expected #rrggbb", value);
    }

    let channel = |i: usize| {
        u8::from_str_radix(&hex[i..i + 2], 16)
            .with_context(|| format!("Invalid colour '{}'", value))
    };

    Ok([channel(0)?, channel(2)?, channel(4)?])
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref root) = args.project_root {
            self.paths.project_root = root.clone();
        }
    }

    /// Check values that serde accepts but rendering can't use.
    pub fn validate(&self) -> Result<()> {
        if self.chart.dpi == 0 {
            bail!("chart.dpi must be at least 1");
        }

        if self.chart.width_inches <= 0.0 || self.chart.height_inches <= 0.0 {
            bail!("chart.width_inches and chart.height_inches must be positive");
        }

        if self.chart.line_width <= 0.0 {
            bail!("chart.line_width must be positive");
        }

        for (name, value) in self.chart.colours.entries() {
            parse_hex_colour(value).with_context(|| format!("chart.colours.{}", name))?;
        }

        parse_hex_colour(&self.composite.background).context("composite.background")?;

        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
