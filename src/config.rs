use crate::proximity::DEFAULT_RADIUS_KM;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    #[serde(default)]
    pub filters: FilterConfig,
    #[serde(default)]
    pub view: ViewConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    pub data_csv: PathBuf,
    #[serde(default)]
    pub columns: ColumnConfig,
}

/// Header names of the required CSV columns.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ColumnConfig {
    pub latitude: String,
    pub longitude: String,
    pub name: String,
    pub representative: String,
    pub region: String,
    pub phone: String,
    pub address: String,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        ColumnConfig {
            latitude: "latitude".to_string(),
            longitude: "longitude".to_string(),
            name: "Nom tiers".to_string(),
            representative: "Rep1 Tiers".to_string(),
            region: "Département".to_string(),
            phone: "Tel 1 Ct".to_string(),
            address: "Rue1 Tiers".to_string(),
        }
    }
}

impl ColumnConfig {
    pub fn required(&self) -> [&str; 7] {
        [
            self.latitude.as_str(),
            self.longitude.as_str(),
            self.name.as_str(),
            self.representative.as_str(),
            self.region.as_str(),
            self.phone.as_str(),
            self.address.as_str(),
        ]
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RegionMode {
    #[default]
    Single,
    Multi,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct FilterConfig {
    pub region_mode: RegionMode,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ViewConfig {
    pub radius_km: f64,
    pub focus_zoom: u8,
    pub region_zoom: u8,
    pub country_zoom: u8,
    /// `[lat, lon]` used when there is nothing to average.
    pub fallback_center: [f64; 2],
}

impl Default for ViewConfig {
    fn default() -> Self {
        ViewConfig {
            radius_km: DEFAULT_RADIUS_KM,
            focus_zoom: 17,
            region_zoom: 9,
            country_zoom: 6,
            fallback_center: [46.603354, 1.888334],
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub max_upload_bytes: usize,
    /// Uploaded tables kept in memory; the oldest is dropped beyond this.
    pub max_uploads: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: 8080,
            max_upload_bytes: 10 * 1024 * 1024,
            max_uploads: 32,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub html: PathBuf,
    pub geojson: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            html: PathBuf::from("clients_map.html"),
            geojson: None,
        }
    }
}

const MAX_ZOOM: u8 = 19;

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let view = &self.view;
        if !view.radius_km.is_finite() || view.radius_km <= 0.0 {
            bail!("view.radius_km must be a positive number, got {}", view.radius_km);
        }
        for (key, zoom) in [
            ("focus_zoom", view.focus_zoom),
            ("region_zoom", view.region_zoom),
            ("country_zoom", view.country_zoom),
        ] {
            if zoom > MAX_ZOOM {
                bail!("view.{key} must be at most {MAX_ZOOM}, got {zoom}");
            }
        }
        if self.server.max_uploads == 0 {
            bail!("server.max_uploads must be at least 1");
        }
        let [lat, lon] = view.fallback_center;
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            bail!("view.fallback_center [{lat}, {lon}] is not a valid coordinate");
        }
        let mut seen = std::collections::HashSet::new();
        for column in self.input.columns.required() {
            if !seen.insert(column) {
                bail!("input.columns maps two fields to the same header {column:?}");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg = AppConfig::from_toml_str("[input]\ndata_csv = \"clients.csv\"\n").unwrap();
        assert_eq!(cfg.input.data_csv, PathBuf::from("clients.csv"));
        assert_eq!(cfg.input.columns, ColumnConfig::default());
        assert_eq!(cfg.filters.region_mode, RegionMode::Single);
        assert_eq!(cfg.view, ViewConfig::default());
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.server.max_uploads, 32);
        assert_eq!(cfg.output.html, PathBuf::from("clients_map.html"));
    }

    #[test]
    fn sections_override_defaults() {
        let cfg = AppConfig::from_toml_str(
            r#"
            [input]
            data_csv = "x.csv"
            [input.columns]
            name = "Company"
            [filters]
            region_mode = "multi"
            [view]
            radius_km = 2.5
            focus_zoom = 15
            [server]
            port = 3000
            "#,
        )
        .unwrap();
        assert_eq!(cfg.input.columns.name, "Company");
        assert_eq!(cfg.input.columns.latitude, "latitude");
        assert_eq!(cfg.filters.region_mode, RegionMode::Multi);
        assert_eq!(cfg.view.radius_km, 2.5);
        assert_eq!(cfg.view.focus_zoom, 15);
        assert_eq!(cfg.view.country_zoom, 6);
        assert_eq!(cfg.server.port, 3000);
    }

    #[test]
    fn missing_input_section_fails() {
        assert!(AppConfig::from_toml_str("[server]\nport = 1\n").is_err());
    }

    #[test]
    fn rejects_non_positive_radius() {
        let err = AppConfig::from_toml_str("[input]\ndata_csv = \"x\"\n[view]\nradius_km = 0.0\n")
            .unwrap_err();
        assert!(err.to_string().contains("radius_km"), "{err}");
    }

    #[test]
    fn rejects_zero_upload_capacity() {
        let err = AppConfig::from_toml_str("[input]\ndata_csv = \"x\"\n[server]\nmax_uploads = 0\n")
            .unwrap_err();
        assert!(err.to_string().contains("max_uploads"), "{err}");
    }

    #[test]
    fn rejects_duplicate_column_headers() {
        let err = AppConfig::from_toml_str(
            "[input]\ndata_csv = \"x\"\n[input.columns]\nphone = \"latitude\"\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("same header"), "{err}");
    }

    #[test]
    fn load_from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[input]\ndata_csv = \"c.csv\"\n").unwrap();
        let cfg = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(cfg.input.data_csv, PathBuf::from("c.csv"));
        assert!(AppConfig::load_from_file(&dir.path().join("nope.toml")).is_err());
    }
}
