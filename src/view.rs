//! Chooses where the map looks and at which zoom.

use crate::config::ViewConfig;
use crate::types::{ClientRecord, LatLon};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    CompanyFocused,
    RegionSelected,
    Overview,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapView {
    pub mode: ViewMode,
    pub center: LatLon,
    pub zoom: u8,
}

/// Mean latitude and longitude, or `None` for an empty view.
pub fn centroid(view: &[&ClientRecord]) -> Option<LatLon> {
    if view.is_empty() {
        return None;
    }
    let n = view.len() as f64;
    let (lat, lon) = view
        .iter()
        .fold((0.0, 0.0), |(lat, lon), r| (lat + r.latitude, lon + r.longitude));
    Some(LatLon {
        latitude: lat / n,
        longitude: lon / n,
    })
}

/// Precedence: a resolved focal company, then an active region filter, then
/// the overview. An empty view falls back to the configured center at
/// country zoom.
pub fn select(
    focal: Option<&ClientRecord>,
    region_selected: bool,
    view: &[&ClientRecord],
    config: &ViewConfig,
) -> MapView {
    if let Some(focal) = focal {
        return MapView {
            mode: ViewMode::CompanyFocused,
            center: focal.position(),
            zoom: config.focus_zoom,
        };
    }

    let (mode, zoom) = if region_selected {
        (ViewMode::RegionSelected, config.region_zoom)
    } else {
        (ViewMode::Overview, config.country_zoom)
    };

    match centroid(view) {
        Some(center) => MapView { mode, center, zoom },
        None => MapView {
            mode,
            center: config.fallback_center.into(),
            zoom: config.country_zoom,
        },
    }
}
