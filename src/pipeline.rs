//! One synchronous pass from the client table and the user's choices to what
//! should be drawn.

use crate::config::{RegionMode, ViewConfig};
use crate::filter::{self, FilterState, FilteredView, ALL};
use crate::proximity;
use crate::store::{self, RecordStore};
use crate::types::{ClientRecord, Marker};
use crate::view::{self, ViewMode};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Serialize)]
pub struct RenderInstruction {
    pub mode: ViewMode,
    pub center: crate::types::LatLon,
    pub zoom: u8,
    pub markers: Vec<Marker>,
    /// Size of the filtered view, before any nearby search.
    pub filtered_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus: Option<FocusSummary>,
    /// Shown to the user when the requested focus could not be applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FocusSummary {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: f64,
    pub nearby_count: usize,
}

impl RenderInstruction {
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(notice) = &self.notice {
            lines.push(notice.clone());
        }
        match &self.focus {
            Some(focus) => {
                lines.push(format!(
                    "📍 Centré sur : {} ({}, {})",
                    focus.name, focus.latitude, focus.longitude
                ));
                lines.push(format!(
                    "🏢 Entreprises sur {} km de rayon : {} trouvées",
                    focus.radius_km, focus.nearby_count
                ));
            }
            None => lines.push(format!("🏢 {} entreprises trouvées", self.filtered_count)),
        }
        lines
    }
}

/// Entries for the three dropdowns. Representatives and regions come from the
/// whole table, companies from the current filtered view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionOptions {
    pub region_mode: RegionMode,
    pub representatives: Vec<String>,
    pub regions: Vec<String>,
    pub companies: Vec<String>,
}

pub fn options(store: &RecordStore, state: &FilterState, region_mode: RegionMode) -> SelectionOptions {
    let with_sentinel = |values: Vec<String>, sentinel: &str| -> Vec<String> {
        std::iter::once(sentinel.to_string()).chain(values).collect()
    };

    let regions = match region_mode {
        RegionMode::Single => with_sentinel(store.regions(), ALL),
        RegionMode::Multi => store.regions(),
    };
    let view = filtered_view(store, state);

    SelectionOptions {
        region_mode,
        representatives: with_sentinel(store.representatives(), ALL),
        regions,
        companies: with_sentinel(company_choices(&view), ""),
    }
}

/// Company dropdown entries: distinct names of the current view, sorted.
pub fn company_choices(view: &[&ClientRecord]) -> Vec<String> {
    store::distinct(
        view.iter()
            .map(|r| r.name.as_str())
            .filter(|name| !name.is_empty()),
    )
}

/// First record of the view carrying `name`. Names are not unique, so the
/// earliest row in table order wins.
pub fn resolve_focus<'a>(view: &[&'a ClientRecord], name: &str) -> Option<&'a ClientRecord> {
    view.iter().copied().find(|r| r.name == name)
}

pub fn filtered_view<'a>(store: &'a RecordStore, state: &FilterState) -> FilteredView<'a> {
    filter::apply(store.records(), &state.representative, &state.region)
}

pub fn run(store: &RecordStore, state: &FilterState, config: &ViewConfig) -> RenderInstruction {
    let view = filtered_view(store, state);

    let mut notice = None;
    let focal = state.focused_company.as_deref().and_then(|name| {
        let found = resolve_focus(&view, name);
        if found.is_none() {
            debug!(company = name, "focused company not in filtered view, ignoring focus");
            notice = Some(format!(
                "L'entreprise « {name} » ne fait pas partie de la sélection actuelle."
            ));
        }
        found
    });

    let map = view::select(focal, state.region.is_active(), &view, config);

    let (markers, focus): (Vec<Marker>, Option<FocusSummary>) = match focal {
        Some(focal) => {
            let nearby = proximity::nearby(&view, focal.point(), config.radius_km);
            let summary = FocusSummary {
                name: focal.name.clone(),
                latitude: focal.latitude,
                longitude: focal.longitude,
                radius_km: config.radius_km,
                nearby_count: nearby.len(),
            };
            let markers = nearby
                .iter()
                .map(|n| Marker::from_record(n.record, Some(n.distance_km)))
                .collect();
            (markers, Some(summary))
        }
        None => (
            view.iter().map(|r| Marker::from_record(r, None)).collect(),
            None,
        ),
    };

    debug!(
        filtered = view.len(),
        markers = markers.len(),
        mode = ?map.mode,
        "pipeline run"
    );

    RenderInstruction {
        mode: map.mode,
        center: map.center,
        zoom: map.zoom,
        markers,
        filtered_count: view.len(),
        focus,
        notice,
    }
}
