//! Nearby-companies search around a focal point.
//!
//! A linear scan over the filtered view. Client lists are CRM-sized, so no
//! spatial index is built.

use crate::types::ClientRecord;
use geo::{GeodesicDistance, Point};

pub const DEFAULT_RADIUS_KM: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Nearby<'a> {
    pub record: &'a ClientRecord,
    pub distance_km: f64,
}

/// Distance on the WGS-84 ellipsoid, in kilometres.
pub fn distance_km(a: Point<f64>, b: Point<f64>) -> f64 {
    a.geodesic_distance(&b) / 1000.0
}

/// The boundary is inclusive.
pub fn within_radius(distance_km: f64, radius_km: f64) -> bool {
    distance_km <= radius_km
}

/// Records of `view` lying within `radius_km` of `focal`, in view order.
pub fn nearby<'a>(view: &[&'a ClientRecord], focal: Point<f64>, radius_km: f64) -> Vec<Nearby<'a>> {
    view.iter()
        .filter_map(|&record| {
            let distance_km = distance_km(focal, record.point());
            within_radius(distance_km, radius_km).then_some(Nearby {
                record,
                distance_km,
            })
        })
        .collect()
}
