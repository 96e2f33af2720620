use geo::Point;
use serde::Serialize;

/// One row of the client table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientRecord {
    pub name: String,
    pub representative: Option<String>,
    pub region: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

impl ClientRecord {
    // geo points are (x = lon, y = lat)
    pub fn point(&self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }

    pub fn position(&self) -> LatLon {
        LatLon {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }

    /// Popup text: name, phone, then address and region on the last line.
    pub fn label(&self) -> String {
        let field = |v: &Option<String>| v.as_deref().unwrap_or("").to_string();
        format!(
            "{},\n {},\n {}, {}",
            self.name,
            field(&self.phone),
            field(&self.address),
            field(&self.region)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatLon {
    pub latitude: f64,
    pub longitude: f64,
}

impl From<[f64; 2]> for LatLon {
    fn from([latitude, longitude]: [f64; 2]) -> Self {
        LatLon {
            latitude,
            longitude,
        }
    }
}

/// A record placed on the map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub region: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    /// Set when the marker comes from a nearby-companies search.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    pub label: String,
}

impl Marker {
    pub fn from_record(record: &ClientRecord, distance_km: Option<f64>) -> Self {
        Marker {
            name: record.name.clone(),
            phone: record.phone.clone(),
            address: record.address.clone(),
            region: record.region.clone(),
            latitude: record.latitude,
            longitude: record.longitude,
            distance_km,
            label: record.label(),
        }
    }
}

#[cfg(test)]
pub(crate) fn record(name: &str, rep: Option<&str>, region: Option<&str>, lat: f64, lon: f64) -> ClientRecord {
    ClientRecord {
        name: name.to_string(),
        representative: rep.map(str::to_string),
        region: region.map(str::to_string),
        phone: Some("01 23 45 67 89".to_string()),
        address: Some(format!("1 rue {name}")),
        latitude: lat,
        longitude: lon,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_joins_name_phone_address_and_region() {
        let r = record("Acme", Some("Alice"), Some("75"), 48.85, 2.35);
        assert_eq!(r.label(), "Acme,\n 01 23 45 67 89,\n 1 rue Acme, 75");
    }

    #[test]
    fn label_leaves_missing_fields_blank() {
        let mut r = record("Acme", None, None, 48.85, 2.35);
        r.phone = None;
        r.address = None;
        assert_eq!(r.label(), "Acme,\n ,\n , ");
    }

    #[test]
    fn point_is_lon_lat() {
        let r = record("Acme", None, None, 48.85, 2.35);
        assert_eq!(r.point().x(), 2.35);
        assert_eq!(r.point().y(), 48.85);
    }
}
