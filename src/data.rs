use crate::config::ColumnConfig;
use crate::store::RecordStore;
use crate::types::ClientRecord;
use csv::{ReaderBuilder, StringRecord};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("client table `{}` was not found", path.display())]
    MissingSource { path: PathBuf },

    #[error("failed to open client table `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("the client table is missing columns {missing:?}; required columns are {required:?}")]
    MissingColumns {
        missing: Vec<String>,
        required: Vec<String>,
    },

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Load the client table from a file fixed at startup.
pub fn load_records(path: &Path, columns: &ColumnConfig) -> Result<RecordStore, LoadError> {
    info!(path = %path.display(), "loading client table");
    let file = File::open(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => LoadError::MissingSource {
            path: path.to_path_buf(),
        },
        _ => LoadError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;
    read_records(file, columns)
}

/// Parse a client table from any CSV source, e.g. an uploaded body.
pub fn read_records<R: Read>(reader: R, columns: &ColumnConfig) -> Result<RecordStore, LoadError> {
    // Exports often drop trailing empty cells; short rows are handled per field.
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr.headers()?.clone();
    let idx = ColumnIndices::resolve(&headers, columns)?;

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for (line, result) in rdr.records().enumerate() {
        let row = result?;
        match idx.parse(&row) {
            Some(record) => records.push(record),
            None => {
                skipped += 1;
                // +2: header line and 1-based numbering
                warn!(line = line + 2, "skipping row without valid coordinates");
            }
        }
    }

    info!(rows = records.len(), skipped, "client table loaded");
    Ok(RecordStore::new(records))
}

struct ColumnIndices {
    latitude: usize,
    longitude: usize,
    name: usize,
    representative: usize,
    region: usize,
    phone: usize,
    address: usize,
}

impl ColumnIndices {
    fn resolve(headers: &StringRecord, columns: &ColumnConfig) -> Result<Self, LoadError> {
        let position = |name: &str| headers.iter().position(|h| h == name);

        let required = columns.required();
        let missing: Vec<String> = required
            .iter()
            .filter(|&&c| position(c).is_none())
            .map(|c| c.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(LoadError::MissingColumns {
                missing,
                required: required.iter().map(|c| c.to_string()).collect(),
            });
        }

        let at = |name: &str| position(name).unwrap_or_default();
        Ok(ColumnIndices {
            latitude: at(columns.latitude.as_str()),
            longitude: at(columns.longitude.as_str()),
            name: at(columns.name.as_str()),
            representative: at(columns.representative.as_str()),
            region: at(columns.region.as_str()),
            phone: at(columns.phone.as_str()),
            address: at(columns.address.as_str()),
        })
    }

    /// `None` when the coordinates are absent or out of range.
    fn parse(&self, row: &StringRecord) -> Option<ClientRecord> {
        let latitude = coordinate(row.get(self.latitude), 90.0)?;
        let longitude = coordinate(row.get(self.longitude), 180.0)?;
        Some(ClientRecord {
            name: row.get(self.name).unwrap_or("").trim().to_string(),
            representative: text(row.get(self.representative)),
            region: text(row.get(self.region)),
            phone: text(row.get(self.phone)),
            address: text(row.get(self.address)),
            latitude,
            longitude,
        })
    }
}

fn coordinate(raw: Option<&str>, bound: f64) -> Option<f64> {
    let value: f64 = raw?.trim().parse().ok()?;
    (value.is_finite() && value.abs() <= bound).then_some(value)
}

fn text(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const HEADER: &str = "Nom tiers,Rep1 Tiers,Département,Tel 1 Ct,Rue1 Tiers,latitude,longitude";

    fn parse(body: &str) -> Result<RecordStore, LoadError> {
        read_records(body.as_bytes(), &ColumnConfig::default())
    }

    #[test]
    fn reads_rows_in_file_order() {
        let store = parse(&format!(
            "{HEADER}\nAcme,Alice,75,0102030405,1 rue de Rivoli,48.8566,2.3522\nBeta,,38,,,45.0,5.0\n"
        ))
        .unwrap();
        let rows = store.records();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "Acme");
        assert_eq!(rows[0].representative.as_deref(), Some("Alice"));
        assert_eq!(rows[0].address.as_deref(), Some("1 rue de Rivoli"));
        assert_eq!(rows[0].latitude, 48.8566);
        assert_eq!(rows[1].representative, None);
        assert_eq!(rows[1].phone, None);
        assert_eq!(rows[1].region.as_deref(), Some("38"));
    }

    #[test]
    fn column_order_does_not_matter() {
        let store = parse("latitude,longitude,Rue1 Tiers,Tel 1 Ct,Département,Rep1 Tiers,Nom tiers,Extra\n48.0,2.0,addr,tel,75,Bob,Gamma,x\n")
            .unwrap();
        let r = &store.records()[0];
        assert_eq!(r.name, "Gamma");
        assert_eq!(r.representative.as_deref(), Some("Bob"));
        assert_eq!(r.longitude, 2.0);
    }

    #[test]
    fn missing_columns_are_all_reported() {
        let err = parse("Nom tiers,latitude,longitude\nAcme,48.0,2.0\n").unwrap_err();
        match err {
            LoadError::MissingColumns { missing, required } => {
                assert_eq!(missing, vec!["Rep1 Tiers", "Département", "Tel 1 Ct", "Rue1 Tiers"]);
                assert_eq!(required.len(), 7);
            }
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn rows_with_bad_coordinates_are_skipped() {
        let store = parse(&format!(
            "{HEADER}\nA,,,,,,2.0\nB,,,,,abc,2.0\nC,,,,,91.0,2.0\nD,,,,,48.0,181.0\nE,,,,,48.0,2.0\n"
        ))
        .unwrap();
        let names: Vec<&str> = store.records().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["E"]);
    }

    #[test]
    fn short_rows_do_not_fail_the_table() {
        let store = parse(&format!(
            "{HEADER}\nA,Alice,75,,,48.8566,2.3522\nB,Bob,75,,,48.0\nC,Bob\n"
        ))
        .unwrap();
        let names: Vec<&str> = store.records().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["A"]);
    }

    #[test]
    fn trailing_empty_cells_may_be_omitted() {
        let body = "latitude,longitude,Nom tiers,Rep1 Tiers,Département,Tel 1 Ct,Rue1 Tiers\n48.0,2.0,Acme,Alice\n";
        let store = parse(body).unwrap();
        let r = &store.records()[0];
        assert_eq!(r.name, "Acme");
        assert_eq!(r.representative.as_deref(), Some("Alice"));
        assert_eq!(r.region, None);
        assert_eq!(r.address, None);
    }

    #[test]
    fn header_only_table_is_empty_not_an_error() {
        let store = parse(&format!("{HEADER}\n")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn custom_headers_are_honoured() {
        let columns = ColumnConfig {
            name: "Company".into(),
            ..ColumnConfig::default()
        };
        let body = "Company,Rep1 Tiers,Département,Tel 1 Ct,Rue1 Tiers,latitude,longitude\nZ,,,,,1.0,1.0\n";
        let store = read_records(body.as_bytes(), &columns).unwrap();
        assert_eq!(store.records()[0].name, "Z");
    }

    #[test]
    fn missing_file_is_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_records(&dir.path().join("absent.csv"), &ColumnConfig::default()).unwrap_err();
        assert!(matches!(err, LoadError::MissingSource { .. }), "{err:?}");
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clients.csv");
        fs::write(&path, format!("{HEADER}\nAcme,Alice,75,,,48.85,2.35\n")).unwrap();
        let store = load_records(&path, &ColumnConfig::default()).unwrap();
        assert_eq!(store.len(), 1);
    }
}
