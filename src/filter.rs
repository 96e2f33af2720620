use crate::types::ClientRecord;
use std::collections::BTreeSet;

/// Dropdown value meaning "no constraint".
pub const ALL: &str = "Tous";

/// Records kept by the current filters, in table order.
pub type FilteredView<'a> = Vec<&'a ClientRecord>;

/// A single-choice dropdown: everything, or one exact value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    All,
    Only(String),
}

impl Selection {
    /// Blank input and the `Tous` sentinel both select everything.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => Selection::All,
            Some(v) if v == ALL => Selection::All,
            Some(v) => Selection::Only(v.to_string()),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Selection::All)
    }

    pub fn matches(&self, value: Option<&str>) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(wanted) => value == Some(wanted.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionFilter {
    Single(Selection),
    /// An empty set applies no constraint.
    Multi(BTreeSet<String>),
}

impl Default for RegionFilter {
    fn default() -> Self {
        RegionFilter::Single(Selection::All)
    }
}

impl RegionFilter {
    pub fn matches(&self, region: Option<&str>) -> bool {
        match self {
            RegionFilter::Single(selection) => selection.matches(region),
            RegionFilter::Multi(set) if set.is_empty() => true,
            RegionFilter::Multi(set) => region.is_some_and(|r| set.contains(r)),
        }
    }

    /// Whether any region constraint is in effect.
    pub fn is_active(&self) -> bool {
        match self {
            RegionFilter::Single(selection) => !selection.is_all(),
            RegionFilter::Multi(set) => !set.is_empty(),
        }
    }
}

/// The user's current choices. Built fresh for every interaction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterState {
    pub representative: Selection,
    pub region: RegionFilter,
    pub focused_company: Option<String>,
}

impl FilterState {
    pub fn new(representative: Selection, region: RegionFilter, company: Option<&str>) -> Self {
        let focused_company = company
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        FilterState {
            representative,
            region,
            focused_company,
        }
    }
}

pub fn apply<'a>(
    records: &'a [ClientRecord],
    representative: &Selection,
    region: &RegionFilter,
) -> FilteredView<'a> {
    records
        .iter()
        .filter(|r| representative.matches(r.representative.as_deref()))
        .filter(|r| region.matches(r.region.as_deref()))
        .collect()
}
