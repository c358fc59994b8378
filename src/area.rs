//! Resolution of area selectors to bounding boxes.

use crate::types::BoundingBox;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AreaError {
    #[error("Invalid area selector: {0}")]
    InvalidSelector(String),
    #[error("Failed to read country bounds: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid country bounds file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Preset areas with fixed boxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedArea {
    Barrington,
    Nayatt,
    RhodeIsland,
    NewYork,
}

impl NamedArea {
    pub const ALL: [NamedArea; 4] = [
        Self::Barrington,
        Self::Nayatt,
        Self::RhodeIsland,
        Self::NewYork,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Barrington => "Barrington",
            Self::Nayatt => "Nayatt",
            Self::RhodeIsland => "RI",
            Self::NewYork => "NY",
        }
    }

    pub const fn bbox(&self) -> BoundingBox {
        match self {
            Self::Barrington => BoundingBox::from_literal(41.708513, -71.363938, 41.759753, -71.294243),
            Self::Nayatt => BoundingBox::from_literal(41.711757, -71.338692, 41.728606, -71.291314),
            Self::RhodeIsland => BoundingBox::from_literal(41.146, -71.862, 42.018, -71.120),
            Self::NewYork => BoundingBox::from_literal(40.4961, -79.7621, 45.0158, -71.8562),
        }
    }
}

impl FromStr for NamedArea {
    type Err = AreaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|area| area.name() == s)
            .ok_or_else(|| {
                AreaError::InvalidSelector(format!(
                    "unknown area '{}' (expected Barrington, Nayatt, RI or NY)",
                    s
                ))
            })
    }
}

impl fmt::Display for NamedArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Exactly one way of naming the area to watch.
#[derive(Debug, Clone, PartialEq)]
pub enum AreaSelector {
    Named(NamedArea),
    Bounds(BoundingBox),
    /// ISO-3166 country or subunit code
    Country(String),
}

impl AreaSelector {
    /// Build a selector from independently supplied options.
    ///
    /// Exactly one of `area`, `bounds` (lat-min, lon-min, lat-max, lon-max)
    /// or `iso` must be given.
    pub fn from_parts(
        area: Option<&str>,
        bounds: Option<[f64; 4]>,
        iso: Option<&str>,
    ) -> Result<Self, AreaError> {
        match (area, bounds, iso) {
            (Some(name), None, None) => Ok(Self::Named(name.parse()?)),
            (None, Some([lat_min, lon_min, lat_max, lon_max]), None) => {
                BoundingBox::new(lat_min, lon_min, lat_max, lon_max)
                    .map(Self::Bounds)
                    .map_err(|e| AreaError::InvalidSelector(e.to_string()))
            }
            (None, None, Some(code)) => {
                let code = code.trim();
                if code.is_empty() {
                    return Err(AreaError::InvalidSelector("empty ISO code".to_string()));
                }
                Ok(Self::Country(code.to_ascii_uppercase()))
            }
            (None, None, None) => Err(AreaError::InvalidSelector(
                "one of area, bounding box or ISO code is required".to_string(),
            )),
            _ => Err(AreaError::InvalidSelector(
                "area, bounding box and ISO code are mutually exclusive".to_string(),
            )),
        }
    }
}

/// Source of per-country subunit bounding boxes.
pub trait CountryBoundsLookup: Send + Sync {
    /// All subunit boxes for an upper-case ISO code, in a stable order.
    fn subunits(&self, iso: &str) -> Vec<BoundingBox>;
}

/// In-memory country table, usually loaded from a JSON file of the form
/// `{"USA": [[lon_min, lat_min, lon_max, lat_max], ...]}`.
#[derive(Debug, Clone, Default)]
pub struct StaticCountryBounds {
    by_code: HashMap<String, Vec<BoundingBox>>,
}

impl StaticCountryBounds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, iso: &str, subunits: Vec<BoundingBox>) {
        self.by_code.insert(iso.to_ascii_uppercase(), subunits);
    }

    pub fn from_json(json: &str) -> Result<Self, AreaError> {
        let raw: HashMap<String, Vec<[f64; 4]>> = serde_json::from_str(json)?;
        let mut table = Self::new();

        for (code, boxes) in raw {
            let subunits = boxes
                .into_iter()
                .map(|[lon_min, lat_min, lon_max, lat_max]| {
                    BoundingBox::new(lat_min, lon_min, lat_max, lon_max).map_err(|e| {
                        AreaError::InvalidSelector(format!("bad subunit box for {}: {}", code, e))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            table.insert(&code, subunits);
        }

        Ok(table)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, AreaError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

impl CountryBoundsLookup for StaticCountryBounds {
    fn subunits(&self, iso: &str) -> Vec<BoundingBox> {
        self.by_code.get(iso).cloned().unwrap_or_default()
    }
}

/// Maps an [`AreaSelector`] to the box a state query is scoped to.
///
/// Countries may have several subunit boxes; `subunit_index` picks which
/// one is used and defaults to 0 for every country.
pub struct AreaResolver<L> {
    lookup: L,
    subunit_index: usize,
}

impl<L: CountryBoundsLookup> AreaResolver<L> {
    pub fn new(lookup: L) -> Self {
        Self {
            lookup,
            subunit_index: 0,
        }
    }

    pub fn with_subunit_index(mut self, index: usize) -> Self {
        self.subunit_index = index;
        self
    }

    pub fn resolve(&self, selector: &AreaSelector) -> Result<BoundingBox, AreaError> {
        match selector {
            AreaSelector::Named(area) => Ok(area.bbox()),
            AreaSelector::Bounds(bbox) => Ok(*bbox),
            AreaSelector::Country(code) => {
                let subunits = self.lookup.subunits(code);
                if subunits.is_empty() {
                    return Err(AreaError::InvalidSelector(format!(
                        "no bounding boxes known for '{}'",
                        code
                    )));
                }
                subunits.get(self.subunit_index).copied().ok_or_else(|| {
                    AreaError::InvalidSelector(format!(
                        "'{}' has {} subunits, index {} is out of range",
                        code,
                        subunits.len(),
                        self.subunit_index
                    ))
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn resolver() -> AreaResolver<StaticCountryBounds> {
        AreaResolver::new(StaticCountryBounds::new())
    }

    #[test]
    fn test_named_areas_resolve_to_literal_boxes() {
        let cases = [
            ("Barrington", [41.708513, -71.363938, 41.759753, -71.294243]),
            ("Nayatt", [41.711757, -71.338692, 41.728606, -71.291314]),
            ("RI", [41.146, -71.862, 42.018, -71.120]),
            ("NY", [40.4961, -79.7621, 45.0158, -71.8562]),
        ];

        for (name, [lat_min, lon_min, lat_max, lon_max]) in cases {
            let selector = AreaSelector::from_parts(Some(name), None, None).unwrap();
            let bbox = resolver().resolve(&selector).unwrap();
            assert_eq!(bbox.lat_min(), lat_min, "{}", name);
            assert_eq!(bbox.lon_min(), lon_min, "{}", name);
            assert_eq!(bbox.lat_max(), lat_max, "{}", name);
            assert_eq!(bbox.lon_max(), lon_max, "{}", name);
            // Literal boxes must satisfy the same invariant as checked ones
            assert!(BoundingBox::new(lat_min, lon_min, lat_max, lon_max).is_ok());
        }
    }

    #[test]
    fn test_selector_requires_exactly_one_kind() {
        let bounds = Some([41.0, -72.0, 42.0, -71.0]);

        let none = AreaSelector::from_parts(None, None, None);
        assert!(matches!(none, Err(AreaError::InvalidSelector(_))));

        let cases = [
            (Some("RI"), bounds, None),
            (Some("RI"), None, Some("USA")),
            (None, bounds, Some("USA")),
            (Some("RI"), bounds, Some("USA")),
        ];
        for (area, bounds, iso) in cases {
            assert!(matches!(
                AreaSelector::from_parts(area, bounds, iso),
                Err(AreaError::InvalidSelector(_))
            ));
        }
    }

    #[test]
    fn test_selector_rejects_bad_values() {
        assert!(matches!(
            AreaSelector::from_parts(Some("Providence"), None, None),
            Err(AreaError::InvalidSelector(_))
        ));
        assert!(matches!(
            AreaSelector::from_parts(None, Some([42.0, -71.0, 41.0, -70.0]), None),
            Err(AreaError::InvalidSelector(_))
        ));
        assert!(matches!(
            AreaSelector::from_parts(None, None, Some("  ")),
            Err(AreaError::InvalidSelector(_))
        ));
    }

    #[test]
    fn test_explicit_bounds_pass_through() {
        let selector =
            AreaSelector::from_parts(None, Some([41.0, -72.0, 42.0, -71.0]), None).unwrap();
        let bbox = resolver().resolve(&selector).unwrap();
        assert_eq!(bbox, BoundingBox::new(41.0, -72.0, 42.0, -71.0).unwrap());
    }

    #[test]
    fn test_country_subunit_selection() {
        let mut table = StaticCountryBounds::new();
        let first = BoundingBox::new(24.0, -125.0, 49.0, -66.0).unwrap();
        let second = BoundingBox::new(51.0, -179.0, 71.0, -129.0).unwrap();
        table.insert("usa", vec![first, second]);

        let selector = AreaSelector::from_parts(None, None, Some("usa")).unwrap();
        assert_eq!(selector, AreaSelector::Country("USA".to_string()));

        let resolver = AreaResolver::new(table);
        assert_eq!(resolver.resolve(&selector).unwrap(), first);

        let resolver = resolver.with_subunit_index(1);
        assert_eq!(resolver.resolve(&selector).unwrap(), second);

        let resolver = resolver.with_subunit_index(2);
        assert!(matches!(
            resolver.resolve(&selector),
            Err(AreaError::InvalidSelector(_))
        ));
    }

    #[test]
    fn test_unknown_country_is_invalid() {
        let selector = AreaSelector::from_parts(None, None, Some("XYZ")).unwrap();
        assert!(matches!(
            resolver().resolve(&selector),
            Err(AreaError::InvalidSelector(_))
        ));
    }

    #[test]
    fn test_load_country_bounds_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"NZL": [[166.5, -46.6, 178.5, -34.5], [-176.9, -44.4, -176.2, -43.7]]}}"#
        )
        .unwrap();

        let table = StaticCountryBounds::load(file.path()).unwrap();
        let subunits = table.subunits("NZL");
        assert_eq!(subunits.len(), 2);
        // File corners are lon-first, boxes are lat-first
        assert_eq!(subunits[0].lat_min(), -46.6);
        assert_eq!(subunits[0].lon_min(), 166.5);
        assert_eq!(subunits[0].lat_max(), -34.5);
        assert_eq!(subunits[0].lon_max(), 178.5);
    }

    #[test]
    fn test_malformed_country_bounds() {
        assert!(matches!(
            StaticCountryBounds::from_json("not json"),
            Err(AreaError::Json(_))
        ));
        assert!(matches!(
            StaticCountryBounds::from_json(r#"{"BAD": [[10.0, 5.0, 9.0, 6.0]]}"#),
            Err(AreaError::InvalidSelector(_))
        ));
    }
}
