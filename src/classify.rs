//! Aircraft category classification.

use std::fmt;

/// Emitter category reported in the extended state vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AircraftCategory {
    NoInfo,
    Light,
    Small,
    Large,
    HighVortexLarge,
    Heavy,
    Rotorcraft,
    Unknown,
}

impl From<i64> for AircraftCategory {
    fn from(code: i64) -> Self {
        match code {
            1 => Self::NoInfo,
            2 => Self::Light,
            3 => Self::Small,
            4 => Self::Large,
            5 => Self::HighVortexLarge,
            6 => Self::Heavy,
            8 => Self::Rotorcraft,
            _ => Self::Unknown,
        }
    }
}

impl AircraftCategory {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::NoInfo => "No info",
            Self::Light => "Light (< 15.5K lbs)",
            Self::Small => "Small (15.5K - 75K lbs)",
            Self::Large => "Large (75-300K lbs)",
            Self::HighVortexLarge => "High Vortex Large",
            Self::Heavy => "Heavy (> 300K lbs)",
            Self::Rotorcraft => "Rotorcraft",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for AircraftCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Maps a raw category code to a human-readable label.
///
/// Implementations must be total: every code gets a non-empty label.
pub trait Classifier: Send + Sync {
    fn classify(&self, category_code: i64) -> String;
}

/// The standard category table.
#[derive(Debug, Clone, Copy, Default)]
pub struct CategoryTable;

impl Classifier for CategoryTable {
    fn classify(&self, category_code: i64) -> String {
        AircraftCategory::from(category_code).label().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes() {
        let table = CategoryTable;
        assert_eq!(table.classify(1), "No info");
        assert_eq!(table.classify(2), "Light (< 15.5K lbs)");
        assert_eq!(table.classify(3), "Small (15.5K - 75K lbs)");
        assert_eq!(table.classify(4), "Large (75-300K lbs)");
        assert_eq!(table.classify(5), "High Vortex Large");
        assert_eq!(table.classify(6), "Heavy (> 300K lbs)");
        assert_eq!(table.classify(8), "Rotorcraft");
    }

    #[test]
    fn test_classifier_is_total() {
        let table = CategoryTable;
        for code in [i64::MIN, -1, 0, 7, 9, 17, 20, i64::MAX] {
            assert_eq!(table.classify(code), "Unknown", "code {}", code);
        }
        for code in -50..50 {
            assert!(!table.classify(code).is_empty());
        }
    }
}
