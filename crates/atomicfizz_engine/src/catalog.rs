//! # Location Catalog
//!
//! Read-only points of interest, loaded once at startup from a JSON array.
//! Malformed entries are dropped with a warning; the rest of the catalog
//! still loads.

use std::collections::HashMap;
use std::path::Path;

use atomicfizz_shared::Location;

use crate::error::{EngineError, EngineResult};

/// Locations in source order, indexed by name.
#[derive(Clone, Debug)]
pub struct LocationCatalog {
    locations: Vec<Location>,
    by_name: HashMap<String, usize>,
}

impl LocationCatalog {
    /// Builds a catalog, dropping invalid or duplicate entries.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if no valid location remains.
    pub fn new(entries: impl IntoIterator<Item = Location>) -> EngineResult<Self> {
        let mut locations = Vec::new();
        let mut by_name = HashMap::new();
        for location in entries {
            if location.name.trim().is_empty() || !location.coordinates().is_valid() {
                tracing::warn!("Location '{}' skipped: invalid name or coordinates", location.name);
                continue;
            }
            if location.claim_radius_m.is_some_and(|r| !(r.is_finite() && r > 0.0)) {
                tracing::warn!("Location '{}' skipped: claim radius must be positive", location.name);
                continue;
            }
            if by_name.contains_key(&location.name) {
                tracing::warn!("Duplicate location '{}' skipped", location.name);
                continue;
            }
            by_name.insert(location.name.clone(), locations.len());
            locations.push(location);
        }

        if locations.is_empty() {
            return Err(EngineError::Configuration("location catalog is empty".into()));
        }
        Ok(Self { locations, by_name })
    }

    /// Parses a JSON array of locations.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the document is not an array or holds no
    /// valid location.
    pub fn from_json_str(source: &str) -> EngineResult<Self> {
        let entries: Vec<serde_json::Value> = serde_json::from_str(source)
            .map_err(|e| EngineError::Configuration(format!("location catalog is not a JSON array: {e}")))?;

        let parsed = entries
            .into_iter()
            .enumerate()
            .filter_map(|(i, entry)| match serde_json::from_value::<Location>(entry) {
                Ok(location) => Some(location),
                Err(e) => {
                    tracing::warn!("Location entry {i} skipped: {e}");
                    None
                }
            });
        Self::new(parsed)
    }

    /// Reads a catalog file.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the file cannot be read or is invalid.
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Configuration(format!("failed to read {}: {e}", path.display())))?;
        let catalog = Self::from_json_str(&source)?;
        tracing::info!("Loaded {} locations from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    /// Looks up a location by exact name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Location> {
        self.by_name.get(name).map(|&idx| &self.locations[idx])
    }

    /// All locations in source order.
    #[must_use]
    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    /// Number of locations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// Always false for a constructed catalog.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_entries_are_skipped() {
        let catalog = LocationCatalog::from_json_str(
            r#"[
                {"n":"Goodsprings Saloon","lat":35.8324,"lng":-115.4320,"lvl":1,"rarity":"common"},
                {"n":"No Coordinates"},
                {"n":"Off The Map","lat":123.0,"lng":0.0},
                {"n":"Goodsprings Saloon","lat":0.0,"lng":0.0},
                {"name":"Hoover Dam","latitude":36.0161,"longitude":-114.7377,"required_level":10,"rarity":"legendary","hazardous":true}
            ]"#,
        )
        .unwrap();

        assert_eq!(catalog.len(), 2);
        let names: Vec<_> = catalog.locations().iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["Goodsprings Saloon", "Hoover Dam"]);
        assert!((catalog.get("Goodsprings Saloon").unwrap().latitude - 35.8324).abs() < 1e-9);
        assert!(catalog.get("Hoover Dam").unwrap().hazardous);
        assert!(catalog.get("Off The Map").is_none());
    }

    #[test]
    fn test_empty_catalog_is_configuration_error() {
        let err = LocationCatalog::from_json_str(r#"[{"n":"broken"}]"#).unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
        let err = LocationCatalog::from_json_str("not json").unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[test]
    fn test_non_positive_radius_rejected() {
        let catalog = LocationCatalog::from_json_str(
            r#"[
                {"n":"A","lat":1.0,"lng":1.0,"radiusM":0},
                {"n":"B","lat":1.0,"lng":1.0,"radiusM":75}
            ]"#,
        )
        .unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("B").unwrap().claim_radius_m, Some(75.0));
    }
}
