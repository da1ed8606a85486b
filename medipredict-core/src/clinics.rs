//! Clinic directory: city → area → clinics, loaded from TOML.
//!
//! The built-in directory is compiled from `data/clinics.toml`; deployments
//! can point `data.clinics_file` at their own copy to update listings
//! without a rebuild.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::ClinicError;

const BUILTIN_DIRECTORY: &str = include_str!("../data/clinics.toml");

/// A single clinic listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clinic {
    pub name: String,
    pub address: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Area {
    name: String,
    #[serde(default, rename = "clinic")]
    clinics: Vec<Clinic>,
}

#[derive(Debug, Clone, Deserialize)]
struct City {
    name: String,
    #[serde(default, rename = "area")]
    areas: Vec<Area>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DirectoryFile {
    #[serde(default, rename = "city")]
    cities: Vec<City>,
}

/// Result of a city/area selection, ready for rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClinicLookup {
    pub cities: Vec<String>,
    pub selected_city: Option<String>,
    pub selected_area: Option<String>,
    /// Areas of the selected city; `None` until a city is chosen.
    pub areas: Option<Vec<String>>,
    pub clinics: Vec<Clinic>,
}

/// Read-only clinic directory. File order is preserved everywhere.
#[derive(Debug, Clone)]
pub struct ClinicDirectory {
    cities: Vec<City>,
}

impl ClinicDirectory {
    /// The directory shipped with the binary.
    pub fn builtin() -> Result<Self, ClinicError> {
        Self::from_toml_str(BUILTIN_DIRECTORY)
    }

    pub fn load(path: &Path) -> Result<Self, ClinicError> {
        let content = std::fs::read_to_string(path).map_err(|source| ClinicError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let directory = Self::from_toml_str(&content)?;
        info!(
            path = %path.display(),
            cities = directory.cities.len(),
            "Loaded clinic directory"
        );
        Ok(directory)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ClinicError> {
        let file: DirectoryFile = toml::from_str(content).map_err(|e| ClinicError::Parse {
            message: e.to_string(),
        })?;
        Ok(Self {
            cities: file.cities,
        })
    }

    fn city(&self, name: &str) -> Option<&City> {
        self.cities.iter().find(|c| c.name == name)
    }

    pub fn cities(&self) -> Vec<&str> {
        self.cities.iter().map(|c| c.name.as_str()).collect()
    }

    /// Areas of `city`, or `None` for an unknown city.
    pub fn areas(&self, city: &str) -> Option<Vec<&str>> {
        self.city(city)
            .map(|c| c.areas.iter().map(|a| a.name.as_str()).collect())
    }

    /// Clinics registered for `city`/`area`; empty when either is unknown.
    pub fn clinics(&self, city: &str, area: &str) -> &[Clinic] {
        self.city(city)
            .and_then(|c| c.areas.iter().find(|a| a.name == area))
            .map(|a| a.clinics.as_slice())
            .unwrap_or(&[])
    }

    /// Resolve a form submission. Empty strings count as "not selected".
    ///
    /// An unknown city is an error; an unknown area in a known city simply
    /// yields no clinics.
    pub fn lookup(&self, city: Option<&str>, area: Option<&str>) -> Result<ClinicLookup, ClinicError> {
        let mut result = ClinicLookup {
            cities: self.cities().into_iter().map(String::from).collect(),
            ..ClinicLookup::default()
        };

        let Some(city) = city.filter(|c| !c.is_empty()) else {
            return Ok(result);
        };
        let areas = self.areas(city).ok_or_else(|| ClinicError::UnknownCity {
            city: city.to_string(),
        })?;
        result.selected_city = Some(city.to_string());
        result.areas = Some(areas.into_iter().map(String::from).collect());

        if let Some(area) = area.filter(|a| !a.is_empty()) {
            result.selected_area = Some(area.to_string());
            result.clinics = self.clinics(city, area).to_vec();
        }
        Ok(result)
    }
}
