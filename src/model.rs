//! The record model: [`Country`] and the ordered [`Countries`] collection.
//!
//! Nothing here validates. Required fields are checked when a collection is
//! encoded, see [`crate::Codec`].

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// A single country record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Country {
    /// Short identifier such as `"ua"`. Required.
    pub country_code: String,
    /// Display name. Required.
    pub name: String,
    /// Capital city. Required.
    pub capital: String,
    /// Free-form description. Optional.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Country {
    /// Creates a country without a description.
    pub fn new(
        country_code: impl Into<String>,
        name: impl Into<String>,
        capital: impl Into<String>,
    ) -> Self {
        Self {
            country_code: country_code.into(),
            name: name.into(),
            capital: capital.into(),
            description: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Human-readable field dump, one field per line.
impl Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Country Code: {}", self.country_code)?;
        writeln!(f, "Name: {}", self.name)?;
        writeln!(f, "Capital: {}", self.capital)?;
        write!(f, "Description: {}", self.description.as_deref().unwrap_or(""))
    }
}

/// An ordered list of countries. Order is document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Countries(Vec<Country>);

impl Countries {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a country.
    pub fn push(&mut self, country: Country) {
        self.0.push(country);
    }

    /// Number of countries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Country> {
        self.0.iter()
    }

    /// The countries as a slice.
    pub fn as_slice(&self) -> &[Country] {
        &self.0
    }

    /// Consumes the collection, returning the underlying vector.
    pub fn into_inner(self) -> Vec<Country> {
        self.0
    }
}

impl From<Country> for Countries {
    fn from(country: Country) -> Self {
        Self(vec![country])
    }
}

impl From<Vec<Country>> for Countries {
    fn from(countries: Vec<Country>) -> Self {
        Self(countries)
    }
}

impl FromIterator<Country> for Countries {
    fn from_iter<I: IntoIterator<Item = Country>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Country> for Countries {
    fn extend<I: IntoIterator<Item = Country>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for Countries {
    type Item = Country;
    type IntoIter = std::vec::IntoIter<Country>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Countries {
    type Item = &'a Country;
    type IntoIter = std::slice::Iter<'a, Country>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let country = Country::new("ua", "Ukraine", "Kyiv").with_description("Eastern Europe");
        assert_eq!(country.country_code, "ua");
        assert_eq!(country.description.as_deref(), Some("Eastern Europe"));
    }

    #[test]
    fn test_display() {
        let country = Country::new("ua", "Ukraine", "Brussels");
        assert_eq!(
            country.to_string(),
            "Country Code: ua\nName: Ukraine\nCapital: Brussels\nDescription: "
        );
    }

    #[test]
    fn test_order_is_kept() {
        let countries: Countries = ["fr", "de", "at"]
            .into_iter()
            .map(|code| Country::new(code, code, code))
            .collect();
        let codes: Vec<_> = countries.iter().map(|c| c.country_code.as_str()).collect();
        assert_eq!(codes, ["fr", "de", "at"]);
    }

    #[test]
    fn test_single_country_wraps() {
        let countries = Countries::from(Country::new("ua", "Ukraine", "Kyiv"));
        assert_eq!(countries.len(), 1);
        assert!(!countries.is_empty());
    }

    #[test]
    fn test_json_shape() {
        let countries = Countries::from(Country::new("ua", "Ukraine", "Kyiv"));
        let json = serde_json::to_value(&countries).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{ "countryCode": "ua", "name": "Ukraine", "capital": "Kyiv" }])
        );

        let back: Countries = serde_json::from_value(json).unwrap();
        assert_eq!(back, countries);
    }
}
