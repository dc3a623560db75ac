//! Declarative mapping between record fields and XML names.
//!
//! A [`Schema`] is checked once, when it is built. The codec relies on that
//! and does no name checking of its own.

use crate::error::SchemaError;
use crate::escape::is_valid_name;
use crate::model::Country;
use std::fmt::{self, Display};

/// A field of [`Country`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// `Country::country_code`
    CountryCode,
    /// `Country::name`
    Name,
    /// `Country::capital`
    Capital,
    /// `Country::description`
    Description,
}

impl Field {
    /// Every field, in canonical document order.
    pub const ALL: [Field; 4] = [
        Field::CountryCode,
        Field::Name,
        Field::Capital,
        Field::Description,
    ];

    /// Whether the field must be present and non-empty.
    #[inline]
    pub fn is_required(self) -> bool {
        !matches!(self, Field::Description)
    }

    /// Reads the field. `None` means absent, which only an optional field
    /// can be.
    pub fn get(self, country: &Country) -> Option<&str> {
        match self {
            Field::CountryCode => Some(&country.country_code),
            Field::Name => Some(&country.name),
            Field::Capital => Some(&country.capital),
            Field::Description => country.description.as_deref(),
        }
    }

    /// Writes the field.
    pub fn set(self, country: &mut Country, value: String) {
        match self {
            Field::CountryCode => country.country_code = value,
            Field::Name => country.name = value,
            Field::Capital => country.capital = value,
            Field::Description => country.description = Some(value),
        }
    }

    /// The field's name in the default document layout.
    pub fn default_name(self) -> &'static str {
        match self {
            Field::CountryCode => "countryCode",
            Field::Name => "name",
            Field::Capital => "capital",
            Field::Description => "description",
        }
    }
}

impl Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_name())
    }
}

/// Where a field lives inside its record element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placement {
    /// A child element holding the value as text.
    Element,
    /// An attribute on the record element.
    Attribute,
}

/// Maps one field to one XML name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// The bound field.
    pub field: Field,
    /// Element or attribute name.
    pub name: String,
    /// Element or attribute.
    pub placement: Placement,
}

impl Binding {
    /// Binds `field` to a child element.
    pub fn element(field: Field, name: impl Into<String>) -> Self {
        Self {
            field,
            name: name.into(),
            placement: Placement::Element,
        }
    }

    /// Binds `field` to an attribute of the record element.
    pub fn attribute(field: Field, name: impl Into<String>) -> Self {
        Self {
            field,
            name: name.into(),
            placement: Placement::Attribute,
        }
    }
}

/// A validated document layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    root: String,
    record: String,
    bindings: Vec<Binding>,
}

impl Schema {
    /// Builds a schema, checking that names are well formed, every field is
    /// bound exactly once and no name is used twice.
    ///
    /// Element bindings are written in the order given.
    pub fn new(
        root: impl Into<String>,
        record: impl Into<String>,
        bindings: Vec<Binding>,
    ) -> Result<Self, SchemaError> {
        let root = root.into();
        let record = record.into();

        for name in [&root, &record].into_iter().chain(bindings.iter().map(|b| &b.name)) {
            if !is_valid_name(name) {
                return Err(SchemaError::InvalidName(name.clone()));
            }
        }
        if root == record {
            return Err(SchemaError::DuplicateName(root));
        }

        for (i, binding) in bindings.iter().enumerate() {
            let earlier = &bindings[..i];
            if earlier.iter().any(|b| b.field == binding.field) {
                return Err(SchemaError::DuplicateField(binding.field));
            }
            if earlier
                .iter()
                .any(|b| b.placement == binding.placement && b.name == binding.name)
            {
                return Err(SchemaError::DuplicateName(binding.name.clone()));
            }
        }

        if let Some(field) = Field::ALL
            .into_iter()
            .find(|f| !bindings.iter().any(|b| b.field == *f))
        {
            return Err(SchemaError::UnboundField(field));
        }

        Ok(Self {
            root,
            record,
            bindings,
        })
    }

    /// Name of the collection element.
    #[inline]
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Name of each record element.
    #[inline]
    pub fn record(&self) -> &str {
        &self.record
    }

    /// All bindings, in declaration order.
    #[inline]
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Bindings with the given placement, in declaration order.
    pub fn placed(&self, placement: Placement) -> impl Iterator<Item = &Binding> {
        self.bindings
            .iter()
            .filter(move |b| b.placement == placement)
    }

    /// Looks up the binding for a name with the given placement.
    pub fn lookup(&self, placement: Placement, name: &str) -> Option<&Binding> {
        self.placed(placement).find(|b| b.name == name)
    }

    /// Comma-separated element names, for error messages.
    pub(crate) fn element_names(&self) -> String {
        self.placed(Placement::Element)
            .map(|b| format!("<{}>", b.name))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// `<countries><country><countryCode/><name/><capital/><description/></country></countries>`
impl Default for Schema {
    fn default() -> Self {
        Self {
            root: "countries".to_string(),
            record: "country".to_string(),
            bindings: Field::ALL
                .into_iter()
                .map(|f| Binding::element(f, f.default_name()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_bindings() -> Vec<Binding> {
        Field::ALL
            .into_iter()
            .map(|f| Binding::element(f, f.default_name()))
            .collect()
    }

    #[test]
    fn test_default_is_valid() {
        let built = Schema::new("countries", "country", default_bindings()).unwrap();
        assert_eq!(built, Schema::default());
    }

    #[test]
    fn test_field_access() {
        let mut country = Country::default();
        for field in Field::ALL {
            field.set(&mut country, field.default_name().to_uppercase());
        }
        assert_eq!(Field::Capital.get(&country), Some("CAPITAL"));
        assert_eq!(Field::Description.get(&country), Some("DESCRIPTION"));
        assert_eq!(Field::Description.get(&Country::default()), None);
    }

    #[test]
    fn test_required_fields() {
        let required: Vec<_> = Field::ALL.into_iter().filter(|f| f.is_required()).collect();
        assert_eq!(required, [Field::CountryCode, Field::Name, Field::Capital]);
    }

    #[test]
    fn test_attribute_layout() {
        let mut bindings = default_bindings();
        bindings[0] = Binding::attribute(Field::CountryCode, "code");
        let schema = Schema::new("countries", "country", bindings).unwrap();
        assert_eq!(
            schema.lookup(Placement::Attribute, "code").map(|b| b.field),
            Some(Field::CountryCode)
        );
        assert!(schema.lookup(Placement::Element, "code").is_none());
        assert_eq!(schema.element_names(), "<name>, <capital>, <description>");
    }

    #[test]
    fn test_invalid_name() {
        let err = Schema::new("1countries", "country", default_bindings()).unwrap_err();
        assert_eq!(err, SchemaError::InvalidName("1countries".to_string()));
    }

    #[test]
    fn test_root_equals_record() {
        let err = Schema::new("c", "c", default_bindings()).unwrap_err();
        assert_eq!(err, SchemaError::DuplicateName("c".to_string()));
    }

    #[test]
    fn test_duplicate_field() {
        let mut bindings = default_bindings();
        bindings.push(Binding::attribute(Field::Name, "n"));
        let err = Schema::new("countries", "country", bindings).unwrap_err();
        assert_eq!(err, SchemaError::DuplicateField(Field::Name));
    }

    #[test]
    fn test_duplicate_name() {
        let mut bindings = default_bindings();
        bindings[1].name = "capital".to_string();
        let err = Schema::new("countries", "country", bindings).unwrap_err();
        assert_eq!(err, SchemaError::DuplicateName("capital".to_string()));
    }

    #[test]
    fn test_same_name_different_placement_is_fine() {
        let mut bindings = default_bindings();
        bindings[0] = Binding::attribute(Field::CountryCode, "name");
        assert!(Schema::new("countries", "country", bindings).is_ok());
    }

    #[test]
    fn test_unbound_field() {
        let mut bindings = default_bindings();
        bindings.pop();
        let err = Schema::new("countries", "country", bindings).unwrap_err();
        assert_eq!(err, SchemaError::UnboundField(Field::Description));
    }
}
