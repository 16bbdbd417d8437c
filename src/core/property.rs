use super::{Result, StoreError, Value};
use serde::{Deserialize, Serialize};

/// Name reserved for the opaque content blob. Callers may never set it directly.
pub const CONTENT_PROPERTY: &str = "Content";

/// One named attribute of an entity.
///
/// `value` is either absent or exactly one of Integer, Float, Boolean or Text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    #[serde(default)]
    pub value: Option<Value>,
}

impl Property {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name == CONTENT_PROPERTY {
            return Err(StoreError::invalid_property(&self.name, "reserved name"));
        }

        match &self.value {
            Some(value) if !value.is_scalar() => Err(StoreError::invalid_property(
                &self.name,
                format!("invalid type: {}", value.type_name()),
            )),
            _ => Ok(()),
        }
    }
}

/// Validate every property in a list before anything is written.
pub fn validate_properties(properties: &[Property]) -> Result<()> {
    properties.iter().try_for_each(Property::validate)
}

/// First property with the given name.
pub fn find_property<'a>(properties: &'a [Property], name: &str) -> Option<&'a Property> {
    properties.iter().find(|p| p.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_name_rejected() {
        let err = Property::new(CONTENT_PROPERTY, "x").validate().unwrap_err();
        assert!(matches!(err, StoreError::InvalidProperty { ref name, .. } if name == "Content"));
    }

    #[test]
    fn test_blob_value_rejected() {
        let prop = Property {
            name: "Payload".into(),
            value: Some(Value::Blob(vec![1, 2, 3])),
        };
        assert!(matches!(prop.validate(), Err(StoreError::InvalidProperty { .. })));
    }

    #[test]
    fn test_scalars_and_absent_accepted() {
        let props = vec![
            Property::new("Limit", 10i64),
            Property::new("Ratio", 0.5),
            Property::new("Enabled", true),
            Property::new("Owner", "alice"),
            Property::empty("Note"),
        ];
        assert!(validate_properties(&props).is_ok());
    }

    #[test]
    fn test_validation_stops_at_first_bad_property() {
        let props = vec![Property::new("Limit", 10i64), Property::new(CONTENT_PROPERTY, 1i64)];
        assert!(validate_properties(&props).is_err());
    }

    #[test]
    fn test_find_property_returns_first_match() {
        let props = vec![Property::new("A", 1i64), Property::new("A", 2i64)];
        assert_eq!(find_property(&props, "A").unwrap().value, Some(Value::Integer(1)));
        assert!(find_property(&props, "B").is_none());
    }
}
