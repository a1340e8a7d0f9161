//! Property declarations - attribute mapping, conversion and change detection.
//!
//! Each reactive property of a component is described once by a
//! [`PropertyDeclaration`]. Declarations are plain values built with a small
//! builder surface:
//!
//! ```ignore
//! PropertyDeclaration::new("count").number().reflect(true)
//! PropertyDeclaration::new("userName").attribute(AttributeBinding::named("user"))
//! PropertyDeclaration::new("cache").attribute(AttributeBinding::Disabled)
//! ```

use std::fmt;
use std::rc::Rc;

use crate::value::{Value, format_number, parse_number};

// =============================================================================
// Attribute binding
// =============================================================================

/// Which attribute, if any, mirrors a property.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AttributeBinding {
    /// The lowercased property name.
    #[default]
    Auto,
    Named(String),
    /// No attribute; the property is not observed or reflected.
    Disabled,
}

impl AttributeBinding {
    pub fn named(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

/// How the default converter reads and writes a property.
///
/// `Any` passes values through unconverted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TypeHint {
    #[default]
    String,
    Number,
    Boolean,
    /// JSON text in the attribute, a `Value::Json` on the property.
    Structured,
    Any,
}

// =============================================================================
// Converters
// =============================================================================

pub type FromAttribute = Rc<dyn Fn(Option<&str>, TypeHint) -> Value>;

/// `None` removes the attribute.
pub type ToAttribute = Rc<dyn Fn(&Value, TypeHint) -> Option<String>>;

pub type HasChanged = Rc<dyn Fn(&Value, &Value) -> bool>;

/// Attribute/property conversion. A custom converter may supply either half;
/// the missing half falls back to the default.
#[derive(Clone, Default)]
pub enum Converter {
    #[default]
    Default,
    Custom {
        from_attribute: Option<FromAttribute>,
        to_attribute: Option<ToAttribute>,
    },
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Converter::Default => f.write_str("Default"),
            Converter::Custom { from_attribute, to_attribute } => f
                .debug_struct("Custom")
                .field("from_attribute", &from_attribute.is_some())
                .field("to_attribute", &to_attribute.is_some())
                .finish(),
        }
    }
}

impl Converter {
    /// A converter that only customizes reading the attribute.
    pub fn from_attribute(f: impl Fn(Option<&str>, TypeHint) -> Value + 'static) -> Self {
        Converter::Custom {
            from_attribute: Some(Rc::new(f)),
            to_attribute: None,
        }
    }

    /// A converter that only customizes writing the attribute.
    pub fn to_attribute(f: impl Fn(&Value, TypeHint) -> Option<String> + 'static) -> Self {
        Converter::Custom {
            from_attribute: None,
            to_attribute: Some(Rc::new(f)),
        }
    }

    pub fn read(&self, attribute: Option<&str>, hint: TypeHint) -> Value {
        match self {
            Converter::Custom { from_attribute: Some(f), .. } => f(attribute, hint),
            _ => default_from_attribute(attribute, hint),
        }
    }

    pub fn write(&self, value: &Value, hint: TypeHint) -> Option<String> {
        match self {
            Converter::Custom { to_attribute: Some(f), .. } => f(value, hint),
            _ => default_to_attribute(value, hint),
        }
    }
}

/// Attribute text to property value.
///
/// Booleans follow presence; numbers parse leniently (blank is `0`, garbage is
/// `NaN`, absent is null); structured values parse as JSON.
pub fn default_from_attribute(attribute: Option<&str>, hint: TypeHint) -> Value {
    match (hint, attribute) {
        (TypeHint::Boolean, attribute) => Value::Bool(attribute.is_some()),
        (_, None) => Value::Null,
        (TypeHint::Number, Some(text)) => Value::Number(parse_number(text)),
        (TypeHint::Structured, Some(text)) => match serde_json::from_str::<serde_json::Value>(text) {
            Ok(json) => Value::Json(json),
            Err(err) => {
                tracing::warn!(%err, attribute = text, "rejected structured attribute value");
                Value::Null
            }
        },
        (TypeHint::String | TypeHint::Any, Some(text)) => Value::Str(text.to_string()),
    }
}

/// Property value to attribute text.
pub fn default_to_attribute(value: &Value, hint: TypeHint) -> Option<String> {
    match (hint, value) {
        (TypeHint::Boolean, value) => value.is_truthy().then(String::new),
        (_, Value::Null | Value::Nothing) => None,
        (TypeHint::Structured, value) => value.to_json().map(|json| json.to_string()),
        (_, Value::Number(n)) => Some(format_number(*n)),
        (_, value) => Some(value.to_text()),
    }
}

/// Strict inequality that treats `NaN` as unchanged.
pub fn not_equal(value: &Value, old: &Value) -> bool {
    #[allow(clippy::eq_op)]
    let comparable = old == old || value == value;
    old != value && comparable
}

// =============================================================================
// PropertyDeclaration
// =============================================================================

/// Options of one reactive property.
#[derive(Clone)]
pub struct PropertyDeclaration {
    pub name: String,
    pub attribute: AttributeBinding,
    pub type_hint: TypeHint,
    pub reflect: bool,
    pub converter: Converter,
    pub has_changed: HasChanged,
    /// Written once when an element is created, so it shows up as a change
    /// in the first cycle.
    pub initial: Value,
}

impl fmt::Debug for PropertyDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDeclaration")
            .field("name", &self.name)
            .field("attribute", &self.attribute)
            .field("type_hint", &self.type_hint)
            .field("reflect", &self.reflect)
            .field("converter", &self.converter)
            .field("initial", &self.initial)
            .finish()
    }
}

impl PropertyDeclaration {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attribute: AttributeBinding::Auto,
            type_hint: TypeHint::String,
            reflect: false,
            converter: Converter::Default,
            has_changed: Rc::new(not_equal),
            initial: Value::Null,
        }
    }

    pub fn attribute(mut self, attribute: AttributeBinding) -> Self {
        self.attribute = attribute;
        self
    }

    pub fn type_hint(mut self, hint: TypeHint) -> Self {
        self.type_hint = hint;
        self
    }

    pub fn number(self) -> Self {
        self.type_hint(TypeHint::Number)
    }

    pub fn boolean(self) -> Self {
        self.type_hint(TypeHint::Boolean)
    }

    pub fn structured(self) -> Self {
        self.type_hint(TypeHint::Structured)
    }

    pub fn reflect(mut self, reflect: bool) -> Self {
        self.reflect = reflect;
        self
    }

    pub fn converter(mut self, converter: Converter) -> Self {
        self.converter = converter;
        self
    }

    pub fn has_changed(mut self, f: impl Fn(&Value, &Value) -> bool + 'static) -> Self {
        self.has_changed = Rc::new(f);
        self
    }

    pub fn initial(mut self, value: impl Into<Value>) -> Self {
        self.initial = value.into();
        self
    }

    /// The observed attribute name, if the property has one.
    pub fn attribute_name(&self) -> Option<String> {
        match &self.attribute {
            AttributeBinding::Auto => Some(self.name.to_ascii_lowercase()),
            AttributeBinding::Named(name) => Some(name.clone()),
            AttributeBinding::Disabled => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_name_resolution() {
        assert_eq!(PropertyDeclaration::new("userName").attribute_name().as_deref(), Some("username"));
        let named = PropertyDeclaration::new("userName").attribute(AttributeBinding::named("user-name"));
        assert_eq!(named.attribute_name().as_deref(), Some("user-name"));
        let disabled = PropertyDeclaration::new("cache").attribute(AttributeBinding::Disabled);
        assert_eq!(disabled.attribute_name(), None);
    }

    #[test]
    fn test_default_from_attribute() {
        assert_eq!(default_from_attribute(Some(""), TypeHint::Boolean), Value::Bool(true));
        assert_eq!(default_from_attribute(None, TypeHint::Boolean), Value::Bool(false));
        assert_eq!(default_from_attribute(Some("5"), TypeHint::Number), Value::Number(5.0));
        assert_eq!(default_from_attribute(Some(" "), TypeHint::Number), Value::Number(0.0));
        assert_eq!(default_from_attribute(None, TypeHint::Number), Value::Null);
        let nan = default_from_attribute(Some("five"), TypeHint::Number);
        assert!(nan.as_number().is_some_and(f64::is_nan));
        assert_eq!(default_from_attribute(Some("0x10"), TypeHint::Number), Value::Number(16.0));
        let inf = default_from_attribute(Some("inf"), TypeHint::Number);
        assert!(inf.as_number().is_some_and(f64::is_nan));
        assert_eq!(default_from_attribute(Some("hi"), TypeHint::String), Value::from("hi"));
        assert_eq!(
            default_from_attribute(Some("[1,2]"), TypeHint::Structured),
            Value::Json(serde_json::json!([1, 2]))
        );
        assert_eq!(default_from_attribute(Some("{oops"), TypeHint::Structured), Value::Null);
    }

    #[test]
    fn test_default_to_attribute() {
        assert_eq!(default_to_attribute(&Value::Bool(true), TypeHint::Boolean).as_deref(), Some(""));
        assert_eq!(default_to_attribute(&Value::Bool(false), TypeHint::Boolean), None);
        assert_eq!(default_to_attribute(&Value::Number(5.0), TypeHint::Number).as_deref(), Some("5"));
        assert_eq!(default_to_attribute(&Value::Null, TypeHint::String), None);
        let json = Value::Json(serde_json::json!({"a": 1}));
        assert_eq!(default_to_attribute(&json, TypeHint::Structured).as_deref(), Some(r#"{"a":1}"#));
    }

    #[test]
    fn test_custom_converter_falls_back_per_half() {
        let upper = Converter::from_attribute(|text, _| Value::from(text.unwrap_or_default().to_uppercase()));
        assert_eq!(upper.read(Some("abc"), TypeHint::String), Value::from("ABC"));
        assert_eq!(upper.write(&Value::from("abc"), TypeHint::String).as_deref(), Some("abc"));
    }

    #[test]
    fn test_not_equal_treats_nan_as_unchanged() {
        assert!(not_equal(&Value::from(1), &Value::from(2)));
        assert!(!not_equal(&Value::from("a"), &Value::from("a")));
        assert!(!not_equal(&Value::Number(f64::NAN), &Value::Number(f64::NAN)));
        assert!(not_equal(&Value::Number(f64::NAN), &Value::Number(1.0)));
    }
}
