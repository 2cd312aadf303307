//! Property values and keyword arguments.
//!
//! Convenience calls follow a configuration-by-keyword pattern: a creation
//! call receives a mapping of property name to value, which the engine
//! validates against the definition's schema and applies to the new object.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::engine::ProxyHandle;
use crate::error::{CallError, CallResult};

/// Runtime property value
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    String(String),
    Vec(Vec<f64>),
    Proxy(ProxyHandle),
    List(Vec<PropertyValue>),
    None,
}

impl PropertyValue {
    /// Try to extract as f64
    pub fn as_float(&self) -> Option<f64> {
        match self {
            PropertyValue::Float(v) => Some(*v),
            PropertyValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Try to extract as i64
    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to extract as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to extract as string
    pub fn as_string(&self) -> Option<&str> {
        match self {
            PropertyValue::String(v) => Some(v),
            _ => None,
        }
    }

    /// Try to extract as vec
    pub fn as_vec(&self) -> Option<&[f64]> {
        match self {
            PropertyValue::Vec(v) => Some(v),
            _ => None,
        }
    }

    /// Try to extract as a proxy handle
    pub fn as_proxy(&self) -> Option<ProxyHandle> {
        match self {
            PropertyValue::Proxy(handle) => Some(handle.clone()),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, PropertyValue::None)
    }

    /// Type name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::Float(_) => "float",
            PropertyValue::Int(_) => "int",
            PropertyValue::Bool(_) => "bool",
            PropertyValue::String(_) => "string",
            PropertyValue::Vec(_) => "vec",
            PropertyValue::Proxy(_) => "proxy",
            PropertyValue::List(_) => "list",
            PropertyValue::None => "none",
        }
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Float(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::String(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::String(v)
    }
}

impl From<Vec<f64>> for PropertyValue {
    fn from(v: Vec<f64>) -> Self {
        PropertyValue::Vec(v)
    }
}

impl From<ProxyHandle> for PropertyValue {
    fn from(v: ProxyHandle) -> Self {
        PropertyValue::Proxy(v)
    }
}

/// Type of a declared property
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PropertyType {
    Float,
    Int,
    Bool,
    String,
    /// Fixed-length numeric vector
    Vec { len: usize },
    /// Choice from a list of options
    Choice { options: Vec<String> },
    /// Reference to another proxy (pipeline input, lookup table, ...)
    Proxy,
}

impl PropertyType {
    /// Get a human-readable type name
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyType::Float => "float",
            PropertyType::Int => "int",
            PropertyType::Bool => "bool",
            PropertyType::String => "string",
            PropertyType::Vec { .. } => "vec",
            PropertyType::Choice { .. } => "choice",
            PropertyType::Proxy => "proxy",
        }
    }

    /// Check if a value is compatible with this type
    pub fn is_compatible_with(&self, value: &PropertyValue) -> bool {
        match (self, value) {
            (PropertyType::Float, PropertyValue::Float(_) | PropertyValue::Int(_)) => true,
            (PropertyType::Int, PropertyValue::Int(_)) => true,
            (PropertyType::Bool, PropertyValue::Bool(_)) => true,
            (PropertyType::String, PropertyValue::String(_)) => true,
            (PropertyType::Vec { len }, PropertyValue::Vec(v)) => v.len() == *len,
            (PropertyType::Choice { options }, PropertyValue::String(s)) => options.contains(s),
            (PropertyType::Proxy, PropertyValue::Proxy(_) | PropertyValue::None) => true,
            _ => false,
        }
    }
}

/// Declared property of an engine definition
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropertySpec {
    pub name: String,
    pub property_type: PropertyType,
    pub default_value: PropertyValue,
}

impl PropertySpec {
    pub fn new(
        name: impl Into<String>,
        property_type: PropertyType,
        default_value: impl Into<PropertyValue>,
    ) -> Self {
        Self {
            name: name.into(),
            property_type,
            default_value: default_value.into(),
        }
    }

    /// Proxy-valued property that starts out unset
    pub fn proxy(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            property_type: PropertyType::Proxy,
            default_value: PropertyValue::None,
        }
    }
}

/// Ordered keyword mapping of property name to value
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Properties {
    values: IndexMap<String, PropertyValue>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Set a property, replacing any previous value
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) {
        self.values.insert(name.into(), value.into());
    }

    /// Get a property value by name
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<PropertyValue> {
        self.values.shift_remove(name)
    }

    pub fn get_float(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|v| v.as_float())
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(|v| v.as_int())
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(|v| v.as_bool())
    }

    pub fn get_string(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.as_string())
    }

    pub fn get_proxy(&self, name: &str) -> Option<ProxyHandle> {
        self.get(name).and_then(|v| v.as_proxy())
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropertyValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Fill in missing properties with defaults from specs
    pub fn fill_defaults(&mut self, specs: &[PropertySpec]) {
        for spec in specs {
            if !self.values.contains_key(&spec.name) {
                self.values
                    .insert(spec.name.clone(), spec.default_value.clone());
            }
        }
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.values)
    }

    /// Deserialize from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let values = serde_json::from_str(json)?;
        Ok(Self { values })
    }
}

impl<K: Into<String>, V: Into<PropertyValue>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut properties = Properties::new();
        for (name, value) in iter {
            properties.set(name, value);
        }
        properties
    }
}

/// Arguments of a scripting-style call: positional values plus keywords
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Args {
    pub positional: Vec<PropertyValue>,
    pub keywords: Properties,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keyword-only arguments
    pub fn keywords(keywords: Properties) -> Self {
        Self {
            positional: Vec::new(),
            keywords,
        }
    }

    /// Append a positional argument
    pub fn arg(mut self, value: impl Into<PropertyValue>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Add a keyword argument
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.keywords.set(name, value);
        self
    }

    pub fn positional(&self, index: usize) -> Option<&PropertyValue> {
        self.positional.get(index)
    }

    /// Keyword argument falling back to a positional slot
    pub fn lookup(&self, name: &str, index: usize) -> Option<&PropertyValue> {
        self.keywords.get(name).or_else(|| self.positional.get(index))
    }

    /// Required float argument
    pub fn require_float(&self, name: &str, index: usize) -> CallResult<f64> {
        let value = self
            .lookup(name, index)
            .ok_or_else(|| CallError::MissingArgument(name.to_string()))?;
        value.as_float().ok_or_else(|| CallError::TypeMismatch {
            name: name.to_string(),
            expected: "float".to_string(),
        })
    }

    /// Required string argument
    pub fn require_string(&self, name: &str, index: usize) -> CallResult<&str> {
        let value = self
            .lookup(name, index)
            .ok_or_else(|| CallError::MissingArgument(name.to_string()))?;
        value.as_string().ok_or_else(|| CallError::TypeMismatch {
            name: name.to_string(),
            expected: "string".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ConnectionId, ProxyGroup};

    #[test]
    fn test_properties_preserve_insertion_order() {
        let props = Properties::new()
            .with("Radius", 0.5)
            .with("Center", vec![0.0, 0.0, 0.0])
            .with("ThetaResolution", 16i64);

        let names: Vec<&str> = props.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["Radius", "Center", "ThetaResolution"]);
    }

    #[test]
    fn test_fill_defaults_keeps_explicit_values() {
        let specs = vec![
            PropertySpec::new("Radius", PropertyType::Float, 0.5),
            PropertySpec::new("ThetaResolution", PropertyType::Int, 8i64),
        ];
        let mut props = Properties::new().with("Radius", 2.0);
        props.fill_defaults(&specs);

        assert_eq!(props.get_float("Radius"), Some(2.0));
        assert_eq!(props.get_int("ThetaResolution"), Some(8));
    }

    #[test]
    fn test_type_compatibility() {
        assert!(PropertyType::Float.is_compatible_with(&PropertyValue::Int(3)));
        assert!(!PropertyType::Int.is_compatible_with(&PropertyValue::Float(3.0)));
        assert!(PropertyType::Vec { len: 3 }.is_compatible_with(&vec![1.0, 2.0, 3.0].into()));
        assert!(!PropertyType::Vec { len: 3 }.is_compatible_with(&vec![1.0].into()));

        let choice = PropertyType::Choice {
            options: vec!["Surface".to_string(), "Wireframe".to_string()],
        };
        assert!(choice.is_compatible_with(&"Surface".into()));
        assert!(!choice.is_compatible_with(&"Points".into()));
    }

    #[test]
    fn test_args_lookup_prefers_keyword() {
        let args = Args::new().arg(1.0).kwarg("scale", 2.0);
        assert_eq!(args.require_float("scale", 0).unwrap(), 2.0);

        let args = Args::new().arg(1.0);
        assert_eq!(args.require_float("scale", 0).unwrap(), 1.0);

        let err = Args::new().require_float("scale", 0).unwrap_err();
        assert_eq!(err, CallError::MissingArgument("scale".to_string()));
    }

    #[test]
    fn test_proxy_value_json() {
        let handle = ProxyHandle {
            id: 7,
            connection: ConnectionId::new(1),
            group: ProxyGroup::Sources,
            xml_name: "SphereSource".to_string(),
        };
        let props = Properties::new().with("Input", handle.clone());
        let json = props.to_json().unwrap();
        let parsed = Properties::from_json(&json).unwrap();
        assert_eq!(parsed.get_proxy("Input"), Some(handle));
    }
}
