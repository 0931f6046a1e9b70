/// Parameter schemas for tools and resources.
///
/// A schema is an ordered list of named properties plus a required list. It
/// serializes to the JSON Schema object MCP clients expect in `inputSchema`
/// and validates call arguments before any host work is scheduled.

use serde_json::{Map, Value, json};

use crate::core::error::SchemaError;

/// JSON type of a parameter.
///
/// `Integer` only accepts numbers without a fractional part; `Number`
/// accepts any JSON number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    /// Name used in JSON Schema `type`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }

    fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }

    /// Convert a string taken from a URI into this type.
    ///
    /// Returns `None` when the text does not parse; validation then reports
    /// the type mismatch.
    pub fn coerce(self, raw: &str) -> Option<Value> {
        match self {
            Self::String => Some(Value::String(raw.to_string())),
            Self::Integer => raw.parse::<i64>().ok().map(Value::from),
            Self::Number => raw
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
            Self::Boolean => raw.parse::<bool>().ok().map(Value::Bool),
            Self::Object | Self::Array => serde_json::from_str(raw).ok(),
        }
    }
}

/// One named parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub kind: ParamType,
    pub description: Option<String>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub allowed: Option<Vec<String>>,
}

impl Property {
    /// Property of type `kind` with no description or constraints.
    pub fn new(kind: ParamType) -> Self {
        Self {
            kind,
            description: None,
            minimum: None,
            maximum: None,
            allowed: None,
        }
    }

    /// String property.
    ///
    /// # Arguments
    /// * `description` - Shown to clients in the listing
    pub fn string(description: impl Into<String>) -> Self {
        Self::new(ParamType::String).describe(description)
    }

    /// Integer property; combine with [`range`](Self::range) for bounds.
    pub fn integer(description: impl Into<String>) -> Self {
        Self::new(ParamType::Integer).describe(description)
    }

    /// Floating point property.
    pub fn number(description: impl Into<String>) -> Self {
        Self::new(ParamType::Number).describe(description)
    }

    pub fn boolean(description: impl Into<String>) -> Self {
        Self::new(ParamType::Boolean).describe(description)
    }

    /// Replace the description.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Inclusive numeric bounds.
    pub fn range(mut self, minimum: f64, maximum: f64) -> Self {
        self.minimum = Some(minimum);
        self.maximum = Some(maximum);
        self
    }

    /// Restrict a string parameter to a fixed set of values.
    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = Some(values.into_iter().map(Into::into).collect());
        self
    }

    fn to_json(&self) -> Value {
        let mut out = Map::new();
        out.insert("type".into(), json!(self.kind.as_str()));
        if let Some(description) = &self.description {
            out.insert("description".into(), json!(description));
        }
        if let Some(minimum) = self.minimum {
            out.insert("minimum".into(), json!(minimum));
        }
        if let Some(maximum) = self.maximum {
            out.insert("maximum".into(), json!(maximum));
        }
        if let Some(allowed) = &self.allowed {
            out.insert("enum".into(), json!(allowed));
        }
        Value::Object(out)
    }

    fn check(&self, name: &str, value: &Value) -> Result<(), SchemaError> {
        if !self.kind.accepts(value) {
            return Err(SchemaError::WrongType {
                name: name.to_string(),
                expected: self.kind.as_str(),
            });
        }
        if let Some(n) = value.as_f64() {
            if let Some(minimum) = self.minimum.filter(|m| n < *m) {
                return Err(SchemaError::Constraint {
                    name: name.to_string(),
                    constraint: format!("must be at least {minimum}"),
                });
            }
            if let Some(maximum) = self.maximum.filter(|m| n > *m) {
                return Err(SchemaError::Constraint {
                    name: name.to_string(),
                    constraint: format!("must be at most {maximum}"),
                });
            }
        }
        if let (Some(allowed), Some(s)) = (&self.allowed, value.as_str()) {
            if !allowed.iter().any(|a| a == s) {
                return Err(SchemaError::Constraint {
                    name: name.to_string(),
                    constraint: format!("must be one of: {}", allowed.join(", ")),
                });
            }
        }
        Ok(())
    }
}

/// Accepted input of a handler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSchema {
    properties: Vec<(String, Property)>,
    required: Vec<String>,
    strict: bool,
}

impl ParameterSchema {
    /// Schema that accepts an empty (or absent) argument object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a property.
    pub fn property(mut self, name: impl Into<String>, property: Property) -> Self {
        let name = name.into();
        match self.properties.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = property,
            None => self.properties.push((name, property)),
        }
        self
    }

    /// Mark a property as required.
    pub fn require(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.required.contains(&name) {
            self.required.push(name);
        }
        self
    }

    /// Reject arguments that are not declared.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Declared property called `name`, if any.
    pub fn get(&self, name: &str) -> Option<&Property> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p)
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }

    /// JSON Schema form, as listed in `inputSchema`.
    pub fn to_json(&self) -> Value {
        let properties: Map<String, Value> = self
            .properties
            .iter()
            .map(|(name, p)| (name.clone(), p.to_json()))
            .collect();

        let mut schema = Map::new();
        schema.insert("type".into(), json!("object"));
        schema.insert("properties".into(), Value::Object(properties));
        if !self.required.is_empty() {
            schema.insert("required".into(), json!(self.required));
        }
        if self.strict {
            schema.insert("additionalProperties".into(), json!(false));
        }
        Value::Object(schema)
    }

    /// Check `args` against the schema. `null` counts as an empty object.
    pub fn validate(&self, args: &Value) -> Result<(), SchemaError> {
        let empty = Map::new();
        let object = match args {
            Value::Object(map) => map,
            Value::Null => &empty,
            _ => return Err(SchemaError::NotAnObject),
        };

        for name in &self.required {
            if object.get(name).is_none_or(Value::is_null) {
                return Err(SchemaError::MissingRequired(name.clone()));
            }
        }

        for (name, value) in object {
            match self.get(name) {
                Some(property) => {
                    // An explicit null on an optional field means "not given".
                    if value.is_null() && !self.is_required(name) {
                        continue;
                    }
                    property.check(name, value)?;
                }
                None if self.strict => return Err(SchemaError::Unexpected(name.clone())),
                None => {}
            }
        }
        Ok(())
    }
}
