//! Composable value validators.
//!
//! Every validator returns the normalized value on success, e.g. `"true"` becomes `true`
//! for a boolean and `42` becomes `"42"` for a string.

use crate::tree::{Mapping, Value};
use crate::validation::ValidateError;

/// Checks and normalizes a single value.
pub trait Validator: Send + Sync {
    fn validate(&self, value: &Value) -> Result<Value, ValidateError>;
}

fn unexpected(value: &Value, expected: &str) -> ValidateError {
    ValidateError::reason(format!(
        "expected {}, got {} {}",
        expected,
        value.type_name(),
        value
    ))
}

/// Accepts any non-null value.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyValidator;

impl Validator for AnyValidator {
    fn validate(&self, value: &Value) -> Result<Value, ValidateError> {
        match value {
            Value::Null => Err(ValidateError::reason("expected a value, got null")),
            other => Ok(other.clone()),
        }
    }
}

/// Accepts strings; stringifies numeric and boolean scalars.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringValidator;

impl Validator for StringValidator {
    fn validate(&self, value: &Value) -> Result<Value, ValidateError> {
        match value {
            Value::String(_) => Ok(value.clone()),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            Value::Integer(i) => Ok(Value::String(i.to_string())),
            Value::Float(v) => Ok(Value::String(v.to_string())),
            other => Err(unexpected(other, "string")),
        }
    }
}

/// Accepts `true`/`false`, `1`/`0` and the strings "true"/"false" in any case.
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanValidator;

impl Validator for BooleanValidator {
    fn validate(&self, value: &Value) -> Result<Value, ValidateError> {
        match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::Integer(1) => Ok(Value::Bool(true)),
            Value::Integer(0) => Ok(Value::Bool(false)),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
            other => Err(unexpected(other, "boolean")),
        }
    }
}

/// Accepts integers, integral floats and integer strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerValidator;

impl Validator for IntegerValidator {
    fn validate(&self, value: &Value) -> Result<Value, ValidateError> {
        match value {
            Value::Integer(_) => Ok(value.clone()),
            Value::Float(v) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => {
                Ok(Value::Integer(*v as i64))
            }
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| unexpected(value, "integer")),
            other => Err(unexpected(other, "integer")),
        }
    }
}

/// Accepts any numeric kind and numeric strings, normalizing to a float.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberValidator;

impl Validator for NumberValidator {
    fn validate(&self, value: &Value) -> Result<Value, ValidateError> {
        match value {
            Value::Float(_) => Ok(value.clone()),
            Value::Integer(i) => Ok(Value::Float(*i as f64)),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| unexpected(value, "number")),
            other => Err(unexpected(other, "number")),
        }
    }
}

/// Tries each validator in order; the first success wins.
pub struct SequenceValidator {
    validators: Vec<Box<dyn Validator>>,
}

impl SequenceValidator {
    pub fn new(validators: Vec<Box<dyn Validator>>) -> Self {
        Self { validators }
    }
}

impl Validator for SequenceValidator {
    fn validate(&self, value: &Value) -> Result<Value, ValidateError> {
        let mut errors = Vec::with_capacity(self.validators.len());
        for validator in &self.validators {
            match validator.validate(value) {
                Ok(normalized) => return Ok(normalized),
                Err(e) => errors.push(e),
            }
        }
        Err(ValidateError::group(errors))
    }
}

/// Delegates, then requires the normalized value to be one of a fixed set.
pub struct AllowedValidator {
    validator: Box<dyn Validator>,
    allowed: Vec<Value>,
}

impl AllowedValidator {
    pub fn new(validator: Box<dyn Validator>, allowed: Vec<Value>) -> Self {
        Self { validator, allowed }
    }
}

impl Validator for AllowedValidator {
    fn validate(&self, value: &Value) -> Result<Value, ValidateError> {
        let normalized = self.validator.validate(value)?;
        let permitted = self.allowed.iter().any(|candidate| {
            self.validator
                .validate(candidate)
                .map(|c| c == normalized)
                .unwrap_or(false)
        });
        if permitted {
            return Ok(normalized);
        }

        let allowed: Vec<String> = self.allowed.iter().map(Value::to_string).collect();
        Err(ValidateError::reason(format!(
            "got {}, allowed values: {}",
            normalized,
            allowed.join(", ")
        )))
    }
}

/// Applies an item validator to every element of a list.
pub struct ArrayValidator {
    item: Box<dyn Validator>,
}

impl ArrayValidator {
    pub fn new(item: Box<dyn Validator>) -> Self {
        Self { item }
    }
}

impl Validator for ArrayValidator {
    fn validate(&self, value: &Value) -> Result<Value, ValidateError> {
        let Value::Sequence(items) = value else {
            return Err(unexpected(value, "array"));
        };

        let mut normalized = Vec::with_capacity(items.len());
        let mut errors = Vec::new();
        for (i, item) in items.iter().enumerate() {
            match self.item.validate(item) {
                Ok(v) => normalized.push(v),
                Err(e) => errors.push(ValidateError::at(vec![i.to_string()], e)),
            }
        }

        if errors.is_empty() {
            Ok(Value::Sequence(normalized))
        } else {
            Err(ValidateError::group(errors))
        }
    }
}

/// Validates known keys of a map; unknown keys pass through untouched.
pub struct RecordValidator {
    fields: Vec<(String, Box<dyn Validator>)>,
}

impl RecordValidator {
    pub fn new(fields: Vec<(&str, Box<dyn Validator>)>) -> Self {
        Self {
            fields: fields
                .into_iter()
                .map(|(name, validator)| (name.to_string(), validator))
                .collect(),
        }
    }
}

impl Validator for RecordValidator {
    fn validate(&self, value: &Value) -> Result<Value, ValidateError> {
        let Value::Mapping(map) = value else {
            return Err(unexpected(value, "map"));
        };

        let mut normalized = map.clone();
        let mut errors = Vec::new();
        for (name, validator) in &self.fields {
            let Some(field) = map.get(name) else {
                continue;
            };
            if field.is_null() {
                continue;
            }
            match validator.validate(field) {
                Ok(v) => {
                    normalized.insert(name.clone(), v);
                }
                Err(e) => errors.push(ValidateError::at(vec![name.clone()], e)),
            }
        }

        if errors.is_empty() {
            Ok(Value::Mapping(normalized))
        } else {
            Err(ValidateError::group(errors))
        }
    }
}

/// Validates every key and value of an arbitrary map.
pub struct MapValidator {
    key: Box<dyn Validator>,
    value: Box<dyn Validator>,
}

impl MapValidator {
    pub fn new(key: Box<dyn Validator>, value: Box<dyn Validator>) -> Self {
        Self { key, value }
    }
}

impl Validator for MapValidator {
    fn validate(&self, value: &Value) -> Result<Value, ValidateError> {
        let Value::Mapping(map) = value else {
            return Err(unexpected(value, "map"));
        };

        let mut normalized = Mapping::new();
        let mut errors = Vec::new();
        for (key, entry) in map {
            let key = match self.key.validate(&Value::String(key.clone())) {
                Ok(Value::String(s)) => s,
                Ok(other) => other.to_string(),
                Err(e) => {
                    errors.push(ValidateError::at(vec![key.clone()], e));
                    continue;
                }
            };
            match self.value.validate(entry) {
                Ok(v) => {
                    normalized.insert(key, v);
                }
                Err(e) => errors.push(ValidateError::at(vec![key], e)),
            }
        }

        if errors.is_empty() {
            Ok(Value::Mapping(normalized))
        } else {
            Err(ValidateError::group(errors))
        }
    }
}
