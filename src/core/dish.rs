//! The dish: a typed value threaded through a recipe.
//!
//! A dish never changes after construction. Reading it in another kind
//! yields a fresh value (`get`) or a new dish (`into_kind`).

use super::coercion::{CoercionTable, ConversionOptions};
use super::error::TypeConversionError;
use super::types::{DataKind, Value};
use crate::journal::hasher;

#[derive(Debug, Clone, PartialEq)]
pub struct Dish {
    value: Value,
}

impl Dish {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    /// Construct a dish tagged `kind`, rejecting a value of another kind.
    pub fn set(value: Value, kind: DataKind) -> Result<Self, TypeConversionError> {
        if value.kind() != kind {
            return Err(TypeConversionError::new(
                value.kind(),
                kind,
                format!("value is {}, not {}", value.kind(), kind),
            ));
        }
        Ok(Self { value })
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new(Value::Text(text.into()))
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(Value::Bytes(bytes.into()))
    }

    pub fn kind(&self) -> DataKind {
        self.value.kind()
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn size(&self) -> usize {
        self.value.size()
    }

    /// Read the dish as `target`, leaving it untouched.
    pub fn get(
        &self,
        target: DataKind,
        table: &CoercionTable,
        options: &ConversionOptions,
    ) -> Result<Value, TypeConversionError> {
        table.convert(&self.value, target, options)
    }

    /// Consume the dish and produce one of kind `target`. A dish that is
    /// already `target` is moved through without copying.
    pub fn into_kind(
        self,
        target: DataKind,
        table: &CoercionTable,
        options: &ConversionOptions,
    ) -> Result<Dish, TypeConversionError> {
        if self.kind() == target {
            return Ok(self);
        }
        table.convert(&self.value, target, options).map(Dish::new)
    }

    /// Render the dish as bytes for output.
    pub fn to_bytes(
        &self,
        table: &CoercionTable,
        options: &ConversionOptions,
    ) -> Result<Vec<u8>, TypeConversionError> {
        match self.get(DataKind::Bytes, table, options)? {
            Value::Bytes(bytes) => Ok(bytes),
            other => Err(TypeConversionError::new(
                self.kind(),
                DataKind::Bytes,
                format!("converter produced {}", other.kind()),
            )),
        }
    }

    /// BLAKE3 fingerprint of kind and content.
    pub fn fingerprint(&self) -> String {
        hasher::hash_value(&self.value)
    }
}
