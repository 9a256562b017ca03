//! Operation descriptors and the name-keyed operation registry.

use super::error::{OperationError, RegistryError};
use super::resolver;
use super::types::{ArgumentSpec, DataKind, ResolvedArgs, Value};
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// Transform function of an operation. Pure; receives a borrowed input so
/// callers can retry or inspect it afterwards.
pub type TransformFn =
    dyn Fn(&Value, &ResolvedArgs) -> Result<Value, OperationError> + Send + Sync;

/// Everything the engine needs to know about one operation.
#[derive(Clone)]
pub struct OperationDescriptor {
    pub name: String,
    pub category: String,
    pub description: String,
    pub input: DataKind,
    pub output: DataKind,
    pub args: Vec<ArgumentSpec>,
    /// False for operations that consult randomness or clocks.
    pub deterministic: bool,
    transform: Arc<TransformFn>,
}

impl OperationDescriptor {
    pub fn new<F>(name: &str, category: &str, input: DataKind, output: DataKind, transform: F) -> Self
    where
        F: Fn(&Value, &ResolvedArgs) -> Result<Value, OperationError> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            category: category.to_string(),
            description: String::new(),
            input,
            output,
            args: Vec::new(),
            deterministic: true,
            transform: Arc::new(transform),
        }
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn arg(mut self, spec: ArgumentSpec) -> Self {
        self.args.push(spec);
        self
    }

    pub fn non_deterministic(mut self) -> Self {
        self.deterministic = false;
        self
    }

    /// Invoke the transform.
    pub fn transform(&self, input: &Value, args: &ResolvedArgs) -> Result<Value, OperationError> {
        (self.transform)(input, args)
    }
}

impl fmt::Debug for OperationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationDescriptor")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("input", &self.input)
            .field("output", &self.output)
            .field("args", &self.args.len())
            .field("deterministic", &self.deterministic)
            .finish()
    }
}

/// Registry of operations, in registration order.
#[derive(Debug, Clone, Default)]
pub struct OperationRegistry {
    ops: IndexMap<String, Arc<OperationDescriptor>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in catalog.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::operations::register_builtins(&mut registry);
        registry
    }

    /// Add an operation. Names are unique and argument schemas must be
    /// well formed.
    pub fn register(&mut self, op: OperationDescriptor) -> Result<(), RegistryError> {
        if self.ops.contains_key(&op.name) {
            return Err(RegistryError::Duplicate(op.name));
        }
        resolver::validate_schema(&op.args).map_err(|reason| RegistryError::InvalidSchema {
            op: op.name.clone(),
            reason,
        })?;
        self.ops.insert(op.name.clone(), Arc::new(op));
        Ok(())
    }

    /// Find an operation by exact name, falling back to a case-insensitive
    /// match with underscores read as spaces.
    pub fn lookup(&self, name: &str) -> Option<Arc<OperationDescriptor>> {
        if let Some(op) = self.ops.get(name) {
            return Some(Arc::clone(op));
        }
        let wanted = normalize(name);
        self.ops
            .values()
            .find(|op| normalize(&op.name) == wanted)
            .cloned()
    }

    pub fn list_by_category(&self, category: &str) -> Vec<Arc<OperationDescriptor>> {
        self.ops
            .values()
            .filter(|op| op.category.eq_ignore_ascii_case(category))
            .cloned()
            .collect()
    }

    /// Category names in first-registration order.
    pub fn categories(&self) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        for op in self.ops.values() {
            if !seen.contains(&op.category) {
                seen.push(op.category.clone());
            }
        }
        seen
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<OperationDescriptor>> {
        self.ops.values()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

fn normalize(name: &str) -> String {
    name.trim().replace('_', " ").to_lowercase()
}
