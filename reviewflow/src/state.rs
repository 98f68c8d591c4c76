//! Workflow state: a keyed value container with per-key merge policies.
//!
//! Every key a step writes or a router reads must be declared in a
//! [`StateSchema`] before the graph compiles; merging a delta that touches an
//! undeclared key is an error. Applying a delta never mutates the prior
//! state: [`WorkflowState::apply`] produces a new version, so checkpoints and
//! concurrently running sessions always see a stable snapshot.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// How a delta value for a key combines with the existing value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// The delta value overwrites the prior value.
    Replace,
    /// The delta value is pushed onto the existing array (a non-array prior
    /// value is wrapped first; a missing one becomes a one-element array).
    Append,
}

/// Error merging a delta into [`WorkflowState`].
#[derive(Debug, Error)]
pub enum StateError {
    /// The delta carries a key with no declared [`MergePolicy`].
    #[error("state key '{0}' has no declared merge policy")]
    UndeclaredKey(String),
}

/// Declared keys and their merge policies for one graph.
///
/// Built once at graph-construction time and handed to
/// [`StateGraph::new`](crate::graph::StateGraph::new). Compilation checks
/// every step's declared writes and every router's declared reads against it.
#[derive(Debug, Clone, Default)]
pub struct StateSchema {
    policies: HashMap<String, MergePolicy>,
}

impl StateSchema {
    /// Creates an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a key with its merge policy. Redeclaring a key replaces the policy.
    pub fn declare(mut self, key: impl Into<String>, policy: MergePolicy) -> Self {
        self.policies.insert(key.into(), policy);
        self
    }

    /// Returns the policy for a key, if declared.
    pub fn policy(&self, key: &str) -> Option<MergePolicy> {
        self.policies.get(key).copied()
    }

    /// Whether the key is declared.
    pub fn contains(&self, key: &str) -> bool {
        self.policies.contains_key(key)
    }
}

/// The partial update a step contributes to the state.
///
/// **Interaction**: Returned by atomic steps and as the terminal fragment of
/// streaming steps; merged into [`WorkflowState`] via the schema's policies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateDelta {
    entries: HashMap<String, Value>,
}

impl StateDelta {
    /// Creates an empty delta.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a key/value entry, consuming and returning the delta for chaining.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Inserts a key/value entry.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    /// True when the delta carries no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the entries.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }
}

impl From<HashMap<String, Value>> for StateDelta {
    fn from(entries: HashMap<String, Value>) -> Self {
        Self { entries }
    }
}

impl IntoIterator for StateDelta {
    type Item = (String, Value);
    type IntoIter = std::collections::hash_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Accumulated workflow data: keys to JSON values.
///
/// Immutable per version: [`apply`](Self::apply) merges a [`StateDelta`] into
/// a fresh copy. Steps receive a read-only view and must not retain it past
/// invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowState {
    values: HashMap<String, Value>,
}

impl WorkflowState {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value for a key, if present.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Returns the value for a key as a string slice, if present and a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Returns the value for a key as an integer, if present and numeric.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.values.get(key).and_then(Value::as_i64)
    }

    /// All key/value pairs.
    pub fn values(&self) -> &HashMap<String, Value> {
        &self.values
    }

    /// Merges a delta into a new state version per each key's declared policy.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::UndeclaredKey`] when the delta carries a key the
    /// schema does not declare. The receiver is left untouched either way.
    pub fn apply(&self, schema: &StateSchema, delta: StateDelta) -> Result<Self, StateError> {
        let mut values = self.values.clone();
        for (key, value) in delta {
            let policy = schema
                .policy(&key)
                .ok_or_else(|| StateError::UndeclaredKey(key.clone()))?;
            match policy {
                MergePolicy::Replace => {
                    values.insert(key, value);
                }
                MergePolicy::Append => match values.get_mut(&key) {
                    Some(Value::Array(items)) => items.push(value),
                    Some(existing) => {
                        let prior = existing.take();
                        *existing = Value::Array(vec![prior, value]);
                    }
                    None => {
                        values.insert(key, Value::Array(vec![value]));
                    }
                },
            }
        }
        Ok(Self { values })
    }
}
