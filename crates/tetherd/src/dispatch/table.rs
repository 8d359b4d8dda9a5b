//! Immutable message-type to handler registry.

use std::collections::HashMap;
use std::sync::Arc;

use super::binding::{HandlerBinding, Receiver};

/// Maps message types to their bindings in registration order.
#[derive(Debug, Clone, Default)]
pub struct DispatchTable {
    entries: HashMap<String, Vec<HandlerBinding>>,
}

impl DispatchTable {
    /// Starts a table whose bindings require authentication unless they say
    /// otherwise when `default_auth_required` is set.
    pub fn builder(default_auth_required: bool) -> DispatchTableBuilder {
        DispatchTableBuilder {
            default_auth_required,
            entries: HashMap::new(),
        }
    }

    /// Bindings registered for `type_tag`.
    pub fn lookup(&self, type_tag: &str) -> &[HandlerBinding] {
        self.entries.get(type_tag).map_or(&[], Vec::as_slice)
    }

    /// Registered message types.
    pub fn type_tags(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Total number of bindings.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Whether no bindings are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Collects bindings before freezing them into a [`DispatchTable`].
#[derive(Debug)]
pub struct DispatchTableBuilder {
    default_auth_required: bool,
    entries: HashMap<String, Vec<HandlerBinding>>,
}

impl DispatchTableBuilder {
    /// Appends one binding.
    #[must_use]
    pub fn bind(mut self, mut binding: HandlerBinding) -> Self {
        binding
            .policy_mut()
            .resolve_default(self.default_auth_required);
        self.entries
            .entry(binding.type_tag().to_owned())
            .or_default()
            .push(binding);
        self
    }

    /// Appends every binding declared by `receiver`.
    #[must_use]
    pub fn receiver<R: Receiver>(self, receiver: Arc<R>) -> Self {
        receiver
            .bindings()
            .into_iter()
            .fold(self, |builder, binding| builder.bind(binding))
    }

    /// Freezes the table.
    pub fn build(self) -> DispatchTable {
        DispatchTable {
            entries: self.entries,
        }
    }
}
