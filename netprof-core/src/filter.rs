//! Token filter predicate.
//!
//! Filters match case-insensitive substrings of actor, property and RPC
//! names, plus an optional allow-set of connection indices. Evaluation is
//! read-only; filtered aggregates and filtered copies are built from
//! fresh structures.

use std::collections::HashSet;

use crate::names::NameTable;
use crate::token::{PropertyRecord, ReplicateActor, SendRpc, Token};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Substring and connection filter.
///
/// Empty substrings match everything; an absent connection set allows all
/// connections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FilterSpec {
    actor: String,
    property: String,
    rpc: String,
    connections: Option<HashSet<u32>>,
}

impl FilterSpec {
    /// Creates a filter that passes every token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the actor name substring.
    #[must_use]
    pub fn with_actor(mut self, actor: &str) -> Self {
        self.actor = actor.to_lowercase();
        self
    }

    /// Sets the property name substring.
    #[must_use]
    pub fn with_property(mut self, property: &str) -> Self {
        self.property = property.to_lowercase();
        self
    }

    /// Sets the RPC name substring.
    #[must_use]
    pub fn with_rpc(mut self, rpc: &str) -> Self {
        self.rpc = rpc.to_lowercase();
        self
    }

    /// Restricts tokens to the given connection indices.
    #[must_use]
    pub fn with_connections<I: IntoIterator<Item = u32>>(mut self, connections: I) -> Self {
        self.connections = Some(connections.into_iter().collect());
        self
    }

    /// Lower-cased actor substring.
    #[must_use]
    pub fn actor(&self) -> &str {
        &self.actor
    }

    /// Lower-cased property substring.
    #[must_use]
    pub fn property(&self) -> &str {
        &self.property
    }

    /// Lower-cased RPC substring.
    #[must_use]
    pub fn rpc(&self) -> &str {
        &self.rpc
    }

    /// Connection allow-set, if any.
    #[must_use]
    pub fn connections(&self) -> Option<&HashSet<u32>> {
        self.connections.as_ref()
    }

    /// Returns true if the filter passes every token.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actor.is_empty()
            && self.property.is_empty()
            && self.rpc.is_empty()
            && self.connections.is_none()
    }

    /// Returns true if `connection_index` is allowed.
    #[must_use]
    pub fn allows_connection(&self, connection_index: u32) -> bool {
        self.connections
            .as_ref()
            .is_none_or(|set| set.contains(&connection_index))
    }

    /// Returns true if a property or property header passes.
    #[must_use]
    pub fn property_passes(&self, property: &PropertyRecord, names: &NameTable) -> bool {
        self.allows_connection(property.connection_index)
            && name_matches(&self.property, names, property.property_name_index)
    }

    /// Returns true if an actor passes.
    ///
    /// Besides its own name, an actor needs either no properties under an
    /// empty property filter, or at least one passing property.
    #[must_use]
    pub fn actor_passes(&self, actor: &ReplicateActor, names: &NameTable) -> bool {
        if !self.allows_connection(actor.connection_index)
            || !name_matches(&self.actor, names, actor.actor_name_index)
        {
            return false;
        }

        if actor.properties.is_empty() {
            self.property.is_empty()
        } else {
            actor
                .properties
                .iter()
                .any(|property| self.property_passes(property, names))
        }
    }

    /// Returns true if an RPC passes.
    #[must_use]
    pub fn rpc_passes(&self, rpc: &SendRpc, names: &NameTable) -> bool {
        self.allows_connection(rpc.connection_index)
            && name_matches(&self.actor, names, rpc.actor_name_index)
            && name_matches(&self.rpc, names, rpc.function_name_index)
    }

    /// Returns true if `token` passes.
    #[must_use]
    pub fn token_passes(&self, token: &Token, names: &NameTable) -> bool {
        match token {
            Token::ReplicateActor(actor) => self.actor_passes(actor, names),
            Token::ReplicateProperty(property) | Token::WritePropertyHeader(property) => {
                self.property_passes(property, names)
            }
            Token::SendRpc(rpc) => self.rpc_passes(rpc, names),
            other => other
                .connection_index()
                .is_none_or(|connection| self.allows_connection(connection)),
        }
    }
}

fn name_matches(pattern: &str, names: &NameTable, index: u32) -> bool {
    pattern.is_empty() || names.folded(index).is_some_and(|name| name.contains(pattern))
}
