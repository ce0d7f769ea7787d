//! Name and address tables built while decoding a capture.

use std::collections::HashMap;
use std::fmt;
use std::net::Ipv4Addr;

use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Socket name the engine uses for its own game traffic.
pub const DEFAULT_ENGINE_SOCKET_NAME: &str = "Unreal";

/// Derives a class name from an actor name.
///
/// Actor names carry a trailing `_<digits>` instance suffix
/// (`PlayerPawn_3`). Names without a numeric suffix are their own class.
#[must_use]
pub fn derive_class_name(actor_name: &str) -> &str {
    match actor_name.rfind('_') {
        Some(pos) if pos > 0 => {
            let suffix = &actor_name[pos + 1..];
            if !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) {
                &actor_name[..pos]
            } else {
                actor_name
            }
        }
        _ => actor_name,
    }
}

/// Append-only table of interned names.
///
/// Indices are assigned in insertion order and never change. Class names
/// derived from actor names are appended to the same table on first use.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NameTable {
    names: Vec<String>,
    /// Lower-cased copies used by the filter predicate.
    folded: Vec<String>,
    lookup: HashMap<String, u32>,
    class_cache: HashMap<u32, u32>,
    engine_socket_name: String,
    engine_socket_index: Option<u32>,
}

impl Default for NameTable {
    fn default() -> Self {
        Self::new()
    }
}

impl NameTable {
    /// Creates an empty table that recognises the default engine socket name.
    pub fn new() -> Self {
        Self::with_engine_socket_name(DEFAULT_ENGINE_SOCKET_NAME)
    }

    /// Creates an empty table that recognises `name` as the engine socket.
    pub fn with_engine_socket_name(name: impl Into<String>) -> Self {
        Self {
            names: Vec::new(),
            folded: Vec::new(),
            lookup: HashMap::new(),
            class_cache: HashMap::new(),
            engine_socket_name: name.into(),
            engine_socket_index: None,
        }
    }

    /// Appends a name and returns its index.
    pub fn push(&mut self, name: impl Into<String>) -> u32 {
        let name = name.into();
        let index = u32::try_from(self.names.len()).unwrap_or(u32::MAX);
        if self.engine_socket_index.is_none() && name == self.engine_socket_name {
            self.engine_socket_index = Some(index);
        }
        self.lookup.entry(name.clone()).or_insert(index);
        self.folded.push(name.to_lowercase());
        self.names.push(name);
        index
    }

    /// Returns the name at `index`.
    #[must_use]
    pub fn get(&self, index: u32) -> Option<&str> {
        self.names.get(index as usize).map(String::as_str)
    }

    /// Returns the lower-cased name at `index`.
    #[must_use]
    pub fn folded(&self, index: u32) -> Option<&str> {
        self.folded.get(index as usize).map(String::as_str)
    }

    /// Returns the first index holding `name`.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<u32> {
        self.lookup.get(name).copied()
    }

    /// Index of the engine socket name, once it has been interned.
    #[must_use]
    pub fn engine_socket_index(&self) -> Option<u32> {
        self.engine_socket_index
    }

    /// Number of names in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterates names in index order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Resolves the class name index for an actor name index.
    ///
    /// Results are cached per actor name. A class name not yet present is
    /// appended to the table.
    ///
    /// # Errors
    /// Returns [`Error::ClassNameDerivationFailed`] if `actor_name_index`
    /// does not refer to a name in the table.
    pub fn class_name_index(&mut self, actor_name_index: u32) -> Result<u32> {
        if let Some(&class_index) = self.class_cache.get(&actor_name_index) {
            return Ok(class_index);
        }

        let actor_name = self
            .get(actor_name_index)
            .ok_or(Error::ClassNameDerivationFailed {
                index: actor_name_index,
            })?;
        let class_name = derive_class_name(actor_name);

        let class_index = if class_name.len() == actor_name.len() {
            actor_name_index
        } else if let Some(existing) = self.index_of(class_name) {
            existing
        } else {
            let class_name = class_name.to_owned();
            self.push(class_name)
        };

        self.class_cache.insert(actor_name_index, class_index);
        Ok(class_index)
    }
}

/// An IPv4 endpoint from the capture's address table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Endpoint {
    /// IPv4 address.
    pub ip: Ipv4Addr,
    /// Port number.
    pub port: u32,
}

impl Endpoint {
    /// Creates a new endpoint.
    pub fn new(ip: Ipv4Addr, port: u32) -> Self {
        Self { ip, port }
    }

    /// Unpacks an address table entry: upper 32 bits address, lower 32 bits port.
    #[must_use]
    pub fn from_packed(packed: u64) -> Self {
        Self {
            ip: Ipv4Addr::from((packed >> 32) as u32),
            port: (packed & 0xFFFF_FFFF) as u32,
        }
    }

    /// Packs this endpoint into the address table layout.
    #[must_use]
    pub fn packed(&self) -> u64 {
        (u64::from(u32::from(self.ip)) << 32) | u64::from(self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// Append-only table of connection addresses, indexed by connection index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AddressTable {
    addresses: Vec<u64>,
}

impl AddressTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a packed address and returns its index.
    pub fn push(&mut self, packed: u64) -> u32 {
        let index = u32::try_from(self.addresses.len()).unwrap_or(u32::MAX);
        self.addresses.push(packed);
        index
    }

    /// Returns the packed address at `index`.
    #[must_use]
    pub fn get(&self, index: u32) -> Option<u64> {
        self.addresses.get(index as usize).copied()
    }

    /// Returns the endpoint at `index`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidAddressIndex`] if the index is out of range.
    pub fn endpoint(&self, index: u32) -> Result<Endpoint> {
        self.get(index)
            .map(Endpoint::from_packed)
            .ok_or(Error::InvalidAddressIndex(index))
    }

    /// Number of addresses in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    /// Returns true if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Iterates endpoints in index order.
    pub fn iter(&self) -> impl Iterator<Item = Endpoint> + '_ {
        self.addresses.iter().copied().map(Endpoint::from_packed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_class_name() {
        assert_eq!(derive_class_name("PlayerPawn_3"), "PlayerPawn");
        assert_eq!(derive_class_name("Global"), "Global");
        assert_eq!(derive_class_name("Door_Left"), "Door_Left");
        assert_eq!(derive_class_name("Door_Left_12"), "Door_Left");
        assert_eq!(derive_class_name("Trailing_"), "Trailing_");
        assert_eq!(derive_class_name("_7"), "_7");
    }

    #[test]
    fn test_name_table_indices_are_stable() {
        let mut names = NameTable::new();
        assert_eq!(names.push("Unreal"), 0);
        assert_eq!(names.push("PlayerPawn_3"), 1);
        assert_eq!(names.get(0), Some("Unreal"));
        assert_eq!(names.get(1), Some("PlayerPawn_3"));
        assert_eq!(names.folded(1), Some("playerpawn_3"));
        assert_eq!(names.get(2), None);
        assert_eq!(names.engine_socket_index(), Some(0));
    }

    #[test]
    fn test_class_name_index_appends_once() {
        let mut names = NameTable::new();
        let pawn_3 = names.push("PlayerPawn_3");
        let pawn_7 = names.push("PlayerPawn_7");
        let global = names.push("Global");

        let class_a = names.class_name_index(pawn_3).unwrap();
        let class_b = names.class_name_index(pawn_7).unwrap();
        assert_eq!(class_a, class_b);
        assert_eq!(names.get(class_a), Some("PlayerPawn"));
        assert_eq!(names.len(), 4);

        // Names that are their own class reuse their index.
        assert_eq!(names.class_name_index(global).unwrap(), global);
        assert_eq!(names.len(), 4);
    }

    #[test]
    fn test_class_name_index_reuses_existing_name() {
        let mut names = NameTable::new();
        let class = names.push("Projectile");
        let actor = names.push("Projectile_12");
        assert_eq!(names.class_name_index(actor).unwrap(), class);
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn test_class_name_index_invalid() {
        let mut names = NameTable::new();
        assert_eq!(
            names.class_name_index(5),
            Err(Error::ClassNameDerivationFailed { index: 5 })
        );
    }

    #[test]
    fn test_custom_engine_socket_name() {
        let mut names = NameTable::with_engine_socket_name("GameNetDriver");
        names.push("Unreal");
        let idx = names.push("GameNetDriver");
        assert_eq!(names.engine_socket_index(), Some(idx));
    }

    #[test]
    fn test_endpoint_packing() {
        let endpoint = Endpoint::new(Ipv4Addr::new(127, 0, 0, 1), 7777);
        let packed = endpoint.packed();
        assert_eq!(packed >> 32, 0x7F00_0001);
        assert_eq!(Endpoint::from_packed(packed), endpoint);
        assert_eq!(endpoint.to_string(), "127.0.0.1:7777");
    }

    #[test]
    fn test_address_table() {
        let mut table = AddressTable::new();
        let idx = table.push(Endpoint::new(Ipv4Addr::new(10, 1, 2, 3), 9000).packed());
        assert_eq!(idx, 0);
        assert_eq!(table.endpoint(0).unwrap().to_string(), "10.1.2.3:9000");
        assert_eq!(table.endpoint(1), Err(Error::InvalidAddressIndex(1)));
    }
}
