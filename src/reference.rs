//! References: `prefix:identifier` entity identities and their interner.
//!
//! A [`Reference`] names an entity in some controlled vocabulary by a
//! `(prefix, identifier)` pair with an optional display name. References
//! appear tens of millions of times in a large assembly run, so the core
//! never shuffles strings around: every reference is interned once into a
//! compact [`RefId`] by the [`ReferenceStore`], and CURIE strings are only
//! materialized on output.

use std::num::NonZeroU32;
use std::sync::RwLock;

use dashmap::DashMap;
use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Serialize};

use crate::error::{KhipuResult, ReferenceError};

// ---------------------------------------------------------------------------
// Reference value
// ---------------------------------------------------------------------------

/// An entity identity: `(prefix, identifier)` plus an optional display name.
///
/// Two references are equal iff both `prefix` and `identifier` are equal
/// (case-sensitive). The display name is presentation metadata and takes no
/// part in equality or hashing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reference {
    /// Vocabulary prefix, e.g. `mesh`.
    pub prefix: String,
    /// Local identifier within the vocabulary, e.g. `C562966`.
    pub identifier: String,
    /// Optional human-readable label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Reference {
    /// Create a reference from its parts.
    pub fn new(prefix: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            identifier: identifier.into(),
            name: None,
        }
    }

    /// Attach a display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Parse a CURIE of the form `prefix:identifier`.
    ///
    /// Splits at the first colon; both sides must be non-empty and free of
    /// whitespace. Anything else is a [`ReferenceError::MalformedCurie`].
    pub fn parse(curie: &str) -> Result<Self, ReferenceError> {
        let malformed = |reason: &str| ReferenceError::MalformedCurie {
            input: curie.to_owned(),
            reason: reason.to_owned(),
        };

        let (prefix, identifier) = curie.split_once(':').ok_or_else(|| malformed("missing ':'"))?;
        if prefix.is_empty() {
            return Err(malformed("empty prefix"));
        }
        if identifier.is_empty() {
            return Err(malformed("empty identifier"));
        }
        if curie.chars().any(char::is_whitespace) {
            return Err(malformed("contains whitespace"));
        }
        Ok(Self::new(prefix, identifier))
    }

    /// Parse a CURIE, rewriting the prefix through a supplied normalizer.
    pub fn parse_with(curie: &str, normalizer: &dyn PrefixNormalizer) -> Result<Self, ReferenceError> {
        let mut reference = Self::parse(curie)?;
        if let Some(canonical) = normalizer.normalize(&reference.prefix) {
            reference.prefix = canonical;
        }
        Ok(reference)
    }

    /// The canonical serialization `prefix:identifier`.
    pub fn curie(&self) -> String {
        format!("{}:{}", self.prefix, self.identifier)
    }
}

impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        self.prefix == other.prefix && self.identifier == other.identifier
    }
}

impl Eq for Reference {}

impl std::hash::Hash for Reference {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.prefix.hash(state);
        self.identifier.hash(state);
    }
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.prefix, self.identifier)
    }
}

impl std::str::FromStr for Reference {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Prefix-normalization capability supplied by the caller.
///
/// The core never ships a prefix registry of its own; an external registry
/// (or none) is plugged in at ingest time.
pub trait PrefixNormalizer: Send + Sync {
    /// Return the canonical form of `prefix`, or `None` to keep it as-is.
    fn normalize(&self, prefix: &str) -> Option<String>;
}

// ---------------------------------------------------------------------------
// Interned IDs
// ---------------------------------------------------------------------------

/// Unique, niche-optimized identifier for an interned reference.
///
/// Uses `NonZeroU32` so that `Option<RefId>` is the same size as `RefId`
/// (the niche optimization lets the compiler use 0 as the `None` discriminant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct RefId(NonZeroU32);

impl RefId {
    /// Create a `RefId` from a raw `u32`. Returns `None` if `raw` is zero.
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(RefId)
    }

    /// Get the underlying `u32` value.
    pub fn get(self) -> u32 {
        self.0.get()
    }

    fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

impl std::fmt::Display for RefId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ref:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Reference store
// ---------------------------------------------------------------------------

/// Interned `(prefix, identifier)` pair backing a [`RefId`].
#[derive(Debug, Clone, Copy)]
struct RefEntry {
    prefix: Spur,
    identifier: Spur,
}

/// Thread-safe reference interner.
///
/// Prefix and identifier strings are interned once into a shared string
/// arena; each distinct `(prefix, identifier)` pair gets a sequential
/// [`RefId`]. Display names are kept in a sparse side table and never affect
/// identity.
pub struct ReferenceStore {
    strings: ThreadedRodeo,
    by_pair: DashMap<(Spur, Spur), RefId>,
    entries: RwLock<Vec<RefEntry>>,
    names: DashMap<RefId, String>,
}

impl ReferenceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            strings: ThreadedRodeo::new(),
            by_pair: DashMap::new(),
            entries: RwLock::new(Vec::new()),
            names: DashMap::new(),
        }
    }

    /// Intern a `(prefix, identifier)` pair, returning its stable [`RefId`].
    ///
    /// Idempotent: the same pair always maps to the same ID.
    pub fn intern_parts(&self, prefix: &str, identifier: &str) -> KhipuResult<RefId> {
        let prefix = self.strings.get_or_intern(prefix);
        let identifier = self.strings.get_or_intern(identifier);
        if let Some(id) = self.by_pair.get(&(prefix, identifier)) {
            return Ok(*id.value());
        }

        let mut entries = self.entries.write().expect("reference table poisoned");
        // Double-check after acquiring the write lock.
        if let Some(id) = self.by_pair.get(&(prefix, identifier)) {
            return Ok(*id.value());
        }
        let raw = u32::try_from(entries.len() + 1).map_err(|_| ReferenceError::Exhausted)?;
        let id = RefId::new(raw).ok_or(ReferenceError::Exhausted)?;
        entries.push(RefEntry { prefix, identifier });
        self.by_pair.insert((prefix, identifier), id);
        Ok(id)
    }

    /// Intern a full [`Reference`], registering its display name if present.
    pub fn intern(&self, reference: &Reference) -> KhipuResult<RefId> {
        let id = self.intern_parts(&reference.prefix, &reference.identifier)?;
        if let Some(ref name) = reference.name {
            self.names.entry(id).or_insert_with(|| name.clone());
        }
        Ok(id)
    }

    /// Parse and intern a CURIE in one step.
    pub fn intern_curie(&self, curie: &str) -> KhipuResult<RefId> {
        let reference = Reference::parse(curie)?;
        self.intern(&reference)
    }

    /// Look up the ID of an already-interned pair without creating it.
    pub fn get_parts(&self, prefix: &str, identifier: &str) -> Option<RefId> {
        let prefix = self.strings.get(prefix)?;
        let identifier = self.strings.get(identifier)?;
        self.by_pair.get(&(prefix, identifier)).map(|r| *r.value())
    }

    /// Materialize the full [`Reference`] for an ID.
    pub fn resolve(&self, id: RefId) -> Reference {
        let entry = self.entry(id);
        Reference {
            prefix: self.strings.resolve(&entry.prefix).to_owned(),
            identifier: self.strings.resolve(&entry.identifier).to_owned(),
            name: self.names.get(&id).map(|n| n.value().clone()),
        }
    }

    /// Materialize the CURIE string for an ID.
    pub fn curie(&self, id: RefId) -> String {
        let entry = self.entry(id);
        format!(
            "{}:{}",
            self.strings.resolve(&entry.prefix),
            self.strings.resolve(&entry.identifier)
        )
    }

    /// The interned prefix handle of a reference. Cheap to compare.
    pub fn prefix_of(&self, id: RefId) -> Spur {
        self.entry(id).prefix
    }

    /// The prefix string of a reference.
    pub fn prefix_str(&self, id: RefId) -> &str {
        self.strings.resolve(&self.entry(id).prefix)
    }

    /// Resolve a prefix string to its interned handle, if any reference uses it.
    ///
    /// Prefixes that were never interned cannot match anything; filters use
    /// this to pre-resolve their prefix lists.
    pub fn prefix_handle(&self, prefix: &str) -> Option<Spur> {
        self.strings.get(prefix)
    }

    /// Attach a display name to an interned reference; the first name wins.
    pub fn set_name(&self, id: RefId, name: impl Into<String>) {
        self.names.entry(id).or_insert_with(|| name.into());
    }

    /// The display name of a reference, if one was recorded.
    pub fn name_of(&self, id: RefId) -> Option<String> {
        self.names.get(&id).map(|n| n.value().clone())
    }

    /// Number of interned references.
    pub fn len(&self) -> usize {
        self.entries.read().expect("reference table poisoned").len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(&self, id: RefId) -> RefEntry {
        self.entries.read().expect("reference table poisoned")[id.index()]
    }
}

impl Default for ReferenceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ReferenceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceStore")
            .field("references", &self.len())
            .finish()
    }
}
