use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Separator fed between name components so that `["ab", "c"]` and
/// `["a", "bc"]` hash differently.
const NAME_SEPARATOR: u8 = 0x1f;

/// Blake3 digest of a source unit's content.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({}..)", &self.to_hex()[..8])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Coarse whole-project fingerprint covering compile-time-relevant shape
/// (configuration, metadata). Any change invalidates every result that was
/// computed against the project.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({}..)", &self.to_hex()[..8])
    }
}

/// Content hash recorded on a dependency edge.
///
/// Intra-project edges are sometimes recorded without a real content hash
/// (the master unit is recompiled in the same pass anyway). `Untracked` is an
/// explicit sentinel distinct from every computable digest, so hash-change
/// detection can skip these edges instead of silently comparing against a
/// reserved in-band value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitHash {
    /// No content hash was recorded for this edge.
    Untracked,
    /// Blake3 digest of the master unit's content at analysis time.
    Content(ContentHash),
}

impl From<ContentHash> for UnitHash {
    fn from(hash: ContentHash) -> Self {
        UnitHash::Content(hash)
    }
}

/// Value identity of a compiled project: assembly/project name plus the
/// fingerprint of its configuration.
///
/// The same logical project is reconstructed independently in different
/// processes, so equality is by value, never by reference. Construction is
/// pure and deterministic; equal inputs always yield equal identities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectIdentity {
    name: Arc<str>,
    fingerprint: Fingerprint,
}

impl ProjectIdentity {
    pub fn new(name: impl Into<Arc<str>>, fingerprint: Fingerprint) -> Self {
        Self {
            name: name.into(),
            fingerprint,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }
}

impl fmt::Display for ProjectIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}..)", self.name, &self.fingerprint.to_hex()[..8])
    }
}

/// Weak identity of a declared type, hashed from its simple-name chain.
///
/// The chain is hashed innermost to outermost, already truncated by the
/// caller at module/namespace boundaries, with a deterministic seed-free
/// combinator. Two declarations with the same simple-name chain therefore
/// produce the same key regardless of which compiled module defines them,
/// which is what lets partial-type edges match across process and assembly
/// boundaries without a shared symbol table.
///
/// Equality is hash equality only. Collisions are accepted: a colliding key
/// merges two unrelated types' dependent sets, which can only cause an extra
/// (safe) invalidation, never a missed one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeIdentityKey {
    key: u64,
    /// Retained for diagnostics only; excluded from equality.
    display: Option<Arc<str>>,
}

impl TypeIdentityKey {
    /// Build a key from name components ordered innermost to outermost.
    pub fn create<I, S>(chain: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut hasher = FxHasher::default();
        for component in chain {
            hasher.write(component.as_ref().as_bytes());
            hasher.write_u8(NAME_SEPARATOR);
        }
        Self {
            key: hasher.finish(),
            display: None,
        }
    }

    /// Build a key from a dotted name such as `"Outer.Inner"`, reversing the
    /// components so the hash order matches [`TypeIdentityKey::create`].
    pub fn from_dotted_name(dotted: &str) -> Self {
        let mut key = Self::create(dotted.split('.').rev());
        key.display = Some(Arc::from(dotted));
        key
    }

    pub fn with_display(mut self, display: impl Into<Arc<str>>) -> Self {
        self.display = Some(display.into());
        self
    }

    pub fn key(&self) -> u64 {
        self.key
    }

    pub fn display(&self) -> Option<&str> {
        self.display.as_deref()
    }
}

impl PartialEq for TypeIdentityKey {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for TypeIdentityKey {}

impl Hash for TypeIdentityKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

/// Cheaply clonable shared path of a source unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitPath(Arc<Path>);

impl UnitPath {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self(Arc::from(path.as_ref()))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl Deref for UnitPath {
    type Target = Path;

    fn deref(&self) -> &Path {
        &self.0
    }
}

impl Borrow<Path> for UnitPath {
    fn borrow(&self) -> &Path {
        &self.0
    }
}

impl AsRef<Path> for UnitPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl From<&str> for UnitPath {
    fn from(path: &str) -> Self {
        Self::new(Path::new(path))
    }
}

impl From<PathBuf> for UnitPath {
    fn from(path: PathBuf) -> Self {
        Self(Arc::from(path.as_path()))
    }
}

impl fmt::Display for UnitPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}
