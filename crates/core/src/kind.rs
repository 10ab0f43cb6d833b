//! Type-safe cache kind keys.
//!
//! The cache fabric needs an opaque, equality-comparable key type where
//! two kinds collide **iff** they compare equal — including type
//! identity, so that `Kind::Ast` and a third-party `OtherKind::Ast` never
//! collide even if their underlying representations are equal as plain
//! values. We model this the way type-erased registries elsewhere in
//! the ecosystem do (`std::any::Any`-based downcasting), rather than
//! requiring every registered kind to implement some bespoke "kind ID"
//! trait.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A value usable as a cache kind or cache key.
///
/// Implemented for any `'static` value that is `Eq + Hash + Clone + Debug`.
/// Callers never implement this by hand; the blanket impl below covers
/// every built-in kind enum and every third-party kind a provider defines.
pub trait CacheKey: Any + fmt::Debug + Send + Sync {
    /// Upcast to `&dyn Any` for downcasting in [`CacheKey::dyn_eq`].
    fn as_any(&self) -> &dyn Any;

    /// Type-erased equality: `false` whenever `other` is not the same
    /// concrete type as `self`.
    fn dyn_eq(&self, other: &dyn CacheKey) -> bool;

    /// Type-erased hash, folding the concrete [`TypeId`] into the hash so
    /// that two equal values of different types still hash differently
    /// (they can still collide, `dyn_eq` is what disambiguates).
    fn dyn_hash(&self, state: &mut dyn Hasher);

    /// Type-erased clone.
    fn dyn_clone(&self) -> Box<dyn CacheKey>;
}

impl<T> CacheKey for T
where
    T: Any + Eq + Hash + Clone + fmt::Debug + Send + Sync,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn CacheKey) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| other == self)
    }

    fn dyn_hash(&self, mut state: &mut dyn Hasher) {
        TypeId::of::<T>().hash(&mut state);
        self.hash(&mut state);
    }

    fn dyn_clone(&self) -> Box<dyn CacheKey> {
        Box::new(self.clone())
    }
}

/// A boxed, type-erased cache kind with value-and-type equality semantics.
///
/// Two `KindKey`s compare equal iff they wrap the same concrete type *and*
/// equal values of that type.
pub struct KindKey {
    inner: Box<dyn CacheKey>,
    type_name: &'static str,
}

impl KindKey {
    /// Wrap a concrete kind value as a type-erased key.
    pub fn new<T: CacheKey>(value: T) -> Self {
        KindKey {
            inner: Box::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// A string uniquely identifying this kind's concrete type, stable
    /// for the lifetime of the process. Used as the type component of the
    /// single-flight coordination key described in the cache fabric's
    /// design (`"<type-name>-<value>"`, optionally suffixed with a path
    /// for file-scoped kinds).
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The single-flight coordination key for project-scope lookups:
    /// `"<type-name>-<value>"`.
    pub fn flight_key(&self) -> String {
        format!("{}-{:?}", self.type_name, self.inner)
    }

    /// The single-flight coordination key for file-scope lookups:
    /// [`KindKey::flight_key`] with `"-<path>"` appended.
    pub fn flight_key_for_path(&self, path: &str) -> String {
        format!("{}-{}", self.flight_key(), path)
    }
}

impl Clone for KindKey {
    fn clone(&self) -> Self {
        KindKey {
            inner: self.inner.dyn_clone(),
            type_name: self.type_name,
        }
    }
}

impl PartialEq for KindKey {
    fn eq(&self, other: &Self) -> bool {
        self.inner.dyn_eq(other.inner.as_ref())
    }
}

impl Eq for KindKey {}

impl Hash for KindKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.dyn_hash(state);
    }
}

impl fmt::Debug for KindKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("KindKey").field(&self.inner).finish()
    }
}
