use slab::Slab;
use std::{
    marker::PhantomData,
    ops::{Index, IndexMut},
};

#[macro_export]
macro_rules! define_id_type {
    ($name:ident) => {
        #[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
        pub struct $name(usize);

        impl From<usize> for $name {
            fn from(x: usize) -> Self {
                Self(x)
            }
        }

        impl From<$name> for usize {
            fn from(x: $name) -> Self {
                x.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self(usize::MAX)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl $name {
            pub fn unknown() -> Self {
                Self(usize::MAX)
            }

            pub fn is_unknown(&self) -> bool {
                self.0 == usize::MAX
            }

            pub fn inner(&self) -> usize {
                self.0
            }
        }
    };
}

/// An append-only arena keyed by a typed id. Entries are never removed, so an
/// id stays valid for the lifetime of the cache.
#[derive(Debug, Clone)]
pub struct IdCache<K, V> {
    inner: Slab<V>,
    marker: PhantomData<K>,
}

impl<K, V> Default for IdCache<K, V> {
    fn default() -> Self {
        Self {
            inner: Slab::new(),
            marker: PhantomData,
        }
    }
}

impl<K: Into<usize> + From<usize> + Copy, V> IdCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, value: V) -> K {
        K::from(self.inner.insert(value))
    }

    /// Inserts a value that needs to know its own id.
    pub fn insert_with(&mut self, f: impl FnOnce(K) -> V) -> K {
        let entry = self.inner.vacant_entry();
        let id = K::from(entry.key());
        entry.insert(f(id));
        id
    }

    pub fn get(&self, id: K) -> Option<&V> {
        self.inner.get(id.into())
    }

    pub fn get_mut(&mut self, id: K) -> Option<&mut V> {
        self.inner.get_mut(id.into())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> {
        self.inner.iter().map(|(id, v)| (K::from(id), v))
    }
}

impl<K: Into<usize> + From<usize> + Copy + std::fmt::Debug, V> Index<K> for IdCache<K, V> {
    type Output = V;

    fn index(&self, id: K) -> &Self::Output {
        self.inner
            .get(id.into())
            .unwrap_or_else(|| panic!("id not found: {:?}", id))
    }
}

impl<K: Into<usize> + From<usize> + Copy + std::fmt::Debug, V> IndexMut<K> for IdCache<K, V> {
    fn index_mut(&mut self, id: K) -> &mut Self::Output {
        self.inner
            .get_mut(id.into())
            .unwrap_or_else(|| panic!("id not found: {:?}", id))
    }
}
