//! Type-erased per-case data store.
//!
//! `Extensions` stores one value per concrete type, keyed by `TypeId`. Hooks
//! use it to publish state for the duration of a single case, for example
//! request interceptors picked up by clients created for that case.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt,
};

/// Stores case-scoped values keyed by concrete type.
///
/// # Examples
///
/// ```rust
/// use testbed::extensions::Extensions;
///
/// let mut extensions = Extensions::default();
/// extensions.insert(42u32);
/// *extensions.get_mut::<u32>().expect("value should exist") += 1;
/// assert_eq!(extensions.get::<u32>(), Some(&43));
/// ```
#[derive(Default)]
pub struct Extensions {
    values: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensions")
            .field("len", &self.values.len())
            .finish()
    }
}

impl Extensions {
    /// Insert a value of type `T`, returning the value it replaced.
    pub fn insert<T>(&mut self, value: T) -> Option<T>
    where
        T: Send + Sync + 'static,
    {
        self.values
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|previous| previous.downcast::<T>().ok())
            .map(|previous| *previous)
    }

    /// Borrow the value of type `T`, if present.
    #[must_use]
    pub fn get<T>(&self) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    /// Mutably borrow the value of type `T`, if present.
    pub fn get_mut<T>(&mut self) -> Option<&mut T>
    where
        T: Send + Sync + 'static,
    {
        self.values
            .get_mut(&TypeId::of::<T>())
            .and_then(|value| value.downcast_mut::<T>())
    }

    /// Mutably borrow the value of type `T`, inserting `T::default()` first
    /// when absent.
    pub fn get_or_default<T>(&mut self) -> &mut T
    where
        T: Default + Send + Sync + 'static,
    {
        let value = self
            .values
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(T::default()));
        match value.downcast_mut::<T>() {
            Some(value) => value,
            None => unreachable!("entry keyed by TypeId::of::<T>() holds a T"),
        }
    }

    /// Remove and return the value of type `T`.
    pub fn remove<T>(&mut self) -> Option<T>
    where
        T: Send + Sync + 'static,
    {
        self.values
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast::<T>().ok())
            .map(|value| *value)
    }

    /// Whether the store holds no value.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.values.is_empty() }
}

#[cfg(test)]
mod tests {
    use super::Extensions;

    #[derive(Debug, Default, PartialEq)]
    struct Journal {
        entries: Vec<&'static str>,
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn insert_and_get_multiple_types() {
        let mut extensions = Extensions::default();
        extensions.insert(12u32);
        extensions.insert("hello".to_string());

        assert_eq!(extensions.get::<u32>(), Some(&12));
        assert_eq!(extensions.get::<String>().map(String::as_str), Some("hello"));
    }

    #[test]
    fn insert_returns_replaced_value() {
        let mut extensions = Extensions::default();
        assert_eq!(extensions.insert(10u32), None);
        assert_eq!(extensions.insert(20u32), Some(10));
        assert_eq!(extensions.get::<u32>(), Some(&20));
    }

    #[test]
    fn get_or_default_inserts_once() {
        let mut extensions = Extensions::default();
        extensions.get_or_default::<Journal>().entries.push("attach");
        extensions.get_or_default::<Journal>().entries.push("body");

        assert_eq!(
            extensions.remove::<Journal>(),
            Some(Journal {
                entries: vec!["attach", "body"],
            })
        );
        assert!(extensions.is_empty());
    }

    #[test]
    fn missing_type_returns_none() {
        let mut extensions = Extensions::default();
        assert!(extensions.get::<u32>().is_none());
        assert!(extensions.get_mut::<u32>().is_none());
        assert!(extensions.remove::<u32>().is_none());
    }

    #[test]
    fn extensions_are_send_and_sync() { assert_send_sync::<Extensions>(); }
}
