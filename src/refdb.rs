//! The subset of a reference store's surface the reconciliation loop
//! actually calls into (§4.10): resolve, create (optionally compare-and-swap),
//! delete, rename, and symbolic-ref introspection.

use std::collections::HashMap;

use crate::error::{Error, ErrorClass, ErrorCode};
use crate::oid::Oid;

#[derive(Debug, Clone, PartialEq, Eq)]
enum RefValue {
    Direct(Oid),
    Symbolic(String),
}

pub trait RefDb {
    /// Resolves `name` to the object id it currently points at, following
    /// at most one level of symbolic indirection. `None` if absent.
    fn resolve(&self, name: &str) -> Option<Oid>;

    /// `Some(target)` if `name` is a symbolic ref, pointing at `target`.
    fn symbolic_target(&self, name: &str) -> Option<String>;

    /// Creates or overwrites `name` to point at `oid`. Fails with
    /// `Exists` if `force` is false and `name` already exists with a
    /// different id.
    fn create(&mut self, name: &str, oid: Oid, force: bool, log_message: &str) -> Result<(), Error>;

    /// Compare-and-swap create: succeeds only if the current value of
    /// `name` equals `expected_old` (`None` meaning "must not exist").
    fn create_matching(
        &mut self,
        name: &str,
        oid: Oid,
        expected_old: Option<&Oid>,
        log_message: &str,
    ) -> Result<(), Error>;

    fn delete(&mut self, name: &str) -> Result<(), Error>;

    fn rename(&mut self, old_name: &str, new_name: &str) -> Result<(), Error>;

    /// Repoints an existing symbolic ref at a new target, used when
    /// renaming a remote's tracking refs retargets a ref like
    /// `origin/HEAD` (§4.4 rename, step d).
    fn retarget_symbolic(&mut self, name: &str, new_target: &str) -> Result<(), Error>;

    /// All ref names currently stored with the given prefix.
    fn iter_names(&self, prefix: &str) -> Vec<String>;

    /// Whether `name` is a symbolic ref (e.g. `origin/HEAD`). Prune never
    /// deletes these (§4.6 "Prune").
    fn is_symbolic(&self, name: &str) -> bool;
}

/// An in-memory reference store standing in for the real on-disk ref
/// database named as an external collaborator (§1).
#[derive(Debug, Default, Clone)]
pub struct MemoryRefDb {
    refs: HashMap<String, RefValue>,
}

impl MemoryRefDb {
    pub fn new() -> MemoryRefDb {
        MemoryRefDb::default()
    }

    pub fn set_symbolic(&mut self, name: &str, target: &str) {
        self.refs
            .insert(name.to_string(), RefValue::Symbolic(target.to_string()));
    }
}

impl RefDb for MemoryRefDb {
    fn resolve(&self, name: &str) -> Option<Oid> {
        match self.refs.get(name)? {
            RefValue::Direct(oid) => Some(oid.clone()),
            RefValue::Symbolic(target) => self.resolve(target),
        }
    }

    fn symbolic_target(&self, name: &str) -> Option<String> {
        match self.refs.get(name) {
            Some(RefValue::Symbolic(target)) => Some(target.clone()),
            _ => None,
        }
    }

    fn create(&mut self, name: &str, oid: Oid, force: bool, _log_message: &str) -> Result<(), Error> {
        if !force {
            if let Some(RefValue::Direct(existing)) = self.refs.get(name) {
                if *existing != oid {
                    return Err(Error::exists(format!("reference `{}` already exists", name)));
                }
            }
        }
        self.refs.insert(name.to_string(), RefValue::Direct(oid));
        Ok(())
    }

    fn create_matching(
        &mut self,
        name: &str,
        oid: Oid,
        expected_old: Option<&Oid>,
        _log_message: &str,
    ) -> Result<(), Error> {
        let current = self.resolve(name);
        let matches = match (&current, expected_old) {
            (None, None) => true,
            (Some(current), Some(expected)) => current == expected,
            _ => false,
        };
        if !matches {
            return Err(Error::new(
                ErrorCode::Exists,
                ErrorClass::Reference,
                format!("reference `{}` changed concurrently", name),
            ));
        }
        self.refs.insert(name.to_string(), RefValue::Direct(oid));
        Ok(())
    }

    fn delete(&mut self, name: &str) -> Result<(), Error> {
        self.refs
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("reference `{}` does not exist", name)))
    }

    fn rename(&mut self, old_name: &str, new_name: &str) -> Result<(), Error> {
        let value = self
            .refs
            .remove(old_name)
            .ok_or_else(|| Error::not_found(format!("reference `{}` does not exist", old_name)))?;
        self.refs.insert(new_name.to_string(), value);
        Ok(())
    }

    fn iter_names(&self, prefix: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .refs
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect();
        names.sort();
        names
    }

    fn is_symbolic(&self, name: &str) -> bool {
        matches!(self.refs.get(name), Some(RefValue::Symbolic(_)))
    }

    fn retarget_symbolic(&mut self, name: &str, new_target: &str) -> Result<(), Error> {
        match self.refs.get(name) {
            Some(RefValue::Symbolic(_)) => {
                self.refs
                    .insert(name.to_string(), RefValue::Symbolic(new_target.to_string()));
                Ok(())
            }
            Some(RefValue::Direct(_)) => Err(Error::invalid(format!(
                "`{}` is not a symbolic reference",
                name
            ))),
            None => Err(Error::not_found(format!("reference `{}` does not exist", name))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_resolve() {
        let mut db = MemoryRefDb::new();
        let oid = Oid::from_hex("aa").unwrap();
        db.create("refs/heads/main", oid.clone(), true, "fetch").unwrap();
        assert_eq!(db.resolve("refs/heads/main"), Some(oid));
    }

    #[test]
    fn create_matching_rejects_stale_expectation() {
        let mut db = MemoryRefDb::new();
        let a = Oid::from_hex("aa").unwrap();
        let b = Oid::from_hex("bb").unwrap();
        db.create("refs/heads/main", a.clone(), true, "fetch").unwrap();
        assert!(db
            .create_matching("refs/heads/main", b, None, "fetch")
            .is_err());
    }

    #[test]
    fn symbolic_resolves_through_target() {
        let mut db = MemoryRefDb::new();
        let oid = Oid::from_hex("aa").unwrap();
        db.create("refs/heads/master", oid.clone(), true, "fetch").unwrap();
        db.set_symbolic("HEAD", "refs/heads/master");
        assert_eq!(db.resolve("HEAD"), Some(oid));
        assert!(db.is_symbolic("HEAD"));
    }
}
