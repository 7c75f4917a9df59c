//! The one object-database call this crate needs: checking whether an
//! object already exists locally, used by the AUTO tag policy to decide
//! whether a tag may be auto-followed without fetching its target.

use std::collections::HashSet;

use crate::oid::Oid;

pub trait Odb {
    fn exists(&self, oid: &Oid) -> bool;
}

/// An in-memory object database standing in for the real packfile-backed
/// store named as an external collaborator (§1).
#[derive(Debug, Default, Clone)]
pub struct MemoryOdb {
    objects: HashSet<Oid>,
}

impl MemoryOdb {
    pub fn new() -> MemoryOdb {
        MemoryOdb::default()
    }

    pub fn insert(&mut self, oid: Oid) {
        self.objects.insert(oid);
    }
}

impl Odb for MemoryOdb {
    fn exists(&self, oid: &Oid) -> bool {
        self.objects.contains(oid)
    }
}
