//! The repository aggregate (§1 "local repository"): wires a `Config`,
//! `RefDb`, and `Odb` together and hosts the admin-op entry points the
//! way the teacher's `src/repo.rs` hosts `remote`/`find_remote`/
//! `remote_rename`/`remote_delete`.

use crate::config::{Config, MemoryConfig};
use crate::error::Error;
use crate::odb::{MemoryOdb, Odb};
use crate::refdb::{MemoryRefDb, RefDb};
use crate::remote::{CreateOptions, Remote, RenameOutcome};

/// A repository backed by in-memory collaborators. Production use swaps
/// `MemoryConfig`/`MemoryRefDb`/`MemoryOdb` for the real on-disk stores;
/// the field types are concrete rather than trait objects because an
/// owning `Repository` needs a single owned instance of each, unlike the
/// borrowed `&mut dyn Config`/`&mut dyn RefDb` the reconciliation layer
/// takes per call.
pub struct Repository {
    config: MemoryConfig,
    refdb: MemoryRefDb,
    odb: MemoryOdb,
}

impl Repository {
    pub fn new() -> Repository {
        Repository {
            config: MemoryConfig::new(),
            refdb: MemoryRefDb::new(),
            odb: MemoryOdb::new(),
        }
    }

    pub fn config(&self) -> &dyn Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut MemoryConfig {
        &mut self.config
    }

    pub fn refdb(&self) -> &MemoryRefDb {
        &self.refdb
    }

    pub fn refdb_mut(&mut self) -> &mut MemoryRefDb {
        &mut self.refdb
    }

    pub fn odb(&self) -> &MemoryOdb {
        &self.odb
    }

    pub fn odb_mut(&mut self) -> &mut MemoryOdb {
        &mut self.odb
    }

    pub fn remote_create(&mut self, name: &str, url: &str) -> Result<Remote, Error> {
        Remote::create(Some(name), url, Some(&mut self.config))
    }

    pub fn remote_create_with_opts(
        &mut self,
        name: &str,
        url: &str,
        opts: &CreateOptions,
    ) -> Result<Remote, Error> {
        Remote::create_with_opts(Some(name), url, Some(&mut self.config), opts)
    }

    pub fn remote_anonymous(&self, url: &str) -> Result<Remote, Error> {
        Remote::create(None, url, None)
    }

    pub fn find_remote(&self, name: &str) -> Result<Remote, Error> {
        Remote::lookup(name, &self.config)
    }

    pub fn remote_rename(&mut self, old_name: &str, new_name: &str) -> Result<RenameOutcome, Error> {
        Remote::rename(old_name, new_name, &mut self.config, &mut self.refdb)
    }

    pub fn remote_delete(&mut self, name: &str) -> Result<(), Error> {
        Remote::delete(name, &mut self.config, &mut self.refdb)
    }

    pub fn remote_set_url(&mut self, name: &str, url: &str) {
        Remote::set_url(name, url, &mut self.config)
    }

    pub fn remote_set_pushurl(&mut self, name: &str, url: Option<&str>) {
        Remote::set_pushurl(name, url, &mut self.config)
    }

    pub fn remote_add_fetch(&mut self, name: &str, spec: &str) -> Result<(), Error> {
        Remote::add_fetch(name, spec, &mut self.config)
    }

    pub fn remote_add_push(&mut self, name: &str, spec: &str) -> Result<(), Error> {
        Remote::add_push(name, spec, &mut self.config)
    }

    /// Names of every configured remote, read off the `remote.<name>.url`
    /// and `remote.<name>.pushurl` keys.
    pub fn remote_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for (key, _) in self.config.entries_matching("remote.") {
            let rest = &key["remote.".len()..];
            if let Some(name) = rest.strip_suffix(".url").or_else(|| rest.strip_suffix(".pushurl")) {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        names
    }
}

impl Default for Repository {
    fn default() -> Repository {
        Repository::new()
    }
}
