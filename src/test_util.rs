//! Test-only helpers, mirrored on the teacher's `src/test.rs`: a
//! `repo_init` that hands back a scratch directory plus a ready-to-use
//! repository, so integration-style tests don't repeat setup boilerplate.

use tempfile::TempDir;

use crate::repository::Repository;

macro_rules! t {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(e) => panic!("{} failed with {}", stringify!($e), e),
        }
    };
}
pub(crate) use t;

/// A scratch directory plus a fresh, empty repository over the in-memory
/// config/refdb/odb collaborators. The directory itself is unused by the
/// in-memory stores but is kept around so tests exercising path-shaped
/// config values (e.g. `insteadOf` targets) have somewhere real to point.
pub fn repo_init() -> (TempDir, Repository) {
    let td = t!(TempDir::new());
    let repo = Repository::new();
    (td, repo)
}

/// Seeds `repo` with a remote named `origin` pointing at `url`, as the
/// starting point most fetch/push/reconcile tests want.
pub fn repo_init_with_origin(url: &str) -> (TempDir, Repository) {
    let (td, mut repo) = repo_init();
    t!(repo.remote_create("origin", url));
    (td, repo)
}
