//! Remote orchestration: refspec resolution, `insteadOf` URL rewriting,
//! config binding, the resumable connect/fetch/push operation driver, and
//! local ref reconciliation against a pluggable transport.

mod callbacks;
mod cert;
mod config;
#[cfg(feature = "cred")]
mod cred;
mod error;
mod event;
mod fetch_head;
mod insteadof;
mod odb;
mod oid;
mod progress;
mod proxy;
mod reconcile;
mod refdb;
mod refspec;
mod remote;
mod repository;
mod stage;
mod transport;

/// Exposed unconditionally (not `#[cfg(test)]`) so integration tests under
/// `tests/` can build fixtures the same way the crate's own unit tests do.
#[doc(hidden)]
pub mod test_util;

pub use callbacks::{CompletionType, RemoteCallbacks, ResolveUrlAction};
pub use cert::{Cert, CertHostkey, CertX509, SshHostKeyType};
pub use config::{Config, MemoryConfig};
#[cfg(feature = "cred")]
pub use cred::{host_of, Cred, CredentialType};
pub use error::{Error, ErrorClass, ErrorCode, Result};
pub use event::{Event, UpdateFlags};
pub use fetch_head::{build_fetch_head_entries, format_fetch_head, FetchHeadEntry};
pub use insteadof::rewrite_url;
pub use odb::{MemoryOdb, Odb};
pub use oid::Oid;
pub use progress::{Progress, PushStatus};
pub use proxy::ProxyOptions;
pub use reconcile::{
    opportunistic_updates, prune, prune_candidates, update_tips_for_push, update_tips_for_spec,
    HeadCursor, UpdateTipsOptions,
};
pub use refdb::{MemoryRefDb, RefDb};
pub use refspec::{is_valid_ref_name, is_valid_remote_name, Direction, Refspec};
pub use remote::{default_branch, default_fetch_spec, CreateOptions, Remote, RenameOutcome, TagsPolicy};
pub use repository::Repository;
pub use stage::{
    drive, perform, run_synchronously, step, Outcome, PendingStack, Stage, MAX_PENDING_DEPTH,
};
pub use transport::{
    register_transport, resolve_transport, AdvertisedHead, LoopbackTransport, Poll, Transport,
    TransportFactory, TransportRegistry,
};
