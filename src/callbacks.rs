//! The capability-record callback interface exposed to callers (§6),
//! mirrored on the hook set of the teacher's `RemoteCallbacks` builder
//! (`src/remote_callbacks.rs`) but using owned `Box<dyn FnMut>` closures
//! instead of `extern "C"` thunks, since there is no FFI boundary here.

use crate::cert::Cert;
#[cfg(feature = "cred")]
use crate::cred::Cred;
use crate::error::Error;
use crate::event::Event;
use crate::oid::Oid;
use crate::progress::{Progress, PushStatus};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CompletionType {
    Fetch,
    Push,
}

pub enum ResolveUrlAction {
    /// The hook declined to handle the URL; the driver resolves it itself.
    Passthrough,
    /// The hook replaced the URL.
    Handled(String),
}

/// Optional hooks a caller may install. Presence is meaningful: a missing
/// `set_fd_events` hook selects the synchronous `select`-based adapter
/// (§4.5 "Synchronous adaptation").
#[derive(Default)]
pub struct RemoteCallbacks<'a> {
    pub sideband_progress: Option<Box<dyn FnMut(&str) + 'a>>,
    pub completion: Option<Box<dyn FnMut(CompletionType) + 'a>>,
    #[cfg(feature = "cred")]
    pub credentials:
        Option<Box<dyn FnMut(&str, Option<&str>, crate::cred::CredentialType) -> Result<Cred, Error> + 'a>>,
    pub certificate_check: Option<Box<dyn FnMut(&Cert, bool, &str) -> Result<bool, Error> + 'a>>,
    pub transfer_progress: Option<Box<dyn FnMut(&Progress) -> bool + 'a>>,
    pub update_tips: Option<Box<dyn FnMut(&str, &Oid, &Oid) -> bool + 'a>>,
    pub pack_progress: Option<Box<dyn FnMut(i32, usize, usize) + 'a>>,
    pub push_transfer_progress: Option<Box<dyn FnMut(usize, usize, usize) + 'a>>,
    pub push_update_reference: Option<Box<dyn FnMut(&str, Option<&str>) -> Result<(), Error> + 'a>>,
    pub push_negotiation: Option<Box<dyn FnMut(&[PushStatus]) -> Result<(), Error> + 'a>>,
    pub resolve_url: Option<Box<dyn FnMut(&str, crate::refspec::Direction) -> ResolveUrlAction + 'a>>,
    pub set_fd_events:
        Option<Box<dyn FnMut(i32, Event, Option<std::time::Duration>) -> Event + 'a>>,
}

impl<'a> RemoteCallbacks<'a> {
    pub fn new() -> RemoteCallbacks<'a> {
        RemoteCallbacks::default()
    }

    /// `set_fd_events` being absent selects the built-in synchronous
    /// `select` loop (§4.5).
    pub fn is_synchronous(&self) -> bool {
        self.set_fd_events.is_none()
    }

    pub fn sideband_progress<F>(&mut self, f: F) -> &mut Self
    where
        F: FnMut(&str) + 'a,
    {
        self.sideband_progress = Some(Box::new(f));
        self
    }

    pub fn update_tips<F>(&mut self, f: F) -> &mut Self
    where
        F: FnMut(&str, &Oid, &Oid) -> bool + 'a,
    {
        self.update_tips = Some(Box::new(f));
        self
    }

    pub fn transfer_progress<F>(&mut self, f: F) -> &mut Self
    where
        F: FnMut(&Progress) -> bool + 'a,
    {
        self.transfer_progress = Some(Box::new(f));
        self
    }

    pub fn completion<F>(&mut self, f: F) -> &mut Self
    where
        F: FnMut(CompletionType) + 'a,
    {
        self.completion = Some(Box::new(f));
        self
    }

    /// Fires `update_tips`; a callback returning `false` aborts the
    /// operation (§4.6 step 6, §7 "abort").
    pub fn fire_update_tips(&mut self, refname: &str, old: &Oid, new: &Oid) -> Result<(), Error> {
        if let Some(hook) = self.update_tips.as_mut() {
            if !hook(refname, old, new) {
                return Err(Error::abort("update_tips"));
            }
        }
        Ok(())
    }
}
