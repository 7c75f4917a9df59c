//! The transport interface consumed by the operation driver (§6), plus an
//! in-memory test double (design note §9: "local, in-memory (test
//! double)") and the scheme → factory registry design note §9 calls for
//! ("URL-scheme → transport factory registry... process-wide, initialized
//! once").

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use crate::error::Error;
use crate::oid::Oid;
use crate::progress::{Progress, PushStatus};
use crate::proxy::ProxyOptions;
use crate::refspec::Direction;

/// The result of polling a suspendable transport operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Poll<T> {
    Ready(T),
    WouldBlock,
}

/// A ref advertised by the peer on connect, per §3's "Advertised head".
/// Ownership belongs to the transport; the remote only indexes these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisedHead {
    pub name: String,
    pub oid: Oid,
    pub symref_target: Option<String>,
    /// A locally-known oid for this head, when it differs from `oid`
    /// (§3 supplement, grounded on `RemoteHead::is_local`/`loid`).
    pub local_oid: Option<Oid>,
}

impl AdvertisedHead {
    pub fn is_local(&self) -> bool {
        self.local_oid.is_some()
    }
}

/// Capabilities a concrete transport (smart-http, dumb-http, ssh, local,
/// in-memory) must provide. Any method may return `WouldBlock`; the
/// operation driver (`stage.rs`) is responsible for suspending and
/// resuming across that boundary (§4.5).
pub trait Transport {
    fn connect(
        &mut self,
        url: &str,
        proxy: &ProxyOptions,
        direction: Direction,
    ) -> Result<Poll<()>, Error>;
    fn ls(&self) -> Vec<AdvertisedHead>;
    fn negotiate(&mut self) -> Result<Poll<()>, Error>;
    fn download_pack(&mut self) -> Result<Poll<()>, Error>;
    fn push_finish(&mut self) -> Result<Poll<Vec<PushStatus>>, Error>;
    /// Suspendable like any other stage (§4.5 "disconnect"): a transport
    /// with buffered writes to flush may report `WouldBlock` once before
    /// `Poll::Ready(())`.
    fn close(&mut self) -> Result<Poll<()>, Error>;
    fn cancel(&mut self);
    fn is_connected(&self) -> bool;

    /// Transfer statistics as of the last `download_pack` (§9 supplement,
    /// `git_remote_stats`). Transports with nothing to report return the
    /// default, all-zero `Progress`.
    fn stats(&self) -> Progress {
        Progress::default()
    }
}

/// A scheme-keyed transport factory (§9 "Global state": "URL-scheme →
/// transport factory registry... process-wide, initialized once at
/// library init"). A caller-supplied factory passed alongside a connect
/// call always overrides the registry, per §4.5 "connect" ("caller-
/// supplied factory, else scheme-registered factory").
pub type TransportFactory = dyn Fn() -> Box<dyn Transport + Send> + Send + Sync;

#[derive(Default)]
pub struct TransportRegistry {
    factories: HashMap<String, Box<TransportFactory>>,
}

impl TransportRegistry {
    pub fn new() -> TransportRegistry {
        TransportRegistry::default()
    }

    /// Registers `factory` for URLs whose scheme (the portion before the
    /// first `://`) equals `scheme`. A later registration for the same
    /// scheme replaces the earlier one.
    pub fn register<F>(&mut self, scheme: &str, factory: F)
    where
        F: Fn() -> Box<dyn Transport + Send> + Send + Sync + 'static,
    {
        self.factories.insert(scheme.to_string(), Box::new(factory));
    }

    pub fn is_registered(&self, scheme: &str) -> bool {
        self.factories.contains_key(scheme)
    }

    /// Instantiates the transport registered for `url`'s scheme, if any.
    pub fn create(&self, url: &str) -> Option<Box<dyn Transport + Send>> {
        let scheme = scheme_of(url)?;
        self.factories.get(scheme).map(|factory| factory())
    }
}

fn scheme_of(url: &str) -> Option<&str> {
    url.split_once("://").map(|(scheme, _)| scheme)
}

fn global_registry() -> &'static Mutex<TransportRegistry> {
    static REGISTRY: OnceLock<Mutex<TransportRegistry>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(TransportRegistry::new()))
}

/// Registers `factory` process-wide for `scheme`, mirroring the teacher's
/// `transport::register` (minus its FFI/`unsafe` surface, since there is
/// no C library to hand the callback to here).
pub fn register_transport<F>(scheme: &str, factory: F)
where
    F: Fn() -> Box<dyn Transport + Send> + Send + Sync + 'static,
{
    global_registry()
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
        .register(scheme, factory);
}

/// Resolves a transport for `url`: `override_factory` wins unconditionally
/// if present (§4.5 "connect"); otherwise the process-wide registry is
/// consulted by scheme; absent both, `invalid`.
pub fn resolve_transport(
    url: &str,
    override_factory: Option<&TransportFactory>,
) -> Result<Box<dyn Transport + Send>, Error> {
    if let Some(factory) = override_factory {
        return Ok(factory());
    }
    global_registry()
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
        .create(url)
        .ok_or_else(|| {
            Error::invalid(format!(
                "no transport registered for `{}`",
                scheme_of(url).unwrap_or(url)
            ))
        })
}

/// An in-memory transport used by tests to exercise the stage driver
/// without real sockets. Blocks once on `connect` so the suspension
/// protocol is exercised, then proceeds.
pub struct LoopbackTransport {
    heads: Vec<AdvertisedHead>,
    connected: bool,
    connect_attempts: u32,
    cancelled: bool,
    stats: Progress,
    push_statuses: Vec<PushStatus>,
}

impl LoopbackTransport {
    pub fn new(heads: Vec<AdvertisedHead>) -> LoopbackTransport {
        LoopbackTransport {
            heads,
            connected: false,
            connect_attempts: 0,
            cancelled: false,
            stats: Progress::default(),
            push_statuses: Vec::new(),
        }
    }

    /// Configures the statuses `push_finish` reports, for tests that
    /// exercise push-side tip reconciliation.
    pub fn with_push_statuses(mut self, statuses: Vec<PushStatus>) -> LoopbackTransport {
        self.push_statuses = statuses;
        self
    }
}

impl Transport for LoopbackTransport {
    fn connect(
        &mut self,
        _url: &str,
        _proxy: &ProxyOptions,
        _direction: Direction,
    ) -> Result<Poll<()>, Error> {
        if self.cancelled {
            return Err(Error::transport("connect cancelled"));
        }
        self.connect_attempts += 1;
        if self.connect_attempts == 1 {
            return Ok(Poll::WouldBlock);
        }
        self.connected = true;
        Ok(Poll::Ready(()))
    }

    fn ls(&self) -> Vec<AdvertisedHead> {
        self.heads.clone()
    }

    fn negotiate(&mut self) -> Result<Poll<()>, Error> {
        if self.cancelled {
            return Err(Error::transport("negotiate cancelled"));
        }
        Ok(Poll::Ready(()))
    }

    fn download_pack(&mut self) -> Result<Poll<()>, Error> {
        if self.cancelled {
            return Err(Error::transport("download cancelled"));
        }
        self.stats = Progress {
            total_objects: self.heads.len(),
            indexed_objects: self.heads.len(),
            received_objects: self.heads.len(),
            local_objects: 0,
            total_deltas: 0,
            indexed_deltas: 0,
            received_bytes: self.heads.len() * 32,
        };
        Ok(Poll::Ready(()))
    }

    fn push_finish(&mut self) -> Result<Poll<Vec<PushStatus>>, Error> {
        if self.cancelled {
            return Err(Error::transport("push cancelled"));
        }
        Ok(Poll::Ready(self.push_statuses.clone()))
    }

    fn close(&mut self) -> Result<Poll<()>, Error> {
        self.connected = false;
        Ok(Poll::Ready(()))
    }

    fn cancel(&mut self) {
        self.cancelled = true;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn stats(&self) -> Progress {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_factory_wins_over_registry() {
        register_transport("test-scheme", || {
            Box::new(LoopbackTransport::new(Vec::new())) as Box<dyn Transport + Send>
        });
        let override_factory: &TransportFactory =
            &|| Box::new(LoopbackTransport::new(vec![AdvertisedHead {
                name: "refs/heads/main".to_string(),
                oid: Oid::from_hex("aa").unwrap(),
                symref_target: None,
                local_oid: None,
            }])) as Box<dyn Transport + Send>;
        let transport = resolve_transport("test-scheme://host/repo", Some(override_factory)).unwrap();
        assert_eq!(transport.ls().len(), 1);
    }

    #[test]
    fn registry_resolves_by_scheme() {
        register_transport("loopback", || {
            Box::new(LoopbackTransport::new(Vec::new())) as Box<dyn Transport + Send>
        });
        let transport = resolve_transport("loopback://host/repo", None).unwrap();
        assert!(!transport.is_connected());
    }

    #[test]
    fn unregistered_scheme_is_invalid() {
        let err = resolve_transport("nonexistent-scheme-xyz://host/repo", None).unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::Invalid);
    }
}
