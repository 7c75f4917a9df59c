//! The remote handle (C4) and admin operations (C7): create, lookup, dup,
//! rename, delete, plus the connect/fetch/push operation driver built on
//! top of `stage.rs`, `reconcile.rs`, and `fetch_head.rs`.

use crate::callbacks::{RemoteCallbacks, ResolveUrlAction};
use crate::config::Config;
use crate::error::Error;
use crate::fetch_head;
use crate::insteadof;
use crate::odb::Odb;
use crate::progress::PushStatus;
use crate::proxy::ProxyOptions;
use crate::reconcile::{self, UpdateTipsOptions};
use crate::refdb::RefDb;
use crate::refspec::{is_valid_remote_name, Direction, Refspec};
use crate::stage::{self, Outcome, PendingStack, Stage};
use crate::transport::{Poll, Transport};

/// Distinguishes a resumed call to `fetch`/`push` (same kind, allowed while
/// busy) from a genuinely concurrent one (rejected, §4.5 "Busy flag").
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum OperationKind {
    Fetch,
    Push,
}

/// Auto-tag policy (§3 data model). `Unspecified` only appears as a
/// caller-supplied per-fetch override meaning "use the remote's stored
/// policy" (see `Remote::fetch`'s `tags_override` resolution, grounded on
/// `git_remote_update_tips`'s tagopt-resolution step).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TagsPolicy {
    None,
    Auto,
    All,
    Unspecified,
}

/// Options accepted by `create_with_opts` (§4.4, §9 Open Question).
#[derive(Debug, Default, Clone)]
pub struct CreateOptions<'a> {
    pub fetchspec: Option<&'a str>,
    pub skip_default_fetchspec: bool,
}

/// The "problem refspecs" a rename reports back (§4.4 rename, step e).
#[derive(Debug, Default, Clone)]
pub struct RenameOutcome {
    pub problem_refspecs: Vec<String>,
}

/// Aggregate of name, URLs, refspec vectors, and per-operation state (§3
/// "Remote"). Transport instances and advertised heads are not stored
/// here — they are supplied per call, since one remote is driven by one
/// caller at a time (busy-flag discipline, §4.5). Not `Clone`: use `dup`
/// to get an independent copy that starts with a fresh pending stack.
#[derive(Debug)]
pub struct Remote {
    name: Option<String>,
    url: String,
    pushurl: Option<String>,
    configured: Vec<Refspec>,
    active: Vec<Refspec>,
    passive: Vec<Refspec>,
    tags_policy: TagsPolicy,
    prune: Option<bool>,
    passed_refspecs: bool,
    last_fetch_head: String,
    last_stats: crate::progress::Progress,
    proxy: ProxyOptions,
    in_progress: Option<OperationKind>,
    pending: PendingStack,
}

impl Remote {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn pushurl(&self) -> Option<&str> {
        self.pushurl.as_deref()
    }

    /// The raw, immutable, as-configured refspec set (§3 "configured").
    pub fn refspecs(&self) -> &[Refspec] {
        &self.configured
    }

    /// The DWIM-expanded set chosen for the last operation (§3 "active").
    pub fn active_refspecs(&self) -> &[Refspec] {
        &self.active
    }

    pub fn tags_policy(&self) -> TagsPolicy {
        self.tags_policy
    }

    pub fn fetch_head(&self) -> &str {
        &self.last_fetch_head
    }

    /// Transfer statistics from the most recent `download_pack` (§9
    /// supplement, `git_remote_stats`).
    pub fn stats(&self) -> crate::progress::Progress {
        self.last_stats
    }

    /// Proxy configuration applied to connect attempts (§3 "proxy
    /// options", §4.3 `remote.<name>.proxy`).
    pub fn proxy(&self) -> &ProxyOptions {
        &self.proxy
    }

    /// Persists `opts` under `remote.<name>.proxy`: `"auto"` for
    /// auto-detection, the explicit URL otherwise, or removes the key
    /// when `opts` carries neither.
    pub fn set_proxy(name: &str, opts: &ProxyOptions, config: &mut dyn Config) {
        let key = format!("remote.{}.proxy", name);
        if opts.is_auto() {
            config.set_str(&key, "auto");
        } else if let Some(url) = opts.resolved_url() {
            config.set_str(&key, url);
        } else {
            config.remove(&key);
        }
    }

    /// A remote handle is busy iff an operation has suspended and not yet
    /// resumed (§4.5 "Busy flag").
    pub fn is_busy(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Deep copy of owned strings and refspec vectors; does not copy
    /// transport state, pending callbacks, or advertised heads, since
    /// none of those are stored on `Remote` in the first place (§4.4
    /// "dup").
    pub fn dup(&self) -> Remote {
        Remote {
            name: self.name.clone(),
            url: self.url.clone(),
            pushurl: self.pushurl.clone(),
            configured: self.configured.clone(),
            active: self.configured.clone(),
            passive: Vec::new(),
            tags_policy: self.tags_policy,
            prune: self.prune,
            passed_refspecs: false,
            last_fetch_head: String::new(),
            last_stats: crate::progress::Progress::default(),
            proxy: self.proxy.clone(),
            in_progress: None,
            pending: PendingStack::new(),
        }
    }

    /// Creates a remote with the default fetch refspec (when named) and,
    /// if `config` is given alongside a name, persists it.
    pub fn create(
        name: Option<&str>,
        url: &str,
        config: Option<&mut dyn Config>,
    ) -> Result<Remote, Error> {
        Remote::create_with_opts(name, url, config, &CreateOptions::default())
    }

    pub fn create_with_opts(
        name: Option<&str>,
        url: &str,
        config: Option<&mut dyn Config>,
        opts: &CreateOptions,
    ) -> Result<Remote, Error> {
        if let Some(name) = name {
            if !is_valid_remote_name(name) {
                return Err(Error::invalid_spec(format!("invalid remote name `{}`", name)));
            }
        }

        let canonical_url = canonicalize_url(url);
        let mut configured = Vec::new();

        // Open Question (DESIGN.md): an explicit fetchspec always wins
        // over both the default spec and the skip-default flag.
        if let Some(fetchspec) = opts.fetchspec {
            configured.push(Refspec::parse(fetchspec, Direction::Fetch)?);
        } else if !opts.skip_default_fetchspec {
            if let Some(name) = name {
                configured.push(Refspec::parse(&default_fetch_spec(name), Direction::Fetch)?);
            }
        }

        if let Some(name) = name {
            if let Some(config) = config {
                let url_key = format!("remote.{}.url", name);
                let pushurl_key = format!("remote.{}.pushurl", name);
                if config.get_str(&url_key).is_some() || config.get_str(&pushurl_key).is_some() {
                    return Err(Error::exists(format!("remote `{}` already exists", name)));
                }
                config.set_str(&url_key, &canonical_url);
                let fetch_key = format!("remote.{}.fetch", name);
                for spec in &configured {
                    config.add_multivar(&fetch_key, spec.as_str());
                }
            }
        }

        let tags_policy = if name.is_none() {
            TagsPolicy::None
        } else {
            TagsPolicy::Unspecified
        };

        let active = configured.clone();
        Ok(Remote {
            name: name.map(str::to_string),
            url: canonical_url,
            pushurl: None,
            configured,
            active,
            passive: Vec::new(),
            tags_policy,
            prune: None,
            passed_refspecs: false,
            last_fetch_head: String::new(),
            last_stats: crate::progress::Progress::default(),
            proxy: ProxyOptions::new(),
            in_progress: None,
            pending: PendingStack::new(),
        })
    }

    /// Hydrates a remote from config. Fails with `not-found` unless
    /// either `url` or `pushurl` is set (§4.4 "lookup").
    pub fn lookup(name: &str, config: &dyn Config) -> Result<Remote, Error> {
        let url = config.get_str(&format!("remote.{}.url", name));
        let pushurl = config.get_str(&format!("remote.{}.pushurl", name));
        if url.is_none() && pushurl.is_none() {
            return Err(Error::not_found(format!("remote `{}` not found", name)));
        }

        let mut configured = Vec::new();
        for spec in config.multivar(&format!("remote.{}.fetch", name)) {
            configured.push(Refspec::parse(&spec, Direction::Fetch)?);
        }
        for spec in config.multivar(&format!("remote.{}.push", name)) {
            configured.push(Refspec::parse(&spec, Direction::Push)?);
        }

        let tags_policy = match config.get_str(&format!("remote.{}.tagopt", name)).as_deref() {
            Some("--tags") => TagsPolicy::All,
            Some("--no-tags") => TagsPolicy::None,
            _ => TagsPolicy::Auto,
        };

        let prune = config
            .get_bool(&format!("remote.{}.prune", name))
            .or_else(|| config.get_bool("fetch.prune"));

        let proxy = match config.get_str(&format!("remote.{}.proxy", name)).as_deref() {
            Some("auto") => {
                let mut opts = ProxyOptions::new();
                opts.auto();
                opts
            }
            Some(proxy_url) => {
                let mut opts = ProxyOptions::new();
                opts.url(proxy_url);
                opts
            }
            None => ProxyOptions::new(),
        };

        let active = configured.clone();
        Ok(Remote {
            name: Some(name.to_string()),
            url: url.unwrap_or_default(),
            pushurl,
            configured,
            active,
            passive: Vec::new(),
            tags_policy,
            prune,
            passed_refspecs: false,
            last_fetch_head: String::new(),
            last_stats: crate::progress::Progress::default(),
            proxy,
            in_progress: None,
            pending: PendingStack::new(),
        })
    }

    /// Renames a remote: moves its config section, rewrites
    /// `branch.*.remote` entries, renames tracking refs (retargeting
    /// symbolic refs that pointed into the old namespace), and rewrites
    /// only the fetch refspec matching the old default; anything else is
    /// reported back as a "problem" refspec (§4.4 "rename").
    pub fn rename(
        old_name: &str,
        new_name: &str,
        config: &mut dyn Config,
        refdb: &mut dyn RefDb,
    ) -> Result<RenameOutcome, Error> {
        if !is_valid_remote_name(new_name) {
            return Err(Error::invalid_spec(format!("invalid remote name `{}`", new_name)));
        }
        let new_url_key = format!("remote.{}.url", new_name);
        let new_pushurl_key = format!("remote.{}.pushurl", new_name);
        if config.get_str(&new_url_key).is_some() || config.get_str(&new_pushurl_key).is_some() {
            return Err(Error::exists(format!("remote `{}` already exists", new_name)));
        }

        config.rename_section(
            &format!("remote.{}", old_name),
            Some(&format!("remote.{}", new_name)),
        );

        let mut branch_keys = Vec::new();
        config.foreach_match("branch.*.remote", &mut |key, value| {
            if value == old_name {
                branch_keys.push(key.to_string());
            }
        });
        for key in branch_keys {
            config.set_str(&key, new_name);
        }

        let old_prefix = format!("refs/remotes/{}/", old_name);
        let new_prefix = format!("refs/remotes/{}/", new_name);
        for old_ref in refdb.iter_names(&old_prefix) {
            let suffix = old_ref[old_prefix.len()..].to_string();
            let new_ref = format!("{}{}", new_prefix, suffix);
            let symbolic_target = refdb.symbolic_target(&old_ref);
            refdb.rename(&old_ref, &new_ref)?;
            if let Some(target) = symbolic_target {
                let new_target = match target.strip_prefix(&old_prefix) {
                    Some(rest) => format!("{}{}", new_prefix, rest),
                    None => target,
                };
                refdb.retarget_symbolic(&new_ref, &new_target)?;
            }
        }

        let default_old = default_fetch_spec(old_name);
        let default_new = default_fetch_spec(new_name);
        let fetch_key = format!("remote.{}.fetch", new_name);
        let existing = config.multivar(&fetch_key);
        config.remove(&fetch_key);
        let mut problem_refspecs = Vec::new();
        for spec in existing {
            if spec == default_old {
                config.add_multivar(&fetch_key, &default_new);
            } else {
                config.add_multivar(&fetch_key, &spec);
                problem_refspecs.push(spec);
            }
        }

        Ok(RenameOutcome { problem_refspecs })
    }

    /// Deletes a remote: removes `branch.*.{merge,remote}` entries
    /// pointing at it, removes every local ref matching any of its
    /// refspecs' destinations, then removes its config section (§4.4
    /// "delete").
    pub fn delete(name: &str, config: &mut dyn Config, refdb: &mut dyn RefDb) -> Result<(), Error> {
        let mut specs = Vec::new();
        for spec in config.multivar(&format!("remote.{}.fetch", name)) {
            specs.push(Refspec::parse(&spec, Direction::Fetch)?);
        }
        for spec in config.multivar(&format!("remote.{}.push", name)) {
            specs.push(Refspec::parse(&spec, Direction::Push)?);
        }

        let mut branch_remote_keys = Vec::new();
        config.foreach_match("branch.*.remote", &mut |key, value| {
            if value == name {
                branch_remote_keys.push(key.to_string());
            }
        });
        for key in branch_remote_keys {
            if let Some(branch) = key.strip_prefix("branch.").and_then(|s| s.strip_suffix(".remote")) {
                config.remove(&format!("branch.{}.merge", branch));
            }
            config.remove(&key);
        }

        for spec in &specs {
            if spec.dst().is_none() {
                continue;
            }
            for refname in refdb.iter_names("") {
                if spec.dst_matches(&refname) {
                    let _ = refdb.delete(&refname);
                }
            }
        }

        config.rename_section(&format!("remote.{}", name), None);
        Ok(())
    }

    pub fn add_fetch(name: &str, spec: &str, config: &mut dyn Config) -> Result<(), Error> {
        Refspec::parse(spec, Direction::Fetch)?;
        config.add_multivar(&format!("remote.{}.fetch", name), spec);
        Ok(())
    }

    pub fn add_push(name: &str, spec: &str, config: &mut dyn Config) -> Result<(), Error> {
        Refspec::parse(spec, Direction::Push)?;
        config.add_multivar(&format!("remote.{}.push", name), spec);
        Ok(())
    }

    pub fn set_url(name: &str, url: &str, config: &mut dyn Config) {
        config.set_str(&format!("remote.{}.url", name), &canonicalize_url(url));
    }

    pub fn set_pushurl(name: &str, url: Option<&str>, config: &mut dyn Config) {
        let key = format!("remote.{}.pushurl", name);
        match url {
            Some(url) => config.set_str(&key, &canonicalize_url(url)),
            None => config.remove(&key),
        }
    }

    /// Runs a full fetch: connect, DWIM, negotiate, download, disconnect,
    /// `update_tips`, FETCH_HEAD, and (if configured) prune (§4.5 "fetch").
    /// `explicit_refspecs`, when given, overrides `configured` for this
    /// operation only and enables opportunistic tracking-branch updates.
    pub fn fetch(
        &mut self,
        transport: &mut dyn Transport,
        refdb: &mut dyn RefDb,
        odb: &dyn Odb,
        config: &dyn Config,
        callbacks: &mut RemoteCallbacks,
        explicit_refspecs: Option<&[String]>,
        tags_override: Option<TagsPolicy>,
        prune_override: Option<bool>,
    ) -> Result<(), Error> {
        if self.is_busy() && self.in_progress != Some(OperationKind::Fetch) {
            return Err(Error::busy());
        }
        self.in_progress = Some(OperationKind::Fetch);
        let synchronous = callbacks.is_synchronous();

        let url = resolve_url(&self.url, Direction::Fetch, config, callbacks);
        match stage::drive(&mut self.pending, Stage::ResolveUrl, synchronous, || {
            Ok(Poll::Ready(()))
        }) {
            Ok(Outcome::Done(())) => {}
            Ok(Outcome::WouldBlock) => return Err(Error::would_block()),
            Err(e) => {
                self.pending.clear();
                self.in_progress = None;
                return Err(e);
            }
        }
        log::trace!("resolved fetch url: {}", url);

        self.passed_refspecs = explicit_refspecs.is_some();
        let base_specs: Vec<Refspec> = match explicit_refspecs {
            Some(strs) => strs
                .iter()
                .map(|s| Refspec::parse(s, Direction::Fetch))
                .collect::<Result<_, _>>()?,
            None => self
                .configured
                .iter()
                .filter(|s| s.direction() == Direction::Fetch)
                .cloned()
                .collect(),
        };

        let proxy = self.proxy.clone();
        match stage::drive(&mut self.pending, Stage::Connect, synchronous, || {
            transport.connect(&url, &proxy, Direction::Fetch)
        }) {
            Ok(Outcome::Done(())) => {}
            Ok(Outcome::WouldBlock) => return Err(Error::would_block()),
            Err(e) => {
                self.pending.clear();
                self.in_progress = None;
                return Err(e);
            }
        }
        log::debug!("connected to {}", url);

        let heads = transport.ls();
        let head_names: Vec<String> = heads.iter().map(|h| h.name.clone()).collect();

        self.active = base_specs.iter().filter_map(|s| s.dwim(&head_names)).collect();
        self.passive = self
            .configured
            .iter()
            .filter(|s| s.direction() == Direction::Fetch)
            .filter_map(|s| s.dwim(&head_names))
            .collect();

        match stage::drive(&mut self.pending, Stage::Negotiate, synchronous, || {
            transport.negotiate()
        }) {
            Ok(Outcome::Done(())) => {}
            Ok(Outcome::WouldBlock) => return Err(Error::would_block()),
            Err(e) => {
                self.pending.clear();
                self.in_progress = None;
                let _ = transport.close();
                return Err(e);
            }
        }

        match stage::drive(&mut self.pending, Stage::Download, synchronous, || {
            transport.download_pack()
        }) {
            Ok(Outcome::Done(())) => {}
            Ok(Outcome::WouldBlock) => return Err(Error::would_block()),
            Err(e) => {
                self.pending.clear();
                self.in_progress = None;
                let _ = transport.close();
                return Err(e);
            }
        }

        self.last_stats = transport.stats();
        if let Some(hook) = callbacks.transfer_progress.as_mut() {
            hook(&self.last_stats);
        }

        match stage::drive(&mut self.pending, Stage::Disconnect, synchronous, || {
            transport.close()
        }) {
            Ok(Outcome::Done(())) => {}
            Ok(Outcome::WouldBlock) => return Err(Error::would_block()),
            Err(e) => {
                // Disconnect errors during fetch cleanup are reported but do
                // not suppress the reference updates already performed (§7).
                log::debug!("disconnect error during fetch cleanup: {}", e);
            }
        }

        let effective_tags = match tags_override {
            Some(TagsPolicy::Unspecified) | None => self.tags_policy,
            Some(policy) => policy,
        };
        let reflog_message = "fetch";

        if effective_tags == TagsPolicy::All {
            let tag_spec = Refspec::parse("refs/tags/*:refs/tags/*", Direction::Fetch)?;
            let opts = UpdateTipsOptions {
                tags_policy: effective_tags,
                reflog_message,
                report_unchanged: false,
            };
            reconcile::update_tips_for_spec(&tag_spec, &heads, refdb, odb, callbacks, &opts)?;
        }

        let mut fetch_head_entries = Vec::new();
        let active = self.active.clone();
        for spec in active.iter().filter(|s| s.direction() == Direction::Fetch) {
            let opts = UpdateTipsOptions {
                tags_policy: effective_tags,
                reflog_message,
                report_unchanged: false,
            };
            reconcile::update_tips_for_spec(spec, &heads, refdb, odb, callbacks, &opts)?;
            let merge_head = resolve_upstream_merge_head(spec, &*refdb, config, self.name.as_deref());
            fetch_head_entries.extend(fetch_head::build_fetch_head_entries(
                spec,
                &heads,
                merge_head.as_deref(),
                &url,
            ));
        }

        if self.passed_refspecs {
            reconcile::opportunistic_updates(
                &heads,
                &self.active,
                &self.passive,
                refdb,
                callbacks,
                reflog_message,
            )?;
        }

        self.last_fetch_head = fetch_head::format_fetch_head(&fetch_head_entries);

        let should_prune = prune_override.unwrap_or_else(|| self.prune.unwrap_or(false));
        if should_prune {
            reconcile::prune(refdb, &self.active, &head_names, callbacks)?;
        }

        self.pending.clear();
        self.in_progress = None;
        Ok(())
    }

    /// Runs a push: connect, push-finish, disconnect, then a push-mode tip
    /// update that reports each ref's outcome through the
    /// `push_update_reference` hook and, for every ref the peer accepted,
    /// advances this remote's local tracking ref to match (§4.5 "push",
    /// and the `git_push_update_tips` delegation in DESIGN.md's supplement
    /// list). `pushed` names the destination ref and oid this call is
    /// attempting to push for each ref, supplied by the caller since the
    /// transport's `push_finish` reports only acceptance, not the oid.
    pub fn push(
        &mut self,
        transport: &mut dyn Transport,
        refdb: &mut dyn RefDb,
        config: &dyn Config,
        callbacks: &mut RemoteCallbacks,
        pushed: &[(String, crate::oid::Oid)],
    ) -> Result<Vec<PushStatus>, Error> {
        if self.is_busy() && self.in_progress != Some(OperationKind::Push) {
            return Err(Error::busy());
        }
        self.in_progress = Some(OperationKind::Push);
        let synchronous = callbacks.is_synchronous();

        let target_url = self.pushurl.clone().unwrap_or_else(|| self.url.clone());
        let url = resolve_url(&target_url, Direction::Push, config, callbacks);
        match stage::drive(&mut self.pending, Stage::ResolveUrl, synchronous, || {
            Ok(Poll::Ready(()))
        }) {
            Ok(Outcome::Done(())) => {}
            Ok(Outcome::WouldBlock) => return Err(Error::would_block()),
            Err(e) => {
                self.pending.clear();
                self.in_progress = None;
                return Err(e);
            }
        }

        let proxy = self.proxy.clone();
        match stage::drive(&mut self.pending, Stage::Connect, synchronous, || {
            transport.connect(&url, &proxy, Direction::Push)
        }) {
            Ok(Outcome::Done(())) => {}
            Ok(Outcome::WouldBlock) => return Err(Error::would_block()),
            Err(e) => {
                self.pending.clear();
                self.in_progress = None;
                return Err(e);
            }
        }

        let statuses = match stage::drive(&mut self.pending, Stage::PushFinish, synchronous, || {
            transport.push_finish()
        }) {
            Ok(Outcome::Done(statuses)) => statuses,
            Ok(Outcome::WouldBlock) => return Err(Error::would_block()),
            Err(e) => {
                self.pending.clear();
                self.in_progress = None;
                let _ = transport.close();
                return Err(e);
            }
        };

        match stage::drive(&mut self.pending, Stage::Disconnect, synchronous, || {
            transport.close()
        }) {
            Ok(Outcome::Done(())) => {}
            Ok(Outcome::WouldBlock) => return Err(Error::would_block()),
            Err(e) => log::debug!("disconnect error during push cleanup: {}", e),
        }

        for status in &statuses {
            if let Some(hook) = callbacks.push_update_reference.as_mut() {
                hook(&status.reference, status.message.as_deref())?;
            }
        }

        let fetch_specs: Vec<Refspec> = self
            .configured
            .iter()
            .filter(|s| s.direction() == Direction::Fetch)
            .cloned()
            .collect();
        reconcile::update_tips_for_push(
            &statuses,
            pushed,
            &fetch_specs,
            refdb,
            callbacks,
            "push",
        )?;

        self.pending.clear();
        self.in_progress = None;
        Ok(statuses)
    }

    pub fn stop(&mut self, transport: &mut dyn Transport) {
        transport.cancel();
    }
}

/// Resolves the URL for a connect attempt (§4.5 "connect": "resolve URL
/// via callback" before falling back to the configured `insteadOf`
/// rewrite). A caller-installed `resolve_url` hook wins when it doesn't
/// pass through.
fn resolve_url(
    url: &str,
    direction: Direction,
    config: &dyn Config,
    callbacks: &mut RemoteCallbacks,
) -> String {
    if let Some(hook) = callbacks.resolve_url.as_mut() {
        match hook(url, direction) {
            ResolveUrlAction::Handled(resolved) => {
                log::trace!("resolve_url callback handled {} -> {}", url, resolved);
                return resolved;
            }
            ResolveUrlAction::Passthrough => {}
        }
    }
    insteadof::rewrite_url(url, direction, config)
}

/// Resolves the wildcard merge head through the local upstream-branch
/// configuration instead of trusting the peer's advertised `HEAD` symref
/// directly (§4.6.2, grounded on `remote.c`'s `remote_head_for_ref`/
/// `ref_to_update`): the local `HEAD` must point at a branch configured to
/// track this remote, and that branch's `branch.<name>.merge` value must
/// fall within `spec`'s source pattern.
fn resolve_upstream_merge_head(
    spec: &Refspec,
    refdb: &dyn RefDb,
    config: &dyn Config,
    remote_name: Option<&str>,
) -> Option<String> {
    let remote_name = remote_name?;
    let head_target = refdb.symbolic_target("HEAD")?;
    let short = head_target.strip_prefix("refs/heads/")?;
    let configured_remote = config.get_str(&format!("branch.{}.remote", short))?;
    if configured_remote != remote_name {
        return None;
    }
    let merge_ref = config.get_str(&format!("branch.{}.merge", short))?;
    if spec.src_matches(&merge_ref) {
        Some(merge_ref)
    } else {
        None
    }
}

/// `refs/heads/test:refs/remotes/<name>/test` must parse for `name` to be
/// usable (delegates to `refspec::is_valid_remote_name`).
pub fn default_fetch_spec(name: &str) -> String {
    format!("+refs/heads/*:refs/remotes/{}/*", name)
}

/// UNC-style paths (a leading `\\` followed by an alphanumeric) have
/// their backslashes converted to forward slashes so the value round-trips
/// across platforms; otherwise the URL passes through unchanged (§4.3).
fn canonicalize_url(url: &str) -> String {
    let bytes = url.as_bytes();
    if bytes.len() > 2 && bytes[0] == b'\\' && bytes[1] == b'\\' && bytes[2].is_ascii_alphanumeric() {
        url.replace('\\', "/")
    } else {
        url.to_string()
    }
}

/// Default branch discovery (§4.7): the first advertised head's symbolic
/// target if it is literally `HEAD`; otherwise the `refs/heads/*` head
/// sharing `HEAD`'s object id, preferring `refs/heads/master`.
pub fn default_branch(heads: &[crate::transport::AdvertisedHead]) -> Result<String, Error> {
    if let Some(first) = heads.first() {
        if first.name == "HEAD" {
            if let Some(target) = &first.symref_target {
                return Ok(target.clone());
            }
        }
    }

    let head_oid = heads
        .iter()
        .find(|h| h.name == "HEAD")
        .map(|h| h.oid.clone())
        .ok_or_else(|| Error::not_found("no HEAD advertised"))?;

    let branches: Vec<&crate::transport::AdvertisedHead> = heads
        .iter()
        .filter(|h| h.name.starts_with("refs/heads/") && h.oid == head_oid)
        .collect();

    if let Some(master) = branches.iter().find(|h| h.name == "refs/heads/master") {
        return Ok(master.name.clone());
    }
    branches
        .first()
        .map(|h| h.name.clone())
        .ok_or_else(|| Error::not_found("no branch matches HEAD's object id"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfig;
    use crate::event::Event;
    use crate::odb::MemoryOdb;
    use crate::refdb::MemoryRefDb;
    use crate::transport::{AdvertisedHead, LoopbackTransport};
    use crate::oid::Oid;

    #[test]
    fn s1_default_fetch_creates_expected_config() {
        let mut config = MemoryConfig::new();
        let remote =
            Remote::create(Some("origin"), "https://example.test/repo.git", Some(&mut config))
                .unwrap();
        assert_eq!(
            config.get_str("remote.origin.url"),
            Some("https://example.test/repo.git".to_string())
        );
        assert_eq!(
            config.multivar("remote.origin.fetch"),
            vec!["+refs/heads/*:refs/remotes/origin/*".to_string()]
        );
        assert_eq!(remote.name(), Some("origin"));
    }

    #[test]
    fn create_then_lookup_round_trips() {
        let mut config = MemoryConfig::new();
        Remote::create(Some("origin"), "https://example.test/repo.git", Some(&mut config))
            .unwrap();
        let looked_up = Remote::lookup("origin", &config).unwrap();
        assert_eq!(looked_up.url(), "https://example.test/repo.git");
        assert_eq!(looked_up.refspecs().len(), 1);
    }

    #[test]
    fn lookup_fails_when_absent() {
        let config = MemoryConfig::new();
        assert!(Remote::lookup("origin", &config).is_err());
    }

    #[test]
    fn create_refuses_duplicate_name() {
        let mut config = MemoryConfig::new();
        Remote::create(Some("origin"), "https://example.test/repo.git", Some(&mut config))
            .unwrap();
        let err =
            Remote::create(Some("origin"), "https://example.test/other.git", Some(&mut config))
                .unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::Exists);
    }

    #[test]
    fn open_question_fetchspec_overrides_skip_flag() {
        let mut config = MemoryConfig::new();
        let opts = CreateOptions {
            fetchspec: Some("+refs/heads/main:refs/remotes/origin/main"),
            skip_default_fetchspec: true,
        };
        let remote = Remote::create_with_opts(
            Some("origin"),
            "https://example.test/repo.git",
            Some(&mut config),
            &opts,
        )
        .unwrap();
        assert_eq!(remote.refspecs().len(), 1);
        assert_eq!(
            remote.refspecs()[0].as_str(),
            "+refs/heads/main:refs/remotes/origin/main"
        );
    }

    #[test]
    fn s6_rename_rewrites_default_spec_and_flags_others() {
        let mut config = MemoryConfig::new();
        let mut refdb = MemoryRefDb::new();
        Remote::create(Some("origin"), "https://example.test/repo.git", Some(&mut config))
            .unwrap();
        Remote::add_fetch(
            "origin",
            "+refs/notes/*:refs/notes/origin/*",
            &mut config,
        )
        .unwrap();
        refdb
            .create(
                "refs/remotes/origin/main",
                Oid::from_hex("aa").unwrap(),
                true,
                "seed",
            )
            .unwrap();

        let outcome = Remote::rename("origin", "upstream", &mut config, &mut refdb).unwrap();
        assert_eq!(outcome.problem_refspecs, vec!["+refs/notes/*:refs/notes/origin/*"]);
        assert_eq!(
            config.multivar("remote.upstream.fetch"),
            vec![
                "+refs/heads/*:refs/remotes/upstream/*".to_string(),
                "+refs/notes/*:refs/notes/origin/*".to_string(),
            ]
        );
        assert_eq!(refdb.resolve("refs/remotes/origin/main"), None);
        assert!(refdb.resolve("refs/remotes/upstream/main").is_some());
    }

    #[test]
    fn delete_removes_tracking_refs_and_config() {
        let mut config = MemoryConfig::new();
        let mut refdb = MemoryRefDb::new();
        Remote::create(Some("origin"), "https://example.test/repo.git", Some(&mut config))
            .unwrap();
        refdb
            .create(
                "refs/remotes/origin/main",
                Oid::from_hex("aa").unwrap(),
                true,
                "seed",
            )
            .unwrap();
        config.set_str("branch.main.remote", "origin");
        config.set_str("branch.main.merge", "refs/heads/main");

        Remote::delete("origin", &mut config, &mut refdb).unwrap();
        assert_eq!(config.get_str("remote.origin.url"), None);
        assert_eq!(config.get_str("branch.main.remote"), None);
        assert_eq!(config.get_str("branch.main.merge"), None);
        assert_eq!(refdb.resolve("refs/remotes/origin/main"), None);
    }

    #[test]
    fn fetch_end_to_end_through_loopback_transport() {
        let mut config = MemoryConfig::new();
        let mut remote =
            Remote::create(Some("origin"), "https://example.test/repo.git", Some(&mut config))
                .unwrap();
        let heads = vec![
            AdvertisedHead {
                name: "refs/heads/main".to_string(),
                oid: Oid::from_hex("aa").unwrap(),
                symref_target: None,
                local_oid: None,
            },
            AdvertisedHead {
                name: "HEAD".to_string(),
                oid: Oid::from_hex("aa").unwrap(),
                symref_target: Some("refs/heads/main".to_string()),
                local_oid: None,
            },
        ];
        let mut transport = LoopbackTransport::new(heads);
        let mut refdb = MemoryRefDb::new();
        let odb = MemoryOdb::new();
        let mut callbacks = RemoteCallbacks::new();

        remote
            .fetch(
                &mut transport,
                &mut refdb,
                &odb,
                &config,
                &mut callbacks,
                None,
                None,
                None,
            )
            .unwrap();

        assert_eq!(
            refdb.resolve("refs/remotes/origin/main"),
            Some(Oid::from_hex("aa").unwrap())
        );
        assert!(!remote.is_busy());
        assert!(remote.fetch_head().contains("refs/heads/main"));
    }

    #[test]
    fn busy_flag_rejects_concurrent_entry() {
        let mut config = MemoryConfig::new();
        let mut remote =
            Remote::create(Some("origin"), "https://example.test/repo.git", Some(&mut config))
                .unwrap();
        let heads = vec![AdvertisedHead {
            name: "refs/heads/main".to_string(),
            oid: Oid::from_hex("aa").unwrap(),
            symref_target: None,
            local_oid: None,
        }];
        let mut transport = LoopbackTransport::new(heads);
        let mut refdb = MemoryRefDb::new();
        let odb = MemoryOdb::new();
        let mut callbacks = RemoteCallbacks::new();
        // Installing an fd-events hook opts into the step-wise driver
        // (`RemoteCallbacks::is_synchronous`), so the suspension
        // `LoopbackTransport::connect` reports on its first poll escapes
        // to the caller instead of being hidden by the synchronous loop.
        callbacks.set_fd_events = Some(Box::new(|_fd, _events, _timeout| Event::empty()));

        let suspended = remote.fetch(
            &mut transport,
            &mut refdb,
            &odb,
            &config,
            &mut callbacks,
            None,
            None,
            None,
        );
        assert_eq!(suspended.unwrap_err().code(), crate::error::ErrorCode::WouldBlock);
        assert!(remote.is_busy());

        let pushed = Vec::new();
        let conflicting =
            remote.push(&mut transport, &mut refdb, &config, &mut callbacks, &pushed);
        assert_eq!(conflicting.unwrap_err().code(), crate::error::ErrorCode::Busy);

        remote
            .fetch(
                &mut transport,
                &mut refdb,
                &odb,
                &config,
                &mut callbacks,
                None,
                None,
                None,
            )
            .unwrap();
        assert!(!remote.is_busy());
    }

    #[test]
    fn default_branch_prefers_master() {
        let heads = vec![
            AdvertisedHead {
                name: "HEAD".to_string(),
                oid: Oid::from_hex("aa").unwrap(),
                symref_target: None,
                local_oid: None,
            },
            AdvertisedHead {
                name: "refs/heads/develop".to_string(),
                oid: Oid::from_hex("aa").unwrap(),
                symref_target: None,
                local_oid: None,
            },
            AdvertisedHead {
                name: "refs/heads/master".to_string(),
                oid: Oid::from_hex("aa").unwrap(),
                symref_target: None,
                local_oid: None,
            },
        ];
        assert_eq!(default_branch(&heads).unwrap(), "refs/heads/master");
    }

    #[test]
    fn default_branch_uses_symref_when_present() {
        let heads = vec![AdvertisedHead {
            name: "HEAD".to_string(),
            oid: Oid::from_hex("aa").unwrap(),
            symref_target: Some("refs/heads/trunk".to_string()),
            local_oid: None,
        }];
        assert_eq!(default_branch(&heads).unwrap(), "refs/heads/trunk");
    }

    #[test]
    fn push_advances_tracking_ref_for_accepted_refs() {
        let mut config = MemoryConfig::new();
        let mut remote =
            Remote::create(Some("origin"), "https://example.test/repo.git", Some(&mut config))
                .unwrap();
        let mut refdb = MemoryRefDb::new();
        refdb
            .create(
                "refs/remotes/origin/main",
                Oid::from_hex("aa").unwrap(),
                true,
                "seed",
            )
            .unwrap();
        let mut transport = LoopbackTransport::new(Vec::new()).with_push_statuses(vec![
            PushStatus {
                reference: "refs/heads/main".to_string(),
                message: None,
            },
        ]);
        let mut callbacks = RemoteCallbacks::new();
        let pushed = vec![(
            "refs/heads/main".to_string(),
            Oid::from_hex("bb").unwrap(),
        )];

        remote
            .push(&mut transport, &mut refdb, &config, &mut callbacks, &pushed)
            .unwrap();

        assert_eq!(
            refdb.resolve("refs/remotes/origin/main").unwrap().to_hex(),
            "bb"
        );
        assert!(!remote.is_busy());
    }

    #[test]
    fn stats_reflects_last_download() {
        let mut config = MemoryConfig::new();
        let mut remote =
            Remote::create(Some("origin"), "https://example.test/repo.git", Some(&mut config))
                .unwrap();
        let heads = vec![AdvertisedHead {
            name: "refs/heads/main".to_string(),
            oid: Oid::from_hex("aa").unwrap(),
            symref_target: None,
            local_oid: None,
        }];
        let mut transport = LoopbackTransport::new(heads);
        let mut refdb = MemoryRefDb::new();
        let odb = MemoryOdb::new();
        let mut callbacks = RemoteCallbacks::new();

        assert_eq!(remote.stats().received_objects, 0);
        remote
            .fetch(
                &mut transport,
                &mut refdb,
                &odb,
                &config,
                &mut callbacks,
                None,
                None,
                None,
            )
            .unwrap();
        assert_eq!(remote.stats().received_objects, 1);
    }

    #[test]
    fn proxy_round_trips_through_config() {
        let mut config = MemoryConfig::new();
        Remote::create(Some("origin"), "https://example.test/repo.git", Some(&mut config)).unwrap();

        let mut opts = crate::proxy::ProxyOptions::new();
        opts.url("https://proxy.example.test:8080");
        Remote::set_proxy("origin", &opts, &mut config);

        let remote = Remote::lookup("origin", &config).unwrap();
        assert_eq!(
            remote.proxy().resolved_url(),
            Some("https://proxy.example.test:8080")
        );
        assert!(!remote.proxy().is_auto());
    }

    #[test]
    fn proxy_auto_round_trips_through_config() {
        let mut config = MemoryConfig::new();
        Remote::create(Some("origin"), "https://example.test/repo.git", Some(&mut config)).unwrap();

        let mut opts = crate::proxy::ProxyOptions::new();
        opts.auto();
        Remote::set_proxy("origin", &opts, &mut config);

        let remote = Remote::lookup("origin", &config).unwrap();
        assert!(remote.proxy().is_auto());
    }

    #[test]
    fn resolve_url_callback_overrides_insteadof() {
        let mut config = MemoryConfig::new();
        config.set_str("url.git@github.com:.insteadof", "https://example.test/");
        let mut remote =
            Remote::create(Some("origin"), "https://example.test/repo.git", Some(&mut config))
                .unwrap();
        let heads = vec![AdvertisedHead {
            name: "refs/heads/main".to_string(),
            oid: Oid::from_hex("aa").unwrap(),
            symref_target: None,
            local_oid: None,
        }];
        let mut transport = LoopbackTransport::new(heads);
        let mut refdb = MemoryRefDb::new();
        let odb = MemoryOdb::new();
        let mut callbacks = RemoteCallbacks::new();
        let mut seen_url = None;
        callbacks.resolve_url = Some(Box::new(move |url, _direction| {
            seen_url = Some(url.to_string());
            crate::callbacks::ResolveUrlAction::Handled("https://overridden.test/repo.git".to_string())
        }));

        remote
            .fetch(
                &mut transport,
                &mut refdb,
                &odb,
                &config,
                &mut callbacks,
                None,
                None,
                None,
            )
            .unwrap();

        assert!(remote.fetch_head().contains("https://overridden.test/repo.git"));
    }

    #[test]
    fn fetch_head_merge_head_resolved_through_upstream_branch_config() {
        let mut config = MemoryConfig::new();
        let mut remote =
            Remote::create(Some("origin"), "https://example.test/repo.git", Some(&mut config))
                .unwrap();
        config.set_str("branch.main.remote", "origin");
        config.set_str("branch.main.merge", "refs/heads/main");

        let heads = vec![
            AdvertisedHead {
                name: "refs/heads/main".to_string(),
                oid: Oid::from_hex("aa").unwrap(),
                symref_target: None,
                local_oid: None,
            },
            AdvertisedHead {
                name: "refs/heads/dev".to_string(),
                oid: Oid::from_hex("bb").unwrap(),
                symref_target: None,
                local_oid: None,
            },
            // A differently-named advertised HEAD would mislead the old,
            // transport-trusting resolution; the local upstream config
            // (above) must win instead.
            AdvertisedHead {
                name: "HEAD".to_string(),
                oid: Oid::from_hex("bb").unwrap(),
                symref_target: Some("refs/heads/dev".to_string()),
                local_oid: None,
            },
        ];
        let mut transport = LoopbackTransport::new(heads);
        let mut refdb = MemoryRefDb::new();
        refdb.set_symbolic("HEAD", "refs/heads/main");
        let odb = MemoryOdb::new();
        let mut callbacks = RemoteCallbacks::new();

        remote
            .fetch(
                &mut transport,
                &mut refdb,
                &odb,
                &config,
                &mut callbacks,
                None,
                None,
                None,
            )
            .unwrap();

        assert!(remote.fetch_head().contains("refs/heads/main of"));
        assert!(!remote.fetch_head().contains("not-for-merge\trefs/heads/main"));
        assert!(remote.fetch_head().contains("not-for-merge\trefs/heads/dev"));
    }
}
