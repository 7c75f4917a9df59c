//! Ref reconciliation (C6): `update_tips`, opportunistic tracking-branch
//! updates, and prune. Grounded on `update_tips_for_spec`, `next_head`,
//! `opportunistic_updates`, `prune_candidates`, and `git_remote_prune` as
//! implemented in libgit2's `remote.c` (read in full during this crate's
//! development; the file is not shipped with this repository).

use crate::callbacks::RemoteCallbacks;
use crate::error::{Error, ErrorCode};
use crate::odb::Odb;
use crate::oid::Oid;
use crate::refdb::RefDb;
use crate::progress::PushStatus;
use crate::refspec::{is_valid_ref_name, Refspec};
use crate::remote::TagsPolicy;
use crate::transport::AdvertisedHead;

pub struct UpdateTipsOptions<'a> {
    pub tags_policy: TagsPolicy,
    pub reflog_message: &'a str,
    /// Fires `update_tips` even when the destination ref's id is already
    /// equal to the advertised head (§9 supplement, `REPORT_UNCHANGED`
    /// carried on `FetchOptions`). Defaults to `false` via
    /// `Default::default()`, matching the common case (§4.6 step 4: "If
    /// equal to head.id, skip").
    pub report_unchanged: bool,
}

impl<'a> Default for UpdateTipsOptions<'a> {
    fn default() -> UpdateTipsOptions<'a> {
        UpdateTipsOptions {
            tags_policy: TagsPolicy::Auto,
            reflog_message: "fetch",
            report_unchanged: false,
        }
    }
}

/// Reconciles local refs against `heads` through `spec` (§4.6
/// `update_tips`). Returns the heads that matched but had no destination
/// (dst-less fetch specs), which the caller folds into FETCH_HEAD instead
/// of a local ref.
pub fn update_tips_for_spec(
    spec: &Refspec,
    heads: &[AdvertisedHead],
    refdb: &mut dyn RefDb,
    odb: &dyn Odb,
    callbacks: &mut RemoteCallbacks,
    opts: &UpdateTipsOptions,
) -> Result<Vec<AdvertisedHead>, Error> {
    let tag_spec = Refspec::parse("refs/tags/*:refs/tags/*", spec.direction())?;
    let mut fetch_head_only = Vec::new();

    for head in heads {
        if !is_valid_ref_name(&head.name) {
            continue;
        }

        let (refname, autotag) = if tag_spec.src_matches(&head.name)
            && opts.tags_policy != TagsPolicy::None
        {
            (head.name.clone(), true)
        } else if spec.src_matches(&head.name) {
            match spec.dst() {
                Some(_) => (spec.transform(&head.name)?, false),
                None => {
                    fetch_head_only.push(head.clone());
                    continue;
                }
            }
        } else {
            continue;
        };

        if refname.is_empty() {
            continue;
        }
        if autotag && opts.tags_policy == TagsPolicy::Auto && !odb.exists(&head.oid) {
            continue;
        }

        let old = refdb
            .resolve(&refname)
            .unwrap_or_else(|| Oid::zero(head.oid.as_bytes().len()));
        if old == head.oid {
            if opts.report_unchanged {
                callbacks.fire_update_tips(&refname, &old, &head.oid)?;
            }
            continue;
        }

        let force = !autotag;
        match refdb.create(&refname, head.oid.clone(), force, opts.reflog_message) {
            Ok(()) => {}
            Err(e) if autotag && e.code() == ErrorCode::Exists => {}
            Err(e) => return Err(e),
        }

        log::debug!("updating tips {} -> {} ({})", old, head.oid, refname);
        callbacks.fire_update_tips(&refname, &old, &head.oid)?;
    }

    Ok(fetch_head_only)
}

/// The cooperative triple-nested cursor over heads × active refspecs ×
/// passive refspecs (§4.6 "Opportunistic updates"): `next` returns the
/// next matching triple and advances its internal `(i, j, k)` position so
/// a subsequent call resumes without re-scanning.
#[derive(Debug, Default)]
pub struct HeadCursor {
    i: usize,
    j: usize,
    k: usize,
}

impl HeadCursor {
    pub fn new() -> HeadCursor {
        HeadCursor::default()
    }

    pub fn next<'a>(
        &mut self,
        heads: &'a [AdvertisedHead],
        active: &'a [Refspec],
        passive: &'a [Refspec],
    ) -> Option<(&'a AdvertisedHead, &'a Refspec, &'a Refspec)> {
        while self.i < heads.len() {
            while self.j < active.len() {
                while self.k < passive.len() {
                    let head = &heads[self.i];
                    let active_spec = &active[self.j];
                    let passive_spec = &passive[self.k];
                    self.k += 1;
                    if active_spec.src_matches(&head.name) && passive_spec.src_matches(&head.name) {
                        return Some((head, active_spec, passive_spec));
                    }
                }
                self.k = 0;
                self.j += 1;
            }
            self.j = 0;
            self.i += 1;
        }
        None
    }
}

/// Runs opportunistic tracking-branch updates: only entered when the
/// caller passed explicit refspecs for this operation (§4.6, the source's
/// `remote->passed_refspecs` guard).
pub fn opportunistic_updates(
    heads: &[AdvertisedHead],
    active: &[Refspec],
    passive: &[Refspec],
    refdb: &mut dyn RefDb,
    callbacks: &mut RemoteCallbacks,
    reflog_message: &str,
) -> Result<(), Error> {
    let mut cursor = HeadCursor::new();
    while let Some((head, _active_spec, passive_spec)) = cursor.next(heads, active, passive) {
        if passive_spec.dst().is_none() {
            continue;
        }
        let refname = passive_spec.transform(&head.name)?;
        let old = refdb.resolve(&refname);
        if old.as_ref() == Some(&head.oid) {
            continue;
        }
        let old_for_callback = old
            .clone()
            .unwrap_or_else(|| Oid::zero(head.oid.as_bytes().len()));
        refdb.create_matching(&refname, head.oid.clone(), old.as_ref(), reflog_message)?;
        log::debug!(
            "updating tips {} -> {} ({})",
            old_for_callback,
            head.oid,
            refname
        );
        callbacks.fire_update_tips(&refname, &old_for_callback, &head.oid)?;
    }
    Ok(())
}

/// Collects local refs whose name is a destination-match of any active
/// fetch spec (§4.6 "Prune", step a).
pub fn prune_candidates(local_ref_names: &[String], active: &[Refspec]) -> Vec<String> {
    local_ref_names
        .iter()
        .filter(|name| active.iter().any(|spec| spec.dst_matches(name)))
        .cloned()
        .collect()
}

/// Deletes stale tracking refs: a prune candidate is removed unless its
/// reverse-transformed peer name is still advertised, or the ref is
/// symbolic (§4.6 "Prune", steps b-d).
pub fn prune(
    refdb: &mut dyn RefDb,
    active: &[Refspec],
    advertised_names: &[String],
    callbacks: &mut RemoteCallbacks,
) -> Result<(), Error> {
    let all_refs = refdb.iter_names("");
    for name in prune_candidates(&all_refs, active) {
        if refdb.is_symbolic(&name) {
            continue;
        }
        let peer_name = active
            .iter()
            .find(|spec| spec.dst_matches(&name))
            .and_then(|spec| spec.rtransform(&name).ok());
        let still_advertised = peer_name
            .as_deref()
            .map(|peer| advertised_names.iter().any(|n| n == peer))
            .unwrap_or(false);
        if still_advertised {
            continue;
        }
        if let Some(old) = refdb.resolve(&name) {
            refdb.delete(&name)?;
            log::debug!("pruning {} ({})", name, old);
            let zero = Oid::zero(old.as_bytes().len());
            callbacks.fire_update_tips(&name, &old, &zero)?;
        }
    }
    Ok(())
}

/// Push-side `update_tips` delegation (§9 supplement: "`git_remote_update_tips`
/// defers to `git_push_update_tips` when a push context exists"). For each
/// successfully-updated remote ref in `statuses`, advances this remote's
/// matching tracking ref (via its fetch refspecs) to the oid that was just
/// pushed, so a later fetch does not present the push as new history.
/// `pushed` supplies the oid actually pushed to each destination ref name,
/// since a push status alone carries no oid.
pub fn update_tips_for_push(
    statuses: &[PushStatus],
    pushed: &[(String, Oid)],
    fetch_specs: &[Refspec],
    refdb: &mut dyn RefDb,
    callbacks: &mut RemoteCallbacks,
    reflog_message: &str,
) -> Result<(), Error> {
    for status in statuses {
        if status.message.is_some() {
            continue;
        }
        let Some((_, oid)) = pushed.iter().find(|(name, _)| name == &status.reference) else {
            continue;
        };
        for spec in fetch_specs {
            if spec.dst().is_none() || !spec.src_matches(&status.reference) {
                continue;
            }
            let tracking = spec.transform(&status.reference)?;
            let old = refdb
                .resolve(&tracking)
                .unwrap_or_else(|| Oid::zero(oid.as_bytes().len()));
            if old == *oid {
                continue;
            }
            refdb.create(&tracking, oid.clone(), true, reflog_message)?;
            log::debug!("updating tips {} -> {} ({})", old, oid, tracking);
            callbacks.fire_update_tips(&tracking, &old, oid)?;
        }
    }
    Ok(())
}
