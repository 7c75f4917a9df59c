//! FETCH_HEAD generation (§4.6.2, §6 persisted-state format).

use crate::oid::Oid;
use crate::refspec::Refspec;
use crate::transport::AdvertisedHead;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchHeadEntry {
    pub oid: Oid,
    pub not_for_merge: bool,
    pub name: String,
    pub url: String,
}

/// Computes the FETCH_HEAD lines for one fetch refspec: every advertised
/// head matching the spec's source, plus the chosen merge head. The merge
/// head is the remote's resolved `HEAD` target when the spec is a
/// wildcard, or the single matching head when the spec is literal and
/// matches exactly one head; otherwise there is no merge head and every
/// line is `not-for-merge`.
pub fn build_fetch_head_entries(
    spec: &Refspec,
    heads: &[AdvertisedHead],
    remote_head_symref: Option<&str>,
    url: &str,
) -> Vec<FetchHeadEntry> {
    let matching: Vec<&AdvertisedHead> = heads.iter().filter(|h| spec.src_matches(&h.name)).collect();

    let merge_name: Option<String> = if spec.is_wildcard() {
        remote_head_symref.map(str::to_string)
    } else if matching.len() == 1 {
        Some(matching[0].name.clone())
    } else {
        None
    };

    let mut merge_head_seen = false;
    let mut entries: Vec<FetchHeadEntry> = matching
        .iter()
        .map(|head| {
            let is_merge = merge_name.as_deref() == Some(head.name.as_str());
            if is_merge {
                merge_head_seen = true;
            }
            FetchHeadEntry {
                oid: head.oid.clone(),
                not_for_merge: !is_merge,
                name: head.name.clone(),
                url: url.to_string(),
            }
        })
        .collect();

    if let (Some(merge_name), false) = (&merge_name, merge_head_seen) {
        if let Some(head) = heads.iter().find(|h| &h.name == merge_name) {
            entries.push(FetchHeadEntry {
                oid: head.oid.clone(),
                not_for_merge: false,
                name: head.name.clone(),
                url: url.to_string(),
            });
        }
    }

    entries
}

/// Renders entries in the persisted `FETCH_HEAD` format: one line per
/// entry, `<hex-oid>\t[not-for-merge\t]<refname> of <url>`.
pub fn format_fetch_head(entries: &[FetchHeadEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&entry.oid.to_hex());
        out.push('\t');
        if entry.not_for_merge {
            out.push_str("not-for-merge\t");
        }
        out.push_str(&entry.name);
        out.push_str(" of ");
        out.push_str(&entry.url);
        out.push('\n');
    }
    out
}
