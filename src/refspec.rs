//! Refspec parsing, matching, wildcard transform, and DWIM expansion (C1).

use crate::error::{Error, ErrorClass, ErrorCode};

/// Which side of a connection a refspec governs.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    Fetch,
    Push,
}

/// A single `[+]src:dst` mapping between a peer's ref namespace and the
/// local one.
///
/// A spec with no destination is fetch-only: it is only ever recorded in
/// `FETCH_HEAD`, never materialized as a local ref (§3 invariant).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refspec {
    raw: String,
    src: String,
    dst: Option<String>,
    force: bool,
    direction: Direction,
}

impl Refspec {
    /// Parses a refspec string of the shape `[+]src[:dst]`.
    ///
    /// Sources and destinations are either literal ref names or a single
    /// trailing `*` wildcard anchored after a `/`. A push spec's source may
    /// additionally be the empty string, meaning "delete the destination".
    pub fn parse(s: &str, direction: Direction) -> Result<Refspec, Error> {
        let raw = s.to_string();
        let (force, rest) = match s.strip_prefix('+') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let (src, dst) = match rest.split_once(':') {
            Some((src, dst)) => (src, Some(dst)),
            None => (rest, None),
        };

        let src_is_delete = direction == Direction::Push && src.is_empty();
        if !src_is_delete && !is_valid_pattern(src) {
            return Err(Error::invalid_spec(format!(
                "invalid refspec source in `{}`",
                s
            )));
        }
        if let Some(dst) = dst {
            if !is_valid_pattern(dst) {
                return Err(Error::invalid_spec(format!(
                    "invalid refspec destination in `{}`",
                    s
                )));
            }
        }
        // Both sides must agree on whether they're a wildcard pattern.
        let src_wild = src.ends_with('*');
        let dst_wild = dst.is_some_and(|d| d.ends_with('*'));
        if dst.is_some() && src_wild != dst_wild {
            return Err(Error::invalid_spec(format!(
                "mismatched wildcards in `{}`",
                s
            )));
        }

        Ok(Refspec {
            raw,
            src: src.to_string(),
            dst: dst.map(|d| d.to_string()),
            force,
            direction,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    pub fn dst(&self) -> Option<&str> {
        self.dst.as_deref()
    }

    pub fn is_force(&self) -> bool {
        self.force
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_wildcard(&self) -> bool {
        self.src.ends_with('*')
    }

    /// Prefix equality on the non-wildcard portion, or exact equality for a
    /// literal source.
    pub fn src_matches(&self, name: &str) -> bool {
        matches_pattern(&self.src, name)
    }

    pub fn dst_matches(&self, name: &str) -> bool {
        match &self.dst {
            Some(dst) => matches_pattern(dst, name),
            None => false,
        }
    }

    /// Substitutes the wildcard tail of `name` (which must satisfy
    /// `src_matches(name)`) into the destination pattern.
    pub fn transform(&self, name: &str) -> Result<String, Error> {
        let dst = self.dst.as_ref().ok_or_else(|| {
            Error::invalid_spec("refspec has no destination to transform into")
        })?;
        if !self.src_matches(name) {
            return Err(Error::invalid_spec(format!(
                "`{}` does not match source `{}`",
                name, self.src
            )));
        }
        Ok(substitute(&self.src, dst, name))
    }

    /// The symmetric inverse of `transform`: given a destination-side name,
    /// produce the corresponding source-side name.
    pub fn rtransform(&self, name: &str) -> Result<String, Error> {
        let dst = self.dst.as_ref().ok_or_else(|| {
            Error::invalid_spec("refspec has no destination to reverse-transform from")
        })?;
        if !matches_pattern(dst, name) {
            return Err(Error::invalid_spec(format!(
                "`{}` does not match destination `{}`",
                name, dst
            )));
        }
        Ok(substitute(dst, &self.src, name))
    }

    /// DWIM ("do what I mean") expansion against a list of advertised head
    /// names. Wildcard specs are emitted unchanged; literal specs are
    /// resolved against the disambiguation order
    /// `src`, `refs/src`, `refs/tags/src`, `refs/heads/src`, `refs/remotes/src`,
    /// emitting the first that is actually advertised. DWIM never fails:
    /// an unmatched literal spec simply contributes nothing.
    pub fn dwim(&self, heads: &[String]) -> Option<Refspec> {
        if self.is_wildcard() {
            return Some(self.clone());
        }
        let candidates = [
            self.src.clone(),
            format!("refs/{}", self.src),
            format!("refs/tags/{}", self.src),
            format!("refs/heads/{}", self.src),
            format!("refs/remotes/{}", self.src),
        ];
        for candidate in candidates {
            if heads.iter().any(|h| h == &candidate) {
                let mut dwimmed = self.clone();
                dwimmed.src = candidate;
                return Some(dwimmed);
            }
        }
        None
    }
}

/// `refs/heads/test:refs/remotes/<name>/test` must parse for `name` to be a
/// valid remote name (§4.3).
/// Validates a concrete (non-pattern) ref name, as used when deciding
/// whether an advertised head's name is even ref-shaped before
/// reconciling it (§4.6 "valid ref name").
pub fn is_valid_ref_name(name: &str) -> bool {
    !name.ends_with('*') && is_valid_pattern(name)
}

pub fn is_valid_remote_name(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    let synthetic = format!("refs/heads/test:refs/remotes/{}/test", name);
    Refspec::parse(&synthetic, Direction::Fetch).is_ok()
}

fn matches_pattern(pattern: &str, name: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => name.starts_with(prefix),
        None => pattern == name,
    }
}

fn substitute(src_pattern: &str, dst_pattern: &str, name: &str) -> String {
    match (src_pattern.strip_suffix('*'), dst_pattern.strip_suffix('*')) {
        (Some(src_prefix), Some(dst_prefix)) => {
            let tail = &name[src_prefix.len()..];
            format!("{}{}", dst_prefix, tail)
        }
        _ => dst_pattern.to_string(),
    }
}

/// A conservative, git-like ref name / pattern validator: rejects control
/// characters, the disallowed punctuation set, doubled slashes, leading or
/// trailing slashes, and `..` components. A trailing `*` anchored after a
/// `/` is accepted as the one allowed wildcard.
fn is_valid_pattern(pattern: &str) -> bool {
    if pattern.is_empty() {
        return false;
    }
    let (body, had_wildcard) = match pattern.strip_suffix('*') {
        Some(body) => (body, true),
        None => (pattern, false),
    };
    if had_wildcard && !(body.is_empty() || body.ends_with('/')) {
        return false;
    }
    // Disallow a second wildcard, or one not in tail position.
    if body.contains('*') {
        return false;
    }
    if body.is_empty() {
        return had_wildcard;
    }
    if body.starts_with('/') || body.ends_with('/') || body.contains("//") {
        return false;
    }
    if body.contains("..") || body.contains('~') || body.contains('^') || body.contains(':') {
        return false;
    }
    if body.contains('?') || body.contains('[') || body.contains('\\') {
        return false;
    }
    if body.ends_with(".lock") || body.ends_with('.') {
        return false;
    }
    if body.bytes().any(|b| b < 0x20 || b == 0x7f) {
        return false;
    }
    if body.split('/').any(|part| part.is_empty() || part.starts_with('.')) {
        return false;
    }
    true
}
