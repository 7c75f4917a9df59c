//! `url.<replacement>.insteadOf` / `pushInsteadOf` URL rewriting (C2).

use crate::config::Config;
use crate::refspec::Direction;

/// Rewrites `url` using the longest matching `url.<replacement>.insteadof`
/// (fetch) or `url.<replacement>.pushinsteadof` (push) config entry.
///
/// Scans every matching entry, keeps the one whose *value* is the longest
/// prefix of `url`, with ties broken by whichever entry config iteration
/// visits last, and returns the url with that prefix replaced by the
/// `<replacement>` captured from the entry's key. Never fails; an absent
/// match returns the url unchanged.
pub fn rewrite_url(url: &str, direction: Direction, config: &dyn Config) -> String {
    let suffix = match direction {
        Direction::Fetch => ".insteadof",
        Direction::Push => ".pushinsteadof",
    };

    let mut best: Option<(String, usize)> = None;
    for (key, value) in config.entries_matching("url.") {
        let Some(replacement) = key
            .strip_prefix("url.")
            .and_then(|rest| rest.strip_suffix(suffix))
        else {
            continue;
        };
        if url.starts_with(value.as_str()) {
            let replace = match &best {
                Some((_, best_len)) => value.len() >= *best_len,
                None => true,
            };
            if replace {
                best = Some((replacement.to_string(), value.len()));
            }
        }
    }

    match best {
        Some((replacement, matched_len)) => {
            let rewritten = format!("{}{}", replacement, &url[matched_len..]);
            log::trace!("{} rewrote {} -> {}", suffix.trim_start_matches('.'), url, rewritten);
            rewritten
        }
        None => {
            log::trace!("no insteadOf match for {}", url);
            url.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfig;

    #[test]
    fn passes_through_with_no_config() {
        let config = MemoryConfig::new();
        let url = "https://example.test/repo.git";
        assert_eq!(rewrite_url(url, Direction::Fetch, &config), url);
    }

    #[test]
    fn s2_basic_insteadof() {
        let mut config = MemoryConfig::new();
        config.set_str("url.git@github.com:.insteadof", "https://github.com/");
        let rewritten = rewrite_url(
            "https://github.com/acme/widget.git",
            Direction::Fetch,
            &config,
        );
        assert_eq!(rewritten, "git@github.com:acme/widget.git");
    }

    #[test]
    fn s3_longest_prefix_wins() {
        let mut config = MemoryConfig::new();
        config.set_str("url.git@github.com:.insteadof", "https://github.com/");
        config.set_str("url.FOO.insteadof", "https://github.com/acme/");
        let rewritten = rewrite_url(
            "https://github.com/acme/widget.git",
            Direction::Fetch,
            &config,
        );
        assert_eq!(rewritten, "FOOwidget.git");
    }

    #[test]
    fn push_direction_uses_pushinsteadof() {
        let mut config = MemoryConfig::new();
        config.set_str("url.fetch-only.insteadof", "https://example.test/");
        config.set_str("url.push-only.pushinsteadof", "https://example.test/");
        let url = "https://example.test/repo.git";
        assert_eq!(
            rewrite_url(url, Direction::Push, &config),
            "push-only/repo.git"
        );
        assert_eq!(
            rewrite_url(url, Direction::Fetch, &config),
            "fetch-only/repo.git"
        );
    }
}
