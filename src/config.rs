//! Config binding (C3): the `remote.<name>.*` keys plus the generic
//! multivar/section operations the rest of the crate needs.

/// The subset of a config file's behavior this crate depends on. The
/// on-disk parser itself is an external collaborator (§1); this trait is
/// the boundary, and [`MemoryConfig`] is an in-memory reference
/// implementation used by tests and by detached/anonymous remotes.
pub trait Config {
    fn get_str(&self, key: &str) -> Option<String>;

    fn get_bool(&self, key: &str) -> Option<bool> {
        self.get_str(key).and_then(|v| parse_bool(&v))
    }

    /// Replaces every value under `key` with a single `value`.
    fn set_str(&mut self, key: &str, value: &str);

    /// All values currently stored under the exact key `key`, in the
    /// order they were written.
    fn multivar(&self, key: &str) -> Vec<String>;

    /// Appends a new value under `key` without touching any existing
    /// value. Grounded on the "unmatchable regex" trick used when writing
    /// refspecs: a multivar add must never silently replace a sibling
    /// entry (§4.3 write rules).
    fn add_multivar(&mut self, key: &str, value: &str);

    /// Replaces every value under `key` whose current value matches the
    /// glob `old_value_glob` (`*` as the only wildcard) with `value`. If
    /// nothing matches, appends a new entry instead.
    fn set_multivar(&mut self, key: &str, old_value_glob: &str, value: &str);

    /// Removes every value under `key` whose current value matches
    /// `old_value_glob`.
    fn remove_multivar(&mut self, key: &str, old_value_glob: &str);

    /// Removes every value stored under the exact key `key`.
    fn remove(&mut self, key: &str);

    /// Renames every key under section `old_prefix` (e.g. `remote.origin`)
    /// to live under `new_prefix` instead, or deletes the section
    /// entirely when `new_prefix` is `None`.
    fn rename_section(&mut self, old_prefix: &str, new_prefix: Option<&str>);

    /// All `(key, value)` pairs whose key starts with `key_prefix`.
    fn entries_matching(&self, key_prefix: &str) -> Vec<(String, String)>;

    /// Invokes `f` for every entry whose key matches the glob `key_glob`
    /// (`*` as the only wildcard, matching any run of characters).
    fn foreach_match(&self, key_glob: &str, f: &mut dyn FnMut(&str, &str)) {
        for (key, value) in self.entries_matching("") {
            if glob_match(key_glob, &key) {
                f(&key, &value);
            }
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn glob_match(pattern: &str, text: &str) -> bool {
    fn inner(pattern: &[u8], text: &[u8]) -> bool {
        match pattern.first() {
            None => text.is_empty(),
            Some(b'*') => {
                for i in 0..=text.len() {
                    if inner(&pattern[1..], &text[i..]) {
                        return true;
                    }
                }
                false
            }
            Some(&p) => text.first() == Some(&p) && inner(&pattern[1..], &text[1..]),
        }
    }
    inner(pattern.as_bytes(), text.as_bytes())
}

/// An ordered in-memory config store, standing in for the on-disk config
/// file parser named as an external collaborator.
#[derive(Debug, Default, Clone)]
pub struct MemoryConfig {
    entries: Vec<(String, String)>,
}

impl MemoryConfig {
    pub fn new() -> MemoryConfig {
        MemoryConfig::default()
    }
}

impl Config for MemoryConfig {
    fn get_str(&self, key: &str) -> Option<String> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    fn set_str(&mut self, key: &str, value: &str) {
        self.entries.retain(|(k, _)| k != key);
        self.entries.push((key.to_string(), value.to_string()));
    }

    fn multivar(&self, key: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .collect()
    }

    fn add_multivar(&mut self, key: &str, value: &str) {
        self.entries.push((key.to_string(), value.to_string()));
    }

    fn set_multivar(&mut self, key: &str, old_value_glob: &str, value: &str) {
        let mut replaced = false;
        for (k, v) in self.entries.iter_mut() {
            if k == key && glob_match(old_value_glob, v) {
                *v = value.to_string();
                replaced = true;
            }
        }
        if !replaced {
            self.add_multivar(key, value);
        }
    }

    fn remove_multivar(&mut self, key: &str, old_value_glob: &str) {
        self.entries
            .retain(|(k, v)| !(k == key && glob_match(old_value_glob, v)));
    }

    fn remove(&mut self, key: &str) {
        self.entries.retain(|(k, _)| k != key);
    }

    fn rename_section(&mut self, old_prefix: &str, new_prefix: Option<&str>) {
        let old_dot = format!("{}.", old_prefix);
        for (k, _) in self.entries.iter_mut() {
            if *k == old_prefix || k.starts_with(&old_dot) {
                match new_prefix {
                    Some(new_prefix) => {
                        let suffix = &k[old_prefix.len()..];
                        *k = format!("{}{}", new_prefix, suffix);
                    }
                    None => {}
                }
            }
        }
        if new_prefix.is_none() {
            self.entries
                .retain(|(k, _)| !(k == old_prefix || k.starts_with(&old_dot)));
        }
    }

    fn entries_matching(&self, key_prefix: &str) -> Vec<(String, String)> {
        self.entries
            .iter()
            .filter(|(k, _)| k.starts_with(key_prefix))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_str_replaces_single_value() {
        let mut config = MemoryConfig::new();
        config.set_str("remote.origin.url", "a");
        config.set_str("remote.origin.url", "b");
        assert_eq!(config.get_str("remote.origin.url"), Some("b".to_string()));
    }

    #[test]
    fn add_multivar_never_replaces() {
        let mut config = MemoryConfig::new();
        config.add_multivar("remote.origin.fetch", "+refs/heads/*:refs/remotes/origin/*");
        config.add_multivar("remote.origin.fetch", "+refs/notes/*:refs/notes/origin/*");
        assert_eq!(config.multivar("remote.origin.fetch").len(), 2);
    }

    #[test]
    fn rename_section_moves_all_keys() {
        let mut config = MemoryConfig::new();
        config.set_str("remote.origin.url", "https://example.test/repo.git");
        config.add_multivar("remote.origin.fetch", "+refs/heads/*:refs/remotes/origin/*");
        config.rename_section("remote.origin", Some("remote.upstream"));
        assert_eq!(config.get_str("remote.origin.url"), None);
        assert_eq!(
            config.get_str("remote.upstream.url"),
            Some("https://example.test/repo.git".to_string())
        );
        assert_eq!(config.multivar("remote.upstream.fetch").len(), 1);
    }

    #[test]
    fn rename_section_with_none_deletes() {
        let mut config = MemoryConfig::new();
        config.set_str("remote.origin.url", "https://example.test/repo.git");
        config.rename_section("remote.origin", None);
        assert_eq!(config.get_str("remote.origin.url"), None);
    }

    #[test]
    fn foreach_match_uses_glob() {
        let mut config = MemoryConfig::new();
        config.set_str("branch.main.remote", "origin");
        config.set_str("branch.dev.remote", "origin");
        config.set_str("remote.origin.url", "https://example.test/repo.git");
        let mut matched = Vec::new();
        config.foreach_match("branch.*.remote", &mut |k, v| {
            matched.push((k.to_string(), v.to_string()))
        });
        assert_eq!(matched.len(), 2);
    }
}
