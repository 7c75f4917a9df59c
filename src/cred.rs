//! Credential acquisition types, gated behind the `cred` feature exactly as
//! the teacher gates the same `url` dependency (`examples/rust-lang-git2-rs`'s
//! `Cargo.toml`: `cred = ["dep:url"]`).

use url::Url;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CredentialType {
    pub user_pass_plaintext: bool,
    pub ssh_key: bool,
    pub ssh_memory: bool,
    pub default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cred {
    UserPassPlaintext { username: String, password: String },
    SshKey { username: String, private_key_path: String },
    Default,
}

/// Extracts the host from a credential-request URL, used by callback
/// implementations that key credentials off the peer host.
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url).ok().and_then(|u| u.host_str().map(String::from))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_host() {
        assert_eq!(
            host_of("https://example.test/acme/widget.git"),
            Some("example.test".to_string())
        );
    }
}
