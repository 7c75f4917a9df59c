//! Certificate/host-key shapes passed to the `certificate_check` callback,
//! mirrored on the teacher's `Cert`/`CertHostkey`/`CertX509` minus the FFI
//! backing.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cert {
    Hostkey(CertHostkey),
    X509(CertX509),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertHostkey {
    pub kind: SshHostKeyType,
    pub hostkey: Vec<u8>,
    pub hash_sha1: Option<[u8; 20]>,
    pub hash_sha256: Option<[u8; 32]>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertX509 {
    pub data: Vec<u8>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SshHostKeyType {
    Rsa,
    Dss,
    Ecdsa256,
    Ecdsa384,
    Ecdsa521,
    Ed25519,
}

impl SshHostKeyType {
    pub fn name(&self) -> &'static str {
        match self {
            SshHostKeyType::Rsa => "rsa",
            SshHostKeyType::Dss => "dss",
            SshHostKeyType::Ecdsa256 => "ecdsa-sha2-nistp256",
            SshHostKeyType::Ecdsa384 => "ecdsa-sha2-nistp384",
            SshHostKeyType::Ecdsa521 => "ecdsa-sha2-nistp521",
            SshHostKeyType::Ed25519 => "ed25519",
        }
    }
}
