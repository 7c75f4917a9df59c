//! Transfer progress statistics and push status reporting, mirrored on the
//! teacher's `Progress` struct (`src/remote_callbacks.rs`) and `PushStatus`
//! (`src/push.rs`).

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Progress {
    pub total_objects: usize,
    pub indexed_objects: usize,
    pub received_objects: usize,
    pub local_objects: usize,
    pub total_deltas: usize,
    pub indexed_deltas: usize,
    pub received_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushStatus {
    pub reference: String,
    /// `None` on success; `Some(message)` carries the peer's rejection
    /// reason.
    pub message: Option<String>,
}
