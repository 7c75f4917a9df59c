use bitflags::bitflags;

bitflags! {
    /// Readiness events delivered to a suspended stage, and the bit-set
    /// returned by the synchronous `select`-based adapter.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct Event: u32 {
        const READ = 0b0001;
        const WRITE = 0b0010;
        const ERR = 0b0100;
        const TIMEOUT = 0b1000;
    }
}

bitflags! {
    /// Flags reported alongside a reference update, mirroring the update
    /// kinds the reconciliation loop distinguishes.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct UpdateFlags: u32 {
        /// The destination ref did not exist before this update.
        const CREATED = 0b0001;
        /// The update is for an auto-followed tag.
        const AUTO_TAG = 0b0010;
        /// The ref was removed (prune).
        const REMOVED = 0b0100;
        /// Report the callback even though old == new (report-unchanged).
        const REPORT_UNCHANGED = 0b1000;
    }
}
