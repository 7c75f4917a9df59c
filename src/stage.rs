//! The resumable operation driver (C5): a tagged stage plus a bounded
//! pending-callback stack, driven by a single `step`/`perform` entry point
//! per design note §9's suggested redesign (replacing the source's
//! hand-rolled callback-stack with an explicit state machine).

use crate::error::{Error, ErrorClass, ErrorCode};
use crate::event::Event;
use crate::transport::Poll;

/// Sized for the longest stage chain a fetch or push can suspend across
/// (§3: "Maximum depth is fixed, ~8").
pub const MAX_PENDING_DEPTH: usize = 8;

/// A suspendable point in the connect/fetch/push chain (§4.5).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Stage {
    ResolveUrl,
    Connect,
    Negotiate,
    Download,
    PushFinish,
    Disconnect,
}

/// The bounded LIFO of suspended stages (§3 "Pending-callback stack").
/// A remote handle is busy iff this is non-empty (§4.5 "Busy flag").
#[derive(Debug, Default)]
pub struct PendingStack {
    frames: Vec<Stage>,
}

impl PendingStack {
    pub fn new() -> PendingStack {
        PendingStack::default()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn top(&self) -> Option<Stage> {
        self.frames.last().copied()
    }

    fn push(&mut self, stage: Stage) -> Result<(), Error> {
        if self.frames.len() >= MAX_PENDING_DEPTH {
            return Err(Error::new(
                ErrorCode::Invalid,
                ErrorClass::Invalid,
                "pending-callback stack overflow",
            ));
        }
        self.frames.push(stage);
        Ok(())
    }

    fn pop(&mut self) -> Option<Stage> {
        self.frames.pop()
    }

    /// Clears the stack after a terminal error, per §4.5's cleanup
    /// contract ("cleanup pops the stack").
    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

/// Outcome of driving one stage to completion or suspension.
pub enum Outcome<T> {
    Done(T),
    WouldBlock,
}

/// Drives one suspendable stage. On first entry for `stage`, `inner` is
/// called directly; on re-entry (the stage is already on top of the
/// stack, meaning a prior call suspended here), the frame is popped
/// first so that a nested suspension inside `inner` pushes a fresh frame
/// rather than stacking a stale one — mirroring the source's "the resume
/// closure first pops itself off the stack" contract.
pub fn step<T>(
    stack: &mut PendingStack,
    stage: Stage,
    mut inner: impl FnMut() -> Result<Poll<T>, Error>,
) -> Result<Outcome<T>, Error> {
    if stack.top() == Some(stage) {
        stack.pop();
    }
    match inner() {
        Ok(Poll::Ready(value)) => Ok(Outcome::Done(value)),
        Ok(Poll::WouldBlock) => {
            stack.push(stage)?;
            Ok(Outcome::WouldBlock)
        }
        Err(err) => Err(err),
    }
}

/// The default synchronous adapter (§4.5 "Synchronous adaptation"):
/// installed when the caller supplied no fd-readiness callback. Drives
/// `step` in a loop until it reaches a terminal result; the loop itself
/// is invisible to the caller, who observes only the final `Result`.
pub fn run_synchronously<T>(
    stack: &mut PendingStack,
    stage: Stage,
    mut inner: impl FnMut() -> Result<Poll<T>, Error>,
) -> Result<T, Error> {
    loop {
        match step(stack, stage, &mut inner)? {
            Outcome::Done(value) => return Ok(value),
            Outcome::WouldBlock => continue,
        }
    }
}

/// `perform` is `step` plus the `Event` bit-set a real fd-readiness
/// adapter delivers (§9's "single perform(event) method"). `TIMEOUT`
/// alone is a neutral poll: it only ever re-invokes `inner` the same way
/// `READ`/`WRITE` readiness would, since this driver has no fd of its own
/// to check the event against — the transport's own `Poll` result is the
/// actual source of truth (§5 "perform(TIMEOUT) must be a neutral poll").
pub fn perform<T>(
    stack: &mut PendingStack,
    stage: Stage,
    _event: Event,
    inner: impl FnMut() -> Result<Poll<T>, Error>,
) -> Result<Outcome<T>, Error> {
    step(stack, stage, inner)
}

/// Drives one stage either synchronously (looping until terminal, per
/// `run_synchronously`) or step-wise (returning `WouldBlock` to the
/// caller on first suspension), chosen by whether the caller registered
/// an fd-readiness callback (`RemoteCallbacks::is_synchronous`).
pub fn drive<T>(
    stack: &mut PendingStack,
    stage: Stage,
    synchronous: bool,
    inner: impl FnMut() -> Result<Poll<T>, Error>,
) -> Result<Outcome<T>, Error> {
    if synchronous {
        Ok(Outcome::Done(run_synchronously(stack, stage, inner)?))
    } else {
        perform(stack, stage, Event::empty(), inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_then_completes() {
        let mut stack = PendingStack::new();
        let mut attempts = 0;
        let mut inner = || {
            attempts += 1;
            if attempts == 1 {
                Ok(Poll::WouldBlock)
            } else {
                Ok(Poll::Ready(42))
            }
        };
        match step(&mut stack, Stage::Connect, &mut inner).unwrap() {
            Outcome::WouldBlock => {}
            Outcome::Done(_) => panic!("expected WouldBlock on first attempt"),
        }
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.top(), Some(Stage::Connect));

        match step(&mut stack, Stage::Connect, &mut inner).unwrap() {
            Outcome::Done(value) => assert_eq!(value, 42),
            Outcome::WouldBlock => panic!("expected Done on resume"),
        }
        assert!(stack.is_empty());
    }

    #[test]
    fn synchronous_adapter_hides_suspension() {
        let mut stack = PendingStack::new();
        let mut attempts = 0;
        let result = run_synchronously(&mut stack, Stage::Connect, || {
            attempts += 1;
            if attempts < 3 {
                Ok(Poll::WouldBlock)
            } else {
                Ok(Poll::Ready(()))
            }
        });
        assert!(result.is_ok());
        assert!(stack.is_empty());
    }

    #[test]
    fn overflow_is_a_programmer_error() {
        let mut stack = PendingStack::new();
        for _ in 0..MAX_PENDING_DEPTH {
            stack.push(Stage::Connect).unwrap();
        }
        assert!(stack.push(Stage::Connect).is_err());
    }

    #[test]
    fn perform_with_timeout_only_is_a_neutral_poll() {
        let mut stack = PendingStack::new();
        let mut attempts = 0;
        let mut inner = || {
            attempts += 1;
            if attempts == 1 {
                Ok(Poll::WouldBlock)
            } else {
                Ok(Poll::Ready(()))
            }
        };
        match perform(&mut stack, Stage::ResolveUrl, Event::TIMEOUT, &mut inner).unwrap() {
            Outcome::WouldBlock => {}
            Outcome::Done(_) => panic!("expected WouldBlock on first attempt"),
        }
        match perform(&mut stack, Stage::ResolveUrl, Event::TIMEOUT, &mut inner).unwrap() {
            Outcome::Done(()) => {}
            Outcome::WouldBlock => panic!("expected Done on resume"),
        }
    }

    #[test]
    fn drive_synchronous_hides_suspension() {
        let mut stack = PendingStack::new();
        let mut attempts = 0;
        let outcome = drive(&mut stack, Stage::Disconnect, true, || {
            attempts += 1;
            if attempts < 3 {
                Ok(Poll::WouldBlock)
            } else {
                Ok(Poll::Ready(()))
            }
        })
        .unwrap();
        assert!(matches!(outcome, Outcome::Done(())));
        assert!(stack.is_empty());
    }

    #[test]
    fn drive_asynchronous_surfaces_would_block() {
        let mut stack = PendingStack::new();
        let outcome = drive(&mut stack, Stage::Disconnect, false, || {
            Ok::<Poll<()>, Error>(Poll::WouldBlock)
        })
        .unwrap();
        assert!(matches!(outcome, Outcome::WouldBlock));
        assert_eq!(stack.top(), Some(Stage::Disconnect));
    }
}
