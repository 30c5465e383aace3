//! Connection lifecycle state and role, shared between the read and write
//! halves of a split connection.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Which side of the handshake this connection performed. Drives masking
/// direction: clients mask outbound frames and expect unmasked inbound ones;
/// servers are the mirror image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

impl Role {
    /// Whether a frame *received* by this role must be masked.
    pub(crate) fn expects_masked_peer(&self) -> bool {
        matches!(self, Role::Server)
    }

    /// Whether a frame *sent* by this role must be masked.
    pub(crate) fn masks_outbound(&self) -> bool {
        matches!(self, Role::Client)
    }
}

/// The four-valued connection lifecycle. Ordered so that `Connecting < Open <
/// Closing < Closed`: a connection only ever moves rightward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ReadyState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl ReadyState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            2 => ReadyState::Closing,
            _ => ReadyState::Closed,
        }
    }
}

/// Shared, lock-free lifecycle state. Both the read half (which observes peer
/// Close frames and fatal protocol errors) and the write half (which observes
/// a local `close()` call) advance the same handle, so either side always sees
/// the other's transition without needing a mutex.
#[derive(Clone)]
pub(crate) struct SharedState {
    inner: Arc<AtomicU8>,
}

impl SharedState {
    pub(crate) fn new(initial: ReadyState) -> Self {
        Self {
            inner: Arc::new(AtomicU8::new(initial as u8)),
        }
    }

    pub(crate) fn get(&self) -> ReadyState {
        ReadyState::from_u8(self.inner.load(Ordering::SeqCst))
    }

    /// Advances to `next` unless the connection is already at or past it.
    /// Returns the state that was in effect before this call, so the caller
    /// can tell whether it actually performed the transition.
    pub(crate) fn advance_to(&self, next: ReadyState) -> ReadyState {
        let mut current = self.inner.load(Ordering::SeqCst);
        loop {
            if ReadyState::from_u8(current) >= next {
                return ReadyState::from_u8(current);
            }
            match self.inner.compare_exchange(
                current,
                next as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(previous) => return ReadyState::from_u8(previous),
                Err(actual) => current = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_state_ordering_is_monotone() {
        assert!(ReadyState::Connecting < ReadyState::Open);
        assert!(ReadyState::Open < ReadyState::Closing);
        assert!(ReadyState::Closing < ReadyState::Closed);
    }

    #[test]
    fn advance_to_moves_forward_and_reports_previous_state() {
        let state = SharedState::new(ReadyState::Connecting);
        assert_eq!(state.advance_to(ReadyState::Open), ReadyState::Connecting);
        assert_eq!(state.get(), ReadyState::Open);
    }

    #[test]
    fn advance_to_never_regresses() {
        let state = SharedState::new(ReadyState::Closed);
        state.advance_to(ReadyState::Open);
        assert_eq!(state.get(), ReadyState::Closed);
    }

    #[test]
    fn role_masking_direction_is_mirrored() {
        assert!(Role::Client.masks_outbound());
        assert!(!Role::Client.expects_masked_peer());
        assert!(!Role::Server.masks_outbound());
        assert!(Role::Server.expects_masked_peer());
    }
}
