//! Comm region: the per-cell structure a guest and the hypervisor use to
//! exchange state-transition messages and console bytes.
//!
//! Grounded on `examples/original_source/hypervisor/control.c`'s
//! `cell_exchange_message` (request/reply handshake) and the console ring
//! described in the external-interfaces section: a single-writer,
//! append-only byte ring the guest fills and the root cell's serial
//! backend periodically drains.

use crate::error::{HvError, HvResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellMessage {
    None,
    Shutdown,
    ReconfigCompleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellReply {
    None,
    RequestApproved,
    RequestDenied,
    Received,
}

const CONSOLE_RING_SIZE: usize = 2048;

/// Append-only console ring a cell writes into; a single consumer (the
/// root cell's UART backend) drains it. `head`/`tail` are byte offsets
/// mod `CONSOLE_RING_SIZE`; `busy` blocks concurrent writers from the same
/// cell's other CPUs from interleaving partial writes.
pub struct ConsoleRing {
    buf: [u8; CONSOLE_RING_SIZE],
    head: usize,
    tail: usize,
    busy: bool,
}

impl ConsoleRing {
    pub const fn new() -> Self {
        ConsoleRing { buf: [0; CONSOLE_RING_SIZE], head: 0, tail: 0, busy: false }
    }

    /// Append `bytes`, overwriting the oldest unread data if the ring is
    /// full — a slow consumer must not be able to stall the guest.
    pub fn write(&mut self, bytes: &[u8]) -> HvResult<()> {
        if self.busy {
            return Err(HvError::Busy);
        }
        self.busy = true;
        for &b in bytes {
            self.buf[self.tail % CONSOLE_RING_SIZE] = b;
            self.tail = self.tail.wrapping_add(1);
            if self.tail.wrapping_sub(self.head) > CONSOLE_RING_SIZE {
                self.head = self.tail.wrapping_sub(CONSOLE_RING_SIZE);
            }
        }
        self.busy = false;
        Ok(())
    }

    /// Drain everything currently buffered into `out`, returning the
    /// number of bytes copied.
    pub fn drain(&mut self, out: &mut [u8]) -> usize {
        let mut n = 0;
        while self.head != self.tail && n < out.len() {
            out[n] = self.buf[self.head % CONSOLE_RING_SIZE];
            self.head = self.head.wrapping_add(1);
            n += 1;
        }
        n
    }
}

impl Default for ConsoleRing {
    fn default() -> Self {
        Self::new()
    }
}

/// One cell's comm region: state/message/reply fields plus its console
/// ring. The hypervisor side writes `cell_state`/`message`; the guest side
/// writes `reply`.
pub struct CommRegion {
    pub cell_state: super::CellState,
    pub message: CellMessage,
    pub reply: CellReply,
    pub console: ConsoleRing,
}

impl CommRegion {
    pub fn new(initial_state: super::CellState) -> Self {
        CommRegion {
            cell_state: initial_state,
            message: CellMessage::None,
            reply: CellReply::None,
            console: ConsoleRing::new(),
        }
    }

    /// Send a request and wait (poll) for a reply. Returns `true` if the
    /// target approved/acknowledged, `false` on denial — mirrors
    /// `cell_exchange_message`'s boolean contract. A cell already shut
    /// down or failed is treated as having approved, since there's no one
    /// left to deny the request.
    pub fn send_request(&mut self, message: CellMessage) -> bool {
        if matches!(self.cell_state, super::CellState::ShutDown | super::CellState::Failed) {
            return true;
        }
        self.message = message;
        matches!(self.reply, CellReply::RequestApproved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_write_drain_round_trips() {
        let mut ring = ConsoleRing::new();
        ring.write(b"hello").unwrap();
        let mut out = [0u8; 5];
        let n = ring.drain(&mut out);
        assert_eq!(n, 5);
        assert_eq!(&out, b"hello");
    }

    #[test]
    fn ring_overwrites_oldest_when_full() {
        let mut ring = ConsoleRing::new();
        let filler = alloc::vec![b'x'; CONSOLE_RING_SIZE + 10];
        ring.write(&filler).unwrap();
        let mut out = alloc::vec![0u8; CONSOLE_RING_SIZE];
        let n = ring.drain(&mut out);
        assert_eq!(n, CONSOLE_RING_SIZE);
    }

    #[test]
    fn shutdown_cell_approves_any_request() {
        let mut region = CommRegion::new(super::super::CellState::ShutDown);
        assert!(region.send_request(CellMessage::Shutdown));
    }

    #[test]
    fn running_cell_without_reply_is_denied() {
        let mut region = CommRegion::new(super::super::CellState::Running);
        assert!(!region.send_request(CellMessage::Shutdown));
    }
}
