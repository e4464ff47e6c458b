//! Per-participant message buffers.
//!
//! A [`Workspace`] holds one send buffer shared by every outgoing message and
//! an arena of receive slots, one per concurrently outstanding receive. The
//! slots live in a single contiguous allocation and are handed out as
//! disjoint mutable chunks, so two in-flight receives can never alias.
//!
//! Buffers are allocated and filled once, before any timed region.

use std::slice::ChunksExactMut;

use crate::error::{Error, Result};
use crate::pattern::{Op, TrafficPattern};

/// Byte every participant fills its send buffer with.
pub fn fill_byte(rank: usize) -> u8 {
    1 + (rank % 7) as u8
}

/// Send buffer plus receive-slot arena for one participant.
#[derive(Debug)]
pub struct Workspace {
    message_size: usize,
    send: Vec<u8>,
    recv: Vec<u8>,
    slots: usize,
}

impl Workspace {
    /// Allocate buffers for `slots` concurrent receives of `message_size` bytes.
    ///
    /// The send buffer is filled with [`fill_byte`]`(rank)`; receive slots
    /// start zeroed.
    pub fn new(rank: usize, message_size: usize, slots: usize) -> Result<Self> {
        if message_size == 0 {
            return Err(Error::Configuration(
                "message size must be at least 1 byte".into(),
            ));
        }
        let recv_len = slots.checked_mul(message_size).ok_or_else(|| {
            Error::Configuration(format!(
                "{slots} receive slots of {message_size} bytes overflow the address space"
            ))
        })?;
        Ok(Workspace {
            message_size,
            send: vec![fill_byte(rank); message_size],
            recv: vec![0; recv_len],
            slots,
        })
    }

    /// Allocate exactly the slots `pattern` needs for `rank`.
    ///
    /// A workspace built this way always satisfies
    /// [`ExchangeEngine::run`](crate::engine::ExchangeEngine::run) for the
    /// same pattern and group, so no participant can fail its slot check
    /// while the others enter the exchange.
    pub fn for_pattern(
        pattern: TrafficPattern,
        rank: usize,
        size: usize,
        message_size: usize,
    ) -> Result<Self> {
        let slots = pattern.receive_count(rank, size)?;
        Workspace::new(rank, message_size, slots)
    }

    /// Bytes per message.
    pub fn message_size(&self) -> usize {
        self.message_size
    }

    /// Number of receive slots.
    pub fn slot_count(&self) -> usize {
        self.slots
    }

    /// The shared send buffer.
    pub fn send_buffer(&self) -> &[u8] {
        &self.send
    }

    /// Contents of receive slot `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= slot_count()`.
    pub fn slot(&self, index: usize) -> &[u8] {
        assert!(index < self.slots, "slot {index} out of {}", self.slots);
        let start = index * self.message_size;
        &self.recv[start..start + self.message_size]
    }

    /// Borrow the send buffer and every receive slot at once.
    ///
    /// The send buffer is shared, each slot is exclusive, which is what a
    /// round of outstanding sends and receives needs.
    pub fn split_mut(&mut self) -> (&[u8], ChunksExactMut<'_, u8>) {
        (&self.send, self.recv.chunks_exact_mut(self.message_size))
    }

    /// Check that each receive slot holds the fill pattern of the peer it
    /// was posted for.
    ///
    /// `pattern`, `rank` and `size` must be the ones the workspace was
    /// exchanged under.
    pub fn verify(&self, pattern: TrafficPattern, rank: usize, size: usize) -> Result<()> {
        let sources = pattern
            .obligations(rank, size)?
            .into_iter()
            .filter(|o| o.op == Op::Receive)
            .map(|o| o.peer);
        for (index, source) in sources.enumerate() {
            let expected = fill_byte(source);
            if let Some(offset) = self.slot(index).iter().position(|&b| b != expected) {
                return Err(Error::Transport(format!(
                    "payload from rank {source} corrupted at byte {offset}: \
                     expected {expected:#04x}, found {:#04x}",
                    self.slot(index)[offset]
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_byte_cycles_through_seven_values() {
        assert_eq!(fill_byte(0), 1);
        assert_eq!(fill_byte(6), 7);
        assert_eq!(fill_byte(7), 1);
        assert_eq!(fill_byte(13), 7);
    }

    #[test]
    fn allocation_sizes() {
        let ws = Workspace::new(3, 256, 5).unwrap();
        assert_eq!(ws.message_size(), 256);
        assert_eq!(ws.slot_count(), 5);
        assert_eq!(ws.send_buffer().len(), 256);
        assert!(ws.send_buffer().iter().all(|&b| b == 4));
        assert!((0..5).all(|i| ws.slot(i).iter().all(|&b| b == 0)));
    }

    #[test]
    fn for_pattern_sizes_slots() {
        let ws = Workspace::for_pattern(TrafficPattern::AllToAll, 0, 6, 8).unwrap();
        assert_eq!(ws.slot_count(), 5);
        let ws = Workspace::for_pattern(TrafficPattern::PairedHalves, 0, 6, 8).unwrap();
        assert_eq!(ws.slot_count(), 1);
    }

    #[test]
    fn for_pattern_fits_every_rank() {
        for pattern in [TrafficPattern::AllToAll, TrafficPattern::PairedHalves] {
            for size in pattern.min_participants()..=9 {
                for rank in 0..size {
                    let ws = Workspace::for_pattern(pattern, rank, size, 4).unwrap();
                    let receives = pattern
                        .obligations(rank, size)
                        .unwrap()
                        .iter()
                        .filter(|o| o.op == Op::Receive)
                        .count();
                    assert_eq!(ws.slot_count(), receives, "{pattern:?} rank {rank} of {size}");
                }
            }
        }
    }

    #[test]
    fn zero_message_size_is_rejected() {
        assert!(matches!(
            Workspace::new(0, 0, 3),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn slots_are_disjoint() {
        let mut ws = Workspace::new(0, 4, 3).unwrap();
        {
            let (_, slots) = ws.split_mut();
            for (i, slot) in slots.enumerate() {
                slot.fill(i as u8 + 10);
            }
        }
        assert_eq!(ws.slot(0), &[10; 4]);
        assert_eq!(ws.slot(1), &[11; 4]);
        assert_eq!(ws.slot(2), &[12; 4]);
    }

    #[test]
    fn verify_detects_matching_and_corrupted_payloads() {
        // Rank 1 of 3 receives from 0 then 2.
        let mut ws = Workspace::for_pattern(TrafficPattern::AllToAll, 1, 3, 16).unwrap();
        {
            let (_, mut slots) = ws.split_mut();
            slots.next().unwrap().fill(fill_byte(0));
            slots.next().unwrap().fill(fill_byte(2));
        }
        assert!(ws.verify(TrafficPattern::AllToAll, 1, 3).is_ok());

        {
            let (_, mut slots) = ws.split_mut();
            slots.nth(1).unwrap()[5] = 0xff;
        }
        let err = ws.verify(TrafficPattern::AllToAll, 1, 3).unwrap_err();
        assert!(format!("{err}").contains("rank 2"), "got: {err}");
    }
}
