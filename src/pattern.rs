//! Traffic patterns: who exchanges with whom in one iteration.
//!
//! A [`TrafficPattern`] turns a participant identity and the group size into
//! an ordered list of [`Obligation`]s. The order is part of the contract:
//! every `Receive` comes before any `Send`, and within each kind peers are
//! ascending. The exchange engine posts obligations in exactly this order,
//! which keeps a fully connected non-blocking exchange from deadlocking.

use crate::error::{Error, Result};

/// Direction of one obligation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// Post a receive from the peer
    Receive,
    /// Post a send to the peer
    Send,
}

/// One directed action a participant performs per iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Obligation {
    /// Global identity of the peer
    pub peer: usize,
    /// Send or receive
    pub op: Op,
}

impl Obligation {
    fn receive(peer: usize) -> Self {
        Obligation {
            peer,
            op: Op::Receive,
        }
    }

    fn send(peer: usize) -> Self {
        Obligation { peer, op: Op::Send }
    }
}

/// Partner of `rank` in a bisection of `size` participants.
///
/// Ranks below `size / 2` pair with `rank + size / 2`, the rest with
/// `rank - size / 2`. For odd `size` the last rank maps onto a participant
/// that is already paired (`partner(4, 5) == 2`), see
/// [`TrafficPattern::is_paired`].
///
/// # Errors
///
/// [`Error::InsufficientParticipants`] if `size < 2`, [`Error::InvalidRank`]
/// if `rank >= size`.
pub fn partner(rank: usize, size: usize) -> Result<usize> {
    TrafficPattern::PairedHalves.check_participants(size)?;
    if rank >= size {
        return Err(Error::InvalidRank(rank));
    }
    let half = size / 2;
    Ok(if rank < half { rank + half } else { rank - half })
}

/// The two traffic patterns measured by the benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrafficPattern {
    /// Injection: everyone exchanges with everyone else
    AllToAll,
    /// Bisection: each participant exchanges with one partner in the other half
    PairedHalves,
}

impl TrafficPattern {
    /// Smallest group this pattern can run on.
    pub fn min_participants(self) -> usize {
        match self {
            TrafficPattern::AllToAll => 1,
            TrafficPattern::PairedHalves => 2,
        }
    }

    /// Check that `size` participants are enough for this pattern.
    ///
    /// # Errors
    ///
    /// [`Error::InsufficientParticipants`] when the group is too small.
    pub fn check_participants(self, size: usize) -> Result<()> {
        let required = self.min_participants();
        if size < required {
            return Err(Error::InsufficientParticipants {
                required,
                available: size,
            });
        }
        Ok(())
    }

    /// Whether `rank` takes part in the exchange.
    ///
    /// Always true for [`TrafficPattern::AllToAll`]. For
    /// [`TrafficPattern::PairedHalves`] a participant is paired only if its
    /// partner pairs back, which fails for the last rank of an odd group.
    pub fn is_paired(self, rank: usize, size: usize) -> bool {
        match self {
            TrafficPattern::AllToAll => rank < size,
            TrafficPattern::PairedHalves => {
                let back = partner(rank, size).and_then(|peer| partner(peer, size));
                matches!(back, Ok(back) if back == rank)
            }
        }
    }

    /// Ordered obligations of `rank` for one iteration.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRank`] if `rank >= size`, and
    /// [`Error::InsufficientParticipants`] for a bisection of fewer than two.
    pub fn obligations(self, rank: usize, size: usize) -> Result<Vec<Obligation>> {
        if rank >= size {
            return Err(Error::InvalidRank(rank));
        }
        self.check_participants(size)?;

        match self {
            TrafficPattern::AllToAll => {
                let peers = || (0..size).filter(move |&peer| peer != rank);
                Ok(peers()
                    .map(Obligation::receive)
                    .chain(peers().map(Obligation::send))
                    .collect())
            }
            TrafficPattern::PairedHalves => {
                if !self.is_paired(rank, size) {
                    return Ok(Vec::new());
                }
                let peer = partner(rank, size)?;
                Ok(vec![Obligation::receive(peer), Obligation::send(peer)])
            }
        }
    }

    /// Number of receives `rank` posts per iteration, i.e. the number of
    /// receive slots its workspace needs.
    pub fn receive_count(self, rank: usize, size: usize) -> Result<usize> {
        Ok(self
            .obligations(rank, size)?
            .iter()
            .filter(|o| o.op == Op::Receive)
            .count())
    }
}
