//! In-process transport: one thread per participant.
//!
//! A [`LocalCluster`] stands up a group of participants inside the current
//! process and lays them out over emulated nodes, `ranks_per_node` ranks at
//! a time in rank order (the block placement `mpiexec -ppn` uses). Each
//! participant owns an unbounded mailbox; sends are eager copies into the
//! peer's mailbox and receives match on `(source, tag)` in arrival order,
//! stashing anything that arrives early.
//!
//! Node-local sub-groups are created on demand: the `k`-th call to
//! [`split_shared`](Transport::split_shared) by the members of one node
//! builds a fresh set of mailboxes, so every split is a communicator of its
//! own, as with `MPI_Comm_split_type`.
//!
//! Every blocking wait is bounded by a timeout so that a broken exchange
//! surfaces as [`Error::Transport`] instead of hanging the process.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error};

use crate::error::{Error, Result};
use crate::transport::Transport;

/// Upper bound on any single blocking wait.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

// Internal tags live below zero, out of reach of user traffic.
const BARRIER_TAG: i32 = -1;
const RELEASE_TAG: i32 = -2;
const REDUCE_TAG: i32 = -3;

struct Envelope {
    source: usize,
    tag: i32,
    payload: Vec<u8>,
}

struct Group {
    senders: Vec<Sender<Envelope>>,
    /// Emulated node of each member
    nodes: Vec<usize>,
    epoch: Instant,
    timeout: Duration,
    /// Splits some members of a node have joined and others not yet,
    /// keyed by `(node, split sequence number)`
    splits: Mutex<HashMap<(usize, usize), PendingSplit>>,
}

impl Group {
    /// A group over `nodes.len()` members, with the mailboxes of each.
    fn create(
        nodes: Vec<usize>,
        epoch: Instant,
        timeout: Duration,
    ) -> (Arc<Group>, Vec<Receiver<Envelope>>) {
        let (senders, inboxes): (Vec<_>, Vec<_>) = nodes.iter().map(|_| unbounded()).unzip();
        let group = Arc::new(Group {
            senders,
            nodes,
            epoch,
            timeout,
            splits: Mutex::default(),
        });
        (group, inboxes)
    }
}

/// A node-local group waiting for its members to pick up their mailboxes.
struct PendingSplit {
    group: Arc<Group>,
    inboxes: Vec<Option<Receiver<Envelope>>>,
    remaining: usize,
}

struct Membership {
    group: Arc<Group>,
    rank: usize,
    inbox: Receiver<Envelope>,
}

/// Shape of an in-process group.
#[derive(Debug, Clone)]
pub struct LocalCluster {
    size: usize,
    ranks_per_node: usize,
    timeout: Duration,
}

impl LocalCluster {
    /// A group of `size` participants, `ranks_per_node` per emulated node.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] if either count is zero.
    pub fn new(size: usize, ranks_per_node: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::Configuration(
                "a local group needs at least one participant".into(),
            ));
        }
        if ranks_per_node == 0 {
            return Err(Error::Configuration(
                "ranks per node must be at least 1".into(),
            ));
        }
        Ok(LocalCluster {
            size,
            ranks_per_node,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Replace the bound on blocking waits.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Number of participants.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of emulated nodes.
    pub fn node_count(&self) -> usize {
        self.size.div_ceil(self.ranks_per_node)
    }

    /// Build one communicator per participant, in rank order.
    pub fn communicators(&self) -> Vec<LocalComm> {
        let nodes = (0..self.size).map(|rank| rank / self.ranks_per_node).collect();
        let (world, inboxes) = Group::create(nodes, Instant::now(), self.timeout);
        inboxes
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| {
                LocalComm::new(Membership {
                    group: Arc::clone(&world),
                    rank,
                    inbox,
                })
            })
            .collect()
    }

    /// Run `body` on every participant concurrently, one thread each.
    ///
    /// Returns the per-rank results in rank order, or the lowest-ranked
    /// error.
    pub fn run<T, F>(&self, body: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(LocalComm) -> Result<T> + Sync,
    {
        let comms = self.communicators();
        debug!(
            "Starting {} local participants on {} nodes",
            self.size,
            self.node_count()
        );
        thread::scope(|scope| {
            let body = &body;
            let handles = comms
                .into_iter()
                .map(|comm| {
                    thread::Builder::new()
                        .name(format!("rank-{}", comm.rank()))
                        .spawn_scoped(scope, move || body(comm))
                        .map_err(|e| Error::Transport(format!("failed to spawn participant: {e}")))
                })
                .collect::<Result<Vec<_>>>()?;

            handles
                .into_iter()
                .enumerate()
                .map(|(rank, handle)| {
                    handle
                        .join()
                        .map_err(|_| Error::Transport(format!("participant {rank} panicked")))?
                })
                .collect()
        })
    }
}

/// Communicator of one in-process participant.
pub struct LocalComm {
    member: Membership,
    /// Number of `split_shared` calls made on this communicator
    splits: Cell<usize>,
    pending: RefCell<VecDeque<Envelope>>,
}

/// In-flight operation on a [`LocalComm`].
pub struct LocalRequest<'a>(Pending<'a>);

enum Pending<'a> {
    Sent,
    Recv {
        buf: &'a mut [u8],
        source: usize,
        tag: i32,
    },
}

impl LocalComm {
    fn new(member: Membership) -> Self {
        LocalComm {
            member,
            splits: Cell::new(0),
            pending: RefCell::default(),
        }
    }

    /// Index of the emulated node this participant lives on.
    pub fn node_index(&self) -> usize {
        self.member.group.nodes[self.member.rank]
    }

    /// Join the `sequence`-th node-local group of this communicator,
    /// creating it if this participant is the first of its node to ask.
    fn join_split(&self, sequence: usize) -> Result<Membership> {
        let parent = &self.member.group;
        let node = self.node_index();
        let peers: Vec<usize> = (0..parent.nodes.len())
            .filter(|&rank| parent.nodes[rank] == node)
            .collect();
        let local_rank = peers
            .iter()
            .position(|&rank| rank == self.member.rank)
            .ok_or(Error::InvalidRank(self.member.rank))?;

        let mut splits = parent
            .splits
            .lock()
            .map_err(|_| Error::Transport("split registry poisoned".into()))?;
        let pending = splits.entry((node, sequence)).or_insert_with(|| {
            let (group, inboxes) =
                Group::create(vec![node; peers.len()], parent.epoch, parent.timeout);
            PendingSplit {
                group,
                inboxes: inboxes.into_iter().map(Some).collect(),
                remaining: peers.len(),
            }
        });
        let inbox = pending.inboxes[local_rank].take().ok_or_else(|| {
            Error::Transport(format!(
                "rank {} joined node split {sequence} twice",
                self.member.rank
            ))
        })?;
        let group = Arc::clone(&pending.group);
        pending.remaining -= 1;
        if pending.remaining == 0 {
            splits.remove(&(node, sequence));
        }

        Ok(Membership {
            group,
            rank: local_rank,
            inbox,
        })
    }

    fn post(&self, dest: usize, tag: i32, payload: Vec<u8>) -> Result<()> {
        let sender = self
            .member
            .group
            .senders
            .get(dest)
            .ok_or(Error::InvalidRank(dest))?;
        sender
            .send(Envelope {
                source: self.member.rank,
                tag,
                payload,
            })
            .map_err(|_| Error::Transport(format!("rank {dest} has left the group")))
    }

    /// Take the oldest message from `source` with `tag`, waiting for it if
    /// it has not arrived yet.
    fn take(&self, source: usize, tag: i32) -> Result<Vec<u8>> {
        let mut pending = self.pending.borrow_mut();
        if let Some(position) = pending
            .iter()
            .position(|e| e.source == source && e.tag == tag)
        {
            if let Some(envelope) = pending.remove(position) {
                return Ok(envelope.payload);
            }
        }

        let timeout = self.member.group.timeout;
        loop {
            match self.member.inbox.recv_timeout(timeout) {
                Ok(envelope) if envelope.source == source && envelope.tag == tag => {
                    return Ok(envelope.payload);
                }
                Ok(envelope) => pending.push_back(envelope),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(Error::Transport(format!(
                        "rank {} waited {timeout:?} for a message from rank {source} (tag {tag})",
                        self.member.rank
                    )));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(Error::Transport(format!(
                        "mailbox of rank {} disconnected",
                        self.member.rank
                    )));
                }
            }
        }
    }
}

fn encode(values: &[f64]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode(bytes: &[u8]) -> Vec<f64> {
    bytes
        .chunks_exact(8)
        .map(|chunk| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            f64::from_le_bytes(raw)
        })
        .collect()
}

impl Transport for LocalComm {
    type Request<'a> = LocalRequest<'a>;

    fn rank(&self) -> usize {
        self.member.rank
    }

    fn size(&self) -> usize {
        self.member.group.senders.len()
    }

    fn barrier(&self) -> Result<()> {
        let size = self.size();
        if self.rank() == 0 {
            for source in 1..size {
                self.take(source, BARRIER_TAG)?;
            }
            for dest in 1..size {
                self.post(dest, RELEASE_TAG, Vec::new())?;
            }
        } else {
            self.post(0, BARRIER_TAG, Vec::new())?;
            self.take(0, RELEASE_TAG)?;
        }
        Ok(())
    }

    fn isend<'a>(&'a self, buf: &'a [u8], dest: usize, tag: i32) -> Result<LocalRequest<'a>> {
        self.post(dest, tag, buf.to_vec())?;
        Ok(LocalRequest(Pending::Sent))
    }

    fn irecv<'a>(
        &'a self,
        buf: &'a mut [u8],
        source: usize,
        tag: i32,
    ) -> Result<LocalRequest<'a>> {
        if source >= self.size() {
            return Err(Error::InvalidRank(source));
        }
        Ok(LocalRequest(Pending::Recv { buf, source, tag }))
    }

    fn wait_all<'a>(&'a self, requests: Vec<LocalRequest<'a>>) -> Result<()> {
        for request in requests {
            if let Pending::Recv { buf, source, tag } = request.0 {
                let payload = self.take(source, tag)?;
                if payload.len() != buf.len() {
                    return Err(Error::Transport(format!(
                        "message from rank {source} has {} bytes, receive posted for {}",
                        payload.len(),
                        buf.len()
                    )));
                }
                buf.copy_from_slice(&payload);
            }
        }
        Ok(())
    }

    fn reduce_sum(&self, values: &[f64], root: usize) -> Result<Option<Vec<f64>>> {
        if root >= self.size() {
            return Err(Error::InvalidRank(root));
        }
        if self.rank() != root {
            self.post(root, REDUCE_TAG, encode(values))?;
            return Ok(None);
        }

        let mut sums = vec![0.0; values.len()];
        for source in 0..self.size() {
            let contribution = if source == root {
                values.to_vec()
            } else {
                decode(&self.take(source, REDUCE_TAG)?)
            };
            if contribution.len() != sums.len() {
                return Err(Error::Transport(format!(
                    "rank {source} reduced {} values, expected {}",
                    contribution.len(),
                    sums.len()
                )));
            }
            for (sum, value) in sums.iter_mut().zip(contribution) {
                *sum += value;
            }
        }
        Ok(Some(sums))
    }

    fn split_shared(&self) -> Result<Self> {
        let sequence = self.splits.get();
        self.splits.set(sequence + 1);
        Ok(LocalComm::new(self.join_split(sequence)?))
    }

    fn wtime(&self) -> f64 {
        self.member.group.epoch.elapsed().as_secs_f64()
    }

    fn processor_name(&self) -> Result<String> {
        Ok(format!("local-node{}", self.node_index()))
    }

    fn abort(&self, code: i32) -> ! {
        error!(
            "Rank {} aborting the local group with code {code}",
            self.member.rank
        );
        std::process::exit(code)
    }
}
