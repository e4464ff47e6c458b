//! The message-passing contract the benchmark runs on.
//!
//! Any transport that offers a fixed group of ranked participants,
//! non-blocking byte send/receive with explicit completion, a barrier, a
//! sum-reduction to one participant and node-local sub-groups can drive the
//! benchmark. Two implementations ship with the crate: the in-process
//! [`LocalComm`](crate::local::LocalComm) and, with the `mpi` feature, the
//! MPI [`Communicator`](crate::mpi::Communicator).

use crate::error::Result;

/// A group of participants that can exchange messages.
///
/// Requests returned by [`isend`](Transport::isend) and
/// [`irecv`](Transport::irecv) borrow their buffer until they are handed to
/// [`wait_all`](Transport::wait_all), so a buffer cannot be touched while an
/// operation on it is in flight.
pub trait Transport {
    /// Handle to one in-flight send or receive.
    type Request<'a>
    where
        Self: 'a;

    /// Identity of the calling participant, in `[0, size)`.
    fn rank(&self) -> usize;

    /// Number of participants in the group.
    fn size(&self) -> usize;

    /// Block until every participant of the group has entered the barrier.
    fn barrier(&self) -> Result<()>;

    /// Start sending `buf` to `dest`.
    fn isend<'a>(&'a self, buf: &'a [u8], dest: usize, tag: i32) -> Result<Self::Request<'a>>;

    /// Start receiving exactly `buf.len()` bytes from `source` into `buf`.
    fn irecv<'a>(&'a self, buf: &'a mut [u8], source: usize, tag: i32)
        -> Result<Self::Request<'a>>;

    /// Block until every request has completed.
    fn wait_all<'a>(&'a self, requests: Vec<Self::Request<'a>>) -> Result<()>;

    /// Element-wise sum of `values` over the group, delivered to `root`.
    ///
    /// Every participant must call this with the same length and root.
    /// Returns `Some(sums)` at the root and `None` elsewhere.
    fn reduce_sum(&self, values: &[f64], root: usize) -> Result<Option<Vec<f64>>>;

    /// Sub-group of the participants sharing this participant's node.
    ///
    /// Collective over the whole group. Node-local identities follow the
    /// order of the global ones.
    fn split_shared(&self) -> Result<Self>
    where
        Self: Sized;

    /// Wall-clock time in seconds from an arbitrary fixed origin.
    fn wtime(&self) -> f64;

    /// Name of the node this participant runs on.
    fn processor_name(&self) -> Result<String>;

    /// Terminate every participant of the job with `code`.
    fn abort(&self, code: i32) -> !;
}
