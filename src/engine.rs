//! Timed execution of a traffic pattern.
//!
//! Each iteration posts every receive of the pattern into its own workspace
//! slot, then every send from the shared send buffer, then waits for the
//! sends and the receives to complete. Nothing outstanding crosses an
//! iteration boundary, since the next iteration reuses the same buffers.
//!
//! Posting all receives before the first send means every participant has a
//! matching receive ready before any peer's message arrives. In an all-to-all
//! exchange where everybody sends at once this is what keeps the mesh from
//! deadlocking.

use log::debug;

use crate::error::{Error, Result};
use crate::pattern::{Op, TrafficPattern};
use crate::transport::Transport;
use crate::workspace::Workspace;

/// Runs a traffic pattern over a transport and times it.
pub struct ExchangeEngine<'t, T: Transport> {
    transport: &'t T,
    tag: i32,
}

impl<'t, T: Transport> ExchangeEngine<'t, T> {
    /// Engine over `transport`, tagging its messages with `tag`.
    pub fn new(transport: &'t T, tag: i32) -> Self {
        ExchangeEngine { transport, tag }
    }

    /// Execute `iterations` rounds of `pattern` and return the elapsed
    /// wall-clock seconds.
    ///
    /// The clock starts right after a barrier over the whole group and stops
    /// once the last round has completed. Obligations are generated before the
    /// barrier so the timed region holds nothing but communication. Zero
    /// iterations return `0.0` without touching the transport.
    ///
    /// The workspace check is local to the calling participant and fails
    /// before the barrier, so peers that passed it are left waiting there.
    /// Size workspaces with [`Workspace::for_pattern`], which always holds
    /// enough slots, or treat the error as fatal for the whole group.
    ///
    /// # Errors
    ///
    /// Pattern errors ([`Error::InsufficientParticipants`]), a workspace
    /// with too few receive slots, or any transport failure.
    pub fn run(
        &self,
        pattern: TrafficPattern,
        workspace: &mut Workspace,
        iterations: usize,
    ) -> Result<f64> {
        let rank = self.transport.rank();
        let size = self.transport.size();
        let obligations = pattern.obligations(rank, size)?;
        let receives = obligations.iter().filter(|o| o.op == Op::Receive).count();
        let sends = obligations.len() - receives;
        if receives > workspace.slot_count() {
            return Err(Error::Configuration(format!(
                "workspace holds {} receive slots, {pattern:?} needs {receives}",
                workspace.slot_count()
            )));
        }
        if iterations == 0 {
            return Ok(0.0);
        }

        debug!(
            "Rank {rank}: {pattern:?} x{iterations}, {receives} receives + {sends} sends of {} bytes per round",
            workspace.message_size()
        );

        self.transport.barrier()?;
        let start = self.transport.wtime();

        for _ in 0..iterations {
            let (send_buf, mut slots) = workspace.split_mut();
            let mut recv_requests = Vec::with_capacity(receives);
            let mut send_requests = Vec::with_capacity(sends);

            for obligation in obligations.iter().filter(|o| o.op == Op::Receive) {
                let slot = slots.next().ok_or_else(|| {
                    Error::Configuration("ran out of receive slots".into())
                })?;
                recv_requests.push(self.transport.irecv(slot, obligation.peer, self.tag)?);
            }
            for obligation in obligations.iter().filter(|o| o.op == Op::Send) {
                send_requests.push(self.transport.isend(send_buf, obligation.peer, self.tag)?);
            }

            self.transport.wait_all(send_requests)?;
            self.transport.wait_all(recv_requests)?;
        }

        let elapsed = self.transport.wtime() - start;
        debug!("Rank {rank}: {pattern:?} finished in {elapsed:.6} s");
        Ok(elapsed)
    }
}
