//! Safe wrappers for MPI communicator operations.

use std::marker::PhantomData;

use super::ffi;
use super::request::Request;
use super::text;
use crate::error::{Error, Result};
use crate::transport::Transport;

/// An MPI communicator.
///
/// Either `MPI_COMM_WORLD` or a node-local communicator obtained from
/// [`split_shared`](Transport::split_shared). Node-local communicators are
/// freed on drop.
///
/// ```no_run
/// use inbibw::mpi::Mpi;
/// use inbibw::Transport;
///
/// let mpi = Mpi::init().unwrap();
/// let world = mpi.world();
/// let node = world.split_shared().unwrap();
/// println!("rank {} is {} of {} on its node", world.rank(), node.rank(), node.size());
/// ```
pub struct Communicator {
    handle: i32,
    /// MPI communicators are not thread-safe at the default thread level
    _marker: PhantomData<*mut ()>,
}

impl Communicator {
    /// Handle to MPI_COMM_WORLD.
    pub(crate) fn world() -> Self {
        Communicator {
            handle: unsafe { ffi::inbibw_comm_world() },
            _marker: PhantomData,
        }
    }

    fn peer(&self, rank: usize) -> Result<i32> {
        if rank < self.size() {
            Ok(rank as i32)
        } else {
            Err(Error::InvalidRank(rank))
        }
    }
}

impl Transport for Communicator {
    type Request<'a> = Request<'a>;

    fn rank(&self) -> usize {
        let mut rank: i32 = 0;
        unsafe { ffi::inbibw_comm_rank(self.handle, &mut rank) };
        rank.max(0) as usize
    }

    fn size(&self) -> usize {
        let mut size: i32 = 0;
        unsafe { ffi::inbibw_comm_size(self.handle, &mut size) };
        size.max(0) as usize
    }

    fn barrier(&self) -> Result<()> {
        let ret = unsafe { ffi::inbibw_barrier(self.handle) };
        Error::check(ret)
    }

    fn isend<'a>(&'a self, buf: &'a [u8], dest: usize, tag: i32) -> Result<Request<'a>> {
        let dest = self.peer(dest)?;
        let mut handle: i64 = 0;
        let ret = unsafe {
            ffi::inbibw_isend_bytes(
                buf.as_ptr().cast(),
                buf.len() as i64,
                dest,
                tag,
                self.handle,
                &mut handle,
            )
        };
        Error::check(ret)?;
        Ok(Request::new(handle))
    }

    fn irecv<'a>(&'a self, buf: &'a mut [u8], source: usize, tag: i32) -> Result<Request<'a>> {
        let source = self.peer(source)?;
        let mut handle: i64 = 0;
        let ret = unsafe {
            ffi::inbibw_irecv_bytes(
                buf.as_mut_ptr().cast(),
                buf.len() as i64,
                source,
                tag,
                self.handle,
                &mut handle,
            )
        };
        Error::check(ret)?;
        Ok(Request::new(handle))
    }

    fn wait_all<'a>(&'a self, requests: Vec<Request<'a>>) -> Result<()> {
        Request::wait_all(requests)
    }

    fn reduce_sum(&self, values: &[f64], root: usize) -> Result<Option<Vec<f64>>> {
        let root_rank = self.peer(root)?;
        let mut sums = vec![0.0; values.len()];
        let ret = unsafe {
            ffi::inbibw_reduce_sum_f64(
                values.as_ptr(),
                sums.as_mut_ptr(),
                values.len() as i64,
                root_rank,
                self.handle,
            )
        };
        Error::check(ret)?;
        Ok((self.rank() == root).then_some(sums))
    }

    fn split_shared(&self) -> Result<Self> {
        let mut new_handle: i32 = 0;
        let key = self.rank() as i32;
        let ret = unsafe { ffi::inbibw_comm_split_shared(self.handle, key, &mut new_handle) };
        Error::check(ret)?;
        Ok(Communicator {
            handle: new_handle,
            _marker: PhantomData,
        })
    }

    fn wtime(&self) -> f64 {
        unsafe { ffi::inbibw_wtime() }
    }

    fn processor_name(&self) -> Result<String> {
        let mut buf = [0u8; 256];
        let mut len = buf.len() as i32;
        let ret = unsafe { ffi::inbibw_get_processor_name(buf.as_mut_ptr().cast(), &mut len) };
        Error::check(ret)?;
        Ok(text(&buf, len))
    }

    fn abort(&self, code: i32) -> ! {
        unsafe { ffi::inbibw_abort(self.handle, code) };
        // MPI_Abort does not return on any implementation we run on
        std::process::exit(code)
    }
}

impl Drop for Communicator {
    fn drop(&mut self) {
        let world = unsafe { ffi::inbibw_comm_world() };
        if self.handle != world {
            unsafe { ffi::inbibw_comm_free(self.handle) };
        }
    }
}
