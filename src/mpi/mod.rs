//! MPI transport.
//!
//! Wraps the handful of MPI calls the benchmark needs through the C shim in
//! `csrc/inbibw.c`. Only built with the `mpi` feature; the build script then
//! locates the MPI installation and links against it.
//!
//! ```no_run
//! use inbibw::mpi::Mpi;
//! use inbibw::Transport;
//!
//! fn main() -> inbibw::Result<()> {
//!     let mpi = Mpi::init()?;
//!     let world = mpi.world();
//!     println!("rank {} of {}", world.rank(), world.size());
//!     Ok(())
//! }
//! ```

mod comm;
mod ffi;
mod request;

pub use comm::Communicator;
pub use request::Request;

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Error, Result};

/// Global flag tracking whether MPI has been initialized
static MPI_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// MPI environment handle.
///
/// At most one exists per process. Dropping it finalizes MPI, so every
/// [`Communicator`] must be dropped first.
pub struct Mpi {
    /// MPI must be finalized by the thread that initialized it
    _marker: PhantomData<*const ()>,
}

impl Mpi {
    /// Initialize MPI with single-threaded support.
    pub fn init() -> Result<Self> {
        if MPI_INITIALIZED.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyInitialized);
        }

        let ret = unsafe { ffi::inbibw_init() };
        if ret != 0 {
            MPI_INITIALIZED.store(false, Ordering::SeqCst);
            return Err(Error::from_code(ret));
        }

        Ok(Mpi {
            _marker: PhantomData,
        })
    }

    /// Handle to `MPI_COMM_WORLD`.
    pub fn world(&self) -> Communicator {
        Communicator::world()
    }

    /// MPI library version string.
    pub fn version() -> Result<String> {
        let mut buf = [0u8; 256];
        let mut len = buf.len() as i32;
        let ret = unsafe { ffi::inbibw_get_version(buf.as_mut_ptr().cast(), &mut len) };
        Error::check(ret)?;
        Ok(text(&buf, len))
    }
}

impl Drop for Mpi {
    fn drop(&mut self) {
        if MPI_INITIALIZED.load(Ordering::SeqCst) {
            unsafe {
                ffi::inbibw_finalize();
            }
            MPI_INITIALIZED.store(false, Ordering::SeqCst);
        }
    }
}

/// String out of a C buffer filled up to `len` bytes.
fn text(buf: &[u8], len: i32) -> String {
    let len = (len.max(0) as usize).min(buf.len());
    String::from_utf8_lossy(&buf[..len]).trim_end().to_string()
}
