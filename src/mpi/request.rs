//! Request handles for nonblocking MPI operations.

use std::marker::PhantomData;

use super::ffi;
use crate::error::{Error, Result};

/// A handle to an in-flight MPI send or receive.
///
/// The lifetime ties the request to the buffer it reads from or writes into:
/// the buffer stays borrowed until the request is waited on (or dropped,
/// which waits).
pub struct Request<'a> {
    handle: i64,
    completed: bool,
    _buffer: PhantomData<&'a mut [u8]>,
}

impl<'a> Request<'a> {
    pub(crate) fn new(handle: i64) -> Self {
        Request {
            handle,
            completed: false,
            _buffer: PhantomData,
        }
    }

    /// Block until every request of the batch has completed.
    pub fn wait_all(mut requests: Vec<Request<'a>>) -> Result<()> {
        if requests.is_empty() {
            return Ok(());
        }

        let mut handles: Vec<i64> = requests.iter().map(|r| r.handle).collect();
        // The shim releases every handle of the batch, failed or not.
        for request in &mut requests {
            request.completed = true;
        }
        let ret = unsafe { ffi::inbibw_waitall(handles.len() as i64, handles.as_mut_ptr()) };
        Error::check(ret)
    }
}

impl Drop for Request<'_> {
    fn drop(&mut self) {
        if !self.completed {
            // The borrowed buffer is released with the request, so the
            // operation has to finish first.
            unsafe { ffi::inbibw_wait(self.handle) };
        }
    }
}
