//! Raw FFI bindings to the C shim in `csrc/inbibw.c`.
//!
//! These are low-level unsafe functions. Use the safe wrappers in the parent module.

#![allow(non_camel_case_types)]

use std::os::raw::{c_char, c_double, c_int, c_void};

// Type aliases matching the C header
pub type int32_t = i32;
pub type int64_t = i64;

extern "C" {
    // ============================================================
    // Initialization and Finalization
    // ============================================================

    pub fn inbibw_init() -> c_int;
    pub fn inbibw_finalize() -> c_int;

    // ============================================================
    // Communicator Operations
    // ============================================================

    pub fn inbibw_comm_world() -> int32_t;
    pub fn inbibw_comm_rank(comm: int32_t, rank: *mut int32_t) -> c_int;
    pub fn inbibw_comm_size(comm: int32_t, size: *mut int32_t) -> c_int;
    pub fn inbibw_comm_split_shared(comm: int32_t, key: int32_t, newcomm: *mut int32_t)
        -> c_int;
    pub fn inbibw_comm_free(comm: int32_t) -> c_int;

    // ============================================================
    // Synchronization
    // ============================================================

    pub fn inbibw_barrier(comm: int32_t) -> c_int;

    // ============================================================
    // Nonblocking Byte Point-to-Point
    // ============================================================

    pub fn inbibw_isend_bytes(
        buf: *const c_void,
        count: int64_t,
        dest: int32_t,
        tag: int32_t,
        comm: int32_t,
        request: *mut int64_t,
    ) -> c_int;

    pub fn inbibw_irecv_bytes(
        buf: *mut c_void,
        count: int64_t,
        source: int32_t,
        tag: int32_t,
        comm: int32_t,
        request: *mut int64_t,
    ) -> c_int;

    // ============================================================
    // Reduction
    // ============================================================

    pub fn inbibw_reduce_sum_f64(
        sendbuf: *const c_double,
        recvbuf: *mut c_double,
        count: int64_t,
        root: int32_t,
        comm: int32_t,
    ) -> c_int;

    // ============================================================
    // Request Management
    // ============================================================

    pub fn inbibw_wait(request: int64_t) -> c_int;
    pub fn inbibw_waitall(count: int64_t, requests: *mut int64_t) -> c_int;

    // ============================================================
    // Utility Functions
    // ============================================================

    pub fn inbibw_get_version(version: *mut c_char, len: *mut int32_t) -> c_int;
    pub fn inbibw_get_processor_name(name: *mut c_char, len: *mut int32_t) -> c_int;
    pub fn inbibw_wtime() -> c_double;
    pub fn inbibw_abort(comm: int32_t, errorcode: int32_t) -> c_int;
}
