//! Integration test for the bandwidth reductions.
//!
//! Checks the raw sum-reduction to a root and the contribution encoding the
//! aggregator puts on top of it: abstaining participants add nothing and one
//! undefined rate makes the whole sum undefined.
//!
//! Run with: mpiexec -n 4 ./target/debug/examples/test_reduce

use inbibw::aggregate::reduce;
use inbibw::mpi::Mpi;
use inbibw::{Bandwidth, Contribution, Transport};

fn main() {
    let mpi = Mpi::init().expect("MPI init failed");
    let world = mpi.world();
    let rank = world.rank();
    let size = world.size();
    let n = size as f64;

    // ========================================================================
    // Test 1: element-wise sum at every root
    // ========================================================================
    for root in 0..size {
        let result = world
            .reduce_sum(&[rank as f64, 1.0], root)
            .expect("reduce_sum failed");
        if rank == root {
            let sums = result.expect("root must receive the sums");
            assert_eq!(sums, vec![n * (n - 1.0) / 2.0, n]);
        } else {
            assert!(result.is_none(), "rank {rank}: non-root got a result");
        }
    }
    if rank == 0 {
        println!("PASS: reduce_sum to every root");
    }

    // ========================================================================
    // Test 2: measured contributions with abstainers
    // ========================================================================
    let contribution = if rank % 2 == 0 {
        Contribution::Contributes(Bandwidth::Measured(1.5))
    } else {
        Contribution::Abstains
    };
    let total = reduce(&world, contribution, 0).expect("reduce failed");
    if rank == 0 {
        let expected = 1.5 * size.div_ceil(2) as f64;
        assert_eq!(total, Some(Bandwidth::Measured(expected)));
        println!("PASS: abstaining participants");
    }

    // ========================================================================
    // Test 3: one undefined rate poisons the sum
    // ========================================================================
    let contribution = if rank == size - 1 {
        Contribution::Contributes(Bandwidth::Undefined)
    } else {
        Contribution::Contributes(Bandwidth::Measured(2.0))
    };
    let total = reduce(&world, contribution, 0).expect("reduce failed");
    if rank == 0 {
        assert_eq!(total, Some(Bandwidth::Undefined));
        println!("PASS: undefined contribution");
    }

    world.barrier().expect("final barrier failed");
    if rank == 0 {
        println!("All reduce tests passed! ({size} processes)");
    }
}
