//! Integration test for the byte exchange the benchmark is built on.
//!
//! Exercises isend/irecv through the `Transport` trait, wait_all over mixed
//! batches, and a full `ExchangeEngine` run of both traffic patterns with
//! payload validation. Each step is verified with assertions.
//!
//! Run with: mpiexec -n 4 ./target/debug/examples/test_exchange

use inbibw::mpi::Mpi;
use inbibw::workspace::fill_byte;
use inbibw::{ExchangeEngine, Transport, TrafficPattern, Workspace};

fn main() {
    let mpi = Mpi::init().expect("MPI init failed");
    let world = mpi.world();
    let rank = world.rank();
    let size = world.size();

    assert!(
        size >= 2,
        "test_exchange requires at least 2 processes, got {size}"
    );

    // ========================================================================
    // Test 1: ring exchange with wait_all
    // ========================================================================
    {
        let next = (rank + 1) % size;
        let prev = (rank + size - 1) % size;
        let send = vec![fill_byte(rank); 64];
        let mut recv = vec![0u8; 64];

        let recv_req = world.irecv(&mut recv, prev, 7).expect("irecv failed");
        let send_req = world.isend(&send, next, 7).expect("isend failed");
        world
            .wait_all(vec![send_req, recv_req])
            .expect("wait_all failed");

        assert!(
            recv.iter().all(|&b| b == fill_byte(prev)),
            "rank {rank}: ring payload from {prev} corrupted"
        );
        if rank == 0 {
            println!("PASS: ring exchange");
        }
    }

    world.barrier().expect("barrier 1 failed");

    // ========================================================================
    // Test 2: large message, several outstanding requests per peer
    // ========================================================================
    {
        const LEN: usize = 1 << 20;
        let peer = rank ^ 1;
        if peer < size {
            let send = vec![fill_byte(rank); LEN];
            let mut first = vec![0u8; LEN];
            let mut second = vec![0u8; LEN];
            let requests = vec![
                world.irecv(&mut first, peer, 11).expect("irecv 1 failed"),
                world.irecv(&mut second, peer, 12).expect("irecv 2 failed"),
                world.isend(&send, peer, 12).expect("isend 2 failed"),
                world.isend(&send, peer, 11).expect("isend 1 failed"),
            ];
            world.wait_all(requests).expect("wait_all failed");
            assert!(first.iter().chain(&second).all(|&b| b == fill_byte(peer)));
        }
        if rank == 0 {
            println!("PASS: multiple outstanding requests");
        }
    }

    world.barrier().expect("barrier 2 failed");

    // ========================================================================
    // Test 3: engine runs of both patterns
    // ========================================================================
    for (pattern, tag) in [(TrafficPattern::AllToAll, 100), (TrafficPattern::PairedHalves, 200)] {
        let mut workspace =
            Workspace::for_pattern(pattern, rank, size, 4096).expect("workspace failed");
        let elapsed = ExchangeEngine::new(&world, tag)
            .run(pattern, &mut workspace, 10)
            .expect("engine run failed");
        assert!(elapsed >= 0.0, "rank {rank}: negative elapsed time");
        workspace
            .verify(pattern, rank, size)
            .expect("payload validation failed");
        if rank == 0 {
            println!("PASS: {pattern:?} engine run ({elapsed:.6} s)");
        }
    }

    world.barrier().expect("final barrier failed");
    if rank == 0 {
        println!("\n========================================");
        println!("All exchange tests passed! ({size} processes)");
        println!("========================================");
    }
}
