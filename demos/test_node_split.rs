//! Integration test for node-local communicators.
//!
//! Splits MPI_COMM_WORLD by shared memory, checks the node-local ranks, and
//! counts nodes the way the benchmark does before reporting.
//!
//! Run with: mpiexec -n 4 ./target/debug/examples/test_node_split

use inbibw::mpi::Mpi;
use inbibw::{Topology, Transport};

fn main() {
    let mpi = Mpi::init().expect("MPI init failed");
    let world = mpi.world();
    let rank = world.rank();
    let size = world.size();

    let node = world.split_shared().expect("split_shared failed");
    assert!(node.size() >= 1 && node.size() <= size);
    assert!(node.rank() < node.size());

    let name = node.processor_name().expect("processor_name failed");
    assert!(!name.is_empty(), "rank {rank}: empty processor name");
    println!("Rank {rank}: node {name}, local rank {} of {}", node.rank(), node.size());

    // Node-local participants add up to the world size.
    let sums = node
        .reduce_sum(&[1.0], 0)
        .expect("node reduce failed");
    if node.rank() == 0 {
        let sums = sums.expect("node leader must receive the sum");
        assert_eq!(sums[0] as usize, node.size());
    } else {
        assert!(sums.is_none());
    }

    let topology = Topology::discover(&world, &node).expect("topology discovery failed");
    assert_eq!(topology.rank, rank);
    assert_eq!(topology.local_size, node.size());
    if rank == 0 {
        let nodes = topology.nodes.expect("coordinator must know the node count");
        assert!(nodes >= 1 && nodes <= size);
        println!("PASS: {size} processes on {nodes} node(s)");
    } else {
        assert!(topology.nodes.is_none());
    }

    drop(node);
    world.barrier().expect("final barrier failed");
    if rank == 0 {
        println!("All node split tests passed!");
    }
}
