//! The benchmark driver: topology discovery, the requested tests in order,
//! and the aggregation of their figures.
//!
//! Every decision that changes which collectives are called (skipping a
//! test, the placeholder injection reduction) depends only on values all
//! participants share, so the group never disagrees about the sequence of
//! collective calls.

use log::{info, warn};

use crate::aggregate::{
    bytes_moved, local_bandwidth, reduce, Bandwidth, Contribution, Direction, GlobalFigures,
    MeasurementResult, NonBlockingRatio, Scope, COORDINATOR, NODE_LEADER,
};
use crate::config::{Config, Pattern};
use crate::engine::ExchangeEngine;
use crate::error::{Error, Result};
use crate::pattern::{partner, TrafficPattern};
use crate::report::Reporter;
use crate::transport::Transport;
use crate::workspace::Workspace;

/// Where this participant sits in the job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    /// Global identity
    pub rank: usize,
    /// Global group size
    pub size: usize,
    /// Identity within the node
    pub local_rank: usize,
    /// Participants on this node
    pub local_size: usize,
    /// Node count, known at the coordinator only
    pub nodes: Option<usize>,
    /// Name of this participant's node
    pub node_name: String,
}

impl Topology {
    /// Collective over `world`: gather identities and count nodes.
    pub fn discover<T: Transport>(world: &T, node: &T) -> Result<Self> {
        let leader = if node.rank() == NODE_LEADER { 1.0 } else { 0.0 };
        let nodes = world
            .reduce_sum(&[leader], COORDINATOR)?
            .and_then(|sums| sums.first().copied())
            .map(|count| count.round() as usize);
        Ok(Topology {
            rank: world.rank(),
            size: world.size(),
            local_rank: node.rank(),
            local_size: node.size(),
            nodes,
            node_name: node.processor_name()?,
        })
    }

    /// Whether this participant receives global aggregates.
    pub fn is_coordinator(&self) -> bool {
        self.rank == COORDINATOR
    }
}

/// Figures one participant holds after a completed test.
#[derive(Debug, Clone, PartialEq)]
pub struct TestResult {
    /// The test
    pub pattern: Pattern,
    /// Own figure; `None` for a participant without a partner
    pub local: Option<MeasurementResult>,
    /// Node aggregate, at node leaders only
    pub node: Option<MeasurementResult>,
    /// Global aggregate, at the coordinator only
    pub global: Option<GlobalFigures>,
}

/// What happened to one requested test.
#[derive(Debug)]
pub enum TestOutcome {
    /// The test ran
    Completed(TestResult),
    /// The test could not run; the reason is recoverable
    Skipped(Error),
}

impl TestOutcome {
    /// The result, if the test ran.
    pub fn result(&self) -> Option<&TestResult> {
        match self {
            TestOutcome::Completed(result) => Some(result),
            TestOutcome::Skipped(_) => None,
        }
    }
}

/// Everything one participant learned from a run.
#[derive(Debug)]
pub struct SuiteReport {
    /// Where the participant sits
    pub topology: Topology,
    /// Injection outcome, if requested
    pub injection: Option<TestOutcome>,
    /// Bisection outcome, if requested
    pub bisection: Option<TestOutcome>,
    /// Bisection relative to injection, at the coordinator when bisection ran
    pub ratio: Option<NonBlockingRatio>,
}

fn direction_of(pattern: Pattern) -> Direction {
    match pattern {
        Pattern::Injection => Direction::OneWay,
        Pattern::Bisection => Direction::Bidirectional,
    }
}

fn global_figures(pattern: Pattern, sum: Bandwidth) -> GlobalFigures {
    match pattern {
        Pattern::Injection => GlobalFigures::from_one_way(sum),
        Pattern::Bisection => GlobalFigures::from_bidirectional(sum),
    }
}

/// Run one test on every participant and aggregate its figures.
///
/// A test the group is too small for is skipped by everyone alike and
/// reported once by the coordinator.
pub fn run_test<T: Transport, R: Reporter + ?Sized>(
    world: &T,
    node: &T,
    topology: &Topology,
    config: &Config,
    pattern: Pattern,
    reporter: &mut R,
) -> Result<TestOutcome> {
    let traffic = pattern.traffic();
    let (rank, size) = (topology.rank, topology.size);

    if let Err(e) = traffic.check_participants(size) {
        if e.is_fatal() {
            return Err(e);
        }
        if topology.is_coordinator() {
            warn!("Skipping {pattern} test: {e}");
            reporter.skipped(pattern, &e);
        }
        return Ok(TestOutcome::Skipped(e));
    }

    let paired = traffic.is_paired(rank, size);
    if !paired {
        warn!("Rank {rank} has no partner among {size} participants and sits out the {pattern} test");
    }

    let mut workspace = Workspace::for_pattern(traffic, rank, size, config.message_size())?;
    let elapsed =
        ExchangeEngine::new(world, pattern.tag()).run(traffic, &mut workspace, config.iterations())?;
    if config.validate() {
        workspace.verify(traffic, rank, size)?;
    }

    let direction = direction_of(pattern);
    let (contribution, local) = if paired {
        let bytes = bytes_moved(
            traffic,
            size,
            config.message_size(),
            config.iterations(),
            direction,
        );
        let bandwidth = local_bandwidth(bytes, elapsed);
        if bandwidth == Bandwidth::Undefined {
            warn!("Rank {rank}: {pattern} finished in {elapsed:e} s, too fast to derive a rate");
        }
        let result = MeasurementResult::new(bandwidth, Scope::Local, direction);
        let peer = match traffic {
            TrafficPattern::PairedHalves => Some(partner(rank, size)?),
            TrafficPattern::AllToAll => None,
        };
        reporter.local(rank, pattern, peer, &result);
        (Contribution::Contributes(bandwidth), Some(result))
    } else {
        reporter.idle(rank, pattern);
        (Contribution::Abstains, None)
    };

    let node_result = reduce(node, contribution, NODE_LEADER)?
        .map(|sum| MeasurementResult::new(sum, Scope::Node, direction));
    if let Some(result) = &node_result {
        reporter.node(pattern, &topology.node_name, result);
    }

    let global = reduce(world, contribution, COORDINATOR)?.map(|sum| global_figures(pattern, sum));
    if let Some(figures) = &global {
        reporter.global(pattern, figures);
    }

    Ok(TestOutcome::Completed(TestResult {
        pattern,
        local,
        node: node_result,
        global,
    }))
}

/// Run every test `config` selects, injection first.
///
/// When bisection runs without injection, the group still performs an
/// injection reduction in which everyone abstains, so the coordinator holds
/// a (zero) injection figure to compare against.
pub fn run_suite<T: Transport, R: Reporter + ?Sized>(
    world: &T,
    node: &T,
    config: &Config,
    reporter: &mut R,
) -> Result<SuiteReport> {
    let topology = Topology::discover(world, node)?;
    if topology.is_coordinator() {
        let nodes = topology.nodes.unwrap_or(1);
        info!(
            "{} participants on {nodes} node(s), message size {} bytes, {} iterations",
            topology.size,
            config.message_size(),
            config.iterations()
        );
        reporter.banner(config, topology.size, nodes);
    }

    let tests = config.tests();
    let injection = if tests.injection {
        Some(run_test(world, node, &topology, config, Pattern::Injection, reporter)?)
    } else {
        None
    };

    let mut ratio = None;
    let bisection = if tests.bisection {
        let injection_global = match injection.as_ref().and_then(TestOutcome::result) {
            Some(result) => result.global,
            None => reduce(world, Contribution::Abstains, COORDINATOR)?
                .map(|sum| global_figures(Pattern::Injection, sum)),
        };

        let outcome = run_test(world, node, &topology, config, Pattern::Bisection, reporter)?;
        let bisection_global = outcome.result().and_then(|result| result.global);
        if let (Some(injection_global), Some(bisection_global)) =
            (injection_global, bisection_global)
        {
            let computed = NonBlockingRatio::new(&injection_global, &bisection_global);
            reporter.ratio(&computed);
            ratio = Some(computed);
        }
        Some(outcome)
    } else {
        None
    };

    Ok(SuiteReport {
        topology,
        injection,
        bisection,
        ratio,
    })
}
