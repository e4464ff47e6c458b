//! Bandwidth figures and their reduction across participants.
//!
//! A participant turns its byte count and elapsed time into a local rate,
//! then the rates are summed per node (to the node leader) and over the
//! whole group (to the coordinator, global rank 0).
//!
//! Every participant must call each reduction, but not every participant
//! has something to add: the unpaired rank of an odd bisection, or the
//! placeholder injection reduction of a bisection-only run. That asymmetry
//! is carried by [`Contribution`], whose [`Contribution::Abstains`] branch
//! is the additive identity.
//!
//! A rate that could not be measured is [`Bandwidth::Undefined`], and any
//! sum it takes part in is undefined as well.

use std::fmt;

use crate::error::{Error, Result};
use crate::pattern::TrafficPattern;
use crate::transport::Transport;

/// Elapsed times at or below this many seconds carry no usable rate.
pub const MIN_MEASURABLE_SECONDS: f64 = 1e-9;

/// Global rank that receives global aggregates.
pub const COORDINATOR: usize = 0;

/// Node-local rank that receives node aggregates.
pub const NODE_LEADER: usize = 0;

/// Which traffic a figure counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Bytes sent only
    OneWay,
    /// Bytes sent and received
    Bidirectional,
}

impl Direction {
    fn factor(self) -> u64 {
        match self {
            Direction::OneWay => 1,
            Direction::Bidirectional => 2,
        }
    }
}

/// Over which participants a figure was summed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// One participant
    Local,
    /// The participants of one node
    Node,
    /// Every participant
    Global,
}

/// A rate in GB/s (10^9 bytes per second), or the lack of one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bandwidth {
    /// A measured or derived rate
    Measured(f64),
    /// No meaningful rate exists
    Undefined,
}

impl Bandwidth {
    /// The rate, if defined.
    pub fn gbps(self) -> Option<f64> {
        match self {
            Bandwidth::Measured(value) => Some(value),
            Bandwidth::Undefined => None,
        }
    }

    /// Multiply a defined rate by `factor`.
    pub fn scaled(self, factor: f64) -> Bandwidth {
        match self {
            Bandwidth::Measured(value) => Bandwidth::Measured(value * factor),
            Bandwidth::Undefined => Bandwidth::Undefined,
        }
    }
}

impl fmt::Display for Bandwidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bandwidth::Measured(value) => write!(f, "{value:.3} GB/s"),
            Bandwidth::Undefined => write!(f, "undefined"),
        }
    }
}

/// What one participant supplies to a collective sum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Contribution {
    /// Adds its bandwidth to the sum
    Contributes(Bandwidth),
    /// Takes part in the collective call but adds nothing
    Abstains,
}

impl Contribution {
    /// Wire form: `[rate, undefined_count]`.
    fn encode(self) -> [f64; 2] {
        match self {
            Contribution::Contributes(Bandwidth::Measured(value)) => [value, 0.0],
            Contribution::Contributes(Bandwidth::Undefined) => [0.0, 1.0],
            Contribution::Abstains => [0.0, 0.0],
        }
    }

    /// Sum of a set of contributions.
    pub fn sum<I: IntoIterator<Item = Contribution>>(contributions: I) -> Bandwidth {
        let [total, undefined] = contributions
            .into_iter()
            .map(Contribution::encode)
            .fold([0.0, 0.0], |acc, x| [acc[0] + x[0], acc[1] + x[1]]);
        decode([total, undefined])
    }
}

fn decode([total, undefined]: [f64; 2]) -> Bandwidth {
    if undefined > 0.0 {
        Bandwidth::Undefined
    } else {
        Bandwidth::Measured(total)
    }
}

/// One reported figure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementResult {
    /// The rate
    pub bandwidth: Bandwidth,
    /// Participants it covers
    pub scope: Scope,
    /// Traffic it counts
    pub direction: Direction,
}

impl MeasurementResult {
    /// Build a figure.
    pub fn new(bandwidth: Bandwidth, scope: Scope, direction: Direction) -> Self {
        MeasurementResult {
            bandwidth,
            scope,
            direction,
        }
    }
}

/// The one-way and bidirectional view of a global aggregate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalFigures {
    /// Bytes sent per second, summed over the group
    pub one_way: MeasurementResult,
    /// Bytes sent and received per second, summed over the group
    pub bidirectional: MeasurementResult,
}

impl GlobalFigures {
    /// Figures from a measured one-way sum. The bidirectional figure is
    /// `2 x one-way`: each send is mirrored by an equal receive, so it is
    /// derived, not measured.
    pub fn from_one_way(one_way: Bandwidth) -> Self {
        GlobalFigures {
            one_way: MeasurementResult::new(one_way, Scope::Global, Direction::OneWay),
            bidirectional: MeasurementResult::new(
                one_way.scaled(2.0),
                Scope::Global,
                Direction::Bidirectional,
            ),
        }
    }

    /// Figures from a measured round-trip sum; one-way is half of it.
    pub fn from_bidirectional(bidirectional: Bandwidth) -> Self {
        GlobalFigures {
            one_way: MeasurementResult::new(
                bidirectional.scaled(0.5),
                Scope::Global,
                Direction::OneWay,
            ),
            bidirectional: MeasurementResult::new(
                bidirectional,
                Scope::Global,
                Direction::Bidirectional,
            ),
        }
    }
}

/// Bytes one participant moves during a timed run.
///
/// Injection counts `(N - 1)` messages per iteration one way, twice that
/// bidirectionally. Bisection counts one message each way per iteration, so
/// its bidirectional (round-trip) figure is `2 x message_size x iterations`
/// whatever the group size.
pub fn bytes_moved(
    pattern: TrafficPattern,
    participants: usize,
    message_size: usize,
    iterations: usize,
    direction: Direction,
) -> u64 {
    let messages = match pattern {
        TrafficPattern::AllToAll => participants.saturating_sub(1) as u64,
        TrafficPattern::PairedHalves => 1,
    };
    messages * message_size as u64 * iterations as u64 * direction.factor()
}

/// Local rate in GB/s.
///
/// # Errors
///
/// [`Error::UnmeasurableDuration`] when `elapsed` is not above
/// [`MIN_MEASURABLE_SECONDS`] (including zero iterations).
pub fn local_rate(bytes: u64, elapsed: f64) -> Result<f64> {
    if !elapsed.is_finite() || elapsed <= MIN_MEASURABLE_SECONDS {
        return Err(Error::UnmeasurableDuration { elapsed });
    }
    Ok(bytes as f64 / elapsed / 1e9)
}

/// Local rate, mapping an unmeasurable duration to [`Bandwidth::Undefined`].
pub fn local_bandwidth(bytes: u64, elapsed: f64) -> Bandwidth {
    match local_rate(bytes, elapsed) {
        Ok(rate) => Bandwidth::Measured(rate),
        Err(_) => Bandwidth::Undefined,
    }
}

/// Collective sum of `contribution` over `transport`, delivered to `root`.
///
/// Every participant of the group must call this. Returns the sum at `root`
/// and `None` elsewhere.
pub fn reduce<T: Transport>(
    transport: &T,
    contribution: Contribution,
    root: usize,
) -> Result<Option<Bandwidth>> {
    let sums = transport.reduce_sum(&contribution.encode(), root)?;
    sums.map(|sums| match sums.as_slice() {
        &[total, undefined] => Ok(decode([total, undefined])),
        other => Err(Error::Transport(format!(
            "reduction returned {} values, expected 2",
            other.len()
        ))),
    })
    .transpose()
}

/// Bisection throughput as a percentage of injection throughput.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NonBlockingRatio {
    /// One-way bisection over one-way injection
    pub one_way: Option<f64>,
    /// Bidirectional bisection over bidirectional injection
    pub bidirectional: Option<f64>,
}

impl NonBlockingRatio {
    /// Ratios of two global results. A ratio is `None` when either side is
    /// undefined or the injection figure is not positive (as with the zero
    /// placeholder of a bisection-only run).
    pub fn new(injection: &GlobalFigures, bisection: &GlobalFigures) -> Self {
        NonBlockingRatio {
            one_way: percentage(bisection.one_way.bandwidth, injection.one_way.bandwidth),
            bidirectional: percentage(
                bisection.bidirectional.bandwidth,
                injection.bidirectional.bandwidth,
            ),
        }
    }
}

fn percentage(numerator: Bandwidth, denominator: Bandwidth) -> Option<f64> {
    match (numerator, denominator) {
        (Bandwidth::Measured(n), Bandwidth::Measured(d)) if d > 0.0 => Some(n / d * 100.0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalCluster;
    use approx::assert_relative_eq;

    #[test]
    fn injection_byte_accounting() {
        // N = 4, 1 KiB, 10 iterations: 3 x 1024 x 10 per participant.
        let one_way = bytes_moved(TrafficPattern::AllToAll, 4, 1024, 10, Direction::OneWay);
        assert_eq!(one_way, 30_720);
        assert_eq!(4 * one_way, 122_880);
        assert_eq!(
            bytes_moved(TrafficPattern::AllToAll, 4, 1024, 10, Direction::Bidirectional),
            61_440
        );
        assert_eq!(
            bytes_moved(TrafficPattern::AllToAll, 1, 1024, 10, Direction::OneWay),
            0
        );
    }

    #[test]
    fn bisection_round_trip_is_independent_of_group_size() {
        for participants in [2, 4, 6, 128] {
            assert_eq!(
                bytes_moved(
                    TrafficPattern::PairedHalves,
                    participants,
                    4096,
                    25,
                    Direction::Bidirectional
                ),
                2 * 4096 * 25
            );
        }
    }

    #[test]
    fn local_rate_in_gigabytes() {
        assert_relative_eq!(local_rate(2_000_000_000, 0.5).unwrap(), 4.0);
    }

    #[test]
    fn unmeasurable_durations() {
        for elapsed in [0.0, 1e-12, -1.0, f64::NAN, f64::INFINITY] {
            let err = local_rate(1024, elapsed).unwrap_err();
            assert!(matches!(err, Error::UnmeasurableDuration { .. }));
            assert!(!err.is_fatal());
            assert_eq!(local_bandwidth(1024, elapsed), Bandwidth::Undefined);
        }
    }

    #[test]
    fn abstaining_is_the_additive_identity() {
        let sum = Contribution::sum([
            Contribution::Contributes(Bandwidth::Measured(1.5)),
            Contribution::Abstains,
            Contribution::Contributes(Bandwidth::Measured(2.5)),
        ]);
        assert_eq!(sum, Bandwidth::Measured(4.0));
        assert_eq!(
            Contribution::sum([Contribution::Abstains, Contribution::Abstains]),
            Bandwidth::Measured(0.0)
        );
    }

    #[test]
    fn undefined_poisons_the_sum() {
        let sum = Contribution::sum([
            Contribution::Contributes(Bandwidth::Measured(3.0)),
            Contribution::Contributes(Bandwidth::Undefined),
        ]);
        assert_eq!(sum, Bandwidth::Undefined);
    }

    #[test]
    fn injection_bidirectional_is_twice_one_way() {
        let figures = GlobalFigures::from_one_way(Bandwidth::Measured(12.5));
        assert_eq!(figures.bidirectional.bandwidth, Bandwidth::Measured(25.0));
        assert_eq!(figures.one_way.direction, Direction::OneWay);
        assert_eq!(figures.bidirectional.scope, Scope::Global);
    }

    #[test]
    fn bisection_one_way_is_half_round_trip() {
        let figures = GlobalFigures::from_bidirectional(Bandwidth::Measured(80.0));
        assert_eq!(figures.one_way.bandwidth, Bandwidth::Measured(40.0));
    }

    #[test]
    fn nonblocking_percentage() {
        let injection = GlobalFigures::from_one_way(Bandwidth::Measured(100.0));
        let bisection = GlobalFigures::from_bidirectional(Bandwidth::Measured(80.0));
        let ratio = NonBlockingRatio::new(&injection, &bisection);
        assert_relative_eq!(ratio.one_way.unwrap(), 40.0);
        assert_relative_eq!(ratio.bidirectional.unwrap(), 40.0);
        assert_eq!(format!("{:.2}", ratio.one_way.unwrap()), "40.00");
    }

    #[test]
    fn placeholder_injection_gives_undefined_ratio() {
        let injection = GlobalFigures::from_one_way(Bandwidth::Measured(0.0));
        let bisection = GlobalFigures::from_bidirectional(Bandwidth::Measured(10.0));
        let ratio = NonBlockingRatio::new(&injection, &bisection);
        assert_eq!(ratio.one_way, None);
        assert_eq!(ratio.bidirectional, None);
    }

    #[test]
    fn bandwidth_display() {
        assert_eq!(Bandwidth::Measured(1.23456).to_string(), "1.235 GB/s");
        assert_eq!(Bandwidth::Undefined.to_string(), "undefined");
    }

    #[test]
    fn collective_reduce_with_abstainers() {
        let cluster = LocalCluster::new(4, 4).unwrap();
        let results = cluster
            .run(|world| {
                let contribution = if world.rank() < 2 {
                    Contribution::Contributes(Bandwidth::Measured(world.rank() as f64 + 1.0))
                } else {
                    Contribution::Abstains
                };
                reduce(&world, contribution, COORDINATOR)
            })
            .unwrap();
        assert_eq!(results[0], Some(Bandwidth::Measured(3.0)));
        assert!(results[1..].iter().all(Option::is_none));
    }

    #[test]
    fn collective_reduce_with_undefined_member() {
        let cluster = LocalCluster::new(3, 3).unwrap();
        let results = cluster
            .run(|world| {
                let bandwidth = if world.rank() == 2 {
                    Bandwidth::Undefined
                } else {
                    Bandwidth::Measured(1.0)
                };
                reduce(&world, Contribution::Contributes(bandwidth), COORDINATOR)
            })
            .unwrap();
        assert_eq!(results[0], Some(Bandwidth::Undefined));
    }
}
