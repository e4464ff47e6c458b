//! Benchmark configuration.
//!
//! A [`Config`] is built once from the command line, validated, and then
//! shared read-only by every stage of the run.

use std::fmt;

use crate::error::{Error, Result};
use crate::pattern::TrafficPattern;

/// Default message size: 1 MiB.
pub const DEFAULT_MESSAGE_SIZE: usize = 1 << 20;

/// Default number of timed iterations.
pub const DEFAULT_ITERATIONS: i64 = 100;

/// Which bandwidth test to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pattern {
    /// Every participant exchanges with every other participant
    Injection,
    /// Lower and upper halves exchange with a single partner across the split
    Bisection,
}

impl Pattern {
    /// The traffic pattern generating this test's obligations.
    pub fn traffic(self) -> TrafficPattern {
        match self {
            Pattern::Injection => TrafficPattern::AllToAll,
            Pattern::Bisection => TrafficPattern::PairedHalves,
        }
    }

    /// Message tag used by this test, kept distinct so traffic of
    /// consecutive tests can never be matched against each other.
    pub fn tag(self) -> i32 {
        match self {
            Pattern::Injection => 100,
            Pattern::Bisection => 200,
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Injection => write!(f, "Injection"),
            Pattern::Bisection => write!(f, "Bisection"),
        }
    }
}

/// The set of tests requested for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestSelection {
    /// Run the injection test
    pub injection: bool,
    /// Run the bisection test
    pub bisection: bool,
}

impl TestSelection {
    /// Both tests.
    pub const ALL: TestSelection = TestSelection {
        injection: true,
        bisection: true,
    };

    /// Combine the mode flags. With nothing selected, both tests run.
    pub fn from_flags(inject: bool, bisection: bool, all: bool, mode: Option<Pattern>) -> Self {
        let mut selection = TestSelection {
            injection: inject || all || mode == Some(Pattern::Injection),
            bisection: bisection || all || mode == Some(Pattern::Bisection),
        };
        if !selection.injection && !selection.bisection {
            selection = TestSelection::ALL;
        }
        selection
    }

    /// Tests in execution order: injection always precedes bisection so its
    /// global figure is available for the non-blocking ratio.
    pub fn patterns(&self) -> Vec<Pattern> {
        let mut patterns = Vec::with_capacity(2);
        if self.injection {
            patterns.push(Pattern::Injection);
        }
        if self.bisection {
            patterns.push(Pattern::Bisection);
        }
        patterns
    }
}

impl fmt::Display for TestSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.patterns().iter().map(ToString::to_string).collect();
        write!(f, "{}", names.join(" "))
    }
}

/// Validated benchmark configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    message_size: usize,
    iterations: usize,
    tests: TestSelection,
    validate: bool,
}

impl Config {
    /// Build a configuration, rejecting values that cannot yield a
    /// measurement.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for a zero message size or a
    /// non-positive iteration count.
    pub fn new(message_size: usize, iterations: i64, tests: TestSelection) -> Result<Self> {
        if message_size == 0 {
            return Err(Error::Configuration(
                "message size must be at least 1 byte".into(),
            ));
        }
        if iterations <= 0 {
            return Err(Error::Configuration(format!(
                "iteration count must be positive, got {iterations}"
            )));
        }
        let iterations = usize::try_from(iterations).map_err(|_| {
            Error::Configuration(format!("iteration count {iterations} is too large"))
        })?;
        Ok(Config {
            message_size,
            iterations,
            tests,
            validate: false,
        })
    }

    /// Enable post-run payload validation.
    #[must_use]
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// Bytes per message.
    pub fn message_size(&self) -> usize {
        self.message_size
    }

    /// Timed iterations per test.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Requested tests.
    pub fn tests(&self) -> TestSelection {
        self.tests
    }

    /// Whether received payloads are checked after each test.
    pub fn validate(&self) -> bool {
        self.validate
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            message_size: DEFAULT_MESSAGE_SIZE,
            iterations: DEFAULT_ITERATIONS as usize,
            tests: TestSelection::ALL,
            validate: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_flags_selects_both_tests() {
        let selection = TestSelection::from_flags(false, false, false, None);
        assert_eq!(selection, TestSelection::ALL);
        assert_eq!(
            selection.patterns(),
            vec![Pattern::Injection, Pattern::Bisection]
        );
    }

    #[test]
    fn single_flag_selects_single_test() {
        let selection = TestSelection::from_flags(false, true, false, None);
        assert_eq!(selection.patterns(), vec![Pattern::Bisection]);

        let selection = TestSelection::from_flags(false, false, false, Some(Pattern::Injection));
        assert_eq!(selection.patterns(), vec![Pattern::Injection]);
    }

    #[test]
    fn all_flag_overrides() {
        let selection = TestSelection::from_flags(true, false, true, None);
        assert_eq!(selection, TestSelection::ALL);
    }

    #[test]
    fn selection_display() {
        assert_eq!(TestSelection::ALL.to_string(), "Injection Bisection");
    }

    #[test]
    fn rejects_non_positive_iterations() {
        for iters in [0, -1, -100] {
            let err = Config::new(1024, iters, TestSelection::ALL).unwrap_err();
            assert!(matches!(err, Error::Configuration(_)), "iters={iters}");
            assert!(err.is_fatal());
        }
    }

    #[test]
    fn rejects_zero_message_size() {
        let err = Config::new(0, 10, TestSelection::ALL).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn accessors_and_defaults() {
        let config = Config::new(4096, 7, TestSelection::ALL)
            .unwrap()
            .with_validation(true);
        assert_eq!(config.message_size(), 4096);
        assert_eq!(config.iterations(), 7);
        assert!(config.validate());

        let default = Config::default();
        assert_eq!(default.message_size(), 1 << 20);
        assert_eq!(default.iterations(), 100);
        assert!(!default.validate());
    }

    #[test]
    fn tags_are_distinct() {
        assert_ne!(Pattern::Injection.tag(), Pattern::Bisection.tag());
    }
}
