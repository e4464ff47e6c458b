//! Console output of benchmark figures.
//!
//! The benchmark hands each figure to a [`Reporter`] as soon as it exists.
//! [`ConsoleReporter`] prints them in the classic layout: one line per
//! participant, one per node from the node leader, and the global block
//! from the coordinator.

use std::io::{self, Write};

use log::warn;

use crate::aggregate::{Bandwidth, GlobalFigures, MeasurementResult, NonBlockingRatio};
use crate::config::{Config, Pattern};
use crate::error::Error;

/// Where benchmark figures go.
pub trait Reporter {
    /// Run parameters, once, at the coordinator.
    fn banner(&mut self, config: &Config, participants: usize, nodes: usize);

    /// A participant's own figure. `partner` is set for bisection.
    fn local(
        &mut self,
        rank: usize,
        pattern: Pattern,
        partner: Option<usize>,
        result: &MeasurementResult,
    );

    /// A participant that sat the test out.
    fn idle(&mut self, rank: usize, pattern: Pattern);

    /// A node aggregate, at the node leader.
    fn node(&mut self, pattern: Pattern, node_name: &str, result: &MeasurementResult);

    /// A global aggregate, at the coordinator.
    fn global(&mut self, pattern: Pattern, figures: &GlobalFigures);

    /// Bisection relative to injection, at the coordinator.
    fn ratio(&mut self, ratio: &NonBlockingRatio);

    /// A test that could not run, at the coordinator.
    fn skipped(&mut self, pattern: Pattern, reason: &Error);
}

/// Writes figures as text lines.
pub struct ConsoleReporter<W> {
    out: W,
}

impl ConsoleReporter<io::Stdout> {
    /// Reporter on standard output.
    pub fn stdout() -> Self {
        ConsoleReporter { out: io::stdout() }
    }
}

impl<W: Write> ConsoleReporter<W> {
    /// Reporter on any writer.
    pub fn new(out: W) -> Self {
        ConsoleReporter { out }
    }

    /// Give back the writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Emit a block of lines in one write so concurrent participants do not
    /// interleave inside it.
    fn emit(&mut self, text: String) {
        if let Err(e) = self
            .out
            .write_all(text.as_bytes())
            .and_then(|()| self.out.flush())
        {
            warn!("Failed to write report: {e}");
        }
    }
}

fn percent(value: Option<f64>) -> String {
    match value {
        Some(value) => format!("{value:.2} %"),
        None => "undefined".to_string(),
    }
}

fn rate(bandwidth: Bandwidth) -> String {
    bandwidth.to_string()
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn banner(&mut self, config: &Config, participants: usize, nodes: usize) {
        self.emit(format!(
            "Running tests with msg_size={} bytes, niters={}\n\
             Participants: {participants} on {nodes} node(s)\n\
             Modes: {}\n",
            config.message_size(),
            config.iterations(),
            config.tests()
        ));
    }

    fn local(
        &mut self,
        rank: usize,
        pattern: Pattern,
        partner: Option<usize>,
        result: &MeasurementResult,
    ) {
        let line = match (pattern, partner) {
            (Pattern::Bisection, Some(partner)) => format!(
                "Rank {rank}: bisection (two-way with partner {partner}) = {}\n",
                rate(result.bandwidth)
            ),
            _ => format!(
                "Rank {rank}: injection (one-way send only) = {}\n",
                rate(result.bandwidth)
            ),
        };
        self.emit(line);
    }

    fn idle(&mut self, rank: usize, pattern: Pattern) {
        self.emit(format!(
            "Rank {rank}: {} idle (no partner)\n",
            pattern.to_string().to_lowercase()
        ));
    }

    fn node(&mut self, pattern: Pattern, node_name: &str, result: &MeasurementResult) {
        self.emit(format!(
            "  [Node aggregate {} on {node_name}] = {}\n",
            pattern.to_string().to_lowercase(),
            rate(result.bandwidth)
        ));
    }

    fn global(&mut self, pattern: Pattern, figures: &GlobalFigures) {
        let text = match pattern {
            Pattern::Injection => format!(
                "GLOBAL injection (one-way)       = {}\n\
                 GLOBAL injection (bidirectional) = {} (approx)\n\n",
                rate(figures.one_way.bandwidth),
                rate(figures.bidirectional.bandwidth)
            ),
            Pattern::Bisection => format!(
                "\nBisection measured (two-way aggregate) = {}\n\
                 Bisection measured (one-way aggregate) = {}\n",
                rate(figures.bidirectional.bandwidth),
                rate(figures.one_way.bandwidth)
            ),
        };
        self.emit(text);
    }

    fn ratio(&mut self, ratio: &NonBlockingRatio) {
        self.emit(format!(
            "Non-blocking % (one-way)       = {}\n\
             Non-blocking % (bidirectional) = {}\n\n",
            percent(ratio.one_way),
            percent(ratio.bidirectional)
        ));
    }

    fn skipped(&mut self, pattern: Pattern, reason: &Error) {
        self.emit(format!("{pattern} test skipped: {reason}\n"));
    }
}
