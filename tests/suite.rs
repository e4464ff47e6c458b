use approx::assert_relative_eq;

use inbibw::aggregate::{bytes_moved, Direction};
use inbibw::pattern::Op;
use inbibw::{
    partner, run_suite, Bandwidth, Config, ConsoleReporter, Error, LocalCluster, Pattern,
    SuiteReport, TestOutcome, TestSelection, TrafficPattern, Transport,
};

/// Run the suite on an in-process group and collect each participant's
/// report together with everything it printed.
fn run(size: usize, per_node: usize, config: &Config) -> Vec<(SuiteReport, String)> {
    LocalCluster::new(size, per_node)
        .unwrap()
        .run(|world| {
            let node = world.split_shared()?;
            let mut reporter = ConsoleReporter::new(Vec::new());
            let report = run_suite(&world, &node, config, &mut reporter)?;
            let text = String::from_utf8(reporter.into_inner()).unwrap();
            Ok((report, text))
        })
        .unwrap()
}

fn local_sum(reports: &[(SuiteReport, String)], pattern: Pattern) -> f64 {
    reports
        .iter()
        .filter_map(|(report, _)| {
            let outcome = match pattern {
                Pattern::Injection => report.injection.as_ref(),
                Pattern::Bisection => report.bisection.as_ref(),
            };
            outcome?.result()?.local
        })
        .map(|local| local.bandwidth.gbps().unwrap())
        .sum()
}

/// Four participants, 1 KiB messages, ten iterations of injection.
#[test]
fn injection_scenario_four_participants() {
    let tests = TestSelection::from_flags(true, false, false, None);
    let config = Config::new(1024, 10, tests).unwrap().with_validation(true);

    for rank in 0..4 {
        let obligations = TrafficPattern::AllToAll.obligations(rank, 4).unwrap();
        assert_eq!(obligations.iter().filter(|o| o.op == Op::Send).count(), 3);
        assert_eq!(obligations.iter().filter(|o| o.op == Op::Receive).count(), 3);
    }
    let per_participant = bytes_moved(TrafficPattern::AllToAll, 4, 1024, 10, Direction::OneWay);
    assert_eq!(4 * per_participant, 122_880);

    let reports = run(4, 2, &config);
    for (rank, (report, _)) in reports.iter().enumerate() {
        assert!(report.bisection.is_none());
        assert!(report.ratio.is_none());
        let result = report.injection.as_ref().unwrap().result().unwrap();
        assert!(result.local.is_some(), "rank {rank}");
    }

    let global = reports[0]
        .0
        .injection
        .as_ref()
        .unwrap()
        .result()
        .unwrap()
        .global
        .unwrap();
    let one_way = global.one_way.bandwidth.gbps().unwrap();
    assert_relative_eq!(one_way, local_sum(&reports, Pattern::Injection), max_relative = 1e-9);
    assert_relative_eq!(
        global.bidirectional.bandwidth.gbps().unwrap(),
        2.0 * one_way,
        max_relative = 1e-12
    );
}

/// Four participants pair across the halves and report their partners.
#[test]
fn bisection_scenario_four_participants() {
    assert_eq!(
        (0..4).map(|r| partner(r, 4).unwrap()).collect::<Vec<_>>(),
        vec![2, 3, 0, 1]
    );
    assert_eq!(
        bytes_moved(TrafficPattern::PairedHalves, 4, 1024, 10, Direction::Bidirectional),
        2 * 1024 * 10
    );

    let tests = TestSelection::from_flags(false, true, false, None);
    let config = Config::new(1024, 10, tests).unwrap().with_validation(true);
    let reports = run(4, 4, &config);

    for (rank, (_, text)) in reports.iter().enumerate() {
        let expected = format!("Rank {rank}: bisection (two-way with partner {})", partner(rank, 4).unwrap());
        assert!(text.contains(&expected), "rank {rank} printed: {text}");
    }

    let global = reports[0]
        .0
        .bisection
        .as_ref()
        .unwrap()
        .result()
        .unwrap()
        .global
        .unwrap();
    let bidirectional = global.bidirectional.bandwidth.gbps().unwrap();
    assert_relative_eq!(
        bidirectional,
        local_sum(&reports, Pattern::Bisection),
        max_relative = 1e-9
    );
    assert_relative_eq!(
        global.one_way.bandwidth.gbps().unwrap(),
        bidirectional / 2.0,
        max_relative = 1e-12
    );

    // Injection never ran, so the comparison has a zero denominator.
    let ratio = reports[0].0.ratio.unwrap();
    assert_eq!(ratio.one_way, None);
    assert!(reports[0].1.contains("Non-blocking % (one-way)       = undefined"));
}

#[test]
fn full_run_output_is_split_by_role() {
    let config = Config::new(4096, 5, TestSelection::ALL).unwrap();
    let reports = run(6, 3, &config);

    let coordinator = &reports[0].1;
    assert!(coordinator.contains("Running tests with msg_size=4096 bytes, niters=5"));
    assert!(coordinator.contains("Participants: 6 on 2 node(s)"));
    assert!(coordinator.contains("GLOBAL injection (one-way)"));
    assert!(coordinator.contains("Bisection measured (two-way aggregate)"));
    assert!(coordinator.contains("Non-blocking % (bidirectional)"));
    assert!(coordinator.contains("[Node aggregate injection on local-node0]"));
    assert!(coordinator.contains("[Node aggregate bisection on local-node0]"));

    let leader = &reports[3].1;
    assert!(leader.contains("[Node aggregate injection on local-node1]"));
    assert!(!leader.contains("GLOBAL"));

    for (rank, (_, text)) in reports.iter().enumerate() {
        assert!(text.contains(&format!("Rank {rank}: injection (one-way send only)")));
        if rank % 3 != 0 {
            assert!(!text.contains("Node aggregate"), "rank {rank}: {text}");
        }
        if rank != 0 {
            assert!(!text.contains("Running tests"), "rank {rank}: {text}");
        }
    }

    let ratio = reports[0].0.ratio.unwrap();
    let percent = ratio.one_way.unwrap();
    assert!(percent.is_finite() && percent > 0.0);
}

#[test]
fn single_participant_runs_injection_and_skips_bisection() {
    let config = Config::new(64, 3, TestSelection::ALL).unwrap();
    let reports = run(1, 1, &config);
    let (report, text) = &reports[0];

    assert!(TrafficPattern::AllToAll.obligations(0, 1).unwrap().is_empty());
    assert!(matches!(report.injection, Some(TestOutcome::Completed(_))));
    assert!(matches!(
        report.bisection,
        Some(TestOutcome::Skipped(Error::InsufficientParticipants {
            required: 2,
            available: 1
        }))
    ));
    assert!(text.contains("Bisection test skipped"));
    assert!(!text.contains("Non-blocking"));
}

#[test]
fn odd_group_leaves_last_participant_idle() {
    assert_eq!(partner(4, 5).unwrap(), 2);

    let tests = TestSelection::from_flags(false, true, false, None);
    let config = Config::new(512, 4, tests).unwrap().with_validation(true);
    let reports = run(5, 5, &config);

    assert!(reports[4].1.contains("Rank 4: bisection idle (no partner)"));
    let paired: usize = reports
        .iter()
        .filter(|(report, _)| {
            report.bisection.as_ref().unwrap().result().unwrap().local.is_some()
        })
        .count();
    assert_eq!(paired, 4);

    let global = reports[0]
        .0
        .bisection
        .as_ref()
        .unwrap()
        .result()
        .unwrap()
        .global
        .unwrap();
    assert!(matches!(global.bidirectional.bandwidth, Bandwidth::Measured(_)));
}

#[test]
fn repeated_runs_keep_the_same_obligations() {
    for size in 1..9 {
        for rank in 0..size {
            let first = TrafficPattern::AllToAll.obligations(rank, size).unwrap();
            let second = TrafficPattern::AllToAll.obligations(rank, size).unwrap();
            assert_eq!(first, second);
        }
    }

    let config = Config::new(128, 2, TestSelection::ALL).unwrap().with_validation(true);
    for _ in 0..2 {
        let reports = run(4, 2, &config);
        assert_eq!(reports.len(), 4);
    }
}
