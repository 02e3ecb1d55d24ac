//! Completeness and liveness of the parallel phase.
//!
//! Every track is processed exactly once per cycle, every section exactly
//! once after all of its inputs arrived, and no ready section is left
//! unclaimed at the phase barrier, including long chains of nested sections.

mod helpers;

use helpers::*;
use sinfonia::prelude::*;
use sinfonia::{ScheduleAudit, SectionId};
use std::sync::Arc;

const CYCLES: usize = 25;

#[test]
fn test_every_unit_processed_once_per_cycle() {
    init_tracing();
    for processors in [1, 2, 4, 8] {
        let logs: Vec<_> = (0..9).map(|_| CallLog::new()).collect();
        let mut graph = GraphDescription::new();
        let sections: Vec<SectionId> = (0..3)
            .map(|i| graph.add_section(format!("s{i}"), passthrough()))
            .collect();
        for (i, log) in logs.iter().enumerate() {
            let section = (i % 4 < 3).then(|| sections[i % 3]);
            graph.add_track(format!("t{i}"), section, ConstantTrack::logged(0.125, log));
        }

        let mut session = Session::initialize(graph, config(processors, 32, 32 * CYCLES as u64)).unwrap();
        for _ in 0..CYCLES {
            session.run_cycle().unwrap();
            let audit = session.audit();
            assert!(audit.is_complete(), "processors={processors}: {audit:?}");
            assert_eq!(audit.tracks_done, 9);
            assert_eq!(audit.sections_processed, 4);
        }

        for log in &logs {
            assert_eq!(log.dispatches(), CYCLES);
            assert_eq!(log.waves(), CYCLES);
            assert_eq!(log.advances(), CYCLES);
        }
    }
}

/// Chain of `depth` sections, each nested in the previous one, with one track
/// per level.
fn chain(depth: usize, logs: &[Arc<CallLog>]) -> GraphDescription {
    let mut graph = GraphDescription::new();
    let mut parent = graph.add_section("level0", gain(1.0));
    graph.add_track("voice0", Some(parent), ConstantTrack::logged(1.0, &logs[0]));
    for level in 1..depth {
        parent = graph.add_subsection(format!("level{level}"), parent, gain(1.0));
        graph.add_track(
            format!("voice{level}"),
            Some(parent),
            ConstantTrack::logged(1.0, &logs[level]),
        );
    }
    graph
}

#[test]
fn test_deep_section_chain_leaves_nothing_ready() {
    const DEPTH: usize = 24;
    for processors in [1, 2, 3, 8] {
        let logs: Vec<_> = (0..DEPTH).map(|_| CallLog::new()).collect();
        let mut session =
            Session::initialize(chain(DEPTH, &logs), config(processors, 16, 16 * 10)).unwrap();
        assert_eq!(session.graph().depth(), DEPTH);

        while !session.run_cycle().unwrap().is_terminal() {
            let audit = session.audit();
            assert_eq!(audit.ready_unclaimed, 0);
            assert_eq!(audit.sections_processed, DEPTH + 1);
            // One unit per level, summed through the chain.
            assert!(session.output().left.iter().all(|&s| s == DEPTH as f32));
        }
        assert!(logs.iter().all(|log| log.waves() == 10));
    }
}

#[test]
fn test_very_deep_chain_completes_without_overflow() {
    // Deep enough that a frame per nesting level would exhaust a test thread's stack.
    const DEPTH: usize = 20_000;
    for processors in [1, 2] {
        let logs: Vec<_> = (0..DEPTH).map(|_| CallLog::new()).collect();
        let mut session =
            Session::initialize(chain(DEPTH, &logs), config(processors, 4, 4)).unwrap();
        assert_eq!(session.graph().depth(), DEPTH);

        assert_eq!(session.run_cycle().unwrap().frames, 4);
        let audit = session.audit();
        assert!(audit.is_complete(), "processors={processors}: {audit:?}");
        assert_eq!(audit.sections_processed, DEPTH + 1);
        assert!(session.output().left.iter().all(|&s| s == DEPTH as f32));
    }
}

#[test]
fn test_wide_graph_with_many_workers() {
    // More workers than schedule entries: some workers scan nothing.
    let mut graph = GraphDescription::new();
    let only = graph.add_section("only", gain(0.5));
    graph.add_track("a", Some(only), ConstantTrack::boxed(1.0));
    graph.add_track("b", None, ConstantTrack::boxed(1.0));

    let mut session = Session::initialize(graph, config(16, 8, 8 * 50)).unwrap();
    let (left, _) = render(&mut session);
    assert_eq!(left.len(), 400);
    assert!(left.iter().all(|&s| s == 1.5));
    assert_eq!(
        session.audit(),
        ScheduleAudit {
            tracks_done: 2,
            sections_processed: 2,
            ready_unclaimed: 0,
            score_arrived: 2,
            score_required: 2,
        }
    );
}

#[test]
fn test_ticks_advance_once_per_cycle() {
    // 48000 Hz / 960 ticks per second: 50 frames per tick.
    let log = CallLog::new();
    let mut graph = GraphDescription::new();
    graph.add_track("clocked", None, ConstantTrack::logged(0.0, &log));
    let config = SessionConfig::builder()
        .processors(2)
        .cycle_frames(512)
        .total_frames(512 * 100)
        .build();

    let mut session = Session::initialize(graph, config).unwrap();
    render(&mut session);
    assert_eq!(log.advances(), 100);
    assert_eq!(log.ticks.load(std::sync::atomic::Ordering::SeqCst), 512 * 100 / 50);
    assert_eq!(session.clock().ticks(), 1024);
}
