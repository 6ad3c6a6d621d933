//! Integration tests for the request lifecycle breakdown pipeline, from
//! SQLite trace database to aggregated report.

mod common;

use common::{complete_trace, write_event_db};
use reqtrace_analysis::breakdown::analyze;
use reqtrace_data::store::EventStore;
use reqtrace_data::types::EventKind;
use tempfile::TempDir;

/// Two complete traces and one partial trace.
///
/// Request (1,5) spends 5 ticks in every phase except commit and delivery
/// (10 each); request (1,6) matches it except ENOUGH_RESP takes 15. The
/// partial request (2,1) stops at REQ_DELIVERED and must not be profiled.
#[test]
fn analyze_reconstructs_phase_durations() {
    let dir = TempDir::new().expect("create temp dir");
    let mut rows = Vec::new();
    rows.extend(complete_trace(1, 5, [100, 105, 110, 120, 130, 135, 140]));
    rows.extend(complete_trace(1, 6, [200, 205, 210, 220, 230, 235, 250]));
    let mut partial = complete_trace(2, 1, [300, 305, 310, 320, 330, 335, 340]);
    partial.truncate(5);
    rows.extend(partial);
    let db = write_event_db(dir.path(), &rows);

    let store = EventStore::open(&db).expect("open trace database");
    let report = analyze(&store).expect("analyze trace");

    assert_eq!(report.total_events, 19);
    assert_eq!(report.distinct_requests, 3);
    assert_eq!(report.profiles.len(), 2);
    assert_eq!(report.clamped_requests(), 0);

    let first = &report.profiles[0];
    assert_eq!((first.request.node_id, first.request.client_sn), (1, 5));
    assert_eq!(first.phase(EventKind::ReqSend), 0.0);
    assert_eq!(first.phase(EventKind::ReqReceive), 5.0);
    assert_eq!(first.phase(EventKind::ReqPropose), 5.0);
    assert_eq!(first.phase(EventKind::ReqCommit), 10.0);
    assert_eq!(first.phase(EventKind::ReqDelivered), 10.0);
    assert_eq!(first.phase(EventKind::RespSend), 5.0);
    assert_eq!(first.phase(EventKind::EnoughResp), 5.0);

    assert_eq!(report.summary.request_count, 2);
    assert_eq!(report.summary.mean_phase(EventKind::ReqSend), 0.0);
    assert_eq!(report.summary.mean_phase(EventKind::EnoughResp), 10.0);
}

/// A second REQ_RECEIVE observation from another replica is averaged with
/// the first before phases are differenced.
#[test]
fn replica_observations_average_before_differencing() {
    let dir = TempDir::new().expect("create temp dir");
    let mut rows = complete_trace(1, 5, [100, 104, 110, 120, 130, 135, 140]);
    rows.push((106, "REQ_RECEIVE", 1, 5));
    let db = write_event_db(dir.path(), &rows);

    let store = EventStore::open(&db).expect("open trace database");
    let report = analyze(&store).expect("analyze trace");

    assert_eq!(report.total_events, 8);
    assert_eq!(report.profiles.len(), 1);
    let profile = &report.profiles[0];
    assert_eq!(profile.phase(EventKind::ReqReceive), 5.0);
    assert_eq!(profile.phase(EventKind::ReqPropose), 5.0);
}

/// REQ_DELIVERED stamped after RESP_SEND pushes the response delta negative;
/// both response phases read zero and the profile is marked clamped.
#[test]
fn late_delivery_zeroes_response_phases() {
    let dir = TempDir::new().expect("create temp dir");
    let rows = complete_trace(1, 7, [100, 105, 110, 120, 135, 130, 140]);
    let db = write_event_db(dir.path(), &rows);

    let store = EventStore::open(&db).expect("open trace database");
    let report = analyze(&store).expect("analyze trace");

    assert_eq!(report.clamped_requests(), 1);
    let profile = &report.profiles[0];
    assert!(profile.clamped);
    assert_eq!(profile.phase(EventKind::RespSend), 0.0);
    assert_eq!(profile.phase(EventKind::ReqDelivered), 0.0);
    assert_eq!(profile.phase(EventKind::EnoughResp), 10.0);
    assert_eq!(profile.phase(EventKind::ReqCommit), 10.0);
}

/// Marker rows with event names outside the lifecycle are ignored rather
/// than failing the run.
#[test]
fn untracked_event_kinds_do_not_break_analysis() {
    let dir = TempDir::new().expect("create temp dir");
    let mut rows = complete_trace(1, 1, [100, 105, 110, 120, 130, 135, 140]);
    rows.push((111, "BATCH_CUT", 1, 1));
    let db = write_event_db(dir.path(), &rows);

    let store = EventStore::open(&db).expect("open trace database");
    let report = analyze(&store).expect("analyze trace");

    assert_eq!(report.total_events, 7);
    assert_eq!(report.profiles.len(), 1);
}

#[test]
fn missing_database_is_fatal() {
    let dir = TempDir::new().expect("create temp dir");
    let result = EventStore::open(dir.path().join("absent.sqlite"));
    assert!(result.is_err());
}

/// A log where no request reached every lifecycle stage has nothing to
/// aggregate and reports an error instead of an empty table.
#[test]
fn analysis_without_complete_traces_errors() {
    let dir = TempDir::new().expect("create temp dir");
    let mut rows = complete_trace(3, 1, [100, 105, 110, 120, 130, 135, 140]);
    rows.retain(|(_, event, _, _)| *event != "RESP_SEND");
    let db = write_event_db(dir.path(), &rows);

    let store = EventStore::open(&db).expect("open trace database");
    let err = analyze(&store).expect_err("no complete traces");
    assert!(err.to_string().contains("no complete"));
}
