//! Request lifecycle breakdown.
//!
//! Turns a flat event log into per-request phase durations. Raw events are
//! bucketed by kind and identity, and only identities observed at every
//! lifecycle stage qualify. Each stage's averaged timestamp is then
//! differenced against its predecessor so every value is time spent in that
//! phase rather than time since send.

use std::collections::HashMap;

use eyre::{eyre, Result};
use tracing::debug;

use reqtrace_data::{EventKind, EventRecord, EventStore, RequestId};

/// Raw timestamps bucketed by event kind and request identity.
///
/// A single request routinely has several observations of the same kind:
/// each replica logs its own REQ_RECEIVE, commit rounds can be retried. All
/// of them are kept; [`compute_profile`] averages per bucket.
#[derive(Debug, Default)]
pub struct EventGroups {
    per_kind: [HashMap<RequestId, Vec<i64>>; EventKind::COUNT],
}

impl EventGroups {
    /// All observed timestamps of `kind` for one request, empty if none.
    pub fn timestamps(&self, kind: EventKind, id: RequestId) -> &[i64] {
        self.per_kind[kind.index()]
            .get(&id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether at least one event of `kind` was observed for `id`.
    pub fn has(&self, kind: EventKind, id: RequestId) -> bool {
        self.per_kind[kind.index()].contains_key(&id)
    }
}

/// Buckets a flat event slice by kind and request identity.
pub fn group_by_kind(events: &[EventRecord]) -> EventGroups {
    let mut groups = EventGroups::default();
    for event in events {
        groups.per_kind[event.kind.index()]
            .entry(event.request)
            .or_default()
            .push(event.timestamp);
    }
    groups
}

/// Filters `ids` down to requests observed at every lifecycle stage.
///
/// A request missing even one kind yields no usable breakdown and is dropped
/// here rather than patched downstream. The result is sorted by
/// `(node_id, client_sn)` so report order does not depend on table order.
pub fn complete_requests(ids: &[RequestId], groups: &EventGroups) -> Vec<RequestId> {
    let mut complete: Vec<RequestId> = ids
        .iter()
        .copied()
        .filter(|id| EventKind::ALL.into_iter().all(|kind| groups.has(kind, *id)))
        .collect();
    complete.sort_unstable();
    complete
}

/// Phase durations for one request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimingProfile {
    /// The request the profile describes.
    pub request: RequestId,
    /// Whether the response phases were zeroed by the skew clamp.
    pub clamped: bool,
    phases: [f64; EventKind::COUNT],
}

impl TimingProfile {
    /// Duration attributed to `kind`, in the trace's time unit.
    pub fn phase(&self, kind: EventKind) -> f64 {
        self.phases[kind.index()]
    }
}

fn mean(values: &[i64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    // An i64 sum of epoch-nanosecond stamps overflows within a few observations.
    let sum: f64 = values.iter().map(|&v| v as f64).sum();
    Some(sum / values.len() as f64)
}

/// Computes the phase breakdown of one request.
///
/// Each kind's observations are averaged first, then differenced against the
/// predecessor kind, latest phase first so every step still sees an absolute
/// predecessor value. REQ_SEND is the time origin and always reads zero.
///
/// Replicas stamp RESP_SEND on their own clocks, so a delivery observed late
/// can push that delta negative; when it does, both RESP_SEND and
/// REQ_DELIVERED are zeroed and the profile is marked clamped. Other phases
/// keep negative values so clock trouble stays visible in the report.
///
/// Fails if any kind has no observations for `id`; filter identities through
/// [`complete_requests`] first.
pub fn compute_profile(id: RequestId, groups: &EventGroups) -> Result<TimingProfile> {
    let mut phases = [0.0f64; EventKind::COUNT];
    for kind in EventKind::ALL {
        phases[kind.index()] = mean(groups.timestamps(kind, id)).ok_or_else(|| {
            eyre!(
                "request {}/{} has no {} observations",
                id.node_id,
                id.client_sn,
                kind
            )
        })?;
    }

    // Latest phase first; each step must see its predecessor still absolute.
    for kind in EventKind::ALL.into_iter().rev() {
        if let Some(previous) = kind.predecessor() {
            phases[kind.index()] -= phases[previous.index()];
        }
    }
    phases[EventKind::ReqSend.index()] = 0.0;

    let mut clamped = false;
    if phases[EventKind::RespSend.index()] < 0.0 {
        phases[EventKind::RespSend.index()] = 0.0;
        phases[EventKind::ReqDelivered.index()] = 0.0;
        clamped = true;
    }

    Ok(TimingProfile {
        request: id,
        clamped,
        phases,
    })
}

/// Mean phase durations across a set of profiles.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BreakdownSummary {
    /// How many profiles the means were taken over.
    pub request_count: usize,
    mean_phases: [f64; EventKind::COUNT],
}

impl BreakdownSummary {
    /// Mean duration of `kind` across all aggregated requests.
    pub fn mean_phase(&self, kind: EventKind) -> f64 {
        self.mean_phases[kind.index()]
    }
}

/// Averages per-request profiles into one summary.
pub fn aggregate(profiles: &[TimingProfile]) -> Result<BreakdownSummary> {
    if profiles.is_empty() {
        return Err(eyre!("no complete request traces to aggregate"));
    }
    let mut mean_phases = [0.0f64; EventKind::COUNT];
    for profile in profiles {
        for kind in EventKind::ALL {
            mean_phases[kind.index()] += profile.phase(kind);
        }
    }
    for value in &mut mean_phases {
        *value /= profiles.len() as f64;
    }
    Ok(BreakdownSummary {
        request_count: profiles.len(),
        mean_phases,
    })
}

/// Full result of analyzing one trace database.
#[derive(Clone, Debug)]
pub struct BreakdownReport {
    /// Lifecycle event rows loaded from the log.
    pub total_events: usize,
    /// Distinct request identities seen in the log, complete or not.
    pub distinct_requests: usize,
    /// Per-request profiles, sorted by `(node_id, client_sn)`.
    pub profiles: Vec<TimingProfile>,
    /// Means across all profiles.
    pub summary: BreakdownSummary,
}

impl BreakdownReport {
    /// Number of profiles whose response phases were clamped.
    pub fn clamped_requests(&self) -> usize {
        self.profiles.iter().filter(|p| p.clamped).count()
    }
}

/// Runs the whole breakdown pipeline against one trace database.
pub fn analyze(store: &EventStore) -> Result<BreakdownReport> {
    let events = store.load_events()?;
    let groups = group_by_kind(&events);
    let ids = store.distinct_requests()?;
    let complete = complete_requests(&ids, &groups);
    debug!(
        events = events.len(),
        distinct = ids.len(),
        complete = complete.len(),
        "selected complete request traces"
    );

    let mut profiles = Vec::with_capacity(complete.len());
    for id in complete {
        let profile = compute_profile(id, &groups)?;
        debug!(
            node_id = id.node_id,
            client_sn = id.client_sn,
            clamped = profile.clamped,
            "request trace complete"
        );
        profiles.push(profile);
    }
    let summary = aggregate(&profiles)?;

    Ok(BreakdownReport {
        total_events: events.len(),
        distinct_requests: ids.len(),
        profiles,
        summary,
    })
}
