//! Type definitions for request lifecycle traces.

use std::fmt;

/// One lifecycle marker logged by the instrumented ordering service.
///
/// Variants are declared in expected occurrence order; [`EventKind::ALL`],
/// [`EventKind::index`], and [`EventKind::predecessor`] all derive from that
/// declaration order. Phase durations are defined against the immediately
/// preceding kind, so the order here is load bearing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Client sent the request (the time origin).
    ReqSend,
    /// Peer received the request.
    ReqReceive,
    /// Request was proposed for ordering.
    ReqPropose,
    /// Request was committed by the ordering protocol.
    ReqCommit,
    /// Committed request was delivered to the application.
    ReqDelivered,
    /// Peer sent its response to the client.
    RespSend,
    /// Client collected enough matching responses.
    EnoughResp,
}

impl EventKind {
    /// All seven kinds in expected occurrence order.
    pub const ALL: [EventKind; 7] = [
        EventKind::ReqSend,
        EventKind::ReqReceive,
        EventKind::ReqPropose,
        EventKind::ReqCommit,
        EventKind::ReqDelivered,
        EventKind::RespSend,
        EventKind::EnoughResp,
    ];

    /// Number of distinct kinds.
    pub const COUNT: usize = Self::ALL.len();

    /// Position of this kind in occurrence order.
    pub fn index(self) -> usize {
        self as usize
    }

    /// The kind expected immediately before this one, `None` for the origin.
    pub fn predecessor(self) -> Option<EventKind> {
        match self {
            EventKind::ReqSend => None,
            other => Some(Self::ALL[other.index() - 1]),
        }
    }

    /// Event name as stored in the `request` table.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::ReqSend => "REQ_SEND",
            EventKind::ReqReceive => "REQ_RECEIVE",
            EventKind::ReqPropose => "REQ_PROPOSE",
            EventKind::ReqCommit => "REQ_COMMIT",
            EventKind::ReqDelivered => "REQ_DELIVERED",
            EventKind::RespSend => "RESP_SEND",
            EventKind::EnoughResp => "ENOUGH_RESP",
        }
    }

    /// Parses a stored event name.
    ///
    /// Returns `None` for names outside the fixed set; traces may contain
    /// marker kinds this tool does not analyze.
    pub fn from_name(name: &str) -> Option<EventKind> {
        Self::ALL.iter().copied().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one logical request: the `(nodeId, clSn)` pair from the trace.
///
/// Several raw events of the same kind may exist per identity (observations
/// from multiple replicas, or retries); downstream analysis averages them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId {
    /// Identifier of the node the trace row is attributed to.
    pub node_id: i64,
    /// Client-assigned sequence number of the request.
    pub client_sn: i64,
}

/// One row of the event log. Immutable once read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventRecord {
    /// Timestamp in whatever unit the tracer logged; the analysis is
    /// unit-agnostic and reports durations in the same unit.
    pub timestamp: i64,
    /// Which lifecycle marker fired.
    pub kind: EventKind,
    /// The request this event belongs to.
    pub request: RequestId,
}
