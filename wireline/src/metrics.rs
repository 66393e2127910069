//! Runtime metrics.
//!
//! Static counters for connection and protocol activity. Exposed through the
//! metriken registry so an embedding process can scrape them however it
//! already scrapes everything else.

use metriken::{metric, Counter, Gauge};

// ── Connection lifecycle ─────────────────────────────────────────

#[metric(
    name = "wireline/connections/opened",
    description = "Total connections opened"
)]
pub static CONNECTIONS_OPENED: Counter = Counter::new();

#[metric(
    name = "wireline/connections/closed",
    description = "Total connections closed"
)]
pub static CONNECTIONS_CLOSED: Counter = Counter::new();

#[metric(
    name = "wireline/connections/active",
    description = "Currently active connections"
)]
pub static CONNECTIONS_ACTIVE: Gauge = Gauge::new();

// ── Bytes ────────────────────────────────────────────────────────

#[metric(name = "wireline/bytes/received", description = "Total bytes received")]
pub static BYTES_RECEIVED: Counter = Counter::new();

#[metric(name = "wireline/bytes/sent", description = "Total bytes sent")]
pub static BYTES_SENT: Counter = Counter::new();

// ── HTTP ─────────────────────────────────────────────────────────

#[metric(
    name = "wireline/http/requests_parsed",
    description = "Requests parsed to completion"
)]
pub static REQUESTS_PARSED: Counter = Counter::new();

#[metric(
    name = "wireline/http/parse_errors",
    description = "Requests rejected by the parser"
)]
pub static PARSE_ERRORS: Counter = Counter::new();

// ── WebSocket ────────────────────────────────────────────────────

#[metric(
    name = "wireline/ws/messages",
    description = "WebSocket messages received to completion"
)]
pub static WS_MESSAGES: Counter = Counter::new();

#[metric(
    name = "wireline/ws/protocol_errors",
    description = "WebSocket framing protocol errors"
)]
pub static WS_PROTOCOL_ERRORS: Counter = Counter::new();
