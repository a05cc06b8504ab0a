//! In-process fan-out broker and buffered work queues.
//!
//! The subscription graph is built once at startup and never mutated
//! afterwards; delivery guarantees are at-least-once with visibility-timeout
//! redelivery and dead-lettering after a bounded number of attempts.

pub mod filter;
pub mod queue;
pub mod topic;
