//! Application layer of the daemon.
//!
//! Everything here depends on the transport, input and profile *traits*
//! only, so the whole server can be driven in tests with in-memory channels.
//!
//! # Sub-modules
//!
//! - **`report_bus`** – Fan-out of every produced report to the bounded
//!   outbound queue of each active session.
//!
//! - **`session`** – Lifecycle of one connected host: three concurrent tasks
//!   (send, control-read, interrupt-read), first one to finish ends the
//!   session and releases everything.
//!
//! - **`dispatch`** – Input pumps (one per device) and the single dispatcher
//!   that owns the `InputState` and publishes reports.
//!
//! - **`serve`** – The orchestrator: profile registration, listener binding,
//!   wiring of pumps, dispatcher and sessions, graceful shutdown.

pub mod dispatch;
pub mod report_bus;
pub mod serve;
pub mod session;
