//! Sans-IO state machines for driving a single HTTP request inside an
//! asynchronous HTTP client.
//!
//! One request is governed by two cooperating machines that never share
//! memory:
//!
//! * [`connection::RequestStateMachine`] sees the request from the
//!   socket/channel: writability-driven backpressure on the request body,
//!   body framing bookkeeping, response forwarding, the idle-read timeout
//!   and channel teardown.
//! * [`transaction::Transaction`] sees the same request from the
//!   user-facing task/delegate: queueing, executor binding, upload
//!   backpressure through awaitable write acknowledgements, download
//!   buffering with consumer-driven pull, redirect interception and
//!   cancellation.
//!
//! Every public operation is a synchronous transition that mutates the
//! machine in place and returns an action value. The machines perform no
//! I/O and hold no locks; the owner executes the returned actions, which is
//! how calls on one machine become calls on the other:
//!
//! ```text
//!  ┌───────────┐  channel events   ┌─────────────────────┐
//!  │  channel  │──────────────────▶│ RequestStateMachine │
//!  │ (reactor) │◀──────────────────│   (connection side) │
//!  └───────────┘  write/read/...   └─────────────────────┘
//!                                     │ Forward*/Succeed/Fail
//!                                     ▼
//!  ┌───────────┐  task events      ┌─────────────────────┐
//!  │ delegate/ │◀──────────────────│     Transaction     │
//!  │ producer/ │──────────────────▶│     (task side)     │
//!  │ consumer  │  write/consume    └─────────────────────┘
//! ```
//!
//! The executor that bridges the two sides is an external collaborator and
//! only appears here as the [`RequestExecutor`] capability trait carried
//! through actions. Transport establishment, TLS, connection pooling and
//! wire serialization are likewise out of scope.
//!
//! Each machine must be driven from a single thread; see the module docs of
//! [`connection`] and [`transaction`] for the per-machine state graphs and
//! the exact serialization requirements.

#![deny(missing_docs)]

#[macro_use]
extern crate log;

mod ack;
mod body;
mod error;
mod final_action;
mod head;

mod executor;

pub mod connection;
pub mod transaction;

pub use ack::{AckFuture, WriteAck};
pub use body::BodyFraming;
pub use error::Error;
pub use executor::{RequestExecutor, RequestScheduler, SharedExecutor, SharedScheduler};
pub use final_action::FinalStreamAction;
pub use head::{RequestHead, ResponseHead};

pub use http;
