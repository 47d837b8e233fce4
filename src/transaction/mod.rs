//! The request as seen by its owning task
//!
//! Sans-IO machine for the user-facing half of a request: scheduler and
//! executor callbacks, the body producer and the body consumer all call
//! into it, and the owner executes the returned actions against the
//! delegate, the producer's pending acknowledgement and the executor
//! handle.
//!
//! The states are:
//!
//! * **Initialized** - Created, not yet handed to a scheduler
//! * **Queued** - Sitting in a scheduler queue waiting for a connection
//! * **Executing** - Bound to an executor. Two independent streams
//!   progress inside: the request stream (writer *initialized*,
//!   *producing*, *paused* or *finished*) and the response stream
//!   (*buffering* chunks for the consumer or *waiting for remote*)
//! * **Redirected** - The redirect predicate intercepted the response;
//!   waiting for the response to drain before reporting the redirect
//! * **Finished** - Terminal, with or without an error
//!
//! ```text
//!  ┌──────────────────┐     ┌──────────────────┐
//!  │   Initialized    │────▶│      Queued      │
//!  └──────────────────┘     └──────────────────┘
//!            │                  │          │
//!            │                  ▼          │
//!            │        ┌──────────────────┐ │
//!            └───────▶│    Executing     │ │
//!                     └──────────────────┘ │
//!                         │          │     │
//!                         ▼          │     │
//!               ┌──────────────────┐ │     │
//!               │    Redirected    │ │     │
//!               └──────────────────┘ │     │
//!                         │          ▼     ▼
//!                         │  ┌──────────────────┐
//!                         └─▶│     Finished     │
//!                            └──────────────────┘
//! ```
//!
//! Upload backpressure works through one-shot write acknowledgements: a
//! write while *producing* returns an already-resolved [`AckFuture`], a
//! write while *paused* returns a pending one that resolves when the
//! machine leaves the paused state. At most one acknowledgement is
//! outstanding at a time.
//!
//! Download backpressure is consumer pull: forwarded chunks buffer until
//! the consumer asks, and only an empty buffer makes the machine ask the
//! executor for more. When the response ends before the buffer is drained,
//! the end-of-file marker (or a failure that arrived meanwhile) waits at
//! the bottom of the buffer.
//!
//! [`AckFuture`]: crate::AckFuture

mod machine;

#[cfg(test)]
mod test;

pub use machine::{
    ConsumeAction, FailAction, FinishAction, ReceiveResponseEndAction, RedirectPredicate,
    ResumeAction, Transaction, WriteAction,
};
