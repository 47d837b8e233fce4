//! The request as seen from the channel
//!
//! Sans-IO machine: channel events go in, [`Action`]s come out. The owner
//! (the channel handler) performs the writes, pauses or resumes the body
//! producer, and forwards response parts to the task side. The machine
//! itself never touches the socket.
//!
//! The states are:
//!
//! * **Initialized** - Created, nothing has happened yet
//! * **WaitForChannelToBecomeWritable** - The head is parked until the
//!   channel can take it
//! * **Running** - The request and response halves progress independently:
//!   the request is *streaming* (with the producer *producing* or
//!   *paused*) or has its *end sent*; the response is *waiting for head*,
//!   *receiving body* or has its *end received*
//! * **Finished** - Terminal success; `SucceedRequest` was emitted
//! * **Failed** - Terminal failure; `FailRequest` was emitted
//!
//! ```text
//!                  ┌──────────────────┐
//!                  │   Initialized    │──────────────┐
//!                  └──────────────────┘              │
//!                      │          │                  │
//!          not writable│          │writable          │
//!                      ▼          │                  │
//!  ┌────────────────────────┐     │                  │
//!  │ WaitForChannelToBecome │     │                  │
//!  │        Writable        │     │                  │
//!  └────────────────────────┘     │                  │
//!                      │          │                  │
//!              writable│          │                  │
//!                      ▼          ▼                  ▼
//!                  ┌──────────────────┐    ┌──────────────────┐
//!                  │     Running      │───▶│      Failed      │
//!                  └──────────────────┘    └──────────────────┘
//!                           │
//!                           ▼
//!                  ┌──────────────────┐
//!                  │     Finished     │
//!                  └──────────────────┘
//! ```
//!
//! Two rules do most of the work while `Running`:
//!
//! * **Writability.** The producer is paused when the channel stops being
//!   writable and resumed when writability returns, with matching
//!   `PauseRequestBodyStream`/`ResumeRequestBodyStream` actions.
//! * **Early response.** A response status of 300 or above while the
//!   upload is still running pauses the producer for good. Remaining body
//!   parts are discarded, and the eventual response end still succeeds the
//!   request, with `FinalStreamAction::Close` because the wire holds a
//!   half-sent body.
//!
//! Response body parts are buffered in a small consumer-pull sub-state:
//! parts accumulate per read burst, `channel_read_complete` batches them
//! out, and a socket `Read` is only issued again once both the channel's
//! own `read()` and the task side's demand have been seen.

mod machine;
mod response_stream;

#[cfg(test)]
mod test;

pub use machine::{Action, RequestStateMachine, ResponsePart};
