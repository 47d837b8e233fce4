use std::collections::VecDeque;
use std::mem;

use bytes::Bytes;

/// Consumer-pull protocol for the response body.
///
/// Sits between the channel pushing chunks in and the task side pulling
/// batches out. After a batch has been handed up, the next socket `Read` is
/// only issued once the channel has seen its own `read()` *and* the task
/// has demanded more. The same two flags give upward backpressure towards
/// the server and sideways backpressure towards the delegate.
#[derive(Debug)]
pub(crate) struct ResponseStreamState {
    state: State,
}

#[derive(Debug)]
enum State {
    /// Reads are in flight; arriving parts are appended to the buffer.
    WaitingForBytes(VecDeque<Bytes>),
    /// A batch was handed up. Both the channel `read()` and task demand
    /// must be seen before the next socket read.
    WaitingForReadOrDemand(VecDeque<Bytes>),
    /// Task demand has been seen, the channel `read()` has not.
    WaitingForRead(VecDeque<Bytes>),
    /// The channel `read()` has been seen, task demand has not.
    WaitingForDemand(VecDeque<Bytes>),
    /// Sentinel owned by a transition in progress.
    Modifying,
}

impl ResponseStreamState {
    pub(crate) fn new() -> Self {
        ResponseStreamState {
            state: State::WaitingForBytes(VecDeque::new()),
        }
    }

    /// Append one body part read off the channel.
    ///
    /// Parts can land in any mode: backpressure is best effort and data
    /// already in flight is buffered, not refused.
    pub(crate) fn received_body_part(&mut self, part: Bytes) {
        match &mut self.state {
            State::WaitingForBytes(buffer)
            | State::WaitingForReadOrDemand(buffer)
            | State::WaitingForRead(buffer)
            | State::WaitingForDemand(buffer) => buffer.push_back(part),
            State::Modifying => unreachable!("response stream in modifying state"),
        }
    }

    /// Take the buffered batch, if any, to hand up to the task side.
    pub(crate) fn channel_read_complete(&mut self) -> Option<VecDeque<Bytes>> {
        match &mut self.state {
            State::WaitingForBytes(buffer)
            | State::WaitingForReadOrDemand(buffer)
            | State::WaitingForRead(buffer)
            | State::WaitingForDemand(buffer) => {
                if buffer.is_empty() {
                    return None;
                }
                let batch = mem::take(buffer);
                self.state = State::WaitingForReadOrDemand(VecDeque::new());
                Some(batch)
            }
            State::Modifying => unreachable!("response stream in modifying state"),
        }
    }

    /// The channel asks whether the socket read should be forwarded.
    pub(crate) fn read(&mut self) -> bool {
        match mem::replace(&mut self.state, State::Modifying) {
            state @ State::WaitingForBytes(_) => {
                self.state = state;
                true
            }
            State::WaitingForReadOrDemand(buffer) => {
                self.state = State::WaitingForDemand(buffer);
                false
            }
            // A repeated read event; keep waiting for demand.
            state @ State::WaitingForDemand(_) => {
                self.state = state;
                false
            }
            State::WaitingForRead(buffer) => {
                self.state = State::WaitingForBytes(buffer);
                true
            }
            State::Modifying => unreachable!("response stream in modifying state"),
        }
    }

    /// The task side asks for more body parts.
    pub(crate) fn demand_more_response_body_parts(&mut self) -> bool {
        match mem::replace(&mut self.state, State::Modifying) {
            State::WaitingForReadOrDemand(buffer) => {
                self.state = State::WaitingForRead(buffer);
                false
            }
            State::WaitingForDemand(buffer) => {
                self.state = State::WaitingForBytes(buffer);
                true
            }
            // The channel is already free to read; nothing to unlock.
            state @ (State::WaitingForBytes(_) | State::WaitingForRead(_)) => {
                self.state = state;
                false
            }
            State::Modifying => unreachable!("response stream in modifying state"),
        }
    }

    /// The response ended; whatever is still buffered goes with the
    /// terminal action.
    pub(crate) fn end(self) -> VecDeque<Bytes> {
        match self.state {
            State::WaitingForBytes(buffer)
            | State::WaitingForReadOrDemand(buffer)
            | State::WaitingForRead(buffer)
            | State::WaitingForDemand(buffer) => buffer,
            State::Modifying => unreachable!("response stream in modifying state"),
        }
    }
}
