use std::collections::VecDeque;
use std::fmt;
use std::mem;

use bytes::Bytes;
use http::StatusCode;

use crate::body::BodyFraming;
use crate::head::{short_circuits_upload, RequestHead, ResponseHead};
use crate::{Error, FinalStreamAction};

use super::response_stream::ResponseStreamState;

/// Drives one request on one channel.
///
/// The owner (the channel handler) feeds channel events in and executes the
/// returned [`Action`]s: writing to the wire, pausing/resuming the request
/// body producer, and forwarding response parts to the task side.
///
/// All operations must be serialized on the channel's event loop, except
/// [`request_cancelled`][RequestStateMachine::request_cancelled] and
/// [`error_happened`][RequestStateMachine::error_happened], which may
/// originate elsewhere as long as the caller hops to the event loop before
/// invoking them.
pub struct RequestStateMachine {
    state: State,
    is_channel_writable: bool,
}

enum State {
    Initialized,
    WaitForChannelToBecomeWritable(RequestHead, BodyFraming),
    Running(RequestState, ResponseState),
    Finished,
    Failed(Error),
    /// Sentinel owned by a transition in progress; never observable from a
    /// public entry point.
    Modifying,
}

enum RequestState {
    Streaming {
        /// `Some` for fixed-size bodies; the framing guard.
        expected_body_length: Option<u64>,
        sent_body_bytes: u64,
        producer: ProducerState,
    },
    EndSent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProducerState {
    Producing,
    Paused,
}

enum ResponseState {
    WaitingForHead,
    /// Only the status is retained; the head itself travels to the task
    /// side in `ForwardResponseHead`.
    ReceivingBody(StatusCode, ResponseStreamState),
    EndReceived,
}

impl ResponseState {
    /// Whether a status of 300 or above has been seen, which cuts the
    /// upload short for the rest of the request.
    fn upload_short_circuited(&self) -> bool {
        matches!(self, ResponseState::ReceivingBody(status, _) if short_circuits_upload(*status))
    }
}

/// One parsed piece of the response, as read off the channel.
#[derive(Debug)]
pub enum ResponsePart {
    /// Status line and headers.
    Head(ResponseHead),
    /// One body chunk.
    Body(Bytes),
    /// End of the response.
    End,
}

/// What the owner must do after a transition.
#[derive(Debug)]
pub enum Action {
    /// Write the request head to the channel. `start_body` tells whether a
    /// request body producer needs to be started afterwards.
    SendRequestHead {
        /// The head to write.
        head: RequestHead,
        /// Whether a body producer follows.
        start_body: bool,
    },
    /// Write one request body part to the channel.
    SendBodyPart(Bytes),
    /// Write the end-of-body marker to the channel.
    SendRequestEnd,
    /// Stop the request body producer until it is resumed.
    PauseRequestBodyStream,
    /// Let the paused request body producer continue.
    ResumeRequestBodyStream,
    /// Hand the response head to the task side.
    ForwardResponseHead {
        /// The head to forward.
        head: ResponseHead,
        /// Whether the task side must pause its body producer as well
        /// (status of 300 or above while the upload was still running).
        pause_request_body_stream: bool,
    },
    /// Hand buffered response body parts to the task side.
    ForwardResponseBodyParts(VecDeque<Bytes>),
    /// The request is complete. Emitted exactly once.
    SucceedRequest {
        /// What to do with the channel.
        final_action: FinalStreamAction,
        /// Response body parts that were still buffered.
        remaining: VecDeque<Bytes>,
    },
    /// The request is dead. Emitted exactly once.
    FailRequest {
        /// What went wrong.
        error: Error,
        /// What to do with the channel.
        final_action: FinalStreamAction,
    },
    /// Issue a read on the channel.
    Read,
    /// Nothing to do right now.
    Wait,
}

// //////////////////////////////////////////////////////////////////////////////////////////// LIFECYCLE

impl RequestStateMachine {
    /// Create a machine for one request attempt.
    ///
    /// `is_channel_writable` is the channel's writability at creation time;
    /// later changes arrive through
    /// [`writability_changed`][RequestStateMachine::writability_changed].
    pub fn new(is_channel_writable: bool) -> Self {
        RequestStateMachine {
            state: State::Initialized,
            is_channel_writable,
        }
    }

    /// Kick the request off.
    ///
    /// If the channel is writable this emits `SendRequestHead` right away;
    /// otherwise the head is parked until writability arrives.
    pub fn start(&mut self, head: RequestHead, metadata: BodyFraming) -> Action {
        match mem::replace(&mut self.state, State::Modifying) {
            State::Initialized => {
                if self.is_channel_writable {
                    self.send_request_head(head, metadata)
                } else {
                    self.state = State::WaitForChannelToBecomeWritable(head, metadata);
                    debug!("start parked, channel not writable");
                    Action::Wait
                }
            }
            state => unreachable!("start in state {:?}", state),
        }
    }

    fn send_request_head(&mut self, head: RequestHead, metadata: BodyFraming) -> Action {
        let start_body = metadata.has_body();

        let request_state = if start_body {
            RequestState::Streaming {
                expected_body_length: metadata.expected_length(),
                sent_body_bytes: 0,
                producer: ProducerState::Producing,
            }
        } else {
            // The head and the (empty) body go out together.
            RequestState::EndSent
        };

        self.state = State::Running(request_state, ResponseState::WaitingForHead);
        debug!("sending request head, start_body: {}", start_body);

        Action::SendRequestHead { head, start_body }
    }
}

// //////////////////////////////////////////////////////////////////////////////////////////// WRITABILITY

impl RequestStateMachine {
    /// The channel's writability changed.
    ///
    /// Repeated calls with the same value are allowed and answered with
    /// `Wait`.
    pub fn writability_changed(&mut self, writable: bool) -> Action {
        self.is_channel_writable = writable;

        match mem::replace(&mut self.state, State::Modifying) {
            State::WaitForChannelToBecomeWritable(head, metadata) => {
                if writable {
                    self.send_request_head(head, metadata)
                } else {
                    self.state = State::WaitForChannelToBecomeWritable(head, metadata);
                    Action::Wait
                }
            }
            State::Running(
                RequestState::Streaming {
                    expected_body_length,
                    sent_body_bytes,
                    producer,
                },
                response_state,
            ) => {
                let (producer, action) = if !writable {
                    match producer {
                        ProducerState::Producing => {
                            debug!("channel not writable, pausing request body producer");
                            (ProducerState::Paused, Action::PauseRequestBodyStream)
                        }
                        ProducerState::Paused => (producer, Action::Wait),
                    }
                } else {
                    match producer {
                        // A response of 300 or above keeps the producer
                        // paused for good.
                        ProducerState::Paused if !response_state.upload_short_circuited() => {
                            debug!("channel writable again, resuming request body producer");
                            (ProducerState::Producing, Action::ResumeRequestBodyStream)
                        }
                        _ => (producer, Action::Wait),
                    }
                };

                self.state = State::Running(
                    RequestState::Streaming {
                        expected_body_length,
                        sent_body_bytes,
                        producer,
                    },
                    response_state,
                );
                action
            }
            state @ (State::Initialized
            | State::Running(RequestState::EndSent, _)
            | State::Finished
            | State::Failed(_)) => {
                self.state = state;
                Action::Wait
            }
            State::Modifying => unreachable!("writability change in modifying state"),
        }
    }
}

// //////////////////////////////////////////////////////////////////////////////////////////// REQUEST BODY

impl RequestStateMachine {
    /// One request body part arrived from the producer.
    pub fn request_stream_part_received(&mut self, part: Bytes) -> Action {
        match mem::replace(&mut self.state, State::Modifying) {
            State::Running(
                RequestState::Streaming {
                    expected_body_length,
                    sent_body_bytes,
                    producer,
                },
                response_state,
            ) => {
                if response_state.upload_short_circuited() {
                    // The part was already in flight when the producer was
                    // paused. It is discarded, not sent.
                    debug_assert_eq!(producer, ProducerState::Paused);
                    self.state = State::Running(
                        RequestState::Streaming {
                            expected_body_length,
                            sent_body_bytes,
                            producer,
                        },
                        response_state,
                    );
                    return Action::Wait;
                }

                let sent_body_bytes = sent_body_bytes + part.len() as u64;

                if let Some(expected) = expected_body_length {
                    if sent_body_bytes > expected {
                        return self.fail_now(Error::BodyLengthMismatch);
                    }
                }

                trace!("sending body part of {} bytes", part.len());
                self.state = State::Running(
                    RequestState::Streaming {
                        expected_body_length,
                        sent_body_bytes,
                        producer,
                    },
                    response_state,
                );
                Action::SendBodyPart(part)
            }
            state @ (State::Finished | State::Failed(_)) => {
                // A part that was in flight when the request ended.
                self.state = state;
                Action::Wait
            }
            state => unreachable!("request body part in state {:?}", state),
        }
    }

    /// The producer is done with the request body.
    pub fn request_stream_finished(&mut self) -> Action {
        match mem::replace(&mut self.state, State::Modifying) {
            State::Running(
                RequestState::Streaming {
                    expected_body_length,
                    sent_body_bytes,
                    producer,
                },
                response_state,
            ) => {
                if response_state.upload_short_circuited() {
                    // The body is being discarded; the response end decides
                    // how this request concludes.
                    self.state = State::Running(
                        RequestState::Streaming {
                            expected_body_length,
                            sent_body_bytes,
                            producer,
                        },
                        response_state,
                    );
                    return Action::Wait;
                }

                if let Some(expected) = expected_body_length {
                    if sent_body_bytes != expected {
                        return self.fail_now(Error::BodyLengthMismatch);
                    }
                }

                match response_state {
                    ResponseState::EndReceived => {
                        // The response was already done; the request ends
                        // the moment the terminating chunk is on the wire.
                        self.state = State::Finished;
                        debug!("request finished after response end");
                        Action::SucceedRequest {
                            final_action: FinalStreamAction::SendRequestEnd,
                            remaining: VecDeque::new(),
                        }
                    }
                    response_state => {
                        self.state = State::Running(RequestState::EndSent, response_state);
                        Action::SendRequestEnd
                    }
                }
            }
            state @ (State::Finished | State::Failed(_)) => {
                self.state = state;
                Action::Wait
            }
            state => unreachable!("request stream finish in state {:?}", state),
        }
    }
}

// //////////////////////////////////////////////////////////////////////////////////////////// RESPONSE

impl RequestStateMachine {
    /// One piece of the response was read off the channel.
    pub fn channel_read(&mut self, part: ResponsePart) -> Action {
        match part {
            ResponsePart::Head(head) => self.receive_head(head),
            ResponsePart::Body(part) => self.receive_body_part(part),
            ResponsePart::End => self.receive_end(),
        }
    }

    fn receive_head(&mut self, head: ResponseHead) -> Action {
        match mem::replace(&mut self.state, State::Modifying) {
            State::Running(request_state, ResponseState::WaitingForHead) => {
                if head.is_informational() {
                    // 1xx is consumed here, never forwarded.
                    self.state = State::Running(request_state, ResponseState::WaitingForHead);
                    return Action::Wait;
                }

                let status = head.status;
                let receiving =
                    ResponseState::ReceivingBody(status, ResponseStreamState::new());

                let (request_state, pause) = match request_state {
                    RequestState::Streaming {
                        expected_body_length,
                        sent_body_bytes,
                        producer: ProducerState::Producing,
                    } if short_circuits_upload(status) => (
                        RequestState::Streaming {
                            expected_body_length,
                            sent_body_bytes,
                            producer: ProducerState::Paused,
                        },
                        true,
                    ),
                    request_state => (request_state, false),
                };

                if pause {
                    debug!("response status {} cuts the upload short", status);
                }

                self.state = State::Running(request_state, receiving);
                Action::ForwardResponseHead {
                    head,
                    pause_request_body_stream: pause,
                }
            }
            state @ (State::Finished | State::Failed(_)) => {
                self.state = state;
                Action::Wait
            }
            state => unreachable!("response head in state {:?}", state),
        }
    }

    fn receive_body_part(&mut self, part: Bytes) -> Action {
        match &mut self.state {
            State::Running(_, ResponseState::ReceivingBody(_, stream)) => {
                // Buffered until channel_read_complete batches it out.
                stream.received_body_part(part);
                Action::Wait
            }
            State::Finished | State::Failed(_) => Action::Wait,
            state => unreachable!("response body part in state {:?}", state),
        }
    }

    fn receive_end(&mut self) -> Action {
        match mem::replace(&mut self.state, State::Modifying) {
            State::Running(request_state, ResponseState::ReceivingBody(status, stream)) => {
                let remaining = stream.end();

                if short_circuits_upload(status) {
                    // The response is done but a request body may have been
                    // cut off. If so, the wire cannot be reused.
                    let final_action = match request_state {
                        RequestState::Streaming { .. } => FinalStreamAction::Close,
                        RequestState::EndSent => FinalStreamAction::None,
                    };
                    self.state = State::Finished;
                    debug!("request finished, {}", final_action.explain());
                    return Action::SucceedRequest {
                        final_action,
                        remaining,
                    };
                }

                match request_state {
                    RequestState::EndSent => {
                        self.state = State::Finished;
                        debug!("request finished");
                        Action::SucceedRequest {
                            final_action: FinalStreamAction::None,
                            remaining,
                        }
                    }
                    request_state => {
                        // The upload is still running; remember that the
                        // response is complete and keep forwarding.
                        self.state =
                            State::Running(request_state, ResponseState::EndReceived);
                        if remaining.is_empty() {
                            Action::Wait
                        } else {
                            Action::ForwardResponseBodyParts(remaining)
                        }
                    }
                }
            }
            state @ (State::Finished | State::Failed(_)) => {
                self.state = state;
                Action::Wait
            }
            state => unreachable!("response end in state {:?}", state),
        }
    }

    /// The channel finished a read burst.
    pub fn channel_read_complete(&mut self) -> Action {
        match &mut self.state {
            State::Running(_, ResponseState::ReceivingBody(_, stream)) => {
                match stream.channel_read_complete() {
                    Some(batch) => Action::ForwardResponseBodyParts(batch),
                    None => Action::Wait,
                }
            }
            _ => Action::Wait,
        }
    }

    /// The channel pipeline saw a `read()`; should it be forwarded to the
    /// socket?
    pub fn read(&mut self) -> Action {
        match &mut self.state {
            State::Running(_, ResponseState::ReceivingBody(_, stream)) => {
                if stream.read() {
                    Action::Read
                } else {
                    Action::Wait
                }
            }
            // Nothing of ours is buffered; let the read through.
            _ => Action::Read,
        }
    }

    /// The task side wants more response body parts.
    pub fn demand_more_response_body_parts(&mut self) -> Action {
        match &mut self.state {
            State::Running(_, ResponseState::ReceivingBody(_, stream)) => {
                if stream.demand_more_response_body_parts() {
                    Action::Read
                } else {
                    Action::Wait
                }
            }
            _ => Action::Wait,
        }
    }
}

// //////////////////////////////////////////////////////////////////////////////////////////// TERMINATION

impl RequestStateMachine {
    /// The idle-read timer fired.
    ///
    /// The timer may only be armed once the request end has been sent;
    /// before that the call is a programmer error.
    pub fn idle_read_timeout_triggered(&mut self) -> Action {
        match mem::replace(&mut self.state, State::Modifying) {
            State::Running(RequestState::EndSent, _) => self.fail_now(Error::ReadTimeout),
            // The timer can race the terminal transition on the event loop.
            state @ (State::Finished | State::Failed(_)) => {
                self.state = state;
                Action::Wait
            }
            state => unreachable!("idle read timeout in state {:?}", state),
        }
    }

    /// The request was cancelled by its owner.
    pub fn request_cancelled(&mut self) -> Action {
        self.fail_request(Error::Cancelled)
    }

    /// The channel went away.
    pub fn channel_inactive(&mut self) -> Action {
        self.fail_request(Error::RemoteConnectionClosed)
    }

    /// The channel surfaced an error.
    pub fn error_happened(&mut self, error: Error) -> Action {
        self.fail_request(error)
    }

    fn fail_request(&mut self, error: Error) -> Action {
        match mem::replace(&mut self.state, State::Modifying) {
            State::Initialized | State::WaitForChannelToBecomeWritable(..) => {
                // Nothing reached the wire.
                self.state = State::Failed(error.clone());
                debug!("request failed before the head was written: {}", error);
                Action::FailRequest {
                    error,
                    final_action: FinalStreamAction::None,
                }
            }
            State::Running(..) => {
                self.state = State::Failed(error.clone());
                debug!("request failed: {}", error);
                Action::FailRequest {
                    error,
                    final_action: FinalStreamAction::Close,
                }
            }
            state @ (State::Finished | State::Failed(_)) => {
                self.state = state;
                Action::Wait
            }
            State::Modifying => unreachable!("failure in modifying state"),
        }
    }

    /// Terminal failure from inside a transition that has already taken the
    /// state. Only legal while the head has been written.
    fn fail_now(&mut self, error: Error) -> Action {
        self.state = State::Failed(error.clone());
        debug!("request failed: {}", error);
        Action::FailRequest {
            error,
            final_action: FinalStreamAction::Close,
        }
    }
}

// ////////////////////////////////////////////////////////////////////////////////////////////

impl fmt::Debug for RequestStateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestStateMachine({:?})", self.state)
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Initialized => write!(f, "Initialized"),
            State::WaitForChannelToBecomeWritable(..) => {
                write!(f, "WaitForChannelToBecomeWritable")
            }
            State::Running(request, response) => {
                write!(f, "Running({:?}, {:?})", request, response)
            }
            State::Finished => write!(f, "Finished"),
            State::Failed(error) => write!(f, "Failed({:?})", error),
            State::Modifying => write!(f, "Modifying"),
        }
    }
}

impl fmt::Debug for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestState::Streaming {
                sent_body_bytes,
                producer,
                ..
            } => write!(f, "Streaming({} sent, {:?})", sent_body_bytes, producer),
            RequestState::EndSent => write!(f, "EndSent"),
        }
    }
}

impl fmt::Debug for ResponseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseState::WaitingForHead => write!(f, "WaitingForHead"),
            ResponseState::ReceivingBody(status, _) => write!(f, "ReceivingBody({})", status),
            ResponseState::EndReceived => write!(f, "EndReceived"),
        }
    }
}
