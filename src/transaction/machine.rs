use std::collections::VecDeque;
use std::fmt;
use std::mem;

use bytes::Bytes;
use http::{HeaderMap, StatusCode, Uri};

use crate::ack::{AckFuture, WriteAck};
use crate::executor::{SharedExecutor, SharedScheduler};
use crate::head::ResponseHead;
use crate::Error;

/// Decides whether a response is followed as a redirect.
///
/// Pure function from `(status, headers)` to the redirect target. Consulted
/// at most once per response; returning `Some` makes the machine intercept
/// the response instead of forwarding it to the delegate.
pub type RedirectPredicate = Box<dyn Fn(StatusCode, &HeaderMap) -> Option<Uri> + Send>;

/// Drives one request as seen by its owning task.
///
/// The owner feeds in scheduler/executor callbacks and producer/consumer
/// events, and executes the returned actions against the delegate, the
/// producer's pending acknowledgement and the executor handle.
///
/// All operations must be serialized by the owner;
/// [`fail`][Transaction::fail] is the one entry point that may originate on
/// another thread, provided the caller hops to the owning thread before
/// invoking it.
pub struct Transaction {
    state: State,
    redirect: Option<RedirectPredicate>,
}

enum State {
    Initialized,
    Queued(SharedScheduler),
    Executing(SharedExecutor, RequestStream, ResponseStream),
    Redirected(ResponseHead, Uri),
    Finished(Option<Error>),
    /// Sentinel owned by a transition in progress; never observable from a
    /// public entry point.
    Modifying,
}

enum RequestStream {
    /// The writer has not been started yet.
    Initialized,
    /// The writer may produce freely.
    Producing,
    /// The writer must hold off. A pending acknowledgement exists once the
    /// writer attempted a write while paused.
    Paused(Option<PendingAck>),
    /// The writer is done.
    Finished,
}

/// The one outstanding acknowledgement, both halves.
///
/// The fulfilment half is surrendered on the transition out of `Paused`;
/// the future half is cloned out again if the writer retries while still
/// paused.
struct PendingAck {
    ack: WriteAck,
    future: AckFuture,
}

impl PendingAck {
    fn new() -> Self {
        let (ack, future) = WriteAck::pending();
        PendingAck { ack, future }
    }
}

enum ResponseStream {
    /// No response head yet.
    Initialized,
    /// Chunks pile up here until the consumer asks for them.
    Buffering(VecDeque<Bytes>, Next),
    /// The consumer asked and the buffer was empty; the next chunks from
    /// the executor go straight through.
    WaitingForRemote,
}

/// What the consumer runs into once the buffer is drained.
enum Next {
    AskExecutorForMore,
    Eof,
    Error(Error),
}

// //////////////////////////////////////////////////////////////////////////////////////////// ACTIONS

/// Result of [`Transaction::resume_request_body_stream`].
pub enum ResumeAction {
    /// First resume: start the writer.
    StartWriter,
    /// Fulfil this acknowledgement to let the paused writer proceed.
    SucceedAck(WriteAck),
    /// Nothing to do (writer already finished, or a redirect is in
    /// flight).
    None,
}

/// Result of [`Transaction::write_next_request_part`].
pub enum WriteAction {
    /// Hand the part to the executor; the producer awaits `ack` before the
    /// next part.
    Write {
        /// The body part to write.
        part: Bytes,
        /// Where to write it.
        executor: SharedExecutor,
        /// Already resolved while producing; pending while paused.
        ack: AckFuture,
    },
    /// The write is a protocol violation; the whole task fails.
    FailTask(Error),
    /// Fail only the producer's wait, not the task (redirect in flight or
    /// the task already over).
    FailFuture(Error),
}

/// Result of [`Transaction::finish_request_body_stream`].
pub enum FinishAction {
    /// Tell the executor the body is complete; fulfil the acknowledgement
    /// if one is pending.
    ForwardStreamFinished {
        /// The executor to notify.
        executor: SharedExecutor,
        /// Pending acknowledgement to succeed, if any.
        ack: Option<WriteAck>,
    },
    /// The producer failed; fail the task and tell the executor.
    ForwardStreamFailureAndFailTask {
        /// The executor to notify.
        executor: SharedExecutor,
        /// The producer's error.
        error: Error,
        /// Pending acknowledgement to fail, if any.
        ack: Option<WriteAck>,
    },
    /// A late finish after redirect or termination; ignore.
    None,
}

/// Result of [`Transaction::succeed_request`].
pub enum ReceiveResponseEndAction {
    /// Nothing was buffered and nothing remained: report success to the
    /// delegate.
    SucceedRequest,
    /// The response was intercepted; follow the redirect.
    Redirect {
        /// The intercepted response head.
        head: ResponseHead,
        /// Where the redirect points.
        target: Uri,
    },
    /// The consumer was waiting: deliver this chunk now, the rest drains
    /// through `consume_more_body_data`.
    Consume(Bytes),
    /// The consumer is busy; it will drain the rest and finish on its own.
    None,
}

/// Result of [`Transaction::consume_more_body_data`].
pub enum ConsumeAction {
    /// Deliver this chunk to the consumer.
    Consume(Bytes),
    /// The buffer ran dry; ask the executor for more.
    RequestMoreFromExecutor(SharedExecutor),
    /// The response is fully delivered: report success to the delegate.
    FinishStream,
    /// Fail the task, cancelling the executor unless it is already gone.
    FailTask {
        /// The error to surface. With a stored connection error this is
        /// the stored one, not the consumer's (first error wins).
        error: Error,
        /// Executor to cancel, if it is still alive.
        cancel_executor: Option<SharedExecutor>,
    },
    /// The task already reached its terminal state; ignore.
    None,
}

/// Result of [`Transaction::fail`].
pub enum FailAction {
    /// Fail the task now, cancelling whichever collaborator still holds
    /// the request.
    FailTask {
        /// Scheduler to cancel if the request was still queued.
        scheduler: Option<SharedScheduler>,
        /// Executor to cancel if the request was executing.
        executor: Option<SharedExecutor>,
    },
    /// The response is already complete; cancel the executor and let the
    /// consumer drain the buffer before it observes the error.
    CancelExecutor(SharedExecutor),
    /// Already terminal; ignore.
    None,
}

// //////////////////////////////////////////////////////////////////////////////////////////// SCHEDULING

impl Transaction {
    /// Create a machine for one request attempt.
    pub fn new(redirect: Option<RedirectPredicate>) -> Self {
        Transaction {
            state: State::Initialized,
            redirect,
        }
    }

    /// The scheduler accepted the request.
    ///
    /// This may lose the race against
    /// [`will_execute_request`][Transaction::will_execute_request]; a late
    /// call is dropped.
    pub fn request_was_queued(&mut self, scheduler: SharedScheduler) {
        if matches!(self.state, State::Initialized) {
            debug!("request queued");
            self.state = State::Queued(scheduler);
        }
    }

    /// An executor picked the request up. Returns `false` if the request
    /// was cancelled before execution could start.
    pub fn will_execute_request(&mut self, executor: SharedExecutor) -> bool {
        match mem::replace(&mut self.state, State::Modifying) {
            State::Initialized | State::Queued(_) => {
                debug!("request executing");
                self.state = State::Executing(
                    executor,
                    RequestStream::Initialized,
                    ResponseStream::Initialized,
                );
                true
            }
            state @ State::Finished(Some(_)) => {
                self.state = state;
                false
            }
            state => unreachable!("willExecuteRequest in state {:?}", state),
        }
    }
}

// //////////////////////////////////////////////////////////////////////////////////////////// REQUEST BODY

impl Transaction {
    /// The connection side wants the body producer running.
    pub fn resume_request_body_stream(&mut self) -> ResumeAction {
        match mem::replace(&mut self.state, State::Modifying) {
            State::Executing(executor, RequestStream::Initialized, response) => {
                self.state = State::Executing(executor, RequestStream::Producing, response);
                ResumeAction::StartWriter
            }
            State::Executing(executor, RequestStream::Paused(pending), response) => {
                self.state = State::Executing(executor, RequestStream::Producing, response);
                match pending {
                    Some(pending) => ResumeAction::SucceedAck(pending.ack),
                    None => ResumeAction::None,
                }
            }
            state @ (State::Executing(_, RequestStream::Finished, _)
            | State::Redirected(..)
            | State::Finished(_)) => {
                self.state = state;
                ResumeAction::None
            }
            state => unreachable!("resume request body stream in state {:?}", state),
        }
    }

    /// The connection side wants the body producer stopped.
    pub fn pause_request_body_stream(&mut self) {
        match mem::replace(&mut self.state, State::Modifying) {
            State::Executing(executor, RequestStream::Producing, response) => {
                self.state =
                    State::Executing(executor, RequestStream::Paused(None), response);
            }
            // Already paused, not yet started, finished, redirected or
            // over: nothing to stop.
            state @ (State::Executing(..) | State::Redirected(..) | State::Finished(_)) => {
                self.state = state;
            }
            state => unreachable!("pause request body stream in state {:?}", state),
        }
    }

    /// The producer hands over the next body part.
    pub fn write_next_request_part(&mut self, part: Bytes) -> WriteAction {
        match mem::replace(&mut self.state, State::Modifying) {
            State::Executing(executor, RequestStream::Producing, response) => {
                let ack = WriteAck::completed();
                self.state =
                    State::Executing(executor.clone(), RequestStream::Producing, response);
                WriteAction::Write {
                    part,
                    executor,
                    ack,
                }
            }
            State::Executing(executor, RequestStream::Paused(pending), response) => {
                // At most one acknowledgement is outstanding; a repeated
                // write hands the same one out again.
                let pending = pending.unwrap_or_else(PendingAck::new);
                let future = pending.future.clone();
                self.state = State::Executing(
                    executor.clone(),
                    RequestStream::Paused(Some(pending)),
                    response,
                );
                WriteAction::Write {
                    part,
                    executor,
                    ack: future,
                }
            }
            State::Executing(_, RequestStream::Finished, _) => {
                let error = Error::WriteAfterRequestSent;
                self.state = State::Finished(Some(error.clone()));
                debug!("write after request end, task failed");
                WriteAction::FailTask(error)
            }
            state @ (State::Redirected(..) | State::Finished(_)) => {
                self.state = state;
                WriteAction::FailFuture(Error::RequestStreamCancelled)
            }
            state => unreachable!("write next request part in state {:?}", state),
        }
    }

    /// The producer is done, successfully or not.
    pub fn finish_request_body_stream(&mut self, result: Result<(), Error>) -> FinishAction {
        match mem::replace(&mut self.state, State::Modifying) {
            State::Executing(
                executor,
                request @ (RequestStream::Producing | RequestStream::Paused(_)),
                response,
            ) => {
                let ack = match request {
                    RequestStream::Paused(Some(pending)) => Some(pending.ack),
                    _ => None,
                };

                match result {
                    Ok(()) => {
                        self.state = State::Executing(
                            executor.clone(),
                            RequestStream::Finished,
                            response,
                        );
                        FinishAction::ForwardStreamFinished { executor, ack }
                    }
                    Err(error) => {
                        self.state = State::Finished(Some(error.clone()));
                        debug!("request body stream failed: {}", error);
                        FinishAction::ForwardStreamFailureAndFailTask {
                            executor,
                            error,
                            ack,
                        }
                    }
                }
            }
            state @ (State::Redirected(..) | State::Finished(_)) => {
                self.state = state;
                FinishAction::None
            }
            state => unreachable!("finish request body stream in state {:?}", state),
        }
    }
}

// //////////////////////////////////////////////////////////////////////////////////////////// RESPONSE

impl Transaction {
    /// The connection side forwarded the response head.
    ///
    /// Returns whether the head is for the delegate. `false` means the
    /// redirect predicate intercepted it.
    pub fn receive_response_head(&mut self, head: ResponseHead) -> bool {
        match mem::replace(&mut self.state, State::Modifying) {
            State::Executing(executor, request, ResponseStream::Initialized) => {
                let target = self
                    .redirect
                    .as_ref()
                    .and_then(|predicate| predicate(head.status, &head.headers));

                if let Some(target) = target {
                    debug!("response {} redirects to {}", head.status, target);
                    // Dropping the executing payload fails a pending write
                    // acknowledgement, holding the producer off.
                    drop((executor, request));
                    self.state = State::Redirected(head, target);
                    return false;
                }

                self.state = State::Executing(
                    executor,
                    request,
                    ResponseStream::Buffering(VecDeque::new(), Next::AskExecutorForMore),
                );
                true
            }
            state @ State::Finished(_) => {
                // The executor can race a cancellation.
                self.state = state;
                false
            }
            state => unreachable!("response head in state {:?}", state),
        }
    }

    /// The connection side forwarded a batch of body parts.
    ///
    /// Returns a chunk to deliver right away if the consumer was waiting
    /// for it.
    pub fn receive_response_body_parts(&mut self, parts: VecDeque<Bytes>) -> Option<Bytes> {
        match mem::replace(&mut self.state, State::Modifying) {
            State::Executing(
                executor,
                request,
                ResponseStream::Buffering(mut buffer, Next::AskExecutorForMore),
            ) => {
                buffer.extend(parts);
                self.state = State::Executing(
                    executor,
                    request,
                    ResponseStream::Buffering(buffer, Next::AskExecutorForMore),
                );
                None
            }
            State::Executing(executor, request, ResponseStream::WaitingForRemote) => {
                let mut parts = parts;
                match parts.pop_front() {
                    Some(first) => {
                        self.state = State::Executing(
                            executor,
                            request,
                            ResponseStream::Buffering(parts, Next::AskExecutorForMore),
                        );
                        Some(first)
                    }
                    None => {
                        self.state =
                            State::Executing(executor, request, ResponseStream::WaitingForRemote);
                        None
                    }
                }
            }
            state @ State::Executing(_, _, ResponseStream::Buffering(_, Next::Error(_))) => {
                // The executor was cancelled but a batch was in flight.
                self.state = state;
                None
            }
            state @ (State::Redirected(..) | State::Finished(_)) => {
                // Intercepted or cancelled; chunks never reach the
                // delegate.
                self.state = state;
                None
            }
            state => unreachable!("response body parts in state {:?}", state),
        }
    }

    /// The connection side reported the response complete, with whatever
    /// was still buffered there.
    pub fn succeed_request(&mut self, final_parts: VecDeque<Bytes>) -> ReceiveResponseEndAction {
        match mem::replace(&mut self.state, State::Modifying) {
            State::Redirected(head, target) => {
                self.state = State::Finished(None);
                debug!("request finished as redirect to {}", target);
                ReceiveResponseEndAction::Redirect { head, target }
            }
            State::Executing(
                executor,
                request,
                ResponseStream::Buffering(mut buffer, Next::AskExecutorForMore),
            ) => {
                buffer.extend(final_parts);
                if buffer.is_empty() {
                    self.state = State::Finished(None);
                    debug!("request finished");
                    ReceiveResponseEndAction::SucceedRequest
                } else {
                    // The consumer is busy; it drains the rest and then
                    // runs into the end of file marker.
                    self.state = State::Executing(
                        executor,
                        request,
                        ResponseStream::Buffering(buffer, Next::Eof),
                    );
                    ReceiveResponseEndAction::None
                }
            }
            State::Executing(executor, request, ResponseStream::WaitingForRemote) => {
                let mut buffer = final_parts;
                match buffer.pop_front() {
                    Some(first) => {
                        self.state = State::Executing(
                            executor,
                            request,
                            ResponseStream::Buffering(buffer, Next::Eof),
                        );
                        ReceiveResponseEndAction::Consume(first)
                    }
                    None => {
                        self.state = State::Finished(None);
                        debug!("request finished");
                        ReceiveResponseEndAction::SucceedRequest
                    }
                }
            }
            state @ (State::Executing(_, _, ResponseStream::Buffering(_, Next::Error(_)))
            | State::Finished(_)) => {
                // Already failing or finished; a late end changes nothing.
                self.state = state;
                ReceiveResponseEndAction::None
            }
            state => unreachable!("response end in state {:?}", state),
        }
    }

    /// The consumer reports how the previous chunk went and asks for the
    /// next one.
    pub fn consume_more_body_data(&mut self, previous: Result<(), Error>) -> ConsumeAction {
        if let Err(error) = previous {
            return self.fail_with_consumption_error(error);
        }

        match mem::replace(&mut self.state, State::Modifying) {
            State::Executing(executor, request, ResponseStream::Buffering(mut buffer, next)) => {
                if let Some(chunk) = buffer.pop_front() {
                    self.state = State::Executing(
                        executor,
                        request,
                        ResponseStream::Buffering(buffer, next),
                    );
                    return ConsumeAction::Consume(chunk);
                }

                match next {
                    Next::AskExecutorForMore => {
                        self.state = State::Executing(
                            executor.clone(),
                            request,
                            ResponseStream::WaitingForRemote,
                        );
                        ConsumeAction::RequestMoreFromExecutor(executor)
                    }
                    Next::Eof => {
                        self.state = State::Finished(None);
                        debug!("response stream drained, request finished");
                        ConsumeAction::FinishStream
                    }
                    Next::Error(error) => {
                        self.state = State::Finished(Some(error.clone()));
                        ConsumeAction::FailTask {
                            error,
                            // The connection is already being torn down.
                            cancel_executor: None,
                        }
                    }
                }
            }
            state @ State::Finished(_) => {
                // The task failed while the consumer was mid-chunk.
                self.state = state;
                ConsumeAction::None
            }
            state => unreachable!("consume more body data in state {:?}", state),
        }
    }

    fn fail_with_consumption_error(&mut self, error: Error) -> ConsumeAction {
        match mem::replace(&mut self.state, State::Modifying) {
            State::Executing(_, _, ResponseStream::Buffering(_, Next::Error(stored))) => {
                // The connection error came first and the executor is
                // already gone; it wins over the consumer's error.
                self.state = State::Finished(Some(stored.clone()));
                ConsumeAction::FailTask {
                    error: stored,
                    cancel_executor: None,
                }
            }
            State::Executing(executor, _, ResponseStream::Buffering(..)) => {
                self.state = State::Finished(Some(error.clone()));
                ConsumeAction::FailTask {
                    error,
                    cancel_executor: Some(executor),
                }
            }
            state @ State::Finished(_) => {
                self.state = state;
                ConsumeAction::None
            }
            state => unreachable!("consumption error in state {:?}", state),
        }
    }
}

// //////////////////////////////////////////////////////////////////////////////////////////// FAILURE

impl Transaction {
    /// Cancel or fail the request, whatever state it is in.
    pub fn fail(&mut self, error: Error) -> FailAction {
        match mem::replace(&mut self.state, State::Modifying) {
            State::Initialized => {
                self.state = State::Finished(Some(error));
                FailAction::FailTask {
                    scheduler: None,
                    executor: None,
                }
            }
            State::Queued(scheduler) => {
                self.state = State::Finished(Some(error));
                FailAction::FailTask {
                    scheduler: Some(scheduler),
                    executor: None,
                }
            }
            State::Executing(executor, request, ResponseStream::Buffering(buffer, Next::Eof)) => {
                // The response is fully received. Let the consumer drain
                // what is buffered; it observes the error at the end.
                self.state = State::Executing(
                    executor.clone(),
                    request,
                    ResponseStream::Buffering(buffer, Next::Error(error)),
                );
                FailAction::CancelExecutor(executor)
            }
            State::Executing(
                executor,
                request,
                ResponseStream::Buffering(buffer, Next::Error(stored)),
            ) => {
                // First error wins.
                self.state = State::Executing(
                    executor.clone(),
                    request,
                    ResponseStream::Buffering(buffer, Next::Error(stored)),
                );
                FailAction::CancelExecutor(executor)
            }
            State::Executing(executor, _, _) => {
                self.state = State::Finished(Some(error));
                FailAction::FailTask {
                    scheduler: None,
                    executor: Some(executor),
                }
            }
            State::Redirected(..) => {
                self.state = State::Finished(Some(error));
                FailAction::FailTask {
                    scheduler: None,
                    executor: None,
                }
            }
            state @ State::Finished(_) => {
                self.state = state;
                FailAction::None
            }
            State::Modifying => unreachable!("failure in modifying state"),
        }
    }
}

// ////////////////////////////////////////////////////////////////////////////////////////////

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Transaction({:?})", self.state)
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Initialized => write!(f, "Initialized"),
            State::Queued(_) => write!(f, "Queued"),
            State::Executing(_, request, response) => {
                write!(f, "Executing({:?}, {:?})", request, response)
            }
            State::Redirected(_, target) => write!(f, "Redirected({})", target),
            State::Finished(error) => write!(f, "Finished({:?})", error),
            State::Modifying => write!(f, "Modifying"),
        }
    }
}

impl fmt::Debug for RequestStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestStream::Initialized => write!(f, "Initialized"),
            RequestStream::Producing => write!(f, "Producing"),
            RequestStream::Paused(Some(_)) => write!(f, "Paused(ack)"),
            RequestStream::Paused(None) => write!(f, "Paused"),
            RequestStream::Finished => write!(f, "Finished"),
        }
    }
}

impl fmt::Debug for ResponseStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseStream::Initialized => write!(f, "Initialized"),
            ResponseStream::Buffering(buffer, next) => {
                write!(f, "Buffering({} chunks, {:?})", buffer.len(), next)
            }
            ResponseStream::WaitingForRemote => write!(f, "WaitingForRemote"),
        }
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Next::AskExecutorForMore => write!(f, "AskExecutorForMore"),
            Next::Eof => write!(f, "Eof"),
            Next::Error(error) => write!(f, "Error({:?})", error),
        }
    }
}
