use std::sync::Arc;

use bytes::Bytes;
use http::{StatusCode, Uri};

use crate::executor::{RequestExecutor, RequestScheduler, SharedExecutor, SharedScheduler};
use crate::head::ResponseHead;
use crate::transaction::{ConsumeAction, RedirectPredicate, ResumeAction, Transaction};

pub struct NoopExecutor;

impl RequestExecutor for NoopExecutor {
    fn write_request_body_part(&self, _part: Bytes) {}
    fn finish_request_body_stream(&self) {}
    fn demand_response_body_stream(&self) {}
    fn cancel_request(&self) {}
}

pub struct NoopScheduler;

impl RequestScheduler for NoopScheduler {
    fn cancel_request(&self) {}
}

pub fn executor() -> SharedExecutor {
    Arc::new(NoopExecutor)
}

pub fn scheduler() -> SharedScheduler {
    Arc::new(NoopScheduler)
}

pub fn response_head(status: u16) -> ResponseHead {
    ResponseHead::new(StatusCode::from_u16(status).unwrap())
}

/// Drives a transaction into a named state for the `state_*` tests.
pub struct Scenario {
    redirect_target: Option<Uri>,
}

#[derive(Default)]
pub struct ScenarioBuilder {
    redirect_target: Option<Uri>,
}

impl Scenario {
    pub fn builder() -> ScenarioBuilder {
        ScenarioBuilder::default()
    }

    fn predicate(&self) -> Option<RedirectPredicate> {
        let target = self.redirect_target.clone()?;
        Some(Box::new(move |status, _headers| {
            if status.is_redirection() {
                Some(target.clone())
            } else {
                None
            }
        }))
    }

    pub fn to_initialized(&self) -> Transaction {
        Transaction::new(self.predicate())
    }

    /// Bound to an executor, writer and reader untouched.
    pub fn to_executing(&self) -> (Transaction, SharedExecutor) {
        let mut transaction = self.to_initialized();
        let executor = executor();
        assert!(transaction.will_execute_request(executor.clone()));
        (transaction, executor)
    }

    /// The writer has been started.
    pub fn to_producing(&self) -> (Transaction, SharedExecutor) {
        let (mut transaction, executor) = self.to_executing();
        assert!(matches!(
            transaction.resume_request_body_stream(),
            ResumeAction::StartWriter
        ));
        (transaction, executor)
    }

    /// The writer has been started and paused again.
    pub fn to_paused(&self) -> (Transaction, SharedExecutor) {
        let (mut transaction, executor) = self.to_producing();
        transaction.pause_request_body_stream();
        (transaction, executor)
    }

    /// A response head was received and went to the delegate.
    pub fn to_buffering(&self, status: u16) -> (Transaction, SharedExecutor) {
        let (mut transaction, executor) = self.to_producing();
        assert!(transaction.receive_response_head(response_head(status)));
        (transaction, executor)
    }

    /// The consumer asked while the buffer was empty.
    pub fn to_waiting_for_remote(&self, status: u16) -> (Transaction, SharedExecutor) {
        let (mut transaction, executor) = self.to_buffering(status);
        assert!(matches!(
            transaction.consume_more_body_data(Ok(())),
            ConsumeAction::RequestMoreFromExecutor(_)
        ));
        (transaction, executor)
    }
}

impl ScenarioBuilder {
    pub fn redirect_to(mut self, target: &str) -> Self {
        self.redirect_target = Some(target.parse().unwrap());
        self
    }

    pub fn build(self) -> Scenario {
        Scenario {
            redirect_target: self.redirect_target,
        }
    }
}
