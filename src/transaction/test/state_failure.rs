use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;

use crate::transaction::{ConsumeAction, FailAction, ReceiveResponseEndAction};
use crate::Error;

use super::scenario::{response_head, Scenario};

fn part(data: &'static [u8]) -> Bytes {
    Bytes::from_static(data)
}

fn parts(data: &[&'static [u8]]) -> VecDeque<Bytes> {
    data.iter().copied().map(Bytes::from_static).collect()
}

#[test]
fn fail_while_executing_cancels_the_executor() {
    let scenario = Scenario::builder().build();
    let (mut transaction, executor) = scenario.to_buffering(200);

    let action = transaction.fail(Error::Cancelled);
    match action {
        FailAction::FailTask {
            scheduler: None,
            executor: Some(e),
        } => assert!(Arc::ptr_eq(&e, &executor)),
        _ => panic!("expected FailTask with the executor"),
    }
}

#[test]
fn fail_before_response_head_cancels_the_executor() {
    let scenario = Scenario::builder().build();
    let (mut transaction, executor) = scenario.to_producing();

    let action = transaction.fail(Error::ConnectTimeout);
    match action {
        FailAction::FailTask {
            scheduler: None,
            executor: Some(e),
        } => assert!(Arc::ptr_eq(&e, &executor)),
        _ => panic!("expected FailTask with the executor"),
    }
}

#[test]
fn fail_while_waiting_for_remote_cancels_the_executor() {
    let scenario = Scenario::builder().build();
    let (mut transaction, _executor) = scenario.to_waiting_for_remote(200);

    let action = transaction.fail(Error::RemoteConnectionClosed);
    assert!(matches!(
        action,
        FailAction::FailTask {
            scheduler: None,
            executor: Some(_),
        }
    ));
}

#[test]
fn fail_after_response_end_lets_the_consumer_drain() {
    let scenario = Scenario::builder().build();
    let (mut transaction, executor) = scenario.to_buffering(200);

    transaction.receive_response_body_parts(parts(&[b"one"]));
    assert!(matches!(
        transaction.succeed_request(VecDeque::new()),
        ReceiveResponseEndAction::None
    ));

    // The error replaces the end of file marker; the buffered data is
    // still delivered first.
    let action = transaction.fail(Error::RemoteConnectionClosed);
    match action {
        FailAction::CancelExecutor(e) => assert!(Arc::ptr_eq(&e, &executor)),
        _ => panic!("expected CancelExecutor"),
    }

    match transaction.consume_more_body_data(Ok(())) {
        ConsumeAction::Consume(chunk) => assert_eq!(chunk, part(b"one")),
        _ => panic!("expected Consume"),
    }
    match transaction.consume_more_body_data(Ok(())) {
        ConsumeAction::FailTask {
            error,
            cancel_executor: None,
        } => assert_eq!(error, Error::RemoteConnectionClosed),
        _ => panic!("expected FailTask"),
    }
}

// The consumer's own error loses against an error that arrived from the
// connection first.
#[test]
fn first_error_wins_over_consumption_error() {
    let scenario = Scenario::builder().build();
    let (mut transaction, _executor) = scenario.to_buffering(200);

    transaction.receive_response_body_parts(parts(&[b"one"]));
    transaction.succeed_request(VecDeque::new());

    assert!(matches!(
        transaction.fail(Error::RemoteConnectionClosed),
        FailAction::CancelExecutor(_)
    ));

    let action = transaction.consume_more_body_data(Err(Error::Cancelled));
    match action {
        ConsumeAction::FailTask {
            error,
            cancel_executor,
        } => {
            assert_eq!(error, Error::RemoteConnectionClosed);
            // The executor is already dead.
            assert!(cancel_executor.is_none());
        }
        _ => panic!("expected FailTask"),
    }
}

#[test]
fn double_fail_keeps_the_first_error() {
    let scenario = Scenario::builder().build();
    let (mut transaction, _executor) = scenario.to_buffering(200);

    transaction.receive_response_body_parts(parts(&[b"one"]));
    transaction.succeed_request(VecDeque::new());

    assert!(matches!(
        transaction.fail(Error::RemoteConnectionClosed),
        FailAction::CancelExecutor(_)
    ));
    assert!(matches!(
        transaction.fail(Error::Cancelled),
        FailAction::CancelExecutor(_)
    ));

    transaction.consume_more_body_data(Ok(()));
    match transaction.consume_more_body_data(Ok(())) {
        ConsumeAction::FailTask { error, .. } => {
            assert_eq!(error, Error::RemoteConnectionClosed);
        }
        _ => panic!("expected FailTask"),
    }
}

#[test]
fn consumption_error_cancels_the_executor() {
    let scenario = Scenario::builder().build();
    let (mut transaction, executor) = scenario.to_buffering(200);

    let action = transaction.consume_more_body_data(Err(Error::Cancelled));
    match action {
        ConsumeAction::FailTask {
            error,
            cancel_executor: Some(e),
        } => {
            assert_eq!(error, Error::Cancelled);
            assert!(Arc::ptr_eq(&e, &executor));
        }
        _ => panic!("expected FailTask"),
    }
}

#[test]
fn fail_after_redirect_interception() {
    let scenario = Scenario::builder()
        .redirect_to("https://elsewhere.test")
        .build();
    let (mut transaction, _executor) = scenario.to_producing();

    assert!(!transaction.receive_response_head(response_head(302)));

    let action = transaction.fail(Error::Cancelled);
    assert!(matches!(
        action,
        FailAction::FailTask {
            scheduler: None,
            executor: None,
        }
    ));
}

#[test]
fn fail_on_a_finished_transaction_is_ignored() {
    let scenario = Scenario::builder().build();
    let (mut transaction, _executor) = scenario.to_buffering(200);

    assert!(matches!(
        transaction.succeed_request(VecDeque::new()),
        ReceiveResponseEndAction::SucceedRequest
    ));

    assert!(matches!(
        transaction.fail(Error::Cancelled),
        FailAction::None
    ));
}

#[test]
fn consume_round_trip_after_task_failure_is_ignored() {
    let scenario = Scenario::builder().build();
    let (mut transaction, _executor) = scenario.to_buffering(200);

    // The task fails outright while the consumer is mid-chunk.
    assert!(matches!(
        transaction.fail(Error::Cancelled),
        FailAction::FailTask { .. }
    ));

    assert!(matches!(
        transaction.consume_more_body_data(Ok(())),
        ConsumeAction::None
    ));
}

#[test]
fn late_response_events_after_failure_are_dropped() {
    let scenario = Scenario::builder().build();
    let (mut transaction, _executor) = scenario.to_buffering(200);

    transaction.fail(Error::Cancelled);

    assert!(!transaction.receive_response_head(response_head(200)));
    assert_eq!(
        transaction.receive_response_body_parts(parts(&[b"late"])),
        None
    );
    assert!(matches!(
        transaction.succeed_request(VecDeque::new()),
        ReceiveResponseEndAction::None
    ));
}
