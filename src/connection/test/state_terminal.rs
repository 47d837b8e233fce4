use bytes::Bytes;

use crate::connection::{Action, ResponsePart};
use crate::{Error, FinalStreamAction};

use super::scenario::{response_head, Scenario};

#[test]
fn cancel_while_running_closes_channel() {
    let scenario = Scenario::builder().get("https://q.test").build();
    let mut machine = scenario.to_started();

    let action = machine.request_cancelled();
    assert!(matches!(
        action,
        Action::FailRequest {
            error: Error::Cancelled,
            final_action: FinalStreamAction::Close,
        }
    ));
}

#[test]
fn channel_inactive_fails_request() {
    let scenario = Scenario::builder().get("https://q.test").build();
    let mut machine = scenario.to_receiving_body(200);

    let action = machine.channel_inactive();
    assert!(matches!(
        action,
        Action::FailRequest {
            error: Error::RemoteConnectionClosed,
            final_action: FinalStreamAction::Close,
        }
    ));
}

#[test]
fn channel_error_fails_request() {
    let scenario = Scenario::builder().post("https://q.test").stream().build();
    let mut machine = scenario.to_started();

    let action = machine.error_happened(Error::UnsupportedApplicationProtocol("h9".into()));
    assert!(matches!(
        action,
        Action::FailRequest {
            error: Error::UnsupportedApplicationProtocol(_),
            final_action: FinalStreamAction::Close,
        }
    ));
}

#[test]
fn idle_read_timeout_after_end_sent() {
    let scenario = Scenario::builder().post("https://q.test").stream().build();
    let mut machine = scenario.to_end_sent();

    let action = machine.idle_read_timeout_triggered();
    assert!(matches!(
        action,
        Action::FailRequest {
            error: Error::ReadTimeout,
            final_action: FinalStreamAction::Close,
        }
    ));
}

#[test]
fn idle_read_timeout_racing_the_finish_is_dropped() {
    let scenario = Scenario::builder().get("https://q.test").build();
    let mut machine = scenario.to_receiving_body(200);

    let action = machine.channel_read(ResponsePart::End);
    assert!(matches!(action, Action::SucceedRequest { .. }));

    // The timer fired on the event loop before it could be cancelled.
    let action = machine.idle_read_timeout_triggered();
    assert!(matches!(action, Action::Wait));
}

#[test]
fn events_after_failure_are_dropped() {
    let scenario = Scenario::builder().post("https://q.test").stream().build();
    let mut machine = scenario.to_started();

    let action = machine.request_cancelled();
    assert!(matches!(action, Action::FailRequest { .. }));

    // Only one terminal action, everything after is absorbed.
    assert!(matches!(
        machine.request_stream_part_received(Bytes::from_static(b"x")),
        Action::Wait
    ));
    assert!(matches!(machine.request_stream_finished(), Action::Wait));
    assert!(matches!(
        machine.channel_read(ResponsePart::Head(response_head(200))),
        Action::Wait
    ));
    assert!(matches!(machine.channel_read(ResponsePart::End), Action::Wait));
    assert!(matches!(machine.channel_inactive(), Action::Wait));
    assert!(matches!(machine.request_cancelled(), Action::Wait));
}

#[test]
fn events_after_success_are_dropped() {
    let scenario = Scenario::builder().get("https://q.test").build();
    let mut machine = scenario.to_receiving_body(200);

    let action = machine.channel_read(ResponsePart::End);
    assert!(matches!(action, Action::SucceedRequest { .. }));

    assert!(matches!(machine.request_cancelled(), Action::Wait));
    assert!(matches!(machine.channel_inactive(), Action::Wait));
}

#[test]
fn failure_in_flight_body_part_is_not_resignaled() {
    let scenario = Scenario::builder().post("https://q.test").stream().build();
    let mut machine = scenario.to_started();

    machine.error_happened(Error::RemoteConnectionClosed);

    let action = machine.request_stream_part_received(Bytes::from_static(b"late"));
    assert!(matches!(action, Action::Wait));
}
