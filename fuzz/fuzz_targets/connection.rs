#![no_main]

use bytes::Bytes;
use http::{Method, StatusCode, Uri};
use libfuzzer_sys::fuzz_target;
use reqstate::connection::{Action, RequestStateMachine, ResponsePart};
use reqstate::{BodyFraming, Error, RequestHead, ResponseHead};

// Status codes that drive the interesting branches: informational,
// success, and the upload short-circuit.
const STATUS_CODES: &[u16] = &[100, 102, 103, 200, 201, 204, 301, 302, 400, 404, 500, 503];

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }

    // Machine configuration from the first bytes.
    let writable = data[0] & 1 == 0;
    let framing = match data[1] % 3 {
        0 => BodyFraming::None,
        1 => BodyFraming::FixedSize((data[2] % 32) as u64),
        _ => BodyFraming::Stream,
    };

    let mut machine = RequestStateMachine::new(writable);

    // Shadow state for issuing only ordering-legal events. Everything the
    // shadow allows must never panic; terminal actions must come at most
    // once.
    let mut started = false;
    let mut head_written = false;
    let mut body_open = false;
    let mut end_sent = false;
    let mut response_phase = 0u8; // 0 = no head, 1 = receiving body, 2 = ended
    let mut channel_writable = writable;
    let mut terminals = 0u32;

    let observe = |action: &Action,
                       head_written: &mut bool,
                       body_open: &mut bool,
                       end_sent: &mut bool,
                       terminals: &mut u32| {
        match action {
            Action::SendRequestHead { start_body, .. } => {
                *head_written = true;
                if *start_body {
                    *body_open = true;
                } else {
                    *end_sent = true;
                }
            }
            Action::SendRequestEnd => {
                *body_open = false;
                *end_sent = true;
            }
            Action::SucceedRequest { .. } | Action::FailRequest { .. } => {
                *terminals += 1;
            }
            _ => {}
        }
    };

    let mut input = data[3..].iter().copied();

    while let (Some(op), Some(arg)) = (input.next(), input.next()) {
        let terminal = terminals > 0;

        let action = match op % 14 {
            0 => {
                if started || terminal {
                    continue;
                }
                started = true;
                machine.start(
                    RequestHead::new(Method::POST, Uri::from_static("https://fuzz.test/")),
                    framing,
                )
            }
            1 => {
                channel_writable = !channel_writable;
                machine.writability_changed(channel_writable)
            }
            2 => {
                if !(body_open || terminal) {
                    continue;
                }
                machine.request_stream_part_received(Bytes::from(vec![b'x'; (arg % 16) as usize]))
            }
            3 => {
                if !(body_open || terminal) {
                    continue;
                }
                machine.request_stream_finished()
            }
            4 => {
                if !(terminal || (head_written && response_phase == 0)) {
                    continue;
                }
                let status = STATUS_CODES[(arg as usize) % STATUS_CODES.len()];
                if !terminal && status >= 200 {
                    response_phase = 1;
                }
                machine.channel_read(ResponsePart::Head(ResponseHead::new(
                    StatusCode::from_u16(status).unwrap(),
                )))
            }
            5 => {
                if !(terminal || (head_written && response_phase == 1)) {
                    continue;
                }
                machine.channel_read(ResponsePart::Body(Bytes::from_static(b"data")))
            }
            6 => {
                if !(terminal || (head_written && response_phase == 1)) {
                    continue;
                }
                if !terminal {
                    response_phase = 2;
                }
                machine.channel_read(ResponsePart::End)
            }
            7 => machine.channel_read_complete(),
            8 => machine.read(),
            9 => machine.demand_more_response_body_parts(),
            10 => {
                if !(end_sent || terminal) {
                    continue;
                }
                machine.idle_read_timeout_triggered()
            }
            11 => machine.request_cancelled(),
            12 => machine.channel_inactive(),
            _ => machine.error_happened(Error::RemoteConnectionClosed),
        };

        observe(
            &action,
            &mut head_written,
            &mut body_open,
            &mut end_sent,
            &mut terminals,
        );
    }

    // Exactly-once terminal delivery.
    assert!(terminals <= 1, "more than one terminal action emitted");
});
