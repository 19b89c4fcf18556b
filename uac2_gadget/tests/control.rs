mod common;

use common::*;
use uac2_gadget::{ControlError, GadgetConfig, SetupOutcome, Speed};
use uac2_proto::{
    Direction,
    control::{self, CS_CLOCK_VALID_CONTROL, CS_SAM_FREQ_CONTROL, CUR, RANGE, RequestError},
    request::SetupPacket,
};

const GET: u8 = 0xa1;
const SET: u8 = 0x21;

fn clock_request(
    request_type: u8,
    request: u8,
    selector: u8,
    direction: Direction,
    length: u16,
) -> SetupPacket {
    SetupPacket {
        bm_request_type: request_type,
        b_request: request,
        w_value: u16::from(selector) << 8,
        w_index: u16::from(control::clock_id(direction)) << 8 | u16::from(CONTROL),
        w_length: length,
    }
}

fn get(
    function: &Function,
    request: u8,
    selector: u8,
    direction: Direction,
    length: u16,
) -> (Vec<u8>, bool) {
    match function.setup(&clock_request(GET, request, selector, direction, length)) {
        Ok(SetupOutcome::DataIn { data, zero }) => (data.to_vec(), zero),
        other => panic!("unexpected outcome {other:?}"),
    }
}

fn set_rate(function: &Function, direction: Direction, hz: u32) -> Result<u32, ControlError> {
    let setup = clock_request(SET, CUR, CS_SAM_FREQ_CONTROL, direction, 4);

    let Ok(SetupOutcome::DataOut { length: 4, pending }) = function.setup(&setup) else {
        panic!("SET CUR refused at the setup stage");
    };
    assert_eq!(pending.direction(), direction);

    function
        .complete_control(pending, &hz.to_le_bytes())
        .map(|rate| rate.get())
}

#[test]
fn reports_the_current_rate() {
    let mut config = GadgetConfig::default();
    config.capture.sample_rate = 44_100;
    let (function, _events) = function_with(config, Speed::High);

    let (data, zero) = get(&function, CUR, CS_SAM_FREQ_CONTROL, Direction::Playback, 4);
    assert_eq!(data, 48_000u32.to_le_bytes());
    assert!(!zero);

    let (data, _) = get(&function, CUR, CS_SAM_FREQ_CONTROL, Direction::Capture, 4);
    assert_eq!(data, 44_100u32.to_le_bytes());
}

#[test]
fn short_responses_are_zero_terminated() {
    let (function, _events) = function();

    let (data, zero) = get(&function, CUR, CS_SAM_FREQ_CONTROL, Direction::Playback, 64);
    assert_eq!(data.len(), 4);
    assert!(zero);
}

#[test]
fn reports_a_single_discrete_range() {
    let (function, _events) = function();

    let (data, zero) = get(&function, RANGE, CS_SAM_FREQ_CONTROL, Direction::Capture, 14);

    // MIN = MAX = 48000, RES = 0
    let mut expected = vec![1, 0];
    expected.extend(48_000u32.to_le_bytes());
    expected.extend(48_000u32.to_le_bytes());
    expected.extend([0; 4]);
    assert_eq!(data, expected);
    assert!(!zero);

    // hosts often read the sub-range count first
    let (data, zero) = get(&function, RANGE, CS_SAM_FREQ_CONTROL, Direction::Capture, 2);
    assert_eq!(data, [1, 0]);
    assert!(!zero);
}

#[test]
fn clocks_are_always_valid() {
    let (function, _events) = function();

    for direction in Direction::ALL {
        let (data, _) = get(&function, CUR, CS_CLOCK_VALID_CONTROL, direction, 1);
        assert_eq!(data, [1]);
    }
}

#[test]
fn setting_a_supported_rate() {
    let (function, _events) = function();

    assert_eq!(set_rate(&function, Direction::Playback, 44_100), Ok(44_100));

    assert_eq!(function.sample_rate(Direction::Playback).get(), 44_100);
    assert_eq!(function.clock_label(Direction::Playback), "44100Hz");
    assert_eq!(function.clock_label(Direction::Capture), "48000Hz");

    let (data, _) = get(&function, CUR, CS_SAM_FREQ_CONTROL, Direction::Playback, 4);
    assert_eq!(data, 44_100u32.to_le_bytes());

    let hw = function.pcm_hardware(Direction::Playback);
    assert_eq!(hw.rate, 44_100);
}

#[test]
fn unsupported_rates_keep_the_current_one() {
    let (function, _events) = function();

    assert_eq!(
        set_rate(&function, Direction::Capture, 96_000),
        Err(ControlError::UnsupportedRate(96_000))
    );
    assert_eq!(
        set_rate(&function, Direction::Capture, 0),
        Err(ControlError::UnsupportedRate(0))
    );
    assert_eq!(function.sample_rate(Direction::Capture).get(), 48_000);
}

#[test]
fn short_data_stages_are_refused() {
    let (function, _events) = function();

    let setup = clock_request(SET, CUR, CS_SAM_FREQ_CONTROL, Direction::Playback, 4);
    let Ok(SetupOutcome::DataOut { pending, .. }) = function.setup(&setup) else {
        panic!("SET CUR refused at the setup stage");
    };

    assert_eq!(
        function.complete_control(pending, &[0x44, 0xac]),
        Err(ControlError::ShortDataStage(2))
    );
    assert_eq!(function.sample_rate(Direction::Playback).get(), 48_000);
}

#[test]
fn rate_changes_apply_to_the_running_stream() {
    let (function, _events) = function();
    function.set_alt(PLAYBACK, STEREO_S16).unwrap();

    assert_eq!(cycle(&function, Direction::Playback), 192);

    set_rate(&function, Direction::Playback, 44_100).unwrap();

    let lengths: Vec<_> = (0..10).map(|_| cycle(&function, Direction::Playback)).collect();
    assert_eq!(lengths.iter().sum::<usize>(), 1764);
    assert_eq!(lengths[0], 176);
}

#[test]
fn unsupported_requests_are_refused() {
    let (function, _events) = function();

    let unsupported = |setup: SetupPacket| match function.setup(&setup) {
        Err(ControlError::Unsupported(e)) => e,
        other => panic!("{setup:?} was accepted: {other:?}"),
    };

    // standard GET_STATUS on the interface
    let mut setup = clock_request(GET, CUR, CS_SAM_FREQ_CONTROL, Direction::Playback, 4);
    setup.bm_request_type = 0x81;
    assert_eq!(unsupported(setup), RequestError::NotClass);

    // addressed to an endpoint
    let mut setup = clock_request(GET, CUR, CS_SAM_FREQ_CONTROL, Direction::Playback, 4);
    setup.bm_request_type = 0xa2;
    assert_eq!(unsupported(setup), RequestError::NotInterface);

    // a streaming interface
    let mut setup = clock_request(GET, CUR, CS_SAM_FREQ_CONTROL, Direction::Playback, 4);
    setup.w_index = u16::from(control::USB_IN_CLOCK_ID) << 8 | u16::from(PLAYBACK);
    assert_eq!(unsupported(setup), RequestError::WrongInterface(PLAYBACK));

    // not a clock source
    let mut setup = clock_request(GET, CUR, CS_SAM_FREQ_CONTROL, Direction::Playback, 4);
    setup.w_index = 5 << 8;
    assert_eq!(unsupported(setup), RequestError::UnknownEntity(5));

    // SET RANGE
    let setup = clock_request(SET, RANGE, CS_SAM_FREQ_CONTROL, Direction::Capture, 14);
    assert_eq!(unsupported(setup), RequestError::UnknownRequest(RANGE));

    // SET CUR on the validity control
    let setup = clock_request(SET, CUR, CS_CLOCK_VALID_CONTROL, Direction::Capture, 1);
    assert_eq!(unsupported(setup), RequestError::UnknownSelector(CS_CLOCK_VALID_CONTROL));

    // clock multiplier control
    let setup = clock_request(GET, CUR, 0x03, Direction::Capture, 4);
    assert_eq!(unsupported(setup), RequestError::UnknownSelector(0x03));
}

#[test]
fn setup_packets_decode_from_the_wire() {
    let (function, _events) = function();

    // GET CUR, sampling frequency of clock 10, interface 0
    let setup = SetupPacket::from_bytes([0xa1, 0x01, 0x00, 0x01, 0x00, 0x0a, 0x04, 0x00]);

    let Ok(SetupOutcome::DataIn { data, .. }) = function.setup(&setup) else {
        panic!("GET CUR refused");
    };
    assert_eq!(data.as_slice(), 48_000u32.to_le_bytes());
}
