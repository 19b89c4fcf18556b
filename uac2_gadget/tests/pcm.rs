mod common;

use common::*;
use std::{
    sync::atomic::{AtomicBool, Ordering},
    thread,
};
use uac2_gadget::{Error, GadgetConfig, Speed, StreamState, pcm};
use uac2_proto::{Direction, format::SampleFormat};
use uac2_utils::GeometryError;

#[test]
fn constraints_follow_the_stream_format() {
    let mut config = GadgetConfig::default();
    config.capture.channel_mask = 0x1;
    config.capture.subslot_size = 3;
    config.capture.bit_resolution = 24;
    let (function, _events) = function_with(config, Speed::High);

    let hw = function.pcm_hardware(Direction::Capture);
    assert_eq!(hw.rate, 48_000);
    assert_eq!(hw.channels, 1);
    assert_eq!(hw.format, SampleFormat::S24_3Le);
    assert_eq!(hw.buffer_bytes_max, pcm::BUFFER_BYTES_MAX);
    assert_eq!(hw.period_bytes_min, 512);
    assert_eq!(hw.period_bytes_max, pcm::PERIOD_BYTES_MAX);
    assert_eq!(hw.periods_min, pcm::PERIODS_MIN);
    assert_eq!(hw.periods_max, pcm::BUFFER_BYTES_MAX / 512);
}

#[test]
fn buffer_geometry_is_checked() {
    let (function, _events) = function();

    assert!(matches!(
        function.pcm_hw_params(Direction::Playback, 3000, 768),
        Err(Error::InvalidGeometry(GeometryError::Fractional { .. }))
    ));

    // period too small, too few periods, too large a buffer
    for (buffer_bytes, period_bytes) in [(2048, 256), (2048, 1024), (128 * 1024, 4096)] {
        assert!(matches!(
            function.pcm_hw_params(Direction::Playback, buffer_bytes, period_bytes),
            Err(Error::BufferBounds { .. })
        ));
    }

    function.pcm_hw_params(Direction::Playback, 4096, 1024).unwrap();
    assert!(function.pcm_write(Direction::Playback, 4000, &[1; 200]));

    // the write wrapped around the end of the area
    let mut head = [0; 104];
    assert!(function.pcm_read(Direction::Playback, 0, &mut head));
    assert_eq!(head, [1; 104]);

    function.pcm_hw_free(Direction::Playback);
    assert!(!function.pcm_write(Direction::Playback, 0, &[1]));
}

#[test]
fn closing_keeps_the_stream_streaming() {
    let (function, _events) = function();
    function.set_alt(PLAYBACK, STEREO_S16).unwrap();

    function.pcm_open(Direction::Playback).unwrap();
    function.pcm_close(Direction::Playback);

    // the host still gets (silent) packets
    assert_eq!(cycle(&function, Direction::Playback), 192);
    function.pcm_open(Direction::Playback).unwrap();
}

#[test]
fn a_stream_opened_while_tearing_down_gets_stopped() {
    let (function, _events) = function();
    let done = AtomicBool::new(false);

    thread::scope(|s| {
        s.spawn(|| {
            for _ in 0..500 {
                function.set_alt(PLAYBACK, STEREO_S16).unwrap();
                thread::yield_now();
                function.set_alt(PLAYBACK, 0).unwrap();
                function.transport().drain(Direction::Playback);
            }
            done.store(true, Ordering::SeqCst);
        });

        while !done.load(Ordering::SeqCst) {
            let stops = function.pcm().stops(Direction::Playback);

            if function.pcm_open(Direction::Playback).is_err() {
                thread::yield_now();
                continue;
            }

            // whichever teardown comes next has to stop it
            loop {
                let finished = done.load(Ordering::SeqCst);
                if function.pcm().stops(Direction::Playback) != stops {
                    break;
                }
                assert!(!finished, "an open stream was left on an inactive direction");
                thread::yield_now();
            }

            function.pcm_close(Direction::Playback);
        }
    });

    assert_eq!(function.state(Direction::Playback), StreamState::Inactive);
}
