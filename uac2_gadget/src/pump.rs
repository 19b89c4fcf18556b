//! The transfer pump.
//!
//! While a direction is active, its whole transfer pool is in flight. Every completion
//! moves one packet between the transfer and the ring, then immediately hands the transfer
//! back to the transport:
//!
//! - **playback**: the packet sizer decides the length of the next packet, which is filled
//!   from the ring (or with silence while the audio subsystem isn't running),
//! - **capture**: whatever the host sent is copied into the ring (or discarded while the
//!   audio subsystem isn't running), and the transfer is resubmitted for a full packet.
//!
//! Nothing in here blocks or allocates, and nothing fails: errors are logged and counted
//! in the direction's [`StreamStats`](crate::StreamStats).
//!
//! A completion checks its transfer's generation and resubmits it under the stream's
//! gate, so a transfer of a previous activation is never handed back to the transport,
//! and the in-flight count only ever tracks the current pool.

use crate::{
    UacFunction,
    pcm::PcmEvents,
    stream::{Stream, StreamCounters},
    transport::{Rejected, Transfer, TransferStatus, Transport},
};
use core::sync::atomic::Ordering;
use uac2_proto::Direction;

impl<T: Transport, P: PcmEvents> UacFunction<T, P> {
    /// Hands a transfer the transport is done with back to the function.
    ///
    /// Must be called exactly once for every transfer [submitted](Transport::submit),
    /// including withdrawn ones. May be called from any context, including interrupt-like
    /// ones: this never blocks for longer than a few short critical sections.
    pub fn complete(&self, transfer: Transfer) {
        complete(self.stream(transfer.direction()), &self.transport, &self.pcm, transfer);
    }
}

fn complete(stream: &Stream, transport: &impl Transport, pcm: &impl PcmEvents, mut transfer: Transfer) {
    let counters = &stream.counters;

    let periods = {
        // the generation can't move on before the transfer is resubmitted
        let _gate = stream.gate.read();
        let generation = stream.generation.load(Ordering::Acquire);

        // Don't touch anything once the direction is disabled, or if the transfer belongs
        // to a previous activation.
        if transfer.status == TransferStatus::Shutdown
            || !stream.enabled.load(Ordering::Acquire)
            || transfer.generation() != generation
        {
            if transfer.generation() == generation {
                release_in_flight(stream);
            }
            StreamCounters::bump(&counters.dropped);
            return;
        }

        release_in_flight(stream);
        StreamCounters::bump(&counters.completions);

        let periods = if transfer.status == TransferStatus::Error {
            // resent as is
            StreamCounters::bump(&counters.transient_errors);
            log::warn!(
                "{}: transfer {} failed, skipping its payload",
                stream.direction,
                transfer.slot().0
            );
            0
        } else {
            match stream.direction {
                Direction::Playback => fill_playback(stream, &mut transfer),
                Direction::Capture => drain_capture(stream, &mut transfer),
            }
        };

        submit(stream, transport, transfer);
        periods
    };

    if periods > 0 && stream.open.load(Ordering::Acquire) {
        counters
            .periods_elapsed
            .fetch_add(periods as u64, Ordering::Relaxed);

        for _ in 0..periods {
            pcm.period_elapsed(stream.direction);
        }
    }
}

/// Sizes the next IN packet and fills it. Returns the number of periods crossed.
fn fill_playback(stream: &Stream, transfer: &mut Transfer) -> usize {
    let max_packet_size = stream.max_packet_size.load(Ordering::Relaxed);

    let len = stream
        .rate_match
        .lock()
        .sizer
        .as_mut()
        .map_or(max_packet_size, |sizer| sizer.next_len() as usize)
        .min(transfer.capacity());

    transfer.length = len;
    let payload = &mut transfer.buf_mut()[..len];

    if stream.running.load(Ordering::Acquire) {
        if let Some(periods) = stream.ring.pull(payload) {
            return periods;
        }
    }

    payload.fill(0);
    0
}

/// Moves a received OUT packet into the ring, and readies the transfer for the next one.
/// Returns the number of periods crossed.
fn drain_capture(stream: &Stream, transfer: &mut Transfer) -> usize {
    let periods = if stream.running.load(Ordering::Acquire) {
        stream.ring.push(transfer.received()).unwrap_or(0)
    } else {
        0
    };

    transfer.length = stream
        .max_packet_size
        .load(Ordering::Relaxed)
        .min(transfer.capacity());
    transfer.actual = 0;

    periods
}

/// Readies a freshly allocated transfer and submits it.
pub(crate) fn prime(stream: &Stream, transport: &impl Transport, mut transfer: Transfer) {
    match stream.direction {
        Direction::Playback => {
            fill_playback(stream, &mut transfer);
        }
        Direction::Capture => {
            drain_capture(stream, &mut transfer);
        }
    }

    submit(stream, transport, transfer);
}

/// Submits `transfer`. If the transport refuses it, it stays idle until the direction is
/// enabled again.
fn submit(stream: &Stream, transport: &impl Transport, transfer: Transfer) {
    let counters = &stream.counters;
    counters.in_flight.fetch_add(1, Ordering::AcqRel);

    if let Err(Rejected { transfer, error }) = transport.submit(transfer) {
        release_in_flight(stream);
        StreamCounters::bump(&counters.resubmit_failures);

        log::error!(
            "{}: failed to submit transfer {}: {error}",
            stream.direction,
            transfer.slot().0
        );

        let mut idle = stream.idle.lock();

        // capacity was reserved for the whole pool
        if idle.len() < idle.capacity()
            && transfer.generation() == stream.generation.load(Ordering::Acquire)
        {
            idle.push(transfer);
        }
    }
}

#[inline(always)]
fn release_in_flight(stream: &Stream) {
    let _ = stream
        .counters
        .in_flight
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
}
