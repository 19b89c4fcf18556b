//! Rate matching for device-to-host isochronous streams.
//!
//! Packets go out at a fixed rate, set by the endpoint's polling interval, but the audio
//! clock's rate is arbitrary: 44.1 kHz doesn't divide into 1000 packets a second. Without a
//! feedback endpoint, the device has to size every packet so that, on average, exactly
//! `sample_rate` frames a second reach the host.
//!
//! [`PacketSizer`] does so with integer arithmetic only. Every packet carries the whole
//! number of frames the packet rate allows, and the remainder accumulates in a residue
//! until it amounts to a whole frame, which is then added to the next packet. The residue
//! never grows past one frame's worth, so nothing drifts.

use core::num;

/// Computes the length, in bytes, of every outgoing packet of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PacketSizer {
    /// Transport clock ticks per second.
    tick_rate: num::NonZeroU32,
    frame_size: num::NonZeroU32,
    base_pktsize: u32,
    /// Added to `residue` after every packet.
    pktsize_residue: u64,
    // always < tick_rate * frame_size
    residue: u64,
}

impl PacketSizer {
    /// Creates a sizer for a stream of `sample_rate` frames of `frame_size` bytes a second,
    /// sent every `ticks_per_packet` ticks of a transport clock running at `tick_rate` ticks
    /// a second, with no packet larger than `max_packet_size`.
    ///
    /// Packets always carry whole frames. When even the base packet length wouldn't fit in
    /// `max_packet_size`, packets are saturated at the largest whole number of frames that
    /// does, and the residue is never carried.
    pub const fn new(
        sample_rate: u32,
        frame_size: num::NonZeroU32,
        tick_rate: num::NonZeroU32,
        ticks_per_packet: num::NonZeroU32,
        max_packet_size: u32,
    ) -> Self {
        let max_frames = (max_packet_size / frame_size.get()) as u64;

        // frames per packet, times the number of ticks per second
        let scaled_rate = sample_rate as u64 * ticks_per_packet.get() as u64;
        let base_frames = scaled_rate / tick_rate.get() as u64;
        let rem_frames = scaled_rate % tick_rate.get() as u64;

        // only carry when a carried packet still fits
        let (base_frames, rem_frames) = if base_frames < max_frames {
            (base_frames, rem_frames)
        } else {
            (max_frames, 0)
        };

        Self {
            tick_rate,
            frame_size,
            // at most max_packet_size
            base_pktsize: base_frames as u32 * frame_size.get(),
            pktsize_residue: rem_frames * frame_size.get() as u64,
            residue: 0,
        }
    }

    /// The length of a packet when nothing is carried.
    #[inline(always)]
    pub const fn base_pktsize(&self) -> u32 {
        self.base_pktsize
    }

    /// The amount added to the residue after each packet.
    #[inline(always)]
    pub const fn pktsize_residue(&self) -> u64 {
        self.pktsize_residue
    }

    /// The accumulated residue, always less than `tick_rate * frame_size`.
    #[inline(always)]
    pub const fn residue(&self) -> u64 {
        self.residue
    }

    /// Transport clock ticks per second.
    #[inline(always)]
    pub const fn tick_rate(&self) -> num::NonZeroU32 {
        self.tick_rate
    }

    #[inline(always)]
    pub const fn frame_size(&self) -> num::NonZeroU32 {
        self.frame_size
    }

    /// Drops the accumulated residue.
    #[inline(always)]
    pub const fn reset(&mut self) {
        self.residue = 0;
    }

    /// Returns the length of the next packet, in bytes.
    #[inline]
    pub fn next_len(&mut self) -> u32 {
        let tick_rate = u64::from(self.tick_rate.get());
        let frame_size = self.frame_size.get();

        let mut length = self.base_pktsize;
        self.residue += self.pktsize_residue;

        while self.residue / tick_rate >= u64::from(frame_size) {
            length += frame_size;
            self.residue -= u64::from(frame_size) * tick_rate;
        }

        length
    }
}
