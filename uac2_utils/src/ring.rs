//! The byte ring shared between a transfer pump and an audio subsystem.
//!
//! The audio subsystem provides the backing storage (its "DMA area") and the period size
//! when it negotiates stream parameters. The pump then moves bytes in or out of the area,
//! one transfer at a time, at the position of a cursor (`hw_ptr`) that only it advances.
//! The audio subsystem only ever reads the cursor, to learn how far the pump has gone.
//!
//! Two locks are involved:
//!
//! - the cursor lock, held only while the cursor and the period counter are read and
//!   updated,
//! - the area lock, held while bytes are copied.
//!
//! They are never held at the same time. An [`Advance`] captures everything a copy needs
//! while the cursor lock is held, so the copy itself can't observe a torn cursor. Every
//! area installed gets a new epoch, and an [`Advance`] is only ever copied into or out of
//! the area of its own epoch.

use crate::queue::PeriodicCounter;
use alloc::boxed::Box;
use core::{fmt, num};

/// The size of a ring's area, and of the periods it is divided into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Geometry {
    dma_bytes: num::NonZeroUsize,
    period_bytes: num::NonZeroUsize,
}

/// Reasons a [`Geometry`] can't be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryError {
    /// The area is empty.
    EmptyArea,
    /// The period is empty.
    EmptyPeriod,
    /// The area isn't a whole number of periods.
    Fractional {
        dma_bytes: usize,
        period_bytes: usize,
    },
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyArea => f.write_str("ring area is empty"),
            Self::EmptyPeriod => f.write_str("period is empty"),
            Self::Fractional {
                dma_bytes,
                period_bytes,
            } => write!(
                f,
                "ring area of {dma_bytes} bytes is not a multiple of the {period_bytes}-byte period"
            ),
        }
    }
}

impl core::error::Error for GeometryError {}

impl Geometry {
    #[inline(always)]
    pub const fn new(dma_bytes: usize, period_bytes: usize) -> Result<Self, GeometryError> {
        let Some(dma_bytes) = num::NonZeroUsize::new(dma_bytes) else {
            return Err(GeometryError::EmptyArea);
        };

        let Some(period_bytes) = num::NonZeroUsize::new(period_bytes) else {
            return Err(GeometryError::EmptyPeriod);
        };

        if dma_bytes.get() % period_bytes.get() != 0 {
            return Err(GeometryError::Fractional {
                dma_bytes: dma_bytes.get(),
                period_bytes: period_bytes.get(),
            });
        }

        Ok(Self {
            dma_bytes,
            period_bytes,
        })
    }

    #[inline(always)]
    pub const fn dma_bytes(&self) -> num::NonZeroUsize {
        self.dma_bytes
    }

    #[inline(always)]
    pub const fn period_bytes(&self) -> num::NonZeroUsize {
        self.period_bytes
    }

    /// Returns the number of periods in the area.
    #[inline(always)]
    pub const fn periods(&self) -> usize {
        self.dma_bytes.get() / self.period_bytes.get()
    }
}

/// A reservation of `len` bytes of a ring, starting at `offset`.
///
/// Returned by [`RingChannel::advance`], once the cursor has already moved past it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Advance {
    /// Position of the cursor before advancing.
    pub offset: usize,
    /// Number of bytes the cursor advanced by.
    pub len: usize,
    /// Number of period boundaries crossed.
    pub periods: usize,
    epoch: u32,
}

#[derive(Debug)]
struct Cursor {
    hw_ptr: usize,
    epoch: u32,
    // counter.current() == hw_ptr % period_bytes, since dma_bytes is a multiple of the period
    state: Option<(Geometry, PeriodicCounter)>,
}

#[derive(Debug)]
struct Area {
    epoch: u32,
    buf: Option<Box<[u8]>>,
}

/// One direction's ring buffer.
#[derive(Debug)]
pub struct RingChannel {
    cursor: spin::Mutex<Cursor>,
    area: spin::Mutex<Area>,
}

impl Default for RingChannel {
    #[inline(always)]
    fn default() -> Self {
        Self::new()
    }
}

impl RingChannel {
    /// Creates an unconfigured ring. Advancing it does nothing until an area is
    /// [configured](Self::configure).
    #[inline(always)]
    pub const fn new() -> Self {
        Self {
            cursor: spin::Mutex::new(Cursor {
                hw_ptr: 0,
                epoch: 0,
                state: None,
            }),
            area: spin::Mutex::new(Area {
                epoch: 0,
                buf: None,
            }),
        }
    }

    /// Installs `area` as the ring's backing storage, divided into periods of
    /// `period_bytes`, and rewinds the cursor.
    ///
    /// Returns the previous area, if any.
    pub fn configure(
        &self,
        area: Box<[u8]>,
        period_bytes: usize,
    ) -> Result<Option<Box<[u8]>>, GeometryError> {
        let geometry = Geometry::new(area.len(), period_bytes)?;

        let (epoch, previous) = self.swap_area(Some(area));

        *self.cursor.lock() = Cursor {
            hw_ptr: 0,
            epoch,
            state: Some((geometry, PeriodicCounter::new(geometry.period_bytes()))),
        };

        Ok(previous)
    }

    /// Removes the ring's backing storage, returning it.
    pub fn release(&self) -> Option<Box<[u8]>> {
        let (epoch, previous) = self.swap_area(None);

        *self.cursor.lock() = Cursor {
            hw_ptr: 0,
            epoch,
            state: None,
        };

        previous
    }

    // the area changes first, so advances made in between are stale either way
    fn swap_area(&self, buf: Option<Box<[u8]>>) -> (u32, Option<Box<[u8]>>) {
        let mut area = self.area.lock();
        area.epoch = area.epoch.wrapping_add(1);
        (area.epoch, core::mem::replace(&mut area.buf, buf))
    }

    #[inline(always)]
    pub fn geometry(&self) -> Option<Geometry> {
        self.cursor.lock().state.map(|(g, _)| g)
    }

    /// Returns the current position of the cursor, in bytes.
    #[inline(always)]
    pub fn position(&self) -> usize {
        self.cursor.lock().hw_ptr
    }

    /// Rewinds the cursor to the start of the area.
    #[inline]
    pub fn reset(&self) {
        let mut guard = self.cursor.lock();
        guard.hw_ptr = 0;
        if let Some((_, counter)) = guard.state.as_mut() {
            counter.reset();
        }
    }

    /// Moves the cursor forward by `len` bytes (modulo the area's size), returning where
    /// the bytes go and how many period boundaries were crossed.
    ///
    /// Returns `None` if no area is configured.
    #[inline]
    pub fn advance(&self, len: usize) -> Option<Advance> {
        let mut guard = self.cursor.lock();
        let cursor = &mut *guard;

        let (geometry, counter) = cursor.state.as_mut()?;
        let dma_bytes = geometry.dma_bytes().get();

        let offset = cursor.hw_ptr;
        let periods = counter.advance(len);
        cursor.hw_ptr = (offset + len % dma_bytes) % dma_bytes;

        Some(Advance {
            offset,
            len,
            periods,
            epoch: cursor.epoch,
        })
    }

    /// Copies `src` into the area, at the position of `advance`.
    ///
    /// Returns `false`, copying nothing, if the area was replaced or removed since
    /// `advance` was made.
    #[inline]
    pub fn fill(&self, advance: &Advance, src: &[u8]) -> bool {
        let mut area = self.area.lock();
        let epoch = area.epoch;
        match area.buf.as_deref_mut() {
            Some(area) if epoch == advance.epoch => {
                let len = advance.len.min(src.len());
                write_wrapping(area, advance.offset, &src[..len]);
                true
            }
            _ => false,
        }
    }

    /// Copies bytes at the position of `advance` out of the area, into `dst`.
    ///
    /// Returns `false`, copying nothing, if the area was replaced or removed since
    /// `advance` was made.
    #[inline]
    pub fn drain(&self, advance: &Advance, dst: &mut [u8]) -> bool {
        let area = self.area.lock();
        match area.buf.as_deref() {
            Some(buf) if area.epoch == advance.epoch => {
                let len = advance.len.min(dst.len());
                read_wrapping(buf, advance.offset, &mut dst[..len]);
                true
            }
            _ => false,
        }
    }

    /// Advances past `src.len()` bytes and copies `src` there.
    ///
    /// Returns the number of period boundaries crossed, or `None` if no area is configured.
    #[inline]
    pub fn push(&self, src: &[u8]) -> Option<usize> {
        let advance = self.advance(src.len())?;
        self.fill(&advance, src).then_some(advance.periods)
    }

    /// Advances past `dst.len()` bytes and copies them into `dst`.
    ///
    /// Returns the number of period boundaries crossed, or `None` if no area is configured.
    #[inline]
    pub fn pull(&self, dst: &mut [u8]) -> Option<usize> {
        let advance = self.advance(dst.len())?;
        self.drain(&advance, dst).then_some(advance.periods)
    }

    /// Writes `src` into the area at `offset` without touching the cursor.
    ///
    /// This is how the audio subsystem fills the area ahead of the pump.
    #[inline]
    pub fn write_at(&self, offset: usize, src: &[u8]) -> bool {
        let mut area = self.area.lock();
        match area.buf.as_deref_mut() {
            Some(area) => {
                write_wrapping(area, offset, src);
                true
            }
            None => false,
        }
    }

    /// Reads the area at `offset` into `dst` without touching the cursor.
    #[inline]
    pub fn read_at(&self, offset: usize, dst: &mut [u8]) -> bool {
        let area = self.area.lock();
        match area.buf.as_deref() {
            Some(area) => {
                read_wrapping(area, offset, dst);
                true
            }
            None => false,
        }
    }
}

/// Copies `src` into `area` as if `area` repeated endlessly, starting at `offset`.
///
/// When `src` fits before the end of `area` this is a single copy, otherwise it wraps
/// around to the start.
pub fn write_wrapping(area: &mut [u8], offset: usize, mut src: &[u8]) {
    let cap = area.len();
    if cap == 0 {
        return;
    }

    let mut pos = offset % cap;

    while !src.is_empty() {
        let pending = &mut area[pos..];
        let n = pending.len().min(src.len());
        let (now, rest) = src.split_at(n);

        pending[..n].copy_from_slice(now);

        src = rest;
        pos = (pos + n) % cap;
    }
}

/// Fills `dst` from `area` as if `area` repeated endlessly, starting at `offset`.
pub fn read_wrapping(area: &[u8], offset: usize, mut dst: &mut [u8]) {
    let cap = area.len();
    if cap == 0 {
        return;
    }

    let mut pos = offset % cap;

    while !dst.is_empty() {
        let pending = &area[pos..];
        let n = pending.len().min(dst.len());
        let (now, rest) = core::mem::take(&mut dst).split_at_mut(n);

        now.copy_from_slice(&pending[..n]);

        dst = rest;
        pos = (pos + n) % cap;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::{vec, vec::Vec};

    fn ring(dma_bytes: usize, period_bytes: usize) -> RingChannel {
        let ring = RingChannel::new();
        ring.configure(vec![0; dma_bytes].into_boxed_slice(), period_bytes)
            .unwrap();
        ring
    }

    fn area(ring: &RingChannel) -> Vec<u8> {
        let mut out = vec![0; ring.geometry().unwrap().dma_bytes().get()];
        assert!(ring.read_at(0, &mut out));
        out
    }

    #[test]
    fn geometry_must_be_whole_periods() {
        assert_eq!(Geometry::new(0, 4), Err(GeometryError::EmptyArea));
        assert_eq!(Geometry::new(16, 0), Err(GeometryError::EmptyPeriod));
        assert_eq!(
            Geometry::new(10, 4),
            Err(GeometryError::Fractional {
                dma_bytes: 10,
                period_bytes: 4
            })
        );
        assert_eq!(Geometry::new(4096, 1024).unwrap().periods(), 4);
    }

    #[test]
    fn wraparound_matches_a_contiguous_write() {
        const DMA: usize = 12;

        for start in 0..DMA {
            for len in 0..=DMA {
                let ring = ring(DMA, 4);

                // move the cursor to `start` without writing anything
                ring.advance(start).unwrap();

                let src: Vec<u8> = (1..=len as u8).collect();
                ring.push(&src).unwrap();

                let mut expected = vec![0; DMA];
                for (i, &b) in src.iter().enumerate() {
                    expected[(start + i) % DMA] = b;
                }

                assert_eq!(area(&ring), expected, "start {start}, len {len}");
                assert_eq!(ring.position(), (start + len) % DMA);
            }
        }
    }

    #[test]
    fn pull_reads_across_the_end() {
        let ring = ring(8, 2);
        ring.write_at(0, &[0, 1, 2, 3, 4, 5, 6, 7]);
        ring.advance(6).unwrap();

        let mut dst = [0xff; 5];
        assert_eq!(ring.pull(&mut dst), Some(2));
        assert_eq!(dst, [6, 7, 0, 1, 2]);
        assert_eq!(ring.position(), 3);
    }

    #[test]
    fn one_notification_per_crossed_period() {
        let ring = ring(1024, 256);

        let crossings: usize = [100, 200, 300, 1000, 0, 448]
            .into_iter()
            .map(|len| ring.advance(len).unwrap().periods)
            .sum();

        assert_eq!(crossings, 2048 / 256);
        assert_eq!(ring.position(), 0);
    }

    #[test]
    fn reset_rewinds_cursor_and_period() {
        let ring = ring(16, 8);
        ring.advance(7).unwrap();
        ring.reset();

        assert_eq!(ring.position(), 0);
        assert_eq!(ring.advance(7).unwrap().periods, 0);
        assert_eq!(ring.advance(1).unwrap().periods, 1);
    }

    #[test]
    fn stale_advances_are_not_copied() {
        let ring = ring(16, 4);
        let advance = ring.advance(4).unwrap();

        ring.configure(vec![0; 32].into_boxed_slice(), 4).unwrap();
        assert!(!ring.fill(&advance, &[1, 2, 3, 4]));
        assert!(area(&ring).iter().all(|&b| b == 0));

        assert!(ring.release().is_some());
        assert_eq!(ring.advance(4), None);
        assert_eq!(ring.push(&[1]), None);
    }

    #[test]
    fn advances_are_tied_to_their_area() {
        let ring = ring(16, 4);
        let advance = ring.advance(4).unwrap();

        // same size, same period
        let previous = ring.configure(vec![0; 16].into_boxed_slice(), 4).unwrap();
        assert!(previous.is_some());

        assert!(!ring.fill(&advance, &[1, 2, 3, 4]));
        let mut dst = [0xff; 4];
        assert!(!ring.drain(&advance, &mut dst));
        assert_eq!(dst, [0xff; 4]);
        assert_eq!(area(&ring), [0; 16]);

        // an advance on the new area goes through
        let advance = ring.advance(4).unwrap();
        assert!(ring.fill(&advance, &[1, 2, 3, 4]));
        assert_eq!(area(&ring)[..4], [1, 2, 3, 4]);
    }
}
