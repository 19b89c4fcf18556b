//! Queue-related utilities: periodic boundary counting, and small adapters for
//! [`rtrb`] ring buffers.
use core::num;

pub use rtrb;

/// A counter that tracks progress through fixed-size periods.
///
/// Each time the counter advances past a multiple of its period, a boundary
/// is considered crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodicCounter {
    period: num::NonZeroUsize,
    current: usize, // always less than self.period
}

impl PeriodicCounter {
    /// Creates a new counter with the given `period`.
    #[inline(always)]
    pub const fn new(period: num::NonZeroUsize) -> Self {
        Self { period, current: 0 }
    }

    /// Returns the configured period.
    #[inline(always)]
    pub const fn period(&self) -> num::NonZeroUsize {
        self.period
    }

    /// Returns how far into the current period the counter is.
    #[inline(always)]
    pub const fn current(&self) -> usize {
        self.current
    }

    /// Goes back to the start of a period.
    #[inline(always)]
    pub const fn reset(&mut self) {
        self.current = 0;
    }

    /// Advances the counter by `n` steps.
    ///
    /// Returns the number of period boundaries crossed.
    #[inline(always)]
    pub fn advance(&mut self, n: usize) -> usize {
        let p = self.period();
        let next = self.current + n;
        self.current = next % p;

        next / p
    }
}

/// Pops every element currently available in `rx`, in order.
#[inline(always)]
pub fn consumer_drain<T>(rx: &mut rtrb::Consumer<T>) -> impl Iterator<Item = T> + '_ {
    let slots = rx.slots();
    rx.read_chunk(slots).ok().into_iter().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter(period: usize) -> PeriodicCounter {
        PeriodicCounter::new(num::NonZeroUsize::new(period).unwrap())
    }

    #[test]
    fn crossings_do_not_depend_on_chunking() {
        let chunkings: [&[usize]; 4] = [
            &[1000],
            &[192; 5],
            &[1, 299, 100, 300, 0, 299, 1],
            &[700, 300],
        ];

        for chunks in chunkings {
            let mut c = counter(256);
            let crossed: usize = chunks.iter().map(|&n| c.advance(n)).sum();
            let total: usize = chunks.iter().sum();

            assert_eq!(crossed, total / 256, "{chunks:?}");
            assert_eq!(c.current(), total % 256);
        }
    }

    #[test]
    fn one_advance_can_cross_several_periods() {
        let mut c = counter(64);
        assert_eq!(c.advance(63), 0);
        assert_eq!(c.advance(130), 3);
        assert_eq!(c.current(), 1);

        c.reset();
        assert_eq!(c.advance(64), 1);
    }

    #[test]
    fn drains_everything_pushed() {
        let (mut tx, mut rx) = rtrb::RingBuffer::new(4);

        for i in 0..3 {
            tx.push(i).unwrap();
        }

        assert!(consumer_drain(&mut rx).eq(0..3));
        assert_eq!(consumer_drain(&mut rx).count(), 0);
    }
}
