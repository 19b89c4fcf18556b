//! Debounced announcement of stream state changes.
//!
//! Hosts often flip alternate settings several times in a row while probing a device.
//! Announcing every flip would have userspace reopening and closing its streams in a
//! loop, so announcements are made by a dedicated worker thread, some time after they
//! were scheduled, based on the state of the stream at that time:
//!
//! - a stream that is active gets announced as opened (preceded by a closed event if it
//!   already was, spaced by a short pause),
//! - a stream that isn't, but was announced as opened, gets announced as closed.
//!
//! While a direction's announcement is pending, scheduling another one does nothing: the
//! first deadline wins, and the churn in between collapses into a single announcement.

use core::time::Duration;
use std::{io, thread, time::Instant};
use uac2_proto::{Direction, event::Event};
use uac2_utils::queue::{self, rtrb};

/// Where events end up.
pub trait EventSink: Send + 'static {
    fn send(&mut self, event: Event);
}

impl EventSink for std::sync::mpsc::Sender<Event> {
    #[inline]
    fn send(&mut self, event: Event) {
        // the receiving end hung up, nobody is listening
        let _ = std::sync::mpsc::Sender::send(self, event);
    }
}

impl EventSink for rtrb::Producer<Event> {
    #[inline]
    fn send(&mut self, event: Event) {
        if self.push(event).is_err() {
            log::warn!("event queue full, dropping {}", event.uevent());
        }
    }
}

/// Writes every event as a postcard-encoded record.
#[derive(Debug)]
pub struct PostcardEventSink<W> {
    writer: W,
}

impl<W> PostcardEventSink<W> {
    #[inline(always)]
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }

    #[inline(always)]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: io::Write + Send + 'static> EventSink for PostcardEventSink<W> {
    fn send(&mut self, event: Event) {
        let mut buf = [0; Event::MAX_ENCODED_SIZE];

        let res = event
            .encode(&mut buf)
            .map_err(io::Error::other)
            .and_then(|record| {
                self.writer.write_all(record)?;
                self.writer.flush()
            });

        if let Err(e) = res {
            log::error!("failed to write {}: {e}", event.uevent());
        }
    }
}

/// The announcement state of one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Debouncer {
    direction: Direction,
    /// The last event sent was "opened".
    announced: bool,
    deadline: Option<Instant>,
}

impl Debouncer {
    #[inline(always)]
    pub const fn new(direction: Direction) -> Self {
        Self {
            direction,
            announced: false,
            deadline: None,
        }
    }

    #[inline(always)]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    #[inline(always)]
    pub const fn is_announced(&self) -> bool {
        self.announced
    }

    #[inline(always)]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Schedules an announcement `delay` after `now`, unless one is already pending.
    #[inline]
    pub fn schedule(&mut self, now: Instant, delay: Duration) {
        self.deadline.get_or_insert(now + delay);
    }

    #[inline(always)]
    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| deadline <= now)
    }

    /// Announces the stream's current state, as reported by `is_active`.
    ///
    /// `pause` is called between a closed and an opened event.
    pub fn fire(
        &mut self,
        is_active: impl Fn() -> bool,
        sink: &mut impl EventSink,
        pause: impl FnOnce(),
    ) {
        self.deadline = None;
        let direction = self.direction;

        if is_active() {
            if self.announced {
                announce(sink, Event::closed(direction));
                self.announced = false;
                pause();
            }

            if is_active() {
                announce(sink, Event::opened(direction));
                self.announced = true;
            }
        } else if self.announced {
            announce(sink, Event::closed(direction));
            self.announced = false;
        }
    }
}

#[inline]
fn announce(sink: &mut impl EventSink, event: Event) {
    log::debug!("sending {}", event.uevent());
    sink.send(event);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Schedule(Direction, Duration),
    CableDisconnected,
    Shutdown,
}

const COMMAND_QUEUE_LEN: usize = 64;

/// Handle to the announcement worker thread. Dropping it stops the worker.
pub struct Notifier {
    tx: spin::Mutex<rtrb::Producer<Command>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl Notifier {
    /// Spawns the worker thread.
    ///
    /// `is_active` is queried, from the worker thread, whenever an announcement is due.
    pub fn spawn(
        sink: impl EventSink,
        spacing: Duration,
        is_active: impl Fn(Direction) -> bool + Send + 'static,
    ) -> io::Result<Self> {
        let (tx, rx) = rtrb::RingBuffer::new(COMMAND_QUEUE_LEN);

        let worker = thread::Builder::new()
            .name("uac2-events".into())
            .spawn(move || run(rx, sink, spacing, is_active))?;

        Ok(Self {
            tx: spin::Mutex::new(tx),
            worker: Some(worker),
        })
    }

    /// Schedules an announcement of `direction`'s state, `delay` from now.
    #[inline]
    pub fn schedule(&self, direction: Direction, delay: Duration) {
        self.send(Command::Schedule(direction, delay));
    }

    /// Announces a cable disconnection, then the state of both directions.
    #[inline]
    pub fn cable_disconnected(&self) {
        self.send(Command::CableDisconnected);
    }

    fn send(&self, command: Command) {
        if let Err(rtrb::PushError::Full(command)) = self.tx.lock().push(command) {
            log::warn!("notifier queue full, dropping {command:?}");
        }

        if let Some(worker) = &self.worker {
            worker.thread().unpark();
        }
    }
}

impl Drop for Notifier {
    fn drop(&mut self) {
        let mut command = Command::Shutdown;

        // unlike other commands, this one can't be dropped
        while let Err(rtrb::PushError::Full(c)) = self.tx.lock().push(command) {
            command = c;
            if let Some(worker) = &self.worker {
                worker.thread().unpark();
            }
            thread::yield_now();
        }

        if let Some(worker) = self.worker.take() {
            worker.thread().unpark();

            if worker.join().is_err() {
                log::error!("event worker panicked");
            }
        }
    }
}

fn run(
    mut rx: rtrb::Consumer<Command>,
    mut sink: impl EventSink,
    spacing: Duration,
    is_active: impl Fn(Direction) -> bool,
) {
    let mut debouncers = Direction::ALL.map(Debouncer::new);

    loop {
        let now = Instant::now();

        for command in queue::consumer_drain(&mut rx) {
            match command {
                Command::Schedule(direction, delay) => {
                    debouncers[direction.index()].schedule(now, delay)
                }
                Command::CableDisconnected => {
                    announce(&mut sink, Event::CableDisconnected);
                    for debouncer in &mut debouncers {
                        debouncer.schedule(now, Duration::ZERO);
                    }
                }
                Command::Shutdown => return,
            }
        }

        for debouncer in &mut debouncers {
            if debouncer.is_due(Instant::now()) {
                let direction = debouncer.direction();
                debouncer.fire(
                    || is_active(direction),
                    &mut sink,
                    || thread::sleep(spacing),
                );
            }
        }

        match debouncers.iter().filter_map(Debouncer::deadline).min() {
            Some(deadline) => {
                thread::park_timeout(deadline.saturating_duration_since(Instant::now()))
            }
            None => thread::park(),
        }
    }
}
