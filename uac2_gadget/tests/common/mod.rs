#![allow(dead_code)]

use std::sync::{
    Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
    mpsc,
};
use uac2_gadget::{
    EndpointDescriptor, GadgetConfig, PcmEvents, Rejected, SlotId, Speed, Transfer,
    TransferStatus, Transport, TransportError, UacFunction,
};
use uac2_proto::{Direction, event::Event};

pub type Function = UacFunction<MockTransport, MockPcm>;

pub const CONTROL: u8 = 0;
pub const CAPTURE: u8 = 1;
pub const PLAYBACK: u8 = 2;

/// Alternate setting carrying stereo S16LE.
pub const STEREO_S16: u8 = 2;

/// Keeps every submitted transfer, in submission order, until a test completes it.
pub struct MockTransport {
    speed: Speed,
    submitted: Mutex<Vec<Transfer>>,
    enabled: [AtomicBool; 2],
    withdrawn: Mutex<Vec<(Direction, SlotId)>>,
    pub reject_submissions: AtomicBool,
    pub refuse_enable: AtomicBool,
}

impl MockTransport {
    pub fn new(speed: Speed) -> Self {
        Self {
            speed,
            submitted: Mutex::new(Vec::new()),
            enabled: [AtomicBool::new(false), AtomicBool::new(false)],
            withdrawn: Mutex::new(Vec::new()),
            reject_submissions: AtomicBool::new(false),
            refuse_enable: AtomicBool::new(false),
        }
    }

    pub fn is_enabled(&self, direction: Direction) -> bool {
        self.enabled[direction.index()].load(Ordering::SeqCst)
    }

    /// Number of transfers of `direction` currently submitted.
    pub fn queued(&self, direction: Direction) -> usize {
        self.submitted
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.direction() == direction)
            .count()
    }

    /// Lengths of the queued transfers of `direction`, oldest first.
    pub fn queued_lengths(&self, direction: Direction) -> Vec<usize> {
        self.submitted
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.direction() == direction)
            .map(|t| t.length)
            .collect()
    }

    /// Takes the oldest queued transfer of `direction`.
    pub fn pop(&self, direction: Direction) -> Option<Transfer> {
        let mut submitted = self.submitted.lock().unwrap();
        let i = submitted.iter().position(|t| t.direction() == direction)?;
        Some(submitted.remove(i))
    }

    /// Takes every queued transfer of `direction`.
    pub fn drain(&self, direction: Direction) -> Vec<Transfer> {
        let mut submitted = self.submitted.lock().unwrap();
        let (taken, kept): (Vec<_>, Vec<_>) = submitted
            .drain(..)
            .partition(|t| t.direction() == direction);
        *submitted = kept;
        taken
    }

    /// Takes the newest queued transfer of `direction`.
    pub fn last(&self, direction: Direction) -> Option<Transfer> {
        let mut submitted = self.submitted.lock().unwrap();
        let i = submitted.iter().rposition(|t| t.direction() == direction)?;
        Some(submitted.remove(i))
    }

    /// Puts a taken transfer back at the end of the queue, as if it was never taken.
    pub fn requeue(&self, transfer: Transfer) {
        self.submitted.lock().unwrap().push(transfer);
    }

    pub fn withdrawn(&self, direction: Direction) -> usize {
        self.withdrawn
            .lock()
            .unwrap()
            .iter()
            .filter(|(d, _)| *d == direction)
            .count()
    }
}

impl Transport for MockTransport {
    fn speed(&self) -> Speed {
        self.speed
    }

    fn enable(
        &self,
        direction: Direction,
        _descriptor: &EndpointDescriptor,
    ) -> Result<(), TransportError> {
        if self.refuse_enable.load(Ordering::SeqCst) {
            return Err(TransportError::Refused);
        }

        self.enabled[direction.index()].store(true, Ordering::SeqCst);
        Ok(())
    }

    fn disable(&self, direction: Direction) {
        self.enabled[direction.index()].store(false, Ordering::SeqCst);
    }

    fn submit(&self, transfer: Transfer) -> Result<(), Rejected> {
        if !self.is_enabled(transfer.direction()) {
            return Err(Rejected {
                transfer,
                error: TransportError::Shutdown,
            });
        }

        if self.reject_submissions.load(Ordering::SeqCst) {
            return Err(Rejected {
                transfer,
                error: TransportError::Busy,
            });
        }

        self.submitted.lock().unwrap().push(transfer);
        Ok(())
    }

    fn withdraw(&self, direction: Direction, slot: SlotId) {
        self.withdrawn.lock().unwrap().push((direction, slot));
    }
}

#[derive(Default)]
pub struct MockPcm {
    periods: [AtomicUsize; 2],
    stops: [AtomicUsize; 2],
}

impl MockPcm {
    pub fn periods(&self, direction: Direction) -> usize {
        self.periods[direction.index()].load(Ordering::SeqCst)
    }

    pub fn stops(&self, direction: Direction) -> usize {
        self.stops[direction.index()].load(Ordering::SeqCst)
    }
}

impl PcmEvents for MockPcm {
    fn period_elapsed(&self, direction: Direction) {
        self.periods[direction.index()].fetch_add(1, Ordering::SeqCst);
    }

    fn stop_disconnected(&self, direction: Direction) {
        self.stops[direction.index()].fetch_add(1, Ordering::SeqCst);
    }
}

pub fn function_with(config: GadgetConfig, speed: Speed) -> (Function, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel();
    let transport = MockTransport::new(speed);
    let function = UacFunction::new(config, CONTROL, transport, MockPcm::default(), tx).unwrap();
    (function, rx)
}

pub fn function() -> (Function, mpsc::Receiver<Event>) {
    function_with(GadgetConfig::default(), Speed::High)
}

/// Completes the oldest queued transfer of `direction` successfully, returning the
/// length of its resubmission.
pub fn cycle(function: &Function, direction: Direction) -> usize {
    let mut transfer = function.transport().pop(direction).unwrap();
    transfer.status = TransferStatus::Complete;
    transfer.actual = transfer.length;
    function.complete(transfer);

    function.transport().queued_lengths(direction).last().copied().unwrap()
}

/// Completes the oldest queued capture transfer as if the host had sent `data`.
pub fn receive(function: &Function, data: &[u8]) {
    let mut transfer = function.transport().pop(Direction::Capture).unwrap();
    transfer.buf_mut()[..data.len()].copy_from_slice(data);
    transfer.actual = data.len();
    transfer.status = TransferStatus::Complete;
    function.complete(transfer);
}
