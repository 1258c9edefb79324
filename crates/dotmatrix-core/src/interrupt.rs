use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

/// Interrupt sources in priority order. The discriminant is the IF/IE bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Interrupt {
    VBlank = 0,
    LcdStat = 1,
    Timer = 2,
    Serial = 3,
    Joypad = 4,
}

impl Interrupt {
    pub const ALL: [Interrupt; 5] = [
        Interrupt::VBlank,
        Interrupt::LcdStat,
        Interrupt::Timer,
        Interrupt::Serial,
        Interrupt::Joypad,
    ];

    #[inline]
    pub const fn bit(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn mask(self) -> u8 {
        1 << self as u8
    }

    /// Service routine address, `0x40 + bit * 8`.
    #[inline]
    pub const fn vector(self) -> u16 {
        0x40 + (self as u16) * 8
    }

    pub fn from_bit(bit: u8) -> Option<Self> {
        Self::ALL.get(bit as usize).copied()
    }
}

#[derive(Debug, Default)]
struct Lines {
    requested: AtomicU8,
    enabled: AtomicU8,
}

/// Interrupt request/enable registers shared between the CPU and the units.
///
/// Only the execution thread mutates the machine, so relaxed ordering is
/// enough; the atomics exist so a handle can be moved into that thread
/// along with the rest of the machine.
#[derive(Clone, Debug, Default)]
pub struct InterruptController {
    lines: Arc<Lines>,
}

impl InterruptController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Narrow handle for units that may only request interrupts.
    pub fn line(&self) -> InterruptLine {
        InterruptLine {
            lines: Arc::clone(&self.lines),
        }
    }

    pub fn raise(&self, irq: Interrupt) {
        self.lines.requested.fetch_or(irq.mask(), Ordering::Relaxed);
    }

    pub fn acknowledge(&self, irq: Interrupt) {
        self.lines
            .requested
            .fetch_and(!irq.mask(), Ordering::Relaxed);
    }

    /// IF as seen on the bus: upper three bits read high.
    pub fn read_if(&self) -> u8 {
        self.requested() | 0xE0
    }

    pub fn write_if(&self, val: u8) {
        self.lines.requested.store(val & 0x1F, Ordering::Relaxed);
    }

    pub fn requested(&self) -> u8 {
        self.lines.requested.load(Ordering::Relaxed) & 0x1F
    }

    pub fn read_ie(&self) -> u8 {
        self.lines.enabled.load(Ordering::Relaxed)
    }

    pub fn write_ie(&self, val: u8) {
        self.lines.enabled.store(val, Ordering::Relaxed);
    }

    /// Bits that are both requested and enabled.
    pub fn pending(&self) -> u8 {
        self.requested() & self.read_ie() & 0x1F
    }

    /// Highest-priority pending interrupt, if any.
    pub fn highest_pending(&self) -> Option<Interrupt> {
        let pending = self.pending();
        if pending == 0 {
            return None;
        }
        Interrupt::from_bit(pending.trailing_zeros() as u8)
    }
}

/// Capability to request interrupts, handed to each unit at construction.
#[derive(Clone, Debug)]
pub struct InterruptLine {
    lines: Arc<Lines>,
}

impl InterruptLine {
    pub fn raise(&self, irq: Interrupt) {
        self.lines.requested.fetch_or(irq.mask(), Ordering::Relaxed);
    }
}
