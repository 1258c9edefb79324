use crate::interrupt::{Interrupt, InterruptLine};

/// Divider bit sampled by TIMA for each TAC rate select.
const RATE_BITS: [u32; 4] = [9, 3, 5, 7];

pub struct Timer {
    /// 16-bit internal divider counter. DIV register is the upper 8 bits.
    pub div: u16,
    /// Timer counter
    pub tima: u8,
    /// Timer modulo
    pub tma: u8,
    /// Timer control
    pub tac: u8,
    last_signal: bool,
    irq: InterruptLine,
}

impl Timer {
    pub fn new(irq: InterruptLine) -> Self {
        Self {
            div: 0,
            tima: 0,
            tma: 0,
            tac: 0,
            last_signal: false,
            irq,
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0xFF04 => (self.div >> 8) as u8,
            0xFF05 => self.tima,
            0xFF06 => self.tma,
            0xFF07 => self.tac | 0xF8,
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        match addr {
            0xFF04 => self.set_div(0),
            0xFF05 => self.tima = val,
            0xFF06 => self.tma = val,
            0xFF07 => {
                self.tac = val & 0x07;
                self.sync_signal();
            }
            _ => {}
        }
    }

    /// Cycles between TIMA increments for the current rate select.
    pub fn period(&self) -> u32 {
        2 << RATE_BITS[(self.tac & 0x03) as usize]
    }

    /// Advance the timer by one cycle.
    pub fn step(&mut self) {
        self.div = self.div.wrapping_add(1);
        self.sync_signal();
    }

    /// Advance the timer by `cycles` cycles.
    pub fn step_cycles(&mut self, cycles: u32) {
        for _ in 0..cycles {
            self.step();
        }
    }

    /// Overwrite the divider, applying TIMA edge logic.
    pub fn set_div(&mut self, div: u16) {
        self.div = div;
        self.sync_signal();
    }

    // TIMA counts falling edges of the selected divider bit ANDed with the
    // enable flag, so DIV resets and TAC writes can tick it too.
    fn sync_signal(&mut self) {
        let new = self.signal();
        if self.last_signal && !new {
            self.increment();
        }
        self.last_signal = new;
    }

    fn increment(&mut self) {
        let (next, overflow) = self.tima.overflowing_add(1);
        if overflow {
            self.tima = self.tma;
            self.irq.raise(Interrupt::Timer);
        } else {
            self.tima = next;
        }
    }

    fn signal(&self) -> bool {
        self.tac & 0x04 != 0 && (self.div >> RATE_BITS[(self.tac & 0x03) as usize]) & 1 != 0
    }
}
