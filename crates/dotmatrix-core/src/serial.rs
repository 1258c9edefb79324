use crate::interrupt::{Interrupt, InterruptLine};

/// Cycles per shifted bit with the internal 8192 Hz clock.
const BIT_CYCLES: u32 = 512;

/// Captured bytes kept for the host. Once full, the oldest half is dropped.
pub const OUTPUT_LIMIT: usize = 64 * 1024;

/// SB/SC registers with no cable attached.
///
/// Internally clocked transfers shift in 1 bits (a dead line) and raise
/// the serial interrupt after eight bits. Bytes sent are captured, up to
/// [`OUTPUT_LIMIT`], so test ROMs that print over the link can be inspected.
pub struct Serial {
    sb: u8,
    sc: u8,
    bits_left: u8,
    counter: u32,
    out_buf: Vec<u8>,
    irq: InterruptLine,
}

impl Serial {
    pub fn new(irq: InterruptLine) -> Self {
        Self {
            sb: 0,
            sc: 0x7E,
            bits_left: 0,
            counter: 0,
            out_buf: Vec::new(),
            irq,
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0xFF01 => self.sb,
            0xFF02 => self.sc | 0x7E,
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        match addr {
            0xFF01 => self.sb = val,
            0xFF02 => {
                self.sc = val;
                if val & 0x81 == 0x81 {
                    if self.out_buf.len() == OUTPUT_LIMIT {
                        self.out_buf.drain(..OUTPUT_LIMIT / 2);
                    }
                    self.out_buf.push(self.sb);
                    self.bits_left = 8;
                    self.counter = 0;
                } else {
                    self.bits_left = 0;
                }
            }
            _ => {}
        }
    }

    pub fn step(&mut self) {
        if self.bits_left == 0 {
            return;
        }
        self.counter += 1;
        if self.counter < BIT_CYCLES {
            return;
        }
        self.counter = 0;
        self.sb = (self.sb << 1) | 1;
        self.bits_left -= 1;
        if self.bits_left == 0 {
            self.sc &= 0x7F;
            self.irq.raise(Interrupt::Serial);
        }
    }

    /// Drain bytes written out over the link since the last call.
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.out_buf)
    }

    pub fn peek_output(&self) -> &[u8] {
        &self.out_buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interrupt::InterruptController;

    #[test]
    fn internal_transfer_completes_after_eight_bits() {
        let ic = InterruptController::new();
        let mut serial = Serial::new(ic.line());
        serial.write(0xFF01, b'A');
        serial.write(0xFF02, 0x81);
        for _ in 0..BIT_CYCLES * 8 - 1 {
            serial.step();
        }
        assert_eq!(ic.requested(), 0);
        serial.step();
        assert_eq!(ic.requested(), Interrupt::Serial.mask());
        assert_eq!(serial.read(0xFF01), 0xFF);
        assert_eq!(serial.read(0xFF02) & 0x80, 0);
        assert_eq!(serial.take_output(), b"A");
    }

    #[test]
    fn external_clock_never_completes() {
        let ic = InterruptController::new();
        let mut serial = Serial::new(ic.line());
        serial.write(0xFF02, 0x80);
        for _ in 0..BIT_CYCLES * 16 {
            serial.step();
        }
        assert_eq!(ic.requested(), 0);
        assert!(serial.peek_output().is_empty());
    }

    #[test]
    fn captured_output_is_bounded() {
        let ic = InterruptController::new();
        let mut serial = Serial::new(ic.line());
        for i in 0..OUTPUT_LIMIT * 2 + 3 {
            serial.write(0xFF01, i as u8);
            serial.write(0xFF02, 0x81);
        }
        let out = serial.peek_output();
        assert!(out.len() <= OUTPUT_LIMIT);
        assert_eq!(out.last(), Some(&((OUTPUT_LIMIT * 2 + 2) as u8)));
    }
}
