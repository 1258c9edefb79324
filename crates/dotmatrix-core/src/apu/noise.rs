use super::LengthCounter;
use super::envelope::Envelope;
use super::output::Voice;

const NOISE_BASE_HZ: f64 = 524_288.0;
const LFSR_SEED: u16 = 0x7FFF;

/// Linear-feedback shift register behind channel 4.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Lfsr {
    state: u16,
    narrow: bool,
}

impl Default for Lfsr {
    fn default() -> Self {
        Self {
            state: LFSR_SEED,
            narrow: false,
        }
    }
}

impl Lfsr {
    pub fn new(narrow: bool) -> Self {
        Self {
            state: LFSR_SEED,
            narrow,
        }
    }

    pub fn state(&self) -> u16 {
        self.state
    }

    /// Current output bit.
    pub fn bit(&self) -> bool {
        self.state & 1 != 0
    }

    pub fn clock(&mut self) {
        let feedback = (self.state ^ (self.state >> 1)) & 1;
        self.state = (self.state >> 1) | (feedback << 14);
        if self.narrow {
            self.state = (self.state & !0x40) | (feedback << 6);
        }
    }
}

/// Channel 4: envelope-scaled LFSR noise.
#[derive(Debug)]
pub struct NoiseChannel {
    pub(super) enabled: bool,
    pub(super) length: LengthCounter,
    pub(super) envelope: Envelope,
    shift: u8,
    divisor: u8,
    narrow: bool,
    lfsr: Lfsr,
    clocks: f64,
}

impl Default for NoiseChannel {
    fn default() -> Self {
        Self {
            enabled: false,
            length: LengthCounter::new(64),
            envelope: Envelope::default(),
            shift: 0,
            divisor: 0,
            narrow: false,
            lfsr: Lfsr::default(),
            clocks: 0.0,
        }
    }
}

impl NoiseChannel {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn lfsr(&self) -> Lfsr {
        self.lfsr
    }

    pub fn volume(&self) -> u8 {
        self.envelope.volume()
    }

    /// Length ticks left before the output is silenced.
    pub fn length_remaining(&self) -> u16 {
        self.length.remaining()
    }

    /// Shift-register clock rate. A divisor code of 0 counts as 0.5.
    pub fn frequency_hz(&self) -> f64 {
        let r = if self.divisor == 0 {
            0.5
        } else {
            f64::from(self.divisor)
        };
        NOISE_BASE_HZ / r / f64::from(1u32 << (self.shift + 1))
    }

    pub(super) fn write_length(&mut self, val: u8) {
        self.length.load(u16::from(val & 0x3F));
    }

    pub(super) fn write_envelope(&mut self, val: u8) {
        self.envelope.write(val);
        self.envelope.trigger();
        if !self.envelope.dac_enabled() {
            self.enabled = false;
        }
    }

    pub(super) fn write_polynomial(&mut self, val: u8) {
        self.shift = val >> 4;
        self.narrow = val & 0x08 != 0;
        self.divisor = val & 0x07;
    }

    pub(super) fn write_control(&mut self, val: u8) {
        self.length.enabled = val & 0x40 != 0;
        if val & 0x80 != 0 {
            self.enabled = self.envelope.dac_enabled();
            self.length.trigger();
            self.envelope.trigger();
            self.lfsr = Lfsr::new(self.narrow);
            self.clocks = 0.0;
        }
    }
}

impl Voice for NoiseChannel {
    fn next_level(&mut self, rate: f64) -> f32 {
        // Shift codes 14 and 15 stop the register.
        if self.shift < 14 {
            self.clocks += self.frequency_hz() / rate;
            while self.clocks >= 1.0 {
                self.lfsr.clock();
                self.clocks -= 1.0;
            }
        }
        if !self.enabled || self.length.expired() {
            return 0.0;
        }
        let level = if self.lfsr.bit() { 1.0 } else { -1.0 };
        level * self.envelope.gain()
    }
}
