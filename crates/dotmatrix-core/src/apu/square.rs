use super::LengthCounter;
use super::envelope::Envelope;
use super::output::Voice;

/// Duty fractions selected by NRx1 bits 6-7.
const DUTY_FRACTIONS: [f64; 4] = [0.125, 0.25, 0.5, 0.75];

const SQUARE_BASE_HZ: f64 = 131_072.0;

/// Channel 1 frequency sweep, clocked at 128 Hz.
#[derive(Default, Debug)]
pub struct Sweep {
    period: u8,
    negate: bool,
    shift: u8,
    timer: u8,
    shadow: u16,
    enabled: bool,
}

impl Sweep {
    fn calculate(&self) -> u16 {
        let delta = self.shadow >> self.shift;
        if self.negate {
            self.shadow.wrapping_sub(delta)
        } else {
            self.shadow.wrapping_add(delta)
        }
    }

    fn write(&mut self, val: u8) {
        self.period = (val >> 4) & 0x07;
        self.negate = val & 0x08 != 0;
        self.shift = val & 0x07;
    }

    fn reload(&mut self, freq: u16) {
        self.shadow = freq;
        self.timer = self.period;
        self.enabled = self.period != 0 || self.shift != 0;
    }
}

/// Pulse generator for channels 1 and 2.
///
/// The waveform is the difference of two saws offset by the duty fraction.
/// Both saws are corrected with polyBLEP around their discontinuities so
/// the pulse stays band-limited at high register values.
#[derive(Default, Debug)]
pub struct SquareChannel {
    pub(super) enabled: bool,
    pub(super) length: LengthCounter,
    pub(super) envelope: Envelope,
    sweep: Option<Sweep>,
    duty: u8,
    frequency: u16,
    phase: f64,
}

impl SquareChannel {
    pub fn new(with_sweep: bool) -> Self {
        Self {
            sweep: with_sweep.then(Sweep::default),
            length: LengthCounter::new(64),
            ..Default::default()
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn duty(&self) -> u8 {
        self.duty
    }

    /// 11-bit frequency register.
    pub fn frequency(&self) -> u16 {
        self.frequency
    }

    pub fn frequency_hz(&self) -> f64 {
        SQUARE_BASE_HZ / f64::from(2048 - self.frequency)
    }

    /// Quantize `hz` to the nearest register value.
    pub fn set_frequency_hz(&mut self, hz: f64) {
        if hz <= 0.0 {
            self.frequency = 0;
            return;
        }
        let reg = (2048.0 - SQUARE_BASE_HZ / hz).round();
        self.frequency = reg.clamp(0.0, 2047.0) as u16;
    }

    pub fn volume(&self) -> u8 {
        self.envelope.volume()
    }

    /// Length ticks left before the output is silenced.
    pub fn length_remaining(&self) -> u16 {
        self.length.remaining()
    }

    pub(super) fn write_sweep(&mut self, val: u8) {
        if let Some(sweep) = self.sweep.as_mut() {
            sweep.write(val);
        }
    }

    pub(super) fn write_duty_length(&mut self, val: u8) {
        self.duty = val >> 6;
        self.length.load(u16::from(val & 0x3F));
    }

    pub(super) fn write_envelope(&mut self, val: u8) {
        self.envelope.write(val);
        self.envelope.trigger();
        if !self.envelope.dac_enabled() {
            self.enabled = false;
        }
    }

    pub(super) fn write_frequency_low(&mut self, val: u8) {
        self.frequency = (self.frequency & 0x0700) | u16::from(val);
    }

    pub(super) fn write_frequency_high(&mut self, val: u8) {
        self.frequency = (self.frequency & 0x00FF) | (u16::from(val & 0x07) << 8);
        self.length.enabled = val & 0x40 != 0;
        if val & 0x80 != 0 {
            self.trigger();
        }
    }

    fn trigger(&mut self) {
        self.enabled = self.envelope.dac_enabled();
        self.length.trigger();
        self.envelope.trigger();
        self.phase = 0.0;
        let freq = self.frequency;
        let mut overflow = false;
        if let Some(sweep) = self.sweep.as_mut() {
            sweep.reload(freq);
            overflow = sweep.shift != 0 && sweep.calculate() > 2047;
        }
        if overflow {
            self.enabled = false;
        }
    }

    pub(super) fn clock_sweep(&mut self) {
        let Some(sweep) = self.sweep.as_mut() else {
            return;
        };
        if !sweep.enabled || sweep.period == 0 {
            return;
        }
        if sweep.timer > 0 {
            sweep.timer -= 1;
        }
        if sweep.timer != 0 {
            return;
        }
        sweep.timer = sweep.period;
        let next = sweep.calculate();
        if next > 2047 {
            sweep.enabled = false;
            self.enabled = false;
            return;
        }
        if sweep.shift != 0 {
            sweep.shadow = next;
            self.frequency = next;
            if sweep.calculate() > 2047 {
                sweep.enabled = false;
                self.enabled = false;
            }
        }
    }

    fn audible(&self) -> bool {
        self.enabled && !self.length.expired()
    }
}

/// polyBLEP residual for a unit-amplitude step at phase 0.
fn poly_blep(t: f64, dt: f64) -> f64 {
    if t < dt {
        let t = t / dt;
        t + t - t * t - 1.0
    } else if t > 1.0 - dt {
        let t = (t - 1.0) / dt;
        t * t + t + t + 1.0
    } else {
        0.0
    }
}

/// Rising saw in `-1.0..1.0` with its falling edge at phase 0.
fn saw(phase: f64, dt: f64) -> f64 {
    2.0 * phase - 1.0 - poly_blep(phase, dt)
}

impl Voice for SquareChannel {
    fn next_level(&mut self, rate: f64) -> f32 {
        let dt = self.frequency_hz() / rate;
        let phase = self.phase;
        self.phase = (self.phase + dt).fract();
        if !self.audible() || dt >= 0.5 {
            return 0.0;
        }
        let duty = DUTY_FRACTIONS[self.duty as usize];
        let shifted = (phase - duty + 1.0).fract();
        let pulse = 0.5 * (saw(shifted, dt) - saw(phase, dt));
        pulse as f32 * self.envelope.gain()
    }
}
