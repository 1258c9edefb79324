use super::LengthCounter;
use super::output::Voice;

const WAVE_BASE_HZ: f64 = 65_536.0;

/// Channel 3: a 32-step, 4-bit wave table played back at the register
/// frequency.
#[derive(Debug)]
pub struct WaveChannel {
    pub(super) enabled: bool,
    pub(super) length: LengthCounter,
    dac_enabled: bool,
    volume_code: u8,
    frequency: u16,
    phase: f64,
    table: [u8; 0x10],
}

impl Default for WaveChannel {
    fn default() -> Self {
        Self {
            enabled: false,
            length: LengthCounter::new(256),
            dac_enabled: false,
            volume_code: 0,
            frequency: 0,
            phase: 0.0,
            table: [0; 0x10],
        }
    }
}

impl WaveChannel {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn frequency(&self) -> u16 {
        self.frequency
    }

    /// Table playback rate in full cycles per second.
    pub fn frequency_hz(&self) -> f64 {
        WAVE_BASE_HZ / f64::from(2048 - self.frequency)
    }

    /// Output scale selected by NR32: mute, 100%, 50%, 25%.
    pub fn volume_scale(&self) -> f32 {
        match self.volume_code {
            1 => 1.0,
            2 => 0.5,
            3 => 0.25,
            _ => 0.0,
        }
    }

    /// Sample `index` (0-31) of the wave table.
    pub fn nibble(&self, index: usize) -> u8 {
        let byte = self.table[(index / 2) & 0x0F];
        if index & 1 == 0 { byte >> 4 } else { byte & 0x0F }
    }

    pub(super) fn read_table(&self, offset: usize) -> u8 {
        self.table[offset & 0x0F]
    }

    pub(super) fn write_table(&mut self, offset: usize, val: u8) {
        self.table[offset & 0x0F] = val;
    }

    pub(super) fn write_dac(&mut self, val: u8) {
        self.dac_enabled = val & 0x80 != 0;
        if !self.dac_enabled {
            self.enabled = false;
        }
    }

    pub(super) fn write_length(&mut self, val: u8) {
        self.length.load(u16::from(val));
    }

    pub(super) fn write_volume(&mut self, val: u8) {
        self.volume_code = (val >> 5) & 0x03;
    }

    pub(super) fn write_frequency_low(&mut self, val: u8) {
        self.frequency = (self.frequency & 0x0700) | u16::from(val);
    }

    pub(super) fn write_frequency_high(&mut self, val: u8) {
        self.frequency = (self.frequency & 0x00FF) | (u16::from(val & 0x07) << 8);
        self.length.enabled = val & 0x40 != 0;
        if val & 0x80 != 0 {
            self.enabled = self.dac_enabled;
            self.length.trigger();
            self.phase = 0.0;
        }
    }

    /// Power-off reset. The wave table survives.
    pub(super) fn reset(&mut self) {
        let table = self.table;
        *self = Self {
            table,
            ..Self::default()
        };
    }
}

impl Voice for WaveChannel {
    fn next_level(&mut self, rate: f64) -> f32 {
        let step = self.frequency_hz() / rate;
        let index = (self.phase * 32.0) as usize;
        self.phase = (self.phase + step).fract();
        if !self.enabled || self.length.expired() {
            return 0.0;
        }
        let level = f32::from(self.nibble(index)) / 7.5 - 1.0;
        level * self.volume_scale()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> WaveChannel {
        let mut ch = WaveChannel::default();
        for i in 0..16 {
            let hi = (i * 2) as u8 & 0x0F;
            let lo = (i * 2 + 1) as u8 & 0x0F;
            ch.write_table(i, (hi << 4) | lo);
        }
        ch
    }

    #[test]
    fn nibbles_are_high_first() {
        let mut ch = WaveChannel::default();
        ch.write_table(0, 0xA5);
        assert_eq!(ch.nibble(0), 0x0A);
        assert_eq!(ch.nibble(1), 0x05);
    }

    #[test]
    fn volume_codes_scale_output() {
        let mut ch = ramp();
        ch.write_dac(0x80);
        ch.write_table(0, 0xFF);
        for (code, expected) in [(0u8, 0.0f32), (1, 1.0), (2, 0.5), (3, 0.25)] {
            ch.write_volume(code << 5);
            ch.write_frequency_high(0x80);
            assert_eq!(ch.next_level(44_100.0), expected);
        }
    }

    #[test]
    fn playback_walks_the_table() {
        let mut ch = ramp();
        ch.write_dac(0x80);
        ch.write_volume(0x20);
        // 65536 / (2048 - 1024) = 64 Hz; at 2048 frames/s one table step per frame.
        ch.write_frequency_low(0x00);
        ch.write_frequency_high(0x84);
        let levels: Vec<f32> = (0..4).map(|_| ch.next_level(2048.0)).collect();
        let expected: Vec<f32> = (0..4).map(|n| n as f32 / 7.5 - 1.0).collect();
        assert_eq!(levels, expected);
    }

    #[test]
    fn dac_gate_blocks_trigger() {
        let mut ch = ramp();
        ch.write_frequency_high(0x80);
        assert!(!ch.enabled());
        ch.write_dac(0x80);
        ch.write_frequency_high(0x80);
        assert!(ch.enabled());
        ch.write_dac(0x00);
        assert!(!ch.enabled());
    }

    #[test]
    fn reset_keeps_table() {
        let mut ch = ramp();
        ch.write_dac(0x80);
        ch.reset();
        assert_eq!(ch.read_table(1), 0x23);
        assert!(!ch.dac_enabled);
    }
}
