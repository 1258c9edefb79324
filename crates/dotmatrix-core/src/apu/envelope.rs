/// Volume envelope shared by both square channels and the noise channel.
///
/// Clocked at 64 Hz by the frame sequencer. A period of 0 freezes the
/// volume at its initial level.
#[derive(Default, Clone, Copy, Debug)]
pub struct Envelope {
    initial: u8,
    period: u8,
    add: bool,
    volume: u8,
    timer: u8,
}

impl Envelope {
    /// Latch a new NRx2 value. Channels restart the envelope right after.
    pub fn write(&mut self, val: u8) {
        self.initial = val >> 4;
        self.add = val & 0x08 != 0;
        self.period = val & 0x07;
    }

    /// Restart the envelope from its initial volume.
    pub fn trigger(&mut self) {
        self.volume = self.initial;
        self.timer = self.period;
    }

    pub fn clock(&mut self) {
        if self.period == 0 {
            return;
        }
        if self.timer > 0 {
            self.timer -= 1;
        }
        if self.timer == 0 {
            self.timer = self.period;
            if self.add && self.volume < 15 {
                self.volume += 1;
            } else if !self.add && self.volume > 0 {
                self.volume -= 1;
            }
        }
    }

    /// The DAC is powered unless the initial volume is 0 with a falling
    /// direction.
    pub fn dac_enabled(&self) -> bool {
        self.initial != 0 || self.add
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Current volume scaled to `0.0..=1.0`.
    pub fn gain(&self) -> f32 {
        f32::from(self.volume) / 15.0
    }

    pub(super) fn force_volume(&mut self, volume: u8) {
        self.volume = volume.min(15);
    }
}
