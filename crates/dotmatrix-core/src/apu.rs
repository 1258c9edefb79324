//! Sound processor: two pulse channels (one with sweep), a wave channel and
//! a noise channel behind the NR10-NR52 register file.
//!
//! The APU is stepped once per video frame with the elapsed dot-cycles.
//! The frame sequencer is advanced over that span in 512 Hz segments and
//! each connected channel renders the frames covering every segment, so
//! envelope, length and sweep changes land at the right sample.

use log::debug;

pub mod envelope;
pub mod noise;
pub mod output;
pub mod square;
pub mod wave;

pub use noise::{Lfsr, NoiseChannel};
pub use output::{AudioChannelOutput, Channel};
pub use square::SquareChannel;
pub use wave::WaveChannel;

use output::{ChannelSink, Mix, Voice};

// 512 Hz frame sequencer tick.
const FRAME_SEQUENCER_PERIOD: u32 = 8192;

const NR10: u16 = 0xFF10;
const NR52: u16 = 0xFF26;
const REG_COUNT: usize = (NR52 - NR10) as usize + 1;

/// Register contents left behind by the boot ROM, FF10-FF26.
const POST_BOOT_REGS: [u8; REG_COUNT] = [
    0x80, 0xBF, 0xF3, 0xFF, 0xBF, 0xFF, 0x3F, 0x00, 0xFF, 0xBF, 0x7F, 0xFF, 0x9F, 0xFF, 0xBF, 0xFF,
    0xFF, 0x00, 0x00, 0xBF, 0x77, 0xF3, 0xF1,
];

/// Bits that always read back as 1, FF10-FF26.
const READ_MASK: [u8; REG_COUNT] = [
    0x80, 0x3F, 0x00, 0xFF, 0xBF, 0xFF, 0x3F, 0x00, 0xFF, 0xBF, 0x7F, 0xFF, 0x9F, 0xFF, 0xBF, 0xFF,
    0xFF, 0x00, 0x00, 0xBF, 0x00, 0x00, 0x70,
];

/// Length counter shared by all four channels, clocked at 256 Hz.
///
/// Expiry silences the channel's output. The channel stays enabled.
#[derive(Default, Clone, Copy, Debug)]
pub struct LengthCounter {
    remaining: u16,
    max: u16,
    pub(crate) enabled: bool,
}

impl LengthCounter {
    pub fn new(max: u16) -> Self {
        Self {
            remaining: max,
            max,
            enabled: false,
        }
    }

    /// Load from the register's length field (`max - value` ticks remain).
    pub fn load(&mut self, value: u16) {
        self.remaining = self.max - value.min(self.max - 1);
    }

    pub fn trigger(&mut self) {
        if self.remaining == 0 {
            self.remaining = self.max;
        }
    }

    pub fn clock(&mut self) {
        if self.enabled && self.remaining > 0 {
            self.remaining -= 1;
        }
    }

    pub fn expired(&self) -> bool {
        self.enabled && self.remaining == 0
    }

    pub fn remaining(&self) -> u16 {
        self.remaining
    }
}

struct FrameSequencer {
    step: u8,
    counter: u32,
}

impl FrameSequencer {
    fn new() -> Self {
        Self {
            step: 0,
            counter: FRAME_SEQUENCER_PERIOD,
        }
    }

    /// Cycles until the next sequencer step.
    fn until_next(&self) -> u32 {
        self.counter
    }

    /// Consume `cycles` and return the step to run if a boundary was reached.
    fn advance(&mut self, cycles: u32) -> Option<u8> {
        self.counter -= cycles;
        if self.counter > 0 {
            return None;
        }
        self.counter = FRAME_SEQUENCER_PERIOD;
        let s = self.step;
        self.step = (self.step + 1) & 7;
        Some(s)
    }
}

pub struct Apu {
    ch1: SquareChannel,
    ch2: SquareChannel,
    ch3: WaveChannel,
    ch4: NoiseChannel,
    regs: [u8; REG_COUNT],
    nr50: u8,
    nr51: u8,
    powered: bool,
    sequencer: FrameSequencer,
    sinks: [ChannelSink; 4],
    cycles: u64,
}

impl Default for Apu {
    fn default() -> Self {
        Self::new()
    }
}

impl Apu {
    /// A powered-off APU with no outputs connected.
    pub fn new() -> Self {
        Self {
            ch1: SquareChannel::new(true),
            ch2: SquareChannel::new(false),
            ch3: WaveChannel::default(),
            ch4: NoiseChannel::default(),
            regs: [0; REG_COUNT],
            nr50: 0,
            nr51: 0,
            powered: false,
            sequencer: FrameSequencer::new(),
            sinks: Default::default(),
            cycles: 0,
        }
    }

    /// Load the register state the boot ROM leaves behind.
    ///
    /// Channel 1 reports active with its envelope already decayed to
    /// silence, as after the startup chime.
    pub fn apply_boot_state(&mut self) {
        self.write_reg(NR52, 0x80);
        for (i, &val) in POST_BOOT_REGS.iter().enumerate() {
            let addr = NR10 + i as u16;
            match addr {
                0xFF14 | 0xFF19 | 0xFF1E | 0xFF23 | NR52 => {}
                _ => self.write_reg(addr, val),
            }
        }
        self.regs = POST_BOOT_REGS;
        self.ch1.enabled = true;
        self.ch1.envelope.trigger();
        self.ch1.envelope.force_volume(0);
    }

    /// Connect (or with `None`, disconnect) a channel's output, returning
    /// the previous one.
    pub fn set_output(
        &mut self,
        channel: Channel,
        output: Option<Box<dyn AudioChannelOutput>>,
    ) -> Option<Box<dyn AudioChannelOutput>> {
        self.sinks[channel.index()].set(output)
    }

    pub fn take_output(&mut self, channel: Channel) -> Option<Box<dyn AudioChannelOutput>> {
        self.set_output(channel, None)
    }

    pub fn powered(&self) -> bool {
        self.powered
    }

    pub fn square1(&self) -> &SquareChannel {
        &self.ch1
    }

    pub fn square2(&self) -> &SquareChannel {
        &self.ch2
    }

    pub fn wave(&self) -> &WaveChannel {
        &self.ch3
    }

    pub fn noise(&self) -> &NoiseChannel {
        &self.ch4
    }

    /// Total dot-cycles stepped since construction.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// NR52 channel status bits (low nibble).
    pub fn status(&self) -> u8 {
        u8::from(self.ch1.enabled)
            | u8::from(self.ch2.enabled) << 1
            | u8::from(self.ch3.enabled) << 2
            | u8::from(self.ch4.enabled) << 3
    }

    pub fn read_reg(&self, addr: u16) -> u8 {
        match addr {
            NR52 => 0x70 | u8::from(self.powered) << 7 | self.status(),
            NR10..NR52 => {
                let i = (addr - NR10) as usize;
                self.regs[i] | READ_MASK[i]
            }
            0xFF30..=0xFF3F => self.ch3.read_table((addr - 0xFF30) as usize),
            _ => 0xFF,
        }
    }

    pub fn write_reg(&mut self, addr: u16, val: u8) {
        match addr {
            0xFF30..=0xFF3F => {
                self.ch3.write_table((addr - 0xFF30) as usize, val);
                return;
            }
            NR52 => {
                self.write_power(val);
                return;
            }
            NR10..NR52 if self.powered => {}
            _ => return,
        }

        self.regs[(addr - NR10) as usize] = val;
        match addr {
            0xFF10 => self.ch1.write_sweep(val),
            0xFF11 => self.ch1.write_duty_length(val),
            0xFF12 => self.ch1.write_envelope(val),
            0xFF13 => self.ch1.write_frequency_low(val),
            0xFF14 => self.ch1.write_frequency_high(val),
            0xFF16 => self.ch2.write_duty_length(val),
            0xFF17 => self.ch2.write_envelope(val),
            0xFF18 => self.ch2.write_frequency_low(val),
            0xFF19 => self.ch2.write_frequency_high(val),
            0xFF1A => self.ch3.write_dac(val),
            0xFF1B => self.ch3.write_length(val),
            0xFF1C => self.ch3.write_volume(val),
            0xFF1D => self.ch3.write_frequency_low(val),
            0xFF1E => self.ch3.write_frequency_high(val),
            0xFF20 => self.ch4.write_length(val),
            0xFF21 => self.ch4.write_envelope(val),
            0xFF22 => self.ch4.write_polynomial(val),
            0xFF23 => self.ch4.write_control(val),
            0xFF24 => self.nr50 = val,
            0xFF25 => self.nr51 = val,
            _ => {}
        }
    }

    fn write_power(&mut self, val: u8) {
        let on = val & 0x80 != 0;
        if on == self.powered {
            return;
        }
        debug!("APU power {}", if on { "on" } else { "off" });
        if on {
            self.sequencer = FrameSequencer::new();
        } else {
            self.power_off();
        }
        self.powered = on;
    }

    fn power_off(&mut self) {
        self.ch1 = SquareChannel::new(true);
        self.ch2 = SquareChannel::new(false);
        self.ch3.reset();
        self.ch4 = NoiseChannel::default();
        self.regs.fill(0);
        self.nr50 = 0;
        self.nr51 = 0;
    }

    fn clock_frame_sequencer(&mut self, step: u8) {
        if step & 1 == 0 {
            self.ch1.length.clock();
            self.ch2.length.clock();
            self.ch3.length.clock();
            self.ch4.length.clock();
        }
        if step == 2 || step == 6 {
            self.ch1.clock_sweep();
        }
        if step == 7 {
            self.ch1.envelope.clock();
            self.ch2.envelope.clock();
            self.ch4.envelope.clock();
        }
    }

    /// Render `cycles` worth of audio for every connected channel.
    fn render(&mut self, cycles: u32) {
        let powered = self.powered;
        let (nr50, nr51) = (self.nr50, self.nr51);
        let Self {
            ch1,
            ch2,
            ch3,
            ch4,
            sinks,
            ..
        } = self;
        let voices: [&mut dyn Voice; 4] = [ch1, ch2, ch3, ch4];
        for ((voice, sink), channel) in voices.into_iter().zip(sinks.iter_mut()).zip(Channel::ALL) {
            if !sink.is_connected() {
                continue;
            }
            let mix = if powered {
                Mix::new(channel, nr50, nr51)
            } else {
                Mix::SILENT
            };
            sink.render(voice, cycles, mix);
        }
    }

    /// Advance by `cycles` dot-cycles and hand the synthesized audio to
    /// each connected output.
    pub fn step(&mut self, cycles: u32) {
        self.cycles += u64::from(cycles);
        let mut remaining = cycles;
        while remaining > 0 {
            let segment = remaining.min(self.sequencer.until_next());
            self.render(segment);
            remaining -= segment;
            if let Some(step) = self.sequencer.advance(segment)
                && self.powered
            {
                self.clock_frame_sequencer(step);
            }
        }
        for sink in &mut self.sinks {
            sink.flush();
        }
    }
}
