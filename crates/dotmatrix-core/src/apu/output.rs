use crate::hardware::CLOCK_HZ;

/// Sink for one channel's synthesized audio.
///
/// `samples` holds interleaved stereo frames (left, right) in `-1.0..=1.0`.
/// `offset` and `length` are counted in samples, not frames. The slice is
/// only borrowed for the duration of the call.
pub trait AudioChannelOutput: Send {
    fn sample_rate(&self) -> u32;
    fn buffer_samples(&mut self, samples: &[f32], offset: usize, length: usize);
}

/// The four sound generators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    Square1,
    Square2,
    Wave,
    Noise,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::Square1,
        Channel::Square2,
        Channel::Wave,
        Channel::Noise,
    ];

    pub(super) fn index(self) -> usize {
        self as usize
    }

    /// NR51 bits routing this channel to (left, right).
    pub(super) fn pan_bits(self) -> (u8, u8) {
        let bit = 1 << self.index();
        (bit << 4, bit)
    }
}

/// A generator that yields one mono level per output frame.
pub(super) trait Voice {
    /// Advance by one frame at `rate` Hz and return the level in `-1.0..=1.0`.
    fn next_level(&mut self, rate: f64) -> f32;
}

/// Per-side gains derived from NR50/NR51 for one channel.
#[derive(Clone, Copy, Debug, Default)]
pub(super) struct Mix {
    pub left: f32,
    pub right: f32,
}

impl Mix {
    pub fn new(channel: Channel, nr50: u8, nr51: u8) -> Self {
        let (left_bit, right_bit) = channel.pan_bits();
        let left_vol = f32::from(((nr50 >> 4) & 0x07) + 1) / 8.0;
        let right_vol = f32::from((nr50 & 0x07) + 1) / 8.0;
        Self {
            left: if nr51 & left_bit != 0 { left_vol } else { 0.0 },
            right: if nr51 & right_bit != 0 { right_vol } else { 0.0 },
        }
    }

    pub const SILENT: Mix = Mix {
        left: 0.0,
        right: 0.0,
    };
}

/// Output slot for one channel: the host sink plus the scratch buffer
/// frames are rendered into before each handoff.
#[derive(Default)]
pub(super) struct ChannelSink {
    output: Option<Box<dyn AudioChannelOutput>>,
    scratch: Vec<f32>,
    // Fractional frames carried between segments, in units of 1/CLOCK_HZ.
    remainder: u64,
}

impl ChannelSink {
    pub fn set(&mut self, output: Option<Box<dyn AudioChannelOutput>>) -> Option<Box<dyn AudioChannelOutput>> {
        self.remainder = 0;
        self.scratch.clear();
        std::mem::replace(&mut self.output, output)
    }

    pub fn is_connected(&self) -> bool {
        self.output.is_some()
    }

    /// Render the frames covering `cycles` dot-cycles into the scratch buffer.
    pub fn render(&mut self, voice: &mut dyn Voice, cycles: u32, mix: Mix) {
        let Some(rate) = self.output.as_ref().map(|o| o.sample_rate()) else {
            return;
        };
        if rate == 0 {
            return;
        }
        self.remainder += u64::from(cycles) * u64::from(rate);
        let frames = self.remainder / u64::from(CLOCK_HZ);
        self.remainder %= u64::from(CLOCK_HZ);

        let rate = f64::from(rate);
        self.scratch.reserve(frames as usize * 2);
        for _ in 0..frames {
            let level = voice.next_level(rate);
            self.scratch.push(level * mix.left);
            self.scratch.push(level * mix.right);
        }
    }

    /// Hand the rendered frames to the sink and reset the scratch buffer.
    pub fn flush(&mut self) {
        if let Some(out) = self.output.as_mut()
            && !self.scratch.is_empty()
        {
            out.buffer_samples(&self.scratch, 0, self.scratch.len());
        }
        self.scratch.clear();
    }
}
