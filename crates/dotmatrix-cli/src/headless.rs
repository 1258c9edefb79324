//! Drives a machine on the scheduler thread until enough frames have been
//! delivered, a breakpoint or fault pauses it, or the wall clock runs out.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel::{self as cb, Sender, select};
use dotmatrix_core::{
    apu::Channel,
    audio_queue::AudioConsumer,
    error::EmuError,
    gameboy::GameBoy,
    hardware::{CLOCK_HZ, CYCLES_PER_FRAME},
    ppu::{SCREEN_HEIGHT, SCREEN_WIDTH, VideoOutput},
    scheduler::{BreakReason, Event, FramePacing, Scheduler},
};
use log::{debug, warn};

/// About a third of a second at 44.1 kHz.
const AUDIO_CAPACITY: usize = 16_384;

pub fn frame_period() -> Duration {
    Duration::from_secs_f64(f64::from(CYCLES_PER_FRAME) / f64::from(CLOCK_HZ))
}

/// Video output that keeps the latest frame and announces each delivery.
struct FrameSink {
    latest: Arc<Mutex<Vec<u8>>>,
    delivered: Sender<u64>,
    count: u64,
}

impl VideoOutput for FrameSink {
    fn set_size(&mut self, width: usize, height: usize) {
        debug!("Video output sized {width}x{height}");
    }

    fn render_frame(&mut self, rgb: &[u8]) {
        if let Ok(mut latest) = self.latest.lock() {
            latest.clear();
            latest.extend_from_slice(rgb);
        }
        self.count += 1;
        let _ = self.delivered.send(self.count);
    }
}

/// Peak absolute level seen on each sound channel.
struct AudioMeter {
    queues: [AudioConsumer; 4],
    peaks: [f32; 4],
}

impl AudioMeter {
    fn drain(&mut self) {
        for (queue, peak) in self.queues.iter_mut().zip(self.peaks.iter_mut()) {
            while let Some((l, r)) = queue.pop_stereo() {
                *peak = peak.max(l.abs()).max(r.abs());
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub frames: u64,
    pub timeout: Duration,
    pub breakpoints: Vec<u16>,
    pub audio_report: bool,
}

#[derive(Debug)]
pub enum Outcome {
    Completed,
    Paused { pc: u16, reason: BreakReason },
    TimedOut,
}

pub struct Report {
    pub gb: GameBoy,
    pub outcome: Outcome,
    pub frames: u64,
    /// RGB888, empty when no frame was delivered.
    pub last_frame: Vec<u8>,
    pub serial: Vec<u8>,
    /// Indexed like [`Channel::ALL`].
    pub audio_peaks: Option<[f32; 4]>,
}

pub fn run(mut gb: GameBoy, opts: &RunOptions) -> Result<Report, EmuError> {
    let (frame_tx, frame_rx) = cb::unbounded();
    let latest = Arc::new(Mutex::new(Vec::new()));
    gb.set_video(Box::new(FrameSink {
        latest: Arc::clone(&latest),
        delivered: frame_tx,
        count: 0,
    }));
    for &addr in &opts.breakpoints {
        gb.breakpoints.add(addr);
    }
    let mut meter = opts.audio_report.then(|| AudioMeter {
        queues: Channel::ALL.map(|ch| gb.connect_audio(ch, AUDIO_CAPACITY)),
        peaks: [0.0; 4],
    });

    let pacing = if gb.config().frame_limit {
        FramePacing::Ticker(frame_period())
    } else {
        FramePacing::Unlimited
    };
    let scheduler = Scheduler::spawn(gb, pacing)?;
    scheduler.resume();

    let deadline = Instant::now() + opts.timeout;
    let mut frames = 0;
    let outcome = loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let done = select! {
            recv(frame_rx) -> msg => {
                if let Some(meter) = meter.as_mut() {
                    meter.drain();
                }
                match msg {
                    Ok(n) => {
                        frames = n;
                        (n >= opts.frames).then_some(Outcome::Completed)
                    }
                    Err(_) => None,
                }
            }
            recv(scheduler.events()) -> event => Some(match event {
                Ok(Event::Paused { pc, reason }) => Outcome::Paused { pc, reason },
                Ok(Event::Terminated) | Err(_) => Outcome::Completed,
            }),
            default(remaining) => {
                warn!("Run hit the wall-clock limit after {frames} frames");
                Some(Outcome::TimedOut)
            }
        };
        if let Some(outcome) = done {
            break outcome;
        }
    };

    let Some(mut gb) = scheduler.join() else {
        return Err(EmuError::Io(std::io::Error::other(
            "emulation thread panicked",
        )));
    };
    gb.take_video();
    if let Some(meter) = meter.as_mut() {
        meter.drain();
    }
    let last_frame = latest.lock().map(|f| f.clone()).unwrap_or_default();

    Ok(Report {
        serial: gb.mmu.serial.take_output(),
        gb,
        outcome,
        frames,
        last_frame,
        audio_peaks: meter.map(|m| m.peaks),
    })
}

/// Write an RGB888 frame as an 8-bit RGB PNG.
pub fn save_png(path: &Path, rgb: &[u8]) -> std::io::Result<()> {
    let file = File::create(path)?;
    let w = BufWriter::new(file);
    let mut encoder = png::Encoder::new(w, SCREEN_WIDTH as u32, SCREEN_HEIGHT as u32);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header().map_err(std::io::Error::other)?;
    writer
        .write_image_data(rgb)
        .map_err(std::io::Error::other)?;
    Ok(())
}

pub fn describe(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Completed => "completed".to_string(),
        Outcome::TimedOut => "timed out".to_string(),
        Outcome::Paused { pc, reason } => match reason {
            BreakReason::Breakpoint(id) => format!("breakpoint {id} at {pc:04X}"),
            BreakReason::Step => format!("stepped to {pc:04X}"),
            BreakReason::Request => format!("break requested at {pc:04X}"),
            BreakReason::Fault(e) => format!("fault at {pc:04X}: {e}"),
        },
    }
}
