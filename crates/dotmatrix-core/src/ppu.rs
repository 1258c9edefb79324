use log::debug;

use crate::hardware::{CYCLES_PER_FRAME, DOTS_PER_LINE, Model};
use crate::interrupt::{Interrupt, InterruptLine};

pub mod fetch;
pub mod oam;
pub mod palette;
mod render;
pub mod video;

use fetch::{FetchSource, TileFetcher};
use oam::{LineSprites, OAM_SIZE};
use palette::{DEFAULT_SHADES, PaletteRam};
use video::FrameBuffers;

pub use oam::SpriteAttribute;
pub use video::VideoOutput;

// Screen resolution
pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;

pub const VRAM_BANK_SIZE: usize = 0x2000;

const OAM_SEARCH_DOTS: u32 = 80;
const VISIBLE_LINES: u32 = SCREEN_HEIGHT as u32;

// Cycles between the first background fetch landing and the first pixel.
const PIPELINE_FILL: u16 = 2;

// Window X position is clipped if greater than this value
const WINDOW_X_MAX: u8 = 166;

// VRAM layout
const BG_MAP_0_BASE: usize = 0x1800;
const BG_MAP_1_BASE: usize = 0x1C00;

const LCDC_ENABLE: u8 = 0x80;
const LCDC_WINDOW_MAP: u8 = 0x40;
const LCDC_WINDOW: u8 = 0x20;
const LCDC_TILE_DATA: u8 = 0x10;
const LCDC_BG_MAP: u8 = 0x08;
const LCDC_OBJ_SIZE: u8 = 0x04;
const LCDC_OBJ: u8 = 0x02;
const LCDC_BG: u8 = 0x01;

const STAT_LYC_IRQ: u8 = 0x40;
const STAT_OAM_IRQ: u8 = 0x20;
const STAT_VBLANK_IRQ: u8 = 0x10;
const STAT_HBLANK_IRQ: u8 = 0x08;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Mode {
    HBlank = 0,
    VBlank = 1,
    OamSearch = 2,
    PixelTransfer = 3,
}

/// Progress through the pixel-transfer phase of the current line.
#[derive(Clone, Debug, Default)]
struct Transfer {
    /// Next output column.
    x: u8,
    /// Idle cycles owed before the next pixel.
    stall: u16,
    /// Cycles spent in this transfer so far.
    cycles: u16,
    /// Window has taken over the rest of the line.
    window: bool,
    /// Line sprite slots already fetched.
    sprites_fetched: u16,
}

pub struct Ppu {
    vram: Box<[[u8; VRAM_BANK_SIZE]; 2]>,
    vram_bank: usize,
    oam: [u8; OAM_SIZE],

    model: Model,

    lcdc: u8,
    stat: u8,
    scy: u8,
    scx: u8,
    ly: u8,
    lyc: u8,
    bgp: u8,
    obp0: u8,
    obp1: u8,
    wy: u8,
    wx: u8,

    bg_palettes: PaletteRam,
    obj_palettes: PaletteRam,
    shades: [[u8; 3]; 4],

    /// Dot within the frame, `0..CYCLES_PER_FRAME`.
    dot: u32,
    mode: Mode,
    coincidence: bool,
    stat_line: bool,

    line_sprites: LineSprites,
    transfer: Transfer,
    fetcher: TileFetcher,
    /// Internal window line counter
    window_line: u8,
    last_transfer_cycles: u16,

    frames: FrameBuffers,
    video: Option<Box<dyn VideoOutput>>,
    frame_count: u64,
    hblank_count: u64,

    irq: InterruptLine,
}

impl Ppu {
    pub fn new(model: Model, irq: InterruptLine) -> Self {
        Self {
            vram: Box::new([[0; VRAM_BANK_SIZE]; 2]),
            vram_bank: 0,
            oam: [0; OAM_SIZE],
            model,
            lcdc: 0,
            stat: 0,
            scy: 0,
            scx: 0,
            ly: 0,
            lyc: 0,
            bgp: 0,
            obp0: 0,
            obp1: 0,
            wy: 0,
            wx: 0,
            bg_palettes: PaletteRam::default(),
            obj_palettes: PaletteRam::default(),
            shades: DEFAULT_SHADES,
            dot: 0,
            mode: Mode::HBlank,
            coincidence: false,
            stat_line: false,
            line_sprites: LineSprites::default(),
            transfer: Transfer::default(),
            fetcher: TileFetcher::default(),
            window_line: 0,
            last_transfer_cycles: 0,
            frames: FrameBuffers::default(),
            video: None,
            frame_count: 0,
            hblank_count: 0,
            irq,
        }
    }

    /// Register state left behind by the boot ROM.
    pub fn apply_boot_state(&mut self) {
        self.lcdc = 0x91;
        self.stat = 0;
        self.bgp = 0xFC;
        self.obp0 = 0xFF;
        self.obp1 = 0xFF;
        self.dot = 0;
        self.ly = 0;
        self.mode = Mode::OamSearch;
        self.stat_line = false;
    }

    pub fn set_video(&mut self, mut video: Box<dyn VideoOutput>) {
        video.set_size(SCREEN_WIDTH, SCREEN_HEIGHT);
        self.video = Some(video);
    }

    pub fn take_video(&mut self) -> Option<Box<dyn VideoOutput>> {
        self.video.take()
    }

    pub fn set_shades(&mut self, shades: [[u8; 3]; 4]) {
        self.shades = shades;
    }

    pub fn lcd_enabled(&self) -> bool {
        self.lcdc & LCDC_ENABLE != 0
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn ly(&self) -> u8 {
        self.ly
    }

    pub fn in_hblank(&self) -> bool {
        self.mode == Mode::HBlank
    }

    /// Number of HBlank periods entered since power on.
    pub fn hblank_count(&self) -> u64 {
        self.hblank_count
    }

    /// Number of frames completed since power on.
    pub fn frames(&self) -> u64 {
        self.frame_count
    }

    /// Length in cycles of the most recent pixel transfer.
    pub fn last_transfer_cycles(&self) -> u16 {
        self.last_transfer_cycles
    }

    pub fn window_line_counter(&self) -> u8 {
        self.window_line
    }

    /// Last completed frame, RGB888.
    pub fn front_buffer(&self) -> &[u8] {
        self.frames.front()
    }

    /// Background color index at a pixel of the frame in progress.
    pub fn color_index(&self, x: usize, y: usize) -> u8 {
        self.frames.color_index(x, y)
    }

    pub fn line_sprites(&self) -> &LineSprites {
        &self.line_sprites
    }

    /// Hand the last completed frame to the video output again.
    pub fn blit(&mut self) {
        if let Some(video) = self.video.as_mut() {
            video.blit();
        }
    }

    pub fn read_vram(&self, addr: u16) -> u8 {
        self.vram[self.vram_bank][addr as usize & 0x1FFF]
    }

    pub fn write_vram(&mut self, addr: u16, val: u8) {
        self.vram[self.vram_bank][addr as usize & 0x1FFF] = val;
    }

    pub fn read_oam(&self, index: usize) -> u8 {
        self.oam.get(index).copied().unwrap_or(0xFF)
    }

    pub fn write_oam(&mut self, index: usize, val: u8) {
        if let Some(b) = self.oam.get_mut(index) {
            *b = val;
        }
    }

    pub fn sprite(&self, index: usize) -> SpriteAttribute {
        SpriteAttribute::from_oam(&self.oam, index)
    }

    pub fn read_reg(&self, addr: u16) -> u8 {
        let cgb = self.model.is_cgb();
        match addr {
            0xFF40 => self.lcdc,
            0xFF41 => {
                let mode = if self.lcd_enabled() { self.mode as u8 } else { 0 };
                0x80 | (self.stat & 0x78) | (u8::from(self.coincidence) << 2) | mode
            }
            0xFF42 => self.scy,
            0xFF43 => self.scx,
            0xFF44 => self.ly,
            0xFF45 => self.lyc,
            0xFF47 => self.bgp,
            0xFF48 => self.obp0,
            0xFF49 => self.obp1,
            0xFF4A => self.wy,
            0xFF4B => self.wx,
            0xFF4F if cgb => 0xFE | self.vram_bank as u8,
            0xFF68 if cgb => self.bg_palettes.read_index(),
            0xFF69 if cgb => self.bg_palettes.read_data(),
            0xFF6A if cgb => self.obj_palettes.read_index(),
            0xFF6B if cgb => self.obj_palettes.read_data(),
            _ => 0xFF,
        }
    }

    pub fn write_reg(&mut self, addr: u16, val: u8) {
        let cgb = self.model.is_cgb();
        match addr {
            0xFF40 => {
                let was_on = self.lcd_enabled();
                self.lcdc = val;
                match (was_on, self.lcd_enabled()) {
                    (true, false) => self.disable_lcd(),
                    (false, true) => self.enable_lcd(),
                    _ => {}
                }
            }
            0xFF41 => self.stat = val & 0x78,
            0xFF42 => self.scy = val,
            0xFF43 => self.scx = val,
            0xFF44 => {}
            0xFF45 => self.lyc = val,
            0xFF47 => self.bgp = val,
            0xFF48 => self.obp0 = val,
            0xFF49 => self.obp1 = val,
            0xFF4A => self.wy = val,
            0xFF4B => self.wx = val,
            0xFF4F if cgb => self.vram_bank = (val & 0x01) as usize,
            0xFF68 if cgb => self.bg_palettes.write_index(val),
            0xFF69 if cgb => self.bg_palettes.write_data(val),
            0xFF6A if cgb => self.obj_palettes.write_index(val),
            0xFF6B if cgb => self.obj_palettes.write_data(val),
            _ => {}
        }
    }

    /// Advance one dot.
    pub fn step(&mut self) {
        if !self.lcd_enabled() {
            return;
        }

        let line = self.dot / DOTS_PER_LINE;
        let line_dot = self.dot % DOTS_PER_LINE;

        if line_dot == 0 {
            self.ly = line as u8;
            if line < VISIBLE_LINES {
                self.mode = Mode::OamSearch;
            } else if line == VISIBLE_LINES {
                self.enter_vblank();
            }
        }

        if line < VISIBLE_LINES {
            if line_dot == OAM_SEARCH_DOTS {
                self.begin_transfer();
            } else if self.mode == Mode::PixelTransfer {
                self.transfer_cycle();
            }
        }

        self.update_stat();

        self.dot += 1;
        if self.dot == CYCLES_PER_FRAME {
            self.dot = 0;
            self.window_line = 0;
        }
    }

    fn sprite_height(&self) -> u8 {
        if self.lcdc & LCDC_OBJ_SIZE != 0 { 16 } else { 8 }
    }

    fn window_enabled(&self) -> bool {
        self.lcdc & LCDC_WINDOW != 0 && (self.model.is_cgb() || self.lcdc & LCDC_BG != 0)
    }

    fn window_starts_at(&self, x: u8) -> bool {
        self.window_enabled()
            && self.ly >= self.wy
            && self.wx <= WINDOW_X_MAX
            && x as u16 + 7 >= self.wx as u16
    }

    fn bg_map_base(&self) -> usize {
        if self.lcdc & LCDC_BG_MAP != 0 { BG_MAP_1_BASE } else { BG_MAP_0_BASE }
    }

    fn window_map_base(&self) -> usize {
        if self.lcdc & LCDC_WINDOW_MAP != 0 { BG_MAP_1_BASE } else { BG_MAP_0_BASE }
    }

    /// OAM search result is latched and the first background fetch issued.
    fn begin_transfer(&mut self) {
        self.line_sprites = oam::search(&self.oam, self.ly, self.sprite_height());
        self.mode = Mode::PixelTransfer;
        self.transfer = Transfer {
            stall: PIPELINE_FILL + (self.scx % 8) as u16,
            cycles: 1,
            ..Transfer::default()
        };
        let py = self.ly.wrapping_add(self.scy);
        let source = self.tile_source(self.bg_map_base(), self.scx / 8, py);
        self.start_fetch(source);
    }

    fn start_fetch(&mut self, source: FetchSource) {
        self.fetcher.start(source);
        self.fetcher.tick(&self.vram, &self.oam);
    }

    fn transfer_cycle(&mut self) {
        self.transfer.cycles += 1;

        if self.fetcher.busy() {
            self.fetcher.tick(&self.vram, &self.oam);
            return;
        }
        if self.transfer.stall > 0 {
            self.transfer.stall -= 1;
            return;
        }

        let x = self.transfer.x;
        if !self.transfer.window && self.window_starts_at(x) {
            self.transfer.window = true;
            let source = self.tile_source(self.window_map_base(), 0, self.window_line);
            self.start_fetch(source);
            return;
        }

        if let Some(slot) = self.unfetched_sprite_at(x) {
            self.transfer.sprites_fetched |= 1 << slot;
            if let Some((index, sprite)) = self.line_sprites.get(slot) {
                let align = (sprite.x as u16 + self.scx as u16) % 8;
                self.transfer.stall = 5 - align.min(5);
                self.start_fetch(FetchSource::Sprite {
                    index: index as usize,
                });
            }
            return;
        }

        self.render_pixel(x);
        self.transfer.x += 1;
        if self.transfer.x as usize == SCREEN_WIDTH {
            self.finish_transfer();
        }
    }

    fn unfetched_sprite_at(&self, x: u8) -> Option<usize> {
        if self.lcdc & LCDC_OBJ == 0 {
            return None;
        }
        (0..self.line_sprites.len()).find(|&slot| {
            self.transfer.sprites_fetched & (1 << slot) == 0
                && self
                    .line_sprites
                    .get(slot)
                    .is_some_and(|(_, s)| s.first_column() == x)
        })
    }

    fn finish_transfer(&mut self) {
        self.mode = Mode::HBlank;
        self.hblank_count += 1;
        self.last_transfer_cycles = self.transfer.cycles;
        if self.transfer.window {
            self.window_line = self.window_line.wrapping_add(1);
        }
        #[cfg(feature = "ppu-trace")]
        log::trace!(
            "LY={} transfer={} sprites={} window={}",
            self.ly,
            self.transfer.cycles,
            self.line_sprites.len(),
            self.transfer.window
        );
    }

    fn enter_vblank(&mut self) {
        self.mode = Mode::VBlank;
        self.irq.raise(Interrupt::VBlank);
        self.frames.swap();
        self.frame_count += 1;
        if let Some(video) = self.video.as_mut() {
            video.render_frame(self.frames.front());
        }
    }

    fn enable_lcd(&mut self) {
        self.dot = 0;
        self.ly = 0;
        self.window_line = 0;
        self.stat_line = false;
        self.mode = Mode::OamSearch;
        debug!("LCD enabled");
    }

    fn disable_lcd(&mut self) {
        self.mode = Mode::HBlank;
        self.ly = 0;
        self.dot = 0;
        self.window_line = 0;
        self.transfer = Transfer::default();
        self.fetcher.cancel();
        self.line_sprites.clear();

        let blank = if self.model.is_cgb() {
            [0xFF; 3]
        } else {
            self.shades[0]
        };
        self.frames.fill(blank);
        if let Some(video) = self.video.as_mut() {
            video.render_frame(self.frames.front());
            video.blit();
        }
        debug!("LCD disabled");
    }

    fn update_stat(&mut self) {
        self.coincidence = self.ly == self.lyc;
        let mode_signal = match self.mode {
            Mode::HBlank => self.stat & STAT_HBLANK_IRQ != 0,
            Mode::VBlank => self.stat & STAT_VBLANK_IRQ != 0,
            Mode::OamSearch => self.stat & STAT_OAM_IRQ != 0,
            Mode::PixelTransfer => false,
        };
        let line = mode_signal || (self.coincidence && self.stat & STAT_LYC_IRQ != 0);
        if line && !self.stat_line {
            self.irq.raise(Interrupt::LcdStat);
        }
        self.stat_line = line;
    }
}
