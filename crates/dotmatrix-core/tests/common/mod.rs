#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use dotmatrix_core::{config::EmulatorConfig, gameboy::GameBoy, ppu::VideoOutput};

pub const ROM_BANK: usize = 0x4000;

/// Where [`RomBuilder::program`] places code. The entry point jumps here.
pub const PROGRAM_START: u16 = 0x0150;

/// Builds minimal cartridge images with a valid header.
pub struct RomBuilder {
    rom: Vec<u8>,
}

impl RomBuilder {
    /// 32 KiB ROM-only image whose entry point jumps to [`PROGRAM_START`]
    /// and whose program spins in place.
    pub fn new() -> Self {
        let mut rom = vec![0u8; 2 * ROM_BANK];
        // NOP; JP $0150
        rom[0x100..0x104].copy_from_slice(&[0x00, 0xC3, 0x50, 0x01]);
        // JR -2
        rom[0x150..0x152].copy_from_slice(&[0x18, 0xFE]);
        Self { rom }
    }

    pub fn title(mut self, title: &str) -> Self {
        let bytes = title.as_bytes();
        let len = bytes.len().min(15);
        self.rom[0x134..0x134 + len].copy_from_slice(&bytes[..len]);
        self
    }

    pub fn controller(mut self, code: u8) -> Self {
        self.rom[0x147] = code;
        self
    }

    pub fn ram_size(mut self, code: u8) -> Self {
        self.rom[0x149] = code;
        self
    }

    pub fn color(mut self) -> Self {
        self.rom[0x143] = 0x80;
        self
    }

    /// Grow the image to `count` 16 KiB banks and tag every switchable bank
    /// with its own number in its first two bytes.
    pub fn banks(mut self, count: usize) -> Self {
        self.rom.resize(count * ROM_BANK, 0);
        self.rom[0x148] = (count / 2).trailing_zeros() as u8;
        for bank in 1..count {
            let base = bank * ROM_BANK;
            self.rom[base] = (bank & 0xFF) as u8;
            self.rom[base + 1] = (bank >> 8) as u8;
        }
        self
    }

    pub fn program(mut self, code: &[u8]) -> Self {
        let start = PROGRAM_START as usize;
        self.rom[start..start + code.len()].copy_from_slice(code);
        self
    }

    pub fn at(mut self, addr: usize, bytes: &[u8]) -> Self {
        self.rom[addr..addr + bytes.len()].copy_from_slice(bytes);
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        let sum = self.rom[0x134..=0x14C]
            .iter()
            .fold(0u8, |acc, &b| acc.wrapping_sub(b).wrapping_sub(1));
        self.rom[0x14D] = sum;
        self.rom
    }
}

pub fn machine(rom: Vec<u8>) -> GameBoy {
    GameBoy::from_rom(rom, EmulatorConfig::default()).unwrap()
}

/// Step until the CPU reaches `pc`, panicking after `limit` instructions.
pub fn run_to(gb: &mut GameBoy, pc: u16, limit: usize) {
    for _ in 0..limit {
        if gb.pc() == pc {
            return;
        }
        gb.step();
    }
    panic!("PC never reached {pc:#06X} (stuck at {:#06X})", gb.pc());
}

/// Step until `ly` is on `line`.
pub fn run_to_line(gb: &mut GameBoy, line: u8) {
    for _ in 0..200_000 {
        if gb.mmu.ppu.ly() == line {
            return;
        }
        gb.step();
    }
    panic!("LY never reached {line}");
}

/// Video sink that keeps a copy of every delivered frame.
#[derive(Clone, Default)]
pub struct FrameCapture {
    pub frames: Arc<Mutex<Vec<Vec<u8>>>>,
    pub blits: Arc<Mutex<usize>>,
}

impl FrameCapture {
    pub fn count(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<Vec<u8>> {
        self.frames.lock().unwrap().last().cloned()
    }
}

impl VideoOutput for FrameCapture {
    fn set_size(&mut self, width: usize, height: usize) {
        assert_eq!((width, height), (160, 144));
    }

    fn render_frame(&mut self, rgb: &[u8]) {
        self.frames.lock().unwrap().push(rgb.to_vec());
    }

    fn blit(&mut self) {
        *self.blits.lock().unwrap() += 1;
    }
}
