use std::collections::HashSet;

use log::{debug, warn};

use crate::{
    apu::{Apu, Channel},
    cartridge::Cartridge,
    dma::{Dma, DmaBus},
    error::EmuError,
    hardware::{Model, Speed},
    interrupt::InterruptController,
    joypad::Joypad,
    ppu::Ppu,
    serial::Serial,
    timer::Timer,
};

const WRAM_BANK_SIZE: usize = 0x1000;
const HRAM_SIZE: usize = 0x7F;

/// Post-boot divider value.
const BOOT_DIV: u16 = 0xABCC;

/// Address decoder between the CPU/DMA and every other unit.
pub struct Mmu {
    wram: Box<[[u8; WRAM_BANK_SIZE]; 8]>,
    wram_bank: usize,
    hram: [u8; HRAM_SIZE],
    cart: Cartridge,
    pub ppu: Ppu,
    pub apu: Apu,
    pub timer: Timer,
    pub joypad: Joypad,
    pub serial: Serial,
    pub dma: Dma,
    interrupts: InterruptController,
    model: Model,
    speed: Speed,
    speed_prime: bool,
    fault: Option<EmuError>,
    reported: HashSet<u16>,
}

impl Mmu {
    pub fn new(cart: Cartridge, model: Model) -> Self {
        let interrupts = InterruptController::new();
        Self {
            wram: Box::new([[0; WRAM_BANK_SIZE]; 8]),
            wram_bank: 1,
            hram: [0; HRAM_SIZE],
            cart,
            ppu: Ppu::new(model, interrupts.line()),
            apu: Apu::new(),
            timer: Timer::new(interrupts.line()),
            joypad: Joypad::new(interrupts.line()),
            serial: Serial::new(interrupts.line()),
            dma: Dma::new(),
            interrupts,
            model,
            speed: Speed::Normal,
            speed_prime: false,
            fault: None,
            reported: HashSet::new(),
        }
    }

    /// Load the I/O state the boot ROM leaves behind.
    pub fn apply_boot_state(&mut self) {
        self.timer.set_div(BOOT_DIV);
        self.interrupts.write_if(0x01);
        self.interrupts.write_ie(0x00);
        self.ppu.apply_boot_state();
        self.apu.apply_boot_state();
        self.joypad.write(0x30);
        self.speed = Speed::Normal;
        self.speed_prime = false;
    }

    /// Power-cycle every unit except the cartridge. Attached video and
    /// audio outputs, the joypad handle and the interrupt controller carry
    /// over.
    pub fn reset(&mut self) {
        let video = self.ppu.take_video();
        let outputs = Channel::ALL.map(|ch| self.apu.take_output(ch));
        let joypad = self.joypad.handle();

        self.wram = Box::new([[0; WRAM_BANK_SIZE]; 8]);
        self.wram_bank = 1;
        self.hram = [0; HRAM_SIZE];
        self.ppu = Ppu::new(self.model, self.interrupts.line());
        self.apu = Apu::new();
        self.timer = Timer::new(self.interrupts.line());
        self.joypad = Joypad::with_handle(self.interrupts.line(), joypad);
        self.serial = Serial::new(self.interrupts.line());
        self.dma = Dma::new();
        self.fault = None;
        self.reported.clear();

        if let Some(video) = video {
            self.ppu.set_video(video);
        }
        for (ch, output) in Channel::ALL.into_iter().zip(outputs) {
            self.apu.set_output(ch, output);
        }
        self.apply_boot_state();
    }

    pub fn model(&self) -> Model {
        self.model
    }

    pub fn speed(&self) -> Speed {
        self.speed
    }

    /// KEY1 bit 0: a STOP will switch speed.
    pub fn speed_switch_primed(&self) -> bool {
        self.speed_prime
    }

    /// Perform a primed speed switch. Returns whether the speed changed.
    pub fn switch_speed(&mut self) -> bool {
        if !self.model.is_cgb() || !self.speed_prime {
            return false;
        }
        self.speed_prime = false;
        self.speed = match self.speed {
            Speed::Normal => Speed::Double,
            Speed::Double => Speed::Normal,
        };
        debug!("Speed switch: {:?}", self.speed);
        true
    }

    pub fn interrupts(&self) -> &InterruptController {
        &self.interrupts
    }

    pub fn cartridge(&self) -> &Cartridge {
        &self.cart
    }

    pub fn cartridge_mut(&mut self) -> &mut Cartridge {
        &mut self.cart
    }

    pub fn into_cartridge(self) -> Cartridge {
        self.cart
    }

    /// OAM DMA in progress.
    pub fn ram_busy(&self) -> bool {
        self.dma.ram_busy()
    }

    /// General-purpose VRAM DMA holding the bus.
    pub fn rom_busy(&self) -> bool {
        self.dma.rom_busy()
    }

    /// Oldest fault recorded since the last call.
    pub fn take_fault(&mut self) -> Option<EmuError> {
        self.fault.take()
    }

    pub(crate) fn record_fault(&mut self, fault: EmuError) {
        if self.fault.is_none() {
            self.fault = Some(fault);
        }
    }

    fn unmapped(&mut self, addr: u16, write: bool) {
        let err = EmuError::UnmappedIo { addr, write };
        if self.reported.insert(addr) {
            warn!("{err}");
        } else {
            debug!("{err}");
        }
        self.record_fault(err);
    }

    fn wram_index(&self, addr: u16) -> (usize, usize) {
        let offset = (addr as usize) & 0x1FFF;
        if offset < WRAM_BANK_SIZE {
            (0, offset)
        } else {
            (self.wram_bank, offset - WRAM_BANK_SIZE)
        }
    }

    /// Read without I/O side effects. I/O registers read as 0xFF.
    pub fn peek(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x7FFF | 0xA000..=0xBFFF => self.cart.read(addr),
            0x8000..=0x9FFF => self.ppu.read_vram(addr),
            0xC000..=0xFDFF => {
                let (bank, offset) = self.wram_index(addr);
                self.wram[bank][offset]
            }
            0xFE00..=0xFE9F => self.ppu.read_oam((addr - 0xFE00) as usize),
            0xFEA0..=0xFEFF => 0x00,
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize],
            0xFFFF => self.interrupts.read_ie(),
            _ => 0xFF,
        }
    }

    pub fn read(&mut self, addr: u16) -> u8 {
        match addr {
            0xFF00..=0xFF7F => self.read_io(addr),
            _ => self.peek(addr),
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x7FFF | 0xA000..=0xBFFF => self.cart.write(addr, val),
            0x8000..=0x9FFF => self.ppu.write_vram(addr, val),
            0xC000..=0xFDFF => {
                let (bank, offset) = self.wram_index(addr);
                self.wram[bank][offset] = val;
            }
            0xFE00..=0xFE9F => self.ppu.write_oam((addr - 0xFE00) as usize, val),
            0xFEA0..=0xFEFF => {}
            0xFF00..=0xFF7F => self.write_io(addr, val),
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize] = val,
            0xFFFF => self.interrupts.write_ie(val),
        }
    }

    pub fn read_word(&mut self, addr: u16) -> u16 {
        let lo = self.read(addr);
        let hi = self.read(addr.wrapping_add(1));
        u16::from_le_bytes([lo, hi])
    }

    pub fn write_word(&mut self, addr: u16, val: u16) {
        let [lo, hi] = val.to_le_bytes();
        self.write(addr, lo);
        self.write(addr.wrapping_add(1), hi);
    }

    fn read_io(&mut self, addr: u16) -> u8 {
        let cgb = self.model.is_cgb();
        match addr {
            0xFF00 => self.joypad.read(),
            0xFF01 | 0xFF02 => self.serial.read(addr),
            0xFF04..=0xFF07 => self.timer.read(addr),
            0xFF0F => self.interrupts.read_if(),
            0xFF10..=0xFF3F => self.apu.read_reg(addr),
            0xFF40..=0xFF45 | 0xFF47..=0xFF4B | 0xFF4F | 0xFF68..=0xFF6B => {
                self.ppu.read_reg(addr)
            }
            0xFF46 => self.dma.read(addr),
            0xFF4D if cgb => {
                0x7E | u8::from(self.speed.is_double()) << 7 | u8::from(self.speed_prime)
            }
            0xFF51..=0xFF55 if cgb => self.dma.read(addr),
            0xFF70 if cgb => 0xF8 | self.wram_bank as u8,
            // Color-only registers on a monochrome machine, boot ROM
            // disable and infrared.
            0xFF4D | 0xFF50..=0xFF56 | 0xFF70 => 0xFF,
            _ => {
                self.unmapped(addr, false);
                0xFF
            }
        }
    }

    fn write_io(&mut self, addr: u16, val: u8) {
        let cgb = self.model.is_cgb();
        match addr {
            0xFF00 => self.joypad.write(val),
            0xFF01 | 0xFF02 => self.serial.write(addr, val),
            0xFF04..=0xFF07 => self.timer.write(addr, val),
            0xFF0F => self.interrupts.write_if(val),
            0xFF10..=0xFF3F => self.apu.write_reg(addr, val),
            0xFF40..=0xFF45 | 0xFF47..=0xFF4B | 0xFF4F | 0xFF68..=0xFF6B => {
                self.ppu.write_reg(addr, val)
            }
            0xFF46 => self.dma.write(addr, val),
            0xFF4D if cgb => self.speed_prime = val & 0x01 != 0,
            0xFF51..=0xFF55 if cgb => self.dma.write(addr, val),
            0xFF70 if cgb => {
                let bank = (val & 0x07) as usize;
                self.wram_bank = bank.max(1);
            }
            0xFF4D | 0xFF50..=0xFF56 | 0xFF70 => {}
            _ => self.unmapped(addr, true),
        }
    }

    /// Advance PPU, timer, DMA and serial by one cycle, in that order.
    pub fn step_cycle(&mut self) {
        self.ppu.step();
        self.timer.step();
        let mut dma = std::mem::take(&mut self.dma);
        dma.step(self);
        self.dma = dma;
        self.serial.step();
    }
}

impl DmaBus for Mmu {
    fn dma_read(&mut self, addr: u16) -> u8 {
        // Sources above DFFF land in the echo region.
        let addr = if addr >= 0xE000 { addr - 0x2000 } else { addr };
        self.peek(addr)
    }

    fn dma_write_oam(&mut self, index: usize, val: u8) {
        self.ppu.write_oam(index, val);
    }

    fn dma_write_vram(&mut self, addr: u16, val: u8) {
        self.ppu.write_vram(addr, val);
    }

    fn hblank(&self) -> Option<u64> {
        (self.ppu.lcd_enabled() && self.ppu.in_hblank()).then(|| self.ppu.hblank_count())
    }
}
