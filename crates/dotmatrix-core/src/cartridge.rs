use log::{info, warn};

use crate::error::Result;

pub mod external;
pub mod header;
pub mod mbc;

pub use external::{ExternalMemory, VolatileRam};
pub use header::{CartridgeHeader, CartridgeKind, ControllerKind};
pub use mbc::BankController;

const ROM_BANK_SIZE: usize = 0x4000;

pub struct Cartridge {
    rom: Vec<u8>,
    header: CartridgeHeader,
    mbc: BankController,
    ram: Box<dyn ExternalMemory>,
    ram_present: bool,
}

impl Cartridge {
    /// Build a cartridge from a ROM image with in-memory RAM.
    pub fn from_rom(rom: Vec<u8>) -> Result<Self> {
        Self::new(rom, Box::new(VolatileRam::new()))
    }

    /// Build a cartridge whose RAM lives in `ram`.
    ///
    /// An unsupported controller type fails construction. A backend that
    /// cannot be activated leaves the cartridge without RAM.
    pub fn new(rom: Vec<u8>, mut ram: Box<dyn ExternalMemory>) -> Result<Self> {
        let header = CartridgeHeader::parse(&rom)?;
        let mbc = BankController::new(header.kind);

        let wants_ram = header.kind.ram && header.kind.controller != ControllerKind::Mbc2;
        let ram_present = if wants_ram && header.ram_size > 0 {
            ram.set_size(header.ram_size);
            match ram.activate() {
                Ok(()) => true,
                Err(e) => {
                    warn!("Cartridge RAM unavailable, running without it: {e}");
                    false
                }
            }
        } else {
            false
        };

        info!(
            "Loaded ROM: {} ({}, {} KiB ROM, {} KiB RAM, CGB: {})",
            header.title,
            header.kind,
            rom.len() / 1024,
            if ram_present { header.ram_size / 1024 } else { 0 },
            if header.cgb_supported() { "yes" } else { "no" }
        );

        Ok(Self {
            rom,
            header,
            mbc,
            ram,
            ram_present,
        })
    }

    pub fn header(&self) -> &CartridgeHeader {
        &self.header
    }

    pub fn title(&self) -> &str {
        &self.header.title
    }

    pub fn controller(&self) -> &BankController {
        &self.mbc
    }

    pub fn has_ram(&self) -> bool {
        self.ram_present
    }

    pub fn has_battery(&self) -> bool {
        self.header.kind.battery
    }

    fn rom_banks(&self) -> usize {
        (self.rom.len() / ROM_BANK_SIZE).max(1)
    }

    fn external(&self) -> Option<&dyn ExternalMemory> {
        self.ram_present.then_some(self.ram.as_ref())
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x3FFF => self.rom.get(addr as usize).copied().unwrap_or(0xFF),
            0x4000..=0x7FFF => {
                let bank = self.mbc.rom_bank() % self.rom_banks();
                let offset = bank * ROM_BANK_SIZE + (addr as usize - 0x4000);
                self.rom.get(offset).copied().unwrap_or(0xFF)
            }
            0xA000..=0xBFFF => self.mbc.read_ram(self.external(), addr),
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x7FFF => self.mbc.write_control(addr, val),
            0xA000..=0xBFFF => {
                let ram = if self.ram_present {
                    Some(self.ram.as_mut())
                } else {
                    None
                };
                self.mbc.write_ram(ram, addr, val);
            }
            _ => {}
        }
    }

    pub fn read_bulk(&self, addr: u16, buf: &mut [u8]) {
        for (i, b) in buf.iter_mut().enumerate() {
            *b = self.read(addr.wrapping_add(i as u16));
        }
    }

    pub fn write_bulk(&mut self, addr: u16, data: &[u8]) {
        for (i, &b) in data.iter().enumerate() {
            self.write(addr.wrapping_add(i as u16), b);
        }
    }

    /// Flush external RAM to its backend.
    pub fn persist(&mut self) -> Result<()> {
        if !self.ram_present {
            return Ok(());
        }
        self.ram.deactivate()?;
        self.ram.activate()
    }

    /// Release the RAM backend, returning it to the caller.
    pub fn into_external(mut self) -> Result<Box<dyn ExternalMemory>> {
        if self.ram_present {
            self.ram.deactivate()?;
        }
        Ok(self.ram)
    }
}
