use log::trace;

use super::external::ExternalMemory;
use super::header::{CartridgeKind, ControllerKind};

const MBC2_RAM_SIZE: usize = 0x200;

/// MBC3 clock registers 0x08..=0x0C: seconds, minutes, hours, day low,
/// day high/halt/carry.
const RTC_MASKS: [u8; 5] = [0x3F, 0x3F, 0x1F, 0xFF, 0xC1];

/// MBC3 real-time-clock register file.
///
/// The registers are plain storage. Latching copies the live values into
/// the readable view; the clock itself does not advance.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RtcRegisters {
    live: [u8; 5],
    latched: [u8; 5],
    latch_armed: bool,
}

impl RtcRegisters {
    fn index(reg: u8) -> Option<usize> {
        match reg {
            0x08..=0x0C => Some((reg - 0x08) as usize),
            _ => None,
        }
    }

    pub fn read(&self, reg: u8) -> u8 {
        Self::index(reg).map_or(0xFF, |i| self.latched[i] | !RTC_MASKS[i])
    }

    pub fn write(&mut self, reg: u8, value: u8) {
        if let Some(i) = Self::index(reg) {
            self.live[i] = value & RTC_MASKS[i];
        }
    }

    /// Latch sequence: writing 0x00 arms, then 0x01 copies.
    pub fn latch_write(&mut self, value: u8) {
        match value {
            0x00 => self.latch_armed = true,
            0x01 if self.latch_armed => {
                self.latched = self.live;
                self.latch_armed = false;
            }
            _ => self.latch_armed = false,
        }
    }
}

/// Bank controller state, selected from the cartridge header at load time.
#[derive(Debug, Clone)]
pub enum BankController {
    RomOnly,
    Mbc1 {
        rom_bank: u8,
        upper: u8,
        ram_mode: bool,
        ram_enable: bool,
    },
    Mbc2 {
        rom_bank: u8,
        ram_enable: bool,
        ram: Box<[u8; MBC2_RAM_SIZE]>,
    },
    Mbc3 {
        rom_bank: u8,
        ram_select: u8,
        ram_enable: bool,
        rtc: RtcRegisters,
    },
    Mbc5 {
        rom_bank: u16,
        ram_bank: u8,
        ram_enable: bool,
        rumble: bool,
    },
}

impl BankController {
    pub fn new(kind: CartridgeKind) -> Self {
        match kind.controller {
            ControllerKind::RomOnly => BankController::RomOnly,
            ControllerKind::Mbc1 => BankController::Mbc1 {
                rom_bank: 1,
                upper: 0,
                ram_mode: false,
                ram_enable: false,
            },
            ControllerKind::Mbc2 => BankController::Mbc2 {
                rom_bank: 1,
                ram_enable: false,
                ram: Box::new([0x0F; MBC2_RAM_SIZE]),
            },
            ControllerKind::Mbc3 => BankController::Mbc3 {
                rom_bank: 1,
                ram_select: 0,
                ram_enable: false,
                rtc: RtcRegisters::default(),
            },
            ControllerKind::Mbc5 => BankController::Mbc5 {
                rom_bank: 1,
                ram_bank: 0,
                ram_enable: false,
                rumble: kind.rumble,
            },
        }
    }

    pub fn kind(&self) -> ControllerKind {
        match self {
            BankController::RomOnly => ControllerKind::RomOnly,
            BankController::Mbc1 { .. } => ControllerKind::Mbc1,
            BankController::Mbc2 { .. } => ControllerKind::Mbc2,
            BankController::Mbc3 { .. } => ControllerKind::Mbc3,
            BankController::Mbc5 { .. } => ControllerKind::Mbc5,
        }
    }

    /// Bank mapped at 0x4000..=0x7FFF before wrapping to the ROM size.
    pub fn rom_bank(&self) -> usize {
        match *self {
            BankController::RomOnly => 1,
            BankController::Mbc1 {
                rom_bank,
                upper,
                ram_mode,
                ..
            } => {
                let low = match rom_bank & 0x1F {
                    0 => 1,
                    n => n as usize,
                };
                if ram_mode {
                    low
                } else {
                    ((upper as usize & 0x03) << 5) | low
                }
            }
            BankController::Mbc2 { rom_bank, .. } | BankController::Mbc3 { rom_bank, .. } => {
                rom_bank.max(1) as usize
            }
            BankController::Mbc5 { rom_bank, .. } => rom_bank as usize,
        }
    }

    /// Bank mapped at 0xA000..=0xBFFF for generic external RAM.
    pub fn ram_bank(&self) -> usize {
        match *self {
            BankController::Mbc1 {
                upper, ram_mode, ..
            } if ram_mode => upper as usize & 0x03,
            BankController::Mbc3 { ram_select, .. } if ram_select <= 0x03 => ram_select as usize,
            BankController::Mbc5 { ram_bank, .. } => ram_bank as usize,
            _ => 0,
        }
    }

    pub fn ram_enabled(&self) -> bool {
        match *self {
            BankController::RomOnly => true,
            BankController::Mbc1 { ram_enable, .. }
            | BankController::Mbc2 { ram_enable, .. }
            | BankController::Mbc3 { ram_enable, .. }
            | BankController::Mbc5 { ram_enable, .. } => ram_enable,
        }
    }

    /// Control write into the ROM window.
    pub fn write_control(&mut self, addr: u16, val: u8) {
        match self {
            BankController::RomOnly => {}
            BankController::Mbc1 {
                rom_bank,
                upper,
                ram_mode,
                ram_enable,
            } => match addr {
                0x0000..=0x1FFF => *ram_enable = val & 0x0F == 0x0A,
                0x2000..=0x3FFF => *rom_bank = val & 0x1F,
                0x4000..=0x5FFF => *upper = val & 0x03,
                0x6000..=0x7FFF => *ram_mode = val & 0x01 != 0,
                _ => {}
            },
            BankController::Mbc2 {
                rom_bank,
                ram_enable,
                ..
            } => {
                if let 0x0000..=0x3FFF = addr {
                    if addr & 0x0100 == 0 {
                        *ram_enable = val & 0x0F == 0x0A;
                    } else {
                        *rom_bank = (val & 0x0F).max(1);
                    }
                }
            }
            BankController::Mbc3 {
                rom_bank,
                ram_select,
                ram_enable,
                rtc,
            } => match addr {
                0x0000..=0x1FFF => *ram_enable = val & 0x0F == 0x0A,
                0x2000..=0x3FFF => *rom_bank = (val & 0x7F).max(1),
                0x4000..=0x5FFF => *ram_select = val & 0x0F,
                0x6000..=0x7FFF => rtc.latch_write(val),
                _ => {}
            },
            BankController::Mbc5 {
                rom_bank,
                ram_bank,
                ram_enable,
                rumble,
            } => match addr {
                0x0000..=0x1FFF => *ram_enable = val & 0x0F == 0x0A,
                0x2000..=0x2FFF => *rom_bank = (*rom_bank & 0x100) | val as u16,
                0x3000..=0x3FFF => *rom_bank = (*rom_bank & 0xFF) | ((val as u16 & 0x01) << 8),
                0x4000..=0x5FFF => *ram_bank = val & if *rumble { 0x07 } else { 0x0F },
                _ => {}
            },
        }
        trace!(
            "MBC write {addr:04X}={val:02X} -> rom bank {:#X}, ram bank {}",
            self.rom_bank(),
            self.ram_bank()
        );
    }

    /// Read from the 0xA000..=0xBFFF window.
    pub fn read_ram(&self, ram: Option<&dyn ExternalMemory>, addr: u16) -> u8 {
        if !self.ram_enabled() {
            return 0xFF;
        }
        match self {
            BankController::Mbc2 { ram, .. } => 0xF0 | ram[(addr as usize - 0xA000) & 0x1FF],
            BankController::Mbc3 {
                ram_select, rtc, ..
            } if *ram_select >= 0x08 => rtc.read(*ram_select),
            _ => match ram {
                Some(ram) if ram.size() > 0 => ram.read_byte(self.ram_offset(ram.size(), addr)),
                _ => 0xFF,
            },
        }
    }

    /// Write to the 0xA000..=0xBFFF window.
    pub fn write_ram(
        &mut self,
        ram: Option<&mut (dyn ExternalMemory + 'static)>,
        addr: u16,
        val: u8,
    ) {
        if !self.ram_enabled() {
            return;
        }
        let offset_in_window = addr as usize - 0xA000;
        match self {
            BankController::Mbc2 { ram, .. } => ram[offset_in_window & 0x1FF] = val & 0x0F,
            BankController::Mbc3 {
                ram_select, rtc, ..
            } if *ram_select >= 0x08 => rtc.write(*ram_select, val),
            _ => {
                if let Some(ram) = ram {
                    let size = ram.size();
                    if size > 0 {
                        ram.write_byte(self.ram_offset(size, addr), val);
                    }
                }
            }
        }
    }

    fn ram_offset(&self, size: usize, addr: u16) -> usize {
        (self.ram_bank() * 0x2000 + (addr as usize - 0xA000)) % size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mbc1() -> BankController {
        BankController::new(CartridgeKind::from_code(0x03).unwrap())
    }

    #[test]
    fn mbc1_zero_low_bits_remap_to_next_bank() {
        let mut mbc = mbc1();
        for upper in 0..4u8 {
            mbc.write_control(0x4000, upper);
            mbc.write_control(0x2000, 0x00);
            assert_eq!(mbc.rom_bank(), ((upper as usize) << 5) + 1);
        }
    }

    #[test]
    fn mbc1_mode_moves_upper_bits_to_ram() {
        let mut mbc = mbc1();
        mbc.write_control(0x2000, 0x05);
        mbc.write_control(0x4000, 0x02);
        assert_eq!(mbc.rom_bank(), 0x45);
        assert_eq!(mbc.ram_bank(), 0);

        mbc.write_control(0x6000, 0x01);
        assert_eq!(mbc.rom_bank(), 0x05);
        assert_eq!(mbc.ram_bank(), 2);
    }

    #[test]
    fn rtc_latch_requires_zero_then_one() {
        let mut rtc = RtcRegisters::default();
        rtc.write(0x08, 42);
        assert_eq!(rtc.read(0x08) & 0x3F, 0);

        rtc.latch_write(0x01);
        assert_eq!(rtc.read(0x08) & 0x3F, 0);

        rtc.latch_write(0x00);
        rtc.latch_write(0x01);
        assert_eq!(rtc.read(0x08) & 0x3F, 42);
        assert_eq!(rtc.read(0x0C), 0x3E);
    }

    #[test]
    fn mbc5_bank_zero_is_selectable() {
        let mut mbc = BankController::new(CartridgeKind::from_code(0x19).unwrap());
        mbc.write_control(0x2000, 0x00);
        assert_eq!(mbc.rom_bank(), 0);
        mbc.write_control(0x3000, 0x01);
        assert_eq!(mbc.rom_bank(), 0x100);
        mbc.write_control(0x2000, 0x23);
        assert_eq!(mbc.rom_bank(), 0x123);
    }
}
