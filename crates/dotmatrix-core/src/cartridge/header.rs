use std::fmt;

use crate::error::{EmuError, Result};

/// Size of the fixed header area at the start of every ROM image.
pub const HEADER_END: usize = 0x150;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerKind {
    RomOnly,
    Mbc1,
    Mbc2,
    Mbc3,
    Mbc5,
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ControllerKind::RomOnly => "ROM",
            ControllerKind::Mbc1 => "MBC1",
            ControllerKind::Mbc2 => "MBC2",
            ControllerKind::Mbc3 => "MBC3",
            ControllerKind::Mbc5 => "MBC5",
        })
    }
}

/// Decoded cartridge-type byte (0x147).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartridgeKind {
    pub controller: ControllerKind,
    pub ram: bool,
    pub battery: bool,
    pub timer: bool,
    pub rumble: bool,
}

impl CartridgeKind {
    const fn new(controller: ControllerKind) -> Self {
        Self {
            controller,
            ram: false,
            battery: false,
            timer: false,
            rumble: false,
        }
    }

    const fn ram(mut self) -> Self {
        self.ram = true;
        self
    }

    const fn battery(mut self) -> Self {
        self.battery = true;
        self
    }

    const fn timer(mut self) -> Self {
        self.timer = true;
        self
    }

    const fn rumble(mut self) -> Self {
        self.rumble = true;
        self
    }

    pub fn from_code(code: u8) -> Result<Self> {
        use ControllerKind::*;
        let kind = match code {
            0x00 => Self::new(RomOnly),
            0x01 => Self::new(Mbc1),
            0x02 => Self::new(Mbc1).ram(),
            0x03 => Self::new(Mbc1).ram().battery(),
            0x05 => Self::new(Mbc2).ram(),
            0x06 => Self::new(Mbc2).ram().battery(),
            0x08 => Self::new(RomOnly).ram(),
            0x09 => Self::new(RomOnly).ram().battery(),
            0x0F => Self::new(Mbc3).timer().battery(),
            0x10 => Self::new(Mbc3).timer().ram().battery(),
            0x11 => Self::new(Mbc3),
            0x12 => Self::new(Mbc3).ram(),
            0x13 => Self::new(Mbc3).ram().battery(),
            0x19 => Self::new(Mbc5),
            0x1A => Self::new(Mbc5).ram(),
            0x1B => Self::new(Mbc5).ram().battery(),
            0x1C => Self::new(Mbc5).rumble(),
            0x1D => Self::new(Mbc5).rumble().ram(),
            0x1E => Self::new(Mbc5).rumble().ram().battery(),
            code => return Err(EmuError::UnsupportedController { code }),
        };
        Ok(kind)
    }
}

impl fmt::Display for CartridgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.controller)?;
        for (present, name) in [
            (self.timer, "TIMER"),
            (self.rumble, "RUMBLE"),
            (self.ram, "RAM"),
            (self.battery, "BATTERY"),
        ] {
            if present {
                write!(f, "+{name}")?;
            }
        }
        Ok(())
    }
}

/// Fields of the ROM header at 0x134..0x150.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartridgeHeader {
    pub title: String,
    pub cgb_flag: u8,
    pub sgb_flag: u8,
    pub kind: CartridgeKind,
    pub rom_size: usize,
    pub ram_size: usize,
    pub destination: u8,
    pub licensee: u8,
    pub version: u8,
    pub header_checksum: u8,
    pub global_checksum: u16,
}

impl CartridgeHeader {
    pub fn parse(rom: &[u8]) -> Result<Self> {
        if rom.len() < HEADER_END {
            return Err(EmuError::HeaderTooShort { len: rom.len() });
        }
        let kind = CartridgeKind::from_code(rom[0x147])?;
        let cgb_flag = rom[0x143];

        // Color-aware titles give up their last byte to the CGB flag.
        let title_len = if cgb_flag & 0x80 != 0 { 15 } else { 16 };
        let title = rom[0x134..0x134 + title_len]
            .iter()
            .take_while(|&&b| b != 0)
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '?' })
            .collect::<String>()
            .trim_end()
            .to_string();

        Ok(Self {
            title,
            cgb_flag,
            sgb_flag: rom[0x146],
            kind,
            rom_size: 0x8000usize << (rom[0x148] & 0x0F),
            ram_size: ram_size_from_code(rom[0x149]),
            destination: rom[0x14A],
            licensee: rom[0x14B],
            version: rom[0x14C],
            header_checksum: rom[0x14D],
            global_checksum: u16::from_be_bytes([rom[0x14E], rom[0x14F]]),
        })
    }

    pub fn cgb_supported(&self) -> bool {
        self.cgb_flag & 0x80 != 0
    }

    /// Recompute the header checksum over 0x134..=0x14C and compare.
    pub fn header_checksum_ok(rom: &[u8]) -> bool {
        if rom.len() < HEADER_END {
            return false;
        }
        let sum = rom[0x134..=0x14C]
            .iter()
            .fold(0u8, |acc, &b| acc.wrapping_sub(b).wrapping_sub(1));
        sum == rom[0x14D]
    }
}

pub fn ram_size_from_code(code: u8) -> usize {
    match code {
        0x00 => 0,
        0x01 => 0x800,
        0x02 => 0x2000,
        0x03 => 0x8000,
        0x04 => 0x20000,
        0x05 => 0x10000,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes() -> Vec<u8> {
        let mut rom = vec![0u8; HEADER_END];
        rom[0x134..0x13A].copy_from_slice(b"TETRIS");
        rom[0x147] = 0x03;
        rom[0x148] = 0x02;
        rom[0x149] = 0x03;
        rom
    }

    #[test]
    fn decodes_mbc1_ram_battery() {
        let header = CartridgeHeader::parse(&header_bytes()).unwrap();
        assert_eq!(header.title, "TETRIS");
        assert_eq!(header.kind.controller, ControllerKind::Mbc1);
        assert!(header.kind.ram && header.kind.battery);
        assert!(!header.kind.timer);
        assert_eq!(header.kind.to_string(), "MBC1+RAM+BATTERY");
        assert_eq!(header.ram_size, 32 * 1024);
        assert_eq!(header.rom_size, 0x8000 << 2);
    }

    #[test]
    fn rejects_unknown_controller() {
        let mut rom = header_bytes();
        rom[0x147] = 0xFC;
        assert!(matches!(
            CartridgeHeader::parse(&rom),
            Err(EmuError::UnsupportedController { code: 0xFC })
        ));
    }

    #[test]
    fn rejects_short_image() {
        assert!(matches!(
            CartridgeHeader::parse(&[0u8; 0x100]),
            Err(EmuError::HeaderTooShort { len: 0x100 })
        ));
    }

    #[test]
    fn checksum_matches_boot_rom_algorithm() {
        let mut rom = header_bytes();
        let sum = rom[0x134..=0x14C]
            .iter()
            .fold(0u8, |acc, &b| acc.wrapping_sub(b).wrapping_sub(1));
        rom[0x14D] = sum;
        assert!(CartridgeHeader::header_checksum_ok(&rom));
        rom[0x14D] ^= 1;
        assert!(!CartridgeHeader::header_checksum_ok(&rom));
    }
}
