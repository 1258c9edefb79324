//! OAM DMA and the color-mode VRAM DMA (general-purpose and HBlank).

use log::trace;

const OAM_LEN: u8 = 160;
const BLOCK_LEN: u16 = 0x10;
/// Cycles the CPU side of the bus stays busy per general-purpose block.
const GDMA_BLOCK_CYCLES: u32 = 8;

/// What a DMA transfer needs from the rest of the machine.
pub trait DmaBus {
    /// Read a source byte, bypassing CPU-side restrictions.
    fn dma_read(&mut self, addr: u16) -> u8;
    fn dma_write_oam(&mut self, index: usize, val: u8);
    fn dma_write_vram(&mut self, addr: u16, val: u8);
    /// Sequence number of the HBlank in progress, if the PPU is in one.
    fn hblank(&self) -> Option<u64>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VramTransfer {
    /// Copies everything in one burst on the next step.
    General { blocks: u8 },
    /// Copies 16 bytes per HBlank.
    HBlank {
        blocks: u8,
        line: Option<u64>,
        copied: u8,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct OamTransfer {
    src: u16,
    index: u8,
}

#[derive(Default, Debug)]
pub struct Dma {
    oam: Option<OamTransfer>,
    oam_reg: u8,
    vram: Option<VramTransfer>,
    src: u16,
    dst: u16,
    rom_busy: u32,
}

#[inline]
fn vram_dest(addr: u16) -> u16 {
    0x8000 | (addr & 0x1FF0)
}

impl Dma {
    pub fn new() -> Self {
        Self {
            dst: vram_dest(0),
            ..Default::default()
        }
    }

    /// An OAM transfer is running. Only HRAM is usable by the CPU.
    pub fn ram_busy(&self) -> bool {
        self.oam.is_some()
    }

    /// A general-purpose VRAM transfer is holding the bus.
    pub fn rom_busy(&self) -> bool {
        self.rom_busy > 0 || matches!(self.vram, Some(VramTransfer::General { .. }))
    }

    pub fn vram_transfer(&self) -> Option<VramTransfer> {
        self.vram
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0xFF46 => self.oam_reg,
            0xFF55 => match self.vram {
                Some(VramTransfer::HBlank { blocks, .. }) => blocks.saturating_sub(1) & 0x7F,
                _ => 0xFF,
            },
            // HDMA1-4 are write-only.
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        match addr {
            0xFF46 => {
                self.oam_reg = val;
                let src = u16::from(val) << 8;
                trace!("OAM DMA from {src:04X}");
                self.oam = Some(OamTransfer { src, index: 0 });
            }
            0xFF51 => self.src = (u16::from(val) << 8) | (self.src & 0x00F0),
            0xFF52 => self.src = (self.src & 0xFF00) | u16::from(val & 0xF0),
            0xFF53 => self.dst = vram_dest((u16::from(val) << 8) | (self.dst & 0x00F0)),
            0xFF54 => self.dst = vram_dest((self.dst & 0x1F00) | u16::from(val)),
            0xFF55 => self.write_control(val),
            _ => {}
        }
    }

    fn write_control(&mut self, val: u8) {
        let blocks = (val & 0x7F) + 1;
        let hdma_active = matches!(self.vram, Some(VramTransfer::HBlank { .. }));
        if val & 0x80 == 0 {
            if hdma_active {
                trace!("HDMA cancelled");
                self.vram = None;
            } else {
                trace!(
                    "GDMA {:04X} -> {:04X}, {} blocks",
                    self.src, self.dst, blocks
                );
                self.vram = Some(VramTransfer::General { blocks });
            }
        } else {
            trace!(
                "HDMA {:04X} -> {:04X}, {} blocks",
                self.src, self.dst, blocks
            );
            self.vram = Some(VramTransfer::HBlank {
                blocks,
                line: None,
                copied: 0,
            });
        }
    }

    /// Copy one byte. Returns false once the destination has run off the
    /// end of VRAM.
    fn copy_byte(&mut self, bus: &mut dyn DmaBus) -> bool {
        let byte = bus.dma_read(self.src);
        bus.dma_write_vram(self.dst, byte);
        self.src = self.src.wrapping_add(1);
        if self.dst >= 0x9FFF {
            self.dst = vram_dest(0);
            return false;
        }
        self.dst += 1;
        true
    }

    /// Advance every active transfer by one cycle.
    pub fn step(&mut self, bus: &mut dyn DmaBus) {
        if let Some(mut oam) = self.oam.take() {
            let byte = bus.dma_read(oam.src.wrapping_add(u16::from(oam.index)));
            bus.dma_write_oam(oam.index as usize, byte);
            oam.index += 1;
            if oam.index < OAM_LEN {
                self.oam = Some(oam);
            }
        }

        if self.rom_busy > 0 {
            self.rom_busy -= 1;
        }

        match self.vram {
            Some(VramTransfer::General { blocks }) => {
                for _ in 0..u16::from(blocks) * BLOCK_LEN {
                    if !self.copy_byte(bus) {
                        break;
                    }
                }
                self.vram = None;
                self.rom_busy = u32::from(blocks) * GDMA_BLOCK_CYCLES;
            }
            Some(VramTransfer::HBlank {
                blocks,
                line,
                copied,
            }) => {
                let Some(current) = bus.hblank() else {
                    return;
                };
                let copied = if line == Some(current) { copied } else { 0 };
                if copied as u16 >= BLOCK_LEN {
                    return;
                }
                if !self.copy_byte(bus) {
                    trace!("HDMA ran past the end of VRAM");
                    self.vram = None;
                    return;
                }
                let copied = copied + 1;
                self.vram = if copied as u16 == BLOCK_LEN && blocks == 1 {
                    None
                } else if copied as u16 == BLOCK_LEN {
                    Some(VramTransfer::HBlank {
                        blocks: blocks - 1,
                        line: Some(current),
                        copied,
                    })
                } else {
                    Some(VramTransfer::HBlank {
                        blocks,
                        line: Some(current),
                        copied,
                    })
                };
            }
            None => {}
        }
    }
}
