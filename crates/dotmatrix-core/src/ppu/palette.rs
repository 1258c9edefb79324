/// Monochrome shades from lightest to darkest.
pub const DEFAULT_SHADES: [[u8; 3]; 4] = [
    [0xFF, 0xFF, 0xFF],
    [0xAA, 0xAA, 0xAA],
    [0x55, 0x55, 0x55],
    [0x00, 0x00, 0x00],
];

pub const PALETTE_RAM_SIZE: usize = 0x40;

const INDEX_MASK: u8 = 0x3F;
const UNUSED_BIT: u8 = 0x40;
const AUTO_INCREMENT: u8 = 0x80;

/// Shade index for `color_id` through an 8-bit BGP/OBP register.
#[inline(always)]
pub fn dmg_shade(palette: u8, color_id: u8) -> u8 {
    (palette >> (color_id * 2)) & 0x03
}

/// Expand a little-endian RGB555 pair to 8-bit channels.
pub fn expand_rgb555(lo: u8, hi: u8) -> [u8; 3] {
    let raw = u16::from_le_bytes([lo, hi]);
    let channel = |shift: u16| {
        let c = ((raw >> shift) & 0x1F) as u8;
        (c << 3) | (c >> 2)
    };
    [channel(0), channel(5), channel(10)]
}

/// One bank of color palette RAM with its index register (BCPS/OCPS).
#[derive(Clone, Debug)]
pub struct PaletteRam {
    index: u8,
    data: [u8; PALETTE_RAM_SIZE],
}

impl Default for PaletteRam {
    fn default() -> Self {
        Self {
            index: UNUSED_BIT,
            data: [0xFF; PALETTE_RAM_SIZE],
        }
    }
}

impl PaletteRam {
    pub fn read_index(&self) -> u8 {
        self.index
    }

    pub fn write_index(&mut self, val: u8) {
        self.index = (val & (AUTO_INCREMENT | INDEX_MASK)) | UNUSED_BIT;
    }

    pub fn read_data(&self) -> u8 {
        self.data[(self.index & INDEX_MASK) as usize]
    }

    pub fn write_data(&mut self, val: u8) {
        self.data[(self.index & INDEX_MASK) as usize] = val;
        if self.index & AUTO_INCREMENT != 0 {
            let next = (self.index & INDEX_MASK).wrapping_add(1) & INDEX_MASK;
            self.index = AUTO_INCREMENT | UNUSED_BIT | next;
        }
    }

    /// RGB of `color_id` (0-3) in `palette` (0-7).
    pub fn color(&self, palette: usize, color_id: u8) -> [u8; 3] {
        let off = palette * 8 + color_id as usize * 2;
        expand_rgb555(self.data[off], self.data[off + 1])
    }

    pub fn raw(&self) -> &[u8; PALETTE_RAM_SIZE] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_increment_wraps_within_ram() {
        let mut pal = PaletteRam::default();
        pal.write_index(0xBE);
        pal.write_data(0x1F);
        pal.write_data(0x00);
        assert_eq!(pal.read_index(), 0xC0);
        pal.write_data(0xAA);
        assert_eq!(pal.raw()[0x3E], 0x1F);
        assert_eq!(pal.raw()[0x3F], 0x00);
        assert_eq!(pal.raw()[0x00], 0xAA);
        assert_eq!(pal.color(7, 3), [0xFF, 0x00, 0x00]);
    }

    #[test]
    fn without_auto_increment_index_holds() {
        let mut pal = PaletteRam::default();
        pal.write_index(0x05);
        pal.write_data(0x12);
        pal.write_data(0x34);
        assert_eq!(pal.read_index(), 0x45);
        assert_eq!(pal.read_data(), 0x34);
    }

    #[test]
    fn rgb555_expands_to_full_range() {
        assert_eq!(expand_rgb555(0xFF, 0x7F), [0xFF, 0xFF, 0xFF]);
        assert_eq!(expand_rgb555(0x00, 0x00), [0, 0, 0]);
        assert_eq!(expand_rgb555(0x10, 0x00), [0x84, 0, 0]);
    }

    #[test]
    fn dmg_shade_reads_two_bits_per_color() {
        assert_eq!(dmg_shade(0xE4, 0), 0);
        assert_eq!(dmg_shade(0xE4, 3), 3);
        assert_eq!(dmg_shade(0x1B, 0), 3);
    }
}
