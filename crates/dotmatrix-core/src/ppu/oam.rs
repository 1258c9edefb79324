//! Sprite attribute table layout and per-line sprite selection.

use super::SCREEN_WIDTH;

pub const OAM_SIZE: usize = 0xA0;
pub const SPRITE_COUNT: usize = 40;
pub const MAX_LINE_SPRITES: usize = 10;

const FLAG_BEHIND_BG: u8 = 0x80;
const FLAG_Y_FLIP: u8 = 0x40;
const FLAG_X_FLIP: u8 = 0x20;
const FLAG_DMG_PALETTE: u8 = 0x10;
const FLAG_VRAM_BANK: u8 = 0x08;
const FLAG_CGB_PALETTE: u8 = 0x07;

/// One 4-byte OAM entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SpriteAttribute {
    pub y: u8,
    pub x: u8,
    pub tile: u8,
    pub flags: u8,
}

impl SpriteAttribute {
    pub const SIZE: usize = 4;

    pub fn decode(bytes: [u8; 4]) -> Self {
        let [y, x, tile, flags] = bytes;
        Self { y, x, tile, flags }
    }

    pub fn encode(&self) -> [u8; 4] {
        [self.y, self.x, self.tile, self.flags]
    }

    /// Entry `index` of an OAM image.
    pub fn from_oam(oam: &[u8; OAM_SIZE], index: usize) -> Self {
        let base = index * Self::SIZE;
        Self::decode([oam[base], oam[base + 1], oam[base + 2], oam[base + 3]])
    }

    pub fn behind_bg(&self) -> bool {
        self.flags & FLAG_BEHIND_BG != 0
    }

    pub fn y_flip(&self) -> bool {
        self.flags & FLAG_Y_FLIP != 0
    }

    pub fn x_flip(&self) -> bool {
        self.flags & FLAG_X_FLIP != 0
    }

    /// OBP1 instead of OBP0 on monochrome hardware.
    pub fn dmg_palette(&self) -> bool {
        self.flags & FLAG_DMG_PALETTE != 0
    }

    pub fn vram_bank(&self) -> usize {
        usize::from(self.flags & FLAG_VRAM_BANK != 0)
    }

    pub fn cgb_palette(&self) -> usize {
        (self.flags & FLAG_CGB_PALETTE) as usize
    }

    /// Whether the sprite's vertical span includes `ly`.
    pub fn covers_line(&self, ly: u8, height: u8) -> bool {
        let top = self.y as i16 - 16;
        let ly = ly as i16;
        top <= ly && ly < top + height as i16
    }

    /// Horizontal position eligible for a line slot.
    pub fn x_visible(&self) -> bool {
        (1..168).contains(&self.x)
    }

    /// First screen column the sprite touches.
    pub fn first_column(&self) -> u8 {
        self.x.saturating_sub(8)
    }

    /// Screen columns covered, clipped to the display.
    pub fn columns(&self) -> std::ops::Range<usize> {
        let left = self.x as i16 - 8;
        let start = left.max(0) as usize;
        let end = ((left + 8).min(SCREEN_WIDTH as i16)).max(0) as usize;
        start..end
    }
}

/// Sprites selected for one scanline, in OAM index order.
#[derive(Clone, Debug)]
pub struct LineSprites {
    entries: [(u8, SpriteAttribute); MAX_LINE_SPRITES],
    len: usize,
    /// Sprite height in force when the search ran.
    height: u8,
    /// Bit `i` of column `x` is set when winner `i` covers `x`.
    columns: [u16; SCREEN_WIDTH],
}

impl Default for LineSprites {
    fn default() -> Self {
        Self {
            entries: [(0, SpriteAttribute::default()); MAX_LINE_SPRITES],
            len: 0,
            height: 8,
            columns: [0; SCREEN_WIDTH],
        }
    }
}

impl LineSprites {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn height(&self) -> u8 {
        self.height
    }

    /// OAM index and attributes of winner `slot`.
    pub fn get(&self, slot: usize) -> Option<(u8, SpriteAttribute)> {
        self.entries[..self.len].get(slot).copied()
    }

    pub fn oam_indices(&self) -> impl Iterator<Item = u8> + '_ {
        self.entries[..self.len].iter().map(|&(i, _)| i)
    }

    /// Winners covering column `x`, as a slot bitmask.
    pub fn column_mask(&self, x: usize) -> u16 {
        self.columns.get(x).copied().unwrap_or(0)
    }

    pub fn clear(&mut self) {
        self.len = 0;
        self.columns = [0; SCREEN_WIDTH];
    }
}

/// Scan all 40 entries for `ly`, keeping at most ten in OAM index order.
pub fn search(oam: &[u8; OAM_SIZE], ly: u8, height: u8) -> LineSprites {
    let mut line = LineSprites {
        height,
        ..LineSprites::default()
    };
    for index in 0..SPRITE_COUNT {
        if line.len == MAX_LINE_SPRITES {
            break;
        }
        let sprite = SpriteAttribute::from_oam(oam, index);
        if !sprite.covers_line(ly, height) || !sprite.x_visible() {
            continue;
        }
        let slot = line.len;
        line.entries[slot] = (index as u8, sprite);
        for col in sprite.columns() {
            line.columns[col] |= 1 << slot;
        }
        line.len += 1;
    }
    line
}
