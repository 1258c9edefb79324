//! Per-column pixel resolution: background, window, then sprites.

use super::fetch::FetchSource;
use super::palette::dmg_shade;
use super::{LCDC_BG, LCDC_OBJ, LCDC_TILE_DATA, Ppu};
use crate::ppu::oam::SpriteAttribute;

const ATTR_PRIORITY: u8 = 0x80;
const ATTR_Y_FLIP: u8 = 0x40;
const ATTR_X_FLIP: u8 = 0x20;
const ATTR_BANK: u8 = 0x08;
const ATTR_PALETTE: u8 = 0x07;

#[derive(Clone, Copy, Default)]
struct BgPixel {
    color_id: u8,
    palette: usize,
    priority: bool,
}

impl Ppu {
    /// VRAM offset of tile `index` under the current addressing mode.
    fn tile_data_addr(&self, index: u8) -> usize {
        if self.lcdc & LCDC_TILE_DATA != 0 {
            index as usize * 16
        } else {
            (0x1000 + (index as i8 as isize) * 16) as usize
        }
    }

    /// Fetch source for the tile row under map cell `tile_x` at pixel row `py`.
    pub(super) fn tile_source(&self, map_base: usize, tile_x: u8, py: u8) -> FetchSource {
        let map_addr = map_base + (py as usize / 8) * 32 + (tile_x as usize & 0x1F);
        let index = self.vram[0][map_addr];
        let (bank, row) = if self.model.is_cgb() {
            let attr = self.vram[1][map_addr];
            let row = if attr & ATTR_Y_FLIP != 0 { 7 - py % 8 } else { py % 8 };
            (usize::from(attr & ATTR_BANK != 0), row)
        } else {
            (0, py % 8)
        };
        FetchSource::Tile {
            bank,
            addr: self.tile_data_addr(index) + row as usize * 2,
        }
    }

    fn map_pixel(&self, map_base: usize, px: u8, py: u8) -> BgPixel {
        let map_addr = map_base + (py as usize / 8) * 32 + px as usize / 8;
        let index = self.vram[0][map_addr];
        let mut row = (py % 8) as usize;
        let mut bit = 7 - (px % 8);
        let mut pixel = BgPixel::default();
        let mut bank = 0;
        if self.model.is_cgb() {
            let attr = self.vram[1][map_addr];
            pixel.palette = (attr & ATTR_PALETTE) as usize;
            pixel.priority = attr & ATTR_PRIORITY != 0;
            bank = usize::from(attr & ATTR_BANK != 0);
            if attr & ATTR_X_FLIP != 0 {
                bit = px % 8;
            }
            if attr & ATTR_Y_FLIP != 0 {
                row = 7 - row;
            }
        }
        let addr = self.tile_data_addr(index) + row * 2;
        let lo = self.vram[bank][addr];
        let hi = self.vram[bank][addr + 1];
        pixel.color_id = (((hi >> bit) & 1) << 1) | ((lo >> bit) & 1);
        pixel
    }

    /// First line sprite, in OAM order, with an opaque pixel at `x`.
    fn sprite_pixel(&self, x: u8) -> Option<(u8, SpriteAttribute)> {
        let height = self.line_sprites.height();
        let mut mask = self.line_sprites.column_mask(x as usize);
        while mask != 0 {
            let slot = mask.trailing_zeros() as usize;
            mask &= mask - 1;
            let Some((_, sprite)) = self.line_sprites.get(slot) else {
                continue;
            };
            let mut row = (self.ly as i16 - (sprite.y as i16 - 16)) as u8 & (height - 1);
            if sprite.y_flip() {
                row = height - 1 - row;
            }
            let tile = if height == 16 {
                sprite.tile & 0xFE
            } else {
                sprite.tile
            };
            let col = (x as i16 - (sprite.x as i16 - 8)) as u8;
            let bit = if sprite.x_flip() { col } else { 7 - col };
            let bank = if self.model.is_cgb() {
                sprite.vram_bank()
            } else {
                0
            };
            let addr = tile as usize * 16 + row as usize * 2;
            let lo = self.vram[bank][addr];
            let hi = self.vram[bank][addr + 1];
            let color_id = (((hi >> bit) & 1) << 1) | ((lo >> bit) & 1);
            if color_id != 0 {
                return Some((color_id, sprite));
            }
        }
        None
    }

    pub(super) fn render_pixel(&mut self, x: u8) {
        let cgb = self.model.is_cgb();
        let bg_enabled = cgb || self.lcdc & LCDC_BG != 0;

        let bg = if !bg_enabled {
            BgPixel::default()
        } else if self.transfer.window {
            let wx = (x as u16 + 7 - self.wx as u16) as u8;
            self.map_pixel(self.window_map_base(), wx, self.window_line)
        } else {
            let px = x.wrapping_add(self.scx);
            let py = self.ly.wrapping_add(self.scy);
            self.map_pixel(self.bg_map_base(), px, py)
        };

        let mut rgb = if cgb {
            self.bg_palettes.color(bg.palette, bg.color_id)
        } else {
            self.shades[dmg_shade(self.bgp, bg.color_id) as usize]
        };

        if self.lcdc & LCDC_OBJ != 0
            && let Some((color_id, sprite)) = self.sprite_pixel(x)
        {
            let hidden = if cgb {
                self.lcdc & LCDC_BG != 0
                    && bg.color_id != 0
                    && (bg.priority || sprite.behind_bg())
            } else {
                sprite.behind_bg() && bg.color_id != 0
            };
            if !hidden {
                rgb = if cgb {
                    self.obj_palettes.color(sprite.cgb_palette(), color_id)
                } else {
                    let palette = if sprite.dmg_palette() {
                        self.obp1
                    } else {
                        self.obp0
                    };
                    self.shades[dmg_shade(palette, color_id) as usize]
                };
            }
        }

        self.frames
            .put(x as usize, self.ly as usize, rgb, bg.color_id);
    }
}
