//! Tile and sprite fetch timing.
//!
//! A fetch reads two bytes in three half-steps of two cycles each: the
//! first byte lands at cycle 2, the second at cycle 4, and the pair is
//! handed over at cycle 6. The pixel transfer stalls while a fetch is in
//! flight.

use super::VRAM_BANK_SIZE;
use super::oam::OAM_SIZE;

pub const FETCH_CYCLES: u8 = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchSource {
    /// Two consecutive bytes of tile data (one row of a tile).
    Tile { bank: usize, addr: usize },
    /// Position bytes of OAM entry `index`.
    Sprite { index: usize },
}

#[derive(Clone, Debug, Default)]
pub struct TileFetcher {
    source: Option<FetchSource>,
    elapsed: u8,
    bytes: [u8; 2],
}

impl TileFetcher {
    pub fn start(&mut self, source: FetchSource) {
        self.source = Some(source);
        self.elapsed = 0;
        self.bytes = [0; 2];
    }

    pub fn busy(&self) -> bool {
        self.source.is_some()
    }

    pub fn cancel(&mut self) {
        self.source = None;
        self.elapsed = 0;
    }

    /// Advance one cycle, returning the fetched pair once it is ready.
    pub fn tick(
        &mut self,
        vram: &[[u8; VRAM_BANK_SIZE]; 2],
        oam: &[u8; OAM_SIZE],
    ) -> Option<[u8; 2]> {
        let source = self.source?;
        self.elapsed += 1;
        match self.elapsed {
            2 => self.bytes[0] = Self::read(source, 0, vram, oam),
            4 => self.bytes[1] = Self::read(source, 1, vram, oam),
            FETCH_CYCLES => {
                self.source = None;
                self.elapsed = 0;
                return Some(self.bytes);
            }
            _ => {}
        }
        None
    }

    fn read(
        source: FetchSource,
        offset: usize,
        vram: &[[u8; VRAM_BANK_SIZE]; 2],
        oam: &[u8; OAM_SIZE],
    ) -> u8 {
        match source {
            FetchSource::Tile { bank, addr } => vram[bank & 1][(addr + offset) % VRAM_BANK_SIZE],
            FetchSource::Sprite { index } => oam[(index * 4 + offset) % OAM_SIZE],
        }
    }
}
