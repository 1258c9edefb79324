/// Master clock in cycles per second at normal speed.
pub const CLOCK_HZ: u32 = 4_194_304;

/// Dots in one scanline.
pub const DOTS_PER_LINE: u32 = 456;

/// Scanlines in one frame, visible plus VBlank.
pub const LINES_PER_FRAME: u32 = 154;

/// Cycle budget of one frame at normal speed.
pub const CYCLES_PER_FRAME: u32 = DOTS_PER_LINE * LINES_PER_FRAME;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
/// Console model being emulated.
///
/// Selects the post-boot register state and whether the color-only
/// registers (VRAM/WRAM banking, palette RAM, VRAM DMA, speed switch)
/// are decoded.
pub enum Model {
    #[default]
    Dmg,
    Cgb,
}

impl Model {
    #[inline]
    pub const fn is_cgb(self) -> bool {
        matches!(self, Model::Cgb)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
/// CPU clock speed. Color models can switch to double speed via STOP.
pub enum Speed {
    #[default]
    Normal,
    Double,
}

impl Speed {
    #[inline]
    pub const fn is_double(self) -> bool {
        matches!(self, Speed::Double)
    }

    /// Number of CPU cycles that make up one unit cycle at this speed.
    #[inline]
    pub const fn divisor(self) -> u32 {
        match self {
            Speed::Normal => 1,
            Speed::Double => 2,
        }
    }

    /// CPU cycles in one frame at this speed.
    #[inline]
    pub const fn frame_budget(self) -> u32 {
        CYCLES_PER_FRAME * self.divisor()
    }
}
