use super::{SCREEN_HEIGHT, SCREEN_WIDTH};

/// Receiver of completed frames.
///
/// `render_frame` gets a borrowed RGB888 slice that stays valid only for
/// the duration of the call; a consumer on another thread must copy it.
pub trait VideoOutput: Send {
    fn set_size(&mut self, width: usize, height: usize);
    fn render_frame(&mut self, rgb: &[u8]);
    /// Present or export the most recent frame on demand.
    fn blit(&mut self) {}
}

pub const FRAME_BYTES: usize = SCREEN_WIDTH * SCREEN_HEIGHT * 3;

/// Double-buffered RGB framebuffer plus the color-index plane of the
/// frame being drawn.
pub struct FrameBuffers {
    back: Box<[u8]>,
    front: Box<[u8]>,
    index: Box<[u8]>,
}

impl Default for FrameBuffers {
    fn default() -> Self {
        Self {
            back: vec![0; FRAME_BYTES].into_boxed_slice(),
            front: vec![0; FRAME_BYTES].into_boxed_slice(),
            index: vec![0; SCREEN_WIDTH * SCREEN_HEIGHT].into_boxed_slice(),
        }
    }
}

impl FrameBuffers {
    #[inline]
    pub fn put(&mut self, x: usize, y: usize, rgb: [u8; 3], color_id: u8) {
        let px = y * SCREEN_WIDTH + x;
        self.back[px * 3..px * 3 + 3].copy_from_slice(&rgb);
        self.index[px] = color_id;
    }

    /// Promote the frame in progress to the front buffer.
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.back, &mut self.front);
    }

    pub fn fill(&mut self, rgb: [u8; 3]) {
        for buf in [&mut self.back, &mut self.front] {
            for px in buf.chunks_exact_mut(3) {
                px.copy_from_slice(&rgb);
            }
        }
        self.index.fill(0);
    }

    pub fn front(&self) -> &[u8] {
        &self.front
    }

    pub fn back(&self) -> &[u8] {
        &self.back
    }

    pub fn color_index(&self, x: usize, y: usize) -> u8 {
        self.index[y * SCREEN_WIDTH + x]
    }
}
