use crate::error::Result;

/// Backing store for cartridge RAM.
///
/// Hosts that persist battery RAM implement this over a file or similar;
/// the core only ever sees the trait. Reads and writes are no-ops while the
/// backend is deactivated.
pub trait ExternalMemory: Send {
    /// Make the store available, loading persisted contents if any.
    fn activate(&mut self) -> Result<()>;
    /// Flush and release the store.
    fn deactivate(&mut self) -> Result<()>;
    fn read_byte(&self, offset: usize) -> u8;
    fn write_byte(&mut self, offset: usize, value: u8);
    fn set_size(&mut self, size: usize);
    fn size(&self) -> usize;
}

/// In-memory cartridge RAM that forgets its contents on drop.
#[derive(Debug, Default)]
pub struct VolatileRam {
    data: Vec<u8>,
    active: bool,
}

impl VolatileRam {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(data: Vec<u8>) -> Self {
        Self {
            data,
            active: false,
        }
    }

    pub fn contents(&self) -> &[u8] {
        &self.data
    }
}

impl ExternalMemory for VolatileRam {
    fn activate(&mut self) -> Result<()> {
        self.active = true;
        Ok(())
    }

    fn deactivate(&mut self) -> Result<()> {
        self.active = false;
        Ok(())
    }

    fn read_byte(&self, offset: usize) -> u8 {
        if !self.active {
            return 0xFF;
        }
        self.data.get(offset).copied().unwrap_or(0xFF)
    }

    fn write_byte(&mut self, offset: usize, value: u8) {
        if !self.active {
            return;
        }
        if let Some(b) = self.data.get_mut(offset) {
            *b = value;
        }
    }

    fn set_size(&mut self, size: usize) {
        self.data.resize(size, 0);
    }

    fn size(&self) -> usize {
        self.data.len()
    }
}
