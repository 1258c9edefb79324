use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use dotmatrix_core::cartridge::ExternalMemory;
use dotmatrix_core::error::Result;
use log::info;

/// Battery-backed cartridge RAM stored in a `.sav` file next to the ROM.
///
/// The file is read on activation and written back on deactivation when
/// anything changed. A missing file starts from zeroed RAM.
pub struct SaveFile {
    path: PathBuf,
    data: Vec<u8>,
    active: bool,
    dirty: bool,
}

impl SaveFile {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            data: Vec::new(),
            active: false,
            dirty: false,
        }
    }
}

impl ExternalMemory for SaveFile {
    fn activate(&mut self) -> Result<()> {
        match fs::read(&self.path) {
            Ok(bytes) => {
                let n = bytes.len().min(self.data.len());
                self.data[..n].copy_from_slice(&bytes[..n]);
                info!("Loaded {} bytes from {}", n, self.path.display());
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.active = true;
        Ok(())
    }

    fn deactivate(&mut self) -> Result<()> {
        if self.active && self.dirty {
            fs::write(&self.path, &self.data)?;
            info!("Saved cartridge RAM to {}", self.path.display());
            self.dirty = false;
        }
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
        if let Some(b) = self.data.get_mut(offset)
            && *b != value
        {
            *b = value;
            self.dirty = true;
        }
    }

    fn set_size(&mut self, size: usize) {
        self.data.resize(size, 0);
    }

    fn size(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_starts_zeroed() {
        let dir = tempdir().unwrap();
        let mut save = SaveFile::new(dir.path().join("game.sav"));
        save.set_size(0x2000);
        save.activate().unwrap();
        assert_eq!(save.read_byte(0x10), 0);
        save.deactivate().unwrap();
        assert!(!dir.path().join("game.sav").exists(), "nothing written");
    }

    #[test]
    fn writes_persist_across_activations() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("game.sav");
        let mut save = SaveFile::new(path.clone());
        save.set_size(0x2000);
        save.activate().unwrap();
        save.write_byte(0x123, 0xAB);
        save.deactivate().unwrap();
        assert_eq!(fs::read(&path).unwrap().len(), 0x2000);

        let mut again = SaveFile::new(path);
        again.set_size(0x2000);
        again.activate().unwrap();
        assert_eq!(again.read_byte(0x123), 0xAB);
    }

    #[test]
    fn short_file_fills_prefix() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("game.sav");
        fs::write(&path, [1, 2, 3]).unwrap();
        let mut save = SaveFile::new(path);
        save.set_size(8);
        save.activate().unwrap();
        assert_eq!((save.read_byte(2), save.read_byte(3)), (3, 0));
    }

    #[test]
    fn inactive_store_ignores_access() {
        let dir = tempdir().unwrap();
        let mut save = SaveFile::new(dir.path().join("game.sav"));
        save.set_size(4);
        save.write_byte(0, 9);
        assert_eq!(save.read_byte(0), 0xFF);
    }
}
