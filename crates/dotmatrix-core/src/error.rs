use thiserror::Error;

/// Errors surfaced by the emulation core.
#[derive(Debug, Error)]
pub enum EmuError {
    #[error("ROM image is too short to contain a header ({len} bytes)")]
    HeaderTooShort { len: usize },

    #[error("unsupported cartridge controller type {code:#04X}")]
    UnsupportedController { code: u8 },

    #[error("access to unmapped I/O register {addr:#06X} ({})", if *write { "write" } else { "read" })]
    UnmappedIo { addr: u16, write: bool },

    #[error("illegal opcode {opcode:#04X} at {addr:#06X}")]
    IllegalOpcode { opcode: u8, addr: u16 },

    #[error("external memory backend failure: {0}")]
    ExternalMemory(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to spawn emulation thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EmuError>;
