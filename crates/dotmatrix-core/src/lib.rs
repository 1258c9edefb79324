//! Cycle-accurate Game Boy / Game Boy Color emulation core.
//!
//! This crate holds the platform-agnostic machine: CPU, memory mediator and
//! the peripherals it ticks. Frontends drive it through the [`gameboy`]
//! facade, or hand it to the [`scheduler`] thread and talk to it over
//! channels.

/// Audio Processing Unit (APU) emulation.
pub mod apu;

/// Bounded stereo sample queue for APU channel outputs.
pub mod audio_queue;

/// Execution breakpoints with optional register predicates.
pub mod breakpoints;

/// Cartridge header parsing and memory bank controllers.
pub mod cartridge;

/// Emulator settings shared with frontends.
pub mod config;

/// Sharp LR35902 CPU core.
pub mod cpu;

/// OAM DMA and CGB VRAM DMA.
pub mod dma;

/// Error type for the whole core.
pub mod error;

/// High-level facade that wires the CPU and MMU into a single machine.
pub mod gameboy;

/// Clock constants, models and speed modes.
pub mod hardware;

/// Interrupt flag and enable registers.
pub mod interrupt;

/// Joypad register and button state.
pub mod joypad;

/// Memory map and hardware plumbing.
pub mod mmu;

/// Pixel Processing Unit (PPU) emulation.
pub mod ppu;

/// Emulation thread driven by commands.
pub mod scheduler;

/// Serial port register pair.
pub mod serial;

/// Divider/timer unit.
pub mod timer;
