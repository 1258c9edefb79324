mod config;
mod headless;
mod save;

use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use dotmatrix_core::{
    apu::Channel,
    cartridge::{Cartridge, CartridgeHeader, ExternalMemory, VolatileRam},
    config::ModelPreference,
    gameboy::GameBoy,
};
use log::{error, info, warn};

use headless::{Outcome, RunOptions};
use save::SaveFile;

fn parse_hex(s: &str) -> Result<u16, String> {
    let digits = s
        .trim_start_matches("0x")
        .trim_start_matches("0X")
        .trim_start_matches('$');
    u16::from_str_radix(digits, 16).map_err(|e| format!("bad address '{s}': {e}"))
}

#[derive(Parser)]
#[command(version, about = "Headless Game Boy / Game Boy Color emulator")]
struct Args {
    /// Path to ROM file
    rom: PathBuf,

    /// Configuration file (defaults to the per-user location)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Force DMG mode
    #[arg(long, conflicts_with = "cgb")]
    dmg: bool,

    /// Force CGB mode
    #[arg(long, conflicts_with = "dmg")]
    cgb: bool,

    /// Number of frames to run
    #[arg(long)]
    frames: Option<u64>,

    /// Wall-clock limit in seconds
    #[arg(long)]
    seconds: Option<u64>,

    /// Write the last frame to this PNG file
    #[arg(long)]
    screenshot: Option<PathBuf>,

    /// Print serial output when the run ends
    #[arg(long)]
    serial: bool,

    /// Run as fast as possible instead of at 59.7 Hz
    #[arg(long)]
    unlimited: bool,

    /// Stop at the first CPU fault
    #[arg(long)]
    break_on_fault: bool,

    /// Stop when PC reaches this address (hex, repeatable)
    #[arg(long = "break", value_parser = parse_hex)]
    breakpoints: Vec<u16>,

    /// Battery save file (defaults to the ROM path with a .sav extension)
    #[arg(long)]
    save: Option<PathBuf>,

    /// Report peak level per sound channel
    #[arg(long)]
    audio: bool,

    /// Store the effective configuration and exit
    #[arg(long)]
    write_config: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config_path = args.config.clone().unwrap_or_else(config::default_config_path);
    let mut cfg = config::load_from_file(&config_path);

    if args.dmg {
        cfg.emulator.model = ModelPreference::ForceDmg;
    } else if args.cgb {
        cfg.emulator.model = ModelPreference::ForceCgb;
    }
    if args.unlimited {
        cfg.emulator.frame_limit = false;
    }
    if args.break_on_fault {
        cfg.emulator.break_on_fault = true;
    }
    if let Some(frames) = args.frames {
        cfg.run.frames = frames;
    }
    if let Some(secs) = args.seconds {
        cfg.run.timeout_secs = secs;
    }
    if args.screenshot.is_some() {
        cfg.run.screenshot = args.screenshot.clone();
    }
    cfg.run.serial |= args.serial;
    cfg.run.audio_report |= args.audio;

    if args.write_config {
        config::save_to_file(&config_path, &cfg)?;
        info!("Wrote configuration to {}", config_path.display());
        return Ok(());
    }

    let rom = std::fs::read(&args.rom)?;
    let header = CartridgeHeader::parse(&rom)?;
    info!(
        "Loaded '{}' ({}, {} KiB ROM, {} KiB RAM)",
        header.title,
        header.kind.controller,
        header.rom_size / 1024,
        header.ram_size / 1024
    );
    if !CartridgeHeader::header_checksum_ok(&rom) {
        warn!("Header checksum mismatch");
    }

    let ram: Box<dyn ExternalMemory> = if header.kind.battery {
        let path = args
            .save
            .clone()
            .unwrap_or_else(|| args.rom.with_extension("sav"));
        Box::new(SaveFile::new(path))
    } else {
        Box::new(VolatileRam::new())
    };
    let cart = Cartridge::new(rom, ram)?;
    let gb = GameBoy::new(cart, cfg.emulator.clone());
    info!("Running as {:?}", gb.model());

    let opts = RunOptions {
        frames: cfg.run.frames,
        timeout: Duration::from_secs(cfg.run.timeout_secs),
        breakpoints: args.breakpoints.clone(),
        audio_report: cfg.run.audio_report,
    };
    let report = headless::run(gb, &opts)?;
    println!(
        "{} after {} frames, pc={:04X}",
        headless::describe(&report.outcome),
        report.frames,
        report.gb.pc()
    );

    if let Some(path) = &cfg.run.screenshot {
        if report.last_frame.is_empty() {
            warn!("No frame was delivered; skipping screenshot");
        } else {
            headless::save_png(path, &report.last_frame)?;
            info!("Saved screenshot to {}", path.display());
        }
    }

    if cfg.run.serial && !report.serial.is_empty() {
        let mut out = std::io::stdout().lock();
        out.write_all(&report.serial)?;
        out.write_all(b"\n")?;
    }

    if let Some(peaks) = report.audio_peaks {
        for (channel, peak) in Channel::ALL.iter().zip(peaks) {
            println!("{channel:?}: peak {peak:.3}");
        }
    }

    report.gb.into_cartridge().into_external()?;

    if let Outcome::Paused {
        reason: dotmatrix_core::scheduler::BreakReason::Fault(e),
        ..
    } = &report.outcome
    {
        return Err(format!("machine fault: {e}").into());
    }
    Ok(())
}
