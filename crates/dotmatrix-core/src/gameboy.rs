use log::info;

use crate::{
    apu::{AudioChannelOutput, Channel},
    audio_queue::{AudioConsumer, audio_queue},
    breakpoints::BreakpointSet,
    cartridge::Cartridge,
    config::EmulatorConfig,
    cpu::Cpu,
    error::{EmuError, Result},
    hardware::Model,
    joypad::JoypadHandle,
    mmu::Mmu,
    ppu::VideoOutput,
};

/// What one call to [`GameBoy::step`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepInfo {
    /// CPU cycles consumed by the instruction.
    pub cycles: u32,
    /// The frame budget filled up and was flushed to the APU.
    pub frame_complete: bool,
}

/// CPU plus memory mediator, stepped together.
pub struct GameBoy {
    pub cpu: Cpu,
    pub mmu: Mmu,
    pub breakpoints: BreakpointSet,
    config: EmulatorConfig,
    /// CPU cycles into the current frame.
    frame_cycles: u32,
    /// Unit cycles owed to the APU.
    apu_cycles: u32,
    frames: u64,
}

impl GameBoy {
    /// Build a machine in its post-boot state around `cart`.
    pub fn new(cart: Cartridge, config: EmulatorConfig) -> Self {
        let model = config.model.resolve(cart.header());
        info!("Starting {} as {model:?}", cart.title());
        let mut mmu = Mmu::new(cart, model);
        mmu.apply_boot_state();
        if let Some(shades) = config.shades {
            mmu.ppu.set_shades(shades);
        }
        let cpu = Cpu::new(model, mmu.interrupts().clone());
        Self {
            cpu,
            mmu,
            breakpoints: BreakpointSet::new(),
            config,
            frame_cycles: 0,
            apu_cycles: 0,
            frames: 0,
        }
    }

    pub fn from_rom(rom: Vec<u8>, config: EmulatorConfig) -> Result<Self> {
        Ok(Self::new(Cartridge::from_rom(rom)?, config))
    }

    /// Return to the post-boot state, keeping the cartridge, outputs and
    /// breakpoints.
    pub fn reset(&mut self) {
        let model = self.model();
        self.mmu.reset();
        if let Some(shades) = self.config.shades {
            self.mmu.ppu.set_shades(shades);
        }
        self.cpu.reset(model);
        self.frame_cycles = 0;
        self.apu_cycles = 0;
        self.frames = 0;
    }

    pub fn model(&self) -> Model {
        self.mmu.model()
    }

    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    /// Frames flushed since the last reset.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn pc(&self) -> u16 {
        self.cpu.pc()
    }

    pub fn joypad(&self) -> JoypadHandle {
        self.mmu.joypad.handle()
    }

    pub fn set_video(&mut self, video: Box<dyn VideoOutput>) {
        self.mmu.ppu.set_video(video);
    }

    pub fn take_video(&mut self) -> Option<Box<dyn VideoOutput>> {
        self.mmu.ppu.take_video()
    }

    pub fn set_audio_output(
        &mut self,
        channel: Channel,
        output: Option<Box<dyn AudioChannelOutput>>,
    ) -> Option<Box<dyn AudioChannelOutput>> {
        self.mmu.apu.set_output(channel, output)
    }

    /// Route `channel` into a new lock-free queue at the configured sample
    /// rate and return its consumer half.
    pub fn connect_audio(&mut self, channel: Channel, capacity_frames: usize) -> AudioConsumer {
        let (producer, consumer) = audio_queue(capacity_frames, self.config.sample_rate);
        self.mmu.apu.set_output(channel, Some(Box::new(producer)));
        consumer
    }

    /// Oldest fault recorded since the last call.
    pub fn take_fault(&mut self) -> Option<EmuError> {
        self.mmu.take_fault()
    }

    /// Execute one instruction, then tick PPU, timer and DMA once per unit
    /// cycle it took. The APU catches up once per frame.
    pub fn step(&mut self) -> StepInfo {
        let speed = self.mmu.speed();
        let cycles = self.cpu.step(&mut self.mmu);
        let units = cycles / speed.divisor();
        for _ in 0..units {
            self.mmu.step_cycle();
        }

        self.apu_cycles += units;
        self.frame_cycles += cycles;
        let budget = speed.frame_budget();
        let frame_complete = self.frame_cycles >= budget;
        if frame_complete {
            self.frame_cycles -= budget;
            self.mmu.apu.step(self.apu_cycles);
            self.apu_cycles = 0;
            self.mmu.joypad.sync();
            self.frames += 1;
        }

        StepInfo {
            cycles,
            frame_complete,
        }
    }

    /// Step until one frame budget has been flushed.
    pub fn run_frame(&mut self) {
        while !self.step().frame_complete {}
    }

    /// Breakpoint id hit at the current instruction boundary, if any.
    pub fn breakpoint_hit(&self) -> Option<u32> {
        self.breakpoints.check(self.cpu.pc(), &self.cpu.regs)
    }

    /// Hand the cartridge back so its RAM can be persisted.
    pub fn into_cartridge(self) -> Cartridge {
        self.mmu.into_cartridge()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelPreference;
    use crate::hardware::{CYCLES_PER_FRAME, Speed};

    fn rom_with(program: &[u8], cgb_flag: u8) -> Vec<u8> {
        let mut rom = vec![0u8; 0x8000];
        rom[0x100..0x100 + program.len()].copy_from_slice(program);
        rom[0x143] = cgb_flag;
        rom
    }

    fn spin() -> Vec<u8> {
        // JR -2
        rom_with(&[0x18, 0xFE], 0x00)
    }

    #[test]
    fn starts_in_post_boot_state() {
        let gb = GameBoy::from_rom(spin(), EmulatorConfig::default()).unwrap();
        assert_eq!(gb.model(), Model::Dmg);
        let r = &gb.cpu.regs;
        assert_eq!(
            (r.a, r.f, r.bc(), r.de(), r.hl(), r.pc, r.sp),
            (0x01, 0xB0, 0x0013, 0x00D8, 0x014D, 0x0100, 0xFFFE)
        );
    }

    #[test]
    fn model_follows_header_or_override() {
        let auto = GameBoy::from_rom(rom_with(&[0x00], 0x80), EmulatorConfig::default()).unwrap();
        assert_eq!(auto.model(), Model::Cgb);
        let forced = GameBoy::from_rom(
            rom_with(&[0x00], 0x80),
            EmulatorConfig {
                model: ModelPreference::ForceDmg,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(forced.model(), Model::Dmg);
    }

    #[test]
    fn unsupported_controller_fails() {
        let mut rom = spin();
        rom[0x147] = 0xFC;
        assert!(matches!(
            GameBoy::from_rom(rom, EmulatorConfig::default()),
            Err(EmuError::UnsupportedController { code: 0xFC })
        ));
    }

    #[test]
    fn frame_budget_is_one_frame_of_cycles() {
        let mut gb = GameBoy::from_rom(spin(), EmulatorConfig::default()).unwrap();
        let mut total = 0;
        loop {
            let step = gb.step();
            total += step.cycles;
            if step.frame_complete {
                break;
            }
        }
        assert!(total >= CYCLES_PER_FRAME);
        assert!(total < CYCLES_PER_FRAME + 24);
        assert_eq!(gb.frames(), 1);
        assert_eq!(gb.mmu.apu.cycles(), u64::from(total));
    }

    #[test]
    fn double_speed_halves_unit_cycles() {
        // LD A,1; LDH ($4D),A; STOP; JR -2
        let rom = rom_with(&[0x3E, 0x01, 0xE0, 0x4D, 0x10, 0x00, 0x18, 0xFE], 0x80);
        let mut gb = GameBoy::from_rom(rom, EmulatorConfig::default()).unwrap();
        for _ in 0..3 {
            gb.step();
        }
        assert_eq!(gb.mmu.speed(), Speed::Double);
        let before = gb.mmu.apu.cycles();
        gb.run_frame();
        let units = gb.mmu.apu.cycles() - before;
        // Twice the CPU cycles fit in one frame, but the units see one
        // frame's worth.
        assert!(units >= u64::from(CYCLES_PER_FRAME) - 64);
        assert!(units <= u64::from(CYCLES_PER_FRAME) + 64);
    }

    #[test]
    fn reset_keeps_cartridge_and_breakpoints() {
        let mut gb = GameBoy::from_rom(spin(), EmulatorConfig::default()).unwrap();
        let id = gb.breakpoints.add(0x0100);
        gb.run_frame();
        gb.mmu.write(0xC000, 0x55);
        gb.reset();
        assert_eq!(gb.pc(), 0x0100);
        assert_eq!(gb.mmu.read(0xC000), 0x00);
        assert_eq!(gb.frames(), 0);
        assert_eq!(gb.breakpoint_hit(), Some(id));
    }

    #[test]
    fn connected_audio_receives_frames() {
        let mut gb = GameBoy::from_rom(spin(), EmulatorConfig::default()).unwrap();
        let rx = gb.connect_audio(Channel::Square1, 4096);
        gb.run_frame();
        // 70224 cycles at 44.1 kHz is about 738 frames.
        assert!((700..800).contains(&rx.len()));
    }
}
