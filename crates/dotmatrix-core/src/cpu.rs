//! LR35902 core: fetch, decode through the opcode tables, execute,
//! interrupt dispatch and the HALT/STOP low-power states.

pub mod alu;
pub mod instruction;
pub mod ops;
pub mod registers;

#[cfg(feature = "cpu-trace")]
use log::trace;

use crate::hardware::Model;
use crate::interrupt::{Interrupt, InterruptController};
use crate::mmu::Mmu;

pub use instruction::{Instruction, Opcode, Outcome};
pub use registers::{FLAG_C, FLAG_H, FLAG_N, FLAG_Z, RegisterBank};

/// Cost of a step that executes nothing (halted, stopped or locked).
const IDLE_CYCLES: u32 = 4;
/// Cost of dispatching an interrupt to its vector.
const INTERRUPT_CYCLES: u32 = 20;

pub struct Cpu {
    pub regs: RegisterBank,
    pub halted: bool,
    pub stopped: bool,
    /// Set by an illegal opcode; the core never fetches again.
    pub locked: bool,
    /// Total cycles executed.
    pub cycles: u64,
    interrupts: InterruptController,
}

impl Cpu {
    pub fn new(model: Model, interrupts: InterruptController) -> Self {
        Self {
            regs: RegisterBank::post_boot(model),
            halted: false,
            stopped: false,
            locked: false,
            cycles: 0,
            interrupts,
        }
    }

    /// Return to the post-boot state.
    pub fn reset(&mut self, model: Model) {
        self.regs = RegisterBank::post_boot(model);
        self.halted = false;
        self.stopped = false;
        self.locked = false;
        self.cycles = 0;
    }

    #[inline]
    pub fn pc(&self) -> u16 {
        self.regs.pc
    }

    /// Dispatch the highest-priority pending interrupt if IME allows it.
    /// Returns the cycles spent.
    fn service_interrupt(&mut self, mmu: &mut Mmu) -> Option<u32> {
        if !self.regs.ime {
            return None;
        }
        let irq = self.interrupts.highest_pending()?;
        self.interrupts.acknowledge(irq);
        self.regs.ime = false;
        self.halted = false;
        ops::call_to(self, mmu, irq.vector());
        Some(INTERRUPT_CYCLES)
    }

    /// Execute one instruction (or one idle slice) and return the CPU
    /// cycles it took.
    pub fn step(&mut self, mmu: &mut Mmu) -> u32 {
        let cycles = self.step_inner(mmu);
        self.cycles += u64::from(cycles);
        cycles
    }

    fn step_inner(&mut self, mmu: &mut Mmu) -> u32 {
        if self.locked {
            return IDLE_CYCLES;
        }

        // Any enabled request ends HALT, whether or not IME is set.
        if self.halted && self.interrupts.pending() != 0 {
            self.halted = false;
        }

        if let Some(cycles) = self.service_interrupt(mmu) {
            return cycles;
        }

        if self.stopped {
            mmu.joypad.sync();
            let joypad_irq = self.interrupts.requested() & Interrupt::Joypad.mask() != 0;
            if mmu.joypad.any_pressed() || joypad_irq {
                self.stopped = false;
            } else {
                return IDLE_CYCLES;
            }
        }

        if self.halted {
            return IDLE_CYCLES;
        }

        let was_pending = self.regs.ime_pending;
        let ins = Instruction::fetch(mmu, self.regs.pc);
        #[cfg(feature = "cpu-trace")]
        trace!(
            "{ins} A={:02X} F={:02X} BC={:04X} DE={:04X} HL={:04X} SP={:04X}",
            self.regs.a,
            self.regs.f,
            self.regs.bc(),
            self.regs.de(),
            self.regs.hl(),
            self.regs.sp
        );
        self.regs.pc = self.regs.pc.wrapping_add(ins.len());
        let outcome = (ins.opcode.exec)(self, mmu, &ins);

        // EI takes effect after the instruction that follows it.
        if was_pending && self.regs.ime_pending {
            self.regs.ime = true;
            self.regs.ime_pending = false;
        }

        ins.cycles(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::Cartridge;
    use crate::error::EmuError;
    use crate::hardware::Speed;

    const ORIGIN: u16 = 0xC000;

    fn machine(model: Model, program: &[u8]) -> (Cpu, Mmu) {
        let rom = vec![0u8; 0x8000];
        let cart = Cartridge::from_rom(rom).unwrap();
        let mut mmu = Mmu::new(cart, model);
        mmu.apply_boot_state();
        for (i, &b) in program.iter().enumerate() {
            mmu.write(ORIGIN + i as u16, b);
        }
        let mut cpu = Cpu::new(model, mmu.interrupts().clone());
        cpu.regs.pc = ORIGIN;
        (cpu, mmu)
    }

    fn run(cpu: &mut Cpu, mmu: &mut Mmu, steps: usize) -> u32 {
        (0..steps).map(|_| cpu.step(mmu)).sum()
    }

    #[test]
    fn post_boot_state() {
        let (cpu, _) = machine(Model::Dmg, &[]);
        let fresh = Cpu::new(Model::Dmg, InterruptController::new());
        assert_eq!(fresh.regs, RegisterBank::post_boot(Model::Dmg));
        assert_eq!(fresh.pc(), 0x0100);
        assert_eq!(cpu.regs.sp, 0xFFFE);
    }

    #[test]
    fn loads_and_arithmetic() {
        // LD A,$3A; LD B,$C6; ADD A,B; LD HL,$C100; LD (HL+),A; INC (HL)
        let (mut cpu, mut mmu) = machine(
            Model::Dmg,
            &[0x3E, 0x3A, 0x06, 0xC6, 0x80, 0x21, 0x00, 0xC1, 0x22, 0x34],
        );
        assert_eq!(run(&mut cpu, &mut mmu, 3), 8 + 8 + 4);
        assert_eq!(cpu.regs.a, 0x00);
        assert_eq!(cpu.regs.f, FLAG_Z | FLAG_H | FLAG_C);
        assert_eq!(run(&mut cpu, &mut mmu, 3), 12 + 8 + 12);
        // INC keeps carry.
        assert_eq!(cpu.regs.f, FLAG_C);
        assert_eq!(cpu.regs.hl(), 0xC101);
        assert_eq!(mmu.read(0xC100), 0x00);
        assert_eq!(mmu.read(0xC101), 0x01);
    }

    #[test]
    fn conditional_branch_cycles() {
        // XOR A; JR NZ,+2 (not taken); JR Z,+0 (taken)
        let (mut cpu, mut mmu) = machine(Model::Dmg, &[0xAF, 0x20, 0x02, 0x28, 0x00]);
        assert_eq!(cpu.step(&mut mmu), 4);
        assert_eq!(cpu.step(&mut mmu), 8);
        assert_eq!(cpu.pc(), ORIGIN + 3);
        assert_eq!(cpu.step(&mut mmu), 12);
        assert_eq!(cpu.pc(), ORIGIN + 5);
    }

    #[test]
    fn call_and_return_use_the_stack() {
        // CALL $C010; ... at C010: RET
        let mut program = vec![0xCD, 0x10, 0xC0];
        program.resize(0x10, 0x00);
        program.push(0xC9);
        let (mut cpu, mut mmu) = machine(Model::Dmg, &program);
        assert_eq!(cpu.step(&mut mmu), 24);
        assert_eq!(cpu.pc(), 0xC010);
        assert_eq!(cpu.regs.sp, 0xFFFC);
        assert_eq!(mmu.read_word(0xFFFC), ORIGIN + 3);
        assert_eq!(cpu.step(&mut mmu), 16);
        assert_eq!(cpu.pc(), ORIGIN + 3);
        assert_eq!(cpu.regs.sp, 0xFFFE);
    }

    #[test]
    fn push_pop_af_masks_flags() {
        // LD BC,$12FF; PUSH BC; POP AF
        let (mut cpu, mut mmu) = machine(Model::Dmg, &[0x01, 0xFF, 0x12, 0xC5, 0xF1]);
        run(&mut cpu, &mut mmu, 3);
        assert_eq!(cpu.regs.af(), 0x12F0);
    }

    #[test]
    fn cb_ops_on_registers_and_memory() {
        // LD A,$F0; SWAP A; LD HL,$C100; SET 3,(HL); BIT 3,(HL); RES 3,(HL)
        let (mut cpu, mut mmu) = machine(
            Model::Dmg,
            &[
                0x3E, 0xF0, 0xCB, 0x37, 0x21, 0x00, 0xC1, 0xCB, 0xDE, 0xCB, 0x5E, 0xCB, 0x9E,
            ],
        );
        run(&mut cpu, &mut mmu, 2);
        assert_eq!(cpu.regs.a, 0x0F);
        cpu.step(&mut mmu);
        assert_eq!(cpu.step(&mut mmu), 16);
        assert_eq!(mmu.read(0xC100), 0x08);
        assert_eq!(cpu.step(&mut mmu), 12);
        assert!(!cpu.regs.flag(FLAG_Z));
        cpu.step(&mut mmu);
        assert_eq!(mmu.read(0xC100), 0x00);
    }

    #[test]
    fn ei_takes_effect_after_next_instruction() {
        // EI; NOP; NOP
        let (mut cpu, mut mmu) = machine(Model::Dmg, &[0xFB, 0x00, 0x00]);
        mmu.interrupts().write_if(0);
        mmu.interrupts().write_ie(Interrupt::Timer.mask());
        cpu.regs.ime = false;
        cpu.step(&mut mmu);
        mmu.interrupts().raise(Interrupt::Timer);
        assert!(!cpu.regs.ime);
        // The NOP after EI still runs.
        assert_eq!(cpu.step(&mut mmu), 4);
        assert!(cpu.regs.ime);
        assert_eq!(cpu.pc(), ORIGIN + 2);
        assert_eq!(cpu.step(&mut mmu), 20);
        assert_eq!(cpu.pc(), Interrupt::Timer.vector());
        assert!(!cpu.regs.ime);
        assert_eq!(mmu.interrupts().requested(), 0);
    }

    #[test]
    fn di_cancels_a_pending_ei() {
        let (mut cpu, mut mmu) = machine(Model::Dmg, &[0xFB, 0xF3, 0x00]);
        run(&mut cpu, &mut mmu, 3);
        assert!(!cpu.regs.ime);
    }

    #[test]
    fn interrupt_priority_and_vector() {
        let (mut cpu, mut mmu) = machine(Model::Dmg, &[0x00]);
        mmu.interrupts().write_if(0);
        mmu.interrupts().write_ie(0x1F);
        cpu.regs.ime = true;
        mmu.interrupts().raise(Interrupt::Serial);
        mmu.interrupts().raise(Interrupt::LcdStat);
        assert_eq!(cpu.step(&mut mmu), 20);
        assert_eq!(cpu.pc(), 0x48);
        assert_eq!(mmu.interrupts().requested(), Interrupt::Serial.mask());
        assert_eq!(mmu.read_word(cpu.regs.sp), ORIGIN);
    }

    #[test]
    fn halt_wakes_without_ime() {
        // HALT; INC A
        let (mut cpu, mut mmu) = machine(Model::Dmg, &[0x76, 0x3C]);
        mmu.interrupts().write_if(0);
        mmu.interrupts().write_ie(Interrupt::VBlank.mask());
        cpu.regs.ime = false;
        cpu.regs.a = 0;
        cpu.step(&mut mmu);
        assert!(cpu.halted);
        assert_eq!(cpu.step(&mut mmu), 4);
        assert_eq!(cpu.pc(), ORIGIN + 1);
        mmu.interrupts().raise(Interrupt::VBlank);
        cpu.step(&mut mmu);
        assert!(!cpu.halted);
        assert_eq!(cpu.regs.a, 1);
        // No dispatch, the request stays set.
        assert_eq!(mmu.interrupts().requested(), Interrupt::VBlank.mask());
    }

    #[test]
    fn halt_with_ime_dispatches() {
        let (mut cpu, mut mmu) = machine(Model::Dmg, &[0x76, 0x00]);
        mmu.interrupts().write_if(0);
        mmu.interrupts().write_ie(Interrupt::Timer.mask());
        cpu.regs.ime = true;
        cpu.step(&mut mmu);
        mmu.interrupts().raise(Interrupt::Timer);
        assert_eq!(cpu.step(&mut mmu), 20);
        assert!(!cpu.halted);
        assert_eq!(mmu.read_word(cpu.regs.sp), ORIGIN + 1);
    }

    #[test]
    fn stop_switches_speed_when_primed() {
        // LD A,$01; LDH ($4D),A; STOP
        let (mut cpu, mut mmu) =
            machine(Model::Cgb, &[0x3E, 0x01, 0xE0, 0x4D, 0x10, 0x00, 0x00]);
        run(&mut cpu, &mut mmu, 3);
        assert_eq!(mmu.speed(), Speed::Double);
        assert!(!cpu.stopped);
        assert_eq!(cpu.pc(), ORIGIN + 6);
        assert_eq!(mmu.read(0xFF4D), 0xFE);
    }

    #[test]
    fn unprimed_stop_waits_for_joypad() {
        let (mut cpu, mut mmu) = machine(Model::Dmg, &[0x10, 0x00, 0x3C]);
        cpu.regs.a = 0;
        cpu.step(&mut mmu);
        assert!(cpu.stopped);
        assert_eq!(run(&mut cpu, &mut mmu, 10), 40);
        assert_eq!(cpu.regs.a, 0);
        mmu.joypad.handle().press(crate::joypad::Button::Start);
        cpu.step(&mut mmu);
        assert!(!cpu.stopped);
        assert_eq!(cpu.regs.a, 1);
    }

    #[test]
    fn illegal_opcode_locks_and_faults() {
        let (mut cpu, mut mmu) = machine(Model::Dmg, &[0x00, 0xD3, 0x3C]);
        cpu.regs.a = 0;
        run(&mut cpu, &mut mmu, 2);
        assert!(cpu.locked);
        match mmu.take_fault() {
            Some(EmuError::IllegalOpcode { opcode, addr }) => {
                assert_eq!(opcode, 0xD3);
                assert_eq!(addr, ORIGIN + 1);
            }
            other => panic!("unexpected fault {other:?}"),
        }
        assert_eq!(run(&mut cpu, &mut mmu, 5), 20);
        assert_eq!(cpu.regs.a, 0);
    }

    #[test]
    fn stack_pointer_arithmetic() {
        // LD SP,$FFF8; ADD SP,2; LD HL,SP-1
        let (mut cpu, mut mmu) = machine(Model::Dmg, &[0x31, 0xF8, 0xFF, 0xE8, 0x02, 0xF8, 0xFF]);
        assert_eq!(run(&mut cpu, &mut mmu, 3), 12 + 16 + 12);
        assert_eq!(cpu.regs.sp, 0xFFFA);
        assert_eq!(cpu.regs.hl(), 0xFFF9);
    }

    #[test]
    fn disassembly_fills_operands() {
        let (cpu, mmu) = machine(Model::Dmg, &[0x20, 0xFE, 0xF0, 0x44, 0xEA, 0x34, 0x12]);
        let jr = Instruction::decode(&mmu, cpu.pc());
        assert_eq!(jr.disassemble(), "JR NZ,$C000");
        let ldh = Instruction::decode(&mmu, ORIGIN + 2);
        assert_eq!(ldh.disassemble(), "LDH A,($FF44)");
        let ld = Instruction::decode(&mmu, ORIGIN + 4);
        assert_eq!(ld.disassemble(), "LD ($1234),A");
        assert_eq!(ld.to_string(), "C004: LD ($1234),A");
    }
}
