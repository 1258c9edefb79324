mod common;

use common::{RomBuilder, machine, run_to};
use dotmatrix_core::hardware::Model;
use dotmatrix_core::joypad::Button;

#[test]
fn boots_into_documented_register_state() {
    let gb = machine(RomBuilder::new().build());
    let r = &gb.cpu.regs;
    assert_eq!(
        (r.a, r.f, r.bc(), r.de(), r.hl(), r.pc, r.sp),
        (0x01, 0xB0, 0x0013, 0x00D8, 0x014D, 0x0100, 0xFFFE)
    );

    let gb = machine(RomBuilder::new().color().build());
    assert_eq!(gb.model(), Model::Cgb);
    assert_eq!(gb.cpu.regs.a, 0x11);
}

#[test]
fn entry_point_reaches_program() {
    let mut gb = machine(RomBuilder::new().build());
    run_to(&mut gb, 0x0150, 4);
}

#[test]
fn loop_sums_counter() {
    let rom = RomBuilder::new()
        .program(&[
            0x06, 0x0A, // LD B,10
            0xAF, // XOR A
            0x80, // ADD A,B
            0x05, // DEC B
            0x20, 0xFC, // JR NZ,-4
            0xEA, 0x00, 0xC0, // LD ($C000),A
            0x18, 0xFE, // JR -2
        ])
        .build();
    let mut gb = machine(rom);
    run_to(&mut gb, 0x015A, 200);
    assert_eq!(gb.mmu.read(0xC000), 55);
}

#[test]
fn vblank_wins_over_timer_and_only_its_bit_clears() {
    let rom = RomBuilder::new()
        .program(&[
            0x3E, 0x05, // LD A,$05
            0xE0, 0xFF, // LDH ($FF),A
            0xE0, 0x0F, // LDH ($0F),A
            0xFB, // EI
            0x00, // NOP
            0x18, 0xFE, // JR -2
        ])
        .at(0x0040, &[0x18, 0xFE])
        .at(0x0050, &[0x18, 0xFE])
        .build();
    let mut gb = machine(rom);
    run_to(&mut gb, 0x0040, 100);
    assert_eq!(gb.mmu.read(0xFF0F) & 0x1F, 0x04);
    assert!(!gb.cpu.regs.ime);
    let sp = gb.cpu.regs.sp;
    assert_eq!(gb.mmu.read_word(sp), 0x0158, "EI takes effect after NOP");
}

#[test]
fn timer_overflow_wakes_halt_into_handler() {
    let rom = RomBuilder::new()
        .program(&[
            0x3E, 0x04, // LD A,$04
            0xE0, 0xFF, // LDH ($FF),A   IE = timer
            0xAF, // XOR A
            0xE0, 0x0F, // LDH ($0F),A   IF = 0
            0x3E, 0xF0, // LD A,$F0
            0xE0, 0x05, // LDH ($05),A   TIMA
            0xE0, 0x06, // LDH ($06),A   TMA
            0x3E, 0x05, // LD A,$05
            0xE0, 0x07, // LDH ($07),A   TAC: on, 16 cycles
            0xFB, // EI
            0x76, // HALT
            0x18, 0xFE, // JR -2
        ])
        .at(0x0050, &[0x18, 0xFE])
        .build();
    let mut gb = machine(rom);
    run_to(&mut gb, 0x0162, 100);
    assert!(gb.step().cycles > 0);
    assert!(gb.cpu.halted);

    run_to(&mut gb, 0x0050, 2000);
    assert!(!gb.cpu.halted);
    assert_eq!(gb.mmu.read(0xFF0F) & 0x04, 0);
    assert_eq!(gb.mmu.read_word(gb.cpu.regs.sp), 0x0163);
    // Reloaded from TMA.
    assert!(gb.mmu.read(0xFF05) >= 0xF0);
}

#[test]
fn serial_writes_are_captured() {
    let rom = RomBuilder::new()
        .program(&[
            0x3E, b'O', // LD A,'O'
            0xE0, 0x01, // LDH ($01),A
            0x3E, 0x81, // LD A,$81
            0xE0, 0x02, // LDH ($02),A
            0x3E, b'K', // LD A,'K'
            0xE0, 0x01, // LDH ($01),A
            0x3E, 0x81, // LD A,$81
            0xE0, 0x02, // LDH ($02),A
            0x18, 0xFE, // JR -2
        ])
        .build();
    let mut gb = machine(rom);
    run_to(&mut gb, 0x0160, 100);
    assert_eq!(gb.mmu.serial.take_output(), b"OK");
    assert!(gb.mmu.serial.peek_output().is_empty());
}

#[test]
fn joypad_state_reaches_p1() {
    let mut gb = machine(RomBuilder::new().build());
    let pad = gb.joypad();
    pad.press(Button::Start);
    pad.press(Button::Left);

    gb.mmu.write(0xFF00, 0x10);
    assert_eq!(gb.mmu.read(0xFF00) & 0x0F, 0x07, "action group");
    gb.mmu.write(0xFF00, 0x20);
    assert_eq!(gb.mmu.read(0xFF00) & 0x0F, 0x0D, "direction group");

    pad.release(Button::Left);
    assert_eq!(gb.mmu.read(0xFF00) & 0x0F, 0x0F);
}

#[test]
fn illegal_opcode_surfaces_as_fault() {
    let rom = RomBuilder::new().program(&[0x00, 0xDD]).build();
    let mut gb = machine(rom);
    run_to(&mut gb, 0x0151, 10);
    gb.step();
    assert!(gb.cpu.locked);
    let fault = gb.take_fault().map(|e| e.to_string());
    assert_eq!(fault.as_deref(), Some("illegal opcode 0xDD at 0x0151"));

    // Locked up, but time keeps moving.
    let before = gb.cpu.cycles;
    gb.step();
    assert_eq!(gb.pc(), 0x0152);
    assert!(gb.cpu.cycles > before);
}
