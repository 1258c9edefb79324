//! Opcode tables and the operations they dispatch to.
//!
//! Both tables are indexed `[code >> 3][code & 7]`, which lines the rows up
//! with the octal structure of the encoding: register operands come from
//! bits 0-2 and 3-5, register pairs from bits 4-5, conditions from bits 3-4.

use log::warn;

use super::Cpu;
use super::alu;
use super::instruction::{Instruction, Opcode, Outcome};
use crate::error::EmuError;
use crate::mmu::Mmu;

/// Operand index of the `(HL)` pseudo-register.
const HL_IND: u8 = 6;

macro_rules! op {
    ($m:expr, $len:literal, $cyc:literal / $alt:literal, $f:ident) => {
        Opcode {
            mnemonic: $m,
            operand_len: $len,
            cycles: $cyc,
            cycles_untaken: $alt,
            exec: $f,
        }
    };
    ($m:expr, $len:literal, $cyc:literal, $f:ident) => {
        op!($m, $len, $cyc / $cyc, $f)
    };
}

/// `LD dst,r` for all eight sources.
macro_rules! ld_row {
    ($dst:literal) => {
        [
            op!(concat!("LD ", $dst, ",B"), 0, 4, ld_r_r),
            op!(concat!("LD ", $dst, ",C"), 0, 4, ld_r_r),
            op!(concat!("LD ", $dst, ",D"), 0, 4, ld_r_r),
            op!(concat!("LD ", $dst, ",E"), 0, 4, ld_r_r),
            op!(concat!("LD ", $dst, ",H"), 0, 4, ld_r_r),
            op!(concat!("LD ", $dst, ",L"), 0, 4, ld_r_r),
            op!(concat!("LD ", $dst, ",(HL)"), 0, 8, ld_r_r),
            op!(concat!("LD ", $dst, ",A"), 0, 4, ld_r_r),
        ]
    };
}

/// One ALU operation against all eight sources.
macro_rules! alu_row {
    ($prefix:literal) => {
        [
            op!(concat!($prefix, "B"), 0, 4, alu_r),
            op!(concat!($prefix, "C"), 0, 4, alu_r),
            op!(concat!($prefix, "D"), 0, 4, alu_r),
            op!(concat!($prefix, "E"), 0, 4, alu_r),
            op!(concat!($prefix, "H"), 0, 4, alu_r),
            op!(concat!($prefix, "L"), 0, 4, alu_r),
            op!(concat!($prefix, "(HL)"), 0, 8, alu_r),
            op!(concat!($prefix, "A"), 0, 4, alu_r),
        ]
    };
}

/// One CB operation against all eight targets.
macro_rules! cb_row {
    ($prefix:literal, $hl:literal, $f:ident) => {
        [
            op!(concat!($prefix, "B"), 0, 8, $f),
            op!(concat!($prefix, "C"), 0, 8, $f),
            op!(concat!($prefix, "D"), 0, 8, $f),
            op!(concat!($prefix, "E"), 0, 8, $f),
            op!(concat!($prefix, "H"), 0, 8, $f),
            op!(concat!($prefix, "L"), 0, 8, $f),
            op!(concat!($prefix, "(HL)"), 0, $hl, $f),
            op!(concat!($prefix, "A"), 0, 8, $f),
        ]
    };
}

#[rustfmt::skip]
static BASE: [[Opcode; 8]; 32] = [
    [
        op!("NOP", 0, 4, nop),
        op!("LD BC,d16", 2, 12, ld_rr_d16),
        op!("LD (BC),A", 0, 8, ld_ind_a),
        op!("INC BC", 0, 8, inc_rr),
        op!("INC B", 0, 4, inc_r),
        op!("DEC B", 0, 4, dec_r),
        op!("LD B,d8", 1, 8, ld_r_d8),
        op!("RLCA", 0, 4, rotate_a),
    ],
    [
        op!("LD (a16),SP", 2, 20, ld_a16_sp),
        op!("ADD HL,BC", 0, 8, add_hl_rr),
        op!("LD A,(BC)", 0, 8, ld_a_ind),
        op!("DEC BC", 0, 8, dec_rr),
        op!("INC C", 0, 4, inc_r),
        op!("DEC C", 0, 4, dec_r),
        op!("LD C,d8", 1, 8, ld_r_d8),
        op!("RRCA", 0, 4, rotate_a),
    ],
    [
        op!("STOP", 1, 4, stop),
        op!("LD DE,d16", 2, 12, ld_rr_d16),
        op!("LD (DE),A", 0, 8, ld_ind_a),
        op!("INC DE", 0, 8, inc_rr),
        op!("INC D", 0, 4, inc_r),
        op!("DEC D", 0, 4, dec_r),
        op!("LD D,d8", 1, 8, ld_r_d8),
        op!("RLA", 0, 4, rotate_a),
    ],
    [
        op!("JR r8", 1, 12, jr),
        op!("ADD HL,DE", 0, 8, add_hl_rr),
        op!("LD A,(DE)", 0, 8, ld_a_ind),
        op!("DEC DE", 0, 8, dec_rr),
        op!("INC E", 0, 4, inc_r),
        op!("DEC E", 0, 4, dec_r),
        op!("LD E,d8", 1, 8, ld_r_d8),
        op!("RRA", 0, 4, rotate_a),
    ],
    [
        op!("JR NZ,r8", 1, 12 / 8, jr_cc),
        op!("LD HL,d16", 2, 12, ld_rr_d16),
        op!("LD (HL+),A", 0, 8, ld_ind_a),
        op!("INC HL", 0, 8, inc_rr),
        op!("INC H", 0, 4, inc_r),
        op!("DEC H", 0, 4, dec_r),
        op!("LD H,d8", 1, 8, ld_r_d8),
        op!("DAA", 0, 4, daa),
    ],
    [
        op!("JR Z,r8", 1, 12 / 8, jr_cc),
        op!("ADD HL,HL", 0, 8, add_hl_rr),
        op!("LD A,(HL+)", 0, 8, ld_a_ind),
        op!("DEC HL", 0, 8, dec_rr),
        op!("INC L", 0, 4, inc_r),
        op!("DEC L", 0, 4, dec_r),
        op!("LD L,d8", 1, 8, ld_r_d8),
        op!("CPL", 0, 4, cpl),
    ],
    [
        op!("JR NC,r8", 1, 12 / 8, jr_cc),
        op!("LD SP,d16", 2, 12, ld_rr_d16),
        op!("LD (HL-),A", 0, 8, ld_ind_a),
        op!("INC SP", 0, 8, inc_rr),
        op!("INC (HL)", 0, 12, inc_r),
        op!("DEC (HL)", 0, 12, dec_r),
        op!("LD (HL),d8", 1, 12, ld_r_d8),
        op!("SCF", 0, 4, scf),
    ],
    [
        op!("JR C,r8", 1, 12 / 8, jr_cc),
        op!("ADD HL,SP", 0, 8, add_hl_rr),
        op!("LD A,(HL-)", 0, 8, ld_a_ind),
        op!("DEC SP", 0, 8, dec_rr),
        op!("INC A", 0, 4, inc_r),
        op!("DEC A", 0, 4, dec_r),
        op!("LD A,d8", 1, 8, ld_r_d8),
        op!("CCF", 0, 4, ccf),
    ],
    ld_row!("B"),
    ld_row!("C"),
    ld_row!("D"),
    ld_row!("E"),
    ld_row!("H"),
    ld_row!("L"),
    [
        op!("LD (HL),B", 0, 8, ld_r_r),
        op!("LD (HL),C", 0, 8, ld_r_r),
        op!("LD (HL),D", 0, 8, ld_r_r),
        op!("LD (HL),E", 0, 8, ld_r_r),
        op!("LD (HL),H", 0, 8, ld_r_r),
        op!("LD (HL),L", 0, 8, ld_r_r),
        op!("HALT", 0, 4, halt),
        op!("LD (HL),A", 0, 8, ld_r_r),
    ],
    ld_row!("A"),
    alu_row!("ADD A,"),
    alu_row!("ADC A,"),
    alu_row!("SUB "),
    alu_row!("SBC A,"),
    alu_row!("AND "),
    alu_row!("XOR "),
    alu_row!("OR "),
    alu_row!("CP "),
    [
        op!("RET NZ", 0, 20 / 8, ret_cc),
        op!("POP BC", 0, 12, pop),
        op!("JP NZ,a16", 2, 16 / 12, jp_cc),
        op!("JP a16", 2, 16, jp),
        op!("CALL NZ,a16", 2, 24 / 12, call_cc),
        op!("PUSH BC", 0, 16, push),
        op!("ADD A,d8", 1, 8, alu_d8),
        op!("RST 00H", 0, 16, rst),
    ],
    [
        op!("RET Z", 0, 20 / 8, ret_cc),
        op!("RET", 0, 16, ret),
        op!("JP Z,a16", 2, 16 / 12, jp_cc),
        op!("PREFIX CB", 0, 4, prefix),
        op!("CALL Z,a16", 2, 24 / 12, call_cc),
        op!("CALL a16", 2, 24, call),
        op!("ADC A,d8", 1, 8, alu_d8),
        op!("RST 08H", 0, 16, rst),
    ],
    [
        op!("RET NC", 0, 20 / 8, ret_cc),
        op!("POP DE", 0, 12, pop),
        op!("JP NC,a16", 2, 16 / 12, jp_cc),
        op!("ILLEGAL_D3", 0, 4, illegal),
        op!("CALL NC,a16", 2, 24 / 12, call_cc),
        op!("PUSH DE", 0, 16, push),
        op!("SUB d8", 1, 8, alu_d8),
        op!("RST 10H", 0, 16, rst),
    ],
    [
        op!("RET C", 0, 20 / 8, ret_cc),
        op!("RETI", 0, 16, reti),
        op!("JP C,a16", 2, 16 / 12, jp_cc),
        op!("ILLEGAL_DB", 0, 4, illegal),
        op!("CALL C,a16", 2, 24 / 12, call_cc),
        op!("ILLEGAL_DD", 0, 4, illegal),
        op!("SBC A,d8", 1, 8, alu_d8),
        op!("RST 18H", 0, 16, rst),
    ],
    [
        op!("LDH (a8),A", 1, 12, ldh_a8_a),
        op!("POP HL", 0, 12, pop),
        op!("LD (C),A", 0, 8, ld_c_a),
        op!("ILLEGAL_E3", 0, 4, illegal),
        op!("ILLEGAL_E4", 0, 4, illegal),
        op!("PUSH HL", 0, 16, push),
        op!("AND d8", 1, 8, alu_d8),
        op!("RST 20H", 0, 16, rst),
    ],
    [
        op!("ADD SP,e8", 1, 16, add_sp_e8),
        op!("JP HL", 0, 4, jp_hl),
        op!("LD (a16),A", 2, 16, ld_a16_a),
        op!("ILLEGAL_EB", 0, 4, illegal),
        op!("ILLEGAL_EC", 0, 4, illegal),
        op!("ILLEGAL_ED", 0, 4, illegal),
        op!("XOR d8", 1, 8, alu_d8),
        op!("RST 28H", 0, 16, rst),
    ],
    [
        op!("LDH A,(a8)", 1, 12, ldh_a_a8),
        op!("POP AF", 0, 12, pop),
        op!("LD A,(C)", 0, 8, ld_a_c),
        op!("DI", 0, 4, di),
        op!("ILLEGAL_F4", 0, 4, illegal),
        op!("PUSH AF", 0, 16, push),
        op!("OR d8", 1, 8, alu_d8),
        op!("RST 30H", 0, 16, rst),
    ],
    [
        op!("LD HL,SP+e8", 1, 12, ld_hl_sp_e8),
        op!("LD SP,HL", 0, 8, ld_sp_hl),
        op!("LD A,(a16)", 2, 16, ld_a_a16),
        op!("EI", 0, 4, ei),
        op!("ILLEGAL_FC", 0, 4, illegal),
        op!("ILLEGAL_FD", 0, 4, illegal),
        op!("CP d8", 1, 8, alu_d8),
        op!("RST 38H", 0, 16, rst),
    ],
];

static CB: [[Opcode; 8]; 32] = [
    cb_row!("RLC ", 16, cb_shift),
    cb_row!("RRC ", 16, cb_shift),
    cb_row!("RL ", 16, cb_shift),
    cb_row!("RR ", 16, cb_shift),
    cb_row!("SLA ", 16, cb_shift),
    cb_row!("SRA ", 16, cb_shift),
    cb_row!("SWAP ", 16, cb_shift),
    cb_row!("SRL ", 16, cb_shift),
    cb_row!("BIT 0,", 12, cb_bit),
    cb_row!("BIT 1,", 12, cb_bit),
    cb_row!("BIT 2,", 12, cb_bit),
    cb_row!("BIT 3,", 12, cb_bit),
    cb_row!("BIT 4,", 12, cb_bit),
    cb_row!("BIT 5,", 12, cb_bit),
    cb_row!("BIT 6,", 12, cb_bit),
    cb_row!("BIT 7,", 12, cb_bit),
    cb_row!("RES 0,", 16, cb_res),
    cb_row!("RES 1,", 16, cb_res),
    cb_row!("RES 2,", 16, cb_res),
    cb_row!("RES 3,", 16, cb_res),
    cb_row!("RES 4,", 16, cb_res),
    cb_row!("RES 5,", 16, cb_res),
    cb_row!("RES 6,", 16, cb_res),
    cb_row!("RES 7,", 16, cb_res),
    cb_row!("SET 0,", 16, cb_set),
    cb_row!("SET 1,", 16, cb_set),
    cb_row!("SET 2,", 16, cb_set),
    cb_row!("SET 3,", 16, cb_set),
    cb_row!("SET 4,", 16, cb_set),
    cb_row!("SET 5,", 16, cb_set),
    cb_row!("SET 6,", 16, cb_set),
    cb_row!("SET 7,", 16, cb_set),
];

/// Descriptor for an unprefixed opcode.
#[inline]
pub fn base(code: u8) -> &'static Opcode {
    &BASE[(code >> 3) as usize][(code & 7) as usize]
}

/// Descriptor for a CB-prefixed opcode.
#[inline]
pub fn cb(code: u8) -> &'static Opcode {
    &CB[(code >> 3) as usize][(code & 7) as usize]
}

#[inline]
fn dst(code: u8) -> u8 {
    (code >> 3) & 7
}

#[inline]
fn src(code: u8) -> u8 {
    code & 7
}

#[inline]
fn pair(code: u8) -> u8 {
    (code >> 4) & 3
}

#[inline]
fn cond(code: u8) -> u8 {
    (code >> 3) & 3
}

fn read_r8(cpu: &Cpu, mmu: &mut Mmu, index: u8) -> u8 {
    if index == HL_IND {
        mmu.read(cpu.regs.hl())
    } else {
        cpu.regs.r8(index)
    }
}

fn write_r8(cpu: &mut Cpu, mmu: &mut Mmu, index: u8, val: u8) {
    if index == HL_IND {
        mmu.write(cpu.regs.hl(), val);
    } else {
        cpu.regs.set_r8(index, val);
    }
}

fn push_word(cpu: &mut Cpu, mmu: &mut Mmu, val: u16) {
    let [lo, hi] = val.to_le_bytes();
    cpu.regs.sp = cpu.regs.sp.wrapping_sub(1);
    mmu.write(cpu.regs.sp, hi);
    cpu.regs.sp = cpu.regs.sp.wrapping_sub(1);
    mmu.write(cpu.regs.sp, lo);
}

fn pop_word(cpu: &mut Cpu, mmu: &mut Mmu) -> u16 {
    let lo = mmu.read(cpu.regs.sp);
    cpu.regs.sp = cpu.regs.sp.wrapping_add(1);
    let hi = mmu.read(cpu.regs.sp);
    cpu.regs.sp = cpu.regs.sp.wrapping_add(1);
    u16::from_le_bytes([lo, hi])
}

/// Push the return address and jump; shared with interrupt dispatch.
pub(super) fn call_to(cpu: &mut Cpu, mmu: &mut Mmu, target: u16) {
    let ret = cpu.regs.pc;
    push_word(cpu, mmu, ret);
    cpu.regs.pc = target;
}

/// Address for the `(BC)`, `(DE)`, `(HL+)`, `(HL-)` forms, applying the
/// HL post-increment or decrement.
fn indirect(cpu: &mut Cpu, code: u8) -> u16 {
    match pair(code) {
        0 => cpu.regs.bc(),
        1 => cpu.regs.de(),
        2 => {
            let hl = cpu.regs.hl();
            cpu.regs.set_hl(hl.wrapping_add(1));
            hl
        }
        _ => {
            let hl = cpu.regs.hl();
            cpu.regs.set_hl(hl.wrapping_sub(1));
            hl
        }
    }
}

fn nop(_: &mut Cpu, _: &mut Mmu, _: &Instruction) -> Outcome {
    Outcome::Done
}

fn prefix(_: &mut Cpu, _: &mut Mmu, _: &Instruction) -> Outcome {
    // Never dispatched: the fetch consumes the prefix byte.
    Outcome::Done
}

fn illegal(cpu: &mut Cpu, mmu: &mut Mmu, ins: &Instruction) -> Outcome {
    let fault = EmuError::IllegalOpcode {
        opcode: ins.code,
        addr: ins.addr,
    };
    warn!("{fault}, CPU locked up");
    cpu.locked = true;
    mmu.record_fault(fault);
    Outcome::Done
}

fn ld_rr_d16(cpu: &mut Cpu, _: &mut Mmu, ins: &Instruction) -> Outcome {
    cpu.regs.set_r16(pair(ins.code), ins.d16());
    Outcome::Done
}

fn ld_ind_a(cpu: &mut Cpu, mmu: &mut Mmu, ins: &Instruction) -> Outcome {
    let addr = indirect(cpu, ins.code);
    mmu.write(addr, cpu.regs.a);
    Outcome::Done
}

fn ld_a_ind(cpu: &mut Cpu, mmu: &mut Mmu, ins: &Instruction) -> Outcome {
    let addr = indirect(cpu, ins.code);
    cpu.regs.a = mmu.read(addr);
    Outcome::Done
}

fn inc_rr(cpu: &mut Cpu, _: &mut Mmu, ins: &Instruction) -> Outcome {
    let p = pair(ins.code);
    cpu.regs.set_r16(p, cpu.regs.r16(p).wrapping_add(1));
    Outcome::Done
}

fn dec_rr(cpu: &mut Cpu, _: &mut Mmu, ins: &Instruction) -> Outcome {
    let p = pair(ins.code);
    cpu.regs.set_r16(p, cpu.regs.r16(p).wrapping_sub(1));
    Outcome::Done
}

fn inc_r(cpu: &mut Cpu, mmu: &mut Mmu, ins: &Instruction) -> Outcome {
    let r = dst(ins.code);
    let v = read_r8(cpu, mmu, r);
    let v = alu::inc(&mut cpu.regs, v);
    write_r8(cpu, mmu, r, v);
    Outcome::Done
}

fn dec_r(cpu: &mut Cpu, mmu: &mut Mmu, ins: &Instruction) -> Outcome {
    let r = dst(ins.code);
    let v = read_r8(cpu, mmu, r);
    let v = alu::dec(&mut cpu.regs, v);
    write_r8(cpu, mmu, r, v);
    Outcome::Done
}

fn ld_r_d8(cpu: &mut Cpu, mmu: &mut Mmu, ins: &Instruction) -> Outcome {
    write_r8(cpu, mmu, dst(ins.code), ins.d8());
    Outcome::Done
}

fn rotate_a(cpu: &mut Cpu, _: &mut Mmu, ins: &Instruction) -> Outcome {
    // 07 0F 17 1F line up with RLC RRC RL RR.
    alu::rotate_a(&mut cpu.regs, dst(ins.code));
    Outcome::Done
}

fn ld_a16_sp(cpu: &mut Cpu, mmu: &mut Mmu, ins: &Instruction) -> Outcome {
    mmu.write_word(ins.d16(), cpu.regs.sp);
    Outcome::Done
}

fn add_hl_rr(cpu: &mut Cpu, _: &mut Mmu, ins: &Instruction) -> Outcome {
    let hl = cpu.regs.hl();
    let rr = cpu.regs.r16(pair(ins.code));
    let res = alu::add16(&mut cpu.regs, hl, rr);
    cpu.regs.set_hl(res);
    Outcome::Done
}

fn stop(cpu: &mut Cpu, mmu: &mut Mmu, _: &Instruction) -> Outcome {
    mmu.timer.set_div(0);
    if !mmu.switch_speed() {
        cpu.stopped = true;
    }
    Outcome::Done
}

fn jump_relative(cpu: &mut Cpu, ins: &Instruction) {
    cpu.regs.pc = cpu.regs.pc.wrapping_add_signed(i16::from(ins.e8()));
}

fn jr(cpu: &mut Cpu, _: &mut Mmu, ins: &Instruction) -> Outcome {
    jump_relative(cpu, ins);
    Outcome::Done
}

fn jr_cc(cpu: &mut Cpu, _: &mut Mmu, ins: &Instruction) -> Outcome {
    if !cpu.regs.condition(cond(ins.code)) {
        return Outcome::NotTaken;
    }
    jump_relative(cpu, ins);
    Outcome::Done
}

fn daa(cpu: &mut Cpu, _: &mut Mmu, _: &Instruction) -> Outcome {
    alu::daa(&mut cpu.regs);
    Outcome::Done
}

fn cpl(cpu: &mut Cpu, _: &mut Mmu, _: &Instruction) -> Outcome {
    alu::cpl(&mut cpu.regs);
    Outcome::Done
}

fn scf(cpu: &mut Cpu, _: &mut Mmu, _: &Instruction) -> Outcome {
    alu::scf(&mut cpu.regs);
    Outcome::Done
}

fn ccf(cpu: &mut Cpu, _: &mut Mmu, _: &Instruction) -> Outcome {
    alu::ccf(&mut cpu.regs);
    Outcome::Done
}

fn ld_r_r(cpu: &mut Cpu, mmu: &mut Mmu, ins: &Instruction) -> Outcome {
    let v = read_r8(cpu, mmu, src(ins.code));
    write_r8(cpu, mmu, dst(ins.code), v);
    Outcome::Done
}

fn halt(cpu: &mut Cpu, _: &mut Mmu, _: &Instruction) -> Outcome {
    cpu.halted = true;
    Outcome::Done
}

fn alu_r(cpu: &mut Cpu, mmu: &mut Mmu, ins: &Instruction) -> Outcome {
    let v = read_r8(cpu, mmu, src(ins.code));
    alu::accumulate(&mut cpu.regs, dst(ins.code), v);
    Outcome::Done
}

fn alu_d8(cpu: &mut Cpu, _: &mut Mmu, ins: &Instruction) -> Outcome {
    alu::accumulate(&mut cpu.regs, dst(ins.code), ins.d8());
    Outcome::Done
}

fn ret(cpu: &mut Cpu, mmu: &mut Mmu, _: &Instruction) -> Outcome {
    cpu.regs.pc = pop_word(cpu, mmu);
    Outcome::Done
}

fn ret_cc(cpu: &mut Cpu, mmu: &mut Mmu, ins: &Instruction) -> Outcome {
    if !cpu.regs.condition(cond(ins.code)) {
        return Outcome::NotTaken;
    }
    ret(cpu, mmu, ins)
}

fn reti(cpu: &mut Cpu, mmu: &mut Mmu, ins: &Instruction) -> Outcome {
    cpu.regs.ime = true;
    cpu.regs.ime_pending = false;
    ret(cpu, mmu, ins)
}

fn pop(cpu: &mut Cpu, mmu: &mut Mmu, ins: &Instruction) -> Outcome {
    let val = pop_word(cpu, mmu);
    match pair(ins.code) {
        3 => cpu.regs.set_af(val),
        p => cpu.regs.set_r16(p, val),
    }
    Outcome::Done
}

fn push(cpu: &mut Cpu, mmu: &mut Mmu, ins: &Instruction) -> Outcome {
    let val = match pair(ins.code) {
        3 => cpu.regs.af(),
        p => cpu.regs.r16(p),
    };
    push_word(cpu, mmu, val);
    Outcome::Done
}

fn jp(cpu: &mut Cpu, _: &mut Mmu, ins: &Instruction) -> Outcome {
    cpu.regs.pc = ins.d16();
    Outcome::Done
}

fn jp_cc(cpu: &mut Cpu, mmu: &mut Mmu, ins: &Instruction) -> Outcome {
    if !cpu.regs.condition(cond(ins.code)) {
        return Outcome::NotTaken;
    }
    jp(cpu, mmu, ins)
}

fn jp_hl(cpu: &mut Cpu, _: &mut Mmu, _: &Instruction) -> Outcome {
    cpu.regs.pc = cpu.regs.hl();
    Outcome::Done
}

fn call(cpu: &mut Cpu, mmu: &mut Mmu, ins: &Instruction) -> Outcome {
    call_to(cpu, mmu, ins.d16());
    Outcome::Done
}

fn call_cc(cpu: &mut Cpu, mmu: &mut Mmu, ins: &Instruction) -> Outcome {
    if !cpu.regs.condition(cond(ins.code)) {
        return Outcome::NotTaken;
    }
    call(cpu, mmu, ins)
}

fn rst(cpu: &mut Cpu, mmu: &mut Mmu, ins: &Instruction) -> Outcome {
    call_to(cpu, mmu, u16::from(ins.code & 0x38));
    Outcome::Done
}

fn ldh_a8_a(cpu: &mut Cpu, mmu: &mut Mmu, ins: &Instruction) -> Outcome {
    mmu.write(0xFF00 | u16::from(ins.d8()), cpu.regs.a);
    Outcome::Done
}

fn ldh_a_a8(cpu: &mut Cpu, mmu: &mut Mmu, ins: &Instruction) -> Outcome {
    cpu.regs.a = mmu.read(0xFF00 | u16::from(ins.d8()));
    Outcome::Done
}

fn ld_c_a(cpu: &mut Cpu, mmu: &mut Mmu, _: &Instruction) -> Outcome {
    mmu.write(0xFF00 | u16::from(cpu.regs.c), cpu.regs.a);
    Outcome::Done
}

fn ld_a_c(cpu: &mut Cpu, mmu: &mut Mmu, _: &Instruction) -> Outcome {
    cpu.regs.a = mmu.read(0xFF00 | u16::from(cpu.regs.c));
    Outcome::Done
}

fn add_sp_e8(cpu: &mut Cpu, _: &mut Mmu, ins: &Instruction) -> Outcome {
    let sp = cpu.regs.sp;
    cpu.regs.sp = alu::add_sp(&mut cpu.regs, sp, ins.e8());
    Outcome::Done
}

fn ld_hl_sp_e8(cpu: &mut Cpu, _: &mut Mmu, ins: &Instruction) -> Outcome {
    let sp = cpu.regs.sp;
    let hl = alu::add_sp(&mut cpu.regs, sp, ins.e8());
    cpu.regs.set_hl(hl);
    Outcome::Done
}

fn ld_sp_hl(cpu: &mut Cpu, _: &mut Mmu, _: &Instruction) -> Outcome {
    cpu.regs.sp = cpu.regs.hl();
    Outcome::Done
}

fn ld_a16_a(cpu: &mut Cpu, mmu: &mut Mmu, ins: &Instruction) -> Outcome {
    mmu.write(ins.d16(), cpu.regs.a);
    Outcome::Done
}

fn ld_a_a16(cpu: &mut Cpu, mmu: &mut Mmu, ins: &Instruction) -> Outcome {
    cpu.regs.a = mmu.read(ins.d16());
    Outcome::Done
}

fn di(cpu: &mut Cpu, _: &mut Mmu, _: &Instruction) -> Outcome {
    cpu.regs.ime = false;
    cpu.regs.ime_pending = false;
    Outcome::Done
}

fn ei(cpu: &mut Cpu, _: &mut Mmu, _: &Instruction) -> Outcome {
    if !cpu.regs.ime {
        cpu.regs.ime_pending = true;
    }
    Outcome::Done
}

fn cb_shift(cpu: &mut Cpu, mmu: &mut Mmu, ins: &Instruction) -> Outcome {
    let r = src(ins.code);
    let v = read_r8(cpu, mmu, r);
    let v = alu::shift(&mut cpu.regs, dst(ins.code), v);
    write_r8(cpu, mmu, r, v);
    Outcome::Done
}

fn cb_bit(cpu: &mut Cpu, mmu: &mut Mmu, ins: &Instruction) -> Outcome {
    let v = read_r8(cpu, mmu, src(ins.code));
    alu::bit(&mut cpu.regs, dst(ins.code), v);
    Outcome::Done
}

fn cb_res(cpu: &mut Cpu, mmu: &mut Mmu, ins: &Instruction) -> Outcome {
    let r = src(ins.code);
    let v = read_r8(cpu, mmu, r) & !(1 << dst(ins.code));
    write_r8(cpu, mmu, r, v);
    Outcome::Done
}

fn cb_set(cpu: &mut Cpu, mmu: &mut Mmu, ins: &Instruction) -> Outcome {
    let r = src(ins.code);
    let v = read_r8(cpu, mmu, r) | (1 << dst(ins.code));
    write_r8(cpu, mmu, r, v);
    Outcome::Done
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eleven_illegal_opcodes() {
        let illegal: Vec<u8> = (0..=255u8)
            .filter(|&c| base(c).mnemonic.starts_with("ILLEGAL"))
            .collect();
        assert_eq!(
            illegal,
            [0xD3, 0xDB, 0xDD, 0xE3, 0xE4, 0xEB, 0xEC, 0xED, 0xF4, 0xFC, 0xFD]
        );
    }

    #[test]
    fn table_rows_line_up_with_encoding() {
        assert_eq!(base(0x41).mnemonic, "LD B,C");
        assert_eq!(base(0x76).mnemonic, "HALT");
        assert_eq!(base(0x7E).mnemonic, "LD A,(HL)");
        assert_eq!(base(0x9F).mnemonic, "SBC A,A");
        assert_eq!(base(0xBE).mnemonic, "CP (HL)");
        assert_eq!(cb(0x37).mnemonic, "SWAP A");
        assert_eq!(cb(0x7E).mnemonic, "BIT 7,(HL)");
        assert_eq!(cb(0xC6).mnemonic, "SET 0,(HL)");
    }

    #[test]
    fn conditional_and_memory_timings() {
        let jr_nz = base(0x20);
        assert_eq!((jr_nz.cycles, jr_nz.cycles_untaken), (12, 8));
        let call_c = base(0xDC);
        assert_eq!((call_c.cycles, call_c.cycles_untaken), (24, 12));
        let ret_z = base(0xC8);
        assert_eq!((ret_z.cycles, ret_z.cycles_untaken), (20, 8));
        assert_eq!(cb(0x06).cycles, 16);
        assert_eq!(cb(0x46).cycles, 12);
        assert_eq!(cb(0x47).cycles, 8);
        assert_eq!(base(0x34).cycles, 12);
    }

    #[test]
    fn operand_lengths() {
        assert_eq!(base(0x10).operand_len, 1);
        assert_eq!(base(0x01).operand_len, 2);
        assert_eq!(base(0xE0).operand_len, 1);
        assert_eq!(base(0xEA).operand_len, 2);
        assert_eq!(base(0xE9).operand_len, 0);
    }
}
