//! Flag-setting arithmetic shared by the base and CB-prefixed tables.

use super::registers::{FLAG_C, FLAG_H, FLAG_N, FLAG_Z, RegisterBank};

/// 8-bit add, optionally with carry in.
pub fn add(r: &mut RegisterBank, a: u8, b: u8, carry: bool) -> u8 {
    let c = u8::from(carry);
    let res = a.wrapping_add(b).wrapping_add(c);
    let half = (a & 0x0F) + (b & 0x0F) + c > 0x0F;
    let full = u16::from(a) + u16::from(b) + u16::from(c) > 0xFF;
    r.set_flags(res == 0, false, half, full);
    res
}

/// 8-bit subtract, optionally with borrow in.
pub fn sub(r: &mut RegisterBank, a: u8, b: u8, carry: bool) -> u8 {
    let c = u8::from(carry);
    let res = a.wrapping_sub(b).wrapping_sub(c);
    let half = (a & 0x0F) < (b & 0x0F) + c;
    let full = u16::from(a) < u16::from(b) + u16::from(c);
    r.set_flags(res == 0, true, half, full);
    res
}

pub fn and(r: &mut RegisterBank, a: u8, b: u8) -> u8 {
    let res = a & b;
    r.set_flags(res == 0, false, true, false);
    res
}

pub fn xor(r: &mut RegisterBank, a: u8, b: u8) -> u8 {
    let res = a ^ b;
    r.set_flags(res == 0, false, false, false);
    res
}

pub fn or(r: &mut RegisterBank, a: u8, b: u8) -> u8 {
    let res = a | b;
    r.set_flags(res == 0, false, false, false);
    res
}

/// Apply ALU operation `op` (bits 3-5 of the opcode) to A.
/// 0 ADD, 1 ADC, 2 SUB, 3 SBC, 4 AND, 5 XOR, 6 OR, 7 CP.
pub fn accumulate(r: &mut RegisterBank, op: u8, val: u8) {
    let a = r.a;
    let carry = r.flag(FLAG_C);
    r.a = match op & 7 {
        0 => add(r, a, val, false),
        1 => add(r, a, val, carry),
        2 => sub(r, a, val, false),
        3 => sub(r, a, val, carry),
        4 => and(r, a, val),
        5 => xor(r, a, val),
        6 => or(r, a, val),
        _ => {
            sub(r, a, val, false);
            a
        }
    };
}

/// INC r: carry is preserved.
pub fn inc(r: &mut RegisterBank, v: u8) -> u8 {
    let res = v.wrapping_add(1);
    let c = r.flag(FLAG_C);
    r.set_flags(res == 0, false, v & 0x0F == 0x0F, c);
    res
}

/// DEC r: carry is preserved.
pub fn dec(r: &mut RegisterBank, v: u8) -> u8 {
    let res = v.wrapping_sub(1);
    let c = r.flag(FLAG_C);
    r.set_flags(res == 0, true, v & 0x0F == 0, c);
    res
}

/// ADD HL,rr: zero is preserved, carries come from bits 11 and 15.
pub fn add16(r: &mut RegisterBank, a: u16, b: u16) -> u16 {
    let res = a.wrapping_add(b);
    let z = r.flag(FLAG_Z);
    let half = (a & 0x0FFF) + (b & 0x0FFF) > 0x0FFF;
    let full = u32::from(a) + u32::from(b) > 0xFFFF;
    r.set_flags(z, false, half, full);
    res
}

/// SP plus a signed offset, as used by ADD SP,e8 and LD HL,SP+e8.
/// Flags come from the unsigned low-byte addition.
pub fn add_sp(r: &mut RegisterBank, sp: u16, offset: i8) -> u16 {
    let e = offset as u8;
    let half = (sp & 0x0F) + u16::from(e & 0x0F) > 0x0F;
    let full = (sp & 0xFF) + u16::from(e) > 0xFF;
    r.set_flags(false, false, half, full);
    sp.wrapping_add_signed(i16::from(offset))
}

/// Decimal-adjust A after a BCD add or subtract.
pub fn daa(r: &mut RegisterBank) {
    let mut a = r.a;
    let mut carry = r.flag(FLAG_C);
    if r.flag(FLAG_N) {
        if carry {
            a = a.wrapping_sub(0x60);
        }
        if r.flag(FLAG_H) {
            a = a.wrapping_sub(0x06);
        }
    } else {
        if carry || a > 0x99 {
            a = a.wrapping_add(0x60);
            carry = true;
        }
        if r.flag(FLAG_H) || a & 0x0F > 0x09 {
            a = a.wrapping_add(0x06);
        }
    }
    r.a = a;
    let n = r.flag(FLAG_N);
    r.set_flags(a == 0, n, false, carry);
}

pub fn cpl(r: &mut RegisterBank) {
    r.a = !r.a;
    r.f |= FLAG_N | FLAG_H;
}

pub fn scf(r: &mut RegisterBank) {
    let z = r.flag(FLAG_Z);
    r.set_flags(z, false, false, true);
}

pub fn ccf(r: &mut RegisterBank) {
    let z = r.flag(FLAG_Z);
    let c = r.flag(FLAG_C);
    r.set_flags(z, false, false, !c);
}

fn shifted(r: &mut RegisterBank, res: u8, carry: bool) -> u8 {
    r.set_flags(res == 0, false, false, carry);
    res
}

/// CB shift/rotate group by index (bits 3-5 of the CB opcode):
/// 0 RLC, 1 RRC, 2 RL, 3 RR, 4 SLA, 5 SRA, 6 SWAP, 7 SRL.
pub fn shift(r: &mut RegisterBank, op: u8, v: u8) -> u8 {
    let carry_in = u8::from(r.flag(FLAG_C));
    match op & 7 {
        0 => shifted(r, v.rotate_left(1), v & 0x80 != 0),
        1 => shifted(r, v.rotate_right(1), v & 0x01 != 0),
        2 => shifted(r, (v << 1) | carry_in, v & 0x80 != 0),
        3 => shifted(r, (v >> 1) | (carry_in << 7), v & 0x01 != 0),
        4 => shifted(r, v << 1, v & 0x80 != 0),
        5 => shifted(r, (v >> 1) | (v & 0x80), v & 0x01 != 0),
        6 => shifted(r, v.rotate_left(4), false),
        _ => shifted(r, v >> 1, v & 0x01 != 0),
    }
}

/// RLCA/RRCA/RLA/RRA: like the CB forms but Z is always cleared.
pub fn rotate_a(r: &mut RegisterBank, op: u8) {
    let a = r.a;
    r.a = shift(r, op, a);
    r.f &= !FLAG_Z;
}

/// BIT n: Z reflects the tested bit, carry is preserved.
pub fn bit(r: &mut RegisterBank, n: u8, v: u8) {
    let c = r.flag(FLAG_C);
    r.set_flags(v & (1 << (n & 7)) == 0, false, true, c);
}
