use crate::hardware::Model;

// CPU flag bits as documented in gbdev.io/pandocs/The_CPU_Flags.html
pub const FLAG_Z: u8 = 0x80; // Zero
pub const FLAG_N: u8 = 0x40; // Subtract
pub const FLAG_H: u8 = 0x20; // Half Carry
pub const FLAG_C: u8 = 0x10; // Carry

// Post-boot CPU state from gbdev.io/pandocs/Power_Up_State.html
const BOOT_PC: u16 = 0x0100;
const BOOT_SP: u16 = 0xFFFE;

/// The eight 8-bit registers, PC, SP and the interrupt-master-enable state.
///
/// The 16-bit pairs are views over the 8-bit fields. F keeps its low
/// nibble clear.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegisterBank {
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub pc: u16,
    pub sp: u16,
    pub ime: bool,
    /// EI executed; IME turns on after the next instruction.
    pub ime_pending: bool,
}

impl RegisterBank {
    /// Register contents left behind by the boot ROM.
    pub fn post_boot(model: Model) -> Self {
        let mut regs = Self {
            pc: BOOT_PC,
            sp: BOOT_SP,
            ..Default::default()
        };
        match model {
            Model::Dmg => {
                regs.set_af(0x01B0);
                regs.set_bc(0x0013);
                regs.set_de(0x00D8);
                regs.set_hl(0x014D);
            }
            Model::Cgb => {
                regs.set_af(0x1180);
                regs.set_bc(0x0000);
                regs.set_de(0xFF56);
                regs.set_hl(0x000D);
            }
        }
        regs
    }

    #[inline]
    pub fn af(&self) -> u16 {
        u16::from_be_bytes([self.a, self.f])
    }

    #[inline]
    pub fn bc(&self) -> u16 {
        u16::from_be_bytes([self.b, self.c])
    }

    #[inline]
    pub fn de(&self) -> u16 {
        u16::from_be_bytes([self.d, self.e])
    }

    #[inline]
    pub fn hl(&self) -> u16 {
        u16::from_be_bytes([self.h, self.l])
    }

    #[inline]
    pub fn set_af(&mut self, val: u16) {
        let [a, f] = val.to_be_bytes();
        self.a = a;
        self.f = f & 0xF0;
    }

    #[inline]
    pub fn set_bc(&mut self, val: u16) {
        [self.b, self.c] = val.to_be_bytes();
    }

    #[inline]
    pub fn set_de(&mut self, val: u16) {
        [self.d, self.e] = val.to_be_bytes();
    }

    #[inline]
    pub fn set_hl(&mut self, val: u16) {
        [self.h, self.l] = val.to_be_bytes();
    }

    #[inline]
    pub fn flag(&self, mask: u8) -> bool {
        self.f & mask != 0
    }

    #[inline]
    pub fn set_flag(&mut self, mask: u8, on: bool) {
        if on {
            self.f |= mask;
        } else {
            self.f &= !mask;
        }
    }

    /// Replace all four flags.
    #[inline]
    pub fn set_flags(&mut self, z: bool, n: bool, h: bool, c: bool) {
        self.f = u8::from(z) << 7 | u8::from(n) << 6 | u8::from(h) << 5 | u8::from(c) << 4;
    }

    /// 8-bit register by operand index: B C D E H L - A. Index 6 is (HL)
    /// and is not a register.
    pub fn r8(&self, index: u8) -> u8 {
        match index & 7 {
            0 => self.b,
            1 => self.c,
            2 => self.d,
            3 => self.e,
            4 => self.h,
            5 => self.l,
            7 => self.a,
            _ => 0xFF,
        }
    }

    pub fn set_r8(&mut self, index: u8, val: u8) {
        match index & 7 {
            0 => self.b = val,
            1 => self.c = val,
            2 => self.d = val,
            3 => self.e = val,
            4 => self.h = val,
            5 => self.l = val,
            7 => self.a = val,
            _ => {}
        }
    }

    /// 16-bit pair by operand index: BC DE HL SP.
    pub fn r16(&self, index: u8) -> u16 {
        match index & 3 {
            0 => self.bc(),
            1 => self.de(),
            2 => self.hl(),
            _ => self.sp,
        }
    }

    pub fn set_r16(&mut self, index: u8, val: u16) {
        match index & 3 {
            0 => self.set_bc(val),
            1 => self.set_de(val),
            2 => self.set_hl(val),
            _ => self.sp = val,
        }
    }

    /// Branch condition by operand index: NZ Z NC C.
    pub fn condition(&self, index: u8) -> bool {
        match index & 3 {
            0 => !self.flag(FLAG_Z),
            1 => self.flag(FLAG_Z),
            2 => !self.flag(FLAG_C),
            _ => self.flag(FLAG_C),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_track_halves() {
        let mut r = RegisterBank::default();
        r.set_bc(0x1234);
        assert_eq!((r.b, r.c), (0x12, 0x34));
        r.l = 0xCD;
        r.h = 0xAB;
        assert_eq!(r.hl(), 0xABCD);
    }

    #[test]
    fn f_low_nibble_stays_clear() {
        let mut r = RegisterBank::default();
        r.set_af(0xFFFF);
        assert_eq!(r.af(), 0xFFF0);
    }

    #[test]
    fn post_boot_values() {
        let dmg = RegisterBank::post_boot(Model::Dmg);
        assert_eq!(
            (dmg.af(), dmg.bc(), dmg.de(), dmg.hl(), dmg.pc, dmg.sp),
            (0x01B0, 0x0013, 0x00D8, 0x014D, 0x0100, 0xFFFE)
        );
        let cgb = RegisterBank::post_boot(Model::Cgb);
        assert_eq!(
            (cgb.af(), cgb.bc(), cgb.de(), cgb.hl()),
            (0x1180, 0x0000, 0xFF56, 0x000D)
        );
    }

    #[test]
    fn conditions_follow_flags() {
        let mut r = RegisterBank::default();
        r.set_flags(true, false, false, false);
        assert!(!r.condition(0));
        assert!(r.condition(1));
        assert!(r.condition(2));
        assert!(!r.condition(3));
    }
}
