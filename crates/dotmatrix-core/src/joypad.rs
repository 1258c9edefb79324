use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::interrupt::{Interrupt, InterruptLine};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Button {
    A,
    B,
    Select,
    Start,
    Right,
    Left,
    Up,
    Down,
}

impl Button {
    /// Bit in the packed pressed-state byte: low nibble action buttons,
    /// high nibble direction pad, both in P1 bit order.
    const fn mask(self) -> u8 {
        match self {
            Button::A => 0x01,
            Button::B => 0x02,
            Button::Select => 0x04,
            Button::Start => 0x08,
            Button::Right => 0x10,
            Button::Left => 0x20,
            Button::Up => 0x40,
            Button::Down => 0x80,
        }
    }
}

/// Host-side handle for feeding button state into a running machine.
#[derive(Clone, Debug, Default)]
pub struct JoypadHandle {
    pressed: Arc<AtomicU8>,
}

impl JoypadHandle {
    pub fn press(&self, button: Button) {
        self.pressed.fetch_or(button.mask(), Ordering::Relaxed);
    }

    pub fn release(&self, button: Button) {
        self.pressed.fetch_and(!button.mask(), Ordering::Relaxed);
    }

    pub fn set(&self, button: Button, down: bool) {
        if down {
            self.press(button);
        } else {
            self.release(button);
        }
    }

    fn load(&self) -> u8 {
        self.pressed.load(Ordering::Relaxed)
    }
}

/// P1/JOYP register.
pub struct Joypad {
    select: u8,
    pressed: u8,
    handle: JoypadHandle,
    irq: InterruptLine,
}

impl Joypad {
    pub fn new(irq: InterruptLine) -> Self {
        Self::with_handle(irq, JoypadHandle::default())
    }

    /// Joypad fed by an existing host handle.
    pub fn with_handle(irq: InterruptLine, handle: JoypadHandle) -> Self {
        Self {
            select: 0x30,
            pressed: 0,
            handle,
            irq,
        }
    }

    pub fn handle(&self) -> JoypadHandle {
        self.handle.clone()
    }

    /// Pull the latest host state, raising the joypad interrupt when a
    /// selected line goes low.
    pub fn sync(&mut self) {
        let before = self.lines();
        self.pressed = self.handle.load();
        let after = self.lines();
        if before & !after & 0x0F != 0 {
            self.irq.raise(Interrupt::Joypad);
        }
    }

    /// Whether any button is held, used to wake a stopped CPU.
    pub fn any_pressed(&self) -> bool {
        self.pressed != 0
    }

    pub fn read(&mut self) -> u8 {
        self.sync();
        0xC0 | self.select | self.lines()
    }

    pub fn write(&mut self, val: u8) {
        self.select = val & 0x30;
    }

    // Low nibble as seen on P1: a pressed button in a selected group reads 0.
    fn lines(&self) -> u8 {
        let mut low = 0x0F;
        if self.select & 0x10 == 0 {
            low &= !(self.pressed >> 4) & 0x0F;
        }
        if self.select & 0x20 == 0 {
            low &= !self.pressed & 0x0F;
        }
        low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interrupt::InterruptController;

    #[test]
    fn selected_group_reads_pressed_as_zero() {
        let ic = InterruptController::new();
        let mut pad = Joypad::new(ic.line());
        let handle = pad.handle();
        handle.press(Button::Start);
        handle.press(Button::Left);

        pad.write(0x10); // action buttons
        assert_eq!(pad.read(), 0xC0 | 0x10 | 0x07);
        pad.write(0x20); // direction pad
        assert_eq!(pad.read(), 0xC0 | 0x20 | 0x0D);
        pad.write(0x30);
        assert_eq!(pad.read(), 0xFF);
    }

    #[test]
    fn press_on_selected_line_raises_interrupt() {
        let ic = InterruptController::new();
        let mut pad = Joypad::new(ic.line());
        let handle = pad.handle();
        pad.write(0x20);
        handle.press(Button::Up);
        pad.sync();
        assert_eq!(ic.requested(), Interrupt::Joypad.mask());

        ic.write_if(0);
        pad.sync();
        assert_eq!(ic.requested(), 0);
    }
}
