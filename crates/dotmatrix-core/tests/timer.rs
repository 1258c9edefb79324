use dotmatrix_core::interrupt::{Interrupt, InterruptController};
use dotmatrix_core::timer::Timer;

fn timer() -> (Timer, InterruptController) {
    let irq = InterruptController::new();
    (Timer::new(irq.line()), irq)
}

#[test]
fn tima_advances_once_per_period() {
    for (tac, period) in [(0x04, 1024u32), (0x05, 16), (0x06, 64), (0x07, 256)] {
        let (mut t, _) = timer();
        t.write(0xFF07, tac);
        assert_eq!(t.period(), period);
        let n = period * 7 + period / 2;
        t.step_cycles(n);
        assert_eq!(u32::from(t.read(0xFF05)), n / period, "TAC {tac:#04X}");
        assert_eq!(u32::from(t.read(0xFF04)), n >> 8);
    }
}

#[test]
fn disabled_timer_leaves_tima_alone() {
    let (mut t, _) = timer();
    t.write(0xFF07, 0x01);
    t.step_cycles(4096);
    assert_eq!(t.read(0xFF05), 0);
    assert_eq!(t.read(0xFF04), 16);
}

#[test]
fn overflow_reloads_tma_and_interrupts_once() {
    let (mut t, irq) = timer();
    t.write(0xFF06, 0x80);
    t.write(0xFF05, 0xFE);
    t.write(0xFF07, 0x05);

    t.step_cycles(16);
    assert_eq!(t.read(0xFF05), 0xFF);
    assert_eq!(irq.requested() & Interrupt::Timer.mask(), 0);

    t.step_cycles(16);
    assert_eq!(t.read(0xFF05), 0x80);
    assert_ne!(irq.requested() & Interrupt::Timer.mask(), 0);

    irq.acknowledge(Interrupt::Timer);
    t.step_cycles(16 * 0x7F - 1);
    assert_eq!(t.read(0xFF05), 0xFE);
    assert_eq!(irq.requested() & Interrupt::Timer.mask(), 0);
}

#[test]
fn writing_div_resets_whole_counter() {
    let (mut t, _) = timer();
    t.step_cycles(0x1234);
    t.write(0xFF04, 0x99);
    assert_eq!(t.read(0xFF04), 0);
    t.step_cycles(255);
    assert_eq!(t.read(0xFF04), 0);
    t.step_cycles(1);
    assert_eq!(t.read(0xFF04), 1);
}
