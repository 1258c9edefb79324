mod common;

use std::thread;
use std::time::Duration;

use common::{FrameCapture, RomBuilder, machine};
use dotmatrix_core::joypad::Button;
use dotmatrix_core::scheduler::{BreakReason, Event, FramePacing, Scheduler};

const TIMEOUT: Duration = Duration::from_secs(5);

/// Polls P1 until Start is held, then sends 'S' over serial and spins.
fn wait_for_start() -> Vec<u8> {
    RomBuilder::new()
        .program(&[
            0x3E, 0x10, // LD A,$10
            0xE0, 0x00, // LDH ($00),A
            0xF0, 0x00, // LDH A,($00)
            0xE6, 0x08, // AND $08
            0x20, 0xFA, // JR NZ,-6
            0x3E, b'S', // LD A,'S'
            0xE0, 0x01, // LDH ($01),A
            0x3E, 0x81, // LD A,$81
            0xE0, 0x02, // LDH ($02),A
            0x18, 0xFE, // JR -2
        ])
        .build()
}

#[test]
fn paced_machine_reacts_to_host_input() {
    let mut gb = machine(wait_for_start());
    let bp = gb.breakpoints.add(0x0162);
    let capture = FrameCapture::default();
    gb.set_video(Box::new(capture.clone()));
    let pad = gb.joypad();

    let s = Scheduler::spawn(gb, FramePacing::Ticker(Duration::from_millis(1))).unwrap();
    s.resume();
    thread::sleep(Duration::from_millis(200));
    assert!(s.events().try_recv().is_err(), "still polling");

    pad.press(Button::Start);
    match s.events().recv_timeout(TIMEOUT).unwrap() {
        Event::Paused {
            pc,
            reason: BreakReason::Breakpoint(id),
        } => {
            assert_eq!(pc, 0x0162);
            assert_eq!(id, bp);
        }
        other => panic!("unexpected event {other:?}"),
    }

    let mut gb = s.join().unwrap();
    assert_eq!(gb.mmu.serial.take_output(), b"S");
    assert!(gb.frames() > 0);
    assert!(capture.count() > 0);
}

#[test]
fn step_then_resume_then_terminate() {
    let s = Scheduler::spawn(machine(RomBuilder::new().build()), FramePacing::Unlimited).unwrap();

    s.step();
    assert!(matches!(
        s.events().recv_timeout(TIMEOUT).unwrap(),
        Event::Paused {
            pc: 0x0101,
            reason: BreakReason::Step
        }
    ));
    s.step();
    assert!(matches!(
        s.events().recv_timeout(TIMEOUT).unwrap(),
        Event::Paused { pc: 0x0150, .. }
    ));

    s.resume();
    thread::sleep(Duration::from_millis(20));
    s.terminate();
    assert!(matches!(
        s.events().recv_timeout(TIMEOUT).unwrap(),
        Event::Terminated
    ));
    let gb = s.join().unwrap();
    assert_eq!(gb.pc(), 0x0150);
}
