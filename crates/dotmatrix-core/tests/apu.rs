mod common;

use common::{RomBuilder, machine};
use dotmatrix_core::apu::Channel;
use dotmatrix_core::audio_queue::AudioConsumer;
use dotmatrix_core::gameboy::GameBoy;

fn drain(rx: &mut AudioConsumer) -> Vec<(f32, f32)> {
    std::iter::from_fn(|| rx.pop_stereo()).collect()
}

fn play_square2(gb: &mut GameBoy, nr21: u8, nr24: u8) {
    gb.mmu.write(0xFF24, 0x77);
    gb.mmu.write(0xFF25, 0xFF);
    gb.mmu.write(0xFF16, nr21);
    gb.mmu.write(0xFF17, 0xF0);
    gb.mmu.write(0xFF18, 0x00);
    gb.mmu.write(0xFF19, nr24);
}

#[test]
fn square_note_reaches_connected_queue() {
    let mut gb = machine(RomBuilder::new().build());
    let mut rx = gb.connect_audio(Channel::Square2, 8192);
    play_square2(&mut gb, 0x80, 0x87);
    assert_eq!(gb.mmu.read(0xFF26) & 0x02, 0x02);

    gb.run_frame();
    let frames = drain(&mut rx);
    assert!((700..800).contains(&frames.len()), "{} frames", frames.len());
    let peak = frames.iter().fold(0f32, |m, &(l, r)| m.max(l.abs()).max(r.abs()));
    assert!(peak > 0.05, "peak {peak}");
    assert!(frames.iter().all(|&(l, r)| l.abs() <= 1.0 && r.abs() <= 1.0));
}

#[test]
fn silent_channel_still_advances_time() {
    let mut gb = machine(RomBuilder::new().build());
    let mut rx = gb.connect_audio(Channel::Square1, 8192);
    play_square2(&mut gb, 0x80, 0x87);
    gb.run_frame();
    let frames = drain(&mut rx);
    assert!(!frames.is_empty());
    assert!(frames.iter().all(|&(l, r)| l == 0.0 && r == 0.0));
}

#[test]
fn length_counter_silences_channel() {
    let mut gb = machine(RomBuilder::new().build());
    let mut rx = gb.connect_audio(Channel::Square2, 8192);
    // One length step left, length enabled.
    play_square2(&mut gb, 0xBF, 0xC7);
    gb.run_frame();
    let frames = drain(&mut rx);
    // Expiry lands within two sequencer periods, well before the tail.
    let tail = &frames[frames.len() - 400..];
    assert!(tail.iter().all(|&(l, r)| l == 0.0 && r == 0.0));
    // The status bit stays set after expiry.
    assert_eq!(gb.mmu.read(0xFF26) & 0x02, 0x02);
}

#[test]
fn power_off_clears_state_for_the_cpu() {
    let mut gb = machine(RomBuilder::new().build());
    play_square2(&mut gb, 0x80, 0x87);
    gb.mmu.write(0xFF26, 0x00);
    assert_eq!(gb.mmu.read(0xFF26), 0x70);
    gb.mmu.write(0xFF22, 0xF0);
    assert_eq!(gb.mmu.read(0xFF22), 0x00);

    // Wave RAM survives and stays writable.
    gb.mmu.write(0xFF30, 0x5A);
    assert_eq!(gb.mmu.read(0xFF30), 0x5A);

    gb.mmu.write(0xFF26, 0x80);
    assert_eq!(gb.mmu.read(0xFF26), 0xF0);
}

#[test]
fn outputs_survive_reset() {
    let mut gb = machine(RomBuilder::new().build());
    let mut rx = gb.connect_audio(Channel::Noise, 8192);
    gb.reset();
    gb.run_frame();
    assert!(!drain(&mut rx).is_empty());
}
