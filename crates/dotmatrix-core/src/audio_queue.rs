use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::apu::AudioChannelOutput;

/// Single-producer / single-consumer ring buffer of stereo `f32` frames.
///
/// The producer half is an [`AudioChannelOutput`], so it can be handed
/// straight to [`Apu::set_output`](crate::apu::Apu::set_output) while an
/// audio callback thread drains the consumer half without locks.
///
/// This queue is *lossy* when full: new pushes are dropped. Popping takes
/// `&mut self`, so only one thread at a time can advance the read index.
pub struct AudioConsumer {
    inner: Arc<Inner>,
}

pub struct AudioProducer {
    inner: Arc<Inner>,
    sample_rate: u32,
    dropped: usize,
}

struct Inner {
    // One extra slot so head==tail is unambiguously empty.
    buf: Box<[UnsafeCell<MaybeUninit<[f32; 2]>>]>,
    cap: usize,
    head: AtomicUsize,
    tail: AtomicUsize,
}

// Safe because:
// - Only the producer writes to `buf[head]`.
// - Only the consumer reads from `buf[tail]`.
// - All coordination happens through atomics.
unsafe impl Sync for Inner {}

impl Inner {
    fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        if head >= tail {
            head - tail
        } else {
            (self.cap - tail) + head
        }
    }

    fn capacity_frames(&self) -> usize {
        self.cap.saturating_sub(1)
    }

    #[inline]
    fn next_index(&self, idx: usize) -> usize {
        let next = idx + 1;
        if next == self.cap { 0 } else { next }
    }
}

/// Create a queue holding up to `capacity_frames` frames at `sample_rate` Hz.
pub fn audio_queue(capacity_frames: usize, sample_rate: u32) -> (AudioProducer, AudioConsumer) {
    let cap = capacity_frames.saturating_add(1).max(2);
    let buf = (0..cap)
        .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
        .collect::<Vec<_>>()
        .into_boxed_slice();

    let inner = Arc::new(Inner {
        buf,
        cap,
        head: AtomicUsize::new(0),
        tail: AtomicUsize::new(0),
    });

    (
        AudioProducer {
            inner: Arc::clone(&inner),
            sample_rate,
            dropped: 0,
        },
        AudioConsumer { inner },
    )
}

impl AudioProducer {
    #[inline]
    pub fn push_stereo(&mut self, left: f32, right: f32) -> bool {
        let head = self.inner.head.load(Ordering::Relaxed);
        let next = self.inner.next_index(head);
        let tail = self.inner.tail.load(Ordering::Acquire);
        if next == tail {
            // Full: drop newest.
            self.dropped += 1;
            return false;
        }

        unsafe {
            (*self.inner.buf[head].get()).write([left, right]);
        }
        self.inner.head.store(next, Ordering::Release);
        true
    }

    /// Frames discarded because the consumer fell behind.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn capacity_frames(&self) -> usize {
        self.inner.capacity_frames()
    }
}

impl AudioChannelOutput for AudioProducer {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn buffer_samples(&mut self, samples: &[f32], offset: usize, length: usize) {
        let end = (offset + length).min(samples.len());
        let Some(window) = samples.get(offset..end) else {
            return;
        };
        for frame in window.chunks_exact(2) {
            self.push_stereo(frame[0], frame[1]);
        }
    }
}

impl AudioConsumer {
    #[inline]
    pub fn pop_stereo(&mut self) -> Option<(f32, f32)> {
        let tail = self.inner.tail.load(Ordering::Relaxed);
        let head = self.inner.head.load(Ordering::Acquire);
        if tail == head {
            return None;
        }

        let sample = unsafe { (*self.inner.buf[tail].get()).assume_init_read() };
        let next = self.inner.next_index(tail);
        self.inner.tail.store(next, Ordering::Release);
        Some((sample[0], sample[1]))
    }

    /// Pop up to `out.len() / 2` frames into `out` as interleaved samples,
    /// returning the number of frames written.
    pub fn pop_into(&mut self, out: &mut [f32]) -> usize {
        let mut frames = 0;
        for slot in out.chunks_exact_mut(2) {
            let Some((l, r)) = self.pop_stereo() else {
                break;
            };
            slot[0] = l;
            slot[1] = r;
            frames += 1;
        }
        frames
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn capacity_frames(&self) -> usize {
        self.inner.capacity_frames()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_come_out_in_order() {
        let (mut tx, mut rx) = audio_queue(4, 44_100);
        assert!(tx.push_stereo(0.1, -0.1));
        assert!(tx.push_stereo(0.2, -0.2));
        assert_eq!(rx.len(), 2);
        assert_eq!(rx.pop_stereo(), Some((0.1, -0.1)));
        assert_eq!(rx.pop_stereo(), Some((0.2, -0.2)));
        assert_eq!(rx.pop_stereo(), None);
    }

    #[test]
    fn full_queue_drops_newest() {
        let (mut tx, mut rx) = audio_queue(2, 44_100);
        assert!(tx.push_stereo(1.0, 1.0));
        assert!(tx.push_stereo(2.0, 2.0));
        assert!(!tx.push_stereo(3.0, 3.0));
        assert_eq!(tx.dropped(), 1);
        assert_eq!(rx.pop_stereo(), Some((1.0, 1.0)));
        assert!(tx.push_stereo(4.0, 4.0));
        assert_eq!(rx.pop_stereo(), Some((2.0, 2.0)));
        assert_eq!(rx.pop_stereo(), Some((4.0, 4.0)));
    }

    #[test]
    fn producer_accepts_interleaved_buffers() {
        let (mut tx, mut rx) = audio_queue(16, 22_050);
        assert_eq!(tx.sample_rate(), 22_050);
        let samples = [9.0, 9.0, 0.5, -0.5, 0.25, -0.25];
        tx.buffer_samples(&samples, 2, 4);
        let mut out = [0.0; 8];
        assert_eq!(rx.pop_into(&mut out), 2);
        assert_eq!(&out[..4], &[0.5, -0.5, 0.25, -0.25]);
    }

    #[test]
    fn consumer_drains_from_another_thread() {
        let (mut tx, rx) = audio_queue(1024, 44_100);
        for i in 0..512 {
            tx.push_stereo(i as f32, -(i as f32));
        }
        let handle = std::thread::spawn(move || {
            let mut rx = rx;
            let mut n = 0;
            while let Some((l, r)) = rx.pop_stereo() {
                assert_eq!(l, -r);
                n += 1;
            }
            n
        });
        assert_eq!(handle.join().unwrap(), 512);
    }
}
