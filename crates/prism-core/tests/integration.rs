//! Integration tests for prism-core.
//!
//! Exercises the thread-boundary primitives across real threads and checks
//! biquad behavior at the signal level: frequency response, coefficient
//! glides driven from a control handle, and stereo processing.

use std::thread;

use prism_core::{
    Biquad, BiquadFilter, Coeffs, Command, CommandKind, FilterParams, FilterType, IntRing,
    Realtime, RealtimeExt, RingBuffer, Width,
};

const SAMPLE_RATE: f32 = 48000.0;
const TAU: f32 = core::f32::consts::TAU;

/// Generate a sine wave buffer at the given frequency and sample rate.
fn generate_sine(freq_hz: f32, sample_rate: f32, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|n| libm::sinf(TAU * freq_hz * n as f32 / sample_rate))
        .collect()
}

/// Measure RMS amplitude of a signal buffer.
fn rms(signal: &[f32]) -> f32 {
    let sum_sq: f32 = signal.iter().map(|&s| s * s).sum();
    libm::sqrtf(sum_sq / signal.len() as f32)
}

/// Convert linear amplitude to dB.
fn to_db(linear: f32) -> f32 {
    20.0 * libm::log10f(linear.max(1e-10))
}

// ============================================================================
// 1. Rings across threads
// ============================================================================

#[test]
fn generic_ring_transfers_in_order_across_threads() {
    const COUNT: u64 = 100_000;
    let (mut tx, mut rx) = RingBuffer::<u64>::new(64).unwrap();

    let producer = thread::spawn(move || {
        let mut next = 0;
        while next < COUNT {
            if tx.offer(next).is_ok() {
                next += 1;
            } else {
                thread::yield_now();
            }
        }
    });

    let mut expected = 0;
    while expected < COUNT {
        match rx.poll() {
            Some(v) => {
                assert_eq!(v, expected);
                expected += 1;
            }
            None => thread::yield_now(),
        }
    }
    producer.join().unwrap();
    assert!(rx.poll().is_none());
}

#[test]
fn boxed_values_cross_threads_intact() {
    let (mut tx, mut rx) = RingBuffer::<Vec<f32>>::new(8).unwrap();
    let producer = thread::spawn(move || {
        for len in 1..=200usize {
            let mut v = vec![len as f32; len];
            loop {
                match tx.offer(v) {
                    Ok(()) => break,
                    Err(back) => {
                        v = back;
                        thread::yield_now();
                    }
                }
            }
        }
    });

    let mut len = 1;
    while len <= 200 {
        if let Some(v) = rx.poll() {
            assert_eq!(v.len(), len);
            assert!(v.iter().all(|&x| x == len as f32));
            len += 1;
        } else {
            thread::yield_now();
        }
    }
    producer.join().unwrap();
}

#[test]
fn int_ring_carries_commands_across_threads() {
    let (mut tx, mut rx) = IntRing::new(16).unwrap();
    let producer = thread::spawn(move || {
        let mut dropped = 0;
        for note in 0..128u8 {
            if !tx.offer(Command::note_on(0, note, 100).pack()) {
                dropped += 1;
            }
            while !tx.offer(Command::note_off(0, note).pack()) {
                thread::yield_now();
            }
        }
        dropped
    });

    let mut offs = 0;
    let mut last_on: Option<u8> = None;
    while offs < 128 {
        let Some(word) = rx.poll() else {
            thread::yield_now();
            continue;
        };
        let cmd = Command::unpack(word).unwrap();
        match cmd.kind {
            CommandKind::Add => {
                assert_eq!(cmd.data2, 100);
                if let Some(prev) = last_on {
                    assert!(cmd.data1 > prev);
                }
                last_on = Some(cmd.data1);
            }
            CommandKind::NoteOff => {
                assert_eq!(cmd.data1, offs as u8);
                offs += 1;
            }
            other => panic!("unexpected {other:?}"),
        }
    }
    let dropped = producer.join().unwrap();
    assert!(dropped <= 128);
}

#[test]
fn capacity_five_ring_holds_seven() {
    let (mut tx, mut rx) = RingBuffer::<u32>::new(5).unwrap();
    assert_eq!(tx.capacity(), 8);
    assert_eq!(tx.usable(), 7);
    for i in 0..7 {
        assert!(tx.offer(i).is_ok());
    }
    assert_eq!(tx.offer(7), Err(7));
    let drained: Vec<u32> = std::iter::from_fn(|| rx.poll()).collect();
    assert_eq!(drained, (0..7).collect::<Vec<_>>());
}

// ============================================================================
// 2. Biquad frequency response
// ============================================================================

/// Feed a sine through a fixed biquad and return gain in dB after settling.
fn measure_response(coeffs: Coeffs, freq_hz: f32) -> f32 {
    let mut biquad = Biquad::with_coeffs(coeffs);
    let input = generate_sine(freq_hz, SAMPLE_RATE, 9600);
    let output: Vec<f32> = input.iter().map(|&x| biquad.process(x)).collect();
    to_db(rms(&output[4800..]) / rms(&input[4800..]))
}

#[test]
fn lowpass_attenuates_above_cutoff() {
    let c = Coeffs::compute(&FilterParams::new(FilterType::LowPass, 1000.0), SAMPLE_RATE).unwrap();
    assert!(measure_response(c, 100.0).abs() < 0.5);
    assert!((measure_response(c, 1000.0) + 3.0).abs() < 0.5);
    assert!(measure_response(c, 10000.0) < -30.0);
}

#[test]
fn highpass_attenuates_below_cutoff() {
    let c =
        Coeffs::compute(&FilterParams::new(FilterType::HighPass, 1000.0), SAMPLE_RATE).unwrap();
    assert!(measure_response(c, 100.0) < -30.0);
    assert!(measure_response(c, 10000.0).abs() < 0.5);
}

#[test]
fn peaking_boosts_center() {
    let params = FilterParams::new(FilterType::Peaking, 2000.0)
        .with_width(Width::Octaves(1.0))
        .with_gain_db(6.0);
    let c = Coeffs::compute(&params, SAMPLE_RATE).unwrap();
    assert!((measure_response(c, 2000.0) - 6.0).abs() < 0.5);
    assert!(measure_response(c, 100.0).abs() < 0.5);
}

#[test]
fn allpass_keeps_magnitude() {
    let c = Coeffs::compute(&FilterParams::new(FilterType::AllPass, 1500.0), SAMPLE_RATE).unwrap();
    for freq in [100.0, 1500.0, 8000.0] {
        assert!(measure_response(c, freq).abs() < 0.2, "at {freq} Hz");
    }
}

#[test]
fn bandpass_peaks_at_center() {
    let params = FilterParams::new(FilterType::BandPass, 1000.0).with_width(Width::Q(2.0));
    let c = Coeffs::compute(&params, SAMPLE_RATE).unwrap();
    assert!(measure_response(c, 1000.0).abs() < 0.5);
    assert!(measure_response(c, 100.0) < -15.0);
    assert!(measure_response(c, 10000.0) < -15.0);
}

// ============================================================================
// 3. Control handle driving the RT filter
// ============================================================================

#[test]
fn sweep_from_control_thread_stays_finite() {
    let (mut filter, mut control) =
        BiquadFilter::new(FilterParams::new(FilterType::LowPass, 200.0), SAMPLE_RATE).unwrap();

    let sweeper = thread::spawn(move || {
        for step in 0..200 {
            let hz = 200.0 + step as f32 * 50.0;
            control.set_frequency(hz).unwrap();
        }
        control
    });

    let input = generate_sine(440.0, SAMPLE_RATE, 256);
    for _ in 0..400 {
        let mut block = input.clone();
        filter.process(&mut block);
        assert!(block.iter().all(|s| s.is_finite()));
    }
    let control = sweeper.join().unwrap();

    // After the sweep settles, one more block commits the final set
    let mut block = input.clone();
    filter.process(&mut block);
    assert!(filter.committed().bits_eq(&control.coefficients()));
}

#[test]
fn series_of_filters_counts_full_blocks() {
    let lp = Coeffs::compute(&FilterParams::new(FilterType::LowPass, 4000.0), SAMPLE_RATE).unwrap();
    let hp = Coeffs::compute(&FilterParams::new(FilterType::HighPass, 100.0), SAMPLE_RATE).unwrap();
    let mut chain = BiquadFilter::with_coeffs(lp).then(BiquadFilter::with_coeffs(hp));
    let mut block = generate_sine(1000.0, SAMPLE_RATE, 128);
    assert_eq!(chain.process_block(&mut block), 128);
}

#[test]
fn stereo_matches_two_mono_filters() {
    let c = Coeffs::compute(&FilterParams::new(FilterType::LowPass, 900.0), SAMPLE_RATE).unwrap();
    let mut stereo = BiquadFilter::with_coeffs(c);
    let mut mono_l = BiquadFilter::with_coeffs(c);
    let mut mono_r = BiquadFilter::with_coeffs(c);

    let left_in = generate_sine(300.0, SAMPLE_RATE, 128);
    let right_in = generate_sine(5000.0, SAMPLE_RATE, 128);
    let (mut l, mut r) = (left_in.clone(), right_in.clone());
    let (mut ml, mut mr) = (left_in, right_in);

    stereo.process_stereo(&mut l, Some(&mut r));
    mono_l.process(&mut ml);
    mono_r.process(&mut mr);
    assert_eq!(l, ml);
    assert_eq!(r, mr);
}
