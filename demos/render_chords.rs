//! Renders a short chord progression to `chords.wav`.
//!
//! A 16-step sequence drives the chord engine on track 0 and a wavetable bass
//! on track 1. Sequencer progress is published through `SequencerStatus` and
//! logged whenever the observer sees a change.
//!
//! Run with `RUST_LOG=debug` to see parameter updates.

use anyhow::Result;
use multiengine::status::SequencerStatus;
use multiengine::{ChordEngine, VoiceEngine, WavetableEngine, note};
use tracing_subscriber::EnvFilter;

const SAMPLE_RATE: u32 = 44100;
const BPM: f64 = 110.0;
const STEPS: u16 = 16;

/// (step, root note, chord index)
const PROGRESSION: [(u16, u8, f64); 4] = [
    (0, note!("A3"), 1.0),
    (4, note!("F3"), 0.0),
    (8, note!("C4"), 4.0),
    (12, note!("G3"), 2.0),
];

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut chords = ChordEngine::<SAMPLE_RATE>::new().with_track(0);
    chords.update("WAVE", 1.0)?;
    chords.update("MORPH", 30.0)?;
    chords.update("DETUNE", 25.0)?;
    chords.update("CUTOFF", 40.0)?;
    chords.update("GLIDE", 80.0)?;
    chords.update("FX_TYPE", 1.0)?;
    chords.update("FX_AMOUNT", 35.0)?;

    let mut bass = WavetableEngine::<SAMPLE_RATE>::new().with_track(1);
    bass.update("WAVE", 1.0)?;
    bass.update("LFO_WAVE_MOD", 60.0)?;
    bass.update("LFO_RATE", 0.5)?;
    bass.update("RELEASE", 120.0)?;

    let mut engines: [&mut dyn VoiceEngine<SAMPLE_RATE>; 2] = [&mut chords, &mut bass];

    let status = SequencerStatus::new(STEPS);
    let mut observer = status.observer();

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create("chords.wav", spec)?;

    let samples_per_step = (60.0 / BPM / 4.0 * SAMPLE_RATE as f64) as usize;
    let mut buffer = [0.0; 2];
    let mut held: Option<u8> = None;

    status.set_playing(true);
    for bar in 0..2 {
        for step in 0..STEPS {
            status.set_step(step);
            if observer.poll() {
                let snapshot = observer.snapshot();
                tracing::info!(bar, step, progress = ?snapshot.progress(), "step");
            }

            if let Some(&(_, root, chord)) = PROGRESSION.iter().find(|(at, _, _)| *at == step) {
                if let Some(previous) = held.take() {
                    engines[0].note_off(previous, 0.0);
                    engines[1].note_off(previous - 12, 0.0);
                }
                engines[0].update("CHORD", chord)?;
                engines[0].note_on(root, 0.8);
                engines[1].note_on(root - 12, 1.0);
                held = Some(root);
            }

            for _ in 0..samples_per_step {
                buffer.fill(0.0);
                for engine in engines.iter_mut() {
                    engine.tick(&mut buffer);
                }
                let mix = (buffer.iter().sum::<f64>() * 0.4).clamp(-1.0, 1.0);
                writer.write_sample((mix * i16::MAX as f64) as i16)?;
            }
        }
        status.add_recorded_loop();
    }

    if let Some(previous) = held {
        engines[0].note_off(previous, 0.0);
        engines[1].note_off(previous - 12, 0.0);
    }
    status.set_playing(false);

    // let the release and delay tail ring out
    for _ in 0..SAMPLE_RATE {
        buffer.fill(0.0);
        for engine in engines.iter_mut() {
            engine.tick(&mut buffer);
        }
        let mix = (buffer.iter().sum::<f64>() * 0.4).clamp(-1.0, 1.0);
        writer.write_sample((mix * i16::MAX as f64) as i16)?;
    }

    writer.finalize()?;
    tracing::info!(loops = status.snapshot().recorded_loops, "wrote chords.wav");
    Ok(())
}
