//! Interactive demo playing the chord and wavetable engines from the keyboard.
//!
//! Controls:
//! - A W S E D F T G Y H U J K: Play notes (hold to sustain)
//! - 1 / 2: Select the chord or wavetable engine
//! - Z / X: Octave down / up
//! - [ / ]: Previous / next wave (chord shape or wavetable bank)
//! - , / .: Wave edit (chord morph or wavetable frame) down / up
//! - - / =: Cutoff down / up (negative is high-pass)
//! - F1..F5: Effect (bypass, delay, distortion, bitcrusher, tremolo)
//! - Q or ESC: Quit

mod common;

use anyhow::Result;
use common::{
    EngineRack, KeyAction, KeyboardConfig, is_quit_key, key_to_note, run_interactive_demo,
};
use crossterm::{
    ExecutableCommand,
    event::{KeyCode, KeyEvent, KeyEventKind},
};
use multiengine::{ChordEngine, VoiceEngine, WavetableEngine};
use std::io::{Write, stdout};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const SAMPLE_RATE: u32 = 44100;

static SELECTED: AtomicUsize = AtomicUsize::new(1);
static OCTAVE_BASE: AtomicU8 = AtomicU8::new(48);

fn wave_key(engine: &dyn VoiceEngine<SAMPLE_RATE>) -> (&'static str, &'static str) {
    if engine.name() == "Chord" {
        ("WAVE", "MORPH")
    } else {
        ("WAVE", "WAVE_EDIT")
    }
}

fn nudge(engine: &mut dyn VoiceEngine<SAMPLE_RATE>, key: &str, delta: f64) -> Result<()> {
    let current = engine.param(key).unwrap_or(0.0);
    engine.update(key, current + delta)?;
    Ok(())
}

fn draw_ui(rack: &EngineRack<SAMPLE_RATE>) -> Result<()> {
    let mut stdout = stdout();
    stdout.execute(crossterm::terminal::Clear(
        crossterm::terminal::ClearType::All,
    ))?;
    stdout.execute(crossterm::cursor::MoveTo(0, 0))?;

    write!(stdout, "=== Multiengine ===\r\n\r\n")?;
    write!(
        stdout,
        "Octave base: {}\r\n\r\n",
        OCTAVE_BASE.load(Ordering::Relaxed)
    )?;

    let selected = SELECTED.load(Ordering::Relaxed);
    for (index, engine) in rack.engines.iter().enumerate() {
        let marker = if index == selected { ">" } else { " " };
        write!(stdout, "{} [{}] {}\r\n", marker, index + 1, engine.name())?;
        for spec in engine.params() {
            let value = engine.param(spec.key).unwrap_or(spec.default);
            write!(stdout, "      {:<12} {:>8.1} {}\r\n", spec.label, value, spec.unit)?;
        }
        write!(stdout, "\r\n")?;
    }

    write!(stdout, "Keys: A-K play, 1/2 engine, Z/X octave, [ ] wave, , . edit, - = cutoff, F1-F5 fx, Q quit\r\n")?;
    stdout.flush()?;
    Ok(())
}

fn handle_key(rack: &Arc<Mutex<EngineRack<SAMPLE_RATE>>>, key: &KeyEvent) -> Result<KeyAction> {
    if is_quit_key(key.code) {
        return Ok(KeyAction::Exit);
    }

    let mut rack = rack
        .lock()
        .map_err(|_| anyhow::anyhow!("audio thread poisoned the engine rack"))?;
    let selected = SELECTED.load(Ordering::Relaxed);
    let base = OCTAVE_BASE.load(Ordering::Relaxed);

    if let Some(note) = key_to_note(key.code, base) {
        let engine = &mut rack.engines[selected];
        match key.kind {
            KeyEventKind::Press => engine.note_on(note, 0.9),
            KeyEventKind::Release => engine.note_off(note, 0.0),
            KeyEventKind::Repeat => {}
        }
        return Ok(KeyAction::Continue);
    }

    if key.kind != KeyEventKind::Press {
        return Ok(KeyAction::Continue);
    }

    let engine = rack.engines[selected].as_mut();
    let (wave, edit) = wave_key(engine);
    match key.code {
        KeyCode::Char('1') => SELECTED.store(0, Ordering::Relaxed),
        KeyCode::Char('2') => SELECTED.store(1, Ordering::Relaxed),
        KeyCode::Char('z') => OCTAVE_BASE.store(base.saturating_sub(12), Ordering::Relaxed),
        KeyCode::Char('x') => OCTAVE_BASE.store(base.saturating_add(12).min(108), Ordering::Relaxed),
        KeyCode::Char('[') => nudge(engine, wave, -1.0)?,
        KeyCode::Char(']') => nudge(engine, wave, 1.0)?,
        KeyCode::Char(',') => nudge(engine, edit, -5.0)?,
        KeyCode::Char('.') => nudge(engine, edit, 5.0)?,
        KeyCode::Char('-') => nudge(engine, "CUTOFF", -5.0)?,
        KeyCode::Char('=') => nudge(engine, "CUTOFF", 5.0)?,
        KeyCode::F(n @ 1..=5) => {
            engine.update("FX_TYPE", f64::from(n - 1))?;
            if engine.param("FX_AMOUNT") == Some(0.0) {
                engine.update("FX_AMOUNT", 50.0)?;
            }
        }
        _ => return Ok(KeyAction::Continue),
    }

    draw_ui(&rack)?;
    Ok(KeyAction::Continue)
}

fn main() -> Result<()> {
    let rack = EngineRack::new(
        vec![
            Box::new(ChordEngine::<SAMPLE_RATE>::new().with_track(0)),
            Box::new(WavetableEngine::<SAMPLE_RATE>::new().with_track(1)),
        ],
        0.5,
    );

    run_interactive_demo(
        rack,
        KeyboardConfig::with_enhancements(),
        |rack| {
            let rack = rack
                .lock()
                .map_err(|_| anyhow::anyhow!("engine rack poisoned"))?;
            draw_ui(&rack)
        },
        handle_key,
    )
}
