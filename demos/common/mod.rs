//! Shared plumbing for the interactive demos.

use anyhow::Result;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, StreamConfig};
use crossterm::{
    ExecutableCommand,
    event::{
        self, Event, KeyCode, KeyEvent, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
        PushKeyboardEnhancementFlags,
    },
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use multiengine::VoiceEngine;
use std::io::stdout;
use std::panic;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A set of engines sharing one host buffer, one slot per engine.
pub struct EngineRack<const SAMPLE_RATE: u32> {
    pub engines: Vec<Box<dyn VoiceEngine<SAMPLE_RATE> + Send>>,
    buffer: Vec<f64>,
    gain: f64,
}

impl<const SAMPLE_RATE: u32> EngineRack<SAMPLE_RATE> {
    pub fn new(engines: Vec<Box<dyn VoiceEngine<SAMPLE_RATE> + Send>>, gain: f64) -> Self {
        let slots = engines.iter().map(|e| e.base().track() + 1).max().unwrap_or(0);
        Self {
            engines,
            buffer: vec![0.0; slots],
            gain,
        }
    }

    /// Clears the buffer, ticks every engine and returns the mono mix.
    pub fn next_sample(&mut self) -> f64 {
        self.buffer.fill(0.0);
        for engine in self.engines.iter_mut() {
            engine.tick(&mut self.buffer);
        }
        (self.buffer.iter().sum::<f64>() * self.gain).clamp(-1.0, 1.0)
    }
}

/// Configuration for keyboard enhancements (needed for detecting key press/release).
#[derive(Default)]
pub struct KeyboardConfig {
    pub enable_enhancements: bool,
}

impl KeyboardConfig {
    pub fn with_enhancements() -> Self {
        Self {
            enable_enhancements: true,
        }
    }
}

/// Key handling result that controls the event loop
pub enum KeyAction {
    Continue,
    Exit,
}

/// Runs `rack` on the default output device until the key handler exits.
///
/// Sets up the terminal (raw mode, alternate screen) and restores it on exit
/// or panic.
pub fn run_interactive_demo<const SAMPLE_RATE: u32, F, K>(
    rack: EngineRack<SAMPLE_RATE>,
    keyboard_config: KeyboardConfig,
    initial_ui: F,
    key_handler: K,
) -> Result<()>
where
    F: FnOnce(&Arc<Mutex<EngineRack<SAMPLE_RATE>>>) -> Result<()>,
    K: Fn(&Arc<Mutex<EngineRack<SAMPLE_RATE>>>, &KeyEvent) -> Result<KeyAction>,
{
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow::anyhow!("No output device available"))?;

    let config = device.default_output_config()?;
    if config.sample_rate().0 != SAMPLE_RATE {
        tracing::warn!(
            device_rate = config.sample_rate().0,
            engine_rate = SAMPLE_RATE,
            "device runs at a different rate, pitch will be off"
        );
    }
    let rack = Arc::new(Mutex::new(rack));

    let _stream = match config.sample_format() {
        SampleFormat::F32 => create_audio_stream::<f32, SAMPLE_RATE>(&device, &config.into(), rack.clone())?,
        SampleFormat::I16 => create_audio_stream::<i16, SAMPLE_RATE>(&device, &config.into(), rack.clone())?,
        SampleFormat::U16 => create_audio_stream::<u16, SAMPLE_RATE>(&device, &config.into(), rack.clone())?,
        sample_format => {
            return Err(anyhow::anyhow!(
                "Unsupported sample format: {}",
                sample_format
            ));
        }
    };

    // Keyboard enhancements must come before the alternate screen
    if keyboard_config.enable_enhancements {
        stdout().execute(PushKeyboardEnhancementFlags(
            KeyboardEnhancementFlags::REPORT_EVENT_TYPES,
        ))?;
    }

    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    stdout().execute(crossterm::cursor::Hide)?;

    let has_enhancements = keyboard_config.enable_enhancements;
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        cleanup_terminal(has_enhancements);
        original_hook(panic_info);
    }));

    initial_ui(&rack)?;

    loop {
        if event::poll(Duration::from_millis(50))?
            && let Event::Key(key_event) = event::read()?
        {
            match key_handler(&rack, &key_event)? {
                KeyAction::Continue => {}
                KeyAction::Exit => break,
            }
        }
    }

    cleanup_terminal(keyboard_config.enable_enhancements);

    Ok(())
}

fn create_audio_stream<T, const SAMPLE_RATE: u32>(
    device: &cpal::Device,
    config: &StreamConfig,
    rack: Arc<Mutex<EngineRack<SAMPLE_RATE>>>,
) -> Result<cpal::Stream>
where
    T: Sample + FromSample<f64> + cpal::SizedSample,
{
    let channels = config.channels as usize;

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let Ok(mut rack) = rack.lock() else {
                return;
            };
            for frame in data.chunks_mut(channels) {
                let value: T = T::from_sample(rack.next_sample());
                for s in frame.iter_mut() {
                    *s = value;
                }
            }
        },
        |err| tracing::error!(%err, "audio stream error"),
        None,
    )?;

    stream.play()?;
    Ok(stream)
}

fn cleanup_terminal(has_keyboard_enhancements: bool) {
    if has_keyboard_enhancements {
        let _ = stdout().execute(PopKeyboardEnhancementFlags);
    }
    let _ = stdout().execute(crossterm::cursor::Show);
    let _ = stdout().execute(LeaveAlternateScreen);
    let _ = disable_raw_mode();
}

/// Q and ESC quit.
pub fn is_quit_key(code: KeyCode) -> bool {
    matches!(code, KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc)
}

/// Maps the home row to a chromatic octave starting at `base`.
pub fn key_to_note(code: KeyCode, base: u8) -> Option<u8> {
    let offset = match code {
        KeyCode::Char('a') => 0,
        KeyCode::Char('w') => 1,
        KeyCode::Char('s') => 2,
        KeyCode::Char('e') => 3,
        KeyCode::Char('d') => 4,
        KeyCode::Char('f') => 5,
        KeyCode::Char('t') => 6,
        KeyCode::Char('g') => 7,
        KeyCode::Char('y') => 8,
        KeyCode::Char('h') => 9,
        KeyCode::Char('u') => 10,
        KeyCode::Char('j') => 11,
        KeyCode::Char('k') => 12,
        _ => return None,
    };
    base.checked_add(offset)
}
