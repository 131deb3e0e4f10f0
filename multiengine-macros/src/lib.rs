use proc_macro::TokenStream;
use quote::quote;
use syn::{LitStr, parse_macro_input};

/// Resolves a note name to its MIDI note number at compile time.
///
/// Engines take MIDI note numbers in `note_on`, so this expands to a plain `u8`
/// literal and costs nothing at runtime.
///
/// # Format
///
/// `<pitch>[octave]` where:
/// - `pitch` is one of C, D, E, F, G, A, B with an optional `#` or `b`
/// - `octave` is optional and defaults to 4, otherwise -1 to 9
///
/// Names that land outside 0..=127 (like `G#9`) are rejected.
///
/// # Examples
///
/// ```ignore
/// use multiengine::note;
///
/// assert_eq!(note!("C4"), 60);
/// assert_eq!(note!("A"), 69);
/// assert_eq!(note!("Bb3"), 58);
/// ```
#[proc_macro]
pub fn note(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as LitStr);
    let note_str = input.value();

    let expanded = match parse_note(&note_str).and_then(|(pitch, octave)| to_midi(pitch, octave)) {
        Ok(midi_note) => quote! { #midi_note },
        Err(e) => {
            let error_msg = format!("Invalid note string '{}': {}", note_str, e);
            quote! { compile_error!(#error_msg) }
        }
    };

    TokenStream::from(expanded)
}

#[derive(Debug, Clone, Copy)]
enum Pitch {
    C = 0,
    CSharp = 1,
    D = 2,
    DSharp = 3,
    E = 4,
    F = 5,
    FSharp = 6,
    G = 7,
    GSharp = 8,
    A = 9,
    ASharp = 10,
    B = 11,
}

/// Parses a pitch name into its pitch class and the octave carry of its spelling.
///
/// `B#` and `Cb` cross into the neighbouring octave, so they carry +1 and -1.
fn parse_pitch(s: &str) -> Result<(Pitch, i8), String> {
    match s.to_uppercase().as_str() {
        "B#" => Ok((Pitch::C, 1)),
        "CB" => Ok((Pitch::B, -1)),
        "C" => Ok((Pitch::C, 0)),
        "C#" | "DB" => Ok((Pitch::CSharp, 0)),
        "D" => Ok((Pitch::D, 0)),
        "D#" | "EB" => Ok((Pitch::DSharp, 0)),
        "E" | "FB" => Ok((Pitch::E, 0)),
        "F" | "E#" => Ok((Pitch::F, 0)),
        "F#" | "GB" => Ok((Pitch::FSharp, 0)),
        "G" => Ok((Pitch::G, 0)),
        "G#" | "AB" => Ok((Pitch::GSharp, 0)),
        "A" => Ok((Pitch::A, 0)),
        "A#" | "BB" => Ok((Pitch::ASharp, 0)),
        "B" => Ok((Pitch::B, 0)),
        other => Err(format!("invalid pitch '{}'", other)),
    }
}

fn parse_note(s: &str) -> Result<(Pitch, i8), String> {
    if s.is_empty() {
        return Err("empty string".to_string());
    }

    let octave_start = s.chars().position(|c| c.is_ascii_digit() || c == '-');

    let (pitch_str, octave) = match octave_start {
        Some(0) => return Err("string starts with number".to_string()),
        Some(pos) => {
            let octave_str = &s[pos..];
            let octave = octave_str
                .parse::<i8>()
                .map_err(|_| format!("invalid octave '{}'", octave_str))?;

            if !(-1..=9).contains(&octave) {
                return Err(format!("octave {} out of range (-1 to 9)", octave));
            }
            (&s[..pos], octave)
        }
        None => (s, 4),
    };

    let (pitch, carry) = parse_pitch(pitch_str)?;
    Ok((pitch, octave + carry))
}

fn to_midi(pitch: Pitch, octave: i8) -> Result<u8, String> {
    let midi = (i16::from(octave) + 1) * 12 + pitch as i16;
    u8::try_from(midi)
        .ok()
        .filter(|n| *n <= 127)
        .ok_or_else(|| format!("note number {} outside MIDI range", midi))
}
