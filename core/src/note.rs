//! Bidirectional mapping between MIDI note numbers and symbolic names.
//!
//! Anchored so `C4` == 60 (note 0 is therefore `Cn1`, note 127 is `G9`).
//! Sharps use an `s` suffix (`Cs3`); octaves below zero use an `n` prefix
//! on the absolute octave number.

use crate::error::BuildError;

const LETTERS: [(&str, bool); 12] = [
    ("C", false),
    ("C", true),
    ("D", false),
    ("D", true),
    ("E", false),
    ("F", false),
    ("F", true),
    ("G", false),
    ("G", true),
    ("A", false),
    ("A", true),
    ("B", false),
];

/// Renders a MIDI note number (0..=127) as its symbolic name, e.g. `60 -> "C4"`.
pub fn note_to_name(note: u8) -> String {
    let octave = (note as i32) / 12 - 1;
    let semitone = (note as i32) % 12;
    let (letter, sharp) = LETTERS[semitone as usize];
    let octave_str = if octave < 0 {
        format!("n{}", -octave)
    } else {
        octave.to_string()
    };
    if sharp {
        format!("{letter}s{octave_str}")
    } else {
        format!("{letter}{octave_str}")
    }
}

/// Parses a symbolic note name back to a MIDI note number.
pub fn name_to_note(name: &str) -> Result<u8, BuildError> {
    let mut chars = name.chars().peekable();
    let letter = chars
        .next()
        .ok_or_else(|| BuildError::UnknownNote(name.to_string()))?
        .to_ascii_uppercase();
    let sharp = matches!(chars.peek(), Some('s')) && {
        chars.next();
        true
    };
    let rest: String = chars.collect();
    let (octave, negative) = if let Some(stripped) = rest.strip_prefix('n') {
        (stripped, true)
    } else {
        (rest.as_str(), false)
    };
    let octave: i32 = octave
        .parse()
        .map_err(|_| BuildError::UnknownNote(name.to_string()))?;
    let octave = if negative { -octave } else { octave };

    let base = match letter {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return Err(BuildError::UnknownNote(name.to_string())),
    };
    let semitone = if sharp { base + 1 } else { base };
    let note = (octave + 1) * 12 + semitone;
    if (0..=127).contains(&note) {
        Ok(note as u8)
    } else {
        Err(BuildError::UnknownNote(name.to_string()))
    }
}
