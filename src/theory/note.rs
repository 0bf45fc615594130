use crate::error::TheoryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Natural note letters in the cyclic order scales are spelled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum_macros::Display)]
pub enum Letter {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
}

impl Letter {
    pub const ALL: [Letter; 7] = [
        Letter::A,
        Letter::B,
        Letter::C,
        Letter::D,
        Letter::E,
        Letter::F,
        Letter::G,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Letter `steps` places further along A→B→…→G→A.
    pub fn advance(self, steps: usize) -> Letter {
        Self::ALL[(self.index() + steps) % Self::ALL.len()]
    }

    /// Pitch class of the unaltered letter, C = 0.
    pub fn natural_pitch_class(self) -> u8 {
        match self {
            Letter::C => 0,
            Letter::D => 2,
            Letter::E => 4,
            Letter::F => 5,
            Letter::G => 7,
            Letter::A => 9,
            Letter::B => 11,
        }
    }

    pub fn from_char(c: char) -> Option<Letter> {
        match c.to_ascii_uppercase() {
            'A' => Some(Letter::A),
            'B' => Some(Letter::B),
            'C' => Some(Letter::C),
            'D' => Some(Letter::D),
            'E' => Some(Letter::E),
            'F' => Some(Letter::F),
            'G' => Some(Letter::G),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Accidental {
    DoubleFlat,
    Flat,
    #[default]
    Natural,
    Sharp,
    DoubleSharp,
}

impl Accidental {
    pub const ALL: [Accidental; 5] = [
        Accidental::DoubleFlat,
        Accidental::Flat,
        Accidental::Natural,
        Accidental::Sharp,
        Accidental::DoubleSharp,
    ];

    pub fn semitones(self) -> i8 {
        match self {
            Accidental::DoubleFlat => -2,
            Accidental::Flat => -1,
            Accidental::Natural => 0,
            Accidental::Sharp => 1,
            Accidental::DoubleSharp => 2,
        }
    }

    /// Maps an upward adjustment (mod 12) from a natural letter to its accidental.
    pub fn from_adjustment(adjustment: u8) -> Option<Accidental> {
        match adjustment % 12 {
            0 => Some(Accidental::Natural),
            1 => Some(Accidental::Sharp),
            2 => Some(Accidental::DoubleSharp),
            11 => Some(Accidental::Flat),
            10 => Some(Accidental::DoubleFlat),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Accidental::DoubleFlat => "bb",
            Accidental::Flat => "b",
            Accidental::Natural => "",
            Accidental::Sharp => "#",
            Accidental::DoubleSharp => "##",
        }
    }

    fn from_marks(marks: &str) -> Option<Accidental> {
        let mut offset = 0i8;
        let mut count = 0;
        for c in marks.chars() {
            match c {
                '#' | '♯' => offset += 1,
                'x' => offset += 2,
                'b' | '♭' => offset -= 1,
                _ => return None,
            }
            count += 1;
        }
        if count > 2 {
            return None;
        }
        match offset {
            -2 => Some(Accidental::DoubleFlat),
            -1 => Some(Accidental::Flat),
            0 if count == 0 => Some(Accidental::Natural),
            1 => Some(Accidental::Sharp),
            2 => Some(Accidental::DoubleSharp),
            _ => None,
        }
    }
}

/// A spelled pitch class: letter plus accidental.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Note {
    pub letter: Letter,
    pub accidental: Accidental,
}

impl Note {
    pub const fn new(letter: Letter, accidental: Accidental) -> Self {
        Self { letter, accidental }
    }

    pub const fn natural(letter: Letter) -> Self {
        Self::new(letter, Accidental::Natural)
    }

    pub fn pitch_class(&self) -> u8 {
        (self.letter.natural_pitch_class() as i8 + self.accidental.semitones()).rem_euclid(12) as u8
    }

    /// Same sounding pitch class, regardless of spelling.
    pub fn is_enharmonic(&self, other: &Note) -> bool {
        self == other || self.pitch_class() == other.pitch_class()
    }
}

/// Splits a leading note name off `s`, returning the note and the rest.
///
/// Accidental marks are consumed greedily, so `"Bbm"` is `Bb` + `"m"` and
/// `"Bdim"` is `B` + `"dim"`.
pub(crate) fn split_note(s: &str) -> Option<(Note, &str)> {
    let mut chars = s.char_indices();
    let (_, first) = chars.next()?;
    let letter = Letter::from_char(first)?;
    let marks_start = first.len_utf8();
    let marks_end = s[marks_start..]
        .char_indices()
        .find(|(_, c)| !matches!(c, '#' | '♯' | 'b' | '♭' | 'x'))
        .map(|(i, _)| marks_start + i)
        .unwrap_or(s.len());
    let accidental = Accidental::from_marks(&s[marks_start..marks_end])?;
    Some((Note::new(letter, accidental), &s[marks_end..]))
}

impl FromStr for Note {
    type Err = TheoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match split_note(s.trim()) {
            Some((note, "")) => Ok(note),
            _ => Err(TheoryError::InvalidNote(s.to_string())),
        }
    }
}

impl TryFrom<String> for Note {
    type Error = TheoryError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Note> for String {
    fn from(note: Note) -> Self {
        note.to_string()
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.letter, self.accidental.symbol())
    }
}
