use super::note::{split_note, Note};
use crate::error::TheoryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Major,
    Minor,
    Diminished,
}

impl Quality {
    pub const ALL: [Quality; 3] = [Quality::Major, Quality::Minor, Quality::Diminished];

    /// Suffix appended to the root in a chord name.
    pub fn suffix(self) -> &'static str {
        match self {
            Quality::Major => "",
            Quality::Minor => "m",
            Quality::Diminished => "°",
        }
    }

    fn from_suffix(suffix: &str) -> Option<Quality> {
        match suffix {
            "" | "M" | "maj" => Some(Quality::Major),
            "m" | "min" => Some(Quality::Minor),
            "°" | "o" | "dim" => Some(Quality::Diminished),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Chord {
    pub root: Note,
    pub quality: Quality,
}

impl Chord {
    pub const fn new(root: Note, quality: Quality) -> Self {
        Self { root, quality }
    }

    /// Same quality and enharmonically equal roots.
    pub fn is_equivalent(&self, other: &Chord) -> bool {
        self.quality == other.quality && self.root.is_enharmonic(&other.root)
    }
}

/// Game-level chord equality: `C#` and `Db` major match, `C` and `Cm` don't.
pub fn equivalent(a: &Chord, b: &Chord) -> bool {
    a.is_equivalent(b)
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.root, self.quality.suffix())
    }
}

impl FromStr for Chord {
    type Err = TheoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        split_note(trimmed)
            .and_then(|(root, rest)| {
                Quality::from_suffix(rest.trim()).map(|quality| Chord::new(root, quality))
            })
            .ok_or_else(|| TheoryError::InvalidChord(s.to_string()))
    }
}

/// Roman-numeral label for a scale position: upper case for major, lower case
/// for minor, lower case with `°` for diminished.
pub fn roman_numeral(position: u8, quality: Quality) -> Option<String> {
    const NUMERALS: [&str; 7] = ["I", "II", "III", "IV", "V", "VI", "VII"];
    let numeral = NUMERALS.get(usize::from(position).checked_sub(1)?)?;
    Some(match quality {
        Quality::Major => numeral.to_string(),
        Quality::Minor => numeral.to_lowercase(),
        Quality::Diminished => format!("{}°", numeral.to_lowercase()),
    })
}
