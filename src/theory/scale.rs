use super::chord::{Chord, Quality};
use super::note::{split_note, Accidental, Letter, Note};
use crate::error::TheoryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const POSITIONS: std::ops::RangeInclusive<u8> = 1..=7;

const MAJOR_INTERVALS: [u8; 7] = [0, 2, 4, 5, 7, 9, 11];
const MINOR_INTERVALS: [u8; 7] = [0, 2, 3, 5, 7, 8, 10];

const MAJOR_QUALITIES: [Quality; 7] = [
    Quality::Major,
    Quality::Minor,
    Quality::Minor,
    Quality::Major,
    Quality::Major,
    Quality::Minor,
    Quality::Diminished,
];
const MINOR_QUALITIES: [Quality; 7] = [
    Quality::Minor,
    Quality::Diminished,
    Quality::Major,
    Quality::Minor,
    Quality::Minor,
    Quality::Major,
    Quality::Major,
];

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
pub enum Mode {
    Major,
    /// Natural minor.
    Minor,
}

impl Mode {
    fn pattern(self) -> (&'static [u8; 7], &'static [Quality; 7]) {
        match self {
            Mode::Major => (&MAJOR_INTERVALS, &MAJOR_QUALITIES),
            Mode::Minor => (&MINOR_INTERVALS, &MINOR_QUALITIES),
        }
    }
}

/// A tonic plus mode. Ordered major-before-minor, then by root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Key {
    pub mode: Mode,
    pub root: Note,
}

impl Key {
    /// The fourteen roots offered for both modes.
    pub const STANDARD_ROOTS: [Note; 14] = [
        Note::natural(Letter::C),
        Note::new(Letter::C, Accidental::Sharp),
        Note::new(Letter::D, Accidental::Flat),
        Note::natural(Letter::D),
        Note::new(Letter::E, Accidental::Flat),
        Note::natural(Letter::E),
        Note::natural(Letter::F),
        Note::new(Letter::F, Accidental::Sharp),
        Note::new(Letter::G, Accidental::Flat),
        Note::natural(Letter::G),
        Note::new(Letter::A, Accidental::Flat),
        Note::natural(Letter::A),
        Note::new(Letter::B, Accidental::Flat),
        Note::natural(Letter::B),
    ];

    pub const fn new(root: Note, mode: Mode) -> Self {
        Self { mode, root }
    }

    pub const fn major(root: Note) -> Self {
        Self::new(root, Mode::Major)
    }

    pub const fn minor(root: Note) -> Self {
        Self::new(root, Mode::Minor)
    }

    /// Chord built on `position` (1..=7) of this key.
    pub fn chord_at(&self, position: u8) -> Result<Chord, TheoryError> {
        chord_at(self, position)
    }

    pub fn scale(&self) -> Result<[Chord; 7], TheoryError> {
        scale(self)
    }
}

/// Spells the diatonic triad on `position` of `key`.
///
/// Each degree's letter is the tonic letter advanced by the degree index, so a
/// scale always uses every letter exactly once; only the accidental is derived
/// from the interval pattern.
pub fn chord_at(key: &Key, position: u8) -> Result<Chord, TheoryError> {
    if !POSITIONS.contains(&position) {
        return Err(TheoryError::InvalidPosition(position));
    }
    let degree = usize::from(position - 1);
    let (intervals, qualities) = key.mode.pattern();

    let letter = key.root.letter.advance(degree);
    let target = (key.root.pitch_class() + intervals[degree]) % 12;
    let adjustment = (target + 12 - letter.natural_pitch_class()) % 12;
    let accidental =
        Accidental::from_adjustment(adjustment).ok_or_else(|| TheoryError::Unspellable {
            key: key.to_string(),
            position,
        })?;

    Ok(Chord::new(Note::new(letter, accidental), qualities[degree]))
}

/// All seven diatonic triads of `key`, tonic first.
pub fn scale(key: &Key) -> Result<[Chord; 7], TheoryError> {
    let mut chords = [Chord::new(key.root, Quality::Major); 7];
    for (slot, position) in chords.iter_mut().zip(POSITIONS) {
        *slot = chord_at(key, position)?;
    }
    Ok(chords)
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            Mode::Major => write!(f, "{}", self.root),
            Mode::Minor => write!(f, "{}m", self.root),
        }
    }
}

impl FromStr for Key {
    type Err = TheoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TheoryError::InvalidKey(s.to_string());
        let (root, rest) = split_note(s.trim()).ok_or_else(invalid)?;
        match rest {
            "" => Ok(Key::major(root)),
            "m" => Ok(Key::minor(root)),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for Key {
    type Error = TheoryError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Key> for String {
    fn from(key: Key) -> Self {
        key.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;

    fn key(s: &str) -> Key {
        s.parse().unwrap()
    }

    fn names(chords: &[Chord]) -> Vec<String> {
        chords.iter().map(|c| c.to_string()).collect()
    }

    fn standard_keys() -> Vec<Key> {
        Key::STANDARD_ROOTS
            .iter()
            .flat_map(|&root| [Key::major(root), Key::minor(root)])
            .collect()
    }

    #[test]
    fn test_c_major_scale() {
        let chords = scale(&key("C")).unwrap();
        assert_eq!(
            names(&chords),
            ["C", "Dm", "Em", "F", "G", "Am", "B°"]
        );
    }

    #[test]
    fn test_e_minor_second_degree_is_f_sharp_diminished() {
        let chord = chord_at(&key("Em"), 2).unwrap();
        assert_eq!(chord, "F#°".parse().unwrap());
        assert_ne!(chord, "Gb°".parse().unwrap());
        assert_ne!(chord, "G°".parse().unwrap());
    }

    #[test]
    fn test_flat_and_sharp_keys() {
        assert_eq!(
            names(&scale(&key("F#")).unwrap()),
            ["F#", "G#m", "A#m", "B", "C#", "D#m", "E#°"]
        );
        assert_eq!(
            names(&scale(&key("Ebm")).unwrap()),
            ["Ebm", "F°", "Gb", "Abm", "Bbm", "Cb", "Db"]
        );
        assert_eq!(
            names(&scale(&key("Dbm")).unwrap()),
            ["Dbm", "Eb°", "Fb", "Gbm", "Abm", "Bbb", "Cb"]
        );
    }

    #[test]
    fn test_every_standard_scale_uses_each_letter_once() {
        for k in standard_keys() {
            let chords = scale(&k).unwrap();
            let letters: Vec<Letter> = chords.iter().map(|c| c.root.letter).sorted().collect();
            assert_eq!(letters, Letter::ALL.to_vec(), "letters of {k}");
        }
    }

    #[test]
    fn test_quality_patterns() {
        for k in standard_keys() {
            let qualities: Vec<Quality> = scale(&k).unwrap().iter().map(|c| c.quality).collect();
            let expected = match k.mode {
                Mode::Major => MAJOR_QUALITIES,
                Mode::Minor => MINOR_QUALITIES,
            };
            assert_eq!(qualities, expected.to_vec(), "qualities of {k}");
        }
    }

    #[test]
    fn test_pitch_classes_follow_intervals() {
        for k in standard_keys() {
            let (intervals, _) = k.mode.pattern();
            for (chord, interval) in scale(&k).unwrap().iter().zip(intervals) {
                assert_eq!(
                    chord.root.pitch_class(),
                    (k.root.pitch_class() + interval) % 12
                );
            }
        }
    }

    #[test]
    fn test_invalid_position() {
        assert_eq!(
            chord_at(&key("C"), 0),
            Err(TheoryError::InvalidPosition(0))
        );
        assert_eq!(
            chord_at(&key("C"), 8),
            Err(TheoryError::InvalidPosition(8))
        );
    }

    #[test]
    fn test_unspellable_degree_is_an_error() {
        let k = Key::major("B##".parse().unwrap());
        assert!(matches!(
            scale(&k),
            Err(TheoryError::Unspellable { .. })
        ));
    }

    #[test]
    fn test_key_parse_and_display() {
        assert_eq!(key("Em").to_string(), "Em");
        assert_eq!(key("F#m").to_string(), "F#m");
        assert_eq!(key("Bbm"), Key::minor("Bb".parse().unwrap()));
        assert_eq!(key("Bb"), Key::major("Bb".parse().unwrap()));
        assert!(matches!("Hm".parse::<Key>(), Err(TheoryError::InvalidKey(_))));
        assert!(matches!("C°".parse::<Key>(), Err(TheoryError::InvalidKey(_))));
    }
}
