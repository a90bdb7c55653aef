//! Turn Inputs
//!
//! One input symbol drives one step. Inputs are stored as single bytes in
//! transcripts and written as single characters in scripts:
//!
//! ```text
//! U D L R   move up/down/left/right
//! .         wait
//! z y       undo / redo
//! !         restart
//! ```

use std::fmt;
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::coord::Coord;

/// An input symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Input {
    Up = 0,
    Down = 1,
    Left = 2,
    Right = 3,
    Wait = 4,
    Undo = 5,
    Redo = 6,
    Restart = 7,
}

/// Unknown input code or script character.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("unknown input code {0}")]
    UnknownCode(u8),
    #[error("unknown input character {0:?} at position {1}")]
    UnknownChar(char, usize),
}

impl Input {
    /// Every input, in code order.
    pub const ALL: [Input; 8] = [
        Input::Up,
        Input::Down,
        Input::Left,
        Input::Right,
        Input::Wait,
        Input::Undo,
        Input::Redo,
        Input::Restart,
    ];

    /// Movement direction. Zero for everything but the four moves.
    pub fn direction(self) -> Coord {
        match self {
            Input::Up => Coord::UP,
            Input::Down => Coord::DOWN,
            Input::Left => Coord::LEFT,
            Input::Right => Coord::RIGHT,
            _ => Coord::ZERO,
        }
    }

    /// Does this input run a full step (as opposed to rewinding history)?
    pub fn is_turn(self) -> bool {
        matches!(self, Input::Up | Input::Down | Input::Left | Input::Right | Input::Wait)
    }

    #[inline]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(code: u8) -> Result<Self, InputError> {
        Self::ALL
            .get(code as usize)
            .copied()
            .ok_or(InputError::UnknownCode(code))
    }

    pub fn to_char(self) -> char {
        match self {
            Input::Up => 'U',
            Input::Down => 'D',
            Input::Left => 'L',
            Input::Right => 'R',
            Input::Wait => '.',
            Input::Undo => 'z',
            Input::Redo => 'y',
            Input::Restart => '!',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        Self::ALL.iter().copied().find(|i| i.to_char() == c)
    }
}

impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

/// Parse a script such as `"RRU.zyL"`. Whitespace is ignored.
pub fn parse_script(script: &str) -> Result<Vec<Input>, InputError> {
    script
        .chars()
        .enumerate()
        .filter(|(_, c)| !c.is_whitespace())
        .map(|(i, c)| Input::from_char(c).ok_or(InputError::UnknownChar(c, i)))
        .collect()
}

/// Render inputs back to a script.
pub fn to_script(inputs: &[Input]) -> String {
    inputs.iter().map(|i| i.to_char()).collect()
}

/// Pack inputs one byte each.
pub fn pack(inputs: &[Input]) -> Vec<u8> {
    inputs.iter().map(|i| i.to_u8()).collect()
}

/// Unpack bytes written by [`pack`].
pub fn unpack(bytes: &[u8]) -> Result<Vec<Input>, InputError> {
    bytes.iter().map(|b| Input::from_u8(*b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_order() {
        for (i, input) in Input::ALL.iter().enumerate() {
            assert_eq!(input.to_u8() as usize, i);
            assert_eq!(Input::from_u8(i as u8), Ok(*input));
        }
        assert_eq!(Input::from_u8(8), Err(InputError::UnknownCode(8)));
    }

    #[test]
    fn test_directions() {
        assert_eq!(Input::Up.direction(), Coord::UP);
        assert_eq!(Input::Right.direction(), Coord::RIGHT);
        assert!(Input::Wait.direction().is_zero());
        assert!(Input::Undo.direction().is_zero());
        assert!(Input::Wait.is_turn());
        assert!(!Input::Redo.is_turn());
    }

    #[test]
    fn test_script_parsing() {
        let inputs = parse_script("RR U .\nzy!").unwrap();
        assert_eq!(
            inputs,
            vec![
                Input::Right,
                Input::Right,
                Input::Up,
                Input::Wait,
                Input::Undo,
                Input::Redo,
                Input::Restart,
            ]
        );
        assert_eq!(to_script(&inputs), "RRU.zy!");
        assert_eq!(parse_script("RxR"), Err(InputError::UnknownChar('x', 1)));
    }

    #[test]
    fn test_pack_unpack() {
        let inputs = vec![Input::Left, Input::Wait, Input::Restart];
        assert_eq!(unpack(&pack(&inputs)).unwrap(), inputs);
        assert!(unpack(&[0, 42]).is_err());
    }
}
