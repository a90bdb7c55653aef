//! Q16.16 Fixed-Point Arithmetic
//!
//! Integer-only fractional values for the turn engine. Collision times
//! inside a turn and event delays are expressed in this format so the
//! simulation never touches floating point.
//!
//! ## Format: Q16.16
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Bit Layout: Q16.16 (32-bit signed integer)                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  [S][IIIIIIIIIIIIIIII][FFFFFFFFFFFFFFFF]                    │
//! │   │  └──── 16 bits ────┘└──── 16 bits ────┘                 │
//! │   └─ Sign bit                                               │
//! │                                                             │
//! │  Turn time:  0 = start of turn, FIXED_ONE = end of turn     │
//! │  Delays:     FIXED_ONE = one tween unit                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```

/// Q16.16 fixed-point number stored as i32.
/// 16 bits integer, 16 bits fractional.
pub type Fixed = i32;

/// Number of fractional bits (16)
pub const FIXED_SCALE: i32 = 16;

/// 1.0 in fixed-point (65536)
pub const FIXED_ONE: Fixed = 1 << FIXED_SCALE; // 65536

/// 0.5 in fixed-point (32768)
pub const FIXED_HALF: Fixed = FIXED_ONE >> 1; // 32768

/// 0.25 in fixed-point (16384)
pub const FIXED_QUARTER: Fixed = FIXED_ONE >> 2; // 16384

// =============================================================================
// TURN-TIME CONSTANTS
// =============================================================================

/// Contact at the very start of a turn (wall stops, head-on pairs one cell apart).
pub const TURN_START: Fixed = 0;

/// End of a turn. Contacts at or after this time never happen.
pub const TURN_END: Fixed = FIXED_ONE;

/// Tie-break time for perpendicular contacts: 1/256 of a turn.
pub const COLLISION_TIE_EPSILON: Fixed = FIXED_ONE >> 8; // 256

// =============================================================================
// CORE OPERATIONS
// =============================================================================

/// Integer to fixed-point.
#[inline]
pub const fn from_int(i: i32) -> Fixed {
    i << FIXED_SCALE
}

/// Clamp a fixed-point value into `[min, max]`.
#[inline]
pub fn fixed_clamp(x: Fixed, min: Fixed, max: Fixed) -> Fixed {
    x.max(min).min(max)
}

/// Contact time of two opposing movers whose leading edges are `gap`
/// empty cells apart.
///
/// The closing distance maps onto the turn in reverse: adjacent movers
/// only barely overlap by the end of the turn and meet just before
/// `TURN_END`, while movers with one empty cell between them contact
/// mid-step at `TURN_START`. Returns `None` when the gap is too wide for
/// their paths to cross within one turn.
#[inline]
pub fn head_on_contact_time(gap: i32) -> Option<Fixed> {
    if gap > 1 {
        return None;
    }
    let t = TURN_END - from_int(gap.max(0));
    Some(fixed_clamp(t, TURN_START, TURN_END - 1))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(FIXED_ONE, 65536);
        assert_eq!(FIXED_HALF, 32768);
        assert_eq!(FIXED_QUARTER, 16384);
        assert!(COLLISION_TIE_EPSILON > TURN_START);
        assert!(COLLISION_TIE_EPSILON < FIXED_HALF);
    }

    #[test]
    fn test_clamp() {
        assert_eq!(fixed_clamp(-5, 0, FIXED_ONE), 0);
        assert_eq!(fixed_clamp(FIXED_ONE * 3, 0, FIXED_ONE), FIXED_ONE);
        assert_eq!(fixed_clamp(FIXED_HALF, 0, FIXED_ONE), FIXED_HALF);
        assert_eq!(from_int(3), 3 * FIXED_ONE);
    }

    #[test]
    fn test_head_on_contact_time() {
        // Adjacent movers barely overlap: contact lands just inside the turn
        let adjacent = head_on_contact_time(0).unwrap();
        assert_eq!(adjacent, TURN_END - 1);
        assert!(adjacent > FIXED_HALF);
        // One empty cell between: contact mid-step, ahead of any tie-break
        let one_between = head_on_contact_time(1).unwrap();
        assert_eq!(one_between, TURN_START);
        assert!(one_between < COLLISION_TIE_EPSILON);
        // A wider gap closes the turn with the movers still apart
        assert_eq!(head_on_contact_time(2), None);
        // Already overlapping is treated like adjacent
        assert_eq!(head_on_contact_time(-1), Some(TURN_END - 1));
    }

    #[test]
    fn test_closer_movers_meet_later() {
        let near = head_on_contact_time(0).unwrap();
        let far = head_on_contact_time(1).unwrap();
        assert!(far < near);
        assert!(near < TURN_END);
    }
}
