//! Player input, quantized for lockstep simulation.
//!
//! Clients send joystick deflections as `i8` pairs. Everything that
//! reaches the simulation goes through [`MOVE_LUT`] so that every
//! machine turns the same byte into the same `Fixed` value. Frames are
//! recorded per player as tick-stamped change points, which keeps a
//! full match recording small enough to embed in the end-of-match
//! record.

use serde::{Serialize, Deserialize};
use crate::core::fixed::Fixed;
use crate::core::hash::{StateHash, StateHasher};
use crate::core::vec2::FixedVec2;
use crate::game::state::PlayerId;

// =============================================================================
// MOVE LOOKUP TABLE
// =============================================================================

/// Maps every raw joystick byte (indexed as `u8`) to a `Fixed`
/// deflection in [-1.0, +1.0].
///
/// The scale factor 65536/127 is not an integer, so the quotient is
/// truncated toward zero. Truncation is symmetric, which keeps
/// `lut[+v] == -lut[-v]` across the whole range. The byte -128 never
/// comes from a held stick; it is the "released" sentinel and maps to
/// zero.
///
/// Indexing through a table rather than dividing at call sites makes
/// the conversion identical on every target, whatever the compiler
/// does with the division.
pub static MOVE_LUT: [Fixed; 256] = {
    let mut lut = [0i32; 256];
    let mut i = 0i32;
    while i < 256 {
        // Index 0..=127 holds the positive half, 128..=255 the negative.
        let signed = if i < 128 { i } else { i - 256 };

        if signed == -128 {
            // Released-stick sentinel.
            lut[i as usize] = 0;
        } else {
            lut[i as usize] = (signed * 65536) / 127;
        }
        i += 1;
    }
    lut
};

/// Table-driven conversion from a raw joystick byte to `Fixed`.
#[inline]
pub fn move_to_fixed(input: i8) -> Fixed {
    MOVE_LUT[(input as u8) as usize]
}

// =============================================================================
// INPUT TYPES
// =============================================================================

/// One tick's worth of input from one player.
///
/// Deliberately tick-free: the tick lives on [`InputDelta`], so
/// identical consecutive frames compare equal and compress away.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(C)]
pub struct InputFrame {
    /// Joystick X, -127..=+127. -128 means the stick is released.
    pub move_x: i8,
    /// Joystick Y, -127..=+127. -128 means the stick is released.
    pub move_y: i8,
    /// Bit 0 is the dash trigger. Remaining bits are reserved.
    pub flags: u8,
    /// Swipe direction X for a swipe-triggered dash, 0 when absent.
    pub dash_x: i8,
    /// Swipe direction Y for a swipe-triggered dash, 0 when absent.
    pub dash_y: i8,
}

impl InputFrame {
    /// Sentinel for a released joystick axis.
    pub const NO_INPUT: i8 = -128;

    /// Dash trigger bit in `flags`.
    pub const FLAG_DASH: u8 = 0x01;

    /// Frame with the stick released and no flags set.
    pub const fn new() -> Self {
        Self {
            move_x: Self::NO_INPUT,
            move_y: Self::NO_INPUT,
            flags: 0,
            dash_x: 0,
            dash_y: 0,
        }
    }

    /// Frame holding a stick deflection only.
    pub const fn with_movement(move_x: i8, move_y: i8) -> Self {
        Self {
            move_x,
            move_y,
            flags: 0,
            dash_x: 0,
            dash_y: 0,
        }
    }

    /// Frame with the dash trigger set and an optional swipe hint.
    pub const fn with_dash(move_x: i8, move_y: i8, dash_x: i8, dash_y: i8) -> Self {
        Self {
            move_x,
            move_y,
            flags: Self::FLAG_DASH,
            dash_x,
            dash_y,
        }
    }

    /// Stick deflection as a fixed-point vector, via [`MOVE_LUT`].
    #[inline]
    pub fn move_direction(&self) -> FixedVec2 {
        FixedVec2 {
            x: move_to_fixed(self.move_x),
            y: move_to_fixed(self.move_y),
        }
    }

    /// Whether the dash trigger bit is set.
    #[inline]
    pub fn dash_pressed(&self) -> bool {
        self.flags & Self::FLAG_DASH != 0
    }

    /// Swipe direction for the dash, if the client supplied one.
    ///
    /// `None` for button dashes (both hint bytes zero). Dash resolution
    /// then falls back to the stick direction, and past that to the
    /// player's facing.
    #[inline]
    pub fn dash_hint(&self) -> Option<FixedVec2> {
        if self.dash_x == 0 && self.dash_y == 0 {
            return None;
        }
        Some(FixedVec2 {
            x: move_to_fixed(self.dash_x),
            y: move_to_fixed(self.dash_y),
        })
    }

    /// True when the stick is released and no flags are set.
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.move_x == Self::NO_INPUT
            && self.move_y == Self::NO_INPUT
            && self.flags == 0
    }

    /// Set or clear the dash trigger bit.
    #[inline]
    pub fn set_dash(&mut self, pressed: bool) {
        if pressed {
            self.flags |= Self::FLAG_DASH;
        } else {
            self.flags &= !Self::FLAG_DASH;
        }
    }
}

/// A change point in a player's input stream.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct InputDelta {
    /// First tick at which `frame` was in effect.
    pub tick: u32,
    /// The frame that took effect.
    pub frame: InputFrame,
}

// =============================================================================
// INPUT RECORDING
// =============================================================================

/// Full input history for one player across one match.
///
/// Frames are stored as change points only. Ticks between change
/// points replay the previous frame, so a player holding a direction
/// for three seconds costs one entry, not 180. Together with the match
/// seed, the recordings are sufficient to re-run the match bit for
/// bit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlayerInputBuffer {
    /// Owner of this input stream
    pub player_id: PlayerId,

    /// Match the stream belongs to
    pub match_id: [u8; 16],

    /// Seed the match ran on
    pub rng_seed: u64,

    /// First recorded tick (zero in practice)
    pub start_tick: u32,

    /// Last recorded tick
    pub end_tick: u32,

    /// Change points, ascending by tick.
    deltas: Vec<InputDelta>,

    /// Previous frame, for change detection while recording.
    #[serde(skip)]
    last_frame: InputFrame,
}

impl PlayerInputBuffer {
    /// Empty recording for one player.
    pub fn new(player_id: PlayerId, match_id: [u8; 16], rng_seed: u64) -> Self {
        Self {
            player_id,
            match_id,
            rng_seed,
            start_tick: 0,
            end_tick: 0,
            deltas: Vec::with_capacity(512),
            last_frame: InputFrame::new(),
        }
    }

    /// Record the frame in effect at `tick`.
    ///
    /// Stores a change point only when the frame differs from the
    /// previous one. Ticks must be nondecreasing.
    pub fn record(&mut self, tick: u32, frame: InputFrame) {
        self.end_tick = tick;
        if frame != self.last_frame {
            self.deltas.push(InputDelta { tick, frame });
            self.last_frame = frame;
        }
    }

    /// Frame in effect at `tick`.
    ///
    /// Binary-searches the change points. Ticks before the first
    /// change point replay the idle frame.
    pub fn get_input_at(&self, tick: u32) -> InputFrame {
        if self.deltas.is_empty() {
            return InputFrame::new();
        }
        let idx = self.deltas.partition_point(|d| d.tick <= tick);
        if idx == 0 {
            InputFrame::new()
        } else {
            self.deltas[idx - 1].frame
        }
    }

    /// Number of stored change points.
    pub fn delta_count(&self) -> usize {
        self.deltas.len()
    }

    /// Stamp the final tick once the match is over.
    pub fn finalize(&mut self, end_tick: u32) {
        self.end_tick = end_tick;
    }

    /// Digest of the whole recording.
    ///
    /// Stored alongside the recording in the match record; a replay
    /// checks it before trusting the inputs it is about to feed in.
    pub fn content_hash(&self) -> StateHash {
        let mut hasher = StateHasher::for_input_buffer();
        hasher.update_uuid(&self.player_id.0);
        hasher.update_uuid(&self.match_id);
        hasher.update_u64(self.rng_seed);
        hasher.update_u32(self.start_tick);
        hasher.update_u32(self.end_tick);
        for delta in &self.deltas {
            hasher.update_u32(delta.tick);
            hasher.update_u8(delta.frame.move_x as u8);
            hasher.update_u8(delta.frame.move_y as u8);
            hasher.update_u8(delta.frame.flags);
            hasher.update_u8(delta.frame.dash_x as u8);
            hasher.update_u8(delta.frame.dash_y as u8);
        }
        hasher.finalize()
    }
}

// =============================================================================
// TESTS
// =============================================================================
