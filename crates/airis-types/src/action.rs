//! The closed action vocabulary shared with the decision service.
//!
//! An [`ActionToken`] is a [`Verb`] paired with a [`Heading`].  Its textual
//! form (`"move 90"`, `"jump 315"`) is what travels on the wire.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::AirisError;
use crate::pose::Cell;

/// `(Δx, Δz)` for each heading bucket, indexed by `degrees / 45`.
const HEADING_OFFSETS: [(i32, i32); 8] = [
    (0, 1),   // 0
    (-1, 1),  // 45
    (-1, 0),  // 90
    (-1, -1), // 135
    (0, -1),  // 180
    (1, -1),  // 225
    (1, 0),   // 270
    (1, 1),   // 315
];

/// One of the eight 45° yaw buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Heading(u8);

impl Heading {
    /// All buckets in ascending order of degrees.
    pub const ALL: [Heading; 8] = [
        Heading(0),
        Heading(1),
        Heading(2),
        Heading(3),
        Heading(4),
        Heading(5),
        Heading(6),
        Heading(7),
    ];

    /// Exact bucket for `degrees`, or `None` when it is not a multiple of 45
    /// in `[0, 360)`.
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        if (0..360).contains(&degrees) && degrees % 45 == 0 {
            Some(Heading((degrees / 45) as u8))
        } else {
            None
        }
    }

    /// Nearest bucket to an arbitrary yaw in degrees.
    pub fn nearest(yaw_deg: f64) -> Self {
        let bucket = (yaw_deg / 45.0).round() as i64;
        Heading(bucket.rem_euclid(8) as u8)
    }

    pub fn degrees(&self) -> i32 {
        self.0 as i32 * 45
    }

    /// Signed `(Δx, Δz)` step one cell along this heading.
    pub fn offset(&self) -> (i32, i32) {
        HEADING_OFFSETS[self.0 as usize]
    }

    /// The neighbouring cell one step from `from` along this heading.
    pub fn step(&self, from: Cell) -> Cell {
        let (dx, dz) = self.offset();
        Cell::new(from.x + dx, from.y, from.z + dz)
    }
}

/// What the agent does along the chosen heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Move,
    Jump,
}

impl Verb {
    fn as_str(&self) -> &'static str {
        match self {
            Verb::Move => "move",
            Verb::Jump => "jump",
        }
    }
}

/// A member of the 16-element `{move, jump} × {0, 45, …, 315}` vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionToken {
    pub verb: Verb,
    pub heading: Heading,
}

impl ActionToken {
    pub fn new(verb: Verb, heading: Heading) -> Self {
        Self { verb, heading }
    }

    /// Every token, moves first, in ascending heading order.
    pub fn all() -> impl Iterator<Item = ActionToken> {
        [Verb::Move, Verb::Jump]
            .into_iter()
            .flat_map(|verb| Heading::ALL.into_iter().map(move |h| ActionToken::new(verb, h)))
    }

    /// Textual names of [`ActionToken::all`], as sent to `initialize`.
    pub fn vocabulary() -> Vec<String> {
        Self::all().map(|a| a.to_string()).collect()
    }
}

impl fmt::Display for ActionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.verb.as_str(), self.heading.degrees())
    }
}

impl FromStr for ActionToken {
    type Err = AirisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || AirisError::UnknownAction(s.to_string());
        let (verb, degrees) = s.trim().split_once(' ').ok_or_else(unknown)?;
        let verb = match verb {
            "move" => Verb::Move,
            "jump" => Verb::Jump,
            _ => return Err(unknown()),
        };
        let heading = degrees
            .trim()
            .parse::<i32>()
            .ok()
            .and_then(Heading::from_degrees)
            .ok_or_else(unknown)?;
        Ok(ActionToken::new(verb, heading))
    }
}
