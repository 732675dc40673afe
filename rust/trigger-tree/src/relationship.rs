//! The four-valued relationship between clauses, triggers, and nodes
//!
//! Everything in the engine that compares two conditions reduces to one of
//! four answers: the first condition covers strictly fewer states
//! (`Specializes`), the same states (`Equal`), strictly more states
//! (`Generalizes`), or the two cannot be ordered at all (`Incomparable`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Relationship between two conditions, expressed as "first relative to second".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    /// The first condition covers a strict subset of the states the second covers.
    Specializes,
    /// Both conditions cover exactly the same states.
    Equal,
    /// The first condition covers a strict superset of the states the second covers.
    Generalizes,
    /// Neither condition covers a subset of the other's states.
    Incomparable,
}

impl Relationship {
    /// Flip the orientation of the relationship.
    ///
    /// Comparisons are often computed in a normalized order (shorter clause
    /// first); `swap` converts the result back to the caller's orientation.
    pub fn swap(self) -> Self {
        match self {
            Relationship::Specializes => Relationship::Generalizes,
            Relationship::Generalizes => Relationship::Specializes,
            other => other,
        }
    }

    pub(crate) fn swap_if(self, swapped: bool) -> Self {
        if swapped { self.swap() } else { self }
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Relationship::Specializes => "specializes",
            Relationship::Equal => "equal",
            Relationship::Generalizes => "generalizes",
            Relationship::Incomparable => "incomparable",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_is_involutive() {
        for relationship in [
            Relationship::Specializes,
            Relationship::Equal,
            Relationship::Generalizes,
            Relationship::Incomparable,
        ] {
            assert_eq!(relationship.swap().swap(), relationship);
        }
    }

    #[test]
    fn test_swap_exchanges_orderings() {
        assert_eq!(Relationship::Specializes.swap(), Relationship::Generalizes);
        assert_eq!(Relationship::Generalizes.swap(), Relationship::Specializes);
        assert_eq!(Relationship::Equal.swap(), Relationship::Equal);
        assert_eq!(Relationship::Incomparable.swap(), Relationship::Incomparable);
    }
}
