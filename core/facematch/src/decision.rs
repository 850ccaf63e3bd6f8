use std::fmt;
use std::str::FromStr;

/// Reference threshold for cosine distance between face embeddings.
pub const DEFAULT_THRESHOLD: f32 = 0.55;

/// Which side of the threshold counts as a match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchPolarity {
    /// `distance <= threshold` verifies. Right for distance metrics where
    /// smaller means closer, such as the cosine distance scorer shipped here.
    #[default]
    DistanceAtMost,
    /// `distance >= threshold` verifies. Only for scorers whose output grows
    /// with similarity.
    DistanceAtLeast,
}

impl FromStr for MatchPolarity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "at-most" | "at_most" | "lower-is-match" => Ok(MatchPolarity::DistanceAtMost),
            "at-least" | "at_least" | "higher-is-match" => Ok(MatchPolarity::DistanceAtLeast),
            other => Err(format!(
                "unknown match polarity '{other}', expected 'at-most' or 'at-least'"
            )),
        }
    }
}

impl fmt::Display for MatchPolarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchPolarity::DistanceAtMost => f.write_str("at-most"),
            MatchPolarity::DistanceAtLeast => f.write_str("at-least"),
        }
    }
}

/// Outcome of comparing a distance against the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Same person.
    Verified,
    /// Scored, but not close enough.
    NotVerified,
}

/// Apply the threshold. A NaN distance never verifies.
pub fn decide(distance: f32, threshold: f32, polarity: MatchPolarity) -> Decision {
    let matched = match polarity {
        MatchPolarity::DistanceAtMost => distance <= threshold,
        MatchPolarity::DistanceAtLeast => distance >= threshold,
    };
    if matched {
        Decision::Verified
    } else {
        Decision::NotVerified
    }
}
