use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum WeightsError {
    #[error("milestone weights must sum to 100 (got {0})")]
    InvalidSum(u32),

    #[error("milestone weights must look like `content/video/quiz`: {0}")]
    Malformed(String),
}

//
// ─── WEIGHTS ───────────────────────────────────────────────────────────────────
//

/// Share of a lesson's completion granted by each milestone.
///
/// The three shares are whole percentages and always add up to 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawWeights", into = "RawWeights")]
pub struct MilestoneWeights {
    content: u8,
    video: u8,
    quiz: u8,
}

impl MilestoneWeights {
    /// Creates a weighting scheme.
    ///
    /// # Errors
    ///
    /// Returns `WeightsError::InvalidSum` unless the shares add up to 100.
    pub fn new(content: u8, video: u8, quiz: u8) -> Result<Self, WeightsError> {
        let sum = u32::from(content) + u32::from(video) + u32::from(quiz);
        if sum != 100 {
            return Err(WeightsError::InvalidSum(sum));
        }
        Ok(Self {
            content,
            video,
            quiz,
        })
    }

    #[must_use]
    pub fn content(&self) -> u8 {
        self.content
    }

    #[must_use]
    pub fn video(&self) -> u8 {
        self.video
    }

    #[must_use]
    pub fn quiz(&self) -> u8 {
        self.quiz
    }

    /// Everything a learner can earn without taking the quiz.
    #[must_use]
    pub fn non_quiz(&self) -> u8 {
        self.content + self.video
    }
}

impl Default for MilestoneWeights {
    /// 30% content, 30% videos, 40% quiz.
    fn default() -> Self {
        Self {
            content: 30,
            video: 30,
            quiz: 40,
        }
    }
}

impl fmt::Display for MilestoneWeights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.content, self.video, self.quiz)
    }
}

impl FromStr for MilestoneWeights {
    type Err = WeightsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || WeightsError::Malformed(s.to_owned());
        let parts = s
            .split('/')
            .map(|part| part.trim().parse::<u8>().map_err(|_| malformed()))
            .collect::<Result<Vec<_>, _>>()?;
        match parts.as_slice() {
            [content, video, quiz] => Self::new(*content, *video, *quiz),
            _ => Err(malformed()),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RawWeights {
    content: u8,
    video: u8,
    quiz: u8,
}

impl TryFrom<RawWeights> for MilestoneWeights {
    type Error = WeightsError;

    fn try_from(raw: RawWeights) -> Result<Self, Self::Error> {
        Self::new(raw.content, raw.video, raw.quiz)
    }
}

impl From<MilestoneWeights> for RawWeights {
    fn from(w: MilestoneWeights) -> Self {
        Self {
            content: w.content,
            video: w.video,
            quiz: w.quiz,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_thirty_thirty_forty() {
        let w = MilestoneWeights::default();
        assert_eq!((w.content(), w.video(), w.quiz()), (30, 30, 40));
        assert_eq!(w.non_quiz(), 60);
        assert_eq!(w.to_string(), "30/30/40");
    }

    #[test]
    fn rejects_bad_sum() {
        assert_eq!(
            MilestoneWeights::new(50, 50, 10),
            Err(WeightsError::InvalidSum(110))
        );
        // 255 * 3 would overflow a u8 sum
        assert_eq!(
            MilestoneWeights::new(255, 255, 255),
            Err(WeightsError::InvalidSum(765))
        );
    }

    #[test]
    fn parses_slash_separated() {
        let w: MilestoneWeights = " 50 / 50 / 0 ".parse().unwrap();
        assert_eq!((w.content(), w.video(), w.quiz()), (50, 50, 0));
        assert!(matches!(
            "30/70".parse::<MilestoneWeights>(),
            Err(WeightsError::Malformed(_))
        ));
        assert!(matches!(
            "a/b/c".parse::<MilestoneWeights>(),
            Err(WeightsError::Malformed(_))
        ));
    }

    #[test]
    fn deserialization_validates() {
        let ok: MilestoneWeights =
            serde_json::from_str(r#"{"content":20,"video":40,"quiz":40}"#).unwrap();
        assert_eq!(ok.video(), 40);
        assert!(
            serde_json::from_str::<MilestoneWeights>(r#"{"content":20,"video":20,"quiz":20}"#)
                .is_err()
        );
    }
}
