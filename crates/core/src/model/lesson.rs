use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::model::ids::{LessonId, SubjectId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LessonError {
    #[error("lesson title cannot be empty")]
    EmptyTitle,

    #[error("subject name cannot be empty")]
    EmptySubjectName,

    #[error("invalid video url: {0}")]
    InvalidVideoUrl(String),

    #[error("unknown difficulty level: {0}")]
    UnknownDifficulty(String),
}

//
// ─── SUBJECT ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    id: SubjectId,
    name: String,
    description: Option<String>,
    icon: Option<String>,
}

impl Subject {
    /// # Errors
    ///
    /// Returns `LessonError::EmptySubjectName` if the name is blank.
    pub fn new(
        id: SubjectId,
        name: impl Into<String>,
        description: Option<String>,
        icon: Option<String>,
    ) -> Result<Self, LessonError> {
        let name = name.into().trim().to_owned();
        if name.is_empty() {
            return Err(LessonError::EmptySubjectName);
        }
        Ok(Self {
            id,
            name,
            description: description.filter(|d| !d.trim().is_empty()),
            icon,
        })
    }

    #[must_use]
    pub fn id(&self) -> SubjectId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }
}

//
// ─── DIFFICULTY ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = LessonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(Difficulty::Beginner),
            "intermediate" => Ok(Difficulty::Intermediate),
            "advanced" => Ok(Difficulty::Advanced),
            other => Err(LessonError::UnknownDifficulty(other.to_owned())),
        }
    }
}

//
// ─── LESSON ────────────────────────────────────────────────────────────────────
//

/// A unit of learning content: text, optional videos, and (elsewhere) a quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    id: LessonId,
    subject_id: Option<SubjectId>,
    title: String,
    content: String,
    difficulty: Difficulty,
    tags: Vec<String>,
    order_index: i32,
    videos: Vec<Url>,
}

impl Lesson {
    /// Build a lesson, validating title and video links.
    ///
    /// Duplicate video links are collapsed so the video count matches what a
    /// learner can actually watch.
    ///
    /// # Errors
    ///
    /// Returns `LessonError` if the title is blank or a video link is not a URL.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: LessonId,
        subject_id: Option<SubjectId>,
        title: impl Into<String>,
        content: impl Into<String>,
        difficulty: Difficulty,
        tags: Vec<String>,
        order_index: i32,
        videos: &[&str],
    ) -> Result<Self, LessonError> {
        let title = title.into().trim().to_owned();
        if title.is_empty() {
            return Err(LessonError::EmptyTitle);
        }

        let mut parsed: Vec<Url> = Vec::with_capacity(videos.len());
        for raw in videos {
            let url = Url::parse(raw.trim())
                .map_err(|_| LessonError::InvalidVideoUrl((*raw).to_owned()))?;
            if !parsed.contains(&url) {
                parsed.push(url);
            }
        }

        Ok(Self {
            id,
            subject_id,
            title,
            content: content.into(),
            difficulty,
            tags: tags
                .into_iter()
                .map(|t| t.trim().to_owned())
                .filter(|t| !t.is_empty())
                .collect(),
            order_index,
            videos: parsed,
        })
    }

    #[must_use]
    pub fn id(&self) -> LessonId {
        self.id
    }

    #[must_use]
    pub fn subject_id(&self) -> Option<SubjectId> {
        self.subject_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    #[must_use]
    pub fn order_index(&self) -> i32 {
        self.order_index
    }

    #[must_use]
    pub fn videos(&self) -> &[Url] {
        &self.videos
    }

    /// Number of distinct videos linked from this lesson.
    #[must_use]
    pub fn video_count(&self) -> u32 {
        u32::try_from(self.videos.len()).unwrap_or(u32::MAX)
    }

    /// Returns the lesson's copy of `raw` if it is one of its videos.
    #[must_use]
    pub fn find_video(&self, raw: &str) -> Option<&Url> {
        let url = Url::parse(raw.trim()).ok()?;
        self.videos.iter().find(|v| **v == url)
    }
}

/// Lesson shown when the catalog has none (or a demo id is requested).
#[must_use]
pub fn introductory_lesson() -> Lesson {
    Lesson {
        id: LessonId::new(uuid::Uuid::nil()),
        subject_id: None,
        title: "Introduction to Data Structures".into(),
        content: "Data structures are fundamental concepts in computer science that enable \
                  efficient data organization and manipulation. They provide the foundation \
                  for designing algorithms and solving complex problems.\n\n\
                  In this lesson, we'll explore:\n\
                  - What are data structures and why they matter\n\
                  - Classification of data structures (linear vs non-linear)\n\
                  - Time and space complexity basics\n\
                  - Common operations on data structures"
            .into(),
        difficulty: Difficulty::Beginner,
        tags: vec!["basics".into(), "intro".into()],
        order_index: 0,
        videos: Vec::new(),
    }
}
