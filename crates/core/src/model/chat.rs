use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One turn of a tutoring conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }
}

/// Tutoring subjects offered by the tutor, keyed by a short code.
pub const TUTOR_SUBJECTS: &[(&str, &str)] = &[
    ("dsa", "Data Structures & Algorithms"),
    ("math", "Mathematics"),
    ("physics", "Physics"),
    ("chemistry", "Chemistry"),
    ("programming", "Programming"),
];

/// Resolve a subject code to its display label; unknown codes pass through.
#[must_use]
pub fn subject_label(code: &str) -> &str {
    TUTOR_SUBJECTS
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(code.trim()))
        .map_or(code, |(_, label)| *label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_string(&ChatMessage::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }

    #[test]
    fn subject_codes_resolve() {
        assert_eq!(subject_label("DSA"), "Data Structures & Algorithms");
        assert_eq!(subject_label("History"), "History");
    }
}
