use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Kind of content a question presents on the public display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum QuestionKind {
    /// Plain text prompt and answer.
    Text,
    /// Prompt and answer images.
    Image,
    /// Video clip with cue points.
    Video,
    /// Audio clip with cue points.
    Audio,
}

impl QuestionKind {
    /// Video and audio questions drive the media sub-state.
    pub fn is_timed_media(self) -> bool {
        matches!(self, QuestionKind::Video | QuestionKind::Audio)
    }
}

/// Playback window for a video/audio question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MediaCue {
    /// Offset (milliseconds) where playback starts.
    #[serde(default)]
    pub start_at_ms: u64,
    /// Offset (milliseconds) where playback pauses for the question; `None` plays to the end.
    #[serde(default)]
    pub pause_at_ms: Option<u64>,
}

/// A single question of a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Question {
    /// Content type of the question.
    pub kind: QuestionKind,
    /// Prompt text, also used as the lookup key inside its category.
    pub prompt: String,
    /// Text of the expected answer.
    #[serde(default)]
    pub answer: String,
    /// Media shown while asking (image, video or audio source).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_src: Option<String>,
    /// Media shown with the answer. Images fall back to the prompt image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_src: Option<String>,
    /// Cue points, only meaningful for video/audio.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cue: Option<MediaCue>,
    /// Points awarded for a correct answer (and removed for a wrong one).
    pub reward: u32,
    /// Whether the question has already been played.
    #[serde(default)]
    pub complete: bool,
}

impl Question {
    /// Source to show alongside the answer, falling back to the prompt media for images.
    pub fn answer_media(&self) -> Option<&str> {
        match (self.kind, self.answer_src.as_deref()) {
            (_, Some(src)) => Some(src),
            (QuestionKind::Image, None) => self.prompt_src.as_deref(),
            _ => None,
        }
    }
}

/// Titled, ordered group of questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Category {
    /// Title shown on the board and used for lookups from host commands.
    pub title: String,
    /// Questions in board order.
    pub questions: Vec<Question>,
}

/// Stable reference to a question on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct QuestionKey {
    /// Index of the category on the board.
    pub category: usize,
    /// Index of the question inside its category.
    pub question: usize,
}

/// Reasons a title lookup can fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("unknown category `{0}`")]
    UnknownCategory(String),
    #[error("category title `{0}` is not unique")]
    AmbiguousCategory(String),
    #[error("unknown question `{prompt}` in category `{category}`")]
    UnknownQuestion { category: String, prompt: String },
    #[error("question `{prompt}` is not unique in category `{category}`")]
    AmbiguousQuestion { category: String, prompt: String },
}

/// The loaded set of categories for the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct Board {
    categories: Vec<Category>,
}

impl Board {
    /// Wrap the categories delivered by the content loader.
    pub fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    /// Categories in board order.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Resolve a category title and question prompt to a stable key.
    ///
    /// Both lookups must match exactly one entry.
    pub fn locate(&self, category: &str, prompt: &str) -> Result<QuestionKey, LookupError> {
        let category_index = unique_match(
            self.categories
                .iter()
                .enumerate()
                .filter(|(_, c)| c.title == category)
                .map(|(index, _)| index),
        )
        .map_err(|found| match found {
            0 => LookupError::UnknownCategory(category.to_string()),
            _ => LookupError::AmbiguousCategory(category.to_string()),
        })?;

        let question_index = unique_match(
            self.categories[category_index]
                .questions
                .iter()
                .enumerate()
                .filter(|(_, q)| q.prompt == prompt)
                .map(|(index, _)| index),
        )
        .map_err(|found| match found {
            0 => LookupError::UnknownQuestion {
                category: category.to_string(),
                prompt: prompt.to_string(),
            },
            _ => LookupError::AmbiguousQuestion {
                category: category.to_string(),
                prompt: prompt.to_string(),
            },
        })?;

        Ok(QuestionKey {
            category: category_index,
            question: question_index,
        })
    }

    /// Question behind `key`, if the key points inside the board.
    pub fn question(&self, key: QuestionKey) -> Option<&Question> {
        self.categories
            .get(key.category)
            .and_then(|category| category.questions.get(key.question))
    }

    /// Category behind `key`.
    pub fn category(&self, key: QuestionKey) -> Option<&Category> {
        self.categories.get(key.category)
    }

    /// Set the completion flag, returning whether it actually changed.
    pub fn set_complete(&mut self, key: QuestionKey, complete: bool) -> bool {
        match self
            .categories
            .get_mut(key.category)
            .and_then(|category| category.questions.get_mut(key.question))
        {
            Some(question) if question.complete != complete => {
                question.complete = complete;
                true
            }
            _ => false,
        }
    }

    /// True once every question on the board has been played.
    pub fn all_complete(&self) -> bool {
        self.categories
            .iter()
            .flat_map(|category| category.questions.iter())
            .all(|question| question.complete)
    }

    /// Number of questions not yet played.
    pub fn remaining(&self) -> usize {
        self.categories
            .iter()
            .flat_map(|category| category.questions.iter())
            .filter(|question| !question.complete)
            .count()
    }
}

/// Return the single yielded index, or the number of matches when it is not exactly one.
fn unique_match(mut matches: impl Iterator<Item = usize>) -> Result<usize, usize> {
    match (matches.next(), matches.next()) {
        (Some(index), None) => Ok(index),
        (None, _) => Err(0),
        (Some(_), Some(_)) => Err(2),
    }
}
