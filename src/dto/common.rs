use serde::Serialize;
use utoipa::ToSchema;

use crate::state::{
    board::{Category, MediaCue, Question, QuestionKind},
    players::Player,
};

/// Public projection of a player.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct PlayerSummary {
    pub slot: u8,
    pub name: String,
    /// `#rrggbb` indicator colour.
    pub colour: String,
    pub score: i32,
}

impl From<&Player> for PlayerSummary {
    fn from(player: &Player) -> Self {
        Self {
            slot: player.slot,
            name: player.name.clone(),
            colour: player.colour.to_string(),
            score: player.score,
        }
    }
}

/// Board tile; answers are never part of it.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct QuestionSummary {
    pub kind: QuestionKind,
    pub prompt: String,
    pub reward: u32,
    pub complete: bool,
}

impl From<&Question> for QuestionSummary {
    fn from(question: &Question) -> Self {
        Self {
            kind: question.kind,
            prompt: question.prompt.clone(),
            reward: question.reward,
            complete: question.complete,
        }
    }
}

/// Board column.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct CategorySummary {
    pub title: String,
    pub questions: Vec<QuestionSummary>,
}

impl From<&Category> for CategorySummary {
    fn from(category: &Category) -> Self {
        Self {
            title: category.title.clone(),
            questions: category.questions.iter().map(Into::into).collect(),
        }
    }
}

/// The question currently on screen.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct ActiveQuestionSummary {
    pub category: String,
    pub kind: QuestionKind,
    pub prompt: String,
    pub reward: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_src: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cue: Option<MediaCue>,
    /// Only filled once the answer has been revealed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_src: Option<String>,
}

impl ActiveQuestionSummary {
    /// Project `question`, hiding the answer unless `revealed`.
    pub fn new(category: &Category, question: &Question, revealed: bool) -> Self {
        Self {
            category: category.title.clone(),
            kind: question.kind,
            prompt: question.prompt.clone(),
            reward: question.reward,
            prompt_src: question.prompt_src.clone(),
            cue: question.cue,
            answer: revealed.then(|| question.answer.clone()),
            answer_src: revealed
                .then(|| question.answer_media().map(str::to_string))
                .flatten(),
        }
    }
}
