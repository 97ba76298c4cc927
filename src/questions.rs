use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const OTHER_OPTION_LABEL: &str = "Other (type your own answer)";

fn question_marker_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r"(?s)<!--QUESTION:(.*?)-->").expect("question marker regex must compile")
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Text,
    Choice,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionOption {
    pub label: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Question {
    pub header: String,
    pub question: String,
    pub kind: QuestionKind,
    pub options: Vec<QuestionOption>,
}

impl Question {
    pub fn text(header: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            question: question.into(),
            kind: QuestionKind::Text,
            options: Vec::new(),
        }
    }

    pub fn is_choice(&self) -> bool {
        self.kind == QuestionKind::Choice
    }
}

#[derive(Debug, Deserialize)]
struct MarkerPayload {
    #[serde(default)]
    questions: Vec<MarkerQuestion>,
}

#[derive(Debug, Deserialize)]
struct MarkerQuestion {
    #[serde(default)]
    question: String,
    #[serde(default)]
    header: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    options: Vec<Value>,
}

/// Finds every `<!--QUESTION:{...}-->` marker in `text` and returns the questions it carries,
/// in marker order. Markers whose payload is not valid JSON are ignored.
pub fn detect(text: &str) -> Vec<Question> {
    let mut questions = Vec::new();
    for caps in question_marker_regex().captures_iter(text) {
        let Ok(payload) = serde_json::from_str::<MarkerPayload>(caps[1].trim()) else {
            continue;
        };
        questions.extend(payload.questions.into_iter().map(normalize));
    }
    questions
}

pub fn strip_markers(text: &str) -> String {
    question_marker_regex().replace_all(text, "").into_owned()
}

fn normalize(raw: MarkerQuestion) -> Question {
    let options: Vec<QuestionOption> = raw.options.iter().filter_map(parse_option).collect();
    let wants_choice = raw.kind.as_deref().map(str::trim) == Some("choice");
    if wants_choice && options.len() >= 2 {
        Question {
            header: raw.header,
            question: raw.question,
            kind: QuestionKind::Choice,
            options,
        }
    } else {
        Question::text(raw.header, raw.question)
    }
}

fn parse_option(value: &Value) -> Option<QuestionOption> {
    let label = match value {
        Value::String(label) => label.as_str(),
        Value::Object(map) => map.get("label")?.as_str()?,
        _ => return None,
    };
    let label = label.trim();
    if label.is_empty() {
        return None;
    }
    let description = value
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();
    Some(QuestionOption {
        label: label.to_string(),
        description,
    })
}

#[cfg(test)]
#[path = "../tests/unit/questions_tests.rs"]
mod tests;
