//! Quiz question codec
//!
//! Turns free-form model output into a validated question list using
//! bracket-matching extraction with:
//! - Algorithm: O(n) single pass over the text, string/escape aware
//! - Recovery: deterministic fallback questions on any parse failure
//!
//! Everything here is pure; the same input always yields the same output.

use serde::Deserialize;

use crate::types::{QuestionType, QuizQuestion};

/// Points assigned when the model omits them, and to every fallback question
const DEFAULT_POINTS: u32 = 10;

/// Fallback questions are capped at this many regardless of the request
const MAX_FALLBACK_QUESTIONS: usize = 5;

/// Candidate question as the model emits it, before validation
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuestion {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    question: Option<String>,
    #[serde(default, rename = "type")]
    question_type: Option<QuestionType>,
    #[serde(default)]
    options: Option<Vec<String>>,
    #[serde(default, alias = "correct_answer")]
    correct_answer: Option<String>,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    points: Option<u32>,
}

/// Envelope the model is instructed to produce
#[derive(Debug, Deserialize)]
struct RawQuizPayload {
    questions: Vec<RawQuestion>,
}

/// Decode model output into at most `count` validated questions
///
/// Never fails: extraction or decode errors yield the deterministic fallback
/// built from `topic` and `concepts`.
pub fn decode_questions(
    raw: &str,
    count: usize,
    topic: &str,
    concepts: &[String],
) -> Vec<QuizQuestion> {
    match try_decode(raw, count) {
        Some(questions) => questions,
        None => fallback_questions(count, topic, concepts),
    }
}

/// Strict path: extract, parse, validate; None on any failure
fn try_decode(raw: &str, count: usize) -> Option<Vec<QuizQuestion>> {
    let json = extract_object(raw)?;
    let payload: RawQuizPayload = serde_json::from_str(json).ok()?;
    Some(validate_questions(payload.questions, count))
}

/// Find the first balanced top-level `{…}` object in the text
///
/// Braces inside string literals are ignored, as are escaped quotes. Returns
/// None when no balanced object exists.
pub fn extract_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut start: Option<usize> = None;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, &byte) in bytes.iter().enumerate() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match byte {
            b'\\' if in_string => escape_next = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            b'}' if !in_string => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        return Some(&text[start?..=i]);
                    }
                }
            }
            _ => {}
        }
    }

    None
}

/// Apply the required-field and defaulting rules, truncating to `count`
///
/// Candidates missing question text, a correct answer, or an explanation are
/// dropped. Synthetic ids are numbered by position among the survivors.
fn validate_questions(candidates: Vec<RawQuestion>, count: usize) -> Vec<QuizQuestion> {
    let mut validated = Vec::new();

    for candidate in candidates {
        if validated.len() >= count {
            break;
        }

        let question = match non_blank(candidate.question) {
            Some(text) => text,
            None => continue,
        };
        let correct_answer = match non_blank(candidate.correct_answer) {
            Some(text) => text,
            None => continue,
        };
        let explanation = match non_blank(candidate.explanation) {
            Some(text) => text,
            None => continue,
        };

        let question_type = candidate.question_type.unwrap_or(QuestionType::ShortAnswer);
        let options = match question_type {
            QuestionType::MultipleChoice => candidate.options,
            _ => None,
        };
        let points = match candidate.points {
            Some(p) if p > 0 => p,
            _ => DEFAULT_POINTS,
        };
        let id = candidate
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("q{}", validated.len() + 1));

        validated.push(QuizQuestion {
            id,
            question,
            question_type,
            options,
            correct_answer,
            explanation,
            points,
        });
    }

    validated
}

/// Re-validate an already-decoded question list
///
/// The quiz workflow applies this after generation as a second pass over the
/// same invariants (ids, defaults, truncation).
pub fn revalidate(questions: Vec<QuizQuestion>, count: usize) -> Vec<QuizQuestion> {
    let candidates = questions
        .into_iter()
        .map(|q| RawQuestion {
            id: Some(q.id),
            question: Some(q.question),
            question_type: Some(q.question_type),
            options: q.options,
            correct_answer: Some(q.correct_answer),
            explanation: Some(q.explanation),
            points: Some(q.points),
        })
        .collect();

    validate_questions(candidates, count)
}

/// Deterministic short-answer questions used when decoding fails
///
/// Yields min(count, 5) questions cycling through `concepts` by index, or the
/// topic name when the concept list is empty.
pub fn fallback_questions(count: usize, topic: &str, concepts: &[String]) -> Vec<QuizQuestion> {
    let total = count.min(MAX_FALLBACK_QUESTIONS);
    let mut questions = Vec::with_capacity(total);

    for n in 0..total {
        let concept = if concepts.is_empty() {
            topic
        } else {
            &concepts[n % concepts.len()]
        };

        questions.push(QuizQuestion {
            id: format!("q{}", n + 1),
            question: format!("Explain your understanding of {}", concept),
            question_type: QuestionType::ShortAnswer,
            options: None,
            correct_answer: "Answers will vary".to_string(),
            explanation: format!("Tests your grasp of {}.", concept),
            points: DEFAULT_POINTS,
        });
    }

    questions
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_PAYLOAD: &str = r#"{"questions":[{"id":"q1","question":"X?","type":"true-false","correctAnswer":"True","explanation":"E","points":10}]}"#;

    #[test]
    fn test_extract_embedded_object() {
        let text = format!("Here is your quiz:\n{}\nGood luck!", VALID_PAYLOAD);
        assert_eq!(extract_object(&text), Some(VALID_PAYLOAD));
    }

    #[test]
    fn test_extract_ignores_braces_in_strings() {
        let text = r#"{"message": "this has {braces} inside"}"#;
        assert_eq!(extract_object(text), Some(text));
    }

    #[test]
    fn test_extract_handles_escaped_quotes() {
        let text = r#"{"message": "quote: \"hi\""}"#;
        assert_eq!(extract_object(text), Some(text));
    }

    #[test]
    fn test_extract_nested_objects() {
        let text = r#"prose {"outer": {"inner": 1}} trailing"#;
        assert_eq!(extract_object(text), Some(r#"{"outer": {"inner": 1}}"#));
    }

    #[test]
    fn test_extract_none_without_braces() {
        assert_eq!(extract_object("no json here"), None);
        assert_eq!(extract_object("{never closed"), None);
    }

    #[test]
    fn test_decode_valid_question_unchanged() {
        let text = format!("Sure! {}", VALID_PAYLOAD);
        let questions = decode_questions(&text, 5, "Logic", &[]);

        assert_eq!(questions.len(), 1);
        let q = &questions[0];
        assert_eq!(q.id, "q1");
        assert_eq!(q.question, "X?");
        assert_eq!(q.question_type, QuestionType::TrueFalse);
        assert_eq!(q.correct_answer, "True");
        assert_eq!(q.points, 10);
    }

    #[test]
    fn test_decode_drops_incomplete_candidates() {
        let text = r#"{"questions":[
            {"question":"Complete?","correctAnswer":"Yes","explanation":"ok"},
            {"question":"No answer"},
            {"correctAnswer":"orphan","explanation":"no text"}
        ]}"#;
        let questions = decode_questions(text, 10, "Logic", &[]);

        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].id, "q1");
        assert_eq!(questions[0].question_type, QuestionType::ShortAnswer);
        assert_eq!(questions[0].points, 10);
    }

    #[test]
    fn test_decode_truncates_never_pads() {
        let text = r#"{"questions":[
            {"question":"A?","correctAnswer":"a","explanation":"e"},
            {"question":"B?","correctAnswer":"b","explanation":"e"},
            {"question":"C?","correctAnswer":"c","explanation":"e"}
        ]}"#;
        let questions = decode_questions(text, 2, "Logic", &[]);
        assert_eq!(questions.len(), 2);
    }

    #[test]
    fn test_options_cleared_for_non_multiple_choice() {
        let text = r#"{"questions":[
            {"question":"A?","type":"true-false","options":["True","False"],
             "correctAnswer":"True","explanation":"e"}
        ]}"#;
        let questions = decode_questions(text, 5, "Logic", &[]);
        assert!(questions[0].options.is_none());
    }

    #[test]
    fn test_fallback_on_unparsable_text() {
        let concepts = vec!["limits".to_string(), "derivatives".to_string()];
        let questions = decode_questions("the model rambled", 3, "Calculus", &concepts);

        assert_eq!(questions.len(), 3);
        assert_eq!(questions[0].question, "Explain your understanding of limits");
        assert_eq!(questions[1].question, "Explain your understanding of derivatives");
        assert_eq!(questions[2].question, "Explain your understanding of limits");
        assert!(questions.iter().all(|q| q.points == 10));
    }

    #[test]
    fn test_fallback_caps_at_five() {
        let questions = fallback_questions(12, "Calculus", &[]);
        assert_eq!(questions.len(), MAX_FALLBACK_QUESTIONS);
        assert_eq!(questions[0].question, "Explain your understanding of Calculus");
    }

    #[test]
    fn test_fallback_is_deterministic() {
        let concepts = vec!["sets".to_string()];
        let a = fallback_questions(4, "Math", &concepts);
        let b = fallback_questions(4, "Math", &concepts);
        assert_eq!(serde_json::to_string(&a).unwrap(), serde_json::to_string(&b).unwrap());
    }

    #[test]
    fn test_revalidate_truncates_and_renumbers() {
        let questions = fallback_questions(5, "Math", &[]);
        let trimmed = revalidate(questions, 2);
        assert_eq!(trimmed.len(), 2);
        assert_eq!(trimmed[0].id, "q1");
    }
}
