//! Quiz grading.

use crate::error::{MarketError, Result};
use crate::model::QuizQuestion;
use serde::Serialize;

/// Minimum percentage needed to pass.
pub const PASS_PERCENT: u32 = 60;

/// Outcome of grading one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Grade {
    /// Correct answers
    pub score: u32,
    /// Number of questions
    pub max_score: u32,
    /// Rounded-down percentage
    pub percent: u32,
    /// `percent >= PASS_PERCENT`
    pub passed: bool,
}

/// Grade `answers` against `questions`, position by position.
///
/// `questions` must already be in display order. A skipped (`None`) or
/// out-of-range answer scores zero.
///
/// # Errors
///
/// Returns [`MarketError::Validation`] if the quiz has no questions or the
/// number of answers differs from the number of questions.
pub fn grade(questions: &[QuizQuestion], answers: &[Option<u32>]) -> Result<Grade> {
    if questions.is_empty() {
        return Err(MarketError::validation("quiz has no questions"));
    }
    if questions.len() != answers.len() {
        return Err(MarketError::validation(format!(
            "expected {} answers, got {}",
            questions.len(),
            answers.len()
        )));
    }

    let score = questions
        .iter()
        .zip(answers)
        .filter(|(q, a)| **a == Some(q.correct_index))
        .count();

    let max_score = u32::try_from(questions.len()).map_err(|_| MarketError::validation("too many questions"))?;
    let score = u32::try_from(score).map_err(|_| MarketError::validation("too many questions"))?;
    let percent = score * 100 / max_score;

    Ok(Grade {
        score,
        max_score,
        percent,
        passed: percent >= PASS_PERCENT,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{ContentId, QuestionId};

    fn questions(correct: &[u32]) -> Vec<QuizQuestion> {
        let quiz_id = ContentId::new();
        correct
            .iter()
            .enumerate()
            .map(|(i, c)| QuizQuestion {
                id: QuestionId::new(),
                quiz_id,
                prompt: format!("Q{i}"),
                options: vec!["a".into(), "b".into(), "c".into()],
                correct_index: *c,
                position: u32::try_from(i).unwrap_or_default(),
            })
            .collect()
    }

    #[test]
    fn test_all_correct() {
        let grade = grade(&questions(&[0, 2, 1]), &[Some(0), Some(2), Some(1)]);
        assert_eq!(
            grade,
            Ok(Grade {
                score: 3,
                max_score: 3,
                percent: 100,
                passed: true
            })
        );
    }

    #[test]
    fn test_skipped_and_out_of_range_score_zero() {
        let grade = grade(&questions(&[0, 1, 2, 0, 1]), &[Some(0), None, Some(9), Some(0), Some(1)]);
        let grade = grade.unwrap();
        assert_eq!(grade.score, 3);
        assert_eq!(grade.percent, 60);
        assert!(grade.passed);
    }

    #[test]
    fn test_below_pass_mark() {
        let grade = grade(&questions(&[0, 1, 2]), &[Some(0), Some(0), Some(0)]);
        assert!(matches!(grade, Ok(Grade { passed: false, percent: 33, .. })));
    }

    #[test]
    fn test_answer_count_must_match() {
        assert!(matches!(
            grade(&questions(&[0, 1]), &[Some(0)]),
            Err(MarketError::Validation(_))
        ));
        assert!(matches!(grade(&[], &[]), Err(MarketError::Validation(_))));
    }
}
