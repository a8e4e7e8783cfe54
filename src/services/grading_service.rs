use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::models::answer_sheet::{AnswerSheet, AnswerSlot, AttemptStatus};
use crate::models::question::{NewOption, Question, QuestionKind};

/// Selected option ids per question id.
pub type SlotSelections = BTreeMap<i64, BTreeSet<i64>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradedSlot {
    pub question_id: i64,
    pub kind: QuestionKind,
    pub selected_option_ids: Vec<i64>,
    pub points_awarded: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeOutcome {
    pub slots: Vec<GradedSlot>,
    pub attempt_score: i32,
}

impl QuestionKind {
    /// Authoring-time invariant on a question's option set.
    pub fn validate_options(&self, options: &[NewOption]) -> Result<()> {
        if options.len() < 2 {
            return Err(Error::Validation(
                "a select question needs at least two options".to_string(),
            ));
        }
        let correct = options.iter().filter(|o| o.is_correct).count();
        match self {
            QuestionKind::SingleSelect if correct != 1 => Err(Error::Validation(format!(
                "single-select questions need exactly one correct option, got {}",
                correct
            ))),
            QuestionKind::MultipleSelect if correct == 0 => Err(Error::Validation(
                "multiple-select questions need at least one correct option".to_string(),
            )),
            _ => Ok(()),
        }
    }

    pub fn validate_submission(&self, question: &Question, selected: &BTreeSet<i64>) -> Result<()> {
        if let Some(foreign) = selected.iter().find(|id| !question.has_option(**id)) {
            return Err(Error::Validation(format!(
                "option {} does not belong to question {}",
                foreign, question.id
            )));
        }
        if *self == QuestionKind::SingleSelect && selected.len() > 1 {
            return Err(Error::Validation(format!(
                "question {} accepts a single option",
                question.id
            )));
        }
        Ok(())
    }

    /// All-or-nothing scoring for both variants.
    pub fn compute_points(&self, question: &Question, selected: &BTreeSet<i64>) -> i32 {
        let correct: BTreeSet<i64> = question.correct_option_ids().collect();
        let earned = match self {
            QuestionKind::SingleSelect => {
                selected.len() == 1 && selected.iter().all(|id| correct.contains(id))
            }
            QuestionKind::MultipleSelect => !correct.is_empty() && *selected == correct,
        };
        if earned {
            question.points
        } else {
            0
        }
    }
}

pub fn validate_selection(question: &Question, selected: &BTreeSet<i64>) -> Result<QuestionKind> {
    let kind = question.kind()?;
    kind.validate_submission(question, selected)?;
    Ok(kind)
}

/// Rejects writes against a sheet that is no longer accepting answers.
pub fn ensure_accepting(sheet: &AnswerSheet, now: DateTime<Utc>) -> Result<()> {
    match sheet.status()? {
        AttemptStatus::Completed => return Err(Error::AlreadyGraded(sheet.id)),
        AttemptStatus::ToAttempt => {
            return Err(Error::Validation(format!(
                "answer sheet {} has not been started",
                sheet.id
            )))
        }
        AttemptStatus::InProgress => {}
    }
    let deadline = sheet.deadline()?;
    if now > deadline {
        return Err(Error::Expired { deadline });
    }
    Ok(())
}

/// Overlays a submission on the slots saved earlier; the submission wins for
/// any question it mentions.
pub fn merge_selections(saved: &[AnswerSlot], submitted: &SlotSelections) -> SlotSelections {
    let mut merged: SlotSelections = saved
        .iter()
        .map(|slot| {
            (
                slot.question_id,
                slot.selected_option_ids.iter().copied().collect(),
            )
        })
        .collect();
    for (question_id, options) in submitted {
        merged.insert(*question_id, options.clone());
    }
    merged
}

/// Every question in the snapshot must have a gradable type, answered or not.
pub fn grade_attempt(snapshot: &[Question], selections: &SlotSelections) -> Result<GradeOutcome> {
    for question in snapshot {
        question.kind()?;
    }

    let mut slots = Vec::with_capacity(selections.len());
    let mut attempt_score: i32 = 0;

    for (question_id, selected) in selections {
        let question = snapshot
            .iter()
            .find(|q| q.id == *question_id)
            .ok_or_else(|| {
                Error::Validation(format!("question {} is not part of this attempt", question_id))
            })?;

        let kind = validate_selection(question, selected)?;
        let points_awarded = kind.compute_points(question, selected);
        attempt_score = attempt_score.checked_add(points_awarded).ok_or_else(|| {
            Error::Validation("attempt score exceeds the supported range".to_string())
        })?;

        slots.push(GradedSlot {
            question_id: *question_id,
            kind,
            selected_option_ids: selected.iter().copied().collect(),
            points_awarded,
        });
    }

    Ok(GradeOutcome {
        slots,
        attempt_score,
    })
}
