use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::database::store::QuizStore;
use crate::dto::quiz_dto::{CreateQuizSettingPayload, UpdateQuizSettingPayload};
use crate::error::{Error, Result};
use crate::models::quiz::{NewQuizSetting, QuizSetting, MAX_TIME_LIMIT_SECS};
use crate::utils::{crypto::keys_match, time::now, token::generate_quiz_key};

#[derive(Clone)]
pub struct QuizSettingService {
    store: Arc<dyn QuizStore>,
}

/// Picks the setting a key unlocks at `now`.
///
/// A key that matches only closed windows is reported as inactive rather than
/// wrong, so students can tell the two apart.
pub fn select_active_setting(
    settings: &[QuizSetting],
    quiz_key: &str,
    now: DateTime<Utc>,
) -> Result<QuizSetting> {
    let mut matched = settings
        .iter()
        .filter(|s| keys_match(&s.quiz_key, quiz_key))
        .peekable();

    if matched.peek().is_none() {
        return Err(Error::InvalidKey("quiz key does not match".to_string()));
    }
    matched
        .find(|s| s.is_open_at(now))
        .cloned()
        .ok_or_else(|| Error::InvalidKey("quiz is not active at this time".to_string()))
}

fn check_time_limit(time_limit_secs: i64) -> Result<()> {
    if !(1..=MAX_TIME_LIMIT_SECS).contains(&time_limit_secs) {
        return Err(Error::Validation(format!(
            "time limit must be between 1 and {} seconds",
            MAX_TIME_LIMIT_SECS
        )));
    }
    Ok(())
}

fn check_window(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Result<()> {
    match (start, end) {
        (Some(start), Some(end)) if start >= end => Err(Error::Validation(
            "start_time must be before end_time".to_string(),
        )),
        _ => Ok(()),
    }
}

impl QuizSettingService {
    pub fn new(store: Arc<dyn QuizStore>) -> Self {
        Self { store }
    }

    pub async fn create_quiz_setting(
        &self,
        quiz_id: i64,
        payload: CreateQuizSettingPayload,
    ) -> Result<QuizSetting> {
        check_time_limit(payload.time_limit_secs)?;
        check_window(payload.start_time, payload.end_time)?;

        self.store.fetch_quiz(quiz_id).await?;
        let existing = self.store.quiz_settings(quiz_id).await?;

        let quiz_key = match payload.quiz_key {
            Some(key) => key,
            None => loop {
                let key = generate_quiz_key();
                if !existing.iter().any(|s| s.quiz_key == key) {
                    break key;
                }
            },
        };
        if existing.iter().any(|s| s.quiz_key == quiz_key) {
            return Err(Error::Conflict(format!(
                "quiz {} already has a setting with this key",
                quiz_id
            )));
        }

        let setting = self
            .store
            .insert_quiz_setting(NewQuizSetting {
                quiz_id,
                instructions: payload.instructions,
                time_limit_secs: payload.time_limit_secs,
                start_time: payload.start_time,
                end_time: payload.end_time,
                quiz_key,
            })
            .await?;

        tracing::info!(quiz_id, setting_id = setting.id, "quiz setting created");
        Ok(setting)
    }

    pub async fn list_quiz_settings(&self, quiz_id: i64) -> Result<Vec<QuizSetting>> {
        self.store.fetch_quiz(quiz_id).await?;
        self.store.quiz_settings(quiz_id).await
    }

    pub async fn get_quiz_setting(&self, setting_id: i64) -> Result<QuizSetting> {
        self.store.fetch_quiz_setting(setting_id).await
    }

    /// Attempts already running keep the limit they started with.
    pub async fn update_quiz_setting(
        &self,
        setting_id: i64,
        payload: UpdateQuizSettingPayload,
    ) -> Result<QuizSetting> {
        let mut setting = self.store.fetch_quiz_setting(setting_id).await?;

        if let Some(instructions) = payload.instructions {
            setting.instructions = instructions;
        }
        if let Some(limit) = payload.time_limit_secs {
            setting.time_limit_secs = limit;
        }
        if let Some(start) = payload.start_time {
            setting.start_time = start;
        }
        if let Some(end) = payload.end_time {
            setting.end_time = end;
        }
        check_time_limit(setting.time_limit_secs)?;
        check_window(setting.start_time, setting.end_time)?;

        if let Some(key) = payload.quiz_key {
            if key != setting.quiz_key {
                let siblings = self.store.quiz_settings(setting.quiz_id).await?;
                if siblings.iter().any(|s| s.id != setting.id && s.quiz_key == key) {
                    return Err(Error::Conflict(format!(
                        "quiz {} already has a setting with this key",
                        setting.quiz_id
                    )));
                }
                setting.quiz_key = key;
            }
        }

        let updated = self.store.update_quiz_setting(setting).await?;
        tracing::info!(quiz_id = updated.quiz_id, setting_id, "quiz setting updated");
        Ok(updated)
    }

    pub async fn delete_quiz_setting(&self, setting_id: i64) -> Result<()> {
        self.store.delete_quiz_setting(setting_id).await?;
        tracing::info!(setting_id, "quiz setting deleted");
        Ok(())
    }

    /// Standalone key check for clients that confirm a key before starting.
    pub async fn check_quiz_key(&self, quiz_id: i64, quiz_key: &str) -> Result<QuizSetting> {
        self.store.fetch_quiz(quiz_id).await?;
        self.validate_quiz_key(quiz_id, quiz_key, now()).await
    }

    pub async fn validate_quiz_key(
        &self,
        quiz_id: i64,
        quiz_key: &str,
        now: DateTime<Utc>,
    ) -> Result<QuizSetting> {
        let settings = self.store.quiz_settings(quiz_id).await?;
        select_active_setting(&settings, quiz_key, now).map_err(|e| {
            tracing::warn!(quiz_id, error = %e, "quiz key rejected");
            e
        })
    }
}
