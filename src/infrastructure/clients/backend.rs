//! School backend REST client

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use super::base::{ApiClient, RetryPolicy};
use crate::application::errors::ApiError;
use crate::domain::entities::{
    AgeRange, Assessment, AssessmentQuestion, AssessmentQuestionOption, DayAndTimeSlot,
    LanguageAndLevel, UserData,
};
use crate::domain::traits::{CreatedPerson, ReferenceDataSource, RegistrationBackend};

const CHAT_ID_PARAM: &str = "registration_telegram_bot_chat_id";

pub struct BackendClient {
    api: ApiClient,
    url_prefix: String,
}

impl BackendClient {
    pub fn new(url_prefix: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            api: ApiClient::new(retry),
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.url_prefix, path)
    }

    async fn get_list<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<Vec<T>, ApiError> {
        let response = self.api.get(&self.url(path), query, &[200]).await?;
        serde_json::from_value(response.body).map_err(|e| ApiError::Json(format!("{}: {}", path, e)))
    }
}

#[async_trait]
impl RegistrationBackend for BackendClient {
    async fn chat_id_is_registered(&self, chat_id: i64) -> Result<bool, ApiError> {
        let response = self
            .api
            .get(
                &self.url("personal_info/check_existence_of_chat_id/"),
                &[(CHAT_ID_PARAM, chat_id.to_string())],
                &[200, 406],
            )
            .await?;
        Ok(response.status == 200)
    }

    async fn person_exists(&self, first_name: &str, last_name: &str, email: &str) -> Result<bool, ApiError> {
        let response = self
            .api
            .post_form(
                &self.url("personal_info/check_existence/"),
                &[
                    ("first_name", first_name.to_string()),
                    ("last_name", last_name.to_string()),
                    ("email", email.to_string()),
                ],
                &[200, 409],
            )
            .await?;
        Ok(response.status == 409)
    }

    async fn get_level_after_assessment(
        &self,
        answer_ids: &[i64],
        number_of_questions: usize,
    ) -> Result<String, ApiError> {
        let response = self
            .api
            .post_json(
                &self.url("enrollment_test_result/get_level/"),
                &json!({ "answers": answer_ids, "number_of_questions": number_of_questions }),
                &[200],
            )
            .await?;
        Ok(response.str_field("resulting_level")?.to_string())
    }

    async fn create_person(&self, user_data: &UserData) -> Result<CreatedPerson, ApiError> {
        let response = self
            .api
            .post_json(&self.url("personal_info/"), &user_data.personal_info_payload(), &[201])
            .await?;
        let id = response.i64_field("id")?;
        tracing::info!("Created personal info {} for {}", id, user_data.full_name());

        let (path, payload) = if user_data.is_student() {
            ("students/", user_data.student_payload(id))
        } else if user_data.teacher_is_under_18 {
            ("teachers_under_18/", user_data.teacher_under_18_payload(id))
        } else {
            ("teachers/", user_data.teacher_payload(id))
        };
        self.api.post_json(&self.url(path), &payload, &[201]).await?;

        if user_data.is_student() && !user_data.student_assessment_answers.is_empty() {
            self.api
                .post_json(&self.url("enrollment_test_result/"), &user_data.enrollment_test_payload(id), &[201])
                .await?;
        }

        Ok(CreatedPerson { personal_info_id: id })
    }

    async fn get_helpdesk_conversation_id(&self, chat_id: i64) -> Result<Option<i64>, ApiError> {
        let response = self
            .api
            .get(
                &self.url("personal_info/get_chatwoot_conversation_id/"),
                &[(CHAT_ID_PARAM, chat_id.to_string())],
                &[200, 406],
            )
            .await?;
        if response.status == 406 {
            return Ok(None);
        }
        Ok(Some(response.i64_field("chatwoot_conversation_id")?))
    }
}

#[derive(Deserialize)]
struct WireAssessment {
    id: i64,
    age_ranges: Vec<i64>,
    questions: Vec<WireQuestion>,
}

#[derive(Deserialize)]
struct WireQuestion {
    id: i64,
    text: String,
    options: Vec<AssessmentQuestionOption>,
}

#[derive(Deserialize)]
struct WireSlot {
    id: i64,
    day_of_week_index: usize,
    time_slot: WireTimeSlot,
}

#[derive(Deserialize)]
struct WireTimeSlot {
    from_utc_hour: String,
    to_utc_hour: String,
}

#[derive(Deserialize)]
struct WireLanguageAndLevel {
    id: i64,
    language: WireLanguage,
    level: String,
}

#[derive(Deserialize)]
struct WireLanguage {
    id: String,
}

/// Hour of a `HH:MM:SS` time
fn parse_hour(time: &str) -> Result<u32, ApiError> {
    time.split(':')
        .next()
        .and_then(|h| h.parse().ok())
        .ok_or_else(|| ApiError::Json(format!("invalid time {:?}", time)))
}

#[async_trait]
impl ReferenceDataSource for BackendClient {
    async fn get_age_ranges(&self) -> Result<Vec<AgeRange>, ApiError> {
        self.get_list("age_ranges/", &[]).await
    }

    async fn get_assessments(&self, language: &str) -> Result<Vec<Assessment>, ApiError> {
        let wire: Vec<WireAssessment> = self
            .get_list("enrollment_test/", &[("language", language.to_string())])
            .await?;
        Ok(wire
            .into_iter()
            .map(|a| Assessment {
                id: a.id,
                age_range_ids: a.age_ranges,
                questions: a
                    .questions
                    .into_iter()
                    .map(|q| AssessmentQuestion { id: q.id, text: q.text, options: q.options })
                    .collect(),
            })
            .collect())
    }

    async fn get_day_and_time_slots(&self) -> Result<Vec<DayAndTimeSlot>, ApiError> {
        let wire: Vec<WireSlot> = self.get_list("day_and_time_slots/", &[]).await?;
        wire.into_iter()
            .map(|s| {
                Ok(DayAndTimeSlot {
                    id: s.id,
                    day_of_week_index: s.day_of_week_index,
                    from_utc_hour: parse_hour(&s.time_slot.from_utc_hour)?,
                    to_utc_hour: parse_hour(&s.time_slot.to_utc_hour)?,
                })
            })
            .collect()
    }

    async fn get_languages_and_levels(&self) -> Result<Vec<LanguageAndLevel>, ApiError> {
        let wire: Vec<WireLanguageAndLevel> = self.get_list("languages_and_levels/", &[]).await?;
        Ok(wire
            .into_iter()
            .map(|l| LanguageAndLevel { id: l.id, language_id: l.language.id, level: l.level })
            .collect())
    }
}
