//! External services the conversation talks to

use async_trait::async_trait;

use crate::application::errors::ApiError;
use crate::domain::entities::{AgeRange, Assessment, DayAndTimeSlot, LanguageAndLevel, UserData};

/// Result of creating a person in the backend
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedPerson {
    pub personal_info_id: i64,
}

/// The school's backend
#[async_trait]
pub trait RegistrationBackend: Send + Sync {
    async fn chat_id_is_registered(&self, chat_id: i64) -> Result<bool, ApiError>;

    async fn person_exists(&self, first_name: &str, last_name: &str, email: &str) -> Result<bool, ApiError>;

    /// Level computed from the written assessment
    async fn get_level_after_assessment(
        &self,
        answer_ids: &[i64],
        number_of_questions: usize,
    ) -> Result<String, ApiError>;

    /// Create personal info and the role-specific record
    async fn create_person(&self, user_data: &UserData) -> Result<CreatedPerson, ApiError>;

    async fn get_helpdesk_conversation_id(&self, chat_id: i64) -> Result<Option<i64>, ApiError>;
}

/// Read-only reference data served by the backend
#[async_trait]
pub trait ReferenceDataSource: Send + Sync {
    async fn get_age_ranges(&self) -> Result<Vec<AgeRange>, ApiError>;
    async fn get_assessments(&self, language: &str) -> Result<Vec<Assessment>, ApiError>;
    async fn get_day_and_time_slots(&self) -> Result<Vec<DayAndTimeSlot>, ApiError>;
    async fn get_languages_and_levels(&self) -> Result<Vec<LanguageAndLevel>, ApiError>;
}

/// Test that the user takes online
#[derive(Debug, Clone, PartialEq)]
pub struct OralTest {
    pub test_id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OralTestResult {
    /// Empty when the service could not determine the level
    pub level: String,
    pub report_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OralTestOutcome {
    Ready(OralTestResult),
    NotFinished,
    NotReadyInTime,
}

/// SmallTalk oral test provider
#[async_trait]
pub trait OralTestService: Send + Sync {
    async fn send_test(&self, first_name: &str, last_name: &str, email: &str) -> Result<OralTest, ApiError>;
    async fn get_result(&self, test_id: &str) -> Result<OralTestOutcome, ApiError>;
}

/// Chatwoot helpdesk
#[async_trait]
pub trait Helpdesk: Send + Sync {
    fn is_enabled(&self) -> bool;

    /// Create a contact and conversation, returning the conversation id
    async fn start_conversation(&self, chat_id: i64, user_data: &UserData) -> Result<i64, ApiError>;

    async fn send_message(&self, conversation_id: i64, text: &str) -> Result<(), ApiError>;
}
