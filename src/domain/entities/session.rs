//! Per-chat conversation session

use serde::{Deserialize, Serialize};

use super::person::UserData;

/// Conversation states. Each state names what the bot does once the awaited answer arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    IsRegistered,
    CheckChatIdAskTimezone,
    CheckIfWantsToRegisterAnotherPersonAskTimezone,
    AskFirstName,
    AskLastName,
    AskSource,
    CheckUsername,
    AskPhoneNumber,
    AskEmail,
    AskRole,
    AskAge,
    TimeSlotsStart,
    TimeSlotsMenuOrAskTeachingLanguage,
    AskLevelOrAnotherTeachingLanguageOrCommunicationLanguage,
    AskLevelOrCommunicationLanguage,
    AdolescentsAskCommunicationLanguageOrStartAssessment,
    AskAssessmentQuestion,
    SendSmalltalkUrlOrAskCommunicationLanguage,
    AskCommunicationLanguageAfterSmalltalk,
    CreateStudentWithHighLevelOrBye,
    AskStudentNonTeachingHelpOrStartReview,
    NonTeachingHelpMenuOrPeerHelpForTeacherOrReviewForStudent,
    AskTeachingExperience,
    AskTeachingGroupOrSpeakingClub,
    AskNumberOfGroupsOrStudentAgeGroups,
    PreferredStudentAgeGroupsStart,
    PreferredStudentAgeGroupsMenuOrAskNonTeachingHelp,
    PeerHelpMenuOrAskAdditionalHelp,
    AskReview,
    AskYoungTeacherCommunicationLanguage,
    AskYoungTeacherSpeakingClubLanguage,
    AskYoungTeacherAdditionalHelp,
    AskFinalComment,
    ReviewMenuOrAskFinalComment,
    ReviewRequestedItem,
    Bye,
    ChatWithOperator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationMode {
    #[default]
    Normal,
    Review,
    ChatWithHelpdesk,
}

/// Transient data the conversation needs but the backend does not
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatData {
    pub mode: ConversationMode,
    pub day_index: usize,
    /// Language whose levels are being asked
    pub teaching_language: Option<String>,
    pub assessment_age_range_id: Option<i64>,
    pub current_assessment_question_index: usize,
    pub assessment_dont_knows_in_a_row: u32,
    pub helpdesk_conversation_id: Option<i64>,
}

/// Everything persisted for one chat
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub state: Option<ConversationState>,
    pub user_data: UserData,
    pub chat_data: ChatData,
}

impl Session {
    pub fn in_review(&self) -> bool {
        self.chat_data.mode == ConversationMode::Review
    }
}
