//! Student branch: level, written assessment, oral test offer

use super::{Conversation, Flow, Turn};
use crate::application::errors::{ApiError, BotError};
use crate::application::services::validation::is_digits;
use crate::domain::entities::constants::{
    callback, is_known_level, DONT_KNOWS_BEFORE_ABORT, ENGLISH, LEVELS_ELIGIBLE_FOR_ORAL_TEST,
    LEVELS_TOO_HIGH, STUDENT_COMMUNICATION_LANGUAGE_CODES,
};
use crate::domain::entities::{Assessment, ConversationState, Role};

/// Oldest age that still counts as a child for the reading check
const CHILD_MAX_AGE: u32 = 12;
const ADULT_MIN_AGE: u32 = 18;
/// Students from this age are offered non-teaching help
const NON_TEACHING_HELP_MIN_AGE: u32 = 15;

impl Conversation {
    /// Answer to the level question, or to "can you read in English" for English learners
    pub(super) async fn store_student_level(
        &self,
        turn: &mut Turn<'_>,
        language: &str,
        data: &str,
    ) -> Result<Flow, BotError> {
        if language == ENGLISH {
            return self.store_can_read_in_english(turn, data).await;
        }

        let Some(id) = self.data.language_and_level_id(language, data) else {
            return Ok(Flow::Unhandled);
        };
        let user = &mut turn.session.user_data;
        user.levels_for_teaching_language.insert(language.to_string(), vec![data.to_string()]);
        user.language_and_level_ids = vec![id];
        self.ask_student_communication_language(turn).await
    }

    async fn store_can_read_in_english(&self, turn: &mut Turn<'_>, data: &str) -> Result<Flow, BotError> {
        let can_read = match data {
            callback::YES => true,
            callback::NO => false,
            _ => return Ok(Flow::Unhandled),
        };
        let user = &mut turn.session.user_data;
        user.student_can_read_in_english = Some(can_read);
        let age_from = user.student_age_from.unwrap_or_default();
        let age_to = user.student_age_to.unwrap_or_default();

        if !can_read {
            if age_from >= ADULT_MIN_AGE {
                self.set_english_level(turn, "A0")?;
            } else {
                turn.session.user_data.student_needs_oral_interview = true;
            }
            return self.ask_student_communication_language(turn).await;
        }

        if age_to <= CHILD_MAX_AGE {
            turn.session.user_data.student_needs_oral_interview = true;
            return self.ask_student_communication_language(turn).await;
        }

        if age_to < ADULT_MIN_AGE {
            let reply = self.replies(turn).ask_how_long_learning();
            self.respond(turn, reply).await?;
            return Ok(Flow::Next(ConversationState::AdolescentsAskCommunicationLanguageOrStartAssessment));
        }

        self.start_assessment(turn).await
    }

    /// Adolescents who learnt for less than a year skip the assessment and get an oral interview
    pub(super) async fn store_how_long_learning(&self, turn: &mut Turn<'_>, data: &str) -> Result<Flow, BotError> {
        match data {
            callback::LESS_THAN_YEAR => {
                turn.session.user_data.student_needs_oral_interview = true;
                self.ask_student_communication_language(turn).await
            }
            callback::YEAR_OR_MORE => self.start_assessment(turn).await,
            _ => Ok(Flow::Unhandled),
        }
    }

    fn assessment(&self, turn: &Turn<'_>) -> Option<&Assessment> {
        turn.session
            .chat_data
            .assessment_age_range_id
            .and_then(|id| self.data.assessment_for_age_range_id.get(&id))
    }

    async fn start_assessment(&self, turn: &mut Turn<'_>) -> Result<Flow, BotError> {
        let age_range_id = turn.session.user_data.student_age_range_id;
        let has_assessment = age_range_id
            .map(|id| self.data.assessment_for_age_range_id.contains_key(&id))
            .unwrap_or(false);

        if !has_assessment {
            self.notifier
                .warning(
                    &format!("No assessment for age range {:?}, student needs an oral interview", age_range_id),
                    Some(turn.update),
                    false,
                )
                .await;
            turn.session.user_data.student_needs_oral_interview = true;
            return self.ask_student_communication_language(turn).await;
        }

        let chat_data = &mut turn.session.chat_data;
        chat_data.assessment_age_range_id = age_range_id;
        chat_data.current_assessment_question_index = 0;
        chat_data.assessment_dont_knows_in_a_row = 0;
        let user = &mut turn.session.user_data;
        user.student_assessment_answers.clear();
        user.student_assessment_resulting_level = None;
        user.student_agreed_to_smalltalk = false;
        user.student_smalltalk_test_id = None;
        user.student_smalltalk_interview_url = None;

        let reply = self.replies(turn).ask_start_assessment();
        self.respond(turn, reply).await?;
        Ok(Flow::Next(ConversationState::AskAssessmentQuestion))
    }

    async fn ask_assessment_question(&self, turn: &Turn<'_>) -> Result<Flow, BotError> {
        let Some(assessment) = self.assessment(turn) else {
            return Err(BotError::Conversation("assessment disappeared mid-test".into()));
        };
        let index = turn.session.chat_data.current_assessment_question_index;
        let Some(question) = assessment.questions.get(index) else {
            return Err(BotError::Conversation(format!("no assessment question {}", index)));
        };
        let show_abort = turn.session.chat_data.assessment_dont_knows_in_a_row >= DONT_KNOWS_BEFORE_ABORT;
        let reply = self
            .replies(turn)
            .ask_assessment_question(question, index, assessment.questions.len(), show_abort);
        self.respond(turn, reply).await?;
        Ok(Flow::Next(ConversationState::AskAssessmentQuestion))
    }

    pub(super) async fn assessment_answer(&self, turn: &mut Turn<'_>, data: &str) -> Result<Flow, BotError> {
        if data == callback::OK {
            return self.ask_assessment_question(turn).await;
        }
        if data == callback::ABORT {
            tracing::info!("Chat {}: assessment aborted", turn.chat_id());
            return self.process_assessment_results(turn).await;
        }
        if !is_digits(data) {
            return Ok(Flow::Unhandled);
        }

        let Some(assessment) = self.assessment(turn) else {
            return Ok(Flow::Unhandled);
        };
        let index = turn.session.chat_data.current_assessment_question_index;
        let Some(question) = assessment.questions.get(index) else {
            return Ok(Flow::Unhandled);
        };
        let Some(option) = question.options.iter().find(|o| o.id.to_string() == data) else {
            return Ok(Flow::Unhandled);
        };
        let total = assessment.questions.len();
        let question_id = question.id;
        let option_id = option.id;
        let dont_know = option.means_user_does_not_know_the_answer();

        turn.session.user_data.student_assessment_answers.push((question_id, option_id));
        let chat_data = &mut turn.session.chat_data;
        if dont_know {
            chat_data.assessment_dont_knows_in_a_row += 1;
        } else {
            chat_data.assessment_dont_knows_in_a_row = 0;
        }

        if index + 1 >= total {
            return self.process_assessment_results(turn).await;
        }
        chat_data.current_assessment_question_index = index + 1;
        self.ask_assessment_question(turn).await
    }

    async fn process_assessment_results(&self, turn: &mut Turn<'_>) -> Result<Flow, BotError> {
        let total = self.assessment(turn).map(|a| a.questions.len()).unwrap_or_default();
        let answer_ids: Vec<i64> = turn
            .session
            .user_data
            .student_assessment_answers
            .iter()
            .map(|(_, option_id)| *option_id)
            .collect();

        let level = self.backend.get_level_after_assessment(&answer_ids, total).await?;
        if !is_known_level(&level) {
            return Err(ApiError::Logic(format!("backend returned unknown level {:?}", level)).into());
        }
        self.notifier
            .info(&format!("Assessment resulted in level {}", level), Some(turn.update), false)
            .await;
        turn.session.user_data.student_assessment_resulting_level = Some(level.clone());

        if LEVELS_ELIGIBLE_FOR_ORAL_TEST.contains(&level.as_str()) {
            let reply = self.replies(turn).yes_no_phrase("ask_student_smalltalk");
            self.respond(turn, reply).await?;
            return Ok(Flow::Next(ConversationState::SendSmalltalkUrlOrAskCommunicationLanguage));
        }

        if LEVELS_TOO_HIGH.contains(&level.as_str()) {
            let coordinator = self
                .speaking_club_coordinator
                .as_ref()
                .map(|u| format!("@{} ", u))
                .unwrap_or_default();
            self.notifier
                .info(
                    &format!("{}Student's assessed level is {}, offering the speaking club", coordinator, level),
                    Some(turn.update),
                    true,
                )
                .await;
            let reply = self.replies(turn).yes_no_phrase("ask_student_high_level_speaking_club");
            self.respond(turn, reply).await?;
            return Ok(Flow::Next(ConversationState::CreateStudentWithHighLevelOrBye));
        }

        self.set_english_level(turn, &level)?;
        self.ask_student_communication_language(turn).await
    }

    pub(super) async fn smalltalk_decision(&self, turn: &mut Turn<'_>, data: &str) -> Result<Flow, BotError> {
        match data {
            callback::YES => {}
            callback::NO => return self.skip_smalltalk(turn).await,
            _ => return Ok(Flow::Unhandled),
        }

        let user = &turn.session.user_data;
        let sent = self
            .oral_test
            .send_test(
                user.first_name.as_deref().unwrap_or_default(),
                user.last_name.as_deref().unwrap_or_default(),
                user.email.as_deref().unwrap_or_default(),
            )
            .await;

        match sent {
            Ok(test) => {
                let user = &mut turn.session.user_data;
                user.student_agreed_to_smalltalk = true;
                user.student_smalltalk_test_id = Some(test.test_id);
                let reply = self.replies(turn).smalltalk_link(&test.url);
                self.respond(turn, reply).await?;
                Ok(Flow::Next(ConversationState::AskCommunicationLanguageAfterSmalltalk))
            }
            Err(e) => {
                self.notifier
                    .error(&format!("Could not send SmallTalk test: {}", e), Some(turn.update), true)
                    .await;
                self.skip_smalltalk(turn).await
            }
        }
    }

    async fn skip_smalltalk(&self, turn: &mut Turn<'_>) -> Result<Flow, BotError> {
        turn.session.user_data.student_agreed_to_smalltalk = false;
        let level = turn
            .session
            .user_data
            .student_assessment_resulting_level
            .clone()
            .unwrap_or_else(|| "A0".to_string());
        self.set_english_level(turn, &level)?;
        self.ask_student_communication_language(turn).await
    }

    /// User pressed "done" under the SmallTalk link. The level is set when the result comes in.
    pub(super) async fn smalltalk_done(&self, turn: &mut Turn<'_>, data: &str) -> Result<Flow, BotError> {
        if data != callback::DONE {
            return Ok(Flow::Unhandled);
        }
        self.ask_student_communication_language(turn).await
    }

    /// Students with a high level can only join the speaking club
    pub(super) async fn high_level_decision(&self, turn: &mut Turn<'_>, data: &str) -> Result<Flow, BotError> {
        match data {
            callback::YES => {
                let level = turn
                    .session
                    .user_data
                    .student_assessment_resulting_level
                    .clone()
                    .unwrap_or_default();
                self.set_english_level(turn, &level)?;
                turn.session
                    .user_data
                    .append_comment(&format!("- Only wants the speaking club (assessed level {})", level));
                self.ask_student_communication_language(turn).await
            }
            callback::NO => {
                let reply = self.replies(turn).plain("bye_high_level");
                self.respond(turn, reply).await?;
                Ok(Flow::End)
            }
            _ => Ok(Flow::Unhandled),
        }
    }

    pub(super) async fn ask_student_communication_language(&self, turn: &Turn<'_>) -> Result<Flow, BotError> {
        let reply = self.replies(turn).ask_communication_language(Some(Role::Student));
        self.respond(turn, reply).await?;
        Ok(Flow::Next(ConversationState::AskStudentNonTeachingHelpOrStartReview))
    }

    pub(super) async fn store_student_communication_language(
        &self,
        turn: &mut Turn<'_>,
        data: &str,
    ) -> Result<Flow, BotError> {
        if !STUDENT_COMMUNICATION_LANGUAGE_CODES.contains(&data) || data == "l2_only" {
            return Ok(Flow::Unhandled);
        }
        turn.session.user_data.communication_language_in_class = Some(data.to_string());

        if turn.session.in_review() {
            return self.show_review(turn).await;
        }
        let age_from = turn.session.user_data.student_age_from.unwrap_or_default();
        if age_from >= NON_TEACHING_HELP_MIN_AGE {
            return self.ask_non_teaching_help(turn).await;
        }
        self.show_review(turn).await
    }

    /// Record an English level the student will be placed at
    pub(super) fn set_english_level(&self, turn: &mut Turn<'_>, level: &str) -> Result<(), BotError> {
        let id = self
            .data
            .language_and_level_id(ENGLISH, level)
            .ok_or_else(|| BotError::NotFound(format!("language and level {}/{}", ENGLISH, level)))?;
        let user = &mut turn.session.user_data;
        user.levels_for_teaching_language.insert(ENGLISH.to_string(), vec![level.to_string()]);
        user.language_and_level_ids = vec![id];
        Ok(())
    }
}
