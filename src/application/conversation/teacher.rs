//! Teacher branch, adult and under 18

use super::{Conversation, Flow, Reply, Turn};
use crate::application::errors::BotError;
use crate::application::services::validation::is_digits;
use crate::domain::entities::constants::{callback, STUDENT_COMMUNICATION_LANGUAGE_CODES, TEACHER_PEER_HELP_TYPES};
use crate::domain::entities::{ConversationState, Event, Role, TeachingMode};

/// Level young teachers' speaking clubs are set up for
const YOUNG_TEACHER_LEVEL: &str = "A2";

impl Conversation {
    /// Levels are picked one by one; `done` goes back to the language list
    pub(super) async fn store_teacher_level(
        &self,
        turn: &mut Turn<'_>,
        language: &str,
        data: &str,
    ) -> Result<Flow, BotError> {
        if data == callback::DONE {
            return self.ask_teaching_languages(turn).await;
        }

        let Some(id) = self.data.language_and_level_id(language, data) else {
            return Ok(Flow::Unhandled);
        };
        let user = &mut turn.session.user_data;
        let levels = user.levels_for_teaching_language.entry(language.to_string()).or_default();
        if !levels.iter().any(|l| l == data) {
            levels.push(data.to_string());
        }
        if !user.language_and_level_ids.contains(&id) {
            user.language_and_level_ids.push(id);
        }

        let chosen = levels.len();
        if chosen >= self.data.levels_for_language(language).len() {
            return self.ask_teaching_languages(turn).await;
        }
        let reply = self.replies(turn).ask_levels(&turn.session.user_data, language, true);
        self.respond(turn, reply).await?;
        Ok(Flow::Next(ConversationState::AskLevelOrCommunicationLanguage))
    }

    pub(super) async fn ask_teacher_communication_language(&self, turn: &Turn<'_>) -> Result<Flow, BotError> {
        let reply = self.replies(turn).ask_communication_language(Some(Role::Teacher));
        self.respond(turn, reply).await?;
        Ok(Flow::Next(ConversationState::AskTeachingExperience))
    }

    pub(super) async fn store_teacher_communication_language(
        &self,
        turn: &mut Turn<'_>,
        data: &str,
    ) -> Result<Flow, BotError> {
        if !STUDENT_COMMUNICATION_LANGUAGE_CODES.contains(&data) {
            return Ok(Flow::Unhandled);
        }
        turn.session.user_data.communication_language_in_class = Some(data.to_string());

        if turn.session.in_review() {
            return self.show_review(turn).await;
        }
        let reply = self.replies(turn).yes_no_phrase("ask_teacher_experience");
        self.respond(turn, reply).await?;
        Ok(Flow::Next(ConversationState::AskTeachingGroupOrSpeakingClub))
    }

    pub(super) async fn store_teaching_experience(&self, turn: &mut Turn<'_>, data: &str) -> Result<Flow, BotError> {
        let experienced = match data {
            callback::YES => true,
            callback::NO => false,
            _ => return Ok(Flow::Unhandled),
        };
        turn.session.user_data.teacher_has_prior_experience = Some(experienced);

        let reply = self.replies(turn).ask_teaching_mode();
        self.respond(turn, reply).await?;
        Ok(Flow::Next(ConversationState::AskNumberOfGroupsOrStudentAgeGroups))
    }

    /// Speaking-club-only teachers take no groups; newcomers start with one
    pub(super) async fn store_teaching_mode(&self, turn: &mut Turn<'_>, data: &str) -> Result<Flow, BotError> {
        let Some(mode) = TeachingMode::parse(data) else {
            return Ok(Flow::Unhandled);
        };
        let user = &mut turn.session.user_data;
        user.teacher_teaching_mode = Some(mode);
        user.teacher_can_host_speaking_club = mode != TeachingMode::Group;

        match mode {
            TeachingMode::SpeakingClub => {
                user.teacher_number_of_groups = 0;
                user.teacher_class_frequency = 1;
            }
            TeachingMode::Group | TeachingMode::Both => {
                user.teacher_class_frequency = 2;
                if user.teacher_has_prior_experience == Some(true) {
                    let reply = self.replies(turn).ask_number_of_groups();
                    self.respond(turn, reply).await?;
                    return Ok(Flow::Next(ConversationState::PreferredStudentAgeGroupsStart));
                }
                user.teacher_number_of_groups = 1;
            }
        }
        self.ask_student_age_groups(turn).await
    }

    pub(super) async fn store_number_of_groups(&self, turn: &mut Turn<'_>, data: &str) -> Result<Flow, BotError> {
        let number = match data {
            "1" => 1,
            "2" => 2,
            _ => return Ok(Flow::Unhandled),
        };
        turn.session.user_data.teacher_number_of_groups = number;
        self.ask_student_age_groups(turn).await
    }

    async fn ask_student_age_groups(&self, turn: &Turn<'_>) -> Result<Flow, BotError> {
        let reply = self.replies(turn).ask_teacher_student_age_groups(&turn.session.user_data);
        self.respond(turn, reply).await?;
        Ok(Flow::Next(ConversationState::PreferredStudentAgeGroupsMenuOrAskNonTeachingHelp))
    }

    pub(super) async fn student_age_groups_menu(&self, turn: &mut Turn<'_>, data: &str) -> Result<Flow, BotError> {
        if data == callback::DONE {
            if turn.session.user_data.teacher_student_age_range_ids.is_empty() {
                return Ok(Flow::Unhandled);
            }
            return self.ask_non_teaching_help(turn).await;
        }
        if !is_digits(data) {
            return Ok(Flow::Unhandled);
        }
        let Some(range) = self.data.teacher_age_ranges.iter().find(|r| r.id.to_string() == data) else {
            return Ok(Flow::Unhandled);
        };

        let chosen = &mut turn.session.user_data.teacher_student_age_range_ids;
        if !chosen.contains(&range.id) {
            chosen.push(range.id);
        }
        if chosen.len() >= self.data.teacher_age_ranges.len() {
            return self.ask_non_teaching_help(turn).await;
        }
        self.ask_student_age_groups(turn).await
    }

    /// Experienced teachers may also help their peers
    pub(super) async fn after_teacher_non_teaching_help(&self, turn: &Turn<'_>) -> Result<Flow, BotError> {
        if turn.session.user_data.teacher_has_prior_experience == Some(true) {
            let reply = self.replies(turn).ask_peer_help(&turn.session.user_data);
            self.respond(turn, reply).await?;
            return Ok(Flow::Next(ConversationState::PeerHelpMenuOrAskAdditionalHelp));
        }
        self.ask_additional_help(turn).await
    }

    pub(super) async fn peer_help_menu(&self, turn: &mut Turn<'_>, data: &str) -> Result<Flow, BotError> {
        if data != callback::DONE {
            let peer_help = &mut turn.session.user_data.teacher_peer_help;
            if !peer_help.set(data) {
                return Ok(Flow::Unhandled);
            }
            let all_set = TEACHER_PEER_HELP_TYPES.iter().all(|t| peer_help.is_set(t));
            if !all_set {
                let reply = self.replies(turn).ask_peer_help(&turn.session.user_data);
                self.respond(turn, reply).await?;
                return Ok(Flow::Stay);
            }
        }
        self.ask_additional_help(turn).await
    }

    async fn ask_additional_help(&self, turn: &Turn<'_>) -> Result<Flow, BotError> {
        let reply = self.replies(turn).plain("ask_teacher_any_additional_help");
        self.respond(turn, reply).await?;
        Ok(Flow::Next(ConversationState::AskReview))
    }

    pub(super) async fn store_additional_skills(&self, turn: &mut Turn<'_>, text: &str) -> Result<Flow, BotError> {
        turn.session.user_data.teacher_additional_skills_comment = Some(text.trim().to_string());
        self.show_review(turn).await
    }

    /// Under-18 teachers can only host speaking clubs, and only from 16
    pub(super) async fn young_teacher_readiness(&self, turn: &mut Turn<'_>, data: &str) -> Result<Flow, BotError> {
        match data {
            callback::YES => {
                turn.session.user_data.teacher_can_host_speaking_club = true;
                let reply = self.replies(turn).ask_communication_language(Some(Role::Teacher));
                self.respond(turn, reply).await?;
                Ok(Flow::Next(ConversationState::AskYoungTeacherSpeakingClubLanguage))
            }
            callback::NO => {
                self.notifier
                    .info("Young teacher cannot host a speaking club yet", Some(turn.update), false)
                    .await;
                let reply = self.replies(turn).plain("reply_cannot_work");
                self.respond(turn, reply).await?;
                Ok(Flow::End)
            }
            _ => Ok(Flow::Unhandled),
        }
    }

    pub(super) async fn store_young_teacher_communication_language(
        &self,
        turn: &mut Turn<'_>,
        data: &str,
    ) -> Result<Flow, BotError> {
        if !STUDENT_COMMUNICATION_LANGUAGE_CODES.contains(&data) {
            return Ok(Flow::Unhandled);
        }
        turn.session.user_data.communication_language_in_class = Some(data.to_string());

        let reply = self.replies(turn).ask_teaching_languages(&turn.session.user_data, false);
        self.respond(turn, reply).await?;
        Ok(Flow::Next(ConversationState::AskYoungTeacherAdditionalHelp))
    }

    pub(super) async fn store_young_teacher_language(&self, turn: &mut Turn<'_>, data: &str) -> Result<Flow, BotError> {
        if !self.data.sorted_language_ids.iter().any(|id| id == data) {
            return Ok(Flow::Unhandled);
        }
        let id = self
            .data
            .language_and_level_id(data, YOUNG_TEACHER_LEVEL)
            .ok_or_else(|| BotError::NotFound(format!("language and level {}/{}", data, YOUNG_TEACHER_LEVEL)))?;

        let user = &mut turn.session.user_data;
        user.levels_for_teaching_language
            .insert(data.to_string(), vec![YOUNG_TEACHER_LEVEL.to_string()]);
        user.language_and_level_ids = vec![id];

        if let Event::Callback { message_id: Some(message_id), .. } = &turn.update.event {
            self.delete_quietly(turn.chat_id(), *message_id).await;
        }
        let reply = self.replies(turn).plain("ask_teacher_any_additional_help");
        self.send(turn, reply).await?;
        Ok(Flow::Next(ConversationState::AskFinalComment))
    }

    pub(super) async fn store_young_teacher_additional_skills(
        &self,
        turn: &mut Turn<'_>,
        text: &str,
    ) -> Result<Flow, BotError> {
        turn.session.user_data.teacher_additional_skills_comment = Some(text.trim().to_string());

        let replies = self.replies(turn);
        let email = turn.session.user_data.email.as_deref().unwrap_or_default();
        let reply = Reply::text(format!(
            "{} {}\n\n{}",
            replies.phrase("young_teacher_we_will_email_you"),
            email,
            replies.phrase("ask_final_comment")
        ));
        self.send(turn, reply).await?;
        Ok(Flow::Next(ConversationState::Bye))
    }
}
