//! Reviewing and correcting collected data

use super::replies::REVIEW_CATEGORIES;
use super::{Conversation, Flow, Turn};
use crate::application::errors::BotError;
use crate::domain::entities::constants::callback;
use crate::domain::entities::{ConversationMode, ConversationState, Event};

impl Conversation {
    /// `yes` confirms the review, `no` lists what can be corrected
    pub(super) async fn review_decision(&self, turn: &mut Turn<'_>, data: &str) -> Result<Flow, BotError> {
        match data {
            callback::YES => {
                turn.session.chat_data.mode = ConversationMode::Normal;
                if let Event::Callback { message_id: Some(id), .. } = &turn.update.event {
                    self.bot.remove_inline_keyboard(turn.chat_id(), *id).await?;
                }
                let reply = self.replies(turn).plain("ask_final_comment");
                self.send(turn, reply).await?;
                Ok(Flow::Next(ConversationState::Bye))
            }
            callback::NO => {
                turn.session.chat_data.mode = ConversationMode::Review;
                let reply = self.replies(turn).ask_review_category(&turn.session.user_data);
                self.respond(turn, reply).await?;
                Ok(Flow::Next(ConversationState::ReviewRequestedItem))
            }
            _ => Ok(Flow::Unhandled),
        }
    }

    /// Ask the question for the picked item again; its handler returns to the review
    pub(super) async fn review_category(&self, turn: &mut Turn<'_>, data: &str) -> Result<Flow, BotError> {
        if !REVIEW_CATEGORIES.contains(&data) {
            return Ok(Flow::Unhandled);
        }
        tracing::debug!("Chat {}: reviewing {}", turn.chat_id(), data);

        match data {
            "first_name" => {
                let reply = self.replies(turn).plain("ask_first_name");
                self.respond(turn, reply).await?;
                Ok(Flow::Next(ConversationState::AskLastName))
            }
            "last_name" => {
                let reply = self.replies(turn).plain("ask_last_name");
                self.respond(turn, reply).await?;
                Ok(Flow::Next(ConversationState::AskSource))
            }
            "phone_number" => {
                let reply = self.replies(turn).ask_phone();
                self.respond(turn, reply).await?;
                Ok(Flow::Next(ConversationState::AskEmail))
            }
            "email" => {
                let reply = self.replies(turn).plain("ask_email");
                self.respond(turn, reply).await?;
                Ok(Flow::Next(ConversationState::AskRole))
            }
            "timezone" => self.ask_timezone(turn).await,
            "availability" => {
                turn.session.user_data.day_and_time_slot_ids.clear();
                self.ask_time_slots(turn, 0).await
            }
            "language_and_level" => {
                let user = &mut turn.session.user_data;
                user.levels_for_teaching_language.clear();
                user.language_and_level_ids.clear();
                self.ask_teaching_languages(turn).await
            }
            "class_communication_language" => {
                if turn.session.user_data.is_teacher() {
                    self.ask_teacher_communication_language(turn).await
                } else {
                    self.ask_student_communication_language(turn).await
                }
            }
            "student_age_group" => {
                let reply = self.replies(turn).ask_student_age();
                self.respond(turn, reply).await?;
                Ok(Flow::Next(ConversationState::TimeSlotsStart))
            }
            _ => Ok(Flow::Unhandled),
        }
    }
}
