//! Steps shared by students and teachers

use super::{Conversation, Flow, Reply, Turn};
use crate::application::errors::BotError;
use crate::application::services::validation::{
    is_digits, is_valid_email, normalize_phone_number, parse_utc_offset,
};
use crate::domain::entities::constants::{callback, ENGLISH, NON_TEACHING_HELP_TYPES, WEEKDAYS};
use crate::domain::entities::{
    ChatData, ConversationMode, ConversationState, Locale, Role, Session, UserData,
};
use crate::domain::traits::ReplyMarkup;

impl Conversation {
    /// `/start`: forget any previous attempt and greet the user
    pub(super) async fn start(&self, turn: &mut Turn<'_>) -> Result<Flow, BotError> {
        *turn.session = Session {
            state: None,
            user_data: UserData { chat_id: Some(turn.chat_id()), ..Default::default() },
            chat_data: ChatData::default(),
        };

        self.notifier.info("Started conversation", Some(turn.update), false).await;
        let reply = self.replies(turn).greeting(&turn.update.sender.first_name);
        self.send(turn, reply).await?;
        Ok(Flow::Next(ConversationState::IsRegistered))
    }

    pub(super) async fn cancel(&self, turn: &mut Turn<'_>) -> Result<Flow, BotError> {
        self.notifier.info("Cancelled conversation", Some(turn.update), false).await;
        turn.session.chat_data.mode = ConversationMode::Normal;
        let reply = self.replies(turn).plain("bye_cancel").with_markup(ReplyMarkup::RemoveKeyboard);
        self.send(turn, reply).await?;
        Ok(Flow::End)
    }

    pub(super) async fn help(&self, turn: &mut Turn<'_>) -> Result<Flow, BotError> {
        let reply = self.replies(turn).plain("help").with_markup(ReplyMarkup::RemoveKeyboard);
        self.send(turn, reply).await?;
        Ok(Flow::Stay)
    }

    pub(super) async fn store_locale(&self, turn: &mut Turn<'_>, data: &str) -> Result<Flow, BotError> {
        let Some(locale) = Locale::parse(data) else {
            return Ok(Flow::Unhandled);
        };
        turn.session.user_data.locale = Some(locale);

        let reply = self.replies(turn).yes_no_phrase("ask_already_with_us");
        self.respond(turn, reply).await?;
        Ok(Flow::Next(ConversationState::CheckChatIdAskTimezone))
    }

    /// The user says whether they are already registered
    pub(super) async fn check_chat_id(&self, turn: &mut Turn<'_>, data: &str) -> Result<Flow, BotError> {
        match data {
            callback::YES => {
                if self.forwarder.helpdesk_enabled() {
                    turn.session.chat_data.mode = ConversationMode::ChatWithHelpdesk;
                    let reply = self.replies(turn).plain("reply_chat_with_helpdesk");
                    self.respond(turn, reply).await?;
                    Ok(Flow::Next(ConversationState::ChatWithOperator))
                } else {
                    let reply = self.replies(turn).plain("reply_go_to_other_chat");
                    self.respond(turn, reply).await?;
                    Ok(Flow::End)
                }
            }
            callback::NO => {
                if self.backend.chat_id_is_registered(turn.chat_id()).await? {
                    let reply = self.replies(turn).yes_no_phrase("reply_chat_id_found");
                    self.respond(turn, reply).await?;
                    Ok(Flow::Next(ConversationState::CheckIfWantsToRegisterAnotherPersonAskTimezone))
                } else {
                    self.ask_timezone(turn).await
                }
            }
            _ => Ok(Flow::Unhandled),
        }
    }

    pub(super) async fn register_another_person(&self, turn: &mut Turn<'_>, data: &str) -> Result<Flow, BotError> {
        match data {
            callback::YES => self.ask_timezone(turn).await,
            callback::NO => {
                let reply = self.replies(turn).plain("bye_wait_for_message_from_bot");
                self.respond(turn, reply).await?;
                Ok(Flow::End)
            }
            _ => Ok(Flow::Unhandled),
        }
    }

    pub(super) async fn ask_timezone(&self, turn: &Turn<'_>) -> Result<Flow, BotError> {
        let reply = self.replies(turn).ask_timezone(turn.update.date);
        self.respond(turn, reply).await?;
        Ok(Flow::Next(ConversationState::AskFirstName))
    }

    pub(super) async fn store_timezone(&self, turn: &mut Turn<'_>, data: &str) -> Result<Flow, BotError> {
        let Some((hour, minute)) = parse_utc_offset(data) else {
            return Ok(Flow::Unhandled);
        };
        turn.session.user_data.utc_offset_hour = hour;
        turn.session.user_data.utc_offset_minute = minute;

        if turn.session.in_review() {
            return self.show_review(turn).await;
        }
        let reply = self.replies(turn).plain("ask_first_name");
        self.respond(turn, reply).await?;
        Ok(Flow::Next(ConversationState::AskLastName))
    }

    pub(super) async fn store_first_name(&self, turn: &mut Turn<'_>, text: &str) -> Result<Flow, BotError> {
        turn.session.user_data.first_name = Some(text.trim().to_string());
        if turn.session.in_review() {
            return self.show_review(turn).await;
        }
        let reply = self.replies(turn).plain("ask_last_name");
        self.send(turn, reply).await?;
        Ok(Flow::Next(ConversationState::AskSource))
    }

    pub(super) async fn store_last_name(&self, turn: &mut Turn<'_>, text: &str) -> Result<Flow, BotError> {
        turn.session.user_data.last_name = Some(text.trim().to_string());
        if turn.session.in_review() {
            return self.show_review(turn).await;
        }
        let reply = self.replies(turn).plain("ask_source");
        self.send(turn, reply).await?;
        Ok(Flow::Next(ConversationState::CheckUsername))
    }

    /// Stores how the user found the school, then offers to use their Telegram username
    pub(super) async fn store_source(&self, turn: &mut Turn<'_>, text: &str) -> Result<Flow, BotError> {
        turn.session.user_data.source = Some(text.trim().to_string());

        match turn.update.sender.username.as_deref() {
            Some(username) if !username.is_empty() => {
                let reply = self.replies(turn).ask_store_username(username);
                self.send(turn, reply).await?;
                Ok(Flow::Next(ConversationState::AskPhoneNumber))
            }
            _ => {
                let reply = self.replies(turn).ask_phone();
                self.send(turn, reply).await?;
                Ok(Flow::Next(ConversationState::AskEmail))
            }
        }
    }

    pub(super) async fn store_username_decision(&self, turn: &mut Turn<'_>, data: &str) -> Result<Flow, BotError> {
        match data {
            callback::STORE_USERNAME_YES => {
                turn.session.user_data.tg_username = turn.update.sender.username.clone();
                turn.session.user_data.phone_number = None;
                let reply = self.replies(turn).plain("ask_email");
                self.respond(turn, reply).await?;
                Ok(Flow::Next(ConversationState::AskRole))
            }
            callback::STORE_USERNAME_NO => {
                turn.session.user_data.tg_username = None;
                let reply = self.replies(turn).ask_phone();
                self.respond(turn, reply).await?;
                Ok(Flow::Next(ConversationState::AskEmail))
            }
            _ => Ok(Flow::Unhandled),
        }
    }

    /// Phone number typed in or shared as a contact
    pub(super) async fn store_phone(&self, turn: &mut Turn<'_>, input: &str) -> Result<Flow, BotError> {
        let Some(phone_number) = normalize_phone_number(input) else {
            tracing::info!("Chat {}: invalid phone number {:?}", turn.chat_id(), input);
            let reply = self.replies(turn).invalid_phone(input);
            self.send(turn, reply).await?;
            return Ok(Flow::Stay);
        };
        turn.session.user_data.phone_number = Some(phone_number);

        if turn.session.in_review() {
            return self.show_review(turn).await;
        }
        let reply = self.replies(turn).ask_email();
        self.send(turn, reply).await?;
        Ok(Flow::Next(ConversationState::AskRole))
    }

    pub(super) async fn store_email(&self, turn: &mut Turn<'_>, text: &str) -> Result<Flow, BotError> {
        let email = text.trim();
        if !is_valid_email(email) {
            let reply = Reply::text(format!("{} {}", email, self.replies(turn).phrase("invalid_email")));
            self.send(turn, reply).await?;
            return Ok(Flow::Stay);
        }
        turn.session.user_data.email = Some(email.to_string());

        let user = &turn.session.user_data;
        let exists = self
            .backend
            .person_exists(
                user.first_name.as_deref().unwrap_or_default(),
                user.last_name.as_deref().unwrap_or_default(),
                email,
            )
            .await?;
        if exists {
            self.notifier
                .info(&format!("User {} is already registered", user.full_name()), Some(turn.update), false)
                .await;
            let reply = self.replies(turn).plain("user_already_exists");
            self.send(turn, reply).await?;
            return Ok(Flow::End);
        }

        if turn.session.in_review() {
            return self.show_review(turn).await;
        }
        let reply = self.replies(turn).ask_role();
        self.send(turn, reply).await?;
        Ok(Flow::Next(ConversationState::AskAge))
    }

    pub(super) async fn store_role(&self, turn: &mut Turn<'_>, data: &str) -> Result<Flow, BotError> {
        let Some(role) = Role::parse(data) else {
            return Ok(Flow::Unhandled);
        };
        turn.session.user_data.role = Some(role);

        let reply = match role {
            Role::Student => self.replies(turn).ask_student_age(),
            Role::Teacher => self.replies(turn).yes_no_phrase("ask_if_18"),
        };
        self.respond(turn, reply).await?;
        Ok(Flow::Next(ConversationState::TimeSlotsStart))
    }

    /// Student age range, or the adult check for teachers
    pub(super) async fn store_age(&self, turn: &mut Turn<'_>, data: &str) -> Result<Flow, BotError> {
        let user = &mut turn.session.user_data;

        if user.is_teacher() {
            match data {
                callback::YES => user.teacher_is_under_18 = false,
                callback::NO => {
                    user.teacher_is_under_18 = true;
                    let reply = self.replies(turn).ask_young_teacher_readiness();
                    self.respond(turn, reply).await?;
                    return Ok(Flow::Next(ConversationState::AskYoungTeacherCommunicationLanguage));
                }
                _ => return Ok(Flow::Unhandled),
            }
        } else {
            let Some(range) = data
                .parse::<i64>()
                .ok()
                .and_then(|id| self.data.student_age_range_for_id.get(&id))
            else {
                return Ok(Flow::Unhandled);
            };
            user.student_age_range_id = Some(range.id);
            user.student_age_from = Some(range.age_from);
            user.student_age_to = Some(range.age_to);

            if turn.session.in_review() {
                return self.show_review(turn).await;
            }
        }

        self.ask_time_slots(turn, 0).await
    }

    pub(super) async fn ask_time_slots(&self, turn: &mut Turn<'_>, day_index: usize) -> Result<Flow, BotError> {
        turn.session.chat_data.day_index = day_index;
        let reply = self.replies(turn).ask_time_slots(&turn.session.user_data, day_index);
        self.respond(turn, reply).await?;
        Ok(Flow::Next(ConversationState::TimeSlotsMenuOrAskTeachingLanguage))
    }

    /// A slot was picked, or the user moves on to the next day
    pub(super) async fn time_slots_menu(&self, turn: &mut Turn<'_>, data: &str) -> Result<Flow, BotError> {
        let day_index = turn.session.chat_data.day_index;

        if is_digits(data) {
            let Some(slot) = data
                .parse::<i64>()
                .ok()
                .and_then(|id| self.data.day_and_time_slot_for_slot_id.get(&id))
            else {
                return Ok(Flow::Unhandled);
            };
            let slots = &mut turn.session.user_data.day_and_time_slot_ids;
            if !slots.contains(&slot.id) {
                slots.push(slot.id);
            }
            return self.ask_time_slots(turn, day_index).await;
        }

        if data != callback::NEXT {
            return Ok(Flow::Unhandled);
        }

        if day_index + 1 < WEEKDAYS.len() {
            return self.ask_time_slots(turn, day_index + 1).await;
        }

        if turn.session.user_data.day_and_time_slot_ids.is_empty() {
            let text = self.replies(turn).phrase("no_slots_selected");
            self.alert(turn, &text).await?;
            return self.ask_time_slots(turn, 0).await;
        }

        turn.session.chat_data.day_index = 0;
        if turn.session.in_review() {
            return self.show_review(turn).await;
        }
        self.ask_teaching_languages(turn).await
    }

    pub(super) async fn ask_teaching_languages(&self, turn: &Turn<'_>) -> Result<Flow, BotError> {
        let user = &turn.session.user_data;
        let show_done = user.is_teacher() && user.levels_for_teaching_language.values().any(|l| !l.is_empty());
        let reply = self.replies(turn).ask_teaching_languages(user, show_done);
        self.respond(turn, reply).await?;
        Ok(Flow::Next(ConversationState::AskLevelOrAnotherTeachingLanguageOrCommunicationLanguage))
    }

    pub(super) async fn store_teaching_language(&self, turn: &mut Turn<'_>, data: &str) -> Result<Flow, BotError> {
        if data == callback::DONE && turn.session.user_data.is_teacher() {
            if turn.session.in_review() {
                return self.show_review(turn).await;
            }
            return self.ask_teacher_communication_language(turn).await;
        }

        if !self.data.sorted_language_ids.iter().any(|id| id == data) {
            return Ok(Flow::Unhandled);
        }

        let user = &mut turn.session.user_data;
        user.levels_for_teaching_language.entry(data.to_string()).or_default();
        turn.session.chat_data.teaching_language = Some(data.to_string());

        let reply = if turn.session.user_data.is_student() && data == ENGLISH {
            self.replies(turn).yes_no_phrase("ask_student_if_can_read_in_english")
        } else {
            self.replies(turn).ask_levels(&turn.session.user_data, data, false)
        };
        self.respond(turn, reply).await?;
        Ok(Flow::Next(ConversationState::AskLevelOrCommunicationLanguage))
    }

    pub(super) async fn store_level(&self, turn: &mut Turn<'_>, data: &str) -> Result<Flow, BotError> {
        let Some(language) = turn.session.chat_data.teaching_language.clone() else {
            return Ok(Flow::Unhandled);
        };
        if turn.session.user_data.is_student() {
            self.store_student_level(turn, &language, data).await
        } else {
            self.store_teacher_level(turn, &language, data).await
        }
    }

    pub(super) async fn ask_non_teaching_help(&self, turn: &Turn<'_>) -> Result<Flow, BotError> {
        let reply = self.replies(turn).ask_non_teaching_help(&turn.session.user_data);
        self.respond(turn, reply).await?;
        Ok(Flow::Next(ConversationState::NonTeachingHelpMenuOrPeerHelpForTeacherOrReviewForStudent))
    }

    /// Non-teaching help picked one at a time; `done` moves on
    pub(super) async fn non_teaching_help_menu(&self, turn: &mut Turn<'_>, data: &str) -> Result<Flow, BotError> {
        if data != callback::DONE {
            if !NON_TEACHING_HELP_TYPES.contains(&data) {
                return Ok(Flow::Unhandled);
            }
            let chosen = &mut turn.session.user_data.non_teaching_help_types;
            if !chosen.iter().any(|t| t == data) {
                chosen.push(data.to_string());
            }
            if chosen.len() < NON_TEACHING_HELP_TYPES.len() {
                return self.ask_non_teaching_help(turn).await;
            }
        }

        if turn.session.user_data.is_student() {
            return self.show_review(turn).await;
        }
        self.after_teacher_non_teaching_help(turn).await
    }
}
