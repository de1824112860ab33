//! Registration conversation
//!
//! One `Conversation` serves every chat. Each update is handled against the chat's
//! [`Session`]: the state says what answer the bot is waiting for, the handler stores
//! that answer, asks the next question and returns the next state.

mod common;
mod finish;
pub mod keyboard;
pub mod replies;
mod review;
mod student;
mod teacher;

use std::sync::Arc;
use std::time::Duration;

use crate::application::errors::BotError;
use crate::application::services::{MessageForwarder, Notifier};
use crate::domain::entities::{
    BotData, ConversationMode, ConversationState, Event, IncomingUpdate, Locale, Session,
};
use crate::domain::traits::{Bot, OralTestService, RegistrationBackend, ReplyMarkup};

pub use replies::{Replies, Reply};

/// Where the conversation goes after a handler ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Next(ConversationState),
    /// Conversation is over
    End,
    /// Keep the current state
    Stay,
    /// The update does not fit the current state
    Unhandled,
}

/// One update being handled
pub(crate) struct Turn<'a> {
    pub update: &'a IncomingUpdate,
    pub session: &'a mut Session,
    callback_answered: bool,
}

impl<'a> Turn<'a> {
    fn chat_id(&self) -> i64 {
        self.update.chat_id
    }

    /// Id of the user's own message, if the update is one
    fn user_message_id(&self) -> Option<i64> {
        match &self.update.event {
            Event::Text { message_id, .. }
            | Event::Contact { message_id, .. }
            | Event::Command { message_id, .. } => Some(*message_id),
            Event::Callback { .. } => None,
        }
    }
}

/// The registration conversation engine
pub struct Conversation {
    bot: Arc<dyn Bot>,
    backend: Arc<dyn RegistrationBackend>,
    oral_test: Arc<dyn OralTestService>,
    forwarder: Arc<MessageForwarder>,
    data: Arc<BotData>,
    notifier: Notifier,
    speaking_club_coordinator: Option<String>,
    fallback_lifetime: Duration,
}

impl Conversation {
    pub fn new(
        bot: Arc<dyn Bot>,
        backend: Arc<dyn RegistrationBackend>,
        oral_test: Arc<dyn OralTestService>,
        forwarder: Arc<MessageForwarder>,
        data: Arc<BotData>,
        notifier: Notifier,
    ) -> Self {
        Self {
            bot,
            backend,
            oral_test,
            forwarder,
            data,
            notifier,
            speaking_club_coordinator: None,
            fallback_lifetime: Duration::from_secs(5),
        }
    }

    pub fn with_speaking_club_coordinator(mut self, username: Option<String>) -> Self {
        self.speaking_club_coordinator = username.filter(|u| !u.is_empty());
        self
    }

    /// How long the "use the buttons" hint stays in the chat
    pub fn with_fallback_lifetime(mut self, lifetime: Duration) -> Self {
        self.fallback_lifetime = lifetime;
        self
    }

    pub fn data(&self) -> &BotData {
        &self.data
    }

    /// Handle one update for one chat. Every callback query gets answered exactly once.
    pub async fn handle(&self, session: &mut Session, update: &IncomingUpdate) -> Result<(), BotError> {
        let mut turn = Turn { update, session, callback_answered: false };
        let result = self.route(&mut turn).await;

        if let Event::Callback { id, .. } = &update.event {
            if !turn.callback_answered {
                if let Err(e) = self.bot.answer_callback(id, None, false).await {
                    tracing::warn!("Failed to answer callback {}: {}", id, e);
                }
            }
        }

        match result? {
            Flow::Next(state) => {
                tracing::debug!("Chat {}: {:?} -> {:?}", update.chat_id, turn.session.state, state);
                turn.session.state = Some(state);
            }
            Flow::End => {
                tracing::debug!("Chat {}: conversation ended", update.chat_id);
                turn.session.state = None;
            }
            Flow::Stay | Flow::Unhandled => {}
        }
        Ok(())
    }

    async fn route(&self, turn: &mut Turn<'_>) -> Result<Flow, BotError> {
        let update = turn.update;

        if let Event::Command { name, .. } = &update.event {
            match name.as_str() {
                "start" => return self.start(turn).await,
                "cancel" => return self.cancel(turn).await,
                "help" => return self.help(turn).await,
                _ => {}
            }
        }

        let Some(state) = turn.session.state else {
            return self.outside_conversation(turn).await;
        };

        let flow = match &update.event {
            Event::Callback { data, .. } => self.on_callback(state, turn, data).await?,
            Event::Text { text, .. } => self.on_text(state, turn, text).await?,
            Event::Contact { phone_number, .. } if state == ConversationState::AskEmail => {
                self.store_phone(turn, phone_number).await?
            }
            Event::Contact { .. } | Event::Command { .. } => Flow::Unhandled,
        };

        if flow == Flow::Unhandled {
            self.fallback(turn, state).await?;
        }
        Ok(flow)
    }

    async fn on_callback(
        &self,
        state: ConversationState,
        turn: &mut Turn<'_>,
        data: &str,
    ) -> Result<Flow, BotError> {
        use ConversationState::*;

        match state {
            IsRegistered => self.store_locale(turn, data).await,
            CheckChatIdAskTimezone => self.check_chat_id(turn, data).await,
            CheckIfWantsToRegisterAnotherPersonAskTimezone => self.register_another_person(turn, data).await,
            AskFirstName => self.store_timezone(turn, data).await,
            AskPhoneNumber => self.store_username_decision(turn, data).await,
            AskAge => self.store_role(turn, data).await,
            TimeSlotsStart => self.store_age(turn, data).await,
            TimeSlotsMenuOrAskTeachingLanguage => self.time_slots_menu(turn, data).await,
            AskLevelOrAnotherTeachingLanguageOrCommunicationLanguage => {
                self.store_teaching_language(turn, data).await
            }
            AskLevelOrCommunicationLanguage => self.store_level(turn, data).await,
            AdolescentsAskCommunicationLanguageOrStartAssessment => {
                self.store_how_long_learning(turn, data).await
            }
            AskAssessmentQuestion => self.assessment_answer(turn, data).await,
            SendSmalltalkUrlOrAskCommunicationLanguage => self.smalltalk_decision(turn, data).await,
            AskCommunicationLanguageAfterSmalltalk => self.smalltalk_done(turn, data).await,
            CreateStudentWithHighLevelOrBye => self.high_level_decision(turn, data).await,
            AskStudentNonTeachingHelpOrStartReview => self.store_student_communication_language(turn, data).await,
            NonTeachingHelpMenuOrPeerHelpForTeacherOrReviewForStudent => {
                self.non_teaching_help_menu(turn, data).await
            }
            AskTeachingExperience => self.store_teacher_communication_language(turn, data).await,
            AskTeachingGroupOrSpeakingClub => self.store_teaching_experience(turn, data).await,
            AskNumberOfGroupsOrStudentAgeGroups => self.store_teaching_mode(turn, data).await,
            PreferredStudentAgeGroupsStart => self.store_number_of_groups(turn, data).await,
            PreferredStudentAgeGroupsMenuOrAskNonTeachingHelp => self.student_age_groups_menu(turn, data).await,
            PeerHelpMenuOrAskAdditionalHelp => self.peer_help_menu(turn, data).await,
            AskYoungTeacherCommunicationLanguage => self.young_teacher_readiness(turn, data).await,
            AskYoungTeacherSpeakingClubLanguage => self.store_young_teacher_communication_language(turn, data).await,
            AskYoungTeacherAdditionalHelp => self.store_young_teacher_language(turn, data).await,
            ReviewMenuOrAskFinalComment => self.review_decision(turn, data).await,
            ReviewRequestedItem => self.review_category(turn, data).await,
            AskLastName | AskSource | CheckUsername | AskEmail | AskRole | AskReview | AskFinalComment
            | Bye | ChatWithOperator => Ok(Flow::Unhandled),
        }
    }

    async fn on_text(&self, state: ConversationState, turn: &mut Turn<'_>, text: &str) -> Result<Flow, BotError> {
        use ConversationState::*;

        match state {
            AskLastName => self.store_first_name(turn, text).await,
            AskSource => self.store_last_name(turn, text).await,
            CheckUsername => self.store_source(turn, text).await,
            AskEmail => self.store_phone(turn, text).await,
            AskRole => self.store_email(turn, text).await,
            AskReview => self.store_additional_skills(turn, text).await,
            AskFinalComment => self.store_young_teacher_additional_skills(turn, text).await,
            Bye => self.finish(turn, text).await,
            ChatWithOperator => self.forward_to_helpdesk(turn, text).await,
            _ => Ok(Flow::Unhandled),
        }
    }

    /// Updates arriving when no registration is in progress
    async fn outside_conversation(&self, turn: &mut Turn<'_>) -> Result<Flow, BotError> {
        let update = turn.update;
        match &update.event {
            Event::Text { text, .. } if turn.session.chat_data.mode == ConversationMode::ChatWithHelpdesk => {
                self.forward_to_helpdesk(turn, text).await
            }
            _ => {
                tracing::debug!("Chat {}: ignoring update outside conversation: {}", update.chat_id, update.describe());
                Ok(Flow::Stay)
            }
        }
    }

    async fn forward_to_helpdesk(&self, turn: &mut Turn<'_>, text: &str) -> Result<Flow, BotError> {
        let chat_id = turn.chat_id();
        self.forwarder.from_user_to_helpdesk(turn.session, chat_id, text).await?;
        Ok(Flow::Stay)
    }

    /// Text where a button press was expected: remove it and show a short-lived hint
    async fn fallback(&self, turn: &Turn<'_>, state: ConversationState) -> Result<(), BotError> {
        let Event::Text { message_id, .. } = &turn.update.event else {
            tracing::debug!("Chat {}: unexpected update in state {:?}", turn.chat_id(), state);
            return Ok(());
        };
        tracing::debug!("Chat {}: unexpected text in state {:?}", turn.chat_id(), state);

        let chat_id = turn.chat_id();
        self.delete_quietly(chat_id, *message_id).await;
        let hint = self.replies(turn).phrase("message_fallback");
        let hint_id = self.bot.send_message(chat_id, &hint, None, None).await?;

        let bot = self.bot.clone();
        let lifetime = self.fallback_lifetime;
        tokio::spawn(async move {
            tokio::time::sleep(lifetime).await;
            if let Err(e) = bot.delete_message(chat_id, hint_id).await {
                tracing::debug!("Could not delete hint in chat {}: {}", chat_id, e);
            }
        });
        Ok(())
    }

    /// Replies in the chosen locale, or the one Telegram reports before the user picks
    fn replies(&self, turn: &Turn<'_>) -> Replies<'_> {
        let locale = turn
            .session
            .user_data
            .locale
            .unwrap_or_else(|| Locale::from_language_code(turn.update.sender.language_code.as_deref()));
        Replies::new(&self.data, locale)
    }

    /// Put the reply in place of the message whose button was pressed, or send it.
    /// Reply keyboards cannot be edited in, so those always go in a new message.
    async fn respond(&self, turn: &Turn<'_>, reply: Reply) -> Result<(), BotError> {
        let chat_id = turn.chat_id();
        let Event::Callback { message_id: Some(message_id), .. } = &turn.update.event else {
            return self.send(turn, reply).await;
        };

        match reply.markup {
            None => {
                self.bot.edit_message(chat_id, *message_id, &reply.text, None, reply.parse_mode).await
            }
            Some(ReplyMarkup::Inline(keyboard)) => {
                self.bot
                    .edit_message(chat_id, *message_id, &reply.text, Some(keyboard), reply.parse_mode)
                    .await
            }
            Some(markup) => {
                self.delete_quietly(chat_id, *message_id).await;
                self.bot.send_message(chat_id, &reply.text, Some(markup), reply.parse_mode).await?;
                Ok(())
            }
        }
    }

    async fn send(&self, turn: &Turn<'_>, reply: Reply) -> Result<(), BotError> {
        self.bot
            .send_message(turn.chat_id(), &reply.text, reply.markup, reply.parse_mode)
            .await?;
        Ok(())
    }

    async fn delete_quietly(&self, chat_id: i64, message_id: i64) {
        if let Err(e) = self.bot.delete_message(chat_id, message_id).await {
            tracing::debug!("Could not delete message {} in chat {}: {}", message_id, chat_id, e);
        }
    }

    /// Answer the callback with a popup instead of the silent acknowledgement
    async fn alert(&self, turn: &mut Turn<'_>, text: &str) -> Result<(), BotError> {
        if let Event::Callback { id, .. } = &turn.update.event {
            // A callback query is answered once at most, even when that answer fails
            turn.callback_answered = true;
            if let Err(e) = self.bot.answer_callback(id, Some(text), true).await {
                tracing::warn!("Failed to show alert for callback {}: {}", id, e);
            }
        }
        Ok(())
    }

    /// Show collected data for confirmation
    async fn show_review(&self, turn: &Turn<'_>) -> Result<Flow, BotError> {
        let reply = self.replies(turn).review(&turn.session.user_data, turn.update.date);
        if turn.session.in_review() {
            if let Some(message_id) = turn.user_message_id() {
                self.delete_quietly(turn.chat_id(), message_id).await;
            }
        }
        self.respond(turn, reply).await?;
        Ok(Flow::Next(ConversationState::ReviewMenuOrAskFinalComment))
    }
}
