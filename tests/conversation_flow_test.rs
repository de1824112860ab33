//! Registration conversation driven end-to-end with in-memory fakes
//! Run with: cargo test --test conversation_flow_test

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use registration_bot::application::conversation::Conversation;
use registration_bot::application::errors::{ApiError, BotError};
use registration_bot::application::messaging::{Inbound, MessageDispatcher};
use registration_bot::application::services::{MessageForwarder, Notifier};
use registration_bot::domain::entities::{
    AgeRange, AgeRangeType, Assessment, AssessmentQuestion, AssessmentQuestionOption, BotData,
    ConversationMode, ConversationState, DayAndTimeSlot, Event, HelpdeskDirection, HelpdeskUpdate,
    IncomingUpdate, LanguageAndLevel, Locale, Phrases, Role, Sender, Session, TeachingMode, UserData,
};
use registration_bot::domain::traits::{
    Bot, BotCommand, BotInfo, CreatedPerson, Helpdesk, KeyboardButton, OralTest, OralTestOutcome,
    OralTestResult, OralTestService, ParseMode, RegistrationBackend, ReplyMarkup, SessionStore,
};
use registration_bot::infrastructure::storage::MemoryStore;
use tokio::sync::mpsc;

const CHAT: i64 = 4242;
const ADMIN_CHAT: i64 = -100;
const CALLBACK_MESSAGE: i64 = 500;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Send { chat_id: i64, text: String, markup: Option<ReplyMarkup> },
    Edit { message_id: i64, text: String },
    RemoveKeyboard { message_id: i64 },
    Delete { message_id: i64 },
    Answer { id: String, text: Option<String>, alert: bool },
}

struct FakeBot {
    calls: Mutex<Vec<Call>>,
    next_message_id: AtomicI64,
    answer_fails: AtomicBool,
}

impl FakeBot {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            next_message_id: AtomicI64::new(1000),
            answer_fails: AtomicBool::new(false),
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Text of everything shown to the user, sent or edited in
    fn user_texts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Send { chat_id, text, .. } if chat_id == CHAT => Some(text),
                Call::Edit { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    fn admin_texts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Send { chat_id, text, .. } if chat_id == ADMIN_CHAT => Some(text),
                _ => None,
            })
            .collect()
    }

    fn answers(&self, callback_id: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, Call::Answer { id, .. } if id == callback_id))
            .collect()
    }
}

#[async_trait]
impl Bot for FakeBot {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        markup: Option<ReplyMarkup>,
        _parse_mode: Option<ParseMode>,
    ) -> Result<i64, BotError> {
        self.calls.lock().unwrap().push(Call::Send { chat_id, text: text.to_string(), markup });
        Ok(self.next_message_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn edit_message(
        &self,
        _chat_id: i64,
        message_id: i64,
        text: &str,
        _keyboard: Option<Vec<Vec<KeyboardButton>>>,
        _parse_mode: Option<ParseMode>,
    ) -> Result<(), BotError> {
        self.calls.lock().unwrap().push(Call::Edit { message_id, text: text.to_string() });
        Ok(())
    }

    async fn remove_inline_keyboard(&self, _chat_id: i64, message_id: i64) -> Result<(), BotError> {
        self.calls.lock().unwrap().push(Call::RemoveKeyboard { message_id });
        Ok(())
    }

    async fn delete_message(&self, _chat_id: i64, message_id: i64) -> Result<(), BotError> {
        self.calls.lock().unwrap().push(Call::Delete { message_id });
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>, show_alert: bool) -> Result<(), BotError> {
        self.calls.lock().unwrap().push(Call::Answer {
            id: callback_id.to_string(),
            text: text.map(str::to_string),
            alert: show_alert,
        });
        if self.answer_fails.load(Ordering::SeqCst) {
            return Err(BotError::Network("query is too old".into()));
        }
        Ok(())
    }

    async fn set_commands(&self, _commands: &[BotCommand], _language_code: &str) -> Result<(), BotError> {
        Ok(())
    }

    fn bot_info(&self) -> BotInfo {
        BotInfo { id: "1".into(), name: "Test".into(), username: "test_bot".into() }
    }
}

#[derive(Default)]
struct FakeBackend {
    registered_check_fails: AtomicBool,
    person_exists: AtomicBool,
    create_fails: AtomicBool,
    level: Mutex<String>,
    created: Mutex<Vec<UserData>>,
}

#[async_trait]
impl RegistrationBackend for FakeBackend {
    async fn chat_id_is_registered(&self, _chat_id: i64) -> Result<bool, ApiError> {
        if self.registered_check_fails.load(Ordering::SeqCst) {
            return Err(ApiError::Request("backend down".into()));
        }
        Ok(false)
    }

    async fn person_exists(&self, _first_name: &str, _last_name: &str, _email: &str) -> Result<bool, ApiError> {
        Ok(self.person_exists.load(Ordering::SeqCst))
    }

    async fn get_level_after_assessment(&self, _answer_ids: &[i64], _total: usize) -> Result<String, ApiError> {
        Ok(self.level.lock().unwrap().clone())
    }

    async fn create_person(&self, user_data: &UserData) -> Result<CreatedPerson, ApiError> {
        if self.create_fails.load(Ordering::SeqCst) {
            return Err(ApiError::UnexpectedStatus { status: 400, url: "students/".into(), body: "bad".into() });
        }
        self.created.lock().unwrap().push(user_data.clone());
        Ok(CreatedPerson { personal_info_id: 55 })
    }

    async fn get_helpdesk_conversation_id(&self, _chat_id: i64) -> Result<Option<i64>, ApiError> {
        Ok(None)
    }
}

struct FakeOralTest {
    outcome: Mutex<OralTestOutcome>,
}

impl Default for FakeOralTest {
    fn default() -> Self {
        Self { outcome: Mutex::new(OralTestOutcome::NotFinished) }
    }
}

#[async_trait]
impl OralTestService for FakeOralTest {
    async fn send_test(&self, _first_name: &str, _last_name: &str, _email: &str) -> Result<OralTest, ApiError> {
        Ok(OralTest { test_id: "st-1".into(), url: "https://smalltalk.test/st-1".into() })
    }

    async fn get_result(&self, _test_id: &str) -> Result<OralTestOutcome, ApiError> {
        Ok(self.outcome.lock().unwrap().clone())
    }
}

#[derive(Default)]
struct FakeHelpdesk {
    messages: Mutex<Vec<(i64, String)>>,
}

#[async_trait]
impl Helpdesk for FakeHelpdesk {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn start_conversation(&self, _chat_id: i64, _user_data: &UserData) -> Result<i64, ApiError> {
        Ok(77)
    }

    async fn send_message(&self, conversation_id: i64, text: &str) -> Result<(), ApiError> {
        self.messages.lock().unwrap().push((conversation_id, text.to_string()));
        Ok(())
    }
}

fn bot_data() -> BotData {
    let range = |id, age_from, age_to, range_type| AgeRange { id, age_from, age_to, range_type, bot_phrase_id: None };
    let level = |id, language: &str, level: &str| LanguageAndLevel {
        id,
        language_id: language.to_string(),
        level: level.to_string(),
    };
    BotData::new(
        Phrases::bundled().unwrap(),
        vec![
            range(2, 13, 17, AgeRangeType::Student),
            range(3, 18, 30, AgeRangeType::Student),
            range(4, 16, 20, AgeRangeType::Student),
            range(7, 18, 65, AgeRangeType::Teacher),
        ],
        vec![Assessment {
            id: 1,
            age_range_ids: vec![3, 4],
            questions: vec![AssessmentQuestion {
                id: 20,
                text: "I ___ a student".into(),
                options: vec![
                    AssessmentQuestionOption { id: 100, text: "am".into() },
                    AssessmentQuestionOption { id: 101, text: "I don't know".into() },
                ],
            }],
        }],
        vec![
            DayAndTimeSlot { id: 10, day_of_week_index: 0, from_utc_hour: 5, to_utc_hour: 8 },
            DayAndTimeSlot { id: 11, day_of_week_index: 3, from_utc_hour: 17, to_utc_hour: 20 },
        ],
        vec![
            level(50, "en", "A0"),
            level(51, "en", "A1"),
            level(52, "en", "A2"),
            level(53, "en", "B1"),
            level(54, "en", "B2"),
            level(60, "de", "A1"),
        ],
    )
}

struct Harness {
    bot: Arc<FakeBot>,
    backend: Arc<FakeBackend>,
    helpdesk: Arc<FakeHelpdesk>,
    oral_test: Arc<FakeOralTest>,
    store: Arc<MemoryStore>,
    conversation: Arc<Conversation>,
    dispatcher: Arc<MessageDispatcher>,
    phrases: Phrases,
}

fn harness() -> Harness {
    let bot = Arc::new(FakeBot::new());
    let backend = Arc::new(FakeBackend::default());
    *backend.level.lock().unwrap() = "A1".to_string();
    let helpdesk = Arc::new(FakeHelpdesk::default());
    let oral_test = Arc::new(FakeOralTest::default());
    let store = Arc::new(MemoryStore::new());
    let data = Arc::new(bot_data());
    let phrases = data.phrases.clone();

    let notifier = Notifier::new(bot.clone(), ADMIN_CHAT);
    let forwarder = Arc::new(MessageForwarder::new(bot.clone(), helpdesk.clone(), backend.clone(), store.clone()));
    let conversation = Arc::new(
        Conversation::new(bot.clone(), backend.clone(), oral_test.clone(), forwarder.clone(), data, notifier.clone())
            .with_speaking_club_coordinator(Some("coord".to_string()))
            .with_fallback_lifetime(Duration::from_millis(10)),
    );
    let dispatcher = Arc::new(
        MessageDispatcher::new(conversation.clone(), forwarder, store.clone(), notifier)
            .with_owner(Some("owner".to_string())),
    );

    Harness { bot, backend, helpdesk, oral_test, store, conversation, dispatcher, phrases }
}

static NEXT_CALLBACK: AtomicI64 = AtomicI64::new(1);

fn update(event: Event) -> IncomingUpdate {
    IncomingUpdate {
        chat_id: CHAT,
        sender: Sender {
            id: CHAT,
            first_name: "Olena".into(),
            last_name: Some("Shevchenko".into()),
            username: None,
            language_code: Some("en".into()),
        },
        date: Utc::now(),
        event,
    }
}

fn command(name: &str) -> IncomingUpdate {
    update(Event::Command { message_id: 1, name: name.to_string() })
}

fn text(text: &str) -> IncomingUpdate {
    update(Event::Text { message_id: 77, text: text.to_string() })
}

fn callback(data: &str) -> IncomingUpdate {
    let id = format!("cb-{}", NEXT_CALLBACK.fetch_add(1, Ordering::SeqCst));
    update(Event::Callback { id, message_id: Some(CALLBACK_MESSAGE), data: data.to_string() })
}

fn callback_id(update: &IncomingUpdate) -> String {
    match &update.event {
        Event::Callback { id, .. } => id.clone(),
        _ => String::new(),
    }
}

impl Harness {
    fn phrase(&self, id: &str) -> String {
        self.phrases.get(id, Locale::En).to_string()
    }

    async fn handle(&self, session: &mut Session, update: IncomingUpdate) {
        self.conversation.handle(session, &update).await.unwrap();
    }

    async fn press(&self, session: &mut Session, data: &str) {
        self.handle(session, callback(data)).await;
    }

    async fn say(&self, session: &mut Session, message: &str) {
        self.handle(session, text(message)).await;
    }

    fn created(&self) -> Vec<UserData> {
        self.backend.created.lock().unwrap().clone()
    }

    /// Wait for the dispatcher's chat workers to finish
    async fn wait_until_idle(&self) {
        for _ in 0..200 {
            if self.dispatcher.active_chats().await == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("chat workers are still running");
    }
}

fn student_session(state: ConversationState) -> Session {
    let mut session = Session::default();
    session.state = Some(state);
    session.user_data = UserData {
        locale: Some(Locale::En),
        chat_id: Some(CHAT),
        first_name: Some("Olena".into()),
        last_name: Some("Shevchenko".into()),
        email: Some("olena@example.com".into()),
        role: Some(Role::Student),
        student_age_range_id: Some(3),
        student_age_from: Some(18),
        student_age_to: Some(30),
        ..Default::default()
    };
    session
}

fn teacher_session(state: ConversationState) -> Session {
    let mut session = Session::default();
    session.state = Some(state);
    session.user_data = UserData {
        locale: Some(Locale::En),
        chat_id: Some(CHAT),
        first_name: Some("Olena".into()),
        last_name: Some("Shevchenko".into()),
        email: Some("olena@example.com".into()),
        role: Some(Role::Teacher),
        ..Default::default()
    };
    session
}

#[tokio::test]
async fn adult_student_registers_from_start_to_finish() {
    let h = harness();
    let mut session = Session::default();

    h.handle(&mut session, command("start")).await;
    assert_eq!(session.state, Some(ConversationState::IsRegistered));
    assert_eq!(session.user_data.chat_id, Some(CHAT));

    h.press(&mut session, "en").await;
    h.press(&mut session, "no").await;
    assert_eq!(session.state, Some(ConversationState::AskFirstName));

    h.press(&mut session, "2:00").await;
    h.say(&mut session, "Olena").await;
    h.say(&mut session, "Shevchenko").await;
    h.say(&mut session, "A friend told me").await;
    assert_eq!(session.state, Some(ConversationState::AskEmail));

    h.say(&mut session, "+380 67 123 4567").await;
    h.say(&mut session, "olena@example.com").await;
    assert_eq!(session.state, Some(ConversationState::AskAge));

    h.press(&mut session, "student").await;
    h.press(&mut session, "3").await;
    assert_eq!(session.state, Some(ConversationState::TimeSlotsMenuOrAskTeachingLanguage));

    h.press(&mut session, "10").await;
    for _ in 0..7 {
        h.press(&mut session, "next").await;
    }
    assert_eq!(
        session.state,
        Some(ConversationState::AskLevelOrAnotherTeachingLanguageOrCommunicationLanguage)
    );

    h.press(&mut session, "en").await;
    h.press(&mut session, "yes").await;
    assert_eq!(session.state, Some(ConversationState::AskAssessmentQuestion));

    h.press(&mut session, "ok").await;
    h.press(&mut session, "100").await;
    assert_eq!(session.state, Some(ConversationState::AskStudentNonTeachingHelpOrStartReview));

    h.press(&mut session, "ru").await;
    h.press(&mut session, "done").await;
    assert_eq!(session.state, Some(ConversationState::ReviewMenuOrAskFinalComment));

    h.press(&mut session, "yes").await;
    assert_eq!(session.state, Some(ConversationState::Bye));
    assert!(h.bot.calls().contains(&Call::RemoveKeyboard { message_id: CALLBACK_MESSAGE }));

    h.say(&mut session, "Thanks").await;
    assert_eq!(session.state, None);

    let created = h.backend.created.lock().unwrap().clone();
    assert_eq!(created.len(), 1);
    let person = &created[0];
    assert_eq!(person.role, Some(Role::Student));
    assert_eq!(person.utc_offset_hour, 2);
    assert_eq!(person.source.as_deref(), Some("A friend told me"));
    assert_eq!(person.phone_number.as_deref(), Some("+380671234567"));
    assert_eq!(person.day_and_time_slot_ids, vec![10]);
    assert_eq!(person.language_and_level_ids, vec![51]);
    assert_eq!(person.student_assessment_answers, vec![(20, 100)]);
    assert_eq!(person.communication_language_in_class.as_deref(), Some("ru"));
    assert_eq!(person.comment.as_deref(), Some("Thanks"));

    assert_eq!(h.bot.user_texts().last(), Some(&h.phrase("bye_wait_for_message_from_bot")));
    assert!(h
        .bot
        .admin_texts()
        .iter()
        .any(|t| t.contains("Created student Olena Shevchenko, ID 55")));
}

#[tokio::test]
async fn every_callback_is_answered_once() {
    let h = harness();
    let mut session = student_session(ConversationState::AskAge);

    let unknown = callback("bogus");
    h.handle(&mut session, unknown.clone()).await;
    let known = callback("student");
    h.handle(&mut session, known.clone()).await;

    assert_eq!(
        h.bot.answers(&callback_id(&unknown)),
        vec![Call::Answer { id: callback_id(&unknown), text: None, alert: false }]
    );
    assert_eq!(h.bot.answers(&callback_id(&known)).len(), 1);
    assert_eq!(session.state, Some(ConversationState::TimeSlotsStart));
}

#[tokio::test]
async fn no_slots_selected_shows_alert_and_restarts_the_week() {
    let h = harness();
    let mut session = student_session(ConversationState::TimeSlotsMenuOrAskTeachingLanguage);
    session.chat_data.day_index = 6;

    let next = callback("next");
    h.handle(&mut session, next.clone()).await;

    assert_eq!(
        h.bot.answers(&callback_id(&next)),
        vec![Call::Answer {
            id: callback_id(&next),
            text: Some(h.phrase("no_slots_selected")),
            alert: true
        }]
    );
    assert_eq!(session.chat_data.day_index, 0);
    assert_eq!(session.state, Some(ConversationState::TimeSlotsMenuOrAskTeachingLanguage));
}

#[tokio::test]
async fn unexpected_text_gets_a_short_lived_hint() {
    let h = harness();
    let mut session = student_session(ConversationState::AskAge);

    h.say(&mut session, "I am a student").await;

    assert_eq!(session.state, Some(ConversationState::AskAge));
    let calls = h.bot.calls();
    assert_eq!(calls[0], Call::Delete { message_id: 77 });
    let hint_id = match &calls[1] {
        Call::Send { text, .. } if *text == h.phrase("message_fallback") => 1000,
        other => panic!("expected the hint, got {:?}", other),
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(h.bot.calls().contains(&Call::Delete { message_id: hint_id }));
}

#[tokio::test]
async fn invalid_email_keeps_asking() {
    let h = harness();
    let mut session = student_session(ConversationState::AskRole);

    h.say(&mut session, "not-an-email").await;

    assert_eq!(session.state, Some(ConversationState::AskRole));
    assert_eq!(
        h.bot.user_texts().last(),
        Some(&format!("not-an-email {}", h.phrase("invalid_email")))
    );
}

#[tokio::test]
async fn known_person_is_not_registered_twice() {
    let h = harness();
    h.backend.person_exists.store(true, Ordering::SeqCst);
    let mut session = student_session(ConversationState::AskRole);

    h.say(&mut session, "olena@example.com").await;

    assert_eq!(session.state, None);
    assert_eq!(h.bot.user_texts().last(), Some(&h.phrase("user_already_exists")));
}

#[tokio::test]
async fn high_level_student_can_decline_the_speaking_club() {
    let h = harness();
    *h.backend.level.lock().unwrap() = "B2".to_string();
    let mut session = student_session(ConversationState::AskAssessmentQuestion);
    session.chat_data.assessment_age_range_id = Some(3);

    h.press(&mut session, "100").await;
    assert_eq!(session.state, Some(ConversationState::CreateStudentWithHighLevelOrBye));
    assert!(h.bot.admin_texts().iter().any(|t| t.contains("@coord")));

    h.press(&mut session, "no").await;
    assert_eq!(session.state, None);
    assert_eq!(h.bot.user_texts().last(), Some(&h.phrase("bye_high_level")));
    assert!(h.backend.created.lock().unwrap().is_empty());
}

#[tokio::test]
async fn failed_creation_tells_the_user() {
    let h = harness();
    h.backend.create_fails.store(true, Ordering::SeqCst);
    let mut session = student_session(ConversationState::Bye);

    h.say(&mut session, "").await;

    assert_eq!(session.state, None);
    assert_eq!(h.bot.user_texts().last(), Some(&h.phrase("registration_failed")));
    assert!(h.bot.admin_texts().iter().any(|t| t.contains("Cannot create student Olena Shevchenko")));
}

#[tokio::test]
async fn registered_user_chats_with_helpdesk() {
    let h = harness();
    let mut session = student_session(ConversationState::CheckChatIdAskTimezone);

    h.press(&mut session, "yes").await;
    assert_eq!(session.state, Some(ConversationState::ChatWithOperator));
    assert_eq!(session.chat_data.mode, ConversationMode::ChatWithHelpdesk);

    h.say(&mut session, "When is my class?").await;

    assert_eq!(session.chat_data.helpdesk_conversation_id, Some(77));
    assert_eq!(
        h.helpdesk.messages.lock().unwrap().clone(),
        vec![(77, "When is my class?".to_string())]
    );
}

#[tokio::test]
async fn cancel_ends_the_conversation() {
    let h = harness();
    let mut session = student_session(ConversationState::AskEmail);

    h.handle(&mut session, command("cancel")).await;

    assert_eq!(session.state, None);
    match h.bot.calls().last() {
        Some(Call::Send { text, markup, .. }) => {
            assert_eq!(*text, h.phrase("bye_cancel"));
            assert_eq!(*markup, Some(ReplyMarkup::RemoveKeyboard));
        }
        other => panic!("unexpected call {:?}", other),
    }
}

#[tokio::test]
async fn dispatcher_saves_session_after_success() {
    let h = harness();

    h.dispatcher.dispatch(Inbound::Telegram(command("start"))).await;

    let stored = h.store.load_session(CHAT).await.unwrap().unwrap();
    assert_eq!(stored.state, Some(ConversationState::IsRegistered));
}

#[tokio::test]
async fn dispatcher_keeps_session_when_update_fails() {
    let h = harness();
    h.backend.registered_check_fails.store(true, Ordering::SeqCst);
    let before = student_session(ConversationState::CheckChatIdAskTimezone);
    h.store.save_session(CHAT, &before).await.unwrap();

    h.dispatcher.dispatch(Inbound::Telegram(callback("no"))).await;

    assert_eq!(h.store.load_session(CHAT).await.unwrap(), Some(before));
    let reports = h.bot.admin_texts();
    assert!(reports.iter().any(|t| t.contains("backend down") && t.contains("@owner")));
}

#[tokio::test]
async fn dispatcher_delivers_operator_messages() {
    let h = harness();

    h.dispatcher
        .dispatch(Inbound::Helpdesk(HelpdeskUpdate {
            event: HelpdeskUpdate::MESSAGE_CREATED.to_string(),
            direction: Some(HelpdeskDirection::Outgoing),
            content: Some("Your class starts Monday".to_string()),
            chat_id: Some(CHAT),
            conversation_id: Some(77),
        }))
        .await;

    assert_eq!(h.bot.user_texts(), vec!["Your class starts Monday".to_string()]);
    let stored = h.store.load_session(CHAT).await.unwrap().unwrap();
    assert_eq!(stored.chat_data.mode, ConversationMode::ChatWithHelpdesk);
    assert_eq!(stored.chat_data.helpdesk_conversation_id, Some(77));
}

#[tokio::test]
async fn failed_alert_is_not_answered_again() {
    let h = harness();
    h.bot.answer_fails.store(true, Ordering::SeqCst);
    let mut session = student_session(ConversationState::TimeSlotsMenuOrAskTeachingLanguage);
    session.chat_data.day_index = 6;

    let next = callback("next");
    h.handle(&mut session, next.clone()).await;

    assert_eq!(
        h.bot.answers(&callback_id(&next)),
        vec![Call::Answer {
            id: callback_id(&next),
            text: Some(h.phrase("no_slots_selected")),
            alert: true
        }]
    );
    assert_eq!(session.chat_data.day_index, 0);
    assert_eq!(session.state, Some(ConversationState::TimeSlotsMenuOrAskTeachingLanguage));
}

#[tokio::test]
async fn adolescent_learning_under_a_year_skips_the_assessment() {
    let h = harness();
    let mut session = student_session(ConversationState::AskLevelOrAnotherTeachingLanguageOrCommunicationLanguage);
    session.user_data.student_age_range_id = Some(2);
    session.user_data.student_age_from = Some(13);
    session.user_data.student_age_to = Some(17);

    h.press(&mut session, "en").await;
    h.press(&mut session, "yes").await;
    assert_eq!(
        session.state,
        Some(ConversationState::AdolescentsAskCommunicationLanguageOrStartAssessment)
    );

    h.press(&mut session, "less_than_year").await;

    assert_eq!(session.state, Some(ConversationState::AskStudentNonTeachingHelpOrStartReview));
    assert!(session.user_data.student_needs_oral_interview);
    assert!(session.user_data.language_and_level_ids.is_empty());
    assert!(session.chat_data.assessment_age_range_id.is_none());
}

#[tokio::test]
async fn student_aged_up_to_twenty_who_can_read_takes_the_assessment() {
    let h = harness();
    let mut session = student_session(ConversationState::AskLevelOrAnotherTeachingLanguageOrCommunicationLanguage);
    session.user_data.student_age_range_id = Some(4);
    session.user_data.student_age_from = Some(16);
    session.user_data.student_age_to = Some(20);

    h.press(&mut session, "en").await;
    h.press(&mut session, "yes").await;

    assert_eq!(session.state, Some(ConversationState::AskAssessmentQuestion));
    assert_eq!(session.chat_data.assessment_age_range_id, Some(4));
    assert!(!session.user_data.student_needs_oral_interview);
}

#[tokio::test]
async fn student_needing_oral_interview_goes_to_the_coordinator_chat() {
    let h = harness();
    let mut session = student_session(ConversationState::AskStudentNonTeachingHelpOrStartReview);
    session.user_data.student_age_range_id = Some(2);
    session.user_data.student_age_from = Some(13);
    session.user_data.student_age_to = Some(17);
    session.user_data.student_needs_oral_interview = true;

    h.press(&mut session, "ru").await;
    assert_eq!(session.state, Some(ConversationState::ReviewMenuOrAskFinalComment));
    h.press(&mut session, "yes").await;
    h.say(&mut session, "Shy but keen").await;

    assert_eq!(session.state, None);
    let created = h.created();
    assert_eq!(created.len(), 1);
    let person = &created[0];
    assert_eq!(person.language_and_level_ids, vec![50]);
    assert_eq!(person.comment.as_deref(), Some("Shy but keen\n- NEEDS ORAL INTERVIEW!"));
    assert_eq!(person.student_payload(55)["project_status"], "needs_interview_to_determine_level");
    assert_eq!(h.bot.user_texts().last(), Some(&h.phrase("bye_go_to_chat_with_coordinator")));
}

#[tokio::test]
async fn adult_teacher_registers_with_groups_and_peer_help() {
    let h = harness();
    let mut session = teacher_session(ConversationState::AskAge);

    h.press(&mut session, "teacher").await;
    h.press(&mut session, "yes").await;
    assert_eq!(session.state, Some(ConversationState::TimeSlotsMenuOrAskTeachingLanguage));

    h.press(&mut session, "10").await;
    for _ in 0..7 {
        h.press(&mut session, "next").await;
    }
    h.press(&mut session, "en").await;
    assert_eq!(session.state, Some(ConversationState::AskLevelOrCommunicationLanguage));
    h.press(&mut session, "B1").await;
    assert_eq!(session.state, Some(ConversationState::AskLevelOrCommunicationLanguage));
    h.press(&mut session, "done").await;
    assert_eq!(
        session.state,
        Some(ConversationState::AskLevelOrAnotherTeachingLanguageOrCommunicationLanguage)
    );
    h.press(&mut session, "done").await;
    assert_eq!(session.state, Some(ConversationState::AskTeachingExperience));

    h.press(&mut session, "ru").await;
    h.press(&mut session, "yes").await;
    assert_eq!(session.state, Some(ConversationState::AskNumberOfGroupsOrStudentAgeGroups));
    h.press(&mut session, "both").await;
    assert_eq!(session.state, Some(ConversationState::PreferredStudentAgeGroupsStart));
    h.press(&mut session, "2").await;
    assert_eq!(session.state, Some(ConversationState::PreferredStudentAgeGroupsMenuOrAskNonTeachingHelp));

    h.press(&mut session, "7").await;
    assert_eq!(
        session.state,
        Some(ConversationState::NonTeachingHelpMenuOrPeerHelpForTeacherOrReviewForStudent)
    );
    h.press(&mut session, "translate_docs").await;
    h.press(&mut session, "done").await;
    assert_eq!(session.state, Some(ConversationState::PeerHelpMenuOrAskAdditionalHelp));

    h.press(&mut session, "can_give_feedback").await;
    assert_eq!(session.state, Some(ConversationState::PeerHelpMenuOrAskAdditionalHelp));
    h.press(&mut session, "done").await;
    assert_eq!(session.state, Some(ConversationState::AskReview));

    h.say(&mut session, "I play the guitar").await;
    assert_eq!(session.state, Some(ConversationState::ReviewMenuOrAskFinalComment));
    h.press(&mut session, "yes").await;
    h.say(&mut session, "").await;
    assert_eq!(session.state, None);

    let created = h.created();
    assert_eq!(created.len(), 1);
    let person = &created[0];
    assert!(!person.teacher_is_under_18);
    assert_eq!(person.day_and_time_slot_ids, vec![10]);
    assert_eq!(person.language_and_level_ids, vec![53]);
    assert_eq!(person.levels_for_teaching_language.get("en"), Some(&vec!["B1".to_string()]));
    assert_eq!(person.communication_language_in_class.as_deref(), Some("ru"));
    assert_eq!(person.teacher_has_prior_experience, Some(true));
    assert_eq!(person.teacher_teaching_mode, Some(TeachingMode::Both));
    assert_eq!(person.teacher_number_of_groups, 2);
    assert_eq!(person.teacher_class_frequency, 2);
    assert!(person.teacher_can_host_speaking_club);
    assert_eq!(person.teacher_student_age_range_ids, vec![7]);
    assert_eq!(person.non_teaching_help_types, vec!["translate_docs".to_string()]);
    assert!(person.teacher_peer_help.can_give_feedback);
    assert!(!person.teacher_peer_help.can_check_syllabus);
    assert_eq!(person.teacher_additional_skills_comment.as_deref(), Some("I play the guitar"));

    assert_eq!(h.bot.user_texts().last(), Some(&h.phrase("bye_wait_for_message_from_bot")));
    assert!(h
        .bot
        .admin_texts()
        .iter()
        .any(|t| t.contains("Created teacher Olena Shevchenko, ID 55 @coord")));
}

#[tokio::test]
async fn speaking_club_only_teacher_waits_for_the_coordinator() {
    let h = harness();
    let mut session = teacher_session(ConversationState::AskNumberOfGroupsOrStudentAgeGroups);
    session.user_data.day_and_time_slot_ids = vec![11];
    session.user_data.teacher_has_prior_experience = Some(false);

    h.press(&mut session, "speaking_club").await;
    assert_eq!(session.state, Some(ConversationState::PreferredStudentAgeGroupsMenuOrAskNonTeachingHelp));
    h.press(&mut session, "7").await;
    h.press(&mut session, "done").await;
    assert_eq!(session.state, Some(ConversationState::AskReview));

    h.say(&mut session, "-").await;
    h.press(&mut session, "yes").await;
    h.say(&mut session, "").await;

    assert_eq!(session.state, None);
    let person = &h.created()[0];
    assert_eq!(person.teacher_number_of_groups, 0);
    assert_eq!(person.teacher_class_frequency, 1);
    assert_eq!(h.bot.user_texts().last(), Some(&h.phrase("bye_wait_for_message_from_coordinator")));
}

#[tokio::test]
async fn young_teacher_is_told_to_expect_an_email() {
    let h = harness();
    let mut session = teacher_session(ConversationState::AskAge);

    h.press(&mut session, "teacher").await;
    h.press(&mut session, "no").await;
    assert_eq!(session.state, Some(ConversationState::AskYoungTeacherCommunicationLanguage));
    assert!(session.user_data.teacher_is_under_18);

    h.press(&mut session, "yes").await;
    assert_eq!(session.state, Some(ConversationState::AskYoungTeacherSpeakingClubLanguage));
    h.press(&mut session, "ua").await;
    assert_eq!(session.state, Some(ConversationState::AskYoungTeacherAdditionalHelp));
    h.press(&mut session, "en").await;
    assert_eq!(session.state, Some(ConversationState::AskFinalComment));
    assert!(h.bot.calls().contains(&Call::Delete { message_id: CALLBACK_MESSAGE }));
    assert_eq!(h.bot.user_texts().last(), Some(&h.phrase("ask_teacher_any_additional_help")));

    h.say(&mut session, "I draw comics").await;
    assert_eq!(session.state, Some(ConversationState::Bye));
    assert_eq!(
        h.bot.user_texts().last(),
        Some(&format!(
            "{} olena@example.com\n\n{}",
            h.phrase("young_teacher_we_will_email_you"),
            h.phrase("ask_final_comment")
        ))
    );

    h.say(&mut session, "").await;
    assert_eq!(session.state, None);
    let person = &h.created()[0];
    assert_eq!(person.language_and_level_ids, vec![52]);
    assert_eq!(person.communication_language_in_class.as_deref(), Some("ua"));
    assert!(person.teacher_can_host_speaking_club);
    assert_eq!(person.teacher_additional_skills_comment.as_deref(), Some("I draw comics"));
    assert!(h
        .bot
        .admin_texts()
        .iter()
        .any(|t| t.contains("Created young teacher Olena Shevchenko, ID 55 @coord")));
}

#[tokio::test]
async fn corrected_first_name_returns_to_the_review() {
    let h = harness();
    let mut session = student_session(ConversationState::ReviewMenuOrAskFinalComment);
    session.user_data.day_and_time_slot_ids = vec![10];
    session.user_data.language_and_level_ids = vec![51];
    session.user_data.communication_language_in_class = Some("ru".into());

    h.press(&mut session, "no").await;
    assert_eq!(session.state, Some(ConversationState::ReviewRequestedItem));
    assert_eq!(session.chat_data.mode, ConversationMode::Review);

    h.press(&mut session, "first_name").await;
    assert_eq!(session.state, Some(ConversationState::AskLastName));
    h.say(&mut session, "Oksana").await;

    assert_eq!(session.state, Some(ConversationState::ReviewMenuOrAskFinalComment));
    assert_eq!(session.user_data.first_name.as_deref(), Some("Oksana"));
    assert_eq!(session.user_data.last_name.as_deref(), Some("Shevchenko"));
    assert!(h.bot.calls().contains(&Call::Delete { message_id: 77 }));
    assert!(h.bot.user_texts().last().is_some_and(|t| t.contains("Oksana")));

    h.press(&mut session, "yes").await;
    assert_eq!(session.state, Some(ConversationState::Bye));
    assert_eq!(session.chat_data.mode, ConversationMode::Normal);
}

/// Written level A2, SmallTalk accepted, then registration to the end
async fn register_after_smalltalk(outcome: OralTestOutcome) -> (Harness, UserData) {
    let h = harness();
    *h.backend.level.lock().unwrap() = "A2".to_string();
    *h.oral_test.outcome.lock().unwrap() = outcome;
    let mut session = student_session(ConversationState::AskAssessmentQuestion);
    session.chat_data.assessment_age_range_id = Some(3);
    session.user_data.day_and_time_slot_ids = vec![10];

    h.press(&mut session, "100").await;
    assert_eq!(session.state, Some(ConversationState::SendSmalltalkUrlOrAskCommunicationLanguage));
    h.press(&mut session, "yes").await;
    assert_eq!(session.state, Some(ConversationState::AskCommunicationLanguageAfterSmalltalk));
    assert!(session.user_data.student_agreed_to_smalltalk);
    assert_eq!(session.user_data.student_smalltalk_test_id.as_deref(), Some("st-1"));

    h.press(&mut session, "done").await;
    assert_eq!(session.state, Some(ConversationState::AskStudentNonTeachingHelpOrStartReview));
    h.press(&mut session, "ru").await;
    h.press(&mut session, "done").await;
    h.press(&mut session, "yes").await;
    h.say(&mut session, "").await;
    assert_eq!(session.state, None);

    let person = h.created().remove(0);
    (h, person)
}

#[tokio::test]
async fn smalltalk_level_replaces_the_written_one() {
    let (h, person) = register_after_smalltalk(OralTestOutcome::Ready(OralTestResult {
        level: "B1".into(),
        report_url: Some("https://smalltalk.test/report/st-1".into()),
    }))
    .await;

    assert_eq!(person.language_and_level_ids, vec![53]);
    assert_eq!(
        person.student_smalltalk_interview_url.as_deref(),
        Some("https://smalltalk.test/report/st-1")
    );
    assert_eq!(person.comment, None);
    assert_eq!(h.bot.user_texts().last(), Some(&h.phrase("bye_wait_for_message_from_bot")));
}

#[tokio::test]
async fn smalltalk_without_a_level_keeps_the_written_one() {
    let (_h, person) =
        register_after_smalltalk(OralTestOutcome::Ready(OralTestResult { level: String::new(), report_url: None }))
            .await;

    assert_eq!(person.language_and_level_ids, vec![52]);
    assert_eq!(person.comment.as_deref(), Some("- SmallTalk could not determine the level"));
}

#[tokio::test]
async fn unfinished_smalltalk_keeps_the_written_level() {
    let (_h, person) = register_after_smalltalk(OralTestOutcome::NotFinished).await;

    assert_eq!(person.language_and_level_ids, vec![52]);
    assert_eq!(person.comment.as_deref(), Some("- Did not finish the SmallTalk test"));
}

#[tokio::test]
async fn late_smalltalk_results_are_reported_to_admins() {
    let (h, person) = register_after_smalltalk(OralTestOutcome::NotReadyInTime).await;

    assert_eq!(person.language_and_level_ids, vec![52]);
    assert_eq!(person.comment.as_deref(), Some("- SmallTalk results were not ready in time"));
    assert!(h.bot.admin_texts().iter().any(|t| t.contains("st-1 not ready in time")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dispatcher_handles_one_chats_updates_in_order() {
    let h = harness();
    let (sender, receiver) = mpsc::channel(16);
    let running = tokio::spawn(h.dispatcher.clone().run(receiver));

    sender.send(Inbound::Telegram(command("start"))).await.unwrap();
    sender.send(Inbound::Telegram(callback("en"))).await.unwrap();
    sender.send(Inbound::Telegram(callback("no"))).await.unwrap();
    drop(sender);
    running.await.unwrap();
    h.wait_until_idle().await;

    let stored = h.store.load_session(CHAT).await.unwrap().unwrap();
    assert_eq!(stored.state, Some(ConversationState::AskFirstName));
    assert_eq!(stored.user_data.locale, Some(Locale::En));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dispatcher_forgets_chats_once_they_are_idle() {
    let h = harness();
    let (sender, receiver) = mpsc::channel(16);
    let running = tokio::spawn(h.dispatcher.clone().run(receiver));

    for chat_id in [CHAT, 5001, 5002] {
        let mut start = command("start");
        start.chat_id = chat_id;
        sender.send(Inbound::Telegram(start)).await.unwrap();
    }
    drop(sender);
    running.await.unwrap();
    h.wait_until_idle().await;

    assert_eq!(h.dispatcher.active_chats().await, 0);
    for chat_id in [CHAT, 5001, 5002] {
        let stored = h.store.load_session(chat_id).await.unwrap().unwrap();
        assert_eq!(stored.state, Some(ConversationState::IsRegistered));
    }
}
