//! Messages the bot sends during registration

use chrono::{DateTime, Duration, Utc};

use super::keyboard::{button, make_inline_keyboard};
use crate::domain::entities::constants::{
    callback, NON_TEACHING_HELP_TYPES, STUDENT_COMMUNICATION_LANGUAGE_CODES, TEACHER_PEER_HELP_TYPES,
    WEEKDAYS,
};
use crate::domain::entities::{AssessmentQuestion, BotData, Locale, Role, UserData};
use crate::domain::traits::{KeyboardButton, ParseMode, ReplyMarkup};

/// Offsets offered on the timezone keyboard, one inner slice per row
const TIMEZONE_ROWS: [&[(i32, i32)]; 7] = [
    &[(-8, 0), (-7, 0), (-6, 0)],
    &[(-5, 0), (-4, 0), (-3, 0)],
    &[(-1, 0), (0, 0), (1, 0)],
    &[(2, 0), (3, 0), (4, 0)],
    &[(5, 30), (7, 0)],
    &[(8, 0), (9, 0), (10, 0)],
    &[(11, 0), (12, 0), (13, 0)],
];

/// Items a user can correct while reviewing their data
pub const REVIEW_CATEGORIES: [&str; 9] = [
    "first_name",
    "last_name",
    "phone_number",
    "email",
    "timezone",
    "availability",
    "language_and_level",
    "class_communication_language",
    "student_age_group",
];

/// A message to send or to put in place of the message with the pressed button
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub markup: Option<ReplyMarkup>,
    pub parse_mode: Option<ParseMode>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), markup: None, parse_mode: None }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: Vec<Vec<KeyboardButton>>) -> Self {
        Self { text: text.into(), markup: Some(ReplyMarkup::Inline(keyboard)), parse_mode: None }
    }

    pub fn with_markup(mut self, markup: ReplyMarkup) -> Self {
        self.markup = Some(markup);
        self
    }

    pub fn html(mut self) -> Self {
        self.parse_mode = Some(ParseMode::Html);
        self
    }

    /// Callback data of every button, row by row
    pub fn callback_data(&self) -> Vec<String> {
        match &self.markup {
            Some(ReplyMarkup::Inline(rows)) => rows
                .iter()
                .flatten()
                .filter_map(|b| b.callback_data.clone())
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn format_offset(hour: i32, minute: i32) -> String {
    match (hour, minute) {
        (0, 0) => "UTC".to_string(),
        (h, 0) => format!("UTC{:+}", h),
        (h, m) => format!("UTC{:+}:{:02}", h, m),
    }
}

fn local_time(now: DateTime<Utc>, hour: i32, minute: i32) -> String {
    let minutes = hour * 60 + if hour < 0 { -minute } else { minute };
    (now + Duration::minutes(minutes as i64)).format("%H:%M").to_string()
}

/// Builds replies in the user's language
pub struct Replies<'a> {
    data: &'a BotData,
    locale: Locale,
}

impl<'a> Replies<'a> {
    pub fn new(data: &'a BotData, locale: Locale) -> Self {
        Self { data, locale }
    }

    pub fn phrase(&self, id: &str) -> String {
        self.data.phrases.get(id, self.locale).to_string()
    }

    pub fn plain(&self, id: &str) -> Reply {
        Reply::text(self.phrase(id))
    }

    fn yes_no(&self, text: impl Into<String>) -> Reply {
        Reply::with_keyboard(
            text,
            vec![vec![
                button(self.phrase("option_yes"), callback::YES),
                button(self.phrase("option_no"), callback::NO),
            ]],
        )
    }

    pub fn yes_no_phrase(&self, id: &str) -> Reply {
        self.yes_no(self.phrase(id))
    }

    /// Greeting in every locale, since the user has not picked one yet
    pub fn greeting(&self, first_name: &str) -> Reply {
        let phrases = &self.data.phrases;
        let text = Locale::ALL
            .iter()
            .map(|&locale| {
                format!(
                    "{} {}!\n{}",
                    phrases.get("hello", locale),
                    first_name,
                    phrases.get("choose_language_of_conversation", locale)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        let buttons = Locale::ALL
            .iter()
            .map(|&locale| button(phrases.get("locale_name", locale), locale.as_str()))
            .collect();
        Reply::with_keyboard(text, make_inline_keyboard(buttons, 3, None, None))
    }

    pub fn ask_timezone(&self, now: DateTime<Utc>) -> Reply {
        let keyboard = TIMEZONE_ROWS
            .iter()
            .map(|row| {
                row.iter()
                    .map(|&(hour, minute)| {
                        button(
                            format!("{} ({})", local_time(now, hour, minute), format_offset(hour, minute)),
                            format!("{}:{:02}", hour, minute),
                        )
                    })
                    .collect()
            })
            .collect();
        Reply::with_keyboard(self.phrase("ask_timezone"), keyboard)
    }

    pub fn ask_store_username(&self, username: &str) -> Reply {
        Reply::with_keyboard(
            format!("{} @{} {}", self.phrase("ask_username_1"), username, self.phrase("ask_username_2")),
            vec![vec![
                button(self.phrase("option_yes"), callback::STORE_USERNAME_YES),
                button(self.phrase("option_no"), callback::STORE_USERNAME_NO),
            ]],
        )
    }

    pub fn ask_phone(&self) -> Reply {
        self.plain("ask_phone")
            .with_markup(ReplyMarkup::RequestContact(self.phrase("share_phone")))
    }

    pub fn invalid_phone(&self, input: &str) -> Reply {
        Reply::text(format!("{} {}", input, self.phrase("invalid_phone_number")))
    }

    pub fn ask_email(&self) -> Reply {
        self.plain("ask_email").with_markup(ReplyMarkup::RemoveKeyboard)
    }

    pub fn ask_role(&self) -> Reply {
        Reply::with_keyboard(
            self.phrase("ask_role"),
            vec![vec![
                button(self.phrase("option_student"), "student"),
                button(self.phrase("option_teacher"), "teacher"),
            ]],
        )
    }

    pub fn ask_student_age(&self) -> Reply {
        let buttons = self
            .data
            .student_age_ranges
            .iter()
            .map(|r| button(r.label(), r.id.to_string()))
            .collect();
        Reply::with_keyboard(
            format!("{}\n\n{}", self.phrase("student_ukraine_disclaimer"), self.phrase("ask_age")),
            make_inline_keyboard(buttons, 3, None, None),
        )
    }

    pub fn ask_young_teacher_readiness(&self) -> Reply {
        Reply::with_keyboard(
            self.phrase("ask_if_over_16_and_ready_to_host_speaking_club"),
            vec![
                vec![button(self.phrase("option_under_16"), callback::NO)],
                vec![button(self.phrase("option_over_16_not_ready"), callback::NO)],
                vec![button(self.phrase("option_over_16_ready"), callback::YES)],
            ],
        )
    }

    pub fn ask_time_slots(&self, user: &UserData, day_index: usize) -> Reply {
        let buttons = self
            .data
            .slots_for_day(day_index)
            .iter()
            .filter(|slot| !user.day_and_time_slot_ids.contains(&slot.id))
            .map(|slot| {
                let (from, to) = slot.local_hours(user.utc_offset_hour);
                let minute = user.utc_offset_minute;
                button(format!("{}:{:02}-{}:{:02}", from, minute, to, minute), slot.id.to_string())
            })
            .collect();
        Reply::with_keyboard(
            format!(
                "{} <b>{}</b>?",
                self.phrase("ask_timeslots"),
                self.phrase(&format!("ask_slots_{}", day_index))
            ),
            make_inline_keyboard(
                buttons,
                3,
                None,
                Some(button(self.phrase("option_next"), callback::NEXT)),
            ),
        )
        .html()
    }

    pub fn ask_teaching_languages(&self, user: &UserData, show_done: bool) -> Reply {
        let buttons = self
            .data
            .sorted_language_ids
            .iter()
            .filter(|lang| !user.levels_for_teaching_language.contains_key(*lang))
            .map(|lang| button(self.phrase(&format!("language_{}", lang)), lang.clone()))
            .collect();
        let done = show_done.then(|| button(self.phrase("option_done"), callback::DONE));
        let question = if user.is_student() { "ask_student_language" } else { "ask_teacher_language" };
        Reply::with_keyboard(self.phrase(question), make_inline_keyboard(buttons, 2, done, None))
    }

    /// Levels of the language picked last, minus those already chosen
    pub fn ask_levels(&self, user: &UserData, language: &str, show_done: bool) -> Reply {
        let chosen = user.levels_for_teaching_language.get(language);
        let buttons = self
            .data
            .levels_for_language(language)
            .into_iter()
            .filter(|level| chosen.map_or(true, |levels| !levels.contains(level)))
            .map(|level| button(level.clone(), level))
            .collect();
        let done = show_done.then(|| button(self.phrase("option_done"), callback::DONE));
        let question = if user.is_student() { "ask_student_level" } else { "ask_teacher_level" };
        Reply::with_keyboard(
            format!("{} ({})", self.phrase(question), self.phrase(&format!("language_{}", language))),
            make_inline_keyboard(buttons, 3, done, None),
        )
    }

    pub fn ask_how_long_learning(&self) -> Reply {
        Reply::with_keyboard(
            self.phrase("ask_student_how_long_learning"),
            vec![vec![
                button(self.phrase("option_less_than_year"), callback::LESS_THAN_YEAR),
                button(self.phrase("option_year_or_more"), callback::YEAR_OR_MORE),
            ]],
        )
    }

    pub fn ask_start_assessment(&self) -> Reply {
        Reply::with_keyboard(
            self.phrase("ask_student_start_assessment"),
            vec![vec![button(self.phrase("assessment_option_start"), callback::OK)]],
        )
    }

    pub fn ask_assessment_question(
        &self,
        question: &AssessmentQuestion,
        index: usize,
        total: usize,
        show_abort: bool,
    ) -> Reply {
        let buttons = question
            .options
            .iter()
            .map(|o| button(o.text.clone(), o.id.to_string()))
            .collect();
        let abort = show_abort.then(|| button(self.phrase("assessment_option_abort"), callback::ABORT));
        Reply::with_keyboard(
            format!("Question {} out of {}\n\n{}", index + 1, total, question.text),
            make_inline_keyboard(buttons, 2, None, abort),
        )
    }

    pub fn smalltalk_link(&self, url: &str) -> Reply {
        Reply::with_keyboard(
            format!("{}\n\n{}", self.phrase("send_smalltalk_url"), url),
            vec![vec![button(self.phrase("option_done"), callback::DONE)]],
        )
    }

    pub fn ask_communication_language(&self, role: Option<Role>) -> Reply {
        let buttons = STUDENT_COMMUNICATION_LANGUAGE_CODES
            .iter()
            .filter(|code| role == Some(Role::Teacher) || **code != "l2_only")
            .map(|code| {
                button(self.phrase(&format!("class_communication_language_option_{}", code)), *code)
            })
            .collect();
        Reply::with_keyboard(
            self.phrase("ask_class_communication_language"),
            make_inline_keyboard(buttons, 1, None, None),
        )
    }

    pub fn ask_non_teaching_help(&self, user: &UserData) -> Reply {
        let buttons = NON_TEACHING_HELP_TYPES
            .iter()
            .filter(|t| !user.non_teaching_help_types.iter().any(|chosen| chosen == *t))
            .map(|t| button(self.phrase(&format!("option_non_teaching_help_{}", t)), *t))
            .collect();
        let question = if user.is_teacher() {
            "ask_non_teaching_help_teacher"
        } else {
            "ask_non_teaching_help_student"
        };
        Reply::with_keyboard(
            self.phrase(question),
            make_inline_keyboard(
                buttons,
                1,
                None,
                Some(button(self.phrase("option_done"), callback::DONE)),
            ),
        )
    }

    pub fn ask_teaching_mode(&self) -> Reply {
        Reply::with_keyboard(
            self.phrase("ask_teacher_group_or_speaking_club"),
            vec![
                vec![button(self.phrase("option_teach_group"), "group")],
                vec![button(self.phrase("option_teach_speaking_club"), "speaking_club")],
                vec![button(self.phrase("option_teach_both"), "both")],
            ],
        )
    }

    pub fn ask_number_of_groups(&self) -> Reply {
        Reply::with_keyboard(
            self.phrase("ask_teacher_number_of_groups"),
            vec![vec![button("1", "1"), button("2", "2")]],
        )
    }

    pub fn ask_teacher_student_age_groups(&self, user: &UserData) -> Reply {
        let buttons = self
            .data
            .teacher_age_ranges
            .iter()
            .filter(|r| !user.teacher_student_age_range_ids.contains(&r.id))
            .map(|r| {
                let label = match &r.bot_phrase_id {
                    Some(id) => self.phrase(id),
                    None => r.label(),
                };
                button(label, r.id.to_string())
            })
            .collect();
        let done = (!user.teacher_student_age_range_ids.is_empty())
            .then(|| button(self.phrase("option_done"), callback::DONE));
        Reply::with_keyboard(
            self.phrase("ask_teacher_student_age_groups"),
            make_inline_keyboard(buttons, 1, None, done),
        )
    }

    pub fn ask_peer_help(&self, user: &UserData) -> Reply {
        let buttons = TEACHER_PEER_HELP_TYPES
            .iter()
            .filter(|t| !user.teacher_peer_help.is_set(t))
            .map(|t| button(self.phrase(&format!("option_peer_help_{}", t)), *t))
            .collect();
        Reply::with_keyboard(
            self.phrase("ask_teacher_peer_help"),
            make_inline_keyboard(
                buttons,
                1,
                None,
                Some(button(self.phrase("option_done"), callback::DONE)),
            ),
        )
    }

    /// Summary of everything collected, with buttons to confirm or correct it
    pub fn review(&self, user: &UserData, now: DateTime<Utc>) -> Reply {
        let mut text = format!(
            "{}\n\n{}: {}\n{}: {}\n{}: {}\n",
            self.phrase("ask_review"),
            self.phrase("review_first_name"),
            user.first_name.as_deref().unwrap_or_default(),
            self.phrase("review_last_name"),
            user.last_name.as_deref().unwrap_or_default(),
            self.phrase("review_email"),
            user.email.as_deref().unwrap_or_default(),
        );

        if user.is_student() {
            if let (Some(from), Some(to)) = (user.student_age_from, user.student_age_to) {
                text.push_str(&format!("{}: {}-{}\n", self.phrase("review_student_age_group"), from, to));
            }
        }

        match (&user.tg_username, &user.phone_number) {
            (Some(username), _) => {
                text.push_str(&format!("{}: @{}\n", self.phrase("review_username"), username))
            }
            (None, Some(phone)) => {
                text.push_str(&format!("{}: {}\n", self.phrase("review_phone_number"), phone))
            }
            (None, None) => {}
        }

        text.push_str(&format!(
            "{}: {} ({} {})\n",
            self.phrase("review_timezone"),
            format_offset(user.utc_offset_hour, user.utc_offset_minute),
            self.phrase("current_time"),
            local_time(now, user.utc_offset_hour, user.utc_offset_minute),
        ));

        text.push_str(&format!("\n{}:\n", self.phrase("review_availability")));
        for day_index in 0..WEEKDAYS.len() {
            let slots: Vec<String> = user
                .day_and_time_slot_ids
                .iter()
                .filter_map(|id| self.data.day_and_time_slot_for_slot_id.get(id))
                .filter(|slot| slot.day_of_week_index == day_index)
                .map(|slot| {
                    let (from, to) = slot.local_hours(user.utc_offset_hour);
                    let minute = user.utc_offset_minute;
                    format!("{}:{:02}-{}:{:02}", from, minute, to, minute)
                })
                .collect();
            if !slots.is_empty() {
                text.push_str(&format!(
                    "{}: {}\n",
                    self.phrase(&format!("ask_slots_{}", day_index)),
                    slots.join("; ")
                ));
            }
        }

        if user.is_teacher() && !user.levels_for_teaching_language.is_empty() {
            text.push_str(&format!("\n{}:\n", self.phrase("review_languages_levels")));
            for (language, levels) in &user.levels_for_teaching_language {
                let mut levels = levels.clone();
                levels.sort();
                text.push_str(&format!(
                    "{}: {}\n",
                    self.phrase(&format!("language_{}", language)),
                    levels.join(", ")
                ));
            }
        }

        if let Some(code) = &user.communication_language_in_class {
            text.push_str(&format!(
                "\n{}: {}\n",
                self.phrase("review_communication_language"),
                self.phrase(&format!("class_communication_language_option_{}", code)),
            ));
        }

        Reply::with_keyboard(
            text,
            vec![
                vec![button(self.phrase("review_reaction_yes"), callback::YES)],
                vec![button(self.phrase("review_reaction_no"), callback::NO)],
            ],
        )
    }

    pub fn ask_review_category(&self, user: &UserData) -> Reply {
        let buttons = REVIEW_CATEGORIES
            .iter()
            .filter(|category| match **category {
                "phone_number" => user.phone_number.is_some(),
                "student_age_group" => user.is_student(),
                "language_and_level" => user.is_teacher(),
                _ => true,
            })
            .map(|category| button(self.phrase(&format!("review_option_{}", category)), *category))
            .collect();
        Reply::with_keyboard(
            self.phrase("ask_review_category"),
            make_inline_keyboard(buttons, 1, None, None),
        )
    }
}
