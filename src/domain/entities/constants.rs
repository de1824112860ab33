//! Fixed vocabularies shared by the conversation and the backend payloads

use once_cell::sync::Lazy;
use regex_lite::Regex;

/// All language levels known to the school, lowest first
pub const ALL_LEVELS: [&str; 7] = ["A0", "A1", "A2", "B1", "B2", "C1", "C2"];

pub const LOW_LEVELS: [&str; 2] = ["A0", "A1"];
pub const LEVELS_ELIGIBLE_FOR_ORAL_TEST: [&str; 2] = ["A2", "B1"];
/// Students at these levels can only join the speaking club
pub const LEVELS_TOO_HIGH: [&str; 3] = ["B2", "C1", "C2"];

pub const ENGLISH: &str = "en";

pub const NON_TEACHING_HELP_TYPES: [&str; 10] = [
    "cv_write_edit",
    "cv_proofread",
    "mock_interview",
    "job_search",
    "career_strategy",
    "linkedin",
    "career_switch",
    "portfolio",
    "uni_abroad",
    "translate_docs",
];

pub const STUDENT_COMMUNICATION_LANGUAGE_CODES: [&str; 4] = ["ru", "ua", "ru_ua", "l2_only"];

pub const TEACHER_PEER_HELP_TYPES: [&str; 7] = [
    "can_check_syllabus",
    "can_give_feedback",
    "can_help_with_children_group",
    "can_provide_materials",
    "can_host_mentoring_sessions",
    "can_invite_to_class",
    "can_work_in_tandem",
];

pub const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

pub const STATUS_NO_GROUP_YET: &str = "no_group_yet";
pub const STATUS_NEEDS_INTERVIEW: &str = "needs_interview_to_determine_level";

/// Consecutive "don't know" answers that unlock the abort button
pub const DONT_KNOWS_BEFORE_ABORT: u32 = 5;

/// Callback data values used by the inline keyboards
pub mod callback {
    pub const ABORT: &str = "abort";
    pub const DONE: &str = "done";
    pub const NEXT: &str = "next";
    pub const NO: &str = "no";
    pub const OK: &str = "ok";
    pub const YES: &str = "yes";
    pub const STORE_USERNAME_YES: &str = "store_username_yes";
    pub const STORE_USERNAME_NO: &str = "store_username_no";
    pub const LESS_THAN_YEAR: &str = "less_than_year";
    pub const YEAR_OR_MORE: &str = "year_or_more";
}

pub static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([\w\-.]+)@([\w\-.]+)\.([a-zA-Z]{2,5})$").expect("valid email pattern")
});

pub static DIGIT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+$").expect("valid digit pattern"));

pub fn is_known_level(level: &str) -> bool {
    ALL_LEVELS.contains(&level)
}
