//! Data collected about the person being registered

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use super::constants::{STATUS_NEEDS_INTERVIEW, STATUS_NO_GROUP_YET};
use super::phrases::Locale;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
}

impl Role {
    pub fn parse(data: &str) -> Option<Self> {
        match data {
            "student" => Some(Role::Student),
            "teacher" => Some(Role::Teacher),
            _ => None,
        }
    }
}

/// Whether a teacher wants regular groups, the speaking club, or both
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeachingMode {
    Group,
    SpeakingClub,
    Both,
}

impl TeachingMode {
    pub const ALL: [TeachingMode; 3] = [TeachingMode::Group, TeachingMode::SpeakingClub, TeachingMode::Both];

    pub fn as_str(&self) -> &'static str {
        match self {
            TeachingMode::Group => "group",
            TeachingMode::SpeakingClub => "speaking_club",
            TeachingMode::Both => "both",
        }
    }

    pub fn parse(data: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == data)
    }
}

/// Kinds of help a teacher can offer to fellow teachers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeacherPeerHelp {
    pub can_check_syllabus: bool,
    pub can_give_feedback: bool,
    pub can_help_with_children_group: bool,
    pub can_provide_materials: bool,
    pub can_host_mentoring_sessions: bool,
    pub can_invite_to_class: bool,
    pub can_work_in_tandem: bool,
}

impl TeacherPeerHelp {
    fn flag_mut(&mut self, help_type: &str) -> Option<&mut bool> {
        Some(match help_type {
            "can_check_syllabus" => &mut self.can_check_syllabus,
            "can_give_feedback" => &mut self.can_give_feedback,
            "can_help_with_children_group" => &mut self.can_help_with_children_group,
            "can_provide_materials" => &mut self.can_provide_materials,
            "can_host_mentoring_sessions" => &mut self.can_host_mentoring_sessions,
            "can_invite_to_class" => &mut self.can_invite_to_class,
            "can_work_in_tandem" => &mut self.can_work_in_tandem,
            _ => return None,
        })
    }

    /// Set a flag by its name; returns false for unknown names
    pub fn set(&mut self, help_type: &str) -> bool {
        match self.flag_mut(help_type) {
            Some(flag) => {
                *flag = true;
                true
            }
            None => false,
        }
    }

    pub fn is_set(&self, help_type: &str) -> bool {
        match help_type {
            "can_check_syllabus" => self.can_check_syllabus,
            "can_give_feedback" => self.can_give_feedback,
            "can_help_with_children_group" => self.can_help_with_children_group,
            "can_provide_materials" => self.can_provide_materials,
            "can_host_mentoring_sessions" => self.can_host_mentoring_sessions,
            "can_invite_to_class" => self.can_invite_to_class,
            "can_work_in_tandem" => self.can_work_in_tandem,
            _ => false,
        }
    }
}

/// Everything the bot learns about the person it registers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserData {
    pub locale: Option<Locale>,
    pub chat_id: Option<i64>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub source: Option<String>,
    pub tg_username: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub utc_offset_hour: i32,
    pub utc_offset_minute: i32,
    pub day_and_time_slot_ids: Vec<i64>,
    pub levels_for_teaching_language: BTreeMap<String, Vec<String>>,
    pub language_and_level_ids: Vec<i64>,
    pub communication_language_in_class: Option<String>,
    pub non_teaching_help_types: Vec<String>,
    pub comment: Option<String>,

    // students
    pub student_age_range_id: Option<i64>,
    pub student_age_from: Option<u32>,
    pub student_age_to: Option<u32>,
    pub student_assessment_answers: Vec<(i64, i64)>,
    pub student_assessment_resulting_level: Option<String>,
    pub student_agreed_to_smalltalk: bool,
    pub student_smalltalk_test_id: Option<String>,
    pub student_smalltalk_interview_url: Option<String>,
    pub student_can_read_in_english: Option<bool>,
    pub student_needs_oral_interview: bool,

    // teachers
    pub teacher_is_under_18: bool,
    pub teacher_has_prior_experience: Option<bool>,
    pub teacher_number_of_groups: u32,
    pub teacher_class_frequency: u32,
    pub teacher_teaching_mode: Option<TeachingMode>,
    pub teacher_student_age_range_ids: Vec<i64>,
    pub teacher_can_host_speaking_club: bool,
    pub teacher_peer_help: TeacherPeerHelp,
    pub teacher_additional_skills_comment: Option<String>,
}

impl UserData {
    pub fn locale(&self) -> Locale {
        self.locale.unwrap_or_default()
    }

    pub fn is_student(&self) -> bool {
        self.role == Some(Role::Student)
    }

    pub fn is_teacher(&self) -> bool {
        self.role == Some(Role::Teacher)
    }

    pub fn full_name(&self) -> String {
        format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or_default(),
            self.last_name.as_deref().unwrap_or_default()
        )
        .trim()
        .to_string()
    }

    /// Append a line to the free-form comment
    pub fn append_comment(&mut self, line: &str) {
        self.comment = Some(match self.comment.take() {
            Some(existing) if !existing.is_empty() => format!("{}\n{}", existing, line),
            _ => line.to_string(),
        });
    }

    /// Offset as the backend expects it, e.g. `-05:00:00` or `05:30:00`
    pub fn utc_timedelta(&self) -> String {
        let minute = if self.utc_offset_hour < 0 {
            -self.utc_offset_minute
        } else {
            self.utc_offset_minute
        };
        let total_minutes = self.utc_offset_hour * 60 + minute;
        let sign = if total_minutes < 0 { "-" } else { "" };
        let total = total_minutes.abs();
        format!("{}{:02}:{:02}:00", sign, total / 60, total % 60)
    }

    pub fn personal_info_payload(&self) -> Value {
        json!({
            "first_name": self.first_name,
            "last_name": self.last_name,
            "telegram_username": self.tg_username.clone().unwrap_or_default(),
            "email": self.email,
            "phone": self.phone_number,
            "utc_timedelta": self.utc_timedelta(),
            "information_source": self.source,
            "registration_telegram_bot_chat_id": self.chat_id,
            "registration_telegram_bot_language": self.locale().as_str(),
        })
    }

    pub fn student_payload(&self, personal_info_id: i64) -> Value {
        let status = if self.student_needs_oral_interview {
            STATUS_NEEDS_INTERVIEW
        } else {
            STATUS_NO_GROUP_YET
        };
        json!({
            "personal_info": personal_info_id,
            "comment": self.comment.clone().unwrap_or_default(),
            "project_status": status,
            "situational_status": "",
            "status_since": chrono::Utc::now().to_rfc3339(),
            "age_range": self.student_age_range_id,
            "availability_slots": self.day_and_time_slot_ids,
            "communication_language_mode": self.communication_language_in_class,
            "teaching_languages_and_levels": self.language_and_level_ids,
            "children": [],
            "non_teaching_help_required": self.non_teaching_help_types,
            "smalltalk_test_result": self.student_smalltalk_interview_url,
        })
    }

    pub fn teacher_payload(&self, personal_info_id: i64) -> Value {
        let help = &self.teacher_peer_help;
        json!({
            "personal_info": personal_info_id,
            "comment": self.comment.clone().unwrap_or_default(),
            "project_status": STATUS_NO_GROUP_YET,
            "situational_status": "",
            "status_since": chrono::Utc::now().to_rfc3339(),
            "availability_slots": self.day_and_time_slot_ids,
            "communication_language_mode": self.communication_language_in_class,
            "teaching_languages_and_levels": self.language_and_level_ids,
            "has_prior_teaching_experience": self.teacher_has_prior_experience.unwrap_or(false),
            "non_teaching_help_provided": self.non_teaching_help_types,
            "peer_support_can_check_syllabus": help.can_check_syllabus,
            "peer_support_can_give_feedback": help.can_give_feedback,
            "peer_support_can_help_with_childrens_groups": help.can_help_with_children_group,
            "peer_support_can_provide_materials": help.can_provide_materials,
            "peer_support_can_host_mentoring_sessions": help.can_host_mentoring_sessions,
            "peer_support_can_invite_to_class": help.can_invite_to_class,
            "peer_support_can_work_in_tandem": help.can_work_in_tandem,
            "simultaneous_groups": self.teacher_number_of_groups,
            "weekly_frequency_per_group": self.teacher_class_frequency,
            "can_host_speaking_club": self.teacher_can_host_speaking_club,
            "student_age_ranges": self.teacher_student_age_range_ids,
            "additional_skills_comment": self.teacher_additional_skills_comment.clone().unwrap_or_default(),
        })
    }

    pub fn teacher_under_18_payload(&self, personal_info_id: i64) -> Value {
        json!({
            "personal_info": personal_info_id,
            "comment": self.comment.clone().unwrap_or_default(),
            "project_status": STATUS_NO_GROUP_YET,
            "situational_status": "",
            "status_since": chrono::Utc::now().to_rfc3339(),
            "can_host_speaking_club": self.teacher_can_host_speaking_club,
            "has_hosted_speaking_club": false,
            "is_validated": false,
            "non_teaching_help_provided_comment": self.teacher_additional_skills_comment.clone().unwrap_or_default(),
            "teaching_languages_and_levels": self.language_and_level_ids,
        })
    }

    pub fn enrollment_test_payload(&self, personal_info_id: i64) -> Value {
        let answers: Vec<i64> = self
            .student_assessment_answers
            .iter()
            .map(|(_, answer_id)| *answer_id)
            .collect();
        json!({
            "student": personal_info_id,
            "answers": answers,
        })
    }
}
