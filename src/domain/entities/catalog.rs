//! Reference data the bot loads from the backend at start-up

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::constants::{ENGLISH, WEEKDAYS};
use super::phrases::Phrases;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgeRangeType {
    Matching,
    Student,
    Teacher,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgeRange {
    pub id: i64,
    pub age_from: u32,
    pub age_to: u32,
    #[serde(rename = "type")]
    pub range_type: AgeRangeType,
    /// Phrase used as the button label for teacher age ranges
    #[serde(default)]
    pub bot_phrase_id: Option<String>,
}

impl AgeRange {
    /// Teacher ranges are labelled by phrase, keyed by where the range starts
    pub fn teacher_phrase_id(age_from: u32) -> Option<String> {
        let name = match age_from {
            5 => "young_children",
            9 => "older_children",
            13 => "adolescents",
            18 => "adults",
            66 => "seniors",
            _ => return None,
        };
        Some(format!("option_{}", name))
    }

    pub fn label(&self) -> String {
        format!("{}-{}", self.age_from, self.age_to)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentQuestionOption {
    pub id: i64,
    pub text: String,
}

impl AssessmentQuestionOption {
    pub fn means_user_does_not_know_the_answer(&self) -> bool {
        self.text.to_lowercase().contains("i don't know")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentQuestion {
    pub id: i64,
    pub text: String,
    pub options: Vec<AssessmentQuestionOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub id: i64,
    pub age_range_ids: Vec<i64>,
    pub questions: Vec<AssessmentQuestion>,
}

impl Assessment {
    pub fn dont_know_option_ids(&self) -> Vec<i64> {
        self.questions
            .iter()
            .flat_map(|q| q.options.iter())
            .filter(|o| o.means_user_does_not_know_the_answer())
            .map(|o| o.id)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayAndTimeSlot {
    pub id: i64,
    pub day_of_week_index: usize,
    pub from_utc_hour: u32,
    pub to_utc_hour: u32,
}

impl DayAndTimeSlot {
    /// Local hours of the slot for a user with the given UTC offset
    pub fn local_hours(&self, offset_hour: i32) -> (u32, u32) {
        let shift = |h: u32| (h as i32 + offset_hour).rem_euclid(24) as u32;
        (shift(self.from_utc_hour), shift(self.to_utc_hour))
    }
}

impl std::fmt::Display for DayAndTimeSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let day = WEEKDAYS.get(self.day_of_week_index).copied().unwrap_or("?");
        write!(f, "{} {}-{} UTC", day, self.from_utc_hour, self.to_utc_hour)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageAndLevel {
    pub id: i64,
    pub language_id: String,
    pub level: String,
}

/// Reference data plus the lookup tables built from it
#[derive(Debug, Clone, Default)]
pub struct BotData {
    pub phrases: Phrases,
    pub student_age_ranges: Vec<AgeRange>,
    pub teacher_age_ranges: Vec<AgeRange>,
    pub assessment_for_age_range_id: HashMap<i64, Assessment>,
    pub day_and_time_slot_for_slot_id: HashMap<i64, DayAndTimeSlot>,
    pub day_and_time_slots_for_day_index: BTreeMap<usize, Vec<DayAndTimeSlot>>,
    /// Language ids with English first, the rest alphabetically
    pub sorted_language_ids: Vec<String>,
    pub language_and_level_for_id: HashMap<i64, LanguageAndLevel>,
    pub language_and_levels_for_language_id: HashMap<String, Vec<LanguageAndLevel>>,
    pub language_and_level_id_for_language_id_and_level: HashMap<(String, String), i64>,
    pub student_age_range_for_id: HashMap<i64, AgeRange>,
}

impl BotData {
    pub fn new(
        phrases: Phrases,
        age_ranges: Vec<AgeRange>,
        assessments: Vec<Assessment>,
        day_and_time_slots: Vec<DayAndTimeSlot>,
        languages_and_levels: Vec<LanguageAndLevel>,
    ) -> Self {
        let student_age_ranges: Vec<AgeRange> = age_ranges
            .iter()
            .filter(|r| r.range_type == AgeRangeType::Student)
            .cloned()
            .collect();
        let teacher_age_ranges: Vec<AgeRange> = age_ranges
            .into_iter()
            .filter(|r| r.range_type == AgeRangeType::Teacher)
            .collect();

        let mut assessment_for_age_range_id = HashMap::new();
        for assessment in assessments {
            for age_range_id in &assessment.age_range_ids {
                assessment_for_age_range_id.insert(*age_range_id, assessment.clone());
            }
        }

        let mut day_and_time_slots_for_day_index: BTreeMap<usize, Vec<DayAndTimeSlot>> =
            (0..WEEKDAYS.len()).map(|day| (day, Vec::new())).collect();
        for slot in &day_and_time_slots {
            day_and_time_slots_for_day_index
                .entry(slot.day_of_week_index)
                .or_default()
                .push(slot.clone());
        }
        for slots in day_and_time_slots_for_day_index.values_mut() {
            slots.sort_by_key(|s| (s.from_utc_hour, s.id));
        }

        let mut language_and_levels_for_language_id: HashMap<String, Vec<LanguageAndLevel>> =
            HashMap::new();
        for item in &languages_and_levels {
            language_and_levels_for_language_id
                .entry(item.language_id.clone())
                .or_default()
                .push(item.clone());
        }

        let mut sorted_language_ids: Vec<String> =
            language_and_levels_for_language_id.keys().cloned().collect();
        sorted_language_ids.sort_by(|a, b| (a != ENGLISH, a).cmp(&(b != ENGLISH, b)));

        Self {
            phrases,
            student_age_range_for_id: student_age_ranges
                .iter()
                .map(|r| (r.id, r.clone()))
                .collect(),
            student_age_ranges,
            teacher_age_ranges,
            assessment_for_age_range_id,
            day_and_time_slot_for_slot_id: day_and_time_slots
                .into_iter()
                .map(|s| (s.id, s))
                .collect(),
            day_and_time_slots_for_day_index,
            sorted_language_ids,
            language_and_level_id_for_language_id_and_level: languages_and_levels
                .iter()
                .map(|l| ((l.language_id.clone(), l.level.clone()), l.id))
                .collect(),
            language_and_level_for_id: languages_and_levels
                .into_iter()
                .map(|l| (l.id, l))
                .collect(),
            language_and_levels_for_language_id,
        }
    }

    pub fn slots_for_day(&self, day_index: usize) -> &[DayAndTimeSlot] {
        self.day_and_time_slots_for_day_index
            .get(&day_index)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn language_and_level_id(&self, language: &str, level: &str) -> Option<i64> {
        self.language_and_level_id_for_language_id_and_level
            .get(&(language.to_string(), level.to_string()))
            .copied()
    }

    pub fn levels_for_language(&self, language: &str) -> Vec<String> {
        self.language_and_levels_for_language_id
            .get(language)
            .map(|items| items.iter().map(|l| l.level.clone()).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(id: i64, day: usize, from: u32, to: u32) -> DayAndTimeSlot {
        DayAndTimeSlot { id, day_of_week_index: day, from_utc_hour: from, to_utc_hour: to }
    }

    fn lang(id: i64, language: &str, level: &str) -> LanguageAndLevel {
        LanguageAndLevel { id, language_id: language.into(), level: level.into() }
    }

    #[test]
    fn english_goes_first() {
        let data = BotData::new(
            Phrases::default(),
            vec![],
            vec![],
            vec![],
            vec![lang(1, "de", "A1"), lang(2, "en", "A1"), lang(3, "es", "A1"), lang(4, "cz", "A1")],
        );
        assert_eq!(data.sorted_language_ids, vec!["en", "cz", "de", "es"]);
        assert_eq!(data.language_and_level_id("es", "A1"), Some(3));
        assert_eq!(data.language_and_level_id("es", "B1"), None);
    }

    #[test]
    fn slots_are_grouped_by_day() {
        let data = BotData::new(
            Phrases::default(),
            vec![],
            vec![],
            vec![slot(1, 0, 8, 11), slot(2, 0, 5, 8), slot(3, 6, 17, 21)],
            vec![],
        );
        let monday: Vec<i64> = data.slots_for_day(0).iter().map(|s| s.id).collect();
        assert_eq!(monday, vec![2, 1]);
        assert!(data.slots_for_day(3).is_empty());
        assert_eq!(data.slots_for_day(6)[0].to_string(), "Sunday 17-21 UTC");
    }

    #[test]
    fn local_hours_wrap_around_midnight() {
        let s = slot(1, 0, 22, 2);
        assert_eq!(s.local_hours(3), (1, 5));
        assert_eq!(s.local_hours(-8), (14, 18));
    }

    #[test]
    fn dont_know_options_are_detected() {
        let assessment = Assessment {
            id: 1,
            age_range_ids: vec![3],
            questions: vec![AssessmentQuestion {
                id: 10,
                text: "I ___ a student".into(),
                options: vec![
                    AssessmentQuestionOption { id: 100, text: "am".into() },
                    AssessmentQuestionOption { id: 101, text: "I don't know".into() },
                ],
            }],
        };
        assert_eq!(assessment.dont_know_option_ids(), vec![101]);
    }

    #[test]
    fn teacher_phrase_ids() {
        assert_eq!(AgeRange::teacher_phrase_id(13).as_deref(), Some("option_adolescents"));
        assert_eq!(AgeRange::teacher_phrase_id(40), None);
    }
}
