//! Loads reference data at start-up

use crate::application::errors::ApiError;
use crate::domain::entities::constants::ENGLISH;
use crate::domain::entities::{AgeRange, AgeRangeType, BotData, Phrases};
use crate::domain::traits::ReferenceDataSource;

pub struct BotDataLoader;

impl BotDataLoader {
    pub async fn load(source: &dyn ReferenceDataSource, phrases: Phrases) -> Result<BotData, ApiError> {
        tracing::info!("Loading reference data from the backend");

        let age_ranges: Vec<AgeRange> = source
            .get_age_ranges()
            .await?
            .into_iter()
            .filter(|r| r.range_type != AgeRangeType::Matching)
            .map(|mut r| {
                if r.range_type == AgeRangeType::Teacher {
                    r.bot_phrase_id = AgeRange::teacher_phrase_id(r.age_from);
                }
                r
            })
            .collect();
        tracing::debug!("Loaded {} age ranges", age_ranges.len());

        let assessments = source.get_assessments(ENGLISH).await?;
        tracing::debug!("Loaded {} assessments", assessments.len());

        let slots = source.get_day_and_time_slots().await?;
        tracing::debug!("Loaded {} day and time slots", slots.len());

        let languages_and_levels = source.get_languages_and_levels().await?;
        tracing::debug!("Loaded {} languages and levels", languages_and_levels.len());

        Ok(BotData::new(phrases, age_ranges, assessments, slots, languages_and_levels))
    }
}
