//! Final comment and creation of the person in the backend

use super::{Conversation, Flow, Turn};
use crate::application::errors::BotError;
use crate::domain::entities::constants::ENGLISH;
use crate::domain::traits::{OralTestOutcome, ReplyMarkup};

impl Conversation {
    pub(super) async fn finish(&self, turn: &mut Turn<'_>, text: &str) -> Result<Flow, BotError> {
        let comment = text.trim();
        if !comment.is_empty() {
            turn.session.user_data.append_comment(comment);
        }

        let goodbye = if turn.session.user_data.is_teacher() {
            if turn.session.user_data.teacher_number_of_groups == 0 {
                "bye_wait_for_message_from_coordinator"
            } else {
                "bye_wait_for_message_from_bot"
            }
        } else if turn.session.user_data.student_needs_oral_interview {
            self.set_english_level(turn, "A0")?;
            turn.session.user_data.append_comment("- NEEDS ORAL INTERVIEW!");
            "bye_go_to_chat_with_coordinator"
        } else {
            if turn.session.user_data.student_agreed_to_smalltalk {
                self.apply_smalltalk_result(turn).await?;
            }
            "bye_wait_for_message_from_bot"
        };

        let user = &turn.session.user_data;
        let kind = match (user.is_teacher(), user.teacher_is_under_18) {
            (true, true) => "young teacher",
            (true, false) => "teacher",
            (false, _) => "student",
        };

        match self.backend.create_person(user).await {
            Ok(created) => {
                let coordinator = match &self.speaking_club_coordinator {
                    Some(username) if user.is_teacher() && user.teacher_can_host_speaking_club => {
                        format!(" @{}", username)
                    }
                    _ => String::new(),
                };
                self.notifier
                    .info(
                        &format!(
                            "Created {} {}, ID {}{}",
                            kind,
                            user.full_name(),
                            created.personal_info_id,
                            coordinator
                        ),
                        Some(turn.update),
                        true,
                    )
                    .await;
                let reply = self.replies(turn).plain(goodbye).with_markup(ReplyMarkup::RemoveKeyboard);
                self.send(turn, reply).await?;
            }
            Err(e) => {
                self.notifier
                    .critical(&format!("Cannot create {} {}: {}", kind, user.full_name(), e), Some(turn.update))
                    .await;
                let reply = self.replies(turn).plain("registration_failed");
                self.send(turn, reply).await?;
            }
        }
        Ok(Flow::End)
    }

    /// Level from the oral test when it is ready, otherwise the written one
    async fn apply_smalltalk_result(&self, turn: &mut Turn<'_>) -> Result<(), BotError> {
        let written = turn
            .session
            .user_data
            .student_assessment_resulting_level
            .clone()
            .unwrap_or_else(|| "A0".to_string());

        let Some(test_id) = turn.session.user_data.student_smalltalk_test_id.clone() else {
            return self.set_english_level(turn, &written);
        };

        let level = match self.oral_test.get_result(&test_id).await {
            Ok(OralTestOutcome::Ready(result)) => {
                if result.report_url.is_some() {
                    turn.session.user_data.student_smalltalk_interview_url = result.report_url;
                }
                if result.level.is_empty() {
                    turn.session
                        .user_data
                        .append_comment("- SmallTalk could not determine the level");
                    written
                } else {
                    result.level
                }
            }
            Ok(OralTestOutcome::NotFinished) => {
                turn.session.user_data.append_comment("- Did not finish the SmallTalk test");
                written
            }
            Ok(OralTestOutcome::NotReadyInTime) => {
                turn.session.user_data.append_comment("- SmallTalk results were not ready in time");
                self.notifier
                    .error(&format!("SmallTalk results for test {} not ready in time", test_id), Some(turn.update), true)
                    .await;
                written
            }
            Err(e) => {
                self.notifier
                    .error(&format!("Could not get SmallTalk results: {}", e), Some(turn.update), true)
                    .await;
                written
            }
        };

        if self.data.language_and_level_id(ENGLISH, &level).is_none() {
            tracing::warn!("SmallTalk level {} is not offered for {}, using written level", level, ENGLISH);
            let written = turn
                .session
                .user_data
                .student_assessment_resulting_level
                .clone()
                .unwrap_or_else(|| "A0".to_string());
            return self.set_english_level(turn, &written);
        }
        self.set_english_level(turn, &level)
    }
}
