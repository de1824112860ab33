//! Domain entities - Core business objects

pub mod catalog;
pub mod constants;
pub mod person;
pub mod phrases;
pub mod session;
pub mod update;

pub use catalog::{
    AgeRange, AgeRangeType, Assessment, AssessmentQuestion, AssessmentQuestionOption, BotData,
    DayAndTimeSlot, LanguageAndLevel,
};
pub use person::{Role, TeacherPeerHelp, TeachingMode, UserData};
pub use phrases::{Locale, MultilingualPhrase, Phrases};
pub use session::{ChatData, ConversationMode, ConversationState, Session};
pub use update::{Event, HelpdeskDirection, HelpdeskUpdate, IncomingUpdate, Sender};
