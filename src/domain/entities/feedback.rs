use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Category of a user feedback submission.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, sqlx::Type,
)]
#[sqlx(type_name = "feedback_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FeedbackCategory {
    Bug,
    Feature,
    General,
    Praise,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn parses_known_categories() {
        assert_eq!(
            FeedbackCategory::from_str("bug").unwrap(),
            FeedbackCategory::Bug
        );
        assert_eq!(
            FeedbackCategory::from_str("feature").unwrap(),
            FeedbackCategory::Feature
        );
        assert_eq!(
            FeedbackCategory::from_str("general").unwrap(),
            FeedbackCategory::General
        );
        assert_eq!(
            FeedbackCategory::from_str("praise").unwrap(),
            FeedbackCategory::Praise
        );
    }

    #[test]
    fn rejects_unknown_category() {
        assert!(FeedbackCategory::from_str("rant").is_err());
        assert!(FeedbackCategory::from_str("").is_err());
    }

    #[test]
    fn displays_snake_case() {
        assert_eq!(FeedbackCategory::Bug.to_string(), "bug");
    }
}
