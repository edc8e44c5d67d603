use validator::ValidateEmail;

pub const MAX_FEEDBACK_MESSAGE_LEN: usize = 5_000;
pub const MAX_PROMPT_LEN: usize = 20_000;

/// Validates that the input looks like a valid email address
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    !email.is_empty() && email.validate_email()
}

/// Feedback ratings are a 1-5 star scale.
pub fn is_valid_rating(rating: i32) -> bool {
    (1..=5).contains(&rating)
}

/// Feedback messages must be non-empty after trimming and bounded.
pub fn is_valid_feedback_message(message: &str) -> bool {
    let trimmed = message.trim();
    !trimmed.is_empty() && trimmed.len() <= MAX_FEEDBACK_MESSAGE_LEN
}

/// Prompts must be non-empty after trimming and bounded.
pub fn is_valid_prompt(prompt: &str) -> bool {
    let trimmed = prompt.trim();
    !trimmed.is_empty() && trimmed.len() <= MAX_PROMPT_LEN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_emails() {
        assert!(is_valid_email("test@example.com"));
        assert!(is_valid_email("user.name@domain.co.uk"));
        assert!(is_valid_email("user+tag@example.org"));
    }

    #[test]
    fn test_invalid_emails() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("   "));
        assert!(!is_valid_email("notanemail"));
        assert!(!is_valid_email("@nodomain.com"));
        assert!(!is_valid_email("spaces in@email.com"));
    }

    #[test]
    fn test_valid_ratings() {
        for rating in 1..=5 {
            assert!(is_valid_rating(rating));
        }
    }

    #[test]
    fn test_invalid_ratings() {
        assert!(!is_valid_rating(0));
        assert!(!is_valid_rating(6));
        assert!(!is_valid_rating(-1));
        assert!(!is_valid_rating(100));
    }

    #[test]
    fn test_feedback_message_bounds() {
        assert!(is_valid_feedback_message("Great tool!"));
        assert!(!is_valid_feedback_message(""));
        assert!(!is_valid_feedback_message("   \n\t"));
        assert!(is_valid_feedback_message(&"a".repeat(MAX_FEEDBACK_MESSAGE_LEN)));
        assert!(!is_valid_feedback_message(&"a".repeat(
            MAX_FEEDBACK_MESSAGE_LEN + 1
        )));
    }

    #[test]
    fn test_prompt_bounds() {
        assert!(is_valid_prompt("improve this function"));
        assert!(!is_valid_prompt(""));
        assert!(!is_valid_prompt("  "));
        assert!(!is_valid_prompt(&"x".repeat(MAX_PROMPT_LEN + 1)));
    }
}
