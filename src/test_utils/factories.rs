//! Test data factories for creating valid test fixtures.
//!
//! Each factory function creates a complete, valid object with sensible
//! defaults. Use the closure parameter to override specific fields as needed.

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::{
    application::ports::identity_provider::AuthContext,
    application::use_cases::{billing::PurchaseProfile, feedback::FeedbackProfile},
    domain::entities::{feedback::FeedbackCategory, purchase::PurchaseStatus},
};

fn test_datetime() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

/// Create a test identity context with sensible defaults.
pub fn create_test_auth_context(
    user_id: &str,
    overrides: impl FnOnce(&mut AuthContext),
) -> AuthContext {
    let mut ctx = AuthContext {
        user_id: user_id.to_string(),
        org_id: Some(format!("org_{}", Uuid::new_v4().simple())),
        plan_name: None,
    };
    overrides(&mut ctx);
    ctx
}

/// Create a test purchase with sensible defaults.
pub fn create_test_purchase(
    user_id: &str,
    overrides: impl FnOnce(&mut PurchaseProfile),
) -> PurchaseProfile {
    let mut purchase = PurchaseProfile {
        id: Uuid::new_v4(),
        user_id: user_id.to_string(),
        product_id: "pack_starter".to_string(),
        price_id: Some("price_starter".to_string()),
        payment_intent_id: format!("pi_{}", Uuid::new_v4().simple()),
        session_id: format!("cs_{}", Uuid::new_v4().simple()),
        customer_id: Some(format!("cus_{}", Uuid::new_v4().simple())),
        credits: 1000,
        status: PurchaseStatus::Complete,
        created_at: Some(test_datetime()),
        updated_at: Some(test_datetime()),
    };
    overrides(&mut purchase);
    purchase
}

/// Create test feedback with sensible defaults.
pub fn create_test_feedback(
    user_id: &str,
    overrides: impl FnOnce(&mut FeedbackProfile),
) -> FeedbackProfile {
    let mut feedback = FeedbackProfile {
        id: Uuid::new_v4(),
        user_id: user_id.to_string(),
        rating: 5,
        category: FeedbackCategory::General,
        message: "Works great".to_string(),
        name: None,
        email: None,
        allow_public: false,
        created_at: Some(test_datetime()),
    };
    overrides(&mut feedback);
    feedback
}
