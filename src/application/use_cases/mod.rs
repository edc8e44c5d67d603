pub mod analysis;
pub mod billing;
pub mod credits;
pub mod entitlement;
pub mod feedback;
