pub mod extraction;
pub mod transcript;
pub mod matching;
pub mod eligibility;
pub mod fees;
pub mod processor;
