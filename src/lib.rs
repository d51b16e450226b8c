//! Consentgate: consent banner state machine harness

pub mod simulate;
