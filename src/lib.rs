//! Exam preparation chat bot: the quiz session engine and its Telegram wiring.

pub mod config;
pub mod quiz;
pub mod storage;
pub mod telegram;
