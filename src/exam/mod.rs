// src/exam/mod.rs

//! Shuffling, grading and scoring of exam attempts.
//!
//! Everything in here is pure computation over the question bank and values
//! already loaded from the store.

pub mod answer_key;
pub mod bank;
pub mod grader;
pub mod randomizer;
pub mod review;
pub mod scoring;
pub mod shuffle;
pub mod stats;
