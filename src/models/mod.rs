// src/models/mod.rs

pub mod admin;
pub mod answer;
pub mod attempt;
pub mod exam_code;
pub mod participant;
pub mod question;
