// src/service/mod.rs

pub mod assessment;
pub mod scoring;

pub use assessment::AssessmentService;
