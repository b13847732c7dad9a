// src/controller/mod.rs

pub mod api;
pub mod countdown;
pub mod error;
pub mod machine;

pub use api::{AssessmentApi, HttpAssessmentApi, InProcessApi};
pub use error::ControllerError;
pub use machine::{Command, DriveOutcome, Phase, SessionController, TickOutcome};
