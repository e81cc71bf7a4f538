pub mod calibration;
pub mod config;
pub mod elo;
pub mod error;
pub mod fixtures;
pub mod goal_model;
pub mod logging;
pub mod markets;
pub mod pipeline;
pub mod prediction;
pub mod ratings;
pub mod scoreline;
pub mod strengths;
pub mod team_names;
pub mod tips;
