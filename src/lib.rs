// Allow dead code for items that are part of the public API but only used in tests
#![allow(dead_code)]

pub mod config;
pub mod db;
pub mod fixture;
pub mod progress;
pub mod provider;
pub mod schema;
pub mod seeder;
pub mod synth;
pub mod verify;
