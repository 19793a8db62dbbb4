//! Wayfare wizard: multi-step form wizards with draft autosave and
//! dependency-ordered submission to a hosted table backend.

pub mod auth;
pub mod config;
pub mod error;
pub mod form;
pub mod store;
pub mod submission;
pub mod wizard;
pub mod workflows;
