pub mod auth;
pub mod completions;
pub mod drives;
pub mod logs;
pub mod run;
pub mod tasks;
