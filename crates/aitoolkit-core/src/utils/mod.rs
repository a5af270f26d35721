//! Utility helpers shared by front ends.

pub mod password;

pub use password::{password_issues, PasswordRule, SPECIAL_CHARACTERS};
