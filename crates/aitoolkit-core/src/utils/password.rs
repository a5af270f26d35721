//! Password strength guidance shown on the registration and reset forms.
//!
//! These checks only help the user pick a password; the backend does not
//! require them and the client never blocks a request on them alone.

/// Characters that count toward the "special character" rule
pub const SPECIAL_CHARACTERS: &str = "!@#$%^&*(),.?\":{}|<>";

const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordRule {
    MinLength,
    Uppercase,
    Lowercase,
    Digit,
    Special,
}

impl PasswordRule {
    pub const ALL: [PasswordRule; 5] = [
        PasswordRule::MinLength,
        PasswordRule::Uppercase,
        PasswordRule::Lowercase,
        PasswordRule::Digit,
        PasswordRule::Special,
    ];

    pub fn is_met(&self, password: &str) -> bool {
        match self {
            PasswordRule::MinLength => password.chars().count() >= MIN_PASSWORD_LENGTH,
            PasswordRule::Uppercase => password.chars().any(|c| c.is_ascii_uppercase()),
            PasswordRule::Lowercase => password.chars().any(|c| c.is_ascii_lowercase()),
            PasswordRule::Digit => password.chars().any(|c| c.is_ascii_digit()),
            PasswordRule::Special => password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)),
        }
    }

    /// Message shown when the rule is not met
    pub fn hint(&self) -> &'static str {
        match self {
            PasswordRule::MinLength => "Password must be at least 8 characters.",
            PasswordRule::Uppercase => "Include at least 1 uppercase letter.",
            PasswordRule::Lowercase => "Include at least 1 lowercase letter.",
            PasswordRule::Digit => "Include at least 1 number.",
            PasswordRule::Special => "Include at least 1 special character.",
        }
    }
}

/// Hints for every rule `password` does not meet, in display order
pub fn password_issues(password: &str) -> Vec<&'static str> {
    PasswordRule::ALL
        .iter()
        .filter(|rule| !rule.is_met(password))
        .map(|rule| rule.hint())
        .collect()
}
