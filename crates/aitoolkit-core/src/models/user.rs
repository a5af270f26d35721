use serde::{Deserialize, Serialize};

/// Identity snapshot returned by the login endpoint.
///
/// Stored alongside the access token so a cold start does not need a
/// profile round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
}

impl UserProfile {
    /// Short label for status lines, e.g. `alice <a@x.com>`
    pub fn display_name(&self) -> String {
        format!("{} <{}>", self.username, self.email)
    }
}

/// Account details served by `GET /api/profile`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub username: String,
    pub email: String,
    /// Number of stored history entries for the account
    #[serde(default)]
    pub records: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileResponse {
    pub data: ProfileSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_profile_deserializes_login_payload() {
        let json = r#"{"id":1,"username":"alice","email":"a@x.com"}"#;
        let user: UserProfile = serde_json::from_str(json).unwrap();
        assert_eq!(user.id, 1);
        assert_eq!(user.username, "alice");
        assert_eq!(user.display_name(), "alice <a@x.com>");
    }

    #[test]
    fn test_profile_response_unwraps_data() {
        let json = r#"{"data":{"username":"alice","email":"a@x.com","records":12}}"#;
        let parsed: ProfileResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.data.records, 12);
    }

    #[test]
    fn test_profile_records_default_to_zero() {
        let json = r#"{"data":{"username":"alice","email":"a@x.com"}}"#;
        let parsed: ProfileResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.data.records, 0);
    }
}
