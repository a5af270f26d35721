//! Route protection policy.
//!
//! `evaluate` is a pure function of the session state and the target's
//! requirement; re-run it whenever the session changes.

use super::session::SessionState;

/// Login entry point that guarded routes redirect to
pub const LOGIN_PATH: &str = "/login";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteRequirement {
    Public,
    Authenticated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session not resolved yet; show a placeholder and wait
    Loading,
    Render,
    /// Navigate away; `replace` drops the guarded page from history
    Redirect { to: &'static str, replace: bool },
}

pub fn evaluate(state: &SessionState, requirement: RouteRequirement) -> GuardDecision {
    match (state, requirement) {
        (SessionState::Unresolved, _) => GuardDecision::Loading,
        (SessionState::Anonymous, RouteRequirement::Authenticated) => GuardDecision::Redirect {
            to: LOGIN_PATH,
            replace: true,
        },
        _ => GuardDecision::Render,
    }
}

/// Navigation targets of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Landing,
    Login,
    Register,
    VerifyOtp,
    Home,
    Pdf,
    Image,
    Audio,
    Tone,
    History,
    Analytics,
    Profile,
}

impl Route {
    pub const ALL: [Route; 12] = [
        Route::Landing,
        Route::Login,
        Route::Register,
        Route::VerifyOtp,
        Route::Home,
        Route::Pdf,
        Route::Image,
        Route::Audio,
        Route::Tone,
        Route::History,
        Route::Analytics,
        Route::Profile,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Route::Landing => "/",
            Route::Login => LOGIN_PATH,
            Route::Register => "/register",
            Route::VerifyOtp => "/verify-otp",
            Route::Home => "/home",
            Route::Pdf => "/pdf",
            Route::Image => "/image",
            Route::Audio => "/audio",
            Route::Tone => "/tone",
            Route::History => "/history",
            Route::Analytics => "/analytics",
            Route::Profile => "/profile",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Route::Landing => "Welcome",
            Route::Login => "Login",
            Route::Register => "Register",
            Route::VerifyOtp => "Verify OTP",
            Route::Home => "Home",
            Route::Pdf => "PDF Summarizer",
            Route::Image => "Image Captioning",
            Route::Audio => "Audio Mood Detection",
            Route::Tone => "Tone Changer",
            Route::History => "History",
            Route::Analytics => "Analytics",
            Route::Profile => "Profile",
        }
    }

    pub fn requirement(&self) -> RouteRequirement {
        match self {
            Route::Landing | Route::Login | Route::Register | Route::VerifyOtp => {
                RouteRequirement::Public
            }
            _ => RouteRequirement::Authenticated,
        }
    }

    /// Look up a route by path, ignoring a trailing slash and any query string
    pub fn from_path(path: &str) -> Option<Route> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let trimmed = path.trim_end_matches('/');
        let normalized = if trimmed.is_empty() { "/" } else { trimmed };
        Route::ALL.into_iter().find(|r| r.path() == normalized)
    }
}

/// Requirement for an arbitrary path; unknown paths have nothing to protect.
pub fn requirement_for_path(path: &str) -> RouteRequirement {
    Route::from_path(path)
        .map(|r| r.requirement())
        .unwrap_or(RouteRequirement::Public)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserProfile;

    fn authenticated() -> SessionState {
        SessionState::Authenticated(UserProfile {
            id: 1,
            username: "alice".to_string(),
            email: "a@x.com".to_string(),
        })
    }

    #[test]
    fn test_unresolved_never_redirects() {
        for route in Route::ALL {
            assert_eq!(
                evaluate(&SessionState::Unresolved, route.requirement()),
                GuardDecision::Loading
            );
        }
    }

    #[test]
    fn test_anonymous_redirects_from_protected_routes() {
        let decision = evaluate(&SessionState::Anonymous, RouteRequirement::Authenticated);
        assert_eq!(
            decision,
            GuardDecision::Redirect {
                to: "/login",
                replace: true
            }
        );
        assert_eq!(
            evaluate(&SessionState::Anonymous, RouteRequirement::Public),
            GuardDecision::Render
        );
    }

    #[test]
    fn test_authenticated_renders_everything() {
        for route in Route::ALL {
            assert_eq!(
                evaluate(&authenticated(), route.requirement()),
                GuardDecision::Render
            );
        }
    }

    #[test]
    fn test_route_table_requirements() {
        assert_eq!(Route::Landing.requirement(), RouteRequirement::Public);
        assert_eq!(Route::Login.requirement(), RouteRequirement::Public);
        assert_eq!(Route::Register.requirement(), RouteRequirement::Public);
        assert_eq!(Route::VerifyOtp.requirement(), RouteRequirement::Public);
        for route in [Route::Pdf, Route::Image, Route::Audio, Route::Tone, Route::Profile] {
            assert_eq!(route.requirement(), RouteRequirement::Authenticated);
        }
    }

    #[test]
    fn test_from_path() {
        assert_eq!(Route::from_path("/"), Some(Route::Landing));
        assert_eq!(Route::from_path(""), Some(Route::Landing));
        assert_eq!(Route::from_path("/pdf"), Some(Route::Pdf));
        assert_eq!(Route::from_path("/pdf/"), Some(Route::Pdf));
        assert_eq!(Route::from_path("/history?feature=audio"), Some(Route::History));
        assert_eq!(Route::from_path("/nowhere"), None);
    }

    #[test]
    fn test_paths_round_trip_through_lookup() {
        for route in Route::ALL {
            assert_eq!(Route::from_path(route.path()), Some(route));
        }
    }

    #[test]
    fn test_unknown_paths_are_public() {
        assert_eq!(requirement_for_path("/nowhere"), RouteRequirement::Public);
        assert_eq!(requirement_for_path("/tone"), RouteRequirement::Authenticated);
    }
}
