use crate::types::UserProfile;

/// Result of probing `GET /me`.
///
/// The probe never fails: any non-2xx status or transport fault collapses
/// to `Unauthenticated`. A 2xx whose body does not decode still counts as
/// authenticated, just without a profile.
#[derive(Debug, Clone)]
pub enum SessionStatus {
    Authenticated(Option<UserProfile>),
    Unauthenticated,
}

impl SessionStatus {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionStatus::Authenticated(_))
    }

    /// The profile, when the server returned one.
    pub fn profile(&self) -> Option<&UserProfile> {
        match self {
            SessionStatus::Authenticated(profile) => profile.as_ref(),
            SessionStatus::Unauthenticated => None,
        }
    }
}
