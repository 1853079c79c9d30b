use crate::client::CircaClient;

/// Pages of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    App,
    CreateCircle,
    Signup,
    Signin,
    ConnectWallet,
    Verify,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::App => "/app",
            Route::CreateCircle => "/app/create_circle",
            Route::Signup => "/auth/signup",
            Route::Signin => "/auth/signin",
            Route::ConnectWallet => "/auth/connect_wallet",
            Route::Verify => "/auth/verify",
        }
    }

    /// Access rule the guard applies before entering the route.
    pub fn policy(&self) -> RoutePolicy {
        match self {
            Route::Home => RoutePolicy::Public,
            Route::App | Route::CreateCircle => RoutePolicy::Protected,
            Route::Signup | Route::Signin | Route::ConnectWallet | Route::Verify => {
                RoutePolicy::GuestOnly
            }
        }
    }
}

/// Who may enter a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutePolicy {
    /// Anyone, no probe.
    Public,
    /// Authenticated users only; others are sent to sign-up.
    Protected,
    /// Signed-out users only; session holders are sent to the app.
    GuestOnly,
}

/// Whether navigation may proceed, or where it goes instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardVerdict {
    Proceed,
    Redirect(Route),
}

/// Decide whether the current session may enter `route`.
///
/// Non-public routes probe the session first. A probe that cannot reach
/// the server counts as signed out, so protected pages fail closed and
/// guest-only pages fail open.
pub async fn guard(client: &CircaClient, route: Route) -> GuardVerdict {
    match route.policy() {
        RoutePolicy::Public => GuardVerdict::Proceed,
        RoutePolicy::Protected => {
            if client.check_session().await.is_authenticated() {
                GuardVerdict::Proceed
            } else {
                tracing::debug!(path = route.path(), "no session, redirecting to sign-up");
                GuardVerdict::Redirect(Route::Signup)
            }
        }
        RoutePolicy::GuestOnly => {
            if client.check_session().await.is_authenticated() {
                tracing::debug!(path = route.path(), "session live, redirecting to app");
                GuardVerdict::Redirect(Route::App)
            } else {
                GuardVerdict::Proceed
            }
        }
    }
}
