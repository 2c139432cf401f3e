use crate::{auth::Session, routes::Route};

/// Text shown in place of a protected view while the session is still being restored.
pub const LOADING_PLACEHOLDER: &str = "Загрузка";

/// GuardDecision
///
/// Outcome of evaluating a route against the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// The session is not resolved yet: show the loading indicator, nothing else.
    Placeholder,
    /// Anonymous visitor of a protected route. `from` lets the login view send the
    /// user back afterwards.
    Redirect { to: Route, from: Route },
    Render,
}

/// guard
///
/// The loading check always runs first, so protected content is never produced
/// before the session is known, and no redirect is issued on a merely unknown state.
pub fn guard(route: &Route, session: &Session) -> GuardDecision {
    if session.is_loading() {
        return GuardDecision::Placeholder;
    }

    if route.is_protected() && !session.is_authenticated() {
        tracing::debug!(route = %route, "redirecting anonymous visitor to login");
        return GuardDecision::Redirect {
            to: Route::LOGIN_ENTRY,
            from: route.clone(),
        };
    }

    GuardDecision::Render
}

/// Guarded
///
/// A view that passed through the guard. `Content` is the only variant that carries
/// the rendered view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guarded<T> {
    Placeholder,
    Redirect { to: Route, from: Route },
    Content(T),
}

/// protect
///
/// Runs `render` only when `guard` allows it. Because the closure is never invoked
/// otherwise, a protected view cannot even be built during `Loading`.
pub fn protect<T>(route: &Route, session: &Session, render: impl FnOnce() -> T) -> Guarded<T> {
    match guard(route, session) {
        GuardDecision::Placeholder => Guarded::Placeholder,
        GuardDecision::Redirect { to, from } => Guarded::Redirect { to, from },
        GuardDecision::Render => Guarded::Content(render()),
    }
}

/// Async flavour of `protect` for views that fetch their data.
pub async fn protect_async<T, F, Fut>(route: &Route, session: &Session, render: F) -> Guarded<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    match guard(route, session) {
        GuardDecision::Placeholder => Guarded::Placeholder,
        GuardDecision::Redirect { to, from } => Guarded::Redirect { to, from },
        GuardDecision::Render => Guarded::Content(render().await),
    }
}

impl<T, E> Guarded<Result<T, E>> {
    /// Lifts a fallible render out of the guard: `Content(Err(e))` becomes `Err(e)`.
    pub fn transpose(self) -> Result<Guarded<T>, E> {
        match self {
            Guarded::Placeholder => Ok(Guarded::Placeholder),
            Guarded::Redirect { to, from } => Ok(Guarded::Redirect { to, from }),
            Guarded::Content(result) => result.map(Guarded::Content),
        }
    }
}

impl<T> Guarded<T> {
    pub fn content(self) -> Option<T> {
        match self {
            Guarded::Content(value) => Some(value),
            _ => None,
        }
    }
}
