//! Purpose: Model the app's navigation surface and its login gate.
//! Exports: `Route`, `NavOutcome`, `guard`.
//! Role: Single source of truth for paths, titles, and which pages need a session.
//! Invariants: `parse` and `path` round-trip for every route.
//! Invariants: Unauthenticated navigation to a protected route lands on Home.

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Route {
    Home,
    Search,
    VideoDetail(u64),
    UserPage(String),
    Upload,
    Profile,
    VideoEdit(u64),
    Notifications,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum NavOutcome {
    Allow(Route),
    Redirect(Route),
}

impl Route {
    pub fn parse(path: &str) -> Option<Self> {
        let trimmed = path.strip_suffix('/').filter(|p| !p.is_empty()).unwrap_or(path);
        let segments: Vec<&str> = trimmed
            .strip_prefix('/')?
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect();
        match segments.as_slice() {
            [] => Some(Route::Home),
            ["search"] => Some(Route::Search),
            ["video", id] => id.parse().ok().map(Route::VideoDetail),
            ["video", id, "edit"] => id.parse().ok().map(Route::VideoEdit),
            ["user", username] => Some(Route::UserPage((*username).to_string())),
            ["upload"] => Some(Route::Upload),
            ["profile"] => Some(Route::Profile),
            ["notifications"] => Some(Route::Notifications),
            _ => None,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::Search => "/search".to_string(),
            Route::VideoDetail(id) => format!("/video/{id}"),
            Route::UserPage(username) => format!("/user/{username}"),
            Route::Upload => "/upload".to_string(),
            Route::Profile => "/profile".to_string(),
            Route::VideoEdit(id) => format!("/video/{id}/edit"),
            Route::Notifications => "/notifications".to_string(),
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Route::Home => "Home",
            Route::Search => "Search",
            Route::VideoDetail(_) => "Video",
            Route::UserPage(_) => "User",
            Route::Upload => "Upload",
            Route::Profile => "Profile",
            Route::VideoEdit(_) => "Edit video",
            Route::Notifications => "Notifications",
        }
    }

    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            Route::Upload | Route::Profile | Route::VideoEdit(_) | Route::Notifications
        )
    }
}

/// Navigation gate: protected routes require a live session, everything else
/// passes through. Unauthenticated access redirects to Home.
pub fn guard(route: Route, logged_in: bool) -> NavOutcome {
    if route.requires_login() && !logged_in {
        NavOutcome::Redirect(Route::Home)
    } else {
        NavOutcome::Allow(route)
    }
}
