use std::fmt;

/// Route
///
/// Every view the client can navigate to, mirroring the web paths.
///
/// Access levels:
/// - public: `Home`, `Login`, `Register`, `FundDetails`;
/// - protected (require a session, see `guard`): everything else.
///
/// Role restrictions inside protected views are decided by the view fragments, not
/// by the route table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Login,
    Register,
    FundDetails(i64),
    FundDonations(i64),
    CreateFund,
    Profile,
    VolunteerApplication(i64),
    FundVolunteerRequests(i64),
    Organizer(String),
}

impl Route {
    /// Where an anonymous visitor of a protected route is sent.
    pub const LOGIN_ENTRY: Route = Route::Login;

    pub fn is_protected(&self) -> bool {
        matches!(
            self,
            Route::FundDonations(_)
                | Route::CreateFund
                | Route::Profile
                | Route::VolunteerApplication(_)
                | Route::FundVolunteerRequests(_)
                | Route::Organizer(_)
        )
    }

    /// parse
    ///
    /// Maps a path such as `/funds/7/donations` to its route. Query strings, fragments
    /// and trailing slashes are ignored; unknown paths and malformed ids fall back to
    /// `Home`, like the web client's catch-all redirect.
    pub fn parse(path: &str) -> Route {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let id = |raw: &str| raw.parse::<i64>().ok();

        let route = match segments.as_slice() {
            [] => Some(Route::Home),
            ["login"] => Some(Route::Login),
            ["register"] => Some(Route::Register),
            ["create-fund"] => Some(Route::CreateFund),
            ["profile"] => Some(Route::Profile),
            ["funds", raw] => id(raw).map(Route::FundDetails),
            ["funds", raw, "donations"] => id(raw).map(Route::FundDonations),
            ["funds", raw, "volunteer-requests"] => id(raw).map(Route::FundVolunteerRequests),
            ["volunteer-application", raw] => id(raw).map(Route::VolunteerApplication),
            ["organizer", username] => Some(Route::Organizer((*username).to_string())),
            _ => None,
        };

        route.unwrap_or(Route::Home)
    }

    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::Login => "/login".to_string(),
            Route::Register => "/register".to_string(),
            Route::FundDetails(id) => format!("/funds/{id}"),
            Route::FundDonations(id) => format!("/funds/{id}/donations"),
            Route::CreateFund => "/create-fund".to_string(),
            Route::Profile => "/profile".to_string(),
            Route::VolunteerApplication(fund_id) => format!("/volunteer-application/{fund_id}"),
            Route::FundVolunteerRequests(fund_id) => format!("/funds/{fund_id}/volunteer-requests"),
            Route::Organizer(username) => format!("/organizer/{username}"),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}
