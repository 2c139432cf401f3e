use crate::{
    AppState,
    access::{Action, Fragment, Resource, can_perform, fragment},
    api::{ApiError, messages},
    auth::Session,
    guard::{GuardDecision, Guarded, guard, protect_async},
    models::{
        Attachment, Donation, Fund, FundReport, LoginRequest, OrganizerProfile, RegistrationRequest,
        VolunteerApplication, VolunteerRequest, VolunteerStatus,
    },
    routes::Route,
    scope::ViewScope,
    token::{Claims, DecodeError},
    views::{
        self, FundDetailsView, FundDraft, FundEdit, ProfileSection, ProfileView, ReportDraft,
        ValidationError, VolunteerApplicationView,
    },
};

/// HandlerError
///
/// Everything a command can fail with. `Display` is the text shown to the user.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("{message}")]
    Api { source: ApiError, message: String },
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("Сервер выдал нечитаемый токен: {0}")]
    Token(#[from] DecodeError),
    #[error("Действие недоступно для вашей учетной записи: {}", .0.label())]
    Denied(Action),
}

impl HandlerError {
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            HandlerError::Api { source, .. } => Some(source),
            _ => None,
        }
    }
}

// --- Plumbing ---

/// call
///
/// Awaits an API request and turns a failure into a user-facing error. A `401` means
/// the server no longer accepts the token, so the session is ended locally too.
async fn call<T>(
    state: &AppState,
    fallback: &'static str,
    request: impl Future<Output = Result<T, ApiError>>,
) -> Result<T, HandlerError> {
    request.await.map_err(|error| failure(state, error, fallback))
}

fn failure(state: &AppState, error: ApiError, fallback: &'static str) -> HandlerError {
    if error.is_unauthorized() {
        tracing::info!("token rejected by the server, ending session");
        state.auth.logout();
    }
    HandlerError::Api {
        message: error.user_message(fallback),
        source: error,
    }
}

/// require_session
///
/// For actions on public routes that still need a signed-in user. Mirrors the guard:
/// `Loading` yields the placeholder, an anonymous visitor is sent to the login entry.
fn require_session<T>(route: &Route, session: &Session) -> Option<Guarded<T>> {
    match guard(route, session) {
        GuardDecision::Placeholder => Some(Guarded::Placeholder),
        GuardDecision::Redirect { to, from } => Some(Guarded::Redirect { to, from }),
        GuardDecision::Render if !session.is_authenticated() => Some(Guarded::Redirect {
            to: Route::LOGIN_ENTRY,
            from: route.clone(),
        }),
        GuardDecision::Render => None,
    }
}

fn ensure(allowed: bool, action: Action) -> Result<(), HandlerError> {
    if allowed {
        Ok(())
    } else {
        tracing::debug!(?action, "action not permitted for session");
        Err(HandlerError::Denied(action))
    }
}

// --- Identity ---

/// login
///
/// [Public View] Exchanges credentials for a token and signs the client in with the
/// token's claims.
pub async fn login(state: &AppState, request: LoginRequest) -> Result<Claims, HandlerError> {
    let token = call(state, messages::LOGIN_FAILED, state.api.login(&request)).await?;
    let claims = state.auth.login_with_token(&token)?;
    Ok(claims)
}

/// logout
///
/// Purely local: there is no server-side session to end.
pub fn logout(state: &AppState) {
    state.auth.logout();
}

pub fn whoami(state: &AppState) -> Session {
    state.auth.session()
}

/// register
///
/// [Public View] Creates an account. The user signs in separately afterwards.
pub async fn register(state: &AppState, request: RegistrationRequest) -> Result<(), HandlerError> {
    call(state, messages::REGISTRATION_FAILED, state.api.register(&request)).await
}

// --- Funds ---

/// funds
///
/// [Public View] Home page list: active funds, or completed ones when asked.
pub async fn funds(state: &AppState, completed: bool) -> Result<Vec<Fund>, HandlerError> {
    let fallback = if completed {
        messages::COMPLETED_FUNDS_LOAD_FAILED
    } else {
        messages::FUNDS_LOAD_FAILED
    };
    let all = call(state, fallback, state.api.list_funds()).await?;

    Ok(if completed {
        views::completed_funds(all)
    } else {
        views::home_funds(all)
    })
}

/// fund_details
///
/// [Public View] The fund page with its gated controls for the current session.
pub async fn fund_details(state: &AppState, id: i64) -> Result<Guarded<FundDetailsView>, HandlerError> {
    let route = Route::FundDetails(id);
    let session = state.auth.session();

    protect_async(&route, &session, || async {
        let fund = call(state, messages::FUND_LOAD_FAILED, state.api.get_fund(id)).await?;
        Ok::<_, HandlerError>(FundDetailsView::build(&session, fund))
    })
    .await
    .transpose()
}

/// create_fund
///
/// [Protected View] Uploads a new fund with its cover image. `ADMIN`/`OWNER` only.
pub async fn create_fund(
    state: &AppState,
    draft: FundDraft,
    image: Attachment,
    today: chrono::NaiveDate,
) -> Result<Guarded<Fund>, HandlerError> {
    let route = Route::CreateFund;
    let session = state.auth.session();

    protect_async(&route, &session, || async {
        ensure(can_perform(Action::CreateFund, &session, Resource::NONE), Action::CreateFund)?;
        let request = draft.into_request(today)?;
        let fund = call(
            state,
            messages::FUND_CREATE_FAILED,
            state.api.create_fund(&request, image),
        )
        .await?;
        tracing::info!(fund_id = fund.id, "fund created");
        Ok::<_, HandlerError>(fund)
    })
    .await
    .transpose()
}

/// delete_fund
///
/// [Public View, signed-in action] Deletes a fund. Allowed for `ADMIN`, and for
/// `OWNER` on their own fund.
pub async fn delete_fund(state: &AppState, id: i64) -> Result<Guarded<()>, HandlerError> {
    let route = Route::FundDetails(id);
    let session = state.auth.session();
    if let Some(early) = require_session(&route, &session) {
        return Ok(early);
    }

    let fund = call(state, messages::FUND_LOAD_FAILED, state.api.get_fund(id)).await?;
    ensure(can_perform(Action::DeleteFund, &session, &fund), Action::DeleteFund)?;

    call(state, messages::FUND_DELETE_FAILED, state.api.delete_fund(id)).await?;
    tracing::info!(fund_id = id, "fund deleted");
    Ok(Guarded::Content(()))
}

/// update_fund
///
/// [Public View, signed-in action] Edits a fund's details, optionally replacing its
/// cover image. Same ownership rule as deletion.
pub async fn update_fund(
    state: &AppState,
    id: i64,
    edit: FundEdit,
    image: Option<Attachment>,
    today: chrono::NaiveDate,
) -> Result<Guarded<Fund>, HandlerError> {
    let route = Route::FundDetails(id);
    let session = state.auth.session();
    if let Some(early) = require_session(&route, &session) {
        return Ok(early);
    }

    let fund = call(state, messages::FUND_LOAD_FAILED, state.api.get_fund(id)).await?;
    ensure(can_perform(Action::EditFund, &session, &fund), Action::EditFund)?;

    let request = edit.apply(&fund)?.into_request(today)?;
    let updated = call(
        state,
        messages::FUND_UPDATE_FAILED,
        state.api.update_fund(id, &request, image),
    )
    .await?;
    tracing::info!(fund_id = id, "fund updated");
    Ok(Guarded::Content(updated))
}

pub async fn fund_image(state: &AppState, id: i64) -> Result<Vec<u8>, HandlerError> {
    call(state, messages::FUND_LOAD_FAILED, state.api.fund_image(id)).await
}

/// organizer
///
/// [Protected View] Public profile of an organizer and their funds.
pub async fn organizer(state: &AppState, username: &str) -> Result<Guarded<OrganizerProfile>, HandlerError> {
    let route = Route::Organizer(username.to_string());
    let session = state.auth.session();

    protect_async(&route, &session, || {
        call(state, messages::ORGANIZER_LOAD_FAILED, state.api.organizer(username))
    })
    .await
    .transpose()
}

// --- Donations ---

/// donate
///
/// [Public View, signed-in action] Creates a pending donation and returns it with
/// the payment provider's confirmation URL. Anonymous visitors get the login prompt.
pub async fn donate(
    state: &AppState,
    fund_id: i64,
    amount: f64,
    description: Option<&str>,
) -> Result<Guarded<Donation>, HandlerError> {
    let route = Route::FundDetails(fund_id);
    let session = state.auth.session();
    if let Some(early) = require_session(&route, &session) {
        return Ok(early);
    }

    match fragment(Action::Donate, &session, Resource::NONE) {
        Fragment::Show => {}
        Fragment::LoginPrompt => {
            return Ok(Guarded::Redirect {
                to: Route::LOGIN_ENTRY,
                from: route,
            });
        }
        Fragment::Hidden => return Err(HandlerError::Denied(Action::Donate)),
    }

    let request = views::donation_request(fund_id, amount, description, &state.config.return_url)?;
    let donation = call(state, messages::DONATION_FAILED, state.api.donate(&request)).await?;
    tracing::info!(fund_id, donation_id = donation.id, "donation created");
    Ok(Guarded::Content(donation))
}

/// donation_history
///
/// [Protected View] The donor's own donations, newest first.
pub async fn donation_history(state: &AppState) -> Result<Guarded<Vec<Donation>>, HandlerError> {
    let route = Route::Profile;
    let session = state.auth.session();

    protect_async(&route, &session, || async {
        ensure(
            can_perform(Action::ViewDonationHistory, &session, Resource::NONE),
            Action::ViewDonationHistory,
        )?;
        let donations = call(state, messages::DONATIONS_LOAD_FAILED, state.api.my_donations()).await?;
        Ok::<_, HandlerError>(views::donation_history(donations))
    })
    .await
    .transpose()
}

/// fund_donations
///
/// [Protected View] Completed donations to one fund. Owner of the fund or `ADMIN`.
pub async fn fund_donations(
    state: &AppState,
    fund_id: i64,
) -> Result<Guarded<(Fund, Vec<Donation>)>, HandlerError> {
    let route = Route::FundDonations(fund_id);
    let session = state.auth.session();

    protect_async(&route, &session, || async {
        let mut scope = ViewScope::new("fund_donations");
        let api = state.api.clone();
        let fund = scope.spawn(async move { api.get_fund(fund_id).await });
        let api = state.api.clone();
        let donations = scope.spawn(async move { api.fund_donations(fund_id).await });

        let fund = call(state, messages::DATA_LOAD_FAILED, fund.join()).await?;
        ensure(can_perform(Action::ViewDonations, &session, &fund), Action::ViewDonations)?;
        let donations = call(state, messages::DATA_LOAD_FAILED, donations.join()).await?;

        Ok::<_, HandlerError>((fund, views::fund_donations(donations)))
    })
    .await
    .transpose()
}

// --- Volunteering ---

/// apply_volunteer
///
/// [Protected View] Sends a volunteer application, unless one for the same fund is
/// still awaiting a decision.
pub async fn apply_volunteer(
    state: &AppState,
    fund_id: i64,
    application: VolunteerApplication,
) -> Result<Guarded<VolunteerRequest>, HandlerError> {
    let route = Route::VolunteerApplication(fund_id);
    let session = state.auth.session();

    protect_async(&route, &session, || async {
        ensure(
            can_perform(Action::ApplyAsVolunteer, &session, Resource::NONE),
            Action::ApplyAsVolunteer,
        )?;

        let mut scope = ViewScope::new("volunteer_application");
        let api = state.api.clone();
        let fund = scope.spawn(async move { api.get_fund(fund_id).await });
        let api = state.api.clone();
        let mine = scope.spawn(async move { api.my_volunteer_requests().await });

        let fund = call(state, messages::FUND_LOAD_FAILED, fund.join()).await?;
        let mine = call(state, messages::MY_REQUESTS_LOAD_FAILED, mine.join()).await?;

        let view = VolunteerApplicationView::build(fund, mine);
        view.check(&application)?;

        let request = call(
            state,
            messages::VOLUNTEER_FAILED,
            state.api.apply_volunteer(fund_id, &application),
        )
        .await?;
        tracing::info!(fund_id, request_id = request.id, "volunteer application sent");
        Ok::<_, HandlerError>(request)
    })
    .await
    .transpose()
}

/// fund_volunteer_requests
///
/// [Protected View] Applications received by a fund. Owner of the fund or `ADMIN`.
pub async fn fund_volunteer_requests(
    state: &AppState,
    fund_id: i64,
) -> Result<Guarded<(Fund, Vec<VolunteerRequest>)>, HandlerError> {
    let route = Route::FundVolunteerRequests(fund_id);
    let session = state.auth.session();

    protect_async(&route, &session, || async {
        let fund = call(state, messages::DATA_LOAD_FAILED, state.api.get_fund(fund_id)).await?;
        ensure(
            can_perform(Action::ViewVolunteerRequests, &session, &fund),
            Action::ViewVolunteerRequests,
        )?;
        let requests = call(
            state,
            messages::DATA_LOAD_FAILED,
            state.api.fund_volunteer_requests(fund_id),
        )
        .await?;
        Ok::<_, HandlerError>((fund, requests))
    })
    .await
    .transpose()
}

/// review_volunteer_request
///
/// [Protected View] Accepts or rejects an application on the fund's request page.
pub async fn review_volunteer_request(
    state: &AppState,
    fund_id: i64,
    request_id: i64,
    status: VolunteerStatus,
) -> Result<Guarded<VolunteerRequest>, HandlerError> {
    let route = Route::FundVolunteerRequests(fund_id);
    let session = state.auth.session();

    protect_async(&route, &session, || async {
        let fund = call(state, messages::DATA_LOAD_FAILED, state.api.get_fund(fund_id)).await?;
        ensure(
            can_perform(Action::ReviewVolunteerRequest, &session, &fund),
            Action::ReviewVolunteerRequest,
        )?;
        let updated = call(
            state,
            messages::STATUS_UPDATE_FAILED,
            state.api.update_volunteer_status(request_id, status),
        )
        .await?;
        tracing::info!(fund_id, request_id, ?status, "volunteer request reviewed");
        Ok::<_, HandlerError>(updated)
    })
    .await
    .transpose()
}

// --- Reports ---

/// fund_reports
///
/// [Public View] Spending reports published for a fund.
pub async fn fund_reports(state: &AppState, fund_id: i64) -> Result<Vec<FundReport>, HandlerError> {
    call(state, messages::REPORTS_LOAD_FAILED, state.api.fund_reports(fund_id)).await
}

pub async fn report_photo(
    state: &AppState,
    fund_id: i64,
    report_id: i64,
    photo_id: i64,
) -> Result<Vec<u8>, HandlerError> {
    call(
        state,
        messages::PHOTO_LOAD_FAILED,
        state.api.report_photo(fund_id, report_id, photo_id),
    )
    .await
}

/// create_report
///
/// [Public View, signed-in action] Publishes a spending report. Only offered on a
/// completed fund, to its owner or an `ADMIN`.
pub async fn create_report(
    state: &AppState,
    fund_id: i64,
    draft: ReportDraft,
    photos: Vec<Attachment>,
) -> Result<Guarded<FundReport>, HandlerError> {
    let route = Route::FundDetails(fund_id);
    let session = state.auth.session();
    if let Some(early) = require_session(&route, &session) {
        return Ok(early);
    }

    let fund = call(state, messages::FUND_LOAD_FAILED, state.api.get_fund(fund_id)).await?;
    let view = FundDetailsView::build(&session, fund);
    ensure(
        view.fragment_for(Action::CreateReport) == Fragment::Show,
        Action::CreateReport,
    )?;

    let request = draft.into_request()?;
    let report = call(
        state,
        messages::REPORT_CREATE_FAILED,
        state.api.create_report(fund_id, &request, photos),
    )
    .await?;
    tracing::info!(fund_id, report_id = report.id, "report published");
    Ok(Guarded::Content(report))
}

// --- Profile ---

/// ProfilePage
///
/// The profile view plus the data behind each of its sections.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfilePage {
    pub view: ProfileView,
    pub own_funds: Option<Vec<Fund>>,
    pub volunteer_requests: Option<Vec<VolunteerRequest>>,
    pub donations: Option<Vec<Donation>>,
}

/// profile
///
/// [Protected View] Loads only the sections the session's role can see.
pub async fn profile(state: &AppState) -> Result<Guarded<ProfilePage>, HandlerError> {
    let route = Route::Profile;
    let session = state.auth.session();

    protect_async(&route, &session, || async {
        let Some(view) = ProfileView::build(&session) else {
            return Err(HandlerError::Denied(Action::ViewOwnFunds));
        };

        let own_funds = if view.shows(ProfileSection::OwnFunds) {
            Some(call(state, messages::MY_FUNDS_LOAD_FAILED, state.api.my_funds()).await?)
        } else {
            None
        };
        let volunteer_requests = if view.shows(ProfileSection::VolunteerRequests) {
            Some(
                call(
                    state,
                    messages::MY_REQUESTS_LOAD_FAILED,
                    state.api.my_volunteer_requests(),
                )
                .await?,
            )
        } else {
            None
        };
        let donations = if view.shows(ProfileSection::DonationHistory) {
            let list = call(state, messages::DONATIONS_LOAD_FAILED, state.api.my_donations()).await?;
            Some(views::donation_history(list))
        } else {
            None
        };

        Ok::<_, HandlerError>(ProfilePage {
            view,
            own_funds,
            volunteer_requests,
            donations,
        })
    })
    .await
    .transpose()
}
