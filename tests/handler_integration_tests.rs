mod common;

use async_trait::async_trait;
use chrono::NaiveDate;
use dobro_portal::{
    ApiError, AppConfig, AppState, AuthContext, MemorySessionStore, PlatformApi,
    access::Action,
    guard::Guarded,
    handlers::{self, HandlerError},
    models::{
        Attachment, Donation, DonationRequest, DonationStatus, Fund, FundReport, FundReportRequest,
        FundRequest, FundStatus, LoginRequest, OrganizerProfile, RegistrationRequest, Role,
        VolunteerApplication, VolunteerRequest, VolunteerStatus,
    },
    routes::Route,
    views::{FundEdit, ReportDraft, ValidationError},
};
use std::sync::{Arc, Mutex};

// --- MOCK PLATFORM IMPLEMENTATION ---

// Canned data in, recorded calls out. Handlers only see the trait.
#[derive(Default)]
pub struct MockPlatform {
    pub funds: Vec<Fund>,
    pub my_requests: Vec<VolunteerRequest>,
    pub calls: Mutex<Vec<String>>,
    pub donation_input: Mutex<Option<DonationRequest>>,
    pub update_input: Mutex<Option<(FundRequest, bool)>>,
}

impl MockPlatform {
    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn find(&self, id: i64) -> Result<Fund, ApiError> {
        self.funds
            .iter()
            .find(|f| f.id == id)
            .cloned()
            .ok_or(ApiError::NotFound { message: None })
    }
}

fn volunteer_request(id: i64, fund_id: i64, status: VolunteerStatus) -> VolunteerRequest {
    VolunteerRequest {
        id,
        fund_id,
        fund_title: None,
        volunteer_name: None,
        email: "vera@example.org".to_string(),
        telegram: None,
        city: None,
        message: None,
        status,
        created_at: NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap(),
    }
}

#[async_trait]
impl PlatformApi for MockPlatform {
    async fn login(&self, _request: &LoginRequest) -> Result<String, ApiError> {
        self.record("login");
        Ok(common::mint("alice", Some("Alice"), "OWNER", 3600))
    }

    async fn register(&self, _request: &RegistrationRequest) -> Result<(), ApiError> {
        self.record("register");
        Ok(())
    }

    async fn organizer(&self, username: &str) -> Result<OrganizerProfile, ApiError> {
        self.record(format!("organizer {username}"));
        Ok(OrganizerProfile {
            id: 1,
            username: username.to_string(),
            display_name: None,
            funds: self.funds.clone(),
        })
    }

    async fn list_funds(&self) -> Result<Vec<Fund>, ApiError> {
        self.record("list_funds");
        Ok(self.funds.clone())
    }

    async fn get_fund(&self, id: i64) -> Result<Fund, ApiError> {
        self.record(format!("get_fund {id}"));
        self.find(id)
    }

    async fn fund_image(&self, id: i64) -> Result<Vec<u8>, ApiError> {
        self.record(format!("fund_image {id}"));
        Ok(vec![])
    }

    async fn my_funds(&self) -> Result<Vec<Fund>, ApiError> {
        self.record("my_funds");
        Ok(self.funds.clone())
    }

    async fn create_fund(&self, request: &FundRequest, _image: Attachment) -> Result<Fund, ApiError> {
        self.record("create_fund");
        Ok(Fund {
            id: 100,
            title: request.title.clone(),
            ..Fund::default()
        })
    }

    async fn update_fund(
        &self,
        id: i64,
        request: &FundRequest,
        image: Option<Attachment>,
    ) -> Result<Fund, ApiError> {
        self.record(format!("update_fund {id}"));
        *self.update_input.lock().unwrap() = Some((request.clone(), image.is_some()));
        Ok(Fund {
            title: request.title.clone(),
            description: Some(request.description.clone()),
            target_amount: request.target_amount,
            end_date: Some(request.end_date),
            ..self.find(id)?
        })
    }

    async fn delete_fund(&self, id: i64) -> Result<(), ApiError> {
        self.record(format!("delete_fund {id}"));
        Ok(())
    }

    async fn donate(&self, request: &DonationRequest) -> Result<Donation, ApiError> {
        self.record("donate");
        *self.donation_input.lock().unwrap() = Some(request.clone());
        Ok(Donation {
            id: 1,
            payment_id: Some("pay-1".to_string()),
            confirmation_url: Some("https://pay.example/confirm/1".to_string()),
            status: DonationStatus::Pending,
            amount: request.amount,
            currency: Some("RUB".to_string()),
            created_at: NaiveDate::from_ymd_opt(2025, 3, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            fund_title: None,
            donor_name: None,
        })
    }

    async fn my_donations(&self) -> Result<Vec<Donation>, ApiError> {
        self.record("my_donations");
        Ok(vec![])
    }

    async fn fund_donations(&self, fund_id: i64) -> Result<Vec<Donation>, ApiError> {
        self.record(format!("fund_donations {fund_id}"));
        Ok(vec![])
    }

    async fn apply_volunteer(
        &self,
        fund_id: i64,
        application: &VolunteerApplication,
    ) -> Result<VolunteerRequest, ApiError> {
        self.record(format!("apply_volunteer {fund_id}"));
        let mut request = volunteer_request(50, fund_id, VolunteerStatus::Pending);
        request.email = application.email.clone();
        Ok(request)
    }

    async fn my_volunteer_requests(&self) -> Result<Vec<VolunteerRequest>, ApiError> {
        self.record("my_volunteer_requests");
        Ok(self.my_requests.clone())
    }

    async fn fund_volunteer_requests(&self, fund_id: i64) -> Result<Vec<VolunteerRequest>, ApiError> {
        self.record(format!("fund_volunteer_requests {fund_id}"));
        Ok(vec![])
    }

    async fn update_volunteer_status(
        &self,
        request_id: i64,
        status: VolunteerStatus,
    ) -> Result<VolunteerRequest, ApiError> {
        self.record(format!("update_volunteer_status {request_id}"));
        Ok(volunteer_request(request_id, 1, status))
    }

    async fn fund_reports(&self, fund_id: i64) -> Result<Vec<FundReport>, ApiError> {
        self.record(format!("fund_reports {fund_id}"));
        Ok(vec![])
    }

    async fn create_report(
        &self,
        fund_id: i64,
        request: &FundReportRequest,
        _photos: Vec<Attachment>,
    ) -> Result<FundReport, ApiError> {
        self.record(format!("create_report {fund_id}"));
        Ok(FundReport {
            id: 7,
            fund_id,
            fund_title: None,
            description: request.description.clone(),
            total_spent: request.total_spent,
            expenses: request.expenses.clone(),
            purchases: request.purchases.clone(),
            photos: vec![],
            created_at: NaiveDate::from_ymd_opt(2025, 3, 2)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        })
    }

    async fn report_photo(&self, _fund_id: i64, _report_id: i64, _photo_id: i64) -> Result<Vec<u8>, ApiError> {
        self.record("report_photo");
        Ok(vec![])
    }
}

// --- Setup ---

fn platform() -> MockPlatform {
    MockPlatform {
        funds: vec![
            common::fund(1, "olga", FundStatus::Active),
            common::fund(2, "olga", FundStatus::Completed),
            common::fund(3, "petr", FundStatus::Completed),
        ],
        ..MockPlatform::default()
    }
}

/// State over `mock`, optionally signed in. `None` leaves the context unmounted.
fn state_with(mock: Arc<MockPlatform>, session: Option<Option<(&str, Role)>>) -> AppState {
    let auth = Arc::new(AuthContext::new(Arc::new(MemorySessionStore::new())));
    if let Some(signed_in) = session {
        auth.mount();
        if let Some((username, role)) = signed_in {
            auth.login(common::mint(username, None, role.as_str(), 3600), username, None, role);
        }
    }
    AppState {
        api: mock,
        auth,
        config: AppConfig {
            return_url: "https://dobro.example".to_string(),
            ..AppConfig::default()
        },
    }
}

fn signed_in(mock: &Arc<MockPlatform>, username: &str, role: Role) -> AppState {
    state_with(mock.clone(), Some(Some((username, role))))
}

// --- Tests ---

#[tokio::test]
async fn test_protected_view_before_mount_is_placeholder() {
    let mock = Arc::new(platform());
    let state = state_with(mock.clone(), None);

    assert_eq!(handlers::profile(&state).await.unwrap(), Guarded::Placeholder);
    assert!(matches!(
        handlers::fund_details(&state, 1).await.unwrap(),
        Guarded::Placeholder
    ));
    assert!(mock.calls().is_empty(), "nothing may be fetched while loading");
}

#[tokio::test]
async fn test_anonymous_redirected_without_fetching() {
    let mock = Arc::new(platform());
    let state = state_with(mock.clone(), Some(None));

    let outcome = handlers::fund_donations(&state, 1).await.unwrap();
    assert_eq!(
        outcome,
        Guarded::Redirect {
            to: Route::Login,
            from: Route::FundDonations(1)
        }
    );

    let outcome = handlers::delete_fund(&state, 1).await.unwrap();
    assert_eq!(
        outcome,
        Guarded::Redirect {
            to: Route::Login,
            from: Route::FundDetails(1)
        }
    );
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn test_login_handler_uses_token_claims() {
    let mock = Arc::new(platform());
    let state = state_with(mock.clone(), Some(None));

    let claims = handlers::login(
        &state,
        LoginRequest {
            username: "alice".to_string(),
            password: "pw".to_string(),
        },
    )
    .await
    .unwrap();

    assert_eq!(claims.role, Role::Owner);
    assert_eq!(handlers::whoami(&state).display_name(), Some("Alice"));

    handlers::logout(&state);
    assert!(!handlers::whoami(&state).is_authenticated());
}

#[tokio::test]
async fn test_owner_cannot_delete_foreign_fund() {
    let mock = Arc::new(platform());
    let state = signed_in(&mock, "olga", Role::Owner);

    let err = handlers::delete_fund(&state, 3).await.unwrap_err();
    assert!(matches!(err, HandlerError::Denied(Action::DeleteFund)));
    assert!(!mock.calls().contains(&"delete_fund 3".to_string()));

    assert_eq!(handlers::delete_fund(&state, 1).await.unwrap(), Guarded::Content(()));
    assert!(mock.calls().contains(&"delete_fund 1".to_string()));
}

#[tokio::test]
async fn test_admin_deletes_any_fund() {
    let mock = Arc::new(platform());
    let state = signed_in(&mock, "root", Role::Admin);

    assert_eq!(handlers::delete_fund(&state, 3).await.unwrap(), Guarded::Content(()));
}

#[tokio::test]
async fn test_donate_per_session() {
    let mock = Arc::new(platform());

    let anonymous = state_with(mock.clone(), Some(None));
    assert!(matches!(
        handlers::donate(&anonymous, 1, 500.0, None).await.unwrap(),
        Guarded::Redirect { .. }
    ));

    let volunteer = signed_in(&mock, "vera", Role::Volunteer);
    assert!(matches!(
        handlers::donate(&volunteer, 1, 500.0, None).await,
        Err(HandlerError::Denied(Action::Donate))
    ));

    let donor = signed_in(&mock, "dora", Role::Donor);
    assert!(matches!(
        handlers::donate(&donor, 1, 50.0, None).await,
        Err(HandlerError::Validation(ValidationError::AmountTooSmall))
    ));

    let Guarded::Content(donation) = handlers::donate(&donor, 1, 1000.0, None).await.unwrap() else {
        panic!("donor may donate");
    };
    assert_eq!(
        donation.confirmation_url.as_deref(),
        Some("https://pay.example/confirm/1")
    );

    let sent = mock.donation_input.lock().unwrap().clone().unwrap();
    assert_eq!(sent.description, "Пожертвование");
    assert_eq!(sent.return_url, "https://dobro.example/funds/1");
}

#[tokio::test]
async fn test_pending_application_is_not_resent() {
    let mock = Arc::new(MockPlatform {
        my_requests: vec![volunteer_request(9, 1, VolunteerStatus::Pending)],
        ..platform()
    });
    let state = signed_in(&mock, "vera", Role::Volunteer);
    let application = VolunteerApplication {
        email: "vera@example.org".to_string(),
        ..VolunteerApplication::default()
    };

    let err = handlers::apply_volunteer(&state, 1, application.clone())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        HandlerError::Validation(ValidationError::PendingApplication)
    ));
    assert!(!mock.calls().contains(&"apply_volunteer 1".to_string()));

    let sent = handlers::apply_volunteer(&state, 2, application).await.unwrap();
    assert!(matches!(sent, Guarded::Content(ref r) if r.fund_id == 2));
}

#[tokio::test]
async fn test_report_requires_completed_own_fund() {
    let mock = Arc::new(platform());
    let state = signed_in(&mock, "olga", Role::Owner);
    let draft = || ReportDraft {
        description: "Купили корм".to_string(),
        total_spent: 1200.0,
        expenses: vec!["корм".to_string(), String::new()],
        purchases: vec![],
    };

    assert!(matches!(
        handlers::create_report(&state, 1, draft(), vec![]).await,
        Err(HandlerError::Denied(Action::CreateReport))
    ));
    assert!(matches!(
        handlers::create_report(&state, 3, draft(), vec![]).await,
        Err(HandlerError::Denied(Action::CreateReport))
    ));

    let Guarded::Content(report) = handlers::create_report(&state, 2, draft(), vec![]).await.unwrap() else {
        panic!("owner may report on own completed fund");
    };
    assert_eq!(report.expenses, vec!["корм"]);
}

#[tokio::test]
async fn test_review_needs_fund_ownership() {
    let mock = Arc::new(platform());
    let state = signed_in(&mock, "olga", Role::Owner);

    assert!(matches!(
        handlers::review_volunteer_request(&state, 3, 11, VolunteerStatus::Accepted).await,
        Err(HandlerError::Denied(Action::ReviewVolunteerRequest))
    ));

    let Guarded::Content(updated) =
        handlers::review_volunteer_request(&state, 1, 11, VolunteerStatus::Rejected)
            .await
            .unwrap()
    else {
        panic!("owner reviews own fund");
    };
    assert_eq!(updated.status, VolunteerStatus::Rejected);
}

#[tokio::test]
async fn test_fund_donations_need_fund_ownership() {
    let mock = Arc::new(platform());

    let owner = signed_in(&mock, "olga", Role::Owner);
    let Guarded::Content((fund, _)) = handlers::fund_donations(&owner, 1).await.unwrap() else {
        panic!("owner sees donations to own fund");
    };
    assert_eq!(fund.id, 1);
    assert!(matches!(
        handlers::fund_donations(&owner, 3).await,
        Err(HandlerError::Denied(Action::ViewDonations))
    ));

    let admin = signed_in(&mock, "root", Role::Admin);
    assert!(matches!(
        handlers::fund_donations(&admin, 3).await.unwrap(),
        Guarded::Content((ref f, _)) if f.id == 3
    ));

    let donor = signed_in(&mock, "dora", Role::Donor);
    assert!(matches!(
        handlers::fund_donations(&donor, 1).await,
        Err(HandlerError::Denied(Action::ViewDonations))
    ));
}

#[tokio::test]
async fn test_fund_volunteer_requests_need_fund_ownership() {
    let mock = Arc::new(platform());

    let owner = signed_in(&mock, "olga", Role::Owner);
    assert!(matches!(
        handlers::fund_volunteer_requests(&owner, 1).await.unwrap(),
        Guarded::Content((ref f, _)) if f.id == 1
    ));
    assert!(matches!(
        handlers::fund_volunteer_requests(&owner, 3).await,
        Err(HandlerError::Denied(Action::ViewVolunteerRequests))
    ));
    assert!(!mock.calls().contains(&"fund_volunteer_requests 3".to_string()));

    let admin = signed_in(&mock, "root", Role::Admin);
    assert!(matches!(
        handlers::fund_volunteer_requests(&admin, 3).await.unwrap(),
        Guarded::Content((ref f, _)) if f.id == 3
    ));
    assert!(mock.calls().contains(&"fund_volunteer_requests 3".to_string()));
}

#[tokio::test]
async fn test_edit_fund_keeps_unchanged_fields() {
    let mock = Arc::new(platform());
    let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2030, 6, 1).unwrap();
    let state = signed_in(&mock, "olga", Role::Owner);

    let move_end = FundEdit {
        end_date: Some(end),
        ..FundEdit::default()
    };
    assert!(matches!(
        handlers::update_fund(&state, 3, move_end, None, today).await,
        Err(HandlerError::Denied(Action::EditFund))
    ));
    assert!(!mock.calls().contains(&"update_fund 3".to_string()));

    // The fixture fund has no end date, so one must be supplied.
    assert!(matches!(
        handlers::update_fund(&state, 1, FundEdit::default(), None, today).await,
        Err(HandlerError::Validation(ValidationError::MissingEndDate))
    ));

    let edit = FundEdit {
        title: Some("  Корм для приюта ".to_string()),
        end_date: Some(end),
        ..FundEdit::default()
    };
    let Guarded::Content(updated) = handlers::update_fund(&state, 1, edit, None, today).await.unwrap() else {
        panic!("owner edits own fund");
    };
    assert_eq!(updated.title, "Корм для приюта");

    let (sent, with_image) = mock.update_input.lock().unwrap().clone().unwrap();
    assert!(!with_image);
    assert_eq!(sent.description, "Помощь приюту");
    assert_eq!(sent.target_amount, 100_000.0);
    assert_eq!(sent.end_date, end);
}

#[tokio::test]
async fn test_admin_edits_any_fund() {
    let mock = Arc::new(platform());
    let state = signed_in(&mock, "root", Role::Admin);
    let edit = FundEdit {
        target_amount: Some(50_000.0),
        end_date: NaiveDate::from_ymd_opt(2030, 6, 1),
        ..FundEdit::default()
    };
    let image = Attachment {
        file_name: "new.png".to_string(),
        content_type: "image/png".to_string(),
        data: vec![1],
    };
    let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();

    let outcome = handlers::update_fund(&state, 3, edit, Some(image), today).await.unwrap();

    assert!(matches!(outcome, Guarded::Content(ref f) if f.target_amount == 50_000.0));
    let (_, with_image) = mock.update_input.lock().unwrap().clone().unwrap();
    assert!(with_image);
}

#[tokio::test]
async fn test_create_fund_only_for_organizers() {
    let mock = Arc::new(platform());
    let draft = || dobro_portal::views::FundDraft {
        title: "Новый фонд".to_string(),
        description: String::new(),
        target_amount: 10_000.0,
        end_date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
        category: String::new(),
    };
    let image = || Attachment {
        file_name: "cover.png".to_string(),
        content_type: "image/png".to_string(),
        data: vec![0],
    };
    let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();

    let donor = signed_in(&mock, "dora", Role::Donor);
    assert!(matches!(
        handlers::create_fund(&donor, draft(), image(), today).await,
        Err(HandlerError::Denied(Action::CreateFund))
    ));

    let owner = signed_in(&mock, "olga", Role::Owner);
    let created = handlers::create_fund(&owner, draft(), image(), today).await.unwrap();
    assert!(matches!(created, Guarded::Content(ref f) if f.title == "Новый фонд"));
}

#[tokio::test]
async fn test_profile_loads_only_visible_sections() {
    let mock = Arc::new(platform());
    let state = signed_in(&mock, "vera", Role::Volunteer);

    let Guarded::Content(page) = handlers::profile(&state).await.unwrap() else {
        panic!("signed in");
    };

    assert!(page.volunteer_requests.is_some());
    assert!(page.own_funds.is_none());
    assert!(page.donations.is_none());
    assert_eq!(mock.calls(), vec!["my_volunteer_requests".to_string()]);
}

#[tokio::test]
async fn test_home_lists_active_funds() {
    let mock = Arc::new(platform());
    let state = state_with(mock.clone(), Some(None));

    let active: Vec<i64> = handlers::funds(&state, false).await.unwrap().iter().map(|f| f.id).collect();
    let completed: Vec<i64> = handlers::funds(&state, true).await.unwrap().iter().map(|f| f.id).collect();

    assert_eq!(active, vec![1]);
    assert_eq!(completed, vec![2, 3]);
}
