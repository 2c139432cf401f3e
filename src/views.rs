//! View models: what each screen shows for a given session, independent of how it is
//! printed. Gated controls are decided through `access` only.

use chrono::NaiveDate;
use std::fmt;

use crate::{
    access::{Action, Fragment, Resource, can_perform, fragment},
    auth::Session,
    models::{
        Donation, DonationRequest, DonationStatus, Fund, FundReport, FundReportRequest, FundRequest,
        FundStatus, Role, VolunteerApplication, VolunteerRequest, VolunteerStatus,
    },
};

pub const MIN_DONATION: f64 = 100.0;
pub const SUGGESTED_AMOUNTS: [u32; 4] = [1000, 2000, 5000, 10000];
pub const DEFAULT_DONATION_DESCRIPTION: &str = "Пожертвование";
pub const MAX_FUND_DESCRIPTION: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Минимальная сумма пожертвования: 100 ₽")]
    AmountTooSmall,
    #[error("Пожалуйста, опишите, на что были потрачены средства")]
    EmptyReportDescription,
    #[error("Сумма расходов не может быть отрицательной")]
    NegativeTotal,
    #[error("Укажите название фонда")]
    EmptyTitle,
    #[error("Целевая сумма должна быть больше нуля")]
    NonPositiveTarget,
    #[error("Описание не должно превышать 1000 символов")]
    DescriptionTooLong,
    #[error("Дата окончания сбора не может быть в прошлом")]
    EndDateInPast,
    #[error("Укажите дату окончания сбора")]
    MissingEndDate,
    #[error("Укажите email для связи")]
    MissingEmail,
    #[error(
        "У вас уже есть активная заявка на рассмотрении. Пожалуйста, дождитесь решения по текущей заявке."
    )]
    PendingApplication,
}

// --- Fund details ---

/// GatedAction
///
/// One control of a view together with how it renders for the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatedAction {
    pub action: Action,
    pub fragment: Fragment,
}

impl GatedAction {
    /// Caption of the control, or `None` when it is hidden.
    pub fn caption(&self) -> Option<&'static str> {
        match self.fragment {
            Fragment::Show => Some(self.action.label()),
            Fragment::LoginPrompt => self.action.login_prompt_label(),
            Fragment::Hidden => None,
        }
    }
}

/// FundDetailsView
///
/// The public fund page. Ownership-gated controls compare the session against the
/// fund's `username` (the organizer's handle).
#[derive(Debug, Clone, PartialEq)]
pub struct FundDetailsView {
    pub fund: Fund,
    pub progress: u8,
    pub actions: Vec<GatedAction>,
}

impl FundDetailsView {
    pub const ACTIONS: [Action; 6] = [
        Action::Donate,
        Action::ApplyAsVolunteer,
        Action::ViewVolunteerRequests,
        Action::CreateReport,
        Action::ViewDonations,
        Action::DeleteFund,
    ];

    pub fn build(session: &Session, fund: Fund) -> Self {
        let actions = Self::ACTIONS
            .iter()
            .map(|&action| {
                // Reports describe how collected money was spent.
                let fragment = if action == Action::CreateReport && fund.status != FundStatus::Completed {
                    Fragment::Hidden
                } else {
                    fragment(action, session, &fund)
                };
                GatedAction { action, fragment }
            })
            .collect();

        Self {
            progress: fund.progress_percent(),
            fund,
            actions,
        }
    }

    pub fn fragment_for(&self, action: Action) -> Fragment {
        self.actions
            .iter()
            .find(|a| a.action == action)
            .map(|a| a.fragment)
            .unwrap_or(Fragment::Hidden)
    }

    pub fn visible_actions(&self) -> impl Iterator<Item = &GatedAction> {
        self.actions.iter().filter(|a| a.fragment != Fragment::Hidden)
    }
}

impl fmt::Display for FundDetailsView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fund = &self.fund;
        writeln!(f, "{} [{}]", fund.title, fund.status.label())?;
        writeln!(f, "Организатор: {} (@{})", fund.organizer_name(), fund.username)?;
        if let Some(category) = fund.category.as_deref().filter(|c| !c.is_empty()) {
            writeln!(f, "Категория: {category}")?;
        }
        if let Some(description) = fund.description.as_deref().filter(|d| !d.is_empty()) {
            writeln!(f, "{description}")?;
        }
        writeln!(
            f,
            "Собрано {} из {} ₽ ({}%)",
            format_amount(fund.current_amount),
            format_amount(fund.target_amount),
            self.progress
        )?;
        if let Some(end) = fund.end_date {
            writeln!(f, "Сбор до {}", end.format("%d.%m.%Y"))?;
        }
        for action in self.visible_actions() {
            if let Some(caption) = action.caption() {
                writeln!(f, "  > {caption}")?;
            }
        }
        Ok(())
    }
}

// --- Fund lists ---

/// Funds still collecting, in server order.
pub fn home_funds(funds: Vec<Fund>) -> Vec<Fund> {
    funds
        .into_iter()
        .filter(|f| f.status == FundStatus::Active)
        .collect()
}

pub fn completed_funds(funds: Vec<Fund>) -> Vec<Fund> {
    funds
        .into_iter()
        .filter(|f| f.status == FundStatus::Completed)
        .collect()
}

pub fn fund_line(fund: &Fund) -> String {
    format!(
        "#{:<5} {} | {} / {} ₽ ({}%) | {}",
        fund.id,
        fund.title,
        format_amount(fund.current_amount),
        format_amount(fund.target_amount),
        fund.progress_percent(),
        fund.organizer_name()
    )
}

// --- Donations ---

/// Newest first.
pub fn donation_history(mut donations: Vec<Donation>) -> Vec<Donation> {
    donations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    donations
}

/// Only settled donations are shown to the fund's owner, newest first.
pub fn fund_donations(donations: Vec<Donation>) -> Vec<Donation> {
    donation_history(
        donations
            .into_iter()
            .filter(|d| d.status == DonationStatus::Completed)
            .collect(),
    )
}

pub fn donation_status_label(status: DonationStatus) -> &'static str {
    match status {
        DonationStatus::Pending => "Ожидает оплаты",
        DonationStatus::Completed => "Оплачено",
        DonationStatus::Canceled => "Отменено",
        DonationStatus::Failed => "Ошибка оплаты",
    }
}

pub fn donation_line(donation: &Donation) -> String {
    let who = donation
        .fund_title
        .as_deref()
        .or(donation.donor_name.as_deref())
        .unwrap_or("-");
    format!(
        "{} | {} ₽ | {} | {}",
        donation.created_at.format("%d.%m.%Y %H:%M"),
        format_amount(donation.amount),
        donation_status_label(donation.status),
        who
    )
}

/// donation_request
///
/// Builds the payload for `POST /api/v1/donations`. The payment provider sends the
/// donor back to the fund page under `return_base`.
pub fn donation_request(
    fund_id: i64,
    amount: f64,
    description: Option<&str>,
    return_base: &str,
) -> Result<DonationRequest, ValidationError> {
    if !(amount >= MIN_DONATION) {
        return Err(ValidationError::AmountTooSmall);
    }

    let description = description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(DEFAULT_DONATION_DESCRIPTION);

    Ok(DonationRequest {
        fund_id,
        amount,
        description: description.to_string(),
        return_url: format!("{}/funds/{fund_id}", return_base.trim_end_matches('/')),
    })
}

// --- Volunteering ---

/// VolunteerApplicationView
///
/// A volunteer may hold at most one undecided request per fund.
#[derive(Debug, Clone, PartialEq)]
pub struct VolunteerApplicationView {
    pub fund: Fund,
    pub pending: Option<VolunteerRequest>,
}

impl VolunteerApplicationView {
    pub fn build(fund: Fund, my_requests: Vec<VolunteerRequest>) -> Self {
        let pending = my_requests
            .into_iter()
            .find(|r| r.fund_id == fund.id && r.status == VolunteerStatus::Pending);
        Self { fund, pending }
    }

    pub fn can_submit(&self) -> bool {
        self.pending.is_none()
    }

    pub fn check(&self, application: &VolunteerApplication) -> Result<(), ValidationError> {
        if !self.can_submit() {
            return Err(ValidationError::PendingApplication);
        }
        if application.email.trim().is_empty() {
            return Err(ValidationError::MissingEmail);
        }
        Ok(())
    }
}

pub fn volunteer_status_label(status: VolunteerStatus) -> &'static str {
    match status {
        VolunteerStatus::Pending => "На рассмотрении",
        VolunteerStatus::Accepted => "Принята",
        VolunteerStatus::Rejected => "Отклонена",
    }
}

pub fn volunteer_request_line(request: &VolunteerRequest) -> String {
    format!(
        "#{:<5} {} | {} | {} | {}",
        request.id,
        request.volunteer_name.as_deref().unwrap_or(&request.email),
        request.fund_title.as_deref().unwrap_or("-"),
        volunteer_status_label(request.status),
        request.created_at.format("%d.%m.%Y")
    )
}

// --- Reports ---

pub fn report_lines(report: &FundReport) -> Vec<String> {
    let mut lines = vec![
        format!(
            "Отчет #{} от {}: потрачено {} ₽",
            report.id,
            report.created_at.format("%d.%m.%Y"),
            format_amount(report.total_spent)
        ),
        format!("  {}", report.description),
    ];
    lines.extend(report.expenses.iter().map(|e| format!("  - расход: {e}")));
    lines.extend(report.purchases.iter().map(|p| format!("  - покупка: {p}")));
    lines.extend(
        report
            .photos
            .iter()
            .map(|p| format!("  - фото #{}: {}", p.id, p.file_name)),
    );
    lines
}

/// ReportDraft
///
/// The report form as typed in, before it becomes a `FundReportRequest`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportDraft {
    pub description: String,
    pub total_spent: f64,
    pub expenses: Vec<String>,
    pub purchases: Vec<String>,
}

impl ReportDraft {
    pub fn into_request(self) -> Result<FundReportRequest, ValidationError> {
        if self.description.trim().is_empty() {
            return Err(ValidationError::EmptyReportDescription);
        }
        if !(self.total_spent >= 0.0) {
            return Err(ValidationError::NegativeTotal);
        }

        Ok(FundReportRequest {
            description: self.description,
            total_spent: self.total_spent,
            expenses: non_blank(self.expenses),
            purchases: non_blank(self.purchases),
        })
    }
}

fn non_blank(lines: Vec<String>) -> Vec<String> {
    lines.into_iter().filter(|l| !l.trim().is_empty()).collect()
}

// --- Fund creation ---

#[derive(Debug, Clone, PartialEq)]
pub struct FundDraft {
    pub title: String,
    pub description: String,
    pub target_amount: f64,
    pub end_date: NaiveDate,
    pub category: String,
}

impl FundDraft {
    pub fn into_request(self, today: NaiveDate) -> Result<FundRequest, ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        if !(self.target_amount > 0.0) {
            return Err(ValidationError::NonPositiveTarget);
        }
        if self.description.chars().count() > MAX_FUND_DESCRIPTION {
            return Err(ValidationError::DescriptionTooLong);
        }
        if self.end_date < today {
            return Err(ValidationError::EndDateInPast);
        }

        Ok(FundRequest {
            title: self.title.trim().to_string(),
            description: self.description,
            target_amount: self.target_amount,
            end_date: self.end_date,
            category: self.category,
        })
    }
}

/// FundEdit
///
/// Changes to an existing fund. Fields left as `None` keep the fund's current value;
/// the merged result is validated like a new fund.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FundEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    pub target_amount: Option<f64>,
    pub end_date: Option<NaiveDate>,
    pub category: Option<String>,
}

impl FundEdit {
    pub fn apply(self, fund: &Fund) -> Result<FundDraft, ValidationError> {
        let end_date = self
            .end_date
            .or(fund.end_date)
            .ok_or(ValidationError::MissingEndDate)?;

        Ok(FundDraft {
            title: self.title.unwrap_or_else(|| fund.title.clone()),
            description: self
                .description
                .or_else(|| fund.description.clone())
                .unwrap_or_default(),
            target_amount: self.target_amount.unwrap_or(fund.target_amount),
            end_date,
            category: self
                .category
                .or_else(|| fund.category.clone())
                .unwrap_or_default(),
        })
    }
}

// --- Profile ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileSection {
    OwnFunds,
    CreateFund,
    VolunteerRequests,
    DonationHistory,
}

impl ProfileSection {
    pub const ALL: [ProfileSection; 4] = [
        ProfileSection::OwnFunds,
        ProfileSection::CreateFund,
        ProfileSection::VolunteerRequests,
        ProfileSection::DonationHistory,
    ];

    pub fn action(&self) -> Action {
        match self {
            ProfileSection::OwnFunds => Action::ViewOwnFunds,
            ProfileSection::CreateFund => Action::CreateFund,
            ProfileSection::VolunteerRequests => Action::ViewOwnVolunteerRequests,
            ProfileSection::DonationHistory => Action::ViewDonationHistory,
        }
    }
}

/// ProfileView
///
/// The signed-in user's own page. Sections follow the role: fund management for
/// `ADMIN`/`OWNER`, requests for `VOLUNTEER`, donation history for `DONOR`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileView {
    pub username: String,
    pub display_name: String,
    pub role: Option<Role>,
    pub sections: Vec<ProfileSection>,
}

impl ProfileView {
    /// `None` for a session that is not authenticated.
    pub fn build(session: &Session) -> Option<Self> {
        let username = session.username()?.to_string();
        let sections = ProfileSection::ALL
            .into_iter()
            .filter(|s| can_perform(s.action(), session, Resource::NONE))
            .collect();

        Some(Self {
            display_name: session.display_name().unwrap_or(&username).to_string(),
            username,
            role: session.role(),
            sections,
        })
    }

    pub fn role_label(&self) -> &'static str {
        self.role.map(|r| r.label()).unwrap_or("Пользователь")
    }

    pub fn shows(&self, section: ProfileSection) -> bool {
        self.sections.contains(&section)
    }
}

impl fmt::Display for ProfileView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} (@{})", self.display_name, self.username)?;
        writeln!(f, "Роль: {}", self.role_label())?;
        for section in &self.sections {
            writeln!(f, "  > {}", section.action().label())?;
        }
        Ok(())
    }
}

/// Whole roubles print without a fractional part.
pub fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{amount:.0}")
    } else {
        format!("{amount:.2}")
    }
}
