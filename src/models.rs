use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

// --- Identity ---

/// Role
///
/// The closed set of account roles issued by the platform. The wire, token and
/// session-store representation is the SCREAMING_CASE name (e.g. `"OWNER"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum Role {
    Admin,
    Owner,
    Volunteer,
    Donor,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Owner, Role::Volunteer, Role::Donor];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Owner => "OWNER",
            Role::Volunteer => "VOLUNTEER",
            Role::Donor => "DONOR",
        }
    }

    /// Human-readable label shown on the profile page.
    pub fn label(&self) -> &'static str {
        match self {
            Role::Admin => "Администратор",
            Role::Owner => "Владелец фонда",
            Role::Volunteer => "Волонтер",
            Role::Donor => "Донор",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Role::Admin),
            "OWNER" => Ok(Role::Owner),
            "VOLUNTEER" => Ok(Role::Volunteer),
            "DONOR" => Ok(Role::Donor),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

// --- Funds ---

/// FundStatus
///
/// Lifecycle of a fundraising campaign. Only `Completed` funds accept spending reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum FundStatus {
    #[default]
    Active,
    Completed,
    Archived,
}

impl FundStatus {
    pub fn label(&self) -> &'static str {
        match self {
            FundStatus::Active => "Активен",
            FundStatus::Completed => "Завершен",
            FundStatus::Archived => "В архиве",
        }
    }
}

/// Fund
///
/// A fundraising campaign as returned by `GET /api/funds/{id}`.
///
/// Note the two owner fields: `owner_username` carries the organizer's *display name*
/// while `username` is the organizer's account handle. Ownership checks compare
/// against `username`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Fund {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub target_amount: f64,
    #[serde(default)]
    pub current_amount: f64,
    #[serde(default)]
    #[ts(type = "string | null")]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    #[ts(type = "string | null")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub owner_username: Option<String>,
    pub username: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub image_name: Option<String>,
    #[serde(default)]
    pub image_type: Option<String>,
    #[serde(default)]
    pub status: FundStatus,
}

impl Fund {
    /// Collected share of the target, rounded and capped at 100.
    pub fn progress_percent(&self) -> u8 {
        if self.target_amount <= 0.0 {
            return 0;
        }
        let pct = (self.current_amount / self.target_amount * 100.0).round();
        pct.clamp(0.0, 100.0) as u8
    }

    /// Name to show for the organizer, falling back to the account handle.
    pub fn organizer_name(&self) -> &str {
        self.owner_username.as_deref().unwrap_or(&self.username)
    }
}

/// OrganizerProfile
///
/// Public organizer page (`GET /organizers/{username}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OrganizerProfile {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub funds: Vec<Fund>,
}

// --- Donations ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum DonationStatus {
    Pending,
    Completed,
    #[serde(alias = "CANCELLED")]
    Canceled,
    Failed,
}

/// Donation
///
/// A donation record. `confirmation_url` is the external payment provider page the
/// donor must be sent to; the client never processes payments itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Donation {
    pub id: i64,
    #[serde(default)]
    pub payment_id: Option<String>,
    #[serde(default)]
    pub confirmation_url: Option<String>,
    pub status: DonationStatus,
    pub amount: f64,
    #[serde(default)]
    pub currency: Option<String>,
    #[ts(type = "string")]
    pub created_at: NaiveDateTime,
    #[serde(default)]
    pub fund_title: Option<String>,
    #[serde(default)]
    pub donor_name: Option<String>,
}

// --- Volunteering ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum VolunteerStatus {
    Pending,
    Accepted,
    Rejected,
}

/// VolunteerRequest
///
/// A volunteer's application to help a specific fund.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct VolunteerRequest {
    pub id: i64,
    pub fund_id: i64,
    #[serde(default)]
    pub fund_title: Option<String>,
    #[serde(default)]
    pub volunteer_name: Option<String>,
    pub email: String,
    #[serde(default)]
    pub telegram: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    pub status: VolunteerStatus,
    #[ts(type = "string")]
    pub created_at: NaiveDateTime,
}

// --- Reports ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReportPhoto {
    pub id: i64,
    pub file_name: String,
    pub file_type: String,
}

/// FundReport
///
/// A spending report published by the organizer of a completed fund.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct FundReport {
    pub id: i64,
    pub fund_id: i64,
    #[serde(default)]
    pub fund_title: Option<String>,
    pub description: String,
    pub total_spent: f64,
    #[serde(default)]
    pub expenses: Vec<String>,
    #[serde(default)]
    pub purchases: Vec<String>,
    #[serde(default)]
    pub photos: Vec<ReportPhoto>,
    #[ts(type = "string")]
    pub created_at: NaiveDateTime,
}

// --- Request Payloads (Input Schemas) ---

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// RegistrationRequest
///
/// Input payload for `POST /register`. The password is forwarded to the server and
/// never persisted or logged by the client.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RegistrationRequest {
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub password: String,
    pub role: Role,
}

/// DonationRequest
///
/// `return_url` is where the payment provider sends the donor afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DonationRequest {
    pub fund_id: i64,
    pub amount: f64,
    pub description: String,
    pub return_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, Default)]
#[ts(export)]
pub struct VolunteerApplication {
    pub email: String,
    pub telegram: String,
    pub city: String,
    pub message: String,
}

/// FundRequest
///
/// The JSON part (`fundRequest`) of the multipart fund-creation upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct FundRequest {
    pub title: String,
    pub description: String,
    pub target_amount: f64,
    #[ts(type = "string")]
    pub end_date: NaiveDate,
    pub category: String,
}

/// FundReportRequest
///
/// The JSON part (`request`) of the multipart report upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct FundReportRequest {
    pub description: String,
    pub total_spent: f64,
    pub expenses: Vec<String>,
    pub purchases: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StatusUpdate {
    pub status: VolunteerStatus,
}

/// Binary attachment (fund image or report photo) sent inside a multipart upload.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// ErrorBody
///
/// Error payload returned by the platform on non-2xx responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
