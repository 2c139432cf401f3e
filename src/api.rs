use async_trait::async_trait;
use reqwest::{
    Method, RequestBuilder, Response, StatusCode,
    multipart::{Form, Part},
};
use serde::{Serialize, de::DeserializeOwned};
use std::{sync::Arc, time::Instant};
use tracing::{Instrument, Span};
use uuid::Uuid;

use crate::{
    auth::AuthContext,
    config::AppConfig,
    models::{
        Attachment, Donation, DonationRequest, ErrorBody, Fund, FundReport, FundReportRequest,
        FundRequest, LoginRequest, OrganizerProfile, RegistrationRequest, StatusUpdate,
        VolunteerApplication, VolunteerRequest, VolunteerStatus,
    },
};

/// Header used to correlate a client request with server-side logs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Localized fallbacks shown when the server gives no `message`.
pub mod messages {
    pub const GENERIC: &str = "Что-то пошло не так. Пожалуйста, попробуйте позже.";
    pub const LOGIN_FAILED: &str = "Ошибка входа. Пожалуйста, попробуйте снова.";
    pub const REGISTRATION_FAILED: &str = "Ошибка регистрации. Пожалуйста, попробуйте снова.";
    pub const FUND_LOAD_FAILED: &str =
        "Не удалось загрузить информацию о фонде. Пожалуйста, попробуйте позже.";
    pub const FUNDS_LOAD_FAILED: &str = "Не удалось загрузить фонды. Пожалуйста, попробуйте позже.";
    pub const FUND_CREATE_FAILED: &str = "Не удалось создать фонд. Пожалуйста, попробуйте позже.";
    pub const FUND_UPDATE_FAILED: &str = "Не удалось обновить фонд. Пожалуйста, попробуйте позже.";
    pub const FUND_DELETE_FAILED: &str = "Не удалось удалить фонд. Пожалуйста, попробуйте позже.";
    pub const DONATION_FAILED: &str =
        "Не удалось создать пожертвование. Пожалуйста, попробуйте позже.";
    pub const DONATIONS_LOAD_FAILED: &str = "Не удалось загрузить историю пожертвований";
    pub const DATA_LOAD_FAILED: &str = "Не удалось загрузить данные. Пожалуйста, попробуйте позже.";
    pub const VOLUNTEER_FAILED: &str = "Не удалось отправить заявку. Пожалуйста, попробуйте позже.";
    pub const STATUS_UPDATE_FAILED: &str =
        "Не удалось обновить статус заявки. Пожалуйста, попробуйте позже.";
    pub const REPORT_CREATE_FAILED: &str = "Не удалось создать отчет. Пожалуйста, попробуйте снова.";
    pub const REPORTS_LOAD_FAILED: &str = "Не удалось загрузить отчеты";
    pub const ORGANIZER_LOAD_FAILED: &str =
        "Не удалось загрузить профиль организатора. Пожалуйста, попробуйте позже.";
    pub const MY_FUNDS_LOAD_FAILED: &str =
        "Не удалось загрузить ваши фонды. Пожалуйста, попробуйте позже.";
    pub const MY_REQUESTS_LOAD_FAILED: &str =
        "Не удалось загрузить ваши заявки. Пожалуйста, попробуйте позже.";
    pub const COMPLETED_FUNDS_LOAD_FAILED: &str = "Не удалось загрузить завершенные фонды";
    pub const PHOTO_LOAD_FAILED: &str = "Не удалось загрузить фотографию";
}

/// ApiError
///
/// A failed round-trip to the platform. Failures are reported once to the caller;
/// nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized { message: Option<String> },
    #[error("forbidden")]
    Forbidden { message: Option<String> },
    #[error("not found")]
    NotFound { message: Option<String> },
    #[error("server responded with status {status}")]
    Server { status: u16, message: Option<String> },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response body: {0}")]
    Decode(String),
    #[error("request cancelled")]
    Cancelled,
}

impl ApiError {
    fn from_status(status: StatusCode, message: Option<String>) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized { message },
            StatusCode::FORBIDDEN => ApiError::Forbidden { message },
            StatusCode::NOT_FOUND => ApiError::NotFound { message },
            other => ApiError::Server {
                status: other.as_u16(),
                message,
            },
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { .. } => Some(401),
            ApiError::Forbidden { .. } => Some(403),
            ApiError::NotFound { .. } => Some(404),
            ApiError::Server { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status().map(|s| s.as_u16()),
            ApiError::Decode(_) | ApiError::Cancelled => None,
        }
    }

    /// The human-readable `message` from the server's error payload, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Unauthorized { message }
            | ApiError::Forbidden { message }
            | ApiError::NotFound { message }
            | ApiError::Server { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    /// The 401-class response is the real signal that a session has expired.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    pub fn user_message(&self, fallback: &str) -> String {
        self.server_message().unwrap_or(fallback).to_string()
    }
}

/// PlatformApi
///
/// Contract for every call the views make against the remote platform. The HTTP
/// implementation lives below; tests substitute in-memory doubles.
#[async_trait]
pub trait PlatformApi: Send + Sync {
    // --- Identity ---
    /// Exchanges credentials for a bearer token.
    async fn login(&self, request: &LoginRequest) -> Result<String, ApiError>;
    async fn register(&self, request: &RegistrationRequest) -> Result<(), ApiError>;
    async fn organizer(&self, username: &str) -> Result<OrganizerProfile, ApiError>;

    // --- Funds ---
    async fn list_funds(&self) -> Result<Vec<Fund>, ApiError>;
    async fn get_fund(&self, id: i64) -> Result<Fund, ApiError>;
    async fn fund_image(&self, id: i64) -> Result<Vec<u8>, ApiError>;
    async fn my_funds(&self) -> Result<Vec<Fund>, ApiError>;
    async fn create_fund(&self, request: &FundRequest, image: Attachment) -> Result<Fund, ApiError>;
    /// Replaces a fund's details; the cover image is only sent when it changes.
    async fn update_fund(
        &self,
        id: i64,
        request: &FundRequest,
        image: Option<Attachment>,
    ) -> Result<Fund, ApiError>;
    async fn delete_fund(&self, id: i64) -> Result<(), ApiError>;

    // --- Donations ---
    /// Creates a pending donation; the response carries the payment provider's
    /// confirmation URL.
    async fn donate(&self, request: &DonationRequest) -> Result<Donation, ApiError>;
    async fn my_donations(&self) -> Result<Vec<Donation>, ApiError>;
    async fn fund_donations(&self, fund_id: i64) -> Result<Vec<Donation>, ApiError>;

    // --- Volunteering ---
    async fn apply_volunteer(
        &self,
        fund_id: i64,
        application: &VolunteerApplication,
    ) -> Result<VolunteerRequest, ApiError>;
    async fn my_volunteer_requests(&self) -> Result<Vec<VolunteerRequest>, ApiError>;
    async fn fund_volunteer_requests(&self, fund_id: i64) -> Result<Vec<VolunteerRequest>, ApiError>;
    async fn update_volunteer_status(
        &self,
        request_id: i64,
        status: VolunteerStatus,
    ) -> Result<VolunteerRequest, ApiError>;

    // --- Reports ---
    async fn fund_reports(&self, fund_id: i64) -> Result<Vec<FundReport>, ApiError>;
    async fn create_report(
        &self,
        fund_id: i64,
        request: &FundReportRequest,
        photos: Vec<Attachment>,
    ) -> Result<FundReport, ApiError>;
    async fn report_photo(&self, fund_id: i64, report_id: i64, photo_id: i64)
    -> Result<Vec<u8>, ApiError>;
}

/// ApiState
///
/// The shared handle views and handlers hold.
pub type ApiState = Arc<dyn PlatformApi>;

/// HttpPlatformApi
///
/// `reqwest`-backed implementation. The bearer token is read from the Auth Context
/// at the moment each request is built, so a login or logout applies to the very
/// next call.
pub struct HttpPlatformApi {
    client: reqwest::Client,
    base_url: String,
    auth: Arc<AuthContext>,
}

impl HttpPlatformApi {
    pub fn new(config: &AppConfig, auth: Arc<AuthContext>) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    /// prepare
    ///
    /// Builds the request with a fresh request id and the current bearer token, and
    /// the span every log line of this round-trip is recorded under.
    fn prepare(&self, method: Method, path: &str) -> (RequestBuilder, Span) {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "api_request",
            method = %method,
            path = %path,
            req_id = %request_id
        );

        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .header(REQUEST_ID_HEADER, request_id.to_string());

        if let Some(token) = self.auth.session().token() {
            builder = builder.bearer_auth(token);
        }

        (builder, span)
    }

    async fn send(builder: RequestBuilder, span: Span) -> Result<Response, ApiError> {
        Self::round_trip(builder).instrument(span).await
    }

    async fn round_trip(builder: RequestBuilder) -> Result<Response, ApiError> {
        let started = Instant::now();
        let response = builder.send().await.inspect_err(|e| {
            tracing::warn!(error = %e, "request failed before a response arrived");
        })?;

        let status = response.status();
        let latency_ms = started.elapsed().as_millis() as u64;

        if status.is_success() {
            tracing::info!(status = status.as_u16(), latency_ms, "response");
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message)
            .filter(|m| !m.trim().is_empty());

        tracing::warn!(status = status.as_u16(), latency_ms, ?message, "error response");
        Err(ApiError::from_status(status, message))
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let (builder, span) = self.prepare(Method::GET, path);
        let response = Self::send(builder, span).await?;
        Self::decode(response).await
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let (builder, span) = self.prepare(method, path);
        let response = Self::send(builder.json(body), span).await?;
        Self::decode(response).await
    }

    async fn get_bytes(&self, path: &str) -> Result<Vec<u8>, ApiError> {
        let (builder, span) = self.prepare(Method::GET, path);
        let response = Self::send(builder, span).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn send_multipart<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        form: Form,
    ) -> Result<T, ApiError> {
        let (builder, span) = self.prepare(method, path);
        let response = Self::send(builder.multipart(form), span).await?;
        Self::decode(response).await
    }
}

fn json_part<T: Serialize>(value: &T) -> Result<Part, ApiError> {
    let json = serde_json::to_string(value).map_err(|e| ApiError::Decode(e.to_string()))?;
    Ok(Part::text(json).mime_str("application/json")?)
}

fn file_part(attachment: Attachment) -> Result<Part, ApiError> {
    Ok(Part::bytes(attachment.data)
        .file_name(attachment.file_name)
        .mime_str(&attachment.content_type)?)
}

/// parse_token_body
///
/// `POST /login` answers with the bare token, either as plain text or as a JSON
/// string literal depending on the server's message converter.
pub fn parse_token_body(body: &str) -> Result<String, ApiError> {
    let body = body.trim();
    let token = if body.starts_with('"') {
        serde_json::from_str::<String>(body).map_err(|e| ApiError::Decode(e.to_string()))?
    } else {
        body.to_string()
    };

    if token.is_empty() {
        return Err(ApiError::Decode("empty token in login response".to_string()));
    }
    Ok(token)
}

#[async_trait]
impl PlatformApi for HttpPlatformApi {
    async fn login(&self, request: &LoginRequest) -> Result<String, ApiError> {
        let (builder, span) = self.prepare(Method::POST, "/login");
        let response = Self::send(builder.json(request), span).await?;
        let body = response.text().await?;
        parse_token_body(&body)
    }

    async fn register(&self, request: &RegistrationRequest) -> Result<(), ApiError> {
        let (builder, span) = self.prepare(Method::POST, "/register");
        Self::send(builder.json(request), span).await?;
        Ok(())
    }

    async fn organizer(&self, username: &str) -> Result<OrganizerProfile, ApiError> {
        self.get_json(&format!("/organizers/{}", urlencoding::encode(username)))
            .await
    }

    async fn list_funds(&self) -> Result<Vec<Fund>, ApiError> {
        self.get_json("/api/funds").await
    }

    async fn get_fund(&self, id: i64) -> Result<Fund, ApiError> {
        self.get_json(&format!("/api/funds/{id}")).await
    }

    async fn fund_image(&self, id: i64) -> Result<Vec<u8>, ApiError> {
        self.get_bytes(&format!("/api/funds/{id}/image")).await
    }

    async fn my_funds(&self) -> Result<Vec<Fund>, ApiError> {
        self.get_json("/api/funds/my-funds").await
    }

    async fn create_fund(&self, request: &FundRequest, image: Attachment) -> Result<Fund, ApiError> {
        let form = Form::new()
            .part("fundRequest", json_part(request)?)
            .part("imageFile", file_part(image)?);
        self.send_multipart(Method::POST, "/api/funds/create", form)
            .await
    }

    async fn update_fund(
        &self,
        id: i64,
        request: &FundRequest,
        image: Option<Attachment>,
    ) -> Result<Fund, ApiError> {
        let mut form = Form::new().part("request", json_part(request)?);
        if let Some(image) = image {
            form = form.part("imageFile", file_part(image)?);
        }
        self.send_multipart(Method::PUT, &format!("/api/funds/update/{id}"), form)
            .await
    }

    async fn delete_fund(&self, id: i64) -> Result<(), ApiError> {
        let (builder, span) = self.prepare(Method::DELETE, &format!("/api/funds/delete/{id}"));
        Self::send(builder, span).await?;
        Ok(())
    }

    async fn donate(&self, request: &DonationRequest) -> Result<Donation, ApiError> {
        self.send_json(Method::POST, "/api/v1/donations", request).await
    }

    async fn my_donations(&self) -> Result<Vec<Donation>, ApiError> {
        self.get_json("/api/v1/donations/my").await
    }

    async fn fund_donations(&self, fund_id: i64) -> Result<Vec<Donation>, ApiError> {
        self.get_json(&format!("/api/v1/donations/fund/{fund_id}"))
            .await
    }

    async fn apply_volunteer(
        &self,
        fund_id: i64,
        application: &VolunteerApplication,
    ) -> Result<VolunteerRequest, ApiError> {
        self.send_json(
            Method::POST,
            &format!("/api/volunteers/create/{fund_id}"),
            application,
        )
        .await
    }

    async fn my_volunteer_requests(&self) -> Result<Vec<VolunteerRequest>, ApiError> {
        self.get_json("/api/volunteers/my-requests").await
    }

    async fn fund_volunteer_requests(&self, fund_id: i64) -> Result<Vec<VolunteerRequest>, ApiError> {
        self.get_json(&format!("/api/volunteers/fund/{fund_id}"))
            .await
    }

    async fn update_volunteer_status(
        &self,
        request_id: i64,
        status: VolunteerStatus,
    ) -> Result<VolunteerRequest, ApiError> {
        self.send_json(
            Method::PATCH,
            &format!("/api/volunteers/{request_id}/status"),
            &StatusUpdate { status },
        )
        .await
    }

    async fn fund_reports(&self, fund_id: i64) -> Result<Vec<FundReport>, ApiError> {
        self.get_json(&format!("/api/funds/{fund_id}/reports")).await
    }

    async fn create_report(
        &self,
        fund_id: i64,
        request: &FundReportRequest,
        photos: Vec<Attachment>,
    ) -> Result<FundReport, ApiError> {
        let mut form = Form::new().part("request", json_part(request)?);
        for photo in photos {
            form = form.part("photos", file_part(photo)?);
        }
        self.send_multipart(Method::POST, &format!("/api/funds/{fund_id}/reports"), form)
            .await
    }

    async fn report_photo(
        &self,
        fund_id: i64,
        report_id: i64,
        photo_id: i64,
    ) -> Result<Vec<u8>, ApiError> {
        self.get_bytes(&format!(
            "/api/funds/{fund_id}/reports/{report_id}/photos/{photo_id}"
        ))
        .await
    }
}
