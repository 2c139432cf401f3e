//! Role- and ownership-gated actions.
//!
//! Every view decides what to offer through `can_perform`/`fragment`. These checks
//! only shape the UI: the server enforces the same rules on each request, and a
//! session's role here comes from an unverified token read.

use crate::{
    auth::Session,
    models::{Fund, OrganizerProfile, Role},
};

/// Something that belongs to an account, identified by its username.
pub trait Owned {
    fn owner_username(&self) -> &str;
}

impl Owned for Fund {
    fn owner_username(&self) -> &str {
        &self.username
    }
}

impl Owned for OrganizerProfile {
    fn owner_username(&self) -> &str {
        &self.username
    }
}

/// Resource
///
/// The ownership side of a check: either a concrete owner or no resource at all
/// (page-level actions such as creating a fund).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resource<'a> {
    owner: Option<&'a str>,
}

impl<'a> Resource<'a> {
    pub const NONE: Resource<'static> = Resource { owner: None };

    pub fn owned_by(owner: &'a str) -> Self {
        Self { owner: Some(owner) }
    }

    pub fn owner(&self) -> Option<&'a str> {
        self.owner
    }
}

impl<'a, T: Owned> From<&'a T> for Resource<'a> {
    fn from(resource: &'a T) -> Self {
        Resource::owned_by(resource.owner_username())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    // Ownership-gated: ADMIN on anything, OWNER on their own resources.
    DeleteFund,
    EditFund,
    ViewVolunteerRequests,
    ReviewVolunteerRequest,
    CreateReport,
    ViewDonations,
    // Role-gated.
    Donate,
    ApplyAsVolunteer,
    CreateFund,
    ViewOwnFunds,
    ViewDonationHistory,
    ViewOwnVolunteerRequests,
}

impl Action {
    pub const OWNERSHIP_GATED: [Action; 6] = [
        Action::DeleteFund,
        Action::EditFund,
        Action::ViewVolunteerRequests,
        Action::ReviewVolunteerRequest,
        Action::CreateReport,
        Action::ViewDonations,
    ];

    pub fn is_ownership_gated(&self) -> bool {
        Self::OWNERSHIP_GATED.contains(self)
    }

    fn permitted_roles(&self) -> &'static [Role] {
        match self {
            Action::Donate | Action::ViewDonationHistory => &[Role::Donor],
            Action::ApplyAsVolunteer | Action::ViewOwnVolunteerRequests => &[Role::Volunteer],
            Action::CreateFund | Action::ViewOwnFunds => &[Role::Admin, Role::Owner],
            _ => &[],
        }
    }

    /// Actions whose fragment invites anonymous visitors to sign in instead of
    /// disappearing.
    pub fn prompts_login(&self) -> bool {
        matches!(self, Action::Donate | Action::ApplyAsVolunteer)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Action::DeleteFund => "Удалить фонд",
            Action::EditFund => "Редактировать фонд",
            Action::ViewVolunteerRequests => "Заявки волонтеров",
            Action::ReviewVolunteerRequest => "Рассмотреть заявку",
            Action::CreateReport => "Создать отчет",
            Action::ViewDonations => "Пожертвования",
            Action::Donate => "Пожертвовать",
            Action::ApplyAsVolunteer => "Стать волонтером",
            Action::CreateFund => "Создать фонд",
            Action::ViewOwnFunds => "Мои фонды",
            Action::ViewDonationHistory => "История пожертвований",
            Action::ViewOwnVolunteerRequests => "Мои заявки",
        }
    }

    pub fn login_prompt_label(&self) -> Option<&'static str> {
        match self {
            Action::Donate => Some("Войти для пожертвования"),
            Action::ApplyAsVolunteer => Some("Войти для волонтерства"),
            _ => None,
        }
    }
}

/// can_perform
///
/// The one predicate behind every gated fragment.
///
/// Ownership-gated actions: `ADMIN` always; `OWNER` only when the resource's owner
/// equals the session's username; any other role never. Role-gated actions ignore the
/// resource. Anonymous or role-less sessions are denied everything.
pub fn can_perform<'a>(action: Action, session: &Session, resource: impl Into<Resource<'a>>) -> bool {
    if !session.is_authenticated() {
        return false;
    }
    let Some(role) = session.role() else {
        return false;
    };

    if action.is_ownership_gated() {
        return match role {
            Role::Admin => true,
            Role::Owner => {
                let resource = resource.into();
                matches!(
                    (resource.owner(), session.username()),
                    (Some(owner), Some(username)) if owner == username
                )
            }
            Role::Volunteer | Role::Donor => false,
        };
    }

    action.permitted_roles().contains(&role)
}

/// Fragment
///
/// How a gated control renders. Denied controls are never shown disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fragment {
    Show,
    /// Call-to-action sending an anonymous visitor to the login view.
    LoginPrompt,
    Hidden,
}

pub fn fragment<'a>(action: Action, session: &Session, resource: impl Into<Resource<'a>>) -> Fragment {
    if can_perform(action, session, resource) {
        Fragment::Show
    } else if action.prompts_login() && !session.is_loading() && !session.is_authenticated() {
        Fragment::LoginPrompt
    } else {
        Fragment::Hidden
    }
}
