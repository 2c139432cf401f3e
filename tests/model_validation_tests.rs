use dobro_portal::models::{
    Donation, DonationStatus, Fund, FundStatus, RegistrationRequest, Role, VolunteerStatus,
};
use serde_json::json;

#[test]
fn test_role_wire_format() {
    for role in Role::ALL {
        let json = serde_json::to_value(role).unwrap();
        assert_eq!(json, json!(role.as_str()));
        assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
    }
    assert!("owner".parse::<Role>().is_err());
    assert!("".parse::<Role>().is_err());
}

#[test]
fn test_fund_from_platform_json() {
    let fund: Fund = serde_json::from_value(json!({
        "id": 4,
        "title": "Приют «Лапа»",
        "description": null,
        "targetAmount": 50000,
        "currentAmount": 12500.5,
        "startDate": "2025-01-10",
        "endDate": "2025-06-01",
        "ownerUsername": "Ольга",
        "username": "olga",
        "category": "animals",
        "imageName": "cover.png",
        "imageType": "image/png",
        "status": "COMPLETED"
    }))
    .unwrap();

    assert_eq!(fund.username, "olga");
    assert_eq!(fund.organizer_name(), "Ольга");
    assert_eq!(fund.status, FundStatus::Completed);
    assert_eq!(fund.progress_percent(), 25);
    assert_eq!(fund.end_date.unwrap().to_string(), "2025-06-01");
}

#[test]
fn test_fund_minimal_json_uses_defaults() {
    let fund: Fund = serde_json::from_value(json!({
        "id": 1,
        "title": "t",
        "targetAmount": 100,
        "username": "petr"
    }))
    .unwrap();

    assert_eq!(fund.status, FundStatus::Active);
    assert_eq!(fund.current_amount, 0.0);
    assert_eq!(fund.organizer_name(), "petr");
}

#[test]
fn test_progress_is_capped_and_safe() {
    let mut fund = Fund {
        target_amount: 1000.0,
        current_amount: 2500.0,
        ..Fund::default()
    };
    assert_eq!(fund.progress_percent(), 100);

    fund.target_amount = 0.0;
    assert_eq!(fund.progress_percent(), 0);

    fund.target_amount = 3.0;
    fund.current_amount = 2.0;
    assert_eq!(fund.progress_percent(), 67);
}

#[test]
fn test_donation_status_accepts_both_spellings() {
    let base = json!({
        "id": 1,
        "amount": 500,
        "createdAt": "2025-03-01T10:15:30",
        "status": "CANCELLED"
    });
    let donation: Donation = serde_json::from_value(base).unwrap();
    assert_eq!(donation.status, DonationStatus::Canceled);

    let donation: Donation = serde_json::from_value(json!({
        "id": 2,
        "amount": 500,
        "createdAt": "2025-03-01T10:15:30.123",
        "status": "CANCELED"
    }))
    .unwrap();
    assert_eq!(donation.status, DonationStatus::Canceled);
}

#[test]
fn test_registration_omits_missing_display_name() {
    let request = RegistrationRequest {
        username: "vera".to_string(),
        display_name: None,
        password: "pw".to_string(),
        role: Role::Volunteer,
    };
    let json = serde_json::to_value(&request).unwrap();

    assert_eq!(json, json!({"username": "vera", "password": "pw", "role": "VOLUNTEER"}));
}

#[test]
fn test_volunteer_status_wire_format() {
    assert_eq!(serde_json::to_value(VolunteerStatus::Accepted).unwrap(), json!("ACCEPTED"));
    assert_eq!(
        serde_json::from_value::<VolunteerStatus>(json!("REJECTED")).unwrap(),
        VolunteerStatus::Rejected
    );
}
