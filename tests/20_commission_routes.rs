mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;

use remco_cms::auth::{generate_jwt, Claims};
use remco_cms::config::SecurityConfig;
use remco_cms::services::BackendCall;
use remco_cms::types::TierType;

use common::{form_request, json_body, open_security, test_app};

fn location(response: &axum::response::Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[tokio::test]
async fn valid_form_saves_and_redirects_to_page() {
    let (app, backend) = test_app(open_security());

    let response = app
        .oneshot(form_request(
            "/commission/remittance",
            &[
                ("csrf_token", "ignored"),
                ("DigitalTransaction[rmtWUotb]", "DIGITAL"),
                ("DigitalTierType[rmtWUotb]", "FIXED"),
                ("DigitalAmount[rmtWUotb]", "2.50"),
                ("DigitalStartDate[rmtWUotb]", "2024-01-01"),
                ("DigitalEndDate[rmtWUotb]", "2024-12-31"),
            ],
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/commission/remittance");

    let commissions = backend.commissions().await;
    assert_eq!(commissions.len(), 1);
    assert_eq!(commissions[0].partner, "WU");
    assert_eq!(commissions[0].amount, "2.50");
}

#[tokio::test]
async fn overlapping_tiers_are_rejected_before_any_write() {
    let (app, backend) = test_app(open_security());

    let response = app
        .oneshot(form_request(
            "/api/commission/remittance",
            &[
                ("OtcTransaction[rmtMGinb]", "OTC"),
                ("OtcTierType[rmtMGinb]", "TIERAMOUNT"),
                ("OtcTierCount[rmtMGinb]", "2"),
                ("OtcTierMin[rmtMGinb][0]", "0"),
                ("OtcTierMax[rmtMGinb][0]", "100"),
                ("OtcTierFee[rmtMGinb][0]", "5"),
                ("OtcTierMin[rmtMGinb][1]", "50"),
                ("OtcTierMax[rmtMGinb][1]", "200"),
                ("OtcTierFee[rmtMGinb][1]", "7"),
            ],
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["field_errors"]["rmtMGinb/OTC"].is_string());
    assert!(backend.write_calls().await.is_empty());
}

#[tokio::test]
async fn api_submission_reports_every_cell() {
    let (app, backend) = test_app(open_security());
    backend.fail_writes_for("MG").await;

    let response = app
        .oneshot(form_request(
            "/api/commission/remittance",
            &[
                ("DigitalTransaction[rmtWUotb]", "DIGITAL"),
                ("DigitalTierType[rmtWUotb]", "TIERPERCENTAGE"),
                ("DigitalTierCount[rmtWUotb]", "2"),
                ("DigitalTierMin[rmtWUotb][0]", "0"),
                ("DigitalTierMax[rmtWUotb][0]", "50"),
                ("DigitalTierFee[rmtWUotb][0]", "1.0"),
                ("DigitalTierMin[rmtWUotb][1]", "50"),
                ("DigitalTierMax[rmtWUotb][1]", "100"),
                ("DigitalTierFee[rmtWUotb][1]", "2.0"),
            ],
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let report = &body["data"];
    assert_eq!(report["succeeded"]["rmtWUotb/DIGITAL"]["outcome"], "created");
    assert_eq!(report["succeeded"]["rmtWUotb/DIGITAL"]["tiers"], 2);
    // MG deselected on every channel, but its deletes fail
    assert_eq!(report["failed"].as_object().map(|m| m.len()), Some(4));

    let commission = &backend.commissions().await[0];
    assert_eq!(commission.tier_type, TierType::TierPercentage);
    assert_eq!(commission.amount, "");
    assert_eq!(backend.tiers_of(&commission.id).await.len(), 2);
}

#[tokio::test]
async fn partial_failure_redirects_naming_partners() {
    let (app, backend) = test_app(open_security());
    backend.fail_writes_for("MG").await;

    let response = app
        .oneshot(form_request("/commission/remittance", &[], None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = location(&response);
    assert!(location.starts_with("/commission/remittance?errmsg="));
    assert!(location.contains("MG"));
    assert!(!location.contains("WU"));
}

#[tokio::test]
async fn missing_tier_delete_redirects_with_errmsg() {
    let (app, backend) = test_app(open_security());

    let response = app
        .oneshot(
            Request::post("/commission/remittance/tier/pct-99/delete")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).contains("errmsg="));
    assert_eq!(
        backend.calls().await,
        vec![BackendCall::DeletePartnerCommissionTierById("pct-99".to_string())]
    );
}

#[tokio::test]
async fn sync_is_accepted_and_runs_in_background() {
    let (app, backend) = test_app(open_security());

    let response = app
        .oneshot(
            Request::post("/api/commission/remittance/sync")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    for _ in 0..50 {
        if backend.calls().await.contains(&BackendCall::SyncRemcoCommissionConfigForRemittance) {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("sync never reached the backend");
}

#[tokio::test]
async fn required_auth_rejects_anonymous_requests() {
    let (app, backend) = test_app(SecurityConfig {
        require_auth: true,
        jwt_secret: "test-secret".to_string(),
        cors_origins: Vec::new(),
    });

    let response = app
        .oneshot(Request::get("/commission/remittance").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(backend.calls().await.is_empty());
}

#[tokio::test]
async fn token_user_is_recorded_as_creator() {
    let secret = "test-secret";
    let (app, backend) = test_app(SecurityConfig {
        require_auth: true,
        jwt_secret: secret.to_string(),
        cors_origins: Vec::new(),
    });
    let token = generate_jwt(&Claims::new("u-7", Some("jdoe".to_string()), 1), secret).unwrap();

    let response = app
        .oneshot(form_request(
            "/api/commission/remittance",
            &[
                ("OtcTransaction[rmtWUinb]", "OTC"),
                ("OtcTierType[rmtWUinb]", "PERCENTAGE"),
                ("OtcAmount[rmtWUinb]", "1.5"),
            ],
            Some(&token),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(backend.commissions().await[0].created_by, "jdoe");
}
