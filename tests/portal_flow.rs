//! Integration tests for the portal client.
//!
//! These drive the full pipeline (login, endpoint methods, outcome
//! classification) through a scripted `HttpBackend`, so no network is
//! involved. Fixtures mirror the backend's response envelope.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{TimeZone, Utc};
use secrecy::SecretString;
use serde_json::{json, Value};

use campusgate::transport::{BackendError, BackendRequest, BackendResponse, HttpBackend};
use campusgate::types::{Captcha, Semester};
use campusgate::{AuthenticatedPortal, NoDataKind, Portal, PortalConfig, PortalError};

// =============================================================================
// Test Infrastructure
// =============================================================================

/// Scripted backend: hands out canned replies in order and records every
/// request it sees.
struct ScriptedBackend {
    replies: Mutex<Vec<Result<BackendResponse, BackendError>>>,
    requests: Mutex<Vec<BackendRequest>>,
}

impl ScriptedBackend {
    fn new(replies: Vec<Result<BackendResponse, BackendError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<BackendRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpBackend for ScriptedBackend {
    async fn execute(&self, request: BackendRequest) -> Result<BackendResponse, BackendError> {
        self.requests.lock().unwrap().push(request);
        self.replies.lock().unwrap().remove(0)
    }
}

fn portal(backend: Arc<ScriptedBackend>) -> Portal {
    Portal::with_backend(
        backend,
        PortalConfig::new().with_base_url("https://portal.test/api"),
    )
}

fn success(response: Value) -> Result<BackendResponse, BackendError> {
    Ok(BackendResponse::new(
        200,
        serde_json::to_vec(&json!({
            "status": {"responseStatus": "Success"},
            "response": response,
        }))
        .unwrap(),
    ))
}

fn failure(status: Value) -> Result<BackendResponse, BackendError> {
    Ok(BackendResponse::new(
        200,
        serde_json::to_vec(&json!({"status": status})).unwrap(),
    ))
}

/// Unsigned JWT fixture; the client reads `exp` without verifying.
const FIXTURE_EXP: i64 = 1_893_456_000;

fn fixture_jwt() -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let claims =
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&json!({"exp": FIXTURE_EXP})).unwrap());
    let signature = URL_SAFE_NO_PAD.encode(b"unverified");
    format!("{header}.{claims}.{signature}")
}

fn pretoken_response() -> Value {
    json!({
        "otpflag": "N",
        "rejectedData": {"reason": "none"},
        "username": "21103001",
    })
}

fn token_response() -> Value {
    json!({
        "regdata": {
            "institutelist": [{"label": "Institute of Engineering", "value": "INST01"}],
            "memberid": "MEM123",
            "userid": "USR456",
            "clientid": "WEBPORTAL",
            "membertype": "S",
            "name": "Test Student",
            "enrollmentno": "21103001",
            "token": fixture_jwt(),
        }
    })
}

/// Logs in against fixture replies, with `extra` queued behind them.
async fn login_with(
    extra: Vec<Result<BackendResponse, BackendError>>,
) -> (AuthenticatedPortal, Arc<ScriptedBackend>) {
    let mut replies = vec![success(pretoken_response()), success(token_response())];
    replies.extend(extra);
    let backend = ScriptedBackend::new(replies);
    let authed = portal(backend.clone())
        .login(
            "21103001",
            &SecretString::new("hunter2".into()),
            &Captcha::bypass(),
        )
        .await
        .expect("fixture login should succeed");
    (authed, backend)
}

fn semester() -> Semester {
    serde_json::from_value(json!({
        "registrationcode": "2024ODDSEM",
        "registrationid": "REG3",
    }))
    .unwrap()
}

// =============================================================================
// Login
// =============================================================================

#[tokio::test]
async fn login_builds_session_from_fixture_responses() {
    let (authed, backend) = login_with(vec![]).await;
    let session = authed.session();

    assert_eq!(session.institute_id, "INST01");
    assert_eq!(session.member_id, "MEM123");
    assert_eq!(session.client_id, "WEBPORTAL");
    assert_eq!(session.name, "Test Student");
    assert_eq!(session.expiry, Utc.timestamp_opt(FIXTURE_EXP, 0).unwrap());

    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(
        requests[0].url,
        "https://portal.test/api/token/pretoken-check"
    );
    assert_eq!(
        requests[1].url,
        "https://portal.test/api/token/generate-token1"
    );
    for request in &requests {
        // Login runs unauthenticated but still carries a LocalName.
        assert!(request.header("LocalName").is_some());
        assert!(request.header("Authorization").is_none());
        assert_eq!(request.header("Content-Type"), Some("application/json"));
        // The signed body is a single JSON string.
        let body = request.body.as_ref().unwrap();
        assert_eq!(body.first(), Some(&b'"'));
    }
}

#[tokio::test]
async fn login_failure_in_phase_one_is_a_login_error() {
    let backend = ScriptedBackend::new(vec![failure(
        json!({"responseStatus": "Failure", "message": "Invalid Username"}),
    )]);
    let err = portal(backend)
        .login(
            "nobody",
            &SecretString::new("wrong".into()),
            &Captcha::bypass(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PortalError::Login(_)));
    assert!(err.to_string().contains("Invalid Username"));
}

#[tokio::test]
async fn login_against_unavailable_backend_mentions_it() {
    let backend = ScriptedBackend::new(vec![Ok(BackendResponse::new(513, Vec::new()))]);
    let err = portal(backend)
        .login(
            "21103001",
            &SecretString::new("hunter2".into()),
            &Captcha::bypass(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PortalError::Login(_)));
    assert!(err.to_string().contains("temporarily unavailable"));
}

#[tokio::test]
async fn login_network_failure_mentions_connectivity() {
    let backend = ScriptedBackend::new(vec![Err(BackendError::Connect("dns failure".into()))]);
    let err = portal(backend)
        .login(
            "21103001",
            &SecretString::new("hunter2".into()),
            &Captcha::bypass(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PortalError::Login(_)));
    assert!(err.to_string().contains("check your connection"));
}

// =============================================================================
// Classification on authenticated calls
// =============================================================================

#[tokio::test]
async fn no_attendance_found_maps_to_structured_no_data() {
    let (authed, _) = login_with(vec![failure(
        json!({"responseStatus": "Failure", "message": "NO Attendance Found"}),
    )])
    .await;

    let header = serde_json::from_value(json!({
        "branchdesc": "CSE",
        "name": "Test Student",
        "programdesc": "B.Tech",
        "stynumber": "2",
    }))
    .unwrap();

    let err = authed.attendance(&header, &semester()).await.unwrap_err();
    match &err {
        PortalError::NoData { kind, .. } => assert_eq!(*kind, NoDataKind::NoDataForPeriod),
        other => panic!("expected NoData, got {other:?}"),
    }
    assert!(err.to_string().contains("NO Attendance Found"));
}

#[tokio::test]
async fn fee_receipt_without_approved_request_is_structured() {
    let (authed, _) = login_with(vec![failure(
        json!({"responseStatus": "Failure", "message": "No Approved Request Found"}),
    )])
    .await;

    let err = authed.fee_receipt(&semester()).await.unwrap_err();
    match err {
        PortalError::NoData { kind, .. } => assert_eq!(kind, NoDataKind::NoApprovedRequest),
        other => panic!("expected NoData, got {other:?}"),
    }
}

#[tokio::test]
async fn http_401_surfaces_as_session_expired() {
    let (authed, _) = login_with(vec![Ok(BackendResponse::new(401, Vec::new()))]).await;
    let err = authed.registered_semesters().await.unwrap_err();
    assert!(matches!(err, PortalError::SessionExpired));
}

#[tokio::test]
async fn http_513_surfaces_as_unavailable() {
    let (authed, _) = login_with(vec![Ok(BackendResponse::new(513, Vec::new()))]).await;
    let err = authed.registered_semesters().await.unwrap_err();
    assert!(matches!(err, PortalError::Unavailable));
    assert!(err.to_string().contains("temporarily unavailable"));
}

#[tokio::test]
async fn authenticated_calls_attach_bearer_and_fresh_local_name() {
    let (authed, backend) = login_with(vec![
        success(json!({"registrations": []})),
        success(json!({"registrations": []})),
    ])
    .await;

    authed.registered_semesters().await.unwrap();
    authed.registered_semesters().await.unwrap();

    let requests = backend.requests();
    let bearer = format!("Bearer {}", authed.session().token);
    assert_eq!(requests[2].header("Authorization"), Some(bearer.as_str()));
    assert_eq!(requests[3].header("Authorization"), Some(bearer.as_str()));
    // LocalName is regenerated per request, never reused.
    assert_ne!(
        requests[2].header("LocalName"),
        requests[3].header("LocalName")
    );
}

#[tokio::test]
async fn signed_endpoints_send_string_bodies_and_plain_endpoints_send_objects() {
    let (authed, backend) = login_with(vec![
        success(json!({"studentattendancelist": []})),
        success(json!({"registrations": []})),
        success(json!({})),
    ])
    .await;

    let header = serde_json::from_value(json!({
        "branchdesc": "CSE",
        "name": "Test Student",
        "programdesc": "B.Tech",
        "stynumber": "2",
    }))
    .unwrap();

    authed.attendance(&header, &semester()).await.unwrap();
    authed.registered_semesters().await.unwrap();
    authed
        .change_password(
            &SecretString::new("old".into()),
            &SecretString::new("new".into()),
        )
        .await
        .unwrap();

    let requests = backend.requests();

    // Attendance detail is encrypted: the body is one JSON string.
    let attendance_body = requests[2].body.as_ref().unwrap();
    assert_eq!(attendance_body.first(), Some(&b'"'));

    // The registration list is not: the payload travels as a plain object.
    let listing_body = requests[3].body.as_ref().unwrap();
    assert_eq!(listing_body.first(), Some(&b'{'));
    let payload: Value = serde_json::from_slice(listing_body).unwrap();
    assert_eq!(payload["studentid"], "MEM123");

    // Password change carries credentials, so it is encrypted too.
    let password_body = requests[4].body.as_ref().unwrap();
    assert_eq!(password_body.first(), Some(&b'"'));
}

// =============================================================================
// Endpoint parsing
// =============================================================================

#[tokio::test]
async fn attendance_meta_exposes_every_semester_and_latest_is_first() {
    let (authed, _) = login_with(vec![success(json!({
        "headerlist": [{
            "branchdesc": "CSE",
            "name": "Test Student",
            "programdesc": "B.Tech",
            "stynumber": "2",
        }],
        "semlist": [
            {"registrationcode": "2024ODDSEM", "registrationid": "REG3"},
            {"registrationcode": "2024EVESEM", "registrationid": "REG2"},
            {"registrationcode": "2023ODDSEM", "registrationid": "REG1"},
            {"registrationcode": "2023EVESEM", "registrationid": "REG0"},
        ],
    }))])
    .await;

    let meta = authed.attendance_meta().await.unwrap();
    assert_eq!(meta.semesters.len(), 4);
    assert_eq!(
        meta.latest_semester().unwrap().registration_code,
        "2024ODDSEM"
    );
}

#[tokio::test]
async fn exam_events_parse_from_nested_response() {
    let (authed, _) = login_with(vec![success(json!({
        "eventcode": {
            "exameventcode": [{
                "exameventcode": "T1",
                "eventfrom": "2024-09-20",
                "exameventdesc": "Test 1",
                "registrationid": "REG3",
                "exameventid": "EV42",
            }],
        },
    }))])
    .await;

    let events = authed.exam_events(&semester()).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].exam_event_code, "T1");
}

#[tokio::test]
async fn grade_card_reissues_its_prerequisite_on_every_call() {
    let (authed, backend) = login_with(vec![
        success(json!({"programid": "PROG7"})),
        success(json!({"gradecard": []})),
        success(json!({"programid": "PROG7"})),
        success(json!({"gradecard": []})),
    ])
    .await;

    authed.grade_card(&semester()).await.unwrap();
    authed.grade_card(&semester()).await.unwrap();

    let paths: Vec<String> = backend.requests()[2..]
        .iter()
        .map(|r| r.url.clone())
        .collect();
    assert_eq!(
        paths,
        vec![
            "https://portal.test/api/studentgradecard/getstudentinfo",
            "https://portal.test/api/studentgradecard/showstudentgradecard",
            "https://portal.test/api/studentgradecard/getstudentinfo",
            "https://portal.test/api/studentgradecard/showstudentgradecard",
        ]
    );
}

#[tokio::test]
async fn sgpa_cgpa_resolves_semester_number_first() {
    let (authed, backend) = login_with(vec![
        success(json!({"studentlov": {"currentsemester": 4}})),
        success(json!({"semesterList": []})),
    ])
    .await;

    authed.sgpa_cgpa().await.unwrap();

    let requests = backend.requests();
    assert!(requests[2]
        .url
        .ends_with("studentsgpacgpa/checkIfstudentmasterexist"));
    assert!(requests[3].url.ends_with("studentsgpacgpa/getallsemesterdata"));
}

#[tokio::test]
async fn download_marks_persists_the_binary_response() {
    let pdf = b"%PDF-1.4 fixture bytes".to_vec();
    let (authed, backend) =
        login_with(vec![Ok(BackendResponse::new(200, pdf.clone()))]).await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("marks.pdf");
    authed.download_marks(&semester(), &dest).await.unwrap();

    assert_eq!(std::fs::read(&dest).unwrap(), pdf);

    let requests = backend.requests();
    let download = &requests[2];
    assert_eq!(download.method, reqwest::Method::GET);
    assert!(download.url.contains("printstudent-exammarks/INST01/REG3/2024ODDSEM"));
    assert!(download.header("Authorization").is_some());
    assert_eq!(download.header("Accept"), Some("application/pdf"));
    assert!(download.body.is_none());
}

#[tokio::test]
async fn change_password_failure_is_an_account_error() {
    let (authed, _) = login_with(vec![failure(
        json!({"responseStatus": "Failure", "message": "Old password incorrect"}),
    )])
    .await;

    let err = authed
        .change_password(
            &SecretString::new("old".into()),
            &SecretString::new("new".into()),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PortalError::Account(_)));
    assert!(err.to_string().contains("Old password incorrect"));
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn concurrent_calls_race_independently() {
    let (authed, backend) = login_with(vec![
        success(json!({"registrations": []})),
        success(json!({"registrations": []})),
    ])
    .await;

    let (first, second) = tokio::join!(
        authed.registered_semesters(),
        authed.registered_semesters()
    );
    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(backend.requests().len(), 4);
}
