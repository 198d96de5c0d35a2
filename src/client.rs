//! Portal client facade.
//!
//! Two types implement the authentication gate at the type level:
//! [`Portal`] is the unauthenticated entry point and only knows how to log
//! in; [`AuthenticatedPortal`] is obtainable solely from a successful
//! [`Portal::login`] and exposes one method per backend endpoint. Calling a
//! gated endpoint without a session is therefore a compile error, not a
//! runtime check.
//!
//! An [`AuthenticatedPortal`] owns exactly one immutable [`Session`].
//! Re-logging in produces a new value instead of mutating shared state, so
//! concurrent calls never observe a half-replaced session.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::{json, Value};

use crate::crypto;
use crate::error::{PortalError, Result};
use crate::session::{field_string, Session};
use crate::transport::{
    ErrorScope, HttpBackend, RequestBody, RequestSpec, ReqwestBackend, Transport,
};
use crate::types::{AttendanceHeader, AttendanceMeta, Captcha, ExamEvent, Registrations, Semester};

/// Default backend host. All endpoints live under this prefix.
const DEFAULT_BASE_URL: &str = "https://webportal.jiit.ac.in:6011/StudentPortalAPI";

/// Module name injected into the phase-two login payload.
const MODULE_NAME: &str = "STUDENTMODULE";

/// Default `User-Agent` sent by the underlying HTTP client.
const DEFAULT_USER_AGENT: &str = concat!("campusgate/", env!("CARGO_PKG_VERSION"));

/// Configuration for the portal client.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// Base URL of the portal API.
    pub base_url: String,
    /// Request timeout applied to the underlying HTTP client.
    pub timeout: Duration,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
}

impl PortalConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the `User-Agent`, e.g. to mimic a browser the portal expects.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Unauthenticated portal client. The only way forward is [`Portal::login`].
pub struct Portal {
    transport: Transport,
}

impl Portal {
    /// Creates a client with the default configuration.
    pub fn new() -> Self {
        Self::with_config(PortalConfig::default())
    }

    /// Creates a client with the given configuration.
    pub fn with_config(config: PortalConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .expect("Failed to create HTTP client");
        let backend = Arc::new(ReqwestBackend::new(client));
        Self {
            transport: Transport::new(backend, config.base_url),
        }
    }

    /// Creates a client over a custom [`HttpBackend`]. Used by tests and by
    /// callers that need to interpose on the raw exchange.
    pub fn with_backend(backend: Arc<dyn HttpBackend>, config: PortalConfig) -> Self {
        Self {
            transport: Transport::new(backend, config.base_url),
        }
    }

    /// Two-phase login.
    ///
    /// Phase one signs `{username, usertype, captcha}` and posts it to the
    /// pretoken endpoint. Phase two takes the returned payload, drops its
    /// `rejectedData`, injects the module name and the plaintext password,
    /// signs it, and posts it to the token-generation endpoint. On success
    /// the session is constructed atomically and a new
    /// [`AuthenticatedPortal`] is returned; any failure in either phase is a
    /// [`PortalError::Login`].
    pub async fn login(
        &self,
        username: &str,
        password: &SecretString,
        captcha: &Captcha,
    ) -> Result<AuthenticatedPortal> {
        tracing::debug!(username, "starting two-phase login");

        let pretoken = self
            .transport
            .call(
                RequestSpec::post(
                    "token/pretoken-check",
                    signed(&json!({
                        "username": username,
                        "usertype": "S",
                        "captcha": captcha,
                    }))?,
                )
                .scope(ErrorScope::Login),
            )
            .await?;

        let mut payload = pretoken;
        if let Some(object) = payload.as_object_mut() {
            object.remove("rejectedData");
            object.insert("Modulename".to_string(), json!(MODULE_NAME));
            object.insert("password".to_string(), json!(password.expose_secret()));
        } else {
            return Err(PortalError::login("pretoken response was not an object"));
        }

        let response = self
            .transport
            .call(
                RequestSpec::post("token/generate-token1", signed(&payload)?)
                    .scope(ErrorScope::Login),
            )
            .await?;

        let session = Session::from_login_response(&response)?;
        tracing::debug!(name = %session.name, "login succeeded");

        Ok(AuthenticatedPortal {
            transport: self.transport.clone(),
            session,
        })
    }
}

impl Default for Portal {
    fn default() -> Self {
        Self::new()
    }
}

/// Authenticated portal client: one immutable session, one method per
/// backend endpoint.
pub struct AuthenticatedPortal {
    transport: Transport,
    session: Session,
}

impl std::fmt::Debug for AuthenticatedPortal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedPortal")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl AuthenticatedPortal {
    /// The session this client operates under.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Attendance metadata: header rows plus the semesters attendance data
    /// exists for, current term first.
    pub async fn attendance_meta(&self) -> Result<AttendanceMeta> {
        let response = self
            .call_plain(
                "StudentClassAttendance/getstudentInforegistrationforattendence",
                json!({
                    "clientid": self.session.client_id,
                    "instituteid": self.session.institute_id,
                    "membertype": self.session.member_type,
                }),
            )
            .await?;
        serde_json::from_value(response)
            .map_err(|e| PortalError::parse(format!("malformed attendance metadata: {e}")))
    }

    /// Per-subject attendance for one semester. The response shape varies by
    /// program, so it is returned raw.
    pub async fn attendance(
        &self,
        header: &AttendanceHeader,
        semester: &Semester,
    ) -> Result<Value> {
        self.call_signed(
            "StudentClassAttendance/getstudentattendancedetail",
            json!({
                "clientid": self.session.client_id,
                "instituteid": self.session.institute_id,
                "registrationcode": semester.registration_code,
                "registrationid": semester.registration_id,
                "stynumber": header.sty_number,
            }),
        )
        .await
    }

    /// Day-by-day attendance for one subject component set.
    pub async fn subject_daily_attendance(
        &self,
        semester: &Semester,
        subject_id: &str,
        subject_code: &str,
        component_ids: &[String],
    ) -> Result<Value> {
        let cmpidkey: Vec<Value> = component_ids
            .iter()
            .map(|id| json!({"subjectcomponentid": id}))
            .collect();
        self.call_signed(
            "StudentClassAttendance/getstudentsubjectpersentage",
            json!({
                "cmpidkey": cmpidkey,
                "clientid": self.session.client_id,
                "instituteid": self.session.institute_id,
                "registrationcode": semester.registration_code,
                "registrationid": semester.registration_id,
                "subjectcode": subject_code,
                "subjectid": subject_id,
            }),
        )
        .await
    }

    /// Semesters the student has subject registrations for.
    pub async fn registered_semesters(&self) -> Result<Vec<Semester>> {
        let response = self
            .call_plain(
                "reqsubfaculty/getregistrationList",
                json!({
                    "instituteid": self.session.institute_id,
                    "studentid": self.session.member_id,
                }),
            )
            .await?;
        extract(&response, "/registrations", "registration list")
    }

    /// Registered subjects and faculties for one semester, with the
    /// aggregate credit total.
    pub async fn registered_subjects(&self, semester: &Semester) -> Result<Registrations> {
        let response = self
            .call_plain(
                "reqsubfaculty/getfaculties",
                json!({
                    "instituteid": self.session.institute_id,
                    "studentid": self.session.member_id,
                    "registrationid": semester.registration_id,
                }),
            )
            .await?;
        serde_json::from_value(response)
            .map_err(|e| PortalError::parse(format!("malformed registrations: {e}")))
    }

    /// Semesters that have exam events.
    pub async fn exam_event_semesters(&self) -> Result<Vec<Semester>> {
        let response = self
            .call_plain(
                "studentcommonsontroller/getsemestercode-exam",
                json!({
                    "instituteid": self.session.institute_id,
                    "studentid": self.session.member_id,
                }),
            )
            .await?;
        extract(
            &response,
            "/semesterCodeinfo/semestercode",
            "exam semester list",
        )
    }

    /// Exam events scheduled in one semester.
    pub async fn exam_events(&self, semester: &Semester) -> Result<Vec<ExamEvent>> {
        let response = self
            .call_plain(
                "studentsexamview/getstudent-examevents",
                json!({
                    "instituteid": self.session.institute_id,
                    "registrationid": semester.registration_id,
                }),
            )
            .await?;
        extract(&response, "/eventcode/exameventcode", "exam event list")
    }

    /// Venue/seat schedule for one exam event. Returned raw.
    pub async fn exam_schedule(&self, event: &ExamEvent) -> Result<Value> {
        self.call_plain(
            "studentsexamview/getstudent-exameventshedule",
            json!({
                "instituteid": self.session.institute_id,
                "registrationid": event.registration_id,
                "exameventid": event.exam_event_id,
            }),
        )
        .await
    }

    /// Semesters that have published marks.
    pub async fn marks_semesters(&self) -> Result<Vec<Semester>> {
        let response = self
            .call_plain(
                "studentsexamview/getsemestercode-withstudentexamshedule",
                json!({
                    "instituteid": self.session.institute_id,
                    "studentid": self.session.member_id,
                }),
            )
            .await?;
        extract(
            &response,
            "/semesterCodeinfo/semestercode",
            "marks semester list",
        )
    }

    /// Downloads the marks PDF for one semester and writes it to `dest`.
    ///
    /// This is the one binary GET endpoint. Success is "completed without an
    /// error"; there is no parsed return value.
    pub async fn download_marks(&self, semester: &Semester, dest: &Path) -> Result<()> {
        let path = format!(
            "studentsexamview/printstudent-exammarks/{}/{}/{}",
            self.session.institute_id, semester.registration_id, semester.registration_code,
        );
        let bytes = self.transport.download(&path, &self.session).await?;
        tokio::fs::write(dest, bytes)
            .await
            .map_err(|e| PortalError::Io(e.to_string()))
    }

    /// Semesters that have a grade card.
    pub async fn grade_card_semesters(&self) -> Result<Vec<Semester>> {
        let response = self
            .call_plain(
                "studentgradecard/getregistrationList",
                json!({
                    "instituteid": self.session.institute_id,
                    "studentid": self.session.member_id,
                }),
            )
            .await?;
        extract(&response, "/registrations", "grade card semester list")
    }

    /// Grade card for one semester. Resolves the program id first; the
    /// prerequisite call is re-issued on every invocation, never cached.
    pub async fn grade_card(&self, semester: &Semester) -> Result<Value> {
        let program_id = self.program_id().await?;
        self.call_plain(
            "studentgradecard/showstudentgradecard",
            json!({
                "instituteid": self.session.institute_id,
                "studentid": self.session.member_id,
                "programid": program_id,
                "registrationid": semester.registration_id,
            }),
        )
        .await
    }

    /// SGPA/CGPA table across all semesters. Resolves the current semester
    /// number first; the prerequisite call is re-issued on every invocation.
    pub async fn sgpa_cgpa(&self) -> Result<Value> {
        let semester_number = self.current_semester_number().await?;
        self.call_plain(
            "studentsgpacgpa/getallsemesterdata",
            json!({
                "instituteid": self.session.institute_id,
                "studentid": self.session.member_id,
                "stynumber": semester_number,
            }),
        )
        .await
    }

    /// Fee payments recorded for one semester. Returned raw.
    pub async fn paid_fee_details(&self, semester: &Semester) -> Result<Value> {
        self.call_plain(
            "feewebapp/getstudentfeedpaiddetail",
            json!({
                "instituteid": self.session.institute_id,
                "studentid": self.session.member_id,
                "registrationid": semester.registration_id,
            }),
        )
        .await
    }

    /// Fee receipt details for one semester. Fails with
    /// [`PortalError::NoData`] (`NoApprovedRequest`) when no approved fee
    /// request exists.
    pub async fn fee_receipt(&self, semester: &Semester) -> Result<Value> {
        self.call_plain(
            "feewebapp/getfeereceiptdetail",
            json!({
                "instituteid": self.session.institute_id,
                "studentid": self.session.member_id,
                "registrationid": semester.registration_id,
            }),
        )
        .await
    }

    /// Changes the account password. Failures map to
    /// [`PortalError::Account`].
    pub async fn change_password(
        &self,
        old_password: &SecretString,
        new_password: &SecretString,
    ) -> Result<()> {
        let payload = json!({
            "clientid": self.session.client_id,
            "instituteid": self.session.institute_id,
            "memberid": self.session.member_id,
            "membertype": self.session.member_type,
            "oldpassword": old_password.expose_secret(),
            "newpassword": new_password.expose_secret(),
            "confirmpassword": new_password.expose_secret(),
        });
        self.transport
            .call(
                RequestSpec::post("clxuser/changepassword", signed(&payload)?)
                    .scope(ErrorScope::Account)
                    .session(&self.session),
            )
            .await?;
        Ok(())
    }

    /// Prerequisite: resolve the program id for grade card requests.
    async fn program_id(&self) -> Result<String> {
        let response = self
            .call_plain(
                "studentgradecard/getstudentinfo",
                json!({
                    "instituteid": self.session.institute_id,
                    "studentid": self.session.member_id,
                }),
            )
            .await?;
        field_string(&response, "programid")
    }

    /// Prerequisite: resolve the current semester number for SGPA/CGPA
    /// requests.
    async fn current_semester_number(&self) -> Result<String> {
        let response = self
            .call_plain(
                "studentsgpacgpa/checkIfstudentmasterexist",
                json!({
                    "instituteid": self.session.institute_id,
                    "studentid": self.session.member_id,
                    "name": self.session.name,
                }),
            )
            .await?;
        let lov = response
            .get("studentlov")
            .ok_or_else(|| PortalError::parse("student master response missing 'studentlov'"))?;
        field_string(lov, "currentsemester")
    }

    async fn call_plain(&self, path: &str, payload: Value) -> Result<Value> {
        self.transport
            .call(RequestSpec::post(path, RequestBody::Json(payload)).session(&self.session))
            .await
    }

    async fn call_signed(&self, path: &str, payload: Value) -> Result<Value> {
        self.transport
            .call(RequestSpec::post(path, signed(&payload)?).session(&self.session))
            .await
    }
}

/// Signs a payload for the endpoints that require an encrypted body.
fn signed<T: Serialize>(payload: &T) -> Result<RequestBody> {
    Ok(RequestBody::Signed(crypto::serialize_payload(
        crypto::today(),
        payload,
    )?))
}

/// Extracts and deserializes a field of the unwrapped response.
fn extract<T: serde::de::DeserializeOwned>(value: &Value, pointer: &str, what: &str) -> Result<T> {
    let field = value
        .pointer(pointer)
        .cloned()
        .ok_or_else(|| PortalError::parse(format!("response missing {what}")))?;
    serde_json::from_value(field)
        .map_err(|e| PortalError::parse(format!("malformed {what}: {e}")))
}
