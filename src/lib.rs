//! Campusgate - typed async client for the university student web portal API.
//!
//! Signs and encrypts requests with the portal's day-rotating AES-128-CBC
//! scheme, performs the two-phase login, and exposes typed operations for
//! attendance, grades, exams, subjects, and fees over HTTPS.
//!
//! # Authentication
//!
//! The portal gate is enforced at the type level: [`Portal`] only knows how
//! to log in, and every data endpoint lives on [`AuthenticatedPortal`], which
//! is obtainable solely from a successful [`Portal::login`].
//!
//! ```ignore
//! use campusgate::{Portal, types::Captcha};
//! use secrecy::SecretString;
//!
//! let portal = Portal::new();
//! let password = SecretString::new("password".into());
//! let authed = portal.login("21103001", &password, &Captcha::bypass()).await?;
//!
//! let meta = authed.attendance_meta().await?;
//! if let (Some(header), Some(semester)) = (meta.latest_header(), meta.latest_semester()) {
//!     let report = authed.attendance(header, semester).await?;
//! }
//! ```
//!
//! # Endpoint mapping
//!
//! | Method | Portal endpoint |
//! |---|---|
//! | [`AuthenticatedPortal::attendance_meta`] | `StudentClassAttendance/getstudentInforegistrationforattendence` |
//! | [`AuthenticatedPortal::attendance`] | `StudentClassAttendance/getstudentattendancedetail` |
//! | [`AuthenticatedPortal::subject_daily_attendance`] | `StudentClassAttendance/getstudentsubjectpersentage` |
//! | [`AuthenticatedPortal::registered_semesters`] | `reqsubfaculty/getregistrationList` |
//! | [`AuthenticatedPortal::registered_subjects`] | `reqsubfaculty/getfaculties` |
//! | [`AuthenticatedPortal::exam_event_semesters`] | `studentcommonsontroller/getsemestercode-exam` |
//! | [`AuthenticatedPortal::exam_events`] | `studentsexamview/getstudent-examevents` |
//! | [`AuthenticatedPortal::exam_schedule`] | `studentsexamview/getstudent-exameventshedule` |
//! | [`AuthenticatedPortal::marks_semesters`] | `studentsexamview/getsemestercode-withstudentexamshedule` |
//! | [`AuthenticatedPortal::download_marks`] | `studentsexamview/printstudent-exammarks/...` (binary GET) |
//! | [`AuthenticatedPortal::grade_card_semesters`] | `studentgradecard/getregistrationList` |
//! | [`AuthenticatedPortal::grade_card`] | `studentgradecard/showstudentgradecard` |
//! | [`AuthenticatedPortal::sgpa_cgpa`] | `studentsgpacgpa/getallsemesterdata` |
//! | [`AuthenticatedPortal::paid_fee_details`] | `feewebapp/getstudentfeedpaiddetail` |
//! | [`AuthenticatedPortal::fee_receipt`] | `feewebapp/getfeereceiptdetail` |
//! | [`AuthenticatedPortal::change_password`] | `clxuser/changepassword` |
//!
//! # Errors
//!
//! Every failure surfaces as one [`PortalError`] variant; nothing is retried
//! or swallowed inside this crate. Soft conditions like "no attendance found
//! for this semester" are the structured [`PortalError::NoData`] variant, so
//! callers switch on a kind instead of parsing message text.

pub mod client;
mod crypto;
pub mod error;
pub mod session;
pub mod transport;
pub mod types;

pub use client::{AuthenticatedPortal, Portal, PortalConfig};
pub use error::{NoDataKind, PortalError, Result};
pub use session::Session;
