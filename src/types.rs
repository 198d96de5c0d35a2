//! Domain value types.
//!
//! All of these are read-only projections of one backend response: parsed
//! once, never mutated, safe to share across concurrent readers. Field names
//! map to the backend's wire names via serde renames. Endpoints whose
//! responses are untyped grab-bags (grade card, SGPA/CGPA, schedules, fees)
//! return raw `serde_json::Value` instead.

use serde::{Deserialize, Serialize};

/// An academic term: human-readable registration code plus opaque numeric id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Semester {
    /// Human-readable code, e.g. `"2024ODDSEM"`.
    #[serde(rename = "registrationcode")]
    pub registration_code: String,
    /// Opaque backend identifier for the registration.
    #[serde(rename = "registrationid")]
    pub registration_id: String,
}

/// Student/program header row of the attendance metadata response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceHeader {
    /// Branch description.
    #[serde(rename = "branchdesc")]
    pub branch_desc: String,
    /// Student name.
    pub name: String,
    /// Program description.
    #[serde(rename = "programdesc")]
    pub program_desc: String,
    /// Study-year number.
    #[serde(rename = "stynumber")]
    pub sty_number: String,
}

/// Attendance metadata: header rows plus the semesters attendance exists for.
///
/// "Latest" is defined by list order, not by any date computation: the
/// backend returns the current term first.
#[derive(Debug, Clone, Deserialize)]
pub struct AttendanceMeta {
    /// Header rows, current first.
    #[serde(rename = "headerlist")]
    pub headers: Vec<AttendanceHeader>,
    /// Semesters, current first.
    #[serde(rename = "semlist")]
    pub semesters: Vec<Semester>,
}

impl AttendanceMeta {
    /// The latest semester, i.e. position 0 of the list.
    pub fn latest_semester(&self) -> Option<&Semester> {
        self.semesters.first()
    }

    /// The latest header row, i.e. position 0 of the list.
    pub fn latest_header(&self) -> Option<&AttendanceHeader> {
        self.headers.first()
    }
}

/// One subject registered in a semester.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredSubject {
    /// Subject code, e.g. `"15B11CI411"`.
    #[serde(rename = "subjectcode")]
    pub subject_code: String,
    /// Subject description.
    #[serde(rename = "subjectdesc")]
    pub subject_desc: String,
    /// Teaching faculty name.
    #[serde(rename = "employeename")]
    pub employee_name: String,
    /// Teaching faculty code.
    #[serde(rename = "employeecode")]
    pub employee_code: String,
    /// Credit value of the subject.
    pub credits: f64,
    /// Component code (lecture/tutorial/practical).
    #[serde(rename = "subjectcomponentcode")]
    pub subject_component_code: String,
    /// Opaque subject identifier.
    #[serde(rename = "subjectid")]
    pub subject_id: String,
    /// Whether this is an audit subject, when the backend says.
    #[serde(rename = "audtsubject", default)]
    pub audit_subject: Option<String>,
}

/// Subject registrations for one semester plus the aggregate credit total.
#[derive(Debug, Clone, Deserialize)]
pub struct Registrations {
    /// Subject-level registration facts.
    #[serde(rename = "registrations")]
    pub subjects: Vec<RegisteredSubject>,
    /// Aggregate credit total for the semester.
    #[serde(rename = "totalcreditpoint", default)]
    pub total_credits: f64,
}

/// One exam event (T1, T2, end-semester, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamEvent {
    /// Event code.
    #[serde(rename = "exameventcode")]
    pub exam_event_code: String,
    /// Start date of the event, as the backend formats it.
    #[serde(rename = "eventfrom")]
    pub event_from: String,
    /// Human-readable event description.
    #[serde(rename = "exameventdesc")]
    pub exam_event_desc: String,
    /// Registration the event belongs to.
    #[serde(rename = "registrationid")]
    pub registration_id: String,
    /// Opaque event identifier.
    #[serde(rename = "exameventid")]
    pub exam_event_id: String,
}

/// Captcha challenge answer sent with the login pretoken request.
///
/// The backend currently accepts a fixed bypass value; [`Captcha::bypass`]
/// carries it. Whether the backend will keep accepting it is unverified, so
/// the login API takes a caller-supplied value and an interactive solve can
/// be substituted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Captcha {
    /// The (claimed) solution.
    #[serde(rename = "captcha")]
    pub answer: String,
    /// Server-issued hidden token accompanying the challenge.
    pub hidden: String,
}

impl Captcha {
    /// The fixed bypass value the backend accepts in place of a real solve.
    pub fn bypass() -> Self {
        Self {
            answer: "phw5n".to_string(),
            hidden: "gmBctEffdSJLDhoiamqnfL".to_string(),
        }
    }
}

impl Default for Captcha {
    fn default() -> Self {
        Self::bypass()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn semester_parses_wire_names() {
        let sem: Semester = serde_json::from_value(json!({
            "registrationcode": "2024ODDSEM",
            "registrationid": "REG77",
        }))
        .unwrap();
        assert_eq!(sem.registration_code, "2024ODDSEM");
        assert_eq!(sem.registration_id, "REG77");
    }

    #[test]
    fn attendance_meta_exposes_all_semesters_and_latest_is_first() {
        let meta: AttendanceMeta = serde_json::from_value(json!({
            "headerlist": [{
                "branchdesc": "Computer Science",
                "name": "Test Student",
                "programdesc": "B.Tech",
                "stynumber": "2",
            }],
            "semlist": [
                {"registrationcode": "2024ODDSEM", "registrationid": "REG3"},
                {"registrationcode": "2024EVESEM", "registrationid": "REG2"},
                {"registrationcode": "2023ODDSEM", "registrationid": "REG1"},
            ],
        }))
        .unwrap();

        assert_eq!(meta.semesters.len(), 3);
        // Position 0, independent of any date field values.
        assert_eq!(
            meta.latest_semester().unwrap().registration_code,
            "2024ODDSEM"
        );
        assert_eq!(meta.latest_header().unwrap().sty_number, "2");
    }

    #[test]
    fn attendance_meta_with_empty_lists_has_no_latest() {
        let meta: AttendanceMeta =
            serde_json::from_value(json!({"headerlist": [], "semlist": []})).unwrap();
        assert!(meta.latest_semester().is_none());
        assert!(meta.latest_header().is_none());
    }

    #[test]
    fn registrations_carry_subjects_and_credit_total() {
        let regs: Registrations = serde_json::from_value(json!({
            "registrations": [{
                "subjectcode": "15B11CI411",
                "subjectdesc": "Algorithms",
                "employeename": "A. Faculty",
                "employeecode": "EMP9",
                "credits": 4.0,
                "subjectcomponentcode": "L",
                "subjectid": "SUBJ1",
            }],
            "totalcreditpoint": 22.5,
        }))
        .unwrap();
        assert_eq!(regs.subjects.len(), 1);
        assert_eq!(regs.subjects[0].subject_desc, "Algorithms");
        assert_eq!(regs.total_credits, 22.5);
        assert!(regs.subjects[0].audit_subject.is_none());
    }

    #[test]
    fn exam_event_parses_wire_names() {
        let event: ExamEvent = serde_json::from_value(json!({
            "exameventcode": "T1",
            "eventfrom": "2024-09-20",
            "exameventdesc": "Test 1",
            "registrationid": "REG3",
            "exameventid": "EV42",
        }))
        .unwrap();
        assert_eq!(event.exam_event_code, "T1");
        assert_eq!(event.exam_event_id, "EV42");
    }

    #[test]
    fn captcha_bypass_serializes_to_wire_shape() {
        let value = serde_json::to_value(Captcha::bypass()).unwrap();
        assert_eq!(value["captcha"], "phw5n");
        assert!(value["hidden"].is_string());
    }
}
