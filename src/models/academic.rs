use garde::Validate;
use serde::{Deserialize, Serialize};

/// An academic year and term, as taken by every portal page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct AcademicPeriod {
    #[garde(range(min = 1988, max = 2100))]
    pub year: u16,
    #[garde(range(min = 1, max = 3))]
    pub semester: u8,
}

/// The parameters that select one record of a page kind.
///
/// They are sent to the portal as query parameters and also name the record's
/// cache entry, so two queries share an entry exactly when they ask the portal
/// for the same page.
pub trait ResourceQuery: Send + Sync {
    /// The query parameters the portal expects.
    fn query(&self) -> Vec<(&'static str, String)>;

    /// The `:`-separated tail of the cache key.
    fn key_segments(&self) -> String;
}

impl ResourceQuery for AcademicPeriod {
    fn query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("valTahun", self.year.to_string()),
            ("valSemester", self.semester.to_string()),
        ]
    }

    fn key_segments(&self) -> String {
        format!("{}:{}", self.year, self.semester)
    }
}

/// One week of an internship logbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct LogbookQuery {
    #[garde(range(min = 1988, max = 2100))]
    pub year: u16,
    #[garde(range(min = 1, max = 3))]
    pub semester: u8,
    #[garde(range(min = 1, max = 24))]
    pub week: u8,
}

impl ResourceQuery for LogbookQuery {
    fn query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("valTahun", self.year.to_string()),
            ("valSemester", self.semester.to_string()),
            ("valMinggu", self.week.to_string()),
        ]
    }

    fn key_segments(&self) -> String {
        format!("{}:{}:{}", self.year, self.semester, self.week)
    }
}

/// The year and term choices offered by a page's period selector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodOptions {
    pub years: Vec<u16>,
    pub semesters: Vec<u8>,
}

// ----------------------------------------------------------------------------
// Attendance (absen.php)
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub options: PeriodOptions,
    pub courses: Vec<AttendanceRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRow {
    pub code: String,
    pub course: String,
    /// One mark per lecture week, as printed (blank when not yet held).
    pub weeks: Vec<String>,
    /// The attendance percentage column, verbatim.
    pub attendance: String,
}

// ----------------------------------------------------------------------------
// Study plan (FRS_mbkm.php)
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyPlanRecord {
    pub options: PeriodOptions,
    pub advisor: String,
    pub credits: CreditAllowance,
    pub gpa: GradePoints,
    pub deadlines: StudyPlanDeadlines,
    pub courses: Vec<StudyPlanRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreditAllowance {
    pub limit: u16,
    pub remaining: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GradePoints {
    pub cumulative: f32,
    pub semester: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyPlanDeadlines {
    pub filling: DateRange,
    pub changes: DateRange,
    pub drop: DateRange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyPlanRow {
    pub code: String,
    pub group: String,
    pub course: String,
    pub lecturer: String,
    pub credits: String,
    pub class: String,
    pub approved: String,
}

// ----------------------------------------------------------------------------
// Class schedule (jadwal_kul.php)
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRecord {
    pub options: PeriodOptions,
    pub class: String,
    pub days: Vec<ScheduleDay>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleDay {
    pub day: String,
    pub sessions: Vec<ScheduledCourse>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledCourse {
    pub course: String,
    pub lecturer: String,
    pub time: String,
    pub room: String,
}

// ----------------------------------------------------------------------------
// Semester grades (nilai_sem.php)
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradesRecord {
    pub options: PeriodOptions,
    pub courses: Vec<GradeRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeRow {
    pub code: String,
    pub course: String,
    pub grade: String,
}

// ----------------------------------------------------------------------------
// Internship logbook (entry_logbook_kp1.php)
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogbookRecord {
    pub options: LogbookOptions,
    pub placement: Placement,
    /// The internship registration id the portal's entry form posts back.
    pub registration: String,
    /// The student's internal id the portal's entry form posts back.
    pub student_id: String,
    pub courses: Vec<LogbookCourse>,
    pub entries: Vec<LogbookEntry>,
    pub lecturer_note: String,
    pub company_note: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogbookOptions {
    pub years: Vec<u16>,
    pub semesters: Vec<u8>,
    pub weeks: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub name: String,
    pub student_number: String,
    pub supervisor: String,
    pub company: String,
    pub period: String,
}

/// A course an activity can be logged against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogbookCourse {
    pub name: String,
    pub value: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogbookEntry {
    pub id: String,
    pub date: String,
    pub start: String,
    pub end: String,
    pub activity: String,
    pub course: String,
    /// The progress report link, when one was uploaded.
    pub progress_file: Option<String>,
    pub photo_file: String,
    pub print_link: String,
    /// Whether the portal still offers to delete the entry.
    pub deletable: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_validation_bounds() {
        assert!(AcademicPeriod { year: 2024, semester: 1 }.validate().is_ok());
        assert!(AcademicPeriod { year: 1987, semester: 1 }.validate().is_err());
        assert!(AcademicPeriod { year: 2024, semester: 0 }.validate().is_err());
        assert!(AcademicPeriod { year: 2024, semester: 4 }.validate().is_err());
    }

    #[test]
    fn test_period_query_params() {
        let query = AcademicPeriod { year: 2024, semester: 2 }.query();

        assert_eq!(query[0], ("valTahun", "2024".to_string()));
        assert_eq!(query[1], ("valSemester", "2".to_string()));
    }

    #[test]
    fn test_logbook_query_adds_week() {
        let query = LogbookQuery { year: 2024, semester: 1, week: 7 };

        assert_eq!(query.query()[2], ("valMinggu", "7".to_string()));
        assert_eq!(query.key_segments(), "2024:1:7");
    }

    #[test]
    fn test_logbook_week_bounds() {
        assert!(LogbookQuery { year: 2024, semester: 1, week: 24 }.validate().is_ok());
        assert!(LogbookQuery { year: 2024, semester: 1, week: 0 }.validate().is_err());
        assert!(LogbookQuery { year: 2024, semester: 1, week: 25 }.validate().is_err());
    }
}
