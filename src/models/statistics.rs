use std::collections::BTreeMap;

use serde::Serialize;
use sqlx::FromRow;

/// Minimal student row used by the statistics lists.
#[derive(Debug, Serialize, FromRow)]
pub struct StudentBrief {
    pub id: i64,
    pub name: String,
    pub school: Option<String>,
    pub grade: Option<i32>,
    pub class_number: Option<i32>,
}

/// Response of `GET /api/statistics`.
#[derive(Debug, Serialize)]
pub struct Statistics {
    pub total_students: i64,
    pub total_praises: i64,
    pub students_without_praises: i64,
    /// Keyed by grade; students without a grade are counted under "unassigned".
    pub students_by_grade: BTreeMap<String, i64>,
    pub students_by_class: BTreeMap<String, i64>,
    /// Up to five random students that have not received a praise yet.
    pub random_students: Vec<StudentBrief>,
    pub students_who_havent_written: Vec<StudentBrief>,
}
