// src/models/ranking.rs

use serde::Serialize;
use sqlx::FromRow;

/// Per-student aggregates the ranking rules are applied to.
/// One row per student, produced by a single SQL aggregation.
#[derive(Debug, Clone, FromRow)]
pub struct StudentTally {
    pub id: i64,
    pub name: String,
    pub role: String,
    pub school: Option<String>,
    pub grade: Option<i32>,
    pub class_number: Option<i32>,
    pub student_number: Option<i32>,

    /// Authored, live, selected praises weighted by recipient role.
    pub weighted_score: i64,
    /// Authored, live praises.
    pub written_count: i64,
    /// Live praises received from other students.
    pub peer_received_count: i64,
    /// Live praises received from anyone.
    pub received_count: i64,
    /// Live received praises the student has selected.
    pub selected_received_count: i64,
}

/// One line of the public ranking.
#[derive(Debug, Clone, Serialize)]
pub struct RankingEntry {
    pub rank: usize,
    pub id: i64,
    pub name: String,
    pub school: Option<String>,
    pub grade: Option<i32>,
    pub class_number: Option<i32>,
    pub student_number: Option<i32>,
    pub weighted_score: i64,
    pub total_praises_count: i64,
}

/// Statistics for the current user.
#[derive(Debug, Clone, Serialize)]
pub struct UserStats {
    pub weighted_score: i64,
    /// `None` when the user is filtered out of the ranking.
    pub ranking: Option<usize>,
    pub written_praises: i64,
    pub received_praises: i64,
    pub selected_praises: i64,
    pub ranked_students: usize,
}

/// Written-praise statistics of one student, for teachers.
#[derive(Debug, Serialize)]
pub struct WrittenStats {
    pub total_count: i64,
    pub selected_count: i64,
    /// Rounded percentage of written praises that were selected.
    pub selection_rate: i64,
}
