// src/services/ranking.rs

//! Weighted scoring, the eligibility filter and dense ranking.
//!
//! SQL only aggregates raw counts per student (`StudentTally`); every rule is
//! applied here so the public ranking and per-user stats cannot disagree.

use std::cmp::Ordering;

use sqlx::PgPool;

use crate::{
    config::{SANDBAGGING_RECEIVED_MIN, SANDBAGGING_SELECTED_MIN},
    error::AppError,
    models::{
        ranking::{RankingEntry, StudentTally, UserStats, WrittenStats},
        user::Role,
    },
};

/// One row per student, plus the row of `extra_user_id` whatever its role.
/// Weight: 2 points for a selected praise written to a teacher, 1 otherwise.
const TALLY_SQL: &str = r#"
    SELECT
        u.id, u.name, u.role, u.school, u.grade, u.class_number, u.student_number,
        COALESCE((
            SELECT SUM(CASE WHEN r.role = 'teacher' THEN 2 ELSE 1 END)
            FROM praises p
            JOIN users r ON r.id = p.to_user_id
            WHERE p.from_user_id = u.id AND p.is_selected AND NOT p.is_deleted
        ), 0)::BIGINT AS weighted_score,
        (SELECT COUNT(*) FROM praises p
            WHERE p.from_user_id = u.id AND NOT p.is_deleted) AS written_count,
        (SELECT COUNT(*) FROM praises p
            WHERE p.to_user_id = u.id AND NOT p.is_deleted AND NOT p.is_teacher) AS peer_received_count,
        (SELECT COUNT(*) FROM praises p
            WHERE p.to_user_id = u.id AND NOT p.is_deleted) AS received_count,
        (SELECT COUNT(*) FROM praises p
            WHERE p.to_user_id = u.id AND NOT p.is_deleted AND p.is_selected) AS selected_received_count
    FROM users u
    WHERE u.role = 'student' OR u.id = $1
"#;

/// A student who collects peer praises without acknowledging them is
/// excluded from the ranking.
pub fn is_sandbagging(tally: &StudentTally) -> bool {
    tally.peer_received_count >= SANDBAGGING_RECEIVED_MIN
        && tally.selected_received_count < SANDBAGGING_SELECTED_MIN
}

pub fn is_rankable(tally: &StudentTally) -> bool {
    Role::from_db(&tally.role) == Role::Student && tally.weighted_score > 0 && !is_sandbagging(tally)
}

fn ranking_order(a: &StudentTally, b: &StudentTally) -> Ordering {
    b.weighted_score
        .cmp(&a.weighted_score)
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.id.cmp(&b.id))
}

/// Filters and orders tallies. Ranks are dense 1-based positions.
pub fn rank_students(tallies: &[StudentTally]) -> Vec<RankingEntry> {
    let mut eligible: Vec<&StudentTally> = tallies.iter().filter(|t| is_rankable(t)).collect();
    eligible.sort_by(|a, b| ranking_order(a, b));

    eligible
        .into_iter()
        .enumerate()
        .map(|(idx, t)| RankingEntry {
            rank: idx + 1,
            id: t.id,
            name: t.name.clone(),
            school: t.school.clone(),
            grade: t.grade,
            class_number: t.class_number,
            student_number: t.student_number,
            weighted_score: t.weighted_score,
            total_praises_count: t.written_count,
        })
        .collect()
}

/// Stats of `user_id`, located in the same ranking `rank_students` produces.
pub fn stats_for(tallies: &[StudentTally], user_id: i64) -> Option<UserStats> {
    let own = tallies.iter().find(|t| t.id == user_id)?;
    let ranking = rank_students(tallies);
    let rank = ranking.iter().find(|e| e.id == user_id).map(|e| e.rank);

    Some(UserStats {
        weighted_score: own.weighted_score,
        ranking: rank,
        written_praises: own.written_count,
        received_praises: own.received_count,
        selected_praises: own.selected_received_count,
        ranked_students: ranking.len(),
    })
}

pub fn written_stats(total_count: i64, selected_count: i64) -> WrittenStats {
    let selection_rate = if total_count > 0 {
        (selected_count as f64 / total_count as f64 * 100.0).round() as i64
    } else {
        0
    };

    WrittenStats {
        total_count,
        selected_count,
        selection_rate,
    }
}

async fn fetch_tallies(pool: &PgPool, extra_user_id: Option<i64>) -> Result<Vec<StudentTally>, AppError> {
    sqlx::query_as::<_, StudentTally>(TALLY_SQL)
        .bind(extra_user_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::from)
}

pub async fn compute_ranking(pool: &PgPool) -> Result<Vec<RankingEntry>, AppError> {
    let tallies = fetch_tallies(pool, None).await?;
    Ok(rank_students(&tallies))
}

pub async fn compute_user_stats(pool: &PgPool, user_id: i64) -> Result<UserStats, AppError> {
    let tallies = fetch_tallies(pool, Some(user_id)).await?;
    stats_for(&tallies, user_id).ok_or(AppError::NotFound("User not found".to_string()))
}

pub async fn compute_written_stats(pool: &PgPool, student_id: i64) -> Result<WrittenStats, AppError> {
    let (total, selected): (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COUNT(*) FILTER (WHERE NOT is_deleted),
            COUNT(*) FILTER (WHERE NOT is_deleted AND is_selected)
        FROM praises
        WHERE from_user_id = $1
        "#,
    )
    .bind(student_id)
    .fetch_one(pool)
    .await?;

    Ok(written_stats(total, selected))
}
