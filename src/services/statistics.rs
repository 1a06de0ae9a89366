use std::collections::BTreeMap;

use sqlx::PgPool;

use crate::{
    error::AppError,
    models::statistics::{Statistics, StudentBrief},
};

const UNASSIGNED: &str = "unassigned";

fn bucket(rows: Vec<(Option<i32>, i64)>) -> BTreeMap<String, i64> {
    let mut out = BTreeMap::new();
    for (key, count) in rows {
        let key = key.map(|k| k.to_string()).unwrap_or_else(|| UNASSIGNED.to_string());
        *out.entry(key).or_insert(0) += count;
    }
    out
}

/// Aggregate counts for the dashboard.
pub async fn collect(pool: &PgPool) -> Result<Statistics, AppError> {
    let (total_students, total_praises, students_without_praises): (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COUNT(DISTINCT u.id),
            COUNT(p.id),
            COUNT(DISTINCT u.id) FILTER (WHERE p.id IS NULL)
        FROM users u
        LEFT JOIN praises p ON p.to_user_id = u.id AND NOT p.is_deleted
        WHERE u.role = 'student'
        "#,
    )
    .fetch_one(pool)
    .await?;

    let by_grade: Vec<(Option<i32>, i64)> = sqlx::query_as(
        "SELECT grade, COUNT(*) FROM users WHERE role = 'student' GROUP BY grade ORDER BY grade",
    )
    .fetch_all(pool)
    .await?;

    let by_class: Vec<(Option<i32>, i64)> = sqlx::query_as(
        "SELECT class_number, COUNT(*) FROM users WHERE role = 'student' GROUP BY class_number ORDER BY class_number",
    )
    .fetch_all(pool)
    .await?;

    let random_students = sqlx::query_as::<_, StudentBrief>(
        r#"
        SELECT u.id, u.name, u.school, u.grade, u.class_number
        FROM users u
        WHERE u.role = 'student'
          AND NOT EXISTS (SELECT 1 FROM praises p WHERE p.to_user_id = u.id AND NOT p.is_deleted)
        ORDER BY RANDOM()
        LIMIT 5
        "#,
    )
    .fetch_all(pool)
    .await?;

    let students_who_havent_written = sqlx::query_as::<_, StudentBrief>(
        r#"
        SELECT u.id, u.name, u.school, u.grade, u.class_number
        FROM users u
        WHERE u.role = 'student'
          AND NOT EXISTS (SELECT 1 FROM praises p WHERE p.from_user_id = u.id AND NOT p.is_deleted)
        ORDER BY u.grade, u.class_number, u.student_number, u.name
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(Statistics {
        total_students,
        total_praises,
        students_without_praises,
        students_by_grade: bucket(by_grade),
        students_by_class: bucket(by_class),
        random_students,
        students_who_havent_written,
    })
}
