// src/models/user.rs

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Korean mobile numbers without separators, e.g. `01012345678`.
static PHONE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0[0-9]{8,10}$").expect("phone number pattern is valid"));

/// Account role. Stored as lowercase text in `users.role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
        }
    }

    /// Unknown strings fall back to `Student`, the least privileged role.
    pub fn from_db(value: &str) -> Self {
        match value {
            "teacher" => Role::Teacher,
            _ => Role::Student,
        }
    }
}

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Unique login key.
    pub phone_number: String,

    pub name: String,

    /// Argon2 password hash. `None` until the first login sets it.
    #[serde(skip)]
    pub password: Option<String>,

    /// 'student' or 'teacher'.
    pub role: String,

    pub school: Option<String>,
    pub grade: Option<i32>,
    pub class_number: Option<i32>,
    pub student_number: Option<i32>,

    pub is_king: bool,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl User {
    pub fn role(&self) -> Role {
        Role::from_db(&self.role)
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            phone_number: self.phone_number.clone(),
            name: self.name.clone(),
            role: self.role.clone(),
            school: self.school.clone(),
            grade: self.grade,
            class_number: self.class_number,
            student_number: self.student_number,
            is_king: self.is_king,
        }
    }
}

/// Public account data returned by auth and profile endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: i64,
    pub phone_number: String,
    pub name: String,
    pub role: String,
    pub school: Option<String>,
    pub grade: Option<i32>,
    pub class_number: Option<i32>,
    pub student_number: Option<i32>,
    pub is_king: bool,
}

/// Card header for the rotating feeds. Carries no contact data.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CardProfile {
    pub id: i64,
    pub name: String,
    pub school: Option<String>,
    pub grade: Option<i32>,
    pub class_number: Option<i32>,
    pub student_number: Option<i32>,
    pub is_king: bool,
}

/// Row of the public student directory.
#[derive(Debug, Serialize, FromRow)]
pub struct StudentListEntry {
    pub id: i64,
    pub name: String,
    pub school: Option<String>,
    pub grade: Option<i32>,
    pub class_number: Option<i32>,
    pub student_number: Option<i32>,
    pub selected_praises_count: i64,
    pub total_praises_count: i64,
}

/// DTO for login and first-login password setup.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(regex(path = *PHONE_NUMBER_RE, message = "Invalid phone number."))]
    pub phone_number: String,
    #[validate(length(
        min = 4,
        max = 128,
        message = "Password length must be between 4 and 128 characters."
    ))]
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_db_text() {
        assert_eq!(Role::from_db(Role::Teacher.as_str()), Role::Teacher);
        assert_eq!(Role::from_db(Role::Student.as_str()), Role::Student);
        assert_eq!(Role::from_db("admin"), Role::Student);
    }

    #[test]
    fn login_request_rejects_malformed_phone() {
        let bad = LoginRequest {
            phone_number: "010-1234-5678".to_string(),
            password: "password".to_string(),
        };
        assert!(bad.validate().is_err());

        let good = LoginRequest {
            phone_number: "01012345678".to_string(),
            password: "password".to_string(),
        };
        assert!(good.validate().is_ok());
    }

    #[test]
    fn login_request_rejects_short_password() {
        let req = LoginRequest {
            phone_number: "01012345678".to_string(),
            password: "abc".to_string(),
        };
        assert!(req.validate().is_err());
    }
}
