use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::UploadType;
use crate::entity::{
    academic_year, app_user, board, school, school_db_metadata, school_section, student, teacher,
};

// ---------- auth ----------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize, Clone)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Option<String>,
    pub school_id: Option<i32>,
    pub is_superuser: bool,
    pub is_active: bool,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub last_login_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl UserResponse {
    pub fn new(m: app_user::Model, role: Option<String>) -> Self {
        Self {
            id: m.id,
            username: m.user_name,
            email: m.email,
            role,
            school_id: m.school_id,
            is_superuser: m.is_superuser,
            is_active: m.is_active,
            first_name: m.first_name,
            last_name: m.last_name,
            last_login_at: m.last_login_at,
            created_at: m.created_at,
        }
    }
}

// ---------- schools ----------

#[derive(Debug, Serialize)]
pub struct SubmitProvisionResponse {
    pub job_id: String,
}

#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub school_name: String,
    pub status: String,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SchoolResponse {
    pub id: i32,
    pub name: String,
    pub address: String,
    pub contact_number: Option<String>,
    pub email: Option<String>,
    pub school_admin_id: Option<Uuid>,
    pub is_active: bool,
    pub database: Option<SchoolDatabaseResponse>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Serialize)]
pub struct SchoolDatabaseResponse {
    pub db_name: String,
    pub db_host: String,
    pub db_port: i32,
    pub is_active: bool,
    pub provisioning_complete: bool,
    /// Whether a live connection is registered and routable.
    pub ready: bool,
}

impl SchoolResponse {
    pub fn new(s: school::Model, db: Option<(school_db_metadata::Model, bool)>) -> Self {
        Self {
            id: s.id,
            name: s.name,
            address: s.address,
            contact_number: s.contact_number,
            email: s.email,
            school_admin_id: s.school_admin_id,
            is_active: s.is_active,
            database: db.map(|(r, ready)| SchoolDatabaseResponse {
                db_name: r.db_name,
                db_host: r.db_host,
                db_port: r.db_port,
                is_active: r.is_active,
                provisioning_complete: r.provisioning_complete,
                ready,
            }),
            created_at: s.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BoardResponse {
    pub id: i32,
    pub board_name: String,
    pub is_active: bool,
}

impl From<board::Model> for BoardResponse {
    fn from(b: board::Model) -> Self {
        Self {
            id: b.id,
            board_name: b.board_name,
            is_active: b.is_active,
        }
    }
}

// ---------- academic ----------

#[derive(Debug, Deserialize)]
pub struct CreateAcademicYearRequest {
    pub start_year: i32,
    pub end_year: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct AcademicYearResponse {
    pub id: i32,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub is_active: bool,
}

impl From<academic_year::Model> for AcademicYearResponse {
    fn from(m: academic_year::Model) -> Self {
        Self {
            id: m.id,
            start_year: m.start_year,
            end_year: m.end_year,
            is_active: m.is_active,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateSectionRequest {
    pub class_number: i32,
    pub section: String,
    pub board_id: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct SectionResponse {
    pub id: i32,
    pub class_id: i32,
    pub class_number: i32,
    pub section: String,
    pub board_id: Option<i32>,
}

impl SectionResponse {
    pub fn new(s: school_section::Model, class_number: i32) -> Self {
        Self {
            id: s.id,
            class_id: s.class_id,
            class_number,
            section: s.section,
            board_id: s.board_id,
        }
    }
}

// ---------- students ----------

#[derive(Debug, Deserialize)]
pub struct CreateStudentRequest {
    pub user_name: String,
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub roll_number: String,
    pub admission_date: NaiveDate,
    pub parent_name: String,
    pub parent_phone: String,
    pub parent_email: String,
    /// Section the student joins.
    pub section_id: i32,
    /// Defaults to the most recent active academic year.
    pub academic_year_id: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct StudentResponse {
    pub id: i32,
    pub user_id: Uuid,
    pub roll_number: String,
    pub admission_date: NaiveDate,
    pub parent_name: String,
    pub parent_phone: String,
    pub parent_email: String,
    pub is_active: bool,
    pub section_id: Option<i32>,
    pub academic_year_id: Option<i32>,
}

impl StudentResponse {
    pub fn new(s: student::Model, placement: Option<(i32, i32)>) -> Self {
        Self {
            id: s.id,
            user_id: s.user_id,
            roll_number: s.roll_number,
            admission_date: s.admission_date,
            parent_name: s.parent_name,
            parent_phone: s.parent_phone,
            parent_email: s.parent_email,
            is_active: s.is_active,
            section_id: placement.map(|(section, _)| section),
            academic_year_id: placement.map(|(_, year)| year),
        }
    }
}

// ---------- teachers ----------

#[derive(Debug, Deserialize)]
pub struct CreateTeacherRequest {
    pub user_name: String,
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub qualification: Option<String>,
    pub experience: Option<f64>,
    pub joining_date: Option<NaiveDate>,
    pub emergency_contact: Option<String>,
    /// Sections the teacher is assigned to.
    #[serde(default)]
    pub section_ids: Vec<i32>,
    /// Defaults to the most recent active academic year.
    pub academic_year_id: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct TeacherResponse {
    pub id: i32,
    pub user_id: Uuid,
    pub qualification: Option<String>,
    pub experience: Option<f64>,
    pub joining_date: Option<NaiveDate>,
    pub emergency_contact: Option<String>,
    pub is_active: bool,
    pub section_ids: Vec<i32>,
}

impl TeacherResponse {
    pub fn new(t: teacher::Model, section_ids: Vec<i32>) -> Self {
        Self {
            id: t.id,
            user_id: t.user_id,
            qualification: t.qualification,
            experience: t.experience,
            joining_date: t.joining_date,
            emergency_contact: t.emergency_contact,
            is_active: t.is_active,
            section_ids,
        }
    }
}

// ---------- password reset ----------

#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetConfirm {
    pub username: String,
    pub otp: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ---------- catalog ----------

#[derive(Debug, Deserialize)]
pub struct UploadEbookRequest {
    pub board_id: i32,
    pub class_id: i32,
    pub subject_id: i32,
    pub upload_type: UploadType,
    pub chapter_number: Option<i32>,
    /// Base64-encoded document.
    pub content: String,
}
