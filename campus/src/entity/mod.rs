//! SeaORM entities.
//!
//! Control-plane tables live in the one shared database; tenant tables are
//! created in every per-school database by `TenantMigrator`. Which physical
//! database an entity is read from is decided by `tenancy::router`.

// control plane
pub mod app_user;
pub mod board;
pub mod catalog_chapter;
pub mod catalog_prerequisite;
pub mod catalog_sub_topic;
pub mod default_class;
pub mod default_subject;
pub mod role;
pub mod school;
pub mod school_board_mapping;
pub mod school_db_metadata;
pub mod syllabus_ebook;

// tenant
pub mod academic_year;
pub mod class_assignment;
pub mod school_class;
pub mod school_section;
pub mod student;
pub mod student_class_assignment;
pub mod subject;
pub mod syllabus_chapter;
pub mod syllabus_prerequisite;
pub mod syllabus_sub_topic;
pub mod teacher;
