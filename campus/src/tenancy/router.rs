//! Decides which physical database each entity type lives in.
//!
//! Control-plane entities (auth, schools, connection records, the shared
//! syllabus catalog) always go to the control plane. Everything else goes to
//! the tenant selected in [`context`](super::context). With no tenant
//! selected, tenant entities fall back to the control plane, where their
//! tables do not exist; each fallback is logged under `campus::routing`.

use std::sync::Arc;

use sea_orm::{DatabaseConnection, EntityTrait};

use crate::entity;

use super::registry::ConnectionRegistry;
use super::{DbKey, TenancyError, context};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Plane {
    Control,
    Tenant,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    // control plane
    User,
    Role,
    School,
    TenantConnectionRecord,
    Board,
    BoardMapping,
    DefaultClass,
    DefaultSubject,
    Ebook,
    CatalogChapter,
    CatalogSubTopic,
    CatalogPrerequisite,
    // tenant
    AcademicYear,
    SchoolClass,
    SchoolSection,
    ClassAssignment,
    Subject,
    Teacher,
    Student,
    StudentClassAssignment,
    SyllabusChapter,
    SyllabusSubTopic,
    SyllabusPrerequisite,
}

impl EntityKind {
    pub const CONTROL: [EntityKind; 12] = [
        EntityKind::User,
        EntityKind::Role,
        EntityKind::School,
        EntityKind::TenantConnectionRecord,
        EntityKind::Board,
        EntityKind::BoardMapping,
        EntityKind::DefaultClass,
        EntityKind::DefaultSubject,
        EntityKind::Ebook,
        EntityKind::CatalogChapter,
        EntityKind::CatalogSubTopic,
        EntityKind::CatalogPrerequisite,
    ];

    pub const TENANT: [EntityKind; 11] = [
        EntityKind::AcademicYear,
        EntityKind::SchoolClass,
        EntityKind::SchoolSection,
        EntityKind::ClassAssignment,
        EntityKind::Subject,
        EntityKind::Teacher,
        EntityKind::Student,
        EntityKind::StudentClassAssignment,
        EntityKind::SyllabusChapter,
        EntityKind::SyllabusSubTopic,
        EntityKind::SyllabusPrerequisite,
    ];

    pub fn plane(self) -> Plane {
        match self {
            EntityKind::User
            | EntityKind::Role
            | EntityKind::School
            | EntityKind::TenantConnectionRecord
            | EntityKind::Board
            | EntityKind::BoardMapping
            | EntityKind::DefaultClass
            | EntityKind::DefaultSubject
            | EntityKind::Ebook
            | EntityKind::CatalogChapter
            | EntityKind::CatalogSubTopic
            | EntityKind::CatalogPrerequisite => Plane::Control,
            _ => Plane::Tenant,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Role => "role",
            EntityKind::School => "school",
            EntityKind::TenantConnectionRecord => "tenant_connection_record",
            EntityKind::Board => "board",
            EntityKind::BoardMapping => "board_mapping",
            EntityKind::DefaultClass => "default_class",
            EntityKind::DefaultSubject => "default_subject",
            EntityKind::Ebook => "ebook",
            EntityKind::CatalogChapter => "catalog_chapter",
            EntityKind::CatalogSubTopic => "catalog_sub_topic",
            EntityKind::CatalogPrerequisite => "catalog_prerequisite",
            EntityKind::AcademicYear => "academic_year",
            EntityKind::SchoolClass => "school_class",
            EntityKind::SchoolSection => "school_section",
            EntityKind::ClassAssignment => "class_assignment",
            EntityKind::Subject => "subject",
            EntityKind::Teacher => "teacher",
            EntityKind::Student => "student",
            EntityKind::StudentClassAssignment => "student_class_assignment",
            EntityKind::SyllabusChapter => "syllabus_chapter",
            EntityKind::SyllabusSubTopic => "syllabus_sub_topic",
            EntityKind::SyllabusPrerequisite => "syllabus_prerequisite",
        }
    }
}

/// Ties a SeaORM entity to its routing kind.
pub trait RoutedEntity: EntityTrait {
    const KIND: EntityKind;
}

macro_rules! routed {
    ($($module:ident => $kind:ident),* $(,)?) => {
        $(
            impl RoutedEntity for entity::$module::Entity {
                const KIND: EntityKind = EntityKind::$kind;
            }
        )*
    };
}

routed! {
    app_user => User,
    role => Role,
    school => School,
    school_db_metadata => TenantConnectionRecord,
    board => Board,
    school_board_mapping => BoardMapping,
    default_class => DefaultClass,
    default_subject => DefaultSubject,
    syllabus_ebook => Ebook,
    catalog_chapter => CatalogChapter,
    catalog_sub_topic => CatalogSubTopic,
    catalog_prerequisite => CatalogPrerequisite,
    academic_year => AcademicYear,
    school_class => SchoolClass,
    school_section => SchoolSection,
    class_assignment => ClassAssignment,
    subject => Subject,
    teacher => Teacher,
    student => Student,
    student_class_assignment => StudentClassAssignment,
    syllabus_chapter => SyllabusChapter,
    syllabus_sub_topic => SyllabusSubTopic,
    syllabus_prerequisite => SyllabusPrerequisite,
}

#[derive(Clone)]
pub struct DatabaseRouter {
    registry: Arc<ConnectionRegistry>,
}

impl DatabaseRouter {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    fn resolve(&self, kind: EntityKind, log_fallback: bool) -> DbKey {
        match kind.plane() {
            Plane::Control => DbKey::control(),
            Plane::Tenant => match context::active_tenant() {
                Some(key) => key,
                None => {
                    if log_fallback {
                        tracing::warn!(
                            target: "campus::routing",
                            kind = kind.as_str(),
                            "no tenant selected; routing tenant entity to control plane"
                        );
                    }
                    DbKey::control()
                }
            },
        }
    }

    pub fn db_for_read(&self, kind: EntityKind) -> DbKey {
        self.resolve(kind, true)
    }

    pub fn db_for_write(&self, kind: EntityKind) -> DbKey {
        self.resolve(kind, true)
    }

    /// Two rows may be related only if both came from the same database and
    /// that is where the router currently sends both of their kinds.
    pub fn allow_relation(&self, a: (EntityKind, &DbKey), b: (EntityKind, &DbKey)) -> bool {
        let (kind_a, db_a) = a;
        let (kind_b, db_b) = b;
        db_a == db_b && self.resolve(kind_a, false) == *db_a && self.resolve(kind_b, false) == *db_b
    }

    /// Control-plane kinds migrate only onto the control plane; tenant kinds
    /// onto any database except it.
    pub fn allow_migrate(&self, db: &DbKey, kind: EntityKind) -> bool {
        match kind.plane() {
            Plane::Control => db.is_control(),
            Plane::Tenant => !db.is_control(),
        }
    }

    /// Live connection for `kind` under the current tenant selection.
    pub fn connection_for(&self, kind: EntityKind) -> Result<DatabaseConnection, TenancyError> {
        let key = self.db_for_read(kind);
        self.connection_at(&key)
    }

    pub fn connection<E: RoutedEntity>(&self) -> Result<DatabaseConnection, TenancyError> {
        self.connection_for(E::KIND)
    }

    pub fn connection_at(&self, key: &DbKey) -> Result<DatabaseConnection, TenancyError> {
        if let Some(conn) = self.registry.get_ready(key) {
            return Ok(conn);
        }
        if self.registry.contains(key) {
            Err(TenancyError::TenantNotReady(key.clone()))
        } else {
            Err(TenancyError::NotFound(format!("Tenant database {key}")))
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }
}
