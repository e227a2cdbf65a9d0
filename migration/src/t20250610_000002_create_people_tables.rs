use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // teacher; user_id references app_user in the control plane, so no FK
        manager
            .create_table(
                Table::create()
                    .table(Teacher::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Teacher::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Teacher::UserId).uuid().not_null().unique_key())
                    .col(ColumnDef::new(Teacher::Qualification).string().null())
                    .col(ColumnDef::new(Teacher::Experience).double().null())
                    .col(ColumnDef::new(Teacher::JoiningDate).date().null())
                    .col(ColumnDef::new(Teacher::EmergencyContact).string().null())
                    .col(
                        ColumnDef::new(Teacher::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Teacher::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Teacher::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // student
        manager
            .create_table(
                Table::create()
                    .table(Student::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Student::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Student::UserId).uuid().not_null())
                    .col(ColumnDef::new(Student::RollNumber).string().not_null())
                    .col(ColumnDef::new(Student::AdmissionDate).date().not_null())
                    .col(ColumnDef::new(Student::ParentName).string().not_null())
                    .col(ColumnDef::new(Student::ParentPhone).string().not_null())
                    .col(ColumnDef::new(Student::ParentEmail).string().not_null())
                    .col(
                        ColumnDef::new(Student::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Student::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Student::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .unique()
                    .name("uq_student_user_roll")
                    .table(Student::Table)
                    .col(Student::UserId)
                    .col(Student::RollNumber)
                    .to_owned(),
            )
            .await?;

        // class_assignment
        manager
            .create_table(
                Table::create()
                    .table(ClassAssignment::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ClassAssignment::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ClassAssignment::SectionId)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ClassAssignment::TeacherId).integer().null())
                    .col(
                        ColumnDef::new(ClassAssignment::AcademicYearId)
                            .integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ca_section")
                            .from(ClassAssignment::Table, ClassAssignment::SectionId)
                            .to(SchoolSection::Table, SchoolSection::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ca_teacher")
                            .from(ClassAssignment::Table, ClassAssignment::TeacherId)
                            .to(Teacher::Table, Teacher::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ca_academic_year")
                            .from(ClassAssignment::Table, ClassAssignment::AcademicYearId)
                            .to(AcademicYear::Table, AcademicYear::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .unique()
                    .name("uq_class_assignment")
                    .table(ClassAssignment::Table)
                    .col(ClassAssignment::SectionId)
                    .col(ClassAssignment::TeacherId)
                    .col(ClassAssignment::AcademicYearId)
                    .to_owned(),
            )
            .await?;

        // student_class_assignment
        manager
            .create_table(
                Table::create()
                    .table(StudentClassAssignment::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StudentClassAssignment::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(StudentClassAssignment::StudentId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StudentClassAssignment::SectionId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StudentClassAssignment::AcademicYearId)
                            .integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sca_student")
                            .from(
                                StudentClassAssignment::Table,
                                StudentClassAssignment::StudentId,
                            )
                            .to(Student::Table, Student::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sca_section")
                            .from(
                                StudentClassAssignment::Table,
                                StudentClassAssignment::SectionId,
                            )
                            .to(SchoolSection::Table, SchoolSection::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sca_academic_year")
                            .from(
                                StudentClassAssignment::Table,
                                StudentClassAssignment::AcademicYearId,
                            )
                            .to(AcademicYear::Table, AcademicYear::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .unique()
                    .name("uq_student_academic_year")
                    .table(StudentClassAssignment::Table)
                    .col(StudentClassAssignment::StudentId)
                    .col(StudentClassAssignment::AcademicYearId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StudentClassAssignment::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ClassAssignment::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Student::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Teacher::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Teacher {
    Table,
    Id,
    UserId,
    Qualification,
    Experience,
    JoiningDate,
    EmergencyContact,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Student {
    Table,
    Id,
    UserId,
    RollNumber,
    AdmissionDate,
    ParentName,
    ParentPhone,
    ParentEmail,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum ClassAssignment {
    Table,
    Id,
    SectionId,
    TeacherId,
    AcademicYearId,
}

#[derive(Iden)]
enum StudentClassAssignment {
    Table,
    Id,
    StudentId,
    SectionId,
    AcademicYearId,
}

#[derive(Iden)]
enum SchoolSection {
    Table,
    Id,
}

#[derive(Iden)]
enum AcademicYear {
    Table,
    Id,
}
