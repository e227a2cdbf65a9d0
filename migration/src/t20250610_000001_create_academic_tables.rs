use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // academic_year
        manager
            .create_table(
                Table::create()
                    .table(AcademicYear::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AcademicYear::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AcademicYear::StartYear).integer().null())
                    .col(ColumnDef::new(AcademicYear::EndYear).integer().null())
                    .col(
                        ColumnDef::new(AcademicYear::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .unique()
                    .name("uq_academic_year_span")
                    .table(AcademicYear::Table)
                    .col(AcademicYear::StartYear)
                    .col(AcademicYear::EndYear)
                    .to_owned(),
            )
            .await?;

        // school_class
        manager
            .create_table(
                Table::create()
                    .table(SchoolClass::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SchoolClass::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SchoolClass::ClassNumber)
                            .integer()
                            .not_null()
                            .unique_key(),
                    )
                    .to_owned(),
            )
            .await?;

        // school_section
        manager
            .create_table(
                Table::create()
                    .table(SchoolSection::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SchoolSection::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SchoolSection::ClassId).integer().not_null())
                    .col(ColumnDef::new(SchoolSection::Section).string().not_null())
                    .col(ColumnDef::new(SchoolSection::BoardId).integer().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_section_class")
                            .from(SchoolSection::Table, SchoolSection::ClassId)
                            .to(SchoolClass::Table, SchoolClass::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .unique()
                    .name("uq_class_section")
                    .table(SchoolSection::Table)
                    .col(SchoolSection::ClassId)
                    .col(SchoolSection::Section)
                    .to_owned(),
            )
            .await?;

        // subject
        manager
            .create_table(
                Table::create()
                    .table(Subject::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Subject::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Subject::Name).string().not_null().unique_key())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Subject::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SchoolSection::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SchoolClass::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AcademicYear::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum AcademicYear {
    Table,
    Id,
    StartYear,
    EndYear,
    IsActive,
}

#[derive(Iden)]
enum SchoolClass {
    Table,
    Id,
    ClassNumber,
}

#[derive(Iden)]
enum SchoolSection {
    Table,
    Id,
    ClassId,
    Section,
    BoardId,
}

#[derive(Iden)]
enum Subject {
    Table,
    Id,
    Name,
}
