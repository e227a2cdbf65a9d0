use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // syllabus_chapter has no natural-key index; replication may insert a
        // chapter more than once.
        manager
            .create_table(
                Table::create()
                    .table(SyllabusChapter::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SyllabusChapter::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SyllabusChapter::BoardId).integer().not_null())
                    .col(
                        ColumnDef::new(SyllabusChapter::AcademicYearId)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SyllabusChapter::ClassId).integer().null())
                    .col(ColumnDef::new(SyllabusChapter::SubjectId).integer().null())
                    .col(
                        ColumnDef::new(SyllabusChapter::ChapterNumber)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SyllabusChapter::ChapterName)
                            .string()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_chapter_academic_year")
                            .from(SyllabusChapter::Table, SyllabusChapter::AcademicYearId)
                            .to(AcademicYear::Table, AcademicYear::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_chapter_class")
                            .from(SyllabusChapter::Table, SyllabusChapter::ClassId)
                            .to(SchoolClass::Table, SchoolClass::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_chapter_subject")
                            .from(SyllabusChapter::Table, SyllabusChapter::SubjectId)
                            .to(Subject::Table, Subject::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // syllabus_sub_topic
        manager
            .create_table(
                Table::create()
                    .table(SyllabusSubTopic::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SyllabusSubTopic::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SyllabusSubTopic::ChapterId)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SyllabusSubTopic::Name).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sub_topic_chapter")
                            .from(SyllabusSubTopic::Table, SyllabusSubTopic::ChapterId)
                            .to(SyllabusChapter::Table, SyllabusChapter::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .unique()
                    .name("uq_sub_topic_chapter_name")
                    .table(SyllabusSubTopic::Table)
                    .col(SyllabusSubTopic::ChapterId)
                    .col(SyllabusSubTopic::Name)
                    .to_owned(),
            )
            .await?;

        // syllabus_prerequisite
        manager
            .create_table(
                Table::create()
                    .table(SyllabusPrerequisite::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SyllabusPrerequisite::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SyllabusPrerequisite::ChapterId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SyllabusPrerequisite::Topic)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SyllabusPrerequisite::Explanation)
                            .text()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_prerequisite_chapter")
                            .from(SyllabusPrerequisite::Table, SyllabusPrerequisite::ChapterId)
                            .to(SyllabusChapter::Table, SyllabusChapter::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .unique()
                    .name("uq_prerequisite_chapter_topic")
                    .table(SyllabusPrerequisite::Table)
                    .col(SyllabusPrerequisite::ChapterId)
                    .col(SyllabusPrerequisite::Topic)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SyllabusPrerequisite::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SyllabusSubTopic::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SyllabusChapter::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum SyllabusChapter {
    Table,
    Id,
    BoardId,
    AcademicYearId,
    ClassId,
    SubjectId,
    ChapterNumber,
    ChapterName,
}

#[derive(Iden)]
enum SyllabusSubTopic {
    Table,
    Id,
    ChapterId,
    Name,
}

#[derive(Iden)]
enum SyllabusPrerequisite {
    Table,
    Id,
    ChapterId,
    Topic,
    Explanation,
}

#[derive(Iden)]
enum AcademicYear {
    Table,
    Id,
}

#[derive(Iden)]
enum SchoolClass {
    Table,
    Id,
}

#[derive(Iden)]
enum Subject {
    Table,
    Id,
}
