use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // default_class
        manager
            .create_table(
                Table::create()
                    .table(DefaultClass::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DefaultClass::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DefaultClass::ClassNumber)
                            .integer()
                            .not_null()
                            .unique_key(),
                    )
                    .to_owned(),
            )
            .await?;

        // default_subject
        manager
            .create_table(
                Table::create()
                    .table(DefaultSubject::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DefaultSubject::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DefaultSubject::Name)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .to_owned(),
            )
            .await?;

        // syllabus_ebook
        manager
            .create_table(
                Table::create()
                    .table(SyllabusEbook::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SyllabusEbook::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SyllabusEbook::BoardId).integer().not_null())
                    .col(ColumnDef::new(SyllabusEbook::SubjectId).integer().not_null())
                    .col(ColumnDef::new(SyllabusEbook::ClassId).integer().not_null())
                    .col(ColumnDef::new(SyllabusEbook::EbookType).string().null())
                    .col(ColumnDef::new(SyllabusEbook::EbookName).string().not_null())
                    .col(ColumnDef::new(SyllabusEbook::FilePath).string().not_null())
                    .col(
                        ColumnDef::new(SyllabusEbook::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(SyllabusEbook::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ebook_board")
                            .from(SyllabusEbook::Table, SyllabusEbook::BoardId)
                            .to(Board::Table, Board::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ebook_subject")
                            .from(SyllabusEbook::Table, SyllabusEbook::SubjectId)
                            .to(DefaultSubject::Table, DefaultSubject::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ebook_class")
                            .from(SyllabusEbook::Table, SyllabusEbook::ClassId)
                            .to(DefaultClass::Table, DefaultClass::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .unique()
                    .name("uq_syllabus_ebook")
                    .table(SyllabusEbook::Table)
                    .col(SyllabusEbook::BoardId)
                    .col(SyllabusEbook::SubjectId)
                    .col(SyllabusEbook::ClassId)
                    .col(SyllabusEbook::EbookName)
                    .to_owned(),
            )
            .await?;

        // catalog_chapter
        manager
            .create_table(
                Table::create()
                    .table(CatalogChapter::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CatalogChapter::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CatalogChapter::EbookId).integer().not_null())
                    .col(
                        ColumnDef::new(CatalogChapter::ChapterNumber)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CatalogChapter::ChapterName)
                            .string()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_catalog_chapter_ebook")
                            .from(CatalogChapter::Table, CatalogChapter::EbookId)
                            .to(SyllabusEbook::Table, SyllabusEbook::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .unique()
                    .name("uq_catalog_chapter_number")
                    .table(CatalogChapter::Table)
                    .col(CatalogChapter::EbookId)
                    .col(CatalogChapter::ChapterNumber)
                    .to_owned(),
            )
            .await?;

        // catalog_sub_topic
        manager
            .create_table(
                Table::create()
                    .table(CatalogSubTopic::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CatalogSubTopic::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CatalogSubTopic::ChapterId)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CatalogSubTopic::Name).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_catalog_sub_topic_chapter")
                            .from(CatalogSubTopic::Table, CatalogSubTopic::ChapterId)
                            .to(CatalogChapter::Table, CatalogChapter::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .unique()
                    .name("uq_catalog_sub_topic")
                    .table(CatalogSubTopic::Table)
                    .col(CatalogSubTopic::ChapterId)
                    .col(CatalogSubTopic::Name)
                    .to_owned(),
            )
            .await?;

        // catalog_prerequisite
        manager
            .create_table(
                Table::create()
                    .table(CatalogPrerequisite::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CatalogPrerequisite::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CatalogPrerequisite::ChapterId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CatalogPrerequisite::Topic)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CatalogPrerequisite::Explanation)
                            .text()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_catalog_prerequisite_chapter")
                            .from(CatalogPrerequisite::Table, CatalogPrerequisite::ChapterId)
                            .to(CatalogChapter::Table, CatalogChapter::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .unique()
                    .name("uq_catalog_prerequisite")
                    .table(CatalogPrerequisite::Table)
                    .col(CatalogPrerequisite::ChapterId)
                    .col(CatalogPrerequisite::Topic)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CatalogPrerequisite::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CatalogSubTopic::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CatalogChapter::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SyllabusEbook::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(DefaultSubject::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(DefaultClass::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum DefaultClass {
    Table,
    Id,
    ClassNumber,
}

#[derive(Iden)]
enum DefaultSubject {
    Table,
    Id,
    Name,
}

#[derive(Iden)]
enum SyllabusEbook {
    Table,
    Id,
    BoardId,
    SubjectId,
    ClassId,
    EbookType,
    EbookName,
    FilePath,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum CatalogChapter {
    Table,
    Id,
    EbookId,
    ChapterNumber,
    ChapterName,
}

#[derive(Iden)]
enum CatalogSubTopic {
    Table,
    Id,
    ChapterId,
    Name,
}

#[derive(Iden)]
enum CatalogPrerequisite {
    Table,
    Id,
    ChapterId,
    Topic,
    Explanation,
}

#[derive(Iden)]
enum Board {
    Table,
    Id,
}
