use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // board
        manager
            .create_table(
                Table::create()
                    .table(Board::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Board::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Board::BoardName)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Board::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .to_owned(),
            )
            .await?;

        // school
        manager
            .create_table(
                Table::create()
                    .table(School::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(School::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(School::Name).string().not_null())
                    .col(ColumnDef::new(School::Address).text().not_null())
                    .col(ColumnDef::new(School::ContactNumber).string().null())
                    .col(ColumnDef::new(School::Email).string().null().unique_key())
                    .col(ColumnDef::new(School::SchoolAdminId).uuid().null())
                    .col(
                        ColumnDef::new(School::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(School::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(School::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_school_admin")
                            .from(School::Table, School::SchoolAdminId)
                            .to(AppUser::Table, AppUser::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // school_board_mapping
        manager
            .create_table(
                Table::create()
                    .table(SchoolBoardMapping::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SchoolBoardMapping::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SchoolBoardMapping::SchoolId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SchoolBoardMapping::BoardId)
                            .integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sbm_school")
                            .from(SchoolBoardMapping::Table, SchoolBoardMapping::SchoolId)
                            .to(School::Table, School::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sbm_board")
                            .from(SchoolBoardMapping::Table, SchoolBoardMapping::BoardId)
                            .to(Board::Table, Board::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .unique()
                    .name("uq_school_board")
                    .table(SchoolBoardMapping::Table)
                    .col(SchoolBoardMapping::SchoolId)
                    .col(SchoolBoardMapping::BoardId)
                    .to_owned(),
            )
            .await?;

        // school_db_metadata
        manager
            .create_table(
                Table::create()
                    .table(SchoolDbMetadata::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SchoolDbMetadata::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SchoolDbMetadata::SchoolId)
                            .integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(SchoolDbMetadata::DbName)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(SchoolDbMetadata::DbUser).string().not_null())
                    .col(
                        ColumnDef::new(SchoolDbMetadata::DbPassword)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SchoolDbMetadata::DbHost)
                            .string()
                            .not_null()
                            .default("127.0.0.1"),
                    )
                    .col(
                        ColumnDef::new(SchoolDbMetadata::DbPort)
                            .integer()
                            .not_null()
                            .default(5432),
                    )
                    .col(
                        ColumnDef::new(SchoolDbMetadata::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(SchoolDbMetadata::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(SchoolDbMetadata::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sdm_school")
                            .from(SchoolDbMetadata::Table, SchoolDbMetadata::SchoolId)
                            .to(School::Table, School::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SchoolDbMetadata::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SchoolBoardMapping::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(School::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Board::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Board {
    Table,
    Id,
    BoardName,
    IsActive,
}

#[derive(Iden)]
enum School {
    Table,
    Id,
    Name,
    Address,
    ContactNumber,
    Email,
    SchoolAdminId,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum SchoolBoardMapping {
    Table,
    Id,
    SchoolId,
    BoardId,
}

#[derive(Iden)]
enum SchoolDbMetadata {
    Table,
    Id,
    SchoolId,
    DbName,
    DbUser,
    DbPassword,
    DbHost,
    DbPort,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum AppUser {
    Table,
    Id,
}
