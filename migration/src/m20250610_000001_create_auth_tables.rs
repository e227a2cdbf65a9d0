use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Roles every deployment starts with. `admin` is looked up by name when a
/// school is provisioned, so it must exist before the first provisioning run.
const SEEDED_ROLES: [&str; 4] = ["superadmin", "admin", "teacher", "student"];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Role::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Role::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Role::Name).string().not_null().unique_key())
                    .to_owned(),
            )
            .await?;

        for name in SEEDED_ROLES {
            manager
                .exec_stmt(
                    Query::insert()
                        .into_table(Role::Table)
                        .columns([Role::Name])
                        .values_panic([name.into()])
                        .to_owned(),
                )
                .await?;
        }

        manager
            .create_table(
                Table::create()
                    .table(AppUser::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(AppUser::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(AppUser::UserName)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(AppUser::Email).string().not_null())
                    .col(ColumnDef::new(AppUser::PasswordHash).string().not_null())
                    .col(ColumnDef::new(AppUser::RoleId).integer().null())
                    .col(ColumnDef::new(AppUser::SchoolId).integer().null())
                    .col(
                        ColumnDef::new(AppUser::IsSuperuser)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(AppUser::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(AppUser::FirstName).string().null())
                    .col(ColumnDef::new(AppUser::LastName).string().null())
                    .col(ColumnDef::new(AppUser::PhoneNumber).string().null())
                    .col(ColumnDef::new(AppUser::LastLoginAt).timestamp().null())
                    .col(
                        ColumnDef::new(AppUser::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(AppUser::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_app_user_role")
                            .from(AppUser::Table, AppUser::RoleId)
                            .to(Role::Table, Role::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AppUser::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Role::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Role {
    Table,
    Id,
    Name,
}

#[derive(Iden)]
enum AppUser {
    Table,
    Id,
    UserName,
    Email,
    PasswordHash,
    RoleId,
    SchoolId,
    IsSuperuser,
    IsActive,
    FirstName,
    LastName,
    PhoneNumber,
    LastLoginAt,
    CreatedAt,
    UpdatedAt,
}
