use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(SchoolDbMetadata::Table)
                    .add_column(
                        ColumnDef::new(SchoolDbMetadata::ProvisioningComplete)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(SchoolDbMetadata::Table)
                    .drop_column(SchoolDbMetadata::ProvisioningComplete)
                    .to_owned(),
            )
            .await
    }
}

#[derive(Iden)]
enum SchoolDbMetadata {
    Table,
    ProvisioningComplete,
}
