use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Unix seconds of the last remote refresh or aggregation, NULL for stubs
        manager
            .alter_table(
                Table::alter()
                    .table("artist")
                    .add_column(ColumnDef::new("last_updated").big_integer().null())
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table("artist")
                    .drop_column("last_updated")
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}
