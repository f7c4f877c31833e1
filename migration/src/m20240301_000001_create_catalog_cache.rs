use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Artists are keyed by their Spotify id
        manager
            .create_table(
                Table::create()
                    .table(Artist::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Artist::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Artist::Name).string().not_null())
                    .col(ColumnDef::new(Artist::Image).string().null())
                    // -1 until the runtime has been aggregated
                    .col(
                        ColumnDef::new(Artist::TotalRuntimeMs)
                            .big_integer()
                            .not_null()
                            .default(-1),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Album::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Album::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Album::Name).string().not_null())
                    .col(ColumnDef::new(Album::ArtistId).string().not_null())
                    .col(ColumnDef::new(Album::Image).string().null())
                    .col(
                        ColumnDef::new(Album::TotalRuntimeMs)
                            .big_integer()
                            .not_null()
                            .default(-1),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_album_artist_id")
                            .from(Album::Table, Album::ArtistId)
                            .to(Artist::Table, Artist::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Track::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Track::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Track::Name).string().not_null())
                    .col(ColumnDef::new(Track::RuntimeMs).big_integer().not_null())
                    .col(ColumnDef::new(Track::AlbumId).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_track_album_id")
                            .from(Track::Table, Track::AlbumId)
                            .to(Album::Table, Album::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ArtistTrack::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ArtistTrack::TrackId).string().not_null())
                    .col(ColumnDef::new(ArtistTrack::ArtistId).string().not_null())
                    .primary_key(
                        Index::create()
                            .col(ArtistTrack::TrackId)
                            .col(ArtistTrack::ArtistId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_artist_track_track_id")
                            .from(ArtistTrack::Table, ArtistTrack::TrackId)
                            .to(Track::Table, Track::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_artist_track_artist_id")
                            .from(ArtistTrack::Table, ArtistTrack::ArtistId)
                            .to(Artist::Table, Artist::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_album_artist_id")
                    .table(Album::Table)
                    .col(Album::ArtistId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_track_album_id")
                    .table(Track::Table)
                    .col(Track::AlbumId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_artist_track_artist_id")
                    .table(ArtistTrack::Table)
                    .col(ArtistTrack::ArtistId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ArtistTrack::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Track::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Album::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Artist::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Artist {
    Table,
    Id,
    Name,
    Image,
    TotalRuntimeMs,
}

#[derive(DeriveIden)]
enum Album {
    Table,
    Id,
    Name,
    ArtistId,
    Image,
    TotalRuntimeMs,
}

#[derive(DeriveIden)]
enum Track {
    Table,
    Id,
    Name,
    RuntimeMs,
    AlbumId,
}

#[derive(DeriveIden)]
enum ArtistTrack {
    Table,
    TrackId,
    ArtistId,
}
