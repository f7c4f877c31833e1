use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "artist")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub image: Option<String>,
    /// -1 until aggregated
    pub total_runtime_ms: i64,
    /// Unix seconds, NULL for stubs created from track credits
    pub last_updated: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::album::Entity")]
    Album,
    #[sea_orm(has_many = "super::artist_track::Entity")]
    ArtistTrack,
}

impl Related<super::album::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Album.def()
    }
}

impl Related<super::track::Entity> for Entity {
    fn to() -> RelationDef {
        super::artist_track::Relation::Track.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::artist_track::Relation::Artist.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
