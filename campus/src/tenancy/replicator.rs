//! Copies the shared syllabus catalog into a tenant database.

use std::collections::HashMap;
use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;

use crate::entity::{
    catalog_chapter, catalog_prerequisite, catalog_sub_topic, default_class, default_subject,
    school_board_mapping, school_class, subject, syllabus_chapter, syllabus_ebook,
    syllabus_prerequisite, syllabus_sub_topic,
};

use super::registry::ConnectionRegistry;
use super::{DbKey, TenancyError};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReplicationSummary {
    pub chapters: usize,
    pub sub_topics: usize,
    pub prerequisites: usize,
}

struct CatalogChapter {
    board_id: i32,
    class_number: Option<i32>,
    subject_name: Option<String>,
    chapter: catalog_chapter::Model,
    sub_topics: Vec<catalog_sub_topic::Model>,
    prerequisites: Vec<catalog_prerequisite::Model>,
}

pub struct ReferenceDataReplicator {
    registry: Arc<ConnectionRegistry>,
}

impl ReferenceDataReplicator {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Copy the catalog for every board mapped to `school_id` into the tenant
    /// database, binding chapters to `academic_year_id`. Returns false (after
    /// logging) on any failure; nothing from this run is kept in that case.
    ///
    /// Not idempotent: running it twice copies everything twice.
    pub async fn replicate(&self, db_key: &DbKey, school_id: i32, academic_year_id: i32) -> bool {
        match self.try_replicate(db_key, school_id, academic_year_id).await {
            Ok(summary) => {
                tracing::info!(
                    db = %db_key,
                    school_id,
                    chapters = summary.chapters,
                    sub_topics = summary.sub_topics,
                    prerequisites = summary.prerequisites,
                    "catalog replicated"
                );
                true
            }
            Err(e) => {
                tracing::error!(db = %db_key, school_id, error = %e, "catalog replication failed");
                false
            }
        }
    }

    pub async fn try_replicate(
        &self,
        db_key: &DbKey,
        school_id: i32,
        academic_year_id: i32,
    ) -> Result<ReplicationSummary, TenancyError> {
        if db_key.is_control() {
            return Err(TenancyError::RoutingMisconfigured(
                "catalog cannot be replicated into the control plane".to_string(),
            ));
        }
        let tenant = self
            .registry
            .get(db_key)
            .ok_or_else(|| TenancyError::NotFound(format!("Tenant database {db_key}")))?;

        let catalog = self.read_catalog(school_id).await?;

        let txn = tenant.begin().await?;
        match write_catalog(&txn, &catalog, academic_year_id).await {
            Ok(summary) => {
                txn.commit().await?;
                Ok(summary)
            }
            Err(e) => {
                txn.rollback().await?;
                Err(TenancyError::ReplicationFailed(e.to_string()))
            }
        }
    }

    async fn read_catalog(&self, school_id: i32) -> Result<Vec<CatalogChapter>, TenancyError> {
        let db: &DatabaseConnection = self.registry.control();

        let board_ids: Vec<i32> = school_board_mapping::Entity::find()
            .filter(school_board_mapping::Column::SchoolId.eq(school_id))
            .order_by_asc(school_board_mapping::Column::BoardId)
            .all(db)
            .await?
            .into_iter()
            .map(|m| m.board_id)
            .collect();
        if board_ids.is_empty() {
            return Ok(Vec::new());
        }

        let classes: HashMap<i32, i32> = default_class::Entity::find()
            .all(db)
            .await?
            .into_iter()
            .map(|c| (c.id, c.class_number))
            .collect();
        let subjects: HashMap<i32, String> = default_subject::Entity::find()
            .all(db)
            .await?
            .into_iter()
            .map(|s| (s.id, s.name))
            .collect();

        let ebooks = syllabus_ebook::Entity::find()
            .filter(syllabus_ebook::Column::BoardId.is_in(board_ids))
            .order_by_asc(syllabus_ebook::Column::BoardId)
            .order_by_asc(syllabus_ebook::Column::Id)
            .all(db)
            .await?;

        let mut out = Vec::new();
        for ebook in ebooks {
            let chapters = catalog_chapter::Entity::find()
                .filter(catalog_chapter::Column::EbookId.eq(ebook.id))
                .order_by_asc(catalog_chapter::Column::ChapterNumber)
                .all(db)
                .await?;
            for chapter in chapters {
                let sub_topics = catalog_sub_topic::Entity::find()
                    .filter(catalog_sub_topic::Column::ChapterId.eq(chapter.id))
                    .order_by_asc(catalog_sub_topic::Column::Id)
                    .all(db)
                    .await?;
                let prerequisites = catalog_prerequisite::Entity::find()
                    .filter(catalog_prerequisite::Column::ChapterId.eq(chapter.id))
                    .order_by_asc(catalog_prerequisite::Column::Id)
                    .all(db)
                    .await?;
                out.push(CatalogChapter {
                    board_id: ebook.board_id,
                    class_number: classes.get(&ebook.class_id).copied(),
                    subject_name: subjects.get(&ebook.subject_id).cloned(),
                    chapter,
                    sub_topics,
                    prerequisites,
                });
            }
        }
        Ok(out)
    }
}

async fn write_catalog(
    txn: &DatabaseTransaction,
    catalog: &[CatalogChapter],
    academic_year_id: i32,
) -> Result<ReplicationSummary, sea_orm::DbErr> {
    let mut class_ids: HashMap<i32, i32> = HashMap::new();
    let mut subject_ids: HashMap<String, i32> = HashMap::new();
    let mut summary = ReplicationSummary::default();

    for entry in catalog {
        let class_id = match entry.class_number {
            Some(n) => Some(match class_ids.get(&n) {
                Some(id) => *id,
                None => {
                    let id = tenant_class_id(txn, n).await?;
                    class_ids.insert(n, id);
                    id
                }
            }),
            None => None,
        };
        let subject_id = match &entry.subject_name {
            Some(name) => Some(match subject_ids.get(name) {
                Some(id) => *id,
                None => {
                    let id = tenant_subject_id(txn, name).await?;
                    subject_ids.insert(name.clone(), id);
                    id
                }
            }),
            None => None,
        };

        let chapter = syllabus_chapter::ActiveModel {
            board_id: Set(entry.board_id),
            academic_year_id: Set(academic_year_id),
            class_id: Set(class_id),
            subject_id: Set(subject_id),
            chapter_number: Set(entry.chapter.chapter_number),
            chapter_name: Set(entry.chapter.chapter_name.clone()),
            ..Default::default()
        }
        .insert(txn)
        .await?;
        summary.chapters += 1;

        for topic in &entry.sub_topics {
            syllabus_sub_topic::ActiveModel {
                chapter_id: Set(chapter.id),
                name: Set(topic.name.clone()),
                ..Default::default()
            }
            .insert(txn)
            .await?;
            summary.sub_topics += 1;
        }

        for prereq in &entry.prerequisites {
            syllabus_prerequisite::ActiveModel {
                chapter_id: Set(chapter.id),
                topic: Set(prereq.topic.clone()),
                explanation: Set(prereq.explanation.clone()),
                ..Default::default()
            }
            .insert(txn)
            .await?;
            summary.prerequisites += 1;
        }
    }

    Ok(summary)
}

async fn tenant_class_id(txn: &DatabaseTransaction, class_number: i32) -> Result<i32, sea_orm::DbErr> {
    if let Some(existing) = school_class::Entity::find()
        .filter(school_class::Column::ClassNumber.eq(class_number))
        .one(txn)
        .await?
    {
        return Ok(existing.id);
    }
    let created = school_class::ActiveModel {
        class_number: Set(class_number),
        ..Default::default()
    }
    .insert(txn)
    .await?;
    Ok(created.id)
}

async fn tenant_subject_id(txn: &DatabaseTransaction, name: &str) -> Result<i32, sea_orm::DbErr> {
    if let Some(existing) = subject::Entity::find()
        .filter(subject::Column::Name.eq(name))
        .one(txn)
        .await?
    {
        return Ok(existing.id);
    }
    let created = subject::ActiveModel {
        name: Set(name.to_string()),
        ..Default::default()
    }
    .insert(txn)
    .await?;
    Ok(created.id)
}
