//! Syllabus catalog ingestion: store an uploaded e-book, then extract its
//! chapters into the shared control-plane catalog.

use std::collections::HashSet;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};

use crate::collaborators::{CollaboratorError, ExtractedChapter, ObjectStore, SyllabusExtractor};
use crate::entity::{
    board, catalog_chapter, catalog_prerequisite, catalog_sub_topic, default_class,
    default_subject, syllabus_ebook,
};

#[derive(Debug)]
pub enum CatalogError {
    NotFound(String),
    Validation(String),
    Storage(CollaboratorError),
    Extraction(CollaboratorError),
    Database(DbErr),
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::NotFound(what) => write!(f, "{what} not found"),
            CatalogError::Validation(msg) => write!(f, "{msg}"),
            CatalogError::Storage(e) => write!(f, "Storage failed: {e}"),
            CatalogError::Extraction(e) => write!(f, "Extraction failed: {e}"),
            CatalogError::Database(e) => write!(f, "Database error: {e}"),
        }
    }
}

impl std::error::Error for CatalogError {}

impl From<DbErr> for CatalogError {
    fn from(e: DbErr) -> Self {
        CatalogError::Database(e)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadType {
    ChapterWise,
    Full,
}

impl UploadType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadType::ChapterWise => "chapter_wise",
            UploadType::Full => "full",
        }
    }
}

#[derive(Clone, Debug)]
pub struct EbookUpload {
    pub board_id: i32,
    pub class_id: i32,
    pub subject_id: i32,
    pub upload_type: UploadType,
    pub chapter_number: Option<i32>,
    pub content: Vec<u8>,
}

#[derive(Clone, Debug, Serialize)]
pub struct EbookIngest {
    pub ebook_id: i32,
    pub ebook_name: String,
    pub file_path: String,
    pub chapters: usize,
    pub sub_topics: usize,
    pub prerequisites: usize,
}

/// File name and object key for an upload. Chapter-wise uploads get their
/// own subject folder and a `{subject}_chapter_{n}` name.
pub fn ebook_object_key(
    class_number: i32,
    board_name: &str,
    subject_name: &str,
    upload_type: UploadType,
    chapter_number: Option<i32>,
) -> Result<(String, String), CatalogError> {
    let board = board_name.replace(' ', "_");
    match upload_type {
        UploadType::ChapterWise => {
            let n = chapter_number.ok_or_else(|| {
                CatalogError::Validation(
                    "chapter_number is required for chapter-wise uploads".to_string(),
                )
            })?;
            let file_name = format!("{subject_name}_chapter_{n}");
            let key = format!("ebooks/class_{class_number}/{board}/{subject_name}/{file_name}");
            Ok((file_name, key))
        }
        UploadType::Full => {
            let file_name = subject_name.to_string();
            let key = format!("ebooks/class_{class_number}/{board}/{file_name}");
            Ok((file_name, key))
        }
    }
}

pub struct CatalogService<'a> {
    db: &'a DatabaseConnection,
    store: &'a dyn ObjectStore,
    extractor: &'a dyn SyllabusExtractor,
}

impl<'a> CatalogService<'a> {
    pub fn new(
        db: &'a DatabaseConnection,
        store: &'a dyn ObjectStore,
        extractor: &'a dyn SyllabusExtractor,
    ) -> Self {
        Self {
            db,
            store,
            extractor,
        }
    }

    /// Store the document, upsert its e-book row and replace the e-book's
    /// catalog chapters with a fresh extraction. If extraction or the
    /// database write fails, the stored object is removed again.
    pub async fn upload_ebook(&self, upload: EbookUpload) -> Result<EbookIngest, CatalogError> {
        if upload.content.is_empty() {
            return Err(CatalogError::Validation("Uploaded file is empty".to_string()));
        }
        let board = board::Entity::find_by_id(upload.board_id)
            .one(self.db)
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("Board {}", upload.board_id)))?;
        let class = default_class::Entity::find_by_id(upload.class_id)
            .one(self.db)
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("Class {}", upload.class_id)))?;
        let subject = default_subject::Entity::find_by_id(upload.subject_id)
            .one(self.db)
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("Subject {}", upload.subject_id)))?;

        let (file_name, key) = ebook_object_key(
            class.class_number,
            &board.board_name,
            &subject.name,
            upload.upload_type,
            upload.chapter_number,
        )?;

        self.store
            .put(&key, &upload.content)
            .await
            .map_err(CatalogError::Storage)?;

        match self.ingest(&upload, &file_name, &key).await {
            Ok(done) => {
                tracing::info!(
                    ebook_id = done.ebook_id,
                    key = %key,
                    chapters = done.chapters,
                    "ebook ingested"
                );
                Ok(done)
            }
            Err(e) => {
                if let Err(cleanup) = self.store.delete(&key).await {
                    tracing::warn!(key = %key, error = %cleanup, "failed to remove orphaned upload");
                }
                tracing::error!(key = %key, error = %e, "ebook ingestion failed");
                Err(e)
            }
        }
    }

    async fn ingest(
        &self,
        upload: &EbookUpload,
        file_name: &str,
        key: &str,
    ) -> Result<EbookIngest, CatalogError> {
        let chapters = self
            .extractor
            .extract(&upload.content)
            .await
            .map_err(CatalogError::Extraction)?;

        let txn = self.db.begin().await?;
        let ebook = upsert_ebook(&txn, upload, file_name, key).await?;
        let (n_chapters, n_sub_topics, n_prereqs) = replace_chapters(&txn, ebook.id, &chapters).await?;
        txn.commit().await?;

        Ok(EbookIngest {
            ebook_id: ebook.id,
            ebook_name: ebook.ebook_name,
            file_path: ebook.file_path,
            chapters: n_chapters,
            sub_topics: n_sub_topics,
            prerequisites: n_prereqs,
        })
    }
}

async fn upsert_ebook<C: ConnectionTrait>(
    conn: &C,
    upload: &EbookUpload,
    file_name: &str,
    key: &str,
) -> Result<syllabus_ebook::Model, DbErr> {
    let now = Utc::now().naive_utc();
    let existing = syllabus_ebook::Entity::find()
        .filter(syllabus_ebook::Column::BoardId.eq(upload.board_id))
        .filter(syllabus_ebook::Column::SubjectId.eq(upload.subject_id))
        .filter(syllabus_ebook::Column::ClassId.eq(upload.class_id))
        .filter(syllabus_ebook::Column::EbookName.eq(file_name))
        .one(conn)
        .await?;

    match existing {
        Some(ebook) => {
            let mut active: syllabus_ebook::ActiveModel = ebook.into();
            active.ebook_type = Set(Some(upload.upload_type.as_str().to_string()));
            active.file_path = Set(key.to_string());
            active.updated_at = Set(now);
            active.update(conn).await
        }
        None => {
            syllabus_ebook::ActiveModel {
                board_id: Set(upload.board_id),
                subject_id: Set(upload.subject_id),
                class_id: Set(upload.class_id),
                ebook_type: Set(Some(upload.upload_type.as_str().to_string())),
                ebook_name: Set(file_name.to_string()),
                file_path: Set(key.to_string()),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(conn)
            .await
        }
    }
}

async fn replace_chapters<C: ConnectionTrait>(
    conn: &C,
    ebook_id: i32,
    chapters: &[ExtractedChapter],
) -> Result<(usize, usize, usize), DbErr> {
    let old: Vec<i32> = catalog_chapter::Entity::find()
        .filter(catalog_chapter::Column::EbookId.eq(ebook_id))
        .all(conn)
        .await?
        .into_iter()
        .map(|c| c.id)
        .collect();
    if !old.is_empty() {
        catalog_sub_topic::Entity::delete_many()
            .filter(catalog_sub_topic::Column::ChapterId.is_in(old.clone()))
            .exec(conn)
            .await?;
        catalog_prerequisite::Entity::delete_many()
            .filter(catalog_prerequisite::Column::ChapterId.is_in(old.clone()))
            .exec(conn)
            .await?;
        catalog_chapter::Entity::delete_many()
            .filter(catalog_chapter::Column::Id.is_in(old))
            .exec(conn)
            .await?;
    }

    let mut seen_numbers = HashSet::new();
    let (mut n_chapters, mut n_sub_topics, mut n_prereqs) = (0, 0, 0);
    for extracted in chapters {
        if !seen_numbers.insert(extracted.chapter_number) {
            tracing::warn!(
                ebook_id,
                chapter_number = extracted.chapter_number,
                "duplicate chapter number in extraction; keeping the first"
            );
            continue;
        }
        let chapter = catalog_chapter::ActiveModel {
            ebook_id: Set(ebook_id),
            chapter_number: Set(extracted.chapter_number),
            chapter_name: Set(extracted.chapter_name.clone()),
            ..Default::default()
        }
        .insert(conn)
        .await?;
        n_chapters += 1;

        let mut seen = HashSet::new();
        for name in extracted.sub_topics.iter().filter(|n| seen.insert(n.as_str())) {
            catalog_sub_topic::ActiveModel {
                chapter_id: Set(chapter.id),
                name: Set(name.clone()),
                ..Default::default()
            }
            .insert(conn)
            .await?;
            n_sub_topics += 1;
        }

        let mut seen = HashSet::new();
        for p in extracted
            .pre_requisites
            .iter()
            .filter(|p| seen.insert(p.topic.as_str()))
        {
            catalog_prerequisite::ActiveModel {
                chapter_id: Set(chapter.id),
                topic: Set(p.topic.clone()),
                explanation: Set(p.explanation.clone()),
                ..Default::default()
            }
            .insert(conn)
            .await?;
            n_prereqs += 1;
        }
    }
    Ok((n_chapters, n_sub_topics, n_prereqs))
}
