//! Progress photos: image bytes in object storage, metadata rows in `progress_photos`.
//!
//! Bytes cannot ride the sync queue, so uploads need a connection. The
//! metadata row follows the usual two-phase write once the object is stored.

use crate::error::{ProgressError, ProgressResult};
use crate::service::{EntityService, ServiceContext};
use chrono::{NaiveDate, Utc};
use hardline_cloud::ObjectStorage;
use hardline_types::{format_date, new_record_id, ChallengeId, ProgressPhoto};
use std::ops::Deref;
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub struct PhotoService {
    records: EntityService<ProgressPhoto>,
    objects: Arc<dyn ObjectStorage>,
    bucket: String,
}

impl PhotoService {
    pub fn new(ctx: ServiceContext, objects: Arc<dyn ObjectStorage>, bucket: impl Into<String>) -> Self {
        Self {
            records: EntityService::new(ctx),
            objects,
            bucket: bucket.into(),
        }
    }

    /// Uploads an image and records it for the day.
    pub async fn upload(
        &self,
        challenge_id: &ChallengeId,
        date: NaiveDate,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> ProgressResult<ProgressPhoto> {
        if bytes.is_empty() {
            return Err(ProgressError::InvalidInput("photo is empty".into()));
        }
        if !self.context().connectivity.is_online() {
            return Err(ProgressError::Offline("photo upload"));
        }

        let id = new_record_id();
        let path = format!(
            "{challenge_id}/{}/{id}.{}",
            format_date(date),
            extension_for(content_type)
        );
        self.objects
            .upload(&self.bucket, &path, bytes, content_type)
            .await?;

        let photo = ProgressPhoto {
            id,
            challenge_id: challenge_id.clone(),
            date,
            public_url: self.objects.public_url(&self.bucket, &path),
            storage_path: path,
            created_at: Some(Utc::now()),
        };
        self.save(photo).await
    }

    /// Removes the stored image (best effort) and the metadata row.
    pub async fn delete(&self, photo: &ProgressPhoto) -> ProgressResult<()> {
        if self.context().connectivity.is_online() {
            match self.objects.remove(&self.bucket, &photo.storage_path).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => warn!("failed to remove photo object {}: {e}", photo.storage_path),
            }
        }
        self.records
            .delete(&photo.id, &photo.challenge_id, photo.date)
            .await
    }
}

impl Deref for PhotoService {
    type Target = EntityService<ProgressPhoto>;

    fn deref(&self) -> &Self::Target {
        &self.records
    }
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/heic" => "heic",
        _ => "bin",
    }
}
