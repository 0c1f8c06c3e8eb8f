//! 이미지 스토어
//!
//! - [`ImageReader`]: 조회 경로용 읽기 전용 인터페이스
//! - [`ImageStore`]: 재조정 엔진과 워커가 쓰는 읽기/쓰기 인터페이스
//! - [`MemoryStore`]: 메모리 구현. 경로가 주어지면 JSON 스냅샷 파일로 영속화
//!
//! 읽기 핸들([`MemoryReader`])은 [`MemoryStore::reader`]로 얻으며 같은 데이터를 공유합니다.

use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use tidewatch_core::error::StorageError;
use tidewatch_core::types::ImageReference;

use crate::model::RawImage;

/// 읽기 전용 이미지 조회
pub trait ImageReader: Send + Sync + 'static {
    fn raw_image(
        &self,
        reference: &ImageReference,
    ) -> impl Future<Output = Result<Option<RawImage>, StorageError>> + Send;

    /// 키 순서로 정렬된 모든 이미지
    fn raw_images(&self) -> impl Future<Output = Result<Vec<RawImage>, StorageError>> + Send;
}

/// 읽기/쓰기 이미지 스토어
pub trait ImageStore: ImageReader {
    /// 이미지를 upsert합니다. 새로 생성되었으면 `true`를 반환합니다.
    ///
    /// 기존 레코드는 태그와 그래프만 덮어쓰고 `last_processed`는 유지합니다.
    fn insert_raw_image(
        &self,
        image: RawImage,
    ) -> impl Future<Output = Result<bool, StorageError>> + Send;

    /// `present`에 없는 모든 이미지를 삭제하고 삭제된 개수를 반환합니다.
    fn delete_non_present(
        &self,
        present: &[ImageReference],
    ) -> impl Future<Output = Result<u64, StorageError>> + Send;

    /// 처리 완료 시각을 기록합니다.
    fn mark_processed(
        &self,
        reference: &ImageReference,
        at: SystemTime,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// `older_than`보다 먼저 처리되었거나 처리된 적 없는 이미지를
    /// 오래된 순으로 최대 `limit`개 반환합니다.
    fn stale_images(
        &self,
        older_than: SystemTime,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<ImageReference>, StorageError>> + Send;
}

type Images = BTreeMap<String, RawImage>;

/// 메모리 이미지 스토어
#[derive(Clone, Default)]
pub struct MemoryStore {
    images: Arc<RwLock<Images>>,
    path: Option<PathBuf>,
}

impl MemoryStore {
    /// 영속화 없는 스토어
    pub fn new() -> Self {
        Self::default()
    }

    /// 스냅샷 파일로 영속화되는 스토어를 엽니다. 파일이 있으면 내용을 불러옵니다.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let images = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let list: Vec<RawImage> = serde_json::from_slice(&bytes).map_err(|e| {
                    StorageError::Query(format!("corrupt store file {}: {e}", path.display()))
                })?;
                list.into_iter().map(|i| (i.key(), i)).collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Images::new(),
            Err(e) => {
                return Err(StorageError::Query(format!(
                    "read store file {}: {e}",
                    path.display()
                )));
            }
        };
        info!(path = %path.display(), images = images.len(), "image store opened");
        Ok(Self {
            images: Arc::new(RwLock::new(images)),
            path: Some(path),
        })
    }

    /// 같은 데이터를 공유하는 읽기 전용 핸들
    pub fn reader(&self) -> MemoryReader {
        MemoryReader {
            images: Arc::clone(&self.images),
        }
    }

    pub async fn len(&self) -> usize {
        self.images.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.images.read().await.is_empty()
    }

    /// 현재 내용을 스냅샷 파일에 기록합니다. 영속화 경로가 없으면 아무것도 하지 않습니다.
    ///
    /// 임시 파일에 쓴 뒤 rename하므로 중간에 실패해도 기존 파일은 유지됩니다.
    pub async fn persist(&self) -> Result<(), StorageError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        let bytes = {
            let images = self.images.read().await;
            let list: Vec<&RawImage> = images.values().collect();
            serde_json::to_vec_pretty(&list)
                .map_err(|e| StorageError::Query(format!("encode store: {e}")))?
        };

        let tmp = path.with_extension("tmp");
        let write_error =
            |e: std::io::Error| StorageError::Query(format!("write {}: {e}", path.display()));
        tokio::fs::write(&tmp, &bytes).await.map_err(write_error)?;
        tokio::fs::rename(&tmp, path).await.map_err(write_error)?;
        debug!(path = %path.display(), bytes = bytes.len(), "image store persisted");
        Ok(())
    }
}

async fn read_one(images: &RwLock<Images>, reference: &ImageReference) -> Option<RawImage> {
    images.read().await.get(&reference.to_string()).cloned()
}

async fn read_all(images: &RwLock<Images>) -> Vec<RawImage> {
    images.read().await.values().cloned().collect()
}

impl ImageReader for MemoryStore {
    async fn raw_image(&self, reference: &ImageReference) -> Result<Option<RawImage>, StorageError> {
        Ok(read_one(&self.images, reference).await)
    }

    async fn raw_images(&self) -> Result<Vec<RawImage>, StorageError> {
        Ok(read_all(&self.images).await)
    }
}

impl ImageStore for MemoryStore {
    async fn insert_raw_image(&self, image: RawImage) -> Result<bool, StorageError> {
        let mut images = self.images.write().await;
        match images.get_mut(&image.key()) {
            Some(existing) => {
                existing.tags = image.tags;
                existing.graph = image.graph;
                Ok(false)
            }
            None => {
                images.insert(image.key(), image);
                Ok(true)
            }
        }
    }

    async fn delete_non_present(&self, present: &[ImageReference]) -> Result<u64, StorageError> {
        let keep: HashSet<String> = present.iter().map(ToString::to_string).collect();
        let removed = {
            let mut images = self.images.write().await;
            let before = images.len();
            images.retain(|key, _| keep.contains(key));
            (before - images.len()) as u64
        };
        // 스냅샷 실패는 메모리 상태에 영향을 주지 않음
        if let Err(e) = self.persist().await {
            warn!(error = %e, "failed to persist image store");
        }
        Ok(removed)
    }

    async fn mark_processed(
        &self,
        reference: &ImageReference,
        at: SystemTime,
    ) -> Result<(), StorageError> {
        let mut images = self.images.write().await;
        let image = images
            .get_mut(&reference.to_string())
            .ok_or_else(|| StorageError::NotFound(reference.to_string()))?;
        image.last_processed = Some(at);
        Ok(())
    }

    async fn stale_images(
        &self,
        older_than: SystemTime,
        limit: usize,
    ) -> Result<Vec<ImageReference>, StorageError> {
        let images = self.images.read().await;
        let mut stale: Vec<&RawImage> = images
            .values()
            .filter(|i| i.last_processed.is_none_or(|at| at < older_than))
            .collect();
        // None(처리된 적 없음)이 가장 먼저
        stale.sort_by_key(|i| i.last_processed);
        Ok(stale
            .into_iter()
            .take(limit)
            .map(|i| i.reference.clone())
            .collect())
    }
}

/// [`MemoryStore`]의 읽기 전용 핸들
#[derive(Clone)]
pub struct MemoryReader {
    images: Arc<RwLock<Images>>,
}

impl MemoryReader {
    pub async fn len(&self) -> usize {
        self.images.read().await.len()
    }
}

impl ImageReader for MemoryReader {
    async fn raw_image(&self, reference: &ImageReference) -> Result<Option<RawImage>, StorageError> {
        Ok(read_one(&self.images, reference).await)
    }

    async fn raw_images(&self) -> Result<Vec<RawImage>, StorageError> {
        Ok(read_all(&self.images).await)
    }
}
