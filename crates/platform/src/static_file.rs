//! 정적 이미지 목록 어댑터
//!
//! YAML 파일의 `images` 목록을 읽어 항목마다 자식 없는 이미지 노드 하나를 만듭니다.
//!
//! ```yaml
//! images:
//!   - nginx:1.25
//!   - ghcr.io/acme/api:2.3.1
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use tidewatch_core::types::ImageReference;
use tidewatch_graph::{Graph, PlatformGraph, PlatformNode};

use crate::config::StaticGrapherConfig;
use crate::error::PlatformError;
use crate::grapher::Grapher;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StaticImages {
    #[serde(default)]
    images: Vec<String>,
}

/// 정적 파일 스냅샷 어댑터
#[derive(Debug, Clone)]
pub struct StaticGrapher {
    path: PathBuf,
}

impl StaticGrapher {
    /// 설정을 검증하고 파일을 한 번 읽어 형식을 확인합니다.
    pub async fn open(config: &StaticGrapherConfig) -> Result<Self, PlatformError> {
        config.validate()?;
        let grapher = Self {
            path: PathBuf::from(&config.path),
        };
        let images = grapher.read_images().await?;
        info!(path = %config.path, images = images.len(), "static grapher opened");
        Ok(grapher)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_images(&self) -> Result<Vec<ImageReference>, PlatformError> {
        let file_error = |reason: String| PlatformError::StaticFile {
            path: self.path.display().to_string(),
            reason,
        };

        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| file_error(e.to_string()))?;
        let parsed: StaticImages =
            serde_yaml::from_str(&content).map_err(|e| file_error(e.to_string()))?;

        parsed
            .images
            .iter()
            .map(|image| ImageReference::parse(image).map_err(PlatformError::from))
            .collect()
    }
}

impl Grapher for StaticGrapher {
    fn name(&self) -> &'static str {
        "static_file"
    }

    async fn graph(&self, token: &CancellationToken) -> Result<PlatformGraph, PlatformError> {
        if token.is_cancelled() {
            return Err(PlatformError::Cancelled);
        }
        let images = self.read_images().await?;
        let mut graph = Graph::new();
        for image in images {
            graph.insert_tree([PlatformNode::image(image)]);
        }
        debug!(path = %self.path.display(), nodes = graph.len(), "static snapshot built");
        Ok(graph)
    }
}
