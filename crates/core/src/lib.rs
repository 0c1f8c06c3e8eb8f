#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod event;
pub mod hub;
pub mod labels;
pub mod metrics;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{
    ConfigError, HubError, LabelError, ReferenceError, SourceError, StorageError, TidewatchError,
};

// 설정
pub use config::TidewatchConfig;

// 이벤트
pub use event::{ChangeEvent, EventMetadata};
pub use hub::Hub;

// 도메인 타입
pub use labels::Labels;
pub use types::ImageReference;
