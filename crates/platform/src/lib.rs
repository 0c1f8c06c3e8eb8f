//! tidewatch 플랫폼 어댑터
//!
//! 컨테이너 플랫폼을 관찰해 전체 토폴로지 스냅샷([`PlatformGraph`])을 생성합니다.
//!
//! - [`grapher`]: `Grapher`/`ContinuousGrapher` 계약과 폴링/복합 래퍼
//! - [`kubernetes`]: watch 캐시 기반 연속 소스
//! - [`docker`]: Docker 데몬 폴링 소스
//! - [`static_file`]: YAML 이미지 목록
//! - [`debounce`]: 트리거 디바운서
//! - [`source`]: 설정으로부터 소스 조립
//!
//! [`PlatformGraph`]: tidewatch_graph::PlatformGraph

pub mod config;
pub mod debounce;
pub mod digest;
pub mod docker;
pub mod error;
pub mod grapher;
pub mod kubernetes;
pub mod source;
pub mod static_file;

pub use config::{DockerGrapherConfig, KubernetesGrapherConfig, StaticGrapherConfig};
pub use docker::{BollardDockerClient, DockerClient, DockerGrapher};
pub use error::PlatformError;
pub use grapher::{
    BoxFuture, CompoundGrapher, ContinuousGrapher, DynGrapher, Grapher, PollGrapher,
    SnapshotMetrics,
};
pub use kubernetes::KubernetesGrapher;
pub use static_file::StaticGrapher;
