//! 설정으로부터 연속 스냅샷 소스를 조립합니다.
//!
//! - Kubernetes가 활성화되면 watch 기반 [`KubernetesGrapher`] 하나만 사용
//! - 그 외에는 Docker/정적 파일 grapher를 [`CompoundGrapher`]로 묶어
//!   가장 짧은 주기의 [`PollGrapher`]로 폴링

use std::time::Duration;

use tracing::info;

use tidewatch_core::config::TidewatchConfig;

use crate::config::{DockerGrapherConfig, KubernetesGrapherConfig, StaticGrapherConfig};
use crate::docker::DockerGrapher;
use crate::error::PlatformError;
use crate::grapher::{CompoundGrapher, ContinuousGrapher, DynGrapher, PollGrapher};
use crate::kubernetes::KubernetesGrapher;
use crate::static_file::StaticGrapher;

/// 활성화된 소스에 연결합니다. 어느 하나라도 연결에 실패하면 에러를 반환합니다.
pub async fn connect(config: &TidewatchConfig) -> Result<Box<dyn ContinuousGrapher>, PlatformError> {
    if config.kubernetes.enabled {
        let grapher =
            KubernetesGrapher::connect(KubernetesGrapherConfig::from_core(&config.kubernetes))
                .await?;
        return Ok(Box::new(grapher));
    }

    let mut graphers: Vec<Box<dyn DynGrapher>> = Vec::new();
    let mut intervals: Vec<Duration> = Vec::new();

    if config.docker.enabled {
        let docker_config = DockerGrapherConfig::from_core(&config.docker);
        graphers.push(Box::new(DockerGrapher::connect(&docker_config).await?));
        intervals.push(docker_config.poll_interval());
    }
    if config.static_file.enabled {
        let static_config = StaticGrapherConfig::from_core(&config.static_file);
        graphers.push(Box::new(StaticGrapher::open(&static_config).await?));
        intervals.push(static_config.poll_interval());
    }

    poll_all(graphers, &intervals)
}

/// 여러 grapher를 하나의 폴링 소스로 묶습니다.
pub fn poll_all(
    mut graphers: Vec<Box<dyn DynGrapher>>,
    intervals: &[Duration],
) -> Result<Box<dyn ContinuousGrapher>, PlatformError> {
    let Some(interval) = intervals.iter().min().copied() else {
        return Err(PlatformError::Config {
            field: "sources".to_owned(),
            reason: "no platform source enabled".to_owned(),
        });
    };

    let names: Vec<&'static str> = graphers
        .iter()
        .map(|g| DynGrapher::name(g.as_ref()))
        .collect();
    info!(sources = ?names, interval_secs = interval.as_secs(), "polling platform sources");

    if graphers.len() == 1
        && let Some(only) = graphers.pop()
    {
        return Ok(Box::new(PollGrapher::new(only, interval)));
    }
    Ok(Box::new(PollGrapher::new(
        CompoundGrapher::new(graphers),
        interval,
    )))
}
