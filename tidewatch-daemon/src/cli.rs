//! tidewatch-daemon 명령행 인자
//!
//! 플래그는 설정 파일과 환경변수보다 나중에 적용됩니다.

use std::path::PathBuf;

use clap::Parser;

use tidewatch_core::config::TidewatchConfig;

/// 컨테이너 플랫폼의 이미지 인벤토리를 추적하는 데몬
#[derive(Parser, Debug)]
#[command(name = "tidewatch-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// tidewatch.toml 경로
    #[arg(short, long, default_value = "/etc/tidewatch/tidewatch.toml")]
    pub config: PathBuf,

    /// 로그 레벨 오버라이드 (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// 로그 형식 오버라이드 (json, pretty)
    #[arg(long)]
    pub log_format: Option<String>,

    /// PID 파일 경로 오버라이드
    #[arg(long)]
    pub pid_file: Option<String>,

    /// 이미지 스토어 스냅샷 경로 오버라이드
    #[arg(long)]
    pub store_path: Option<String>,

    /// 워커 수 오버라이드
    #[arg(long)]
    pub workers: Option<usize>,

    /// 설정만 검증하고 종료
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// 지정된 플래그를 설정에 덮어씁니다.
    pub fn apply_overrides(&self, config: &mut TidewatchConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level.clone_from(level);
        }
        if let Some(format) = &self.log_format {
            config.general.log_format.clone_from(format);
        }
        if let Some(pid_file) = &self.pid_file {
            config.general.pid_file.clone_from(pid_file);
        }
        if let Some(path) = &self.store_path {
            config.store.path.clone_from(path);
        }
        if let Some(workers) = self.workers {
            config.processing.workers = workers;
        }
    }
}
