//! PID 파일 관리
//!
//! [`PidFile`]이 살아 있는 동안 파일이 유지되고 drop 시 제거됩니다.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;

/// 생성한 PID 파일의 소유권
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// 현재 프로세스 PID를 기록합니다.
    ///
    /// 파일이 이미 있으면 다른 인스턴스가 실행 중인 것으로 보고 실패합니다.
    /// 상위 디렉터리는 0o700, 파일은 0o600 권한으로 생성합니다.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            create_private_dir(parent)?;
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let existing = fs::read_to_string(&path).unwrap_or_else(|_| "unknown".to_owned());
                return Err(anyhow::anyhow!(
                    "PID file {} already exists with PID {}; is another instance running?",
                    path.display(),
                    existing.trim()
                ));
            }
            Err(e) => return Err(e.into()),
        };

        if !file.metadata()?.is_file() {
            let _ = fs::remove_file(&path);
            return Err(anyhow::anyhow!("PID file {} is not a regular file", path.display()));
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))?;
        }

        let pid = std::process::id();
        writeln!(file, "{pid}")?;
        tracing::info!(pid, path = %path.display(), "PID file written");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::info!(path = %self.path.display(), "PID file removed"),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove PID file")
            }
        }
    }
}

fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        fs::DirBuilder::new().mode(0o700).recursive(true).create(dir)
    }
    #[cfg(not(unix))]
    {
        fs::create_dir_all(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_current_pid_and_removes_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run").join("tidewatch.pid");

        let pid_file = PidFile::create(&path).unwrap();
        let content = fs::read_to_string(pid_file.path()).unwrap();
        assert_eq!(content.trim().parse::<u32>().unwrap(), std::process::id());

        drop(pid_file);
        assert!(!path.exists());
    }

    #[test]
    fn existing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tidewatch.pid");
        fs::write(&path, "4242\n").unwrap();

        let err = PidFile::create(&path).unwrap_err().to_string();
        assert!(err.contains("already exists"), "got: {err}");
        assert!(err.contains("4242"), "got: {err}");
        // 다른 인스턴스의 파일은 건드리지 않음
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let pid_file = PidFile::create(dir.path().join("p.pid")).unwrap();
        let mode = fs::metadata(pid_file.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
