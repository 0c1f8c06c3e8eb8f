//! 도메인 타입: 이미지 참조
//!
//! [`ImageReference`]는 레지스트리 도메인, 저장소 경로, 태그, 다이제스트로 구성된
//! 완전한 형태의 컨테이너 이미지 참조입니다. 플랫폼이 보고하는 축약형
//! (`nginx`, `redis:7`)은 파싱 시 Docker Hub 기준으로 정규화됩니다.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ReferenceError;

/// Docker Hub 기본 레지스트리 도메인
pub const DEFAULT_DOMAIN: &str = "docker.io";

/// Docker Hub 공식 이미지 네임스페이스
const OFFICIAL_NAMESPACE: &str = "library";

/// 태그가 없을 때 암묵적으로 사용되는 태그
pub const DEFAULT_TAG: &str = "latest";

/// 완전한 형태의 이미지 참조
///
/// `Display`는 항상 `domain/path[:tag][@digest]` 형식을 출력하며,
/// 태그와 다이제스트가 모두 없으면 `:latest`를 붙입니다.
/// 이 문자열이 그래프와 스토리지에서 이미지의 식별자로 사용됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageReference {
    /// 레지스트리 도메인 (예: `docker.io`, `ghcr.io`, `localhost:5000`)
    pub domain: String,
    /// 저장소 경로 (예: `library/nginx`)
    pub path: String,
    /// 태그
    pub tag: Option<String>,
    /// 콘텐츠 다이제스트 (예: `sha256:...`)
    pub digest: Option<String>,
}

impl ImageReference {
    /// 참조 문자열을 파싱합니다.
    pub fn parse(input: &str) -> Result<Self, ReferenceError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ReferenceError::Empty);
        }

        let invalid = |reason: &str| ReferenceError::Invalid {
            reference: input.to_owned(),
            reason: reason.to_owned(),
        };

        let (name, digest) = match input.split_once('@') {
            Some((name, digest)) => {
                validate_digest(digest).map_err(|reason| invalid(reason))?;
                (name, Some(digest.to_owned()))
            }
            None => (input, None),
        };

        // 태그 구분자는 마지막 '/' 이후의 ':'만 인정 (레지스트리 포트와 구분)
        let last_slash = name.rfind('/').map_or(0, |i| i + 1);
        let (name, tag) = match name[last_slash..].rfind(':') {
            Some(i) => {
                let split = last_slash + i;
                let tag = &name[split + 1..];
                if tag.is_empty() || !tag.chars().all(is_tag_char) {
                    return Err(invalid("malformed tag"));
                }
                (&name[..split], Some(tag.to_owned()))
            }
            None => (name, None),
        };

        if name.is_empty() {
            return Err(invalid("missing repository"));
        }

        let (domain, path) = match name.split_once('/') {
            Some((first, rest)) if looks_like_domain(first) => (first.to_owned(), rest.to_owned()),
            _ => (DEFAULT_DOMAIN.to_owned(), name.to_owned()),
        };

        let domain = if domain == "index.docker.io" {
            DEFAULT_DOMAIN.to_owned()
        } else {
            domain
        };

        let path = if domain == DEFAULT_DOMAIN && !path.contains('/') {
            format!("{OFFICIAL_NAMESPACE}/{path}")
        } else {
            path
        };

        if path
            .split('/')
            .any(|c| c.is_empty() || !c.chars().all(is_path_char))
        {
            return Err(invalid("malformed repository path"));
        }

        Ok(Self {
            domain,
            path,
            tag,
            digest,
        })
    }

    /// 태그/다이제스트를 제외한 저장소 이름 (`domain/path`)
    pub fn name(&self) -> String {
        format!("{}/{}", self.domain, self.path)
    }

    /// 두 참조가 같은 저장소를 가리키는지 확인합니다.
    pub fn same_repository(&self, other: &Self) -> bool {
        self.domain == other.domain && self.path == other.path
    }

    /// 다이제스트를 교체한 새 참조를 반환합니다. 태그는 유지됩니다.
    pub fn with_digest(&self, digest: impl Into<String>) -> Self {
        Self {
            digest: Some(digest.into()),
            ..self.clone()
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.domain, self.path)?;
        match (&self.tag, &self.digest) {
            (Some(tag), Some(digest)) => write!(f, ":{tag}@{digest}"),
            (Some(tag), None) => write!(f, ":{tag}"),
            (None, Some(digest)) => write!(f, "@{digest}"),
            (None, None) => write!(f, ":{DEFAULT_TAG}"),
        }
    }
}

impl FromStr for ImageReference {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn looks_like_domain(component: &str) -> bool {
    component.contains('.') || component.contains(':') || component == "localhost"
}

fn is_tag_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}

fn is_path_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '.' | '-')
}

fn validate_digest(digest: &str) -> Result<(), &'static str> {
    let (algorithm, hex) = digest.split_once(':').ok_or("digest missing algorithm")?;
    if algorithm.is_empty() || hex.is_empty() {
        return Err("malformed digest");
    }
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err("digest is not hex encoded");
    }
    Ok(())
}
