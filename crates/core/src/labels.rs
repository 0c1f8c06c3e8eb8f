//! 라벨 해석: 플랫폼 어노테이션/라벨을 설정 지시어로 변환
//!
//! 두 가지 동등한 접두사를 인식합니다:
//! - 슬래시 형식 `config.tidewatch/` (Kubernetes 어노테이션)
//! - 점 형식 `config.tidewatch.` (Docker 라벨)

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::LabelError;

/// 슬래시 형식 접두사
pub const SLASH_PREFIX: &str = "config.tidewatch/";
/// 점 형식 접두사
pub const DOTTED_PREFIX: &str = "config.tidewatch.";

pub const KEY_IGNORE: &str = "ignore";
pub const KEY_PIN: &str = "pin";
pub const KEY_STAY_ON_CURRENT_MAJOR: &str = "stay-on-current-major";
pub const KEY_STAY_BELOW: &str = "stay-below";

/// 문자열 키/값 라벨 맵
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Labels(BTreeMap<String, String>);

impl Labels {
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// 키가 없을 때만 삽입합니다. 삽입되었으면 `true`.
    pub fn insert_if_absent(&mut self, key: &str, value: &str) -> bool {
        if self.0.contains_key(key) {
            return false;
        }
        self.0.insert(key.to_owned(), value.to_owned());
        true
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// 이미지를 무시하도록 지정되었는지
    pub fn ignore(&self) -> bool {
        self.flag(KEY_IGNORE)
    }

    /// 현재 버전에 고정되었는지
    pub fn pin(&self) -> bool {
        self.flag(KEY_PIN)
    }

    /// 현재 메이저 버전 안에서만 업데이트를 고려하는지
    pub fn stay_on_current_major(&self) -> bool {
        self.flag(KEY_STAY_ON_CURRENT_MAJOR)
    }

    /// 버전 상한을 반환합니다.
    ///
    /// 값이 없거나 비어 있으면 `Ok(None)`. `1`, `1.2`, `1.2.3` 형태의 릴리스 버전만
    /// 허용하며 누락된 구성요소는 0으로 채웁니다. pre-release나 빌드 메타데이터가
    /// 붙은 값은 에러입니다.
    pub fn stay_below(&self) -> Result<Option<semver::Version>, LabelError> {
        let Some((key, value)) = self.lookup(KEY_STAY_BELOW) else {
            return Ok(None);
        };
        let value = value.trim();
        if value.is_empty() {
            return Ok(None);
        }

        let invalid = || LabelError::InvalidVersion {
            key: key.to_owned(),
            value: value.to_owned(),
        };

        let value_no_v = value.strip_prefix('v').unwrap_or(value);
        let parts: Vec<&str> = value_no_v.split('.').collect();
        if parts.len() > 3 {
            return Err(invalid());
        }

        let mut numbers = [0u64; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid());
            }
            *slot = part.parse().map_err(|_| invalid())?;
        }

        Ok(Some(semver::Version::new(numbers[0], numbers[1], numbers[2])))
    }

    /// 인식되는 접두사 밖의 키를 모두 제거한 새 맵을 반환합니다.
    pub fn remove_unsupported(&self) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(k, _)| k.starts_with(SLASH_PREFIX) || k.starts_with(DOTTED_PREFIX))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    fn flag(&self, name: &str) -> bool {
        self.lookup(name).is_some_and(|(_, v)| v == "true")
    }

    /// 슬래시 형식을 먼저, 이어서 점 형식을 찾습니다.
    fn lookup(&self, name: &str) -> Option<(&str, &str)> {
        [SLASH_PREFIX, DOTTED_PREFIX].iter().find_map(|prefix| {
            let key = format!("{prefix}{name}");
            self.0
                .get_key_value(&key)
                .map(|(k, v)| (k.as_str(), v.as_str()))
        })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Labels {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<BTreeMap<String, String>> for Labels {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs.iter().copied().collect()
    }

    #[test]
    fn flags_match_only_literal_true() {
        let l = labels(&[
            ("config.tidewatch/ignore", "true"),
            ("config.tidewatch/pin", "TRUE"),
            ("config.tidewatch.stay-on-current-major", "1"),
        ]);
        assert!(l.ignore());
        assert!(!l.pin());
        assert!(!l.stay_on_current_major());
    }

    #[test]
    fn flags_read_under_either_prefix() {
        assert!(labels(&[("config.tidewatch.pin", "true")]).pin());
        assert!(labels(&[("config.tidewatch/pin", "true")]).pin());
        assert!(!labels(&[("tidewatch/pin", "true")]).pin());
        assert!(!Labels::new().ignore());
    }

    #[test]
    fn stay_below_absent_or_empty_is_none() {
        assert_eq!(Labels::new().stay_below(), Ok(None));
        assert_eq!(
            labels(&[("config.tidewatch/stay-below", "")]).stay_below(),
            Ok(None)
        );
    }

    #[test]
    fn stay_below_fills_missing_components() {
        let l = labels(&[("config.tidewatch.stay-below", "2")]);
        assert_eq!(l.stay_below(), Ok(Some(semver::Version::new(2, 0, 0))));
        let l = labels(&[("config.tidewatch/stay-below", "1.26")]);
        assert_eq!(l.stay_below(), Ok(Some(semver::Version::new(1, 26, 0))));
        let l = labels(&[("config.tidewatch/stay-below", "v3.1.4")]);
        assert_eq!(l.stay_below(), Ok(Some(semver::Version::new(3, 1, 4))));
    }

    #[test]
    fn stay_below_rejects_prerelease_and_garbage() {
        for bad in ["1.2.3-rc1", "1.2.3+build", "latest", "1..2", "1.2.3.4"] {
            let l = labels(&[("config.tidewatch/stay-below", bad)]);
            let err = l.stay_below().unwrap_err();
            assert_eq!(
                err,
                LabelError::InvalidVersion {
                    key: "config.tidewatch/stay-below".to_owned(),
                    value: bad.to_owned(),
                }
            );
        }
    }

    #[test]
    fn remove_unsupported_keeps_only_prefixed_keys() {
        let l = labels(&[
            ("config.tidewatch/ignore", "true"),
            ("config.tidewatch.pin", "true"),
            ("app.kubernetes.io/name", "web"),
            ("com.docker.compose.project", "media"),
        ]);
        let filtered = l.remove_unsupported();
        assert_eq!(filtered.len(), 2);
        assert!(filtered.get("app.kubernetes.io/name").is_none());
        assert!(filtered.ignore());
    }

    #[test]
    fn insert_if_absent_keeps_first_value() {
        let mut l = Labels::new();
        assert!(l.insert_if_absent("config.tidewatch/pin", "true"));
        assert!(!l.insert_if_absent("config.tidewatch/pin", "false"));
        assert!(l.pin());
    }
}
