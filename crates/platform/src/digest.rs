//! 선언된 이미지 참조에 런타임이 보고한 다이제스트를 고정합니다.

use tidewatch_core::types::ImageReference;

/// 런타임 이미지 ID 앞에 붙는 스킴
const RUNTIME_SCHEMES: [&str; 3] = ["docker-pullable://", "docker://", "containerd://"];

/// `candidates` 중 `declared`와 같은 저장소를 가리키는 첫 다이제스트를 붙입니다.
///
/// 선언에 이미 다이제스트가 있거나 일치하는 후보가 없으면 선언을 그대로 반환합니다.
/// 해석할 수 없는 후보는 무시됩니다.
pub fn pin_digest<'a>(
    declared: &ImageReference,
    candidates: impl IntoIterator<Item = &'a str>,
) -> ImageReference {
    if declared.digest.is_some() {
        return declared.clone();
    }

    candidates
        .into_iter()
        .filter_map(|candidate| ImageReference::parse(strip_scheme(candidate)).ok())
        .find(|candidate| candidate.same_repository(declared) && candidate.digest.is_some())
        .and_then(|candidate| candidate.digest)
        .map_or_else(|| declared.clone(), |digest| declared.with_digest(digest))
}

fn strip_scheme(candidate: &str) -> &str {
    RUNTIME_SCHEMES
        .iter()
        .find_map(|scheme| candidate.strip_prefix(scheme))
        .unwrap_or(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIGEST: &str = "sha256:4c0fdaa8b6341bfdeca5f18f7837462c80cff90527ee35ef185571e1c327beac";

    fn reference(s: &str) -> ImageReference {
        ImageReference::parse(s).unwrap()
    }

    #[test]
    fn matching_repository_digest_is_pinned() {
        let pinned = pin_digest(&reference("nginx:1.25"), [format!("nginx@{DIGEST}").as_str()]);
        assert_eq!(pinned.tag.as_deref(), Some("1.25"));
        assert_eq!(pinned.digest.as_deref(), Some(DIGEST));
    }

    #[test]
    fn other_repository_digest_is_ignored() {
        let declared = reference("nginx:1.25");
        let pinned = pin_digest(&declared, [format!("ghcr.io/acme/nginx@{DIGEST}").as_str()]);
        assert_eq!(pinned, declared);
    }

    #[test]
    fn runtime_scheme_is_stripped() {
        let candidate = format!("docker-pullable://docker.io/library/redis@{DIGEST}");
        let pinned = pin_digest(&reference("redis"), [candidate.as_str()]);
        assert_eq!(pinned.digest.as_deref(), Some(DIGEST));
    }

    #[test]
    fn existing_digest_is_kept() {
        let declared = reference(&format!("nginx@{DIGEST}"));
        let other = "sha256:0000000000000000000000000000000000000000000000000000000000000000";
        let pinned = pin_digest(&declared, [format!("nginx@{other}").as_str()]);
        assert_eq!(pinned, declared);
    }

    #[test]
    fn bare_image_id_is_not_a_candidate() {
        let declared = reference("nginx:1.25");
        let pinned = pin_digest(&declared, [DIGEST]);
        assert_eq!(pinned, declared);
    }
}
