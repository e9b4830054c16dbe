//! Heuristic input format detection.
//!
//! Detection is a pure function of the file name and a bounded byte prefix
//! (up to 4 KiB). The input is never read twice: the orchestrator passes the
//! same buffer on to the ingestor.

use std::fmt;
use std::str::FromStr;

/// Supported configuration formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    DockerCompose,
    TraefikDynamic,
    NginxConf,
    Json,
    Yaml,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::DockerCompose => "docker-compose",
            Format::TraefikDynamic => "traefik-dynamic",
            Format::NginxConf => "nginx-conf",
            Format::Json => "json",
            Format::Yaml => "yaml",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "docker-compose" => Ok(Format::DockerCompose),
            "traefik-dynamic" => Ok(Format::TraefikDynamic),
            "nginx-conf" => Ok(Format::NginxConf),
            "json" => Ok(Format::Json),
            "yaml" => Ok(Format::Yaml),
            unknown => Err(format!("알 수 없는 형식: {}", unknown)),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum DetectError {
    /// 추론이 불가능하거나 후보가 여럿이라 명시 힌트가 필요함
    Ambiguous { candidates: Vec<Format> },
}

impl fmt::Display for DetectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectError::Ambiguous { candidates } => {
                let names: Vec<&str> = candidates.iter().map(Format::as_str).collect();
                write!(
                    f,
                    "형식을 추론할 수 없음 (후보: {}). --input-format으로 지정하세요",
                    names.join(", ")
                )
            }
        }
    }
}

impl std::error::Error for DetectError {}

const SNIFF_LIMIT: usize = 4096;

/// Sniff the input format from the file name suffix and a byte prefix.
pub fn detect_format(file_name: Option<&str>, bytes: &[u8]) -> Result<Format, DetectError> {
    let prefix = &bytes[..bytes.len().min(SNIFF_LIMIT)];
    let text = String::from_utf8_lossy(prefix);

    let suffix = file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());

    match suffix.as_deref() {
        Some("conf") => Ok(Format::NginxConf),
        Some("yml") | Some("yaml") => Ok(detect_yaml_flavor(&text)),
        Some("json") => Ok(detect_json_flavor(&text)),
        Some("toml") => Ok(Format::TraefikDynamic),
        _ => detect_by_content(&text),
    }
}

/// YAML 파일: 최상위 키로 compose / traefik-dynamic / 일반 YAML 구분.
fn detect_yaml_flavor(text: &str) -> Format {
    let has_services = has_top_level_key(text, "services");
    let has_traefik_sections = has_top_level_key(text, "http")
        || has_top_level_key(text, "tcp")
        || has_top_level_key(text, "udp");

    if has_services && text.contains("labels") {
        Format::DockerCompose
    } else if has_traefik_sections {
        Format::TraefikDynamic
    } else if has_services {
        Format::DockerCompose
    } else {
        Format::Yaml
    }
}

/// JSON: traefik 섹션 키가 보이면 traefik-dynamic, 아니면 일반 JSON.
fn detect_json_flavor(text: &str) -> Format {
    if text.contains("\"http\"") || text.contains("\"tcp\"") || text.contains("\"udp\"") {
        Format::TraefikDynamic
    } else {
        Format::Json
    }
}

/// 확장자가 없을 때의 내용 기반 추론.
fn detect_by_content(text: &str) -> Result<Format, DetectError> {
    let trimmed = text.trim_start();

    if trimmed.starts_with('{') {
        return Ok(detect_json_flavor(text));
    }
    if text.contains("server {")
        || text.contains("upstream ")
        || text.contains("proxy_pass ")
        || text.contains("location ")
    {
        return Ok(Format::NginxConf);
    }
    if has_top_level_key(text, "services") {
        return Ok(Format::DockerCompose);
    }
    if has_top_level_key(text, "http")
        || has_top_level_key(text, "tcp")
        || has_top_level_key(text, "udp")
    {
        return Ok(Format::TraefikDynamic);
    }

    Err(DetectError::Ambiguous {
        candidates: vec![
            Format::DockerCompose,
            Format::TraefikDynamic,
            Format::NginxConf,
        ],
    })
}

/// 들여쓰기 없는 줄에서 `key:`를 찾습니다 (YAML 최상위 키).
fn has_top_level_key(text: &str, key: &str) -> bool {
    text.lines().any(|line| {
        let without_comment = line.split('#').next().unwrap_or("");
        without_comment == format!("{}:", key)
            || without_comment.starts_with(&format!("{}: ", key))
            || without_comment.trim_end() == format!("{}:", key)
                && !line.starts_with([' ', '\t'])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_detection() {
        assert_eq!(
            detect_format(Some("nginx.conf"), b"server { listen 80; }"),
            Ok(Format::NginxConf)
        );
        assert_eq!(
            detect_format(Some("dynamic.toml"), b"[http.routers]"),
            Ok(Format::TraefikDynamic)
        );
    }

    #[test]
    fn test_yaml_compose_vs_traefik() {
        let compose = b"services:\n  web:\n    labels:\n      - traefik.enable=true\n";
        assert_eq!(
            detect_format(Some("docker-compose.yml"), compose),
            Ok(Format::DockerCompose)
        );

        let traefik = b"http:\n  routers:\n    r:\n      rule: Host(`x`)\n";
        assert_eq!(
            detect_format(Some("dynamic.yaml"), traefik),
            Ok(Format::TraefikDynamic)
        );

        let generic = b"foo: bar\n";
        assert_eq!(detect_format(Some("data.yml"), generic), Ok(Format::Yaml));
    }

    #[test]
    fn test_json_detection() {
        let traefik = br#"{"http": {"routers": {}}}"#;
        assert_eq!(
            detect_format(Some("dynamic.json"), traefik),
            Ok(Format::TraefikDynamic)
        );

        let generic = br#"{"foo": 1}"#;
        assert_eq!(detect_format(Some("data.json"), generic), Ok(Format::Json));
    }

    #[test]
    fn test_content_detection_without_suffix() {
        assert_eq!(
            detect_format(None, b"upstream u { server a:1; }"),
            Ok(Format::NginxConf)
        );
        assert_eq!(
            detect_format(None, b"services:\n  web:\n    image: nginx\n"),
            Ok(Format::DockerCompose)
        );
    }

    #[test]
    fn test_ambiguous_input() {
        let err = detect_format(None, b"hello world").unwrap_err();
        assert!(matches!(err, DetectError::Ambiguous { .. }));
    }

    #[test]
    fn test_indented_key_is_not_top_level() {
        let text = b"foo:\n  services:\n    bar: 1\n";
        assert_eq!(detect_format(Some("x.yml"), text), Ok(Format::Yaml));
    }
}
