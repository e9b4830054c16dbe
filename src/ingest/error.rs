use std::fmt;

use crate::rule::RuleError;

/// 수집(ingest) 단계의 에러입니다.
///
/// 구문 에러는 즉시 실패하며 부분 Config를 반환하지 않습니다.
#[derive(Debug)]
pub enum IngestError {
    YamlSyntax {
        source: serde_yaml::Error,
    },
    JsonSyntax {
        source: serde_json::Error,
    },
    TomlSyntax {
        source: toml::de::Error,
    },
    NginxSyntax {
        message: String,
        line: usize,
    },
    /// 규칙 문자열 파싱 실패. 어떤 라우터의 규칙이었는지 함께 담습니다.
    Rule {
        router: String,
        source: RuleError,
    },
    /// 같은 라벨 경로에 스칼라와 트리가 동시에 옴
    LabelConflict {
        path: String,
    },
    InvalidStructure {
        message: String,
    },
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::YamlSyntax { source } => write!(f, "YAML 구문 오류: {}", source),
            IngestError::JsonSyntax { source } => write!(f, "JSON 구문 오류: {}", source),
            IngestError::TomlSyntax { source } => write!(f, "TOML 구문 오류: {}", source),
            IngestError::NginxSyntax { message, line } => {
                write!(f, "nginx 구문 오류 ({}행): {}", line, message)
            }
            IngestError::Rule { router, source } => {
                write!(f, "라우터 '{}'의 규칙 파싱 실패: {}", router, source)
            }
            IngestError::LabelConflict { path } => {
                write!(f, "라벨 경로 '{}'에 스칼라와 하위 트리가 충돌함", path)
            }
            IngestError::InvalidStructure { message } => {
                write!(f, "입력 구조 오류: {}", message)
            }
        }
    }
}

impl std::error::Error for IngestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IngestError::YamlSyntax { source } => Some(source),
            IngestError::JsonSyntax { source } => Some(source),
            IngestError::TomlSyntax { source } => Some(source),
            IngestError::Rule { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
