use std::fmt;

use crate::model::Diagnostic;

/// 방출 결과: 출력 텍스트와 방출 중 기록된 기능 다운그레이드 경고.
#[derive(Debug)]
pub struct Emitted {
    pub content: String,
    pub diagnostics: Vec<Diagnostic>,
}

/// 방출 단계의 에러입니다. 직렬화 실패 외에는 방출이 실패하지 않으며,
/// 표현 불가능한 기능은 에러가 아니라 경고 진단이 됩니다.
#[derive(Debug)]
pub enum EmitError {
    Yaml { source: serde_yaml::Error },
    Json { source: serde_json::Error },
    Toml { source: toml::ser::Error },
}

impl fmt::Display for EmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmitError::Yaml { source } => write!(f, "YAML 직렬화 오류: {}", source),
            EmitError::Json { source } => write!(f, "JSON 직렬화 오류: {}", source),
            EmitError::Toml { source } => write!(f, "TOML 직렬화 오류: {}", source),
        }
    }
}

impl std::error::Error for EmitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EmitError::Yaml { source } => Some(source),
            EmitError::Json { source } => Some(source),
            EmitError::Toml { source } => Some(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, EmitError>;
