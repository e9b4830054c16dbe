use serde::Serialize;
use std::fmt;

/// 진단 심각도입니다. Error가 하나라도 있으면 출력 생성이 중단됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// 진단 코드입니다. 기계가 읽을 수 있는 식별자로 출력에 포함됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticCode {
    // 규칙 파서
    UnknownMatcher,
    ArityMismatch,
    UnexpectedToken,
    UnterminatedString,
    TrailingGarbage,
    // 모델 검증
    UndefinedReference,
    DuplicateId,
    ProviderConflict,
    ProtocolMismatch,
    UdpRouterWithRule,
    UdpRouterWithTls,
    EmptyPool,
    MissingWeight,
    MissingCertResolver,
    MissingPort,
    PriorityConflict,
    PriorityHint,
    InvalidRegex,
    InvalidMiddlewareParam,
    MissingMiddlewareParam,
    // 수집/방출
    UnknownField,
    UnsupportedFeature,
    LabelConflict,
    AmbiguousFormat,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::UnknownMatcher => "unknown-matcher",
            DiagnosticCode::ArityMismatch => "arity-mismatch",
            DiagnosticCode::UnexpectedToken => "unexpected-token",
            DiagnosticCode::UnterminatedString => "unterminated-string",
            DiagnosticCode::TrailingGarbage => "trailing-garbage",
            DiagnosticCode::UndefinedReference => "undefined-reference",
            DiagnosticCode::DuplicateId => "duplicate-id",
            DiagnosticCode::ProviderConflict => "provider-conflict",
            DiagnosticCode::ProtocolMismatch => "protocol-mismatch",
            DiagnosticCode::UdpRouterWithRule => "udp-router-with-rule",
            DiagnosticCode::UdpRouterWithTls => "udp-router-with-tls",
            DiagnosticCode::EmptyPool => "empty-pool",
            DiagnosticCode::MissingWeight => "missing-weight",
            DiagnosticCode::MissingCertResolver => "missing-cert-resolver",
            DiagnosticCode::MissingPort => "missing-port",
            DiagnosticCode::PriorityConflict => "priority-conflict",
            DiagnosticCode::PriorityHint => "priority-hint",
            DiagnosticCode::InvalidRegex => "invalid-regex",
            DiagnosticCode::InvalidMiddlewareParam => "invalid-middleware-param",
            DiagnosticCode::MissingMiddlewareParam => "missing-middleware-param",
            DiagnosticCode::UnknownField => "unknown-field",
            DiagnosticCode::UnsupportedFeature => "unsupported-feature",
            DiagnosticCode::LabelConflict => "label-conflict",
            DiagnosticCode::AmbiguousFormat => "ambiguous-format",
        }
    }
}

/// 진단이 가리키는 입력 위치입니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SourceRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
}

/// 변환 과정에서 수집되는 진단 레코드입니다.
///
/// 파싱 에러는 즉시 실패하지만, 모델 에러와 기능 다운그레이드 경고는
/// 이 레코드로 누적됩니다.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceRef>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,
}

impl Diagnostic {
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
            source: None,
            fix: None,
        }
    }

    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
            source: None,
            fix: None,
        }
    }

    pub fn info(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            code,
            message: message.into(),
            source: None,
            fix: None,
        }
    }

    pub fn with_source(mut self, source: SourceRef) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.fix = Some(fix.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.code.as_str(), self.message)?;
        if let Some(source) = &self.source {
            if let Some(line) = source.line {
                write!(f, " ({}행", line)?;
                if let Some(column) = source.column {
                    write!(f, " {}열", column)?;
                }
                write!(f, ")")?;
            } else if let Some(column) = source.column {
                write!(f, " (오프셋 {})", column)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
    }

    #[test]
    fn test_diagnostic_display() {
        let diag = Diagnostic::error(DiagnosticCode::UndefinedReference, "서비스 없음")
            .with_source(SourceRef {
                file: None,
                line: Some(3),
                column: Some(7),
            });
        assert_eq!(format!("{}", diag), "[error] undefined-reference: 서비스 없음 (3행 7열)");
    }

    #[test]
    fn test_diagnostic_serialize_skips_empty() {
        let diag = Diagnostic::warning(DiagnosticCode::UnsupportedFeature, "회로 차단기");
        let json = serde_json::to_value(&diag).unwrap();
        assert!(json.get("source").is_none());
        assert!(json.get("fix").is_none());
        assert_eq!(json["severity"], "warning");
    }
}
