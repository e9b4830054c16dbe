use std::collections::BTreeMap;

use crate::model::diagnostic::{Diagnostic, DiagnosticCode, Severity};
use crate::model::middleware::Middleware;
use crate::model::router::{Protocol, Router};
use crate::model::service::Service;
use crate::model::tls::TlsOptions;

/// 이름으로 참조되는 수신 지점입니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entrypoint {
    pub address: String,
    pub protocol: Protocol,
}

/// 모든 변환이 통과하는 형식 중립 모델입니다.
///
/// 수집기(ingestor)가 생성하고, 검증기만 진단 주석과 기본값 정규화를 위해
/// 변경하며, 방출기(emitter)는 읽기 전용으로 소비합니다. id 맵은 모두
/// `BTreeMap`이므로 순회와 방출 순서가 결정적입니다.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub routers: BTreeMap<String, Router>,
    pub services: BTreeMap<String, Service>,
    pub middlewares: BTreeMap<String, Middleware>,
    pub tls_options: BTreeMap<String, TlsOptions>,
    pub entrypoints: BTreeMap<String, Entrypoint>,
    pub diagnostics: Vec<Diagnostic>,

    /// 모델이 표현하지 못하는 입력 필드의 무손실 보관소.
    /// 키는 원본 경로(라벨 경로, nginx 지시어 경로 등)입니다.
    pub raw_extras: BTreeMap<String, String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// 라우터를 추가합니다. 같은 id가 이미 있으면 공급자 충돌 진단을
    /// 남기고 기존 항목을 유지합니다.
    pub fn insert_router(&mut self, router: Router) {
        if self.routers.contains_key(&router.id) {
            self.diagnostics.push(Diagnostic::error(
                DiagnosticCode::ProviderConflict,
                format!("라우터 '{}'가 여러 공급자에 중복 정의됨", router.id),
            ));
            return;
        }
        self.routers.insert(router.id.clone(), router);
    }

    /// 서비스를 추가합니다. id 충돌 처리는 `insert_router`와 같습니다.
    pub fn insert_service(&mut self, service: Service) {
        if self.services.contains_key(&service.id) {
            self.diagnostics.push(Diagnostic::error(
                DiagnosticCode::ProviderConflict,
                format!("서비스 '{}'가 여러 공급자에 중복 정의됨", service.id),
            ));
            return;
        }
        self.services.insert(service.id.clone(), service);
    }

    /// 미들웨어를 추가합니다. id 충돌 처리는 `insert_router`와 같습니다.
    pub fn insert_middleware(&mut self, middleware: Middleware) {
        if self.middlewares.contains_key(&middleware.id) {
            self.diagnostics.push(Diagnostic::error(
                DiagnosticCode::ProviderConflict,
                format!("미들웨어 '{}'가 여러 공급자에 중복 정의됨", middleware.id),
            ));
            return;
        }
        self.middlewares.insert(middleware.id.clone(), middleware);
    }

    pub fn push_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// `UnsupportedFeature` 진단이 하나도 없는지 여부.
    /// 모델 라운드트립 보장은 이 조건을 전제로 합니다.
    pub fn is_lossless(&self) -> bool {
        !self
            .diagnostics
            .iter()
            .any(|d| d.code == DiagnosticCode::UnsupportedFeature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::router::Protocol;

    #[test]
    fn test_duplicate_router_is_provider_conflict() {
        let mut config = Config::new();
        config.insert_router(Router::new("web", Protocol::Http, "svc"));
        config.insert_router(Router::new("web", Protocol::Http, "other"));

        assert_eq!(config.routers.len(), 1);
        assert_eq!(config.error_count(), 1);
        assert_eq!(config.diagnostics[0].code, DiagnosticCode::ProviderConflict);
        // 먼저 등록된 정의가 유지됨
        assert_eq!(config.routers["web"].service, "svc");
    }

    #[test]
    fn test_lossless_flag() {
        let mut config = Config::new();
        assert!(config.is_lossless());

        config.push_diagnostic(Diagnostic::warning(
            DiagnosticCode::UnsupportedFeature,
            "circuit-breaker는 nginx에 대응 기능 없음",
        ));
        assert!(!config.is_lossless());
    }
}
