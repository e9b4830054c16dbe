//! 형식 중립 라우팅 모델입니다.
//!
//! 모든 입력 형식은 이 모듈의 [`Config`]로 내려지고(lowering), 모든 출력
//! 형식은 여기서 다시 올려집니다(raising). 소유 구조는 계층적입니다:
//! Config가 라우터/서비스/미들웨어와 그 안의 규칙 트리를 소유하며,
//! 약한 참조나 순환은 없습니다.

mod config;
mod diagnostic;
mod middleware;
mod router;
mod service;
mod tls;

pub use config::{Config, Entrypoint};
pub use diagnostic::{Diagnostic, DiagnosticCode, Severity, SourceRef};
pub use middleware::{Middleware, MiddlewareKind, ParamValue};
pub use router::{Protocol, Router};
pub use service::{HealthCheck, LbPolicy, LoadBalancer, Server, ServerTarget, Service};
pub use tls::{CertFile, TlsOptions, TlsSpec};
