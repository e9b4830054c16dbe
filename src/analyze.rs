//! 설정 요약 분석입니다. 수집 + 검증만 수행하고 구성 요소의 통계를
//! 사람이 읽을 수 있는 표 형태로 만듭니다.

use std::collections::BTreeMap;
use std::fmt;

use crate::convert::{ingest_only, ConvertOptions, Result};
use crate::detect::Format;
use crate::model::{Config, Protocol, Severity};

/// 설정 파일 하나의 분석 결과
#[derive(Debug)]
pub struct Analysis {
    pub format: Format,
    pub router_count: usize,
    pub service_count: usize,
    pub middleware_count: usize,
    pub entrypoint_count: usize,
    pub tls_router_count: usize,
    /// 프로토콜별 라우터 수
    pub routers_by_protocol: BTreeMap<Protocol, usize>,
    /// 규칙에 등장하는 호스트들
    pub hosts: Vec<String>,
    pub error_count: usize,
    pub warning_count: usize,
    pub info_count: usize,
    pub config: Config,
}

/// 입력을 수집·검증하고 요약 통계를 냅니다.
pub fn analyze(input: &[u8], options: &ConvertOptions) -> Result<Analysis> {
    let (config, format) = ingest_only(input, options)?;

    let mut routers_by_protocol: BTreeMap<Protocol, usize> = BTreeMap::new();
    let mut hosts: Vec<String> = Vec::new();
    let mut tls_router_count = 0;

    for router in config.routers.values() {
        *routers_by_protocol.entry(router.protocol).or_insert(0) += 1;
        if router.tls.is_some() {
            tls_router_count += 1;
        }
        if let Some(rule) = &router.rule {
            hosts.extend(rule.hosts());
        }
    }
    hosts.sort();
    hosts.dedup();

    let count_severity = |severity: Severity| {
        config
            .diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    };

    Ok(Analysis {
        format,
        router_count: config.routers.len(),
        service_count: config.services.len(),
        middleware_count: config.middlewares.len(),
        entrypoint_count: config.entrypoints.len(),
        tls_router_count,
        routers_by_protocol,
        hosts,
        error_count: count_severity(Severity::Error),
        warning_count: count_severity(Severity::Warning),
        info_count: count_severity(Severity::Info),
        config,
    })
}

impl fmt::Display for Analysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "형식: {}", self.format)?;
        writeln!(f, "라우터: {}", self.router_count)?;
        for (protocol, count) in &self.routers_by_protocol {
            writeln!(f, "  {}: {}", protocol, count)?;
        }
        writeln!(f, "서비스: {}", self.service_count)?;
        writeln!(f, "미들웨어: {}", self.middleware_count)?;
        if self.entrypoint_count > 0 {
            writeln!(f, "엔트리포인트: {}", self.entrypoint_count)?;
        }
        writeln!(f, "TLS 라우터: {}", self.tls_router_count)?;
        if !self.hosts.is_empty() {
            writeln!(f, "호스트: {}", self.hosts.join(", "))?;
        }
        write!(
            f,
            "진단: 에러 {} / 경고 {} / 정보 {}",
            self.error_count, self.warning_count, self.info_count
        )
    }
}
