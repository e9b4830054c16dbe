//! 통합 모델에 대한 불변식과 모범 사례 검사입니다.
//!
//! 검사 결과는 Config의 진단 목록에 누적됩니다. 에러가 하나라도 있으면
//! 오케스트레이터가 방출 전에 중단합니다 (관대 모드 제외).

use std::collections::BTreeMap;

use tracing::debug;

use crate::model::{
    Config, Diagnostic, DiagnosticCode, Middleware, MiddlewareKind, Protocol, Router,
};
use crate::rule::{print_rule, Dialect};

/// Config 전체를 검사하고 진단을 주석으로 답니다.
pub fn validate(config: &mut Config) {
    let mut diagnostics = Vec::new();

    check_references(config, &mut diagnostics);
    check_rules(config, &mut diagnostics);
    check_pools(config, &mut diagnostics);
    check_tls(config, &mut diagnostics);
    check_middleware_params(config, &mut diagnostics);
    check_priorities(config, &mut diagnostics);

    debug!(
        errors = diagnostics.iter().filter(|d| d.is_error()).count(),
        total = diagnostics.len(),
        "검증 완료"
    );

    config.diagnostics.extend(diagnostics);
}

/// 참조 무결성: 라우터 → 서비스, 라우터 → 미들웨어, TLS 옵션 참조
fn check_references(config: &Config, diagnostics: &mut Vec<Diagnostic>) {
    for router in config.routers.values() {
        if !config.services.contains_key(&router.service) {
            diagnostics.push(Diagnostic::error(
                DiagnosticCode::UndefinedReference,
                format!(
                    "라우터 '{}'가 존재하지 않는 서비스 '{}'를 참조함",
                    router.id, router.service
                ),
            ));
        }

        for middleware_id in &router.middlewares {
            if !config.middlewares.contains_key(middleware_id) {
                diagnostics.push(Diagnostic::error(
                    DiagnosticCode::UndefinedReference,
                    format!(
                        "라우터 '{}'가 존재하지 않는 미들웨어 '{}'를 참조함",
                        router.id, middleware_id
                    ),
                ));
            }
        }

        if let Some(tls) = &router.tls {
            if let Some(options) = &tls.options_ref {
                if !config.tls_options.contains_key(options) {
                    diagnostics.push(Diagnostic::error(
                        DiagnosticCode::UndefinedReference,
                        format!(
                            "라우터 '{}'가 존재하지 않는 TLS 옵션 '{}'를 참조함",
                            router.id, options
                        ),
                    ));
                }
            }
        }
    }
}

/// 매처-프로토콜 호환성과 UDP 라우터 제약
fn check_rules(config: &Config, diagnostics: &mut Vec<Diagnostic>) {
    for router in config.routers.values() {
        match router.protocol {
            Protocol::Udp => {
                // UDP는 엔트리포인트로만 라우팅하므로 규칙도 TLS도 없음
                if router.rule.is_some() {
                    diagnostics.push(Diagnostic::error(
                        DiagnosticCode::UdpRouterWithRule,
                        format!("UDP 라우터 '{}'는 규칙을 가질 수 없음", router.id),
                    ));
                }
                if router.tls.is_some() {
                    diagnostics.push(Diagnostic::error(
                        DiagnosticCode::UdpRouterWithTls,
                        format!("UDP 라우터 '{}'는 TLS를 가질 수 없음", router.id),
                    ));
                }
            }
            protocol => {
                if let Some(rule) = &router.rule {
                    for name in rule.matcher_names() {
                        if !name.allows_protocol(protocol) {
                            diagnostics.push(Diagnostic::error(
                                DiagnosticCode::ProtocolMismatch,
                                format!(
                                    "{} 라우터 '{}'의 규칙에 {} 매처는 올 수 없음",
                                    protocol, router.id, name
                                ),
                            ));
                        }
                    }
                    check_regex_args(&router.id, rule, diagnostics);
                }
            }
        }
    }
}

/// 정규식 매처의 인자가 실제로 컴파일되는지 검사합니다.
fn check_regex_args(router_id: &str, rule: &crate::rule::RuleExpr, diagnostics: &mut Vec<Diagnostic>) {
    use crate::rule::MatcherName;

    rule.walk_matchers(&mut |matcher| {
        let is_regexp = matches!(
            matcher.name,
            MatcherName::HostRegexp
                | MatcherName::PathRegexp
                | MatcherName::HeaderRegexp
                | MatcherName::QueryRegexp
                | MatcherName::HostSniRegexp
        );
        if !is_regexp {
            return;
        }
        // Header/QueryRegexp는 두 번째 인자만 정규식
        let args = match matcher.name {
            MatcherName::HeaderRegexp | MatcherName::QueryRegexp => &matcher.args[1..],
            _ => &matcher.args[..],
        };
        for arg in args {
            let pattern = arg.to_v3_text();
            if let Err(error) = regex_lite::Regex::new(&pattern) {
                diagnostics.push(Diagnostic::error(
                    DiagnosticCode::InvalidRegex,
                    format!(
                        "라우터 '{}'의 {} 인자 '{}'는 유효한 정규식이 아님: {}",
                        router_id, matcher.name, pattern, error
                    ),
                ));
            }
        }
    });
}

/// 풀 비어있음, 가중치 정책의 가중치 누락, 컨테이너 포트 누락
fn check_pools(config: &Config, diagnostics: &mut Vec<Diagnostic>) {
    for service in config.services.values() {
        if service.pool.servers.is_empty() {
            diagnostics.push(Diagnostic::error(
                DiagnosticCode::EmptyPool,
                format!("서비스 '{}'의 서버 풀이 비어 있음", service.id),
            ));
            continue;
        }

        if service.pool.policy.is_weighted() {
            for (index, server) in service.pool.servers.iter().enumerate() {
                if server.weight.is_none() {
                    diagnostics.push(Diagnostic::error(
                        DiagnosticCode::MissingWeight,
                        format!(
                            "서비스 '{}'의 {} 정책에는 모든 서버의 가중치가 필요함 ({}번째 누락)",
                            service.id, service.pool.policy, index
                        ),
                    ));
                }
            }
        }

        // 컨테이너로 로드밸런싱할 때는 포트 지정이 있어야 함
        for server in &service.pool.servers {
            if server.target.port().is_none() {
                diagnostics.push(Diagnostic::warning(
                    DiagnosticCode::MissingPort,
                    format!(
                        "서비스 '{}'의 대상 '{}'에 포트 지정이 없음",
                        service.id,
                        server.target.as_str()
                    ),
                ));
            }
        }
    }
}

/// cert_files도 cert_resolver도 없는 TLS는 평문 HTTP로 간주됨을 경고
fn check_tls(config: &Config, diagnostics: &mut Vec<Diagnostic>) {
    for router in config.routers.values() {
        if let Some(tls) = &router.tls {
            if tls.is_bare() {
                diagnostics.push(
                    Diagnostic::warning(
                        DiagnosticCode::MissingCertResolver,
                        format!(
                            "라우터 '{}'의 TLS에 인증서 파일도 cert_resolver도 없음",
                            router.id
                        ),
                    )
                    .with_fix("cert_resolver를 지정하거나 인증서 파일을 제공하세요".to_string()),
                );
            }
        }
    }
}

/// 미들웨어 종류별 필수 파라미터 검사
fn check_middleware_params(config: &Config, diagnostics: &mut Vec<Diagnostic>) {
    for middleware in config.middlewares.values() {
        check_one_middleware(middleware, diagnostics);
    }
}

fn check_one_middleware(middleware: &Middleware, diagnostics: &mut Vec<Diagnostic>) {
    let require = |key: &str, diagnostics: &mut Vec<Diagnostic>| {
        if middleware.param(key).is_none() {
            diagnostics.push(Diagnostic::error(
                DiagnosticCode::MissingMiddlewareParam,
                format!(
                    "미들웨어 '{}'({})에 필수 파라미터 '{}'가 없음",
                    middleware.id,
                    middleware.kind.as_kebab(),
                    key
                ),
            ));
        }
    };

    let require_int = |key: &str, diagnostics: &mut Vec<Diagnostic>| {
        if let Some(value) = middleware.param(key) {
            if value.as_int().is_none() {
                diagnostics.push(Diagnostic::error(
                    DiagnosticCode::InvalidMiddlewareParam,
                    format!(
                        "미들웨어 '{}'의 파라미터 '{}'는 숫자여야 함",
                        middleware.id, key
                    ),
                ));
            }
        }
    };

    match middleware.kind {
        MiddlewareKind::BasicAuth => {
            if middleware.param("users").is_none() && middleware.param("usersFile").is_none() {
                diagnostics.push(Diagnostic::error(
                    DiagnosticCode::MissingMiddlewareParam,
                    format!(
                        "미들웨어 '{}'(basic-auth)에 users 또는 usersFile이 필요함",
                        middleware.id
                    ),
                ));
            }
        }
        MiddlewareKind::RateLimit => {
            require("average", diagnostics);
            require_int("average", diagnostics);
            require_int("burst", diagnostics);
        }
        MiddlewareKind::IpAllowList => {
            require("sourceRange", diagnostics);
        }
        MiddlewareKind::RedirectScheme => {
            require("scheme", diagnostics);
        }
        MiddlewareKind::RedirectRegex => {
            require("regex", diagnostics);
            require("replacement", diagnostics);
        }
        MiddlewareKind::StripPrefix | MiddlewareKind::AddPrefix => {
            let key = if middleware.kind == MiddlewareKind::StripPrefix {
                "prefixes"
            } else {
                "prefix"
            };
            require(key, diagnostics);
        }
        MiddlewareKind::ReplacePath => {
            require("path", diagnostics);
        }
        MiddlewareKind::InFlightReq => {
            require("amount", diagnostics);
            require_int("amount", diagnostics);
        }
        MiddlewareKind::ForwardAuth => {
            require("address", diagnostics);
        }
        MiddlewareKind::CircuitBreaker => {
            require("expression", diagnostics);
        }
        MiddlewareKind::Chain => {
            require("middlewares", diagnostics);
        }
        MiddlewareKind::Retry => {
            require_int("attempts", diagnostics);
        }
        MiddlewareKind::Compress | MiddlewareKind::Headers | MiddlewareKind::Buffering => {}
    }
}

/// 우선순위 충돌과 명시 우선순위 힌트
fn check_priorities(config: &Config, diagnostics: &mut Vec<Diagnostic>) {
    // (프로토콜, 규칙 텍스트, 우선순위) → 라우터 id들
    let mut by_rule: BTreeMap<(Protocol, String, i32), Vec<&Router>> = BTreeMap::new();

    for router in config.routers.values() {
        let Some(rule) = &router.rule else {
            continue;
        };
        let key = (
            router.protocol,
            print_rule(rule, Dialect::V3),
            router.priority.unwrap_or(0),
        );
        by_rule.entry(key).or_default().push(router);
    }

    for ((_, rule_text, _), routers) in &by_rule {
        if routers.len() > 1 {
            let ids: Vec<&str> = routers.iter().map(|router| router.id.as_str()).collect();
            diagnostics.push(Diagnostic::warning(
                DiagnosticCode::PriorityConflict,
                format!(
                    "같은 규칙과 우선순위의 라우터들: {} (규칙: {})",
                    ids.join(", "),
                    rule_text
                ),
            ));
        }
    }

    // 같은 호스트를 다투는 라우터 중 더 긴(구체적인) 규칙에 명시
    // 우선순위가 없으면 힌트
    let mut by_host: BTreeMap<String, Vec<(&Router, usize)>> = BTreeMap::new();
    for router in config.routers.values() {
        let Some(rule) = &router.rule else {
            continue;
        };
        let length = print_rule(rule, Dialect::V3).len();
        for host in rule.hosts() {
            by_host.entry(host).or_default().push((router, length));
        }
    }

    for (host, routers) in &by_host {
        if routers.len() < 2 {
            continue;
        }
        let min_len = routers.iter().map(|(_, len)| *len).min().unwrap_or(0);
        for (router, length) in routers {
            if *length > min_len && router.priority.is_none() {
                diagnostics.push(
                    Diagnostic::info(
                        DiagnosticCode::PriorityHint,
                        format!(
                            "라우터 '{}'는 호스트 '{}'의 다른 라우터보다 구체적이지만 명시 우선순위가 없음",
                            router.id, host
                        ),
                    )
                    .with_fix("priority를 명시하면 평가 순서가 분명해집니다".to_string()),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LbPolicy, ParamValue, Server, Service, TlsSpec};
    use crate::rule::parse_rule;

    fn base_config() -> Config {
        let mut config = Config::new();
        let mut service = Service::new("s", Protocol::Http);
        service.pool.servers.push(Server::url("http://web:8080"));
        config.insert_service(service);
        config
    }

    #[test]
    fn test_undefined_service_reference() {
        let mut config = base_config();
        config.insert_router(Router::new("r", Protocol::Http, "missing"));

        validate(&mut config);
        assert!(config
            .diagnostics
            .iter()
            .any(|d| d.code == DiagnosticCode::UndefinedReference && d.is_error()));
    }

    #[test]
    fn test_protocol_mismatch() {
        let mut config = base_config();
        let mut router = Router::new("r", Protocol::Http, "s");
        router.rule = Some(parse_rule("HostSNI(`db`)", Dialect::V3).unwrap());
        config.insert_router(router);

        validate(&mut config);
        assert!(config
            .diagnostics
            .iter()
            .any(|d| d.code == DiagnosticCode::ProtocolMismatch));
    }

    #[test]
    fn test_udp_router_constraints() {
        let mut config = Config::new();
        let mut service = Service::new("dns", Protocol::Udp);
        service.pool.servers.push(Server::address("10.0.0.1:53"));
        config.insert_service(service);

        let mut router = Router::new("dns-in", Protocol::Udp, "dns");
        router.rule = Some(parse_rule("ClientIP(`10.0.0.0/8`)", Dialect::V3).unwrap());
        router.tls = Some(TlsSpec::default());
        config.insert_router(router);

        validate(&mut config);
        assert!(config
            .diagnostics
            .iter()
            .any(|d| d.code == DiagnosticCode::UdpRouterWithRule));
        assert!(config
            .diagnostics
            .iter()
            .any(|d| d.code == DiagnosticCode::UdpRouterWithTls));
    }

    #[test]
    fn test_empty_pool_and_weights() {
        let mut config = Config::new();
        config.insert_service(Service::new("empty", Protocol::Http));

        let mut weighted = Service::new("weighted", Protocol::Http);
        weighted.pool.policy = LbPolicy::WeightedRoundRobin;
        weighted.pool.servers.push(Server::url("http://a:1").with_weight(2));
        weighted.pool.servers.push(Server::url("http://b:1"));
        config.insert_service(weighted);

        validate(&mut config);
        assert!(config
            .diagnostics
            .iter()
            .any(|d| d.code == DiagnosticCode::EmptyPool));
        assert!(config
            .diagnostics
            .iter()
            .any(|d| d.code == DiagnosticCode::MissingWeight));
    }

    #[test]
    fn test_bare_tls_warning() {
        let mut config = base_config();
        let mut router = Router::new("r", Protocol::Http, "s");
        router.rule = Some(parse_rule("Host(`x`)", Dialect::V3).unwrap());
        router.tls = Some(TlsSpec::default());
        config.insert_router(router);

        validate(&mut config);
        let diagnostic = config
            .diagnostics
            .iter()
            .find(|d| d.code == DiagnosticCode::MissingCertResolver)
            .unwrap();
        assert_eq!(diagnostic.severity, crate::model::Severity::Warning);
        assert!(diagnostic.fix.is_some());
    }

    #[test]
    fn test_middleware_param_validation() {
        let mut config = base_config();
        config.insert_middleware(Middleware::new("limiter", MiddlewareKind::RateLimit));
        config.insert_middleware(
            Middleware::new("bad-limiter", MiddlewareKind::RateLimit)
                .with_param("average", ParamValue::Str("fast".to_string())),
        );

        validate(&mut config);
        assert!(config
            .diagnostics
            .iter()
            .any(|d| d.code == DiagnosticCode::MissingMiddlewareParam));
        assert!(config
            .diagnostics
            .iter()
            .any(|d| d.code == DiagnosticCode::InvalidMiddlewareParam));
    }

    #[test]
    fn test_invalid_regex_argument() {
        let mut config = base_config();
        let mut router = Router::new("r", Protocol::Http, "s");
        router.rule = Some(parse_rule("PathRegexp(`[unclosed`)", Dialect::V3).unwrap());
        config.insert_router(router);

        validate(&mut config);
        assert!(config
            .diagnostics
            .iter()
            .any(|d| d.code == DiagnosticCode::InvalidRegex && d.is_error()));

        // 유효한 정규식은 통과
        let mut config = base_config();
        let mut router = Router::new("ok", Protocol::Http, "s");
        router.rule = Some(parse_rule(r"HostRegexp(`^api-[a-z]+$`)", Dialect::V3).unwrap());
        config.insert_router(router);
        validate(&mut config);
        assert!(!config
            .diagnostics
            .iter()
            .any(|d| d.code == DiagnosticCode::InvalidRegex));
    }

    #[test]
    fn test_priority_conflict_warning() {
        let mut config = base_config();
        for id in ["a", "b"] {
            let mut router = Router::new(id, Protocol::Http, "s");
            router.rule = Some(parse_rule("Host(`x`)", Dialect::V3).unwrap());
            config.insert_router(router);
        }

        validate(&mut config);
        assert!(config
            .diagnostics
            .iter()
            .any(|d| d.code == DiagnosticCode::PriorityConflict));
    }

    #[test]
    fn test_priority_hint_for_specific_rule() {
        let mut config = base_config();

        let mut short = Router::new("short", Protocol::Http, "s");
        short.rule = Some(parse_rule("Host(`x`)", Dialect::V3).unwrap());
        config.insert_router(short);

        let mut long = Router::new("long", Protocol::Http, "s");
        long.rule =
            Some(parse_rule("Host(`x`) && PathPrefix(`/api`)", Dialect::V3).unwrap());
        config.insert_router(long);

        validate(&mut config);
        let hint = config
            .diagnostics
            .iter()
            .find(|d| d.code == DiagnosticCode::PriorityHint)
            .unwrap();
        assert!(hint.message.contains("long"));
    }

    #[test]
    fn test_clean_config_passes() {
        let mut config = base_config();
        let mut router = Router::new("r", Protocol::Http, "s");
        router.rule = Some(parse_rule("Host(`x`)", Dialect::V3).unwrap());
        config.insert_router(router);

        validate(&mut config);
        assert!(!config.has_errors());
    }
}
