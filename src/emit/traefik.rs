use serde_json::{json, Map, Value};

use crate::emit::error::{EmitError, Emitted, Result};
use crate::ingest::DataFormat;
use crate::model::{
    Config, Diagnostic, DiagnosticCode, LbPolicy, Protocol, Router, ServerTarget, Service,
};
use crate::rule::{print_rule, Dialect};

/// 통합 모델을 Traefik 동적 설정으로 방출합니다.
///
/// 수집기의 역함수입니다. 규칙 트리는 요청된 방언으로 출력되고
/// (기본 v3), 교차 참조는 id로, 미들웨어 파라미터 맵은 종류 키 아래에
/// 다시 직렬화됩니다.
pub fn emit_traefik(config: &Config, dialect: Dialect, format: DataFormat) -> Result<Emitted> {
    let mut diagnostics = Vec::new();
    let mut root = Map::new();

    for protocol in [Protocol::Http, Protocol::Tcp, Protocol::Udp] {
        if let Some(section) = emit_section(config, protocol, dialect, &mut diagnostics) {
            root.insert(protocol.as_str().to_string(), Value::Object(section));
        }
    }

    if let Some(tls) = emit_tls(config) {
        root.insert("tls".to_string(), tls);
    }

    let value = Value::Object(root);
    let content = match format {
        DataFormat::Yaml => {
            serde_yaml::to_string(&value).map_err(|e| EmitError::Yaml { source: e })?
        }
        DataFormat::Json => {
            let mut text = serde_json::to_string_pretty(&value)
                .map_err(|e| EmitError::Json { source: e })?;
            text.push('\n');
            text
        }
        DataFormat::Toml => {
            toml::to_string_pretty(&value).map_err(|e| EmitError::Toml { source: e })?
        }
    };

    Ok(Emitted {
        content,
        diagnostics,
    })
}

fn emit_section(
    config: &Config,
    protocol: Protocol,
    dialect: Dialect,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<Map<String, Value>> {
    let mut routers = Map::new();
    let mut services = Map::new();
    let mut middlewares = Map::new();

    for router in config.routers.values().filter(|r| r.protocol == protocol) {
        routers.insert(router.id.clone(), emit_router(router, dialect));
    }

    for service in config.services.values().filter(|s| s.protocol == protocol) {
        services.insert(service.id.clone(), emit_service(service, diagnostics));
    }

    // 미들웨어는 HTTP 섹션에만 존재
    if protocol == Protocol::Http {
        for middleware in config.middlewares.values() {
            let params: Map<String, Value> = middleware
                .params
                .iter()
                .map(|(key, value)| (key.clone(), value.to_json()))
                .collect();
            let mut entry = Map::new();
            entry.insert(
                middleware.kind.traefik_key().to_string(),
                Value::Object(params),
            );
            middlewares.insert(middleware.id.clone(), Value::Object(entry));
        }
    }

    if routers.is_empty() && services.is_empty() && middlewares.is_empty() {
        return None;
    }

    let mut section = Map::new();
    if !routers.is_empty() {
        section.insert("routers".to_string(), Value::Object(routers));
    }
    if !services.is_empty() {
        section.insert("services".to_string(), Value::Object(services));
    }
    if !middlewares.is_empty() {
        section.insert("middlewares".to_string(), Value::Object(middlewares));
    }
    Some(section)
}

fn emit_router(router: &Router, dialect: Dialect) -> Value {
    let mut out = Map::new();

    if let Some(rule) = &router.rule {
        out.insert(
            "rule".to_string(),
            Value::String(print_rule(rule, dialect)),
        );
    }
    out.insert("service".to_string(), Value::String(router.service.clone()));

    if let Some(priority) = router.priority {
        out.insert("priority".to_string(), json!(priority));
    }
    if !router.entrypoints.is_empty() {
        out.insert("entryPoints".to_string(), json!(router.entrypoints));
    }
    if !router.middlewares.is_empty() {
        out.insert("middlewares".to_string(), json!(router.middlewares));
    }
    if let Some(tls) = &router.tls {
        let mut tls_out = Map::new();
        if let Some(resolver) = &tls.cert_resolver {
            tls_out.insert("certResolver".to_string(), Value::String(resolver.clone()));
        }
        if let Some(options) = &tls.options_ref {
            tls_out.insert("options".to_string(), Value::String(options.clone()));
        }
        out.insert("tls".to_string(), Value::Object(tls_out));
    }

    Value::Object(out)
}

fn emit_service(service: &Service, diagnostics: &mut Vec<Diagnostic>) -> Value {
    // Traefik 로드밸런서는 (가중치 있는) 라운드로빈만 표현 가능
    if !matches!(
        service.pool.policy,
        LbPolicy::RoundRobin | LbPolicy::WeightedRoundRobin
    ) {
        diagnostics.push(Diagnostic::warning(
            DiagnosticCode::UnsupportedFeature,
            format!(
                "서비스 '{}'의 {} 정책은 Traefik에서 round_robin으로 강등됨",
                service.id, service.pool.policy
            ),
        ));
    }

    let servers: Vec<Value> = service
        .pool
        .servers
        .iter()
        .map(|server| {
            let mut entry = Map::new();
            match &server.target {
                ServerTarget::Url(url) => {
                    entry.insert("url".to_string(), Value::String(url.clone()));
                }
                ServerTarget::Address(address) => {
                    entry.insert("address".to_string(), Value::String(address.clone()));
                }
            }
            if let Some(weight) = server.weight {
                entry.insert("weight".to_string(), json!(weight));
            }
            Value::Object(entry)
        })
        .collect();

    let mut lb = Map::new();
    lb.insert("servers".to_string(), Value::Array(servers));

    if let Some(health) = &service.health {
        lb.insert(
            "healthCheck".to_string(),
            json!({
                "path": health.path,
                "interval": health.interval_secs,
                "timeout": health.timeout_secs,
            }),
        );
    }

    json!({ "loadBalancer": Value::Object(lb) })
}

/// 라우터들에 붙은 인증서 파일의 합집합과 TLS 옵션을 전역 tls 섹션으로.
fn emit_tls(config: &Config) -> Option<Value> {
    let mut certificates: Vec<Value> = Vec::new();
    let mut seen = std::collections::BTreeSet::new();

    for router in config.routers.values() {
        if let Some(tls) = &router.tls {
            for cert in &tls.cert_files {
                if seen.insert((cert.cert.clone(), cert.key.clone())) {
                    certificates.push(json!({
                        "certFile": cert.cert,
                        "keyFile": cert.key,
                    }));
                }
            }
        }
    }

    let mut out = Map::new();
    if !certificates.is_empty() {
        out.insert("certificates".to_string(), Value::Array(certificates));
    }

    if !config.tls_options.is_empty() {
        let mut options = Map::new();
        for (name, opts) in &config.tls_options {
            let mut entry = Map::new();
            if let Some(min) = &opts.min_version {
                entry.insert("minVersion".to_string(), Value::String(min.clone()));
            }
            if let Some(max) = &opts.max_version {
                entry.insert("maxVersion".to_string(), Value::String(max.clone()));
            }
            if !opts.cipher_suites.is_empty() {
                entry.insert("cipherSuites".to_string(), json!(opts.cipher_suites));
            }
            if let Some(strict) = opts.sni_strict {
                entry.insert("sniStrict".to_string(), Value::Bool(strict));
            }
            options.insert(name.clone(), Value::Object(entry));
        }
        out.insert("options".to_string(), Value::Object(options));
    }

    if out.is_empty() {
        None
    } else {
        Some(Value::Object(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::ingest_traefik;
    use crate::model::{Middleware, MiddlewareKind, ParamValue, Router, Server, Service};

    fn sample_config() -> Config {
        let mut config = Config::new();

        let mut service = Service::new("s", Protocol::Http);
        service.pool.servers.push(Server::url("http://web:8080"));
        config.insert_service(service);

        let mut router = Router::new("r", Protocol::Http, "s");
        router.rule = Some(crate::rule::parse_rule("Host(`x`)", Dialect::V3).unwrap());
        router.middlewares = vec!["limiter".to_string()];
        config.insert_router(router);

        config.insert_middleware(
            Middleware::new("limiter", MiddlewareKind::RateLimit)
                .with_param("average", ParamValue::Int(50))
                .with_param("burst", ParamValue::Int(100)),
        );

        config
    }

    #[test]
    fn test_emit_yaml_shape() {
        let emitted =
            emit_traefik(&sample_config(), Dialect::V3, DataFormat::Yaml).unwrap();
        let value: serde_json::Value = serde_yaml::from_str(&emitted.content).unwrap();

        assert_eq!(value["http"]["routers"]["r"]["rule"], "Host(`x`)");
        assert_eq!(value["http"]["routers"]["r"]["service"], "s");
        assert_eq!(
            value["http"]["services"]["s"]["loadBalancer"]["servers"][0]["url"],
            "http://web:8080"
        );
        assert_eq!(
            value["http"]["middlewares"]["limiter"]["rateLimit"]["average"],
            50
        );
    }

    #[test]
    fn test_emit_is_deterministic() {
        // 속성 4: 같은 Config는 바이트 단위로 같은 출력
        let config = sample_config();
        let first = emit_traefik(&config, Dialect::V3, DataFormat::Yaml).unwrap();
        let second = emit_traefik(&config, Dialect::V3, DataFormat::Yaml).unwrap();
        assert_eq!(first.content, second.content);
    }

    #[test]
    fn test_model_roundtrip() {
        // 속성 3: ingest(emit(c))가 c와 일치 (손실 없는 Config에 대해)
        let config = sample_config();
        assert!(config.is_lossless());

        let emitted = emit_traefik(&config, Dialect::V3, DataFormat::Yaml).unwrap();
        let reparsed =
            ingest_traefik(emitted.content.as_bytes(), DataFormat::Yaml, Dialect::V3).unwrap();

        assert_eq!(reparsed.routers.len(), config.routers.len());
        assert_eq!(reparsed.services.len(), config.services.len());
        assert_eq!(reparsed.middlewares.len(), config.middlewares.len());

        let router = &reparsed.routers["r"];
        assert_eq!(
            print_rule(router.rule.as_ref().unwrap(), Dialect::V3),
            "Host(`x`)"
        );
        assert_eq!(router.middlewares, vec!["limiter"]);

        let middleware = &reparsed.middlewares["limiter"];
        assert_eq!(middleware.param("average").and_then(ParamValue::as_int), Some(50));
    }

    #[test]
    fn test_policy_downgrade_warning() {
        let mut config = sample_config();
        config.services.get_mut("s").unwrap().pool.policy = LbPolicy::LeastConn;

        let emitted = emit_traefik(&config, Dialect::V3, DataFormat::Yaml).unwrap();
        assert!(emitted
            .diagnostics
            .iter()
            .any(|d| d.code == DiagnosticCode::UnsupportedFeature));
    }

    #[test]
    fn test_emit_json_format() {
        let emitted =
            emit_traefik(&sample_config(), Dialect::V3, DataFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&emitted.content).unwrap();
        assert_eq!(value["http"]["routers"]["r"]["service"], "s");
    }
}
