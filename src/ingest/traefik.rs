use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::debug;

use crate::ingest::error::{IngestError, Result};
use crate::model::{
    CertFile, Config, Diagnostic, DiagnosticCode, Entrypoint, HealthCheck, LbPolicy, Middleware,
    MiddlewareKind, ParamValue, Protocol, Router, Server, Service, TlsOptions, TlsSpec,
};
use crate::rule::{parse_rule, Dialect};

/// 구조화 입력의 데이터 형식입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Yaml,
    Json,
    Toml,
}

/// Traefik 동적 설정 파일 (YAML/JSON/TOML)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DynamicFile {
    http: Option<ProtocolSection>,
    tcp: Option<ProtocolSection>,
    udp: Option<ProtocolSection>,
    tls: Option<TlsSection>,
    entry_points: Option<BTreeMap<String, RawEntrypoint>>,

    #[serde(flatten)]
    extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct ProtocolSection {
    #[serde(default)]
    routers: BTreeMap<String, RawRouter>,

    #[serde(default)]
    services: BTreeMap<String, RawService>,

    #[serde(default)]
    middlewares: BTreeMap<String, serde_json::Value>,

    #[serde(flatten)]
    extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRouter {
    rule: Option<String>,
    service: Option<String>,
    priority: Option<i32>,

    #[serde(default)]
    entry_points: Vec<String>,

    #[serde(default)]
    middlewares: Vec<String>,

    tls: Option<serde_json::Value>,

    #[serde(flatten)]
    extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawService {
    load_balancer: Option<RawLoadBalancer>,

    #[serde(flatten)]
    extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLoadBalancer {
    #[serde(default)]
    servers: Vec<RawServer>,

    health_check: Option<RawHealthCheck>,

    #[serde(flatten)]
    extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawServer {
    url: Option<String>,
    address: Option<String>,
    weight: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawHealthCheck {
    path: Option<String>,
    interval: Option<serde_json::Value>,
    timeout: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TlsSection {
    #[serde(default)]
    certificates: Vec<RawCertificate>,

    #[serde(default)]
    options: BTreeMap<String, RawTlsOptions>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCertificate {
    cert_file: String,
    key_file: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTlsOptions {
    min_version: Option<String>,
    max_version: Option<String>,

    #[serde(default)]
    cipher_suites: Vec<String>,

    sni_strict: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawEntrypoint {
    address: String,
}

/// Traefik 동적 설정을 통합 모델로 수집합니다.
///
/// 매핑은 거의 일대일입니다. 규칙 문자열은 규칙 파서를 거치고,
/// 미들웨어 종류는 정의의 유일한 최상위 키로 판별합니다.
pub fn ingest_traefik(input: &[u8], format: DataFormat, dialect: Dialect) -> Result<Config> {
    let value = parse_data(input, format)?;
    let file: DynamicFile =
        serde_json::from_value(value).map_err(|e| IngestError::JsonSyntax { source: e })?;

    let mut config = Config::new();

    for key in file.extra.keys() {
        config.push_diagnostic(Diagnostic::warning(
            DiagnosticCode::UnknownField,
            format!("알 수 없는 최상위 필드 '{}'", key),
        ));
    }

    // 전역 인증서는 리졸버 없는 TLS 라우터에 붙입니다
    let global_certs: Vec<CertFile> = file
        .tls
        .as_ref()
        .map(|tls| {
            tls.certificates
                .iter()
                .map(|cert| CertFile {
                    cert: cert.cert_file.clone(),
                    key: cert.key_file.clone(),
                    ca: None,
                    dhparam: None,
                })
                .collect()
        })
        .unwrap_or_default();

    if let Some(tls) = &file.tls {
        for (name, options) in &tls.options {
            config.tls_options.insert(
                name.clone(),
                TlsOptions {
                    min_version: options.min_version.clone(),
                    max_version: options.max_version.clone(),
                    cipher_suites: options.cipher_suites.clone(),
                    sni_strict: options.sni_strict,
                },
            );
        }
    }

    if let Some(entrypoints) = &file.entry_points {
        for (name, raw) in entrypoints {
            let (address, protocol) = match raw.address.strip_suffix("/udp") {
                Some(addr) => (addr.to_string(), Protocol::Udp),
                None => match raw.address.strip_suffix("/tcp") {
                    Some(addr) => (addr.to_string(), Protocol::Tcp),
                    None => (raw.address.clone(), Protocol::Http),
                },
            };
            config
                .entrypoints
                .insert(name.clone(), Entrypoint { address, protocol });
        }
    }

    if let Some(http) = file.http {
        ingest_section(&mut config, http, Protocol::Http, dialect, &global_certs)?;
    }
    if let Some(tcp) = file.tcp {
        ingest_section(&mut config, tcp, Protocol::Tcp, dialect, &global_certs)?;
    }
    if let Some(udp) = file.udp {
        ingest_section(&mut config, udp, Protocol::Udp, dialect, &global_certs)?;
    }

    debug!(
        routers = config.routers.len(),
        services = config.services.len(),
        middlewares = config.middlewares.len(),
        "Traefik 동적 설정 수집 완료"
    );

    Ok(config)
}

fn parse_data(input: &[u8], format: DataFormat) -> Result<serde_json::Value> {
    match format {
        DataFormat::Yaml => {
            serde_yaml::from_slice(input).map_err(|e| IngestError::YamlSyntax { source: e })
        }
        DataFormat::Json => {
            serde_json::from_slice(input).map_err(|e| IngestError::JsonSyntax { source: e })
        }
        DataFormat::Toml => {
            let text = std::str::from_utf8(input).map_err(|e| IngestError::InvalidStructure {
                message: format!("TOML 입력이 UTF-8이 아님: {}", e),
            })?;
            toml::from_str(text).map_err(|e| IngestError::TomlSyntax { source: e })
        }
    }
}

fn ingest_section(
    config: &mut Config,
    section: ProtocolSection,
    protocol: Protocol,
    dialect: Dialect,
    global_certs: &[CertFile],
) -> Result<()> {
    for key in section.extra.keys() {
        config.push_diagnostic(Diagnostic::warning(
            DiagnosticCode::UnknownField,
            format!("{} 섹션의 알 수 없는 필드 '{}'", protocol, key),
        ));
    }

    for (id, raw) in section.routers {
        let router = build_router(config, &id, raw, protocol, dialect, global_certs)?;
        config.insert_router(router);
    }

    for (id, raw) in section.services {
        let service = build_service(config, &id, raw, protocol);
        config.insert_service(service);
    }

    for (id, raw) in section.middlewares {
        if let Some(middleware) = build_middleware(config, &id, &raw) {
            config.insert_middleware(middleware);
        }
    }

    Ok(())
}

fn build_router(
    config: &mut Config,
    id: &str,
    raw: RawRouter,
    protocol: Protocol,
    dialect: Dialect,
    global_certs: &[CertFile],
) -> Result<Router> {
    for key in raw.extra.keys() {
        config.push_diagnostic(Diagnostic::warning(
            DiagnosticCode::UnknownField,
            format!("라우터 '{}'의 알 수 없는 필드 '{}'", id, key),
        ));
    }

    let service = raw.service.unwrap_or_else(|| {
        config.push_diagnostic(Diagnostic::error(
            DiagnosticCode::UndefinedReference,
            format!("라우터 '{}'에 service 지정이 없음", id),
        ));
        String::new()
    });

    let mut router = Router::new(id, protocol, service);
    router.priority = raw.priority;
    router.entrypoints = raw.entry_points;
    router.middlewares = raw.middlewares;

    if let Some(rule) = raw.rule {
        let expr = parse_rule(&rule, dialect).map_err(|source| IngestError::Rule {
            router: id.to_string(),
            source,
        })?;
        router.rule = Some(expr);
    }

    if let Some(tls_value) = raw.tls {
        router.tls = Some(parse_router_tls(config, id, &tls_value, global_certs));
    }

    Ok(router)
}

/// 라우터의 `tls` 필드를 해석합니다. `true`, `{}`,
/// `{certResolver: ..., options: ...}` 형태를 모두 받습니다.
fn parse_router_tls(
    config: &mut Config,
    router_id: &str,
    value: &serde_json::Value,
    global_certs: &[CertFile],
) -> TlsSpec {
    let mut spec = TlsSpec::default();

    match value {
        serde_json::Value::Bool(true) | serde_json::Value::Null => {}
        serde_json::Value::Object(map) => {
            for (key, val) in map {
                match key.as_str() {
                    "certResolver" | "certresolver" => {
                        spec.cert_resolver = val.as_str().map(str::to_string);
                    }
                    "options" => {
                        spec.options_ref = val.as_str().map(str::to_string);
                    }
                    "domains" => {
                        config.raw_extras.insert(
                            format!("routers.{}.tls.domains", router_id),
                            val.to_string(),
                        );
                        config.push_diagnostic(Diagnostic::warning(
                            DiagnosticCode::UnsupportedFeature,
                            format!("라우터 '{}'의 tls.domains는 모델에 보존만 됨", router_id),
                        ));
                    }
                    other => {
                        config.push_diagnostic(Diagnostic::warning(
                            DiagnosticCode::UnknownField,
                            format!("라우터 '{}'의 알 수 없는 tls 필드 '{}'", router_id, other),
                        ));
                    }
                }
            }
        }
        other => {
            config.push_diagnostic(Diagnostic::warning(
                DiagnosticCode::UnknownField,
                format!("라우터 '{}'의 tls 값이 이상함: {}", router_id, other),
            ));
        }
    }

    if spec.cert_resolver.is_none() {
        spec.cert_files = global_certs.to_vec();
    }

    spec
}

fn build_service(
    config: &mut Config,
    id: &str,
    raw: RawService,
    protocol: Protocol,
) -> Service {
    let mut service = Service::new(id, protocol);

    // weighted/mirroring 등 loadBalancer 이외의 서비스 형태
    for (key, value) in &raw.extra {
        config.raw_extras.insert(
            format!("services.{}.{}", id, key),
            value.to_string(),
        );
        config.push_diagnostic(Diagnostic::warning(
            DiagnosticCode::UnsupportedFeature,
            format!("서비스 '{}'의 '{}' 형태는 로드밸런서로 표현되지 않음", id, key),
        ));
    }

    let Some(lb) = raw.load_balancer else {
        return service;
    };

    // passHostHeader, sticky 등 모델이 싣지 않는 로드밸런서 필드
    for (key, value) in &lb.extra {
        config.raw_extras.insert(
            format!("services.{}.loadbalancer.{}", id, key),
            value.to_string(),
        );
        config.push_diagnostic(Diagnostic::warning(
            DiagnosticCode::UnsupportedFeature,
            format!("서비스 '{}' 로드밸런서의 '{}' 필드는 보존만 됨", id, key),
        ));
    }

    let mut any_weight = false;
    for raw_server in lb.servers {
        let target = match (raw_server.url, raw_server.address) {
            (Some(url), _) => Server::url(url).target,
            (None, Some(address)) => Server::address(address).target,
            (None, None) => {
                config.push_diagnostic(Diagnostic::warning(
                    DiagnosticCode::UnknownField,
                    format!("서비스 '{}'에 url도 address도 없는 서버 항목", id),
                ));
                continue;
            }
        };
        if raw_server.weight.is_some() {
            any_weight = true;
        }
        service.pool.servers.push(Server {
            target,
            weight: raw_server.weight,
        });
    }

    service.pool.policy = if any_weight {
        LbPolicy::WeightedRoundRobin
    } else {
        LbPolicy::RoundRobin
    };

    if let Some(raw_health) = lb.health_check {
        service.health = Some(HealthCheck {
            path: raw_health.path.unwrap_or_else(|| "/health".to_string()),
            interval_secs: parse_duration_secs(raw_health.interval.as_ref(), 30),
            timeout_secs: parse_duration_secs(raw_health.timeout.as_ref(), 5),
        });
    }

    service
}

/// `10s` 같은 문자열 또는 초 단위 숫자를 받습니다.
fn parse_duration_secs(value: Option<&serde_json::Value>, default: u64) -> u64 {
    match value {
        Some(serde_json::Value::Number(n)) => n.as_u64().unwrap_or(default),
        Some(serde_json::Value::String(s)) => {
            let trimmed = s.trim_end_matches('s');
            trimmed.parse().unwrap_or(default)
        }
        _ => default,
    }
}

fn build_middleware(
    config: &mut Config,
    id: &str,
    raw: &serde_json::Value,
) -> Option<Middleware> {
    let map = match raw.as_object() {
        Some(map) if !map.is_empty() => map,
        _ => {
            config.push_diagnostic(Diagnostic::warning(
                DiagnosticCode::UnknownField,
                format!("미들웨어 '{}' 정의가 비어 있음", id),
            ));
            return None;
        }
    };

    if map.len() > 1 {
        config.push_diagnostic(Diagnostic::warning(
            DiagnosticCode::UnknownField,
            format!("미들웨어 '{}'에 최상위 키가 여러 개, 첫 키만 사용", id),
        ));
    }

    let (kind_key, params_value) = map.iter().next()?;

    let Some(kind) = MiddlewareKind::from_key(kind_key) else {
        config.raw_extras.insert(
            format!("middlewares.{}.{}", id, kind_key),
            params_value.to_string(),
        );
        config.push_diagnostic(Diagnostic::warning(
            DiagnosticCode::UnsupportedFeature,
            format!("미들웨어 '{}'의 종류 '{}'는 인식되지 않음", id, kind_key),
        ));
        return None;
    };

    let mut middleware = Middleware::new(id, kind);
    if let Some(params) = params_value.as_object() {
        for (key, value) in params {
            middleware
                .params
                .insert(key.clone(), ParamValue::from_json(value));
        }
    }

    Some(middleware)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_YAML: &str = r#"
http:
  routers:
    api:
      rule: "Host(`api.example.com`) && PathPrefix(`/v1`)"
      service: api-svc
      entryPoints: [websecure]
      middlewares: [api-auth]
      tls:
        certResolver: letsencrypt
  services:
    api-svc:
      loadBalancer:
        servers:
          - url: "http://api-1:8080"
          - url: "http://api-2:8080"
        healthCheck:
          path: /ping
          interval: 10s
  middlewares:
    api-auth:
      basicAuth:
        users: "admin:$apr1$xyz"
"#;

    #[test]
    fn test_ingest_http_section() {
        let config =
            ingest_traefik(SAMPLE_YAML.as_bytes(), DataFormat::Yaml, Dialect::V3).unwrap();

        let router = &config.routers["api"];
        assert_eq!(router.protocol, Protocol::Http);
        assert_eq!(router.service, "api-svc");
        assert_eq!(router.entrypoints, vec!["websecure"]);
        assert_eq!(
            router.tls.as_ref().unwrap().cert_resolver.as_deref(),
            Some("letsencrypt")
        );
        assert!(router.rule.is_some());

        let service = &config.services["api-svc"];
        assert_eq!(service.pool.servers.len(), 2);
        assert_eq!(service.pool.policy, LbPolicy::RoundRobin);
        let health = service.health.as_ref().unwrap();
        assert_eq!(health.path, "/ping");
        assert_eq!(health.interval_secs, 10);

        let middleware = &config.middlewares["api-auth"];
        assert_eq!(middleware.kind, MiddlewareKind::BasicAuth);
        assert!(middleware.param("users").is_some());
    }

    #[test]
    fn test_ingest_tcp_section() {
        let yaml = r#"
tcp:
  routers:
    db:
      rule: "HostSNI(`db.internal`)"
      service: db-svc
  services:
    db-svc:
      loadBalancer:
        servers:
          - address: "10.0.0.5:5432"
"#;
        let config = ingest_traefik(yaml.as_bytes(), DataFormat::Yaml, Dialect::V3).unwrap();
        assert_eq!(config.routers["db"].protocol, Protocol::Tcp);
        assert_eq!(
            config.services["db-svc"].pool.servers[0].target,
            crate::model::ServerTarget::Address("10.0.0.5:5432".to_string())
        );
    }

    #[test]
    fn test_bad_rule_fails_fast() {
        let yaml = r#"
http:
  routers:
    broken:
      rule: "Host(`a`) &&"
      service: s
"#;
        let err = ingest_traefik(yaml.as_bytes(), DataFormat::Yaml, Dialect::V3).unwrap_err();
        assert!(matches!(err, IngestError::Rule { router, .. } if router == "broken"));
    }

    #[test]
    fn test_unknown_middleware_kind_warns() {
        let yaml = r#"
http:
  middlewares:
    odd:
      snazzyFilter:
        level: 3
"#;
        let config = ingest_traefik(yaml.as_bytes(), DataFormat::Yaml, Dialect::V3).unwrap();
        assert!(config.middlewares.is_empty());
        assert!(!config.is_lossless());
        assert!(config.raw_extras.contains_key("middlewares.odd.snazzyFilter"));
    }

    #[test]
    fn test_json_and_toml_inputs() {
        let json = r#"{"http":{"routers":{"r":{"rule":"Host(`x`)","service":"s"}},
            "services":{"s":{"loadBalancer":{"servers":[{"url":"http://b:80"}]}}}}}"#;
        let config = ingest_traefik(json.as_bytes(), DataFormat::Json, Dialect::V3).unwrap();
        assert!(config.routers.contains_key("r"));

        let toml_text = r#"
[http.routers.r]
rule = "Host(`x`)"
service = "s"

[http.services.s.loadBalancer]
servers = [{ url = "http://b:80" }]
"#;
        let config = ingest_traefik(toml_text.as_bytes(), DataFormat::Toml, Dialect::V3).unwrap();
        assert!(config.routers.contains_key("r"));
    }

    #[test]
    fn test_global_certificates_attach_to_tls_routers() {
        let yaml = r#"
http:
  routers:
    site:
      rule: "Host(`z`)"
      service: s
      tls: {}
  services:
    s:
      loadBalancer:
        servers:
          - url: "http://b:80"
tls:
  certificates:
    - certFile: /certs/z.crt
      keyFile: /certs/z.key
"#;
        let config = ingest_traefik(yaml.as_bytes(), DataFormat::Yaml, Dialect::V3).unwrap();
        let tls = config.routers["site"].tls.as_ref().unwrap();
        assert_eq!(tls.cert_files.len(), 1);
        assert_eq!(tls.cert_files[0].cert, "/certs/z.crt");
    }
}
