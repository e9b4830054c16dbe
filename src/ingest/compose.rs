use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::debug;

use crate::ingest::error::{IngestError, Result};
use crate::ingest::labels::{fold_labels, LabelNode};
use crate::model::{
    Config, Diagnostic, DiagnosticCode, HealthCheck, LbPolicy, Middleware, MiddlewareKind,
    ParamValue, Protocol, Router, Server, Service, TlsSpec,
};
use crate::rule::{parse_rule, Dialect};

/// docker-compose 매니페스트
#[derive(Debug, Deserialize)]
struct ComposeFile {
    #[serde(default)]
    services: BTreeMap<String, ComposeService>,
}

#[derive(Debug, Deserialize)]
struct ComposeService {
    labels: Option<ComposeLabels>,

    #[serde(default)]
    ports: Vec<PortEntry>,

    #[serde(default)]
    expose: Vec<ScalarString>,
}

/// compose 라벨은 목록(`- k=v`)과 맵(`k: v`) 두 표기가 모두 허용됩니다.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ComposeLabels {
    List(Vec<String>),
    Map(BTreeMap<String, ScalarString>),
}

/// YAML 스칼라를 문자열로 받아들이는 래퍼 (불리언/숫자 표기 포함)
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScalarString {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl ScalarString {
    fn to_string_value(&self) -> String {
        match self {
            ScalarString::Str(s) => s.clone(),
            ScalarString::Int(n) => n.to_string(),
            ScalarString::Bool(b) => b.to_string(),
        }
    }
}

/// 포트 매핑: `"8080:80"`, `8080`, 또는 long form 맵
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PortEntry {
    Scalar(ScalarString),
    Long { target: u16 },
}

impl PortEntry {
    /// 컨테이너 쪽 포트
    fn container_port(&self) -> Option<u16> {
        match self {
            PortEntry::Long { target } => Some(*target),
            PortEntry::Scalar(scalar) => {
                let text = scalar.to_string_value();
                // "호스트:컨테이너" 형태면 컨테이너 쪽, 아니면 그 자체
                let container = text.rsplit_once(':').map(|(_, c)| c).unwrap_or(&text);
                container.split('/').next().and_then(|p| p.parse().ok())
            }
        }
    }
}

/// Traefik 라벨이 붙은 docker-compose 매니페스트를 통합 모델로 수집합니다.
///
/// 각 서비스의 `traefik.` 네임스페이스 라벨을 점 단위로 접어 트리로 만들고,
/// `http|tcp|udp.routers/services/middlewares` 하위 트리를 해석합니다.
pub fn ingest_compose(input: &[u8], dialect: Dialect) -> Result<Config> {
    let file: ComposeFile =
        serde_yaml::from_slice(input).map_err(|e| IngestError::YamlSyntax { source: e })?;

    let mut config = Config::new();

    for (service_name, compose_service) in &file.services {
        ingest_service(&mut config, service_name, compose_service, dialect)?;
    }

    debug!(
        routers = config.routers.len(),
        services = config.services.len(),
        "docker-compose 수집 완료"
    );

    Ok(config)
}

fn ingest_service(
    config: &mut Config,
    service_name: &str,
    compose_service: &ComposeService,
    dialect: Dialect,
) -> Result<()> {
    let pairs: Vec<(String, String)> = match &compose_service.labels {
        Some(ComposeLabels::List(items)) => items
            .iter()
            .filter_map(|item| {
                item.split_once('=')
                    .map(|(key, value)| (key.trim().to_string(), value.to_string()))
            })
            .collect(),
        Some(ComposeLabels::Map(map)) => map
            .iter()
            .map(|(key, value)| (key.clone(), value.to_string_value()))
            .collect(),
        None => return Ok(()),
    };

    let traefik_pairs: Vec<(&str, &str)> = pairs
        .iter()
        .filter(|(key, _)| key.starts_with("traefik."))
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect();

    if traefik_pairs.is_empty() {
        return Ok(());
    }

    let tree = fold_labels(traefik_pairs)?;
    let Some(traefik) = tree.get("traefik") else {
        return Ok(());
    };

    // enable=false 이면 이 서비스의 라벨 전체를 무시
    if traefik.leaf_at("enable") == Some("false") {
        config.push_diagnostic(Diagnostic::info(
            DiagnosticCode::UnknownField,
            format!("서비스 '{}'는 traefik.enable=false로 제외됨", service_name),
        ));
        return Ok(());
    }

    let inherited_port = compose_service
        .ports
        .first()
        .and_then(PortEntry::container_port)
        .or_else(|| {
            compose_service
                .expose
                .first()
                .and_then(|scalar| scalar.to_string_value().parse().ok())
        });

    for (protocol_key, protocol) in [
        ("http", Protocol::Http),
        ("tcp", Protocol::Tcp),
        ("udp", Protocol::Udp),
    ] {
        let Some(section) = traefik.get(protocol_key) else {
            continue;
        };
        ingest_label_section(
            config,
            service_name,
            section,
            protocol,
            dialect,
            inherited_port,
        )?;
    }

    // 프로토콜 섹션도 enable도 아닌 나머지 라벨은 보존 대상
    if let Some(children) = traefik.as_tree() {
        for (key, node) in children {
            if matches!(key.as_str(), "enable" | "http" | "tcp" | "udp") {
                continue;
            }
            for (path, value) in node.flatten() {
                let full = if path.is_empty() {
                    format!("traefik.{}", key)
                } else {
                    format!("traefik.{}.{}", key, path)
                };
                config.raw_extras.insert(full.clone(), value);
                config.push_diagnostic(Diagnostic::warning(
                    DiagnosticCode::UnknownField,
                    format!("서비스 '{}'의 알 수 없는 라벨 '{}'", service_name, full),
                ));
            }
        }
    }

    Ok(())
}

fn ingest_label_section(
    config: &mut Config,
    compose_name: &str,
    section: &LabelNode,
    protocol: Protocol,
    dialect: Dialect,
    inherited_port: Option<u16>,
) -> Result<()> {
    let mut declared_services: Vec<String> = Vec::new();

    if let Some(services) = section.get("services").and_then(LabelNode::as_tree) {
        for (id, node) in services {
            declared_services.push(id.clone());
            let service =
                build_label_service(config, compose_name, id, node, protocol, inherited_port);
            config.insert_service(service);
        }
    }

    if let Some(routers) = section.get("routers").and_then(LabelNode::as_tree) {
        for (id, node) in routers {
            let router = build_label_router(
                config,
                compose_name,
                id,
                node,
                protocol,
                dialect,
                &declared_services,
                inherited_port,
            )?;
            config.insert_router(router);
        }
    }

    if let Some(middlewares) = section.get("middlewares").and_then(LabelNode::as_tree) {
        for (id, node) in middlewares {
            if let Some(middleware) = build_label_middleware(config, id, node) {
                config.insert_middleware(middleware);
            }
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn build_label_router(
    config: &mut Config,
    compose_name: &str,
    id: &str,
    node: &LabelNode,
    protocol: Protocol,
    dialect: Dialect,
    declared_services: &[String],
    inherited_port: Option<u16>,
) -> Result<Router> {
    // service 라벨이 없으면 컨테이너 이름의 합성 서비스로 연결
    let service_ref = node
        .leaf_at("service")
        .map(str::to_string)
        .unwrap_or_else(|| {
            if declared_services.len() == 1 {
                declared_services[0].clone()
            } else {
                compose_name.to_string()
            }
        });

    // 참조 대상이 아직 없으면 compose 서비스에서 합성
    if !config.services.contains_key(&service_ref) && service_ref == compose_name {
        let service = synthesize_service(compose_name, protocol, inherited_port);
        config.insert_service(service);
    }

    let mut router = Router::new(id, protocol, service_ref);

    if let Some(children) = node.as_tree() {
        for (key, child) in children {
            match key.as_str() {
                "rule" => {
                    let Some(rule_text) = child.as_leaf() else {
                        return Err(IngestError::LabelConflict {
                            path: format!("routers.{}.rule", id),
                        });
                    };
                    let expr =
                        parse_rule(rule_text, dialect).map_err(|source| IngestError::Rule {
                            router: id.to_string(),
                            source,
                        })?;
                    router.rule = Some(expr);
                }
                "service" => {}
                "priority" => {
                    match child.as_leaf().and_then(|text| text.parse().ok()) {
                        Some(priority) => router.priority = Some(priority),
                        None => config.push_diagnostic(Diagnostic::warning(
                            DiagnosticCode::UnknownField,
                            format!("라우터 '{}'의 priority 값이 정수가 아님", id),
                        )),
                    }
                }
                "entrypoints" => {
                    if let Some(list) = child.as_leaf() {
                        router.entrypoints =
                            list.split(',').map(|item| item.trim().to_string()).collect();
                    }
                }
                "middlewares" => {
                    if let Some(list) = child.as_leaf() {
                        router.middlewares =
                            list.split(',').map(|item| item.trim().to_string()).collect();
                    }
                }
                "tls" => {
                    router.tls = Some(build_label_tls(config, id, child));
                }
                other => {
                    let full = format!("{}.routers.{}.{}", protocol, id, other);
                    for (path, value) in child.flatten() {
                        let key = if path.is_empty() {
                            full.clone()
                        } else {
                            format!("{}.{}", full, path)
                        };
                        config.raw_extras.insert(key, value);
                    }
                    config.push_diagnostic(Diagnostic::warning(
                        DiagnosticCode::UnknownField,
                        format!("라우터 '{}'의 알 수 없는 라벨 '{}'", id, other),
                    ));
                }
            }
        }
    }

    Ok(router)
}

/// `tls` 라벨: `tls=true` 리프이거나 `tls.certresolver=...` 트리
fn build_label_tls(config: &mut Config, router_id: &str, node: &LabelNode) -> TlsSpec {
    let mut spec = TlsSpec::default();

    match node {
        LabelNode::Leaf(_) => {}
        LabelNode::Tree(children) => {
            for (key, child) in children {
                match key.as_str() {
                    "certresolver" => {
                        spec.cert_resolver = child.as_leaf().map(str::to_string);
                    }
                    "options" => {
                        spec.options_ref = child.as_leaf().map(str::to_string);
                    }
                    other => {
                        for (path, value) in child.flatten() {
                            let key = if path.is_empty() {
                                format!("routers.{}.tls.{}", router_id, other)
                            } else {
                                format!("routers.{}.tls.{}.{}", router_id, other, path)
                            };
                            config.raw_extras.insert(key, value);
                        }
                        config.push_diagnostic(Diagnostic::warning(
                            DiagnosticCode::UnknownField,
                            format!("라우터 '{}'의 알 수 없는 tls 라벨 '{}'", router_id, other),
                        ));
                    }
                }
            }
        }
    }

    spec
}

fn build_label_service(
    config: &mut Config,
    compose_name: &str,
    id: &str,
    node: &LabelNode,
    protocol: Protocol,
    inherited_port: Option<u16>,
) -> Service {
    let mut service = Service::new(id, protocol);

    let port = node
        .leaf_at("loadbalancer.server.port")
        .and_then(|text| text.parse::<u16>().ok())
        .or(inherited_port);

    let scheme = node
        .leaf_at("loadbalancer.server.scheme")
        .unwrap_or("http");

    service.pool.servers.push(container_server(
        compose_name,
        protocol,
        scheme,
        port,
    ));
    service.pool.policy = LbPolicy::RoundRobin;

    if let Some(health) = node.get("loadbalancer.healthcheck") {
        service.health = Some(HealthCheck {
            path: health
                .leaf_at("path")
                .unwrap_or("/health")
                .to_string(),
            interval_secs: health
                .leaf_at("interval")
                .and_then(|text| text.trim_end_matches('s').parse().ok())
                .unwrap_or(30),
            timeout_secs: health
                .leaf_at("timeout")
                .and_then(|text| text.trim_end_matches('s').parse().ok())
                .unwrap_or(5),
        });
    }

    // server.port/scheme/healthcheck 외의 로드밸런서 라벨은 보존
    if let Some(lb) = node.get("loadbalancer").and_then(LabelNode::as_tree) {
        for (key, child) in lb {
            if matches!(key.as_str(), "server" | "healthcheck") {
                continue;
            }
            for (path, value) in child.flatten() {
                let full = if path.is_empty() {
                    format!("services.{}.loadbalancer.{}", id, key)
                } else {
                    format!("services.{}.loadbalancer.{}.{}", id, key, path)
                };
                config.raw_extras.insert(full, value);
            }
            config.push_diagnostic(Diagnostic::warning(
                DiagnosticCode::UnsupportedFeature,
                format!("서비스 '{}'의 로드밸런서 라벨 '{}'는 보존만 됨", id, key),
            ));
        }
    }

    service
}

/// 포트 지정이 없는 합성 서비스. 포트 없는 대상도 그대로 만들어 두면
/// MissingPort 보고는 검증기의 풀 검사 한 곳에서만 나옵니다.
fn synthesize_service(
    compose_name: &str,
    protocol: Protocol,
    inherited_port: Option<u16>,
) -> Service {
    let mut service = Service::new(compose_name, protocol);
    service
        .pool
        .servers
        .push(container_server(compose_name, protocol, "http", inherited_port));
    service
}

fn container_server(
    compose_name: &str,
    protocol: Protocol,
    scheme: &str,
    port: Option<u16>,
) -> Server {
    match protocol {
        Protocol::Http => {
            let url = match port {
                Some(port) => format!("{}://{}:{}", scheme, compose_name, port),
                None => format!("{}://{}", scheme, compose_name),
            };
            Server::url(url)
        }
        Protocol::Tcp | Protocol::Udp => {
            let address = match port {
                Some(port) => format!("{}:{}", compose_name, port),
                None => compose_name.to_string(),
            };
            Server::address(address)
        }
    }
}

fn build_label_middleware(
    config: &mut Config,
    id: &str,
    node: &LabelNode,
) -> Option<Middleware> {
    let children = node.as_tree()?;
    let (kind_key, params_node) = children.iter().next()?;

    if children.len() > 1 {
        config.push_diagnostic(Diagnostic::warning(
            DiagnosticCode::UnknownField,
            format!("미들웨어 '{}'에 종류 키가 여러 개, '{}'만 사용", id, kind_key),
        ));
    }

    let Some(kind) = MiddlewareKind::from_key(kind_key) else {
        for (path, value) in params_node.flatten() {
            config
                .raw_extras
                .insert(format!("middlewares.{}.{}.{}", id, kind_key, path), value);
        }
        config.push_diagnostic(Diagnostic::warning(
            DiagnosticCode::UnsupportedFeature,
            format!("미들웨어 '{}'의 종류 '{}'는 인식되지 않음", id, kind_key),
        ));
        return None;
    };

    let mut middleware = Middleware::new(id, kind);
    match params_node {
        LabelNode::Leaf(value) => {
            // `compress=true`처럼 파라미터 없는 종류
            if value != "true" {
                middleware
                    .params
                    .insert("value".to_string(), ParamValue::Str(value.clone()));
            }
        }
        LabelNode::Tree(params) => {
            for (key, child) in params {
                middleware
                    .params
                    .insert(key.clone(), label_node_to_param(child));
            }
        }
    }

    Some(middleware)
}

fn label_node_to_param(node: &LabelNode) -> ParamValue {
    match node {
        LabelNode::Leaf(value) => {
            if let Ok(number) = value.parse::<i64>() {
                ParamValue::Int(number)
            } else if let Ok(boolean) = value.parse::<bool>() {
                ParamValue::Bool(boolean)
            } else {
                ParamValue::Str(value.clone())
            }
        }
        LabelNode::Tree(children) => ParamValue::Map(
            children
                .iter()
                .map(|(key, child)| (key.clone(), label_node_to_param(child)))
                .collect(),
        ),
    }
}
