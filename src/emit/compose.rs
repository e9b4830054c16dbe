use serde_json::{json, Map, Value};

use crate::emit::error::{EmitError, Emitted, Result};
use crate::model::{Config, Diagnostic, DiagnosticCode, ParamValue, Router};
use crate::rule::{print_rule, Dialect};

/// 통합 모델을 Traefik 라벨이 붙은 docker-compose 매니페스트로 방출합니다.
///
/// 서비스마다 compose 서비스 스텁(이미지 자리표시자)을 만들고, 그 서비스를
/// 참조하는 라우터들을 `traefik.<proto>.routers.<id>.*` 라벨로 직렬화합니다.
pub fn emit_compose(config: &Config, dialect: Dialect) -> Result<Emitted> {
    let mut diagnostics = Vec::new();
    let mut services = Map::new();

    for service in config.services.values() {
        let mut labels: Vec<String> = vec!["traefik.enable=true".to_string()];
        let prefix = service.protocol.as_str();

        // 이 서비스를 참조하는 라우터들의 라벨
        for router in config.routers.values() {
            if router.service != service.id {
                continue;
            }
            router_labels(router, dialect, &mut labels);
        }

        // 컨테이너 포트는 첫 서버의 포트에서
        let port = service
            .pool
            .servers
            .first()
            .and_then(|server| server.target.port());
        if let Some(port) = port {
            labels.push(format!(
                "traefik.{}.services.{}.loadbalancer.server.port={}",
                prefix, service.id, port
            ));
        } else {
            diagnostics.push(Diagnostic::warning(
                DiagnosticCode::MissingPort,
                format!("서비스 '{}'의 컨테이너 포트를 결정할 수 없음", service.id),
            ));
        }

        // 라우터가 참조하는 미들웨어 정의 라벨
        for router in config.routers.values() {
            if router.service != service.id {
                continue;
            }
            for middleware_id in &router.middlewares {
                if let Some(middleware) = config.middlewares.get(middleware_id) {
                    middleware_labels(middleware, &mut labels);
                }
            }
        }

        let mut entry = Map::new();
        entry.insert(
            "image".to_string(),
            Value::String(format!("{}:latest", service.id)),
        );
        entry.insert(
            "labels".to_string(),
            Value::Array(labels.into_iter().map(Value::String).collect()),
        );

        // 같은 포트의 복수 서버는 replicas로 표현
        if service.pool.servers.len() > 1 {
            let same_port = service
                .pool
                .servers
                .iter()
                .all(|server| server.target.port() == port);
            if same_port {
                entry.insert(
                    "deploy".to_string(),
                    json!({ "replicas": service.pool.servers.len() }),
                );
            } else {
                diagnostics.push(Diagnostic::warning(
                    DiagnosticCode::UnsupportedFeature,
                    format!(
                        "서비스 '{}'의 서버들이 서로 다른 포트라 replicas로 표현 불가",
                        service.id
                    ),
                ));
            }
        }

        services.insert(service.id.clone(), Value::Object(entry));
    }

    let compose = json!({ "services": Value::Object(services) });
    let content = serde_yaml::to_string(&compose).map_err(|e| EmitError::Yaml { source: e })?;

    Ok(Emitted {
        content,
        diagnostics,
    })
}

fn router_labels(router: &Router, dialect: Dialect, labels: &mut Vec<String>) {
    let prefix = format!("traefik.{}.routers.{}", router.protocol, router.id);

    if let Some(rule) = &router.rule {
        labels.push(format!("{}.rule={}", prefix, print_rule(rule, dialect)));
    }
    labels.push(format!("{}.service={}", prefix, router.service));

    if let Some(priority) = router.priority {
        labels.push(format!("{}.priority={}", prefix, priority));
    }
    if !router.entrypoints.is_empty() {
        labels.push(format!("{}.entrypoints={}", prefix, router.entrypoints.join(",")));
    }
    if !router.middlewares.is_empty() {
        labels.push(format!("{}.middlewares={}", prefix, router.middlewares.join(",")));
    }
    if let Some(tls) = &router.tls {
        match &tls.cert_resolver {
            Some(resolver) => {
                labels.push(format!("{}.tls.certresolver={}", prefix, resolver));
            }
            None => labels.push(format!("{}.tls=true", prefix)),
        }
        if let Some(options) = &tls.options_ref {
            labels.push(format!("{}.tls.options={}", prefix, options));
        }
    }
}

fn middleware_labels(middleware: &crate::model::Middleware, labels: &mut Vec<String>) {
    let prefix = format!(
        "traefik.http.middlewares.{}.{}",
        middleware.id,
        middleware.kind.traefik_key().to_ascii_lowercase()
    );

    if middleware.params.is_empty() {
        labels.push(format!("{}=true", prefix));
        return;
    }

    for (key, value) in &middleware.params {
        flatten_param(&format!("{}.{}", prefix, key), value, labels);
    }
}

fn flatten_param(path: &str, value: &ParamValue, labels: &mut Vec<String>) {
    match value {
        ParamValue::Str(text) => labels.push(format!("{}={}", path, text)),
        ParamValue::Int(number) => labels.push(format!("{}={}", path, number)),
        ParamValue::Bool(flag) => labels.push(format!("{}={}", path, flag)),
        ParamValue::List(items) => {
            let joined: Vec<String> = items
                .iter()
                .map(|item| match item {
                    ParamValue::Str(text) => text.clone(),
                    ParamValue::Int(number) => number.to_string(),
                    ParamValue::Bool(flag) => flag.to_string(),
                    nested => nested.to_json().to_string(),
                })
                .collect();
            labels.push(format!("{}={}", path, joined.join(",")));
        }
        ParamValue::Map(map) => {
            for (key, nested) in map {
                flatten_param(&format!("{}.{}", path, key), nested, labels);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::ingest_compose;
    use crate::model::{Middleware, MiddlewareKind, Protocol, Server, Service};
    use crate::rule::parse_rule;

    fn sample_config() -> Config {
        let mut config = Config::new();
        let mut service = Service::new("web", Protocol::Http);
        service.pool.servers.push(Server::url("http://web:8080"));
        config.insert_service(service);

        let mut router = Router::new("r", Protocol::Http, "web");
        router.rule = Some(parse_rule("Host(`x`)", Dialect::V3).unwrap());
        router.middlewares = vec!["limiter".to_string()];
        config.insert_router(router);

        config.insert_middleware(
            Middleware::new("limiter", MiddlewareKind::RateLimit)
                .with_param("average", ParamValue::Int(50)),
        );
        config
    }

    #[test]
    fn test_emit_labels() {
        let emitted = emit_compose(&sample_config(), Dialect::V3).unwrap();
        let text = &emitted.content;

        assert!(text.contains("traefik.enable=true"));
        assert!(text.contains("traefik.http.routers.r.rule=Host(`x`)"));
        assert!(text.contains("traefik.http.routers.r.service=web"));
        assert!(text.contains("traefik.http.services.web.loadbalancer.server.port=8080"));
        assert!(text.contains("traefik.http.middlewares.limiter.ratelimit.average=50"));
        assert!(text.contains("image: web:latest"));
    }

    #[test]
    fn test_compose_roundtrip() {
        let emitted = emit_compose(&sample_config(), Dialect::V3).unwrap();
        let reparsed = ingest_compose(emitted.content.as_bytes(), Dialect::V3).unwrap();

        assert!(reparsed.routers.contains_key("r"));
        assert!(reparsed.services.contains_key("web"));
        assert_eq!(
            reparsed.middlewares["limiter"]
                .param("average")
                .and_then(ParamValue::as_int),
            Some(50)
        );
    }

    #[test]
    fn test_replicas_for_multi_server_pool() {
        let mut config = sample_config();
        config
            .services
            .get_mut("web")
            .unwrap()
            .pool
            .servers
            .push(Server::url("http://web-2:8080"));

        let emitted = emit_compose(&config, Dialect::V3).unwrap();
        assert!(emitted.content.contains("replicas: 2"));
    }
}
