use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::emit::error::{Emitted, Result};
use crate::model::{
    Config, Diagnostic, DiagnosticCode, LbPolicy, Middleware, MiddlewareKind, ParamValue,
    Protocol, Router, Service,
};
use crate::rule::{Matcher, MatcherName};

/// 통합 모델을 nginx 설정으로 내립니다.
///
/// HTTP 라우터는 규칙의 Host 집합으로 묶여 호스트 그룹마다 server 블록이
/// 되고, 참조된 서비스는 upstream 블록이 됩니다. TCP/UDP 라우터는
/// stream 블록으로 방출됩니다.
pub fn emit_nginx(config: &Config) -> Result<Emitted> {
    let mut out = String::new();
    let mut diagnostics = Vec::new();

    out.push_str("# generated by proxy-config-bridge\n");

    // rate-limit 미들웨어는 http 수준의 zone 정의가 선행되어야 함
    emit_rate_zones(config, &mut out);

    for service in config.services.values() {
        if service.protocol == Protocol::Http {
            emit_upstream(service, &mut out, &mut diagnostics);
        }
    }

    let (host_groups, default_routers) = group_http_routers(config);

    for (hosts, routers) in &host_groups {
        emit_host_group(config, hosts, routers, &mut out, &mut diagnostics);
    }

    if !default_routers.is_empty() {
        emit_default_server(config, &default_routers, &mut out, &mut diagnostics);
    }

    emit_stream_section(config, &mut out, &mut diagnostics);

    Ok(Emitted {
        content: out,
        diagnostics,
    })
}

/// 호스트 집합(정렬·중복 제거)을 키로 HTTP 라우터를 묶습니다.
///
/// 최상위 논리곱에 Host 매처가 없는 라우터는 기본 server 블록으로 가고,
/// 남은 술어는 if 가드가 됩니다.
fn group_http_routers(config: &Config) -> (BTreeMap<Vec<String>, Vec<&Router>>, Vec<&Router>) {
    let mut groups: BTreeMap<Vec<String>, Vec<&Router>> = BTreeMap::new();
    let mut default_routers = Vec::new();

    for router in config.routers.values() {
        if router.protocol != Protocol::Http {
            continue;
        }
        let mut hosts = host_names(router);
        if hosts.is_empty() {
            default_routers.push(router);
            continue;
        }
        hosts.sort();
        hosts.dedup();
        groups.entry(hosts).or_default().push(router);
    }

    (groups, default_routers)
}

/// server_name 표기로 쓸 호스트 이름들. HostRegexp는 `~` 접두사를 답니다.
fn host_names(router: &Router) -> Vec<String> {
    let Some(rule) = &router.rule else {
        return Vec::new();
    };
    let mut hosts = Vec::new();
    for matcher in rule.top_conjunction() {
        match matcher.name {
            MatcherName::Host => {
                hosts.extend(matcher.args.iter().map(|arg| arg.to_v3_text()));
            }
            MatcherName::HostRegexp => {
                hosts.extend(matcher.args.iter().map(|arg| format!("~{}", arg.to_v3_text())));
            }
            _ => {}
        }
    }
    hosts
}

fn emit_rate_zones(config: &Config, out: &mut String) {
    for middleware in config.middlewares.values() {
        if middleware.kind != MiddlewareKind::RateLimit {
            continue;
        }
        let average = middleware
            .param("average")
            .and_then(ParamValue::as_int)
            .unwrap_or(1);
        let _ = writeln!(
            out,
            "limit_req_zone $binary_remote_addr zone={}:10m rate={}r/s;",
            middleware.id, average
        );
    }
}

fn emit_upstream(service: &Service, out: &mut String, diagnostics: &mut Vec<Diagnostic>) {
    let _ = writeln!(out, "\nupstream {} {{", service.id);

    match service.pool.policy {
        LbPolicy::RoundRobin | LbPolicy::WeightedRoundRobin => {}
        LbPolicy::LeastConn => out.push_str("    least_conn;\n"),
        LbPolicy::Random => out.push_str("    random;\n"),
        other => {
            diagnostics.push(Diagnostic::warning(
                DiagnosticCode::UnsupportedFeature,
                format!(
                    "서비스 '{}'의 {} 정책은 nginx에서 round_robin으로 강등됨",
                    service.id, other
                ),
            ));
            let _ = writeln!(out, "    # policy {} downgraded to round_robin", other);
        }
    }

    for server in &service.pool.servers {
        let addr = server.target.host_part();
        match server.weight {
            Some(weight) => {
                let _ = writeln!(out, "    server {} weight={};", addr, weight);
            }
            None => {
                let _ = writeln!(out, "    server {};", addr);
            }
        }
    }

    if let Some(health) = &service.health {
        // OSS nginx에는 능동 헬스체크가 없음
        let _ = writeln!(
            out,
            "    # health check: path={} interval={}s (not supported by nginx OSS)",
            health.path, health.interval_secs
        );
        diagnostics.push(Diagnostic::warning(
            DiagnosticCode::UnsupportedFeature,
            format!("서비스 '{}'의 헬스체크는 nginx OSS에 대응 기능 없음", service.id),
        ));
    }

    out.push_str("}\n");
}

fn emit_host_group(
    config: &Config,
    hosts: &[String],
    routers: &[&Router],
    out: &mut String,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let plain: Vec<&&Router> = routers.iter().filter(|r| r.tls.is_none()).collect();
    let tls: Vec<&&Router> = routers.iter().filter(|r| r.tls.is_some()).collect();

    if !plain.is_empty() {
        out.push_str("\nserver {\n");
        let port = listen_port(config, plain[0], 80);
        let _ = writeln!(out, "    listen {};", port);
        let _ = writeln!(out, "    server_name {};", hosts.join(" "));
        for router in &plain {
            emit_locations(config, router, out, diagnostics);
        }
        out.push_str("}\n");
    }

    if !tls.is_empty() {
        // TLS 전용 호스트에는 80 → 443 리다이렉트 서버를 함께 만듦
        if plain.is_empty() {
            out.push_str("\nserver {\n");
            out.push_str("    listen 80;\n");
            let _ = writeln!(out, "    server_name {};", hosts.join(" "));
            out.push_str("    return 301 https://$host$request_uri;\n");
            out.push_str("}\n");
        }

        out.push_str("\nserver {\n");
        let port = listen_port(config, tls[0], 443);
        let _ = writeln!(out, "    listen {} ssl;", port);
        let _ = writeln!(out, "    server_name {};", hosts.join(" "));

        emit_tls_directives(tls[0], out, diagnostics);

        for router in &tls {
            emit_locations(config, router, out, diagnostics);
        }
        out.push_str("}\n");
    }
}

fn emit_tls_directives(router: &Router, out: &mut String, diagnostics: &mut Vec<Diagnostic>) {
    let Some(tls) = &router.tls else {
        return;
    };

    if let Some(cert) = tls.cert_files.first() {
        let _ = writeln!(out, "    ssl_certificate {};", cert.cert);
        let _ = writeln!(out, "    ssl_certificate_key {};", cert.key);
        if let Some(dhparam) = &cert.dhparam {
            let _ = writeln!(out, "    ssl_dhparam {};", dhparam);
        }
    } else if let Some(resolver) = &tls.cert_resolver {
        // ACME 발급은 프록시 바깥의 일
        let _ = writeln!(
            out,
            "    # cert resolver '{}' has no nginx equivalent; provision certificates externally",
            resolver
        );
        diagnostics.push(Diagnostic::warning(
            DiagnosticCode::UnsupportedFeature,
            format!(
                "라우터 '{}'의 cert_resolver '{}'는 nginx에서 수동 인증서 설치가 필요함",
                router.id, resolver
            ),
        ));
    }
}

/// listen 포트: 엔트리포인트 주소가 있으면 그 포트, 없으면 기본값.
fn listen_port(config: &Config, router: &Router, default: u16) -> u16 {
    router
        .entrypoints
        .iter()
        .find_map(|name| {
            config.entrypoints.get(name).and_then(|entrypoint| {
                entrypoint
                    .address
                    .rsplit(':')
                    .next()
                    .and_then(|port| port.parse().ok())
            })
        })
        .unwrap_or(default)
}

/// 라우터의 규칙에서 경로 매처를 뽑아 location 블록으로 방출합니다.
/// 경로 매처가 없으면 `location /` 하나가 됩니다.
fn emit_locations(
    config: &Config,
    router: &Router,
    out: &mut String,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let paths = path_locations(router);

    for (kind, path) in &paths {
        let prefix = match kind {
            MatcherName::Path => format!("location = {}", path),
            MatcherName::PathRegexp => format!("location ~ {}", path),
            _ => format!("location {}", path),
        };
        let _ = writeln!(out, "    {} {{", prefix);
        emit_location_body(config, router, out, diagnostics);
        out.push_str("    }\n");
    }
}

/// 규칙 트리 전체에서 (종류, 경로) 목록을 수집합니다.
/// `Host(a) && (PathPrefix(/x) || PathPrefix(/y))`는 location 두 개가 됩니다.
fn path_locations(router: &Router) -> Vec<(MatcherName, String)> {
    let mut paths = Vec::new();
    if let Some(rule) = &router.rule {
        rule.walk_matchers(&mut |matcher: &Matcher| {
            if matches!(
                matcher.name,
                MatcherName::Path | MatcherName::PathPrefix | MatcherName::PathRegexp
            ) {
                for arg in &matcher.args {
                    paths.push((matcher.name, arg.to_v3_text()));
                }
            }
        });
    }
    if paths.is_empty() {
        paths.push((MatcherName::PathPrefix, "/".to_string()));
    }
    paths
}

fn emit_location_body(
    config: &Config,
    router: &Router,
    out: &mut String,
    diagnostics: &mut Vec<Diagnostic>,
) {
    emit_rule_guards(router, out, diagnostics);

    for middleware_id in &router.middlewares {
        match config.middlewares.get(middleware_id) {
            Some(middleware) => emit_middleware(middleware, out, diagnostics),
            None => {
                // 참조 무결성은 검증기가 이미 지적했음
            }
        }
    }

    let _ = writeln!(out, "        proxy_pass http://{};", router.service);
    out.push_str("        proxy_set_header Host $host;\n");
    out.push_str("        proxy_set_header X-Real-IP $remote_addr;\n");
    out.push_str("        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;\n");
    out.push_str("        proxy_set_header X-Forwarded-Proto $scheme;\n");
}

/// Host/경로 외의 술어(Method, Header, Query, ClientIP)를 가드로 내립니다.
fn emit_rule_guards(router: &Router, out: &mut String, diagnostics: &mut Vec<Diagnostic>) {
    let Some(rule) = &router.rule else {
        return;
    };

    let mut guards: Vec<&Matcher> = Vec::new();
    rule.walk_matchers(&mut |matcher: &Matcher| {
        if matches!(
            matcher.name,
            MatcherName::Method
                | MatcherName::Header
                | MatcherName::HeaderRegexp
                | MatcherName::Query
                | MatcherName::QueryRegexp
                | MatcherName::ClientIp
        ) {
            guards.push(matcher);
        }
    });

    for matcher in guards {
        match matcher.name {
            MatcherName::Method => {
                let methods: Vec<String> =
                    matcher.args.iter().map(|arg| arg.to_v3_text()).collect();
                // location 안의 if는 악명 높게 까다로워 제한적으로만 씀
                out.push_str("        # nginx 'if' inside location is restricted; guard kept minimal\n");
                let _ = writeln!(
                    out,
                    "        if ($request_method !~ ^({})$) {{ return 405; }}",
                    methods.join("|")
                );
            }
            MatcherName::Header | MatcherName::HeaderRegexp => {
                let name = matcher
                    .args
                    .first()
                    .map(|arg| arg.to_v3_text())
                    .unwrap_or_default();
                let value = matcher
                    .args
                    .get(1)
                    .map(|arg| arg.to_v3_text())
                    .unwrap_or_default();
                let variable = name.to_ascii_lowercase().replace('-', "_");
                let operator = if matcher.name == MatcherName::HeaderRegexp {
                    "!~"
                } else {
                    "!="
                };
                out.push_str("        # nginx 'if' inside location is restricted; guard kept minimal\n");
                let _ = writeln!(
                    out,
                    "        if ($http_{} {} \"{}\") {{ return 403; }}",
                    variable, operator, value
                );
            }
            MatcherName::Query | MatcherName::QueryRegexp => {
                let name = matcher
                    .args
                    .first()
                    .map(|arg| arg.to_v3_text())
                    .unwrap_or_default();
                out.push_str("        # nginx 'if' inside location is restricted; guard kept minimal\n");
                match matcher.args.get(1) {
                    Some(value) => {
                        let operator = if matcher.name == MatcherName::QueryRegexp {
                            "!~"
                        } else {
                            "!="
                        };
                        let _ = writeln!(
                            out,
                            "        if ($arg_{} {} \"{}\") {{ return 403; }}",
                            name,
                            operator,
                            value.to_v3_text()
                        );
                    }
                    None => {
                        let _ = writeln!(
                            out,
                            "        if ($arg_{} = \"\") {{ return 403; }}",
                            name
                        );
                    }
                }
            }
            MatcherName::ClientIp => {
                for arg in &matcher.args {
                    let _ = writeln!(out, "        allow {};", arg.to_v3_text());
                }
                out.push_str("        deny all;\n");
            }
            _ => {
                diagnostics.push(Diagnostic::warning(
                    DiagnosticCode::UnsupportedFeature,
                    format!(
                        "라우터 '{}'의 {} 매처는 nginx 가드로 내릴 수 없음",
                        router.id, matcher.name
                    ),
                ));
            }
        }
    }
}

fn emit_middleware(middleware: &Middleware, out: &mut String, diagnostics: &mut Vec<Diagnostic>) {
    match middleware.kind {
        MiddlewareKind::BasicAuth => {
            let realm = middleware
                .param("realm")
                .and_then(ParamValue::as_str)
                .filter(|text| !text.is_empty())
                .unwrap_or("Restricted");
            let _ = writeln!(out, "        auth_basic \"{}\";", realm);
            match middleware
                .param("usersFile")
                .and_then(ParamValue::as_str)
                .filter(|text| !text.is_empty())
            {
                Some(path) => {
                    let _ = writeln!(out, "        auth_basic_user_file {};", path);
                }
                None => {
                    let _ = writeln!(
                        out,
                        "        auth_basic_user_file /etc/nginx/htpasswd/{};",
                        middleware.id
                    );
                    if middleware.param("users").is_some() {
                        diagnostics.push(Diagnostic::warning(
                            DiagnosticCode::UnsupportedFeature,
                            format!(
                                "미들웨어 '{}'의 인라인 users는 htpasswd 파일로 옮겨야 함",
                                middleware.id
                            ),
                        ));
                    }
                }
            }
        }
        MiddlewareKind::RateLimit => {
            let burst = middleware.param("burst").and_then(ParamValue::as_int);
            match burst {
                Some(burst) => {
                    let _ = writeln!(
                        out,
                        "        limit_req zone={} burst={};",
                        middleware.id, burst
                    );
                }
                None => {
                    let _ = writeln!(out, "        limit_req zone={};", middleware.id);
                }
            }
        }
        MiddlewareKind::IpAllowList => {
            if let Some(ranges) = middleware.param("sourceRange") {
                for range in ranges.as_string_list() {
                    let _ = writeln!(out, "        allow {};", range);
                }
                out.push_str("        deny all;\n");
            }
        }
        MiddlewareKind::Compress => {
            out.push_str("        gzip on;\n");
        }
        MiddlewareKind::Headers => {
            if let Some(request) = middleware
                .param("customRequestHeaders")
                .and_then(ParamValue::as_map)
            {
                for (name, value) in request {
                    let _ = writeln!(
                        out,
                        "        proxy_set_header {} \"{}\";",
                        name,
                        value.as_str().unwrap_or_default()
                    );
                }
            }
            if let Some(response) = middleware
                .param("customResponseHeaders")
                .and_then(ParamValue::as_map)
            {
                for (name, value) in response {
                    let _ = writeln!(
                        out,
                        "        add_header {} \"{}\";",
                        name,
                        value.as_str().unwrap_or_default()
                    );
                }
            }
        }
        MiddlewareKind::RedirectScheme => {
            let permanent = middleware
                .param("permanent")
                .map(|value| value.as_str() == Some("true") || *value == ParamValue::Bool(true))
                .unwrap_or(false);
            let code = if permanent { 301 } else { 302 };
            let scheme = middleware
                .param("scheme")
                .and_then(ParamValue::as_str)
                .unwrap_or("https");
            let _ = writeln!(
                out,
                "        return {} {}://$host$request_uri;",
                code, scheme
            );
        }
        MiddlewareKind::RedirectRegex => {
            let regex = middleware
                .param("regex")
                .and_then(ParamValue::as_str)
                .unwrap_or_default();
            let replacement = middleware
                .param("replacement")
                .and_then(ParamValue::as_str)
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "        rewrite {} {} permanent;",
                regex, replacement
            );
        }
        MiddlewareKind::StripPrefix => {
            if let Some(prefixes) = middleware.param("prefixes") {
                for prefix in prefixes.as_string_list() {
                    let _ = writeln!(
                        out,
                        "        rewrite ^{}/(.*) /$1 break;",
                        prefix.trim_end_matches('/')
                    );
                }
            }
        }
        other => {
            let _ = writeln!(
                out,
                "        # middleware '{}' ({}) has no nginx equivalent",
                middleware.id,
                other.as_kebab()
            );
            diagnostics.push(Diagnostic::warning(
                DiagnosticCode::UnsupportedFeature,
                format!(
                    "미들웨어 '{}'({})는 nginx에 대응 기능 없음",
                    middleware.id,
                    other.as_kebab()
                ),
            ));
        }
    }
}

fn emit_default_server(
    config: &Config,
    routers: &[&Router],
    out: &mut String,
    diagnostics: &mut Vec<Diagnostic>,
) {
    out.push_str("\nserver {\n");
    out.push_str("    listen 80 default_server;\n");
    out.push_str("    server_name _;\n");
    for router in routers {
        emit_locations(config, router, out, diagnostics);
    }
    out.push_str("}\n");
}

/// TCP/UDP 라우터는 stream 블록으로 갑니다. stream은 http와 같은 수준의
/// 최상위 컨텍스트라는 주석을 함께 답니다.
fn emit_stream_section(config: &Config, out: &mut String, diagnostics: &mut Vec<Diagnostic>) {
    let stream_routers: Vec<&Router> = config
        .routers
        .values()
        .filter(|router| router.protocol != Protocol::Http)
        .collect();

    if stream_routers.is_empty() {
        return;
    }

    out.push_str("\n# stream{} must live at the top level of nginx.conf, outside http{}\n");
    out.push_str("stream {\n");

    for service in config.services.values() {
        if service.protocol == Protocol::Http {
            continue;
        }
        let _ = writeln!(out, "    upstream {} {{", service.id);
        for server in &service.pool.servers {
            match server.weight {
                Some(weight) => {
                    let _ = writeln!(
                        out,
                        "        server {} weight={};",
                        server.target.host_part(),
                        weight
                    );
                }
                None => {
                    let _ = writeln!(out, "        server {};", server.target.host_part());
                }
            }
        }
        out.push_str("    }\n");
    }

    for router in stream_routers {
        // 엔트리포인트가 없으면 백엔드 첫 서버의 포트를 수신 포트로 씀
        let fallback = config
            .services
            .get(&router.service)
            .and_then(|service| service.pool.servers.first())
            .and_then(|server| server.target.port());
        let port = router
            .entrypoints
            .iter()
            .find_map(|name| {
                config.entrypoints.get(name).and_then(|entrypoint| {
                    entrypoint
                        .address
                        .rsplit(':')
                        .next()
                        .and_then(|port| port.parse::<u16>().ok())
                })
            })
            .or(fallback);
        out.push_str("    server {\n");
        match port {
            Some(port) if router.protocol == Protocol::Udp => {
                let _ = writeln!(out, "        listen {} udp;", port);
            }
            Some(port) => {
                let _ = writeln!(out, "        listen {};", port);
            }
            None => {
                out.push_str("        # listen port unknown; set explicitly\n");
                diagnostics.push(Diagnostic::warning(
                    DiagnosticCode::MissingPort,
                    format!("라우터 '{}'의 수신 포트를 결정할 수 없음", router.id),
                ));
            }
        }
        if let Some(rule) = &router.rule {
            // HostSNI(`*`) 외의 SNI 라우팅은 ssl_preread가 필요함
            let hosts: Vec<String> = rule
                .hosts()
                .into_iter()
                .filter(|host| host != "*")
                .collect();
            if !hosts.is_empty() {
                diagnostics.push(Diagnostic::warning(
                    DiagnosticCode::UnsupportedFeature,
                    format!(
                        "TCP 라우터 '{}'의 SNI 매칭({})은 ssl_preread 수동 구성이 필요함",
                        router.id,
                        hosts.join(", ")
                    ),
                ));
                let _ = writeln!(
                    out,
                    "        # SNI matching ({}) requires the ssl_preread module",
                    hosts.join(", ")
                );
            }
        }
        let _ = writeln!(out, "        proxy_pass {};", router.service);
        out.push_str("    }\n");
    }

    out.push_str("}\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Server, TlsSpec};
    use crate::rule::{parse_rule, Dialect};

    fn config_s2() -> Config {
        let mut config = Config::new();
        let mut service = Service::new("s", Protocol::Http);
        service.pool.servers.push(Server::url("http://web:8080"));
        config.insert_service(service);

        let mut router = Router::new("r", Protocol::Http, "s");
        router.rule = Some(parse_rule("Host(`x`)", Dialect::V3).unwrap());
        config.insert_router(router);
        config
    }

    #[test]
    fn test_emit_scenario_s3() {
        let emitted = emit_nginx(&config_s2()).unwrap();
        let text = &emitted.content;

        assert!(text.contains("upstream s {"));
        assert!(text.contains("    server web:8080;"));
        assert!(text.contains("server_name x;"));
        assert!(text.contains("location / {"));
        assert!(text.contains("proxy_pass http://s;"));
    }

    #[test]
    fn test_emit_scenario_s4() {
        let mut config = Config::new();
        let mut service = Service::new("s", Protocol::Http);
        service.pool.servers.push(Server::url("http://b:1"));
        config.insert_service(service);

        let mut router = Router::new("r", Protocol::Http, "s");
        router.rule =
            Some(parse_rule("Host(`a`) && ClientIP(`10.0.0.0/8`)", Dialect::V3).unwrap());
        router.middlewares = vec!["limiter".to_string()];
        config.insert_router(router);

        config.insert_middleware(
            Middleware::new("limiter", MiddlewareKind::RateLimit)
                .with_param("average", ParamValue::Int(50))
                .with_param("burst", ParamValue::Int(100)),
        );

        let emitted = emit_nginx(&config).unwrap();
        let text = &emitted.content;

        assert!(text.contains("limit_req_zone $binary_remote_addr zone=limiter:10m rate=50r/s;"));
        assert!(text.contains("limit_req zone=limiter burst=100;"));
        assert!(text.contains("        allow 10.0.0.0/8;"));
        assert!(text.contains("        deny all;"));
    }

    #[test]
    fn test_tls_group_emits_redirect_and_ssl_server() {
        let mut config = Config::new();
        let mut service = Service::new("u", Protocol::Http);
        service.pool.servers.push(Server::url("http://a:1"));
        config.insert_service(service);

        let mut router = Router::new("z", Protocol::Http, "u");
        router.rule = Some(parse_rule("Host(`z`) && PathPrefix(`/api`)", Dialect::V3).unwrap());
        let mut tls = TlsSpec::default();
        tls.cert_files.push(crate::model::CertFile {
            cert: "z.crt".to_string(),
            key: "z.key".to_string(),
            ..Default::default()
        });
        router.tls = Some(tls);
        config.insert_router(router);

        let emitted = emit_nginx(&config).unwrap();
        let text = &emitted.content;

        assert!(text.contains("listen 443 ssl;"));
        assert!(text.contains("ssl_certificate z.crt;"));
        assert!(text.contains("ssl_certificate_key z.key;"));
        assert!(text.contains("return 301 https://$host$request_uri;"));
        assert!(text.contains("location /api {"));
    }

    #[test]
    fn test_or_of_paths_becomes_two_locations() {
        let mut config = config_s2();
        config.routers.get_mut("r").unwrap().rule = Some(
            parse_rule(
                "Host(`x`) && (PathPrefix(`/x`) || PathPrefix(`/y`))",
                Dialect::V3,
            )
            .unwrap(),
        );

        let emitted = emit_nginx(&config).unwrap();
        assert!(emitted.content.contains("location /x {"));
        assert!(emitted.content.contains("location /y {"));
    }

    #[test]
    fn test_unsupported_middleware_comment_and_warning() {
        let mut config = config_s2();
        config
            .routers
            .get_mut("r")
            .unwrap()
            .middlewares
            .push("breaker".to_string());
        config.insert_middleware(
            Middleware::new("breaker", MiddlewareKind::CircuitBreaker)
                .with_param("expression", ParamValue::Str("NetworkErrorRatio() > 0.3".into())),
        );

        let emitted = emit_nginx(&config).unwrap();
        assert!(emitted
            .content
            .contains("# middleware 'breaker' (circuit-breaker) has no nginx equivalent"));
        assert!(emitted
            .diagnostics
            .iter()
            .any(|d| d.code == DiagnosticCode::UnsupportedFeature));
    }

    #[test]
    fn test_rule_without_host_goes_to_default_server() {
        let mut config = config_s2();
        config.routers.get_mut("r").unwrap().rule =
            Some(parse_rule("PathPrefix(`/api`) && Method(`GET`)", Dialect::V3).unwrap());

        let emitted = emit_nginx(&config).unwrap();
        let text = &emitted.content;
        assert!(text.contains("listen 80 default_server;"));
        assert!(text.contains("if ($request_method !~ ^(GET)$) { return 405; }"));
    }

    #[test]
    fn test_udp_router_emits_stream_block() {
        let mut config = Config::new();
        let mut service = Service::new("dns", Protocol::Udp);
        service.pool.servers.push(Server::address("10.0.0.1:53"));
        config.insert_service(service);

        let mut router = Router::new("dns-in", Protocol::Udp, "dns");
        router.entrypoints = vec!["dns-udp".to_string()];
        config.entrypoints.insert(
            "dns-udp".to_string(),
            crate::model::Entrypoint {
                address: ":53".to_string(),
                protocol: Protocol::Udp,
            },
        );
        config.insert_router(router);

        let emitted = emit_nginx(&config).unwrap();
        let text = &emitted.content;
        assert!(text.contains("stream {"));
        assert!(text.contains("listen 53 udp;"));
        assert!(text.contains("proxy_pass dns;"));
    }

    #[test]
    fn test_deterministic_output() {
        let config = config_s2();
        let first = emit_nginx(&config).unwrap().content;
        let second = emit_nginx(&config).unwrap().content;
        assert_eq!(first, second);
    }
}
