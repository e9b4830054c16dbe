use std::collections::BTreeMap;

use tracing::debug;

use crate::ingest::error::{IngestError, Result};
use crate::model::{
    CertFile, Config, Diagnostic, DiagnosticCode, Entrypoint, LbPolicy, Middleware,
    MiddlewareKind, ParamValue, Protocol, Router, Server, Service, SourceRef, TlsSpec,
};
use crate::rule::{Matcher, MatcherArg, MatcherName, RuleExpr};

/// nginx 지시어 하나입니다. 블록 지시어는 자식 목록을 가집니다.
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub name: String,
    pub args: Vec<String>,
    pub block: Option<Vec<Directive>>,
    pub line: usize,
}

impl Directive {
    fn is_block(&self, name: &str) -> bool {
        self.name == name && self.block.is_some()
    }
}

/// nginx 설정 텍스트를 지시어 트리로 파싱합니다.
///
/// 주석(`# ...`), 따옴표 인자, 중첩 블록을 다루는 최소 파서입니다.
/// 닫히지 않은 블록과 구분자 없는 지시어는 줄 번호와 함께 거부합니다.
pub fn parse_directives(input: &str) -> Result<Vec<Directive>> {
    let mut lexer = NginxLexer {
        input: input.as_bytes(),
        pos: 0,
        line: 1,
    };
    let directives = parse_block_body(&mut lexer, 0)?;
    Ok(directives)
}

struct NginxLexer<'a> {
    input: &'a [u8],
    pos: usize,
    line: usize,
}

#[derive(Debug, PartialEq)]
enum NginxToken {
    Word(String),
    Semicolon,
    OpenBrace,
    CloseBrace,
    Eof,
}

impl NginxLexer<'_> {
    fn next_token(&mut self) -> Result<(NginxToken, usize)> {
        loop {
            // 공백과 주석 건너뛰기
            while self.pos < self.input.len() {
                match self.input[self.pos] {
                    b'\n' => {
                        self.line += 1;
                        self.pos += 1;
                    }
                    b' ' | b'\t' | b'\r' => self.pos += 1,
                    b'#' => {
                        while self.pos < self.input.len() && self.input[self.pos] != b'\n' {
                            self.pos += 1;
                        }
                    }
                    _ => break,
                }
            }

            if self.pos >= self.input.len() {
                return Ok((NginxToken::Eof, self.line));
            }

            let line = self.line;
            match self.input[self.pos] {
                b';' => {
                    self.pos += 1;
                    return Ok((NginxToken::Semicolon, line));
                }
                b'{' => {
                    self.pos += 1;
                    return Ok((NginxToken::OpenBrace, line));
                }
                b'}' => {
                    self.pos += 1;
                    return Ok((NginxToken::CloseBrace, line));
                }
                b'"' | b'\'' => {
                    let quote = self.input[self.pos];
                    self.pos += 1;
                    let start = self.pos;
                    while self.pos < self.input.len() && self.input[self.pos] != quote {
                        if self.input[self.pos] == b'\n' {
                            self.line += 1;
                        }
                        self.pos += 1;
                    }
                    if self.pos >= self.input.len() {
                        return Err(IngestError::NginxSyntax {
                            message: "종결되지 않은 따옴표 문자열".to_string(),
                            line,
                        });
                    }
                    let word =
                        String::from_utf8_lossy(&self.input[start..self.pos]).to_string();
                    self.pos += 1;
                    return Ok((NginxToken::Word(word), line));
                }
                _ => {
                    let start = self.pos;
                    while self.pos < self.input.len() {
                        match self.input[self.pos] {
                            b' ' | b'\t' | b'\r' | b'\n' | b';' | b'{' | b'}' | b'#' => break,
                            _ => self.pos += 1,
                        }
                    }
                    let word =
                        String::from_utf8_lossy(&self.input[start..self.pos]).to_string();
                    return Ok((NginxToken::Word(word), line));
                }
            }
        }
    }
}

fn parse_block_body(lexer: &mut NginxLexer<'_>, depth: usize) -> Result<Vec<Directive>> {
    let mut directives = Vec::new();
    let mut words: Vec<String> = Vec::new();
    let mut first_line = 0;

    loop {
        let (token, line) = lexer.next_token()?;
        match token {
            NginxToken::Word(word) => {
                if words.is_empty() {
                    first_line = line;
                }
                words.push(word);
            }
            NginxToken::Semicolon => {
                if words.is_empty() {
                    continue;
                }
                let name = words.remove(0);
                directives.push(Directive {
                    name,
                    args: std::mem::take(&mut words),
                    block: None,
                    line: first_line,
                });
            }
            NginxToken::OpenBrace => {
                if words.is_empty() {
                    return Err(IngestError::NginxSyntax {
                        message: "이름 없는 블록".to_string(),
                        line,
                    });
                }
                let name = words.remove(0);
                let children = parse_block_body(lexer, depth + 1)?;
                directives.push(Directive {
                    name,
                    args: std::mem::take(&mut words),
                    block: Some(children),
                    line: first_line,
                });
            }
            NginxToken::CloseBrace => {
                if depth == 0 {
                    return Err(IngestError::NginxSyntax {
                        message: "대응하는 '{' 없는 '}'".to_string(),
                        line,
                    });
                }
                if !words.is_empty() {
                    return Err(IngestError::NginxSyntax {
                        message: format!("'{}' 지시어가 ';' 없이 끝남", words[0]),
                        line,
                    });
                }
                return Ok(directives);
            }
            NginxToken::Eof => {
                if depth != 0 {
                    return Err(IngestError::NginxSyntax {
                        message: "블록이 닫히지 않은 채 입력이 끝남".to_string(),
                        line,
                    });
                }
                if !words.is_empty() {
                    return Err(IngestError::NginxSyntax {
                        message: format!("'{}' 지시어가 ';' 없이 끝남", words[0]),
                        line,
                    });
                }
                return Ok(directives);
            }
        }
    }
}

/// 수집 시 해석하는 지시어 목록. 여기 없는 지시어는 raw_extras로 갑니다.
const KNOWN_DIRECTIVES: &[&str] = &[
    "listen",
    "server_name",
    "ssl_certificate",
    "ssl_certificate_key",
    "ssl_dhparam",
    "proxy_pass",
    "proxy_set_header",
    "add_header",
    "return",
    "rewrite",
    "auth_basic",
    "auth_basic_user_file",
    "limit_req",
    "limit_req_zone",
    "limit_conn",
    "allow",
    "deny",
    "gzip",
    "if",
    "location",
    "upstream",
    "server",
    "http",
    "stream",
    "least_conn",
    "random",
    "ip_hash",
];

/// nginx 설정을 통합 모델로 수집합니다.
///
/// 리다이렉트가 아닌 location 하나가 라우터 하나가 되고
/// (규칙 = `Host(server_name) && Path|PathPrefix(location)`),
/// 참조된 upstream 또는 `proxy_pass` 대상마다 서비스가 만들어집니다.
pub fn ingest_nginx(input: &[u8]) -> Result<Config> {
    let text = std::str::from_utf8(input).map_err(|e| IngestError::InvalidStructure {
        message: format!("nginx 입력이 UTF-8이 아님: {}", e),
    })?;

    let directives = parse_directives(text)?;
    let mut config = Config::new();
    let mut state = NginxIngest {
        config: &mut config,
        rate_zones: BTreeMap::new(),
    };

    // http{} 안, stream{} 안, 최상위 어디에 있든 같은 방식으로 처리
    for directive in &directives {
        if directive.is_block("http") {
            state.ingest_http_body(directive.block.as_deref().unwrap_or_default());
        } else if directive.is_block("stream") {
            state.ingest_stream_body(directive.block.as_deref().unwrap_or_default());
        }
    }
    let top_level: Vec<&Directive> = directives
        .iter()
        .filter(|d| d.is_block("server") || d.is_block("upstream") || d.name == "limit_req_zone")
        .collect();
    if !top_level.is_empty() {
        let owned: Vec<Directive> = top_level.into_iter().cloned().collect();
        state.ingest_http_body(&owned);
    }

    debug!(
        routers = config.routers.len(),
        services = config.services.len(),
        "nginx 설정 수집 완료"
    );

    Ok(config)
}

struct NginxIngest<'a> {
    config: &'a mut Config,
    /// limit_req_zone 이름 → 초당 요청 수
    rate_zones: BTreeMap<String, i64>,
}

impl NginxIngest<'_> {
    fn ingest_http_body(&mut self, body: &[Directive]) {
        // 존 정의를 먼저 수집해야 server 블록의 limit_req가 참조 가능
        for directive in body {
            if directive.name == "limit_req_zone" {
                self.collect_rate_zone(directive);
            }
        }
        for directive in body {
            if directive.is_block("upstream") {
                self.ingest_upstream(directive, Protocol::Http);
            }
        }
        for directive in body {
            if directive.is_block("server") {
                self.ingest_server(directive);
            }
        }
    }

    fn ingest_stream_body(&mut self, body: &[Directive]) {
        for directive in body {
            if directive.is_block("upstream") {
                self.ingest_upstream(directive, Protocol::Tcp);
            }
        }
        for directive in body {
            if directive.is_block("server") {
                self.ingest_stream_server(directive);
            }
        }
    }

    /// `limit_req_zone $binary_remote_addr zone=api:10m rate=50r/s;`
    fn collect_rate_zone(&mut self, directive: &Directive) {
        let mut zone_name = None;
        let mut rate = None;
        for arg in &directive.args {
            if let Some(spec) = arg.strip_prefix("zone=") {
                zone_name = spec.split(':').next().map(str::to_string);
            } else if let Some(spec) = arg.strip_prefix("rate=") {
                rate = spec.trim_end_matches("r/s").parse::<i64>().ok();
            }
        }
        if let (Some(name), Some(rate)) = (zone_name, rate) {
            self.rate_zones.insert(name, rate);
        }
    }

    fn ingest_upstream(&mut self, directive: &Directive, protocol: Protocol) {
        let Some(name) = directive.args.first() else {
            self.config.push_diagnostic(
                Diagnostic::error(DiagnosticCode::UnknownField, "이름 없는 upstream 블록")
                    .with_source(line_ref(directive.line)),
            );
            return;
        };

        let mut service = Service::new(name.clone(), protocol);
        let mut any_weight = false;

        for child in directive.block.as_deref().unwrap_or_default() {
            match child.name.as_str() {
                "server" => {
                    let Some(addr) = child.args.first() else {
                        continue;
                    };
                    let weight = child.args.iter().find_map(|arg| {
                        arg.strip_prefix("weight=")
                            .and_then(|value| value.parse::<u32>().ok())
                    });
                    if weight.is_some() {
                        any_weight = true;
                    }
                    let target = match protocol {
                        Protocol::Http => Server::url(format!("http://{}", addr)).target,
                        _ => Server::address(addr.clone()).target,
                    };
                    service.pool.servers.push(Server { target, weight });
                }
                "least_conn" => service.pool.policy = LbPolicy::LeastConn,
                "random" => service.pool.policy = LbPolicy::Random,
                "ip_hash" => {
                    self.config.push_diagnostic(
                        Diagnostic::warning(
                            DiagnosticCode::UnsupportedFeature,
                            format!("upstream '{}'의 ip_hash는 round_robin으로 강등됨", name),
                        )
                        .with_source(line_ref(child.line)),
                    );
                    self.config
                        .raw_extras
                        .insert(format!("upstream.{}.ip_hash", name), String::new());
                }
                other => {
                    self.config.raw_extras.insert(
                        format!("upstream.{}.{}", name, other),
                        child.args.join(" "),
                    );
                }
            }
        }

        if any_weight && service.pool.policy == LbPolicy::RoundRobin {
            service.pool.policy = LbPolicy::WeightedRoundRobin;
        } else if any_weight && service.pool.policy == LbPolicy::LeastConn {
            service.pool.policy = LbPolicy::WeightedLeastConn;
        } else if any_weight && service.pool.policy == LbPolicy::Random {
            service.pool.policy = LbPolicy::WeightedRandom;
        }

        self.config.insert_service(service);
    }

    fn ingest_server(&mut self, directive: &Directive) {
        let body = directive.block.as_deref().unwrap_or_default();

        let mut server_names: Vec<String> = Vec::new();
        let mut tls = false;
        let mut port: Option<u16> = None;
        let mut cert_file = CertFile::default();
        let mut server_allows: Vec<String> = Vec::new();
        let mut redirect_only = true;
        let mut locations: Vec<&Directive> = Vec::new();

        for child in body {
            match child.name.as_str() {
                "listen" => {
                    for arg in &child.args {
                        if arg == "ssl" {
                            tls = true;
                        } else {
                            port = port.or(primary_listen_port(arg));
                        }
                    }
                }
                "server_name" => {
                    server_names = child.args.clone();
                }
                "ssl_certificate" => {
                    cert_file.cert = child.args.first().cloned().unwrap_or_default();
                }
                "ssl_certificate_key" => {
                    cert_file.key = child.args.first().cloned().unwrap_or_default();
                }
                "ssl_dhparam" => {
                    cert_file.dhparam = child.args.first().cloned();
                }
                "allow" => {
                    if let Some(cidr) = child.args.first() {
                        server_allows.push(cidr.clone());
                    }
                }
                "deny" => {}
                "location" => {
                    locations.push(child);
                    if !is_redirect_location(child) {
                        redirect_only = false;
                    }
                }
                "return" => {}
                other => {
                    if !KNOWN_DIRECTIVES.contains(&other) {
                        self.record_extra("server", &server_names, child);
                    }
                }
            }
        }

        // 엔트리포인트 합성: 80 → web, 443 → websecure
        let entrypoint = match port {
            Some(443) => "websecure",
            Some(80) | None => "web",
            Some(other) => {
                let name = format!("port-{}", other);
                self.config.entrypoints.entry(name.clone()).or_insert(Entrypoint {
                    address: format!(":{}", other),
                    protocol: Protocol::Http,
                });
                return self.ingest_server_locations(
                    body,
                    &server_names,
                    &locations,
                    tls,
                    &cert_file,
                    &server_allows,
                    name,
                );
            }
        };
        self.config
            .entrypoints
            .entry(entrypoint.to_string())
            .or_insert(Entrypoint {
                address: format!(":{}", port.unwrap_or(80)),
                protocol: Protocol::Http,
            });

        if locations.is_empty() || (redirect_only && !locations.is_empty()) {
            if redirect_only && !locations.is_empty() {
                self.config.push_diagnostic(Diagnostic::info(
                    DiagnosticCode::UnsupportedFeature,
                    format!(
                        "리다이렉트 전용 server 블록({})은 라우터로 수집되지 않음",
                        server_names.join(", ")
                    ),
                ));
            }
            if locations.is_empty() {
                return;
            }
        }

        self.ingest_server_locations(
            body,
            &server_names,
            &locations,
            tls,
            &cert_file,
            &server_allows,
            entrypoint.to_string(),
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn ingest_server_locations(
        &mut self,
        _body: &[Directive],
        server_names: &[String],
        locations: &[&Directive],
        tls: bool,
        cert_file: &CertFile,
        server_allows: &[String],
        entrypoint: String,
    ) {
        let host_id = server_names
            .first()
            .map(|name| sanitize_id(name))
            .unwrap_or_else(|| "default".to_string());

        for location in locations {
            if is_redirect_location(location) {
                continue;
            }
            self.ingest_location(
                location,
                server_names,
                &host_id,
                tls,
                cert_file,
                server_allows,
                &entrypoint,
            );
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn ingest_location(
        &mut self,
        location: &Directive,
        server_names: &[String],
        host_id: &str,
        tls: bool,
        cert_file: &CertFile,
        server_allows: &[String],
        entrypoint: &str,
    ) {
        let (path_matcher, path_value) = location_matcher(&location.args);
        let body = location.block.as_deref().unwrap_or_default();

        let router_id = if path_value == "/" {
            host_id.to_string()
        } else {
            format!("{}-{}", host_id, sanitize_id(&path_value))
        };

        // proxy_pass 대상에서 서비스 참조 결정
        let mut service_ref = None;
        for child in body {
            if child.name == "proxy_pass" {
                if let Some(target) = child.args.first() {
                    service_ref = Some(self.resolve_proxy_pass(target));
                }
            }
        }
        let Some(service_ref) = service_ref else {
            self.config.push_diagnostic(
                Diagnostic::warning(
                    DiagnosticCode::UnknownField,
                    format!("location {}에 proxy_pass가 없어 수집 생략", path_value),
                )
                .with_source(line_ref(location.line)),
            );
            return;
        };

        // 규칙: Host(이름들) && Path|PathPrefix(경로)
        let mut rule: Option<RuleExpr> = None;
        if !server_names.is_empty() {
            let args = server_names.iter().map(MatcherArg::literal).collect();
            rule = Some(RuleExpr::matcher(Matcher::new(MatcherName::Host, args)));
        }
        if path_value != "/" || path_matcher != MatcherName::PathPrefix {
            let path_expr = RuleExpr::matcher(Matcher::single(path_matcher, path_value.clone()));
            rule = Some(match rule {
                Some(host_expr) => RuleExpr::and(host_expr, path_expr),
                None => path_expr,
            });
        }

        let mut router = Router::new(&router_id, Protocol::Http, service_ref);
        router.rule = rule;
        router.entrypoints = vec![entrypoint.to_string()];

        if tls {
            let mut spec = TlsSpec::default();
            if !cert_file.cert.is_empty() {
                spec.cert_files.push(cert_file.clone());
            }
            router.tls = Some(spec);
        }

        self.ingest_location_middlewares(&mut router, body, server_allows, &router_id);
        self.config.insert_router(router);
    }

    /// location 본문의 지시어를 미들웨어로 올립니다.
    fn ingest_location_middlewares(
        &mut self,
        router: &mut Router,
        body: &[Directive],
        server_allows: &[String],
        router_id: &str,
    ) {
        let mut allows: Vec<String> = server_allows.to_vec();
        let mut request_headers: BTreeMap<String, ParamValue> = BTreeMap::new();
        let mut response_headers: BTreeMap<String, ParamValue> = BTreeMap::new();

        for child in body {
            match child.name.as_str() {
                "proxy_pass" => {}
                "allow" => {
                    if let Some(cidr) = child.args.first() {
                        allows.push(cidr.clone());
                    }
                }
                "deny" => {}
                "auth_basic" => {
                    // "off"는 상위 설정 해제라 미들웨어가 아님
                    if child.args.first().map(String::as_str) != Some("off") {
                        let realm = child.args.first().cloned().unwrap_or_default();
                        let users_file = body
                            .iter()
                            .find(|d| d.name == "auth_basic_user_file")
                            .and_then(|d| d.args.first())
                            .cloned()
                            .unwrap_or_default();
                        let middleware =
                            Middleware::new(format!("{}-auth", router_id), MiddlewareKind::BasicAuth)
                                .with_param("realm", ParamValue::Str(realm))
                                .with_param("usersFile", ParamValue::Str(users_file));
                        self.attach_middleware(router, middleware);
                    }
                }
                "auth_basic_user_file" => {}
                "limit_req" => {
                    let zone = child.args.iter().find_map(|arg| arg.strip_prefix("zone="));
                    let burst = child
                        .args
                        .iter()
                        .find_map(|arg| arg.strip_prefix("burst="))
                        .and_then(|value| value.parse::<i64>().ok());
                    let average = zone
                        .and_then(|name| self.rate_zones.get(name))
                        .copied()
                        .unwrap_or(0);
                    let mut middleware = Middleware::new(
                        format!("{}-ratelimit", router_id),
                        MiddlewareKind::RateLimit,
                    )
                    .with_param("average", ParamValue::Int(average));
                    if let Some(burst) = burst {
                        middleware = middleware.with_param("burst", ParamValue::Int(burst));
                    }
                    self.attach_middleware(router, middleware);
                }
                "limit_conn" => {
                    // limit_conn zone n; 은 동시 요청 상한에 대응
                    if let Some(amount) = child
                        .args
                        .get(1)
                        .and_then(|value| value.parse::<i64>().ok())
                    {
                        let middleware = Middleware::new(
                            format!("{}-inflight", router_id),
                            MiddlewareKind::InFlightReq,
                        )
                        .with_param("amount", ParamValue::Int(amount));
                        self.attach_middleware(router, middleware);
                    } else {
                        self.config.raw_extras.insert(
                            format!("{}.limit_conn", router_id),
                            child.args.join(" "),
                        );
                    }
                }
                "proxy_set_header" => {
                    if let [name, value] = child.args.as_slice() {
                        // 프록시 기본 헤더는 장비 고정 설정이라 보존만
                        if value.contains('$') {
                            self.config.raw_extras.insert(
                                format!("{}.proxy_set_header.{}", router_id, name),
                                value.clone(),
                            );
                        } else {
                            request_headers
                                .insert(name.clone(), ParamValue::Str(value.clone()));
                        }
                    }
                }
                "add_header" => {
                    if child.args.len() >= 2 {
                        response_headers.insert(
                            child.args[0].clone(),
                            ParamValue::Str(child.args[1].clone()),
                        );
                    }
                }
                "gzip" => {
                    if child.args.first().map(String::as_str) == Some("on") {
                        let middleware = Middleware::new(
                            format!("{}-compress", router_id),
                            MiddlewareKind::Compress,
                        );
                        self.attach_middleware(router, middleware);
                    }
                }
                "rewrite" => {
                    self.ingest_rewrite(router, child, router_id);
                }
                "return" => {
                    self.ingest_return(router, child, router_id);
                }
                "if" => {
                    self.config.raw_extras.insert(
                        format!("{}.if.{}", router_id, child.line),
                        child.args.join(" "),
                    );
                    self.config.push_diagnostic(
                        Diagnostic::warning(
                            DiagnosticCode::UnsupportedFeature,
                            format!("location의 if 지시어는 보존만 됨 (라우터 '{}')", router_id),
                        )
                        .with_source(line_ref(child.line)),
                    );
                }
                other => {
                    if !KNOWN_DIRECTIVES.contains(&other) {
                        self.config.raw_extras.insert(
                            format!("{}.{}", router_id, other),
                            child.args.join(" "),
                        );
                        self.config.push_diagnostic(
                            Diagnostic::warning(
                                DiagnosticCode::UnknownField,
                                format!("알 수 없는 지시어 '{}'는 보존만 됨", other),
                            )
                            .with_source(line_ref(child.line)),
                        );
                    }
                }
            }
        }

        if !allows.is_empty() {
            let list = ParamValue::List(allows.into_iter().map(ParamValue::Str).collect());
            let middleware =
                Middleware::new(format!("{}-allowlist", router_id), MiddlewareKind::IpAllowList)
                    .with_param("sourceRange", list);
            self.attach_middleware(router, middleware);
        }
        if !request_headers.is_empty() {
            let middleware =
                Middleware::new(format!("{}-headers", router_id), MiddlewareKind::Headers)
                    .with_param("customRequestHeaders", ParamValue::Map(request_headers));
            self.attach_middleware(router, middleware);
        }
        if !response_headers.is_empty() {
            let middleware = Middleware::new(
                format!("{}-resp-headers", router_id),
                MiddlewareKind::Headers,
            )
            .with_param("customResponseHeaders", ParamValue::Map(response_headers));
            self.attach_middleware(router, middleware);
        }
    }

    /// `rewrite ^/p/(.*) /$1 break;`는 strip-prefix로 올리고,
    /// 그 외의 rewrite는 redirect-regex 또는 보존으로 처리합니다.
    fn ingest_rewrite(&mut self, router: &mut Router, directive: &Directive, router_id: &str) {
        let args = &directive.args;
        if args.len() >= 2 {
            if let Some(prefix) = strip_prefix_pattern(&args[0], &args[1]) {
                let middleware = Middleware::new(
                    format!("{}-stripprefix", router_id),
                    MiddlewareKind::StripPrefix,
                )
                .with_param(
                    "prefixes",
                    ParamValue::List(vec![ParamValue::Str(prefix)]),
                );
                self.attach_middleware(router, middleware);
                return;
            }
            if args.get(2).map(String::as_str) == Some("permanent") {
                let middleware = Middleware::new(
                    format!("{}-redirect", router_id),
                    MiddlewareKind::RedirectRegex,
                )
                .with_param("regex", ParamValue::Str(args[0].clone()))
                .with_param("replacement", ParamValue::Str(args[1].clone()))
                .with_param("permanent", ParamValue::Bool(true));
                self.attach_middleware(router, middleware);
                return;
            }
        }

        self.config.raw_extras.insert(
            format!("{}.rewrite.{}", router_id, directive.line),
            args.join(" "),
        );
        self.config.push_diagnostic(
            Diagnostic::warning(
                DiagnosticCode::UnsupportedFeature,
                format!("복잡한 rewrite는 보존만 됨 (라우터 '{}')", router_id),
            )
            .with_source(line_ref(directive.line)),
        );
    }

    /// `return 301 https://...`는 redirect-scheme으로 올립니다.
    fn ingest_return(&mut self, router: &mut Router, directive: &Directive, router_id: &str) {
        let code = directive.args.first().map(String::as_str);
        let target = directive.args.get(1).map(String::as_str);

        if matches!(code, Some("301") | Some("302")) {
            if let Some(target) = target {
                if target.starts_with("https://") {
                    let middleware = Middleware::new(
                        format!("{}-redirect", router_id),
                        MiddlewareKind::RedirectScheme,
                    )
                    .with_param("scheme", ParamValue::Str("https".to_string()))
                    .with_param("permanent", ParamValue::Bool(code == Some("301")));
                    self.attach_middleware(router, middleware);
                    return;
                }
            }
        }

        self.config.raw_extras.insert(
            format!("{}.return.{}", router_id, directive.line),
            directive.args.join(" "),
        );
    }

    fn attach_middleware(&mut self, router: &mut Router, middleware: Middleware) {
        router.middlewares.push(middleware.id.clone());
        self.config.insert_middleware(middleware);
    }

    /// proxy_pass 대상을 서비스 참조로 바꿉니다. 이름이 upstream과 일치하면
    /// 그 서비스를, 아니면 대상 호스트로 서비스를 합성합니다.
    fn resolve_proxy_pass(&mut self, target: &str) -> String {
        let stripped = target
            .strip_prefix("http://")
            .or_else(|| target.strip_prefix("https://"))
            .unwrap_or(target);
        let host_port = stripped.split('/').next().unwrap_or(stripped);
        let name = host_port.split(':').next().unwrap_or(host_port);

        if self.config.services.contains_key(name) {
            return name.to_string();
        }

        let id = sanitize_id(name);
        if !self.config.services.contains_key(&id) {
            let mut service = Service::new(&id, Protocol::Http);
            let url = if target.starts_with("http") {
                target.split('/').take(3).collect::<Vec<_>>().join("/")
            } else {
                format!("http://{}", host_port)
            };
            service.pool.servers.push(Server::url(url));
            self.config.insert_service(service);
        }
        id
    }

    fn ingest_stream_server(&mut self, directive: &Directive) {
        let body = directive.block.as_deref().unwrap_or_default();

        let mut port = None;
        let mut udp = false;
        let mut service_ref = None;

        for child in body {
            match child.name.as_str() {
                "listen" => {
                    for arg in &child.args {
                        if arg == "udp" {
                            udp = true;
                        } else {
                            port = port.or(primary_listen_port(arg));
                        }
                    }
                }
                "proxy_pass" => {
                    service_ref = child.args.first().cloned();
                }
                other => {
                    self.config
                        .raw_extras
                        .insert(format!("stream.{}", other), child.args.join(" "));
                }
            }
        }

        let (Some(port), Some(service_ref)) = (port, service_ref) else {
            self.config.push_diagnostic(
                Diagnostic::warning(
                    DiagnosticCode::UnknownField,
                    "stream server 블록에 listen 또는 proxy_pass가 없음",
                )
                .with_source(line_ref(directive.line)),
            );
            return;
        };

        let protocol = if udp { Protocol::Udp } else { Protocol::Tcp };
        let entrypoint_name = format!("{}-{}", protocol, port);
        self.config.entrypoints.insert(
            entrypoint_name.clone(),
            Entrypoint {
                address: format!(":{}", port),
                protocol,
            },
        );

        // upstream 서비스의 프로토콜을 맞춰 줌
        if let Some(service) = self.config.services.get_mut(&service_ref) {
            service.protocol = protocol;
        }

        let router_id = format!("{}-{}", sanitize_id(&service_ref), port);
        let mut router = Router::new(&router_id, protocol, service_ref);
        router.entrypoints = vec![entrypoint_name];
        if protocol == Protocol::Tcp {
            // Traefik TCP 라우터는 규칙이 필수라 와일드카드 SNI를 합성
            router.rule = Some(RuleExpr::matcher(Matcher::single(MatcherName::HostSni, "*")));
        }
        self.config.insert_router(router);
    }

    fn record_extra(&mut self, scope: &str, server_names: &[String], directive: &Directive) {
        let host = server_names
            .first()
            .map(String::as_str)
            .unwrap_or("default");
        self.config.raw_extras.insert(
            format!("{}.{}.{}", scope, host, directive.name),
            directive.args.join(" "),
        );
        self.config.push_diagnostic(
            Diagnostic::warning(
                DiagnosticCode::UnknownField,
                format!("알 수 없는 지시어 '{}'는 보존만 됨", directive.name),
            )
            .with_source(line_ref(directive.line)),
        );
    }
}

fn line_ref(line: usize) -> SourceRef {
    SourceRef {
        file: None,
        line: Some(line),
        column: None,
    }
}

/// listen 인자에서 포트를 뽑습니다. `80`, `0.0.0.0:80`, `[::]:80` 허용.
/// default_server 같은 플래그는 `None`.
fn primary_listen_port(arg: &str) -> Option<u16> {
    if let Ok(port) = arg.parse::<u16>() {
        return Some(port);
    }
    if let Some((_, port)) = arg.rsplit_once(':') {
        if let Ok(port) = port.parse::<u16>() {
            return Some(port);
        }
    }
    None
}

/// location 인자를 매처 종류와 경로로 바꿉니다.
fn location_matcher(args: &[String]) -> (MatcherName, String) {
    match args.first().map(String::as_str) {
        Some("=") => (
            MatcherName::Path,
            args.get(1).cloned().unwrap_or_else(|| "/".to_string()),
        ),
        Some("~") | Some("~*") => (
            MatcherName::PathRegexp,
            args.get(1).cloned().unwrap_or_else(|| "/".to_string()),
        ),
        Some("^~") => (
            MatcherName::PathPrefix,
            args.get(1).cloned().unwrap_or_else(|| "/".to_string()),
        ),
        Some(path) => (MatcherName::PathPrefix, path.to_string()),
        None => (MatcherName::PathPrefix, "/".to_string()),
    }
}

/// location이 리다이렉트 전용인지 (proxy_pass 없이 return만)
fn is_redirect_location(location: &Directive) -> bool {
    let body = location.block.as_deref().unwrap_or_default();
    let has_proxy = body.iter().any(|d| d.name == "proxy_pass");
    let has_return = body.iter().any(|d| d.name == "return");
    !has_proxy && has_return
}

/// `rewrite ^/p/(.*) /$1 break` 꼴에서 접두사를 추출
fn strip_prefix_pattern(pattern: &str, replacement: &str) -> Option<String> {
    if replacement != "/$1" {
        return None;
    }
    let rest = pattern.strip_prefix('^')?;
    let prefix = rest.strip_suffix("/(.*)$").or_else(|| rest.strip_suffix("/(.*)"))?;
    if prefix.is_empty() || prefix.contains(['(', '[', '*', '+']) {
        return None;
    }
    Some(prefix.to_string())
}

fn sanitize_id(raw: &str) -> String {
    let mut out: String = raw
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '-'
            }
        })
        .collect();
    while out.contains("--") {
        out = out.replace("--", "-");
    }
    out.trim_matches('-').to_string()
}
