use std::fmt;
use std::str::FromStr;

use crate::model::tls::TlsSpec;
use crate::rule::RuleExpr;

/// 라우터와 서비스가 다루는 프로토콜입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Protocol {
    Http,
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(Protocol::Http),
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            unknown => Err(format!("알 수 없는 프로토콜: {}", unknown)),
        }
    }
}

/// 라우팅 규칙과 대상 서비스를 묶는 엔티티입니다.
///
/// UDP 라우터는 규칙을 갖지 않습니다 (Traefik UDP는 엔트리포인트로만
/// 라우팅합니다). TCP 라우터의 규칙은 제한된 매처 집합만 허용하며,
/// 이 제약은 검증기가 확인합니다.
#[derive(Debug, Clone)]
pub struct Router {
    pub id: String,
    pub protocol: Protocol,
    pub rule: Option<RuleExpr>,
    pub priority: Option<i32>,
    pub entrypoints: Vec<String>,
    pub service: String,
    pub middlewares: Vec<String>,
    pub tls: Option<TlsSpec>,
}

impl Router {
    pub fn new(id: impl Into<String>, protocol: Protocol, service: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            protocol,
            rule: None,
            priority: None,
            entrypoints: Vec::new(),
            service: service.into(),
            middlewares: Vec::new(),
            tls: None,
        }
    }

    pub fn with_rule(mut self, rule: RuleExpr) -> Self {
        self.rule = Some(rule);
        self
    }

    pub fn with_tls(mut self, tls: TlsSpec) -> Self {
        self.tls = Some(tls);
        self
    }
}
