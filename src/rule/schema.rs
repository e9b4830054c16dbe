use std::fmt;

use crate::model::Protocol;

/// 닫힌 매처 집합입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatcherName {
    Host,
    HostRegexp,
    Path,
    PathPrefix,
    PathRegexp,
    Method,
    Header,
    HeaderRegexp,
    Query,
    QueryRegexp,
    ClientIp,
    HostSni,
    HostSniRegexp,
    Alpn,
}

/// 매처 하나의 스키마: 표기, 인자 수 범위, 허용 프로토콜.
pub struct MatcherSchema {
    pub name: &'static str,
    pub kind: MatcherName,
    pub min_args: usize,
    /// `None`은 상한 없음(1..n)을 뜻합니다.
    pub max_args: Option<usize>,
    pub protocols: &'static [Protocol],
}

const HTTP: &[Protocol] = &[Protocol::Http];
const TCP: &[Protocol] = &[Protocol::Tcp];
const ANY: &[Protocol] = &[Protocol::Http, Protocol::Tcp, Protocol::Udp];

/// 매처 스키마 테이블. 디스패치는 코드가 아니라 이 데이터로 합니다.
pub const MATCHER_SCHEMA: &[MatcherSchema] = &[
    MatcherSchema { name: "Host", kind: MatcherName::Host, min_args: 1, max_args: None, protocols: HTTP },
    MatcherSchema { name: "HostRegexp", kind: MatcherName::HostRegexp, min_args: 1, max_args: None, protocols: HTTP },
    MatcherSchema { name: "Path", kind: MatcherName::Path, min_args: 1, max_args: None, protocols: HTTP },
    MatcherSchema { name: "PathPrefix", kind: MatcherName::PathPrefix, min_args: 1, max_args: None, protocols: HTTP },
    MatcherSchema { name: "PathRegexp", kind: MatcherName::PathRegexp, min_args: 1, max_args: None, protocols: HTTP },
    MatcherSchema { name: "Method", kind: MatcherName::Method, min_args: 1, max_args: None, protocols: HTTP },
    MatcherSchema { name: "Header", kind: MatcherName::Header, min_args: 2, max_args: Some(2), protocols: HTTP },
    MatcherSchema { name: "HeaderRegexp", kind: MatcherName::HeaderRegexp, min_args: 2, max_args: Some(2), protocols: HTTP },
    MatcherSchema { name: "Query", kind: MatcherName::Query, min_args: 1, max_args: Some(2), protocols: HTTP },
    MatcherSchema { name: "QueryRegexp", kind: MatcherName::QueryRegexp, min_args: 2, max_args: Some(2), protocols: HTTP },
    MatcherSchema { name: "ClientIP", kind: MatcherName::ClientIp, min_args: 1, max_args: None, protocols: ANY },
    MatcherSchema { name: "HostSNI", kind: MatcherName::HostSni, min_args: 1, max_args: None, protocols: TCP },
    MatcherSchema { name: "HostSNIRegexp", kind: MatcherName::HostSniRegexp, min_args: 1, max_args: None, protocols: TCP },
    MatcherSchema { name: "ALPN", kind: MatcherName::Alpn, min_args: 1, max_args: None, protocols: TCP },
];

impl MatcherName {
    pub fn from_ident(ident: &str) -> Option<Self> {
        MATCHER_SCHEMA
            .iter()
            .find(|schema| schema.name == ident)
            .map(|schema| schema.kind)
    }

    pub fn schema(&self) -> &'static MatcherSchema {
        // 테이블은 모든 변형을 포함하므로 실패하지 않음
        MATCHER_SCHEMA
            .iter()
            .find(|schema| schema.kind == *self)
            .unwrap_or(&MATCHER_SCHEMA[0])
    }

    pub fn as_str(&self) -> &'static str {
        self.schema().name
    }

    /// 주어진 인자 수가 스키마 범위에 드는지 검사합니다.
    pub fn accepts_arity(&self, count: usize) -> bool {
        let schema = self.schema();
        count >= schema.min_args && schema.max_args.map_or(true, |max| count <= max)
    }

    /// 스키마의 인자 수 범위를 사람이 읽을 수 있게 표기합니다.
    pub fn arity_label(&self) -> String {
        let schema = self.schema();
        match schema.max_args {
            Some(max) if max == schema.min_args => format!("{}", max),
            Some(max) => format!("{}..{}", schema.min_args, max),
            None => format!("{}..n", schema.min_args),
        }
    }

    pub fn allows_protocol(&self, protocol: Protocol) -> bool {
        self.schema().protocols.contains(&protocol)
    }

    /// v2 방언에서 중괄호 템플릿 인자를 허용하는 매처인지 여부.
    pub fn takes_template_args(&self) -> bool {
        matches!(self, MatcherName::HostRegexp)
    }
}

impl fmt::Display for MatcherName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_lookup() {
        assert_eq!(MatcherName::from_ident("Host"), Some(MatcherName::Host));
        assert_eq!(MatcherName::from_ident("HostSNI"), Some(MatcherName::HostSni));
        assert_eq!(MatcherName::from_ident("host"), None);
        assert_eq!(MatcherName::from_ident("Foo"), None);
    }

    #[test]
    fn test_arity_ranges() {
        assert!(MatcherName::Host.accepts_arity(1));
        assert!(MatcherName::Host.accepts_arity(5));
        assert!(!MatcherName::Host.accepts_arity(0));

        assert!(MatcherName::Header.accepts_arity(2));
        assert!(!MatcherName::Header.accepts_arity(1));
        assert!(!MatcherName::Header.accepts_arity(3));

        assert!(MatcherName::Query.accepts_arity(1));
        assert!(MatcherName::Query.accepts_arity(2));
        assert!(!MatcherName::Query.accepts_arity(3));
    }

    #[test]
    fn test_protocol_compatibility() {
        use crate::model::Protocol;

        assert!(MatcherName::Host.allows_protocol(Protocol::Http));
        assert!(!MatcherName::Host.allows_protocol(Protocol::Tcp));
        assert!(MatcherName::HostSni.allows_protocol(Protocol::Tcp));
        assert!(!MatcherName::HostSni.allows_protocol(Protocol::Http));
        assert!(MatcherName::ClientIp.allows_protocol(Protocol::Udp));
    }

    #[test]
    fn test_arity_label() {
        assert_eq!(MatcherName::Host.arity_label(), "1..n");
        assert_eq!(MatcherName::Header.arity_label(), "2");
        assert_eq!(MatcherName::Query.arity_label(), "1..2");
    }
}
