use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// 인식되는 미들웨어 종류입니다.
///
/// Traefik 동적 설정에서는 camelCase 키(`basicAuth`)로, 그 외의 곳에서는
/// kebab-case(`basic-auth`)로 표기됩니다. 양쪽 표기를 모두 파싱합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MiddlewareKind {
    BasicAuth,
    RateLimit,
    IpAllowList,
    Compress,
    Headers,
    RedirectScheme,
    RedirectRegex,
    StripPrefix,
    AddPrefix,
    ReplacePath,
    Retry,
    Buffering,
    InFlightReq,
    ForwardAuth,
    CircuitBreaker,
    Chain,
}

impl MiddlewareKind {
    pub const ALL: &'static [MiddlewareKind] = &[
        MiddlewareKind::BasicAuth,
        MiddlewareKind::RateLimit,
        MiddlewareKind::IpAllowList,
        MiddlewareKind::Compress,
        MiddlewareKind::Headers,
        MiddlewareKind::RedirectScheme,
        MiddlewareKind::RedirectRegex,
        MiddlewareKind::StripPrefix,
        MiddlewareKind::AddPrefix,
        MiddlewareKind::ReplacePath,
        MiddlewareKind::Retry,
        MiddlewareKind::Buffering,
        MiddlewareKind::InFlightReq,
        MiddlewareKind::ForwardAuth,
        MiddlewareKind::CircuitBreaker,
        MiddlewareKind::Chain,
    ];

    pub fn as_kebab(&self) -> &'static str {
        match self {
            MiddlewareKind::BasicAuth => "basic-auth",
            MiddlewareKind::RateLimit => "rate-limit",
            MiddlewareKind::IpAllowList => "ip-allowlist",
            MiddlewareKind::Compress => "compress",
            MiddlewareKind::Headers => "headers",
            MiddlewareKind::RedirectScheme => "redirect-scheme",
            MiddlewareKind::RedirectRegex => "redirect-regex",
            MiddlewareKind::StripPrefix => "strip-prefix",
            MiddlewareKind::AddPrefix => "add-prefix",
            MiddlewareKind::ReplacePath => "replace-path",
            MiddlewareKind::Retry => "retry",
            MiddlewareKind::Buffering => "buffering",
            MiddlewareKind::InFlightReq => "in-flight-req",
            MiddlewareKind::ForwardAuth => "forward-auth",
            MiddlewareKind::CircuitBreaker => "circuit-breaker",
            MiddlewareKind::Chain => "chain",
        }
    }

    /// Traefik 동적 설정에서 쓰이는 camelCase 키
    pub fn traefik_key(&self) -> &'static str {
        match self {
            MiddlewareKind::BasicAuth => "basicAuth",
            MiddlewareKind::RateLimit => "rateLimit",
            MiddlewareKind::IpAllowList => "ipAllowList",
            MiddlewareKind::Compress => "compress",
            MiddlewareKind::Headers => "headers",
            MiddlewareKind::RedirectScheme => "redirectScheme",
            MiddlewareKind::RedirectRegex => "redirectRegex",
            MiddlewareKind::StripPrefix => "stripPrefix",
            MiddlewareKind::AddPrefix => "addPrefix",
            MiddlewareKind::ReplacePath => "replacePath",
            MiddlewareKind::Retry => "retry",
            MiddlewareKind::Buffering => "buffering",
            MiddlewareKind::InFlightReq => "inFlightReq",
            MiddlewareKind::ForwardAuth => "forwardAuth",
            MiddlewareKind::CircuitBreaker => "circuitBreaker",
            MiddlewareKind::Chain => "chain",
        }
    }

    /// 미들웨어 정의의 최상위 키에서 종류를 판별합니다.
    /// 대소문자를 무시하므로 라벨의 소문자 표기(`ratelimit`)도 받습니다.
    pub fn from_key(key: &str) -> Option<Self> {
        let folded = key.to_ascii_lowercase().replace('-', "");
        // Traefik v2의 ipWhiteList는 v3에서 ipAllowList로 개명됨
        if folded == "ipwhitelist" {
            return Some(MiddlewareKind::IpAllowList);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.traefik_key().to_ascii_lowercase() == folded)
    }
}

impl fmt::Display for MiddlewareKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_kebab())
    }
}

impl FromStr for MiddlewareKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_kebab() == s)
            .or_else(|| Self::from_key(s))
            .ok_or_else(|| format!("알 수 없는 미들웨어 종류: {}", s))
    }
}

/// 미들웨어 파라미터 값입니다. 스칼라, 목록, 맵을 허용합니다.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Bool(bool),
    List(Vec<ParamValue>),
    Map(BTreeMap<String, ParamValue>),
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// 숫자 값을 반환합니다. 문자열로 들어온 숫자도 허용합니다.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(n) => Some(*n),
            ParamValue::Str(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ParamValue]> {
        match self {
            ParamValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, ParamValue>> {
        match self {
            ParamValue::Map(map) => Some(map),
            _ => None,
        }
    }

    /// 스칼라 또는 쉼표 구분 문자열을 문자열 목록으로 펼칩니다.
    pub fn as_string_list(&self) -> Vec<String> {
        match self {
            ParamValue::Str(s) => s.split(',').map(|part| part.trim().to_string()).collect(),
            ParamValue::List(items) => items
                .iter()
                .map(|item| match item {
                    ParamValue::Str(s) => s.clone(),
                    ParamValue::Int(n) => n.to_string(),
                    ParamValue::Bool(b) => b.to_string(),
                    other => format!("{:?}", other),
                })
                .collect(),
            ParamValue::Int(n) => vec![n.to_string()],
            ParamValue::Bool(b) => vec![b.to_string()],
            ParamValue::Map(_) => Vec::new(),
        }
    }

    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => ParamValue::Str(String::new()),
            serde_json::Value::Bool(b) => ParamValue::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => ParamValue::Int(i),
                None => ParamValue::Str(n.to_string()),
            },
            serde_json::Value::String(s) => ParamValue::Str(s.clone()),
            serde_json::Value::Array(items) => {
                ParamValue::List(items.iter().map(ParamValue::from_json).collect())
            }
            serde_json::Value::Object(map) => ParamValue::Map(
                map.iter()
                    .map(|(key, val)| (key.clone(), ParamValue::from_json(val)))
                    .collect(),
            ),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ParamValue::Str(s) => serde_json::Value::String(s.clone()),
            ParamValue::Int(n) => serde_json::Value::Number((*n).into()),
            ParamValue::Bool(b) => serde_json::Value::Bool(*b),
            ParamValue::List(items) => {
                serde_json::Value::Array(items.iter().map(ParamValue::to_json).collect())
            }
            ParamValue::Map(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(key, val)| (key.clone(), val.to_json()))
                    .collect(),
            ),
        }
    }
}

/// 요청/응답 변환 미들웨어 엔티티입니다.
#[derive(Debug, Clone)]
pub struct Middleware {
    pub id: String,
    pub kind: MiddlewareKind,
    pub params: BTreeMap<String, ParamValue>,
}

impl Middleware {
    pub fn new(id: impl Into<String>, kind: MiddlewareKind) -> Self {
        Self {
            id: id.into(),
            kind,
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: ParamValue) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn param(&self, key: &str) -> Option<&ParamValue> {
        self.params.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_key() {
        assert_eq!(MiddlewareKind::from_key("basicAuth"), Some(MiddlewareKind::BasicAuth));
        assert_eq!(MiddlewareKind::from_key("ratelimit"), Some(MiddlewareKind::RateLimit));
        assert_eq!(MiddlewareKind::from_key("stripprefix"), Some(MiddlewareKind::StripPrefix));
        assert_eq!(MiddlewareKind::from_key("ipWhiteList"), Some(MiddlewareKind::IpAllowList));
        assert_eq!(MiddlewareKind::from_key("nope"), None);
    }

    #[test]
    fn test_kind_kebab_roundtrip() {
        for kind in MiddlewareKind::ALL {
            assert_eq!(kind.as_kebab().parse::<MiddlewareKind>().unwrap(), *kind);
        }
    }

    #[test]
    fn test_param_string_list() {
        let value = ParamValue::Str("a, b,c".to_string());
        assert_eq!(value.as_string_list(), vec!["a", "b", "c"]);

        let list = ParamValue::List(vec![
            ParamValue::Str("x".to_string()),
            ParamValue::Int(3),
        ]);
        assert_eq!(list.as_string_list(), vec!["x", "3"]);
    }

    #[test]
    fn test_param_json_roundtrip() {
        let json = serde_json::json!({
            "average": 50,
            "burst": "100",
            "sourceCriterion": { "requestHost": true }
        });
        let value = ParamValue::from_json(&json);
        assert_eq!(value.to_json(), json);

        let map = value.as_map().unwrap();
        assert_eq!(map["average"].as_int(), Some(50));
        assert_eq!(map["burst"].as_int(), Some(100));
    }
}
