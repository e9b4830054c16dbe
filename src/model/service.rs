use std::fmt;
use std::str::FromStr;

use crate::model::router::Protocol;

/// 로드 밸런싱 정책입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LbPolicy {
    #[default]
    RoundRobin,
    WeightedRoundRobin,
    LeastConn,
    WeightedLeastConn,
    Random,
    WeightedRandom,
}

impl LbPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            LbPolicy::RoundRobin => "round_robin",
            LbPolicy::WeightedRoundRobin => "weighted_rr",
            LbPolicy::LeastConn => "least_conn",
            LbPolicy::WeightedLeastConn => "weighted_least_conn",
            LbPolicy::Random => "random",
            LbPolicy::WeightedRandom => "weighted_random",
        }
    }

    /// 가중치가 모든 서버에 필요한 정책인지 여부
    pub fn is_weighted(&self) -> bool {
        matches!(
            self,
            LbPolicy::WeightedRoundRobin | LbPolicy::WeightedLeastConn | LbPolicy::WeightedRandom
        )
    }
}

impl fmt::Display for LbPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LbPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "round_robin" => Ok(LbPolicy::RoundRobin),
            "weighted_rr" => Ok(LbPolicy::WeightedRoundRobin),
            "least_conn" => Ok(LbPolicy::LeastConn),
            "weighted_least_conn" => Ok(LbPolicy::WeightedLeastConn),
            "random" => Ok(LbPolicy::Random),
            "weighted_random" => Ok(LbPolicy::WeightedRandom),
            unknown => Err(format!("알 수 없는 로드밸런싱 정책: {}", unknown)),
        }
    }
}

/// 백엔드 서버의 대상 주소입니다.
///
/// HTTP 서비스는 스킴을 포함한 URL을, TCP/UDP 서비스는 host:port 형태의
/// 주소를 사용합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerTarget {
    Url(String),
    Address(String),
}

impl ServerTarget {
    pub fn as_str(&self) -> &str {
        match self {
            ServerTarget::Url(url) => url,
            ServerTarget::Address(addr) => addr,
        }
    }

    /// URL에서 스킴을 제거한 host[:port][/path] 부분을 반환합니다.
    pub fn host_part(&self) -> &str {
        match self {
            ServerTarget::Url(url) => url
                .strip_prefix("http://")
                .or_else(|| url.strip_prefix("https://"))
                .unwrap_or(url),
            ServerTarget::Address(addr) => addr,
        }
    }

    /// 대상의 포트 번호를 추출합니다.
    pub fn port(&self) -> Option<u16> {
        let host = self.host_part();
        let host = host.split('/').next().unwrap_or(host);
        host.rsplit_once(':')
            .and_then(|(_, port)| port.parse().ok())
    }
}

/// 풀에 속한 서버 하나입니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Server {
    pub target: ServerTarget,
    pub weight: Option<u32>,
}

impl Server {
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            target: ServerTarget::Url(url.into()),
            weight: None,
        }
    }

    pub fn address(addr: impl Into<String>) -> Self {
        Self {
            target: ServerTarget::Address(addr.into()),
            weight: None,
        }
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = Some(weight);
        self
    }
}

/// 서버 풀과 로드밸런싱 정책입니다.
#[derive(Debug, Clone, Default)]
pub struct LoadBalancer {
    pub servers: Vec<Server>,
    pub policy: LbPolicy,
}

/// 백엔드 헬스체크 설정입니다.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthCheck {
    pub path: String,
    pub interval_secs: u64,
    pub timeout_secs: u64,
}

impl Default for HealthCheck {
    fn default() -> Self {
        Self {
            path: "/health".to_string(),
            interval_secs: 30,
            timeout_secs: 5,
        }
    }
}

/// 백엔드 풀과 정책, 헬스체크를 묶는 서비스 엔티티입니다.
#[derive(Debug, Clone)]
pub struct Service {
    pub id: String,
    pub protocol: Protocol,
    pub pool: LoadBalancer,
    pub health: Option<HealthCheck>,
}

impl Service {
    pub fn new(id: impl Into<String>, protocol: Protocol) -> Self {
        Self {
            id: id.into(),
            protocol,
            pool: LoadBalancer::default(),
            health: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_target_port() {
        assert_eq!(Server::url("http://web:8080").target.port(), Some(8080));
        assert_eq!(Server::url("http://web").target.port(), None);
        assert_eq!(Server::address("10.0.0.1:53").target.port(), Some(53));
        assert_eq!(Server::url("http://web:8080/api").target.port(), Some(8080));
    }

    #[test]
    fn test_host_part_strips_scheme() {
        assert_eq!(Server::url("https://a:443").target.host_part(), "a:443");
        assert_eq!(Server::address("b:9000").target.host_part(), "b:9000");
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("least_conn".parse::<LbPolicy>().unwrap(), LbPolicy::LeastConn);
        assert!(LbPolicy::WeightedRoundRobin.is_weighted());
        assert!(!LbPolicy::Random.is_weighted());
        assert!("ip_hash".parse::<LbPolicy>().is_err());
    }
}
