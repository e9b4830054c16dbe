//! Proxy Config Bridge는 nginx, Traefik, Docker Compose 라우팅 설정을
//! 상호 변환하는 마이그레이션 도구입니다.
//!
//! # 주요 기능
//!
//! - Traefik v2/v3 규칙 언어의 파싱과 방언별 출력
//! - 형식 중립 라우팅 모델 (라우터/서비스/미들웨어/TLS/풀)
//! - 형식별 수집기와 방출기 (nginx, traefik-dynamic, docker-compose)
//! - 교차 형식 불변식과 모범 사례 검증
//!
//! # 예제
//!
//! ```
//! use proxy_config_bridge::convert::{convert, ConvertOptions};
//! use proxy_config_bridge::detect::Format;
//!
//! let compose = br#"
//! services:
//!   web:
//!     labels:
//!       - "traefik.http.routers.web.rule=Host(`example.com`)"
//!     expose:
//!       - "8080"
//! "#;
//!
//! let options = ConvertOptions {
//!     input_format: Some(Format::DockerCompose),
//!     output_format: Format::NginxConf,
//!     ..Default::default()
//! };
//!
//! let conversion = convert(compose, &options).unwrap();
//! assert!(conversion.output.unwrap().contains("server_name example.com;"));
//! ```
//!
//! # 규칙 파싱
//!
//! ```
//! use proxy_config_bridge::rule::{parse_rule, print_rule, Dialect};
//!
//! let expr = parse_rule("Host(`a.com`) && PathPrefix(`/api`)", Dialect::V3).unwrap();
//! assert_eq!(print_rule(&expr, Dialect::V3), "Host(`a.com`) && PathPrefix(`/api`)");
//! ```

pub mod analyze;
pub mod convert;
pub mod detect;
pub mod emit;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod rule;
pub mod scaffold;
pub mod validator;
