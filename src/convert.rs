//! 변환 파이프라인 오케스트레이터입니다.
//!
//! detect → ingest → validate → emit 순서로 진행하며, 단계별 진단을
//! 누적합니다. 에러 집합이 비어 있지 않으면 방출 전에 중단합니다
//! (호출자가 관대 모드를 요청한 경우 제외). 오케스트레이터는 파일
//! 시스템을 직접 만지지 않습니다: 바이트를 받아 바이트와 진단을 냅니다.

use std::fmt;

use tracing::{debug, info};

use crate::detect::{detect_format, DetectError, Format};
use crate::emit::{emit_compose, emit_nginx, emit_traefik, EmitError};
use crate::ingest::{ingest_compose, ingest_nginx, ingest_traefik, DataFormat, IngestError};
use crate::model::{Config, Diagnostic};
use crate::rule::Dialect;
use crate::validator::validate;

/// 변환 옵션
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// 입력 형식. `None`이면 탐지기가 추론합니다.
    pub input_format: Option<Format>,
    pub output_format: Format,
    /// 규칙 출력 방언 (기본 v3)
    pub dialect: Dialect,
    /// 입력 규칙의 방언. `None`이면 출력 방언과 같다고 간주합니다.
    pub input_dialect: Option<Dialect>,
    /// 검증 실행 여부
    pub validate: bool,
    /// 에러가 있어도 방출을 진행
    pub lenient: bool,
    /// 탐지기에 줄 파일 이름 힌트
    pub input_name: Option<String>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            input_format: None,
            output_format: Format::TraefikDynamic,
            dialect: Dialect::V3,
            input_dialect: None,
            validate: true,
            lenient: false,
            input_name: None,
        }
    }
}

/// 변환 결과: 출력 텍스트(중단 시 None)와 전체 진단, 사용한 입력 형식.
#[derive(Debug)]
pub struct Conversion {
    pub output: Option<String>,
    pub config: Config,
    pub input_format: Format,
}

#[derive(Debug)]
pub enum ConvertError {
    Detect { source: DetectError },
    Ingest { source: IngestError },
    Emit { source: EmitError },
    /// 검증 에러로 방출이 중단됨. Config에 진단이 남아 있습니다.
    Validation { config: Box<Config> },
    UnsupportedConversion { from: Format, to: Format },
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvertError::Detect { source } => write!(f, "형식 탐지 실패: {}", source),
            ConvertError::Ingest { source } => write!(f, "수집 실패: {}", source),
            ConvertError::Emit { source } => write!(f, "방출 실패: {}", source),
            ConvertError::Validation { config } => {
                write!(f, "검증 에러 {}건으로 방출 중단", config.error_count())
            }
            ConvertError::UnsupportedConversion { from, to } => {
                write!(f, "{} → {} 변환은 지원되지 않음", from, to)
            }
        }
    }
}

impl std::error::Error for ConvertError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConvertError::Detect { source } => Some(source),
            ConvertError::Ingest { source } => Some(source),
            ConvertError::Emit { source } => Some(source),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;

/// 바이트 입력을 받아 요청된 형식의 바이트 출력과 진단을 냅니다.
pub fn convert(input: &[u8], options: &ConvertOptions) -> Result<Conversion> {
    let input_format = resolve_input_format(input, options)?;
    debug!(format = %input_format, "입력 형식 결정");

    let input_dialect = options.input_dialect.unwrap_or(options.dialect);
    let mut config = ingest(input, input_format, input_dialect)?;

    if options.validate {
        validate(&mut config);
    }

    if config.has_errors() && !options.lenient {
        info!(
            errors = config.error_count(),
            "검증 에러로 방출을 중단함"
        );
        return Err(ConvertError::Validation {
            config: Box::new(config),
        });
    }

    let emitted = emit(&config, options)?;
    config.diagnostics.extend(emitted.diagnostics);

    info!(
        from = %input_format,
        to = %options.output_format,
        routers = config.routers.len(),
        services = config.services.len(),
        warnings = config.warning_count(),
        "변환 완료"
    );

    Ok(Conversion {
        output: Some(emitted.content),
        config,
        input_format,
    })
}

/// 수집과 검증만 수행합니다 (analyze 명령용).
pub fn ingest_only(input: &[u8], options: &ConvertOptions) -> Result<(Config, Format)> {
    let input_format = resolve_input_format(input, options)?;
    let input_dialect = options.input_dialect.unwrap_or(options.dialect);
    let mut config = ingest(input, input_format, input_dialect)?;
    if options.validate {
        validate(&mut config);
    }
    Ok((config, input_format))
}

fn resolve_input_format(input: &[u8], options: &ConvertOptions) -> Result<Format> {
    match options.input_format {
        Some(format) => Ok(format),
        None => detect_format(options.input_name.as_deref(), input)
            .map_err(|source| ConvertError::Detect { source }),
    }
}

fn ingest(input: &[u8], format: Format, dialect: Dialect) -> Result<Config> {
    let config = match format {
        Format::DockerCompose => ingest_compose(input, dialect),
        Format::TraefikDynamic | Format::Yaml => {
            ingest_traefik(input, DataFormat::Yaml, dialect)
        }
        Format::Json => ingest_traefik(input, DataFormat::Json, dialect),
        Format::NginxConf => ingest_nginx(input),
    };
    config.map_err(|source| ConvertError::Ingest { source })
}

fn emit(config: &Config, options: &ConvertOptions) -> Result<crate::emit::Emitted> {
    let emitted = match options.output_format {
        Format::TraefikDynamic | Format::Yaml => {
            emit_traefik(config, options.dialect, DataFormat::Yaml)
        }
        Format::Json => emit_traefik(config, options.dialect, DataFormat::Json),
        Format::NginxConf => emit_nginx(config),
        Format::DockerCompose => emit_compose(config, options.dialect),
    };
    emitted.map_err(|source| ConvertError::Emit { source })
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPOSE: &str = r#"
services:
  web:
    image: nginx:alpine
    labels:
      - "traefik.enable=true"
      - "traefik.http.routers.r.rule=Host(`x`)"
      - "traefik.http.routers.r.service=s"
      - "traefik.http.services.s.loadbalancer.server.port=8080"
"#;

    #[test]
    fn test_compose_to_nginx_pipeline() {
        let options = ConvertOptions {
            output_format: Format::NginxConf,
            input_name: Some("docker-compose.yml".to_string()),
            ..Default::default()
        };
        let conversion = convert(COMPOSE.as_bytes(), &options).unwrap();
        let output = conversion.output.unwrap();

        assert_eq!(conversion.input_format, Format::DockerCompose);
        assert!(output.contains("upstream s {"));
        assert!(output.contains("server_name x;"));
    }

    #[test]
    fn test_validation_blocks_emission() {
        // 존재하지 않는 서비스를 참조하는 라우터
        let yaml = r#"
http:
  routers:
    r:
      rule: "Host(`x`)"
      service: missing
"#;
        let options = ConvertOptions {
            input_format: Some(Format::TraefikDynamic),
            output_format: Format::NginxConf,
            ..Default::default()
        };
        let err = convert(yaml.as_bytes(), &options).unwrap_err();
        match err {
            ConvertError::Validation { config } => {
                assert!(config.has_errors());
            }
            other => panic!("검증 에러가 아님: {}", other),
        }
    }

    #[test]
    fn test_lenient_mode_emits_anyway() {
        let yaml = r#"
http:
  routers:
    r:
      rule: "Host(`x`)"
      service: missing
"#;
        let options = ConvertOptions {
            input_format: Some(Format::TraefikDynamic),
            output_format: Format::TraefikDynamic,
            lenient: true,
            ..Default::default()
        };
        let conversion = convert(yaml.as_bytes(), &options).unwrap();
        assert!(conversion.output.is_some());
        assert!(conversion.config.has_errors());
    }

    #[test]
    fn test_parse_error_is_ingest_error() {
        let options = ConvertOptions {
            input_format: Some(Format::NginxConf),
            ..Default::default()
        };
        let err = convert(b"server { listen 80;", &options).unwrap_err();
        assert!(matches!(err, ConvertError::Ingest { .. }));
    }

    #[test]
    fn test_roundtrip_traefik_identity() {
        let yaml = r#"
http:
  routers:
    r:
      rule: "Host(`x`)"
      service: s
  services:
    s:
      loadBalancer:
        servers:
          - url: "http://web:8080"
"#;
        let options = ConvertOptions {
            input_format: Some(Format::TraefikDynamic),
            output_format: Format::TraefikDynamic,
            ..Default::default()
        };
        let first = convert(yaml.as_bytes(), &options).unwrap();
        let first_output = first.output.unwrap();

        // 방출 결과를 다시 변환해도 같은 출력 (정규화 후 고정점)
        let second = convert(first_output.as_bytes(), &options).unwrap();
        assert_eq!(first_output, second.output.unwrap());
    }
}
