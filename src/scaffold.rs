//! 프록시 구성 일괄 생성기입니다.
//!
//! 입력 설정 하나에서 docker-compose 매니페스트, 프록시 설정 파일,
//! 문서를 한꺼번에 만듭니다. 파일 쓰기는 CLI 셸의 몫이고, 여기서는
//! (상대 경로, 내용) 아티팩트 목록만 만듭니다.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::convert::{ConvertError, Result};
use crate::emit::{emit_compose, emit_nginx, emit_traefik};
use crate::ingest::DataFormat;
use crate::model::{Config, Diagnostic};
use crate::rule::Dialect;

/// 생성 대상 프록시
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyType {
    Traefik,
    Nginx,
}

impl ProxyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyType::Traefik => "traefik",
            ProxyType::Nginx => "nginx",
        }
    }
}

impl fmt::Display for ProxyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProxyType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "traefik" => Ok(ProxyType::Traefik),
            "nginx" => Ok(ProxyType::Nginx),
            unknown => Err(format!("알 수 없는 프록시 종류: {}", unknown)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScaffoldOptions {
    pub proxy_type: ProxyType,
    pub include_compose: bool,
    pub include_config: bool,
    pub include_docs: bool,
    pub dialect: Dialect,
}

impl Default for ScaffoldOptions {
    fn default() -> Self {
        Self {
            proxy_type: ProxyType::Traefik,
            include_compose: true,
            include_config: true,
            include_docs: false,
            dialect: Dialect::V3,
        }
    }
}

/// 생성된 아티팩트 하나: 출력 디렉터리 기준 상대 경로와 내용.
#[derive(Debug)]
pub struct Artifact {
    pub path: PathBuf,
    pub content: String,
}

/// 검증된 Config에서 아티팩트 묶음을 만듭니다.
pub fn scaffold(
    config: &Config,
    options: &ScaffoldOptions,
) -> Result<(Vec<Artifact>, Vec<Diagnostic>)> {
    let mut artifacts = Vec::new();
    let mut diagnostics = Vec::new();

    if options.include_compose {
        let emitted = emit_compose(config, options.dialect)
            .map_err(|source| ConvertError::Emit { source })?;
        diagnostics.extend(emitted.diagnostics);
        artifacts.push(Artifact {
            path: PathBuf::from("docker-compose.yml"),
            content: emitted.content,
        });
    }

    if options.include_config {
        match options.proxy_type {
            ProxyType::Traefik => {
                let emitted = emit_traefik(config, options.dialect, DataFormat::Yaml)
                    .map_err(|source| ConvertError::Emit { source })?;
                diagnostics.extend(emitted.diagnostics);
                artifacts.push(Artifact {
                    path: PathBuf::from("traefik/dynamic.yml"),
                    content: emitted.content,
                });
            }
            ProxyType::Nginx => {
                let emitted =
                    emit_nginx(config).map_err(|source| ConvertError::Emit { source })?;
                diagnostics.extend(emitted.diagnostics);
                artifacts.push(Artifact {
                    path: PathBuf::from("nginx.conf"),
                    content: emitted.content,
                });
            }
        }
    }

    if options.include_docs {
        artifacts.push(Artifact {
            path: PathBuf::from("README.md"),
            content: readme_content(config, options.proxy_type),
        });
    }

    Ok((artifacts, diagnostics))
}

/// 라우팅 개요를 담은 README
fn readme_content(config: &Config, proxy_type: ProxyType) -> String {
    use std::fmt::Write as _;
    use crate::rule::print_rule;

    let mut out = String::new();
    let _ = writeln!(out, "# {} proxy setup", proxy_type);
    out.push('\n');
    let _ = writeln!(
        out,
        "{}개 라우터, {}개 서비스, {}개 미들웨어.",
        config.routers.len(),
        config.services.len(),
        config.middlewares.len()
    );
    out.push('\n');

    if !config.routers.is_empty() {
        out.push_str("| 라우터 | 규칙 | 서비스 | TLS |\n");
        out.push_str("|--------|------|--------|-----|\n");
        for router in config.routers.values() {
            let rule = router
                .rule
                .as_ref()
                .map(|rule| print_rule(rule, Dialect::V3))
                .unwrap_or_else(|| "-".to_string());
            let _ = writeln!(
                out,
                "| {} | `{}` | {} | {} |",
                router.id,
                rule,
                router.service,
                if router.tls.is_some() { "예" } else { "아니오" }
            );
        }
        out.push('\n');
    }

    match proxy_type {
        ProxyType::Traefik => {
            out.push_str("설정 파일: `traefik/dynamic.yml` (파일 공급자로 마운트)\n");
        }
        ProxyType::Nginx => {
            out.push_str("설정 파일: `nginx.conf` (`/etc/nginx/conf.d/`에 배치)\n");
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Protocol, Router, Server, Service};
    use crate::rule::parse_rule;

    fn sample_config() -> Config {
        let mut config = Config::new();
        let mut service = Service::new("web", Protocol::Http);
        service.pool.servers.push(Server::url("http://web:8080"));
        config.insert_service(service);

        let mut router = Router::new("r", Protocol::Http, "web");
        router.rule = Some(parse_rule("Host(`x`)", Dialect::V3).unwrap());
        config.insert_router(router);
        config
    }

    #[test]
    fn test_scaffold_all_artifacts() {
        let options = ScaffoldOptions {
            proxy_type: ProxyType::Nginx,
            include_compose: true,
            include_config: true,
            include_docs: true,
            dialect: Dialect::V3,
        };
        let (artifacts, _) = scaffold(&sample_config(), &options).unwrap();

        let paths: Vec<&str> = artifacts
            .iter()
            .map(|artifact| artifact.path.to_str().unwrap())
            .collect();
        assert_eq!(paths, vec!["docker-compose.yml", "nginx.conf", "README.md"]);

        let readme = &artifacts[2].content;
        assert!(readme.contains("| r | `Host(`x`)` | web | 아니오 |"));
    }

    #[test]
    fn test_scaffold_traefik_config_path() {
        let options = ScaffoldOptions {
            include_compose: false,
            include_docs: false,
            ..Default::default()
        };
        let (artifacts, _) = scaffold(&sample_config(), &options).unwrap();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].path, PathBuf::from("traefik/dynamic.yml"));
        assert!(artifacts[0].content.contains("Host(`x`)"));
    }
}
