use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

/// 로깅 초기화. RUST_LOG 환경 변수가 있으면 그 설정을 우선합니다.
pub fn init_logging(verbose: bool, quiet: bool) {
    let default_level = if quiet {
        Level::ERROR
    } else if verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(default_level.into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// 변환 한 건의 기록입니다. CLI가 단계별로 채워 넣습니다.
#[derive(Debug)]
pub struct ConversionLog {
    pub input: String,
    pub input_format: Option<String>,
    pub output_format: String,
    pub router_count: usize,
    pub service_count: usize,
    pub middleware_count: usize,
    pub error: Option<String>,
}

impl ConversionLog {
    pub fn new(input: impl Into<String>, output_format: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            input_format: None,
            output_format: output_format.into(),
            router_count: 0,
            service_count: 0,
            middleware_count: 0,
            error: None,
        }
    }

    pub fn with_config(&mut self, config: &crate::model::Config) {
        self.router_count = config.routers.len();
        self.service_count = config.services.len();
        self.middleware_count = config.middlewares.len();
    }

    pub fn with_error(&mut self, error: impl std::fmt::Display) {
        let message = error.to_string();
        error!(
            input = %self.input,
            error = %message,
            "변환 실패"
        );
        self.error = Some(message);
    }

    pub fn finish(&self) {
        if self.error.is_some() {
            return;
        }
        info!(
            input = %self.input,
            input_format = ?self.input_format,
            output_format = %self.output_format,
            routers = %self.router_count,
            services = %self.service_count,
            middlewares = %self.middleware_count,
            "변환 성공"
        );
    }
}
