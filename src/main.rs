use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use proxy_config_bridge::analyze::analyze;
use proxy_config_bridge::convert::{convert, ConvertError, ConvertOptions};
use proxy_config_bridge::detect::Format;
use proxy_config_bridge::logging::{init_logging, ConversionLog};
use proxy_config_bridge::model::Severity;
use proxy_config_bridge::rule::Dialect;
use proxy_config_bridge::scaffold::{scaffold, ProxyType, ScaffoldOptions};
use proxy_config_bridge::validator::validate;

// 종료 코드: 0 성공, 1 검증 에러, 2 파싱 에러, 3 입출력 에러, 4 지원되지 않는 변환
const EXIT_VALIDATION: u8 = 1;
const EXIT_PARSE: u8 = 2;
const EXIT_IO: u8 = 3;
const EXIT_UNSUPPORTED: u8 = 4;

#[derive(Parser, Debug)]
#[command(version, about = "nginx / Traefik / Docker Compose 설정 변환기")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// 상세 로그 출력
    #[arg(short, long, global = true)]
    verbose: bool,

    /// 에러 외의 출력 억제
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    DockerCompose,
    TraefikDynamic,
    NginxConf,
    Json,
    Yaml,
}

impl From<FormatArg> for Format {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::DockerCompose => Format::DockerCompose,
            FormatArg::TraefikDynamic => Format::TraefikDynamic,
            FormatArg::NginxConf => Format::NginxConf,
            FormatArg::Json => Format::Json,
            FormatArg::Yaml => Format::Yaml,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DialectArg {
    V2,
    V3,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::V2 => Dialect::V2,
            DialectArg::V3 => Dialect::V3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProxyTypeArg {
    Traefik,
    Nginx,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 설정 파일을 다른 형식으로 변환
    Convert {
        input: PathBuf,
        output: PathBuf,

        /// 입력 형식 (지정하지 않으면 자동 탐지)
        #[arg(short, long, value_enum)]
        input_format: Option<FormatArg>,

        /// 출력 형식 (지정하지 않으면 출력 파일 확장자에서 추론)
        #[arg(short, long, value_enum)]
        output_format: Option<FormatArg>,

        /// 방출 전 검증 실행 (기본값)
        #[arg(long, overrides_with = "no_validate")]
        validate: bool,

        /// 검증 건너뛰기
        #[arg(long)]
        no_validate: bool,

        /// 파일을 쓰지 않고 결과 미리보기
        #[arg(long)]
        dry_run: bool,

        /// 기존 출력 파일 덮어쓰기
        #[arg(long)]
        force: bool,

        /// 규칙 출력 방언
        #[arg(long, value_enum, default_value_t = DialectArg::V3)]
        dialect: DialectArg,

        /// 입력 규칙의 방언 (지정하지 않으면 출력 방언과 동일)
        #[arg(long, value_enum)]
        input_dialect: Option<DialectArg>,
    },

    /// 설정을 수집·검증하고 요약을 출력
    Analyze {
        file: PathBuf,

        #[arg(short, long, value_enum)]
        format: Option<FormatArg>,

        /// 진단 전체를 함께 출력
        #[arg(short, long)]
        detailed: bool,
    },

    /// 프록시 구성 일괄 생성 (compose + 설정 + 문서)
    Scaffold {
        input: PathBuf,

        #[arg(short, long, default_value = "./proxy-setup")]
        output_dir: PathBuf,

        #[arg(short, long, value_enum, default_value_t = ProxyTypeArg::Traefik)]
        proxy_type: ProxyTypeArg,

        #[arg(long)]
        include_compose: bool,

        #[arg(long)]
        include_config: bool,

        #[arg(long)]
        include_docs: bool,

        /// 모든 구성 요소 포함
        #[arg(long)]
        include_all: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Command::Convert {
            input,
            output,
            input_format,
            output_format,
            validate: _,
            no_validate,
            dry_run,
            force,
            dialect,
            input_dialect,
        } => run_convert(
            &input,
            &output,
            input_format,
            output_format,
            !no_validate,
            dry_run,
            force,
            dialect,
            input_dialect,
        ),
        Command::Analyze {
            file,
            format,
            detailed,
        } => run_analyze(&file, format, detailed),
        Command::Scaffold {
            input,
            output_dir,
            proxy_type,
            include_compose,
            include_config,
            include_docs,
            include_all,
        } => run_scaffold(
            &input,
            &output_dir,
            proxy_type,
            include_compose || include_all,
            include_config || include_all,
            include_docs || include_all,
        ),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_convert(
    input: &PathBuf,
    output: &PathBuf,
    input_format: Option<FormatArg>,
    output_format: Option<FormatArg>,
    run_validation: bool,
    dry_run: bool,
    force: bool,
    dialect: DialectArg,
    input_dialect: Option<DialectArg>,
) -> ExitCode {
    let output_format = match output_format
        .map(Format::from)
        .or_else(|| output_format_from_path(output))
    {
        Some(format) => format,
        None => {
            eprintln!(
                "출력 형식을 추론할 수 없습니다: {}. --output-format을 지정하세요",
                output.display()
            );
            return ExitCode::from(EXIT_UNSUPPORTED);
        }
    };

    let mut log = ConversionLog::new(input.display().to_string(), output_format.as_str());

    let bytes = match fs::read(input) {
        Ok(bytes) => bytes,
        Err(error) => {
            log.with_error(&error);
            eprintln!("입력 파일을 읽을 수 없음: {}: {}", input.display(), error);
            return ExitCode::from(EXIT_IO);
        }
    };

    let options = ConvertOptions {
        input_format: input_format.map(Format::from),
        output_format,
        dialect: dialect.into(),
        input_dialect: input_dialect.map(Dialect::from),
        validate: run_validation,
        lenient: false,
        input_name: input.file_name().and_then(|name| name.to_str()).map(str::to_string),
    };

    let conversion = match convert(&bytes, &options) {
        Ok(conversion) => conversion,
        Err(error) => {
            log.with_error(&error);
            eprintln!("{}", error);
            if let ConvertError::Validation { config } = &error {
                print_diagnostics(&config.diagnostics);
            }
            return ExitCode::from(exit_code_for(&error));
        }
    };

    log.input_format = Some(conversion.input_format.as_str().to_string());
    log.with_config(&conversion.config);

    print_diagnostics(&conversion.config.diagnostics);

    let content = conversion.output.unwrap_or_default();

    if dry_run {
        print!("{}", content);
        log.finish();
        return ExitCode::SUCCESS;
    }

    if output.exists() && !force {
        eprintln!(
            "출력 파일이 이미 있습니다: {}. --force로 덮어쓰세요",
            output.display()
        );
        return ExitCode::from(EXIT_IO);
    }

    if let Err(error) = fs::write(output, &content) {
        log.with_error(&error);
        eprintln!("출력 파일을 쓸 수 없음: {}: {}", output.display(), error);
        return ExitCode::from(EXIT_IO);
    }

    info!(output = %output.display(), "출력 파일 작성됨");
    log.finish();
    ExitCode::SUCCESS
}

fn run_analyze(file: &PathBuf, format: Option<FormatArg>, detailed: bool) -> ExitCode {
    let bytes = match fs::read(file) {
        Ok(bytes) => bytes,
        Err(error) => {
            eprintln!("파일을 읽을 수 없음: {}: {}", file.display(), error);
            return ExitCode::from(EXIT_IO);
        }
    };

    let options = ConvertOptions {
        input_format: format.map(Format::from),
        input_name: file.file_name().and_then(|name| name.to_str()).map(str::to_string),
        ..Default::default()
    };

    let analysis = match analyze(&bytes, &options) {
        Ok(analysis) => analysis,
        Err(error) => {
            eprintln!("{}", error);
            return ExitCode::from(exit_code_for(&error));
        }
    };

    println!("{}", analysis);

    if detailed {
        print_diagnostics(&analysis.config.diagnostics);
    }

    if analysis.error_count > 0 {
        ExitCode::from(EXIT_VALIDATION)
    } else {
        ExitCode::SUCCESS
    }
}

fn run_scaffold(
    input: &PathBuf,
    output_dir: &PathBuf,
    proxy_type: ProxyTypeArg,
    include_compose: bool,
    include_config: bool,
    include_docs: bool,
) -> ExitCode {
    if !(include_compose || include_config || include_docs) {
        eprintln!("포함할 구성 요소를 하나 이상 지정하세요 (--include-all 등)");
        return ExitCode::from(EXIT_UNSUPPORTED);
    }

    let bytes = match fs::read(input) {
        Ok(bytes) => bytes,
        Err(error) => {
            eprintln!("입력 파일을 읽을 수 없음: {}: {}", input.display(), error);
            return ExitCode::from(EXIT_IO);
        }
    };

    let options = ConvertOptions {
        input_name: input.file_name().and_then(|name| name.to_str()).map(str::to_string),
        ..Default::default()
    };

    let (mut config, _) = match proxy_config_bridge::convert::ingest_only(&bytes, &options) {
        Ok(result) => result,
        Err(error) => {
            eprintln!("{}", error);
            return ExitCode::from(exit_code_for(&error));
        }
    };
    validate(&mut config);

    if config.has_errors() {
        print_diagnostics(&config.diagnostics);
        return ExitCode::from(EXIT_VALIDATION);
    }

    let scaffold_options = ScaffoldOptions {
        proxy_type: match proxy_type {
            ProxyTypeArg::Traefik => ProxyType::Traefik,
            ProxyTypeArg::Nginx => ProxyType::Nginx,
        },
        include_compose,
        include_config,
        include_docs,
        dialect: Dialect::V3,
    };

    let (artifacts, diagnostics) = match scaffold(&config, &scaffold_options) {
        Ok(result) => result,
        Err(error) => {
            eprintln!("{}", error);
            return ExitCode::from(exit_code_for(&error));
        }
    };
    print_diagnostics(&diagnostics);

    for artifact in &artifacts {
        let path = output_dir.join(&artifact.path);
        if let Some(parent) = path.parent() {
            if let Err(error) = fs::create_dir_all(parent) {
                eprintln!("디렉터리를 만들 수 없음: {}: {}", parent.display(), error);
                return ExitCode::from(EXIT_IO);
            }
        }
        if let Err(error) = fs::write(&path, &artifact.content) {
            eprintln!("파일을 쓸 수 없음: {}: {}", path.display(), error);
            return ExitCode::from(EXIT_IO);
        }
        println!("생성됨: {}", path.display());
    }

    ExitCode::SUCCESS
}

/// 출력 파일 이름에서 형식을 추론합니다.
/// `*compose*.yml`은 docker-compose, 그 외 YAML은 traefik-dynamic.
fn output_format_from_path(path: &std::path::Path) -> Option<Format> {
    let name = path.file_name()?.to_str()?.to_ascii_lowercase();
    let extension = path.extension()?.to_str()?;
    match extension {
        "conf" => Some(Format::NginxConf),
        "json" => Some(Format::Json),
        "yml" | "yaml" => {
            if name.contains("compose") {
                Some(Format::DockerCompose)
            } else {
                Some(Format::TraefikDynamic)
            }
        }
        _ => None,
    }
}

fn exit_code_for(error: &ConvertError) -> u8 {
    match error {
        ConvertError::Validation { .. } => EXIT_VALIDATION,
        ConvertError::Detect { .. } => EXIT_PARSE,
        // 모든 수집 에러는 구문 계열
        ConvertError::Ingest { .. } => EXIT_PARSE,
        ConvertError::Emit { .. } => EXIT_IO,
        ConvertError::UnsupportedConversion { .. } => EXIT_UNSUPPORTED,
    }
}

fn print_diagnostics(diagnostics: &[proxy_config_bridge::model::Diagnostic]) {
    for diagnostic in diagnostics {
        match diagnostic.severity {
            Severity::Error => eprintln!("{}", diagnostic),
            Severity::Warning => warn!("{}", diagnostic),
            Severity::Info => info!("{}", diagnostic),
        }
    }
}
