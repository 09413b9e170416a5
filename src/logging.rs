//! # Logging モジュール
//!
//! 防衛ゲームシミュレータのログ管理機能を提供します。
//!
//! コンソールには人間向けのコンパクト形式、ファイルにはtracing-appenderの
//! 非同期ライターでJSON形式の構造化ログを出力します。状態遷移や終了判定などの
//! イベントは `DEFENDER_STATE_TRANSITION` のようなイベント名付きで記録されます。
//!
//! ## 設定可能な出力先
//!
//! - `Console`: 標準エラー出力のみ（標準出力は結果表示に使用）
//! - `File`: ファイルのみ（logs/defgame.YYYY-MM-DD）
//! - `Both`: コンソールとファイルの両方

use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::Level;
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// ログ出力先の設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Console,
    File,
    Both,
}

impl LogOutput {
    pub fn writes_console(&self) -> bool {
        matches!(self, LogOutput::Console | LogOutput::Both)
    }

    pub fn writes_file(&self) -> bool {
        matches!(self, LogOutput::File | LogOutput::Both)
    }
}

impl FromStr for LogOutput {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "console" | "stderr" => Ok(LogOutput::Console),
            "file" => Ok(LogOutput::File),
            "both" | "all" => Ok(LogOutput::Both),
            _ => Err(format!("無効な出力先: {}. 利用可能: console, file, both", s)),
        }
    }
}

/// ログ設定構造体
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub output: LogOutput,
    /// ログファイルのディレクトリ（File または Both の場合）
    pub log_dir: PathBuf,
    pub file_prefix: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            output: LogOutput::Console,
            log_dir: PathBuf::from("logs"),
            file_prefix: "defgame".to_string(),
        }
    }
}

/// ログシステムを初期化
///
/// `RUST_LOG` が設定されていればそちらを優先します。
///
/// # 引数
///
/// * `config` - ログ設定
///
/// # 戻り値
///
/// ファイル出力を行う場合は非同期ライターのガード。呼び出し側はプロセス終了まで
/// 保持する必要があります（破棄するとバッファがフラッシュされ書き込みが止まります）。
///
/// # 例
///
/// ```no_run
/// use defgame::logging::{init_logging, LogConfig, LogOutput};
///
/// let config = LogConfig {
///     output: LogOutput::Both,
///     ..LogConfig::default()
/// };
///
/// let _guard = init_logging(&config)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.level.to_string()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = config.output.writes_console().then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .compact()
    });

    let (file_layer, guard) = if config.output.writes_file() {
        ensure_log_directory(&config.log_dir)?;
        let file_appender = rolling::daily(&config.log_dir, &config.file_prefix);
        let (writer, guard) = non_blocking(file_appender);
        let layer = fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .json();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    Registry::default()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

/// ログレベルを文字列から解析
///
/// 無効な文字列の場合は警告を表示してINFOを返します。
pub fn parse_log_level(level_str: &str) -> Level {
    Level::from_str(level_str).unwrap_or_else(|_| {
        eprintln!("警告: 無効なログレベル '{}'. INFOを使用します", level_str);
        Level::INFO
    })
}

/// `--log-level` 未指定時の詳細出力レベルに応じたログレベル
///
/// `-v` で進捗（info）、`-vv` でフォールバック（debug）、`-vvv` でステップ毎の状態（trace）が出力されます。
pub fn level_for_verbosity(verbose_level: u8) -> Level {
    match verbose_level {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// ログディレクトリが存在しない場合に作成
pub fn ensure_log_directory(log_dir: &Path) -> Result<(), std::io::Error> {
    std::fs::create_dir_all(log_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_output_from_str() {
        assert_eq!(LogOutput::from_str("Console"), Ok(LogOutput::Console));
        assert_eq!(LogOutput::from_str("file"), Ok(LogOutput::File));
        assert_eq!(LogOutput::from_str("all"), Ok(LogOutput::Both));
        assert!(LogOutput::from_str("syslog").is_err());
    }

    #[test]
    fn test_log_output_targets() {
        assert!(LogOutput::Both.writes_console() && LogOutput::Both.writes_file());
        assert!(!LogOutput::Console.writes_file());
        assert!(!LogOutput::File.writes_console());
    }

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("trace"), Level::TRACE);
        assert_eq!(parse_log_level("WARN"), Level::WARN);
        assert_eq!(parse_log_level("verbose"), Level::INFO);
    }

    #[test]
    fn test_level_follows_verbosity() {
        assert_eq!(level_for_verbosity(0), Level::WARN);
        assert_eq!(level_for_verbosity(1), Level::INFO);
        assert_eq!(level_for_verbosity(2), Level::DEBUG);
        assert_eq!(level_for_verbosity(3), Level::TRACE);
        assert_eq!(level_for_verbosity(7), Level::TRACE);
    }

    #[test]
    fn test_default_config_logs_to_console() {
        let config = LogConfig::default();

        assert_eq!(config.output, LogOutput::Console);
        assert_eq!(config.file_prefix, "defgame");
        assert_eq!(config.log_dir, PathBuf::from("logs"));
    }
}
