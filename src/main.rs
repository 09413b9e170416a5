use clap::{Arg, ArgAction, Command};
use serde::Serialize;
use std::path::PathBuf;

use defgame::logging::{init_logging, level_for_verbosity, parse_log_level, LogConfig, LogOutput};
use defgame::models::{ControlState, WorldState};
use defgame::scenario::{presets, ScenarioConfig};
use defgame::simulation::{SimulationResult, StepSnapshot};

/// 出力形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Yaml,
}

/// 実行中に観測した状態遷移
#[derive(Debug, Serialize)]
struct TransitionRecord {
    elapsed: f64,
    defender: String,
    from: ControlState,
    to: ControlState,
}

/// `--output yaml` で出力する実行レポート
#[derive(Debug, Serialize)]
struct RunReport {
    scenario: String,
    intruder_policy: String,
    result: SimulationResult,
    steps: u64,
    final_world: WorldState,
    final_states: Vec<ControlState>,
    transitions: Vec<TransitionRecord>,
}

fn main() {
    // コマンドライン引数の解析
    let matches = Command::new("defgame")
        .version(env!("CARGO_PKG_VERSION"))
        .about("防衛ゲームシミュレータ (Apollonian-circle defense game)")
        .long_about(
            "支配円（アポロニウスの円）に基づく追跡・回避ゲームのシミュレータ\n\
             高速な侵入者が保護区域を目指し、低速な防衛側が協調して迎撃します。",
        )
        .arg(
            Arg::new("scenario")
                .short('s')
                .long("scenario")
                .value_name("FILE")
                .help("シナリオファイル(.yaml)のパスを指定")
                .conflicts_with("preset"),
        )
        .arg(
            Arg::new("preset")
                .short('p')
                .long("preset")
                .value_name("NAME")
                .help("組み込みプリセットを実行 (--list で一覧表示)"),
        )
        .arg(
            Arg::new("list")
                .short('l')
                .long("list")
                .action(ArgAction::SetTrue)
                .help("組み込みプリセットの一覧を表示して終了"),
        )
        .arg(
            Arg::new("info")
                .short('i')
                .long("info")
                .action(ArgAction::SetTrue)
                .help("シナリオの情報のみ表示して終了"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FORMAT")
                .value_parser(["text", "yaml"])
                .default_value("text")
                .help("結果の出力形式"),
        )
        .arg(
            Arg::new("log-output")
                .long("log-output")
                .value_name("TARGET")
                .default_value("console")
                .help("ログ出力先 (console, file, both)"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("ログレベル (trace, debug, info, warn, error)。未指定時は -v の数から決定"),
        )
        .arg(
            Arg::new("log-dir")
                .long("log-dir")
                .value_name("DIR")
                .default_value("logs")
                .help("ログファイルの出力ディレクトリ"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .help("詳細出力レベル (-v: 基本, -vv: 詳細, -vvv: デバッグ)"),
        )
        .get_matches();

    if matches.get_flag("list") {
        show_presets();
        return;
    }

    let verbose_level = matches.get_count("verbose");
    let output = match matches.get_one::<String>("output").map(String::as_str) {
        Some("yaml") => OutputFormat::Yaml,
        _ => OutputFormat::Text,
    };

    let log_output = match matches
        .get_one::<String>("log-output")
        .map(|s| s.parse::<LogOutput>())
        .unwrap_or(Ok(LogOutput::Console))
    {
        Ok(log_output) => log_output,
        Err(e) => {
            eprintln!("エラー: {}", e);
            std::process::exit(1);
        }
    };

    let log_config = LogConfig {
        level: matches
            .get_one::<String>("log-level")
            .map(|level| parse_log_level(level))
            .unwrap_or_else(|| level_for_verbosity(verbose_level)),
        output: log_output,
        log_dir: matches
            .get_one::<String>("log-dir")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("logs")),
        ..LogConfig::default()
    };

    // ガードはプロセス終了まで保持
    let _log_guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("エラー: ログ初期化に失敗しました: {}", e);
            std::process::exit(1);
        }
    };

    let scenario = if let Some(path) = matches.get_one::<String>("scenario") {
        ScenarioConfig::from_file(path)
    } else if let Some(name) = matches.get_one::<String>("preset") {
        presets::preset(name)
    } else {
        show_default_help();
        return;
    };

    let result = scenario.map_err(Box::<dyn std::error::Error>::from).and_then(|scenario| {
        if matches.get_flag("info") {
            scenario.print_summary();
            Ok(())
        } else {
            execute_scenario(&scenario, output, verbose_level)
        }
    });

    if let Err(e) = result {
        eprintln!("エラー: {}", e);
        std::process::exit(1);
    }
}

/// シナリオの実行
fn execute_scenario(
    scenario: &ScenarioConfig,
    output: OutputFormat,
    verbose_level: u8,
) -> Result<(), Box<dyn std::error::Error>> {
    if output == OutputFormat::Text {
        println!("防衛ゲームシミュレータ - defgame v{}", env!("CARGO_PKG_VERSION"));
        println!();
        scenario.print_summary();
        println!();
    }

    let mut engine = scenario.build_engine(verbose_level)?;
    let defender_ids: Vec<String> = scenario.defenders.iter().map(|d| d.id.clone()).collect();
    let mut transitions = Vec::new();

    let result = engine.run(|snapshot: &StepSnapshot| {
        for transition in &snapshot.transitions {
            let record = TransitionRecord {
                elapsed: snapshot.state.elapsed,
                defender: defender_ids[transition.defender].clone(),
                from: transition.from,
                to: transition.to,
            };
            if output == OutputFormat::Text && verbose_level > 0 {
                println!(
                    "[{:>6.2}s] {}: {:?} -> {:?}",
                    record.elapsed, record.defender, record.from, record.to
                );
            }
            transitions.push(record);
        }
    });

    match output {
        OutputFormat::Text => print_result(&result, engine.state.step, &engine.state.states, &defender_ids),
        OutputFormat::Yaml => {
            let report = RunReport {
                scenario: scenario.meta.name.clone(),
                intruder_policy: engine.policy_name().to_string(),
                result,
                steps: engine.state.step,
                final_world: engine.state.world.clone(),
                final_states: engine.state.states.clone(),
                transitions,
            };
            print!("{}", serde_yaml::to_string(&report)?);
        }
    }

    Ok(())
}

fn print_result(result: &SimulationResult, steps: u64, states: &[ControlState], defender_ids: &[String]) {
    println!("=== シミュレーション結果 ===");
    println!("勝者: {}", result.winner);
    println!("理由: {}", result.reason);
    println!("経過時間: {:.2}秒 ({}ステップ)", result.time_elapsed, steps);
    println!("最終距離: {:.3}m", result.final_distance);
    println!();
    println!("=== 防衛側の最終状態 ===");
    for (id, state) in defender_ids.iter().zip(states) {
        println!("  {}: {:?}", id, state);
    }
}

fn show_presets() {
    println!("利用可能なプリセット:");
    for name in presets::preset_names() {
        match presets::preset(name) {
            Ok(scenario) => println!("  {:<24} - {}", name, scenario.meta.description),
            Err(e) => println!("  {:<24} - (エラー: {})", name, e),
        }
    }
}

/// デフォルトヘルプを表示
fn show_default_help() {
    println!("使用方法:");
    println!("  defgame [オプション]");
    println!();
    println!("オプション:");
    println!("  -s, --scenario <FILE>    シナリオファイルを指定して実行");
    println!("  -p, --preset <NAME>      組み込みプリセットを実行");
    println!("  -l, --list               プリセット一覧を表示");
    println!("  -i, --info               シナリオ情報のみ表示");
    println!("  -o, --output <FORMAT>    結果の出力形式 (text, yaml)");
    println!("      --log-output <TARGET> ログ出力先 (console, file, both)");
    println!("      --log-level <LEVEL>  ログレベル");
    println!("  -v, --verbose            詳細出力 (複数指定で詳細レベル上昇)");
    println!("  -h, --help               このヘルプを表示");
    println!();
    println!("例:");
    println!("  defgame -s scenarios/baseline.yaml");
    println!("  defgame -s scenarios/direct_rush.yaml -v");
    println!("  defgame -p intercept_success -o yaml");
    println!("  defgame -p actual_stalemate --log-output both -vv");
}
