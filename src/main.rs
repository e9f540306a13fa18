use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use collatz_scan::*;
use num_bigint::BigUint;
use std::fs::File;
use std::io::{BufRead, BufWriter, Write as IoWrite};
use std::num::NonZeroU64;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "collatz-scan", version, about = "コラッツ (3n+1) 軌道の追跡と範囲走査")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 1つの数の軌道を 1 まで追跡
    Single {
        number: String,
        /// 入力の基数 (2, 10, 16, 36)
        #[arg(long, default_value_t = 10, value_parser = parse_base)]
        base: u32,
        /// 何ステップごとに進捗を出すか
        #[arg(long, default_value_t = NonZeroU64::new(100).unwrap_or(NonZeroU64::MIN))]
        every: NonZeroU64,
        /// 保持する石の数の上限
        #[arg(long)]
        max_history: Option<usize>,
        /// 軌道を output/ に CSV で保存
        #[arg(long)]
        save: bool,
    },
    /// [lower, upper) の全ての数を並行に走査
    Range {
        lower: String,
        upper: String,
        #[arg(long, default_value_t = 10, value_parser = parse_base)]
        base: u32,
        /// ワーカー数（省略時は論理CPU数）
        #[arg(long)]
        workers: Option<usize>,
        /// 何件完了ごとに集計を出すか
        #[arg(long, default_value_t = NonZeroU64::new(1000).unwrap_or(NonZeroU64::MIN))]
        cadence: NonZeroU64,
        /// 標準入力の p / r / s / q で 一時停止 / 再開 / 1件送り / 中止
        #[arg(long)]
        interactive: bool,
        /// 数ごとのステップ数を output/ に CSV で保存
        #[arg(long)]
        save: bool,
    },
}

fn parse_base(s: &str) -> Result<u32, String> {
    match s.parse::<u32>() {
        Ok(b @ (2 | 10 | 16 | 36)) => Ok(b),
        _ => Err(format!("基数は 2, 10, 16, 36 のいずれか: {s}")),
    }
}

/// 空白を除いて指定基数で解析する。検証はここで済ませ、コアには正しい値だけを渡す。
fn parse_number(s: &str, base: u32) -> Result<BigUint> {
    let cleaned: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    match BigUint::parse_bytes(cleaned.as_bytes(), base) {
        Some(n) => Ok(n),
        None => bail!("{s} は {base} 進数として解析できません"),
    }
}

fn output_dir() -> Result<PathBuf> {
    let dir = PathBuf::from("output");
    std::fs::create_dir_all(&dir).context("output/ を作成できません")?;
    Ok(dir)
}

fn timestamp() -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format_timestamp(now)
}

/// UNIX 秒を UTC の YYYYMMDD_HHMMSS にする
fn format_timestamp(secs: u64) -> String {
    let (y, mo, d) = civil_from_days(secs / 86400);
    let s = secs % 60;
    let m = (secs / 60) % 60;
    let h = (secs / 3600) % 24;
    format!("{:04}{:02}{:02}_{:02}{:02}{:02}", y, mo, d, h, m, s)
}

/// 1970-01-01 からの日数をグレゴリオ暦の (年, 月, 日) にする。
/// 400 年周期 (146097 日) で割ってから、3 月始まりの年の中で月日を求める。
fn civil_from_days(days: u64) -> (u64, u64, u64) {
    let z = days + 719_468;
    let era = z / 146_097;
    let doe = z % 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = yoe + era * 400 + u64::from(m <= 2);
    (y, m, d)
}

fn short_n(n: &BigUint) -> String {
    let s = n.to_string();
    if s.len() <= 16 {
        s
    } else {
        format!("{}..{}d", &s[..6], s.len())
    }
}

fn format_big(n: &BigUint) -> String {
    format_digits(&n.to_string())
}

fn format_digits(s: &str) -> String {
    if s.len() <= 50 {
        s.to_string()
    } else {
        format!("{}...{} ({}桁)", &s[..20], &s[s.len() - 20..], s.len())
    }
}

fn format_number(n: &Option<BigUint>) -> String {
    n.as_ref().map(format_big).unwrap_or_else(|| "-".to_string())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Single {
            number,
            base,
            every,
            max_history,
            save,
        } => {
            let n = parse_number(&number, base)?;
            let config = StreamConfig {
                report_frequency: every,
                max_history,
            };
            cmd_single(n, &config, save)
        }
        Command::Range {
            lower,
            upper,
            base,
            workers,
            cadence,
            interactive,
            save,
        } => {
            let lower = parse_number(&lower, base)?;
            let upper = parse_number(&upper, base)?;
            let mut config = ScanConfig {
                aggregate_cadence: cadence,
                record_lengths: save,
                ..ScanConfig::default()
            };
            if let Some(workers) = workers {
                config.pool_size = workers;
            }
            cmd_range(lower, upper, &config, interactive, save)
        }
    }
}

fn cmd_single(n: BigUint, config: &StreamConfig, save: bool) -> Result<()> {
    println!("軌道追跡: n={}", format_big(&n));
    println!("({} ステップごとに進捗)", config.report_frequency);
    println!();

    let timer = Instant::now();
    let run = start_single(n.clone(), config)?;
    let mut last: Option<ProgressReport> = None;
    for report in run.reports().iter() {
        eprint!(
            "\x1b[2K\r  [{:.1}s] step {} | 最大 ~{:.3e}",
            timer.elapsed().as_secs_f64(),
            report.steps,
            report.max_stone_approx
        );
        last = Some(report);
    }
    eprintln!();
    let outcome = run.wait()?;
    let elapsed = timer.elapsed();
    let Some(report) = last else {
        bail!("レポートが1件も届きませんでした");
    };

    let show_limit = 50;
    println!("  {:>6}  {:>50}  向き", "step", "stone");
    for (i, (digits, up)) in report.digits.iter().zip(report.upward.iter()).enumerate() {
        if i < show_limit || i >= report.len().saturating_sub(5) {
            let arrow = if i == 0 { "" } else if *up { "↑" } else { "↓" };
            println!("  {:>6}  {:>50}  {}", i, format_digits(digits), arrow);
        } else if i == show_limit {
            println!("  ... ({} ステップ省略) ...", report.len().saturating_sub(show_limit + 5));
        }
    }

    println!();
    println!("--- 統計 ---");
    println!("総ステップ数  = {}", outcome.steps);
    println!("上昇 (3n+1)   = {} ({:.2}%)", outcome.up_moves, report.up_percentage());
    println!("下降 (÷2)     = {}", outcome.down_moves);
    println!("最大の石      = {}", format_big(&outcome.max_stone));
    println!("1に到達       = {}", if outcome.reached_one { "はい" } else { "いいえ" });
    println!("計算時間      = {:?}", elapsed);

    if save {
        let filename = format!("single_{}_{}.csv", short_n(&n), timestamp());
        let path = output_dir()?.join(&filename);
        let mut w = BufWriter::new(File::create(&path).with_context(|| format!("{} を作成できません", path.display()))?);
        writeln!(w, "step,stone,scaled,upward")?;
        for i in 0..report.len() {
            writeln!(w, "{},{},{},{}", i, report.digits[i], report.scaled[i], report.upward[i])?;
        }
        w.flush()?;
        println!("\n軌道CSV保存: {}", path.display());
    }
    Ok(())
}

/// 標準入力の1行を制御信号に読み替える。入力が終わったら抜ける。
/// 標準入力の p/r/s/q を制御信号にする。
/// 一時停止中に入力が閉じたら、それ以上再開できないので Stop を送って抜ける。
fn spawn_stdin_control(control: ControlHandle) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut paused = false;
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let signal = match line.trim() {
                "p" => ControlSignal::Pause,
                "r" => ControlSignal::Resume,
                "s" => ControlSignal::Step,
                "q" => ControlSignal::Stop,
                other => {
                    eprintln!("\n不明な入力: {other} (p/r/s/q)");
                    continue;
                }
            };
            if !control.send(signal) {
                return;
            }
            paused = matches!(signal, ControlSignal::Pause | ControlSignal::Step);
        }
        if paused {
            control.stop();
        }
    });
}

fn cmd_range(lower: BigUint, upper: BigUint, config: &ScanConfig, interactive: bool, save: bool) -> Result<()> {
    println!("範囲走査: [{}, {})", format_big(&lower), format_big(&upper));
    println!("({} ワーカー、{} 件ごとに集計)", config.pool_size, config.aggregate_cadence);
    if interactive {
        println!("p=一時停止 r=再開 s=1件送り q=中止");
    }
    println!();

    let timer = Instant::now();
    let scan = start_range(lower.clone(), upper.clone(), config)?;
    if interactive {
        spawn_stdin_control(scan.control());
    }

    for snapshot in scan.snapshots().iter() {
        let elapsed = timer.elapsed().as_secs_f64();
        let nps = snapshot.completed as f64 / elapsed.max(f64::EPSILON);
        eprint!(
            "\x1b[2K\r  [{:.1}s] {}/{} ({:.1}%) | {:.0} nums/s | 最長 {} ステップ",
            elapsed,
            snapshot.completed,
            snapshot.planned,
            snapshot.progress() * 100.0,
            nps,
            snapshot.high_water.max_steps
        );
    }
    eprintln!();
    let outcome = scan.wait()?;
    let elapsed = timer.elapsed();
    let hw = &outcome.high_water;

    println!();
    println!("--- 結果 ---");
    println!("処理した数        = {} / {}", outcome.completed, outcome.planned);
    println!("中止              = {}", if outcome.stopped { "はい" } else { "いいえ" });
    println!("最長ステップ数    = {} (n={})", hw.max_steps, format_number(&hw.max_steps_number));
    println!("最大の石          = {} (n={})", format_big(&hw.max_stone), format_number(&hw.max_stone_number));
    println!("計算時間          = {:?}", elapsed);

    if save {
        let filename = format!("range_{}-{}_{}.csv", short_n(&lower), short_n(&upper), timestamp());
        let path = output_dir()?.join(&filename);
        let mut w = BufWriter::new(File::create(&path).with_context(|| format!("{} を作成できません", path.display()))?);
        writeln!(w, "number,steps")?;
        for point in &outcome.lengths {
            writeln!(w, "{},{}", point.number, point.steps)?;
        }
        w.flush()?;
        println!("\n系列長CSV保存: {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp_leap_years() {
        assert_eq!(format_timestamp(0), "19700101_000000");
        assert_eq!(format_timestamp(951_782_400), "20000229_000000");
        assert_eq!(format_timestamp(1_709_251_199), "20240229_235959");
        assert_eq!(format_timestamp(4_102_444_800), "21000101_000000");
    }
}
