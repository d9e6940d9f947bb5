use anyhow::Context;
use chrono::Local;
use clap::Parser;
use defect_vision::{analyzer, auth, batch, cli, config, error, image, logging, persistence, report, scanner, session, store};
use defect_vision_common::{
    default_report_type, format_pass_rate, render_report, InspectionDraft, Metrics,
};
use batch::{BatchQueue, BatchRunner, FixedDelay, ItemStatus};
use cli::{Cli, Commands};
use config::Config;
use indicatif::{ProgressBar, ProgressStyle};
use session::{InspectionSession, Notice};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let config = Config::load().context("設定の読み込みに失敗")?;
    let provider = cli.provider.unwrap_or(config.provider);

    match cli.command {
        Commands::Analyze { image: image_path } => {
            println!("🔍 defect-vision - 外観検査\n");

            let analyzer = analyzer::build_analyzer(&config, provider)?;
            let (session, mut notices) = open_session(&config, config.history_limit).await?;

            println!("[1/2] 画像を読み込み中...");
            let data_url = image::encode_data_url(&image_path)?;

            println!("[2/2] AI解析中... ({})", provider.label());
            let analysis = analyzer.analyze(&data_url).await?;
            let inspection = session.add_inspection(InspectionDraft::from(&analysis));
            session.flush().await;

            println!("✔ 解析完了: {}\n", inspection.id);
            println!("  判定: {}", inspection.status.as_str());
            println!("  信頼度: {:.0}%", inspection.confidence);
            println!("  欠陥数: {}", inspection.defects_found);
            for defect in &inspection.defects {
                println!(
                    "  - {} [{}] {} ({:.0}%)",
                    defect.defect_type,
                    defect.severity.as_str(),
                    defect.location,
                    defect.confidence
                );
            }
            println!();
            print_metrics(&session.metrics());
            print_notices(&mut notices);
            session.shutdown();
        }

        Commands::Batch { folder, fresh } => {
            println!("📦 defect-vision - バッチ解析\n");

            println!("[1/2] 画像をスキャン中...");
            let images = scanner::scan_folder(&folder)?;
            if images.is_empty() {
                return Err(error::DefectVisionError::NoImagesFound(folder.display().to_string()).into());
            }
            println!("✔ {}枚の画像を検出\n", images.len());

            let analyzer = analyzer::build_analyzer(&config, provider)?;
            let limit = if fresh { 0 } else { config.history_limit };
            let (session, mut notices) = open_session(&config, limit).await?;
            let session = Arc::new(session);

            let queue = BatchQueue::new();
            let paths: Vec<_> = images.iter().map(|i| i.path.clone()).collect();
            queue.enqueue(&paths)?;

            println!("[2/2] AI解析中... ({})", provider.label());
            let pb = ProgressBar::new(queue.pending_count() as u64);
            pb.set_style(
                ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
                    .context("プログレスバーの書式が不正")?,
            );

            let runner = BatchRunner::new(
                analyzer,
                Arc::clone(&session),
                Box::new(FixedDelay(config.batch_delay())),
            );
            let summary = runner
                .run(&queue, |done, _total, item| {
                    pb.set_position(done as u64);
                    match item.status {
                        ItemStatus::Error => pb.println(format!(
                            "  ✗ {}: {}",
                            item.file_name,
                            item.error.as_deref().unwrap_or("Analysis failed")
                        )),
                        _ => pb.set_message(item.file_name.clone()),
                    }
                })
                .await;
            pb.finish_and_clear();
            session.flush().await;

            println!("✔ Analyzed {} images successfully.", summary.completed);
            if summary.failed > 0 {
                println!("  失敗: {}件", summary.failed);
            }
            println!();
            print_metrics(&session.metrics());
            print_notices(&mut notices);
            session.shutdown();
        }

        Commands::Report { report_type, title, output } => {
            println!("📄 defect-vision - レポート生成\n");

            let (session, _notices) = open_session(&config, config.history_limit).await?;
            let inspections = session.inspections();
            session.shutdown();

            let report_type = report_type.unwrap_or_else(|| default_report_type(inspections.len()));
            let generated_at = Local::now();
            let html = render_report(&inspections, report_type, title.as_deref(), generated_at)?;
            let path = report::write_report(&html, &output, generated_at)?;

            println!("✔ レポート出力: {} ({}, {}件)", path.display(), report_type, inspections.len());
        }

        Commands::Metrics => {
            let (session, _notices) = open_session(&config, config.history_limit).await?;
            print_metrics(&session.metrics());

            let distribution = session.defect_distribution();
            if !distribution.is_empty() {
                println!("\n欠陥分布:");
                for entry in distribution {
                    println!("  {:<24} {}", entry.name, entry.value);
                }
            }
            session.shutdown();
        }

        Commands::History { limit } => {
            let (session, _notices) = open_session(&config, limit).await?;
            let inspections = session.inspections();
            session.shutdown();

            if inspections.is_empty() {
                println!("検査履歴はありません");
            }
            for inspection in inspections {
                println!(
                    "{}  {}  {}  {:<8}  欠陥 {}  {:.0}%  {}",
                    inspection.id,
                    inspection.product_id,
                    inspection.line,
                    inspection.status.as_str(),
                    inspection.defects_found,
                    inspection.confidence,
                    inspection.timestamp
                );
            }
        }

        Commands::Config { set_access_token, set_user_id, set_api_key, set_endpoint, show } => {
            let mut config = config;
            let mut changed = false;

            if let Some(token) = set_access_token {
                config.access_token = Some(token);
                println!("✔ アクセストークンを設定しました");
                changed = true;
            }
            if let Some(user_id) = set_user_id {
                config.user_id = Some(user_id);
                println!("✔ ユーザーIDを設定しました");
                changed = true;
            }
            if let Some(key) = set_api_key {
                config.api_key = Some(key);
                println!("✔ APIキーを設定しました");
                changed = true;
            }
            if let Some(endpoint) = set_endpoint {
                config.analyze_endpoint = endpoint;
                println!("✔ 解析エンドポイントを設定しました");
                changed = true;
            }
            if changed {
                config.save()?;
            }

            if show {
                println!("設定:");
                println!("  バックエンド: {}", config.provider.label());
                println!("  解析エンドポイント: {}", config.analyze_endpoint);
                println!("  ゲートウェイ: {} ({})", config.gateway_url, config.gateway_model);
                println!("  アクセストークン: {}", if config.access_token().is_some() { "設定済み" } else { "未設定" });
                println!("  ユーザーID: {}", config.user_id().unwrap_or_else(|| "未設定".into()));
                println!("  APIキー: {}", if config.get_api_key().is_ok() { "設定済み" } else { "未設定" });
                println!("  保存先: {}", config.resolved_store_path()?.display());
                println!("  バッチ間隔: {}ms", config.batch_delay_ms);
            }
        }
    }

    Ok(())
}

/// ストアを開いてセッションを開始（直近 limit 件を読み込む）
async fn open_session(
    config: &Config,
    limit: usize,
) -> anyhow::Result<(InspectionSession, UnboundedReceiver<Notice>)> {
    let store_path = config.resolved_store_path()?;
    let store = store::JsonStore::open(&store_path)
        .with_context(|| format!("ストアを開けません: {}", store_path.display()))?;
    let adapter = persistence::PersistenceAdapter::new(
        Arc::new(store),
        Arc::new(auth::StaticAuth::new(config.user_id())),
    );

    let (session, notices) = InspectionSession::new(adapter);
    session.start(limit).await?;
    Ok((session, notices))
}

fn print_metrics(metrics: &Metrics) {
    println!("集計:");
    println!("  検査数: {}", metrics.total_inspections);
    println!("  合格率: {}", format_pass_rate(metrics.pass_rate));
    println!("  欠陥総数: {}", metrics.total_defects);
    println!("  重大: {}", metrics.critical_issues);
}

fn print_notices(notices: &mut UnboundedReceiver<Notice>) {
    while let Ok(notice) = notices.try_recv() {
        eprintln!("⚠ {}", notice);
    }
}
