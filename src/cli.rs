use clap::{Parser, Subcommand};
use crate::ai_provider::AnalyzerKind;
use defect_vision_common::ReportType;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "defect-vision")]
#[command(about = "製品画像AI外観検査・検査レポート生成ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// 解析バックエンド（未指定なら設定値）
    #[arg(long, global = true)]
    pub provider: Option<AnalyzerKind>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 画像1枚を解析して検査を追加
    Analyze {
        /// 画像ファイル（png/jpeg/webp/gif）
        #[arg(required = true)]
        image: PathBuf,
    },

    /// フォルダ内の画像を順番に解析
    Batch {
        /// 画像フォルダのパス
        #[arg(required = true)]
        folder: PathBuf,

        /// 保存済みの検査を読み込まない（今回の結果だけを集計）
        #[arg(long)]
        fresh: bool,
    },

    /// 保存済みの検査からHTMLレポートを生成
    Report {
        /// レポート種別（未指定なら件数から自動選択）
        #[arg(short = 't', long = "type")]
        report_type: Option<ReportType>,

        /// タイトル
        #[arg(long)]
        title: Option<String>,

        /// 出力先（ファイルまたはディレクトリ）
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// 集計値と欠陥分布を表示
    Metrics,

    /// 直近の検査を一覧表示
    History {
        /// 表示件数
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// 設定を管理
    Config {
        /// 解析エンドポイントのアクセストークンを設定
        #[arg(long)]
        set_access_token: Option<String>,

        /// 保存時のユーザーIDを設定
        #[arg(long)]
        set_user_id: Option<String>,

        /// ゲートウェイのAPIキーを設定
        #[arg(long)]
        set_api_key: Option<String>,

        /// 解析エンドポイントURLを設定
        #[arg(long)]
        set_endpoint: Option<String>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },
}
