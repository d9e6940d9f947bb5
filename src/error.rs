use thiserror::Error;

#[derive(Error, Debug)]
pub enum DefectVisionError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("認証情報が設定されていません。`defect-vision config --set-access-token TOKEN` で設定してください")]
    MissingCredentials,

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("フォルダが見つかりません: {0}")]
    FolderNotFound(String),

    #[error("画像が見つかりません: {0}")]
    NoImagesFound(String),

    #[error("{0}")]
    InvalidImage(String),

    /// 上流のメッセージをそのまま表示する
    #[error("{0}")]
    ApiCall(String),

    #[error("APIレスポンスのパースに失敗: {0}")]
    ApiParse(String),

    #[error("No response from AI service")]
    EmptyResponse,

    #[error("ストアエラー: {0}")]
    Store(String),

    #[error("バッチ処理中のためキューを変更できません")]
    QueueBusy,

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] defect_vision_common::Error),
}

pub type Result<T> = std::result::Result<T, DefectVisionError>;
