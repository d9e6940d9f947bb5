/// サインイン中のユーザー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
}

pub trait AuthProvider: Send + Sync {
    /// 未サインインなら None
    fn current_user(&self) -> Option<AuthUser>;
}

/// 設定値から決まる固定の認証状態
#[derive(Debug, Clone, Default)]
pub struct StaticAuth {
    user: Option<AuthUser>,
}

impl StaticAuth {
    pub fn new(user_id: Option<String>) -> Self {
        Self {
            user: user_id
                .filter(|id| !id.trim().is_empty())
                .map(|id| AuthUser { id }),
        }
    }

    pub fn signed_in(user_id: &str) -> Self {
        Self::new(Some(user_id.to_string()))
    }

    pub fn signed_out() -> Self {
        Self::default()
    }
}

impl AuthProvider for StaticAuth {
    fn current_user(&self) -> Option<AuthUser> {
        self.user.clone()
    }
}
