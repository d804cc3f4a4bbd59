//! 本地登录标记
//! 仅是持久化的布尔值：任意非空用户名即可登录，没有真正的鉴权

use std::sync::Arc;

use crate::error::{Result, ReviewError, ValidationError};
use crate::services::storage::{KeyValueStore, AUTH_KEY};

const LOGGED_IN: &str = "true";

pub struct AuthFlag {
    storage: Arc<dyn KeyValueStore>,
}

impl AuthFlag {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// 用户名去空白后非空即登录成功，密码不做校验
    pub fn login(&self, username: &str, _password: &str) -> Result<()> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ValidationError::EmptyUsername.into());
        }

        self.storage.save(AUTH_KEY, LOGGED_IN)?;
        log::info!("user {} logged in", username);
        Ok(())
    }

    pub fn logout(&self) -> Result<()> {
        self.storage.remove(AUTH_KEY)?;
        log::info!("logged out");
        Ok(())
    }

    pub fn is_logged_in(&self) -> Result<bool> {
        Ok(self.storage.load(AUTH_KEY)?.as_deref() == Some(LOGGED_IN))
    }

    /// 未登录时返回 [`ReviewError::NotAuthenticated`]
    pub fn require_login(&self) -> Result<()> {
        if self.is_logged_in()? {
            Ok(())
        } else {
            Err(ReviewError::NotAuthenticated)
        }
    }
}
