// 登录命令模块

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use super::{to_command_error, AppState, CommandResult};

/// 登录请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginDto {
    pub username: String,
    pub password: String,
}

/// 登录状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatusDto {
    pub logged_in: bool,
}

/// 登录
pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginDto>,
) -> CommandResult<AuthStatusDto> {
    state
        .auth
        .login(&input.username, &input.password)
        .map_err(to_command_error)?;

    Ok(Json(AuthStatusDto { logged_in: true }))
}

/// 登出
pub async fn logout(State(state): State<AppState>) -> CommandResult<AuthStatusDto> {
    state.auth.logout().map_err(to_command_error)?;
    Ok(Json(AuthStatusDto { logged_in: false }))
}

/// 查询登录状态
pub async fn status(State(state): State<AppState>) -> CommandResult<AuthStatusDto> {
    let logged_in = state.auth.is_logged_in().map_err(to_command_error)?;
    Ok(Json(AuthStatusDto { logged_in }))
}
