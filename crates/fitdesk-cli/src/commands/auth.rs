//! Session commands

use super::Output;
use crate::context::AppContext;
use anyhow::{Result, bail};
use fitdesk_core::{LoginCredentials, RegisterData};
use fitdesk_query::QueryStatus;
use serde_json::json;
use tracing::info;
use validator::Validate;

/// `fitdesk login`
///
/// # Errors
///
/// Fails on invalid input or rejected credentials.
pub async fn login(ctx: &AppContext, credentials: &LoginCredentials) -> Result<Output> {
    credentials
        .validate()
        .map_err(fitdesk_core::Error::from)?;

    let response = ctx.session.login(credentials).await?;
    info!(user_id = %response.user.id, "Signed in");

    Ok(Output::Json(json!({
        "authenticated": true,
        "user": response.user,
    })))
}

/// `fitdesk logout`
///
/// # Errors
///
/// Never fails; local credentials are cleared whatever the server says.
pub async fn logout(ctx: &AppContext) -> Result<Output> {
    ctx.session.logout().await;
    Ok(Output::Json(json!({ "authenticated": false })))
}

/// `fitdesk register`
///
/// # Errors
///
/// Fails on invalid input or when the server rejects the account.
pub async fn register(ctx: &AppContext, data: &RegisterData) -> Result<Output> {
    data.validate().map_err(fitdesk_core::Error::from)?;
    let user = ctx.session.register(data).await?;
    Ok(Output::Json(serde_json::to_value(user)?))
}

/// `fitdesk whoami`
///
/// # Errors
///
/// Fails when no session is stored or the server rejects it.
pub async fn whoami(ctx: &AppContext) -> Result<Output> {
    let result = ctx.session.current_user().await;
    if result.status == QueryStatus::Idle {
        bail!("Not signed in. Run `fitdesk login` first.");
    }
    let user = result.into_result()?;
    Ok(Output::Json(serde_json::to_value(user)?))
}

/// `fitdesk refresh`
///
/// # Errors
///
/// Fails when no refresh token is stored or the exchange is rejected.
pub async fn refresh(ctx: &AppContext) -> Result<Output> {
    let response = ctx.session.refresh().await?;
    Ok(Output::Json(json!({
        "refreshed": true,
        "rotated": response.refresh_token.is_some(),
    })))
}
