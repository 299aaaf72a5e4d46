//! User management commands

use super::Output;
use crate::cli::{ListArgs, UserCommand};
use crate::context::AppContext;
use anyhow::{Result, bail};
use fitdesk_core::{CreateUserData, QueryParams, UpdateUserData};
use serde_json::json;
use validator::Validate;

/// Dispatch a `fitdesk users` subcommand
///
/// # Errors
///
/// Fails on invalid input or any API error.
pub async fn handle(ctx: &AppContext, action: UserCommand) -> Result<Output> {
    match action {
        UserCommand::List(args) => {
            let page = ctx.users.users(&list_params(args)).await.into_result()?;
            Ok(Output::Json(serde_json::to_value(page)?))
        }
        UserCommand::Get { id } => {
            require_id(&id)?;
            let user = ctx.users.user(&id).await.into_result()?;
            Ok(Output::Json(serde_json::to_value(user)?))
        }
        UserCommand::Create {
            email,
            first_name,
            last_name,
            role,
        } => {
            let data = CreateUserData {
                email,
                first_name,
                last_name,
                role,
            };
            data.validate().map_err(fitdesk_core::Error::from)?;
            let user = ctx.users.create_user(&data).await?;
            Ok(Output::Json(serde_json::to_value(user)?))
        }
        UserCommand::Update {
            id,
            email,
            first_name,
            last_name,
            role,
        } => {
            require_id(&id)?;
            let data = UpdateUserData {
                email,
                first_name,
                last_name,
                role,
            };
            if data.is_empty() {
                bail!("Nothing to update; pass at least one field");
            }
            data.validate().map_err(fitdesk_core::Error::from)?;
            let user = ctx.users.update_user(&id, &data).await?;
            Ok(Output::Json(serde_json::to_value(user)?))
        }
        UserCommand::Delete { id } => {
            require_id(&id)?;
            ctx.users.delete_user(&id).await?;
            Ok(Output::Json(json!({ "deleted": id })))
        }
    }
}

fn require_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        bail!("User id must not be empty");
    }
    Ok(())
}

fn list_params(args: ListArgs) -> QueryParams {
    let mut params = QueryParams::new();
    params.page = args.page;
    params.limit = args.limit;
    params.search = args.search;
    params.sort_by = args.sort_by;
    params.sort_order = args.sort_order;
    params.filters.extend(args.filters);
    params
}
