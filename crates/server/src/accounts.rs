//! Accounts API endpoints.

use api_types::account::{AccountNew, AccountView};
use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
};
use engine::{Account, Money, commands::OpenAccountCmd};
use uuid::Uuid;

use crate::{ServerError, params, payload, server::ServerState};

fn account_view(account: Account) -> AccountView {
    AccountView {
        id: account.id,
        owner_id: account.owner_id,
        fund_id: account.fund_id,
        cash_balance: account.cash_balance.to_storage(),
        invested_total: account.invested_total.to_storage(),
        revision: account.revision,
        created_at: account.created_at,
        updated_at: account.updated_at,
    }
}

pub async fn account_new(
    State(state): State<ServerState>,
    body: Result<Json<AccountNew>, JsonRejection>,
) -> Result<(StatusCode, Json<AccountView>), ServerError> {
    let payload = payload(body)?;
    let cash_balance = match payload.cash_balance.as_deref() {
        Some(value) => value.parse::<Money>()?,
        None => Money::ZERO,
    };

    let account = state
        .engine
        .open_account(OpenAccountCmd::new(payload.owner_id, cash_balance))
        .await?;

    Ok((StatusCode::CREATED, Json(account_view(account))))
}

pub async fn get(
    State(state): State<ServerState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<AccountView>, ServerError> {
    let account_id = params(path)?;
    let account = state.engine.account(account_id).await?;
    Ok(Json(account_view(account)))
}

/// Attach a fund to an account that has none yet.
pub async fn associate_fund(
    State(state): State<ServerState>,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> Result<Json<AccountView>, ServerError> {
    let (account_id, fund_id) = params(path)?;
    let account = state.engine.associate_fund(account_id, fund_id).await?;
    Ok(Json(account_view(account)))
}
