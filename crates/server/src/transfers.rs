//! Investment endpoints: execute a transfer and read the ledger.

use std::time::Duration;

use api_types::transfer::{InvestNew, InvestResponse, TransferList, TransferView};
use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
};
use engine::{Money, Transfer, commands::ExecuteTransferCmd};
use uuid::Uuid;

use crate::{ServerError, params, payload, server::ServerState};

fn transfer_view(transfer: Transfer) -> TransferView {
    TransferView {
        id: transfer.id,
        account_id: transfer.account_id,
        fund_id: transfer.fund_id,
        amount: transfer.amount.to_storage(),
        idempotency_key: transfer.idempotency_key,
        executed_at: transfer.executed_at,
        created_at: transfer.created_at,
    }
}

/// Move cash from the account into its fund.
///
/// Answers `201 Created` for a new transfer and `200 OK` when the idempotency
/// key matched an earlier one.
pub async fn invest(
    State(state): State<ServerState>,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<InvestNew>, JsonRejection>,
) -> Result<(StatusCode, Json<InvestResponse>), ServerError> {
    let account_id = params(path)?;
    let payload = payload(body)?;
    let amount = payload.amount.parse::<Money>()?;

    let mut cmd = ExecuteTransferCmd::new(account_id, payload.fund_id, amount);
    if let Some(key) = payload.idempotency_key {
        cmd = cmd.idempotency_key(key);
    }
    if let Some(timeout_ms) = payload.timeout_ms {
        cmd = cmd.timeout(Duration::from_millis(timeout_ms));
    }

    let executed = state.engine.execute_transfer(cmd).await?;
    let status = if executed.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };

    Ok((
        status,
        Json(InvestResponse {
            transfer: transfer_view(executed.transfer),
            replayed: executed.replayed,
        }),
    ))
}

pub async fn list(
    State(state): State<ServerState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<TransferList>, ServerError> {
    let account_id = params(path)?;
    let transfers = state.engine.transfers(account_id).await?;
    Ok(Json(TransferList {
        transfers: transfers.into_iter().map(transfer_view).collect(),
    }))
}

pub async fn get(
    State(state): State<ServerState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<TransferView>, ServerError> {
    let transfer_id = params(path)?;
    let transfer = state.engine.transfer(transfer_id).await?;
    Ok(Json(transfer_view(transfer)))
}
