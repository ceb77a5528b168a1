//! Funds API endpoints.

use api_types::fund::{FundCategory, FundList, FundNew, FundUpdate, FundView, RiskTier};
use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
};
use engine::{
    Fund, Money,
    commands::{NewFundCmd, UpdateFundCmd},
};
use uuid::Uuid;

use crate::{ServerError, params, payload, server::ServerState};

fn category_view(category: engine::FundCategory) -> FundCategory {
    match category {
        engine::FundCategory::Equity => FundCategory::Equity,
        engine::FundCategory::Bond => FundCategory::Bond,
        engine::FundCategory::Index => FundCategory::Index,
        engine::FundCategory::Mixed => FundCategory::Mixed,
    }
}

fn risk_view(risk: engine::RiskTier) -> RiskTier {
    match risk {
        engine::RiskTier::Low => RiskTier::Low,
        engine::RiskTier::Medium => RiskTier::Medium,
        engine::RiskTier::High => RiskTier::High,
    }
}

fn fund_view(fund: Fund) -> FundView {
    FundView {
        id: fund.id,
        name: fund.name,
        description: fund.description,
        category: category_view(fund.category),
        risk: risk_view(fund.risk),
        performance: fund.performance.to_storage(),
        total: fund.total.to_storage(),
        revision: fund.revision,
        created_at: fund.created_at,
        updated_at: fund.updated_at,
    }
}

fn optional_money(value: Option<&str>) -> Result<Money, ServerError> {
    Ok(value.map(str::parse::<Money>).transpose()?.unwrap_or(Money::ZERO))
}

pub async fn fund_new(
    State(state): State<ServerState>,
    body: Result<Json<FundNew>, JsonRejection>,
) -> Result<(StatusCode, Json<FundView>), ServerError> {
    let payload = payload(body)?;
    let category = engine::FundCategory::try_from(payload.category.as_str())?;
    let risk = engine::RiskTier::try_from(payload.risk.as_str())?;

    let cmd = NewFundCmd::new(payload.name, payload.description, category, risk)
        .performance(optional_money(payload.performance.as_deref())?)
        .total(optional_money(payload.total.as_deref())?);
    let fund = state.engine.create_fund(cmd).await?;

    Ok((StatusCode::CREATED, Json(fund_view(fund))))
}

pub async fn list(State(state): State<ServerState>) -> Result<Json<FundList>, ServerError> {
    let funds = state.engine.funds().await?;
    Ok(Json(FundList {
        funds: funds.into_iter().map(fund_view).collect(),
    }))
}

pub async fn get(
    State(state): State<ServerState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<FundView>, ServerError> {
    let fund_id = params(path)?;
    let fund = state.engine.fund(fund_id).await?;
    Ok(Json(fund_view(fund)))
}

pub async fn fund_update(
    State(state): State<ServerState>,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<FundUpdate>, JsonRejection>,
) -> Result<Json<FundView>, ServerError> {
    let fund_id = params(path)?;
    let payload = payload(body)?;
    let fund = state
        .engine
        .update_fund(UpdateFundCmd::new(fund_id, payload.name, payload.description))
        .await?;
    Ok(Json(fund_view(fund)))
}
