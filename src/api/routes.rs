//! API Routes
//!
//! HTTP endpoint definitions.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{
    AccountLimits, AccountType, AtmOperation, AtmOperationType, NewAccount, OperationContext,
};
use crate::error::AppError;
use crate::handlers::{AccountDetails, AtmCommand, AtmResult, TransferCommand, TransferResult};
use crate::ledger::{AccountRef, LedgerStore};
use crate::projection::{HistoryEntry, HistoryFilter, HistoryScope};
use crate::security::Pin;

use super::AppState;

// =========================================================================
// Request/Response types
// =========================================================================

/// Each side is addressed by exactly one of account id or IBAN
#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    #[serde(default)]
    pub sender_account_id: Option<i64>,
    #[serde(default)]
    pub sender_iban: Option<String>,
    #[serde(default)]
    pub receiver_account_id: Option<i64>,
    #[serde(default)]
    pub receiver_iban: Option<String>,
    pub amount: Decimal,
    #[serde(default)]
    pub description: Option<String>,
}

// No Debug: carries a plaintext PIN
#[derive(Deserialize)]
pub struct AtmRequest {
    pub account_id: i64,
    pub amount: Decimal,
    pub pin: String,
    pub operation_type: AtmOperationType,
}

#[derive(Deserialize)]
pub struct PinBalanceRequest {
    pub account_id: i64,
    pub pin: String,
}

#[derive(Deserialize)]
pub struct CreatePinRequest {
    pub pin: String,
}

#[derive(Deserialize)]
pub struct ChangePinRequest {
    pub pin: String,
    pub new_pin: String,
}

impl ChangePinRequest {
    /// Parse both PINs before reporting a format error, so neither
    /// plaintext outlives the request unscrubbed
    fn into_pins(self) -> Result<(Pin, Pin), AppError> {
        let (current, new_pin) = (Pin::parse(self.pin), Pin::parse(self.new_pin));
        Ok((current?, new_pin?))
    }
}

#[derive(Debug, Deserialize)]
pub struct OpenAccountRequest {
    pub user_id: i64,
    pub account_type: AccountType,
}

#[derive(Debug, Deserialize)]
pub struct LimitsRequest {
    pub daily_limit: Decimal,
    pub absolute_limit: Decimal,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub account_id: i64,
    pub balance: Decimal,
}

#[derive(Debug, Serialize)]
pub struct PinStatusResponse {
    pub account_id: i64,
    pub pin_created: bool,
}

#[derive(Debug, Serialize)]
pub struct AtmOperationsResponse {
    pub account_id: i64,
    pub operations: Vec<AtmOperation>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub count: usize,
    pub entries: Vec<HistoryEntry>,
}

fn account_ref(
    side: &str,
    account_id: Option<i64>,
    iban: Option<String>,
) -> Result<AccountRef, AppError> {
    match (account_id, iban) {
        (Some(id), None) => Ok(AccountRef::Id(id)),
        (None, Some(iban)) => Ok(AccountRef::Iban(iban)),
        _ => Err(AppError::InvalidRequest(format!(
            "exactly one of {side}_account_id or {side}_iban is required"
        ))),
    }
}

// Client-facing PIN fields are strings so format errors map to 400
fn parse_pin(raw: String) -> Result<Pin, AppError> {
    Ok(Pin::parse(raw)?)
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router<S: LedgerStore>() -> Router<AppState<S>> {
    Router::new()
        // Transfers
        .route("/transfers", post(transfer::<S>))
        // ATM
        .route("/atm/operations", post(atm_operation::<S>))
        .route("/atm/balance", post(atm_balance::<S>))
        .route("/atm/accounts/:account_id/operations", get(atm_operations::<S>))
        // Accounts
        .route("/accounts", post(open_account::<S>))
        .route("/accounts/:account_id", get(get_account::<S>))
        .route("/accounts/:account_id/balance", get(get_balance::<S>))
        .route("/accounts/:account_id/approve", post(approve_account::<S>))
        .route("/accounts/:account_id/close", post(close_account::<S>))
        .route("/accounts/:account_id/limits", put(set_limits::<S>))
        // PIN
        .route(
            "/accounts/:account_id/pin",
            get(pin_status::<S>)
                .post(create_pin::<S>)
                .put(change_pin::<S>),
        )
        // History
        .route("/accounts/:account_id/history", get(account_history::<S>))
        .route("/users/:user_id/history", get(user_history::<S>))
        .route("/ibans/:iban/history", get(iban_history::<S>))
}

// =========================================================================
// POST /transfers
// =========================================================================

async fn transfer<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<TransferRequest>,
) -> Result<(StatusCode, Json<TransferResult>), AppError> {
    let sender = account_ref("sender", request.sender_account_id, request.sender_iban)?;
    let receiver = account_ref("receiver", request.receiver_account_id, request.receiver_iban)?;

    let mut command = TransferCommand::new(sender, receiver, request.amount);
    command.description = request.description;

    let result = state.transfers().execute(command, &context).await?;

    Ok((StatusCode::CREATED, Json(result)))
}

// =========================================================================
// ATM
// =========================================================================

async fn atm_operation<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<AtmRequest>,
) -> Result<(StatusCode, Json<AtmResult>), AppError> {
    let command = AtmCommand {
        account_id: request.account_id,
        amount: request.amount,
        pin: parse_pin(request.pin)?,
        operation_type: request.operation_type,
    };

    let result = state.atm().perform_operation(command, &context).await?;

    Ok((StatusCode::CREATED, Json(result)))
}

async fn atm_balance<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Json(request): Json<PinBalanceRequest>,
) -> Result<Json<BalanceResponse>, AppError> {
    let pin = parse_pin(request.pin)?;
    let balance = state.atm().balance_with_pin(request.account_id, pin).await?;

    Ok(Json(BalanceResponse {
        account_id: request.account_id,
        balance,
    }))
}

async fn atm_operations<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Path(account_id): Path<i64>,
) -> Result<Json<AtmOperationsResponse>, AppError> {
    let operations = state.atm().operations(account_id).await?;

    Ok(Json(AtmOperationsResponse {
        account_id,
        operations,
    }))
}

// =========================================================================
// Accounts
// =========================================================================

async fn open_account<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Json(request): Json<OpenAccountRequest>,
) -> Result<(StatusCode, Json<AccountDetails>), AppError> {
    let details = state
        .accounts()
        .open(NewAccount {
            user_id: request.user_id,
            account_type: request.account_type,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(details)))
}

async fn get_account<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Path(account_id): Path<i64>,
) -> Result<Json<AccountDetails>, AppError> {
    Ok(Json(state.accounts().details(account_id).await?))
}

async fn get_balance<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Path(account_id): Path<i64>,
) -> Result<Json<BalanceResponse>, AppError> {
    let balance = state.accounts().balance(account_id).await?;

    Ok(Json(BalanceResponse {
        account_id,
        balance,
    }))
}

async fn approve_account<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Path(account_id): Path<i64>,
) -> Result<Json<AccountDetails>, AppError> {
    Ok(Json(state.accounts().approve(account_id).await?))
}

async fn close_account<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Path(account_id): Path<i64>,
) -> Result<Json<AccountDetails>, AppError> {
    Ok(Json(state.accounts().close(account_id).await?))
}

async fn set_limits<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Path(account_id): Path<i64>,
    Json(request): Json<LimitsRequest>,
) -> Result<Json<AccountDetails>, AppError> {
    let limits = AccountLimits::new(request.daily_limit, request.absolute_limit)?;
    Ok(Json(state.accounts().set_limits(account_id, limits).await?))
}

// =========================================================================
// PIN
// =========================================================================

async fn pin_status<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Path(account_id): Path<i64>,
) -> Result<Json<PinStatusResponse>, AppError> {
    let pin_created = state.pins().pin_status(account_id).await?;

    Ok(Json(PinStatusResponse {
        account_id,
        pin_created,
    }))
}

async fn create_pin<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Path(account_id): Path<i64>,
    Json(request): Json<CreatePinRequest>,
) -> Result<StatusCode, AppError> {
    let pin = parse_pin(request.pin)?;
    state.pins().create_pin(account_id, pin).await?;

    Ok(StatusCode::CREATED)
}

async fn change_pin<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Path(account_id): Path<i64>,
    Json(request): Json<ChangePinRequest>,
) -> Result<StatusCode, AppError> {
    let (current, new_pin) = request.into_pins()?;
    state.pins().change_pin(account_id, current, new_pin).await?;

    Ok(StatusCode::NO_CONTENT)
}

// =========================================================================
// History
// =========================================================================

async fn history_response<S: LedgerStore>(
    state: &AppState<S>,
    scope: HistoryScope,
    filter: &HistoryFilter,
) -> Result<Json<HistoryResponse>, AppError> {
    let entries = state.history().history(scope, filter).await?;

    Ok(Json(HistoryResponse {
        count: entries.len(),
        entries,
    }))
}

async fn account_history<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Path(account_id): Path<i64>,
    Query(filter): Query<HistoryFilter>,
) -> Result<Json<HistoryResponse>, AppError> {
    history_response(&state, HistoryScope::Account(account_id), &filter).await
}

async fn user_history<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Path(user_id): Path<i64>,
    Query(filter): Query<HistoryFilter>,
) -> Result<Json<HistoryResponse>, AppError> {
    history_response(&state, HistoryScope::User(user_id), &filter).await
}

async fn iban_history<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Path(iban): Path<String>,
    Query(filter): Query<HistoryFilter>,
) -> Result<Json<HistoryResponse>, AppError> {
    history_response(&state, HistoryScope::Iban(iban), &filter).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomainError;

    #[test]
    fn test_account_ref_requires_exactly_one() {
        assert_eq!(account_ref("sender", Some(1), None).unwrap(), AccountRef::Id(1));
        assert_eq!(
            account_ref("sender", None, Some("NL28BANK0000000042".into())).unwrap(),
            AccountRef::Iban("NL28BANK0000000042".into())
        );
        assert!(account_ref("sender", None, None).is_err());
        assert!(account_ref("sender", Some(1), Some("x".into())).is_err());
    }

    #[test]
    fn test_change_pin_request_checks_both_pins() {
        let request = |pin: &str, new_pin: &str| ChangePinRequest {
            pin: pin.to_string(),
            new_pin: new_pin.to_string(),
        };

        let (current, new_pin) = request("1234", "5678").into_pins().unwrap();
        assert_eq!(current.expose(), b"1234");
        assert_eq!(new_pin.expose(), b"5678");

        for (pin, new_pin) in [("12a4", "5678"), ("1234", "567"), ("x", "")] {
            assert!(matches!(
                request(pin, new_pin).into_pins(),
                Err(AppError::Domain(DomainError::InvalidPinFormat))
            ));
        }
    }

    #[test]
    fn test_transfer_request_parsing() {
        let request: TransferRequest = serde_json::from_str(
            r#"{"sender_account_id": 1, "receiver_iban": "NL28BANK0000000042", "amount": "12.50"}"#,
        )
        .unwrap();

        assert_eq!(request.sender_account_id, Some(1));
        assert_eq!(request.amount, Decimal::new(1250, 2));
        assert!(request.description.is_none());
    }
}
