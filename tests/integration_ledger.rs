//! Integration tests for the ledger engines over the in-memory store

use std::collections::HashSet;

use rust_decimal_macros::dec;

use bank_ledger::domain::{AtmOperationType, DomainError, OperationContext};
use bank_ledger::handlers::{AtmCommand, AtmHandler, TransferCommand, TransferHandler};
use bank_ledger::iban::IbanCodec;
use bank_ledger::ledger::{LedgerStore, LedgerWrite};
use bank_ledger::projection::{EntryKind, HistoryFilter, HistoryScope, HistoryService};
use bank_ledger::AppError;

mod common;

#[tokio::test]
async fn test_history_merges_transfers_and_atm_operations() {
    let ledger = common::memory_ledger();
    let context = OperationContext::new();
    let alice = common::seed_account_with_pin(&ledger, 1, dec!(1000.00), "1234").await;
    let bob = common::seed_account(&ledger, 2, dec!(0)).await;

    let transfers = TransferHandler::new(ledger.clone());
    for amount in [dec!(10.00), dec!(20.00), dec!(30.00)] {
        transfers
            .execute(TransferCommand::by_id(alice, bob, amount), &context)
            .await
            .unwrap();
    }

    let atm = AtmHandler::new(ledger.clone(), common::hasher());
    atm.perform_operation(
        AtmCommand::deposit(alice, dec!(5.00), common::pin("1234")),
        &context,
    )
    .await
    .unwrap();
    atm.perform_operation(
        AtmCommand::withdraw(alice, dec!(7.50), common::pin("1234")),
        &context,
    )
    .await
    .unwrap();

    let history = HistoryService::new(ledger.clone())
        .history(HistoryScope::Account(alice), &HistoryFilter::default())
        .await
        .unwrap();

    assert_eq!(history.len(), 5);
    assert!(history.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
    assert_eq!(
        history.iter().filter(|e| e.kind == EntryKind::Transfer).count(),
        3
    );

    let withdrawal = history
        .iter()
        .find(|e| e.kind == EntryKind::Withdraw)
        .unwrap();
    assert_eq!(withdrawal.from_account, Some(alice));
    assert_eq!(withdrawal.to_account, None);
    assert_eq!(withdrawal.description, "ATM WITHDRAW");

    // Receiver sees the transfers only
    let bob_history = HistoryService::new(ledger)
        .history(HistoryScope::Account(bob), &HistoryFilter::default())
        .await
        .unwrap();
    assert_eq!(bob_history.len(), 3);
}

#[tokio::test]
async fn test_user_history_lists_internal_transfers_once() {
    let ledger = common::memory_ledger();
    let checking = common::seed_account(&ledger, 7, dec!(300.00)).await;
    let savings = common::seed_account(&ledger, 7, dec!(0)).await;
    let other = common::seed_account(&ledger, 8, dec!(0)).await;

    let transfers = TransferHandler::new(ledger.clone());
    let context = OperationContext::new();
    transfers
        .transfer(checking, savings, dec!(100.00), None, &context)
        .await
        .unwrap();
    transfers
        .transfer(checking, other, dec!(50.00), None, &context)
        .await
        .unwrap();

    let history = HistoryService::new(ledger)
        .history(HistoryScope::User(7), &HistoryFilter::default())
        .await
        .unwrap();

    assert_eq!(history.len(), 2);

    let ids: HashSet<_> = history.iter().map(|e| e.id).collect();
    assert_eq!(ids.len(), 2);
}

#[tokio::test]
async fn test_user_without_accounts_has_empty_history() {
    let ledger = common::memory_ledger();

    let history = HistoryService::new(ledger)
        .history(HistoryScope::User(99), &HistoryFilter::default())
        .await
        .unwrap();

    assert!(history.is_empty());
}

#[tokio::test]
async fn test_iban_history_with_amount_filter() {
    let ledger = common::memory_ledger();
    let sender = common::seed_account(&ledger, 1, dec!(500.00)).await;
    let receiver = common::seed_account(&ledger, 2, dec!(0)).await;

    let transfers = TransferHandler::new(ledger.clone());
    let context = OperationContext::new();
    for amount in [dec!(5.00), dec!(50.00), dec!(150.00)] {
        transfers
            .transfer(sender, receiver, amount, Some("rent".to_string()), &context)
            .await
            .unwrap();
    }

    let iban = ledger.iban_of(receiver).unwrap();
    let filter = HistoryFilter {
        min_amount: Some(dec!(50.00)),
        max_amount: Some(dec!(150.00)),
        ..HistoryFilter::default()
    };

    let history = HistoryService::new(ledger.clone())
        .history(HistoryScope::Iban(ledger.codec().format(&iban)), &filter)
        .await
        .unwrap();

    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|e| e.description == "rent"));
    assert!(history.iter().all(|e| e.to_iban.as_deref() == Some(iban.as_str())));
}

#[tokio::test]
async fn test_history_for_unknown_iban_is_rejected() {
    let ledger = common::memory_ledger();

    let err = HistoryService::new(ledger)
        .history(
            HistoryScope::Iban("NL00BANK0000000042".to_string()),
            &HistoryFilter::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::Domain(DomainError::InvalidIban(_))
    ));
}

#[tokio::test]
async fn test_transfer_by_iban_round_trips_account_ids() {
    let ledger = common::memory_ledger();
    let sender = common::seed_account(&ledger, 1, dec!(100.00)).await;
    let receiver = common::seed_account(&ledger, 2, dec!(0)).await;

    let codec = IbanCodec::default();
    let sender_iban = codec.generate(sender).unwrap();
    let receiver_iban = codec.format(&codec.generate(receiver).unwrap());

    let result = TransferHandler::new(ledger.clone())
        .transfer_by_iban(
            &sender_iban,
            &receiver_iban,
            dec!(40.00),
            None,
            &OperationContext::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.from_account_id, sender);
    assert_eq!(result.to_account_id, receiver);
    assert_eq!(codec.generate(42).unwrap(), "NL28BANK0000000042");
    assert_eq!(codec.extract_account_id("NL28BANK0000000042").unwrap(), 42);
}

#[tokio::test]
async fn test_stale_unit_of_work_leaves_no_trace() {
    let ledger = common::memory_ledger();
    let id = common::seed_account(&ledger, 1, dec!(100.00)).await;

    let stale = ledger.get_by_id(id).await.unwrap();
    ledger.apply_delta(&stale, dec!(1.00)).await.unwrap();

    let err = ledger
        .store()
        .commit(LedgerWrite::new().delta(&stale, dec!(-50.00)))
        .await
        .unwrap_err();
    assert!(err.is_concurrency_conflict());

    let current = ledger.get_by_id(id).await.unwrap();
    assert_eq!(current.balance().value(), dec!(101.00));
    assert!(ledger.store().transactions().await.is_empty());
}

#[tokio::test]
async fn test_atm_operations_are_recorded_in_order() {
    let ledger = common::memory_ledger();
    let id = common::seed_account_with_pin(&ledger, 1, dec!(20.00), "0000").await;
    let atm = AtmHandler::new(ledger.clone(), common::hasher());
    let context = OperationContext::new();

    for (operation_type, amount) in [
        (AtmOperationType::Withdraw, dec!(20.00)),
        (AtmOperationType::Deposit, dec!(3.00)),
    ] {
        let command = AtmCommand {
            account_id: id,
            amount,
            pin: common::pin("0000"),
            operation_type,
        };
        atm.perform_operation(command, &context).await.unwrap();
    }

    let recorded = ledger.store().atm_operations().await;
    assert_eq!(recorded.len(), 2);
    assert_eq!(recorded[0].operation_type, AtmOperationType::Withdraw);
    assert_eq!(recorded[1].operation_type, AtmOperationType::Deposit);
    assert_eq!(
        atm.balance_with_pin(id, common::pin("0000")).await.unwrap(),
        dec!(3.00)
    );
}
