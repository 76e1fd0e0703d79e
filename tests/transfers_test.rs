mod common;

use anyhow::Result;
use cashpoint::application::AppError;
use cashpoint::domain::MovementKind;
use common::{StandardBank, test_service};

#[tokio::test]
async fn test_transfer_moves_money_between_accounts() -> Result<()> {
    let service = test_service().await?;
    StandardBank::create_customers(&service).await?;

    let result = service
        .transfer(StandardBank::LUIS, StandardBank::PAOLA, 500)
        .await?;

    assert_eq!(result.balance, 4500);
    assert_eq!(result.recipient_name, "Paola Olivos");
    assert_eq!(service.balance(StandardBank::LUIS).await?, 4500);
    assert_eq!(service.balance(StandardBank::PAOLA).await?, 3500);

    assert_eq!(result.outgoing.kind, MovementKind::Transfer);
    assert_eq!(result.outgoing.amount, -500);
    assert_eq!(result.outgoing.counterparty.as_deref(), Some(StandardBank::PAOLA));
    assert_eq!(result.incoming.amount, 500);
    assert_eq!(result.incoming.counterparty.as_deref(), Some(StandardBank::LUIS));

    Ok(())
}

#[tokio::test]
async fn test_transfer_recorded_on_both_histories() -> Result<()> {
    let service = test_service().await?;
    StandardBank::create_customers(&service).await?;

    service
        .transfer(StandardBank::SALAZAR, StandardBank::LUIS, 1200)
        .await?;

    let sent = service.history(StandardBank::SALAZAR).await?;
    let received = service.history(StandardBank::LUIS).await?;
    assert_eq!(sent.len(), 2);
    assert_eq!(received.len(), 2);

    let out = sent.last().unwrap();
    assert_eq!(out.kind, MovementKind::Transfer);
    assert_eq!(out.detail(), format!("To: {}", StandardBank::LUIS));
    let inc = received.last().unwrap();
    assert_eq!(inc.detail(), format!("From: {}", StandardBank::SALAZAR));

    // The outgoing side is recorded first
    assert!(out.sequence < inc.sequence);

    Ok(())
}

#[tokio::test]
async fn test_failed_transfer_touches_neither_account() -> Result<()> {
    let service = test_service().await?;
    StandardBank::create_customers(&service).await?;

    let err = service
        .transfer(StandardBank::PAOLA, StandardBank::LUIS, 3001)
        .await;
    assert!(matches!(err, Err(AppError::InsufficientFunds { required: 3001, .. })));

    let err = service
        .transfer(StandardBank::PAOLA, "001-000000", 100)
        .await;
    assert!(matches!(err, Err(AppError::AccountNotFound(_))));

    let err = service
        .transfer("001-000000", StandardBank::PAOLA, 100)
        .await;
    assert!(matches!(err, Err(AppError::AccountNotFound(_))));

    let err = service
        .transfer(StandardBank::PAOLA, StandardBank::PAOLA, 100)
        .await;
    assert!(matches!(err, Err(AppError::SelfTransfer(_))));

    let err = service
        .transfer(StandardBank::PAOLA, StandardBank::LUIS, 0)
        .await;
    assert!(matches!(err, Err(AppError::InvalidAmount(_))));

    assert_eq!(service.balance(StandardBank::PAOLA).await?, 3000);
    assert_eq!(service.balance(StandardBank::LUIS).await?, 5000);
    assert_eq!(service.history(StandardBank::PAOLA).await?.len(), 1);
    assert_eq!(service.history(StandardBank::LUIS).await?.len(), 1);
    assert!(service.check_integrity().await?.is_healthy());

    Ok(())
}

#[tokio::test]
async fn test_transfer_of_entire_balance() -> Result<()> {
    let service = test_service().await?;
    StandardBank::create_customers(&service).await?;

    let result = service
        .transfer(StandardBank::PAOLA, StandardBank::SALAZAR, 3000)
        .await?;
    assert_eq!(result.balance, 0);
    assert_eq!(service.balance(StandardBank::SALAZAR).await?, 10000);

    let err = service
        .transfer(StandardBank::PAOLA, StandardBank::SALAZAR, 1)
        .await;
    assert!(matches!(err, Err(AppError::InsufficientFunds { balance: 0, .. })));

    Ok(())
}

#[tokio::test]
async fn test_transfers_conserve_total_money() -> Result<()> {
    let service = test_service().await?;
    StandardBank::create_customers(&service).await?;

    service
        .transfer(StandardBank::LUIS, StandardBank::PAOLA, 700)
        .await?;
    service
        .transfer(StandardBank::PAOLA, StandardBank::SALAZAR, 2500)
        .await?;
    service
        .transfer(StandardBank::SALAZAR, StandardBank::LUIS, 4100)
        .await?;

    let total = service.balance(StandardBank::LUIS).await?
        + service.balance(StandardBank::PAOLA).await?
        + service.balance(StandardBank::SALAZAR).await?;
    assert_eq!(total, 15000);

    Ok(())
}

#[tokio::test]
async fn test_transfer_overflowing_destination_rolls_back() -> Result<()> {
    let service = test_service().await?;
    StandardBank::create_customers(&service).await?;
    service
        .register_customer(4, "Marta Ruiz".into(), "0000".into())
        .await?;
    service
        .register_account("001-444444".into(), 4, i64::MAX - 10)
        .await?;

    let err = service
        .transfer(StandardBank::PAOLA, "001-444444", 11)
        .await;
    assert!(matches!(err, Err(AppError::InvalidAmount(_))));

    assert_eq!(service.balance(StandardBank::PAOLA).await?, 3000);
    assert_eq!(service.balance("001-444444").await?, i64::MAX - 10);
    assert_eq!(service.history(StandardBank::PAOLA).await?.len(), 1);

    Ok(())
}
