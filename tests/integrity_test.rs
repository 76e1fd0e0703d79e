mod common;

use anyhow::Result;
use cashpoint::domain::{BillService, compute_balance};
use common::{StandardBank, notes, test_service};

#[tokio::test]
async fn test_fresh_bank_is_consistent() -> Result<()> {
    let service = test_service().await?;
    StandardBank::create(&service).await?;

    let report = service.check_integrity().await?;
    assert!(report.is_healthy());
    assert_eq!(report.customer_count, 3);
    assert_eq!(report.account_count, 3);
    assert_eq!(report.movement_count, 3);
    assert_eq!(report.dispenser_count, 1);
    assert_eq!(report.dispensers[0].total_cash, 6300);

    Ok(())
}

#[tokio::test]
async fn test_balances_match_movements_after_activity() -> Result<()> {
    let service = test_service().await?;
    StandardBank::create(&service).await?;

    service.withdraw(StandardBank::LUIS, 300, 1).await?;
    service
        .deposit(StandardBank::PAOLA, &notes(&[(100, 2), (20, 1)]), 1)
        .await?;
    service
        .transfer(StandardBank::LUIS, StandardBank::PAOLA, 500)
        .await?;
    service
        .pay_bill(StandardBank::SALAZAR, BillService::Gas, 180)
        .await?;
    // Rejected operations leave no trace
    let _ = service.withdraw(StandardBank::PAOLA, 999_999, 1).await;
    let _ = service.transfer(StandardBank::SALAZAR, "001-000000", 10).await;

    for number in [StandardBank::LUIS, StandardBank::PAOLA, StandardBank::SALAZAR] {
        let history = service.history(number).await?;
        assert_eq!(compute_balance(&history), service.balance(number).await?);
    }

    let report = service.check_integrity().await?;
    assert!(report.is_healthy());
    assert_eq!(report.movement_count, 3 + 1 + 1 + 2 + 1);
    assert_eq!(report.dispensers[0].total_cash, 6300 - 300 + 220);

    assert_eq!(service.balance(StandardBank::LUIS).await?, 4200);
    assert_eq!(service.balance(StandardBank::PAOLA).await?, 3720);
    assert_eq!(service.balance(StandardBank::SALAZAR).await?, 6820);

    Ok(())
}

#[tokio::test]
async fn test_history_is_chronological() -> Result<()> {
    let service = test_service().await?;
    StandardBank::create(&service).await?;

    service.withdraw(StandardBank::LUIS, 100, 1).await?;
    service
        .pay_bill(StandardBank::LUIS, BillService::Water, 90)
        .await?;
    service
        .deposit(StandardBank::LUIS, &notes(&[(50, 1)]), 1)
        .await?;

    let history = service.history(StandardBank::LUIS).await?;
    let amounts: Vec<_> = history.iter().map(|m| m.amount).collect();
    assert_eq!(amounts, vec![5000, -100, -90, 50]);
    assert!(history.windows(2).all(|w| w[0].sequence < w[1].sequence));
    assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

    Ok(())
}
