use stars_blackjack::domain::ledger::{Balance, PaymentId, UserId};
use stars_blackjack::domain::ports::LedgerStoreBox;
use stars_blackjack::infrastructure::in_memory::InMemoryLedgerStore;
use stars_blackjack::infrastructure::json_file::JsonFileLedgerStore;

async fn exercise(store: LedgerStoreBox) -> (Option<Balance>, bool) {
    let user = UserId::parse("1").unwrap();
    store.store(&user, Balance::new(250)).await.unwrap();
    store
        .store_payment(&user, Balance::new(750), &PaymentId::new("p-1"))
        .await
        .unwrap();
    (
        store.load(&user).await.unwrap(),
        store.is_settled(&PaymentId::new("p-1")).await.unwrap(),
    )
}

#[tokio::test]
async fn test_stores_as_trait_objects() {
    let dir = tempfile::tempdir().unwrap();
    let in_memory: LedgerStoreBox = Box::new(InMemoryLedgerStore::new());
    let json_file: LedgerStoreBox =
        Box::new(JsonFileLedgerStore::open(dir.path().join("ledger.json")).unwrap());

    // Verify Send + Sync by spawning tasks
    let a = tokio::spawn(exercise(in_memory));
    let b = tokio::spawn(exercise(json_file));

    assert_eq!(a.await.unwrap(), (Some(Balance::new(750)), true));
    assert_eq!(b.await.unwrap(), (Some(Balance::new(750)), true));
}
