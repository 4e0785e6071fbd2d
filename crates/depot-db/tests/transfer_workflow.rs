//! End-to-end transfer workflow, mostly against an in-memory database.

use depot_core::{
    ItemQuantity, MovementFilter, MovementType, NewLocation, NewMovement, NewProduct,
    NewTransfer, NewTransferItem, NewVariant, Pagination, ReferenceType, TransferFilter,
    TransferStatus,
};
use depot_db::{Database, DbConfig, DbError};

struct World {
    db: Database,
    a: String,
    b: String,
    product: String,
    other: String,
}

async fn world() -> World {
    populate(Database::new(DbConfig::in_memory()).await.unwrap()).await
}

/// Two stores, two products, 20 of `product` and 3 of `other` at A.
async fn populate(db: Database) -> World {
    let catalog = db.catalog();

    let a = catalog.create_location(&NewLocation::new("A", "Store A")).await.unwrap();
    let b = catalog.create_location(&NewLocation::new("B", "Store B")).await.unwrap();

    let product = catalog
        .create_product(&NewProduct {
            sku: "P-001".to_string(),
            name: "Widget".to_string(),
        })
        .await
        .unwrap();
    let other = catalog
        .create_product(&NewProduct {
            sku: "P-002".to_string(),
            name: "Gadget".to_string(),
        })
        .await
        .unwrap();

    let ledger = db.ledger();
    ledger
        .record_movement(&NewMovement::new(&product.id, MovementType::In, 20, "setup").at_location(&a.id))
        .await
        .unwrap();
    ledger
        .record_movement(&NewMovement::new(&other.id, MovementType::In, 3, "setup").at_location(&a.id))
        .await
        .unwrap();

    World {
        db,
        a: a.id,
        b: b.id,
        product: product.id,
        other: other.id,
    }
}

impl World {
    fn request(&self, items: Vec<NewTransferItem>) -> NewTransfer {
        NewTransfer {
            from_location_id: self.a.clone(),
            to_location_id: self.b.clone(),
            items,
            requested_by: "clerk".to_string(),
            notes: None,
        }
    }

    async fn qty(&self, location_id: &str, product_id: &str) -> i64 {
        self.db
            .aggregates()
            .location_total(location_id, product_id, None)
            .await
            .unwrap()
    }

    async fn movement_count(&self) -> i64 {
        self.db
            .ledger()
            .query(&MovementFilter::default(), Pagination::default())
            .await
            .unwrap()
            .total
    }
}

#[tokio::test]
async fn test_scenarios_a_through_d() {
    let w = world().await;
    let transfers = w.db.transfers();
    let movements_before = w.movement_count().await;

    // A: create
    let created = transfers
        .create(&w.request(vec![NewTransferItem::new(&w.product, 10)]))
        .await
        .unwrap();
    let id = created.transfer.id.clone();
    assert_eq!(created.transfer.status, TransferStatus::Pending);
    assert_eq!(w.movement_count().await, movements_before);
    assert_eq!(w.qty(&w.a, &w.product).await, 20);
    assert_eq!(w.qty(&w.b, &w.product).await, 0);

    // B: approve as requested
    let approved = transfers.approve(&id, "manager", None).await.unwrap();
    assert_eq!(approved.transfer.status, TransferStatus::InTransit);
    assert_eq!(approved.transfer.approved_by.as_deref(), Some("manager"));
    assert!(approved.transfer.approval_date.is_some());
    assert_eq!(approved.items[0].approved_quantity, Some(10));
    assert_eq!(w.qty(&w.a, &w.product).await, 20);

    // C: receive 8 of 10
    let eight = [ItemQuantity::new(&w.product, 8)];
    let received = transfers.receive(&id, "receiver", Some(&eight[..])).await.unwrap();
    assert_eq!(received.transfer.status, TransferStatus::Received);
    assert_eq!(received.items[0].received_quantity, Some(8));
    assert_eq!(w.qty(&w.a, &w.product).await, 12);
    assert_eq!(w.qty(&w.b, &w.product).await, 8);

    let legs = w.db.ledger().by_reference(ReferenceType::Transfer, &id).await.unwrap();
    assert_eq!(legs.len(), 2);
    assert!(legs.iter().all(|m| m.movement_type == MovementType::Transfer));
    assert_eq!(legs.iter().map(|m| m.quantity).sum::<i64>(), 0);
    assert_eq!(legs[0].location_id.as_deref(), Some(w.a.as_str()));
    assert_eq!(legs[0].quantity, -8);
    assert_eq!(legs[1].location_id.as_deref(), Some(w.b.as_str()));
    assert_eq!(legs[1].quantity, 8);

    // D: receive again
    let err = transfers.receive(&id, "receiver", None).await.unwrap_err();
    assert!(matches!(err, DbError::InvalidState { .. }));
    assert_eq!(w.qty(&w.a, &w.product).await, 12);
    assert_eq!(w.qty(&w.b, &w.product).await, 8);
    assert_eq!(
        w.db.ledger().by_reference(ReferenceType::Transfer, &id).await.unwrap().len(),
        2
    );
}

#[tokio::test]
async fn test_scenario_e_same_location_rejected() {
    let w = world().await;
    let transfers = w.db.transfers();

    let mut request = w.request(vec![NewTransferItem::new(&w.product, 1)]);
    request.to_location_id = w.a.clone();

    let err = transfers.create(&request).await.unwrap_err();
    assert!(matches!(err, DbError::Validation(_)));

    let page = transfers
        .list(&TransferFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn test_receive_is_all_or_nothing() {
    let w = world().await;
    let transfers = w.db.transfers();

    // `other` has only 3 at A; approval does not block, receive must.
    let created = transfers
        .create(&w.request(vec![
            NewTransferItem::new(&w.product, 5),
            NewTransferItem::new(&w.other, 4),
        ]))
        .await
        .unwrap();
    let id = created.transfer.id;
    transfers.approve(&id, "manager", None).await.unwrap();

    let movements_before = w.movement_count().await;
    let err = transfers.receive(&id, "receiver", None).await.unwrap_err();
    assert!(matches!(
        err,
        DbError::InsufficientStock { available: 3, requested: 4, .. }
    ));

    // The first item's legs were rolled back too.
    assert_eq!(w.movement_count().await, movements_before);
    assert_eq!(w.qty(&w.a, &w.product).await, 20);
    assert_eq!(w.qty(&w.b, &w.product).await, 0);

    let detail = transfers.get(&id).await.unwrap();
    assert_eq!(detail.transfer.status, TransferStatus::InTransit);
    assert!(detail.items.iter().all(|i| i.received_quantity.is_none()));

    // Receiving what is actually there succeeds.
    let partial = [ItemQuantity::new(&w.other, 3)];
    transfers.receive(&id, "receiver", Some(&partial[..])).await.unwrap();
    assert_eq!(w.qty(&w.a, &w.other).await, 0);
    assert_eq!(w.qty(&w.b, &w.other).await, 3);
    assert_eq!(w.qty(&w.b, &w.product).await, 5);
}

#[tokio::test]
async fn test_negative_source_allowed_by_policy() {
    let w = world().await;
    w.db.catalog().set_allow_negative_stock(&w.a, true).await.unwrap();
    let transfers = w.db.transfers();

    let created = transfers
        .create(&w.request(vec![NewTransferItem::new(&w.other, 5)]))
        .await
        .unwrap();
    transfers.approve(&created.transfer.id, "manager", None).await.unwrap();
    transfers.receive(&created.transfer.id, "receiver", None).await.unwrap();

    assert_eq!(w.qty(&w.a, &w.other).await, -2);
    assert_eq!(w.qty(&w.b, &w.other).await, 5);
}

#[tokio::test]
async fn test_invalid_transitions_leave_record_unchanged() {
    let w = world().await;
    let transfers = w.db.transfers();

    let created = transfers
        .create(&w.request(vec![NewTransferItem::new(&w.product, 2)]))
        .await
        .unwrap();
    let id = created.transfer.id.clone();

    // Receive before approve.
    let err = transfers.receive(&id, "receiver", None).await.unwrap_err();
    assert!(matches!(err, DbError::InvalidState { .. }));
    assert_eq!(transfers.get(&id).await.unwrap(), created);

    transfers.cancel(&id, Some("clerk")).await.unwrap();
    let cancelled = transfers.get(&id).await.unwrap();

    for result in [
        transfers.approve(&id, "manager", None).await,
        transfers.receive(&id, "receiver", None).await,
        transfers.cancel(&id, None).await,
    ] {
        assert!(matches!(result, Err(DbError::InvalidState { .. })));
    }
    assert_eq!(transfers.get(&id).await.unwrap(), cancelled);
    assert_eq!(w.qty(&w.a, &w.product).await, 20);
}

#[tokio::test]
async fn test_received_override_above_approved_rejected() {
    let w = world().await;
    let transfers = w.db.transfers();

    let created = transfers
        .create(&w.request(vec![NewTransferItem::new(&w.product, 10)]))
        .await
        .unwrap();
    let id = created.transfer.id;

    let six = [ItemQuantity::new(&w.product, 6)];
    transfers.approve(&id, "manager", Some(&six[..])).await.unwrap();

    let seven = [ItemQuantity::new(&w.product, 7)];
    let err = transfers.receive(&id, "receiver", Some(&seven[..])).await.unwrap_err();
    assert!(matches!(err, DbError::Validation(_)));

    let detail = transfers.receive(&id, "receiver", None).await.unwrap();
    assert_eq!(detail.items[0].received_quantity, Some(6));
    assert_eq!(w.qty(&w.b, &w.product).await, 6);
}

#[tokio::test]
async fn test_zero_received_writes_no_movements() {
    let w = world().await;
    let transfers = w.db.transfers();

    let created = transfers
        .create(&w.request(vec![NewTransferItem::new(&w.product, 4)]))
        .await
        .unwrap();
    let id = created.transfer.id;
    transfers.approve(&id, "manager", None).await.unwrap();

    let none = [ItemQuantity::new(&w.product, 0)];
    let detail = transfers.receive(&id, "receiver", Some(&none[..])).await.unwrap();

    assert_eq!(detail.transfer.status, TransferStatus::Received);
    assert_eq!(detail.items[0].received_quantity, Some(0));
    assert!(w
        .db
        .ledger()
        .by_reference(ReferenceType::Transfer, &id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_conservation_and_reconciliation_with_variants() {
    let w = world().await;
    let catalog = w.db.catalog();
    let variant = catalog
        .create_variant(&NewVariant {
            product_id: w.product.clone(),
            sku: "P-001-RED".to_string(),
            name: "Red".to_string(),
        })
        .await
        .unwrap();

    w.db
        .stock()
        .adjust(&w.a, &w.product, Some(variant.id.as_str()), 9, "setup", Some("count"))
        .await
        .unwrap();

    let transfers = w.db.transfers();
    let mut item = NewTransferItem::new(&w.product, 6);
    item.variant_id = Some(variant.id.clone());

    let total_before = w
        .db
        .aggregates()
        .product_total(&w.product, Some(variant.id.as_str()))
        .await
        .unwrap()
        .quantity;

    let created = transfers
        .create(&w.request(vec![item, NewTransferItem::new(&w.product, 6)]))
        .await
        .unwrap();
    transfers.approve(&created.transfer.id, "manager", None).await.unwrap();
    transfers.receive(&created.transfer.id, "receiver", None).await.unwrap();

    let aggregates = w.db.aggregates();
    assert_eq!(
        aggregates.location_total(&w.a, &w.product, Some(variant.id.as_str())).await.unwrap(),
        3
    );
    assert_eq!(
        aggregates.location_total(&w.b, &w.product, Some(variant.id.as_str())).await.unwrap(),
        6
    );
    assert_eq!(
        aggregates.product_total(&w.product, Some(variant.id.as_str())).await.unwrap().quantity,
        total_before
    );
    assert_eq!(w.qty(&w.a, &w.product).await, 14);
    assert_eq!(w.qty(&w.b, &w.product).await, 6);

    assert!(w.db.ledger().unbalanced().await.unwrap().is_empty());

    let reconciliation = w
        .db
        .ledger()
        .reconcile(&w.b, &w.product, Some(variant.id.as_str()))
        .await
        .unwrap();
    assert!(reconciliation.is_balanced());
    assert_eq!(reconciliation.ledger_quantity, 6);
}

#[tokio::test]
async fn test_inactive_location_cannot_start_transfer() {
    let w = world().await;
    w.db.catalog().set_location_active(&w.b, false).await.unwrap();

    let err = w
        .db
        .transfers()
        .create(&w.request(vec![NewTransferItem::new(&w.product, 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Validation(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_receives_apply_once() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(DbConfig::new(dir.path().join("depot.db")).max_connections(4))
        .await
        .unwrap();
    let w = populate(db).await;

    let transfers = w.db.transfers();
    let created = transfers
        .create(&w.request(vec![NewTransferItem::new(&w.product, 5)]))
        .await
        .unwrap();
    let id = created.transfer.id;
    transfers.approve(&id, "manager", None).await.unwrap();

    let handles: Vec<_> = (0..4)
        .map(|n| {
            let transfers = w.db.transfers();
            let id = id.clone();
            tokio::spawn(async move { transfers.receive(&id, &format!("receiver-{}", n), None).await })
        })
        .collect();

    let mut received = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(detail) => {
                assert_eq!(detail.transfer.status, TransferStatus::Received);
                received += 1;
            }
            Err(DbError::ConcurrencyConflict(_)) | Err(DbError::InvalidState { .. }) => {}
            Err(other) => panic!("unexpected receive error: {:?}", other),
        }
    }

    assert_eq!(received, 1);
    assert_eq!(w.qty(&w.a, &w.product).await, 15);
    assert_eq!(w.qty(&w.b, &w.product).await, 5);
    assert!(w.db.ledger().unbalanced().await.unwrap().is_empty());
}
