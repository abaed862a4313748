//! Order status transitions and who may cancel what.

use kirana_core::{OrderStatus, UserId};
use kirana_integration_tests::order;
use kirana_storefront::services::checkout::{Actor, CheckoutError, check_cancellation};

const ALL: [OrderStatus; 6] = [
    OrderStatus::Pending,
    OrderStatus::Confirmed,
    OrderStatus::Processing,
    OrderStatus::Shipped,
    OrderStatus::Delivered,
    OrderStatus::Cancelled,
];

#[test]
fn test_happy_path_walks_forward_one_step_at_a_time() {
    let path = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ];
    for pair in path.windows(2) {
        assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
    }
    assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Shipped));
    assert!(!OrderStatus::Confirmed.can_transition_to(OrderStatus::Delivered));
}

#[test]
fn test_terminal_statuses_go_nowhere() {
    for from in [OrderStatus::Delivered, OrderStatus::Cancelled] {
        assert!(from.is_terminal());
        for to in ALL {
            assert!(!from.can_transition_to(to), "{from} -> {to}");
        }
    }
}

#[test]
fn test_shipped_orders_cannot_be_cancelled() {
    assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));
    for from in [OrderStatus::Pending, OrderStatus::Confirmed, OrderStatus::Processing] {
        assert!(from.can_transition_to(OrderStatus::Cancelled), "{from}");
    }
}

#[test]
fn test_customer_cancels_own_early_orders() {
    for status in [OrderStatus::Pending, OrderStatus::Confirmed] {
        assert!(check_cancellation(&order(7, status), Actor::Customer(UserId::new(7))).is_ok());
    }
}

#[test]
fn test_customer_cannot_cancel_once_processing() {
    let result = check_cancellation(
        &order(7, OrderStatus::Processing),
        Actor::Customer(UserId::new(7)),
    );
    assert!(matches!(
        result,
        Err(CheckoutError::NotCancellable(OrderStatus::Processing))
    ));
}

#[test]
fn test_someone_elses_order_looks_missing() {
    let result = check_cancellation(
        &order(7, OrderStatus::Pending),
        Actor::Customer(UserId::new(8)),
    );
    assert!(matches!(result, Err(CheckoutError::OrderNotFound)));
}

#[test]
fn test_admin_cancels_until_shipped() {
    assert!(check_cancellation(&order(7, OrderStatus::Processing), Actor::Admin).is_ok());

    for status in [OrderStatus::Shipped, OrderStatus::Delivered, OrderStatus::Cancelled] {
        let result = check_cancellation(&order(7, status), Actor::Admin);
        assert!(
            matches!(
                result,
                Err(CheckoutError::InvalidTransition {
                    to: OrderStatus::Cancelled,
                    ..
                })
            ),
            "{status}"
        );
    }
}
