//! # Lifecycle State Machines
//!
//! Declarative transition tables for orders and payments, checked at runtime
//! before any field is mutated.
//!
//! ## Transition Tables
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Order                                                                  │
//! │                                                                         │
//! │   mark_paid        CREATED ─────────────► PAID                          │
//! │   mark_cancelled   CREATED, PAID ───────► CANCELLED                     │
//! │   archive          CREATED ─────────────► ARCHIVED                      │
//! │                                                                         │
//! │  Payment                                                                │
//! │                                                                         │
//! │   mark_paid        PENDING ─────────────► PAID                          │
//! │   mark_failed      PENDING ─────────────► FAILED                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## How a transition runs
//! 1. Look up the rule for `(entity type, transition)`
//! 2. Reject with [`CoreError::IllegalTransition`] if the current state is
//!    not a source; nothing is mutated
//! 3. Set the state field
//! 4. Run the entity's `on_success` hook (timestamps)
//!
//! Persisting the entity is the caller's half of the hook: the storage layer
//! recomputes the order total, or writes the payment's `processed_at`, in the
//! same transaction.

use chrono::{DateTime, Utc};
use std::fmt;
use tracing::info;

use crate::error::{CoreError, CoreResult};
use crate::types::{Order, OrderState, Payment, PaymentState};

// =============================================================================
// Engine
// =============================================================================

/// One row of a transition table.
#[derive(Debug)]
pub struct Rule<S: 'static, T: 'static> {
    pub transition: T,
    pub sources: &'static [S],
    pub target: S,
}

/// An entity driven by a transition table.
pub trait Lifecycle {
    type State: Copy + Eq + Default + fmt::Display + 'static;
    type Transition: Copy + Eq + fmt::Display + 'static;

    /// Entity name used in errors and logs.
    const ENTITY: &'static str;

    /// The transition table.
    const RULES: &'static [Rule<Self::State, Self::Transition>];

    fn entity_id(&self) -> &str;

    fn state(&self) -> Self::State;

    fn set_state(&mut self, state: Self::State);

    /// Runs after the state field is updated, before persistence.
    fn on_success(&mut self, _from: Self::State, _to: Self::State, _now: DateTime<Utc>) {}

    /// The state every new entity starts in.
    fn initial_state() -> Self::State {
        Self::State::default()
    }
}

/// Outcome of a successful transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transitioned<S> {
    pub from: S,
    pub to: S,
}

/// Finds the rule for `transition`.
pub fn rule_for<L: Lifecycle>(transition: L::Transition) -> Option<&'static Rule<L::State, L::Transition>> {
    L::RULES.iter().find(|rule| rule.transition == transition)
}

/// Checks whether `transition` is allowed from the entity's current state.
pub fn can_apply<L: Lifecycle>(entity: &L, transition: L::Transition) -> bool {
    rule_for::<L>(transition).is_some_and(|rule| rule.sources.contains(&entity.state()))
}

/// Applies `transition` to `entity`.
///
/// ## Errors
/// [`CoreError::IllegalTransition`] when the current state is not in the
/// rule's source set. The entity is left untouched.
pub fn apply<L: Lifecycle>(
    entity: &mut L,
    transition: L::Transition,
    now: DateTime<Utc>,
) -> CoreResult<Transitioned<L::State>> {
    let from = entity.state();

    let rule = rule_for::<L>(transition).ok_or_else(|| CoreError::IllegalTransition {
        entity: L::ENTITY,
        current: from.to_string(),
        attempted: transition.to_string(),
    })?;

    if !rule.sources.contains(&from) {
        return Err(CoreError::IllegalTransition {
            entity: L::ENTITY,
            current: from.to_string(),
            attempted: rule.target.to_string(),
        });
    }

    entity.set_state(rule.target);
    entity.on_success(from, rule.target, now);

    info!(
        entity = L::ENTITY,
        id = %entity.entity_id(),
        %transition,
        %from,
        to = %rule.target,
        "State transition"
    );

    Ok(Transitioned {
        from,
        to: rule.target,
    })
}

// =============================================================================
// Order Lifecycle
// =============================================================================

/// Transitions available on an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderTransition {
    MarkPaid,
    MarkCancelled,
    Archive,
}

impl fmt::Display for OrderTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OrderTransition::MarkPaid => "mark_paid",
            OrderTransition::MarkCancelled => "mark_cancelled",
            OrderTransition::Archive => "archive",
        })
    }
}

impl Lifecycle for Order {
    type State = OrderState;
    type Transition = OrderTransition;

    const ENTITY: &'static str = "Order";

    const RULES: &'static [Rule<OrderState, OrderTransition>] = &[
        Rule {
            transition: OrderTransition::MarkPaid,
            sources: &[OrderState::Created],
            target: OrderState::Paid,
        },
        Rule {
            transition: OrderTransition::MarkCancelled,
            sources: &[OrderState::Created, OrderState::Paid],
            target: OrderState::Cancelled,
        },
        Rule {
            transition: OrderTransition::Archive,
            sources: &[OrderState::Created],
            target: OrderState::Archived,
        },
    ];

    fn entity_id(&self) -> &str {
        &self.id
    }

    fn state(&self) -> OrderState {
        self.state
    }

    fn set_state(&mut self, state: OrderState) {
        self.state = state;
    }

    fn on_success(&mut self, _from: OrderState, _to: OrderState, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

// =============================================================================
// Payment Lifecycle
// =============================================================================

/// Transitions available on a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentTransition {
    MarkPaid,
    MarkFailed,
}

impl fmt::Display for PaymentTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PaymentTransition::MarkPaid => "mark_paid",
            PaymentTransition::MarkFailed => "mark_failed",
        })
    }
}

impl Lifecycle for Payment {
    type State = PaymentState;
    type Transition = PaymentTransition;

    const ENTITY: &'static str = "Payment";

    const RULES: &'static [Rule<PaymentState, PaymentTransition>] = &[
        Rule {
            transition: PaymentTransition::MarkPaid,
            sources: &[PaymentState::Pending],
            target: PaymentState::Paid,
        },
        Rule {
            transition: PaymentTransition::MarkFailed,
            sources: &[PaymentState::Pending],
            target: PaymentState::Failed,
        },
    ];

    fn entity_id(&self) -> &str {
        &self.id
    }

    fn state(&self) -> PaymentState {
        self.state
    }

    fn set_state(&mut self, state: PaymentState) {
        self.state = state;
    }

    fn on_success(&mut self, _from: PaymentState, to: PaymentState, now: DateTime<Utc>) {
        if to.is_terminal() {
            self.processed_at = Some(now);
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PaymentMethod;

    fn order_in(state: OrderState) -> Order {
        let mut order = Order::new("loc", Utc::now());
        order.state = state;
        order
    }

    fn payment_in(state: PaymentState) -> Payment {
        let mut payment = Payment::new(&Order::new("loc", Utc::now()), PaymentMethod::Card, Utc::now());
        payment.state = state;
        payment
    }

    #[test]
    fn test_every_transition_has_exactly_one_rule() {
        for t in [OrderTransition::MarkPaid, OrderTransition::MarkCancelled, OrderTransition::Archive] {
            assert_eq!(Order::RULES.iter().filter(|r| r.transition == t).count(), 1);
        }
        for t in [PaymentTransition::MarkPaid, PaymentTransition::MarkFailed] {
            assert_eq!(Payment::RULES.iter().filter(|r| r.transition == t).count(), 1);
        }
    }

    #[test]
    fn test_initial_states() {
        assert_eq!(Order::initial_state(), OrderState::Created);
        assert_eq!(Payment::initial_state(), PaymentState::Pending);
    }

    #[test]
    fn test_order_table() {
        let cases = [
            (OrderState::Created, OrderTransition::MarkPaid, Some(OrderState::Paid)),
            (OrderState::Paid, OrderTransition::MarkPaid, None),
            (OrderState::Created, OrderTransition::MarkCancelled, Some(OrderState::Cancelled)),
            (OrderState::Paid, OrderTransition::MarkCancelled, Some(OrderState::Cancelled)),
            (OrderState::Archived, OrderTransition::MarkCancelled, None),
            (OrderState::Created, OrderTransition::Archive, Some(OrderState::Archived)),
            (OrderState::Paid, OrderTransition::Archive, None),
            (OrderState::Cancelled, OrderTransition::Archive, None),
        ];

        for (from, transition, expected) in cases {
            let mut order = order_in(from);
            let result = apply(&mut order, transition, Utc::now());
            match expected {
                Some(to) => {
                    assert_eq!(result.unwrap(), Transitioned { from, to });
                    assert_eq!(order.state, to);
                }
                None => {
                    assert!(matches!(result, Err(CoreError::IllegalTransition { .. })));
                    assert_eq!(order.state, from, "illegal transition must not mutate");
                }
            }
        }
    }

    #[test]
    fn test_illegal_transition_reports_entity_state_and_target() {
        let mut order = order_in(OrderState::Paid);
        let err = apply(&mut order, OrderTransition::Archive, Utc::now()).unwrap_err();
        assert_eq!(
            err,
            CoreError::IllegalTransition {
                entity: "Order",
                current: "paid".to_string(),
                attempted: "archived".to_string(),
            }
        );
    }

    #[test]
    fn test_payment_processed_at_set_only_on_terminal_transition() {
        let mut payment = payment_in(PaymentState::Pending);
        assert!(payment.processed_at.is_none());

        let now = Utc::now();
        apply(&mut payment, PaymentTransition::MarkFailed, now).unwrap();
        assert_eq!(payment.state, PaymentState::Failed);
        assert_eq!(payment.processed_at, Some(now));

        // Failed is terminal
        let err = apply(&mut payment, PaymentTransition::MarkPaid, Utc::now());
        assert!(err.is_err());
        assert_eq!(payment.processed_at, Some(now));
    }

    #[test]
    fn test_order_hook_touches_updated_at() {
        let mut order = order_in(OrderState::Created);
        let later = order.updated_at + chrono::Duration::seconds(30);
        apply(&mut order, OrderTransition::MarkPaid, later).unwrap();
        assert_eq!(order.updated_at, later);
    }

    #[test]
    fn test_can_apply() {
        let order = order_in(OrderState::Paid);
        assert!(can_apply(&order, OrderTransition::MarkCancelled));
        assert!(!can_apply(&order, OrderTransition::Archive));
    }
}
