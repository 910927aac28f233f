//! # Status State Machines
//!
//! Purchases, commissions and marketer requests each move through a small,
//! closed set of states. The transition tables below are the single source
//! of truth; storage updates are conditional on the `from` state so a lost
//! race surfaces as a failed transition instead of a double write.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PaymentStatus                                                          │
//! │                                                                         │
//! │     pending ──► completed ──► refunded                                  │
//! │        │                                                                │
//! │        └──────► failed                                                  │
//! │                                                                         │
//! │  CommissionStatus                                                       │
//! │                                                                         │
//! │     pending ──► paid                                                    │
//! │        │                                                                │
//! │        └──────► cancelled                                               │
//! │                                                                         │
//! │  RequestStatus                                                          │
//! │                                                                         │
//! │     pending ──► approved                                                │
//! │        │                                                                │
//! │        └──────► rejected                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};

// =============================================================================
// State Machine Trait
// =============================================================================

/// A status enum with an explicit transition table.
pub trait StatusMachine: Copy + Eq + fmt::Display + 'static {
    /// Entity name used in error messages (`"purchase"`, `"commission"`...).
    const ENTITY: &'static str;

    /// Every state, in declaration order.
    const ALL: &'static [Self];

    /// Whether `self → to` is an allowed edge.
    fn can_transition(self, to: Self) -> bool;

    /// A terminal state has no outgoing edges.
    fn is_terminal(self) -> bool {
        !Self::ALL.iter().any(|next| self.can_transition(*next))
    }

    /// Returns `InvalidTransition` unless `self → to` is allowed.
    fn ensure_transition(self, id: &str, to: Self) -> CoreResult<()> {
        if self.can_transition(to) {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition {
                entity: Self::ENTITY,
                id: id.to_string(),
                from: self.to_string(),
                to: to.to_string(),
            })
        }
    }
}

/// Parses a lowercase status name, listing allowed values on failure.
fn parse_status<S: StatusMachine>(field: &str, raw: &str) -> Result<S, ValidationError> {
    S::ALL
        .iter()
        .copied()
        .find(|s| s.to_string() == raw)
        .ok_or_else(|| ValidationError::NotAllowed {
            field: field.to_string(),
            allowed: S::ALL.iter().map(|s| s.to_string()).collect(),
        })
}

// =============================================================================
// Payment Status
// =============================================================================

/// Payment state of a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Awaiting the payment gateway.
    Pending,
    /// Paid; referral usage and commission recorded.
    Completed,
    /// Payment failed; no usage consumed.
    Failed,
    /// Money returned after completion.
    Refunded,
}

impl PaymentStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl StatusMachine for PaymentStatus {
    const ENTITY: &'static str = "purchase";
    const ALL: &'static [Self] = &[
        PaymentStatus::Pending,
        PaymentStatus::Completed,
        PaymentStatus::Failed,
        PaymentStatus::Refunded,
    ];

    fn can_transition(self, to: Self) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, to),
            (Pending, Completed) | (Pending, Failed) | (Completed, Refunded)
        )
    }
}

// =============================================================================
// Commission Status
// =============================================================================

/// Payout state of a commission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
    /// Accrued, awaiting payout.
    Pending,
    /// Paid out to the marketer.
    Paid,
    /// Voided (refund or admin action).
    Cancelled,
}

impl CommissionStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            CommissionStatus::Pending => "pending",
            CommissionStatus::Paid => "paid",
            CommissionStatus::Cancelled => "cancelled",
        }
    }
}

impl StatusMachine for CommissionStatus {
    const ENTITY: &'static str = "commission";
    const ALL: &'static [Self] = &[
        CommissionStatus::Pending,
        CommissionStatus::Paid,
        CommissionStatus::Cancelled,
    ];

    fn can_transition(self, to: Self) -> bool {
        use CommissionStatus::*;
        matches!((self, to), (Pending, Paid) | (Pending, Cancelled))
    }
}

// =============================================================================
// Request Status
// =============================================================================

/// Review state of a marketer registration request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }

    /// Pending and approved requests block a new application.
    pub const fn blocks_new_application(&self) -> bool {
        matches!(self, RequestStatus::Pending | RequestStatus::Approved)
    }
}

impl StatusMachine for RequestStatus {
    const ENTITY: &'static str = "marketer request";
    const ALL: &'static [Self] = &[
        RequestStatus::Pending,
        RequestStatus::Approved,
        RequestStatus::Rejected,
    ];

    fn can_transition(self, to: Self) -> bool {
        use RequestStatus::*;
        matches!((self, to), (Pending, Approved) | (Pending, Rejected))
    }
}

// =============================================================================
// Display / FromStr
// =============================================================================

macro_rules! status_text {
    ($($ty:ty => $field:literal),* $(,)?) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }

            impl FromStr for $ty {
                type Err = ValidationError;

                fn from_str(raw: &str) -> Result<Self, Self::Err> {
                    parse_status($field, raw)
                }
            }
        )*
    };
}

status_text! {
    PaymentStatus => "payment_status",
    CommissionStatus => "status",
    RequestStatus => "status",
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn edges<S: StatusMachine>() -> Vec<(S, S)> {
        let mut out = Vec::new();
        for from in S::ALL {
            for to in S::ALL {
                if from.can_transition(*to) {
                    out.push((*from, *to));
                }
            }
        }
        out
    }

    #[test]
    fn test_payment_transition_table() {
        use PaymentStatus::*;
        assert_eq!(
            edges::<PaymentStatus>(),
            vec![(Pending, Completed), (Pending, Failed), (Completed, Refunded)]
        );
        assert!(Failed.is_terminal());
        assert!(Refunded.is_terminal());
        assert!(!Completed.is_terminal());
    }

    #[test]
    fn test_commission_transition_table() {
        use CommissionStatus::*;
        assert_eq!(
            edges::<CommissionStatus>(),
            vec![(Pending, Paid), (Pending, Cancelled)]
        );
        assert!(Paid.is_terminal());
        assert!(Cancelled.is_terminal());
    }

    #[test]
    fn test_request_transition_table() {
        use RequestStatus::*;
        assert_eq!(
            edges::<RequestStatus>(),
            vec![(Pending, Approved), (Pending, Rejected)]
        );
        assert!(Pending.blocks_new_application());
        assert!(Approved.blocks_new_application());
        assert!(!Rejected.blocks_new_application());
    }

    #[test]
    fn test_ensure_transition_error() {
        let err = CommissionStatus::Paid
            .ensure_transition("c-9", CommissionStatus::Paid)
            .unwrap_err();
        match err {
            CoreError::InvalidTransition { entity, id, from, to } => {
                assert_eq!(entity, "commission");
                assert_eq!(id, "c-9");
                assert_eq!(from, "paid");
                assert_eq!(to, "paid");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("paid".parse::<CommissionStatus>().unwrap(), CommissionStatus::Paid);
        assert_eq!("refunded".parse::<PaymentStatus>().unwrap(), PaymentStatus::Refunded);
        let err = "done".parse::<RequestStatus>().unwrap_err();
        assert!(matches!(err, ValidationError::NotAllowed { ref allowed, .. } if allowed.len() == 3));
    }

    #[test]
    fn test_status_serde_matches_display() {
        for status in CommissionStatus::ALL {
            let json = serde_json::to_string(status).unwrap();
            assert_eq!(json, format!("\"{status}\""));
        }
    }
}
