//! Deal records and the two-approver state machine.

use chrono::Utc;
use uuid7::uuid7;

use crate::stone::TimeStamp;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupplierAction {
    #[n(0)]
    Pending,
    #[n(1)]
    Accepted,
    #[n(2)]
    Rejected,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    #[n(0)]
    Pending,
    #[n(1)]
    Approved,
    #[n(2)]
    Rejected,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalStatus {
    #[n(0)]
    Open,
    #[n(1)]
    Completed,
    #[n(2)]
    Closed,
}

impl std::fmt::Display for SupplierAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SupplierAction::Pending => "PENDING",
            SupplierAction::Accepted => "ACCEPTED",
            SupplierAction::Rejected => "REJECTED",
        })
    }
}

impl std::fmt::Display for AdminAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            AdminAction::Pending => "PENDING",
            AdminAction::Approved => "APPROVED",
            AdminAction::Rejected => "REJECTED",
        })
    }
}

impl std::fmt::Display for FinalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            FinalStatus::Open => "OPEN",
            FinalStatus::Completed => "COMPLETED",
            FinalStatus::Closed => "CLOSED",
        })
    }
}

/// A supplier's answer to an open deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupplierDecision {
    Accept,
    Reject,
}

/// An admin's answer to a supplier-accepted deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminDecision {
    Approve,
    Reject,
}

/// A negotiation binding one stone, one client, one supplier and the admin
/// approval gate. The price snapshot is immutable; only the two approver
/// transitions mutate the record, and terminal states freeze it.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct Deal {
    #[n(0)]
    pub deal_id: String,
    #[n(1)]
    pub stock_id: String,
    #[n(2)]
    pub supplier: String,
    #[n(3)]
    pub client: String,
    /// The stone's price per carat at deal-creation time.
    #[n(4)]
    pub list_price: f64,
    #[n(5)]
    pub offer_price: f64,
    #[n(6)]
    pub supplier_action: SupplierAction,
    #[n(7)]
    pub admin_action: AdminAction,
    #[n(8)]
    pub final_status: FinalStatus,
    #[n(9)]
    pub created_at: TimeStamp<Utc>,
}

impl Deal {
    /// Opens a fresh deal in `(PENDING, PENDING, OPEN)`. The caller must
    /// already hold the stone's lock.
    pub fn new(
        stock_id: &str,
        supplier: &str,
        client: &str,
        list_price: f64,
        offer_price: f64,
    ) -> Self {
        Self {
            deal_id: new_deal_id(),
            stock_id: stock_id.to_string(),
            supplier: supplier.to_string(),
            client: client.to_string(),
            list_price,
            offer_price,
            supplier_action: SupplierAction::Pending,
            admin_action: AdminAction::Pending,
            final_status: FinalStatus::Open,
            created_at: TimeStamp::new(),
        }
    }

    pub fn state(&self) -> (SupplierAction, AdminAction, FinalStatus) {
        (self.supplier_action, self.admin_action, self.final_status)
    }

    pub fn is_final(&self) -> bool {
        self.final_status != FinalStatus::Open
    }

    /// Membership check against the five legal `(supplier_action,
    /// admin_action, final_status)` triples. Anything else is rejected by
    /// the lifecycle engine before it is persisted.
    pub fn state_is_legal(state: (SupplierAction, AdminAction, FinalStatus)) -> bool {
        use AdminAction as A;
        use FinalStatus as F;
        use SupplierAction as S;

        matches!(
            state,
            (S::Pending, A::Pending, F::Open)
                | (S::Accepted, A::Pending, F::Open)
                | (S::Rejected, A::Rejected, F::Closed)
                | (S::Accepted, A::Approved, F::Completed)
                | (S::Accepted, A::Rejected, F::Closed)
        )
    }
}

/// Deal ids look like `DEAL-1A2B3C4D5E`: the random tail of a uuid7, since
/// the leading bytes are a timestamp and barely vary between deals created
/// in the same instant.
pub fn new_deal_id() -> String {
    let id = uuid7();
    format!("DEAL-{}", hex::encode_upper(&id.as_bytes()[11..16]))
}
