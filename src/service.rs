//! Service layer API for the deal lifecycle.
//!
//! Every conversational handler drives deals through this one engine; the
//! state logic lives nowhere else.

use std::sync::Arc;

use tracing::info;

use crate::account::{AccountBook, Role};
use crate::deal::{AdminAction, AdminDecision, Deal, FinalStatus, SupplierAction, SupplierDecision};
use crate::error::{DealError, StoreError};
use crate::history::DealHistory;
use crate::lock::StoneLockManager;
use crate::notify::{ActivityLog, Notifier, StoreActivityLog, StoreNotifier};
use crate::reconcile::Reconciler;
use crate::stock::StockBook;
use crate::store::{DEALS_PREFIX, RecordStore, deal_key, get_record, put_record};

/// One row of a bulk decision sheet, supplier side.
#[derive(Debug, Clone)]
pub struct SupplierDecisionRow {
    pub deal_id: String,
    pub decision: SupplierDecision,
}

/// One row of a bulk decision sheet, admin side.
#[derive(Debug, Clone)]
pub struct AdminDecisionRow {
    pub deal_id: String,
    pub decision: AdminDecision,
}

/// Per-row outcome of a batch; one row's failure never aborts the rest.
#[derive(Debug)]
pub struct BatchOutcome {
    pub deal_id: String,
    pub result: Result<Deal, DealError>,
}

#[derive(Clone)]
pub struct DealService {
    store: Arc<dyn RecordStore>,
    stock: StockBook,
    locks: StoneLockManager,
    reconciler: Reconciler,
    history: DealHistory,
    accounts: AccountBook,
    notifier: Arc<dyn Notifier>,
    activity: Arc<dyn ActivityLog>,
}

impl DealService {
    pub fn new(stock: StockBook, notifier: Arc<dyn Notifier>, activity: Arc<dyn ActivityLog>) -> Self {
        let store = stock.store();
        Self {
            locks: stock.locks(),
            reconciler: stock.reconciler(),
            history: DealHistory::new(store.clone()),
            accounts: AccountBook::new(store.clone()),
            stock,
            store,
            notifier,
            activity,
        }
    }

    /// Wires the store-backed notification mailbox and activity trail.
    pub fn with_store_sinks(stock: StockBook) -> Self {
        let store = stock.store();
        Self::new(
            stock,
            Arc::new(StoreNotifier::new(store.clone())),
            Arc::new(StoreActivityLog::new(store)),
        )
    }

    pub fn accounts(&self) -> &AccountBook {
        &self.accounts
    }

    pub fn history(&self) -> &DealHistory {
        &self.history
    }

    /// Load a deal record.
    pub fn deal(&self, deal_id: &str) -> Result<Deal, DealError> {
        get_record(self.store.as_ref(), &deal_key(deal_id))?
            .ok_or_else(|| DealError::DealNotFound(deal_id.to_string()))
    }

    fn save_deal(&self, deal: &Deal) -> Result<(), StoreError> {
        put_record(self.store.as_ref(), &deal_key(&deal.deal_id), deal)?;
        Ok(())
    }

    /// History first, then the live record: the ledger must never lack an
    /// entry the record reflects.
    fn persist_transition(&self, deal: &Deal) -> Result<(), DealError> {
        if !Deal::state_is_legal(deal.state()) {
            return Err(DealError::InvalidPrecondition {
                deal_id: deal.deal_id.clone(),
                reason: format!(
                    "state ({}, {}, {}) is outside the transition table",
                    deal.supplier_action, deal.admin_action, deal.final_status
                ),
            });
        }
        self.history.append(deal)?;
        self.save_deal(deal)?;
        Ok(())
    }

    /// A client proposes a deal on a stone. Claims the stone's lock first;
    /// losing the claim (or racing another client) is `StoneUnavailable`.
    pub fn create_deal(
        &self,
        stock_id: &str,
        client: &str,
        offer_price: f64,
    ) -> Result<Deal, DealError> {
        if !self.locks.try_lock(stock_id)? {
            return Err(DealError::StoneUnavailable(stock_id.to_string()));
        }

        let Some(stone) = self.stock.stone(stock_id)? else {
            // claimed and vanished between the two reads; give the claim back
            self.locks.unlock(stock_id)?;
            return Err(DealError::StoneUnavailable(stock_id.to_string()));
        };

        let deal = Deal::new(
            stock_id,
            &stone.supplier,
            client,
            stone.price_per_carat,
            offer_price,
        );
        self.persist_transition(&deal)?;

        self.notifier.notify(
            &stone.supplier,
            Role::Supplier,
            &format!(
                "New deal offer for stone {stock_id}: {offer_price} per carat (deal {})",
                deal.deal_id
            ),
        );
        self.activity.record(
            client,
            Role::Client,
            "REQUEST_DEAL",
            &format!("stone {stock_id}, offer {offer_price}, deal {}", deal.deal_id),
        );

        info!(deal_id = %deal.deal_id, stock_id, client, "deal created");
        Ok(deal)
    }

    /// The owning supplier answers an open deal.
    pub fn supplier_respond(
        &self,
        deal_id: &str,
        caller: &str,
        decision: SupplierDecision,
    ) -> Result<Deal, DealError> {
        let mut deal = self.deal(deal_id)?;

        if deal.supplier != caller {
            return Err(DealError::NotOwner {
                deal_id: deal_id.to_string(),
                caller: caller.to_string(),
            });
        }
        if deal.is_final() {
            return Err(DealError::AlreadyFinal(deal_id.to_string()));
        }
        if deal.supplier_action != SupplierAction::Pending {
            return Err(DealError::InvalidPrecondition {
                deal_id: deal_id.to_string(),
                reason: format!("supplier already responded ({})", deal.supplier_action),
            });
        }

        match decision {
            SupplierDecision::Accept => {
                deal.supplier_action = SupplierAction::Accepted;
                self.persist_transition(&deal)?;

                for admin in self.accounts.approved_admins()? {
                    self.notifier.notify(
                        &admin.username,
                        Role::Admin,
                        &format!(
                            "Deal {deal_id} for stone {} accepted by {caller}, awaiting approval",
                            deal.stock_id
                        ),
                    );
                }
            }
            SupplierDecision::Reject => {
                deal.supplier_action = SupplierAction::Rejected;
                deal.admin_action = AdminAction::Rejected;
                deal.final_status = FinalStatus::Closed;
                self.persist_transition(&deal)?;

                self.locks.unlock(&deal.stock_id)?;
                self.notifier.notify(
                    &deal.client,
                    Role::Client,
                    &format!("Your offer on stone {} was declined by the supplier", deal.stock_id),
                );
            }
        }

        self.activity.record(
            caller,
            Role::Supplier,
            "SUPPLIER_RESPOND",
            &format!("deal {deal_id}, decision {decision:?}"),
        );

        info!(deal_id, caller, ?decision, "supplier responded");
        Ok(deal)
    }

    /// An admin settles a supplier-accepted deal. Approval removes the
    /// stone from inventory permanently; rejection releases the claim.
    pub fn admin_respond(
        &self,
        deal_id: &str,
        admin: &str,
        decision: AdminDecision,
    ) -> Result<Deal, DealError> {
        match self.accounts.find(admin)? {
            Some(account) if account.role == Role::Admin && account.approved => {}
            _ => return Err(DealError::Unauthorized(admin.to_string())),
        }

        let mut deal = self.deal(deal_id)?;

        if deal.is_final() {
            return Err(DealError::AlreadyFinal(deal_id.to_string()));
        }
        if deal.state()
            != (
                SupplierAction::Accepted,
                AdminAction::Pending,
                FinalStatus::Open,
            )
        {
            return Err(DealError::InvalidPrecondition {
                deal_id: deal_id.to_string(),
                reason: "deal is not awaiting admin approval".to_string(),
            });
        }

        match decision {
            AdminDecision::Approve => {
                deal.admin_action = AdminAction::Approved;
                deal.final_status = FinalStatus::Completed;
                self.persist_transition(&deal)?;

                // the stone leaves inventory for good
                self.locks.remove(&deal.stock_id)?;
                self.reconciler.rebuild()?;

                self.notifier.notify(
                    &deal.supplier,
                    Role::Supplier,
                    &format!("Deal {deal_id} approved; stone {} is sold", deal.stock_id),
                );
                self.notifier.notify(
                    &deal.client,
                    Role::Client,
                    &format!("Deal {deal_id} approved; stone {} is yours", deal.stock_id),
                );
            }
            AdminDecision::Reject => {
                deal.admin_action = AdminAction::Rejected;
                deal.final_status = FinalStatus::Closed;
                self.persist_transition(&deal)?;

                self.locks.unlock(&deal.stock_id)?;

                self.notifier.notify(
                    &deal.supplier,
                    Role::Supplier,
                    &format!("Deal {deal_id} was not approved; stone {} is back on offer", deal.stock_id),
                );
                self.notifier.notify(
                    &deal.client,
                    Role::Client,
                    &format!("Deal {deal_id} was not approved"),
                );
            }
        }

        self.activity.record(
            admin,
            Role::Admin,
            "ADMIN_RESPOND",
            &format!("deal {deal_id}, decision {decision:?}"),
        );

        info!(deal_id, admin, ?decision, "admin responded");
        Ok(deal)
    }

    /// Applies a bulk decision sheet for one supplier. Guards run per row;
    /// partial success is expected and reported per row.
    pub fn supplier_respond_batch(
        &self,
        caller: &str,
        rows: Vec<SupplierDecisionRow>,
    ) -> Vec<BatchOutcome> {
        rows.into_iter()
            .map(|row| BatchOutcome {
                result: self.supplier_respond(&row.deal_id, caller, row.decision),
                deal_id: row.deal_id,
            })
            .collect()
    }

    /// Applies a bulk decision sheet for one admin.
    pub fn admin_respond_batch(&self, admin: &str, rows: Vec<AdminDecisionRow>) -> Vec<BatchOutcome> {
        rows.into_iter()
            .map(|row| BatchOutcome {
                result: self.admin_respond(&row.deal_id, admin, row.decision),
                deal_id: row.deal_id,
            })
            .collect()
    }

    fn deals_matching(&self, pred: impl Fn(&Deal) -> bool) -> Result<Vec<Deal>, StoreError> {
        let mut deals = Vec::new();
        for key in self.store.list(DEALS_PREFIX)? {
            if let Some(deal) = get_record::<Deal>(self.store.as_ref(), &key)? {
                if pred(&deal) {
                    deals.push(deal);
                }
            }
        }
        deals.sort_by_key(|d| d.created_at.to_datetime_utc());
        Ok(deals)
    }

    /// Deals owned by one supplier, oldest first.
    pub fn deals_for_supplier(&self, supplier: &str) -> Result<Vec<Deal>, StoreError> {
        self.deals_matching(|d| d.supplier == supplier)
    }

    /// Deals requested by one client, oldest first.
    pub fn deals_for_client(&self, client: &str) -> Result<Vec<Deal>, StoreError> {
        self.deals_matching(|d| d.client == client)
    }
}
