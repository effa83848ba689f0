//! Utilization workflow logic

use chrono::Utc;
use fundtrack_core::{ids, Amount};
use fundtrack_mirror::{LedgerMirror, MirrorError, UsageOutcome};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

use crate::error::WorkflowError;
use crate::store::WorkflowStore;
use crate::types::{
    ExpenditureRecord, NewExpenditure, NewRequest, RequestDetail, RequestFilter,
    RequestWithBalance, UtilizationCertificate, UtilizationRequest, UtilizationStatus,
};

/// Drives the utilization request lifecycle.
///
/// Approval routes the fund movement through the ledger mirror; everything
/// else is single-row bookkeeping guarded by status preconditions.
pub struct UtilizationWorkflow {
    store: WorkflowStore,
    mirror: Arc<LedgerMirror>,
}

impl UtilizationWorkflow {
    pub fn new(store: WorkflowStore, mirror: Arc<LedgerMirror>) -> Self {
        Self { store, mirror }
    }

    pub fn store(&self) -> &WorkflowStore {
        &self.store
    }

    /// Submit a new request on behalf of an agency.
    ///
    /// The scheme must exist and the requested amount must fit the remaining
    /// balance at submission time.
    pub async fn submit(
        &self,
        agency: &str,
        executor: &str,
        input: NewRequest,
    ) -> Result<UtilizationRequest, WorkflowError> {
        if agency.trim().is_empty() || executor.trim().is_empty() {
            return Err(WorkflowError::Validation(
                "agency and executor are required".to_string(),
            ));
        }
        if input.purpose.trim().is_empty() {
            return Err(WorkflowError::Validation("purpose is required".to_string()));
        }
        if input.amount.is_zero() {
            return Err(WorkflowError::Validation(
                "amount must be positive".to_string(),
            ));
        }

        let scheme = self.mirror.scheme(input.scheme_id).await?;
        if input.amount.value() > scheme.remaining() {
            return Err(WorkflowError::Mirror(MirrorError::InsufficientFunds {
                available: scheme.remaining(),
                requested: input.amount.value(),
            }));
        }

        let request = UtilizationRequest::new(
            input.scheme_id,
            agency,
            executor,
            input.amount,
            input.purpose,
            input.description,
        );
        self.store.save_request(&request).await?;

        info!(request_id = %request.request_id, agency, "utilization request submitted");
        Ok(request)
    }

    /// List an agency's own requests, annotated with live balances.
    pub async fn list(
        &self,
        agency: &str,
        filter: &RequestFilter,
    ) -> Result<Vec<RequestWithBalance>, WorkflowError> {
        let requests = self.store.list_requests(agency, filter).await?;

        let mut annotated = Vec::with_capacity(requests.len());
        for request in requests {
            let available = self.available_balance(request.scheme_id).await;
            let requested = request.amount.value();
            annotated.push(RequestWithBalance {
                request,
                available_balance: available,
                remaining_after_request: available - requested,
            });
        }

        Ok(annotated)
    }

    /// Full detail for one request, agency-scoped.
    pub async fn get(&self, agency: &str, request_id: &str) -> Result<RequestDetail, WorkflowError> {
        let request = self.owned_request(agency, request_id).await?;

        let expenditures = self.store.list_expenditures(request_id).await?;
        let certificate = self.store.find_certificate(request_id).await?;
        let available = self.available_balance(request.scheme_id).await;
        let requested = request.amount.value();

        Ok(RequestDetail {
            request,
            expenditures,
            certificate,
            available_balance: available,
            remaining_after_request: available - requested,
        })
    }

    /// Approve a pending request and settle the funds through the mirror.
    ///
    /// Administrator action; not agency-scoped. The settlement id lands on
    /// the request so the movement can be traced back to the ledger.
    pub async fn approve(
        &self,
        request_id: &str,
        approved_by: &str,
    ) -> Result<(UtilizationRequest, UsageOutcome), WorkflowError> {
        let mut request = self.require_request(request_id).await?;

        if request.status != UtilizationStatus::Pending {
            return Err(WorkflowError::InvalidTransition {
                from: request.status.as_str(),
                action: "approve",
            });
        }

        let outcome = self
            .mirror
            .apply_fund_usage(
                request.scheme_id,
                request.amount,
                &request.executor,
                &request.purpose,
            )
            .await?;

        request.status = UtilizationStatus::Approved;
        request.approved_by = Some(if approved_by.trim().is_empty() {
            request.executor.clone()
        } else {
            approved_by.to_string()
        });
        request.approved_at = Some(Utc::now());
        request.settlement_id = Some(outcome.settlement_id.clone());
        request.updated_at = Utc::now();
        self.store.save_request(&request).await?;

        info!(request_id, settlement_id = %outcome.settlement_id, "utilization request approved");
        Ok((request, outcome))
    }

    /// Reject a pending request. Terminal.
    pub async fn reject(
        &self,
        request_id: &str,
        reason: Option<&str>,
        rejected_by: &str,
    ) -> Result<UtilizationRequest, WorkflowError> {
        let mut request = self.require_request(request_id).await?;

        if request.status != UtilizationStatus::Pending {
            return Err(WorkflowError::InvalidTransition {
                from: request.status.as_str(),
                action: "reject",
            });
        }

        request.status = UtilizationStatus::Rejected;
        request.rejection_reason = Some(reason.unwrap_or("No reason provided").to_string());
        request.approved_by = Some(if rejected_by.trim().is_empty() {
            request.executor.clone()
        } else {
            rejected_by.to_string()
        });
        request.approved_at = Some(Utc::now());
        request.updated_at = Utc::now();
        self.store.save_request(&request).await?;

        info!(request_id, "utilization request rejected");
        Ok(request)
    }

    /// Record an expenditure against an approved or in-progress request.
    ///
    /// The first expenditure moves the request to in-progress.
    pub async fn record_expenditure(
        &self,
        agency: &str,
        request_id: &str,
        recorded_by: &str,
        input: NewExpenditure,
    ) -> Result<ExpenditureRecord, WorkflowError> {
        if input.activity.trim().is_empty() {
            return Err(WorkflowError::Validation("activity is required".to_string()));
        }
        if input.amount.is_zero() {
            return Err(WorkflowError::Validation(
                "amount must be positive".to_string(),
            ));
        }

        let mut request = self.owned_request(agency, request_id).await?;

        if request.status != UtilizationStatus::Approved
            && request.status != UtilizationStatus::InProgress
        {
            return Err(WorkflowError::InvalidTransition {
                from: request.status.as_str(),
                action: "record expenditure against",
            });
        }

        let now = Utc::now();
        let record = ExpenditureRecord {
            expenditure_id: ids::expenditure_id(),
            request_id: request_id.to_string(),
            activity: input.activity,
            description: input.description,
            amount: input.amount,
            category: input.category.unwrap_or(crate::types::ExpenditureCategory::Other),
            vendor: input.vendor,
            bill_number: input.bill_number,
            recorded_by: recorded_by.to_string(),
            spent_at: input.spent_at.unwrap_or(now),
            created_at: now,
        };
        self.store.add_expenditure(&record).await?;

        request.total_expenditure = request
            .total_expenditure
            .checked_add(&record.amount)
            .unwrap_or(request.total_expenditure);
        if request.status == UtilizationStatus::Approved {
            request.status = UtilizationStatus::InProgress;
        }
        request.updated_at = now;
        self.store.save_request(&request).await?;

        info!(request_id, expenditure_id = %record.expenditure_id, "expenditure recorded");
        Ok(record)
    }

    /// Mark an in-progress request completed. Terminal.
    pub async fn complete(
        &self,
        agency: &str,
        request_id: &str,
    ) -> Result<UtilizationRequest, WorkflowError> {
        let mut request = self.owned_request(agency, request_id).await?;

        if request.status != UtilizationStatus::InProgress {
            return Err(WorkflowError::InvalidTransition {
                from: request.status.as_str(),
                action: "complete",
            });
        }

        request.status = UtilizationStatus::Completed;
        request.completed_at = Some(Utc::now());
        request.updated_at = Utc::now();
        self.store.save_request(&request).await?;

        info!(request_id, "utilization request completed");
        Ok(request)
    }

    /// Issue the utilization certificate for a completed request.
    ///
    /// Idempotent: an existing certificate is returned as-is.
    pub async fn issue_certificate(
        &self,
        agency: &str,
        request_id: &str,
        issued_by: &str,
    ) -> Result<UtilizationCertificate, WorkflowError> {
        let request = self.owned_request(agency, request_id).await?;

        if let Some(existing) = self.store.find_certificate(request_id).await? {
            return Ok(existing);
        }

        if request.status != UtilizationStatus::Completed {
            return Err(WorkflowError::InvalidTransition {
                from: request.status.as_str(),
                action: "issue a certificate for",
            });
        }

        let scheme = self.mirror.scheme(request.scheme_id).await?;

        let expenditures = self.store.list_expenditures(request_id).await?;
        let spent: Decimal = expenditures.iter().map(|e| e.amount.value()).sum();
        let total_expenditure = if spent > Decimal::ZERO {
            Amount::new_unchecked(spent)
        } else {
            request.total_expenditure
        };

        let certificate = UtilizationCertificate {
            certificate_no: ids::certificate_no(),
            request_id: request_id.to_string(),
            scheme_id: request.scheme_id,
            scheme_name: scheme.name,
            agency: request.agency.clone(),
            approved_amount: request.amount,
            total_expenditure,
            remaining_balance: scheme.remaining_funds,
            period_start: request.approved_at.unwrap_or(request.created_at),
            period_end: request.completed_at.unwrap_or_else(Utc::now),
            issued_by: issued_by.to_string(),
            issued_at: Utc::now(),
        };
        self.store.save_certificate(&certificate).await?;

        info!(request_id, certificate_no = %certificate.certificate_no, "utilization certificate issued");
        Ok(certificate)
    }

    async fn require_request(&self, request_id: &str) -> Result<UtilizationRequest, WorkflowError> {
        self.store
            .find_request(request_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(request_id.to_string()))
    }

    async fn owned_request(
        &self,
        agency: &str,
        request_id: &str,
    ) -> Result<UtilizationRequest, WorkflowError> {
        let request = self.require_request(request_id).await?;
        if request.agency != agency {
            return Err(WorkflowError::Forbidden(request_id.to_string()));
        }
        Ok(request)
    }

    async fn available_balance(&self, scheme_id: u64) -> Decimal {
        match self.mirror.scheme(scheme_id).await {
            Ok(view) => view.remaining_funds,
            Err(_) => Decimal::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fundtrack_chain::MockChain;
    use fundtrack_store::{connect_in_memory, SchemeStore, SettlementStore};

    fn amount(val: i64) -> Amount {
        Amount::new(Decimal::new(val, 0)).unwrap()
    }

    async fn test_workflow() -> UtilizationWorkflow {
        let pool = connect_in_memory().await.unwrap();
        let schemes = SchemeStore::new(pool.clone());
        let settlements = SettlementStore::new(pool.clone());
        schemes.init().await.unwrap();
        settlements.init().await.unwrap();

        let mirror = Arc::new(LedgerMirror::new(
            Arc::new(MockChain::new()),
            schemes,
            settlements,
        ));
        mirror
            .register_scheme("Health", amount(1000), "rural households")
            .await
            .unwrap();

        let store = WorkflowStore::new(pool);
        store.init().await.unwrap();
        UtilizationWorkflow::new(store, mirror)
    }

    fn new_request(amount_val: i64) -> NewRequest {
        NewRequest {
            scheme_id: 1,
            amount: amount(amount_val),
            purpose: "clinic supplies".to_string(),
            description: String::new(),
        }
    }

    #[tokio::test]
    async fn test_submit_creates_pending() {
        let workflow = test_workflow().await;

        let request = workflow
            .submit("District Health", "clerk@district.gov", new_request(400))
            .await
            .unwrap();

        assert!(request.request_id.starts_with("UR-"));
        assert_eq!(request.status, UtilizationStatus::Pending);
    }

    #[tokio::test]
    async fn test_submit_rejects_overdraw() {
        let workflow = test_workflow().await;

        let result = workflow
            .submit("District Health", "clerk@district.gov", new_request(1500))
            .await;
        assert!(matches!(
            result,
            Err(WorkflowError::Mirror(MirrorError::InsufficientFunds { .. }))
        ));
    }

    #[tokio::test]
    async fn test_submit_unknown_scheme() {
        let workflow = test_workflow().await;

        let mut input = new_request(100);
        input.scheme_id = 99;
        let result = workflow
            .submit("District Health", "clerk@district.gov", input)
            .await;
        assert!(matches!(
            result,
            Err(WorkflowError::Mirror(MirrorError::SchemeNotFound(99)))
        ));
    }

    #[tokio::test]
    async fn test_approve_settles_funds() {
        let workflow = test_workflow().await;
        let request = workflow
            .submit("District Health", "clerk@district.gov", new_request(400))
            .await
            .unwrap();

        let (approved, outcome) = workflow
            .approve(&request.request_id, "admin@state.gov")
            .await
            .unwrap();

        assert_eq!(approved.status, UtilizationStatus::Approved);
        assert_eq!(approved.settlement_id, Some(outcome.settlement_id.clone()));
        assert!(outcome.applied_to_ledger);

        // The scheme balance moved
        let detail = workflow
            .get("District Health", &request.request_id)
            .await
            .unwrap();
        assert_eq!(detail.available_balance, Decimal::new(600, 0));
    }

    #[tokio::test]
    async fn test_approve_twice_fails() {
        let workflow = test_workflow().await;
        let request = workflow
            .submit("District Health", "clerk@district.gov", new_request(400))
            .await
            .unwrap();

        workflow
            .approve(&request.request_id, "admin@state.gov")
            .await
            .unwrap();
        let result = workflow.approve(&request.request_id, "admin@state.gov").await;
        assert!(matches!(
            result,
            Err(WorkflowError::InvalidTransition {
                from: "approved",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_reject_is_terminal() {
        let workflow = test_workflow().await;
        let request = workflow
            .submit("District Health", "clerk@district.gov", new_request(400))
            .await
            .unwrap();

        let rejected = workflow
            .reject(&request.request_id, Some("duplicate submission"), "admin@state.gov")
            .await
            .unwrap();
        assert_eq!(rejected.status, UtilizationStatus::Rejected);
        assert_eq!(
            rejected.rejection_reason.as_deref(),
            Some("duplicate submission")
        );

        let result = workflow.approve(&request.request_id, "admin@state.gov").await;
        assert!(matches!(result, Err(WorkflowError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_agency_scoping() {
        let workflow = test_workflow().await;
        let request = workflow
            .submit("District Health", "clerk@district.gov", new_request(400))
            .await
            .unwrap();

        let result = workflow.get("Roads Department", &request.request_id).await;
        assert!(matches!(result, Err(WorkflowError::Forbidden(_))));

        let listed = workflow
            .list("Roads Department", &RequestFilter::default())
            .await
            .unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn test_expenditure_lifecycle() {
        let workflow = test_workflow().await;
        let request = workflow
            .submit("District Health", "clerk@district.gov", new_request(400))
            .await
            .unwrap();
        let id = request.request_id.clone();

        // Cannot record expenditure before approval
        let early = workflow
            .record_expenditure(
                "District Health",
                &id,
                "clerk@district.gov",
                NewExpenditure {
                    activity: "vaccines".to_string(),
                    description: String::new(),
                    amount: amount(100),
                    category: None,
                    vendor: String::new(),
                    bill_number: String::new(),
                    spent_at: None,
                },
            )
            .await;
        assert!(matches!(early, Err(WorkflowError::InvalidTransition { .. })));

        workflow.approve(&id, "admin@state.gov").await.unwrap();

        let record = workflow
            .record_expenditure(
                "District Health",
                &id,
                "clerk@district.gov",
                NewExpenditure {
                    activity: "vaccines".to_string(),
                    description: "first batch".to_string(),
                    amount: amount(150),
                    category: Some(crate::types::ExpenditureCategory::Materials),
                    vendor: "MedSupply Ltd".to_string(),
                    bill_number: "B-1001".to_string(),
                    spent_at: None,
                },
            )
            .await
            .unwrap();
        assert!(record.expenditure_id.starts_with("EX-"));

        // First expenditure flips the request to in-progress
        let detail = workflow.get("District Health", &id).await.unwrap();
        assert_eq!(detail.request.status, UtilizationStatus::InProgress);
        assert_eq!(detail.request.total_expenditure, amount(150));
        assert_eq!(detail.expenditures.len(), 1);
    }

    #[tokio::test]
    async fn test_complete_and_certificate() {
        let workflow = test_workflow().await;
        let request = workflow
            .submit("District Health", "clerk@district.gov", new_request(400))
            .await
            .unwrap();
        let id = request.request_id.clone();

        workflow.approve(&id, "admin@state.gov").await.unwrap();

        // Certificate requires completion
        let early = workflow
            .issue_certificate("District Health", &id, "clerk@district.gov")
            .await;
        assert!(matches!(early, Err(WorkflowError::InvalidTransition { .. })));

        workflow
            .record_expenditure(
                "District Health",
                &id,
                "clerk@district.gov",
                NewExpenditure {
                    activity: "vaccines".to_string(),
                    description: String::new(),
                    amount: amount(350),
                    category: None,
                    vendor: String::new(),
                    bill_number: String::new(),
                    spent_at: None,
                },
            )
            .await
            .unwrap();
        workflow.complete("District Health", &id).await.unwrap();

        let certificate = workflow
            .issue_certificate("District Health", &id, "clerk@district.gov")
            .await
            .unwrap();
        assert!(certificate.certificate_no.starts_with("UC-"));
        assert_eq!(certificate.scheme_name, "Health");
        assert_eq!(certificate.approved_amount, amount(400));
        assert_eq!(certificate.total_expenditure, amount(350));
        // 1000 - 400 settled on approval
        assert_eq!(certificate.remaining_balance, Decimal::new(600, 0));

        // Issuing again returns the same certificate
        let again = workflow
            .issue_certificate("District Health", &id, "clerk@district.gov")
            .await
            .unwrap();
        assert_eq!(again.certificate_no, certificate.certificate_no);
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let workflow = test_workflow().await;
        let first = workflow
            .submit("District Health", "clerk@district.gov", new_request(100))
            .await
            .unwrap();
        workflow
            .submit("District Health", "clerk@district.gov", new_request(200))
            .await
            .unwrap();
        workflow.approve(&first.request_id, "admin@state.gov").await.unwrap();

        let pending = workflow
            .list(
                "District Health",
                &RequestFilter {
                    status: Some(UtilizationStatus::Pending),
                    ..RequestFilter::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].request.amount, amount(200));
    }
}
