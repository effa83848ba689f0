//! Grievance intake logic

use chrono::Utc;
use tracing::info;

use crate::error::GrievanceError;
use crate::store::GrievanceStore;
use crate::types::{Grievance, GrievanceFilter, GrievanceStatus, NewGrievance};

/// Validates and records citizen grievances.
pub struct GrievanceIntake {
    store: GrievanceStore,
}

impl GrievanceIntake {
    pub fn new(store: GrievanceStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &GrievanceStore {
        &self.store
    }

    /// Submit a grievance. Starts pending.
    pub async fn submit(
        &self,
        submitted_by: &str,
        input: NewGrievance,
    ) -> Result<Grievance, GrievanceError> {
        if submitted_by.trim().is_empty() {
            return Err(GrievanceError::Validation(
                "submitter identity is required".to_string(),
            ));
        }
        if input.title.trim().is_empty() || input.description.trim().is_empty() {
            return Err(GrievanceError::Validation(
                "title and description are required".to_string(),
            ));
        }

        let grievance = Grievance::new(input, submitted_by);
        self.store.save(&grievance).await?;

        info!(grievance_id = %grievance.grievance_id, "grievance submitted");
        Ok(grievance)
    }

    /// Look up one grievance.
    pub async fn get(&self, id: &str) -> Result<Grievance, GrievanceError> {
        self.store
            .find(id)
            .await?
            .ok_or_else(|| GrievanceError::NotFound(id.to_string()))
    }

    /// Filtered listing, newest first.
    pub async fn list(&self, filter: &GrievanceFilter) -> Result<Vec<Grievance>, GrievanceError> {
        Ok(self.store.list(filter).await?)
    }

    /// Administrator review: move to any valid status and stamp the reviewer.
    pub async fn review(
        &self,
        id: &str,
        status: GrievanceStatus,
        notes: Option<&str>,
        reviewed_by: &str,
    ) -> Result<Grievance, GrievanceError> {
        let mut grievance = self.get(id).await?;

        grievance.status = status;
        if let Some(notes) = notes {
            grievance.review_notes = Some(notes.to_string());
        }
        if !reviewed_by.trim().is_empty() {
            grievance.reviewed_by = Some(reviewed_by.to_string());
        }
        grievance.reviewed_at = Some(Utc::now());
        grievance.updated_at = Utc::now();
        self.store.save(&grievance).await?;

        info!(grievance_id = %grievance.grievance_id, status = status.as_str(), "grievance reviewed");
        Ok(grievance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GrievanceCategory;
    use fundtrack_store::connect_in_memory;

    async fn test_intake() -> GrievanceIntake {
        let pool = connect_in_memory().await.unwrap();
        let store = GrievanceStore::new(pool);
        store.init().await.unwrap();
        GrievanceIntake::new(store)
    }

    fn new_grievance(title: &str) -> NewGrievance {
        NewGrievance {
            scheme_id: Some(1),
            scheme_name: "Health".to_string(),
            category: GrievanceCategory::Delay,
            title: title.to_string(),
            description: "Funds sanctioned in March have not reached the clinic".to_string(),
            location: "Ward 4".to_string(),
            beneficiary_name: String::new(),
            contact_email: String::new(),
            contact_phone: String::new(),
        }
    }

    #[tokio::test]
    async fn test_submit_and_get() {
        let intake = test_intake().await;

        let grievance = intake
            .submit("citizen@example.org", new_grievance("Delayed disbursement"))
            .await
            .unwrap();
        assert!(grievance.grievance_id.starts_with("GR-"));
        assert_eq!(grievance.status, GrievanceStatus::Pending);

        let fetched = intake.get(&grievance.grievance_id).await.unwrap();
        assert_eq!(fetched.title, "Delayed disbursement");
    }

    #[tokio::test]
    async fn test_submit_requires_fields() {
        let intake = test_intake().await;

        let mut input = new_grievance("x");
        input.title = String::new();
        let result = intake.submit("citizen@example.org", input).await;
        assert!(matches!(result, Err(GrievanceError::Validation(_))));

        let result = intake.submit("", new_grievance("x")).await;
        assert!(matches!(result, Err(GrievanceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_review_flow() {
        let intake = test_intake().await;
        let grievance = intake
            .submit("citizen@example.org", new_grievance("Delayed disbursement"))
            .await
            .unwrap();

        let reviewed = intake
            .review(
                &grievance.grievance_id,
                GrievanceStatus::UnderReview,
                Some("Forwarded to district office"),
                "admin@state.gov",
            )
            .await
            .unwrap();
        assert_eq!(reviewed.status, GrievanceStatus::UnderReview);
        assert_eq!(reviewed.reviewed_by.as_deref(), Some("admin@state.gov"));
        assert!(reviewed.reviewed_at.is_some());

        let resolved = intake
            .review(
                &grievance.grievance_id,
                GrievanceStatus::Resolved,
                None,
                "admin@state.gov",
            )
            .await
            .unwrap();
        assert_eq!(resolved.status, GrievanceStatus::Resolved);
        // Earlier notes survive a later review without notes
        assert_eq!(
            resolved.review_notes.as_deref(),
            Some("Forwarded to district office")
        );
    }

    #[tokio::test]
    async fn test_review_unknown_id() {
        let intake = test_intake().await;
        let result = intake
            .review("GR-MISSING", GrievanceStatus::Resolved, None, "admin@state.gov")
            .await;
        assert!(matches!(result, Err(GrievanceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_filters_and_search() {
        let intake = test_intake().await;
        intake
            .submit("citizen@example.org", new_grievance("Delayed disbursement"))
            .await
            .unwrap();
        let mut other = new_grievance("Suspected misuse at site");
        other.category = GrievanceCategory::FundMisuse;
        intake.submit("other@example.org", other).await.unwrap();

        let by_category = intake
            .list(&GrievanceFilter {
                category: Some(GrievanceCategory::FundMisuse),
                ..GrievanceFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(by_category.len(), 1);

        let by_submitter = intake
            .list(&GrievanceFilter {
                submitted_by: Some("citizen@example.org".to_string()),
                ..GrievanceFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(by_submitter.len(), 1);

        let searched = intake
            .list(&GrievanceFilter {
                search: Some("misuse".to_string()),
                ..GrievanceFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(searched.len(), 1);
        assert_eq!(searched[0].title, "Suspected misuse at site");
    }
}
