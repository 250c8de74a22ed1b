//! JSON client for the school backend REST API.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::api::logs::log_warning;
use crate::error::{RegistryError, RegistryResult};
use crate::models::remote::{
    BranchId, CapacityUpdate, Class, GradeLevel, NewClass, NewRegistrationPayment, NewStudent,
    Student,
};

use super::{ClassStore, GradeLevelStore, PaymentStore, StudentStore};

/// Students requested per page.
const PAGE_SIZE: usize = 100;

/// Upper bound on pages fetched for one listing.
const MAX_PAGES: usize = 1_000;

/// Listing payloads come either bare or wrapped in `{ "data": [...] }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Listing<T> {
    Bare(Vec<T>),
    Wrapped { data: Vec<T> },
}

impl<T> Listing<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Listing::Bare(items) | Listing::Wrapped { data: items } => items,
        }
    }
}

#[derive(Debug, Serialize)]
struct ReserveRequest {
    count: u32,
}

#[derive(Debug, Deserialize)]
struct ReserveResponse {
    first: u32,
}

/// Registry backed by the school backend.
#[derive(Clone)]
pub struct HttpRegistry {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpRegistry {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Map non-success statuses to registry errors.
    async fn check(response: Response) -> RegistryResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::CONFLICT => RegistryError::Conflict(body),
            StatusCode::NOT_FOUND => RegistryError::NotFound(body),
            _ => RegistryError::Status {
                status: status.as_u16(),
                body,
            },
        })
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> RegistryResult<Vec<T>> {
        let request = self.authorized(self.client.get(self.url(path)).query(query));
        let response = Self::check(request.send().await?).await?;
        Ok(response.json::<Listing<T>>().await?.into_vec())
    }

    async fn send_json<B: Serialize + Sync>(
        &self,
        request: RequestBuilder,
        body: &B,
    ) -> RegistryResult<Response> {
        let response = self.authorized(request).json(body).send().await?;
        Self::check(response).await
    }
}

#[async_trait]
impl GradeLevelStore for HttpRegistry {
    async fn list_grade_levels(&self, branch: &BranchId) -> RegistryResult<Vec<GradeLevel>> {
        self.get_list("/grade-levels", &[("branchId", branch.to_string())])
            .await
    }

    async fn update_grade_level(&self, id: &str, update: CapacityUpdate) -> RegistryResult<()> {
        let request = self.client.patch(self.url(&format!("/grade-levels/{}", id)));
        self.send_json(request, &update).await?;
        Ok(())
    }
}

#[async_trait]
impl ClassStore for HttpRegistry {
    async fn list_classes(&self, branch: &BranchId) -> RegistryResult<Vec<Class>> {
        self.get_list("/classes", &[("branchId", branch.to_string())])
            .await
    }

    async fn create_class(&self, class: NewClass) -> RegistryResult<Class> {
        let request = self.client.post(self.url("/classes"));
        Ok(self.send_json(request, &class).await?.json().await?)
    }

    async fn update_class(&self, id: &str, update: CapacityUpdate) -> RegistryResult<()> {
        let request = self.client.patch(self.url(&format!("/classes/{}", id)));
        self.send_json(request, &update).await?;
        Ok(())
    }
}

#[async_trait]
impl StudentStore for HttpRegistry {
    async fn list_students(&self, branch: &BranchId) -> RegistryResult<Vec<Student>> {
        let mut students = Vec::new();
        for page in 1..=MAX_PAGES {
            let batch: Vec<Student> = self
                .get_list(
                    "/students",
                    &[
                        ("branchId", branch.to_string()),
                        ("page", page.to_string()),
                        ("pageSize", PAGE_SIZE.to_string()),
                    ],
                )
                .await?;
            // Backends may cap the page size, so only an empty page ends the listing
            if batch.is_empty() {
                return Ok(students);
            }
            students.extend(batch);
        }
        log_warning(format!(
            "Student listing stopped after {} pages ({} students); ids may be incomplete",
            MAX_PAGES,
            students.len()
        ));
        Ok(students)
    }

    async fn create_student(&self, student: NewStudent) -> RegistryResult<Student> {
        let request = self.client.post(self.url("/students"));
        Ok(self.send_json(request, &student).await?.json().await?)
    }

    async fn reserve_student_ids(&self, year: i32, count: u32) -> RegistryResult<Option<u32>> {
        let request = self
            .client
            .post(self.url(&format!("/student-id-sequences/{}/reserve", year)));
        match self.send_json(request, &ReserveRequest { count }).await {
            Ok(response) => Ok(Some(response.json::<ReserveResponse>().await?.first)),
            Err(RegistryError::NotFound(_)) => Ok(None),
            Err(RegistryError::Status { status, .. }) if status == 405 || status == 501 => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl PaymentStore for HttpRegistry {
    async fn create_payment(&self, payment: NewRegistrationPayment) -> RegistryResult<()> {
        let request = self.client.post(self.url("/registration-payments"));
        self.send_json(request, &payment).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let registry = HttpRegistry::new("http://school.local/api/", None);
        assert_eq!(registry.url("/classes"), "http://school.local/api/classes");
    }

    #[test]
    fn test_listing_accepts_both_shapes() {
        let bare: Listing<GradeLevel> = serde_json::from_str(
            r#"[{"id":"1","name":"KG","branchId":"b1"}]"#,
        )
        .unwrap();
        assert_eq!(bare.into_vec().len(), 1);

        let wrapped: Listing<GradeLevel> = serde_json::from_str(
            r#"{"data":[{"id":"1","code":"kg","name":"KG","branchId":"b1","maxCapacity":50}]}"#,
        )
        .unwrap();
        let levels = wrapped.into_vec();
        assert_eq!(levels[0].code.as_deref(), Some("kg"));
        assert_eq!(levels[0].max_capacity, 50);
    }

    /// Backend that serves `total` students in pages of 50, whatever `pageSize` asks for.
    async fn capped_backend(total: usize) -> String {
        use axum::extract::Query;
        use axum::routing::get;
        use axum::{Json, Router};
        use std::collections::HashMap;

        let app = Router::new().route(
            "/students",
            get(move |Query(query): Query<HashMap<String, String>>| async move {
                let page: usize = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
                let students: Vec<serde_json::Value> = ((page - 1) * 50..(page * 50).min(total))
                    .map(|i| {
                        serde_json::json!({
                            "id": format!("s-{}", i),
                            "studentId": format!("SCH-2024-{:05}", i + 1),
                            "firstName": "Nour",
                        })
                    })
                    .collect();
                Json(students)
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_listing_reads_past_short_pages() {
        let registry = HttpRegistry::new(capped_backend(150).await, None);
        let students = registry.list_students(&BranchId::new("b1")).await.unwrap();
        assert_eq!(students.len(), 150);
        assert_eq!(students[149].student_id, "SCH-2024-00150");
    }

    #[tokio::test]
    async fn test_scan_fallback_continues_after_last_page() {
        use crate::registry::student_id::SequenceSource;
        use crate::registry::StudentIdGenerator;

        // No sequence route: the reservation 404s and the generator scans
        let registry = HttpRegistry::new(capped_backend(120).await, None);
        let mut ids = StudentIdGenerator::reserve(&registry, &BranchId::new("b1"), 2024, 2)
            .await
            .unwrap();
        assert_eq!(ids.source(), SequenceSource::Scanned);
        assert_eq!(ids.next_id().unwrap(), "SCH-2024-00121");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_http_error() {
        let registry = HttpRegistry::new("http://127.0.0.1:9", None);
        let err = registry
            .list_classes(&BranchId::new("b1"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Http(_)));
    }
}
