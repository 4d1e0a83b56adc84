use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::geo::{haversine_km, GeoPoint};
use crate::models::match_record::{MatchKey, MatchRecord, MatchStatus, MatchView, OrderSummary};
use crate::models::operator::OperatorSummary;
use crate::models::order::{DroneOrder, OrderStatus};
use crate::models::page::Page;
use crate::store::{MatchRecordStore, OperatorDirectory, OrderRepository, StoreError};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("actor {actor} may not view {subject}")]
    UnauthorizedActor { actor: Uuid, subject: String },

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("match {0} not found")]
    MatchNotFound(MatchKey),

    #[error("order {0} not found")]
    OrderNotFound(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchFilter {
    pub service: Option<String>,
    pub order_status: Option<OrderStatus>,
    pub operator_status: Option<MatchStatus>,
    pub client_status: Option<MatchStatus>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub location: Option<String>,
    pub radius: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageRequest {
    pub page: Option<usize>,
    pub size: Option<usize>,
}

struct SearchArea {
    origin: Option<GeoPoint>,
    radius_km: Option<f64>,
}

pub struct MatchQueryEngine {
    orders: Arc<dyn OrderRepository>,
    operators: Arc<dyn OperatorDirectory>,
    matches: Arc<dyn MatchRecordStore>,
    default_page_size: usize,
    max_page_size: usize,
}

impl MatchQueryEngine {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        operators: Arc<dyn OperatorDirectory>,
        matches: Arc<dyn MatchRecordStore>,
        default_page_size: usize,
        max_page_size: usize,
    ) -> Self {
        Self {
            orders,
            operators,
            matches,
            default_page_size,
            max_page_size,
        }
    }

    pub async fn list_matches(
        &self,
        actor: Uuid,
        operator_id: Uuid,
        filter: &MatchFilter,
        page: PageRequest,
    ) -> Result<Page<MatchView>, QueryError> {
        if actor != operator_id {
            return Err(QueryError::UnauthorizedActor {
                actor,
                subject: format!("matches of operator {operator_id}"),
            });
        }

        if let (Some(from), Some(to)) = (filter.from_date, filter.to_date) {
            if from > to {
                return Err(QueryError::InvalidFilter(format!(
                    "from_date {from} is after to_date {to}"
                )));
            }
        }

        let area = self.search_area(operator_id, filter).await?;
        let size = page
            .size
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size);
        let index = page.page.unwrap_or(0);

        let records = self.matches.for_operator(operator_id).await?;
        let order_ids: Vec<Uuid> = records.iter().map(|r| r.order_id).collect();
        let orders = self.orders.fetch_many(&order_ids).await?;

        let views: Vec<MatchView> = records
            .into_iter()
            .filter_map(|record| {
                let order = orders.get(&record.order_id)?;
                let distance_km = area.distance_to(order);
                keep(filter, &area, &record, order, distance_km)
                    .then(|| view(record, order, distance_km))
            })
            .collect();

        Ok(Page::from_sorted(views, index, size))
    }

    pub async fn fetch_match(&self, actor: Uuid, key: MatchKey) -> Result<MatchView, QueryError> {
        let record = self
            .matches
            .fetch(key)
            .await?
            .ok_or(QueryError::MatchNotFound(key))?;
        let order = self
            .orders
            .fetch(key.order_id)
            .await?
            .ok_or(QueryError::OrderNotFound(key.order_id))?;

        if actor != record.operator_id && actor != order.client_id {
            return Err(QueryError::UnauthorizedActor {
                actor,
                subject: format!("match {key}"),
            });
        }

        let origin = match self.operators.fetch(record.operator_id).await? {
            Some(profile) => profile.coordinates.and_then(|raw| raw.parse().ok()),
            None => None,
        };
        let distance_km = SearchArea {
            origin,
            radius_km: None,
        }
        .distance_to(&order);

        Ok(view(record, &order, distance_km))
    }

    pub async fn interested_operators(
        &self,
        actor: Uuid,
        order_id: Uuid,
    ) -> Result<Vec<OperatorSummary>, QueryError> {
        let order = self
            .orders
            .fetch(order_id)
            .await?
            .ok_or(QueryError::OrderNotFound(order_id))?;

        if actor != order.client_id {
            return Err(QueryError::UnauthorizedActor {
                actor,
                subject: format!("operators of order {order_id}"),
            });
        }

        let accepted: Vec<Uuid> = self
            .matches
            .for_order(order_id)
            .await?
            .into_iter()
            .filter(|r| r.operator_status == MatchStatus::Accepted)
            .map(|r| r.operator_id)
            .collect();

        let profiles = self.operators.fetch_many(&accepted).await?;
        Ok(profiles.iter().map(|p| p.summary()).collect())
    }

    async fn search_area(&self, operator_id: Uuid, filter: &MatchFilter) -> Result<SearchArea, QueryError> {
        if let Some(radius) = filter.radius {
            if !radius.is_finite() || radius < 0.0 {
                return Err(QueryError::InvalidFilter(format!(
                    "radius must be a non-negative number, got {radius}"
                )));
            }
        }

        let profile = self.operators.fetch(operator_id).await?;

        let origin = match filter.location.as_deref() {
            Some(raw) => Some(
                raw.parse::<GeoPoint>()
                    .map_err(|err| QueryError::InvalidFilter(err.to_string()))?,
            ),
            None => profile
                .as_ref()
                .and_then(|p| p.coordinates.as_deref())
                .and_then(|raw| raw.parse().ok()),
        };

        // An explicit location without a radius searches the operator's usual
        // radius around it.
        let radius_km = match (filter.location.is_some(), filter.radius) {
            (_, Some(radius)) => Some(radius),
            (true, None) => profile.as_ref().and_then(|p| p.radius_km),
            (false, None) => None,
        };

        if radius_km.is_some() && origin.is_none() {
            return Err(QueryError::InvalidFilter(
                "radius needs a location and the operator has none on file".to_string(),
            ));
        }

        Ok(SearchArea { origin, radius_km })
    }
}

impl SearchArea {
    fn distance_to(&self, order: &DroneOrder) -> Option<f64> {
        let origin = self.origin.as_ref()?;
        let target: GeoPoint = order.coordinates.parse().ok()?;
        Some(haversine_km(origin, &target))
    }
}

fn keep(
    filter: &MatchFilter,
    area: &SearchArea,
    record: &MatchRecord,
    order: &DroneOrder,
    distance_km: Option<f64>,
) -> bool {
    if filter.service.as_deref().is_some_and(|s| s != order.service) {
        return false;
    }
    if filter.order_status.is_some_and(|s| s != order.status) {
        return false;
    }
    if filter.operator_status.is_some_and(|s| s != record.operator_status) {
        return false;
    }
    if filter.client_status.is_some_and(|s| s != record.client_status) {
        return false;
    }
    if filter
        .from_date
        .is_some_and(|from| order.window.from.date_naive() < from)
    {
        return false;
    }
    if filter
        .to_date
        .is_some_and(|to| order.window.to.date_naive() > to)
    {
        return false;
    }

    match area.radius_km {
        Some(radius) => distance_km.is_some_and(|d| d <= radius),
        None => true,
    }
}

fn view(record: MatchRecord, order: &DroneOrder, distance_km: Option<f64>) -> MatchView {
    MatchView {
        order: OrderSummary {
            id: order.id,
            title: order.title.clone(),
            service: order.service.clone(),
            coordinates: order.coordinates.clone(),
            window: order.window.clone(),
            status: order.status,
            created_at: order.created_at,
        },
        operator_id: record.operator_id,
        distance_km,
        operator_status: record.operator_status,
        client_status: record.client_status,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashMap};
    use std::sync::Arc;

    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use uuid::Uuid;

    use super::{MatchFilter, MatchQueryEngine, PageRequest, QueryError};
    use crate::models::match_record::{MatchKey, MatchRecord, MatchStatus, Side};
    use crate::models::operator::OperatorProfile;
    use crate::models::order::{DroneOrder, OrderStatus, TimeWindow};
    use crate::store::memory::{InMemoryMatches, InMemoryOperators, InMemoryOrders};
    use crate::store::{MatchRecordStore, OperatorDirectory, OrderRepository};

    struct Fixture {
        engine: MatchQueryEngine,
        orders: Arc<InMemoryOrders>,
        operators: Arc<InMemoryOperators>,
        matches: Arc<InMemoryMatches>,
        operator_id: Uuid,
    }

    async fn fixture() -> Fixture {
        let orders = Arc::new(InMemoryOrders::new());
        let operators = Arc::new(InMemoryOperators::new());
        let matches = Arc::new(InMemoryMatches::new());

        let operator_id = Uuid::new_v4();
        operators
            .register(OperatorProfile {
                id: operator_id,
                name: "Skyline Aerial".to_string(),
                email: "ops@skyline.example".to_string(),
                coordinates: Some("52.2297,21.0122".to_string()),
                radius_km: Some(50.0),
                services: BTreeSet::from(["mapping".to_string(), "inspection".to_string()]),
                updated_at: Utc::now(),
            })
            .await
            .unwrap();

        let engine = MatchQueryEngine::new(orders.clone(), operators.clone(), matches.clone(), 20, 100);

        Fixture {
            engine,
            orders,
            operators,
            matches,
            operator_id,
        }
    }

    fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap()
    }

    async fn add_order(fx: &Fixture, service: &str, coordinates: &str, from: DateTime<Utc>) -> DroneOrder {
        let order = DroneOrder {
            id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            title: format!("{service} job"),
            description: String::new(),
            service: service.to_string(),
            parameters: HashMap::new(),
            coordinates: coordinates.to_string(),
            window: TimeWindow {
                from,
                to: from + chrono::Duration::hours(4),
            },
            status: OrderStatus::Open,
            assigned_operator: None,
            created_at: Utc::now(),
        };
        fx.orders.insert(order.clone()).await.unwrap();
        fx.matches
            .create(MatchRecord::new(order.id, fx.operator_id))
            .await
            .unwrap();
        order
    }

    #[tokio::test]
    async fn filtered_totals_drive_pagination() {
        let fx = fixture().await;
        let mut orders = Vec::new();
        for _ in 0..5 {
            orders.push(add_order(&fx, "mapping", "52.23,21.01", day(2025, 6, 1)).await);
        }
        for order in &orders[..2] {
            fx.matches
                .decide(
                    MatchKey::new(order.id, fx.operator_id),
                    Side::Client,
                    MatchStatus::Rejected,
                )
                .await
                .unwrap();
        }

        let filter = MatchFilter {
            client_status: Some(MatchStatus::Pending),
            ..MatchFilter::default()
        };
        let first = fx
            .engine
            .list_matches(
                fx.operator_id,
                fx.operator_id,
                &filter,
                PageRequest {
                    page: Some(0),
                    size: Some(2),
                },
            )
            .await
            .unwrap();

        assert_eq!(first.total_elements, 3);
        assert_eq!(first.total_pages, 2);
        assert_eq!(first.content.len(), 2);
        assert!(first.content.iter().all(|v| v.client_status == MatchStatus::Pending));

        let second = fx
            .engine
            .list_matches(
                fx.operator_id,
                fx.operator_id,
                &filter,
                PageRequest {
                    page: Some(1),
                    size: Some(2),
                },
            )
            .await
            .unwrap();
        assert_eq!(second.content.len(), 1);

        let mut seen: Vec<Uuid> = first
            .content
            .iter()
            .chain(second.content.iter())
            .map(|v| v.order.id)
            .collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 3);
    }

    #[tokio::test]
    async fn repeated_queries_are_stable() {
        let fx = fixture().await;
        for _ in 0..7 {
            add_order(&fx, "mapping", "52.23,21.01", day(2025, 6, 1)).await;
        }

        let request = PageRequest {
            page: Some(1),
            size: Some(3),
        };
        let a = fx
            .engine
            .list_matches(fx.operator_id, fx.operator_id, &MatchFilter::default(), request)
            .await
            .unwrap();
        let b = fx
            .engine
            .list_matches(fx.operator_id, fx.operator_id, &MatchFilter::default(), request)
            .await
            .unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn service_status_and_dates_are_conjunctive() {
        let fx = fixture().await;
        let june = add_order(&fx, "mapping", "52.23,21.01", day(2025, 6, 10)).await;
        add_order(&fx, "mapping", "52.23,21.01", day(2025, 8, 1)).await;
        add_order(&fx, "inspection", "52.23,21.01", day(2025, 6, 12)).await;
        let started = add_order(&fx, "mapping", "52.23,21.01", day(2025, 6, 15)).await;
        fx.orders
            .assign_operator(started.id, fx.operator_id)
            .await
            .unwrap();

        let filter = MatchFilter {
            service: Some("mapping".to_string()),
            order_status: Some(OrderStatus::Open),
            from_date: NaiveDate::from_ymd_opt(2025, 6, 10),
            to_date: NaiveDate::from_ymd_opt(2025, 6, 30),
            ..MatchFilter::default()
        };
        let page = fx
            .engine
            .list_matches(fx.operator_id, fx.operator_id, &filter, PageRequest::default())
            .await
            .unwrap();

        assert_eq!(page.total_elements, 1);
        assert_eq!(page.content[0].order.id, june.id);
    }

    #[tokio::test]
    async fn location_override_narrows_by_distance() {
        let fx = fixture().await;
        let krakow = add_order(&fx, "mapping", "50.0647,19.9450", day(2025, 6, 1)).await;
        add_order(&fx, "mapping", "52.2300,21.0100", day(2025, 6, 1)).await;

        let filter = MatchFilter {
            location: Some("50.06,19.94".to_string()),
            radius: Some(10.0),
            ..MatchFilter::default()
        };
        let page = fx
            .engine
            .list_matches(fx.operator_id, fx.operator_id, &filter, PageRequest::default())
            .await
            .unwrap();

        assert_eq!(page.total_elements, 1);
        assert_eq!(page.content[0].order.id, krakow.id);
        assert!(page.content[0].distance_km.unwrap() < 10.0);
    }

    #[tokio::test]
    async fn radius_alone_uses_the_stored_location() {
        let fx = fixture().await;
        add_order(&fx, "mapping", "50.0647,19.9450", day(2025, 6, 1)).await;
        let local = add_order(&fx, "mapping", "52.2300,21.0100", day(2025, 6, 1)).await;

        let filter = MatchFilter {
            radius: Some(5.0),
            ..MatchFilter::default()
        };
        let page = fx
            .engine
            .list_matches(fx.operator_id, fx.operator_id, &filter, PageRequest::default())
            .await
            .unwrap();

        assert_eq!(page.total_elements, 1);
        assert_eq!(page.content[0].order.id, local.id);
    }

    #[tokio::test]
    async fn bad_filters_are_rejected() {
        let fx = fixture().await;

        let bad = [
            MatchFilter {
                location: Some("downtown".to_string()),
                ..MatchFilter::default()
            },
            MatchFilter {
                radius: Some(-1.0),
                ..MatchFilter::default()
            },
            MatchFilter {
                from_date: NaiveDate::from_ymd_opt(2025, 7, 1),
                to_date: NaiveDate::from_ymd_opt(2025, 6, 1),
                ..MatchFilter::default()
            },
        ];

        for filter in bad {
            let err = fx
                .engine
                .list_matches(fx.operator_id, fx.operator_id, &filter, PageRequest::default())
                .await
                .unwrap_err();
            assert!(matches!(err, QueryError::InvalidFilter(_)));
        }
    }

    #[tokio::test]
    async fn operators_only_see_their_own_matches() {
        let fx = fixture().await;
        add_order(&fx, "mapping", "52.23,21.01", day(2025, 6, 1)).await;

        let err = fx
            .engine
            .list_matches(Uuid::new_v4(), fx.operator_id, &MatchFilter::default(), PageRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::UnauthorizedActor { .. }));

        let other = Uuid::new_v4();
        let empty = fx
            .engine
            .list_matches(other, other, &MatchFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(empty.total_elements, 0);
    }

    #[tokio::test]
    async fn page_size_is_clamped() {
        let fx = fixture().await;
        add_order(&fx, "mapping", "52.23,21.01", day(2025, 6, 1)).await;

        let page = fx
            .engine
            .list_matches(
                fx.operator_id,
                fx.operator_id,
                &MatchFilter::default(),
                PageRequest {
                    page: None,
                    size: Some(10_000),
                },
            )
            .await
            .unwrap();
        assert_eq!(page.size, 100);

        let page = fx
            .engine
            .list_matches(
                fx.operator_id,
                fx.operator_id,
                &MatchFilter::default(),
                PageRequest {
                    page: None,
                    size: Some(0),
                },
            )
            .await
            .unwrap();
        assert_eq!(page.size, 1);
    }

    #[tokio::test]
    async fn single_match_is_visible_to_both_parties_only() {
        let fx = fixture().await;
        let order = add_order(&fx, "mapping", "52.23,21.01", day(2025, 6, 1)).await;
        let key = MatchKey::new(order.id, fx.operator_id);

        let as_operator = fx.engine.fetch_match(fx.operator_id, key).await.unwrap();
        assert!(as_operator.distance_km.is_some());
        assert!(fx.engine.fetch_match(order.client_id, key).await.is_ok());

        let err = fx.engine.fetch_match(Uuid::new_v4(), key).await.unwrap_err();
        assert!(matches!(err, QueryError::UnauthorizedActor { .. }));
    }

    #[tokio::test]
    async fn interested_operators_are_the_accepting_ones() {
        let fx = fixture().await;
        let order = add_order(&fx, "mapping", "52.23,21.01", day(2025, 6, 1)).await;

        let idle = Uuid::new_v4();
        fx.operators
            .register(OperatorProfile {
                id: idle,
                name: "Idle Wings".to_string(),
                email: "idle@example.com".to_string(),
                coordinates: None,
                radius_km: None,
                services: BTreeSet::new(),
                updated_at: Utc::now(),
            })
            .await
            .unwrap();
        fx.matches.create(MatchRecord::new(order.id, idle)).await.unwrap();

        assert!(fx
            .engine
            .interested_operators(order.client_id, order.id)
            .await
            .unwrap()
            .is_empty());

        fx.matches
            .decide(
                MatchKey::new(order.id, fx.operator_id),
                Side::Operator,
                MatchStatus::Accepted,
            )
            .await
            .unwrap();

        let interested = fx
            .engine
            .interested_operators(order.client_id, order.id)
            .await
            .unwrap();
        assert_eq!(interested.len(), 1);
        assert_eq!(interested[0].id, fx.operator_id);

        let err = fx
            .engine
            .interested_operators(fx.operator_id, order.id)
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::UnauthorizedActor { .. }));
    }
}
