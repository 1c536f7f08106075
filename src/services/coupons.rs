use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthorizationGate;
use crate::entities::{coupon, CouponType};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::repositories::CommerceRepository;

pub(crate) const TOTAL_OUT_OF_RANGE: &str = "order total out of range";

/// Coupon rules: activation window checks and discount arithmetic.
pub struct CouponEngine;

impl CouponEngine {
    /// Rejects inactive coupons and coupons used outside `[starts_date, ends_date]`.
    pub fn validate_window(coupon: &coupon::Model, now: DateTime<Utc>) -> Result<(), ServiceError> {
        if !coupon.is_active {
            return Err(ServiceError::BusinessRule("inactive".to_string()));
        }
        if now < coupon.starts_date {
            return Err(ServiceError::BusinessRule("invalid date".to_string()));
        }
        if now > coupon.ends_date {
            return Err(ServiceError::BusinessRule("expired".to_string()));
        }
        Ok(())
    }

    /// Applies one coupon to the running total. The result is not clamped
    /// and may be negative; leaving the representable range is an error.
    pub fn apply_discount(
        coupon: &coupon::Model,
        running_total: Decimal,
    ) -> Result<Decimal, ServiceError> {
        let discounted = match coupon.coupon_type {
            CouponType::Price => running_total.checked_sub(coupon.discount),
            CouponType::Percent => coupon
                .discount
                .checked_div(Decimal::ONE_HUNDRED)
                .and_then(|rate| running_total.checked_mul(rate))
                .and_then(|off| running_total.checked_sub(off)),
        };
        discounted.ok_or_else(|| ServiceError::BusinessRule(TOTAL_OUT_OF_RANGE.to_string()))
    }

    /// Creation-time invariants of a coupon definition.
    pub fn validate_definition(
        coupon_type: CouponType,
        discount: Decimal,
        starts_date: DateTime<Utc>,
        ends_date: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        if discount < Decimal::ZERO {
            return Err(ServiceError::BusinessRule(
                "discount must not be negative".to_string(),
            ));
        }
        if coupon_type == CouponType::Percent && discount > Decimal::ONE_HUNDRED {
            return Err(ServiceError::BusinessRule(
                "percent discount must not exceed 100".to_string(),
            ));
        }
        if starts_date > ends_date {
            return Err(ServiceError::BusinessRule(
                "starts_date must not be after ends_date".to_string(),
            ));
        }
        Ok(())
    }
}

/// Coupon definition submitted by staff.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct NewCoupon {
    #[validate(length(min = 1, max = 64, message = "code must be 1-64 characters"))]
    pub code: String,
    #[serde(rename = "type")]
    pub coupon_type: CouponType,
    #[schema(value_type = f64)]
    pub discount: Decimal,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub starts_date: DateTime<Utc>,
    pub ends_date: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

/// Coupon as returned to clients; `discount` renders as a JSON number.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CouponView {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub store_id: Uuid,
    pub code: String,
    #[serde(rename = "type")]
    pub coupon_type: CouponType,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub discount: Decimal,
    pub is_active: bool,
    pub starts_date: DateTime<Utc>,
    pub ends_date: DateTime<Utc>,
}

impl From<coupon::Model> for CouponView {
    fn from(model: coupon::Model) -> Self {
        Self {
            id: model.id,
            store_id: model.store_id,
            code: model.code,
            coupon_type: model.coupon_type,
            discount: model.discount,
            is_active: model.is_active,
            starts_date: model.starts_date,
            ends_date: model.ends_date,
        }
    }
}

/// Creates coupons bound to a store.
#[derive(Clone)]
pub struct CouponService {
    repo: Arc<dyn CommerceRepository>,
    event_sender: Arc<EventSender>,
}

impl CouponService {
    pub fn new(repo: Arc<dyn CommerceRepository>, event_sender: Arc<EventSender>) -> Self {
        Self { repo, event_sender }
    }

    #[instrument(skip(self, input), fields(code = %input.code))]
    pub async fn create_coupon(
        &self,
        actor_id: Uuid,
        store_id: Uuid,
        input: NewCoupon,
    ) -> Result<coupon::Model, ServiceError> {
        input.validate()?;

        let actor = self.repo.get_user(actor_id).await?;
        let store = self.repo.get_store(store_id).await?;
        AuthorizationGate::require_store_membership(&actor, store.id)?;

        CouponEngine::validate_definition(
            input.coupon_type,
            input.discount,
            input.starts_date,
            input.ends_date,
        )
        .map_err(|err| {
            warn!(error = %err, "coupon definition rejected");
            err
        })?;

        let now = Utc::now();
        let coupon = self
            .repo
            .insert_coupon(coupon::Model {
                id: Uuid::new_v4(),
                store_id: store.id,
                code: input.code.trim().to_string(),
                coupon_type: input.coupon_type,
                discount: input.discount,
                is_active: input.is_active,
                starts_date: input.starts_date,
                ends_date: input.ends_date,
                created_at: now,
                updated_at: now,
            })
            .await?;

        self.event_sender
            .send_or_log(Event::CouponCreated {
                coupon_id: coupon.id,
                store_id: store.id,
            })
            .await;

        info!(coupon_id = %coupon.id, store_id = %store.id, "coupon created");
        Ok(coupon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{store, user, IdList};
    use crate::repositories::InMemoryCommerceRepository;
    use assert_matches::assert_matches;
    use chrono::Duration;
    use proptest::prelude::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn coupon(coupon_type: CouponType, discount: Decimal) -> coupon::Model {
        let now = Utc::now();
        coupon::Model {
            id: Uuid::new_v4(),
            store_id: Uuid::new_v4(),
            code: "TEST".into(),
            coupon_type,
            discount,
            is_active: true,
            starts_date: now - Duration::days(1),
            ends_date: now + Duration::days(1),
            created_at: now,
            updated_at: now,
        }
    }

    #[rstest]
    #[case::inside_window(0, true, None)]
    #[case::inactive(0, false, Some("inactive"))]
    #[case::not_started(-2, true, Some("invalid date"))]
    #[case::expired(2, true, Some("expired"))]
    fn window_checks(
        #[case] offset_days: i64,
        #[case] is_active: bool,
        #[case] expected: Option<&str>,
    ) {
        let mut k = coupon(CouponType::Price, dec!(10));
        k.is_active = is_active;
        let now = Utc::now() + Duration::days(offset_days);

        match (CouponEngine::validate_window(&k, now), expected) {
            (Ok(()), None) => {}
            (Err(ServiceError::BusinessRule(message)), Some(expected)) => {
                assert_eq!(message, expected)
            }
            (other, expected) => panic!("unexpected {other:?} for {expected:?}"),
        }
    }

    #[test]
    fn inactive_wins_over_window_errors() {
        let mut k = coupon(CouponType::Percent, dec!(5));
        k.is_active = false;
        k.ends_date = Utc::now() - Duration::days(3);
        assert_matches!(
            CouponEngine::validate_window(&k, Utc::now()),
            Err(ServiceError::BusinessRule(m)) if m == "inactive"
        );
    }

    #[test]
    fn percent_discount_is_taken_from_running_total() {
        let k = coupon(CouponType::Percent, dec!(10));
        assert_eq!(CouponEngine::apply_discount(&k, dec!(250)).unwrap(), dec!(225));
    }

    #[test]
    fn price_discount_may_go_negative() {
        let k = coupon(CouponType::Price, dec!(300));
        assert_eq!(CouponEngine::apply_discount(&k, dec!(120)).unwrap(), dec!(-180));
    }

    #[test]
    fn discount_past_decimal_range_is_an_error() {
        let k = coupon(CouponType::Price, Decimal::MAX);
        assert_matches!(
            CouponEngine::apply_discount(&k, Decimal::MIN),
            Err(ServiceError::BusinessRule(m)) if m == "order total out of range"
        );
    }

    #[test]
    fn stacking_depends_on_array_order() {
        let flat = coupon(CouponType::Price, dec!(100));
        let percent = coupon(CouponType::Percent, dec!(10));
        let base = dec!(1000);

        let flat_first = [&flat, &percent]
            .iter()
            .try_fold(base, |total, k| CouponEngine::apply_discount(k, total))
            .unwrap();
        let percent_first = [&percent, &flat]
            .iter()
            .try_fold(base, |total, k| CouponEngine::apply_discount(k, total))
            .unwrap();

        assert_eq!(flat_first, dec!(810));
        assert_eq!(percent_first, dec!(800));
        assert_ne!(flat_first, percent_first);
    }

    proptest! {
        #[test]
        fn price_coupon_subtracts_exactly(total in -1_000_000i64..1_000_000, discount in 0i64..1_000_000) {
            let k = coupon(CouponType::Price, Decimal::from(discount));
            prop_assert_eq!(
                CouponEngine::apply_discount(&k, Decimal::from(total)).unwrap(),
                Decimal::from(total - discount)
            );
        }

        #[test]
        fn full_percent_coupon_zeroes_total(total in 0i64..10_000_000) {
            let k = coupon(CouponType::Percent, dec!(100));
            prop_assert!(CouponEngine::apply_discount(&k, Decimal::from(total)).unwrap().is_zero());
        }
    }

    #[rstest]
    #[case(CouponType::Percent, dec!(150), false)]
    #[case(CouponType::Percent, dec!(100), true)]
    #[case(CouponType::Price, dec!(150), true)]
    #[case(CouponType::Price, dec!(-1), false)]
    #[case(CouponType::Percent, dec!(0), true)]
    fn definition_caps(#[case] kind: CouponType, #[case] discount: Decimal, #[case] ok: bool) {
        let now = Utc::now();
        let result = CouponEngine::validate_definition(kind, discount, now, now + Duration::days(1));
        assert_eq!(result.is_ok(), ok, "{kind:?} {discount}");
        if let Err(err) = result {
            assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn reversed_window_is_rejected() {
        let now = Utc::now();
        assert!(CouponEngine::validate_definition(
            CouponType::Price,
            dec!(1),
            now,
            now - Duration::seconds(1)
        )
        .is_err());
    }

    async fn seeded() -> (Arc<InMemoryCommerceRepository>, Uuid, Uuid, Uuid) {
        let repo = Arc::new(InMemoryCommerceRepository::new());
        let now = Utc::now();
        let member = Uuid::new_v4();
        let outsider = Uuid::new_v4();
        let store_id = Uuid::new_v4();

        for (id, email, work_at) in [
            (member, "member@shop.test", vec![store_id]),
            (outsider, "outsider@shop.test", vec![]),
        ] {
            repo.put_user(user::Model {
                id,
                name: email.into(),
                email: email.into(),
                password_hash: String::new(),
                work_at: IdList(work_at),
                created_at: now,
                updated_at: now,
            })
            .await;
        }
        repo.put_store(store::Model {
            id: store_id,
            name: "Bakery".into(),
            owner_id: member,
            employees: IdList::new(),
            products: IdList::new(),
            customers: IdList::new(),
            coupons: IdList::new(),
            transactions: IdList::new(),
            created_at: now,
            updated_at: now,
        })
        .await;
        (repo, member, outsider, store_id)
    }

    fn new_coupon(kind: CouponType, discount: Decimal) -> NewCoupon {
        let now = Utc::now();
        NewCoupon {
            code: "SPRING".into(),
            coupon_type: kind,
            discount,
            is_active: true,
            starts_date: now,
            ends_date: now + Duration::days(30),
        }
    }

    #[tokio::test]
    async fn member_creates_coupon_bound_to_store() {
        let (repo, member, _, store_id) = seeded().await;
        let (events, mut rx) = EventSender::channel(4);
        let service = CouponService::new(repo.clone(), Arc::new(events));

        let created = service
            .create_coupon(member, store_id, new_coupon(CouponType::Percent, dec!(15)))
            .await
            .unwrap();

        let store = repo.get_store(store_id).await.unwrap();
        assert!(store.coupons.contains(&created.id));
        assert_eq!(
            rx.recv().await,
            Some(Event::CouponCreated {
                coupon_id: created.id,
                store_id
            })
        );
    }

    #[tokio::test]
    async fn outsider_cannot_create_coupon() {
        let (repo, _, outsider, store_id) = seeded().await;
        let (events, _rx) = EventSender::channel(4);
        let service = CouponService::new(repo, Arc::new(events));

        assert_matches!(
            service
                .create_coupon(outsider, store_id, new_coupon(CouponType::Price, dec!(5)))
                .await,
            Err(ServiceError::Forbidden(_))
        );
    }

    #[tokio::test]
    async fn percent_over_hundred_never_reaches_storage() {
        let (repo, member, _, store_id) = seeded().await;
        let (events, _rx) = EventSender::channel(4);
        let service = CouponService::new(repo.clone(), Arc::new(events));

        assert_matches!(
            service
                .create_coupon(member, store_id, new_coupon(CouponType::Percent, dec!(150)))
                .await,
            Err(ServiceError::BusinessRule(_))
        );
        assert!(repo.get_store(store_id).await.unwrap().coupons.is_empty());
    }
}
