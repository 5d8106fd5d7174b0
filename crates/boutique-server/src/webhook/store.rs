use boutique_core::{Bag, DeliveryPolicy, ProfileDefaults};
use boutique_db::{DbError, NewOrder, OrderMatch, OrderRow};
use sqlx::PgPool;

use super::OrderStore;

/// [`OrderStore`] backed by the application database.
pub(crate) struct PgOrderStore<'a> {
    pub pool: &'a PgPool,
    pub policy: DeliveryPolicy,
}

impl OrderStore for PgOrderStore<'_> {
    async fn find_order(&self, criteria: &OrderMatch) -> Result<Option<OrderRow>, DbError> {
        boutique_db::find_matching_order(self.pool, criteria).await
    }

    async fn ensure_profile(&self, username: &str) -> Result<i64, DbError> {
        Ok(boutique_db::get_or_create_profile(self.pool, username).await?.id)
    }

    async fn save_profile_defaults(
        &self,
        profile_id: i64,
        defaults: &ProfileDefaults,
    ) -> Result<(), DbError> {
        boutique_db::update_profile_defaults(self.pool, profile_id, defaults).await?;
        Ok(())
    }

    async fn create_order(&self, order: &NewOrder<'_>, bag: &Bag) -> Result<OrderRow, DbError> {
        boutique_db::materialize_order(self.pool, order, bag, &self.policy).await
    }
}
