//! Live integration tests for boutique-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/boutique-db/`), so `"../../migrations"` resolves to the workspace
//! migration directory. Run with `cargo test -- --ignored` and `DATABASE_URL`
//! pointing at a server the harness can create databases on.

use boutique_core::{
    Bag, CatalogFile, CatalogQuery, CategorySeed, CustomerDetails, DeliveryPolicy, OrderNumber,
    ProductSeed, ProfileDefaults, RawCatalogParams, ShippingAddress,
};
use boutique_db::{
    clear_bag, delete_order, delete_product, find_matching_order, get_or_create_profile,
    get_order_by_number, get_product_prices, list_line_items, list_orders_for_profile,
    list_products, load_session, materialize_order, purge_stale_sessions, remove_line_item,
    save_bag, seed_catalog, set_save_info, update_profile_defaults, DbError, NewOrder, OrderMatch,
};
use rust_decimal::Decimal;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn dec(s: &str) -> Decimal {
    s.parse().expect("valid decimal literal")
}

fn product(sku: &str, name: &str, price: &str, category: Option<&str>) -> ProductSeed {
    ProductSeed {
        sku: Some(sku.to_string()),
        name: name.to_string(),
        description: format!("{name} description"),
        price: dec(price),
        rating: None,
        image_url: None,
        image: None,
        category: category.map(str::to_string),
    }
}

fn sample_catalog() -> CatalogFile {
    CatalogFile {
        categories: vec![
            CategorySeed {
                name: "jeans".to_string(),
                friendly_name: Some("Jeans".to_string()),
            },
            CategorySeed {
                name: "shirts".to_string(),
                friendly_name: Some("Shirts".to_string()),
            },
        ],
        products: vec![
            product("sku-1", "Slim Jeans", "20.00", Some("jeans")),
            product("sku-2", "oxford Shirt", "15.00", Some("shirts")),
            product("sku-3", "Wool Socks", "5.50", None),
        ],
    }
}

async fn seeded_ids(pool: &sqlx::PgPool) -> (i64, i64, i64) {
    seed_catalog(pool, &sample_catalog())
        .await
        .expect("seed_catalog failed");
    let id = |sku: &'static str| async move {
        sqlx::query_scalar::<_, i64>("SELECT id FROM products WHERE sku = $1")
            .bind(sku)
            .fetch_one(pool)
            .await
            .unwrap_or_else(|e| panic!("lookup of {sku} failed: {e}"))
    };
    (id("sku-1").await, id("sku-2").await, id("sku-3").await)
}

fn customer() -> CustomerDetails {
    CustomerDetails {
        full_name: "Ada Lovelace".to_string(),
        email: "ada@example.com".to_string(),
        phone_number: "0123456789".to_string(),
        address: ShippingAddress {
            country: "GB".to_string(),
            postcode: None,
            town_or_city: "London".to_string(),
            street_address1: "1 Analytical Row".to_string(),
            street_address2: None,
            county: None,
        },
    }
}

async fn order_count(pool: &sqlx::PgPool) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM orders")
        .fetch_one(pool)
        .await
        .expect("count orders")
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn seed_is_idempotent(pool: sqlx::PgPool) {
    let first = seed_catalog(&pool, &sample_catalog()).await.expect("seed");
    let second = seed_catalog(&pool, &sample_catalog()).await.expect("reseed");
    assert_eq!(first, second);

    let products = list_products(&pool, &CatalogQuery::default())
        .await
        .expect("list_products");
    assert_eq!(products.len(), 3);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn search_matches_name_or_description_case_insensitively(pool: sqlx::PgPool) {
    seeded_ids(&pool).await;

    let query = CatalogQuery::from_params(&RawCatalogParams {
        q: Some("OXFORD".to_string()),
        ..RawCatalogParams::default()
    })
    .expect("valid query");
    let products = list_products(&pool, &query).await.expect("list_products");
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].name, "oxford Shirt");
    assert_eq!(products[0].category_name.as_deref(), Some("shirts"));

    let query = CatalogQuery::from_params(&RawCatalogParams {
        q: Some("socks description".to_string()),
        ..RawCatalogParams::default()
    })
    .expect("valid query");
    let products = list_products(&pool, &query).await.expect("list_products");
    assert_eq!(products.len(), 1);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn search_treats_percent_literally(pool: sqlx::PgPool) {
    seeded_ids(&pool).await;

    let query = CatalogQuery::from_params(&RawCatalogParams {
        q: Some("%".to_string()),
        ..RawCatalogParams::default()
    })
    .expect("valid query");
    let products = list_products(&pool, &query).await.expect("list_products");
    assert!(products.is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn category_filter_and_sorting(pool: sqlx::PgPool) {
    seeded_ids(&pool).await;

    let query = CatalogQuery::from_params(&RawCatalogParams {
        category: Some("jeans,shirts".to_string()),
        sort: Some("price".to_string()),
        direction: Some("desc".to_string()),
        ..RawCatalogParams::default()
    })
    .expect("valid query");
    let products = list_products(&pool, &query).await.expect("list_products");
    let names: Vec<&str> = products.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Slim Jeans", "oxford Shirt"]);

    let query = CatalogQuery::from_params(&RawCatalogParams {
        sort: Some("name".to_string()),
        ..RawCatalogParams::default()
    })
    .expect("valid query");
    let products = list_products(&pool, &query).await.expect("list_products");
    let names: Vec<&str> = products.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["oxford Shirt", "Slim Jeans", "Wool Socks"]);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn product_prices_skip_unknown_ids(pool: sqlx::PgPool) {
    let (jeans, _, _) = seeded_ids(&pool).await;
    let prices = get_product_prices(&pool, &[jeans, 999_999])
        .await
        .expect("get_product_prices");
    assert_eq!(prices.len(), 1);
    assert_eq!(prices[&jeans], dec("20.00"));
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn materialize_sized_bag(pool: sqlx::PgPool) {
    let (_, shirt, _) = seeded_ids(&pool).await;
    let mut bag = Bag::new();
    bag.add(shirt, Some("M"), 1).expect("add M");
    bag.add(shirt, Some("L"), 2).expect("add L");
    let details = customer();
    let snapshot = bag.to_snapshot();

    let order = materialize_order(
        &pool,
        &NewOrder {
            details: &details,
            user_profile_id: None,
            original_bag: &snapshot,
            stripe_pid: "pi_sized",
        },
        &bag,
        &DeliveryPolicy::default(),
    )
    .await
    .expect("materialize_order");

    assert_eq!(order.order_total, dec("45.00"));
    assert_eq!(order.delivery_cost, dec("4.50"));
    assert_eq!(order.grand_total, dec("49.50"));
    assert!(OrderNumber::parse(&order.order_number).is_some());

    let lines = list_line_items(&pool, order.id).await.expect("list_line_items");
    let summary: Vec<(Option<&str>, i32, Decimal)> = lines
        .iter()
        .map(|l| (l.product_size.as_deref(), l.quantity, l.lineitem_total))
        .collect();
    assert_eq!(
        summary,
        vec![(Some("L"), 2, dec("30.00")), (Some("M"), 1, dec("15.00"))]
    );
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn materialize_with_missing_product_deletes_order(pool: sqlx::PgPool) {
    let (jeans, _, socks) = seeded_ids(&pool).await;
    let mut bag = Bag::new();
    bag.add(jeans, None, 1).expect("add jeans");
    bag.add(socks, None, 1).expect("add socks");
    delete_product(&pool, socks).await.expect("delete socks");
    let details = customer();
    let snapshot = bag.to_snapshot();

    let err = materialize_order(
        &pool,
        &NewOrder {
            details: &details,
            user_profile_id: None,
            original_bag: &snapshot,
            stripe_pid: "pi_missing",
        },
        &bag,
        &DeliveryPolicy::default(),
    )
    .await
    .expect_err("missing product must fail");

    assert!(matches!(err, DbError::ProductMissing(id) if id == socks));
    assert_eq!(order_count(&pool).await, 0);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn removing_line_item_recomputes_totals(pool: sqlx::PgPool) {
    let (jeans, shirt, _) = seeded_ids(&pool).await;
    let mut bag = Bag::new();
    bag.add(jeans, None, 2).expect("add jeans");
    bag.add(shirt, Some("S"), 1).expect("add shirt");
    let details = customer();
    let snapshot = bag.to_snapshot();
    let policy = DeliveryPolicy::default();

    let order = materialize_order(
        &pool,
        &NewOrder {
            details: &details,
            user_profile_id: None,
            original_bag: &snapshot,
            stripe_pid: "pi_remove",
        },
        &bag,
        &policy,
    )
    .await
    .expect("materialize_order");
    assert_eq!(order.order_total, dec("55.00"));
    assert_eq!(order.delivery_cost, Decimal::ZERO);

    let lines = list_line_items(&pool, order.id).await.expect("lines");
    let shirt_line = lines
        .iter()
        .find(|l| l.product_id == shirt)
        .expect("shirt line");
    let totals = remove_line_item(&pool, shirt_line.id, &policy)
        .await
        .expect("remove_line_item");
    assert_eq!(totals.order_total, dec("40.00"));
    assert_eq!(totals.delivery_cost, dec("4.00"));
    assert_eq!(totals.grand_total, dec("44.00"));

    let number = OrderNumber::parse(&order.order_number).expect("order number");
    let reloaded = get_order_by_number(&pool, &number)
        .await
        .expect("get_order_by_number")
        .expect("order exists");
    assert_eq!(reloaded.order_number, order.order_number);
    assert_eq!(reloaded.grand_total, dec("44.00"));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn find_matching_order_is_case_and_null_aware(pool: sqlx::PgPool) {
    let (jeans, _, _) = seeded_ids(&pool).await;
    let mut bag = Bag::new();
    bag.add(jeans, None, 2).expect("add jeans");
    let details = customer();
    let snapshot = bag.to_snapshot();

    let order = materialize_order(
        &pool,
        &NewOrder {
            details: &details,
            user_profile_id: None,
            original_bag: &snapshot,
            stripe_pid: "pi_match",
        },
        &bag,
        &DeliveryPolicy::default(),
    )
    .await
    .expect("materialize_order");

    let mut criteria = OrderMatch {
        full_name: Some("ADA LOVELACE".to_string()),
        email: Some("Ada@Example.com".to_string()),
        phone_number: Some("0123456789".to_string()),
        country: Some("gb".to_string()),
        postcode: None,
        town_or_city: Some("london".to_string()),
        street_address1: Some("1 analytical row".to_string()),
        street_address2: None,
        county: None,
        grand_total: dec("44.00"),
        original_bag: snapshot.clone(),
        stripe_pid: "pi_match".to_string(),
    };
    let found = find_matching_order(&pool, &criteria)
        .await
        .expect("find_matching_order")
        .expect("order should match");
    assert_eq!(found.id, order.id);

    criteria.postcode = Some("N1".to_string());
    assert!(find_matching_order(&pool, &criteria)
        .await
        .expect("find_matching_order")
        .is_none());

    criteria.postcode = None;
    criteria.stripe_pid = "pi_other".to_string();
    assert!(find_matching_order(&pool, &criteria)
        .await
        .expect("find_matching_order")
        .is_none());

    assert!(delete_order(&pool, order.id).await.expect("delete_order"));
    assert!(!delete_order(&pool, order.id).await.expect("delete_order"));
}

// ---------------------------------------------------------------------------
// Sessions and profiles
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn session_bag_round_trip(pool: sqlx::PgPool) {
    let empty = load_session(&pool, "s-1").await.expect("load_session");
    assert!(empty.bag.is_empty());

    let mut bag = Bag::new();
    bag.add(1, Some("XL"), 3).expect("add");
    save_bag(&pool, "s-1", &bag).await.expect("save_bag");
    set_save_info(&pool, "s-1", true).await.expect("set_save_info");

    let state = load_session(&pool, "s-1").await.expect("load_session");
    assert_eq!(state.bag, bag);
    assert!(state.save_info);

    clear_bag(&pool, "s-1").await.expect("clear_bag");
    let state = load_session(&pool, "s-1").await.expect("load_session");
    assert!(state.bag.is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn purge_removes_only_stale_sessions(pool: sqlx::PgPool) {
    save_bag(&pool, "fresh", &Bag::new()).await.expect("save fresh");
    save_bag(&pool, "stale", &Bag::new()).await.expect("save stale");
    sqlx::query("UPDATE sessions SET updated_at = NOW() - INTERVAL '30 days' WHERE id = 'stale'")
        .execute(&pool)
        .await
        .expect("age session");

    let removed = purge_stale_sessions(&pool, 14).await.expect("purge");
    assert_eq!(removed, 1);
    let remaining: Vec<String> = sqlx::query_scalar("SELECT id FROM sessions")
        .fetch_all(&pool)
        .await
        .expect("list sessions");
    assert_eq!(remaining, vec!["fresh".to_string()]);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn profile_get_or_create_and_update(pool: sqlx::PgPool) {
    let created = get_or_create_profile(&pool, "ada").await.expect("create");
    let again = get_or_create_profile(&pool, "ada").await.expect("get");
    assert_eq!(created.id, again.id);
    assert_eq!(created.defaults(), ProfileDefaults::default());

    let defaults = ProfileDefaults {
        default_phone_number: Some("0123".to_string()),
        default_town_or_city: Some("London".to_string()),
        default_country: Some("GB".to_string()),
        ..ProfileDefaults::default()
    };
    let updated = update_profile_defaults(&pool, created.id, &defaults)
        .await
        .expect("update_profile_defaults");
    assert_eq!(updated.defaults(), defaults);

    let orders = list_orders_for_profile(&pool, created.id)
        .await
        .expect("list_orders_for_profile");
    assert!(orders.is_empty());
}
