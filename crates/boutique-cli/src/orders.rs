use boutique_core::OrderNumber;
use clap::Subcommand;

#[derive(Debug, Subcommand)]
pub enum OrderCommands {
    /// Show one order with its line items
    Show { order_number: String },
    /// List a customer's orders, newest first
    History { username: String },
}

/// Print an order and its line items.
///
/// # Errors
///
/// Returns an error if the number is malformed, the order does not exist,
/// or a query fails.
pub(crate) async fn run_show(pool: &sqlx::PgPool, raw_number: &str) -> anyhow::Result<()> {
    let number = OrderNumber::parse(raw_number)
        .ok_or_else(|| anyhow::anyhow!("'{raw_number}' is not an order number"))?;
    let order = boutique_db::get_order_by_number(pool, &number)
        .await?
        .ok_or_else(|| anyhow::anyhow!("order {raw_number} not found"))?;
    let line_items = boutique_db::list_line_items(pool, order.id).await?;

    println!("Order:    {}", order.order_number);
    println!("Placed:   {}", order.date.format("%Y-%m-%d %H:%M UTC"));
    println!("Customer: {} <{}>", order.full_name, order.email);
    println!("Payment:  {}", order.stripe_pid);
    println!();
    println!("{:<7}{:<6}{:<5}{:<10}PRODUCT", "ID", "SIZE", "QTY", "TOTAL");
    for item in &line_items {
        println!(
            "{:<7}{:<6}{:<5}{:<10}{}",
            item.product_id,
            item.product_size.as_deref().unwrap_or("-"),
            item.quantity,
            item.lineitem_total,
            item.product_name
        );
    }
    println!();
    println!("Order total: {}", order.order_total);
    println!("Delivery:    {}", order.delivery_cost);
    println!("Grand total: {}", order.grand_total);

    Ok(())
}

pub(crate) async fn run_history(pool: &sqlx::PgPool, username: &str) -> anyhow::Result<()> {
    let profile = boutique_db::get_profile_by_username(pool, username)
        .await?
        .ok_or_else(|| anyhow::anyhow!("no profile for '{username}'"))?;
    let orders = boutique_db::list_orders_for_profile(pool, profile.id).await?;

    if orders.is_empty() {
        println!("{username} has no orders");
        return Ok(());
    }

    println!("{:<34}{:<18}TOTAL", "ORDER", "DATE");
    for order in &orders {
        println!(
            "{:<34}{:<18}{}",
            order.order_number,
            order.date.format("%Y-%m-%d %H:%M"),
            order.grand_total
        );
    }
    Ok(())
}
