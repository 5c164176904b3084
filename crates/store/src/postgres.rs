use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use common::{BuyerId, OrderId, OrderItemId, SellerId};
use domain::{Money, Order, OrderItem, OrderStatus, ProductId, ShippingDetails};
use sqlx::{
    PgPool, Postgres, QueryBuilder, Row,
    postgres::{PgPoolOptions, PgRow},
};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    store::{CartLine, CartStore, Catalog, InventoryLedger, OrderRepository, Product},
};

const ORDER_COLUMNS: &str = "id, buyer_id, status, shipping_address, shipping_city, \
     shipping_state, shipping_zip, shipping_phone, total_amount, external_payment_order_id, \
     external_payment_transaction_id, notes, created_at";

const PAYMENT_CONSTRAINT: &str = "unique_payment_transaction";

/// PostgreSQL-backed store implementation.
///
/// Stock reservation is a single conditional `UPDATE`, so the row lock taken
/// by Postgres is the only serialization point between concurrent checkouts.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool against `url`.
    ///
    /// `acquire_timeout` bounds how long a request waits for a connection.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await?;
        tracing::info!(max_connections, "connected to postgres");
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Inserts or replaces a catalog entry.
    pub async fn upsert_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price, stock, seller_id)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                price = EXCLUDED.price,
                stock = EXCLUDED.stock,
                seller_id = EXCLUDED.seller_id
            "#,
        )
        .bind(product.id.as_str())
        .bind(&product.name)
        .bind(product.price.minor())
        .bind(i64::from(product.stock))
        .bind(product.seller_id.as_uuid())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Adds `quantity` of a product to the buyer's cart.
    pub async fn add_to_cart(
        &self,
        buyer_id: BuyerId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cart_lines (buyer_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (buyer_id, product_id) DO UPDATE SET
                quantity = cart_lines.quantity + EXCLUDED.quantity
            "#,
        )
        .bind(buyer_id.as_uuid())
        .bind(product_id.as_str())
        .bind(i64::from(quantity))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::new(row.try_get::<String, _>("id")?),
            name: row.try_get("name")?,
            price: Money::from_minor(row.try_get("price")?),
            stock: to_u32(row.try_get("stock")?, "products.stock")?,
            seller_id: SellerId::from_uuid(row.try_get::<Uuid, _>("seller_id")?),
        })
    }

    fn row_to_order(row: &PgRow) -> Result<Order> {
        let status: String = row.try_get("status")?;
        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            buyer_id: BuyerId::from_uuid(row.try_get::<Uuid, _>("buyer_id")?),
            status: status
                .parse::<OrderStatus>()
                .map_err(|e| StoreError::Corrupt(e.to_string()))?,
            shipping: ShippingDetails {
                address: row.try_get("shipping_address")?,
                city: row.try_get("shipping_city")?,
                state: row.try_get("shipping_state")?,
                zip: row.try_get("shipping_zip")?,
                phone: row.try_get("shipping_phone")?,
            },
            total_amount: Money::from_minor(row.try_get("total_amount")?),
            external_payment_order_id: row.try_get("external_payment_order_id")?,
            external_payment_transaction_id: row.try_get("external_payment_transaction_id")?,
            notes: row.try_get("notes")?,
            created_at: row.try_get("created_at")?,
            items: Vec::new(),
        })
    }

    /// Loads order rows and attaches their items with one extra query.
    async fn load_orders(&self, rows: Vec<PgRow>) -> Result<Vec<Order>> {
        let mut orders = rows
            .iter()
            .map(Self::row_to_order)
            .collect::<Result<Vec<_>>>()?;
        if orders.is_empty() {
            return Ok(orders);
        }

        let ids: Vec<Uuid> = orders.iter().map(|order| order.id.as_uuid()).collect();
        let item_rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, quantity, unit_price
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, position ASC
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut items: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for row in item_rows {
            let order_id: Uuid = row.try_get("order_id")?;
            items.entry(order_id).or_default().push(OrderItem {
                id: OrderItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
                product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
                quantity: to_u32(row.try_get("quantity")?, "order_items.quantity")?,
                unit_price: Money::from_minor(row.try_get("unit_price")?),
            });
        }
        for order in &mut orders {
            order.items = items.remove(&order.id.as_uuid()).unwrap_or_default();
        }
        Ok(orders)
    }
}

fn to_u32(value: i64, column: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{column} out of range: {value}")))
}

#[async_trait]
impl InventoryLedger for PostgresStore {
    async fn reserve(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock = stock - $2
            WHERE id = $1 AND stock >= $2
            "#,
        )
        .bind(product_id.as_str())
        .bind(i64::from(quantity))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        match self.stock(product_id).await? {
            Some(available) => Err(StoreError::InsufficientStock {
                product_id: product_id.clone(),
                requested: quantity,
                available,
            }),
            None => Err(StoreError::ProductNotFound(product_id.clone())),
        }
    }

    async fn restore(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        let result = sqlx::query("UPDATE products SET stock = stock + $2 WHERE id = $1")
            .bind(product_id.as_str())
            .bind(i64::from(quantity))
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ProductNotFound(product_id.clone()));
        }
        Ok(())
    }

    async fn stock(&self, product_id: &ProductId) -> Result<Option<u32>> {
        let stock: Option<i64> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
            .bind(product_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        stock.map(|s| to_u32(s, "products.stock")).transpose()
    }
}

#[async_trait]
impl Catalog for PostgresStore {
    async fn product(&self, product_id: &ProductId) -> Result<Option<Product>> {
        let row = sqlx::query("SELECT id, name, price, stock, seller_id FROM products WHERE id = $1")
            .bind(product_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn products(&self, product_ids: &[ProductId]) -> Result<Vec<Product>> {
        let ids: Vec<String> = product_ids.iter().map(|id| id.as_str().to_string()).collect();
        let rows = sqlx::query(
            "SELECT id, name, price, stock, seller_id FROM products WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_product).collect()
    }
}

#[async_trait]
impl CartStore for PostgresStore {
    async fn cart_lines(&self, buyer_id: BuyerId) -> Result<Vec<CartLine>> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, quantity
            FROM cart_lines
            WHERE buyer_id = $1
            ORDER BY added_at ASC, product_id ASC
            "#,
        )
        .bind(buyer_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(CartLine {
                    buyer_id,
                    product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
                    quantity: to_u32(row.try_get("quantity")?, "cart_lines.quantity")?,
                })
            })
            .collect()
    }

    async fn clear_cart(&self, buyer_id: BuyerId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cart_lines WHERE buyer_id = $1")
            .bind(buyer_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl OrderRepository for PostgresStore {
    async fn insert_order(&self, order: &Order) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            "INSERT INTO orders ({ORDER_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"
        ))
        .bind(order.id.as_uuid())
        .bind(order.buyer_id.as_uuid())
        .bind(order.status.as_str())
        .bind(&order.shipping.address)
        .bind(&order.shipping.city)
        .bind(&order.shipping.state)
        .bind(&order.shipping.zip)
        .bind(&order.shipping.phone)
        .bind(order.total_amount.minor())
        .bind(&order.external_payment_order_id)
        .bind(&order.external_payment_transaction_id)
        .bind(&order.notes)
        .bind(order.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some(PAYMENT_CONSTRAINT)
            {
                return StoreError::DuplicatePayment(
                    order
                        .external_payment_transaction_id
                        .clone()
                        .unwrap_or_default(),
                );
            }
            StoreError::Database(e)
        })?;

        if !order.items.is_empty() {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO order_items (id, order_id, position, product_id, quantity, unit_price) ",
            );
            builder.push_values(order.items.iter().enumerate(), |mut b, (position, item)| {
                b.push_bind(item.id.as_uuid())
                    .push_bind(order.id.as_uuid())
                    .push_bind(position as i32)
                    .push_bind(item.product_id.as_str())
                    .push_bind(i64::from(item.quantity))
                    .push_bind(item.unit_price.minor());
            });
            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let rows = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(order_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;

        Ok(self.load_orders(rows).await?.into_iter().next())
    }

    async fn orders_for_buyer(&self, buyer_id: BuyerId) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE buyer_id = $1 ORDER BY created_at DESC"
        ))
        .bind(buyer_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        self.load_orders(rows).await
    }

    async fn update_status(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
        notes: Option<String>,
    ) -> Result<Option<Order>> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $3, notes = COALESCE($4, notes)
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(expected.as_str())
        .bind(next.as_str())
        .bind(notes)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.order(order_id).await
    }
}
