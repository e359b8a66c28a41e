//! In-memory [`OrderStore`] for engine tests.
//!
//! Mirrors the `PostgreSQL` store's locking: a transaction holds a lock per
//! product row and per idempotency key until it commits or is dropped, and
//! stages its writes so nothing becomes visible before `commit`. Unrelated
//! transactions interleave freely.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use easycart_core::{Money, ProductId, ShopId};

use super::store::{OrderStore, OrderTransaction};
use crate::db::RepositoryError;
use crate::models::{Order, Product};

#[derive(Debug, Default)]
struct State {
    products: HashMap<ProductId, Product>,
    /// `(product, sort_order, url)`.
    images: Vec<(ProductId, i32, String)>,
    orders: Vec<Order>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LockKey {
    Product(ProductId),
    Idempotency(ShopId, String),
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    locks: Arc<Mutex<HashMap<LockKey, Arc<Mutex<()>>>>>,
    lock_delay: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep inside every product lock, to exercise timeouts.
    pub const fn with_lock_delay(mut self, delay: Duration) -> Self {
        self.lock_delay = Some(delay);
        self
    }

    pub async fn add_product(&self, shop_id: ShopId, name: &str, price: i64, stock: i32) -> ProductId {
        let id = ProductId::new_v4();
        let now = Utc::now();
        let product = Product {
            id,
            shop_id,
            category_id: None,
            name: name.to_owned(),
            slug: easycart_core::identifiers::slugify(name),
            description: String::new(),
            sku: easycart_core::identifiers::sku_base(shop_id, name),
            price: Money::from_minor(price),
            compare_price: None,
            stock,
            min_stock: 0,
            is_active: true,
            is_featured: false,
            created_at: now,
            updated_at: now,
        };
        self.state.lock().await.products.insert(id, product);
        id
    }

    pub async fn add_image(&self, product_id: ProductId, url: &str, sort_order: i32) {
        self.state
            .lock()
            .await
            .images
            .push((product_id, sort_order, url.to_owned()));
    }

    pub async fn deactivate(&self, product_id: ProductId) {
        if let Some(product) = self.state.lock().await.products.get_mut(&product_id) {
            product.is_active = false;
        }
    }

    pub async fn stock(&self, product_id: ProductId) -> i32 {
        self.state
            .lock()
            .await
            .products
            .get(&product_id)
            .map_or(-1, |p| p.stock)
    }

    pub async fn orders(&self) -> Vec<Order> {
        self.state.lock().await.orders.clone()
    }

    async fn lock_handle(&self, key: LockKey) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(key).or_default())
    }
}

pub struct MemoryTransaction {
    store: MemoryStore,
    held: HashMap<LockKey, OwnedMutexGuard<()>>,
    staged_stock: HashMap<ProductId, i32>,
    staged_order: Option<Order>,
}

impl MemoryTransaction {
    /// Acquire `key` unless this transaction already holds it.
    async fn acquire(&mut self, key: LockKey) {
        if self.held.contains_key(&key) {
            return;
        }
        let guard = self.store.lock_handle(key.clone()).await.lock_owned().await;
        self.held.insert(key, guard);
        // Let competing transactions run up to their own lock attempt.
        tokio::task::yield_now().await;
    }

    fn current_stock(&self, product: &Product) -> i32 {
        self.staged_stock
            .get(&product.id)
            .copied()
            .unwrap_or(product.stock)
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    type Tx = MemoryTransaction;

    async fn begin(&self) -> Result<Self::Tx, RepositoryError> {
        Ok(MemoryTransaction {
            store: self.clone(),
            held: HashMap::new(),
            staged_stock: HashMap::new(),
            staged_order: None,
        })
    }
}

#[async_trait]
impl OrderTransaction for MemoryTransaction {
    async fn lock_idempotency_key(
        &mut self,
        shop_id: ShopId,
        key: &str,
    ) -> Result<(), RepositoryError> {
        self.acquire(LockKey::Idempotency(shop_id, key.to_owned()))
            .await;
        Ok(())
    }

    async fn find_by_idempotency_key(
        &mut self,
        shop_id: ShopId,
        key: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        Ok(self
            .store
            .state
            .lock()
            .await
            .orders
            .iter()
            .find(|o| o.shop_id == shop_id && o.idempotency_key.as_deref() == Some(key))
            .cloned())
    }

    async fn lock_active_product(
        &mut self,
        shop_id: ShopId,
        product_id: ProductId,
    ) -> Result<Option<Product>, RepositoryError> {
        if let Some(delay) = self.store.lock_delay {
            tokio::time::sleep(delay).await;
        }
        let exists = self
            .store
            .state
            .lock()
            .await
            .products
            .contains_key(&product_id);
        if !exists {
            return Ok(None);
        }
        self.acquire(LockKey::Product(product_id)).await;

        let product = self
            .store
            .state
            .lock()
            .await
            .products
            .get(&product_id)
            .filter(|p| p.shop_id == shop_id && p.is_active)
            .cloned();
        Ok(product.map(|mut product| {
            product.stock = self.current_stock(&product);
            product
        }))
    }

    async fn primary_image(
        &mut self,
        product_id: ProductId,
    ) -> Result<Option<String>, RepositoryError> {
        Ok(self
            .store
            .state
            .lock()
            .await
            .images
            .iter()
            .filter(|(id, _, _)| *id == product_id)
            .min_by_key(|(_, sort_order, _)| *sort_order)
            .map(|(_, _, url)| url.clone()))
    }

    async fn decrement_stock(
        &mut self,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<bool, RepositoryError> {
        let committed = self
            .store
            .state
            .lock()
            .await
            .products
            .get(&product_id)
            .map(|p| p.stock);
        let Some(committed) = committed else {
            return Ok(false);
        };
        let stock = self
            .staged_stock
            .get(&product_id)
            .copied()
            .unwrap_or(committed);
        if stock < quantity {
            return Ok(false);
        }
        self.staged_stock.insert(product_id, stock - quantity);
        Ok(true)
    }

    async fn order_number_exists(&mut self, order_number: &str) -> Result<bool, RepositoryError> {
        Ok(self
            .store
            .state
            .lock()
            .await
            .orders
            .iter()
            .any(|o| o.order_number == order_number))
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), RepositoryError> {
        let state = self.store.state.lock().await;
        if state.orders.iter().any(|o| o.order_number == order.order_number) {
            return Err(RepositoryError::Conflict("order number".to_owned()));
        }
        if order.idempotency_key.is_some()
            && state
                .orders
                .iter()
                .any(|o| o.shop_id == order.shop_id && o.idempotency_key == order.idempotency_key)
        {
            return Err(RepositoryError::Conflict("idempotency key".to_owned()));
        }
        drop(state);
        self.staged_order = Some(order.clone());
        Ok(())
    }

    /// Applies staged writes, then releases every held lock.
    async fn commit(mut self) -> Result<(), RepositoryError> {
        let mut state = self.store.state.lock().await;
        for (product_id, stock) in self.staged_stock.drain() {
            if let Some(product) = state.products.get_mut(&product_id) {
                product.stock = stock;
            }
        }
        if let Some(order) = self.staged_order.take() {
            state.orders.push(order);
        }
        Ok(())
    }
}
