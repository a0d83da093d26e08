//! Product catalog: CRUD plus the all-or-nothing stock reservation used by
//! order placement.

use std::collections::HashMap;

use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use posh_schemas::Product;

use crate::error::StoreError;

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub stock: u32,
    pub sizes: Vec<String>,
    pub colors: Vec<String>,
    pub category: String,
    pub image_url: Option<String>,
}

/// Partial update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<u32>,
    pub sizes: Option<Vec<String>>,
    pub colors: Option<Vec<String>>,
    pub category: Option<String>,
    pub image_url: Option<Option<String>>,
}

/// A reservation line resolved against the catalog: the authoritative price
/// and name snapshot handed back to order placement.
#[derive(Debug, Clone)]
pub struct ReservedItem {
    pub product_id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
}

pub struct Catalog {
    products: RwLock<HashMap<Uuid, Product>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            products: RwLock::new(HashMap::new()),
        }
    }

    pub async fn list(&self) -> Vec<Product> {
        let guard = self.products.read().await;
        let mut all: Vec<Product> = guard.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub async fn get(&self, id: Uuid) -> Result<Product, StoreError> {
        self.products
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    pub async fn insert(&self, new: NewProduct) -> Product {
        let product = Product {
            id: Uuid::new_v4(),
            name: new.name,
            description: new.description,
            price: new.price,
            stock: new.stock,
            sizes: new.sizes,
            colors: new.colors,
            category: new.category,
            image_url: new.image_url,
        };
        self.products
            .write()
            .await
            .insert(product.id, product.clone());
        product
    }

    pub async fn update(&self, id: Uuid, patch: ProductPatch) -> Result<Product, StoreError> {
        let mut guard = self.products.write().await;
        let product = guard.get_mut(&id).ok_or(StoreError::NotFound)?;
        if let Some(v) = patch.name {
            product.name = v;
        }
        if let Some(v) = patch.description {
            product.description = v;
        }
        if let Some(v) = patch.price {
            product.price = v;
        }
        if let Some(v) = patch.stock {
            product.stock = v;
        }
        if let Some(v) = patch.sizes {
            product.sizes = v;
        }
        if let Some(v) = patch.colors {
            product.colors = v;
        }
        if let Some(v) = patch.category {
            product.category = v;
        }
        if let Some(v) = patch.image_url {
            product.image_url = v;
        }
        Ok(product.clone())
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        match self.products.write().await.remove(&id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound),
        }
    }

    /// Atomically reserve stock for every requested line.
    ///
    /// Two phases under a single write lock: validate all lines first, then
    /// decrement all. A single short line fails the whole call with
    /// [`StoreError::Stock`] and no product is touched.
    pub(crate) async fn reserve_all(
        &self,
        requests: &[(Uuid, u32)],
    ) -> Result<Vec<ReservedItem>, StoreError> {
        let mut guard = self.products.write().await;

        for (product_id, quantity) in requests {
            let product = guard.get(product_id).ok_or(StoreError::NotFound)?;
            if product.stock < *quantity {
                return Err(StoreError::Stock {
                    name: product.name.clone(),
                    requested: *quantity,
                    available: product.stock,
                });
            }
        }

        let mut reserved = Vec::with_capacity(requests.len());
        for (product_id, quantity) in requests {
            let product = guard
                .get_mut(product_id)
                .expect("validated in the first phase");
            product.stock -= quantity;
            reserved.push(ReservedItem {
                product_id: *product_id,
                name: product.name.clone(),
                unit_price: product.price,
                quantity: *quantity,
            });
        }
        Ok(reserved)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}
