//! Bazaar Storage Layer
//!
//! Provides persistence for products, orders, return requests, approval
//! requests and financial records.
//!
//! # Architecture
//!
//! - **Repository traits**: Define the storage interface (ports)
//! - **In-memory store**: Fast implementation for testing
//! - **PostgreSQL store**: Production implementation (feature `postgres`)
//!
//! # Usage
//!
//! ```rust
//! use bazaar_store::{MemoryStore, Store, StockDecrement};
//! use bazaar_domain::{Money, Product, Quantity};
//! use rust_decimal_macros::dec;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = MemoryStore::new();
//!
//!     let product = Product::new("Mug", Money::new(dec!(12)).unwrap(), 3);
//!     store.products().save(&product).await.unwrap();
//!
//!     let result = store
//!         .products()
//!         .try_reserve(product.id, Quantity::new(2).unwrap())
//!         .await
//!         .unwrap();
//!     assert_eq!(result, StockDecrement::Applied { remaining: 1 });
//! }
//! ```

#![warn(clippy::all)]

// Modules
mod error;
mod memory;
#[cfg(feature = "postgres")]
mod postgres;
mod repository;

// Re-exports
pub use error::StoreError;
pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PgStore;
pub use repository::{
    ApprovalRepository, FinancialRecordRepository, OrderRepository, ProductRepository,
    ReturnRepository, StockDecrement, Store,
};
