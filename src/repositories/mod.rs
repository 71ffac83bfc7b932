//! Single-statement persistence primitives.
//!
//! Every mutation here is one conditional `UPDATE ... WHERE` whose row count
//! tells the caller whether it won. Functions are generic over
//! [`sea_orm::ConnectionTrait`] so they run on the pool or inside a
//! transaction alike.

pub mod order_repository;
pub mod product_stock;
pub mod quote_repository;
