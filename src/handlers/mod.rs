pub mod auth;
pub mod pedidos;
pub mod produtos;
