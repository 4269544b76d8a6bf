//! Order submission workflow: validate input, resolve customer and
//! pricing data, then persist header and line items atomically against
//! the ERP.

pub mod error;
pub mod request;
pub mod workflow;

pub use error::OrderError;
pub use request::{CriarPedidoRequest, NovoPedido};
pub use workflow::{PedidoCriado, ValidatedLine};
