use axum::{http::StatusCode, response::Json};
use serde_json::{json, Value};

use crate::database::manager::DatabaseManager;
use crate::error::ApiError;
use crate::orders::{workflow, CriarPedidoRequest, OrderError};

/// POST /api/pedidos - create an order in the WinThor integration
/// tables.
///
/// Input validation and all customer/item lookups run before any write;
/// the header and line items then commit in a single transaction.
pub async fn criar(
    Json(payload): Json<CriarPedidoRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let pedido = payload.validate()?;

    let pool = DatabaseManager::erp_pool()
        .await
        .map_err(OrderError::Database)?;

    let criado = workflow::submit(&pool, pedido).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Pedido criado com sucesso.",
            "data": criado,
        })),
    ))
}
