use rust_decimal::Decimal;
use thiserror::Error;

use crate::database::manager::DatabaseError;
use crate::error::ApiError;

/// Failure modes of the order submission workflow. Display strings are
/// the exact client-facing messages the integration clients consume.
/// Item indexes are zero-based, matching the position in the request
/// `itens` array.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Cliente não encontrado.")]
    CustomerNotFound,

    #[error("Dados de cobrança/plano de pagamento do cliente não encontrados.")]
    PaymentProfileNotFound,

    #[error("Item {index}: Produto com código {codauxiliar} não encontrado.")]
    ProductNotFound { index: usize, codauxiliar: String },

    #[error("Item {index}: Quantidade {quantidade} não é múltiplo de {multiplo} para o produto {codauxiliar}.")]
    InvalidMultiple {
        index: usize,
        codauxiliar: String,
        quantidade: Decimal,
        multiplo: Decimal,
    },

    #[error("Item {index}: Preço não encontrado para o produto {codauxiliar} na região {numregiao}.")]
    PriceNotFound {
        index: usize,
        codauxiliar: String,
        numregiao: i32,
    },

    /// Lookup-phase infrastructure failure (before any transaction)
    #[error("Erro ao criar pedido. Tente novamente mais tarde.")]
    Database(#[from] DatabaseError),

    /// Transactional-phase failure; the transaction has been rolled back
    /// and the caller may safely resubmit.
    #[error("Erro ao criar pedido. Tente novamente mais tarde.")]
    Persistence(#[source] sqlx::Error),
}

impl OrderError {
    /// Validation and per-item lookup failures are cheap to retry after
    /// fixing the input; infrastructure failures are transient.
    pub fn is_transient(&self) -> bool {
        matches!(self, OrderError::Database(_) | OrderError::Persistence(_))
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        match &err {
            OrderError::CustomerNotFound | OrderError::PaymentProfileNotFound => {
                ApiError::not_found(err.to_string())
            }
            OrderError::ProductNotFound { .. }
            | OrderError::InvalidMultiple { .. }
            | OrderError::PriceNotFound { .. } => ApiError::unprocessable_entity(err.to_string()),
            OrderError::Database(source) => {
                tracing::error!("Order lookup failed: {}", source);
                ApiError::service_unavailable(err.to_string())
            }
            OrderError::Persistence(source) => {
                tracing::error!("Order persistence failed, transaction rolled back: {}", source);
                ApiError::service_unavailable(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_failures_map_to_client_errors() {
        let err: ApiError = OrderError::CustomerNotFound.into();
        assert_eq!(err.status_code(), 404);

        let err: ApiError = OrderError::ProductNotFound {
            index: 2,
            codauxiliar: "7896647027882".to_string(),
        }
        .into();
        assert_eq!(err.status_code(), 422);
        assert_eq!(
            err.message(),
            "Item 2: Produto com código 7896647027882 não encontrado."
        );
    }

    #[test]
    fn infrastructure_failures_are_transient_503() {
        let err = OrderError::Persistence(sqlx::Error::PoolClosed);
        assert!(err.is_transient());
        let api: ApiError = err.into();
        assert_eq!(api.status_code(), 503);
        assert_eq!(api.message(), "Erro ao criar pedido. Tente novamente mais tarde.");
    }
}
