use axum::{extract::Query, response::Json};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;

use crate::database::manager::DatabaseManager;
use crate::erp::{catalog, customers};
use crate::error::{ApiError, FieldErrors};
use crate::orders::workflow::normalize_tax_id;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConsultaCadastroParams {
    pub codauxiliar: Option<String>,
}

// Integer parameters arrive as strings so that an empty value
// (`?codfilial=`) falls back to the default instead of failing
// deserialization with a bare 400.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConsultaEstoqueParams {
    pub codauxiliar: Option<String>,
    pub codfilial: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConsultaPrecoParams {
    pub codauxiliar: Option<String>,
    pub cpf: Option<String>,
    pub numregiao: Option<String>,
}

/// GET /api/produtos/consulta-cadastro - product master data by EAN.
pub async fn consulta_cadastro(
    Query(params): Query<ConsultaCadastroParams>,
) -> Result<Json<Value>, ApiError> {
    let codauxiliar = require_codauxiliar(params.codauxiliar.as_deref())?;
    let pool = erp_pool("Erro ao consultar produto. Tente novamente mais tarde.").await?;

    let produto = catalog::find_product_info(&pool, &codauxiliar)
        .await
        .map_err(|e| {
            tracing::error!(codauxiliar = %codauxiliar, "ERP product lookup failed: {}", e);
            ApiError::service_unavailable("Erro ao consultar produto. Tente novamente mais tarde.")
        })?
        .ok_or_else(|| ApiError::not_found("Produto não encontrado."))?;

    Ok(Json(json!({ "data": produto })))
}

/// GET /api/produtos/consulta-estoque - available stock by EAN.
///
/// `codfilial` omitted means branch 1; `-1` returns every branch.
pub async fn consulta_estoque(
    Query(params): Query<ConsultaEstoqueParams>,
) -> Result<Json<Value>, ApiError> {
    let codauxiliar = require_codauxiliar(params.codauxiliar.as_deref())?;
    let codfilial = optional_int(
        params.codfilial.as_deref(),
        "codfilial",
        "O código da filial deve ser um número inteiro.",
    )?
    .unwrap_or(1);
    let pool = erp_pool("Erro ao consultar estoque. Tente novamente mais tarde.").await?;

    let unavailable = |e| {
        tracing::error!("ERP stock lookup failed: {}", e);
        ApiError::service_unavailable("Erro ao consultar estoque. Tente novamente mais tarde.")
    };

    if codfilial == -1 {
        let estoques = catalog::find_stock_all_branches(&pool, &codauxiliar)
            .await
            .map_err(unavailable)?;
        if estoques.is_empty() {
            return Err(ApiError::not_found("Produto não encontrado."));
        }
        return Ok(Json(json!({ "data": estoques })));
    }

    if !catalog::branch_exists(&pool, codfilial).await.map_err(unavailable)? {
        return Err(ApiError::not_found(format!("Filial {codfilial} não encontrada.")));
    }

    let estoque = catalog::find_stock(&pool, &codauxiliar, codfilial)
        .await
        .map_err(unavailable)?
        .ok_or_else(|| ApiError::not_found("Produto não encontrado."))?;

    Ok(Json(json!({ "data": estoque })))
}

/// GET /api/produtos/consulta-preco - regional price by EAN.
///
/// Region precedence: `cpf` (customer's praça region) over `numregiao`
/// over the default region 1; `numregiao=-1` returns every region.
pub async fn consulta_preco(
    Query(params): Query<ConsultaPrecoParams>,
) -> Result<Json<Value>, ApiError> {
    let codauxiliar = require_codauxiliar(params.codauxiliar.as_deref())?;
    let numregiao = optional_int(
        params.numregiao.as_deref(),
        "numregiao",
        "A região deve ser um número inteiro.",
    )?;
    let pool = erp_pool("Erro ao consultar preço. Tente novamente mais tarde.").await?;

    let unavailable = |e| {
        tracing::error!("ERP price lookup failed: {}", e);
        ApiError::service_unavailable("Erro ao consultar preço. Tente novamente mais tarde.")
    };

    if let Some(cpf) = params.cpf.as_deref().filter(|cpf| !cpf.is_empty()) {
        let cpf = normalize_tax_id(cpf);

        let numregiao = customers::find_region_by_tax_id(&pool, &cpf)
            .await
            .map_err(unavailable)?
            .ok_or_else(|| ApiError::not_found("Cliente não encontrado."))?;

        let preco = catalog::find_price(&pool, &codauxiliar, numregiao)
            .await
            .map_err(unavailable)?
            .ok_or_else(|| ApiError::not_found("Produto não encontrado."))?;

        return Ok(Json(json!({ "data": preco })));
    }

    let numregiao = numregiao.unwrap_or(1);

    if numregiao == -1 {
        let precos = catalog::find_prices_all_regions(&pool, &codauxiliar)
            .await
            .map_err(unavailable)?;
        if precos.is_empty() {
            return Err(ApiError::not_found("Produto não encontrado."));
        }
        return Ok(Json(json!({ "data": precos })));
    }

    if !catalog::region_exists(&pool, numregiao).await.map_err(unavailable)? {
        return Err(ApiError::not_found(format!("Região {numregiao} não encontrada.")));
    }

    let preco = catalog::find_price(&pool, &codauxiliar, numregiao)
        .await
        .map_err(unavailable)?
        .ok_or_else(|| ApiError::not_found("Produto não encontrado."))?;

    Ok(Json(json!({ "data": preco })))
}

async fn erp_pool(message: &str) -> Result<PgPool, ApiError> {
    DatabaseManager::erp_pool().await.map_err(|e| {
        tracing::error!("ERP database unavailable: {}", e);
        ApiError::service_unavailable(message)
    })
}

/// Optional integer query parameter; missing or empty means absent,
/// anything else must parse.
fn optional_int(value: Option<&str>, field: &str, message: &str) -> Result<Option<i32>, ApiError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw.parse::<i32>().map(Some).map_err(|_| {
            let mut errors = FieldErrors::new();
            errors
                .entry(field.to_string())
                .or_default()
                .push(message.to_string());
            ApiError::validation_failed(errors)
        }),
    }
}

/// Query validation happens before any ERP access.
fn require_codauxiliar(value: Option<&str>) -> Result<String, ApiError> {
    match value {
        Some(code)
            if !code.is_empty() && code.len() <= 20 && code.chars().all(|c| c.is_ascii_digit()) =>
        {
            Ok(code.to_string())
        }
        Some(_) => {
            let mut errors = FieldErrors::new();
            errors.entry("codauxiliar".to_string()).or_default().push(
                "O código auxiliar (EAN) deve ter entre 1 e 20 dígitos.".to_string(),
            );
            Err(ApiError::validation_failed(errors))
        }
        None => {
            let mut errors = FieldErrors::new();
            errors
                .entry("codauxiliar".to_string())
                .or_default()
                .push("O código auxiliar (EAN) é obrigatório.".to_string());
            Err(ApiError::validation_failed(errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_int_params_fall_back_to_the_default() {
        assert_eq!(optional_int(None, "codfilial", "msg").unwrap(), None);
        assert_eq!(optional_int(Some(""), "codfilial", "msg").unwrap(), None);
        assert_eq!(optional_int(Some(" "), "codfilial", "msg").unwrap(), None);
        assert_eq!(optional_int(Some("2"), "codfilial", "msg").unwrap(), Some(2));
        assert_eq!(optional_int(Some("-1"), "numregiao", "msg").unwrap(), Some(-1));
    }

    #[test]
    fn non_numeric_int_params_get_a_field_error() {
        let err = optional_int(Some("abc"), "codfilial", "O código da filial deve ser um número inteiro.")
            .unwrap_err();
        assert_eq!(err.status_code(), 422);
        let body = err.to_json();
        assert!(body["errors"]["codfilial"].is_array());
    }

    #[test]
    fn codauxiliar_must_be_digits() {
        assert!(require_codauxiliar(Some("7896647027882")).is_ok());
        assert!(require_codauxiliar(Some("abc")).is_err());
        assert!(require_codauxiliar(Some("")).is_err());
        assert!(require_codauxiliar(Some("123456789012345678901")).is_err());
        assert!(require_codauxiliar(None).is_err());
    }
}
