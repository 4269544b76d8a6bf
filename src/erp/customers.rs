use serde::Serialize;
use sqlx::{FromRow, PgPool};

use super::TAX_ID_DIGITS;
use crate::database::manager::DatabaseError;

/// Customer row from `pcclient`, looked up by normalized tax id.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Customer {
    pub codcli: i64,
    pub codusur1: i64,
    pub cliente: String,
}

/// Billing method and payment plan configured for a customer.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PaymentProfile {
    pub codcob: String,
    pub cobranca: String,
    pub codplpag: i64,
    pub plano_pagamento: String,
}

pub async fn find_by_tax_id(pool: &PgPool, cpf: &str) -> Result<Option<Customer>, DatabaseError> {
    let sql = format!(
        "SELECT codcli, codusur1, cliente FROM pcclient WHERE {} = $1",
        TAX_ID_DIGITS
    );

    let customer = sqlx::query_as::<_, Customer>(&sql)
        .bind(cpf)
        .fetch_optional(pool)
        .await?;

    Ok(customer)
}

pub async fn find_payment_profile(
    pool: &PgPool,
    codcli: i64,
) -> Result<Option<PaymentProfile>, DatabaseError> {
    let profile = sqlx::query_as::<_, PaymentProfile>(
        r#"
        SELECT c.codcob, b.cobranca, c.codplpag, p.descricao AS plano_pagamento
        FROM pcclient c
        JOIN pccob b ON c.codcob = b.codcob
        JOIN pcplpag p ON c.codplpag = p.codplpag
        WHERE c.codcli = $1
        "#,
    )
    .bind(codcli)
    .fetch_optional(pool)
    .await?;

    Ok(profile)
}

/// Pricing region derived from the customer's commercial zone (praça).
pub async fn find_region_by_tax_id(
    pool: &PgPool,
    cpf: &str,
) -> Result<Option<i32>, DatabaseError> {
    let sql = format!(
        r#"
        SELECT p.numregiao
        FROM pcclient c
        JOIN pcpraca p ON c.codpraca = p.codpraca
        WHERE {} = $1
        "#,
        TAX_ID_DIGITS
    );

    let region: Option<(i32,)> = sqlx::query_as(&sql).bind(cpf).fetch_optional(pool).await?;

    Ok(region.map(|(numregiao,)| numregiao))
}
