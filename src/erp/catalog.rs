use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgPool};

use crate::database::manager::DatabaseError;

/// Product resolved by auxiliary (EAN) code for order validation.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
    pub codprod: i64,
    pub codauxiliar: String,
    pub descricao: String,
    /// Sale multiple; quantities must be an exact multiple of this.
    pub multiplo: Decimal,
}

/// Full product master data for the consulta-cadastro endpoint.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProductInfo {
    pub codprod: i64,
    pub codauxiliar: String,
    pub descricao: String,
    pub departamento: String,
    pub qt_unitario: Decimal,
    pub qt_multiplo_venda: Decimal,
    pub qt_unit_caixa_master: Decimal,
    pub marca: Option<String>,
    pub unidade: Option<String>,
    pub unidademaster: Option<String>,
}

/// Regional price row from `pctabpr`.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Price {
    pub codprod: i64,
    pub codauxiliar: String,
    pub numregiao: i32,
    pub pvenda: Decimal,
}

/// Available stock at a branch: on-hand minus blocked minus damaged.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Stock {
    pub codprod: i64,
    pub codauxiliar: String,
    pub codfilial: i32,
    pub qt_disponivel: Decimal,
}

pub async fn find_product(
    pool: &PgPool,
    codauxiliar: &str,
) -> Result<Option<Product>, DatabaseError> {
    let product = sqlx::query_as::<_, Product>(
        r#"
        SELECT codprod, codauxiliar, descricao, coalesce(multiplo, 1) AS multiplo
        FROM pcprodut
        WHERE codauxiliar = $1
        "#,
    )
    .bind(codauxiliar)
    .fetch_optional(pool)
    .await?;

    Ok(product)
}

pub async fn find_product_info(
    pool: &PgPool,
    codauxiliar: &str,
) -> Result<Option<ProductInfo>, DatabaseError> {
    let info = sqlx::query_as::<_, ProductInfo>(
        r#"
        SELECT
            p.codprod,
            p.codauxiliar,
            p.descricao,
            d.descricao AS departamento,
            coalesce(p.qtunit, 1) AS qt_unitario,
            coalesce(p.multiplo, 1) AS qt_multiplo_venda,
            coalesce(p.qtunitcx, 0) AS qt_unit_caixa_master,
            p.marca,
            p.unidade,
            p.unidademaster
        FROM pcprodut p
        JOIN pcdepto d ON p.codepto = d.codepto
        WHERE p.codauxiliar = $1
        "#,
    )
    .bind(codauxiliar)
    .fetch_optional(pool)
    .await?;

    Ok(info)
}

pub async fn find_price(
    pool: &PgPool,
    codauxiliar: &str,
    numregiao: i32,
) -> Result<Option<Price>, DatabaseError> {
    let price = sqlx::query_as::<_, Price>(
        r#"
        SELECT p.codprod, p.codauxiliar, t.numregiao, t.pvenda
        FROM pctabpr t
        JOIN pcprodut p ON t.codprod = p.codprod
        WHERE t.numregiao = $1 AND p.codauxiliar = $2
        "#,
    )
    .bind(numregiao)
    .bind(codauxiliar)
    .fetch_optional(pool)
    .await?;

    Ok(price)
}

pub async fn find_prices_all_regions(
    pool: &PgPool,
    codauxiliar: &str,
) -> Result<Vec<Price>, DatabaseError> {
    let prices = sqlx::query_as::<_, Price>(
        r#"
        SELECT p.codprod, p.codauxiliar, t.numregiao, t.pvenda
        FROM pctabpr t
        JOIN pcprodut p ON t.codprod = p.codprod
        WHERE p.codauxiliar = $1
        ORDER BY t.numregiao
        "#,
    )
    .bind(codauxiliar)
    .fetch_all(pool)
    .await?;

    Ok(prices)
}

pub async fn find_stock(
    pool: &PgPool,
    codauxiliar: &str,
    codfilial: i32,
) -> Result<Option<Stock>, DatabaseError> {
    let stock = sqlx::query_as::<_, Stock>(
        r#"
        SELECT
            e.codprod,
            p.codauxiliar,
            e.codfilial,
            ((e.qtestger - e.qtbloqueada) - e.qtindeniz) AS qt_disponivel
        FROM pcest e
        JOIN pcprodut p ON e.codprod = p.codprod
        WHERE e.codfilial = $1 AND p.codauxiliar = $2
        "#,
    )
    .bind(codfilial)
    .bind(codauxiliar)
    .fetch_optional(pool)
    .await?;

    Ok(stock)
}

pub async fn find_stock_all_branches(
    pool: &PgPool,
    codauxiliar: &str,
) -> Result<Vec<Stock>, DatabaseError> {
    let stocks = sqlx::query_as::<_, Stock>(
        r#"
        SELECT
            e.codprod,
            p.codauxiliar,
            e.codfilial,
            ((e.qtestger - e.qtbloqueada) - e.qtindeniz) AS qt_disponivel
        FROM pcest e
        JOIN pcprodut p ON e.codprod = p.codprod
        WHERE p.codauxiliar = $1
        ORDER BY e.codfilial
        "#,
    )
    .bind(codauxiliar)
    .fetch_all(pool)
    .await?;

    Ok(stocks)
}

pub async fn branch_exists(pool: &PgPool, codfilial: i32) -> Result<bool, DatabaseError> {
    let row: Option<(i32,)> = sqlx::query_as("SELECT 1 FROM pcfilial WHERE codigo = $1")
        .bind(codfilial)
        .fetch_optional(pool)
        .await?;

    Ok(row.is_some())
}

pub async fn region_exists(pool: &PgPool, numregiao: i32) -> Result<bool, DatabaseError> {
    let row: Option<(i32,)> = sqlx::query_as("SELECT 1 FROM pcregiao WHERE numregiao = $1")
        .bind(numregiao)
        .fetch_optional(pool)
        .await?;

    Ok(row.is_some())
}
