use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};

use super::error::OrderError;
use super::request::{NovoPedido, NovoPedidoItem};
use crate::erp::customers::{Customer, PaymentProfile};
use crate::erp::{catalog, customers};

/// Line item that passed product, multiple and price validation.
#[derive(Debug, Clone, Serialize)]
pub struct ValidatedLine {
    pub codprod: i64,
    pub codauxiliar: String,
    pub quantidade: Decimal,
    pub pvenda: Decimal,
    pub multiplo: Decimal,
}

/// Fully resolved order as returned to the client after commit.
#[derive(Debug, Serialize)]
pub struct PedidoCriado {
    pub numped: i64,
    pub codcli: i64,
    pub cliente: String,
    pub codusur: i64,
    pub codfilial: i32,
    pub codcob: String,
    pub cobranca: String,
    pub codplpag: i64,
    pub plano_pagamento: String,
    pub codtransp: i64,
    pub obs: String,
    pub obs_entrega: String,
    pub itens: Vec<ValidatedLine>,
    pub total_itens: usize,
    pub valor_total: Decimal,
}

/// Tax ids arrive formatted ("123.456.789-01"); lookups use digits only.
pub fn normalize_tax_id(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Pricing region precedence: explicit request value wins over the
/// region derived from the customer's praça, which wins over 1.
pub fn resolve_region(explicit: Option<i32>, customer_region: Option<i32>) -> i32 {
    explicit.or(customer_region).unwrap_or(1)
}

/// Quantities must land on an exact multiple of the product's sale
/// multiple. Uses a real-number remainder since quantities may be
/// fractional. A multiple of zero disables the check.
pub fn multiple_ok(quantidade: Decimal, multiplo: Decimal) -> bool {
    multiplo <= Decimal::ZERO || (quantidade % multiplo).is_zero()
}

pub fn order_total(lines: &[ValidatedLine]) -> Decimal {
    lines.iter().map(|l| l.quantidade * l.pvenda).sum()
}

/// Runs the order submission workflow end to end:
///
/// 1. resolve customer by normalized tax id
/// 2. resolve the customer's billing/payment configuration
/// 3. resolve the pricing region
/// 4. validate and price every line item, in request order
/// 5. inside one transaction: allocate the next order number for the
///    customer's sales rep, insert the header and all line items
///
/// Steps 1-4 issue no writes; any failure there leaves the ERP
/// untouched. Step 5 commits atomically or rolls back entirely.
pub async fn submit(pool: &PgPool, pedido: NovoPedido) -> Result<PedidoCriado, OrderError> {
    let cpf = normalize_tax_id(&pedido.cpf);

    let customer = customers::find_by_tax_id(pool, &cpf)
        .await?
        .ok_or(OrderError::CustomerNotFound)?;

    let payment = customers::find_payment_profile(pool, customer.codcli)
        .await?
        .ok_or(OrderError::PaymentProfileNotFound)?;

    // The praça lookup is skipped entirely when the request pins a region
    let customer_region = match pedido.numregiao {
        Some(_) => None,
        None => customers::find_region_by_tax_id(pool, &cpf).await?,
    };
    let numregiao = resolve_region(pedido.numregiao, customer_region);

    let lines = validate_lines(pool, &pedido.itens, numregiao).await?;

    let mut tx = pool.begin().await.map_err(OrderError::Persistence)?;
    let persisted = persist(&mut tx, &pedido, &cpf, &customer, &payment, &lines).await;

    let numped = match persisted {
        Ok(numped) => {
            tx.commit().await.map_err(OrderError::Persistence)?;
            numped
        }
        Err(e) => {
            // Explicit rollback so the failure is logged even though a
            // dropped transaction would roll back anyway.
            let _ = tx.rollback().await;
            return Err(OrderError::Persistence(e));
        }
    };

    tracing::info!(
        numped,
        codcli = customer.codcli,
        codusur = customer.codusur1,
        itens = lines.len(),
        "Order created"
    );

    let valor_total = order_total(&lines);
    Ok(PedidoCriado {
        numped,
        codcli: customer.codcli,
        cliente: customer.cliente,
        codusur: customer.codusur1,
        codfilial: pedido.codfilial,
        codcob: payment.codcob,
        cobranca: payment.cobranca,
        codplpag: payment.codplpag,
        plano_pagamento: payment.plano_pagamento,
        codtransp: pedido.codtransp,
        obs: pedido.obs,
        obs_entrega: pedido.obs_entrega,
        total_itens: lines.len(),
        itens: lines,
        valor_total,
    })
}

/// Validates every input line in order. The first failure aborts the
/// whole request; no partial validation results are returned.
async fn validate_lines(
    pool: &PgPool,
    itens: &[NovoPedidoItem],
    numregiao: i32,
) -> Result<Vec<ValidatedLine>, OrderError> {
    let mut lines = Vec::with_capacity(itens.len());

    for (index, item) in itens.iter().enumerate() {
        let product = catalog::find_product(pool, &item.codauxiliar)
            .await?
            .ok_or_else(|| OrderError::ProductNotFound {
                index,
                codauxiliar: item.codauxiliar.clone(),
            })?;

        if !multiple_ok(item.quantidade, product.multiplo) {
            return Err(OrderError::InvalidMultiple {
                index,
                codauxiliar: item.codauxiliar.clone(),
                quantidade: item.quantidade,
                multiplo: product.multiplo,
            });
        }

        let price = catalog::find_price(pool, &item.codauxiliar, numregiao)
            .await?
            .ok_or_else(|| OrderError::PriceNotFound {
                index,
                codauxiliar: item.codauxiliar.clone(),
                numregiao,
            })?;

        lines.push(ValidatedLine {
            codprod: product.codprod,
            codauxiliar: item.codauxiliar.clone(),
            quantidade: item.quantidade,
            pvenda: price.pvenda,
            multiplo: product.multiplo,
        });
    }

    Ok(lines)
}

async fn persist(
    tx: &mut Transaction<'_, Postgres>,
    pedido: &NovoPedido,
    cpf: &str,
    customer: &Customer,
    payment: &PaymentProfile,
    lines: &[ValidatedLine],
) -> Result<i64, sqlx::Error> {
    let numped = allocate_order_number(tx, customer.codusur1).await?;

    insert_header(tx, numped, pedido, cpf, customer, payment).await?;

    for (seq, line) in lines.iter().enumerate() {
        insert_line(tx, numped, cpf, customer.codusur1, seq as i32 + 1, line).await?;
    }

    Ok(numped)
}

/// Allocates the next order number for a sales rep. The single UPDATE
/// both increments the counter and returns the post-increment value,
/// and its row lock serializes concurrent submissions for the same rep
/// until the enclosing transaction ends. Reps on different rows never
/// block each other.
async fn allocate_order_number(
    tx: &mut Transaction<'_, Postgres>,
    codusur: i64,
) -> Result<i64, sqlx::Error> {
    let (numped,): (i64,) = sqlx::query_as(
        "UPDATE pcusuari SET proxnumped = proxnumped + 1 WHERE codusur = $1 RETURNING proxnumped",
    )
    .bind(codusur)
    .fetch_one(&mut **tx)
    .await?;

    Ok(numped)
}

async fn insert_header(
    tx: &mut Transaction<'_, Postgres>,
    numped: i64,
    pedido: &NovoPedido,
    cpf: &str,
    customer: &Customer,
    payment: &PaymentProfile,
) -> Result<(), sqlx::Error> {
    // Fixed markers identify rows written by this integration:
    // origemped 'T', importado 1, condvenda 1 (sale), obs2 tag.
    sqlx::query(
        r#"
        INSERT INTO pcpedcfv (
            origemped, importado, numpedrca, codusur, cgccli,
            dtaberturapedpalm, dtfechamentopedpalm,
            codfilial, codfilialnf, codfilialretira,
            vlfrete, codcob, codplpag, condvenda,
            obs1, obs2, obsentrega1, obsentrega2,
            codfornecfrete, tipodocumento, codcli, geracp
        )
        VALUES (
            'T', 1, $1, $2, $3,
            CURRENT_DATE, CURRENT_DATE,
            $4, $4, $4,
            0, $5, $6, 1,
            $7, 'FORCA VENDAS API - EASYTECH', $8, '',
            $9, NULL, $10, NULL
        )
        "#,
    )
    .bind(numped)
    .bind(customer.codusur1)
    .bind(cpf)
    .bind(pedido.codfilial)
    .bind(&payment.codcob)
    .bind(payment.codplpag)
    .bind(&pedido.obs)
    .bind(&pedido.obs_entrega)
    .bind(pedido.codtransp)
    .bind(customer.codcli)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

async fn insert_line(
    tx: &mut Transaction<'_, Postgres>,
    numped: i64,
    cpf: &str,
    codusur: i64,
    numseq: i32,
    line: &ValidatedLine,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO pcpedifv (
            numpedrca, cgccli, codusur, dtaberturapedpalm,
            codprod, qt, pvenda, codauxiliar, numseq, respquestfrete
        )
        VALUES ($1, $2, $3, CURRENT_DATE, $4, $5, $6, $7, $8, 'N')
        "#,
    )
    .bind(numped)
    .bind(cpf)
    .bind(codusur)
    .bind(line.codprod)
    .bind(line.quantidade)
    .bind(line.pvenda)
    .bind(&line.codauxiliar)
    .bind(numseq)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn tax_id_normalization_strips_punctuation() {
        assert_eq!(normalize_tax_id("123.456.789-01"), "12345678901");
        assert_eq!(normalize_tax_id("12.345.678/0001-99"), "12345678000199");
        // Round trip: an already-normalized value is unchanged
        assert_eq!(normalize_tax_id("12345678901"), "12345678901");
        assert_eq!(normalize_tax_id("abc"), "");
    }

    #[test]
    fn region_precedence_explicit_then_customer_then_default() {
        assert_eq!(resolve_region(Some(5), Some(3)), 5);
        assert_eq!(resolve_region(None, Some(3)), 3);
        assert_eq!(resolve_region(None, None), 1);
    }

    #[test]
    fn multiple_of_six_rejects_ten_accepts_twelve() {
        let six = dec("6");
        assert!(!multiple_ok(dec("10"), six));
        assert!(multiple_ok(dec("12"), six));
        assert!(multiple_ok(dec("0"), six));
    }

    #[test]
    fn fractional_multiples_use_real_remainder() {
        assert!(multiple_ok(dec("1.5"), dec("0.5")));
        assert!(!multiple_ok(dec("1.6"), dec("0.5")));
    }

    #[test]
    fn zero_multiple_disables_the_check() {
        assert!(multiple_ok(dec("7"), dec("0")));
    }

    #[test]
    fn total_is_exact_sum_of_quantity_times_price() {
        let lines = vec![
            ValidatedLine {
                codprod: 1,
                codauxiliar: "7896647027882".to_string(),
                quantidade: dec("10"),
                pvenda: dec("29.90"),
                multiplo: dec("1"),
            },
            ValidatedLine {
                codprod: 2,
                codauxiliar: "7891234567890".to_string(),
                quantidade: dec("5"),
                pvenda: dec("10.00"),
                multiplo: dec("1"),
            },
        ];

        assert_eq!(order_total(&lines), dec("349.00"));
    }

    #[test]
    fn empty_line_list_totals_zero() {
        assert_eq!(order_total(&[]), Decimal::ZERO);
    }
}
