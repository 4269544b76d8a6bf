use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ApiError, FieldErrors};

/// Raw `POST /api/pedidos` body. Every field is optional at the serde
/// level so that missing fields surface as per-field validation
/// messages instead of a deserialization failure.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CriarPedidoRequest {
    pub cpf: Option<String>,
    pub codtransp: Option<i64>,
    pub codfilial: Option<i32>,
    pub numregiao: Option<i32>,
    pub obs: Option<String>,
    pub obs_entrega: Option<String>,
    pub itens: Option<Vec<ItemInput>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ItemInput {
    /// Accepts a digit string or a bare JSON number
    pub codauxiliar: Option<Value>,
    pub quantidade: Option<Decimal>,
}

/// Validated order input, ready for the submission workflow. No
/// database access has happened at this point.
#[derive(Debug, Clone)]
pub struct NovoPedido {
    pub cpf: String,
    pub codtransp: i64,
    pub codfilial: i32,
    pub numregiao: Option<i32>,
    pub obs: String,
    pub obs_entrega: String,
    pub itens: Vec<NovoPedidoItem>,
}

#[derive(Debug, Clone)]
pub struct NovoPedidoItem {
    pub codauxiliar: String,
    pub quantidade: Decimal,
}

impl CriarPedidoRequest {
    pub fn validate(self) -> Result<NovoPedido, ApiError> {
        let mut errors = FieldErrors::new();

        let cpf = match self.cpf {
            Some(ref cpf) if !cpf.trim().is_empty() => {
                if cpf.len() > 20 {
                    fail(&mut errors, "cpf", "O CPF/CNPJ deve ter no máximo 20 caracteres.");
                }
                cpf.clone()
            }
            _ => {
                fail(&mut errors, "cpf", "O CPF/CNPJ do cliente é obrigatório.");
                String::new()
            }
        };

        let codtransp = match self.codtransp {
            Some(codtransp) => codtransp,
            None => {
                fail(&mut errors, "codtransp", "O código da transportadora é obrigatório.");
                0
            }
        };

        if self.obs.as_deref().is_some_and(|s| s.len() > 500) {
            fail(&mut errors, "obs", "A observação deve ter no máximo 500 caracteres.");
        }
        if self.obs_entrega.as_deref().is_some_and(|s| s.len() > 500) {
            fail(
                &mut errors,
                "obs_entrega",
                "A observação de entrega deve ter no máximo 500 caracteres.",
            );
        }

        let mut itens = Vec::new();
        match self.itens {
            Some(ref inputs) if !inputs.is_empty() => {
                for (index, item) in inputs.iter().enumerate() {
                    let codauxiliar = match item.codauxiliar.as_ref().and_then(auxiliary_code) {
                        Some(code) => code,
                        None => {
                            fail(
                                &mut errors,
                                &format!("itens.{index}.codauxiliar"),
                                "O código auxiliar (EAN) do item deve ter entre 1 e 20 dígitos.",
                            );
                            String::new()
                        }
                    };

                    let quantidade = match item.quantidade {
                        Some(qt) if qt >= Decimal::ONE => qt,
                        Some(_) => {
                            fail(
                                &mut errors,
                                &format!("itens.{index}.quantidade"),
                                "A quantidade do item deve ser no mínimo 1.",
                            );
                            Decimal::ZERO
                        }
                        None => {
                            fail(
                                &mut errors,
                                &format!("itens.{index}.quantidade"),
                                "A quantidade do item é obrigatória.",
                            );
                            Decimal::ZERO
                        }
                    };

                    itens.push(NovoPedidoItem { codauxiliar, quantidade });
                }
            }
            _ => {
                fail(&mut errors, "itens", "É necessário informar pelo menos um item.");
            }
        }

        if !errors.is_empty() {
            return Err(ApiError::validation_failed(errors));
        }

        Ok(NovoPedido {
            cpf,
            codtransp,
            codfilial: self.codfilial.unwrap_or(1),
            numregiao: self.numregiao,
            obs: self.obs.unwrap_or_default(),
            obs_entrega: self.obs_entrega.unwrap_or_default(),
            itens,
        })
    }
}

fn fail(errors: &mut FieldErrors, field: &str, message: &str) {
    errors
        .entry(field.to_string())
        .or_default()
        .push(message.to_string());
}

/// Normalize the auxiliary code input: a digit string of 1-20 chars, or
/// a bare JSON integer with up to 20 digits.
fn auxiliary_code(value: &Value) -> Option<String> {
    let code = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };

    if code.is_empty() || code.len() > 20 || !code.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    Some(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(body: Value) -> CriarPedidoRequest {
        serde_json::from_value(body).expect("request should deserialize")
    }

    #[test]
    fn accepts_minimal_valid_request() {
        let pedido = request(json!({
            "cpf": "123.456.789-01",
            "codtransp": 7,
            "itens": [{ "codauxiliar": "7896647027882", "quantidade": 10 }]
        }))
        .validate()
        .expect("should validate");

        assert_eq!(pedido.codfilial, 1);
        assert_eq!(pedido.numregiao, None);
        assert_eq!(pedido.itens.len(), 1);
        assert_eq!(pedido.itens[0].codauxiliar, "7896647027882");
    }

    #[test]
    fn accepts_numeric_auxiliary_code() {
        let pedido = request(json!({
            "cpf": "12345678901",
            "codtransp": 1,
            "itens": [{ "codauxiliar": 7896647027882i64, "quantidade": 1 }]
        }))
        .validate()
        .expect("should validate");

        assert_eq!(pedido.itens[0].codauxiliar, "7896647027882");
    }

    #[test]
    fn rejects_missing_cpf_with_field_error() {
        let err = request(json!({
            "codtransp": 1,
            "itens": [{ "codauxiliar": "789", "quantidade": 1 }]
        }))
        .validate()
        .unwrap_err();

        assert_eq!(err.status_code(), 422);
        let body = err.to_json();
        assert!(body["errors"]["cpf"].is_array());
    }

    #[test]
    fn rejects_empty_item_list() {
        let err = request(json!({
            "cpf": "12345678901",
            "codtransp": 1,
            "itens": []
        }))
        .validate()
        .unwrap_err();

        let body = err.to_json();
        assert_eq!(body["errors"]["itens"][0], "É necessário informar pelo menos um item.");
    }

    #[test]
    fn rejects_zero_and_negative_quantities() {
        for qt in [json!(0), json!(-3)] {
            let err = request(json!({
                "cpf": "12345678901",
                "codtransp": 1,
                "itens": [{ "codauxiliar": "789", "quantidade": qt }]
            }))
            .validate()
            .unwrap_err();

            let body = err.to_json();
            assert!(body["errors"]["itens.0.quantidade"].is_array());
        }
    }

    #[test]
    fn rejects_non_numeric_auxiliary_code() {
        let err = request(json!({
            "cpf": "12345678901",
            "codtransp": 1,
            "itens": [{ "codauxiliar": "ABC123", "quantidade": 1 }]
        }))
        .validate()
        .unwrap_err();

        let body = err.to_json();
        assert!(body["errors"]["itens.0.codauxiliar"].is_array());
    }

    #[test]
    fn fractional_quantities_above_one_are_allowed() {
        let pedido = request(json!({
            "cpf": "12345678901",
            "codtransp": 1,
            "itens": [{ "codauxiliar": "789", "quantidade": 1.5 }]
        }))
        .validate()
        .expect("should validate");

        assert_eq!(pedido.itens[0].quantidade, Decimal::new(15, 1));
    }
}
