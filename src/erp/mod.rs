//! Read/write access to the WinThor ERP schema. The schema is owned by
//! the ERP; nothing here creates or migrates tables.

pub mod catalog;
pub mod customers;

/// SQL expression yielding the digits-only form of the stored customer
/// tax id (`cgcent` is stored formatted, e.g. "123.456.789-01").
pub(crate) const TAX_ID_DIGITS: &str = "regexp_replace(cgcent, '[^0-9]', '', 'g')";
