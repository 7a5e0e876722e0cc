//! CSV/TXT bulk upload normalization
//!
//! Uploads follow the predefined template: either a header row naming the
//! columns (long names or the short aliases printed on the template:
//! `sn`, `vn`, `ed`) or the fixed positional order
//! `serial_number, denomination, product_code[, voucher_number, expiry_date]`.

use uuid::Uuid;

use super::{canonical_serial, parse_amount, NormalizeError};
use crate::models::{SourceChannel, VoucherRecord};

/// Column positions resolved from the upload header (or the positional
/// default when the file has no header row)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    pub serial_number: usize,
    pub denomination: usize,
    pub product_code: usize,
    pub voucher_number: Option<usize>,
    pub expiry_date: Option<usize>,
}

impl Default for ColumnMap {
    /// Positional template order
    fn default() -> Self {
        Self {
            serial_number: 0,
            denomination: 1,
            product_code: 2,
            voucher_number: Some(3),
            expiry_date: Some(4),
        }
    }
}

impl ColumnMap {
    /// Resolve a header row into column positions
    ///
    /// Returns `None` when the row names none of the known columns, in
    /// which case the file is headerless and positional mapping applies.
    pub fn from_header(header: &str) -> Option<Self> {
        let names: Vec<String> = split_fields(header)
            .iter()
            .map(|f| f.trim().to_ascii_lowercase())
            .collect();

        let find = |candidates: &[&str]| -> Option<usize> {
            names.iter().position(|n| candidates.contains(&n.as_str()))
        };

        let serial_number = find(&["serial_number", "serial", "sn"])?;
        let denomination = find(&["denomination", "amount", "nominal"])?;
        let product_code = find(&["product_code", "product", "kode_produk"])?;

        Some(Self {
            serial_number,
            denomination,
            product_code,
            voucher_number: find(&["voucher_number", "vn"]),
            expiry_date: find(&["expiry_date", "expiry", "ed"]),
        })
    }
}

/// Split an upload into its column map and data rows
///
/// Blank lines are skipped; row numbers are 1-based file line numbers so
/// rejection reasons point the operator at the right line.
pub fn split_upload(payload: &str) -> (ColumnMap, Vec<(usize, String)>) {
    let mut lines = payload
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.to_string()))
        .filter(|(_, l)| !l.trim().is_empty());

    let first = lines.next();
    let mut rows = Vec::new();

    let columns = match first {
        Some((line_number, line)) => match ColumnMap::from_header(&line) {
            Some(map) => map,
            None => {
                rows.push((line_number, line));
                ColumnMap::default()
            }
        },
        None => ColumnMap::default(),
    };

    rows.extend(lines);
    (columns, rows)
}

/// Normalize one data row
pub fn normalize_row(
    line: &str,
    line_number: usize,
    columns: &ColumnMap,
    batch_id: Uuid,
) -> Result<VoucherRecord, NormalizeError> {
    let fields = split_fields(line);
    if fields.iter().all(|f| f.trim().is_empty()) {
        return Err(NormalizeError::MalformedRow(format!("line {}: empty row", line_number)));
    }

    let field = |idx: usize, name: &'static str| -> Result<&str, NormalizeError> {
        let value = fields
            .get(idx)
            .map(|f| f.trim())
            .ok_or(NormalizeError::MissingField(name))?;
        if value.is_empty() {
            return Err(NormalizeError::MissingField(name));
        }
        Ok(value)
    };

    let serial_number = canonical_serial(field(columns.serial_number, "serial_number")?);
    let denomination = parse_amount(field(columns.denomination, "denomination")?)?;
    let product_code = field(columns.product_code, "product_code")?.to_string();

    let optional = |idx: Option<usize>| -> Option<String> {
        idx.and_then(|i| fields.get(i))
            .map(|f| f.trim())
            .filter(|f| !f.is_empty())
            .map(|f| f.to_string())
    };

    let mut record = VoucherRecord::new(
        serial_number,
        denomination,
        product_code,
        SourceChannel::Csv,
        line.to_string(),
        None,
        batch_id,
    );
    record.voucher_number = optional(columns.voucher_number);
    record.expiry_date = optional(columns.expiry_date);
    Ok(record)
}

/// Split a row on the template delimiter (comma, falling back to
/// semicolon or tab for TXT exports)
fn split_fields(line: &str) -> Vec<&str> {
    let delimiter = if line.contains(',') {
        ','
    } else if line.contains(';') {
        ';'
    } else {
        '\t'
    };
    line.split(delimiter).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_with_long_names_resolves() {
        let map = ColumnMap::from_header("serial_number,denomination,product_code").unwrap();
        assert_eq!(map.serial_number, 0);
        assert_eq!(map.voucher_number, None);
    }

    #[test]
    fn header_with_template_aliases_resolves() {
        let map = ColumnMap::from_header("sn,nominal,product,vn,ed").unwrap();
        assert_eq!(map.serial_number, 0);
        assert_eq!(map.voucher_number, Some(3));
        assert_eq!(map.expiry_date, Some(4));
    }

    #[test]
    fn headerless_upload_is_positional() {
        let payload = "AAAA111122223333,50.000,TSEL50\nBBBB111122223333,100.000,TSEL100\n";
        let (columns, rows) = split_upload(payload);
        assert_eq!(columns, ColumnMap::default());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, 1);
    }

    #[test]
    fn row_normalizes_with_optional_fields() {
        let map = ColumnMap::from_header("sn,amount,product,vn,ed").unwrap();
        let record = normalize_row(
            "aaaa111122223333,Rp 50.000,TSEL50,V-0099,2026-12-31",
            2,
            &map,
            Uuid::new_v4(),
        )
        .unwrap();
        assert_eq!(record.serial_number, "AAAA111122223333");
        assert_eq!(record.denomination, 50000);
        assert_eq!(record.voucher_number.as_deref(), Some("V-0099"));
        assert_eq!(record.expiry_date.as_deref(), Some("2026-12-31"));
        assert!(record.confidence.is_none());
    }

    #[test]
    fn missing_column_is_local_error() {
        let map = ColumnMap::default();
        let err = normalize_row("AAAA111122223333,50.000", 3, &map, Uuid::new_v4()).unwrap_err();
        assert_eq!(err, NormalizeError::MissingField("product_code"));
    }
}
