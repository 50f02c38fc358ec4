pub mod datetime;

use alloy::primitives::{hex, utils::{ParseUnits, format_units}};

pub fn format_unit<T>(amount: &T, decimals: u8) -> String
where
    T: Into<ParseUnits> + Copy,
{
    let eth_str = format_units(*amount, decimals).unwrap();
    let v: Vec<&str> = eth_str.split('.').collect();
    let mut fractional = v[1].to_string();
    fractional.truncate(10);
    format!("{}.{}", v[0], fractional)
}

pub fn format_eth<T>(amount: &T) -> String
where
    T: Into<ParseUnits> + Copy,
{
    format_unit(amount, 18)
}

/// Shortened hex for log lines, "0x1234..cdef"
pub fn short_hex(bytes: &[u8]) -> String {
    let hex = hex::encode(bytes);
    match hex.len() > 8 {
        true => format!("0x{}..{}", &hex[..4], &hex[hex.len() - 4..]),
        false => format!("0x{hex}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_hex_truncates() {
        assert_eq!(short_hex(&[0xab; 48]), "0xabab..abab");
        assert_eq!(short_hex(&[0x01, 0x02]), "0x0102");
    }
}
