//! Raw phone input to canonical chat-address conversion.

/// Country code prefixed onto bare 11-digit mobile numbers.
const COUNTRY_CODE: &str = "55";

/// Domain suffix of the provider's chat-address form.
const ADDRESS_SUFFIX: &str = "@c.us";

/// Convert loosely formatted phone input into the provider's canonical
/// address.
///
/// Strips everything that is not a digit; an 11-digit remainder is taken as
/// a domestic mobile number and gets the country code prepended. Total
/// function: malformed input simply yields an address the provider will
/// reject at send time.
pub fn canonical_address(raw: &str) -> String {
    let mut digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 11 {
        digits.insert_str(0, COUNTRY_CODE);
    }
    format!("{digits}{ADDRESS_SUFFIX}")
}
