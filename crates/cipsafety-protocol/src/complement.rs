//! Complement data check for the 3 to 250 byte formats

/// True when both regions have the same length and every byte pair XORs to 0xFF.
///
/// Symmetric in its arguments.
#[must_use]
pub fn complement_check(primary: &[u8], complement: &[u8]) -> bool {
    primary.len() == complement.len()
        && primary
            .iter()
            .zip(complement)
            .all(|(&a, &b)| a ^ b == 0xFF)
}

/// Bitwise complement of a data region
#[must_use]
pub fn complement(data: &[u8]) -> Vec<u8> {
    data.iter().map(|&b| !b).collect()
}
