//! Arithmetic operator precedence.
//!
//! Ranks drive the expression tree builder: a lower rank binds tighter,
//! and operators of equal rank associate to the left. Exponentiation
//! binds tightest, then the multiplicative group, then the additive one.

/// Binding rank of an operator character, `None` for anything else.
pub(super) fn rank(op: char) -> Option<u8> {
    match op {
        '^' => Some(0),
        '%' => Some(1),
        '*' => Some(2),
        '/' => Some(3),
        '+' => Some(4),
        '-' => Some(5),
        _ => None,
    }
}

/// Starting rank for a climb; looser than every real operator.
pub(super) const TOP_RANK: u8 = u8::MAX;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponent_binds_tighter_than_multiplicative_and_additive() {
        assert!(rank('^') < rank('*'));
        assert!(rank('^') < rank('%'));
        assert!(rank('*') < rank('+'));
        assert!(rank('/') < rank('-'));
    }

    #[test]
    fn non_operators_have_no_rank() {
        assert_eq!(rank('='), None);
        assert_eq!(rank('('), None);
        assert_eq!(rank('x'), None);
    }
}
