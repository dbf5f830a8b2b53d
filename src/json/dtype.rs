use bitflags::bitflags;

bitflags! {
    /// The logical type tag of a [`Json`](super::Json) value.
    ///
    /// Single bits tag concrete values; the composite constants are the
    /// flag-set predicates used by the registries and the static analyzer
    /// (`ITERABLE` matches arrays and objects, `NUM` matches ints and
    /// floats, and so on). `UNKNOWN` is reserved for late-bound values whose
    /// concrete type is only known once an input is supplied.
    pub struct Dtype: u16 {
        const BOOL = 0b1;
        const INT = 0b10;
        const FLOAT = 0b100;
        const STR = 0b1000;
        const NULL = 0b1_0000;
        const ARR = 0b10_0000;
        const OBJ = 0b100_0000;
        const REGEX = 0b1000_0000;
        const SLICE = 0b1_0000_0000;
        const UNKNOWN = 0b10_0000_0000;

        const ITERABLE = Self::ARR.bits | Self::OBJ.bits;
        const NUM = Self::INT.bits | Self::FLOAT.bits;
        const STR_OR_REGEX = Self::STR.bits | Self::REGEX.bits;
        const INT_OR_SLICE = Self::INT.bits | Self::SLICE.bits;
        const SCALAR = Self::BOOL.bits
            | Self::INT.bits
            | Self::FLOAT.bits
            | Self::STR.bits
            | Self::NULL.bits;
        const ANYTHING = Self::SCALAR.bits | Self::ITERABLE.bits | Self::UNKNOWN.bits;
    }
}

impl Dtype {
    /// Human-readable name used in error messages.
    pub fn describe(self) -> String {
        let names: &[(Dtype, &str)] = &[
            (Dtype::BOOL, "bool"),
            (Dtype::INT, "int"),
            (Dtype::FLOAT, "float"),
            (Dtype::STR, "string"),
            (Dtype::NULL, "null"),
            (Dtype::ARR, "array"),
            (Dtype::OBJ, "object"),
            (Dtype::REGEX, "regex"),
            (Dtype::SLICE, "slice"),
            (Dtype::UNKNOWN, "unknown"),
        ];

        let mut parts = vec![];
        for (flag, name) in names {
            if self.contains(*flag) {
                parts.push(*name);
            }
        }

        match parts.len() {
            0 => "nothing".to_owned(),
            _ => parts.join(" or "),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_flags() {
        assert!(Dtype::ITERABLE.contains(Dtype::ARR));
        assert!(Dtype::ITERABLE.contains(Dtype::OBJ));
        assert!(!Dtype::ITERABLE.intersects(Dtype::STR));
        assert!(Dtype::NUM.contains(Dtype::INT | Dtype::FLOAT));
        assert!(Dtype::STR_OR_REGEX.contains(Dtype::REGEX));
        assert!(Dtype::INT_OR_SLICE.contains(Dtype::SLICE));
        assert!(Dtype::ANYTHING.contains(Dtype::UNKNOWN));
        assert!(!Dtype::ANYTHING.contains(Dtype::REGEX));
    }

    #[test]
    fn test_describe() {
        assert_eq!(Dtype::INT.describe(), "int");
        assert_eq!(Dtype::NUM.describe(), "int or float");
        assert_eq!(Dtype::empty().describe(), "nothing");
    }
}
