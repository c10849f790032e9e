use serde::{Deserialize, Serialize};

use super::reply;

/// Scalar type a controller variable is read back as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarKind {
    Float,
    Double,
    Int,
    UInt,
    Str,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VarValue {
    Float(f32),
    Double(f64),
    Int(i32),
    UInt(u32),
    Str(String),
}

impl VarKind {
    /// Interpret a trimmed reply as a value of this kind.
    ///
    /// Numeric kinds reject anything that is not a plain finite number;
    /// `Str` accepts the reply as is.
    pub fn parse(self, reply: &str) -> Option<VarValue> {
        match self {
            VarKind::Float => reply::parse_number::<f32>(reply).map(VarValue::Float),
            VarKind::Double => reply::parse_number::<f64>(reply).map(VarValue::Double),
            VarKind::Int => reply::parse_number::<i32>(reply).map(VarValue::Int),
            VarKind::UInt => reply::parse_number::<u32>(reply).map(VarValue::UInt),
            VarKind::Str => Some(VarValue::Str(reply.to_string())),
        }
    }
}

impl VarValue {
    pub fn kind(&self) -> VarKind {
        match self {
            VarValue::Float(_) => VarKind::Float,
            VarValue::Double(_) => VarKind::Double,
            VarValue::Int(_) => VarKind::Int,
            VarValue::UInt(_) => VarKind::UInt,
            VarValue::Str(_) => VarKind::Str,
        }
    }

    /// Right-hand side of an assignment: six decimals for floating point,
    /// plain digits for integers, raw text for strings.
    pub fn to_command_value(&self) -> String {
        match self {
            VarValue::Float(v) => format!("{:.6}", v),
            VarValue::Double(v) => format!("{:.6}", v),
            VarValue::Int(v) => v.to_string(),
            VarValue::UInt(v) => v.to_string(),
            VarValue::Str(s) => s.clone(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            VarValue::Float(v) => Some(f64::from(*v)),
            VarValue::Double(v) => Some(*v),
            VarValue::Int(v) => Some(f64::from(*v)),
            VarValue::UInt(v) => Some(f64::from(*v)),
            VarValue::Str(_) => None,
        }
    }
}

impl From<f32> for VarValue {
    fn from(v: f32) -> Self {
        VarValue::Float(v)
    }
}

impl From<f64> for VarValue {
    fn from(v: f64) -> Self {
        VarValue::Double(v)
    }
}

impl From<i32> for VarValue {
    fn from(v: i32) -> Self {
        VarValue::Int(v)
    }
}

impl From<u32> for VarValue {
    fn from(v: u32) -> Self {
        VarValue::UInt(v)
    }
}

impl From<&str> for VarValue {
    fn from(v: &str) -> Self {
        VarValue::Str(v.to_string())
    }
}

impl From<String> for VarValue {
    fn from(v: String) -> Self {
        VarValue::Str(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_like_printf() {
        assert_eq!(VarValue::Double(1.5).to_command_value(), "1.500000");
        assert_eq!(VarValue::Float(-2.0).to_command_value(), "-2.000000");
        assert_eq!(VarValue::Int(-7).to_command_value(), "-7");
        assert_eq!(VarValue::UInt(42).to_command_value(), "42");
        assert_eq!(VarValue::from("\"text\"").to_command_value(), "\"text\"");
    }

    #[test]
    fn parses_per_kind() {
        assert_eq!(VarKind::Double.parse("3.25"), Some(VarValue::Double(3.25)));
        assert_eq!(VarKind::Int.parse("-12"), Some(VarValue::Int(-12)));
        assert_eq!(VarKind::UInt.parse("-12"), None);
        assert_eq!(VarKind::Int.parse("1.5"), None);
        assert_eq!(VarKind::Double.parse("nan"), None);
        assert_eq!(VarKind::Float.parse("inf"), None);
        assert_eq!(VarKind::Str.parse("hello world"), Some(VarValue::Str("hello world".into())));
    }
}
