//! Attribute values exchanged with a [`SceneGraph`](super::SceneGraph).

use glam::{DMat4, Quat, Vec3};

use super::path::Token;

/// A resolved attribute value.
///
/// Only the value types the skeleton core consumes are represented; array
/// variants own their data.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    Float(f32),
    Token(Token),
    Matrix4d(DMat4),
    IntArray(Vec<i32>),
    FloatArray(Vec<f32>),
    TokenArray(Vec<Token>),
    Vec3fArray(Vec<Vec3>),
    QuatfArray(Vec<Quat>),
    Matrix4dArray(Vec<DMat4>),
}

impl Value {
    /// Name of the held type, for diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Token(_) => "token",
            Value::Matrix4d(_) => "matrix4d",
            Value::IntArray(_) => "int[]",
            Value::FloatArray(_) => "float[]",
            Value::TokenArray(_) => "token[]",
            Value::Vec3fArray(_) => "float3[]",
            Value::QuatfArray(_) => "quatf[]",
            Value::Matrix4dArray(_) => "matrix4d[]",
        }
    }

    /// Number of elements for array values, 1 for scalars.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Value::IntArray(v) => v.len(),
            Value::FloatArray(v) => v.len(),
            Value::TokenArray(v) => v.len(),
            Value::Vec3fArray(v) => v.len(),
            Value::QuatfArray(v) => v.len(),
            Value::Matrix4dArray(v) => v.len(),
            _ => 1,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn as_token(&self) -> Option<Token> {
        match self {
            Value::Token(t) => Some(*t),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_matrix(&self) -> Option<DMat4> {
        match self {
            Value::Matrix4d(m) => Some(*m),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int_array(&self) -> Option<&[i32]> {
        match self {
            Value::IntArray(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float_array(&self) -> Option<&[f32]> {
        match self {
            Value::FloatArray(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_token_array(&self) -> Option<&[Token]> {
        match self {
            Value::TokenArray(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_vec3_array(&self) -> Option<&[Vec3]> {
        match self {
            Value::Vec3fArray(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_quat_array(&self) -> Option<&[Quat]> {
        match self {
            Value::QuatfArray(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_matrix_array(&self) -> Option<&[DMat4]> {
        match self {
            Value::Matrix4dArray(v) => Some(v),
            _ => None,
        }
    }

    // ========================================================================
    // Owned extraction
    // ========================================================================

    #[must_use]
    pub fn into_int_array(self) -> Option<Vec<i32>> {
        match self {
            Value::IntArray(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_float_array(self) -> Option<Vec<f32>> {
        match self {
            Value::FloatArray(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_token_array(self) -> Option<Vec<Token>> {
        match self {
            Value::TokenArray(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_vec3_array(self) -> Option<Vec<Vec3>> {
        match self {
            Value::Vec3fArray(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_quat_array(self) -> Option<Vec<Quat>> {
        match self {
            Value::QuatfArray(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_matrix_array(self) -> Option<Vec<DMat4>> {
        match self {
            Value::Matrix4dArray(v) => Some(v),
            _ => None,
        }
    }
}

macro_rules! impl_from_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from_value! {
    i32 => Int,
    f32 => Float,
    Token => Token,
    DMat4 => Matrix4d,
    Vec<i32> => IntArray,
    Vec<f32> => FloatArray,
    Vec<Token> => TokenArray,
    Vec<Vec3> => Vec3fArray,
    Vec<Quat> => QuatfArray,
    Vec<DMat4> => Matrix4dArray,
}
