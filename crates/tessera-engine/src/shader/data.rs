use bytemuck::Pod;
use tessera_shader::UniformType;

use crate::render::UniformValue;

/// Rust values that can be stored in a uniform of type [`UniformData::TYPE`].
///
/// `Repr` is the exact byte image written into a material buffer. `bool` is
/// stored as a 32-bit integer; matrices are column-major `f32` arrays.
pub trait UniformData: Copy + Send + 'static {
    const TYPE: UniformType;
    type Repr: Pod;

    fn to_repr(self) -> Self::Repr;

    fn to_value(self) -> UniformValue;
}

macro_rules! uniform_data {
    ($($ty:ty => $uniform:ident, $value:ident;)*) => {
        $(
            impl UniformData for $ty {
                const TYPE: UniformType = UniformType::$uniform;
                type Repr = $ty;

                #[inline]
                fn to_repr(self) -> $ty {
                    self
                }

                #[inline]
                fn to_value(self) -> UniformValue {
                    UniformValue::$value(self)
                }
            }

            impl From<$ty> for UniformValue {
                fn from(value: $ty) -> Self {
                    value.to_value()
                }
            }
        )*
    };
}

uniform_data! {
    i32 => Int32, Int;
    f32 => Float32, Float;
    [f32; 2] => Vec2, Vec2;
    [f32; 3] => Vec3, Vec3;
    [f32; 4] => Vec4, Vec4;
}

impl UniformData for bool {
    const TYPE: UniformType = UniformType::Bool;
    type Repr = u32;

    #[inline]
    fn to_repr(self) -> u32 {
        u32::from(self)
    }

    #[inline]
    fn to_value(self) -> UniformValue {
        UniformValue::Bool(self)
    }
}

impl From<bool> for UniformValue {
    fn from(value: bool) -> Self {
        value.to_value()
    }
}

// Matrices are given as columns and flattened.
macro_rules! uniform_matrix {
    ($($n:literal => $uniform:ident, $len:literal;)*) => {
        $(
            impl UniformData for [[f32; $n]; $n] {
                const TYPE: UniformType = UniformType::$uniform;
                type Repr = [f32; $len];

                #[inline]
                fn to_repr(self) -> [f32; $len] {
                    bytemuck::cast(self)
                }

                #[inline]
                fn to_value(self) -> UniformValue {
                    UniformValue::$uniform(self.to_repr())
                }
            }

            impl From<[[f32; $n]; $n]> for UniformValue {
                fn from(value: [[f32; $n]; $n]) -> Self {
                    value.to_value()
                }
            }
        )*
    };
}

uniform_matrix! {
    2 => Mat2, 4;
    3 => Mat3, 9;
    4 => Mat4, 16;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrices_flatten_column_major() {
        let m = [[1.0, 2.0], [3.0, 4.0]];
        assert_eq!(m.to_repr(), [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(UniformValue::from(m), UniformValue::Mat2([1.0, 2.0, 3.0, 4.0]));
    }

    #[test]
    fn repr_sizes_match_uniform_sizes() {
        fn check<T: UniformData>() {
            assert_eq!(Some(std::mem::size_of::<T::Repr>() as u32), T::TYPE.element_size());
        }
        check::<bool>();
        check::<i32>();
        check::<f32>();
        check::<[f32; 2]>();
        check::<[f32; 3]>();
        check::<[f32; 4]>();
        check::<[[f32; 2]; 2]>();
        check::<[[f32; 3]; 3]>();
        check::<[[f32; 4]; 4]>();
    }
}
