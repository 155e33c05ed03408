//! Operator-implementation macros for transparent newtype wrappers around `i64`.

#[macro_export]
macro_rules! op {
    (binary $ty:ident, $trait:ident, $method:ident) => {
        impl std::ops::$trait for $ty {
            type Output = Self;

            fn $method(self, rhs: Self) -> Self::Output {
                Self::from(std::ops::$trait::$method(self.value(), rhs.value()))
            }
        }
    };
    (inplace $ty:ident, $trait:ident, $method:ident) => {
        impl std::ops::$trait for $ty {
            fn $method(&mut self, rhs: Self) {
                let mut value = self.value();
                std::ops::$trait::$method(&mut value, rhs.value());
                *self = Self::from(value);
            }
        }
    };
    (unary $ty:ident, $trait:ident, $method:ident) => {
        impl std::ops::$trait for $ty {
            type Output = Self;

            fn $method(self) -> Self::Output {
                Self::from(std::ops::$trait::$method(self.value()))
            }
        }
    };
}
