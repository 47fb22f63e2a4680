/// Forwards operator traits on a single-field newtype to the wrapped value.
///
/// ```ignore
/// op!(Points => Add::add, Sub::sub);
/// op!(Points assign AddAssign::add_assign, SubAssign::sub_assign);
/// op!(Points neg);
/// ```
#[macro_export]
macro_rules! op {
    ($ty:ident => $($tr:ident :: $f:ident),+ $(,)?) => {
        $(
            impl ::std::ops::$tr for $ty {
                type Output = $ty;

                fn $f(self, rhs: $ty) -> $ty {
                    $ty(::std::ops::$tr::$f(self.0, rhs.0))
                }
            }
        )+
    };

    ($ty:ident assign $($tr:ident :: $f:ident),+ $(,)?) => {
        $(
            impl ::std::ops::$tr for $ty {
                fn $f(&mut self, rhs: $ty) {
                    ::std::ops::$tr::$f(&mut self.0, rhs.0);
                }
            }
        )+
    };

    ($ty:ident neg) => {
        impl ::std::ops::Neg for $ty {
            type Output = $ty;

            fn neg(self) -> $ty {
                $ty(-self.0)
            }
        }
    };
}
