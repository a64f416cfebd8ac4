/// Function whose arguments are resolved by the injector before it is called.
///
/// Implemented for every `Fn(T1, .., Tn) -> R` with up to 12 arguments,
/// where each argument implements [`crate::DependencyResolver`].
pub trait Constructor<Args>: Send + Sync + 'static {
    type Output;

    fn construct(&self, args: Args) -> Self::Output;
}

macro_rules! impl_constructor {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case)]
        impl<F, R, $($ty,)*> Constructor<($($ty,)*)> for F
        where
            F: Fn($($ty,)*) -> R + Send + Sync + 'static,
        {
            type Output = R;

            #[inline]
            fn construct(&self, ($($ty,)*): ($($ty,)*)) -> Self::Output {
                self($($ty,)*)
            }
        }
    };
}

all_the_tuples!(impl_constructor);

#[cfg(test)]
mod tests {
    use super::Constructor;

    use std::sync::Arc;

    struct Db(u8);
    struct Repo(Arc<Db>);

    fn new_repo(db: Arc<Db>) -> Repo {
        Repo(db)
    }

    #[test]
    fn test_construct() {
        fn call<C: Constructor<Args>, Args>(constructor: &C, args: Args) -> C::Output {
            constructor.construct(args)
        }

        let repo = call(&new_repo, (Arc::new(Db(3)),));
        assert_eq!(repo.0 .0, 3);

        let sum = call(&|a: u8, b: u8| a + b, (1, 2));
        assert_eq!(sum, 3);

        call(&|| (), ());
    }
}
