#[rustfmt::skip]
macro_rules! all_the_tuples {
    ($name:ident) => {
        $name!([]);
        $name!([T1]);
        $name!([T1, T2]);
        $name!([T1, T2, T3]);
        $name!([T1, T2, T3, T4]);
        $name!([T1, T2, T3, T4, T5]);
        $name!([T1, T2, T3, T4, T5, T6]);
        $name!([T1, T2, T3, T4, T5, T6, T7]);
        $name!([T1, T2, T3, T4, T5, T6, T7, T8]);
        $name!([T1, T2, T3, T4, T5, T6, T7, T8, T9]);
        $name!([T1, T2, T3, T4, T5, T6, T7, T8, T9, T10]);
        $name!([T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11]);
        $name!([T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12]);
    };
}

/// Collects modules into a `Vec<Arc<dyn Module>>`.
///
/// ```rust
/// use bindery::{modules, Binder, BindErrorKind};
///
/// fn empty(_: &mut Binder) -> Result<(), BindErrorKind> {
///     Ok(())
/// }
///
/// let list = modules![empty, empty];
/// assert_eq!(list.len(), 2);
/// ```
#[macro_export]
macro_rules! modules {
    ($($module:expr),* $(,)?) => {
        ::std::vec![$(::std::sync::Arc::new($module) as ::std::sync::Arc<dyn $crate::Module>),*]
    };
}
