pub trait OptionExt<T> {
    fn when<F>(cond: bool, fa: F) -> Option<T>
    where
        F: FnOnce() -> T;

    /// Runs `on_empty` for its side effect (usually a diagnostic) when the option is `None`.
    fn inspect_none<F>(self, on_empty: F) -> Option<T>
    where
        F: FnOnce();
}

impl<T> OptionExt<T> for Option<T> {
    fn when<F>(cond: bool, fa: F) -> Option<T>
    where
        F: FnOnce() -> T,
    {
        if cond {
            Some(fa())
        } else {
            None
        }
    }

    fn inspect_none<F>(self, on_empty: F) -> Option<T>
    where
        F: FnOnce(),
    {
        if self.is_none() {
            on_empty();
        }
        self
    }
}
