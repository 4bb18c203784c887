use std::fmt;
use std::rc::Rc;

/// A getter/setter pair focusing on a part `V` of a whole `R`.
///
/// Lenses stand in for writable key paths when pulling a reducer back to a
/// larger state.
///
/// ```
/// use rudder::Lens;
///
/// struct App { count: i32 }
///
/// let count = Lens::new(|app: &App| &app.count, |app: &mut App| &mut app.count);
/// let mut app = App { count: 1 };
/// *count.get_mut(&mut app) += 1;
/// assert_eq!(*count.get(&app), 2);
/// ```
pub struct Lens<R, V> {
    get: Rc<dyn Fn(&R) -> &V>,
    get_mut: Rc<dyn Fn(&mut R) -> &mut V>,
}

impl<R: 'static, V: 'static> Lens<R, V> {
    /// Create a lens from a getter and a mutable getter.
    pub fn new<G, M>(get: G, get_mut: M) -> Self
    where
        G: Fn(&R) -> &V + 'static,
        M: Fn(&mut R) -> &mut V + 'static,
    {
        Self {
            get: Rc::new(get),
            get_mut: Rc::new(get_mut),
        }
    }

    /// Borrow the focused part.
    pub fn get<'a>(&self, root: &'a R) -> &'a V {
        (self.get)(root)
    }

    /// Mutably borrow the focused part.
    pub fn get_mut<'a>(&self, root: &'a mut R) -> &'a mut V {
        (self.get_mut)(root)
    }

    /// Focus further into the part.
    pub fn then<W: 'static>(&self, next: Lens<V, W>) -> Lens<R, W> {
        let (outer, inner) = (self.get.clone(), next.get);
        let (outer_mut, inner_mut) = (self.get_mut.clone(), next.get_mut);
        Lens::new(
            move |root: &R| inner(outer(root)),
            move |root: &mut R| inner_mut(outer_mut(root)),
        )
    }
}

impl<R: 'static> Lens<R, R> {
    /// The lens focusing on the whole value.
    pub fn identity() -> Self {
        Lens::new(|root: &R| root, |root: &mut R| root)
    }
}

impl<R, V> Clone for Lens<R, V> {
    fn clone(&self) -> Self {
        Self {
            get: Rc::clone(&self.get),
            get_mut: Rc::clone(&self.get_mut),
        }
    }
}

impl<R, V> fmt::Debug for Lens<R, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lens").finish_non_exhaustive()
    }
}

/// An extractor/embedder pair for one case `V` of an action enum `R`.
///
/// Build one by hand, or with [`case!`](crate::case) for single-field tuple
/// variants.
pub struct CasePath<R, V> {
    extract: Rc<dyn Fn(&R) -> Option<V>>,
    embed: Rc<dyn Fn(V) -> R>,
}

impl<R: 'static, V: 'static> CasePath<R, V> {
    /// Create a case path from an extractor and an embedder.
    pub fn new<X, M>(extract: X, embed: M) -> Self
    where
        X: Fn(&R) -> Option<V> + 'static,
        M: Fn(V) -> R + 'static,
    {
        Self {
            extract: Rc::new(extract),
            embed: Rc::new(embed),
        }
    }

    /// Extract the case payload, if `root` is this case.
    pub fn extract(&self, root: &R) -> Option<V> {
        (self.extract)(root)
    }

    /// Wrap a payload into the enclosing type.
    pub fn embed(&self, value: V) -> R {
        (self.embed)(value)
    }
}

impl<R: Clone + 'static> CasePath<R, R> {
    /// The case path matching every value.
    pub fn identity() -> Self {
        CasePath::new(|root: &R| Some(root.clone()), |root| root)
    }
}

impl<R, V> Clone for CasePath<R, V> {
    fn clone(&self) -> Self {
        Self {
            extract: Rc::clone(&self.extract),
            embed: Rc::clone(&self.embed),
        }
    }
}

impl<R, V> fmt::Debug for CasePath<R, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CasePath").finish_non_exhaustive()
    }
}

/// Build a [`CasePath`] for a single-field tuple variant.
///
/// The payload must be `Clone`.
///
/// ```
/// use rudder::case;
///
/// #[derive(Clone, Debug, PartialEq)]
/// enum Action { Counter(i32), Reset }
///
/// let counter = case!(Action::Counter);
/// assert_eq!(counter.extract(&Action::Counter(3)), Some(3));
/// assert_eq!(counter.extract(&Action::Reset), None);
/// assert_eq!(counter.embed(4), Action::Counter(4));
/// ```
#[macro_export]
macro_rules! case {
    ($variant:path) => {
        $crate::CasePath::new(
            |root| match root {
                $variant(value) => ::std::option::Option::Some(::std::clone::Clone::clone(value)),
                #[allow(unreachable_patterns)]
                _ => ::std::option::Option::None,
            },
            $variant,
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Inner {
        value: u8,
    }

    #[derive(Debug, Default, PartialEq)]
    struct Outer {
        inner: Inner,
    }

    #[test]
    fn lenses_compose() {
        let inner = Lens::new(|o: &Outer| &o.inner, |o: &mut Outer| &mut o.inner);
        let value = Lens::new(|i: &Inner| &i.value, |i: &mut Inner| &mut i.value);
        let deep = inner.then(value);

        let mut outer = Outer::default();
        *deep.get_mut(&mut outer) = 9;
        assert_eq!(outer.inner.value, 9);
        assert_eq!(*deep.get(&outer), 9);
    }

    #[test]
    fn identity_paths() {
        let mut n = 3;
        *Lens::identity().get_mut(&mut n) += 1;
        assert_eq!(n, 4);

        let case = CasePath::<u8, u8>::identity();
        assert_eq!(case.extract(&5), Some(5));
        assert_eq!(case.embed(6), 6);
    }
}
