use super::elements::Elements;
use super::lens::{CasePath, Lens};
use crate::effect::Effect;
use std::any::type_name;
use std::fmt;
use std::rc::Rc;

type Run<S, A, E> = dyn Fn(&mut S, A, &E) -> Effect<A>;

/// A transition function: `(state, action, environment) -> effect`.
///
/// The reducer mutates `state` in place and describes any further work as an
/// [`Effect`]. It must be deterministic and must not block or spawn work on
/// its own.
///
/// Reducers are cheap to clone and compose with [`combine`](Self::combine),
/// [`pullback`](Self::pullback), [`optional`](Self::optional) and
/// [`for_each`](Self::for_each).
///
/// # Examples
///
/// ```
/// use rudder::{Effect, Reducer};
///
/// let counter = Reducer::new(|count: &mut i32, delta: i32, _env: &()| {
///     *count += delta;
///     Effect::none()
/// });
///
/// let mut count = 0;
/// let effect = counter.run(&mut count, 5, &());
/// assert_eq!(count, 5);
/// assert!(effect.is_none());
/// ```
pub struct Reducer<S, A, E = ()> {
    run: Rc<Run<S, A, E>>,
}

impl<S: 'static, A: 'static, E: 'static> Reducer<S, A, E> {
    /// Wrap a transition closure.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn(&mut S, A, &E) -> Effect<A> + 'static,
    {
        Self { run: Rc::new(run) }
    }

    /// A reducer that ignores every action.
    pub fn empty() -> Self {
        Self::new(|_, _, _| Effect::none())
    }

    /// Run the reducer once.
    pub fn run(&self, state: &mut S, action: A, environment: &E) -> Effect<A> {
        (self.run)(state, action, environment)
    }

    /// Run every reducer on the same state and action, in order.
    ///
    /// Later reducers observe the mutations of earlier ones. The returned
    /// effect merges all of their effects.
    pub fn combine<I>(reducers: I) -> Self
    where
        I: IntoIterator<Item = Reducer<S, A, E>>,
        A: Clone,
    {
        let reducers: Vec<Reducer<S, A, E>> = reducers.into_iter().collect();
        Self::new(move |state, action, environment| {
            let Some((last, rest)) = reducers.split_last() else {
                return Effect::none();
            };
            let mut effects = Vec::with_capacity(reducers.len());
            for reducer in rest {
                effects.push(reducer.run(state, action.clone(), environment));
            }
            effects.push(last.run(state, action, environment));
            Effect::merge(effects)
        })
    }

    /// Combine this reducer with `other`, running this one first.
    pub fn combined_with(self, other: Reducer<S, A, E>) -> Self
    where
        A: Clone,
    {
        Self::combine([self, other])
    }

    /// Lift this reducer to a larger state, action and environment.
    ///
    /// Actions the case path does not match are ignored. Actions emitted by
    /// the local effect are embedded back into the global action type.
    pub fn pullback<GS, GA, GE, P>(
        self,
        state: Lens<GS, S>,
        action: CasePath<GA, A>,
        to_local_environment: P,
    ) -> Reducer<GS, GA, GE>
    where
        GS: 'static,
        GA: 'static,
        GE: 'static,
        P: Fn(&GE) -> E + 'static,
    {
        Reducer::new(move |global: &mut GS, global_action: GA, environment: &GE| {
            let Some(local_action) = action.extract(&global_action) else {
                return Effect::none();
            };
            let local_environment = to_local_environment(environment);
            let embed = action.clone();
            self.run(state.get_mut(global), local_action, &local_environment)
                .map(move |local| embed.embed(local))
        })
    }

    /// Lift this reducer to optional state.
    ///
    /// While the state is `None` every action is dropped, including actions
    /// this reducer would otherwise handle.
    pub fn optional(self) -> Reducer<Option<S>, A, E> {
        Reducer::new(move |state: &mut Option<S>, action: A, environment: &E| {
            match state {
                Some(state) => self.run(state, action, environment),
                None => {
                    tracing::warn!(
                        action = type_name::<A>(),
                        "action received while optional state is absent; ignoring"
                    );
                    Effect::none()
                }
            }
        })
    }

    /// Lift this reducer to a keyed collection of states.
    ///
    /// Each global action carries the key of the element it targets. Actions
    /// for keys that are not in the collection are ignored with a warning,
    /// every time.
    pub fn for_each<GS, GA, GE, K, C, P>(
        self,
        elements: Lens<GS, C>,
        action: CasePath<GA, (K, A)>,
        to_local_environment: P,
    ) -> Reducer<GS, GA, GE>
    where
        GS: 'static,
        GA: 'static,
        GE: 'static,
        K: Clone + fmt::Debug + 'static,
        C: Elements<K, S> + 'static,
        P: Fn(&GE) -> E + 'static,
    {
        Reducer::new(move |global: &mut GS, global_action: GA, environment: &GE| {
            let Some((key, local_action)) = action.extract(&global_action) else {
                return Effect::none();
            };
            let Some(element) = elements.get_mut(global).element_mut(&key) else {
                tracing::warn!(
                    key = ?key,
                    action = type_name::<A>(),
                    "action received for an element that is not in the collection; ignoring"
                );
                return Effect::none();
            };
            let local_environment = to_local_environment(environment);
            let embed = action.clone();
            self.run(element, local_action, &local_environment)
                .map(move |local| embed.embed((key.clone(), local)))
        })
    }
}

impl<S, A, E> Clone for Reducer<S, A, E> {
    fn clone(&self) -> Self {
        Self {
            run: Rc::clone(&self.run),
        }
    }
}

impl<S, A, E> fmt::Debug for Reducer<S, A, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reducer").finish_non_exhaustive()
    }
}
