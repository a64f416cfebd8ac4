use parking_lot::{Condvar, Mutex};

use crate::{any::Instance, errors::ResolveErrorKind};

enum State {
    Empty,
    Creating,
    Ready(Option<Instance>),
}

/// Execute-once-and-broadcast slot of a singleton binding.
///
/// The first caller runs the initializer, every concurrent caller waits on the condvar until it finishes.
/// A failed (or panicked) initializer leaves the cell empty and wakes the waiters, so one of them retries.
pub(crate) struct SingletonCell {
    state: Mutex<State>,
    ready: Condvar,
}

impl SingletonCell {
    #[inline]
    #[must_use]
    pub(crate) const fn new() -> Self {
        Self {
            state: Mutex::new(State::Empty),
            ready: Condvar::new(),
        }
    }

    /// `None` while nothing was created yet, `Some(None)` if the provider produced nothing
    #[must_use]
    pub(crate) fn get(&self) -> Option<Option<Instance>> {
        match &*self.state.lock() {
            State::Ready(instance) => Some(instance.clone()),
            State::Empty | State::Creating => None,
        }
    }

    /// Returns the instance and whether this call created it.
    pub(crate) fn get_or_try_init<F>(&self, init: F) -> Result<(Option<Instance>, bool), ResolveErrorKind>
    where
        F: FnOnce() -> Result<Option<Instance>, ResolveErrorKind>,
    {
        let mut state = self.state.lock();
        loop {
            match &*state {
                State::Ready(instance) => return Ok((instance.clone(), false)),
                State::Creating => self.ready.wait(&mut state),
                State::Empty => break,
            }
        }
        *state = State::Creating;
        drop(state);

        let mut reset = ResetOnUnwind { cell: self, armed: true };
        let instance = init()?;

        *self.state.lock() = State::Ready(instance.clone());
        reset.armed = false;
        self.ready.notify_all();

        Ok((instance, true))
    }
}

struct ResetOnUnwind<'a> {
    cell: &'a SingletonCell,
    armed: bool,
}

impl Drop for ResetOnUnwind<'_> {
    fn drop(&mut self) {
        if self.armed {
            *self.cell.state.lock() = State::Empty;
            self.cell.ready.notify_all();
        }
    }
}
