use std::iter::FusedIterator;

use crate::error::{MergeError, MergeResult};
use crate::window::Window;

/// Bounded-memory approximate sort of one nearly ordered stream.
///
/// Up to `window_size` items are pulled at construction to fill the window.
/// After that every pull takes exactly one item from the input, pushes it
/// into the window and emits the window minimum; once the input runs dry the
/// window is drained in order.
///
/// # Ordering guarantee
///
/// A late item `A` (arriving before `B` but with a larger key) is emitted
/// after `B` only while `A` is still resident in the window when `B` arrives,
/// i.e. fewer than `window_size` items separate their arrivals. Beyond that
/// distance `A` has already been emitted and the two come out inverted. No
/// error or warning is raised for this; pick a window larger than the worst
/// expected out-of-order distance.
///
/// An `Err` from the input is yielded at the pull that meets it (an error met
/// while filling is yielded on the first pull) and the resequencer is
/// exhausted afterwards.
#[derive(Debug)]
pub struct Resequencer<I, T> {
    input: I,
    window: Window<T>,
    pending_error: Option<MergeError>,
    input_done: bool,
    finished: bool,
}

impl<I, T> Resequencer<I, T>
where
    I: Iterator<Item = MergeResult<T>>,
    T: Ord,
{
    pub fn new(mut input: I, window_size: usize) -> MergeResult<Self> {
        if window_size == 0 {
            return Err(MergeError::config("window size must be at least 1"));
        }

        let mut prefill = Vec::with_capacity(window_size);
        let mut pending_error = None;
        let mut input_done = false;
        while prefill.len() < window_size {
            match input.next() {
                Some(Ok(item)) => prefill.push(item),
                Some(Err(e)) => {
                    pending_error = Some(e);
                    input_done = true;
                    break;
                }
                None => {
                    input_done = true;
                    break;
                }
            }
        }

        let mut window = Window::with_capacity(window_size);
        if pending_error.is_none() {
            window.fill(prefill);
        }

        Ok(Self {
            input,
            window,
            pending_error,
            input_done,
            finished: false,
        })
    }

    pub fn window_size(&self) -> usize {
        self.window.capacity()
    }

    /// Number of items currently held back in the window
    pub fn buffered(&self) -> usize {
        self.window.len()
    }

    fn fail(&mut self, error: MergeError) -> Option<MergeResult<T>> {
        self.finished = true;
        self.input_done = true;
        self.window.clear();
        Some(Err(error))
    }
}

impl<I, T> Iterator for Resequencer<I, T>
where
    I: Iterator<Item = MergeResult<T>>,
    T: Ord,
{
    type Item = MergeResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if let Some(error) = self.pending_error.take() {
            return self.fail(error);
        }

        if !self.input_done {
            match self.input.next() {
                Some(Ok(item)) => return Some(Ok(self.window.push_then_pop_min(item))),
                Some(Err(error)) => return self.fail(error),
                None => self.input_done = true,
            }
        }

        match self.window.pop_min() {
            Some(item) => Some(Ok(item)),
            None => {
                self.finished = true;
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.finished {
            return (0, Some(0));
        }
        let (lower, upper) = if self.input_done {
            (0, Some(0))
        } else {
            self.input.size_hint()
        };
        let held = self.window.len() + usize::from(self.pending_error.is_some());
        (
            lower.saturating_add(held),
            upper.and_then(|u| u.checked_add(held)),
        )
    }
}

impl<I, T> FusedIterator for Resequencer<I, T>
where
    I: Iterator<Item = MergeResult<T>>,
    T: Ord,
{
}
