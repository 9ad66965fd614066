use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::iter::FusedIterator;

use crate::error::{MergeError, MergeResult};

/// Pending item of one input stream, ordered by item then by stream index
/// so that equal items from earlier streams win.
#[derive(Debug)]
struct Head<T> {
    item: T,
    stream: usize,
}

impl<T: Ord> PartialEq for Head<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T: Ord> Eq for Head<T> {}

impl<T: Ord> PartialOrd for Head<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Ord> Ord for Head<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.item
            .cmp(&other.item)
            .then_with(|| self.stream.cmp(&other.stream))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Unprimed,
    Running,
    Finished,
}

/// K-way merge of streams that are each already ordered.
///
/// Keeps one pending item per live stream and always emits the smallest.
/// When items from different streams compare equal, the stream passed
/// earlier to [`Merger::new`] goes first, so the output is reproducible for
/// the same inputs in the same order; this holds for any number of tied
/// streams.
///
/// Inputs are trusted to be ordered. A disordered input produces disordered
/// output without complaint.
#[derive(Debug)]
pub struct Merger<I, T> {
    streams: Vec<I>,
    frontier: BinaryHeap<Reverse<Head<T>>>,
    pending_error: Option<MergeError>,
    state: State,
}

impl<I, T> Merger<I, T>
where
    I: Iterator<Item = MergeResult<T>>,
    T: Ord,
{
    pub fn new(streams: Vec<I>) -> MergeResult<Self> {
        if streams.is_empty() {
            return Err(MergeError::config("merge needs at least one input stream"));
        }
        let frontier = BinaryHeap::with_capacity(streams.len());
        Ok(Self {
            streams,
            frontier,
            pending_error: None,
            state: State::Unprimed,
        })
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// Pull the next item of `stream` into the frontier. `Err` means that
    /// stream failed and the merge must stop.
    fn advance(&mut self, stream: usize) -> MergeResult<()> {
        match self.streams[stream].next() {
            Some(Ok(item)) => {
                self.frontier.push(Reverse(Head { item, stream }));
                Ok(())
            }
            Some(Err(e)) => Err(e),
            None => Ok(()),
        }
    }

    fn prime(&mut self) -> MergeResult<()> {
        for stream in 0..self.streams.len() {
            self.advance(stream)?;
        }
        Ok(())
    }

    fn fail(&mut self, error: MergeError) -> Option<MergeResult<T>> {
        self.state = State::Finished;
        self.frontier.clear();
        Some(Err(error))
    }
}

impl<I, T> Iterator for Merger<I, T>
where
    I: Iterator<Item = MergeResult<T>>,
    T: Ord,
{
    type Item = MergeResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.state {
            State::Finished => return None,
            State::Unprimed => {
                self.state = State::Running;
                if let Err(e) = self.prime() {
                    return self.fail(e);
                }
            }
            State::Running => {}
        }
        if let Some(e) = self.pending_error.take() {
            return self.fail(e);
        }

        let Some(Reverse(Head { item, stream })) = self.frontier.pop() else {
            self.state = State::Finished;
            return None;
        };

        // the item in hand is still good; the failure surfaces on the next pull
        if let Err(e) = self.advance(stream) {
            self.pending_error = Some(e);
        }
        Some(Ok(item))
    }
}

impl<I, T> FusedIterator for Merger<I, T>
where
    I: Iterator<Item = MergeResult<T>>,
    T: Ord,
{
}
