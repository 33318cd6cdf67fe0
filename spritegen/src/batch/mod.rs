use crate::SpriteError;

// Groups a stream into consecutive runs of `capacity` items.
//
// Single forward pass over the source; the final group may be short but is
// never dropped. Only one group is buffered at a time.
pub struct Batches<I: Iterator> {
    source: I,
    capacity: usize,
}

impl<I: Iterator> Batches<I> {
    pub fn new(source: I, capacity: usize) -> Result<Self, SpriteError> {
        if capacity == 0 {
            return Err(SpriteError::config("batch capacity must be positive"));
        }
        Ok(Self { source, capacity })
    }
}

impl<I: Iterator> Iterator for Batches<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut group = Vec::with_capacity(self.capacity);
        for item in self.source.by_ref() {
            group.push(item);
            if group.len() == self.capacity {
                break;
            }
        }
        if group.is_empty() {
            None
        } else {
            Some(group)
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (lo, hi) = self.source.size_hint();
        let per = self.capacity;
        let groups = |n: usize| n / per + usize::from(n % per != 0);
        (groups(lo), hi.map(groups))
    }
}

pub trait BatchExt: Iterator + Sized {
    fn batches(self, capacity: usize) -> Result<Batches<Self>, SpriteError> {
        Batches::new(self, capacity)
    }
}

impl<I: Iterator> BatchExt for I {}
