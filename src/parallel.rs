//! Collective communication between the ranks of a distributed run.
//!
//! Every rank holds the full mesh. Ownership of cells and true dofs is split
//! into contiguous blocks, and distributed results are combined through
//! collectives that every rank must call in the same order.

pub mod thread;

pub use thread::ThreadComm;

use std::{any::Any, fmt, ops::Range, sync::Arc};

use thiserror::Error;

pub type Rank = usize;

/// Type erased message exchanged in a collective.
pub type Payload = Arc<dyn Any + Send + Sync>;

#[derive(Debug, Error)]
pub enum CommError {
  #[error("rank {rank} expected collective '{expected}' but rank {peer} entered '{found}'")]
  Mismatch {
    rank: Rank,
    peer: Rank,
    expected: &'static str,
    found: &'static str,
  },
  #[error("rank {rank} timed out in collective '{op}' waiting for ranks {missing:?}")]
  Timeout {
    rank: Rank,
    op: &'static str,
    missing: Vec<Rank>,
  },
  #[error("rank {rank} lost the connection to its peers")]
  Disconnected { rank: Rank },
  #[error("collective '{op}' received a payload of unexpected type")]
  PayloadType { op: &'static str },
}

/// A group of ranks taking part in collective operations.
///
/// All collectives are blocking and must be entered by every rank in the
/// same order with the same `op` tag.
pub trait Communicator: fmt::Debug + Send + Sync {
  fn rank(&self) -> Rank;
  fn size(&self) -> usize;

  /// Contributes `payload` and returns the payloads of all ranks in rank order.
  fn all_gather_payload(&self, op: &'static str, payload: Payload)
    -> Result<Vec<Payload>, CommError>;

  fn is_root(&self) -> bool {
    self.rank() == 0
  }
}

/// Typed collectives on top of [`Communicator::all_gather_payload`].
pub trait CommunicatorExt: Communicator {
  fn all_gather<T: Any + Send + Sync + Clone>(
    &self,
    op: &'static str,
    value: T,
  ) -> Result<Vec<T>, CommError> {
    self
      .all_gather_payload(op, Arc::new(value))?
      .into_iter()
      .map(|payload| {
        let typed = payload
          .downcast::<T>()
          .map_err(|_| CommError::PayloadType { op })?;
        Ok(Arc::try_unwrap(typed).unwrap_or_else(|shared| (*shared).clone()))
      })
      .collect()
  }

  fn barrier(&self) -> Result<(), CommError> {
    self.all_gather("barrier", ()).map(|_| ())
  }

  fn all_reduce_sum(&self, op: &'static str, value: f64) -> Result<f64, CommError> {
    Ok(self.all_gather(op, value)?.into_iter().sum())
  }

  fn all_reduce_max(&self, op: &'static str, value: usize) -> Result<usize, CommError> {
    Ok(self.all_gather(op, value)?.into_iter().max().unwrap_or(value))
  }
}
impl<C: Communicator + ?Sized> CommunicatorExt for C {}

/// The trivial group of a single rank.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialComm;
impl Communicator for SerialComm {
  fn rank(&self) -> Rank {
    0
  }
  fn size(&self) -> usize {
    1
  }
  fn all_gather_payload(
    &self,
    _op: &'static str,
    payload: Payload,
  ) -> Result<Vec<Payload>, CommError> {
    Ok(vec![payload])
  }
}

/// Contiguous block distribution of `len` items over `nranks` ranks.
///
/// Rank $r$ owns the items in `offsets[r]..offsets[r+1]`, with
/// `offsets[r] = r * len / nranks`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockPartition {
  offsets: Vec<usize>,
}
impl BlockPartition {
  pub fn new(len: usize, nranks: usize) -> Self {
    assert!(nranks > 0, "partition needs at least one rank");
    let offsets = (0..=nranks).map(|r| r * len / nranks).collect();
    Self { offsets }
  }

  pub fn nranks(&self) -> usize {
    self.offsets.len() - 1
  }
  pub fn len(&self) -> usize {
    self.offsets[self.nranks()]
  }
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
  pub fn range(&self, rank: Rank) -> Range<usize> {
    self.offsets[rank]..self.offsets[rank + 1]
  }
  pub fn local_len(&self, rank: Rank) -> usize {
    self.range(rank).len()
  }
  pub fn owner(&self, item: usize) -> Rank {
    assert!(item < self.len(), "item {item} outside of partition");
    // first offset strictly greater than item, minus one
    self.offsets.partition_point(|&offset| offset <= item) - 1
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn block_partition_covers_everything() {
    let partition = BlockPartition::new(10, 3);
    assert_eq!(partition.range(0), 0..3);
    assert_eq!(partition.range(1), 3..6);
    assert_eq!(partition.range(2), 6..10);
    assert_eq!(partition.len(), 10);
    for item in 0..10 {
      let owner = partition.owner(item);
      assert!(partition.range(owner).contains(&item));
    }
  }

  #[test]
  fn more_ranks_than_items() {
    let partition = BlockPartition::new(2, 4);
    let lens: Vec<_> = (0..4).map(|r| partition.local_len(r)).collect();
    assert_eq!(lens.iter().sum::<usize>(), 2);
    assert_eq!(lens, vec![0, 1, 0, 1]);
    assert_eq!(partition.owner(0), 1);
    assert_eq!(partition.owner(1), 3);
  }

  #[test]
  fn serial_collectives() {
    let comm = SerialComm;
    assert_eq!(comm.all_gather("values", vec![1, 2]).unwrap(), vec![vec![1, 2]]);
    assert_eq!(comm.all_reduce_sum("sum", 2.5).unwrap(), 2.5);
    comm.barrier().unwrap();
    assert!(comm.is_root());
  }
}
