//! Ranks realized as threads of one process, connected by channels.

use super::{CommError, Communicator, Payload, Rank};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::{
  sync::{
    atomic::{AtomicU64, Ordering},
    Mutex,
  },
  thread,
  time::{Duration, Instant},
};
use tracing::trace;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

struct Envelope {
  peer: Rank,
  sequence: u64,
  op: &'static str,
  payload: Payload,
}

/// One rank of an in-process group.
///
/// Collectives are matched by a per-rank sequence number, so messages of a
/// peer that already entered the next collective are held back until then.
pub struct ThreadComm {
  rank: Rank,
  peers: Vec<Sender<Envelope>>,
  inbox: Receiver<Envelope>,
  sequence: AtomicU64,
  early: Mutex<Vec<Envelope>>,
  timeout: Duration,
}

impl ThreadComm {
  /// Creates the `size` connected ranks of a group, indexed by rank.
  pub fn group(size: usize) -> Vec<ThreadComm> {
    assert!(size > 0, "a group needs at least one rank");
    let (senders, receivers): (Vec<_>, Vec<_>) = (0..size).map(|_| unbounded()).unzip();
    receivers
      .into_iter()
      .enumerate()
      .map(|(rank, inbox)| ThreadComm {
        rank,
        peers: senders.clone(),
        inbox,
        sequence: AtomicU64::new(0),
        early: Mutex::new(Vec::new()),
        timeout: DEFAULT_TIMEOUT,
      })
      .collect()
  }

  /// Runs `f` on every rank of a fresh group, each on its own thread.
  ///
  /// Results are returned in rank order.
  pub fn run<R, F>(size: usize, f: F) -> Vec<R>
  where
    R: Send,
    F: Fn(ThreadComm) -> R + Sync,
  {
    let f = &f;
    thread::scope(|scope| {
      let handles: Vec<_> = Self::group(size)
        .into_iter()
        .map(|comm| scope.spawn(move || f(comm)))
        .collect();
      handles
        .into_iter()
        .map(|handle| match handle.join() {
          Ok(result) => result,
          Err(panic) => std::panic::resume_unwind(panic),
        })
        .collect()
    })
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  fn accept(
    &self,
    envelope: Envelope,
    sequence: u64,
    op: &'static str,
    slots: &mut [Option<Payload>],
  ) -> Result<Option<Envelope>, CommError> {
    if envelope.sequence != sequence {
      return Ok(Some(envelope));
    }
    if envelope.op != op {
      return Err(CommError::Mismatch {
        rank: self.rank,
        peer: envelope.peer,
        expected: op,
        found: envelope.op,
      });
    }
    slots[envelope.peer] = Some(envelope.payload);
    Ok(None)
  }
}

impl std::fmt::Debug for ThreadComm {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ThreadComm")
      .field("rank", &self.rank)
      .field("size", &self.peers.len())
      .field("timeout", &self.timeout)
      .finish()
  }
}

impl Communicator for ThreadComm {
  fn rank(&self) -> Rank {
    self.rank
  }
  fn size(&self) -> usize {
    self.peers.len()
  }

  fn all_gather_payload(
    &self,
    op: &'static str,
    payload: Payload,
  ) -> Result<Vec<Payload>, CommError> {
    let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
    trace!(rank = self.rank, op, sequence, "entering collective");

    for (peer, sender) in self.peers.iter().enumerate() {
      if peer == self.rank {
        continue;
      }
      let envelope = Envelope {
        peer: self.rank,
        sequence,
        op,
        payload: payload.clone(),
      };
      sender
        .send(envelope)
        .map_err(|_| CommError::Disconnected { rank: self.rank })?;
    }

    let mut slots: Vec<Option<Payload>> = vec![None; self.size()];
    slots[self.rank] = Some(payload);

    let mut early = self
      .early
      .lock()
      .map_err(|_| CommError::Disconnected { rank: self.rank })?;
    let mut held_back = std::mem::take(&mut *early).into_iter();
    while let Some(envelope) = held_back.next() {
      match self.accept(envelope, sequence, op, &mut slots) {
        Ok(Some(later)) => early.push(later),
        Ok(None) => {}
        Err(err) => {
          early.extend(held_back);
          return Err(err);
        }
      }
    }

    let deadline = Instant::now() + self.timeout;
    while slots.iter().any(Option::is_none) {
      let remaining = deadline.saturating_duration_since(Instant::now());
      match self.inbox.recv_timeout(remaining) {
        Ok(envelope) => {
          if let Some(later) = self.accept(envelope, sequence, op, &mut slots)? {
            early.push(later);
          }
        }
        Err(RecvTimeoutError::Timeout) => {
          let missing = slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_none())
            .map(|(peer, _)| peer)
            .collect();
          return Err(CommError::Timeout {
            rank: self.rank,
            op,
            missing,
          });
        }
        Err(RecvTimeoutError::Disconnected) => {
          return Err(CommError::Disconnected { rank: self.rank })
        }
      }
    }

    Ok(slots.into_iter().flatten().collect())
  }
}
