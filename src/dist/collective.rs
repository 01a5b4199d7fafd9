//! Broadcast and variable-size gather between a fixed group of ranks.
//!
//! Rank 0 is the coordinator. Every rank must call each collective exactly
//! once and in the same order; a rank that cannot produce its share sends an
//! abort notice so the coordinator fails the whole run instead of stitching
//! together a partial result.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use super::collector::GatherLayout;
use crate::error::{try_zeroed, CollectiveError, StftError};

pub const COORDINATOR: usize = 0;

pub trait Communicator<T>: Send {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    fn is_coordinator(&self) -> bool {
        self.rank() == COORDINATOR
    }

    /// The coordinator passes `Some(data)`, everyone else `None`; all ranks
    /// return the coordinator's buffer.
    fn broadcast(&self, data: Option<Arc<[T]>>) -> Result<Arc<[T]>, CollectiveError>;

    /// Concatenate every rank's contribution at its displacement in `layout`.
    /// Only the coordinator receives `Some`.
    fn gather(
        &self,
        contribution: Result<Vec<T>, StftError>,
        layout: &GatherLayout,
    ) -> Result<Option<Vec<T>>, CollectiveError>;
}

enum Contribution<T> {
    Block { rank: usize, data: Vec<T> },
    Abort { rank: usize, reason: String },
}

enum Link<T> {
    Coordinator {
        workers: Vec<Sender<Arc<[T]>>>,
        inbox: Receiver<Contribution<T>>,
    },
    Worker {
        inbox: Receiver<Arc<[T]>>,
        outbox: Sender<Contribution<T>>,
    },
}

/// In-process communicator: one endpoint per thread, wired to the
/// coordinator through `mpsc` channels.
pub struct ThreadCommunicator<T> {
    rank: usize,
    size: usize,
    link: Link<T>,
}

impl<T: Copy + Default + Send + Sync + 'static> ThreadCommunicator<T> {
    /// Build a connected group of `size` endpoints, indexed by rank.
    pub fn group(size: usize) -> Vec<Self> {
        let size = size.max(1);
        let (outbox, coordinator_inbox) = mpsc::channel();

        let mut senders = Vec::with_capacity(size - 1);
        let mut endpoints = Vec::with_capacity(size);
        let mut worker_links = Vec::with_capacity(size - 1);
        for _ in 1..size {
            let (tx, rx) = mpsc::channel();
            senders.push(tx);
            worker_links.push(Link::Worker {
                inbox: rx,
                outbox: outbox.clone(),
            });
        }
        // coordinator keeps no sender of its own inbox, so a dead worker
        // shows up as a disconnect instead of a hang
        drop(outbox);

        endpoints.push(Self {
            rank: COORDINATOR,
            size,
            link: Link::Coordinator {
                workers: senders,
                inbox: coordinator_inbox,
            },
        });
        for (i, link) in worker_links.into_iter().enumerate() {
            endpoints.push(Self {
                rank: i + 1,
                size,
                link,
            });
        }
        endpoints
    }

    fn place(
        recv: &mut [T],
        layout: &GatherLayout,
        seen: &mut [bool],
        rank: usize,
        data: &[T],
    ) -> Result<(), CollectiveError> {
        if rank >= layout.counts.len() {
            return Err(CollectiveError::UnexpectedRank {
                rank,
                size: layout.counts.len(),
            });
        }
        if seen[rank] {
            return Err(CollectiveError::DuplicateRank(rank));
        }
        let expected = layout.counts[rank];
        if data.len() != expected {
            return Err(CollectiveError::SizeMismatch {
                rank,
                expected,
                actual: data.len(),
            });
        }
        let start = layout.displs[rank];
        recv[start..start + expected].copy_from_slice(data);
        seen[rank] = true;
        Ok(())
    }
}

impl<T: Copy + Default + Send + Sync + 'static> Communicator<T> for ThreadCommunicator<T> {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn broadcast(&self, data: Option<Arc<[T]>>) -> Result<Arc<[T]>, CollectiveError> {
        match &self.link {
            Link::Coordinator { workers, .. } => {
                let data = data.ok_or(CollectiveError::MissingRootData)?;
                for tx in workers {
                    tx.send(Arc::clone(&data)).map_err(|_| CollectiveError::Disconnected {
                        rank: self.rank,
                        during: "broadcast",
                    })?;
                }
                Ok(data)
            }
            Link::Worker { inbox, .. } => inbox.recv().map_err(|_| CollectiveError::Disconnected {
                rank: self.rank,
                during: "broadcast",
            }),
        }
    }

    fn gather(
        &self,
        contribution: Result<Vec<T>, StftError>,
        layout: &GatherLayout,
    ) -> Result<Option<Vec<T>>, CollectiveError> {
        match &self.link {
            Link::Worker { outbox, .. } => {
                let expected = layout.counts.get(self.rank).copied().unwrap_or(0);
                let message = match contribution {
                    Ok(data) if data.len() == expected => Contribution::Block {
                        rank: self.rank,
                        data,
                    },
                    Ok(data) => Contribution::Abort {
                        rank: self.rank,
                        reason: format!(
                            "local block has {} elements, expected {}",
                            data.len(),
                            expected
                        ),
                    },
                    Err(e) => Contribution::Abort {
                        rank: self.rank,
                        reason: e.to_string(),
                    },
                };
                let aborted = match &message {
                    Contribution::Abort { reason, .. } => Some(reason.clone()),
                    Contribution::Block { .. } => None,
                };
                outbox.send(message).map_err(|_| CollectiveError::Disconnected {
                    rank: self.rank,
                    during: "gather",
                })?;
                match aborted {
                    Some(reason) => Err(CollectiveError::Aborted {
                        rank: self.rank,
                        reason,
                    }),
                    None => Ok(None),
                }
            }
            Link::Coordinator { inbox, .. } => {
                let own = contribution.map_err(|e| CollectiveError::Aborted {
                    rank: self.rank,
                    reason: e.to_string(),
                })?;

                let mut recv: Vec<T> = try_zeroed("gather buffer", layout.total())?;
                let mut seen = vec![false; layout.counts.len()];
                Self::place(&mut recv, layout, &mut seen, self.rank, &own)?;
                drop(own);

                for _ in 1..self.size {
                    match inbox.recv() {
                        Ok(Contribution::Block { rank, data }) => {
                            log::debug!("gather: rank {} contributed {} elements", rank, data.len());
                            Self::place(&mut recv, layout, &mut seen, rank, &data)?;
                        }
                        Ok(Contribution::Abort { rank, reason }) => {
                            return Err(CollectiveError::Aborted { rank, reason });
                        }
                        Err(_) => {
                            return Err(CollectiveError::Disconnected {
                                rank: self.rank,
                                during: "gather",
                            });
                        }
                    }
                }
                Ok(Some(recv))
            }
        }
    }
}
