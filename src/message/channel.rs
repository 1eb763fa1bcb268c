use crossbeam_channel::{unbounded, Receiver, Sender};
use super::comm::Communicator;
use super::CommError;

/// A communicator over in-process channels, for a group of ranks run as
/// threads in one process. Every ordered pair of ranks has its own channel,
/// so messages from one peer are never reordered or confused with those of
/// another.
///
pub struct ChannelCommunicator {
    rank: usize,
    senders: Vec<Sender<Vec<u8>>>,
    receivers: Vec<Receiver<Vec<u8>>>,
}

impl ChannelCommunicator {
    /// Create a fully connected group of the given size. Element `r` of the
    /// returned vector is the communicator for rank `r`; each one is meant to
    /// be moved into its own thread.
    ///
    pub fn group(size: usize) -> Vec<Self> {
        let mut senders: Vec<Vec<Sender<Vec<u8>>>> = (0..size).map(|_| Vec::with_capacity(size)).collect();
        let mut receivers: Vec<Vec<Option<Receiver<Vec<u8>>>>> = (0..size).map(|_| vec![None; size]).collect();

        for src in 0..size {
            for dst in 0..size {
                let (s, r) = unbounded();
                senders[src].push(s);
                receivers[dst][src] = Some(r);
            }
        }
        senders
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(rank, (senders, receivers))| Self {
                rank,
                senders,
                receivers: receivers.into_iter().flatten().collect(),
            })
            .collect()
    }
}

impl Communicator for ChannelCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.senders.len()
    }

    fn send(&self, rank: usize, message: Vec<u8>) -> Result<(), CommError> {
        self.senders
            .get(rank)
            .ok_or(CommError::NoSuchRank { rank, size: self.size() })?
            .send(message)
            .map_err(|_| CommError::Disconnected { rank })
    }

    fn recv(&self, rank: usize) -> Result<Vec<u8>, CommError> {
        self.receivers
            .get(rank)
            .ok_or(CommError::NoSuchRank { rank, size: self.size() })?
            .recv()
            .map_err(|_| CommError::Disconnected { rank })
    }
}




/// The trivial communicator of a serial run.
///
pub struct SingleRank {
    loopback: (Sender<Vec<u8>>, Receiver<Vec<u8>>),
}

impl SingleRank {
    pub fn new() -> Self {
        Self { loopback: unbounded() }
    }
}

impl Default for SingleRank {
    fn default() -> Self {
        Self::new()
    }
}

impl Communicator for SingleRank {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn send(&self, rank: usize, message: Vec<u8>) -> Result<(), CommError> {
        if rank != 0 {
            return Err(CommError::NoSuchRank { rank, size: 1 })
        }
        self.loopback.0.send(message).map_err(|_| CommError::Disconnected { rank })
    }

    fn recv(&self, rank: usize) -> Result<Vec<u8>, CommError> {
        if rank != 0 {
            return Err(CommError::NoSuchRank { rank, size: 1 })
        }
        self.loopback.1.try_recv().map_err(|_| CommError::NothingPending { rank })
    }
}




#[cfg(test)]
mod test {

    use std::thread;
    use super::{ChannelCommunicator, SingleRank};
    use crate::message::comm::{all_gather_value, all_reduce_value, Communicator};
    use crate::message::CommError;

    fn run<F, T>(size: usize, f: F) -> Vec<T>
    where
        F: Fn(ChannelCommunicator) -> T + Send + Sync + Copy + 'static,
        T: Send + 'static,
    {
        let handles: Vec<_> = ChannelCommunicator::group(size)
            .into_iter()
            .map(|comm| thread::spawn(move || f(comm)))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    }

    #[test]
    fn broadcast_reaches_every_rank() {
        for size in 1..9 {
            let results = run(size, |comm| {
                let value = if comm.rank() == 0 { Some(vec![7, 8]) } else { None };
                comm.broadcast(value).unwrap()
            });
            assert!(results.iter().all(|v| v == &vec![7, 8]));
        }
    }

    #[test]
    fn reduce_sums_over_all_ranks() {
        for size in 1..9 {
            let results = run(size, |comm| {
                let value = vec![comm.rank() as u8];
                comm.all_reduce(|a, b| vec![a[0] + b[0]], value).unwrap()
            });
            let expected = (size * (size - 1) / 2) as u8;
            assert!(results.iter().all(|v| v[0] == expected));
        }
    }

    #[test]
    fn all_gather_orders_by_rank() {
        let results = run(5, |comm| {
            all_gather_value(&comm, &(comm.rank() * 10)).unwrap()
        });
        for gathered in results {
            assert_eq!(gathered, vec![0, 10, 20, 30, 40]);
        }
    }

    #[test]
    fn repeated_collectives_do_not_interfere() {
        let results = run(3, |comm| {
            let mut total = 0.0;
            for n in 0..20 {
                comm.barrier().unwrap();
                total += all_reduce_value(&comm, &(n as f64 + comm.rank() as f64), |a, b| a + b).unwrap();
            }
            total
        });
        let expected: f64 = (0..20).map(|n| 3.0 * n as f64 + 3.0).sum();
        assert!(results.iter().all(|&t| t == expected));
    }

    #[test]
    fn single_rank_collectives_are_trivial() {
        let comm = SingleRank::new();
        comm.barrier().unwrap();
        assert_eq!(comm.broadcast(Some(vec![1])).unwrap(), vec![1]);
        assert_eq!(all_gather_value(&comm, &3_u32).unwrap(), vec![3]);

        comm.send(0, vec![4]).unwrap();
        assert_eq!(comm.recv(0).unwrap(), vec![4]);
        assert!(matches!(comm.recv(0), Err(CommError::NothingPending { rank: 0 })));
        assert!(matches!(comm.send(1, vec![]), Err(CommError::NoSuchRank { rank: 1, size: 1 })));
    }

    #[test]
    fn departed_peers_are_reported() {
        let mut group = ChannelCommunicator::group(3);
        let root = group.remove(0);

        let handles: Vec<_> = group
            .into_iter()
            .map(|comm| thread::spawn(move || {
                if comm.rank() == 1 {
                    all_gather_value(&comm, &comm.rank()).map(|_| ())
                } else {
                    Ok(())
                }
            }))
            .collect();
        // Rank 2 leaves without joining, so the root gives up and leaves too.
        let gathered = all_gather_value(&root, &0_usize);
        drop(root);
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(matches!(gathered, Err(CommError::Disconnected { rank: 2 })));
        assert!(matches!(results[0], Err(CommError::Disconnected { rank: 0 })));
        assert!(results[1].is_ok());
    }
}
