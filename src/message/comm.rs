use serde::{de::DeserializeOwned, Serialize};
use super::util;
use super::CommError;

/// Interface for a group of processes that can exchange messages. The
/// underlying transport can in principle be in-process channels, TCP, or a
/// higher level abstraction like MPI.
///
pub trait Communicator {
    /// Must be implemented to return the rank of this process within the
    /// communicator.
    fn rank(&self) -> usize;

    /// Must be implemented to return the number of peers processes in this
    /// communicator.
    fn size(&self) -> usize;

    /// Must be implemented to send a message to a peer. This method must
    /// return immediately, in other words it is not allowed to block until a
    /// matching receive is posted. A peer that can no longer receive is an
    /// error.
    fn send(&self, rank: usize, message: Vec<u8>) -> Result<(), CommError>;

    /// Must be implemented to receive the next message from the given peer.
    /// Messages from one peer are received in the order they were sent. This
    /// method is allowed to block until a message is ready to be received,
    /// and must fail rather than block if none can ever arrive.
    fn recv(&self, rank: usize) -> Result<Vec<u8>, CommError>;

    /// Implements a binomial tree broadcast from rank 0. The message buffer
    /// must be `Some` if this is rank 0, and it must be `None` otherwise.
    ///
    fn broadcast(&self, value: Option<Vec<u8>>) -> Result<Vec<u8>, CommError> {
        let r = self.rank();
        let p = self.size();

        let value = match value {
            Some(value) => value,
            None => self.recv(r - (r & r.wrapping_neg()))?,
        };
        for level in (0..util::ceil_log2(p)).rev() {
            let one = 1 << level;
            let two = 1 << (level + 1);

            if r % two == 0 && r + one < p {
                self.send(r + one, value.clone())?
            }
        }
        Ok(value)
    }

    /// Implements a binomial tree reduce to rank 0. All ranks return `None`
    /// except for the root.
    ///
    fn reduce<F>(&self, f: F, mut value: Vec<u8>) -> Result<Option<Vec<u8>>, CommError>
    where
        F: Fn(Vec<u8>, Vec<u8>) -> Vec<u8>,
    {
        let r = self.rank();
        let p = self.size();

        for level in 0..util::ceil_log2(p) {
            let one = 1 << level;
            let two = 1 << (level + 1);

            if r % two == 0 {
                if r + one < p {
                    value = f(value, self.recv(r + one)?)
                }
            } else {
                self.send(r - one, value)?;
                return Ok(None);
            }
        }
        Ok(Some(value))
    }

    /// Implements an all-reduce (symmetric fold) operation over a commutative
    /// binary operator.
    ///
    fn all_reduce<F>(&self, f: F, value: Vec<u8>) -> Result<Vec<u8>, CommError>
    where
        F: Fn(Vec<u8>, Vec<u8>) -> Vec<u8>,
    {
        let reduced = self.reduce(f, value)?;
        self.broadcast(reduced)
    }

    /// Collects one message from every rank, ordered by rank, onto every
    /// rank.
    ///
    fn all_gather(&self, value: Vec<u8>) -> Result<Vec<Vec<u8>>, CommError> {
        let r = self.rank();
        let p = self.size();

        if r != 0 {
            self.send(0, value)?;
            let bytes = self.broadcast(None)?;
            return Ok(util::unpack(&bytes))
        }
        let mut parts = vec![value];

        for peer in 1..p {
            parts.push(self.recv(peer)?)
        }
        self.broadcast(Some(util::pack(&parts)))?;
        Ok(parts)
    }

    /// Blocks until every rank has entered the barrier.
    ///
    fn barrier(&self) -> Result<(), CommError> {
        self.all_reduce(|a, _| a, Vec::new()).map(|_| ())
    }
}




/// Gather a serializable value from every rank onto every rank.
///
pub fn all_gather_value<C, T>(comm: &C, value: &T) -> Result<Vec<T>, CommError>
where
    C: Communicator + ?Sized,
    T: Serialize + DeserializeOwned,
{
    let bytes = rmp_serde::encode::to_vec(value)?;
    comm.all_gather(bytes)?
        .iter()
        .map(|part| Ok(rmp_serde::decode::from_slice(part)?))
        .collect()
}

/// Fold a serializable value over every rank with a commutative operator,
/// and return the result on every rank.
///
pub fn all_reduce_value<C, T, F>(comm: &C, value: &T, f: F) -> Result<T, CommError>
where
    C: Communicator + ?Sized,
    T: Serialize + DeserializeOwned,
    F: Fn(T, T) -> T,
{
    let values = all_gather_value(comm, value)?;
    values.into_iter().reduce(f).ok_or(CommError::Empty)
}
