//! Thin façade over intra-process (threads) or inter-process (MPI) message passing.
//!
//! Messages are *contiguous byte slices* (no zero-copy guarantees).
//! Point-to-point handles are **waitable**: callers post a send and a receive,
//! then `.wait()` on the receive before they trust the buffer.
//!
//! The only collective is [`Communicator::all_reduce_sum`], an element-wise
//! sum that doubles as a barrier. Every participant must call it at the same
//! iteration number; the backends check this and report
//! [`PercolateError::CollectiveMismatch`] instead of mixing rounds.

use crate::percolate_error::PercolateError;
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Message tag, namespaced per protocol phase.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CommTag(pub u16);

impl CommTag {
    pub const fn new(tag: u16) -> Self {
        Self(tag)
    }
    /// Raw tag value.
    pub const fn base(self) -> u16 {
        self.0
    }
    pub const fn as_u16(self) -> u16 {
        self.0
    }
    /// Tag `n` slots after this one (wrapping).
    pub const fn offset(self, n: u16) -> Self {
        Self(self.0.wrapping_add(n))
    }
}

/// Non-blocking communication interface plus one sum collective.
pub trait Communicator: 'static {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    /// This participant's rank (0 = coordinator).
    fn rank(&self) -> usize;
    /// Number of participants, coordinator included.
    fn size(&self) -> usize;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;

    /// `true` for the serial no-op backend.
    fn is_no_comm(&self) -> bool {
        false
    }

    /// One shift of a neighbour exchange under `tag`: send `send.1` to rank
    /// `send.0` and receive `recv.1` bytes from rank `recv.0`.
    ///
    /// Either side may be absent at a non-periodic boundary. Post-send,
    /// post-receive, wait-for-receive; the send is drained before returning.
    /// When every participant shifts in the same direction at once, no
    /// participant waits on a peer that is itself waiting.
    fn exchange(
        &self,
        tag: u16,
        send: Option<(usize, &[u8])>,
        recv: Option<(usize, usize)>,
    ) -> Result<Option<Vec<u8>>, PercolateError> {
        let pending = send.map(|(peer, out)| self.isend(peer, tag, out));
        let got = match recv {
            None => None,
            Some((peer, len)) => {
                let mut buf = vec![0u8; len];
                match self.irecv(peer, tag, &mut buf).wait() {
                    Some(data) if data.len() == len => Some(data),
                    Some(data) => {
                        return Err(PercolateError::CommError {
                            neighbor: peer,
                            message: format!("expected {len} bytes, got {}", data.len()),
                        });
                    }
                    None => {
                        return Err(PercolateError::CommError {
                            neighbor: peer,
                            message: format!("receive on tag {tag:#06x} did not complete"),
                        });
                    }
                }
            }
        };
        if let Some(h) = pending {
            let _ = h.wait();
        }
        Ok(got)
    }

    /// Element-wise sum of `local` over every participant.
    ///
    /// `step` is the caller's iteration number; all participants must pass the
    /// same value and the same slice length.
    fn all_reduce_sum(&self, step: usize, local: &[u64]) -> Result<Vec<u64>, PercolateError>;
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// Single-participant comm for pure serial unit tests.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16, _buf: &mut [u8]) {}
    fn is_no_comm(&self) -> bool {
        true
    }
    fn all_reduce_sum(&self, _step: usize, local: &[u64]) -> Result<Vec<u64>, PercolateError> {
        Ok(local.to_vec())
    }
}

// --- ThreadComm: intra-process, one thread per participant ---
type Key = (usize, usize, u16); // (src, dst, tag)

#[derive(Default)]
struct Collective {
    arrived: usize,
    generation: u64,
    step: usize,
    acc: Vec<u64>,
    mismatch: Option<(usize, usize, usize)>,
    result: Option<Result<Vec<u64>, (usize, usize, usize)>>,
}

/// Shared state of one in-process run: mailbox and collective barrier.
///
/// A world is created per run and dropped with it.
pub struct ThreadWorld {
    size: usize,
    mailbox: DashMap<Key, VecDeque<Bytes>>,
    posted_seq: Mutex<u64>,
    posted: Condvar,
    collective: Mutex<Collective>,
    collective_done: Condvar,
    aborted: AtomicBool,
}

impl ThreadWorld {
    pub fn new(size: usize) -> Arc<Self> {
        Arc::new(Self {
            size,
            mailbox: DashMap::new(),
            posted_seq: Mutex::new(0),
            posted: Condvar::new(),
            collective: Mutex::new(Collective::default()),
            collective_done: Condvar::new(),
            aborted: AtomicBool::new(false),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Communicator for `rank`.
    pub fn comm(self: &Arc<Self>, rank: usize) -> ThreadComm {
        ThreadComm {
            rank,
            world: Arc::clone(self),
        }
    }

    /// One communicator per rank, in rank order.
    pub fn communicators(self: &Arc<Self>) -> Vec<ThreadComm> {
        (0..self.size).map(|r| self.comm(r)).collect()
    }

    /// Wake every blocked participant; pending and future waits fail.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
        {
            let _seq = self.posted_seq.lock();
            self.posted.notify_all();
        }
        let _c = self.collective.lock();
        self.collective_done.notify_all();
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    fn post(&self, key: Key, data: Bytes) {
        self.mailbox.entry(key).or_default().push_back(data);
        let mut seq = self.posted_seq.lock();
        *seq += 1;
        self.posted.notify_all();
    }

    fn take(&self, key: &Key) -> Option<Bytes> {
        self.mailbox.get_mut(key).and_then(|mut q| q.pop_front())
    }
}

#[derive(Clone)]
pub struct ThreadComm {
    rank: usize,
    world: Arc<ThreadWorld>,
}

impl ThreadComm {
    pub fn world(&self) -> &Arc<ThreadWorld> {
        &self.world
    }
}

/// Pending receive on a [`ThreadWorld`] mailbox.
pub struct ThreadRecv {
    world: Arc<ThreadWorld>,
    key: Key,
    len: usize,
}

impl Wait for ThreadRecv {
    fn wait(self) -> Option<Vec<u8>> {
        let mut seq = self.world.posted_seq.lock();
        loop {
            if let Some(bytes) = self.world.take(&self.key) {
                let n = self.len.min(bytes.len());
                return Some(bytes[..n].to_vec());
            }
            if self.world.is_aborted() {
                return None;
            }
            self.world.posted.wait(&mut seq);
        }
    }
}

impl Communicator for ThreadComm {
    type SendHandle = ();
    type RecvHandle = ThreadRecv;

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.world.size
    }

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
        self.world
            .post((self.rank, peer, tag), Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle {
        ThreadRecv {
            world: Arc::clone(&self.world),
            key: (peer, self.rank, tag),
            len: buf.len(),
        }
    }

    fn all_reduce_sum(&self, step: usize, local: &[u64]) -> Result<Vec<u64>, PercolateError> {
        let world = &self.world;
        let mut st = world.collective.lock();
        if world.is_aborted() {
            return Err(aborted(self.rank));
        }
        let generation = st.generation;
        if st.arrived == 0 {
            st.step = step;
            st.acc = local.to_vec();
            st.mismatch = None;
        } else if st.step != step || st.acc.len() != local.len() {
            if st.mismatch.is_none() {
                st.mismatch = Some((self.rank, step, st.step));
            }
        } else {
            for (a, v) in st.acc.iter_mut().zip(local) {
                *a += *v;
            }
        }
        st.arrived += 1;

        if st.arrived == world.size {
            st.result = Some(match st.mismatch {
                None => Ok(st.acc.clone()),
                Some(m) => Err(m),
            });
            st.arrived = 0;
            st.generation += 1;
            world.collective_done.notify_all();
        } else {
            while st.generation == generation && !world.is_aborted() {
                world.collective_done.wait(&mut st);
            }
            if st.generation == generation {
                return Err(aborted(self.rank));
            }
        }

        match st.result.clone() {
            Some(Ok(sum)) => Ok(sum),
            Some(Err((rank, step, expected))) => Err(PercolateError::CollectiveMismatch {
                rank,
                step,
                expected,
            }),
            None => Err(aborted(self.rank)),
        }
    }
}

fn aborted(rank: usize) -> PercolateError {
    PercolateError::Aborted { rank }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::{Communicator, Wait};
    use crate::percolate_error::PercolateError;
    use mpi::collective::SystemOperation;
    use mpi::environment::Universe;
    use mpi::point_to_point::send_receive_into_with_tags;
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;

    pub struct MpiComm {
        pub world: SimpleCommunicator,
        pub rank: usize,
        pub size: usize,
        _universe: Universe,
    }

    impl MpiComm {
        pub fn new() -> Result<Self, PercolateError> {
            let universe = mpi::initialize().ok_or_else(|| PercolateError::CommError {
                neighbor: 0,
                message: "MPI was already initialized".into(),
            })?;
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Ok(Self {
                world,
                rank,
                size,
                _universe: universe,
            })
        }
    }

    /// Receive completed eagerly by `irecv`.
    pub struct MpiRecv(Option<Vec<u8>>);

    impl Wait for MpiRecv {
        fn wait(self) -> Option<Vec<u8>> {
            self.0
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = ();
        type RecvHandle = MpiRecv;

        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) {
            self.world
                .process_at_rank(peer as i32)
                .send_with_tag(buf, i32::from(tag));
        }

        fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> MpiRecv {
            self.world
                .process_at_rank(peer as i32)
                .receive_into_with_tag(buf, i32::from(tag));
            MpiRecv(Some(buf.to_vec()))
        }

        // Paired send/receive so two neighbours shifting at once never both
        // sit in a blocking send.
        fn exchange(
            &self,
            tag: u16,
            send: Option<(usize, &[u8])>,
            recv: Option<(usize, usize)>,
        ) -> Result<Option<Vec<u8>>, PercolateError> {
            let tag = i32::from(tag);
            match (send, recv) {
                (Some((to, out)), Some((from, len))) => {
                    let mut buf = vec![0u8; len];
                    send_receive_into_with_tags(
                        out,
                        &self.world.process_at_rank(to as i32),
                        tag,
                        &mut buf[..],
                        &self.world.process_at_rank(from as i32),
                        tag,
                    );
                    Ok(Some(buf))
                }
                (Some((to, out)), None) => {
                    self.world.process_at_rank(to as i32).send_with_tag(out, tag);
                    Ok(None)
                }
                (None, Some((from, len))) => {
                    let mut buf = vec![0u8; len];
                    self.world
                        .process_at_rank(from as i32)
                        .receive_into_with_tag(&mut buf[..], tag);
                    Ok(Some(buf))
                }
                (None, None) => Ok(None),
            }
        }

        fn all_reduce_sum(&self, step: usize, local: &[u64]) -> Result<Vec<u64>, PercolateError> {
            let step = step as u64;
            let mut lo = 0u64;
            let mut hi = 0u64;
            self.world.all_reduce_into(&step, &mut lo, SystemOperation::min());
            self.world.all_reduce_into(&step, &mut hi, SystemOperation::max());
            if lo != hi {
                return Err(PercolateError::CollectiveMismatch {
                    rank: self.rank,
                    step: step as usize,
                    expected: if step == lo { hi as usize } else { lo as usize },
                });
            }
            let mut out = vec![0u64; local.len()];
            self.world
                .all_reduce_into(local, &mut out[..], SystemOperation::sum());
            Ok(out)
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn thread_roundtrip_two_ranks() {
        let world = ThreadWorld::new(2);
        let comm0 = world.comm(0);
        let comm1 = world.comm(1);

        let mut recv_buf = [0u8; 4];
        let recv_handle = comm1.irecv(0, 7, &mut recv_buf);
        let send_handle = comm0.isend(1, 7, &[1, 2, 3, 4]);
        send_handle.wait();

        let data = recv_handle
            .wait()
            .expect("Expected to receive data from rank 0");
        recv_buf.copy_from_slice(&data);
        assert_eq!(&recv_buf, &[1, 2, 3, 4]);
    }

    #[test]
    fn same_key_is_fifo() {
        let world = ThreadWorld::new(2);
        let (c0, c1) = (world.comm(0), world.comm(1));
        for i in 0..5u8 {
            c0.isend(1, 3, &[i]);
        }
        let got: Vec<u8> = (0..5)
            .map(|_| {
                let mut b = [0u8; 1];
                c1.irecv(0, 3, &mut b).wait().unwrap()[0]
            })
            .collect();
        assert_eq!(got, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn ring_shift_between_threads() {
        // Three ranks in a ring, everyone shifts "left" at once.
        let world = ThreadWorld::new(3);
        let comms = world.communicators();
        let out = thread::scope(|s| {
            let hs: Vec<_> = comms
                .iter()
                .map(|c| {
                    s.spawn(move || {
                        let me = c.rank();
                        let left = (me + 2) % 3;
                        let right = (me + 1) % 3;
                        c.exchange(10, Some((left, &[me as u8; 3][..])), Some((right, 3)))
                            .unwrap()
                            .unwrap()
                    })
                })
                .collect();
            hs.into_iter().map(|h| h.join().unwrap()).collect::<Vec<_>>()
        });
        assert_eq!(out[0], vec![1, 1, 1]);
        assert_eq!(out[1], vec![2, 2, 2]);
        assert_eq!(out[2], vec![0, 0, 0]);
    }

    #[test]
    fn one_sided_shift_returns_none() {
        let world = ThreadWorld::new(2);
        let c0 = world.comm(0);
        assert!(c0.exchange(4, Some((1, &[9u8][..])), None).unwrap().is_none());
        let got = world.comm(1).exchange(4, None, Some((0, 1))).unwrap();
        assert_eq!(got, Some(vec![9]));
    }

    #[test]
    fn all_reduce_sums_every_rank() {
        let world = ThreadWorld::new(3);
        let comms = world.communicators();
        let totals = thread::scope(|s| {
            let hs: Vec<_> = comms
                .iter()
                .map(|c| s.spawn(move || c.all_reduce_sum(100, &[c.rank() as u64, 1]).unwrap()))
                .collect();
            hs.into_iter().map(|h| h.join().unwrap()).collect::<Vec<_>>()
        });
        for t in totals {
            assert_eq!(t, vec![3, 3]);
        }
    }

    #[test]
    fn mismatched_steps_fail_everywhere() {
        let world = ThreadWorld::new(2);
        let comms = world.communicators();
        let results = thread::scope(|s| {
            let hs: Vec<_> = comms
                .iter()
                .map(|c| s.spawn(move || c.all_reduce_sum(50 * (c.rank() + 1), &[0])))
                .collect();
            hs.into_iter().map(|h| h.join().unwrap()).collect::<Vec<_>>()
        });
        for r in results {
            assert!(matches!(r, Err(PercolateError::CollectiveMismatch { .. })));
        }
    }

    #[test]
    fn abort_releases_blocked_receive() {
        let world = ThreadWorld::new(2);
        let c1 = world.comm(1);
        let h = thread::spawn(move || {
            let mut b = [0u8; 1];
            c1.irecv(0, 1, &mut b).wait()
        });
        world.abort();
        assert!(h.join().unwrap().is_none());
    }

    #[test]
    fn no_comm_reduce_is_identity() {
        assert_eq!(NoComm.all_reduce_sum(1, &[4, 2]).unwrap(), vec![4, 2]);
        assert!(NoComm.is_no_comm());
    }
}
