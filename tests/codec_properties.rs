use percolate::algs::communicator::ThreadWorld;
use percolate::algs::halo::exchange_halos;
use percolate::algs::wire::{WireKind, decode_labels, encode_labels};
use percolate::grid::{Block, Decomposition, Direction, GlobalGrid};
use proptest::prelude::*;
use std::thread;

// (L, mP, nP) with both parts dividing L
fn layouts() -> impl Strategy<Value = (usize, usize, usize)> {
    (1usize..=4, 1usize..=4, 1usize..=3).prop_map(|(m, n, k)| (m * n * k, m, n))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn scatter_then_gather_reproduces_the_grid(
        (l, m, n) in layouts(),
        rho in 0.0f64..=1.0,
        seed in any::<u64>(),
    ) {
        let decomp = Decomposition::new(l, m, n).unwrap();
        let grid = GlobalGrid::seeded(l, rho, seed);
        let mut back = GlobalGrid::blocked(l);
        for rank in 1..=decomp.worker_count() {
            let block = grid.extract_block(&decomp, rank).unwrap();
            let msg = encode_labels(WireKind::Scatter, block.cells());
            let cells = decode_labels(WireKind::Scatter, &msg, decomp.block_len()).unwrap();
            let block = Block::from_cells(&decomp, cells).unwrap();
            back.inject_block(&decomp, &block, rank).unwrap();
        }
        prop_assert_eq!(back, grid);
    }

    #[test]
    fn wrong_kind_never_decodes(labels in proptest::collection::vec(any::<u32>(), 0..32)) {
        let msg = encode_labels(WireKind::Edge, &labels);
        prop_assert!(decode_labels(WireKind::Gather, &msg, labels.len()).is_err());
        prop_assert_eq!(decode_labels(WireKind::Edge, &msg, labels.len()).unwrap(), labels);
    }

    #[test]
    fn halos_hold_the_neighbouring_cells(
        (l, m, n) in layouts(),
        seed in any::<u64>(),
    ) {
        let decomp = Decomposition::new(l, m, n).unwrap();
        let grid = GlobalGrid::seeded(l, 0.3, seed);
        let world = ThreadWorld::new(decomp.participant_count());

        let blocks: Vec<Block> = thread::scope(|s| {
            let handles: Vec<_> = (1..=decomp.worker_count())
                .map(|rank| {
                    let comm = world.comm(rank);
                    let grid = &grid;
                    s.spawn(move || {
                        let mut block = grid.extract_block(&decomp, rank).unwrap();
                        for dir in [Direction::Up, Direction::Down] {
                            if decomp.neighbour(rank, dir).unwrap().is_none() {
                                block.mark_absorbing(dir);
                            }
                        }
                        exchange_halos(&comm, &decomp, &mut block).unwrap();
                        block
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let (lm, ln) = (decomp.length_m(), decomp.length_n());
        // global value seen through a halo: i wraps, j outside the medium is 0
        let global = |i: isize, j: isize| -> u32 {
            if j < 0 || j >= l as isize {
                0
            } else {
                grid.get(i.rem_euclid(l as isize) as usize, j as usize)
            }
        };
        for (k, block) in blocks.iter().enumerate() {
            let (bm, bn) = decomp.block_of(k + 1).unwrap();
            let (m0, n0) = decomp.global_origin(bm, bn);
            let (m0, n0) = (m0 as isize, n0 as isize);
            for a in 1..=lm {
                prop_assert_eq!(block.get(a, 0), global(m0 + a as isize - 1, n0 - 1));
                prop_assert_eq!(block.get(a, ln + 1), global(m0 + a as isize - 1, n0 + ln as isize));
            }
            for b in 1..=ln {
                prop_assert_eq!(block.get(0, b), global(m0 - 1, n0 + b as isize - 1));
                prop_assert_eq!(block.get(lm + 1, b), global(m0 + lm as isize, n0 + b as isize - 1));
            }
        }
    }
}
