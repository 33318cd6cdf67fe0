use crate::{SpriteError, MAX_WORKERS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStrategy {
    Sequential,
    ParallelBatches { num_workers: u16 },
}

impl RunStrategy {
    pub fn new_parallel(num_workers: usize) -> Result<Self, SpriteError> {
        if num_workers > MAX_WORKERS {
            Err(SpriteError::TooManyThreads(num_workers))
        } else if num_workers <= 1 {
            // a single worker buys nothing over the inline loop
            Ok(RunStrategy::Sequential)
        } else {
            Ok(RunStrategy::ParallelBatches {
                num_workers: num_workers as u16,
            })
        }
    }
}

#[test]
fn test_parallel_bounds() {
    assert_eq!(RunStrategy::new_parallel(1).unwrap(), RunStrategy::Sequential);
    assert_eq!(
        RunStrategy::new_parallel(4).unwrap(),
        RunStrategy::ParallelBatches { num_workers: 4 }
    );
    assert!(matches!(
        RunStrategy::new_parallel(MAX_WORKERS + 1),
        Err(SpriteError::TooManyThreads(_))
    ));
}
