use crate::window::WindowParams;

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    end: i64,
    count: u64,
}

/// Count-only sliding window for a single histogram bin.
///
/// Not synchronized: the owning histogram serializes access. Callers pass the
/// clock reading in so a whole snapshot is evaluated against one instant.
#[derive(Debug)]
pub(crate) struct BinCounter {
    bucket: i64,
    slots: Vec<Slot>,
    index: usize,
}

impl BinCounter {
    pub(crate) fn new(params: WindowParams) -> Self {
        Self {
            bucket: params.bucket_nanos(),
            slots: vec![Slot::default(); params.bucket_count()],
            index: 0,
        }
    }

    pub(crate) fn incr(&mut self, now: i64) {
        if now < self.slots[self.index].end {
            self.slots[self.index].count += 1;
            return;
        }

        self.index = (self.index + 1) % self.slots.len();
        self.slots[self.index] = Slot {
            end: now - now.rem_euclid(self.bucket) + self.bucket,
            count: 1,
        };
    }

    /// Total of every slot that ended less than one full ring span ago.
    pub(crate) fn get(&self, now: i64) -> u64 {
        let span = self.bucket.saturating_mul(self.slots.len() as i64);

        self.slots
            .iter()
            .filter(|slot| slot.end.saturating_add(span) > now)
            .map(|slot| slot.count)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const MINUTE: i64 = 60_000_000_000;
    const START: i64 = 1_700_000_040 * 1_000_000_000;

    fn counter() -> BinCounter {
        BinCounter::new(
            WindowParams::new(Duration::from_secs(3600), Duration::from_secs(60)).unwrap(),
        )
    }

    #[test]
    fn test_ring_matches_window() {
        assert_eq!(counter().slots.len(), 60);
    }

    #[test]
    fn test_get_tracks_sliding_total() {
        let mut c = counter();
        let mut now = START;
        let mut sum = 0u64;

        for i in 1..=60u64 {
            for _ in 0..i {
                c.incr(now);
            }
            sum += i;
            assert_eq!(c.get(now), sum);
            now += MINUTE;
        }

        // each step adds 2i and expires the oldest bucket holding i
        for i in 1..=60u64 {
            for _ in 0..i {
                c.incr(now);
                c.incr(now);
            }
            sum += i;
            assert_eq!(c.get(now), sum);
            now += MINUTE;
        }

        now += 60 * MINUTE;
        assert_eq!(c.get(now), 0);
    }

    #[test]
    fn test_incr_aligns_to_bucket_boundary() {
        let mut c = counter();
        c.incr(START + 59_000_000_000);
        c.incr(START + MINUTE);

        assert_eq!(c.slots[1].end, START + MINUTE);
        assert_eq!(c.slots[2].end, START + 2 * MINUTE);
        assert_eq!(c.get(START + MINUTE), 2);
    }
}
