//! Per-block mining state machine.
//!
//! Holding the mine input on a block cracks it once immediately and once more
//! for every full second it stays held. A second that ends on a block with
//! three cracks already emits a remove intent, three seconds after the press.
//! The block itself only disappears when the server's broadcast comes back. Releasing, switching to another block, or the block
//! being removed by anyone resets the machine.

use blockworld_protocol::{BlockKey, BlockUpdate};
use std::time::Duration;

pub const CRACK_INTERVAL: Duration = Duration::from_secs(1);
pub const CRACKS_TO_BREAK: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MiningState {
    #[default]
    Idle,
    Cracking(u8),
    /// The remove intent went out; waiting for the broadcast.
    Removed,
}

#[derive(Debug, Clone, Default)]
pub struct Miner {
    target: Option<BlockKey>,
    state: MiningState,
    elapsed: Duration,
}

impl Miner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MiningState {
        self.state
    }

    pub fn target(&self) -> Option<&BlockKey> {
        self.target.as_ref()
    }

    /// Starts cracking `key`. Pressing the block already being mined keeps
    /// its progress; pressing another block starts over on that one.
    pub fn press(&mut self, key: BlockKey) {
        if self.target.as_ref() == Some(&key) && self.state != MiningState::Idle {
            return;
        }
        self.target = Some(key);
        self.state = MiningState::Cracking(1);
        self.elapsed = Duration::ZERO;
    }

    pub fn release(&mut self) {
        self.reset();
    }

    /// The pointer left `key`; mining it stops.
    pub fn deselect(&mut self, key: &BlockKey) {
        if self.target.as_ref() == Some(key) {
            self.reset();
        }
    }

    /// `key` was removed from the replica.
    pub fn block_removed(&mut self, key: &BlockKey) {
        self.deselect(key);
    }

    /// Advances the timer; returns the remove intent on the breaking tick.
    ///
    /// Every elapsed interval adds a crack. The interval that ends with the
    /// block already fully cracked breaks it, so the last crack stays visible
    /// for a whole interval.
    pub fn tick(&mut self, dt: Duration) -> Option<BlockUpdate> {
        let MiningState::Cracking(mut cracks) = self.state else {
            return None;
        };

        self.elapsed += dt;
        while self.elapsed >= CRACK_INTERVAL {
            self.elapsed -= CRACK_INTERVAL;
            if cracks >= CRACKS_TO_BREAK {
                self.state = MiningState::Removed;
                return self.target.clone().map(BlockUpdate::remove);
            }
            cracks += 1;
        }
        self.state = MiningState::Cracking(cracks);
        None
    }

    /// Opacity of the crack overlay on the mined block.
    pub fn crack_opacity(&self) -> f32 {
        match self.state {
            MiningState::Idle => 1.0,
            MiningState::Cracking(cracks) => 1.0 - 0.3 * cracks as f32,
            MiningState::Removed => 1.0 - 0.3 * CRACKS_TO_BREAK as f32,
        }
    }

    fn reset(&mut self) {
        self.target = None;
        self.state = MiningState::Idle;
        self.elapsed = Duration::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: Duration = Duration::from_millis(250);

    fn key() -> BlockKey {
        BlockKey::from("3-0-3")
    }

    #[test]
    fn press_cracks_immediately() {
        let mut miner = Miner::new();
        miner.press(key());
        assert_eq!(miner.state(), MiningState::Cracking(1));
        assert!((miner.crack_opacity() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn breaks_three_seconds_after_the_press() {
        let mut miner = Miner::new();
        miner.press(key());

        let mut intent = None;
        let mut frames = 0;
        while intent.is_none() && frames < 100 {
            intent = miner.tick(FRAME);
            frames += 1;
        }
        assert_eq!(frames, 12);
        assert_eq!(intent, Some(BlockUpdate::remove(key())));
        assert_eq!(miner.state(), MiningState::Removed);
        assert_eq!(miner.tick(FRAME), None);
    }

    #[test]
    fn last_crack_is_visible_for_a_full_interval() {
        let mut miner = Miner::new();
        miner.press(key());

        let mut fully_cracked_ticks = 0;
        for _ in 0..30 {
            if miner.tick(Duration::from_millis(100)).is_some() {
                break;
            }
            if miner.state() == MiningState::Cracking(CRACKS_TO_BREAK) {
                fully_cracked_ticks += 1;
                assert!((miner.crack_opacity() - 0.1).abs() < 1e-6);
            }
        }
        assert_eq!(miner.state(), MiningState::Removed);
        // fully cracked from 2.0 s, broken at 3.0 s
        assert_eq!(fully_cracked_ticks, 10);
    }

    #[test]
    fn release_resets_progress() {
        let mut miner = Miner::new();
        miner.press(key());
        miner.tick(Duration::from_millis(1500));
        assert_eq!(miner.state(), MiningState::Cracking(2));

        miner.release();
        assert_eq!(miner.state(), MiningState::Idle);
        assert_eq!(miner.target(), None);
        assert_eq!(miner.tick(Duration::from_secs(5)), None);
    }

    #[test]
    fn removal_by_broadcast_tears_down_only_the_target() {
        let mut miner = Miner::new();
        miner.press(key());
        miner.block_removed(&BlockKey::from("0-0-0"));
        assert_eq!(miner.state(), MiningState::Cracking(1));

        miner.block_removed(&key());
        assert_eq!(miner.state(), MiningState::Idle);
    }

    #[test]
    fn switching_blocks_starts_over() {
        let mut miner = Miner::new();
        miner.press(key());
        miner.tick(Duration::from_millis(1200));
        miner.press(key());
        assert_eq!(miner.state(), MiningState::Cracking(2));

        miner.press(BlockKey::from("4-0-3"));
        assert_eq!(miner.state(), MiningState::Cracking(1));
        assert_eq!(miner.target(), Some(&BlockKey::from("4-0-3")));
    }

    #[test]
    fn one_long_tick_breaks_at_once() {
        let mut miner = Miner::new();
        miner.press(key());
        assert!(miner.tick(Duration::from_secs(10)).is_some());
    }
}
