use crate::core::{Env, Frame, Info, InfoValue, Step};
use crate::utils::canvas::{self, Canvas};
use crate::utils::rng::{RngStream, SeedSequence, rng_from_seed};
use rand::Rng;

/// Native controller button mask, one bit per button.
///
/// This is the raw action surface of the environment; the `JoypadSpace`
/// wrapper maps a reduced discrete action set onto these combos.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Buttons(u8);

impl Buttons {
    pub const NONE: Buttons = Buttons(0);
    pub const RIGHT: Buttons = Buttons(1 << 0);
    pub const LEFT: Buttons = Buttons(1 << 1);
    pub const DOWN: Buttons = Buttons(1 << 2);
    pub const UP: Buttons = Buttons(1 << 3);
    /// Jump.
    pub const A: Buttons = Buttons(1 << 4);
    /// Run.
    pub const B: Buttons = Buttons(1 << 5);

    /// Number of physical buttons.
    pub const COUNT: usize = 6;

    pub const fn bits(self) -> u8 { self.0 }

    pub const fn contains(self, other: Buttons) -> bool {
        (self.0 & other.0) == other.0
    }

    pub const fn union(self, other: Buttons) -> Buttons {
        Buttons(self.0 | other.0)
    }

    /// One 0/1 entry per button, in declaration order: the element layout of
    /// the native `MultiBinary` action space.
    pub fn to_bit_vec(self) -> Vec<u8> {
        (0..Self::COUNT).map(|i| (self.0 >> i) & 1).collect()
    }
}

impl std::ops::BitOr for Buttons {
    type Output = Buttons;
    fn bitor(self, rhs: Buttons) -> Buttons { self.union(rhs) }
}

/// Reward shaping knobs. Forward progress dominates; death and the goal flag
/// are large one-off terms; everything is clipped symmetrically.
#[derive(Clone, Debug)]
pub struct RewardConfig {
    /// Reward per pixel of rightward progress (negative when moving left).
    pub progress_gain: f32,
    /// Flat penalty applied every environment step.
    pub time_penalty: f32,
    pub death_penalty: f32,
    pub flag_bonus: f32,
    /// Rewards are clamped into [-clip, clip].
    pub clip: f32,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            progress_gain: 1.0,
            time_penalty: -0.1,
            death_penalty: -15.0,
            flag_bonus: 15.0,
            clip: 15.0,
        }
    }
}

// View and world geometry (pixels).
pub const VIEW_W: u32 = 256;
pub const VIEW_H: u32 = 240;
const TILE: i32 = 16;
const LEVEL_TILES: u32 = 224;
/// Ground surface: tile rows 13 and 14 are solid unless cut by a gap.
const GROUND_ROW: i32 = 13;
const PLAYER_W: f32 = 12.0;
const PLAYER_H: f32 = 16.0;

// Player physics (pixels per tick, ticks at 60Hz).
const GRAVITY: f32 = 0.5;
const MAX_FALL: f32 = 4.5;
const JUMP_VEL: f32 = -8.5;
const WALK_ACCEL: f32 = 0.12;
const RUN_ACCEL: f32 = 0.2;
const MAX_WALK: f32 = 1.5;
const MAX_RUN: f32 = 2.5;
const FRICTION: f32 = 0.85;

/// Internal ticks advanced per `step` call; the same buttons are held for all
/// of them and only the last frame is observed.
const FRAME_SKIP: u32 = 4;
/// Episode clock in ticks. Expiry truncates the episode.
const TIMER_INIT: u32 = 6000;

/// A stage layout: pits cut into the ground and floating platforms, with a
/// goal flag near the right edge. Fully determined by the stage id.
#[derive(Clone, Debug)]
struct Level {
    width_tiles: u32,
    /// (start_tile, len) runs where the ground is missing.
    gaps: Vec<(u32, u32)>,
    /// (tile_x, tile_y, len) horizontal runs of solid blocks.
    platforms: Vec<(u32, u32, u32)>,
    flag_tile: u32,
}

impl Level {
    fn generate(stage: u32) -> Self {
        let mut rng = SeedSequence::new(stage as u64).next_rng();
        let width_tiles = LEVEL_TILES;
        let flag_tile = width_tiles - 8;

        // March left to right placing pits, keeping the spawn area and the
        // flag approach solid.
        let mut gaps = Vec::new();
        let mut pos: u32 = 12;
        while pos + 6 < flag_tile - 4 {
            pos += rng.gen_range(8..20);
            let len = rng.gen_range(2..=4);
            if pos + len < flag_tile - 4 {
                gaps.push((pos, len));
            }
            pos += len;
        }

        let mut platforms = Vec::new();
        for _ in 0..12 {
            let tx = rng.gen_range(16..flag_tile - 8);
            let ty = rng.gen_range(9..=11);
            let len = rng.gen_range(3..=5);
            platforms.push((tx, ty, len));
        }

        Self { width_tiles, gaps, platforms, flag_tile }
    }

    fn in_gap(&self, tx: u32) -> bool {
        self.gaps.iter().any(|&(start, len)| tx >= start && tx < start + len)
    }

    fn solid(&self, tx: i32, ty: i32) -> bool {
        if tx < 0 {
            return true; // left world wall
        }
        if tx >= self.width_tiles as i32 || ty >= GROUND_ROW + 2 {
            return false;
        }
        if ty == GROUND_ROW || ty == GROUND_ROW + 1 {
            return !self.in_gap(tx as u32);
        }
        if ty < 0 {
            return false;
        }
        self.platforms
            .iter()
            .any(|&(px, py, len)| ty == py as i32 && tx >= px as i32 && tx < (px + len) as i32)
    }

    fn width_px(&self) -> f32 { (self.width_tiles as i32 * TILE) as f32 }
    fn flag_px(&self) -> f32 { (self.flag_tile as i32 * TILE) as f32 }
}

/// A side-scrolling platformer with pixel observations.
///
/// Observation: 256x240 RGB frame. Action: native [`Buttons`] mask.
/// Reward: rightward progress minus a step penalty, with one-off death and
/// goal terms (see [`RewardConfig`]). Episodes end when the player falls
/// into a pit or reaches the flag (`terminated`) or when the clock runs out
/// (`truncated`).
///
/// `reset` takes no arguments: the layout is fixed by the stage id and the
/// internal RNG is seeded once at construction. Seed-aware callers go
/// through the `ResetCompat` adapter.
pub struct ScrollerEnv {
    stage: u32,
    level: Level,

    // Player state
    x: f32,
    y: f32,
    vx: f32,
    vy: f32,
    on_ground: bool,
    prev_buttons: Buttons,

    // Episode state
    timer: u32,
    died: bool,
    flag_get: bool,

    rng: RngStream,
    reward_cfg: RewardConfig,
}

impl Default for ScrollerEnv {
    fn default() -> Self { Self::new(1, 1_234_567) }
}

impl ScrollerEnv {
    pub fn new(stage: u32, seed: u64) -> Self {
        let level = Level::generate(stage);
        let mut env = Self {
            stage,
            level,
            x: 0.0,
            y: 0.0,
            vx: 0.0,
            vy: 0.0,
            on_ground: true,
            prev_buttons: Buttons::NONE,
            timer: TIMER_INIT,
            died: false,
            flag_get: false,
            rng: rng_from_seed(seed),
            reward_cfg: RewardConfig::default(),
        };
        env.respawn();
        env
    }

    pub fn with_reward_config(mut self, cfg: RewardConfig) -> Self {
        self.reward_cfg = cfg;
        self
    }

    pub fn stage(&self) -> u32 { self.stage }

    fn respawn(&mut self) {
        self.x = 40.0;
        self.y = (GROUND_ROW * TILE) as f32 - PLAYER_H;
        self.vx = 0.0;
        self.vy = 0.0;
        self.on_ground = true;
        self.prev_buttons = Buttons::NONE;
        self.timer = TIMER_INIT;
        self.died = false;
        self.flag_get = false;
    }

    fn box_collides(&self, x: f32, y: f32) -> bool {
        let xs = [x, x + PLAYER_W - 1.0];
        let ys = [y, y + PLAYER_H / 2.0, y + PLAYER_H - 1.0];
        for &cx in &xs {
            for &cy in &ys {
                let tx = (cx / TILE as f32).floor() as i32;
                let ty = (cy / TILE as f32).floor() as i32;
                if self.level.solid(tx, ty) {
                    return true;
                }
            }
        }
        false
    }

    /// Advance the world by one tick while the given buttons are held.
    fn tick(&mut self, buttons: Buttons) {
        // Horizontal control
        let accel = if buttons.contains(Buttons::B) { RUN_ACCEL } else { WALK_ACCEL };
        let max_vx = if buttons.contains(Buttons::B) { MAX_RUN } else { MAX_WALK };
        let right = buttons.contains(Buttons::RIGHT);
        let left = buttons.contains(Buttons::LEFT);
        if right && !left {
            self.vx += accel;
        } else if left && !right {
            self.vx -= accel;
        } else {
            self.vx *= FRICTION;
            if self.vx.abs() < 0.05 {
                self.vx = 0.0;
            }
        }
        self.vx = self.vx.clamp(-max_vx, max_vx);
        if buttons.contains(Buttons::DOWN) && self.on_ground {
            // crouching kills momentum
            self.vx *= 0.8;
        }

        // Jump on the press edge only
        let jump_pressed =
            buttons.contains(Buttons::A) && !self.prev_buttons.contains(Buttons::A);
        if jump_pressed && self.on_ground {
            self.vy = JUMP_VEL;
        }
        self.prev_buttons = buttons;

        // Gravity
        self.vy = (self.vy + GRAVITY).min(MAX_FALL);

        // Horizontal pass
        let new_x = (self.x + self.vx).clamp(0.0, self.level.width_px() - PLAYER_W);
        if self.box_collides(new_x, self.y) {
            self.vx = 0.0;
        } else {
            self.x = new_x;
        }

        // Vertical pass
        let new_y = self.y + self.vy;
        if self.box_collides(self.x, new_y) {
            if self.vy > 0.0 {
                // landed: snap feet to the tile top
                let feet = new_y + PLAYER_H;
                let tile_top = (feet / TILE as f32).floor() * TILE as f32;
                self.y = tile_top - PLAYER_H;
            } else {
                // bonked: snap head to the tile bottom
                let tile_bottom = (new_y / TILE as f32).floor() * TILE as f32 + TILE as f32;
                self.y = tile_bottom;
            }
            self.vy = 0.0;
        } else {
            self.y = new_y;
        }
        // Grounded when not rising and there is a solid tile right below the feet.
        self.on_ground = self.vy >= 0.0 && self.box_collides(self.x, self.y + 1.0);

        if self.y > VIEW_H as f32 {
            self.died = true;
        }
        if self.x + PLAYER_W >= self.level.flag_px() {
            self.flag_get = true;
        }
        self.timer = self.timer.saturating_sub(1);
    }

    fn camera_x(&self) -> f32 {
        (self.x - 96.0).clamp(0.0, self.level.width_px() - VIEW_W as f32)
    }

    fn render_frame(&self) -> Frame {
        let mut c = Canvas::new(VIEW_W, VIEW_H);
        c.clear(canvas::SKY);

        let cam = self.camera_x();
        let tx0 = (cam / TILE as f32).floor() as i32;

        // Ground and platform tiles in view
        for tx in tx0..tx0 + (VIEW_W as i32 / TILE) + 2 {
            for ty in 0..GROUND_ROW + 2 {
                if self.level.solid(tx, ty) {
                    let color = if ty >= GROUND_ROW { canvas::GROUND } else { canvas::BRICK };
                    c.fill_rect(tx * TILE - cam as i32, ty * TILE, TILE, TILE, color);
                }
            }
        }

        // Goal flag: pole plus pennant
        let flag_x = self.level.flag_px() as i32 - cam as i32;
        let pole_top = 5 * TILE;
        c.fill_rect(flag_x, pole_top, 2, GROUND_ROW * TILE - pole_top, canvas::POLE_GRAY);
        c.fill_rect(flag_x - 10, pole_top, 10, 8, canvas::FLAG_GREEN);

        // Player
        c.fill_rect(
            (self.x - cam) as i32,
            self.y as i32,
            PLAYER_W as i32,
            PLAYER_H as i32,
            canvas::PLAYER,
        );

        c.into_frame()
    }

    fn make_info(&self) -> Info {
        let mut info = Info::new();
        info.insert("x_pos", InfoValue::from(self.x as i64));
        info.insert("time", InfoValue::from(self.timer as i64));
        info.insert("flag_get", InfoValue::from(self.flag_get));
        info.insert("stage", InfoValue::from(self.stage));
        info
    }
}

impl Env for ScrollerEnv {
    type Obs = Frame;
    type Act = Buttons;

    fn reset(&mut self) -> (Self::Obs, Info) {
        self.respawn();
        // A short random idle warm-up decorrelates episode starts.
        let warmup = self.rng.gen_range(0..8);
        for _ in 0..warmup {
            self.tick(Buttons::NONE);
        }
        (self.render_frame(), self.make_info())
    }

    fn step(&mut self, action: Self::Act) -> Step<Self::Obs> {
        let x0 = self.x;
        let mut terminated = false;
        let mut truncated = false;
        for _ in 0..FRAME_SKIP {
            self.tick(action);
            if self.died || self.flag_get {
                terminated = true;
                break;
            }
            if self.timer == 0 {
                truncated = true;
                break;
            }
        }

        let cfg = &self.reward_cfg;
        let mut reward = (self.x - x0) * cfg.progress_gain + cfg.time_penalty;
        if self.died {
            reward += cfg.death_penalty;
        }
        if self.flag_get {
            reward += cfg.flag_bonus;
        }
        reward = reward.clamp(-cfg.clip, cfg.clip);

        Step::new(self.render_frame(), reward, terminated, truncated, self.make_info())
    }

    fn render(&self) -> Option<Frame> {
        Some(self.render_frame())
    }

    fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layouts_are_deterministic_per_stage() {
        let a = Level::generate(3);
        let b = Level::generate(3);
        assert_eq!(a.gaps, b.gaps);
        assert_eq!(a.platforms, b.platforms);
        let c = Level::generate(4);
        assert!(a.gaps != c.gaps || a.platforms != c.platforms);
    }

    #[test]
    fn spawn_area_is_solid() {
        for stage in 0..8 {
            let level = Level::generate(stage);
            for tx in 0..8 {
                assert!(level.solid(tx, GROUND_ROW), "stage {stage} tile {tx}");
            }
        }
    }

    #[test]
    fn observation_is_rgb_view_sized() {
        let mut env = ScrollerEnv::new(1, 0);
        let (obs, info) = env.reset();
        assert_eq!(obs.shape(), (VIEW_H, VIEW_W, 3));
        assert_eq!(obs.data.len(), (VIEW_H * VIEW_W * 3) as usize);
        assert!(info.get_i64("x_pos").is_some());
    }

    #[test]
    fn running_right_makes_progress() {
        let mut env = ScrollerEnv::new(1, 0);
        let (_obs, info) = env.reset();
        let x0 = info.get_i64("x_pos").unwrap();
        let mut last = 0;
        for _ in 0..20 {
            let s = env.step(Buttons::RIGHT | Buttons::B);
            last = s.info.get_i64("x_pos").unwrap();
            if s.terminated || s.truncated {
                break;
            }
        }
        assert!(last > x0, "expected progress, got {x0} -> {last}");
    }

    #[test]
    fn standing_still_never_terminates_early() {
        let mut env = ScrollerEnv::new(1, 0);
        let _ = env.reset();
        for _ in 0..50 {
            let s = env.step(Buttons::NONE);
            assert!(!s.terminated);
            // time penalty only, no progress
            assert!(s.reward <= 0.0);
        }
    }

    #[test]
    fn clock_expiry_truncates() {
        let mut env = ScrollerEnv::new(1, 0);
        let _ = env.reset();
        let mut truncated = false;
        for _ in 0..(TIMER_INIT / FRAME_SKIP + 8) {
            let s = env.step(Buttons::NONE);
            if s.truncated {
                truncated = true;
                break;
            }
            assert!(!s.terminated);
        }
        assert!(truncated);
    }

    #[test]
    fn buttons_bit_vec_matches_mask() {
        let combo = Buttons::RIGHT | Buttons::A | Buttons::B;
        let bits = combo.to_bit_vec();
        assert_eq!(bits, vec![1, 0, 0, 0, 1, 1]);
        assert!(combo.contains(Buttons::RIGHT));
        assert!(!combo.contains(Buttons::LEFT));
    }
}
