//! Procedural rain.
//!
//! A [`ParticleField`] owns the falling drops and advances them one frame at
//! a time under the motion profile of the current [`Mood`]. Drawing is left to
//! the host: [`ParticleField::strokes`] yields one line segment per drop with
//! alpha and width scaled by depth, and [`ParticleField::tick`] reports the
//! per-frame glitch decorations.

use crate::scene::Mood;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Motion and look of the rain for one mood.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoodProfile {
    pub drop_count: usize,
    /// Fall speed at full depth, before the depth bonus.
    pub base_speed: f32,
    /// Horizontal drift per frame at full depth.
    pub wind: f32,
    pub color: [u8; 3],
    /// Stuttering, jumping motion instead of falling rain.
    pub glitch: bool,
}

const CALM: MoodProfile = MoodProfile {
    drop_count: 600,
    base_speed: 10.0,
    wind: -0.5,
    color: [190, 210, 230],
    glitch: false,
};
const STORMY: MoodProfile = MoodProfile {
    drop_count: 2200,
    base_speed: 35.0,
    wind: -6.0,
    color: [180, 200, 220],
    glitch: false,
};
const ETHEREAL: MoodProfile = MoodProfile {
    drop_count: 500,
    base_speed: 4.0,
    wind: 0.0,
    color: [120, 255, 240],
    glitch: false,
};
const GLITCH: MoodProfile = MoodProfile {
    drop_count: 400,
    base_speed: 0.0,
    wind: 0.0,
    color: [0, 255, 100],
    glitch: true,
};

impl MoodProfile {
    pub fn for_mood(mood: Mood) -> &'static MoodProfile {
        match mood {
            Mood::Calm => &CALM,
            Mood::Stormy => &STORMY,
            Mood::Ethereal => &ETHEREAL,
            Mood::Glitch => &GLITCH,
        }
    }
}

pub const MIN_DEPTH: f32 = 0.2;
const MIN_LENGTH: f32 = 15.0;
const MAX_LENGTH: f32 = 40.0;
/// Added to the base speed so that even a still mood drifts.
const SPEED_BONUS: f32 = 2.5;

/// Frames per stutter cycle, and how many of them move.
pub const STUTTER_CYCLE: u64 = 60;
pub const STUTTER_ACTIVE: u64 = 30;
const STUTTER_SCALE: f32 = 0.2;
const JUMP_CHANCE: f64 = 0.05;
const JUMP_RANGE: f32 = 25.0;
const TRAIL_CHANCE: f64 = 0.1;
const ARTIFACT_CHANCE: f64 = 0.2;

/// A single falling drop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RainDrop {
    pub x: f32,
    pub y: f32,
    /// Depth in `[MIN_DEPTH, 1]`; nearer drops are larger.
    pub z: f32,
    pub length: f32,
    pub speed: f32,
}

impl RainDrop {
    pub fn alpha(&self) -> f32 {
        (self.z * 0.8).min(1.0)
    }

    pub fn width(&self) -> f32 {
        1.5 * self.z
    }
}

/// Fall speed for a drop at depth `z`.
pub fn fall_speed(profile: &MoodProfile, z: f32) -> f32 {
    (profile.base_speed + SPEED_BONUS) * z
}

/// A line segment to draw for one drop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RainStroke {
    pub from: [f32; 2],
    pub to: [f32; 2],
    pub width: f32,
    pub alpha: f32,
}

/// A short rectangular corruption mark.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Artifact {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub alpha: f32,
}

/// Decorations for the frame just simulated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameEffects {
    /// Leave the previous frame partly visible instead of clearing.
    pub trail: bool,
    pub artifact: Option<Artifact>,
    /// Darken the lower half of the screen.
    pub fog: bool,
}

/// The rain simulation.
pub struct ParticleField {
    mood: Mood,
    width: f32,
    height: f32,
    drops: Vec<RainDrop>,
    frame: u64,
    rng: StdRng,
}

impl ParticleField {
    /// Create an empty field with a fixed random seed.
    pub fn new(seed: u64) -> Self {
        Self {
            mood: Mood::default(),
            width: 0.0,
            height: 0.0,
            drops: Vec::new(),
            frame: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create an empty field seeded from system entropy.
    pub fn from_entropy() -> Self {
        Self::new(rand::thread_rng().gen())
    }

    /// Replace every drop for `mood` over a `width` x `height` viewport.
    pub fn seed(&mut self, mood: Mood, width: f32, height: f32) {
        self.mood = mood;
        self.width = width.max(0.0);
        self.height = height.max(0.0);
        self.frame = 0;

        let profile = MoodProfile::for_mood(mood);
        let (w, h) = (self.width, self.height);
        let rng = &mut self.rng;
        self.drops = (0..profile.drop_count)
            .map(|_| {
                let z = rng.gen_range(MIN_DEPTH..=1.0);
                RainDrop {
                    x: rng.gen_range(0.0..=w),
                    y: rng.gen_range(0.0..=h),
                    z,
                    length: rng.gen_range(MIN_LENGTH..MAX_LENGTH),
                    speed: fall_speed(profile, z),
                }
            })
            .collect();
    }

    /// Reseed if the mood differs from the current one.
    pub fn set_mood(&mut self, mood: Mood) {
        if mood != self.mood || self.drops.is_empty() {
            self.seed(mood, self.width, self.height);
        }
    }

    /// Reseed if the viewport changed size.
    pub fn resize(&mut self, width: f32, height: f32) {
        if width != self.width || height != self.height {
            self.seed(self.mood, width, height);
        }
    }

    /// Advance every drop by one frame.
    pub fn tick(&mut self) -> FrameEffects {
        self.frame = self.frame.wrapping_add(1);
        let profile = MoodProfile::for_mood(self.mood);
        let (w, h) = (self.width, self.height);
        let moving = self.frame % STUTTER_CYCLE < STUTTER_ACTIVE;

        for drop in &mut self.drops {
            if profile.glitch {
                if self.rng.gen_bool(JUMP_CHANCE) {
                    drop.x += self.rng.gen_range(-JUMP_RANGE..=JUMP_RANGE);
                }
                if moving {
                    drop.y += drop.speed * STUTTER_SCALE;
                }
            } else {
                drop.y += drop.speed;
                drop.x += profile.wind * drop.z;
            }

            if drop.y > h {
                drop.y = -drop.length;
                drop.x = self.rng.gen_range(0.0..=w);
            }
            if drop.x > w {
                drop.x = 0.0;
            } else if drop.x < 0.0 {
                drop.x = w;
            }
        }

        if !profile.glitch {
            return FrameEffects {
                fog: true,
                ..FrameEffects::default()
            };
        }

        let trail = self.rng.gen_bool(TRAIL_CHANCE);
        let artifact = self.rng.gen_bool(ARTIFACT_CHANCE).then(|| Artifact {
            x: self.rng.gen_range(0.0..=w),
            y: self.rng.gen_range(0.0..=h),
            width: self.rng.gen_range(0.0..100.0),
            height: self.rng.gen_range(0.0..5.0),
            alpha: self.rng.gen_range(0.0..0.2),
        });
        FrameEffects {
            trail,
            artifact,
            fog: false,
        }
    }

    /// One stroke per drop, from its head along the wind and its depth-scaled length.
    pub fn strokes(&self) -> impl Iterator<Item = RainStroke> + '_ {
        let wind = self.profile().wind;
        self.drops.iter().map(move |d| RainStroke {
            from: [d.x, d.y],
            to: [d.x + wind * d.z, d.y + d.length * d.z],
            width: d.width(),
            alpha: d.alpha(),
        })
    }

    pub fn profile(&self) -> &'static MoodProfile {
        MoodProfile::for_mood(self.mood)
    }

    pub fn mood(&self) -> Mood {
        self.mood
    }

    pub fn drops(&self) -> &[RainDrop] {
        &self.drops
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn size(&self) -> (f32, f32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(mood: Mood) -> ParticleField {
        let mut field = ParticleField::new(11);
        field.seed(mood, 800.0, 600.0);
        field
    }

    #[test]
    fn test_seed_counts_follow_profile() {
        for mood in Mood::ALL {
            let field = field(mood);
            assert_eq!(field.drops().len(), MoodProfile::for_mood(mood).drop_count);
            assert!(field
                .drops()
                .iter()
                .all(|d| (MIN_DEPTH..=1.0).contains(&d.z)
                    && (0.0..=800.0).contains(&d.x)
                    && (0.0..=600.0).contains(&d.y)));
        }
    }

    #[test]
    fn test_depth_monotonic() {
        for mood in Mood::ALL {
            let field = field(mood);
            let mut drops = field.drops().to_vec();
            drops.sort_by(|a, b| a.z.total_cmp(&b.z));
            for pair in drops.windows(2) {
                let (near, far) = (&pair[1], &pair[0]);
                assert!(near.alpha() >= far.alpha());
                assert!(near.width() >= far.width());
                assert!(near.speed >= far.speed);
            }
        }
    }

    #[test]
    fn test_calm_moves_with_wind() {
        let mut field = field(Mood::Calm);
        let before = field.drops()[0];
        let effects = field.tick();
        let after = field.drops()[0];

        assert!(effects.fog);
        assert!(!effects.trail);
        if after.y > before.y {
            assert!((after.y - before.y - before.speed).abs() < 1e-4);
            assert!((after.x - (before.x - 0.5 * before.z)).abs() < 1e-4 || after.x == 800.0);
        }
    }

    #[test]
    fn test_bottom_wraps_above_top() {
        let mut field = field(Mood::Stormy);
        for _ in 0..200 {
            field.tick();
            for drop in field.drops() {
                assert!(drop.y >= -MAX_LENGTH && drop.y <= 600.0);
                assert!((0.0..=800.0).contains(&drop.x));
            }
        }
    }

    #[test]
    fn test_glitch_stutters() {
        let mut field = field(Mood::Glitch);
        let start: Vec<f32> = field.drops().iter().map(|d| d.y).collect();

        // Frames 1..=29 move.
        for _ in 0..29 {
            field.tick();
        }
        let moved = field
            .drops()
            .iter()
            .zip(&start)
            .filter(|(d, y)| d.y != **y)
            .count();
        assert!(moved > 0);

        // Frames 30..=59 hold still vertically.
        field.tick();
        let frozen: Vec<f32> = field.drops().iter().map(|d| d.y).collect();
        for _ in 0..29 {
            field.tick();
        }
        let still: Vec<f32> = field.drops().iter().map(|d| d.y).collect();
        assert_eq!(frozen, still);
    }

    #[test]
    fn test_glitch_decorations() {
        let mut field = field(Mood::Glitch);
        let mut trails = 0;
        let mut artifacts = 0;
        for _ in 0..1000 {
            let fx = field.tick();
            assert!(!fx.fog);
            trails += fx.trail as u32;
            artifacts += fx.artifact.is_some() as u32;
        }
        assert!(trails > 30 && trails < 200, "trails {trails}");
        assert!(artifacts > 100 && artifacts < 320, "artifacts {artifacts}");
    }

    #[test]
    fn test_strokes_scale_with_depth() {
        let field = field(Mood::Stormy);
        for (stroke, drop) in field.strokes().zip(field.drops()) {
            assert_eq!(stroke.from, [drop.x, drop.y]);
            assert!((stroke.to[0] - (drop.x - 6.0 * drop.z)).abs() < 1e-4);
            assert!((stroke.to[1] - (drop.y + drop.length * drop.z)).abs() < 1e-4);
            assert_eq!(stroke.alpha, drop.alpha());
        }
    }

    #[test]
    fn test_set_mood_and_resize_reseed() {
        let mut field = field(Mood::Calm);
        field.set_mood(Mood::Calm);
        assert_eq!(field.drops().len(), 600);

        field.set_mood(Mood::Stormy);
        assert_eq!(field.drops().len(), 2200);

        field.resize(200.0, 100.0);
        assert_eq!(field.size(), (200.0, 100.0));
        assert!(field.drops().iter().all(|d| d.x <= 200.0 && d.y <= 100.0));
    }
}
