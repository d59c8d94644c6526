//! Simulated sensor drivers for running the node without hardware.
//!
//! - IR receiver: random key presses from a 24-key remote, latching like
//!   the real decoder until rearmed
//! - Tag reader: a small pool of known tags that rest on the reader for a
//!   random number of polls
//! - Sound level: mean-reverting random walk in the 12-bit ADC range with
//!   occasional spikes (claps, doors)

use std::fmt;
use std::time::Duration;

use crate::payload::{LevelReading, PulseReading, TagReading};
use crate::ports::{LevelSensor, PulseSensor, TagSensor};

/// Full-scale value of the 12-bit ADC.
const ADC_MAX: f64 = 4095.0;

/// NEC codes of the common 24-key RGB remote.
const REMOTE_CODES: [u32; 24] = [
    0xFF906F, 0xFFB847, 0xFFB04F, 0xFFF807, // dim up, dim down, on, off
    0xFF9867, 0xFFD827, 0xFF8877, 0xFFA857, // red, green, blue, white
    0xFFE817, 0xFF48B7, 0xFF6897, 0xFFB24D, // row 1 + flash
    0xFF02FD, 0xFF32CD, 0xFF20DF, 0xFF00FF, // row 2 + strobe
    0xFF50AF, 0xFF7887, 0xFF708F, 0xFF58A7, // row 3 + fade
    0xFF38C7, 0xFF28D7, 0xFFF00F, 0xFF30CF, // row 4 + smooth
];

/// Tags that show up on the simulated reader.
const KNOWN_TAGS: [(&[u8], &str); 3] = [
    (&[0x04, 0xA3, 0x1B, 0x22], "MIFARE 1KB"),
    (&[0x53, 0x9F, 0x0E, 0x7C], "MIFARE 1KB"),
    (&[0x04, 0x5E, 0x61, 0x9A, 0x2B, 0x4C, 0x80], "MIFARE Ultralight"),
];

// ---------------------------------------------------------------------------
// Gaussian approximation (no extra dependency)
// ---------------------------------------------------------------------------

/// Irwin-Hall: sum of 12 uniform [0,1) values minus 6.
fn approx_std_normal() -> f64 {
    (0..12).map(|_| fastrand::f64()).sum::<f64>() - 6.0
}

fn gaussian(mean: f64, sigma: f64) -> f64 {
    mean + sigma * approx_std_normal()
}

/// Command byte of a 32-bit NEC frame, LSB-first as the decoder reports it.
fn nec_command(code: u32) -> u16 {
    u16::from(((code >> 8) as u8).reverse_bits())
}

// ---------------------------------------------------------------------------
// Activity profiles
// ---------------------------------------------------------------------------

/// How busy the simulated room is. Selected with `hardware.sim_profile`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Rare key presses and tags, low background noise.
    Quiet,
    /// Frequent interaction and a noisy room.
    Busy,
}

impl Profile {
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "busy" => Self::Busy,
            _ => Self::Quiet,
        }
    }

    /// (key press, tag arrival, level spike) probabilities per poll.
    fn rates(self) -> (f32, f32, f32) {
        match self {
            Self::Quiet => (0.01, 0.005, 0.01),
            Self::Busy => (0.08, 0.04, 0.06),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quiet => write!(f, "quiet"),
            Self::Busy => write!(f, "busy"),
        }
    }
}

// ---------------------------------------------------------------------------
// IR receiver
// ---------------------------------------------------------------------------

pub struct SimPulse {
    press_prob: f32,
    armed: bool,
}

impl SimPulse {
    pub fn new(profile: Profile) -> Self {
        Self::with_rate(profile.rates().0)
    }

    fn with_rate(press_prob: f32) -> Self {
        Self {
            press_prob,
            armed: true,
        }
    }
}

impl PulseSensor for SimPulse {
    fn poll(&mut self) -> Option<PulseReading> {
        if !self.armed || fastrand::f32() >= self.press_prob {
            return None;
        }
        self.armed = false;
        let code = REMOTE_CODES[fastrand::usize(..REMOTE_CODES.len())];
        Some(PulseReading {
            code,
            command_bits: nec_command(code),
        })
    }

    fn rearm(&mut self) {
        self.armed = true;
    }
}

// ---------------------------------------------------------------------------
// Tag reader
// ---------------------------------------------------------------------------

struct Resting {
    tag: usize,
    polls_left: u32,
}

pub struct SimTag {
    arrive_prob: f32,
    resting: Option<Resting>,
}

impl SimTag {
    pub fn new(profile: Profile) -> Self {
        Self::with_rate(profile.rates().1)
    }

    fn with_rate(arrive_prob: f32) -> Self {
        Self {
            arrive_prob,
            resting: None,
        }
    }
}

impl TagSensor for SimTag {
    /// Answers immediately; the real reader blocks for up to `_timeout`.
    fn poll(&mut self, _timeout: Duration) -> Option<TagReading> {
        if let Some(r) = self.resting.as_mut() {
            if r.polls_left == 0 {
                self.resting = None;
                return None;
            }
            r.polls_left -= 1;
        } else if fastrand::f32() < self.arrive_prob {
            self.resting = Some(Resting {
                tag: fastrand::usize(..KNOWN_TAGS.len()),
                polls_left: fastrand::u32(5..40),
            });
        } else {
            return None;
        }

        let (uid, kind) = KNOWN_TAGS[self.resting.as_ref()?.tag];
        Some(TagReading::new(uid, kind))
    }
}

// ---------------------------------------------------------------------------
// Sound level
// ---------------------------------------------------------------------------

pub struct SimLevel {
    level: f64,
    center: f64,
    walk_sigma: f64,
    mean_reversion: f64,
    noise_sigma: f64,
    spike_prob: f32,
    spike_sigma: f64,
}

impl SimLevel {
    pub fn new(profile: Profile) -> Self {
        let (center, walk_sigma, noise_sigma) = match profile {
            Profile::Quiet => (300.0, 15.0, 10.0),
            Profile::Busy => (1200.0, 60.0, 40.0),
        };
        Self {
            level: center,
            center,
            walk_sigma,
            mean_reversion: 0.05,
            noise_sigma,
            spike_prob: profile.rates().2,
            spike_sigma: 1500.0,
        }
    }
}

impl LevelSensor for SimLevel {
    fn poll(&mut self) -> LevelReading {
        let pull = self.mean_reversion * (self.center - self.level);
        self.level = (self.level + pull + gaussian(0.0, self.walk_sigma)).clamp(0.0, ADC_MAX);

        let spike = if fastrand::f32() < self.spike_prob {
            gaussian(0.0, self.spike_sigma).abs()
        } else {
            0.0
        };

        let reading = self.level + gaussian(0.0, self.noise_sigma) + spike;
        LevelReading {
            value: reading.round().clamp(0.0, ADC_MAX) as u16,
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const T: Duration = Duration::from_millis(50);

    #[test]
    fn nec_command_bits() {
        assert_eq!(nec_command(0xFFB04F), 0x0D);
        assert_eq!(nec_command(0xFFF807), 0x1F);
        assert_eq!(nec_command(0xFF00FF), 0x00);
    }

    #[test]
    fn pulse_latches_until_rearmed() {
        let mut ir = SimPulse::with_rate(1.0);
        let first = ir.poll().expect("always presses");
        assert!(REMOTE_CODES.contains(&first.code));
        assert_eq!(first.command_bits, nec_command(first.code));

        for _ in 0..10 {
            assert!(ir.poll().is_none(), "latched receiver must stay silent");
        }

        ir.rearm();
        assert!(ir.poll().is_some());
    }

    #[test]
    fn pulse_silent_at_zero_rate() {
        let mut ir = SimPulse::with_rate(0.0);
        assert!((0..100).all(|_| ir.poll().is_none()));
    }

    #[test]
    fn tag_presence_is_contiguous() {
        let mut nfc = SimTag::with_rate(1.0);
        let first = nfc.poll(T).expect("tag arrives");

        // Same tag until it leaves, then exactly one absent poll.
        let mut held = 1;
        loop {
            match nfc.poll(T) {
                Some(r) => {
                    assert_eq!(r, first);
                    held += 1;
                }
                None => break,
            }
        }
        assert!((6..=41).contains(&held), "held for {held} polls");
    }

    #[test]
    fn tag_never_arrives_at_zero_rate() {
        let mut nfc = SimTag::with_rate(0.0);
        assert!((0..100).all(|_| nfc.poll(T).is_none()));
    }

    #[test]
    fn tag_uids_formatted() {
        let mut nfc = SimTag::with_rate(1.0);
        let r = nfc.poll(T).unwrap();
        assert!(r.uid.split(':').all(|p| p.len() == 2));
        assert!(r.tag_type.starts_with("MIFARE"));
    }

    #[test]
    fn level_within_adc_range() {
        for profile in [Profile::Quiet, Profile::Busy] {
            let mut snd = SimLevel::new(profile);
            for _ in 0..1000 {
                assert!(snd.poll().value <= ADC_MAX as u16);
            }
        }
    }

    #[test]
    fn busy_room_is_louder() {
        let avg = |p| {
            let mut snd = SimLevel::new(p);
            (0..200).map(|_| f64::from(snd.poll().value)).sum::<f64>() / 200.0
        };
        let quiet = avg(Profile::Quiet);
        let busy = avg(Profile::Busy);
        assert!(busy > quiet, "busy={busy:.0} quiet={quiet:.0}");
    }

    #[test]
    fn profile_from_str_lossy() {
        assert_eq!(Profile::from_str_lossy("BUSY"), Profile::Busy);
        assert_eq!(Profile::from_str_lossy("quiet"), Profile::Quiet);
        assert_eq!(Profile::from_str_lossy(""), Profile::Quiet);
        assert_eq!(Profile::Busy.to_string(), "busy");
    }

    #[test]
    fn approx_std_normal_has_zero_mean() {
        let n = 5000;
        let mean = (0..n).map(|_| approx_std_normal()).sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.15, "mean should be near zero: {mean}");
    }
}
