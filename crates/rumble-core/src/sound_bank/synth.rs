//! Deterministic sample synthesis for the built-in bank
//!
//! Every stream is generated from closed-form envelopes and a seeded LCG so
//! that the bank is identical on every run and on every target.

use std::f32::consts::TAU;

use super::{EffectBank, HornType, ProfileId, SoundProfile, SoundSample, BANK_SAMPLE_RATE};
use crate::types::BankSample;

const RATE: f32 = BANK_SAMPLE_RATE as f32;

/// Seeded linear congruential noise in [-1, 1]
struct Noise(u32);

impl Noise {
    fn new(seed: u32) -> Self {
        Self(seed.wrapping_mul(2_654_435_761).max(1))
    }

    fn next(&mut self) -> f32 {
        self.0 = self.0.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        ((self.0 >> 8) as f32 / (1u32 << 23) as f32) - 1.0
    }
}

/// Quantize a float signal to 8-bit signed PCM
fn render(len: usize, mut f: impl FnMut(usize) -> f32) -> Vec<BankSample> {
    (0..len)
        .map(|i| (f(i).clamp(-1.0, 1.0) * 127.0).round() as BankSample)
        .collect()
}

fn sample(data: Vec<BankSample>) -> SoundSample {
    SoundSample::new(data, BANK_SAMPLE_RATE)
}

fn secs(seconds: f32) -> usize {
    (seconds * RATE) as usize
}

/// Acoustic character of one engine
struct EngineVoice {
    cylinders: usize,
    /// Idle samples per firing
    idle_firing: usize,
    /// Rev samples per firing
    rev_firing: usize,
    /// Body resonance (Hz)
    body_hz: f32,
    /// Noise share of each pulse
    grit: f32,
    /// Extra weight on the pulses that give a V8 its burble
    lope: f32,
    seed: u32,
}

impl EngineVoice {
    fn for_profile(id: ProfileId) -> Self {
        match id {
            ProfileId::Cat3408 => Self {
                cylinders: 8,
                idle_firing: 1100,
                rev_firing: 620,
                body_hz: 95.0,
                grit: 0.35,
                lope: 0.25,
                seed: 3408,
            },
            ProfileId::UnimogU1000 => Self {
                cylinders: 6,
                idle_firing: 1250,
                rev_firing: 700,
                body_hz: 120.0,
                grit: 0.45,
                lope: 0.0,
                seed: 1000,
            },
            ProfileId::ManKat => Self {
                cylinders: 8,
                idle_firing: 1000,
                rev_firing: 560,
                body_hz: 85.0,
                grit: 0.3,
                lope: 0.3,
                seed: 88,
            },
        }
    }

    /// One loop of firing pulses, one pulse per cylinder
    fn firing_loop(&self, firing: usize, brightness: f32, seed: u32) -> Vec<BankSample> {
        let mut noise = Noise::new(seed);
        let len = firing * self.cylinders;
        render(len, |i| {
            let cylinder = i / firing;
            let t = (i % firing) as f32 / RATE;
            let accent = if cylinder % 4 == 3 { 1.0 + self.lope } else { 1.0 };
            let env = (-t * 38.0 * brightness).exp();
            let body = (TAU * self.body_hz * brightness * t).sin();
            let overtone = (TAU * self.body_hz * 2.7 * brightness * t).sin() * 0.3 * brightness;
            let grit = noise.next() * self.grit;
            0.7 * accent * env * (body + overtone + grit)
        })
    }
}

pub(super) fn profile(id: ProfileId) -> SoundProfile {
    let voice = EngineVoice::for_profile(id);
    let idle = sample(voice.firing_loop(voice.idle_firing, 1.0, voice.seed));
    let rev = sample(voice.firing_loop(voice.rev_firing, 1.6, voice.seed ^ 0x5A5A));

    let mut noise = Noise::new(voice.seed ^ 0xC0FF);
    let knock = sample(render(secs(0.03), |i| {
        let t = i as f32 / RATE;
        (-t * 160.0).exp() * (0.6 * noise.next() + 0.5 * (TAU * 1800.0 * t).sin())
    }));

    let start = match id {
        ProfileId::UnimogU1000 => None,
        _ => Some(sample(cranking(&voice))),
    };
    let jake_brake = match id {
        ProfileId::Cat3408 => None,
        _ => Some(sample(jake_loop(voice.body_hz * 0.6))),
    };
    let shift = match id {
        ProfileId::ManKat => Some(sample(clunk(55.0, voice.seed))),
        _ => None,
    };
    let wastegate = match id {
        ProfileId::UnimogU1000 => Some(sample(blow_off(0.35, 3.0, voice.seed))),
        _ => None,
    };

    let description = match id {
        ProfileId::Cat3408 => "Caterpillar 3408 V8 diesel, heavy equipment",
        ProfileId::UnimogU1000 => "Mercedes-Benz Unimog U1000, OM352 inline six",
        ProfileId::ManKat => "MAN KAT 8x8 military truck, V8 with jake brake",
    };

    SoundProfile {
        id,
        description,
        idle,
        rev,
        knock,
        start,
        jake_brake,
        cylinder_count: voice.cylinders as u8,
        shift,
        wastegate,
    }
}

/// Starter motor whine with compression strokes, then the engine catching
fn cranking(voice: &EngineVoice) -> Vec<BankSample> {
    let crank_len = secs(1.1);
    let catch_len = secs(0.5);
    let mut noise = Noise::new(voice.seed ^ 0x57A7);
    render(crank_len + catch_len, |i| {
        let t = i as f32 / RATE;
        if i < crank_len {
            let stroke = (TAU * 6.0 * t).sin().abs();
            let whine = (TAU * 310.0 * t).sin() * 0.15;
            0.4 * stroke * (0.5 * noise.next() + whine)
        } else {
            let k = (i - crank_len) as f32 / catch_len as f32;
            let pulse = (TAU * voice.body_hz * t).sin() * (TAU * 14.0 * t).sin().abs();
            (0.4 + 0.4 * k) * pulse + 0.1 * noise.next()
        }
    })
}

/// Engine brake rasp; length is a whole number of periods so the loop is seamless
fn jake_loop(freq: f32) -> Vec<BankSample> {
    let period = (RATE / freq).round().max(1.0) as usize;
    let len = period * ((secs(0.25) / period).max(1));
    render(len, |i| {
        let phase = (i % period) as f32 / period as f32;
        let square = if phase < 0.35 { 0.8 } else { -0.5 };
        let buzz = (TAU * phase * 5.0).sin() * 0.2;
        square + buzz
    })
}

fn clunk(freq: f32, seed: u32) -> Vec<BankSample> {
    let mut noise = Noise::new(seed ^ 0x0C1C);
    render(secs(0.12), |i| {
        let t = i as f32 / RATE;
        let thud = (TAU * freq * t).sin() * (-t * 30.0).exp();
        let click = noise.next() * (-t * 400.0).exp();
        0.8 * thud + 0.5 * click
    })
}

fn blow_off(seconds: f32, decay: f32, seed: u32) -> Vec<BankSample> {
    let mut noise = Noise::new(seed ^ 0xB10F);
    let mut last = 0.0f32;
    render(secs(seconds), |i| {
        let t = i as f32 / RATE;
        let n = noise.next();
        // First difference leans the hiss toward high frequencies
        let hiss = n - last;
        last = n;
        let attack = (t * 80.0).min(1.0);
        0.5 * attack * (-t * decay).exp() * hiss
    })
}

fn tone_mix(freqs: &[f32], t: f32) -> f32 {
    freqs.iter().map(|f| (TAU * f * t).sin()).sum::<f32>() / freqs.len() as f32
}

fn horn(freqs: &[f32]) -> SoundSample {
    let len = secs(1.2);
    let release = secs(0.25);
    let data = render(len, |i| {
        let t = i as f32 / RATE;
        let attack = (t * 25.0).min(1.0);
        let tail = if i + release > len {
            (len - i) as f32 / release as f32
        } else {
            1.0
        };
        0.8 * attack * tail * tone_mix(freqs, t)
    });
    sample(data).with_loop_region(secs(0.25)..len - release)
}

pub(super) fn effects() -> EffectBank {
    let mut noise = Noise::new(0xA1B2);
    let air_brake = sample(render(secs(0.9), |i| {
        let t = i as f32 / RATE;
        let attack = (t * 50.0).min(1.0);
        0.6 * attack * (-t * 2.5).exp() * noise.next()
    }));

    // Half a second of beeping, half silence
    let beep_on = secs(0.3);
    let reverse_beep = sample(render(secs(0.6), |i| {
        if i >= beep_on {
            return 0.0;
        }
        let t = i as f32 / RATE;
        if (TAU * 1000.0 * t).sin() >= 0.0 { 0.5 } else { -0.5 }
    }));

    let mode_len = secs(0.15);
    let mode_switch = sample(render(mode_len, |i| {
        let t = i as f32 / RATE;
        let k = i as f32 / mode_len as f32;
        let freq = 1200.0 + 1200.0 * k;
        0.6 * (1.0 - k) * (TAU * freq * t).sin()
    }));

    EffectBank {
        air_brake,
        reverse_beep,
        gear_shift: sample(clunk(70.0, 0x6EA2)),
        wastegate: sample(blow_off(0.5, 5.0, 0x7A57)),
        mode_switch,
        horns: [
            horn(&[220.0, 277.0]),
            horn(&[311.0, 370.0, 466.0]),
            horn(&[440.0, 554.0]),
        ],
    }
}
