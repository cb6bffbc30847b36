//! Skirmish arithmetic for adventures.
//!
//! The teller narrates; the fighting happens here. A foe is rolled with
//! random stats, then clashes resolve blow by blow against the hero's
//! hit-point track on the session.

use fireside_core::adventure::Enemy;
use rand::Rng;

/// Hit points restored by binding wounds after a won skirmish.
pub const VICTORY_HEALING: u32 = 10;

/// What one exchange of blows did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clash {
    /// The hero landed a blow and took one back.
    Struck { dealt: u32, taken: u32 },
    /// The foe went down on this blow.
    Felled { dealt: u32, healed: u32 },
}

/// How breaking off a skirmish went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retreat {
    Clean,
    Bloodied { taken: u32 },
}

/// One skirmish in progress.
#[derive(Debug, Clone)]
pub struct Encounter {
    pub enemy: Enemy,
    pub enemy_hp: u32,
    pub rounds: u32,
}

impl Encounter {
    /// Roll a fresh foe and square off.
    pub fn roll() -> Self {
        let enemy = Enemy::roll();
        Self {
            enemy_hp: enemy.hp,
            enemy,
            rounds: 0,
        }
    }

    /// One exchange of blows: the hero's d20 against the foe, then the
    /// foe's attack back if it still stands. The damage taken is the
    /// caller's to apply to the session.
    pub fn clash(&mut self) -> Clash {
        self.rounds += 1;
        let dealt = rand::thread_rng().gen_range(1..=20);
        self.enemy_hp = self.enemy_hp.saturating_sub(dealt);

        if self.enemy_hp == 0 {
            Clash::Felled {
                dealt,
                healed: VICTORY_HEALING,
            }
        } else {
            Clash::Struck {
                dealt,
                taken: self.enemy.attack,
            }
        }
    }

    /// Break off the skirmish. A high roll slips away clean; otherwise
    /// the foe lands a parting blow at half strength.
    pub fn flee(self) -> Retreat {
        if rand::thread_rng().gen_range(1..=20) >= 10 {
            Retreat::Clean
        } else {
            Retreat::Bloodied {
                taken: self.enemy.attack / 2,
            }
        }
    }

    /// The foe's remaining health as a fraction of where it started.
    pub fn hp_ratio(&self) -> f32 {
        if self.enemy.hp == 0 {
            return 0.0;
        }
        self.enemy_hp as f32 / self.enemy.hp as f32
    }
}
