//! The `rand` variable and `srand()`.
//!
//! A 32-bit state is stirred with 15-bit draws from a seeded generator. The
//! same sequence feeds every backend so `srand` gives matching images in
//! each math mode.

use fastrand::Rng;

#[derive(Debug, Clone)]
pub struct RandState {
    num: u32,
    seed_x: i64,
    seed_y: i64,
    /// `srand` has fixed the sequence.
    set: bool,
    /// Seeded from the clock (or the load-time seed) because `rand` is used.
    randomized: bool,
    rng: Rng,
}

impl Default for RandState {
    fn default() -> Self {
        RandState {
            num: 0,
            seed_x: 0,
            seed_y: 0,
            set: false,
            randomized: false,
            rng: Rng::with_seed(0),
        }
    }
}

impl RandState {
    fn rand15(&mut self) -> u32 {
        self.rng.u32(..) & 0x7fff
    }

    fn next(&mut self) -> u32 {
        self.num = (self.num << 15).wrapping_add(self.rand15()) ^ self.num;
        self.num
    }

    /// Seed for a formula that reads `rand`. `None` draws a fresh seed.
    pub fn randomize(&mut self, seed: Option<u64>) {
        self.rng = match seed {
            Some(s) => Rng::with_seed(s),
            None => Rng::new(),
        };
        for _ in 0..3 {
            self.next();
        }
        self.randomized = true;
    }

    /// `srand(x, y)`: fix the sequence from seed bits.
    pub fn seed(&mut self, x: i64, y: i64) {
        self.seed_x = x;
        self.seed_y = y;
        if !self.set {
            self.num = (self.seed_x ^ self.seed_y) as u32;
        }
        let seed = self.num ^ (self.num >> 16);
        self.rng = Rng::with_seed(seed as u64);
        self.set = true;
        for _ in 0..3 {
            self.next();
        }
    }

    /// Whether `rand` must be refreshed before each iteration.
    pub fn active(&self) -> bool {
        self.set || self.randomized
    }

    /// Two raw draws for the real and imaginary parts of `rand`.
    pub fn draw(&mut self) -> (u32, u32) {
        let x = self.next();
        let y = self.next();
        (x, y)
    }
}
