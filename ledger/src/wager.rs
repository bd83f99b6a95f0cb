use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollOutcome {
    Win,
    Loss,
}

/// Result of a settled dice wager. `delta` is the signed balance adjustment
/// for the bettor; applying it is the caller's job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RollResult {
    pub dice: (u8, u8),
    pub total: u8,
    pub outcome: RollOutcome,
    pub delta: f64,
}

/// Rolls two dice and scores the bet. No side effects; the caller must have
/// already confirmed the bettor's balance covers `bet_amount`.
pub fn settle<R: Rng>(rng: &mut R, bet_amount: f64) -> RollResult {
    let dice = (rng.gen_range(1..=6), rng.gen_range(1..=6));
    score(dice, bet_amount)
}

/// Scores a finished roll: totals of seven or more win the bet amount, six or
/// less lose it. The win pays the bet amount on top of the untouched stake.
pub fn score(dice: (u8, u8), bet_amount: f64) -> RollResult {
    let total = dice.0 + dice.1;
    let (outcome, delta) = if total >= 7 {
        (RollOutcome::Win, bet_amount)
    } else {
        (RollOutcome::Loss, -bet_amount)
    };
    RollResult {
        dice,
        total,
        outcome,
        delta,
    }
}
