use dhc_core::prelude::*;

/// Inputs `a` and `b`, `a` alternates between emitting `1` and `2`, `b` does nothing.
pub fn toggle() -> Result<MealyMachine<char, &'static str>, MealyError> {
    MealyMachine::builder()
        .with_transitions([
            (0, 'a', "1", 1),
            (0, 'b', "0", 0),
            (1, 'a', "2", 0),
            (1, 'b', "0", 1),
        ])
        .into_mealy(0)
}

/// A coffee machine that takes coins (`c`), brews when the button is pushed (`p`) and gives
/// back the credit on refund (`r`). Coffee costs two coins, a third coin is rejected.
pub fn vending() -> Result<MealyMachine<char, &'static str>, MealyError> {
    MealyMachine::builder()
        .with_transitions([
            (0, 'c', "ok", 1),
            (0, 'p', "error", 0),
            (0, 'r', "nothing", 0),
            (1, 'c', "ok", 2),
            (1, 'p', "error", 1),
            (1, 'r', "refund", 0),
            (2, 'c', "reject", 2),
            (2, 'p', "coffee", 0),
            (2, 'r', "refund", 0),
        ])
        .into_mealy(0)
}

pub fn by_name(name: &str) -> Result<MealyMachine<char, &'static str>, MealyError> {
    match name {
        "toggle" => toggle(),
        _ => vending(),
    }
}
