//! Win probability estimation: logistic blend of win and draw mass.
//! Two phase signals are supported: game ply and remaining material.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Centipawn-to-internal scale used by the ply variant.
const PLY_NORMALIZE: i64 = 343;
const PLY_MAX: u32 = 240;

const MATERIAL_MIN: u32 = 17;
const MATERIAL_MAX: u32 = 78;
const MATERIAL_NORMALIZE: f64 = 58.0;

/// Internal value clamp applied before the logistic.
const VALUE_LIMIT: i64 = 4000;

const PLY_AS: [f64; 4] = [1.07390458, -6.94334517, 31.95090161, 317.75424048];
const PLY_BS: [f64; 4] = [-2.82843814, 16.64518180, -19.74439200, 68.39499088];

const MATERIAL_AS: [f64; 4] = [-37.45051876, 121.19101539, -132.78783573, 420.70576692];
const MATERIAL_BS: [f64; 4] = [90.26261072, -137.26549898, 71.10130540, 51.35259597];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WinProbabilityModel {
    /// Phase is the number of plies played from the standard start.
    #[default]
    Ply,
    /// Phase is the total material left on the board (pawn = 1 ... queen = 9).
    Material,
}

impl WinProbabilityModel {
    /// Win probability in [0, 100] for the side the score belongs to.
    pub fn win_probability(self, score: i32, phase: u32) -> u8 {
        match self {
            Self::Ply => by_ply(score, phase),
            Self::Material => by_material(score, phase),
        }
    }
}

impl FromStr for WinProbabilityModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ply" => Ok(Self::Ply),
            "material" => Ok(Self::Material),
            other => Err(format!("unknown win probability model: {}", other)),
        }
    }
}

impl fmt::Display for WinProbabilityModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ply => f.write_str("ply"),
            Self::Material => f.write_str("material"),
        }
    }
}

fn cubic(coefficients: &[f64; 4], m: f64) -> f64 {
    ((coefficients[0] * m + coefficients[1]) * m + coefficients[2]) * m + coefficients[3]
}

pub fn by_ply(score: i32, ply: u32) -> u8 {
    let m = ply.min(PLY_MAX) as f64 / 64.0;
    let a = cubic(&PLY_AS, m);
    let b = cubic(&PLY_BS, m);
    let value = i64::from(score) * PLY_NORMALIZE / 100;
    blend(value, a, b)
}

pub fn by_material(score: i32, material: u32) -> u8 {
    let m = material.clamp(MATERIAL_MIN, MATERIAL_MAX) as f64 / MATERIAL_NORMALIZE;
    let a = cubic(&MATERIAL_AS, m);
    let b = cubic(&MATERIAL_BS, m);
    let value = (f64::from(score) * a / 100.0).trunc() as i64;
    blend(value, a, b)
}

fn blend(value: i64, a: f64, b: f64) -> u8 {
    let x = value.clamp(-VALUE_LIMIT, VALUE_LIMIT) as f64;
    let win = 0.5 + 1000.0 / (1.0 + ((a - x) / b).exp());
    let loss = 0.5 + 1000.0 / (1.0 + ((a + x) / b).exp());
    let draw = 1000.0 - win - loss;
    ((win + draw / 2.0) / 10.0).round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_even_score_is_a_coin_flip() {
        assert_eq!(by_ply(0, 0), 50);
        assert_eq!(by_ply(0, 60), 50);
        assert_eq!(by_material(0, 40), 50);
        assert_eq!(by_material(0, 78), 50);
    }

    #[test]
    fn test_decisive_scores_saturate() {
        assert_eq!(by_ply(950, 0), 100);
        assert_eq!(by_ply(-950, 0), 0);
        assert_eq!(by_material(5000, 30), 100);
        assert_eq!(by_material(-5000, 30), 0);
    }

    #[test]
    fn test_small_deficit_stays_balanced() {
        assert_eq!(by_ply(-10, 1), 50);
        assert_eq!(by_material(-10, 78), 49);
    }

    #[test]
    fn test_phase_is_clamped() {
        assert_eq!(by_ply(120, 240), by_ply(120, 900));
        assert_eq!(by_material(120, 0), by_material(120, 17));
        assert_eq!(by_material(120, 200), by_material(120, 78));
    }

    #[test]
    fn test_model_parsing() {
        assert_eq!("ply".parse::<WinProbabilityModel>(), Ok(WinProbabilityModel::Ply));
        assert_eq!(" Material ".parse::<WinProbabilityModel>(), Ok(WinProbabilityModel::Material));
        assert!("elo".parse::<WinProbabilityModel>().is_err());
        assert_eq!(WinProbabilityModel::Material.to_string(), "material");
    }

    proptest! {
        #[test]
        fn prop_probability_is_bounded(score in any::<i32>(), phase in 0u32..1000) {
            prop_assert!(by_ply(score, phase) <= 100);
            prop_assert!(by_material(score, phase) <= 100);
        }

        #[test]
        fn prop_monotonic_in_score(score in -20_000i32..20_000, delta in 0i32..2_000, phase in 0u32..300) {
            prop_assert!(by_ply(score, phase) <= by_ply(score + delta, phase));
            prop_assert!(by_material(score, phase) <= by_material(score + delta, phase));
        }
    }
}
