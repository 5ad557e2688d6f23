//! Reduction of a score vector to food signals

use crate::taxonomy::{ClassIndex, FOOD_CLASSES, FOOD_RELATED_CLASSES};
use foodgate_core::{Error, Result};

/// Numerically stable softmax. Rejects empty or non-finite input.
pub fn softmax(logits: &[f32]) -> Result<Vec<f32>> {
    if logits.is_empty() {
        return Err(Error::inference("model returned an empty score vector"));
    }
    if let Some(pos) = logits.iter().position(|x| !x.is_finite()) {
        return Err(Error::inference(format!(
            "model returned a non-finite score at class {pos}"
        )));
    }

    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();

    Ok(exps.into_iter().map(|e| e / sum).collect())
}

/// Highest-scoring class. Ties go to the lowest index.
pub fn argmax(scores: &[f32]) -> Option<(ClassIndex, f32)> {
    scores
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (i, s)| match best {
            Some((_, b)) if b >= s => best,
            _ => Some((i, s)),
        })
}

/// The `k` best classes, highest score first, ties broken by index
pub fn top_k(scores: &[f32], k: usize) -> Vec<(ClassIndex, f32)> {
    let mut ranked: Vec<(ClassIndex, f32)> = scores.iter().copied().enumerate().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.truncate(k);
    ranked
}

fn mass(probs: &[f32], table: &[(ClassIndex, &str)]) -> f32 {
    table
        .iter()
        .filter_map(|(i, _)| probs.get(*i))
        .sum()
}

/// Probability mass on food and food-related classes, clamped to `[0, 1]`
pub fn food_mass(probs: &[f32]) -> f32 {
    (mass(probs, FOOD_CLASSES) + mass(probs, FOOD_RELATED_CLASSES)).clamp(0.0, 1.0)
}

/// Probability mass on actual food classes only, clamped to `[0, 1]`
pub fn actual_food_mass(probs: &[f32]) -> f32 {
    mass(probs, FOOD_CLASSES).clamp(0.0, 1.0)
}
