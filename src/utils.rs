use indicatif::ProgressStyle;

use crate::error::{Error, Result};

/// 判断单位向量时允许的误差
pub const NORM_EPSILON: f32 = 1e-3;

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
}

#[inline(always)]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[inline]
pub fn l2_norm(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}

/// 原地归一化，零向量或含 NaN 的向量返回错误
pub fn normalize(v: &mut [f32]) -> Result<()> {
    let norm = l2_norm(v);
    if !norm.is_finite() || norm == 0.0 {
        return Err(Error::ZeroVector);
    }
    v.iter_mut().for_each(|x| *x /= norm);
    Ok(())
}

pub fn is_unit(v: &[f32]) -> bool {
    (l2_norm(v) - 1.0).abs() < NORM_EPSILON
}

/// 计算 `a * x + b * y`
pub fn weighted_sum(a: f32, x: &[f32], b: f32, y: &[f32]) -> Vec<f32> {
    x.iter().zip(y).map(|(x, y)| a * x + b * y).collect()
}
