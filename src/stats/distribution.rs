//! 分布函数
//!
//! - 正态临界值查表 (90% / 95% / 99%)
//! - Student's t 分布 CDF，基于正则化不完全 Beta 函数 (连分式展开)

use std::f64::consts::PI;

/// Lanczos 近似系数 (g = 7, n = 9)
const LANCZOS_G: f64 = 7.0;
const LANCZOS_COEF: [f64; 9] = [
    0.999_999_999_999_809_9,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_6,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_572e-6,
    1.505_632_735_149_311_6e-7,
];

const BETACF_MAX_ITER: usize = 300;
const BETACF_EPS: f64 = 3.0e-14;
const BETACF_FPMIN: f64 = 1.0e-300;

/// 置信水平对应的 z 值
///
/// 只有 90 / 95 / 99 三档，其他水平按 95% 处理。
/// 接受 `0.95` 和 `95` 两种写法。
pub fn z_for_confidence(level: f64) -> f64 {
    let percent = if level > 1.0 { level } else { level * 100.0 };
    match percent.round() as u32 {
        90 => 1.645,
        95 => 1.96,
        99 => 2.576,
        _ => 1.96,
    }
}

/// ln Γ(x)
pub fn ln_gamma(x: f64) -> f64 {
    if x < 0.5 {
        // 反射公式
        return PI.ln() - (PI * x).sin().abs().ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let t = x + LANCZOS_G + 0.5;
    let series = LANCZOS_COEF
        .iter()
        .enumerate()
        .skip(1)
        .fold(LANCZOS_COEF[0], |acc, (i, c)| acc + c / (x + i as f64));
    0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + series.ln()
}

/// 正则化不完全 Beta 函数 I_x(a, b)
pub fn regularized_incomplete_beta(x: f64, a: f64, b: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    let ln_front = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let front = ln_front.exp();

    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(x, a, b) / a
    } else {
        1.0 - front * beta_continued_fraction(1.0 - x, b, a) / b
    }
}

/// Lentz 算法求连分式
fn beta_continued_fraction(x: f64, a: f64, b: f64) -> f64 {
    let clamp_tiny = |v: f64| if v.abs() < BETACF_FPMIN { BETACF_FPMIN } else { v };

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;

    let mut c = 1.0;
    let mut d = 1.0 / clamp_tiny(1.0 - qab * x / qap);
    let mut h = d;

    for m in 1..=BETACF_MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;

        // 偶数项
        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 / clamp_tiny(1.0 + aa * d);
        c = clamp_tiny(1.0 + aa / c);
        h *= d * c;

        // 奇数项
        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 / clamp_tiny(1.0 + aa * d);
        c = clamp_tiny(1.0 + aa / c);
        let delta = d * c;
        h *= delta;

        if (delta - 1.0).abs() < BETACF_EPS {
            break;
        }
    }
    h
}

/// t 分布双尾 p 值 P(|T| ≥ |t|)
pub fn student_t_two_tailed(t: f64, df: f64) -> f64 {
    if t.is_nan() || df <= 0.0 {
        return 1.0;
    }
    if t.is_infinite() {
        return 0.0;
    }
    let x = df / (df + t * t);
    regularized_incomplete_beta(x, df / 2.0, 0.5).clamp(0.0, 1.0)
}

/// t 分布 CDF P(T ≤ t)
pub fn student_t_cdf(t: f64, df: f64) -> f64 {
    let tail = student_t_two_tailed(t, df) / 2.0;
    if t >= 0.0 {
        1.0 - tail
    } else {
        tail
    }
}
