//! 样本量评估

use serde::{Deserialize, Serialize};

/// 分析场景，决定最小样本量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleContext {
    #[default]
    General,
    Platform,
    Comparison,
    Trend,
}

impl SampleContext {
    pub fn minimum(&self) -> usize {
        match self {
            SampleContext::General => 30,
            SampleContext::Platform => 50,
            SampleContext::Comparison => 30,
            SampleContext::Trend => 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reliability {
    High,
    Medium,
    Low,
    Insufficient,
}

/// 样本量评估结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleAdequacy {
    pub sample_size: usize,
    pub minimum: usize,
    pub context: SampleContext,
    /// 0 - 100
    pub confidence: u32,
    pub reliability: Reliability,
    pub is_adequate: bool,
    pub warning: Option<String>,
}

/// 根据场景最小样本量评估 n
///
/// - n ≥ 2·min → high (95%)
/// - n ≥ min → medium (80%)
/// - n ≥ min/2 → low (60%)
/// - 其他 → insufficient，置信度按 n/min 线性折算，上限 40%
pub fn validate_sample_size(n: usize, context: SampleContext) -> SampleAdequacy {
    let minimum = context.minimum();

    let (reliability, confidence) = if n >= minimum * 2 {
        (Reliability::High, 95)
    } else if n >= minimum {
        (Reliability::Medium, 80)
    } else if n * 2 >= minimum {
        (Reliability::Low, 60)
    } else {
        let ratio = n as f64 / minimum as f64;
        (Reliability::Insufficient, ((ratio * 80.0).round() as u32).min(40))
    };

    let warning = match reliability {
        Reliability::Low => Some(format!(
            "Sample size {} is below the recommended minimum of {}; results may be unreliable",
            n, minimum
        )),
        Reliability::Insufficient => Some(format!(
            "Sample size {} is far below the recommended minimum of {}; treat results as anecdotal",
            n, minimum
        )),
        _ => None,
    };

    SampleAdequacy {
        sample_size: n,
        minimum,
        context,
        confidence,
        reliability,
        is_adequate: n >= minimum,
        warning,
    }
}
